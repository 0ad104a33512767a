use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use reqwest::Url;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info};

pub const DEFAULT_MAX_DEPTH: u32 = 3;
const PDF_SIGNATURE: &[u8; 5] = b"%PDF-";
const USER_AGENT: &str = "Mozilla/5.0 (compatible; DatasheetTool/1.0)";
const GOTO_URL_PARAM: &str = "gotoUrl";
const HTML_SNIFF_MIN_BYTES: usize = 20;
const HTML_SNIFF_WINDOW: usize = 50;
const FETCH_TIMEOUT_SECS: u64 = 60;

const NOT_PDF_ACTION: &str = concat!(
    "The URL may point to an HTML redirect page. Open it in a browser, download the PDF ",
    "manually and place it under <output-root>/<id>/<id>.pdf"
);
const COULD_NOT_RESOLVE_ACTION: &str = concat!(
    "Open the URL in a browser, find the direct PDF link and download it manually to ",
    "<output-root>/<id>/<id>.pdf"
);
const SIGNATURELESS_PDF_MESSAGE: &str = concat!(
    "response has Content-Type application/pdf but content is missing the %PDF- header; ",
    "the server may have returned an error page"
);
const DEPTH_EXHAUSTED_MESSAGE: &str = concat!(
    "could not resolve PDF link (max redirect depth reached); the URL may point to an HTML ",
    "page such as a manufacturer redirect"
);

#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: u16,
    /// Media type only, parameters such as `charset` stripped.
    pub content_type: Option<String>,
    /// URL after redirects.
    pub final_url: String,
    pub body: Vec<u8>,
}

impl FetchedResponse {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait Fetcher {
    fn fetch(&self, url: &str) -> Result<FetchedResponse>;
}

pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to create HTTP client")?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedResponse> {
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("failed to GET {url}"))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        let final_url = response.url().to_string();
        let body = response
            .bytes()
            .with_context(|| format!("failed to read response body from {url}"))?
            .to_vec();

        Ok(FetchedResponse {
            status,
            content_type,
            final_url,
            body,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDocument {
    pub bytes: Vec<u8>,
    pub final_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("{message} (url: {original_url})")]
    NotPdf {
        message: String,
        original_url: String,
        content_type: Option<String>,
    },
    #[error("{message} (url: {original_url})")]
    CouldNotResolve {
        message: String,
        original_url: String,
    },
    #[error("failed to fetch {url}: {detail}")]
    Fetch { url: String, detail: String },
}

impl ResolveError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotPdf { .. } => "not_pdf",
            Self::CouldNotResolve { .. } => "could_not_resolve_pdf",
            Self::Fetch { .. } => "download_failed",
        }
    }

    pub fn suggested_action(&self) -> &'static str {
        match self {
            Self::NotPdf { .. } => NOT_PDF_ACTION,
            Self::CouldNotResolve { .. } => COULD_NOT_RESOLVE_ACTION,
            Self::Fetch { .. } => "Check the URL or try a manual download.",
        }
    }
}

enum Recovery {
    Follow(String),
    Continue,
    Fail(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecoveryStrategy {
    GotoUrl,
    HtmlPdfLink,
}

impl RecoveryStrategy {
    const ORDER: [Self; 2] = [Self::GotoUrl, Self::HtmlPdfLink];

    fn label(self) -> &'static str {
        match self {
            Self::GotoUrl => "gotoUrl",
            Self::HtmlPdfLink => "PDF link",
        }
    }
}

/// Turns an arbitrary datasheet URL into PDF bytes, chasing `gotoUrl` redirects and HTML
/// landing pages up to a fixed depth.
pub struct DocumentResolver<F> {
    fetcher: F,
    pdf_link: Regex,
}

impl<F: Fetcher> DocumentResolver<F> {
    pub fn new(fetcher: F) -> Result<Self> {
        Ok(Self {
            fetcher,
            pdf_link: Regex::new(r#"(?i)href\s*=\s*["']([^"']*\.pdf[^"']*)["']"#)
                .context("failed to compile PDF link regex")?,
        })
    }

    pub fn resolve(&self, url: &str, max_depth: u32) -> Result<ResolvedDocument, ResolveError> {
        let url = normalize_url(url);
        debug!(url = %url, max_depth, "fetching document");

        let response = self
            .fetcher
            .fetch(&url)
            .map_err(|err| ResolveError::Fetch {
                url: url.clone(),
                detail: format!("{err:#}"),
            })?;

        if !response.is_success() {
            return Err(ResolveError::NotPdf {
                message: format!("fetch failed: HTTP {}", response.status),
                original_url: url,
                content_type: response.content_type,
            });
        }

        if has_pdf_signature(&response.body) {
            return Ok(ResolvedDocument {
                bytes: response.body,
                final_url: response.final_url,
            });
        }

        if response
            .content_type
            .as_deref()
            .is_some_and(is_pdf_content_type)
        {
            return Err(ResolveError::NotPdf {
                message: SIGNATURELESS_PDF_MESSAGE.to_string(),
                original_url: url,
                content_type: response.content_type,
            });
        }

        for strategy in RecoveryStrategy::ORDER {
            match self.attempt_recovery(strategy, &url, &response) {
                Recovery::Continue => continue,
                Recovery::Fail(message) => {
                    return Err(ResolveError::CouldNotResolve {
                        message,
                        original_url: url,
                    });
                }
                Recovery::Follow(next_url) => {
                    return self.follow(strategy, &next_url, &url, max_depth);
                }
            }
        }

        Err(ResolveError::CouldNotResolve {
            message: "response is neither a PDF nor a page that links to one".to_string(),
            original_url: url,
        })
    }

    fn attempt_recovery(
        &self,
        strategy: RecoveryStrategy,
        url: &str,
        response: &FetchedResponse,
    ) -> Recovery {
        match strategy {
            RecoveryStrategy::GotoUrl => extract_goto_url(url)
                .or_else(|| extract_goto_url(&response.final_url))
                .map_or(Recovery::Continue, Recovery::Follow),
            RecoveryStrategy::HtmlPdfLink => {
                let declared_html = response
                    .content_type
                    .as_deref()
                    .is_some_and(is_html_content_type);
                if !declared_html && !looks_like_html(&response.body) {
                    return Recovery::Continue;
                }

                let html = String::from_utf8_lossy(&response.body);
                match self.extract_pdf_link(&html, &response.final_url) {
                    Some(link) => Recovery::Follow(link),
                    None => Recovery::Fail(
                        "URL returned HTML but no .pdf link was found on the page".to_string(),
                    ),
                }
            }
        }
    }

    fn follow(
        &self,
        strategy: RecoveryStrategy,
        next_url: &str,
        original_url: &str,
        max_depth: u32,
    ) -> Result<ResolvedDocument, ResolveError> {
        if max_depth == 0 {
            return Err(ResolveError::CouldNotResolve {
                message: DEPTH_EXHAUSTED_MESSAGE.to_string(),
                original_url: original_url.to_string(),
            });
        }

        info!(
            via = strategy.label(),
            from = %original_url,
            to = %next_url,
            remaining_depth = max_depth - 1,
            "following document link"
        );

        match self.resolve(next_url, max_depth - 1) {
            Err(ResolveError::Fetch { detail, .. }) => Err(ResolveError::CouldNotResolve {
                message: format!("{} fetch failed: {detail}", strategy.label()),
                original_url: original_url.to_string(),
            }),
            other => other,
        }
    }

    fn extract_pdf_link(&self, html: &str, base_url: &str) -> Option<String> {
        let href = self.pdf_link.captures(html)?.get(1)?.as_str().trim();
        let base = Url::parse(base_url).ok()?;
        base.join(href).ok().map(String::from)
    }
}

/// Protocol-relative URLs (`//host/path`) are promoted to https.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.starts_with("//") {
        format!("https:{trimmed}")
    } else {
        trimmed.to_string()
    }
}

pub fn has_pdf_signature(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_SIGNATURE)
}

fn is_pdf_content_type(content_type: &str) -> bool {
    content_type.to_lowercase().contains("application/pdf")
}

fn is_html_content_type(content_type: &str) -> bool {
    let lower = content_type.to_lowercase();
    lower.contains("text/html") || lower.contains("application/xhtml")
}

fn looks_like_html(bytes: &[u8]) -> bool {
    if bytes.len() < HTML_SNIFF_MIN_BYTES {
        return false;
    }
    let head: String = bytes
        .iter()
        .take(HTML_SNIFF_WINDOW)
        .map(|byte| char::from(*byte))
        .collect();
    head.trim_start().starts_with('<') || head.contains("<!DOCTYPE") || head.contains("<!doctype")
}

fn extract_goto_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == GOTO_URL_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}
