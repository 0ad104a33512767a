use std::cell::RefCell;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use reqwest::Url;
use reqwest::blocking::RequestBuilder;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::document::normalize_url;
use crate::risk::Compliance;

pub const DIGIKEY_API_BASE_URL: &str = "https://api.digikey.com";
const TOKEN_PATH: &str = "/v1/oauth2/token";
const KEYWORD_SEARCH_PATH: &str = "/products/v4/search/keyword";
const TOKEN_REFRESH_MARGIN_SECS: u64 = 30;
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogParameter {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogProduct {
    pub manufacturer_part_number: String,
    pub manufacturer_name: Option<String>,
    pub distributor_part_number: Option<String>,
    pub rohs_status: Option<String>,
    pub reach_status: Option<String>,
    pub lifecycle_status: Option<String>,
    pub quantity_available: Option<u64>,
    pub datasheet_url: Option<String>,
    pub parameters: Vec<CatalogParameter>,
}

impl CatalogProduct {
    pub fn compliance(&self) -> Compliance {
        Compliance::from_classifications(self.rohs_status.as_deref(), self.reach_status.as_deref())
    }

    /// Distributor part number when present, otherwise the manufacturer part number.
    pub fn substitution_lookup_number(&self) -> Option<&str> {
        self.distributor_part_number
            .as_deref()
            .filter(|value| !value.is_empty())
            .or(Some(self.manufacturer_part_number.as_str()))
            .filter(|value| !value.is_empty())
    }
}

/// Vendor parts catalog, consumed as an opaque network collaborator.
pub trait Catalog {
    fn keyword_search(&self, keywords: &str, limit: u32) -> Result<Vec<CatalogProduct>>;

    fn substitution_count(&self, product_number: &str) -> Result<u32>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct KeywordResponse {
    #[serde(default)]
    products: Vec<DigiKeyProduct>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DigiKeyProduct {
    manufacturer_product_number: Option<String>,
    manufacturer: Option<DigiKeyManufacturer>,
    classifications: Option<DigiKeyClassifications>,
    product_status: Option<DigiKeyProductStatus>,
    quantity_available: Option<u64>,
    datasheet_url: Option<String>,
    primary_datasheet_url: Option<String>,
    #[serde(default)]
    product_variations: Vec<DigiKeyProductVariation>,
    #[serde(default)]
    parameters: Vec<DigiKeyParameter>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DigiKeyManufacturer {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DigiKeyClassifications {
    rohs_status: Option<String>,
    reach_status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DigiKeyProductStatus {
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DigiKeyProductVariation {
    #[serde(rename = "DigiKeyProductNumber")]
    digikey_product_number: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DigiKeyParameter {
    parameter_text: Option<String>,
    value_text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SubstitutionsResponse {
    product_substitutes: Option<Vec<serde_json::Value>>,
}

fn substitute_count(response: SubstitutionsResponse) -> u32 {
    let count = response.product_substitutes.map_or(0, |list| list.len());
    u32::try_from(count).unwrap_or(u32::MAX)
}

impl From<DigiKeyProduct> for CatalogProduct {
    fn from(product: DigiKeyProduct) -> Self {
        let (rohs_status, reach_status) = product
            .classifications
            .map(|value| (value.rohs_status, value.reach_status))
            .unwrap_or_default();

        Self {
            manufacturer_part_number: product.manufacturer_product_number.unwrap_or_default(),
            manufacturer_name: product.manufacturer.and_then(|value| value.name),
            distributor_part_number: product
                .product_variations
                .into_iter()
                .next()
                .and_then(|variation| variation.digikey_product_number),
            rohs_status,
            reach_status,
            lifecycle_status: product.product_status.and_then(|value| value.status),
            quantity_available: product.quantity_available,
            datasheet_url: product
                .datasheet_url
                .or(product.primary_datasheet_url)
                .filter(|value| !value.trim().is_empty())
                .map(|value| normalize_url(&value)),
            parameters: product
                .parameters
                .into_iter()
                .filter_map(|parameter| {
                    Some(CatalogParameter {
                        name: parameter.parameter_text?,
                        value: parameter.value_text.unwrap_or_default(),
                    })
                })
                .collect(),
        }
    }
}

/// DigiKey v4 product search using the OAuth2 client-credentials flow.
pub struct DigiKeyCatalog {
    client: reqwest::blocking::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    token: RefCell<Option<CachedToken>>,
}

impl DigiKeyCatalog {
    pub fn new(client_id: &str, client_secret: &str) -> Result<Self> {
        Self::with_base_url(DIGIKEY_API_BASE_URL, client_id, client_secret)
    }

    pub fn with_base_url(base_url: &str, client_id: &str, client_secret: &str) -> Result<Self> {
        if client_id.trim().is_empty() || client_secret.trim().is_empty() {
            bail!("DIGIKEY_CLIENT_ID and DIGIKEY_CLIENT_SECRET must be set");
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            token: RefCell::new(None),
        })
    }

    fn access_token(&self) -> Result<String> {
        if let Some(cached) = self.token.borrow().as_ref() {
            if Instant::now() < cached.expires_at {
                return Ok(cached.token.clone());
            }
        }

        let url = format!("{}{TOKEN_PATH}", self.base_url);
        let response = self
            .client
            .post(&url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .context("failed to request DigiKey access token")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!("DigiKey token error: {status}: {body}");
        }

        let token: TokenResponse = response
            .json()
            .context("failed to parse DigiKey token response")?;
        let lifetime = token.expires_in.saturating_sub(TOKEN_REFRESH_MARGIN_SECS);
        *self.token.borrow_mut() = Some(CachedToken {
            token: token.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(lifetime),
        });
        debug!(
            expires_in = token.expires_in,
            "refreshed DigiKey access token"
        );

        Ok(token.access_token)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.access_token()?;
        Ok(request
            .bearer_auth(token)
            .header("X-DIGIKEY-Client-Id", &self.client_id))
    }

    fn substitutions_url(&self, product_number: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid catalog base URL: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("catalog base URL cannot carry a path: {}", self.base_url))?
            .extend([
                "products",
                "v4",
                "search",
                product_number,
                "substitutions",
            ]);
        Ok(url)
    }
}

impl Catalog for DigiKeyCatalog {
    fn keyword_search(&self, keywords: &str, limit: u32) -> Result<Vec<CatalogProduct>> {
        let url = format!("{}{KEYWORD_SEARCH_PATH}", self.base_url);
        let request = self.client.post(&url).json(&json!({
            "Keywords": keywords,
            "Limit": limit,
            "Offset": 0,
        }));

        let response = self
            .authorized(request)?
            .send()
            .with_context(|| format!("DigiKey keyword search failed for {keywords}"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!("DigiKey API error: {status}: {body}");
        }

        let parsed: KeywordResponse = response
            .json()
            .context("failed to parse DigiKey keyword response")?;
        let products: Vec<CatalogProduct> = parsed
            .products
            .into_iter()
            .map(CatalogProduct::from)
            .collect();
        debug!(
            keywords,
            products = products.len(),
            "keyword search complete"
        );

        Ok(products)
    }

    fn substitution_count(&self, product_number: &str) -> Result<u32> {
        let url = self.substitutions_url(product_number)?;
        let response = self
            .authorized(self.client.get(url))?
            .send()
            .with_context(|| format!("DigiKey substitutions lookup failed for {product_number}"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!("DigiKey API error: {status}: {body}");
        }

        let parsed: SubstitutionsResponse = response
            .json()
            .context("failed to parse DigiKey substitutions response")?;
        Ok(substitute_count(parsed))
    }
}
