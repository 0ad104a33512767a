use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use reqwest::Url;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::catalog::{Catalog, DigiKeyCatalog};
use crate::cli::{DatasheetUrlArgs, DownloadArgs};
use crate::document::{DocumentResolver, Fetcher, HttpFetcher, normalize_url};
use crate::identity::{ManufacturerTable, sanitize_for_id};
use crate::model::DownloadManifest;
use crate::util::{now_utc_string, print_json, sha256_file, write_bytes, write_json_pretty};

const DATASHEET_SEARCH_LIMIT: u32 = 10;
const DOWNLOAD_MANIFEST_VERSION: u32 = 1;
const FALLBACK_DOCUMENT_ID: &str = "document";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasheetLookup {
    pub mpn: String,
    pub datasheet_url: Option<String>,
    pub manufacturer_name: Option<String>,
    pub product_count: usize,
    pub suggested_id: Option<String>,
}

pub fn run_url(args: DatasheetUrlArgs) -> Result<()> {
    let mpn = args.mpn.trim();
    if mpn.is_empty() {
        bail!("mpn must not be empty");
    }

    let catalog =
        DigiKeyCatalog::new(&args.credentials.client_id, &args.credentials.client_secret)?;
    let table = ManufacturerTable::builtin();
    let lookup = lookup_datasheet(&catalog, &table, mpn, args.manufacturer.as_deref())?;

    if lookup.datasheet_url.is_none() {
        warn!(
            mpn,
            products = lookup.product_count,
            "no datasheet URL in catalog"
        );
    }
    print_json(&lookup)
}

pub fn run_download(args: DownloadArgs) -> Result<()> {
    let mpn = args
        .mpn
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let table = ManufacturerTable::builtin();

    let (source_url, catalog_manufacturer) = match (args.url.as_deref(), mpn) {
        (Some(url), _) if !url.trim().is_empty() => (normalize_url(url), None),
        (_, Some(mpn)) => {
            let (client_id, client_secret) = match (&args.client_id, &args.client_secret) {
                (Some(id), Some(secret)) => (id.as_str(), secret.as_str()),
                _ => bail!(
                    "DIGIKEY_CLIENT_ID and DIGIKEY_CLIENT_SECRET are required to look up {mpn}"
                ),
            };
            let catalog = DigiKeyCatalog::new(client_id, client_secret)?;
            let lookup = lookup_datasheet(&catalog, &table, mpn, args.manufacturer.as_deref())?;
            let url = lookup
                .datasheet_url
                .ok_or_else(|| anyhow!("catalog has no datasheet URL for {mpn}"))?;
            (url, lookup.manufacturer_name)
        }
        _ => bail!("either --url or --mpn is required"),
    };

    let manufacturer = catalog_manufacturer.or_else(|| args.manufacturer.clone());
    let datasheet_id = datasheet_id(
        &table,
        args.id.as_deref(),
        manufacturer.as_deref(),
        mpn,
        &source_url,
    );

    let resolver = DocumentResolver::new(HttpFetcher::new()?)?;
    let manifest = download_document(
        &resolver,
        &source_url,
        &datasheet_id,
        &args.output_root,
        args.max_depth,
    )?;

    info!(
        datasheet_id = %manifest.datasheet_id,
        path = %manifest.path,
        bytes = manifest.byte_count,
        sha256 = %manifest.sha256,
        "datasheet downloaded"
    );
    print_json(&manifest)
}

pub(crate) fn lookup_datasheet(
    catalog: &impl Catalog,
    table: &ManufacturerTable,
    mpn: &str,
    manufacturer: Option<&str>,
) -> Result<DatasheetLookup> {
    let keywords = match non_blank(manufacturer) {
        Some(manufacturer) => format!("{manufacturer} {mpn}"),
        None => mpn.to_string(),
    };
    let products = catalog.keyword_search(&keywords, DATASHEET_SEARCH_LIMIT)?;
    let product_count = products.len();

    let Some(first) = products.into_iter().next() else {
        return Ok(DatasheetLookup {
            mpn: mpn.to_string(),
            datasheet_url: None,
            manufacturer_name: None,
            product_count,
            suggested_id: None,
        });
    };

    let listed_mpn = match first.manufacturer_part_number.trim() {
        "" => mpn,
        listed => listed,
    };
    let listed_manufacturer = first.manufacturer_name.as_deref().or(manufacturer);
    let suggested_id = table.mfg_mpn_datasheet_id(listed_manufacturer, listed_mpn);

    Ok(DatasheetLookup {
        mpn: mpn.to_string(),
        datasheet_url: first.datasheet_url,
        manufacturer_name: first.manufacturer_name,
        product_count,
        suggested_id,
    })
}

/// Explicit id first, then `Manufacturer_MPN`, then the bare MPN, then the URL's file stem.
pub(crate) fn datasheet_id(
    table: &ManufacturerTable,
    explicit: Option<&str>,
    manufacturer: Option<&str>,
    mpn: Option<&str>,
    source_url: &str,
) -> String {
    if let Some(id) = non_blank(explicit) {
        return sanitize_for_id(id);
    }

    match (non_blank(manufacturer), mpn) {
        (Some(manufacturer), Some(mpn)) => table.datasheet_id_or_fallback(manufacturer, mpn),
        (None, Some(mpn)) => sanitize_for_id(mpn),
        (_, None) => url_file_stem(source_url)
            .map(|stem| sanitize_for_id(&stem))
            .unwrap_or_else(|| FALLBACK_DOCUMENT_ID.to_string()),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn url_file_stem(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let mut segments = parsed.path_segments()?;
    let name = segments.rfind(|segment| !segment.is_empty())?;
    let stem = Path::new(name).file_stem()?.to_str()?;
    (!stem.is_empty()).then(|| stem.to_string())
}

/// Resolves `source_url` and stores it as `<root>/<id>/<id>.pdf` next to a
/// `<id>.download.json` manifest.
pub(crate) fn download_document<F: Fetcher>(
    resolver: &DocumentResolver<F>,
    source_url: &str,
    datasheet_id: &str,
    output_root: &Path,
    max_depth: u32,
) -> Result<DownloadManifest> {
    let document = match resolver.resolve(source_url, max_depth) {
        Ok(document) => document,
        Err(err) => {
            error!(
                kind = err.kind(),
                url = %source_url,
                suggested_action = err.suggested_action(),
                "datasheet could not be resolved"
            );
            return Err(err).with_context(|| format!("failed to download {datasheet_id}"));
        }
    };

    let directory = output_root.join(datasheet_id);
    let pdf_path = directory.join(format!("{datasheet_id}.pdf"));
    write_bytes(&pdf_path, &document.bytes)?;
    let sha256 = sha256_file(&pdf_path)?;

    let manifest = DownloadManifest {
        manifest_version: DOWNLOAD_MANIFEST_VERSION,
        datasheet_id: datasheet_id.to_string(),
        source_url: source_url.to_string(),
        final_url: document.final_url,
        path: pdf_path.display().to_string(),
        byte_count: document.bytes.len(),
        sha256,
        downloaded_at: now_utc_string(),
    };
    let manifest_path = directory.join(format!("{datasheet_id}.download.json"));
    write_json_pretty(&manifest_path, &manifest)?;

    Ok(manifest)
}
