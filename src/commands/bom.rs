use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::catalog::{Catalog, DigiKeyCatalog};
use crate::cli::BomArgs;
use crate::commands::risk::assess_part;
use crate::model::{BomReport, BomRisk, BomRow, BomRowWithRisk};
use crate::util::{now_utc_string, utc_compact_string, write_json_pretty};

pub fn run(args: BomArgs) -> Result<()> {
    let rows = read_bom(&args.bom_path)?;
    info!(path = %args.bom_path.display(), rows = rows.len(), "bom loaded");

    let catalog =
        DigiKeyCatalog::new(&args.credentials.client_id, &args.credentials.client_secret)?;
    let assessed = assess_rows(&catalog, rows, Duration::from_millis(args.delay_ms));

    let failed_count = assessed
        .iter()
        .filter(|row| row.risk == BomRisk::LookupFailed)
        .count();
    let report = BomReport {
        generated_at: now_utc_string(),
        bom_path: args.bom_path.display().to_string(),
        row_count: assessed.len(),
        failed_count,
        rows: assessed,
    };

    let output_path = args
        .output_path
        .clone()
        .unwrap_or_else(|| default_report_path(&args.bom_path));
    write_json_pretty(&output_path, &report)?;

    info!(
        path = %output_path.display(),
        rows = report.row_count,
        failed = report.failed_count,
        "bom risk report written"
    );
    Ok(())
}

pub(crate) fn read_bom(path: &Path) -> Result<Vec<BomRow>> {
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

/// Assesses every row in input order. A row whose lookup errors or finds nothing is
/// reported as `lookup_failed`; it never aborts the batch.
pub(crate) fn assess_rows(
    catalog: &impl Catalog,
    rows: Vec<BomRow>,
    delay: Duration,
) -> Vec<BomRowWithRisk> {
    let total = rows.len();
    let mut assessed = Vec::with_capacity(total);

    for (index, row) in rows.into_iter().enumerate() {
        if index > 0 && !delay.is_zero() {
            thread::sleep(delay);
        }

        let part_number = row.part_number.trim().to_string();
        let outcome = if part_number.is_empty() {
            warn!(row = index, "bom row has no part number");
            BomRowWithRisk::lookup_failed(row)
        } else {
            match assess_part(catalog, &part_number) {
                Ok(Some(assessment)) => BomRowWithRisk::assessed(row, assessment),
                Ok(None) => {
                    warn!(part_number = %part_number, "no catalog product for bom row");
                    BomRowWithRisk::lookup_failed(row)
                }
                Err(err) => {
                    warn!(
                        part_number = %part_number,
                        error = %format!("{err:#}"),
                        "bom row lookup failed"
                    );
                    BomRowWithRisk::lookup_failed(row)
                }
            }
        };

        info!(
            row = index + 1,
            total,
            part_number = %part_number,
            risk = ?outcome.risk,
            "bom row assessed"
        );
        assessed.push(outcome);
    }

    assessed
}

fn default_report_path(bom_path: &Path) -> PathBuf {
    let file_name = format!("bom_report_{}.json", utc_compact_string(Utc::now()));
    match bom_path.parent() {
        Some(parent) => parent.join(file_name),
        None => PathBuf::from(file_name),
    }
}
