use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::{ResultSource, ResultView, ResultsArgs};
use crate::identity::{
    CandidateKey, DiscoveryRequest, KeyPriority, ManufacturerTable, candidate_key_set,
    discover_result_directory,
};
use crate::model::{Confidence, SimilarityResult, SimilarityResultWithScore};
use crate::scoring::{ComparabilityRules, FlaggedParameter};
use crate::util::print_json;

const DATASHEET_NAMESPACE: &str = "datasheet:";
const MAX_SCORE: u8 = 100;

pub type ResultMap = BTreeMap<String, SimilarityResultWithScore>;

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("parameter {parameter_id} has score {score}, outside 0..=100")]
    ScoreOutOfRange { parameter_id: String, score: u8 },
    #[error("parameter {parameter_id} is missing a value but carries score {score}")]
    MissingValueScored { parameter_id: String, score: u8 },
}

/// Display-oriented projection of one scored record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSummary {
    pub candidate_id: String,
    pub total_score: Option<u32>,
    pub confidence: Confidence,
    pub differences: String,
    pub parameters: Vec<FlaggedParameter>,
}

#[derive(Debug)]
struct LoadedRecord {
    file_id: String,
    keys: Vec<CandidateKey>,
    result: SimilarityResultWithScore,
}

pub fn run(args: ResultsArgs) -> Result<()> {
    let target_id = args.target_id.trim();
    ensure_plain_target_id(target_id)?;

    let results_root = args
        .results_root
        .clone()
        .unwrap_or_else(|| PathBuf::from(args.source.default_root()));
    let manufacturer = args
        .manufacturer
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());

    let table = ManufacturerTable::builtin();
    let rules = ComparabilityRules::new()?;

    let results = match args.source {
        ResultSource::Datasheet => {
            load_datasheet_results(&results_root, target_id, manufacturer, &table, &rules)?
        }
        ResultSource::Catalog => load_catalog_results(&results_root, target_id, &rules)?,
    };

    info!(
        target_id,
        source = args.source.as_str(),
        keys = results.len(),
        "similarity results loaded"
    );

    match args.view {
        ResultView::Full => print_json(&results),
        ResultView::Summary => print_json(&summarize_results(&results, &rules)),
    }
}

pub fn summarize_results(
    results: &ResultMap,
    rules: &ComparabilityRules,
) -> BTreeMap<String, ResultSummary> {
    results
        .iter()
        .map(|(key, scored)| {
            let parameters = &scored.result.parameters;
            let summary = ResultSummary {
                candidate_id: scored.result.candidate_id.clone(),
                total_score: scored.total_score,
                confidence: scored.confidence,
                differences: rules.summarize_differences(parameters),
                parameters: rules.with_comparable_flags(parameters),
            };
            (key.clone(), summary)
        })
        .collect()
}

/// Target ids name a single directory under the results root. Empty, absolute and
/// multi-component ids are rejected before any path is built from them.
fn ensure_plain_target_id(target_id: &str) -> Result<()> {
    if target_id.is_empty() {
        bail!("target id must not be empty");
    }
    if Path::new(target_id).is_absolute() {
        bail!("target id {target_id:?} must not be an absolute path");
    }
    if target_id.contains(['/', '\\']) || target_id.contains("..") {
        bail!("target id {target_id:?} must not contain path separators or `..`");
    }
    Ok(())
}

/// Result set evaluated against datasheet parameters. Directory discovery falls back
/// through the identity strategies; keys are aliased for every catalog-facing variant.
pub fn load_datasheet_results(
    results_root: &Path,
    target_id: &str,
    manufacturer: Option<&str>,
    table: &ManufacturerTable,
    rules: &ComparabilityRules,
) -> Result<ResultMap> {
    ensure_plain_target_id(target_id)?;
    let request = DiscoveryRequest {
        target_id,
        manufacturer,
        table,
    };
    let Some(discovered) = discover_result_directory(results_root, &request) else {
        info!(target_id, root = %results_root.display(), "no result directory for target");
        return Ok(ResultMap::new());
    };

    info!(
        directory = %discovered.path.display(),
        strategy = discovered.strategy.as_str(),
        "resolved result directory"
    );

    let records = load_records(&discovered.path, rules, Some(DATASHEET_NAMESPACE))?
        .into_iter()
        .map(|(file_id, result)| LoadedRecord {
            keys: candidate_key_set(table, &file_id),
            file_id,
            result,
        })
        .collect();

    Ok(merge_by_priority(records))
}

/// Result set evaluated against catalog parameters: exact target directory, keyed by
/// each record's own candidate id.
pub fn load_catalog_results(
    results_root: &Path,
    target_id: &str,
    rules: &ComparabilityRules,
) -> Result<ResultMap> {
    ensure_plain_target_id(target_id)?;
    let directory = results_root.join(target_id);
    if !directory.is_dir() {
        info!(directory = %directory.display(), "no result directory for target");
        return Ok(ResultMap::new());
    }

    let records = load_records(&directory, rules, None)?
        .into_iter()
        .map(|(file_id, result)| LoadedRecord {
            keys: vec![CandidateKey {
                key: result.result.candidate_id.clone(),
                priority: KeyPriority::Direct,
            }],
            file_id,
            result,
        })
        .collect();

    Ok(merge_by_priority(records))
}

/// Reads every `*.json` record in `directory` concurrently. Output order follows the
/// sorted file names; malformed files are logged and skipped.
fn load_records(
    directory: &Path,
    rules: &ComparabilityRules,
    namespace: Option<&str>,
) -> Result<Vec<(String, SimilarityResultWithScore)>> {
    let files = list_record_files(directory)?;

    let loaded = files
        .par_iter()
        .filter_map(|(file_id, path)| match load_record(path, rules, namespace) {
            Ok(result) => Some((file_id.clone(), result)),
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %format!("{err:#}"),
                    "skipping similarity result file"
                );
                None
            }
        })
        .collect();

    Ok(loaded)
}

fn list_record_files(directory: &Path) -> Result<Vec<(String, PathBuf)>> {
    let entries = fs::read_dir(directory)
        .with_context(|| format!("failed to read {}", directory.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", directory.display()))?;
        let path = entry.path();
        let Some(file_id) = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_suffix(".json"))
        else {
            continue;
        };
        if file_id.is_empty() || !path.is_file() {
            continue;
        }
        files.push((file_id.to_string(), path));
    }

    files.sort();
    Ok(files)
}

fn load_record(
    path: &Path,
    rules: &ComparabilityRules,
    namespace: Option<&str>,
) -> Result<SimilarityResultWithScore> {
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let mut result: SimilarityResult = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    validate_record(&result).with_context(|| format!("invalid record {}", path.display()))?;

    if let Some(namespace) = namespace {
        for parameter in &mut result.parameters {
            if !parameter.parameter_id.starts_with(namespace) {
                parameter.parameter_id = format!("{namespace}{}", parameter.parameter_id);
            }
        }
    }

    Ok(score_result(result, rules))
}

fn score_result(result: SimilarityResult, rules: &ComparabilityRules) -> SimilarityResultWithScore {
    let total_score = rules.average_score(&result.parameters);
    let confidence = rules.confidence(&result.parameters);
    SimilarityResultWithScore {
        result,
        total_score,
        confidence,
    }
}

fn validate_record(result: &SimilarityResult) -> Result<(), RecordError> {
    let is_missing = |value: &Option<String>| {
        value
            .as_deref()
            .map(|value| value.trim().is_empty())
            .unwrap_or(true)
    };

    for parameter in &result.parameters {
        if parameter.score > MAX_SCORE {
            return Err(RecordError::ScoreOutOfRange {
                parameter_id: parameter.parameter_id.clone(),
                score: parameter.score,
            });
        }
        if parameter.score != 0
            && (is_missing(&parameter.target_value) || is_missing(&parameter.candidate_value))
        {
            return Err(RecordError::MissingValueScored {
                parameter_id: parameter.parameter_id.clone(),
                score: parameter.score,
            });
        }
    }

    Ok(())
}

/// A key claimed by several records goes to the highest [`KeyPriority`]; on a tie the
/// record whose file name sorts first keeps it.
fn merge_by_priority(records: Vec<LoadedRecord>) -> ResultMap {
    let mut owners: HashMap<&str, (KeyPriority, usize)> = HashMap::new();

    for (index, record) in records.iter().enumerate() {
        for candidate in &record.keys {
            let claim = (candidate.priority, index);
            match owners.get(candidate.key.as_str()).copied() {
                Some((existing, owner)) if existing >= candidate.priority => {
                    if owner != index {
                        warn!(
                            key = %candidate.key,
                            kept = %records[owner].file_id,
                            dropped = %record.file_id,
                            "candidate key collision"
                        );
                    }
                }
                Some((_, owner)) => {
                    warn!(
                        key = %candidate.key,
                        kept = %record.file_id,
                        dropped = %records[owner].file_id,
                        "candidate key collision"
                    );
                    owners.insert(candidate.key.as_str(), claim);
                }
                None => {
                    owners.insert(candidate.key.as_str(), claim);
                }
            }
        }
    }

    owners
        .into_iter()
        .map(|(key, (_, index))| (key.to_string(), records[index].result.clone()))
        .collect()
}
