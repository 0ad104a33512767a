use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::risk::{Compliance, LifecycleStatus, RiskLevel};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterEvaluation {
    pub parameter_id: String,
    pub description: String,
    pub target_value: Option<String>,
    pub candidate_value: Option<String>,
    pub score: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityResult {
    pub target_id: String,
    pub candidate_id: String,
    pub evaluated_at: DateTime<Utc>,
    pub summary: String,
    pub parameters: Vec<ParameterEvaluation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Confidence {
    pub total_params: usize,
    pub comparable_params: usize,
    pub confidence_ratio_percent: f64,
}

/// A stored similarity record augmented at read time; never written back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityResultWithScore {
    #[serde(flatten)]
    pub result: SimilarityResult,
    pub total_score: Option<u32>,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub compliance: Compliance,
    pub lifecycle_status: LifecycleStatus,
    pub substitution_count: Option<u32>,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BomRow {
    #[serde(default)]
    pub subsystem: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub part_number: String,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub product_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BomRisk {
    Low,
    Medium,
    High,
    LookupFailed,
}

impl From<RiskLevel> for BomRisk {
    fn from(level: RiskLevel) -> Self {
        match level {
            RiskLevel::Low => Self::Low,
            RiskLevel::Medium => Self::Medium,
            RiskLevel::High => Self::High,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubstituteAvailability {
    Available,
    #[serde(rename = "none")]
    Unavailable,
    LookupFailed,
}

impl SubstituteAvailability {
    pub fn from_count(count: Option<u32>) -> Self {
        match count {
            Some(0) => Self::Unavailable,
            Some(_) => Self::Available,
            None => Self::LookupFailed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BomRowWithRisk {
    #[serde(flatten)]
    pub row: BomRow,
    pub risk: BomRisk,
    pub substitutes: SubstituteAvailability,
    pub substitution_count: Option<u32>,
    pub compliance: Option<Compliance>,
    pub lifecycle_status: Option<LifecycleStatus>,
}

impl BomRowWithRisk {
    pub fn assessed(row: BomRow, assessment: RiskAssessment) -> Self {
        Self {
            row,
            risk: assessment.risk_level.into(),
            substitutes: SubstituteAvailability::from_count(assessment.substitution_count),
            substitution_count: assessment.substitution_count,
            compliance: Some(assessment.compliance),
            lifecycle_status: Some(assessment.lifecycle_status),
        }
    }

    pub fn lookup_failed(row: BomRow) -> Self {
        Self {
            row,
            risk: BomRisk::LookupFailed,
            substitutes: SubstituteAvailability::LookupFailed,
            substitution_count: None,
            compliance: None,
            lifecycle_status: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BomReport {
    pub generated_at: String,
    pub bom_path: String,
    pub row_count: usize,
    pub failed_count: usize,
    pub rows: Vec<BomRowWithRisk>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadManifest {
    pub manifest_version: u32,
    pub datasheet_id: String,
    pub source_url: String,
    pub final_url: String,
    pub path: String,
    pub byte_count: usize,
    pub sha256: String,
    pub downloaded_at: String,
}
