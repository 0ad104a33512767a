use anyhow::{Context, Result};
use regex::RegexSet;
use serde::Serialize;

use crate::model::{Confidence, ParameterEvaluation};

/// Exact literals (after trim + lowercase) that mark a value as missing.
const MISSING_LITERALS: &[&str] = &[
    "-",
    "\u{2014}",
    "n/a",
    "na",
    "not specified",
    "not available",
];

/// Phrasings that point somewhere else instead of carrying a value.
const NON_COMPARABLE_PHRASES: &[&str] = &[
    r"refer\s+to\s+url",
    r"see\s+table",
    r"see\s+graph",
    r"refer\s+to\s+https",
    r"see\s+cap\s+chart",
    r"see\s+packaging\s+codes",
    r"see\s+.*\s+table",
    r"individual\s+part\s+number\s+specification",
    "数値比較不能",
    "比較不能",
    "直接比較不可",
    "表参照",
    "別表参照",
    "グラフ参照",
];

const DIFF_SCORE_MIN: u8 = 1;
const DIFF_SCORE_MAX: u8 = 84;
const NO_DIFF_LINE: &str = "- no differences (all comparable parameters match)";

pub struct ComparabilityRules {
    non_comparable: RegexSet,
}

impl ComparabilityRules {
    pub fn new() -> Result<Self> {
        let patterns = NON_COMPARABLE_PHRASES
            .iter()
            .map(|pattern| format!("(?i){pattern}"));
        Ok(Self {
            non_comparable: RegexSet::new(patterns)
                .context("failed to compile non-comparable phrase patterns")?,
        })
    }

    pub fn is_comparable_value(&self, value: Option<&str>) -> bool {
        let Some(value) = value else {
            return false;
        };
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return false;
        }

        let normalized = trimmed.to_lowercase();
        if MISSING_LITERALS.contains(&normalized.as_str()) {
            return false;
        }

        !self.non_comparable.is_match(trimmed)
    }

    /// Both sides must carry a real value; two missing values never count as a match.
    pub fn is_comparable_parameter(&self, parameter: &ParameterEvaluation) -> bool {
        self.is_comparable_value(parameter.target_value.as_deref())
            && self.is_comparable_value(parameter.candidate_value.as_deref())
    }

    pub fn comparable_parameters<'a>(
        &self,
        parameters: &'a [ParameterEvaluation],
    ) -> Vec<&'a ParameterEvaluation> {
        parameters
            .iter()
            .filter(|parameter| self.is_comparable_parameter(parameter))
            .collect()
    }

    /// Rounded mean over comparable parameters only. `None` when nothing is comparable,
    /// which is distinct from a genuine score of zero.
    pub fn average_score(&self, parameters: &[ParameterEvaluation]) -> Option<u32> {
        let comparable = self.comparable_parameters(parameters);
        if comparable.is_empty() {
            return None;
        }

        let sum: u32 = comparable
            .iter()
            .map(|parameter| u32::from(parameter.score))
            .sum();
        let mean = f64::from(sum) / comparable.len() as f64;
        Some(mean.round() as u32)
    }

    pub fn confidence(&self, parameters: &[ParameterEvaluation]) -> Confidence {
        let total_params = parameters.len();
        let comparable_params = self.comparable_parameters(parameters).len();
        let confidence_ratio_percent = if total_params > 0 {
            comparable_params as f64 / total_params as f64 * 100.0
        } else {
            0.0
        };

        Confidence {
            total_params,
            comparable_params,
            confidence_ratio_percent,
        }
    }

    pub fn with_comparable_flags(
        &self,
        parameters: &[ParameterEvaluation],
    ) -> Vec<FlaggedParameter> {
        parameters
            .iter()
            .map(|parameter| FlaggedParameter {
                parameter: parameter.clone(),
                is_comparable: self.is_comparable_parameter(parameter),
            })
            .collect()
    }

    /// Bullet list of partial mismatches. Exact matches (100), hard mismatches (0) and
    /// near-compatible values (85+) are left out.
    pub fn summarize_differences(&self, parameters: &[ParameterEvaluation]) -> String {
        let lines: Vec<String> = parameters
            .iter()
            .filter(|parameter| {
                self.is_comparable_parameter(parameter)
                    && (DIFF_SCORE_MIN..=DIFF_SCORE_MAX).contains(&parameter.score)
            })
            .map(format_difference_line)
            .collect();

        if lines.is_empty() {
            return NO_DIFF_LINE.to_string();
        }
        lines.join("\n")
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlaggedParameter {
    #[serde(flatten)]
    pub parameter: ParameterEvaluation,
    pub is_comparable: bool,
}

fn format_difference_line(parameter: &ParameterEvaluation) -> String {
    let non_blank = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned)
    };

    match (
        non_blank(&parameter.target_value),
        non_blank(&parameter.candidate_value),
    ) {
        (Some(target), Some(candidate)) => {
            format!("- {}: {target} -> {candidate}", parameter.description)
        }
        _ => format!("- {}: conditions differ", parameter.description),
    }
}
