use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ComplianceStatus {
    Compliant,
    NonCompliant,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Compliance {
    pub rohs: ComplianceStatus,
    pub reach: ComplianceStatus,
}

impl Compliance {
    pub fn new(rohs: ComplianceStatus, reach: ComplianceStatus) -> Self {
        Self { rohs, reach }
    }

    /// Normalizes the free-text classification strings a catalog reports.
    pub fn from_classifications(rohs_status: Option<&str>, reach_status: Option<&str>) -> Self {
        let rohs_status = rohs_status.unwrap_or_default();
        let reach_status = reach_status.unwrap_or_default();

        // "Non-Compliant" also contains "Compliant", so it has to be checked first.
        let rohs = if rohs_status.contains("Non-Compliant") || rohs_status.contains("NonCompliant")
        {
            ComplianceStatus::NonCompliant
        } else if rohs_status.contains("Compliant") {
            ComplianceStatus::Compliant
        } else {
            ComplianceStatus::Unknown
        };

        let reach = if reach_status.contains("Unaffected") || reach_status.contains("Compliant") {
            ComplianceStatus::Compliant
        } else if reach_status.contains("Affected") {
            ComplianceStatus::NonCompliant
        } else {
            ComplianceStatus::Unknown
        };

        Self::new(rohs, reach)
    }

    fn any(&self, status: ComplianceStatus) -> bool {
        self.rohs == status || self.reach == status
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LifecycleStatus {
    Active,
    #[serde(rename = "NRND")]
    Nrnd,
    Obsolete,
    #[serde(rename = "EOL")]
    Eol,
    Unknown,
}

impl LifecycleStatus {
    pub fn normalize(status: Option<&str>) -> Self {
        let Some(status) = status else {
            return Self::Unknown;
        };
        let lower = status.trim().to_lowercase();

        if lower == "active" {
            return Self::Active;
        }
        if lower.contains("not for new designs") || lower.contains("nrnd") {
            return Self::Nrnd;
        }
        if lower.contains("obsolete") || lower.contains("discontinued") {
            return Self::Obsolete;
        }
        if lower.contains("last time buy") || lower.contains("eol") || lower.contains("end of life")
        {
            return Self::Eol;
        }
        Self::Unknown
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// One step up; `High` is the ceiling.
    pub fn escalate(self) -> Self {
        match self {
            Self::Low => Self::Medium,
            Self::Medium | Self::High => Self::High,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

const HIGH_RISK_LIFECYCLE: &[&str] = &["obsolete", "discontinued"];
const MEDIUM_RISK_LIFECYCLE: &[&str] = &["last time buy", "not for new designs"];

/// Derives a risk tier from compliance, the raw lifecycle string and the number of known
/// substitutes. Only an explicit zero escalates; a count that was never retrieved leaves
/// the base tier untouched.
pub fn classify_risk(
    compliance: &Compliance,
    lifecycle_status: Option<&str>,
    substitution_count: Option<u32>,
) -> RiskLevel {
    let base = base_risk(compliance, lifecycle_status);
    match substitution_count {
        Some(0) => base.escalate(),
        _ => base,
    }
}

fn base_risk(compliance: &Compliance, lifecycle_status: Option<&str>) -> RiskLevel {
    let lifecycle = lifecycle_status
        .map(|status| status.trim().to_lowercase())
        .filter(|status| !status.is_empty());
    let lifecycle_mentions = |keywords: &[&str]| {
        lifecycle
            .as_deref()
            .is_some_and(|status| keywords.iter().any(|keyword| status.contains(keyword)))
    };

    if compliance.any(ComplianceStatus::NonCompliant) || lifecycle_mentions(HIGH_RISK_LIFECYCLE) {
        return RiskLevel::High;
    }
    if compliance.any(ComplianceStatus::Unknown) || lifecycle_mentions(MEDIUM_RISK_LIFECYCLE) {
        return RiskLevel::Medium;
    }

    let lifecycle_is_active = lifecycle.as_deref().is_none_or(|status| status == "active");
    if compliance.rohs == ComplianceStatus::Compliant
        && compliance.reach == ComplianceStatus::Compliant
        && lifecycle_is_active
    {
        return RiskLevel::Low;
    }

    RiskLevel::Medium
}

#[cfg(test)]
mod tests {
    use super::*;
    use ComplianceStatus::{Compliant, NonCompliant, Unknown};

    fn compliance(rohs: ComplianceStatus, reach: ComplianceStatus) -> Compliance {
        Compliance::new(rohs, reach)
    }

    #[test]
    fn non_compliance_is_high() {
        assert_eq!(
            classify_risk(&compliance(NonCompliant, Compliant), None, None),
            RiskLevel::High
        );
        assert_eq!(
            classify_risk(&compliance(Compliant, NonCompliant), None, None),
            RiskLevel::High
        );
    }

    #[test]
    fn obsolete_or_discontinued_is_high() {
        let ok = compliance(Compliant, Compliant);
        assert_eq!(classify_risk(&ok, Some("Obsolete"), None), RiskLevel::High);
        assert_eq!(
            classify_risk(&ok, Some("Discontinued at Digi-Key"), None),
            RiskLevel::High
        );
    }

    #[test]
    fn unknown_compliance_or_winding_down_is_medium() {
        let ok = compliance(Compliant, Compliant);
        assert_eq!(
            classify_risk(&compliance(Unknown, Compliant), None, None),
            RiskLevel::Medium
        );
        assert_eq!(
            classify_risk(&compliance(Compliant, Unknown), None, None),
            RiskLevel::Medium
        );
        assert_eq!(
            classify_risk(&ok, Some("Last Time Buy"), None),
            RiskLevel::Medium
        );
        assert_eq!(
            classify_risk(&ok, Some("Not For New Designs"), None),
            RiskLevel::Medium
        );
    }

    #[test]
    fn compliant_and_active_or_absent_is_low() {
        let ok = compliance(Compliant, Compliant);
        assert_eq!(classify_risk(&ok, Some("Active"), None), RiskLevel::Low);
        assert_eq!(classify_risk(&ok, None, None), RiskLevel::Low);
    }

    #[test]
    fn blank_lifecycle_counts_as_absent() {
        let ok = compliance(Compliant, Compliant);
        assert_eq!(classify_risk(&ok, Some(""), None), RiskLevel::Low);
        assert_eq!(classify_risk(&ok, Some("   "), None), RiskLevel::Low);
        assert_eq!(classify_risk(&ok, Some(" "), Some(0)), RiskLevel::Medium);
    }

    #[test]
    fn unexpected_lifecycle_defaults_to_medium() {
        let ok = compliance(Compliant, Compliant);
        let preliminary = classify_risk(&ok, Some("Preliminary"), None);
        assert_eq!(preliminary, RiskLevel::Medium);
    }

    #[test]
    fn zero_substitutes_escalates_one_step() {
        let ok = compliance(Compliant, Compliant);
        let active = classify_risk(&ok, Some("Active"), Some(0));
        assert_eq!(active, RiskLevel::Medium);
        assert_eq!(
            classify_risk(&compliance(Unknown, Compliant), None, Some(0)),
            RiskLevel::High
        );
    }

    #[test]
    fn escalation_stops_at_high() {
        assert_eq!(
            classify_risk(&compliance(NonCompliant, Compliant), None, Some(0)),
            RiskLevel::High
        );
        let ok = compliance(Compliant, Compliant);
        let obsolete = classify_risk(&ok, Some("Obsolete"), Some(0));
        assert_eq!(obsolete, RiskLevel::High);
    }

    #[test]
    fn known_substitutes_or_missing_count_keep_base_tier() {
        let ok = compliance(Compliant, Compliant);
        assert_eq!(classify_risk(&ok, Some("Active"), Some(1)), RiskLevel::Low);
        assert_eq!(classify_risk(&ok, Some("Active"), Some(5)), RiskLevel::Low);
        assert_eq!(classify_risk(&ok, Some("Active"), None), RiskLevel::Low);
        let unknown = compliance(Unknown, Compliant);
        assert_eq!(classify_risk(&unknown, None, Some(1)), RiskLevel::Medium);
        assert_eq!(classify_risk(&unknown, None, None), RiskLevel::Medium);
    }

    #[test]
    fn compliance_strings_normalize() {
        let normalized =
            Compliance::from_classifications(Some("ROHS3 Compliant"), Some("REACH Unaffected"));
        assert_eq!(normalized, compliance(Compliant, Compliant));

        let normalized =
            Compliance::from_classifications(Some("Non-Compliant"), Some("REACH Affected"));
        assert_eq!(normalized, compliance(NonCompliant, NonCompliant));

        let normalized = Compliance::from_classifications(None, Some("Vendor undefined"));
        assert_eq!(normalized, compliance(Unknown, Unknown));
    }

    #[test]
    fn lifecycle_strings_normalize() {
        assert_eq!(
            LifecycleStatus::normalize(Some("Active")),
            LifecycleStatus::Active
        );
        assert_eq!(
            LifecycleStatus::normalize(Some("Not For New Designs")),
            LifecycleStatus::Nrnd
        );
        assert_eq!(
            LifecycleStatus::normalize(Some("Obsolete")),
            LifecycleStatus::Obsolete
        );
        assert_eq!(
            LifecycleStatus::normalize(Some("Discontinued at Digi-Key")),
            LifecycleStatus::Obsolete
        );
        assert_eq!(
            LifecycleStatus::normalize(Some("Last Time Buy")),
            LifecycleStatus::Eol
        );
        assert_eq!(
            LifecycleStatus::normalize(Some("Preliminary")),
            LifecycleStatus::Unknown
        );
        assert_eq!(LifecycleStatus::normalize(None), LifecycleStatus::Unknown);
    }
}
