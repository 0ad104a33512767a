use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::catalog::{Catalog, DigiKeyCatalog};
use crate::cli::RiskArgs;
use crate::model::RiskAssessment;
use crate::risk::{LifecycleStatus, classify_risk};
use crate::util::print_json;

const RISK_SEARCH_LIMIT: u32 = 1;

pub fn run(args: RiskArgs) -> Result<()> {
    let part_number = args.part_number.trim();
    if part_number.is_empty() {
        bail!("part number must not be empty");
    }

    let catalog =
        DigiKeyCatalog::new(&args.credentials.client_id, &args.credentials.client_secret)?;

    match assess_part(&catalog, part_number)? {
        Some(assessment) => {
            info!(
                part_number,
                risk_level = assessment.risk_level.as_str(),
                substitution_count = ?assessment.substitution_count,
                "risk assessed"
            );
            print_json(&assessment)
        }
        None => bail!("no catalog product found for {part_number}"),
    }
}

/// Looks the part up in the catalog and classifies it. `Ok(None)` means the catalog
/// returned no product; a failed substitute lookup degrades to an unknown count.
pub(crate) fn assess_part(
    catalog: &impl Catalog,
    part_number: &str,
) -> Result<Option<RiskAssessment>> {
    let products = catalog.keyword_search(part_number, RISK_SEARCH_LIMIT)?;
    let Some(product) = products.into_iter().next() else {
        return Ok(None);
    };

    let substitution_count = match product.substitution_lookup_number() {
        Some(lookup_number) => match catalog.substitution_count(lookup_number) {
            Ok(count) => Some(count),
            Err(err) => {
                warn!(
                    part_number,
                    lookup_number,
                    error = %format!("{err:#}"),
                    "substitute lookup failed"
                );
                None
            }
        },
        None => None,
    };

    let compliance = product.compliance();
    let lifecycle = product.lifecycle_status.as_deref();

    Ok(Some(RiskAssessment {
        compliance,
        lifecycle_status: LifecycleStatus::normalize(lifecycle),
        substitution_count,
        risk_level: classify_risk(&compliance, lifecycle, substitution_count),
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use anyhow::{Result, anyhow};

    use super::*;
    use crate::catalog::CatalogProduct;
    use crate::risk::{ComplianceStatus, RiskLevel};

    #[derive(Default)]
    pub(crate) struct FakeCatalog {
        pub products: HashMap<String, CatalogProduct>,
        pub substitutes: HashMap<String, u32>,
        pub failing_searches: Vec<String>,
        pub searches: RefCell<Vec<String>>,
    }

    impl FakeCatalog {
        pub(crate) fn with_product(mut self, keywords: &str, product: CatalogProduct) -> Self {
            self.products.insert(keywords.to_string(), product);
            self
        }

        pub(crate) fn with_substitutes(mut self, lookup_number: &str, count: u32) -> Self {
            self.substitutes.insert(lookup_number.to_string(), count);
            self
        }
    }

    impl Catalog for FakeCatalog {
        fn keyword_search(&self, keywords: &str, _limit: u32) -> Result<Vec<CatalogProduct>> {
            self.searches.borrow_mut().push(keywords.to_string());
            if self.failing_searches.iter().any(|value| value == keywords) {
                return Err(anyhow!("search unavailable for {keywords}"));
            }
            Ok(self.products.get(keywords).cloned().into_iter().collect())
        }

        fn substitution_count(&self, product_number: &str) -> Result<u32> {
            self.substitutes
                .get(product_number)
                .copied()
                .ok_or_else(|| anyhow!("substitutes unavailable for {product_number}"))
        }
    }

    fn compliant(lifecycle: &str) -> CatalogProduct {
        product(lifecycle, "ROHS3 Compliant", "REACH Unaffected")
    }

    pub(crate) fn product(lifecycle: &str, rohs: &str, reach: &str) -> CatalogProduct {
        CatalogProduct {
            manufacturer_part_number: "LM358M".to_string(),
            manufacturer_name: Some("Texas Instruments".to_string()),
            distributor_part_number: Some("LM358M-ND".to_string()),
            rohs_status: Some(rohs.to_string()),
            reach_status: Some(reach.to_string()),
            lifecycle_status: Some(lifecycle.to_string()),
            ..CatalogProduct::default()
        }
    }

    #[test]
    fn active_compliant_part_with_substitutes_is_low() {
        let catalog = FakeCatalog::default()
            .with_product("LM358M", compliant("Active"))
            .with_substitutes("LM358M-ND", 4);

        let assessment = assess_part(&catalog, "LM358M")
            .expect("assessment should succeed")
            .expect("product should be found");

        assert_eq!(assessment.risk_level, RiskLevel::Low);
        assert_eq!(assessment.lifecycle_status, LifecycleStatus::Active);
        assert_eq!(assessment.substitution_count, Some(4));
        assert_eq!(assessment.compliance.rohs, ComplianceStatus::Compliant);
    }

    #[test]
    fn zero_substitutes_escalate_one_tier() {
        let catalog = FakeCatalog::default()
            .with_product("LM358M", compliant("Not For New Designs"))
            .with_substitutes("LM358M-ND", 0);

        let assessment = assess_part(&catalog, "LM358M")
            .expect("assessment should succeed")
            .expect("product should be found");

        assert_eq!(assessment.lifecycle_status, LifecycleStatus::Nrnd);
        assert_eq!(assessment.risk_level, RiskLevel::High);
    }

    #[test]
    fn failed_substitute_lookup_keeps_base_tier() {
        let catalog = FakeCatalog::default().with_product("LM358M", compliant("Active"));

        let assessment = assess_part(&catalog, "LM358M")
            .expect("assessment should succeed")
            .expect("product should be found");

        assert_eq!(assessment.substitution_count, None);
        assert_eq!(assessment.risk_level, RiskLevel::Low);
    }

    #[test]
    fn substitute_lookup_falls_back_to_manufacturer_number() {
        let mut listed = compliant("Active");
        listed.distributor_part_number = None;
        let catalog = FakeCatalog::default()
            .with_product("LM358M", listed)
            .with_substitutes("LM358M", 2);

        let assessment = assess_part(&catalog, "LM358M")
            .expect("assessment should succeed")
            .expect("product should be found");
        assert_eq!(assessment.substitution_count, Some(2));
    }

    #[test]
    fn unknown_part_yields_none() {
        let catalog = FakeCatalog::default();
        let assessment = assess_part(&catalog, "NOPE").expect("search succeeds");
        assert_eq!(assessment, None);
    }

    #[test]
    fn search_failure_propagates() {
        let catalog = FakeCatalog {
            failing_searches: vec!["LM358M".to_string()],
            ..FakeCatalog::default()
        };
        assert!(assess_part(&catalog, "LM358M").is_err());
    }

    #[test]
    fn assessment_serializes_with_camel_case_fields() {
        let catalog = FakeCatalog::default()
            .with_product("LM358M", compliant("Obsolete"))
            .with_substitutes("LM358M-ND", 1);

        let assessment = assess_part(&catalog, "LM358M")
            .expect("assessment should succeed")
            .expect("product should be found");
        let value = serde_json::to_value(&assessment).expect("serialize");

        assert_eq!(value["riskLevel"], "High");
        assert_eq!(value["lifecycleStatus"], "Obsolete");
        assert_eq!(value["substitutionCount"], 1);
        assert_eq!(value["compliance"]["rohs"], "Compliant");
    }
}
