use std::collections::BTreeSet;

use crate::error::ResolutionFailure;
use crate::model::{CatalogUpdates, ReconSummary, ReconciliationOutcome};

/// Compute summary statistics from outcomes and planned catalog updates.
pub fn compute_summary(outcomes: &[ReconciliationOutcome], catalog: &CatalogUpdates) -> ReconSummary {
    let mut summary = ReconSummary {
        total_products: outcomes.len(),
        new_templates: catalog.new_templates.len(),
        new_vocabulary_values: catalog.new_values.len(),
        updated_templates: catalog
            .template_updates
            .iter()
            .map(|u| u.template_id.as_str())
            .collect::<BTreeSet<_>>()
            .len(),
        ..Default::default()
    };

    for outcome in outcomes {
        match outcome {
            ReconciliationOutcome::VariantUpdate(record) => {
                summary.template_matches += 1;
                summary.variants_generated += 1;
                if record.variant_id.is_some() {
                    summary.variants_reused += 1;
                }
            }
            ReconciliationOutcome::TemplateMiss { .. } => summary.template_misses += 1,
            ReconciliationOutcome::AttributeMiss { failure, .. } => {
                summary.template_matches += 1;
                summary.attribute_misses += 1;
                if *failure == ResolutionFailure::VariantIdentity {
                    summary.variant_identity_misses += 1;
                }
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProductRecord, Source, TemplateAttributeUpdate, VariantRecord};
    use rust_decimal::Decimal;

    fn product() -> ProductRecord {
        ProductRecord {
            index: 0,
            raw_name: "x".into(),
            sku: "S".into(),
            price: Decimal::ZERO,
            display_name: "x".into(),
            brand: None,
            source: Source::Semantic,
            attributes: vec![],
        }
    }

    fn update(variant_id: Option<&str>) -> ReconciliationOutcome {
        ReconciliationOutcome::VariantUpdate(VariantRecord {
            variant_id: variant_id.map(String::from),
            template_name: "T".into(),
            value_ids: vec![],
            sku: "S".into(),
            price: Decimal::ZERO,
        })
    }

    fn template_update(id: &str, attr: &str) -> TemplateAttributeUpdate {
        TemplateAttributeUpdate {
            template_id: id.into(),
            template_name: id.into(),
            attribute_id: attr.into(),
            value_ids: vec![],
        }
    }

    #[test]
    fn summary_counts() {
        let outcomes = vec![
            update(Some("v1")),
            update(None),
            ReconciliationOutcome::TemplateMiss { product: product() },
            ReconciliationOutcome::AttributeMiss {
                product: product(),
                matched_template: "T".into(),
                failure: ResolutionFailure::AttributeCombination,
            },
            ReconciliationOutcome::AttributeMiss {
                product: product(),
                matched_template: "T".into(),
                failure: ResolutionFailure::VariantIdentity,
            },
        ];
        let catalog = CatalogUpdates {
            template_updates: vec![template_update("t1", "a1"), template_update("t1", "a2")],
            ..Default::default()
        };
        let s = compute_summary(&outcomes, &catalog);
        assert_eq!(s.total_products, 5);
        assert_eq!(s.variants_generated, 2);
        assert_eq!(s.variants_reused, 1);
        assert_eq!(s.template_matches, 4);
        assert_eq!(s.template_misses, 1);
        assert_eq!(s.attribute_misses, 2);
        assert_eq!(s.variant_identity_misses, 1);
        assert_eq!(s.updated_templates, 1);
        assert_eq!(s.total_products, s.variants_generated + s.template_misses + s.attribute_misses);
    }
}
