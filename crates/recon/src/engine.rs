use crate::aggregate::group_products;
use crate::config::{ReconConfig, VariantMode};
use crate::error::{ReconError, ResolutionFailure};
use crate::evidence::compute_summary;
use crate::identity::find_existing_variant;
use crate::matcher::{match_catalog, TemplateRef};
use crate::merge::merge_records;
use crate::model::{
    Attributes, CatalogSnapshot, CatalogUpdates, ProductRecord, ReconInput, ReconMeta, ReconResult,
    ReconciliationOutcome, VariantRecord,
};
use crate::normalize::normalize_attributes;
use crate::similarity::FuzzyMatcher;
use crate::snapshot::{
    load_categories, load_category_assignments, load_templates, load_variants, load_vocabulary,
};
use crate::templates::{plan_templates, TemplatePlan};
use crate::values::resolve_values;

/// Raw contents of every input, as read by the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputSources<'a> {
    pub pattern_records: &'a str,
    pub semantic_records: Option<&'a str>,
    pub vocabulary: &'a str,
    pub templates: &'a str,
    pub variants: Option<&'a str>,
    pub categories: Option<&'a str>,
    pub category_assignments: Option<&'a str>,
}

/// Parse every input into a [`ReconInput`]. Unreadable documents and missing
/// columns are fatal; malformed rows are collected in `skipped_rows`.
pub fn load_input(sources: &InputSources<'_>) -> Result<ReconInput, ReconError> {
    let merged = merge_records(sources.pattern_records, sources.semantic_records)?;
    let mut skipped_rows = merged.skipped;

    let vocabulary = load_vocabulary(sources.vocabulary)?;
    skipped_rows.extend(vocabulary.skipped);

    let templates = load_templates(sources.templates)?;
    skipped_rows.extend(templates.skipped);

    let variants = match sources.variants {
        Some(csv) => {
            let loaded = load_variants(csv)?;
            skipped_rows.extend(loaded.skipped);
            loaded.value
        }
        None => Vec::new(),
    };

    let mut snapshot = CatalogSnapshot {
        vocabulary: vocabulary.value,
        templates: templates.value,
        variants,
        ..Default::default()
    };
    if let Some(csv) = sources.categories {
        skipped_rows.extend(load_categories(csv, &mut snapshot.categories)?);
    }
    if let Some(json) = sources.category_assignments {
        skipped_rows.extend(load_category_assignments(json, &mut snapshot.categories)?);
    }

    Ok(ReconInput {
        products: merged.products,
        snapshot,
        skipped_rows,
    })
}

/// Run reconciliation per config. Returns outcomes, catalog updates and summary.
pub fn run(config: &ReconConfig, input: &ReconInput) -> Result<ReconResult, ReconError> {
    config.validate()?;

    let template_matcher = FuzzyMatcher::new(config.matching.template_threshold);
    let value_matcher = FuzzyMatcher::new(config.matching.value_threshold);
    let snapshot = &input.snapshot;

    // A. Prepare
    let mut attributes: Vec<Attributes> = input
        .products
        .iter()
        .map(|p| normalize_attributes(&p.attributes))
        .collect();
    let groups = group_products(&input.products, &attributes);
    tracing::info!(products = input.products.len(), groups = groups.len(), "prepared products");

    // B. Plan templates + vocabulary
    let plan = plan_templates(
        groups,
        &input.products,
        &mut attributes,
        snapshot,
        &template_matcher,
        &config.templates,
    );

    // C. Resolve products
    let resolver = Resolver {
        snapshot,
        plan: &plan,
        template_matcher,
        value_matcher,
        mode: config.variants.mode,
    };
    let outcomes: Vec<ReconciliationOutcome> = input
        .products
        .iter()
        .zip(&attributes)
        .map(|(product, attrs)| resolver.resolve(product, attrs))
        .collect();

    let TemplatePlan {
        new_templates,
        template_updates,
        vocabulary,
        ..
    } = plan;
    let catalog = CatalogUpdates {
        new_values: vocabulary.into_new_values(),
        template_updates,
        new_templates,
    };
    let summary = compute_summary(&outcomes, &catalog);
    tracing::info!(
        variants = summary.variants_generated,
        template_misses = summary.template_misses,
        attribute_misses = summary.attribute_misses,
        "resolved products"
    );

    Ok(ReconResult {
        meta: ReconMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            variant_mode: config.variants.mode,
        },
        summary,
        catalog,
        outcomes,
        skipped_rows: input.skipped_rows.clone(),
    })
}

struct Resolver<'a> {
    snapshot: &'a CatalogSnapshot,
    plan: &'a TemplatePlan,
    template_matcher: FuzzyMatcher,
    value_matcher: FuzzyMatcher,
    mode: VariantMode,
}

impl Resolver<'_> {
    fn resolve(&self, product: &ProductRecord, attrs: &Attributes) -> ReconciliationOutcome {
        let found = match_catalog(
            product.effective_name(),
            &self.snapshot.templates,
            &self.plan.synthesized,
            &self.template_matcher,
        );
        let (template, existing) = match found {
            Some(TemplateRef::Existing(i)) => (&self.snapshot.templates[i], true),
            Some(TemplateRef::Synthesized(j)) => (&self.plan.synthesized[j], false),
            None => {
                tracing::debug!(
                    index = product.index,
                    sku = %product.sku,
                    failure = %ResolutionFailure::TemplateMatch,
                    "template miss"
                );
                return ReconciliationOutcome::TemplateMiss { product: product.clone() };
            }
        };

        let miss = |failure: ResolutionFailure| {
            tracing::debug!(
                index = product.index,
                sku = %product.sku,
                template = %template.template_name,
                %failure,
                "attribute miss"
            );
            ReconciliationOutcome::AttributeMiss {
                product: product.clone(),
                matched_template: template.template_name.clone(),
                failure,
            }
        };

        let value_ids = match resolve_values(attrs, template, &self.value_matcher) {
            Ok(ids) => ids,
            Err(failure) => return miss(failure),
        };

        // Templates created in this run have no variants downstream yet.
        let variant_id = if existing {
            let lookup =
                || find_existing_variant(attrs, &template.template_name, &self.snapshot.variants);
            match self.mode {
                VariantMode::Insert => None,
                VariantMode::Upsert => lookup().map(|v| v.variant_id.clone()),
                VariantMode::Update => match lookup() {
                    Some(v) => Some(v.variant_id.clone()),
                    None => return miss(ResolutionFailure::VariantIdentity),
                },
            }
        } else {
            None
        };

        ReconciliationOutcome::VariantUpdate(VariantRecord {
            variant_id,
            template_name: template.template_name.clone(),
            value_ids,
            sku: product.sku.clone(),
            price: product.price,
        })
    }
}
