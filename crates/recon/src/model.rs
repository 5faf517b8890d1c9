use std::collections::BTreeMap;
use std::fmt;
use std::ops::AddAssign;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::VariantMode;
use crate::error::{ResolutionFailure, SnapshotKind};
use crate::vocabulary::Vocabulary;

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

/// Which extraction pipeline produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Pattern,
    Semantic,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern => write!(f, "pattern"),
            Self::Semantic => write!(f, "semantic"),
        }
    }
}

/// Attribute value as delivered by an extractor, classified once at ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Scalar(String),
    List(Vec<String>),
    /// Nested objects cannot serve as a scalar attribute.
    Unsupported,
}

impl AttrValue {
    /// Classify a JSON value. `null` is absent and yields `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        use serde_json::Value;
        match value {
            Value::Null => None,
            Value::Array(items) => {
                let mut out = Vec::new();
                flatten_scalars(items, &mut out);
                Some(Self::List(out))
            }
            Value::Object(_) => Some(Self::Unsupported),
            other => scalar_text(other).map(Self::Scalar),
        }
    }
}

fn scalar_text(value: &serde_json::Value) -> Option<String> {
    use serde_json::Value;
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn flatten_scalars(items: &[serde_json::Value], out: &mut Vec<String>) {
    for item in items {
        match item {
            serde_json::Value::Array(nested) => flatten_scalars(nested, out),
            other => {
                if let Some(text) = scalar_text(other) {
                    out.push(text);
                }
            }
        }
    }
}

/// One merged source row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRecord {
    pub index: u64,
    pub raw_name: String,
    pub sku: String,
    pub price: Decimal,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    pub source: Source,
    pub attributes: Vec<(String, AttrValue)>,
}

impl ProductRecord {
    /// Display name, falling back to the raw name. Empty when both are blank.
    pub fn effective_name(&self) -> &str {
        let display = self.display_name.trim();
        if display.is_empty() {
            self.raw_name.trim()
        } else {
            display
        }
    }
}

/// Normalized `(canonical key, value)` pairs in extraction order.
/// A key may repeat when a list value was exploded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    /// First value recorded under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<(String, String)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Catalog snapshot
// ---------------------------------------------------------------------------

/// A downstream display name bound to its opaque identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedId {
    pub name: String,
    pub id: String,
}

impl NamedId {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self { name: name.into(), id: id.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayKind {
    Radio,
    Select,
}

impl fmt::Display for DisplayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Radio => write!(f, "radio"),
            Self::Select => write!(f, "select"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VocabularyEntry {
    pub attribute_id: String,
    pub canonical_name: String,
    pub display_kind: DisplayKind,
    pub values: Vec<NamedId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateOrigin {
    Existing,
    Synthesized,
}

/// One attribute line of a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateAxis {
    /// Attribute name as the downstream export spells it, lower-cased.
    pub name: String,
    /// Canonical key (see [`crate::normalize::canonical_key`]).
    pub key: String,
    pub values: Vec<NamedId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateRecord {
    pub template_id: String,
    pub template_name: String,
    pub axes: Vec<TemplateAxis>,
    pub origin: TemplateOrigin,
}

impl TemplateRecord {
    pub fn axis(&self, key: &str) -> Option<&TemplateAxis> {
        self.axes.iter().find(|a| a.key == key)
    }

    pub fn has_axis(&self, key: &str) -> bool {
        self.axis(key).is_some()
    }
}

/// A variant already materialized downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExistingVariant {
    pub variant_id: String,
    pub template_name: String,
    /// Only the axes the downstream system actually varies on.
    pub signature: Vec<(String, String)>,
}

/// Category lookups for new template rows.
#[derive(Debug, Clone, Default)]
pub struct CategoryIndex {
    /// Category display name → external id.
    pub ids_by_name: BTreeMap<String, String>,
    /// Product (template) name → category display name.
    pub assignments: BTreeMap<String, String>,
}

impl CategoryIndex {
    /// Assigned category id, else the `Saleable` category, else `default_id`.
    pub fn category_id(&self, template_name: &str, default_id: &str) -> String {
        self.assignments
            .get(template_name)
            .and_then(|category| self.ids_by_name.get(category))
            .or_else(|| self.ids_by_name.get("Saleable"))
            .cloned()
            .unwrap_or_else(|| default_id.to_string())
    }
}

/// A malformed export row that was skipped during loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    pub snapshot: SnapshotKind,
    /// 1-based data line (header excluded) or record position.
    pub line: usize,
    pub reason: String,
}

/// Immutable downstream state read once at the start of a run.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub vocabulary: Vocabulary,
    pub templates: Vec<TemplateRecord>,
    pub variants: Vec<ExistingVariant>,
    pub categories: CategoryIndex,
}

/// Everything the engine needs, pre-loaded.
#[derive(Debug, Clone, Default)]
pub struct ReconInput {
    pub products: Vec<ProductRecord>,
    pub snapshot: CatalogSnapshot,
    pub skipped_rows: Vec<SkippedRow>,
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Accepted product: one variant import row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<String>,
    pub template_name: String,
    pub value_ids: Vec<String>,
    pub sku: String,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconciliationOutcome {
    VariantUpdate(VariantRecord),
    TemplateMiss {
        product: ProductRecord,
    },
    AttributeMiss {
        product: ProductRecord,
        matched_template: String,
        failure: ResolutionFailure,
    },
}

impl ReconciliationOutcome {
    pub fn is_miss(&self) -> bool {
        !matches!(self, Self::VariantUpdate(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissReason {
    NoTemplateMatch,
    NoAttributeMatch,
}

impl fmt::Display for MissReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoTemplateMatch => write!(f, "no_template_match"),
            Self::NoAttributeMatch => write!(f, "no_attribute_match"),
        }
    }
}

/// One line of the miss report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissRecord {
    pub sku: String,
    pub product_name: String,
    pub source: Source,
    pub reason: MissReason,
}

// ---------------------------------------------------------------------------
// Catalog updates
// ---------------------------------------------------------------------------

/// A vocabulary value the downstream system does not know yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewVocabularyValue {
    pub attribute_id: String,
    pub attribute_name: String,
    pub display_kind: DisplayKind,
    /// True when the attribute itself is new in this run.
    pub attribute_is_new: bool,
    pub value: String,
    pub value_id: String,
}

/// An attribute line to add to an existing downstream template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateAttributeUpdate {
    pub template_id: String,
    pub template_name: String,
    pub attribute_id: String,
    pub value_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeLine {
    pub attribute_id: String,
    pub value_ids: Vec<String>,
}

/// A template synthesized in this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTemplate {
    pub template_id: String,
    pub name: String,
    pub category_id: String,
    pub product_type: String,
    pub list_price: Decimal,
    pub lines: Vec<AttributeLine>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogUpdates {
    pub new_values: Vec<NewVocabularyValue>,
    pub template_updates: Vec<TemplateAttributeUpdate>,
    pub new_templates: Vec<NewTemplate>,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconSummary {
    pub total_products: usize,
    pub variants_generated: usize,
    pub template_matches: usize,
    pub template_misses: usize,
    pub attribute_misses: usize,
    /// Subset of `attribute_misses` caused by variant identity.
    pub variant_identity_misses: usize,
    pub variants_reused: usize,
    pub new_templates: usize,
    pub updated_templates: usize,
    pub new_vocabulary_values: usize,
}

impl AddAssign for ReconSummary {
    fn add_assign(&mut self, other: Self) {
        self.total_products += other.total_products;
        self.variants_generated += other.variants_generated;
        self.template_matches += other.template_matches;
        self.template_misses += other.template_misses;
        self.attribute_misses += other.attribute_misses;
        self.variant_identity_misses += other.variant_identity_misses;
        self.variants_reused += other.variants_reused;
        self.new_templates += other.new_templates;
        self.updated_templates += other.updated_templates;
        self.new_vocabulary_values += other.new_vocabulary_values;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
    pub variant_mode: VariantMode,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    pub catalog: CatalogUpdates,
    pub outcomes: Vec<ReconciliationOutcome>,
    pub skipped_rows: Vec<SkippedRow>,
}

impl ReconResult {
    pub fn variant_records(&self) -> impl Iterator<Item = &VariantRecord> {
        self.outcomes.iter().filter_map(|o| match o {
            ReconciliationOutcome::VariantUpdate(v) => Some(v),
            _ => None,
        })
    }

    pub fn miss_records(&self) -> Vec<MissRecord> {
        self.outcomes
            .iter()
            .filter_map(|o| {
                let (product, reason) = match o {
                    ReconciliationOutcome::VariantUpdate(_) => return None,
                    ReconciliationOutcome::TemplateMiss { product } => {
                        (product, MissReason::NoTemplateMatch)
                    }
                    ReconciliationOutcome::AttributeMiss { product, failure, .. } => {
                        (product, failure.reason())
                    }
                };
                Some(MissRecord {
                    sku: product.sku.clone(),
                    product_name: product.effective_name().to_string(),
                    source: product.source,
                    reason,
                })
            })
            .collect()
    }
}
