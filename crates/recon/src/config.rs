use serde::{Deserialize, Serialize};

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconConfig {
    pub name: String,
    pub inputs: InputsConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub variants: VariantsConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Input file locations. Relative paths are resolved by the caller
/// against the directory holding the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputsConfig {
    pub pattern_records: String,
    #[serde(default)]
    pub semantic_records: Option<String>,
    pub vocabulary: String,
    pub templates: String,
    #[serde(default)]
    pub variants: Option<String>,
    #[serde(default)]
    pub categories: Option<String>,
    #[serde(default)]
    pub category_assignments: Option<String>,
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchingConfig {
    #[serde(default = "default_template_threshold")]
    pub template_threshold: f64,
    #[serde(default = "default_value_threshold")]
    pub value_threshold: f64,
}

fn default_template_threshold() -> f64 {
    0.7
}

fn default_value_threshold() -> f64 {
    0.8
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            template_threshold: default_template_threshold(),
            value_threshold: default_value_threshold(),
        }
    }
}

// ---------------------------------------------------------------------------
// Variants
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariantsConfig {
    #[serde(default)]
    pub mode: VariantMode,
}

/// How accepted products are emitted against existing variants.
///
/// `Update` requires an existing variant whenever the product matched an
/// existing template. `Insert` always emits fresh rows without an id.
/// `Upsert` reuses an id when one is found and inserts otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantMode {
    Update,
    Insert,
    #[default]
    Upsert,
}

impl std::fmt::Display for VariantMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Update => write!(f, "update"),
            Self::Insert => write!(f, "insert"),
            Self::Upsert => write!(f, "upsert"),
        }
    }
}

// ---------------------------------------------------------------------------
// Templates + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplatesConfig {
    /// Synthesize a template for product groups nothing matches.
    #[serde(default = "default_true")]
    pub create_missing: bool,
    /// Fold flavorless hardware groups into a single `variant_type` axis.
    #[serde(default = "default_true")]
    pub hardware_fold: bool,
    #[serde(default = "default_category")]
    pub default_category: String,
    #[serde(default = "default_product_type")]
    pub product_type: String,
}

fn default_true() -> bool {
    true
}

fn default_category() -> String {
    "product.product_category_1".into()
}

fn default_product_type() -> String {
    "consu".into()
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            create_missing: true,
            hardware_fold: true,
            default_category: default_category(),
            product_type: default_product_type(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Directory for the output files, relative to the config file.
    #[serde(default)]
    pub dir: Option<String>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.name.trim().is_empty() {
            return Err(ReconError::ConfigValidation("name must not be empty".into()));
        }

        for (field, threshold) in [
            ("matching.template_threshold", self.matching.template_threshold),
            ("matching.value_threshold", self.matching.value_threshold),
        ] {
            if !(threshold > 0.0 && threshold <= 1.0) {
                return Err(ReconError::ConfigValidation(format!(
                    "{field} must be in (0, 1], got {threshold}"
                )));
            }
        }

        let required = [
            ("inputs.pattern_records", &self.inputs.pattern_records),
            ("inputs.vocabulary", &self.inputs.vocabulary),
            ("inputs.templates", &self.inputs.templates),
        ];
        for (field, path) in required {
            if path.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!("{field} must not be empty")));
            }
        }

        if self.templates.default_category.trim().is_empty() {
            return Err(ReconError::ConfigValidation(
                "templates.default_category must not be empty".into(),
            ));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
