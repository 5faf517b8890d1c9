use std::fmt;

use serde::Serialize;

use crate::model::MissReason;

/// Which downstream export a snapshot row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKind {
    PatternRecords,
    SemanticRecords,
    Vocabulary,
    Templates,
    Variants,
    Categories,
    CategoryAssignments,
}

impl fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PatternRecords => write!(f, "pattern records"),
            Self::SemanticRecords => write!(f, "semantic records"),
            Self::Vocabulary => write!(f, "vocabulary export"),
            Self::Templates => write!(f, "template export"),
            Self::Variants => write!(f, "variant export"),
            Self::Categories => write!(f, "category export"),
            Self::CategoryAssignments => write!(f, "category assignments"),
        }
    }
}

/// Fatal errors. Any of these aborts the run before reconciliation starts.
#[derive(Debug, thiserror::Error)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (bad threshold, empty name, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// A tabular export lacks a column the loader requires.
    #[error("{kind}: missing column '{column}'")]
    MissingColumn { kind: SnapshotKind, column: String },
    /// A snapshot input is unreadable or unparsable as a whole.
    #[error("{kind}: cannot load snapshot: {reason}")]
    SnapshotLoad { kind: SnapshotKind, reason: String },
    /// IO error (file read, output write).
    #[error("IO error: {0}")]
    Io(String),
}

/// Per-product failures. Never fatal: each one becomes a miss in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionFailure {
    #[error("no template matches the product name")]
    TemplateMatch,
    #[error("no template axis resolved to a value")]
    AttributeCombination,
    #[error("no existing variant signature matches")]
    VariantIdentity,
}

impl ResolutionFailure {
    pub fn reason(&self) -> MissReason {
        match self {
            Self::TemplateMatch => MissReason::NoTemplateMatch,
            Self::AttributeCombination | Self::VariantIdentity => MissReason::NoAttributeMatch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_column_message_names_export() {
        let err = ReconError::MissingColumn {
            kind: SnapshotKind::Templates,
            column: "name".into(),
        };
        assert_eq!(err.to_string(), "template export: missing column 'name'");
    }

    #[test]
    fn variant_identity_reports_as_attribute_miss() {
        assert_eq!(ResolutionFailure::VariantIdentity.reason(), MissReason::NoAttributeMatch);
        assert_eq!(ResolutionFailure::TemplateMatch.reason(), MissReason::NoTemplateMatch);
    }
}
