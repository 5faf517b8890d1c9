//! `catsync-recon`: catalog reconciliation engine.
//!
//! Merges extracted product records against a downstream catalog snapshot
//! and plans vocabulary values, templates and variant imports. Loaders take
//! file contents; reading and writing files is left to the caller.

pub mod aggregate;
pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod export;
pub mod identity;
pub mod matcher;
pub mod merge;
pub mod model;
pub mod normalize;
pub mod similarity;
pub mod snapshot;
pub mod templates;
pub mod values;
pub mod vocabulary;

pub use config::{ReconConfig, VariantMode};
pub use engine::{load_input, run, InputSources};
pub use error::{ReconError, ResolutionFailure, SnapshotKind};
pub use export::{render_outputs, RenderedFile};
pub use model::{ReconInput, ReconResult, ReconSummary, ReconciliationOutcome};
