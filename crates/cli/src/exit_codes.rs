//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 3-9     | run              | Run completed with misses                |
//! | 60-69   | recon            | Config, snapshot and runtime failures    |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use catsync_recon::ReconError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// Usage error - bad arguments, missing required options.
/// Emitted by clap itself; listed here to keep the range reserved.
#[allow(dead_code)]
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Run (3-9)
// =============================================================================

/// `--strict` was given and at least one product missed.
pub const EXIT_RUN_MISSES: u8 = 3;

// =============================================================================
// Recon (60-69)
// =============================================================================

/// Config file failed to parse or validate.
pub const EXIT_RECON_INVALID_CONFIG: u8 = 60;

/// An input document or export could not be read or loaded (unreadable
/// file, bad JSON, missing column).
pub const EXIT_RECON_SNAPSHOT: u8 = 61;

/// Runtime failure: unreadable config file, unwritable output.
pub const EXIT_RECON_RUNTIME: u8 = 62;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_RECON_INVALID_CONFIG,
        ReconError::MissingColumn { .. } | ReconError::SnapshotLoad { .. } => EXIT_RECON_SNAPSHOT,
        ReconError::Io(_) => EXIT_RECON_RUNTIME,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catsync_recon::SnapshotKind;

    #[test]
    fn engine_errors_map_to_registry() {
        assert_eq!(
            recon_exit_code(&ReconError::ConfigValidation("x".into())),
            EXIT_RECON_INVALID_CONFIG
        );
        assert_eq!(
            recon_exit_code(&ReconError::MissingColumn {
                kind: SnapshotKind::Templates,
                column: "id".into(),
            }),
            EXIT_RECON_SNAPSHOT
        );
        assert_eq!(recon_exit_code(&ReconError::Io("disk".into())), EXIT_RECON_RUNTIME);
    }
}
