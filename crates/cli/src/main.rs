// catsync CLI - catalog reconciliation runs from a TOML config

mod exit_codes;
mod recon;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use exit_codes::EXIT_SUCCESS;

#[derive(Parser)]
#[command(name = "catsync")]
#[command(about = "Reconcile extracted product records against a downstream catalog")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run reconciliation from a TOML config file
    #[command(after_help = "\
Examples:
  catsync run catalog.recon.toml
  catsync run catalog.recon.toml --json
  catsync run catalog.recon.toml --output-dir import/
  catsync run catalog.recon.toml --strict")]
    Run {
        /// Path to the .recon.toml config file
        config: PathBuf,

        /// Print the full result JSON to stdout
        #[arg(long)]
        json: bool,

        /// Directory for the import files (default: [output] dir, else ./output next to the config)
        #[arg(long, env = "CATSYNC_OUTPUT_DIR")]
        output_dir: Option<PathBuf>,

        /// Exit non-zero when any product misses
        #[arg(long)]
        strict: bool,
    },

    /// Validate a recon config without running
    #[command(after_help = "\
Examples:
  catsync validate catalog.recon.toml")]
    Validate {
        /// Path to the .recon.toml config file
        config: PathBuf,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("CATSYNC_COMMIT"), ")",
        "\nengine:  catsync-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("CATSYNC_TARGET"),
    )
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "catsync_recon=debug,catsync=debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run { config, json, output_dir, strict } => {
            recon::cmd_run(config, json, output_dir, strict)
        }
        Commands::Validate { config } => recon::cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
