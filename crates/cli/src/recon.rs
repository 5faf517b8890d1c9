//! `catsync run` / `catsync validate`: config-driven catalog reconciliation.

use std::path::{Path, PathBuf};

use catsync_recon::export::{render_outputs, RenderedFile, MISSES_FILE, RESULT_FILE};
use catsync_recon::{InputSources, ReconConfig, ReconError, ReconResult};

use crate::exit_codes::{
    recon_exit_code, EXIT_RECON_RUNTIME, EXIT_RECON_SNAPSHOT, EXIT_RUN_MISSES,
};
use crate::CliError;

/// Output directory used when neither `--output-dir` nor `[output] dir` is set.
const DEFAULT_OUTPUT_DIR: &str = "output";

fn recon_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError { code, message: msg.into(), hint: None }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        let hint = match &err {
            ReconError::MissingColumn { .. } => {
                Some("re-export the snapshot with the default import-compatible columns".to_string())
            }
            ReconError::ConfigParse(_) => Some("run `catsync validate <config>` for details".to_string()),
            _ => None,
        };
        CliError { code: recon_exit_code(&err), message: err.to_string(), hint }
    }
}

/// Read an input document. An unreadable input is a snapshot failure.
fn read_input(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|e| {
        recon_err(EXIT_RECON_SNAPSHOT, format!("cannot read {}: {e}", path.display()))
    })
}

fn load_config(config_path: &Path) -> Result<ReconConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path)
        .map_err(|e| recon_err(EXIT_RECON_RUNTIME, format!("cannot read config: {e}")))?;
    Ok(ReconConfig::from_toml(&config_str)?)
}

/// Directory relative paths in the config are resolved against.
fn base_dir(config_path: &Path) -> &Path {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// File contents for every configured input, read up front.
struct InputFiles {
    pattern_records: String,
    semantic_records: Option<String>,
    vocabulary: String,
    templates: String,
    variants: Option<String>,
    categories: Option<String>,
    category_assignments: Option<String>,
}

impl InputFiles {
    fn read(config: &ReconConfig, base: &Path) -> Result<Self, CliError> {
        let inputs = &config.inputs;
        let required = |file: &str| read_input(&base.join(file));
        let optional = |file: &Option<String>| file.as_deref().map(required).transpose();

        Ok(Self {
            pattern_records: required(&inputs.pattern_records)?,
            semantic_records: optional(&inputs.semantic_records)?,
            vocabulary: required(&inputs.vocabulary)?,
            templates: required(&inputs.templates)?,
            variants: optional(&inputs.variants)?,
            categories: optional(&inputs.categories)?,
            category_assignments: optional(&inputs.category_assignments)?,
        })
    }

    fn sources(&self) -> InputSources<'_> {
        InputSources {
            pattern_records: &self.pattern_records,
            semantic_records: self.semantic_records.as_deref(),
            vocabulary: &self.vocabulary,
            templates: &self.templates,
            variants: self.variants.as_deref(),
            categories: self.categories.as_deref(),
            category_assignments: self.category_assignments.as_deref(),
        }
    }
}

pub fn cmd_run(
    config_path: PathBuf,
    json_output: bool,
    output_dir: Option<PathBuf>,
    strict: bool,
) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let base = base_dir(&config_path);

    let files = InputFiles::read(&config, base)?;
    let input = catsync_recon::load_input(&files.sources())?;
    let result = catsync_recon::run(&config, &input)?;

    let out_dir = output_dir.unwrap_or_else(|| {
        base.join(config.output.dir.as_deref().unwrap_or(DEFAULT_OUTPUT_DIR))
    });
    let rendered = render_outputs(&result)?;
    write_outputs(&out_dir, &rendered)?;
    eprintln!("wrote {} file(s) to {}", rendered.len(), out_dir.display());

    if json_output {
        if let Some(file) = rendered.iter().find(|f| f.name == RESULT_FILE) {
            println!("{}", file.contents);
        }
    }

    print_summary(&result);

    let misses = result.outcomes.iter().filter(|o| o.is_miss()).count();
    if strict && misses > 0 {
        return Err(recon_err(EXIT_RUN_MISSES, format!("{misses} product(s) missed"))
            .with_hint(format!("see {}", out_dir.join(MISSES_FILE).display())));
    }
    Ok(())
}

fn write_outputs(dir: &Path, files: &[RenderedFile]) -> Result<(), CliError> {
    std::fs::create_dir_all(dir).map_err(|e| {
        recon_err(EXIT_RECON_RUNTIME, format!("cannot create {}: {e}", dir.display()))
    })?;
    for file in files {
        let path = dir.join(file.name);
        std::fs::write(&path, &file.contents).map_err(|e| {
            recon_err(EXIT_RECON_RUNTIME, format!("cannot write {}: {e}", path.display()))
        })?;
        tracing::debug!(path = %path.display(), bytes = file.contents.len(), "wrote output");
    }
    Ok(())
}

fn print_summary(result: &ReconResult) {
    let s = &result.summary;
    eprintln!(
        "recon '{}' ({} mode): {} products, {} variants ({} reused), {} template misses, {} attribute misses",
        result.meta.config_name,
        result.meta.variant_mode,
        s.total_products,
        s.variants_generated,
        s.variants_reused,
        s.template_misses,
        s.attribute_misses,
    );
    eprintln!(
        "catalog: {} new templates, {} updated templates, {} new vocabulary values",
        s.new_templates, s.updated_templates, s.new_vocabulary_values,
    );
    if !result.skipped_rows.is_empty() {
        eprintln!("skipped {} malformed input row(s)", result.skipped_rows.len());
    }
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    eprintln!(
        "valid: recon '{}' ({} mode, template threshold {}, value threshold {})",
        config.name,
        config.variants.mode,
        config.matching.template_threshold,
        config.matching.value_threshold,
    );
    Ok(())
}
