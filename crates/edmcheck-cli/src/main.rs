use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use walkdir::WalkDir;

use edmcheck_core::codes::{code_name, parse_code};
use edmcheck_core::{
    DesignerCode, ErrorClass, ErrorInfo, ErrorItem, MappingErrorCode, SchemaErrorCode, Severity, ValidationConfig,
    ValidationReport, ViewGenErrorCode,
};
use edmcheck_engine::classification::{is_designer_exempt, is_unrecoverable_runtime_error};
use edmcheck_engine::escher_validator::{is_open_in_editor_error, is_skip_runtime_validation_error};
use edmcheck_engine::{ArtifactValidation, ValidationSession};

const DEFAULT_CONFIG: &str = "edmcheck.toml";

/// edmcheck - Entity data model artifact validation
#[derive(Parser)]
#[command(name = "edmcheck")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: edmcheck.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate artifacts (files, or directories searched for artifacts)
    Validate {
        /// Artifact files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Output file for report.json
        #[arg(short, long, default_value = "report.json")]
        output: PathBuf,

        /// Stop after compiling the conceptual and storage schemas
        #[arg(long)]
        no_mapping: bool,

        /// Compile the mapping but skip view generation
        #[arg(long)]
        no_views: bool,

        /// Run the model validator even if nothing is marked dirty
        #[arg(long)]
        force: bool,
    },

    /// Describe an error code, given as a number or a symbolic name
    Explain {
        code: String,
    },

    /// Write a default config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        overwrite: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    match cli.command {
        Commands::Validate {
            paths,
            output,
            no_mapping,
            no_views,
            force,
        } => {
            let mut config = load_config(cli.config.as_deref(), cli.verbose)?;
            if no_mapping {
                config.validate_mapping = false;
            }
            if no_views {
                config.generate_views = false;
            }
            config.force |= force;

            validate_command(config, &paths, &output, cli.verbose)
        }
        Commands::Explain { code } => explain_command(&code),
        Commands::InitConfig { overwrite } => {
            let path = cli.config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
            init_config_command(&path, overwrite)
        }
    }
}

fn load_config(path: Option<&Path>, verbose: bool) -> Result<ValidationConfig> {
    if let Some(path) = path {
        return ValidationConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }

    let default_path = Path::new(DEFAULT_CONFIG);
    if default_path.exists() {
        return ValidationConfig::from_file(default_path)
            .with_context(|| format!("Failed to load config {}", default_path.display()));
    }

    if verbose {
        eprintln!("{}", "No config file found, using defaults".yellow());
    }
    Ok(ValidationConfig::default())
}

/// Expand directories into the artifacts they contain, sorted for stable output
fn collect_artifacts(paths: &[PathBuf], suffix: &str) -> Result<Vec<PathBuf>> {
    let mut artifacts = Vec::new();

    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .filter(|entry| entry.file_name().to_string_lossy().ends_with(suffix))
                .map(|entry| entry.into_path())
                .collect();
            found.sort();
            artifacts.extend(found);
        } else if path.is_file() {
            artifacts.push(path.clone());
        } else {
            anyhow::bail!("No such file or directory: {}", path.display());
        }
    }

    Ok(artifacts)
}

/// Validate command - run both passes over every artifact
fn validate_command(config: ValidationConfig, paths: &[PathBuf], output: &Path, verbose: bool) -> Result<()> {
    let artifacts = collect_artifacts(paths, &config.artifact_suffix)?;
    if artifacts.is_empty() {
        anyhow::bail!("No artifacts matching *{} found", config.artifact_suffix);
    }
    tracing::debug!(count = artifacts.len(), "Collected artifacts");

    if verbose {
        eprintln!(
            "{} {} artifact(s), target version {}",
            "Validating".cyan(),
            artifacts.len(),
            config.target_version
        );
    }

    let mut session = ValidationSession::new(config);
    let mut results: Vec<(String, ArtifactValidation)> = Vec::new();
    let mut load_failures = Vec::new();

    for path in &artifacts {
        if verbose {
            eprintln!("  {} {}...", "Checking".cyan(), path.display());
        }

        match session.validate_path(path) {
            Ok(validation) => {
                if verbose && validation.runtime_skipped {
                    eprintln!("    {}", "runtime validation skipped".yellow());
                }
                results.push((path.display().to_string(), validation));
            }
            Err(e) => load_failures.push((path.display().to_string(), e.to_string())),
        }
    }

    let report = session.report(results.iter().map(|(path, validation)| (path.clone(), validation)));
    session
        .save_report(&report, output)
        .with_context(|| "Failed to save report")?;

    if verbose {
        eprintln!("{} {}", "Report saved to:".green(), output.display());
    }

    print_report_summary(&report, &load_failures);

    if report.has_errors() || !load_failures.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}

/// Print report summary to stdout
fn print_report_summary(report: &ValidationReport, load_failures: &[(String, String)]) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Model Validation Report".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("Version: {}", report.version);
    println!("Timestamp: {}", report.timestamp);
    println!();

    println!("{}", "Summary:".bold());
    println!("  Artifacts checked: {}", report.summary.artifacts_checked);
    println!("  Total entries:     {}", report.summary.total);

    if report.summary.errors > 0 {
        println!("  Errors:   {}", format!("{}", report.summary.errors).red().bold());
    } else {
        println!("  Errors:   {}", format!("{}", report.summary.errors).green());
    }

    if report.summary.warnings > 0 {
        println!("  Warnings: {}", format!("{}", report.summary.warnings).yellow());
    } else {
        println!("  Warnings: {}", format!("{}", report.summary.warnings).green());
    }

    if report.summary.open_in_editor > 0 {
        println!(
            "  Need raw editing: {}",
            format!("{}", report.summary.open_in_editor).magenta()
        );
    }
    println!();

    for (path, message) in load_failures {
        println!("{} {}", "FAILED".red().bold(), path);
        println!("    {}", message);
    }

    if report.summary.total == 0 && load_failures.is_empty() {
        println!("{}", "✓ No issues found!".green().bold());
    }

    for artifact in report.artifacts.iter().filter(|a| !a.entries.is_empty()) {
        println!("{}", artifact.path.bold());

        for entry in &artifact.entries {
            let severity_str = match entry.severity {
                Severity::Error => "ERROR".red().bold(),
                Severity::Warning => "WARN".yellow().bold(),
            };
            let name = entry.code_name.as_deref().unwrap_or("UNKNOWN");

            println!("  [{}] {} ({}): {}", severity_str, name, entry.code, entry.message);

            match (&entry.object, entry.position) {
                (Some(object), Some(position)) => println!("    at {} ({})", object, position),
                (Some(object), None) => println!("    at {}", object),
                (None, Some(position)) => println!("    at {}", position),
                (None, None) => {}
            }

            if entry.open_in_editor {
                println!("    {}", "fix in the raw document".magenta());
            }
        }
        println!();
    }

    println!("{}", "=".repeat(60).bright_blue());
}

/// Explain command - print what is known about a code
fn explain_command(text: &str) -> Result<()> {
    let code = parse_code(text).ok_or_else(|| anyhow::anyhow!("Unknown error code: {}", text))?;
    let name = code_name(code).ok_or_else(|| anyhow::anyhow!("Unknown error code: {}", code))?;

    println!("{} ({})", name.bold(), code);
    println!("  Raised by: {}", code_origin(code));

    if let Some(designer) = DesignerCode::from_i32(code) {
        // Policies are decided per record; check a record of the class the code is raised in
        let class = if designer == DesignerCode::ModelParseGhostNodeNotSupportedByDesigner {
            ErrorClass::PARSE_ERROR
        } else {
            ErrorClass::ESCHER_ALL
        };
        let sample = ErrorInfo::designer(Severity::Error, "", ErrorItem::Artifact, designer, class);

        println!("  Open in editor: {}", yes_no(is_open_in_editor_error(&sample)));
        println!("  Skips runtime validation: {}", yes_no(is_skip_runtime_validation_error(&sample)));
    } else {
        let unrecoverable = is_unrecoverable_runtime_error(code);
        println!("  Unrecoverable at runtime: {}", yes_no(unrecoverable));
        println!("  Fixable in the designer: {}", yes_no(is_designer_exempt(code) && !unrecoverable));
    }

    Ok(())
}

fn code_origin(code: i32) -> &'static str {
    if DesignerCode::from_i32(code).is_some() {
        "model validator"
    } else if SchemaErrorCode::from_i32(code).is_some() {
        "schema compilation"
    } else if MappingErrorCode::from_i32(code).is_some() {
        "mapping compilation"
    } else if ViewGenErrorCode::from_i32(code).is_some() {
        "view generation"
    } else {
        "unknown"
    }
}

fn yes_no(value: bool) -> colored::ColoredString {
    if value {
        "yes".green()
    } else {
        "no".normal()
    }
}

/// Init config command - write the default configuration
fn init_config_command(path: &Path, overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        anyhow::bail!("{} already exists (use --overwrite to replace it)", path.display());
    }

    ValidationConfig::default()
        .save_to_file(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("{} {}", "Wrote".green(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn directories_expand_to_matching_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("b.edm.json"), "{}").unwrap();
        std::fs::write(dir.path().join("nested").join("a.edm.json"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.json"), "{}").unwrap();

        let found = collect_artifacts(&[dir.path().to_path_buf()], ".edm.json").unwrap();
        let names: Vec<String> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"a.edm.json".to_string()));
        assert!(names.contains(&"b.edm.json".to_string()));
    }

    #[test]
    fn missing_paths_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.edm.json");
        assert!(collect_artifacts(&[missing], ".edm.json").is_err());
    }

    #[test]
    fn init_config_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG);

        init_config_command(&path, false).unwrap();
        assert!(init_config_command(&path, false).is_err());
        init_config_command(&path, true).unwrap();

        let config = ValidationConfig::from_file(&path).unwrap();
        assert_eq!(config.target_version, edmcheck_core::LATEST_SCHEMA_VERSION);
        assert!(config.validate_mapping);
        assert!(config.generate_views);
        assert_eq!(config.artifact_suffix, ".edm.json");
    }

    #[test]
    fn codes_resolve_by_number_and_name() {
        assert_eq!(code_origin(11008), "model validator");
        assert_eq!(code_origin(2062), "mapping compilation");
        assert_eq!(code_origin(3023), "view generation");
        assert!(explain_command("ESCHER_VALIDATOR_UNMAPPED_PROPERTY").is_ok());
        assert!(explain_command("not-a-code").is_err());
    }
}
