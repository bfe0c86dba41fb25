/// Command line shell around the whitelabel validation engine.
///
/// `validate` runs the full source validation and writes the reports,
/// `rules` exports the expanded rename rules for audit, `check-archive`
/// validates the entry names (and optionally the file filter) of a
/// packaged archive and `check-config` lints the configuration documents.
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use whitelabel_validator::builders::filter::filter_archive;
use whitelabel_validator::builders::names::NameTreeValidator;
use whitelabel_validator::builders::patterns::extend_mapping;
use whitelabel_validator::builders::reporter::{
    JsonReportGenerator, ReportGenerator, TextReportGenerator, default_report_paths, write_report,
};
use whitelabel_validator::builders::validator::{ConfigValidator, StandardValidator};
use whitelabel_validator::core::config::{
    ConfigFormat, ConfigManager, CopyrightSettings, FileFilterConfig, ForbiddenPatternsConfig,
    MappingConfig, load_document,
};
use whitelabel_validator::core::engine::SourceValidator;
use whitelabel_validator::core::entries::{is_zip_file, prefixed_entry_names};
use whitelabel_validator::utils;

/// File the expanded rules are stored in, inside the report directory.
const FULL_MAPPING_FILE_NAME: &str = "full-mapping.json";

#[derive(Parser)]
#[command(name = "whitelabel-validator")]
#[command(about = "Finds brand identifying tokens and copyright strings before redistribution")]
struct Cli {
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a source tree and write the reports
    Validate {
        /// Source root to validate
        #[arg(long, default_value = ".")]
        source: PathBuf,
        /// Rename mapping document
        #[arg(long, default_value = "./mapping-source.json")]
        mapping: PathBuf,
        /// File filter document
        #[arg(long, default_value = "./file-filters.json")]
        filter: PathBuf,
        /// Forbidden patterns document
        #[arg(long, default_value = "./wl-forbidden-patterns.json")]
        forbidden: PathBuf,
        /// Directory receiving the reports and the full mapping
        #[arg(long, default_value = ".")]
        report_dir: PathBuf,
        /// Errors report path (defaults to <report-dir>/source-validation-errors.txt)
        #[arg(long)]
        errors_report: Option<PathBuf>,
        /// Success report path (defaults to <report-dir>/source-validation-success.txt)
        #[arg(long)]
        success_report: Option<PathBuf>,
        /// Also export the whole result as JSON
        #[arg(long)]
        json: Option<PathBuf>,
        /// Version written into the reports
        #[arg(long, default_value = "")]
        release: String,
        /// Seconds a single line may spend in copyright validation
        #[arg(long, default_value_t = 30)]
        line_timeout_secs: u64,
        /// Copyright validation worker threads
        #[arg(long, default_value_t = 20)]
        threads: usize,
    },
    /// Export the expanded rename rules
    Rules {
        #[arg(long)]
        mapping: PathBuf,
        #[arg(long)]
        forbidden: PathBuf,
        /// Output format: json, yaml or toml
        #[arg(long, default_value = "json")]
        format: String,
        /// Output file (stdout when omitted)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Validate the entry names of a zip archive
    CheckArchive {
        #[arg(long)]
        archive: PathBuf,
        /// Pattern every name segment must fully match
        #[arg(long)]
        allowed_names: String,
        /// File filter document to run over the archive entries
        #[arg(long)]
        filter: Option<PathBuf>,
    },
    /// Check the mapping and forbidden patterns documents for mistakes
    CheckConfig {
        #[arg(long)]
        mapping: PathBuf,
        #[arg(long)]
        forbidden: PathBuf,
    },
}

fn failure_if(has_problems: bool) -> ExitCode {
    if has_problems {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn write_or_print(output: Option<&Path>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
        }
        None => {
            println!("{}", content);
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_validate(
    source: PathBuf,
    mapping: PathBuf,
    filter: PathBuf,
    forbidden: PathBuf,
    report_dir: PathBuf,
    errors_report: Option<PathBuf>,
    success_report: Option<PathBuf>,
    json: Option<PathBuf>,
    release: String,
    settings: CopyrightSettings,
) -> Result<ExitCode> {
    let config_manager = ConfigManager::new(mapping, filter, forbidden)?;
    log::debug!(
        "Using mapping={}, filter={}, forbidden={}",
        config_manager.mapping_path().display(),
        config_manager.filter_path().display(),
        config_manager.forbidden_patterns_path().display()
    );
    let validator = SourceValidator::from_provider(source, &config_manager, settings)?;
    log::info!("Starting validation of {}", validator.source_root().display());
    let result = validator.validate()?;

    let (default_errors, default_success) = default_report_paths(&report_dir);
    let errors_report = errors_report.unwrap_or(default_errors);
    let success_report = success_report.unwrap_or(default_success);
    write_report(
        &TextReportGenerator::new(),
        &result,
        &errors_report,
        &success_report,
        &release,
    )?;

    if let Some(json) = json {
        let content = JsonReportGenerator.render_errors(&result, &release)?;
        write_or_print(Some(json.as_path()), &content)?;
    }

    let full_mapping = report_dir.join(FULL_MAPPING_FILE_NAME);
    log::info!("Storing full mapping to {}", full_mapping.display());
    let content = ConfigFormat::Json.render(&validator.rules().as_mapping())?;
    write_or_print(Some(full_mapping.as_path()), &content)?;

    if !result.is_empty() {
        log::info!("found validation problems");
    }
    Ok(failure_if(!result.is_empty()))
}

fn run_rules(mapping: &Path, forbidden: &Path, format: &str, output: Option<&Path>) -> Result<ExitCode> {
    let mappings: Vec<MappingConfig> = load_document(mapping)?;
    let forbidden: ForbiddenPatternsConfig = load_document(forbidden)?;
    let rules: BTreeMap<String, String> = extend_mapping(&mappings, &forbidden.restricted);
    let content = ConfigFormat::from_name(format)?.render(&rules)?;
    write_or_print(output, &content)?;
    Ok(ExitCode::SUCCESS)
}

fn run_check_archive(archive: &Path, allowed_names: &str, filter: Option<&Path>) -> Result<ExitCode> {
    if !is_zip_file(archive)? {
        anyhow::bail!("{} is not a supported archive", archive.display());
    }

    let validator = NameTreeValidator::new(allowed_names)?;
    let mut problems = validator.validate(&prefixed_entry_names(archive)?);
    problems.sort();
    for problem in &problems {
        println!("{}", problem);
    }

    if let Some(filter) = filter {
        let config: FileFilterConfig = load_document(filter)?;
        let file = File::open(archive).with_context(|| format!("Failed to open {}", archive.display()))?;
        let (declined, accepted) = filter_archive(&config, file)?;
        println!("Accepted {} entries, declined {}", accepted.len(), declined.len());
        for name in &declined {
            println!("  declined: {}", name);
        }
    }
    Ok(failure_if(!problems.is_empty()))
}

fn run_check_config(mapping: &Path, forbidden: &Path) -> Result<ExitCode> {
    let mappings: Vec<MappingConfig> = load_document(mapping)?;
    let forbidden: ForbiddenPatternsConfig = load_document(forbidden)?;
    let issues = StandardValidator::new().validate_config(&mappings, &forbidden)?;
    if issues.is_empty() {
        println!("Configuration is valid");
    } else {
        println!("Found {} configuration issue(s):", issues.len());
        for issue in &issues {
            println!("  - {}", issue);
        }
    }
    Ok(failure_if(!issues.is_empty()))
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    utils::init_logging(cli.verbose);

    match cli.command {
        Commands::Validate {
            source,
            mapping,
            filter,
            forbidden,
            report_dir,
            errors_report,
            success_report,
            json,
            release,
            line_timeout_secs,
            threads,
        } => {
            let settings = CopyrightSettings {
                timeout: Duration::from_secs(line_timeout_secs),
                threads,
                ..Default::default()
            };
            run_validate(
                source,
                mapping,
                filter,
                forbidden,
                report_dir,
                errors_report,
                success_report,
                json,
                release,
                settings,
            )
        }
        Commands::Rules {
            mapping,
            forbidden,
            format,
            output,
        } => run_rules(&mapping, &forbidden, &format, output.as_deref()),
        Commands::CheckArchive {
            archive,
            allowed_names,
            filter,
        } => run_check_archive(&archive, &allowed_names, filter.as_deref()),
        Commands::CheckConfig { mapping, forbidden } => run_check_config(&mapping, &forbidden),
    }
}
