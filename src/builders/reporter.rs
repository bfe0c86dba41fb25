use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::builders::patterns::ValidationProblem;
use crate::core::engine::ProjectValidationResult;

/// File name prefix of the reports written next to each other in a report
/// directory.
pub const SOURCE_VALIDATION_PREFIX: &str = "source-validation";

/// The `ReportGenerator` trait defines how a `ProjectValidationResult` is
/// turned into a report.
///
/// Implementations decide the layout only; where the report ends up is handled
/// by [`write_report`].
pub trait ReportGenerator {
    /// Renders the report for a result that contains problems.
    ///
    /// # Arguments
    /// * `result`: The outcome of a validation run.
    /// * `version`: The version (or revision) that was validated.
    fn render_errors(&self, result: &ProjectValidationResult, version: &str) -> Result<String>;

    /// Renders the report for a result without problems.
    fn render_success(&self, result: &ProjectValidationResult, version: &str) -> Result<String>;
}

/// Plain-text report, one problem per line.
pub struct TextReportGenerator;

impl TextReportGenerator {
    /// Creates a new instance of `TextReportGenerator`.
    pub fn new() -> Self {
        Self
    }

    /// Formats a single problem of `file`.
    ///
    /// Copyright violations (those carrying the pattern that matched) show the
    /// line and the offending text; rename violations show the position, the
    /// token and the rule it contains.
    fn format_problem(&self, file: &Path, problem: &ValidationProblem) -> String {
        if !problem.broken_regex.is_empty() {
            format!(
                "line={} \"{}\" mustn't match reqexp: \"{}",
                problem.line,
                problem.validation_problem.trim(),
                problem.broken_regex
            )
        } else {
            format!(
                "{}:{},{} \"{}\" \"{} ",
                file.display(),
                problem.line,
                problem.start_position,
                problem.problem_token,
                problem.validation_problem
            )
        }
    }
}

impl Default for TextReportGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportGenerator for TextReportGenerator {
    fn render_errors(&self, result: &ProjectValidationResult, version: &str) -> Result<String> {
        let mut out = String::new();
        writeln!(out, "Version {}", version)?;

        if !result.file_name_problems.is_empty() {
            writeln!(out, "\n===========File renaming =======================\n")?;
            for (old, new) in &result.file_name_problems {
                writeln!(out, "Rename {} -> {}", old, new)?;
            }
        }

        writeln!(out, "\n=========== Content Validation Errors  =======================\n")?;
        for (file, problems) in &result.file_content_problems {
            writeln!(out, "\n======== {} ====\n", file.display())?;
            for problem in problems {
                writeln!(out, "{}", self.format_problem(file, problem))?;
            }
        }
        Ok(out)
    }

    fn render_success(&self, _result: &ProjectValidationResult, version: &str) -> Result<String> {
        Ok(format!("Version {}\n", version))
    }
}

/// Machine readable report: the whole result as pretty printed JSON.
pub struct JsonReportGenerator;

impl ReportGenerator for JsonReportGenerator {
    fn render_errors(&self, result: &ProjectValidationResult, _version: &str) -> Result<String> {
        serde_json::to_string_pretty(result).context("Failed to serialize validation result")
    }

    fn render_success(&self, result: &ProjectValidationResult, version: &str) -> Result<String> {
        self.render_errors(result, version)
    }
}

/// Writes the errors report when `result` has problems, the success report
/// otherwise, and returns the path that was written.
///
/// # Arguments
/// * `generator`: The layout to use.
/// * `errors_report`: Destination of the report when problems were found.
/// * `success_report`: Destination of the report when the result is empty.
pub fn write_report(
    generator: &dyn ReportGenerator,
    result: &ProjectValidationResult,
    errors_report: &Path,
    success_report: &Path,
    version: &str,
) -> Result<PathBuf> {
    let (path, content) = if result.is_empty() {
        (success_report, generator.render_success(result, version)?)
    } else {
        log::info!(
            "Found {} file items & {} source items",
            result.file_name_problems.len(),
            result.file_content_problems.len()
        );
        (errors_report, generator.render_errors(result, version)?)
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create report directory {}", parent.display()))?;
    }
    log::info!("Publishing report to {}", path.display());
    fs::write(path, content).with_context(|| format!("Failed to write report {}", path.display()))?;
    Ok(path.to_path_buf())
}

/// Default report locations inside `report_dir`.
pub fn default_report_paths(report_dir: &Path) -> (PathBuf, PathBuf) {
    (
        report_dir.join(format!("{}-errors.txt", SOURCE_VALIDATION_PREFIX)),
        report_dir.join(format!("{}-success.txt", SOURCE_VALIDATION_PREFIX)),
    )
}
