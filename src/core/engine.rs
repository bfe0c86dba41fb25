use crate::builders::copyright::CopyrightValidator;
use crate::builders::filter::FileFilter;
use crate::builders::patterns::{RuleSet, ValidationProblem};
use crate::builders::tokenizer::{Fragment, SourceFormat};
use crate::core::config::{ConfigManager, ConfigProvider, CopyrightSettings, ensure_exists};
use crate::core::entries::FsSource;
use crate::utils::split_words;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Files at or above this size are skipped by the light check.
pub const MAX_LIGHT_CHECK_FILE_SIZE: u64 = 10_000_000;

/// Replacement reported by the light check, which cannot tell the right one.
pub const UNKNOWN_REPLACEMENT: &str = "UNKNOWN_REPLACEMENT";

/// Progress is logged every this many files.
const PROGRESS_STEP: usize = 100;

/// Outcome of one validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectValidationResult {
    /// Original base name -> suggested base name.
    pub file_name_problems: BTreeMap<String, String>,
    /// Path relative to the source root -> problems found in that file.
    pub file_content_problems: BTreeMap<PathBuf, Vec<ValidationProblem>>,
    /// Problem token -> suggested replacement, over all content problems.
    pub suggested_replacements: BTreeMap<String, String>,
    /// Paths declined by the file filter, relative to the source root.
    pub skipped_files_and_folders: Vec<PathBuf>,
}

impl ProjectValidationResult {
    /// Skipped files never make a result non-empty.
    pub fn is_empty(&self) -> bool {
        self.file_name_problems.is_empty() && self.file_content_problems.is_empty()
    }
}

/// Walks a source tree and checks file names and contents against the rename
/// rules and copyright patterns. Everything is compiled at construction and
/// read-only afterwards.
pub struct SourceValidator {
    source_root: PathBuf,
    filter: FileFilter,
    rules: RuleSet,
    restricted: String,
    copyright: CopyrightValidator,
}

impl SourceValidator {
    /// Builds a validator from configuration files. Fails when the source root
    /// or any configuration file is missing.
    pub fn new(
        source_root: impl Into<PathBuf>,
        mapping_path: impl Into<PathBuf>,
        filter_path: impl Into<PathBuf>,
        forbidden_patterns_path: impl Into<PathBuf>,
    ) -> Result<Self> {
        let config_manager = ConfigManager::new(mapping_path, filter_path, forbidden_patterns_path)?;
        Self::from_provider(source_root, &config_manager, CopyrightSettings::default())
    }

    pub fn from_provider(
        source_root: impl Into<PathBuf>,
        provider: &dyn ConfigProvider,
        settings: CopyrightSettings,
    ) -> Result<Self> {
        let source_root = source_root.into();
        ensure_exists(&[&source_root])?;

        let forbidden = provider.load_forbidden_patterns()?;
        let mappings = provider.load_mappings()?;
        let filter_config = provider.load_filter_config(&source_root)?;

        let rules = RuleSet::new(&mappings, &forbidden.restricted, &forbidden.exceptions)?;
        log::debug!("Loaded {} validation rules", rules.rules().len());

        Ok(Self {
            filter: FileFilter::new(&filter_config)?,
            copyright: CopyrightValidator::new(&forbidden, settings)?,
            restricted: forbidden.restricted.to_lowercase(),
            rules,
            source_root,
        })
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Runs the whole validation. Only an unreadable source root is an error;
    /// per-file failures are logged and tolerated.
    pub fn validate(&self) -> Result<ProjectValidationResult> {
        log::info!("Start validation of {}", self.source_root.display());
        let outcome = self.filter.filter(&FsSource::new(&self.source_root))?;
        let files_to_check = outcome.accepted_paths();

        let file_name_problems: BTreeMap<String, String> = files_to_check
            .iter()
            .filter_map(|file| self.check_file_name(file))
            .collect();

        let mut file_content_problems = BTreeMap::new();
        for (index, file) in files_to_check.iter().enumerate() {
            log::debug!("Validate {}", file.display());
            let (relative, mut problems) = self.check_file_content_with_double_check(file);
            problems.extend(self.check_copyright(file));
            if !problems.is_empty() {
                file_content_problems.insert(relative, problems);
            }
            if (index + 1) % PROGRESS_STEP == 0 {
                log::info!("Validated {} files", index + 1);
            }
        }
        log::info!("Validated {} files", files_to_check.len());

        // Later entries overwrite earlier ones on the same token.
        let suggested_replacements = file_content_problems
            .values()
            .flatten()
            .map(|p| (p.problem_token.clone(), p.suggested_replacement.clone()))
            .collect();

        let skipped_files_and_folders = outcome
            .declined
            .into_iter()
            .map(|entry| entry.relative)
            .collect();

        log::info!("Validation finished successfully");
        Ok(ProjectValidationResult {
            file_name_problems,
            file_content_problems,
            suggested_replacements,
            skipped_files_and_folders,
        })
    }

    /// Tests the base name alone. Returns `(old name, new name)` on a hit.
    pub fn check_file_name(&self, file: &Path) -> Option<(String, String)> {
        let name = file.file_name()?.to_string_lossy();
        self.rules
            .test_token(&name, 0, 0, 0)
            .map(|p| (p.problem_token, p.suggested_replacement))
    }

    /// The per-format check, backed by the light check when it finds nothing.
    pub fn check_file_content_with_double_check(&self, file: &Path) -> (PathBuf, Vec<ValidationProblem>) {
        let (relative, problems) = self.check_file_content(file);
        if !problems.is_empty() {
            return (relative, problems);
        }
        let light = self.check_file_content_light(file);
        if !light.is_empty() {
            log::warn!("Double check found problem in {}", relative.display());
        }
        (relative, light)
    }

    /// Tokenizes the file according to its format and tests every token. A
    /// structured file that does not parse is processed as plain text; a file
    /// that cannot be read yields no problems.
    pub fn check_file_content(&self, file: &Path) -> (PathBuf, Vec<ValidationProblem>) {
        let relative = self.relativize(file);
        log::debug!("Start validation for file={}", relative.display());

        let content = match fs::read(file) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) => {
                log::error!("Can't process file={}: {}", relative.display(), err);
                return (relative, Vec::new());
            }
        };

        let format = SourceFormat::from_path(file);
        let fragments = match format.tokenize(&content) {
            Ok(fragments) => fragments,
            Err(err) => {
                log::warn!(
                    "Can't process file={}, fallback to text processing: {:#}",
                    relative.display(),
                    err
                );
                match SourceFormat::Text.tokenize(&content) {
                    Ok(fragments) => fragments,
                    Err(err) => {
                        log::error!("Can't process file={}: {:#}", relative.display(), err);
                        return (relative, Vec::new());
                    }
                }
            }
        };

        let problems = fragments
            .iter()
            .flat_map(|fragment| self.check_fragment(fragment))
            .collect();
        (relative, problems)
    }

    /// Whole-file scan for the restricted token, exceptions masked out.
    pub fn check_file_content_light(&self, file: &Path) -> Vec<ValidationProblem> {
        if self.restricted.is_empty() {
            return Vec::new();
        }
        let size = match fs::metadata(file) {
            Ok(metadata) => metadata.len(),
            Err(err) => {
                log::warn!("Light check can't stat {}: {}", file.display(), err);
                return Vec::new();
            }
        };
        if size >= MAX_LIGHT_CHECK_FILE_SIZE {
            log::info!("skip {} due to size={}", file.display(), size);
            return Vec::new();
        }

        let text = match fs::read(file) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).to_lowercase(),
            Err(err) => {
                log::warn!("Light check can't read {}: {}", file.display(), err);
                return Vec::new();
            }
        };
        let masked = self.rules.exceptions().mask(&text);
        if !masked.masked.contains(&self.restricted) {
            return Vec::new();
        }
        vec![ValidationProblem {
            line: -1,
            start_position: -1,
            end_position: -1,
            broken_regex: String::new(),
            problem_token: self.restricted.clone(),
            validation_problem: self.restricted.clone(),
            suggested_replacement: UNKNOWN_REPLACEMENT.to_string(),
        }]
    }

    fn check_copyright(&self, file: &Path) -> Vec<ValidationProblem> {
        if !file.is_file() {
            return Vec::new();
        }
        let result = File::open(file)
            .with_context(|| format!("Failed to open {}", file.display()))
            .and_then(|reader| self.copyright.validate(reader));
        match result {
            Ok(problems) => problems,
            Err(err) => {
                log::error!("Copyright validation failed for {}: {:#}", file.display(), err);
                Vec::new()
            }
        }
    }

    fn check_fragment(&self, fragment: &Fragment) -> Vec<ValidationProblem> {
        match fragment {
            Fragment::Identifier {
                text,
                line,
                start,
                end,
            } => self
                .rules
                .test_token(text, *line as i64, *start as i64, *end as i64)
                .into_iter()
                .collect(),
            Fragment::Text { text, line } => self.check_text(text, *line),
        }
    }

    /// Splits `text` into words and tests each. The position of a word is its
    /// first occurrence in `text`.
    fn check_text(&self, text: &str, line: usize) -> Vec<ValidationProblem> {
        split_words(text)
            .into_iter()
            .filter_map(|word| {
                let start = text.find(word).unwrap_or(0);
                self.rules.test_token(
                    word,
                    line as i64,
                    start as i64,
                    (start + word.len()) as i64,
                )
            })
            .collect()
    }

    fn relativize(&self, file: &Path) -> PathBuf {
        file.strip_prefix(&self.source_root)
            .unwrap_or(file)
            .to_path_buf()
    }
}
