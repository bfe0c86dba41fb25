use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::io::{BufRead, BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use crate::core::config::{FileFilterConfig, load_filter_config};
use crate::core::entries::{Entry, EntrySource, FsSource, ZipSource};

/// Outcome of a filter run: every leaf file lands in exactly one list, in
/// traversal order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOutcome {
    pub declined: Vec<Entry>,
    pub accepted: Vec<Entry>,
}

impl FilterOutcome {
    pub fn declined_paths(&self) -> Vec<PathBuf> {
        self.declined.iter().map(|e| e.path.clone()).collect()
    }

    pub fn accepted_paths(&self) -> Vec<PathBuf> {
        self.accepted.iter().map(|e| e.path.clone()).collect()
    }
}

/// Compiles a list of glob patterns. `*` never crosses a `/`.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .with_context(|| format!("Invalid glob pattern: {}", pattern))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// A bare file name exclusion (`*.exe`) also applies at any depth.
fn expand_exclude_file(pattern: &str) -> Vec<String> {
    if pattern.contains('/') {
        vec![pattern.to_string()]
    } else {
        vec![pattern.to_string(), format!("**/{}", pattern)]
    }
}

fn file_name(path: &Path) -> &Path {
    path.file_name().map(Path::new).unwrap_or(path)
}

struct ContentRule {
    apply_to: GlobSet,
    needles: Vec<String>,
}

impl ContentRule {
    fn applies_to(&self, relative: &Path) -> bool {
        self.apply_to.is_match(file_name(relative))
    }

    /// True when no line of `reader` contains a needle. Read failures count as
    /// a pass.
    fn passes<R: Read>(&self, reader: R, relative: &Path) -> bool {
        for line in BufReader::new(reader).split(b'\n') {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    log::debug!("Content filter could not read {}: {}", relative.display(), err);
                    return true;
                }
            };
            let line = String::from_utf8_lossy(&line).to_lowercase();
            if self.needles.iter().any(|needle| line.contains(needle.as_str())) {
                log::debug!("{} is excluded by content", relative.display());
                return false;
            }
        }
        true
    }
}

/// Compiled form of a [`FileFilterConfig`].
pub struct FileFilter {
    include_dirs: GlobSet,
    exclude_dirs: GlobSet,
    include_files: GlobSet,
    exclude_files: GlobSet,
    content_rules: Vec<ContentRule>,
}

impl FileFilter {
    pub fn new(config: &FileFilterConfig) -> Result<Self> {
        let exclude_files: Vec<String> = config
            .exclude_files
            .iter()
            .flat_map(|pattern| expand_exclude_file(pattern))
            .collect();
        let content_rules = config
            .exclude_file_content_filters
            .iter()
            .map(|rule| {
                Ok(ContentRule {
                    apply_to: build_globset(&rule.apply_to_files)?,
                    needles: rule
                        .exclude_by_content
                        .iter()
                        .map(|needle| needle.to_lowercase())
                        .collect(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            include_dirs: build_globset(&config.include_dirs)?,
            exclude_dirs: build_globset(&config.exclude_dirs)?,
            include_files: build_globset(&config.include_files)?,
            exclude_files: build_globset(&exclude_files)?,
            content_rules,
        })
    }

    /// Matches at least one include glob and no exclude glob. An empty include
    /// list rejects everything.
    pub fn accepts_directory(&self, relative: &Path) -> bool {
        self.include_dirs.is_match(relative) && !self.exclude_dirs.is_match(relative)
    }

    /// The base name must be included and the relative path must not be
    /// excluded.
    pub fn accepts_file(&self, relative: &Path) -> bool {
        self.include_files.is_match(file_name(relative)) && !self.exclude_files.is_match(relative)
    }

    /// Every applicable content rule must pass. `open` is only called when a
    /// rule applies; a failure to open counts as a pass.
    pub fn accepts_content<'a, F>(&self, relative: &Path, open: F) -> bool
    where
        F: Fn() -> Result<Box<dyn Read + 'a>>,
    {
        self.content_rules
            .iter()
            .filter(|rule| rule.applies_to(relative))
            .all(|rule| match open() {
                Ok(reader) => rule.passes(reader, relative),
                Err(err) => {
                    log::debug!("Content filter could not open {}: {:#}", relative.display(), err);
                    true
                }
            })
    }

    /// Classifies every leaf entry of `source`.
    pub fn filter<S: EntrySource + ?Sized>(&self, source: &S) -> Result<FilterOutcome> {
        let mut outcome = FilterOutcome::default();
        for entry in source.entries()? {
            if entry.is_dir {
                continue;
            }
            let accepted = self.accepts_directory(&entry.relative)
                && self.accepts_file(&entry.relative)
                && self.accepts_content(&entry.relative, || source.open(&entry));
            if accepted {
                outcome.accepted.push(entry);
            } else {
                log::trace!("Declined {}", entry.relative.display());
                outcome.declined.push(entry);
            }
        }
        log::debug!(
            "Filter accepted {} and declined {} files",
            outcome.accepted.len(),
            outcome.declined.len()
        );
        Ok(outcome)
    }
}

/// Filters a directory tree. Returns `(declined, accepted)` full paths.
pub fn filter_tree(config: &FileFilterConfig, root: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    log::info!("Start filtering {}, full FileFilterConfig: {:?}", root.display(), config);
    let outcome = FileFilter::new(config)?.filter(&FsSource::new(root))?;
    Ok((outcome.declined_paths(), outcome.accepted_paths()))
}

/// Filters the entries of a zip archive without extracting it. Returns
/// `(declined, accepted)` entry names.
pub fn filter_archive<R: Read + Seek>(
    config: &FileFilterConfig,
    archive: R,
) -> Result<(Vec<String>, Vec<String>)> {
    let source = ZipSource::new(archive)?;
    let outcome = FileFilter::new(config)?.filter(&source)?;
    let names = |entries: &[Entry]| {
        entries
            .iter()
            .map(|e| e.relative.to_string_lossy().to_string())
            .collect::<Vec<_>>()
    };
    Ok((names(&outcome.declined), names(&outcome.accepted)))
}

/// Loads the global filter document, merges the override of `root` and
/// filters the tree.
pub fn filter_with_config_file(
    global_config: &Path,
    root: &Path,
) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let config = load_filter_config(global_config, root)?;
    filter_tree(&config, root)
}
