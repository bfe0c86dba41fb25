use anyhow::Result;
use fancy_regex::Regex;

use crate::core::config::{ForbiddenPatternsConfig, MappingConfig};

/// Delimiter of the tokenized mapping fields.
const TOKEN_DELIMITER: char = ',';

/// The `ConfigValidator` trait defines the public interface for checking the
/// rename mappings and the forbidden-patterns document before a run.
///
/// Checks report issues rather than failing, so a single pass lists every
/// problem of a configuration.
pub trait ConfigValidator {
    /// Validates every mapping and the forbidden-patterns document.
    ///
    /// # Arguments
    /// * `mappings`: The authored rename rules.
    /// * `forbidden`: Copyright patterns, exceptions and the restricted token.
    ///
    /// # Returns
    /// A `Result<Vec<String>>` where each string describes one issue.
    fn validate_config(
        &self,
        mappings: &[MappingConfig],
        forbidden: &ForbiddenPatternsConfig,
    ) -> Result<Vec<String>>;

    /// Validates a single mapping.
    fn validate_mapping(&self, mapping: &MappingConfig) -> Vec<String>;
}

/// The `StandardValidator` is the default implementation of `ConfigValidator`.
///
/// It looks for mistakes that silently weaken a run: tokenizations that
/// produce empty or mismatched case variants, exceptions that hide the
/// restricted token, and copyright patterns that match everything.
pub struct StandardValidator;

impl StandardValidator {
    /// Creates a new instance of `StandardValidator`.
    pub fn new() -> Self {
        Self
    }

    /// Checks the exceptions against the restricted token.
    ///
    /// An exception that equals the restricted token ignoring case masks every
    /// occurrence of it, which disables the light check entirely.
    fn check_exceptions(&self, forbidden: &ForbiddenPatternsConfig) -> Vec<String> {
        let mut issues = Vec::new();
        if forbidden.restricted.is_empty() {
            issues.push("Restricted token is empty, the light check is disabled".to_string());
            return issues;
        }
        let restricted = forbidden.restricted.to_lowercase();
        for exception in &forbidden.exceptions {
            if exception.is_empty() {
                issues.push("Empty exception is ignored".to_string());
            } else if exception.to_lowercase() == restricted {
                issues.push(format!(
                    "Exception '{}' equals the restricted token '{}' ignoring case",
                    exception, forbidden.restricted
                ));
            }
        }
        issues
    }

    /// Compiles each copyright pattern and flags those matching the empty
    /// string, since they report every triggered line.
    fn check_patterns(&self, forbidden: &ForbiddenPatternsConfig) -> Vec<String> {
        let mut issues = Vec::new();
        for pattern in &forbidden.patterns {
            match Regex::new(pattern) {
                Ok(regex) => {
                    if matches!(regex.is_match(""), Ok(true)) {
                        issues.push(format!("Copyright pattern '{}' matches the empty string", pattern));
                    }
                }
                Err(e) => issues.push(format!("Invalid copyright pattern '{}': {}", pattern, e)),
            }
        }
        if forbidden.patterns.is_empty() {
            issues.push("No copyright patterns configured".to_string());
        }
        issues
    }
}

impl Default for StandardValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigValidator for StandardValidator {
    fn validate_config(
        &self,
        mappings: &[MappingConfig],
        forbidden: &ForbiddenPatternsConfig,
    ) -> Result<Vec<String>> {
        let mut issues = Vec::new();
        for mapping in mappings {
            issues.extend(self.validate_mapping(mapping));
        }
        issues.extend(self.check_exceptions(forbidden));
        issues.extend(self.check_patterns(forbidden));
        Ok(issues)
    }

    fn validate_mapping(&self, mapping: &MappingConfig) -> Vec<String> {
        let mut issues = Vec::new();
        if mapping.origin.is_empty() {
            issues.push(format!("Mapping to '{}' has an empty origin", mapping.replacement));
        }

        let origin_words: Vec<&str> = mapping.origin_tokenized.split(TOKEN_DELIMITER).collect();
        let replacement_words: Vec<&str> = mapping
            .replacement_tokenized
            .split(TOKEN_DELIMITER)
            .collect();
        if origin_words.iter().any(|w| w.trim().is_empty()) {
            issues.push(format!(
                "Mapping '{}' has an empty word in originTokenized '{}'",
                mapping.origin, mapping.origin_tokenized
            ));
        }
        if replacement_words.iter().any(|w| w.trim().is_empty()) {
            issues.push(format!(
                "Mapping '{}' has an empty word in replacementTokenized '{}'",
                mapping.origin, mapping.replacement_tokenized
            ));
        }
        if origin_words.len() != replacement_words.len() {
            issues.push(format!(
                "Mapping '{}' tokenizes into {} words but its replacement into {}",
                mapping.origin,
                origin_words.len(),
                replacement_words.len()
            ));
        }
        issues
    }
}
