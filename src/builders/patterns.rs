use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::builders::masking::ExceptionMask;
use crate::core::config::MappingConfig;

/// Delimiter of the tokenized mapping fields.
const TOKEN_DELIMITER: char = ',';

/// A flattened `(rule, suggestedReplacement)` pair.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct FileValidationRule {
    pub rule: String,
    pub suggested_replacement: String,
}

/// A single line-level or token-level finding.
///
/// `line` is 1-based; the light whole-file check reports `-1` for every
/// position. `broken_regex` is only set by the copyright validator.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct ValidationProblem {
    pub line: i64,
    pub start_position: i64,
    pub end_position: i64,
    pub broken_regex: String,
    pub problem_token: String,
    pub validation_problem: String,
    pub suggested_replacement: String,
}

/// Uppercases the first character, leaving the rest untouched.
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Lowercases the first character, leaving the rest untouched.
fn decapitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `some,token` -> `SOME_TOKEN`
fn snake_case(tokenized: &str) -> String {
    tokenized
        .split(TOKEN_DELIMITER)
        .map(str::to_uppercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// `some,token` -> `SomeToken`
fn camel_case(tokenized: &str) -> String {
    tokenized.split(TOKEN_DELIMITER).map(capitalize).collect()
}

/// `some,token` -> `someToken`
fn lower_camel_case(tokenized: &str) -> String {
    decapitalize(&camel_case(tokenized))
}

/// `brand2,maps` -> `BRAND2Maps` when the tokens start with the restricted
/// token (always, for an empty one), plain camel case otherwise.
fn restricted_capitalized(tokenized: &str, restricted: &str) -> String {
    let starts_with_restricted = tokenized
        .to_lowercase()
        .starts_with(&restricted.to_lowercase());
    if !starts_with_restricted {
        return camel_case(tokenized);
    }
    let mut parts = tokenized.split(TOKEN_DELIMITER);
    let mut rendered = parts.next().unwrap_or_default().to_uppercase();
    rendered.extend(parts.map(capitalize));
    rendered
}

/// The six case-convention variants of one mapping, in insertion order.
fn case_variants(mapping: &MappingConfig, restricted: &str) -> [(String, String); 6] {
    let origin = &mapping.origin_tokenized;
    let replacement = &mapping.replacement_tokenized;
    [
        (snake_case(origin), snake_case(replacement)),
        (camel_case(origin), camel_case(replacement)),
        (lower_camel_case(origin), lower_camel_case(replacement)),
        (restricted_capitalized(origin, restricted), camel_case(replacement)),
        (mapping.origin.clone(), mapping.replacement.clone()),
        (mapping.origin.to_lowercase(), mapping.replacement.to_lowercase()),
    ]
}

/// Expands authored mappings into every case variant a token may appear in.
/// Later variants overwrite earlier ones on equal rule strings.
pub fn extend_mapping(mappings: &[MappingConfig], restricted: &str) -> BTreeMap<String, String> {
    mappings
        .iter()
        .flat_map(|mapping| case_variants(mapping, restricted))
        .filter(|(rule, _)| !rule.is_empty())
        .collect()
}

/// The active rename rules, longest rule first, plus the exception mask.
/// Read-only once built.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<FileValidationRule>,
    exceptions: ExceptionMask,
}

impl RuleSet {
    pub fn new(mappings: &[MappingConfig], restricted: &str, exceptions: &[String]) -> Result<Self> {
        let rules = extend_mapping(mappings, restricted)
            .into_iter()
            .map(|(rule, suggested_replacement)| FileValidationRule {
                rule,
                suggested_replacement,
            })
            .collect();
        Self::from_rules(rules, exceptions)
    }

    pub fn from_rules(mut rules: Vec<FileValidationRule>, exceptions: &[String]) -> Result<Self> {
        rules.sort_by(|a, b| b.rule.len().cmp(&a.rule.len()));
        Ok(Self {
            rules,
            exceptions: ExceptionMask::new(exceptions)?,
        })
    }

    pub fn rules(&self) -> &[FileValidationRule] {
        &self.rules
    }

    pub fn exceptions(&self) -> &ExceptionMask {
        &self.exceptions
    }

    /// The expanded mapping, rule -> suggested replacement.
    pub fn as_mapping(&self) -> BTreeMap<String, String> {
        self.rules
            .iter()
            .map(|r| (r.rule.clone(), r.suggested_replacement.clone()))
            .collect()
    }

    /// Tests one token against the rules. The first (longest) rule contained in
    /// the exception-masked token wins; its replacement is applied to the
    /// masked token and the exceptions are then restored.
    pub fn test_token(
        &self,
        token: &str,
        line: i64,
        start_position: i64,
        end_position: i64,
    ) -> Option<ValidationProblem> {
        let masked = self.exceptions.mask(token);
        let rule = self
            .rules
            .iter()
            .find(|rule| masked.masked.contains(&rule.rule))?;
        let replaced = masked
            .masked
            .replace(&rule.rule, &rule.suggested_replacement);
        Some(ValidationProblem {
            line,
            start_position,
            end_position,
            broken_regex: String::new(),
            problem_token: token.to_string(),
            validation_problem: rule.rule.clone(),
            suggested_replacement: masked.restore(&replaced),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(origin: &str, replacement: &str, origin_tok: &str, replacement_tok: &str) -> MappingConfig {
        MappingConfig {
            origin: origin.to_string(),
            replacement: replacement.to_string(),
            origin_tokenized: origin_tok.to_string(),
            replacement_tokenized: replacement_tok.to_string(),
        }
    }

    fn rule(rule: &str, replacement: &str) -> FileValidationRule {
        FileValidationRule {
            rule: rule.to_string(),
            suggested_replacement: replacement.to_string(),
        }
    }

    fn exceptions() -> Vec<String> {
        vec!["brand2u".to_string(), "brand2they".to_string()]
    }

    #[test]
    fn test_single_word_mapping_collapses_to_three_rules() {
        let actual = extend_mapping(&[mapping("old", "new", "old", "new")], "brand2");
        let expected: BTreeMap<String, String> = [("OLD", "NEW"), ("Old", "New"), ("old", "new")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_extend_mapping_variants() {
        let actual = extend_mapping(
            &[
                mapping("some-token", "new-token", "some,token", "new,token"),
                mapping("oldToken", "newToken", "old,token", "new,token"),
                mapping("old", "new", "old", "new"),
                mapping("oldnospaces", "newnospaces", "old,no,spaces", "new,no,spaces"),
            ],
            "brand2",
        );
        let expected: BTreeMap<String, String> = [
            ("SOME_TOKEN", "NEW_TOKEN"),
            ("SomeToken", "NewToken"),
            ("someToken", "newToken"),
            ("some-token", "new-token"),
            ("OLD_TOKEN", "NEW_TOKEN"),
            ("OldToken", "NewToken"),
            ("oldToken", "newToken"),
            ("oldtoken", "newtoken"),
            ("OLD", "NEW"),
            ("old", "new"),
            ("Old", "New"),
            ("OLD_NO_SPACES", "NEW_NO_SPACES"),
            ("OldNoSpaces", "NewNoSpaces"),
            ("oldNoSpaces", "newNoSpaces"),
            ("oldnospaces", "newnospaces"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_restricted_prefix_variant() {
        let actual = extend_mapping(
            &[mapping("brand2all", "bipolar-disorder", "brand2,all", "desktop,client")],
            "brand2",
        );
        assert_eq!(actual.len(), 5);
        assert_eq!(actual.get("BRAND2All").map(String::as_str), Some("DesktopClient"));
        assert_eq!(actual.get("Brand2All").map(String::as_str), Some("DesktopClient"));
        assert_eq!(actual.get("brand2all").map(String::as_str), Some("bipolar-disorder"));
    }

    #[test]
    fn test_empty_restricted_uppercases_first_word() {
        let actual = extend_mapping(&[mapping("oldToken", "newToken", "old,token", "new,token")], "");
        assert_eq!(actual.len(), 5);
        assert_eq!(actual.get("OLDToken").map(String::as_str), Some("NewToken"));
        assert_eq!(actual.get("OldToken").map(String::as_str), Some("NewToken"));
        assert_eq!(actual.get("OLD_TOKEN").map(String::as_str), Some("NEW_TOKEN"));
    }

    #[test]
    fn test_rules_sorted_longest_first() {
        let rules = RuleSet::new(
            &[mapping("brand2all", "sonic", "brand2,all", "sonic")],
            "brand2",
            &[],
        )
        .unwrap();
        let lengths: Vec<usize> = rules.rules().iter().map(|r| r.rule.len()).collect();
        let mut sorted = lengths.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(lengths, sorted);
    }

    #[test]
    fn test_token_replacement() {
        let rules = RuleSet::from_rules(
            vec![rule("brand2all", "sonic"), rule("brand2me", "nuken")],
            &exceptions(),
        )
        .unwrap();

        let problem = rules
            .test_token("org.octopusden.octopus.system.brand2all", 1, 1, 10)
            .unwrap();
        assert_eq!(problem.suggested_replacement, "org.octopusden.octopus.system.sonic");
        assert_eq!(problem.validation_problem, "brand2all");
        assert!(problem.broken_regex.is_empty());

        let problem = rules
            .test_token("org.octopusden.octopus.brand2me.zenit.brand2all", 1, 1, 10)
            .unwrap();
        assert_eq!(
            problem.suggested_replacement,
            "org.octopusden.octopus.brand2me.zenit.sonic"
        );
    }

    #[test]
    fn test_exceptions_are_never_flagged() {
        let rules = RuleSet::from_rules(
            vec![
                rule("brand2all", "sonic"),
                rule("brand2", "b"),
                rule("BRAND2", "B"),
                rule("Brand2", "b"),
                rule("branD2", "b"),
            ],
            &exceptions(),
        )
        .unwrap();

        let problem = rules
            .test_token("org.octopusden.octopus.brand2u.zenit.brand2all", 1, 1, 10)
            .unwrap();
        assert_eq!(
            problem.suggested_replacement,
            "org.octopusden.octopus.brand2u.zenit.sonic"
        );

        assert!(rules.test_token("org.octopusden.octopus.brand2u.zenit", 1, 1, 10).is_none());
        assert!(rules.test_token("org.octopusden.octopus.BRAND2U.zenit", 1, 1, 10).is_none());
        assert!(rules.test_token("org.octopusden.octopus.branD2u.zenit", 1, 1, 10).is_none());
    }

    #[test]
    fn test_exception_next_to_rule() {
        let rules = RuleSet::from_rules(
            vec![rule("brand2", "b"), rule("brand2all", "sonic")],
            &["brand2u".to_string()],
        )
        .unwrap();
        assert!(rules.test_token("org.foo.brand2u.bar", 1, 0, 0).is_none());
        let problem = rules.test_token("org.foo.brand2all.bar", 1, 0, 0).unwrap();
        assert_eq!(problem.suggested_replacement, "org.foo.sonic.bar");
    }

    #[test]
    fn test_placeholder_cannot_match_rules() {
        let rules = RuleSet::from_rules(vec![rule("OLD", "NEW"), rule("E", "X")], &exceptions()).unwrap();
        assert!(rules.test_token("brand2u", 1, 0, 0).is_none());
        let problem = rules.test_token("brand2u_OLD", 1, 0, 0).unwrap();
        assert_eq!(problem.suggested_replacement, "brand2u_NEW");
    }
}
