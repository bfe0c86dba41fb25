use anyhow::{Context, Result};
use regex::Regex;

/// Sentinel substituted for every exception occurrence. It carries no letters
/// or digits, so no rename rule can match inside it.
pub const PLACEHOLDER: &str = "\u{FFFC}";

/// Builds a pattern matching any of `items` regardless of letter case, by
/// alternating every letter with its upper/lower form. Other characters are
/// matched literally.
///
/// `["A4", "Zenit"]` becomes `([aA]4)|([zZ][eE][nN][iI][tT])`.
pub fn case_alternating_pattern(items: &[String]) -> String {
    items
        .iter()
        .map(|item| {
            let mut group = String::from("(");
            for c in item.chars() {
                if c.is_alphabetic() {
                    group.push('[');
                    group.extend(c.to_lowercase());
                    group.extend(c.to_uppercase());
                    group.push(']');
                } else {
                    group.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
                }
            }
            group.push(')');
            group
        })
        .collect::<Vec<_>>()
        .join("|")
}

/// Compiled exception list. Built once per run and shared by every token
/// check.
#[derive(Debug, Clone)]
pub struct ExceptionMask {
    pattern: Option<Regex>,
}

impl ExceptionMask {
    pub fn new(exceptions: &[String]) -> Result<Self> {
        let exceptions: Vec<String> = exceptions
            .iter()
            .filter(|e| !e.is_empty())
            .cloned()
            .collect();
        if exceptions.is_empty() {
            return Ok(Self { pattern: None });
        }
        let source = case_alternating_pattern(&exceptions);
        let pattern = Regex::new(&source)
            .with_context(|| format!("Invalid exception pattern: {}", source))?;
        Ok(Self {
            pattern: Some(pattern),
        })
    }

    /// Replaces every exception occurrence in `token` with [`PLACEHOLDER`].
    pub fn mask(&self, token: &str) -> MaskedToken {
        let Some(pattern) = &self.pattern else {
            return MaskedToken {
                masked: token.to_string(),
                replaced: Vec::new(),
            };
        };

        let mut masked = String::with_capacity(token.len());
        let mut replaced = Vec::new();
        let mut last = 0;
        for found in pattern.find_iter(token) {
            log::trace!("Masking exception '{}' in '{}'", found.as_str(), token);
            masked.push_str(&token[last..found.start()]);
            masked.push_str(PLACEHOLDER);
            replaced.push(found.as_str().to_string());
            last = found.end();
        }
        masked.push_str(&token[last..]);
        MaskedToken { masked, replaced }
    }
}

/// A token with its exception occurrences replaced by placeholders, plus the
/// captured originals needed to undo the substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskedToken {
    pub masked: String,
    replaced: Vec<String>,
}

impl MaskedToken {
    /// Puts the captured substrings back, the first placeholder receiving the
    /// first captured match.
    pub fn restore(&self, text: &str) -> String {
        let mut restored = text.to_string();
        for original in &self.replaced {
            restored = restored.replacen(PLACEHOLDER, original, 1);
        }
        restored
    }
}
