use anyhow::{Context, Result};
use fancy_regex::Regex;
use std::collections::BTreeMap;

/// Separator of archive entry names.
const SEPARATOR: char = '/';

/// Validates every segment of a set of nested names (archive entries prefixed
/// with the archive name) against an allow-list pattern.
pub struct NameTreeValidator {
    source: String,
    pattern: Regex,
}

/// One level of the name tree. Only the local segment is validated.
struct NameNode {
    name: String,
    children: Vec<NameNode>,
}

impl NameNode {
    /// Groups `names` (relative to this node) by their first segment.
    fn build(name: String, names: &[&str]) -> Self {
        let mut directories: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        let mut files = Vec::new();
        for relative in names.iter().filter(|n| !n.is_empty()) {
            match relative.split_once(SEPARATOR) {
                Some((dir, rest)) => directories.entry(dir).or_default().push(rest),
                None => files.push(*relative),
            }
        }

        let mut children: Vec<NameNode> = directories
            .into_iter()
            .map(|(dir, rest)| NameNode::build(dir.to_string(), &rest))
            .collect();
        children.extend(files.into_iter().map(|file| NameNode {
            name: file.to_string(),
            children: Vec::new(),
        }));
        Self { name, children }
    }

    /// Depth first, children before their parent.
    fn collect<'a>(&'a self, full_path: String, out: &mut Vec<(String, &'a str)>) {
        for child in &self.children {
            child.collect(format!("{}{}{}", full_path, SEPARATOR, child.name), out);
        }
        out.push((full_path, &self.name));
    }
}

impl NameTreeValidator {
    pub fn new(allowed_names: &str) -> Result<Self> {
        let pattern = Regex::new(&format!("^(?:{})$", allowed_names))
            .with_context(|| format!("Invalid allowed names pattern: {}", allowed_names))?;
        Ok(Self {
            source: allowed_names.to_string(),
            pattern,
        })
    }

    fn is_allowed(&self, name: &str) -> bool {
        match self.pattern.is_match(name) {
            Ok(matched) => matched,
            Err(err) => {
                log::warn!("Could not match '{}' against {}: {}", name, self.source, err);
                false
            }
        }
    }

    /// Returns one `"<fullPath> does not match <pattern>"` message per tree node
    /// whose own name is not allowed. Order is unspecified.
    pub fn validate<I, S>(&self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<S> = names.into_iter().collect();
        let names: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
        let root = NameNode::build(String::new(), &names);

        let mut nodes = Vec::new();
        root.collect(String::new(), &mut nodes);
        nodes
            .into_iter()
            .filter(|(_, name)| !self.is_allowed(name))
            .map(|(full_path, _)| format!("{} does not match {}", full_path, self.source))
            .collect()
    }
}
