use anyhow::{Context, Result, anyhow};
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use std::path::Path;
use tree_sitter::{Node, Parser};

use crate::utils::LineIndex;

/// A piece of a file that is tested against the rename rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// A source identifier, tested as a whole. `start` is the 0-based column,
    /// `end` is exclusive.
    Identifier {
        text: String,
        line: usize,
        start: usize,
        end: usize,
    },
    /// Free text (a line, a comment body, a markup or data value), split into
    /// words before testing.
    Text { text: String, line: usize },
}

/// How a file is tokenized, chosen once from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Java sources: identifiers from the syntax tree plus comment bodies.
    Source,
    /// XML: element and attribute names, attribute values and text.
    Markup,
    /// JSON: every field name and scalar value.
    Data,
    /// Anything else, line by line.
    Text,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("java") => SourceFormat::Source,
            Some("xml") => SourceFormat::Markup,
            Some("json") => SourceFormat::Data,
            _ => SourceFormat::Text,
        }
    }

    /// Splits `content` into fragments in document order. Only the structured
    /// formats can fail; callers fall back to [`SourceFormat::Text`].
    pub fn tokenize(self, content: &str) -> Result<Vec<Fragment>> {
        match self {
            SourceFormat::Source => tokenize_java(content),
            SourceFormat::Markup => tokenize_xml(content),
            SourceFormat::Data => tokenize_json(content),
            SourceFormat::Text => Ok(tokenize_text(content)),
        }
    }
}

fn tokenize_text(content: &str) -> Vec<Fragment> {
    content
        .lines()
        .enumerate()
        .map(|(index, line)| Fragment::Text {
            text: line.to_string(),
            line: index + 1,
        })
        .collect()
}

/// Strips the comment delimiters, keeping the body.
fn comment_body(comment: &str) -> &str {
    if let Some(body) = comment.strip_prefix("//") {
        return body;
    }
    let body = comment.strip_prefix("/*").unwrap_or(comment);
    let body = body.strip_prefix('*').unwrap_or(body);
    body.strip_suffix("*/").unwrap_or(body)
}

fn java_fragment(node: Node<'_>, source: &[u8]) -> Result<Option<Fragment>> {
    let kind = node.kind();
    let is_identifier = matches!(kind, "identifier" | "type_identifier");
    let is_comment = matches!(kind, "line_comment" | "block_comment");
    if !is_identifier && !is_comment {
        return Ok(None);
    }

    let text = node.utf8_text(source).context("Identifier is not valid UTF-8")?;
    let start = node.start_position();
    let fragment = if is_identifier {
        let end = node.end_position();
        Fragment::Identifier {
            text: text.to_string(),
            line: start.row + 1,
            start: end.column.saturating_sub(text.len()),
            end: end.column,
        }
    } else {
        Fragment::Text {
            text: comment_body(text).to_string(),
            line: start.row + 1,
        }
    };
    Ok(Some(fragment))
}

fn tokenize_java(content: &str) -> Result<Vec<Fragment>> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_java::LANGUAGE.into())
        .map_err(|e| anyhow!("Failed to load Java grammar: {}", e))?;
    let tree = parser
        .parse(content, None)
        .ok_or_else(|| anyhow!("Java parser produced no tree"))?;
    let root = tree.root_node();
    if root.has_error() {
        anyhow::bail!("Parse error near line {}", first_error_line(root));
    }

    let source = content.as_bytes();
    let mut fragments = Vec::new();
    let mut cursor = tree.walk();
    loop {
        if let Some(fragment) = java_fragment(cursor.node(), source)? {
            fragments.push(fragment);
        }
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return Ok(fragments);
            }
        }
    }
}

fn first_error_line(root: Node<'_>) -> usize {
    let mut node = root;
    loop {
        let mut cursor = node.walk();
        let broken = node.children(&mut cursor).find(|child| child.has_error() || child.is_missing());
        match broken {
            Some(child) if child.is_error() || child.is_missing() => {
                return child.start_position().row + 1;
            }
            Some(child) => node = child,
            None => return node.start_position().row + 1,
        }
    }
}

fn tokenize_xml(content: &str) -> Result<Vec<Fragment>> {
    let index = LineIndex::new(content);
    let mut reader = Reader::from_str(content);
    let mut fragments = Vec::new();

    loop {
        let position = reader.buffer_position() as usize;
        let event = reader
            .read_event()
            .with_context(|| format!("Malformed XML near line {}", index.line_of(position)))?;
        match event {
            Event::Start(element) | Event::Empty(element) => {
                let line = index.line_of(position);
                fragments.push(Fragment::Text {
                    text: String::from_utf8_lossy(element.name().as_ref()).to_string(),
                    line,
                });
                for attribute in element.attributes() {
                    let attribute = attribute.context("Malformed XML attribute")?;
                    fragments.push(Fragment::Text {
                        text: String::from_utf8_lossy(attribute.key.as_ref()).to_string(),
                        line,
                    });
                    fragments.push(Fragment::Text {
                        text: attribute.unescape_value()?.to_string(),
                        line,
                    });
                }
            }
            Event::Text(text) => {
                let leading = text.iter().take_while(|b| b.is_ascii_whitespace()).count();
                let value = text.unescape()?;
                let value = value.trim();
                if !value.is_empty() {
                    fragments.push(Fragment::Text {
                        text: value.to_string(),
                        line: index.line_of(position + leading),
                    });
                }
            }
            Event::CData(data) => {
                let value = String::from_utf8_lossy(&data).trim().to_string();
                if !value.is_empty() {
                    fragments.push(Fragment::Text {
                        text: value,
                        line: index.line_of(position),
                    });
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(fragments)
}

/// String literals, numbers and keywords of a JSON document.
const JSON_TOKEN: &str = r#""(?:[^"\\]|\\.)*"|-?\d[\d.eE+-]*|true|false|null"#;

fn tokenize_json(content: &str) -> Result<Vec<Fragment>> {
    serde_json::from_str::<serde_json::Value>(content).context("Malformed JSON")?;

    let index = LineIndex::new(content);
    let mut fragments = Vec::new();
    let pattern = Regex::new(JSON_TOKEN).context("Invalid JSON token pattern")?;
    for token in pattern.find_iter(content) {
        let text = if token.as_str().starts_with('"') {
            serde_json::from_str::<String>(token.as_str()).context("Malformed JSON string")?
        } else {
            token.as_str().to_string()
        };
        fragments.push(Fragment::Text {
            text,
            line: index.line_of(token.start()),
        });
    }
    Ok(fragments)
}
