use std::io::Write;

/// Characters that separate word tokens in plain text, markup values and
/// comment bodies.
pub const WORD_SEPARATORS: &[char] = &[
    ' ', ',', '.', '=', ':', '(', ')', '"', '\\', '/', '{', '}', '$', '<', '>',
];

/// Marker appended to display strings that were cut short.
const ELLIPSIS: &str = "...";

/// Splits a piece of text into the word tokens that are tested against the
/// rename rules. Blank fragments are dropped.
pub fn split_words(text: &str) -> Vec<&str> {
    text.split(WORD_SEPARATORS)
        .filter(|fragment| !fragment.trim().is_empty())
        .collect()
}

/// Truncates `value` to at most `max_chars` characters, replacing the tail
/// with `...` when it had to be cut.
pub fn shorten(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let mut shortened: String = value.chars().take(keep).collect();
    shortened.push_str(ELLIPSIS);
    shortened
}

/// Maps byte offsets of a document to 1-based line numbers.
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { line_starts }
    }

    /// Returns the 1-based line containing `offset`.
    pub fn line_of(&self, offset: usize) -> usize {
        match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact + 1,
            Err(insert_at) => insert_at,
        }
    }
}

/// Installs the `env_logger` backend. `RUST_LOG` wins over the default level.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format(|buf, record| writeln!(buf, "[{:<5}] {}", record.level(), record.args()))
        .try_init();
}
