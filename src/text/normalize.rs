use std::sync::OnceLock;

use regex::Regex;

fn whitespace_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern is valid"))
}

/// Trims the text and collapses every whitespace run (including newlines)
/// to a single space. Everything else, Japanese punctuation included, is
/// left as it is.
pub fn normalize_text(text: &str) -> String {
    whitespace_run().replace_all(text.trim(), " ").into_owned()
}
