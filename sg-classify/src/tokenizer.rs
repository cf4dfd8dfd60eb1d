//! Name normalization and tokenization
//!
//! Street names and search result titles go through the same two steps:
//! - lowercase, then strip diacritics (canonical decomposition, combining
//!   marks dropped, `œ`/`æ`/`ß` folded)
//! - split on whitespace, hyphens and apostrophes, keeping token order
//!
//! A missing name normalizes to the literal `"nan"`.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalized form of a missing name
pub const NULL_NAME: &str = "nan";

/// Lowercase and strip diacritics
///
/// ```
/// use sg_classify::tokenizer::normalize;
///
/// assert_eq!(normalize("Général Leclerc"), "general leclerc");
/// assert_eq!(normalize("Cœur"), "coeur");
/// ```
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.to_lowercase().nfd() {
        if is_combining_mark(c) {
            continue;
        }
        match c {
            'œ' => out.push_str("oe"),
            'æ' => out.push_str("ae"),
            'ß' => out.push_str("ss"),
            _ => out.push(c),
        }
    }
    out
}

/// Normalize a possibly missing name
pub fn normalize_name(raw: Option<&str>) -> String {
    match raw {
        Some(name) => normalize(name),
        None => NULL_NAME.to_string(),
    }
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, '-' | '\'' | '\u{2019}')
}

/// Split an already normalized name into tokens
///
/// Runs of separators never produce empty tokens.
pub fn tokenize(normalized: &str) -> Vec<String> {
    normalized
        .split(is_separator)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Normalize then tokenize a possibly missing name
pub fn tokenize_name(raw: Option<&str>) -> Vec<String> {
    tokenize(&normalize_name(raw))
}
