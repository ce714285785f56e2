//! Cleanup of scraped text.
//!
//! Article pages leak stylesheet fragments, tracking URLs and layout
//! whitespace into paragraph text. [`clean`] strips those, and
//! [`truncate_at_sentence`] shortens summaries without cutting a sentence
//! (or a UTF-8 code point) in half.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;

static MEDIA_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@media[^{]*\{[^}]*\}\s*\}?").expect("valid regex"));
static BRACE_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[^}]*\}").expect("valid regex"));
static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").expect("valid regex"));
static CSS_PROPERTY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[a-z-]+:[a-z0-9%!.\s]+;").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

const ELLIPSIS: &str = "...";

fn clean_once(text: &str) -> String {
    let text = MEDIA_BLOCK.replace_all(text, " ");
    let text = BRACE_BLOCK.replace_all(&text, " ");
    let text = URL.replace_all(&text, " ");
    let text = CSS_PROPERTY.replace_all(&text, " ");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// Strip CSS blocks, `@media` rules, URLs and `prop: value;` fragments, then
/// collapse whitespace.
///
/// Applied until the text stops changing, so `clean(clean(x)) == clean(x)`.
/// After the first pass any further change removes characters, so the loop ends.
pub fn clean(text: &str) -> String {
    let mut current = clean_once(text);
    loop {
        let next = clean_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Visible text of an HTML fragment, such as an RSS `<description>`.
pub fn strip_markup(fragment: &str) -> String {
    let html = Html::parse_fragment(fragment);
    let text = html.root_element().text().collect::<Vec<_>>().join(" ");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// Byte offset of the `n`th character, or the string length.
fn byte_offset(text: &str, n: usize) -> usize {
    text.char_indices()
        .nth(n)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len())
}

/// Shorten `text` to at most `max_chars` characters (plus an ellipsis).
///
/// Cuts after the last `.`, `!` or `?` in the window when that falls past the
/// window's midpoint; otherwise cuts at the last comma or space and appends
/// `...`. Lengths are counted in characters, never bytes.
pub fn truncate_at_sentence(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let window = &text[..byte_offset(text, max_chars)];

    let sentence_end = window
        .char_indices()
        .filter(|(_, c)| matches!(c, '.' | '!' | '?'))
        .map(|(idx, _)| idx)
        .last();
    if let Some(byte_idx) = sentence_end {
        let char_pos = window[..byte_idx].chars().count();
        if char_pos * 2 > max_chars {
            return text[..=byte_idx].trim().to_string();
        }
    }

    let cut = window
        .char_indices()
        .filter(|(_, c)| matches!(c, ',' | ' '))
        .map(|(idx, _)| idx)
        .last()
        .unwrap_or(window.len());
    format!("{}{ELLIPSIS}", text[..cut].trim_end())
}
