//! Text normalization for post bodies.
//!
//! [`collapse_whitespace`] is the light pass applied to the stored original
//! text; [`clean_text`] is the full pass producing `post_text_clean`.

use std::sync::LazyLock;

use regex::Regex;

static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<!--.*?-->")
        .expect("valid regex")
});
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)</?[A-Za-z][^>]*>").expect("valid regex"));
static NUMERIC_ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&#(?:[xX]([0-9A-Fa-f]{1,6})|([0-9]{1,7}));").expect("valid regex")
});
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:https?://|www\.)\S+").expect("valid regex"));
static SYMBOL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s.,!?;:'\-]").expect("valid regex"));

/// Trims and collapses every whitespace run to a single space.
#[must_use]
pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Produces the normalized form of a post body.
///
/// Removes markup (scripts, styles, comments and tags), decodes common HTML
/// entities, drops control characters, URLs and anything that is not a word
/// character, whitespace or basic punctuation, then collapses whitespace.
/// May return an empty string.
#[must_use]
pub fn clean_text(input: &str) -> String {
    let without_markup = strip_markup(input);
    let without_controls: String = without_markup
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let without_urls = URL_RE.replace_all(&without_controls, " ");
    let without_symbols = SYMBOL_RE.replace_all(&without_urls, "");
    collapse_whitespace(&without_symbols)
}

/// Strips HTML markup and decodes entities. Text without `<` or `&` is
/// returned unchanged.
#[must_use]
pub fn strip_markup(input: &str) -> String {
    if !input.contains('<') && !input.contains('&') {
        return input.to_string();
    }
    let without_blocks = BLOCK_RE.replace_all(input, " ");
    let without_tags = TAG_RE.replace_all(&without_blocks, " ");
    decode_entities(&without_tags)
}

fn decode_entities(value: &str) -> String {
    let named = value
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">");
    // `&amp;` goes last so `&amp;#39;` stays literal text.
    NUMERIC_ENTITY_RE
        .replace_all(&named, |caps: &regex::Captures<'_>| {
            let code = match (caps.get(1), caps.get(2)) {
                (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
                (None, Some(dec)) => dec.as_str().parse::<u32>().ok(),
                (None, None) => None,
            };
            code.and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_default()
        })
        .replace("&amp;", "&")
}

/// Number of whitespace-delimited tokens.
#[must_use]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Normalizes one tag: trims, drops leading `#`, lowercases. Blank tags
/// become `None`.
#[must_use]
pub fn normalize_tag(tag: &str) -> Option<String> {
    let tag = tag.trim().trim_start_matches('#').trim();
    if tag.is_empty() {
        None
    } else {
        Some(tag.to_lowercase())
    }
}
