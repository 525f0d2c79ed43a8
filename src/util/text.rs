use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

/// Matches any HTML/XML tag, including comments and tags spanning attributes.
fn tag_regex() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("static tag regex"))
}

fn whitespace_regex() -> &'static Regex {
    static WS: OnceLock<Regex> = OnceLock::new();
    WS.get_or_init(|| Regex::new(r"\s+").expect("static whitespace regex"))
}

/// Removes markup from an HTML fragment and collapses whitespace runs.
///
/// Tags are replaced by a single space so adjacent block elements don't glue
/// their words together (`<p>a</p><p>b</p>` becomes `a b`). A handful of common
/// entities are decoded; anything else is left as-is.
///
/// ```
/// use newsdesk::util::strip_html;
///
/// assert_eq!(strip_html("<p>Merhaba <b>dünya</b></p>"), "Merhaba dünya");
/// assert_eq!(strip_html(""), "");
/// ```
pub fn strip_html(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }
    let without_tags = tag_regex().replace_all(html, " ");
    let decoded = decode_entities(&without_tags);
    whitespace_regex()
        .replace_all(&decoded, " ")
        .trim()
        .to_string()
}

fn decode_entities(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }
    Cow::Owned(
        s.replace("&nbsp;", " ")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&apos;", "'")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&amp;", "&"),
    )
}

/// Truncates to at most `max_chars` Unicode scalar values.
///
/// Byte slicing would split multi-byte Turkish characters (`ş`, `ğ`, `ü`), so the
/// cut point is located with `char_indices`.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Lowercases text the way Turkish labels need it.
///
/// `str::to_lowercase` maps `İ` to `i` followed by U+0307 (combining dot above),
/// which breaks comparisons against plain `i`. The combining dot is dropped so
/// `FİKSTÜR` folds to `fikstür`.
pub fn fold_lowercase(s: &str) -> String {
    s.to_lowercase().replace('\u{0307}', "")
}

/// Strips C0 control characters (except tab, newline, CR) and DEL.
///
/// Returns `Cow::Borrowed` when the input is already clean.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let is_control = |c: char| c == '\u{7f}' || (c < ' ' && !matches!(c, '\t' | '\n' | '\r'));
    if !s.chars().any(is_control) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.chars().filter(|&c| !is_control(c)).collect())
}
