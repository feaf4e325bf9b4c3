//! Helpers for the inline HTML found in rendered doc summaries and impl headers.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#x[0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Strip tags, decode entities and collapse whitespace.
///
/// `<code>Vec&lt;T&gt;</code>  ok` becomes `Vec<T> ok`.
pub(crate) fn to_plain_text(html: &str) -> String {
    if !html.contains(['<', '&']) && !html.contains(char::is_whitespace) {
        return html.to_string();
    }
    let stripped = TAG.replace_all(html, "");
    let decoded = unescape_entities(&stripped);
    WHITESPACE.replace_all(decoded.trim(), " ").into_owned()
}

fn unescape_entities(text: &str) -> Cow<'_, str> {
    ENTITY.replace_all(text, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        let decoded = match name {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "amp" => Some('&'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some(' '),
            _ => name
                .strip_prefix("#x")
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| name.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };
        decoded.map_or_else(|| caps[0].to_string(), String::from)
    })
}
