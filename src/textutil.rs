use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static MATH_OPEN_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<math\b[^>]*>").expect("math open tag"));
static DISPLAY_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bdisplay\s*=\s*["']block["']"#).expect("display block"));
static DISPLAY_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\sdisplay\s*=").expect("display attr"));

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn escape_attr(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn normalize_nbsp(text: &str) -> String {
    text.replace('\u{00A0}', " ")
}

/// Rewrites every `<math>` opening tag to `display="inline"`, adding the attribute when absent.
pub fn force_inline_mathml(mathml: &str) -> String {
    MATH_OPEN_TAG_RE
        .replace_all(mathml, |caps: &Captures<'_>| {
            let tag = &caps[0];
            if DISPLAY_BLOCK_RE.is_match(tag) {
                DISPLAY_BLOCK_RE
                    .replace(tag, r#"display="inline""#)
                    .into_owned()
            } else if DISPLAY_ATTR_RE.is_match(tag) {
                tag.to_string()
            } else {
                format!(r#"{} display="inline"{}"#, &tag[..5], &tag[5..])
            }
        })
        .into_owned()
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

/// Returns `Some(trimmed)` only when the value has visible content.
pub fn non_blank(value: &str) -> Option<&str> {
    let v = value.trim();
    if v.is_empty() {
        None
    } else {
        Some(v)
    }
}
