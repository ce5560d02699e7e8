// src/text.rs
//! Text helpers shared by the classifier fallback, the emergency template and
//! the log redaction.

use once_cell::sync::OnceCell;
use regex::Regex;

/// Clean an article body: decode HTML entities, strip tags, normalize quotes
/// and collapse whitespace.
pub fn clean_body(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<Option<Regex>> = OnceCell::new();
    if let Some(re_tags) = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").ok()) {
        out = re_tags.replace_all(&out, " ").to_string();
    }

    // 3) Normalize curly quotes to ASCII
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Take at most `max` chars (never splits a code point).
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Short, anonymized id for log lines. Never log raw titles at info level.
pub fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_body_strips_tags_and_entities() {
        let s = "  <p>Hello,&nbsp;&nbsp;<b>world</b></p> &ldquo;ok&rdquo;  ";
        assert_eq!(clean_body(s), r#"Hello, world "ok""#);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("árvíztűrő", 3), "árv");
        assert_eq!(truncate_chars("ab", 10), "ab");
    }

    #[test]
    fn anon_hash_is_stable_and_short() {
        let a = anon_hash("PM announces budget cut");
        assert_eq!(a.len(), 12);
        assert_eq!(a, anon_hash("PM announces budget cut"));
        assert_ne!(a, anon_hash("Government trims spending"));
    }
}
