//! Text processing utilities.

use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

/// Reduce `name` to `[A-Za-z0-9_]`, stripping accents and collapsing separators.
///
/// Returns an empty string when nothing ASCII survives.
pub fn ascii_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_sep = false;

    for c in name.nfd().filter(char::is_ascii) {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(c);
        } else {
            pending_sep = true;
        }
    }

    slug
}

/// ASCII-safe stem for record ids. Falls back to a short content hash of the
/// original name so distinct non-ASCII names stay distinct.
pub fn ascii_stem(name: &str) -> String {
    let slug = ascii_slug(name);
    if !slug.is_empty() {
        return slug;
    }
    let hash = Sha256::digest(name.as_bytes());
    format!("doc_{}", &hex::encode(hash)[..8])
}

/// First `max_chars` characters of `text`, with an ellipsis when truncated.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_slug_strips_accents() {
        assert_eq!(ascii_slug("Résumé Final"), "Resume_Final");
        assert_eq!(ascii_slug("año--2024__v2"), "ano_2024_v2");
        assert_eq!(ascii_slug("  _report_ "), "report");
    }

    #[test]
    fn test_ascii_slug_non_latin_is_empty() {
        assert_eq!(ascii_slug("報告書"), "");
        assert_eq!(ascii_slug("Отчёт"), "");
    }

    #[test]
    fn test_ascii_stem_fallback_is_distinct_and_ascii() {
        let a = ascii_stem("報告書");
        let b = ascii_stem("議事録");
        assert!(a.starts_with("doc_"));
        assert_eq!(a.len(), 12);
        assert_ne!(a, b);
        assert!(a.is_ascii());
        assert_eq!(ascii_stem("Guía rápida"), "Guia_rapida");
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("hello", 10), "hello");
        assert_eq!(preview("hello world", 5), "hello...");
        assert_eq!(preview("ééééé", 2), "éé...");
    }
}
