//! Content normalization and hashing used to deduplicate ingested reviews.

use sha2::{Digest, Sha256};

/// Normalize review text so that cosmetic differences hash identically.
///
/// Lower-cases, drops punctuation and symbols, and collapses every run of
/// whitespace into a single space. Letters and digits from any script are
/// kept.
#[must_use]
pub fn normalize_content(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|c| c.is_alphanumeric() || *c == ' ')
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Hex-encoded SHA-256 of the normalized text.
#[must_use]
pub fn content_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(normalize_content(text).as_bytes()))
}

/// Stable dedup key for a review within one source.
///
/// Platforms that expose a review id are keyed on it alone, so an edited
/// review is not stored a second time. Otherwise the key is
/// the normalized author and body joined by a NUL separator.
#[must_use]
pub fn review_dedup_key(
    external_review_id: Option<&str>,
    author: Option<&str>,
    content: &str,
) -> String {
    let input = match external_review_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => format!("id\x00{id}"),
        None => format!(
            "text\x00{}\x00{}",
            normalize_content(author.unwrap_or("")),
            normalize_content(content)
        ),
    };
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_case_whitespace_and_punctuation() {
        assert_eq!(
            normalize_content("  Great   service!!\n\tWould come BACK. "),
            "great service would come back"
        );
    }

    #[test]
    fn normalize_keeps_non_ascii_letters() {
        assert_eq!(normalize_content("Très  bon café !"), "très bon café");
    }

    #[test]
    fn cosmetic_variants_share_a_hash() {
        assert_eq!(
            content_hash("Great service!"),
            content_hash("great   SERVICE")
        );
        assert_ne!(content_hash("Great service"), content_hash("Poor service"));
    }

    #[test]
    fn hash_is_hex_sha256() {
        let hash = content_hash("anything");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn dedup_key_prefers_external_id() {
        let a = review_dedup_key(Some("g-123"), Some("Ann"), "Lovely");
        let b = review_dedup_key(Some(" g-123 "), Some("Bob"), "Edited text");
        assert_eq!(a, b);
    }

    #[test]
    fn dedup_key_falls_back_to_author_and_text() {
        let a = review_dedup_key(None, Some("Ann"), "Lovely place.");
        let b = review_dedup_key(Some("   "), Some("ann"), "lovely place");
        let c = review_dedup_key(None, Some("Bob"), "Lovely place.");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
