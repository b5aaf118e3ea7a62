//! Content hashing for cache keys and request correlation

use sha2::{Digest, Sha256};

use crate::analysis::AnalysisOptions;

/// Namespace for analysis results in the durable store
pub const CACHE_KEY_PREFIX: &str = "analysis:";

/// Hash of the text together with the options it is analyzed with.
///
/// Two requests with the same text but different options never share a key.
pub fn content_hash(text: &str, options: &AnalysisOptions) -> String {
    let payload = serde_json::json!({
        "text": text,
        "options": options,
    });

    let mut hasher = Sha256::new();
    hasher.update(payload.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

pub fn cache_key(hash: &str) -> String {
    format!("{CACHE_KEY_PREFIX}{hash}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_hash_is_hex_sha256() {
        let hash = content_hash("Hello world.", &AnalysisOptions::default());

        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_options_change_the_hash() {
        let options = AnalysisOptions::default();
        let no_style = AnalysisOptions {
            style: false,
            ..Default::default()
        };

        assert_ne!(
            content_hash("Same text", &options),
            content_hash("Same text", &no_style)
        );
    }

    #[test]
    fn test_cache_key_is_namespaced() {
        assert_eq!(cache_key("abc"), "analysis:abc");
    }

    proptest! {
        #[test]
        fn prop_hash_is_deterministic(text in ".{0,200}") {
            let options = AnalysisOptions::default();
            prop_assert_eq!(content_hash(&text, &options), content_hash(&text, &options));
        }

        #[test]
        fn prop_distinct_texts_distinct_hashes(a in "[a-z]{1,20}", b in "[a-z]{1,20}") {
            prop_assume!(a != b);
            let options = AnalysisOptions::default();
            prop_assert_ne!(content_hash(&a, &options), content_hash(&b, &options));
        }
    }
}
