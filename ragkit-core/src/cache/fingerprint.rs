//! Deterministic content fingerprints for cache keys
//!
//! Two key schemes live here:
//!
//! - [`content_hash`]: normalized text digest used to deduplicate embedding
//!   work. Trim + lowercase before hashing so trivial formatting differences
//!   share one cached vector, while different text never collides.
//! - [`response_fingerprint`]: composite key for the response cache. It folds
//!   in the question embedding (rounded to a fixed precision to tolerate
//!   floating-point noise), the top retrieved passages with their scores, and
//!   the most recent conversation turns. Two requests share a key iff all
//!   three components match, so a changed knowledge base or conversation
//!   state never returns a stale answer.

use sha2::{Digest, Sha256};

use crate::message::Message;
use crate::rag::RetrievedPassage;

/// Number of top passages folded into the response fingerprint
pub const FINGERPRINT_TOP_PASSAGES: usize = 3;

/// Number of trailing conversation turns folded into the response fingerprint
pub const FINGERPRINT_HISTORY_TURNS: usize = 3;

/// Characters of each history turn included in the fingerprint
const HISTORY_TURN_PREFIX_CHARS: usize = 100;

/// Hash normalized text content (trimmed, lower-cased) with SHA-256
pub fn content_hash(text: &str) -> String {
    let normalized = text.trim().to_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());
    format!("{:x}", digest)
}

/// Round a float to `precision` decimal places
fn round_to(value: f32, precision: u32) -> f32 {
    let factor = 10f32.powi(precision as i32);
    (value * factor).round() / factor
}

/// Build the composite response-cache key
///
/// `embedding_precision` is the number of decimal places the question
/// embedding is rounded to before hashing. It is a tunable tolerance against
/// embedding-model nondeterminism; the default lives in
/// [`crate::response_cache::ResponseCacheConfig`].
pub fn response_fingerprint(
    embedding: &[f32],
    passages: &[RetrievedPassage],
    history: &[Message],
    embedding_precision: u32,
) -> String {
    let mut hasher = Sha256::new();

    for value in embedding {
        hasher.update(round_to(*value, embedding_precision).to_le_bytes());
    }
    hasher.update(b"|ctx|");

    for passage in passages.iter().take(FINGERPRINT_TOP_PASSAGES) {
        hasher.update(passage.id.as_bytes());
        hasher.update(b":");
        hasher.update(round_to(passage.score, 2).to_le_bytes());
        hasher.update(b";");
    }
    hasher.update(b"|hist|");

    let skip = history.len().saturating_sub(FINGERPRINT_HISTORY_TURNS);
    for turn in history.iter().skip(skip) {
        hasher.update(turn.role.as_str().as_bytes());
        hasher.update(b"=");
        let prefix: String = turn.content.chars().take(HISTORY_TURN_PREFIX_CHARS).collect();
        hasher.update(prefix.as_bytes());
        hasher.update(b";");
    }

    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_normalizes() {
        assert_eq!(content_hash("  Hello World  "), content_hash("hello world"));
        assert_ne!(content_hash("hello world"), content_hash("hello worlds"));
    }

    #[test]
    fn test_fingerprint_stable() {
        let emb = vec![0.1, 0.2, 0.3];
        let passages = vec![RetrievedPassage::new("p1", "Title", "Body", 0.9)];
        let a = response_fingerprint(&emb, &passages, &[], 4);
        let b = response_fingerprint(&emb, &passages, &[], 4);
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_tolerates_rounding_noise() {
        let emb_a = vec![0.12341, 0.5];
        let emb_b = vec![0.12344, 0.5];
        let passages = vec![RetrievedPassage::new("p1", "Title", "Body", 0.9)];
        assert_eq!(
            response_fingerprint(&emb_a, &passages, &[], 4),
            response_fingerprint(&emb_b, &passages, &[], 4)
        );
    }

    #[test]
    fn test_fingerprint_sensitive_to_context() {
        let emb = vec![0.1, 0.2];
        let passages_a = vec![RetrievedPassage::new("p1", "Title", "Body", 0.9)];
        let passages_b = vec![RetrievedPassage::new("p2", "Title", "Body", 0.9)];
        let passages_c = vec![RetrievedPassage::new("p1", "Title", "Body", 0.4)];
        let key_a = response_fingerprint(&emb, &passages_a, &[], 4);
        assert_ne!(key_a, response_fingerprint(&emb, &passages_b, &[], 4));
        assert_ne!(key_a, response_fingerprint(&emb, &passages_c, &[], 4));
    }

    #[test]
    fn test_fingerprint_sensitive_to_history() {
        let emb = vec![0.1, 0.2];
        let passages = vec![RetrievedPassage::new("p1", "Title", "Body", 0.9)];
        let no_history = response_fingerprint(&emb, &passages, &[], 4);
        let with_history = response_fingerprint(
            &emb,
            &passages,
            &[Message::user("earlier question")],
            4,
        );
        assert_ne!(no_history, with_history);
    }
}
