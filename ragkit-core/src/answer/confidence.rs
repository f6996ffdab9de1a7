//! Heuristic confidence scoring
//!
//! Deterministic function of the retrieval quality and the answer shape —
//! never model-reported. Weights and thresholds are carried over from
//! production tuning.

/// Weight of the best source's relevance
const RELEVANCE_WEIGHT: f32 = 0.6;
/// Weight of the answer-length completeness score
const COMPLETENESS_WEIGHT: f32 = 0.2;
/// Weight of the source-count score
const COUNT_WEIGHT: f32 = 0.2;

/// Answer length (chars) at which completeness saturates
const FULL_LENGTH_CHARS: f32 = 200.0;
/// Answers shorter than this are "short"
const SHORT_ANSWER_CHARS: usize = 50;

/// Score a generated answer
///
/// - `best_relevance`: highest relevance among the sources used
/// - `num_sources`: number of sources used
/// - `answer_len`: answer length in characters
/// - `any_source_above_half`: whether any supplied source scored above 0.5
pub fn score(
    best_relevance: f32,
    num_sources: usize,
    answer_len: usize,
    any_source_above_half: bool,
) -> f32 {
    let mut completeness = (answer_len as f32 / FULL_LENGTH_CHARS).min(1.0);
    // Short-but-confident answers must not be penalized: a terse reply
    // backed by a highly relevant source is usually exactly right.
    if answer_len < SHORT_ANSWER_CHARS && best_relevance > 0.7 {
        completeness = completeness.max(0.7);
    }

    let count_score = (num_sources as f32 / 3.0).min(1.0);

    let mut confidence = RELEVANCE_WEIGHT * best_relevance
        + COMPLETENESS_WEIGHT * completeness
        + COUNT_WEIGHT * count_score;

    if best_relevance >= 0.9 {
        confidence *= 1.3;
    } else if best_relevance >= 0.7 {
        confidence *= 1.15;
    }
    confidence = confidence.min(1.0);

    if any_source_above_half {
        confidence = confidence.max(0.3);
    }

    confidence.clamp(0.1, 1.0)
}
