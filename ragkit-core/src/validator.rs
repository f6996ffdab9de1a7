//! Response validator
//!
//! A second, independent chat-completion call that fact-checks a generated
//! answer against the context passages it was produced from and returns a
//! structured grounding verdict. The validator is a safety net, not a hard
//! gate: its own unavailability defaults to accepting the answer at a
//! moderate confidence rather than blocking the response.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::message::Message;
use crate::provider::{ChatProvider, ChatRequest};
use crate::rag::RetrievedPassage;

/// How well the answer is supported by the sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroundingVerdict {
    /// Every claim is traceable to the sources
    Fully,
    /// Nearly all claims are supported
    Mostly,
    /// Some claims lack support
    Partially,
    /// The answer is not supported by the sources
    NotGrounded,
}

/// Structured fact-check result for one answer
///
/// Never persisted; used only to gate whether the answer is returned or
/// replaced with a fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the answer is grounded in the supplied sources
    pub is_grounded: bool,
    /// Graded verdict
    pub verdict: GroundingVerdict,
    /// Validator's confidence in its own verdict (0.0 to 1.0)
    pub confidence: f32,
    /// Claims in the answer with no support in the sources
    #[serde(default)]
    pub unsupported_claims: Vec<String>,
    /// Short explanation of the verdict
    #[serde(default)]
    pub reasoning: String,
}

/// Verdict plus whether the validator itself was able to run
#[derive(Debug, Clone)]
pub struct Verdict {
    /// The (possibly defaulted) validation result
    pub result: ValidationResult,
    /// True when the validator call failed or returned unparseable output
    pub inconclusive: bool,
}

/// Configuration for the response validator
///
/// The `reject_threshold` and `failure_confidence` defaults are empirically
/// chosen constants carried over from production tuning, deliberately
/// lenient in favor of availability. Treat them as tunables, not truths.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Model used for the fact-checking call
    pub model: String,
    /// Reject only when ungrounded AND below this confidence
    pub reject_threshold: f32,
    /// Confidence cap applied when the validator itself fails
    pub failure_confidence: f32,
    /// Token budget for the verdict
    pub max_tokens: u64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            reject_threshold: 0.4,
            failure_confidence: 0.6,
            max_tokens: 300,
        }
    }
}

/// Fact-checks generated answers against their context
pub struct ResponseValidator {
    provider: Arc<dyn ChatProvider>,
    config: ValidatorConfig,
}

const VALIDATOR_SYSTEM_PROMPT: &str = "\
You are a strict fact-checker. You receive a question, an answer, and the \
source passages the answer was generated from. Judge whether every factual \
claim in the answer is supported by the passages.

Rules:
- Generic, claim-free statements (greetings, \"please contact support\", \
offers to help further) are always permitted and must NOT be flagged.
- Only flag concrete factual claims that the passages do not support.
- Respond with ONLY a JSON object, no prose, in this exact shape:
{\"is_grounded\": bool, \"verdict\": \"fully|mostly|partially|not-grounded\", \
\"confidence\": number, \"unsupported_claims\": [string], \"reasoning\": string}";

impl ResponseValidator {
    /// Create a new validator
    pub fn new(provider: Arc<dyn ChatProvider>, config: ValidatorConfig) -> Self {
        Self { provider, config }
    }

    /// Fact-check an answer against its passages
    ///
    /// Never returns an error: a failed or unparseable validation yields an
    /// inconclusive accept verdict at [`ValidatorConfig::failure_confidence`].
    pub async fn validate(
        &self,
        question: &str,
        answer: &str,
        passages: &[RetrievedPassage],
    ) -> Verdict {
        match self.run_check(question, answer, passages).await {
            Ok(result) => {
                debug!(
                    is_grounded = result.is_grounded,
                    confidence = result.confidence,
                    "validation verdict"
                );
                Verdict {
                    result,
                    inconclusive: false,
                }
            }
            Err(e) => {
                warn!("Validator unavailable, accepting answer at reduced confidence: {}", e);
                Verdict {
                    result: ValidationResult {
                        is_grounded: true,
                        verdict: GroundingVerdict::Mostly,
                        confidence: self.config.failure_confidence,
                        unsupported_claims: Vec::new(),
                        reasoning: "Validator unavailable; answer accepted by default".to_string(),
                    },
                    inconclusive: true,
                }
            }
        }
    }

    /// Gate decision: suppress the answer?
    ///
    /// Deliberately lenient: reject only an explicitly ungrounded verdict
    /// held with low confidence. An inconclusive verdict never rejects.
    pub fn should_reject(&self, verdict: &Verdict) -> bool {
        !verdict.inconclusive
            && !verdict.result.is_grounded
            && verdict.result.confidence < self.config.reject_threshold
    }

    /// Confidence ceiling for answers accepted on validator failure
    pub fn failure_confidence(&self) -> f32 {
        self.config.failure_confidence
    }

    async fn run_check(
        &self,
        question: &str,
        answer: &str,
        passages: &[RetrievedPassage],
    ) -> Result<ValidationResult> {
        let mut sources = String::new();
        for (i, passage) in passages.iter().enumerate() {
            sources.push_str(&format!("[{}] {}\n{}\n\n", i + 1, passage.title, passage.content));
        }

        let user_prompt = format!(
            "Question:\n{}\n\nAnswer to check:\n{}\n\nSource passages:\n{}",
            question, answer, sources
        );

        let request = ChatRequest {
            model: self.config.model.clone(),
            system_prompt: Some(VALIDATOR_SYSTEM_PROMPT.to_string()),
            messages: vec![Message::user(user_prompt)],
            temperature: Some(0.0),
            max_tokens: Some(self.config.max_tokens),
            json_mode: true,
        };

        let completion = self.provider.complete(request).await?;
        parse_verdict_json(&completion.text)
    }
}

/// Extract and parse the verdict JSON, tolerating code fences and prose
fn parse_verdict_json(raw: &str) -> Result<ValidationResult> {
    let trimmed = raw.trim();
    let start = trimmed
        .find('{')
        .ok_or_else(|| Error::ValidatorParse("no JSON object in validator output".to_string()))?;
    let end = trimmed
        .rfind('}')
        .ok_or_else(|| Error::ValidatorParse("unterminated JSON object".to_string()))?;
    if end < start {
        return Err(Error::ValidatorParse("malformed validator output".to_string()));
    }
    serde_json::from_str(&trimmed[start..=end])
        .map_err(|e| Error::ValidatorParse(format!("bad verdict JSON: {}", e)))
}
