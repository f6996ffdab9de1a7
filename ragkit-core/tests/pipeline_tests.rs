//! End-to-end tests for the answer pipeline
//!
//! Wires the full service graph (embeddings, response cache, validator,
//! answer generation) against scripted in-memory backends and checks the
//! behavior a caller observes: cache short-circuits, fallbacks, and the
//! grounding gate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ragkit_core::answer::{AnswerConfig, AnswerOptions, AnswerService, Language};
use ragkit_core::cache::{CacheConfig, CacheManager};
use ragkit_core::embedding::{EmbeddingConfig, EmbeddingService};
use ragkit_core::error::{Error, Result};
use ragkit_core::provider::{ChatProvider, ChatRequest, Completion};
use ragkit_core::rag::{EmbeddingBackend, RetrievedPassage};
use ragkit_core::response_cache::{ResponseCache, ResponseCacheConfig};
use ragkit_core::streaming::{MockStreamBuilder, StreamingResponse};
use ragkit_core::validator::{ResponseValidator, ValidatorConfig};

/// Chat backend that always returns one canned response and counts calls
struct ScriptedProvider {
    response: String,
    tokens: u32,
    fail: bool,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            tokens: 120,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("")
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn complete(&self, _request: ChatRequest) -> Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::ProviderApi("scripted failure".to_string()));
        }
        Ok(Completion {
            text: self.response.clone(),
            tokens_used: self.tokens,
        })
    }

    async fn stream_completion(&self, _request: ChatRequest) -> Result<StreamingResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(MockStreamBuilder::new()
            .message(self.response.clone())
            .done()
            .build())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Deterministic embedding backend
struct FixedEmbeddings;

#[async_trait]
impl EmbeddingBackend for FixedEmbeddings {
    async fn embed_batch(&self, _model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| vec![t.trim().to_lowercase().len() as f32 / 100.0, 0.5])
            .collect())
    }
}

const GROUNDED_VERDICT: &str = r#"{"is_grounded": true, "verdict": "fully",
    "confidence": 0.95, "unsupported_claims": [], "reasoning": "Supported."}"#;

fn service(
    answer_provider: Arc<ScriptedProvider>,
    validator_provider: Arc<ScriptedProvider>,
) -> AnswerService {
    let cache = Arc::new(CacheManager::new(CacheConfig::default()));
    let embeddings = Arc::new(EmbeddingService::new(
        Arc::new(FixedEmbeddings),
        cache,
        EmbeddingConfig {
            dimensions: 2,
            ..Default::default()
        },
    ));
    AnswerService::new(
        answer_provider,
        embeddings,
        Arc::new(ResponseCache::new(ResponseCacheConfig::default())),
        Arc::new(ResponseValidator::new(
            validator_provider,
            ValidatorConfig::default(),
        )),
        AnswerConfig::default(),
    )
}

fn opening_hours_passage() -> RetrievedPassage {
    RetrievedPassage::new(
        "uren-1",
        "Openingstijden",
        "Wij zijn geopend van maandag t/m vrijdag, van 9:00 tot 17:00 uur.",
        0.92,
    )
    .with_doc_type("faq")
}

#[tokio::test]
async fn test_dutch_end_to_end_with_cache_hit() {
    let provider = Arc::new(ScriptedProvider::new(
        "De openingstijden zijn maandag t/m vrijdag van 9:00 tot 17:00 uur.",
    ));
    let validator = Arc::new(ScriptedProvider::new(GROUNDED_VERDICT));
    let svc = service(provider.clone(), validator);

    let passages = vec![opening_hours_passage()];
    let options = AnswerOptions {
        language: Language::Nl,
        ..Default::default()
    };

    let answer = svc
        .generate_answer("Wat zijn de openingstijden?", &passages, &options)
        .await;

    assert!(answer.answer.contains("9:00"));
    assert!(answer.answer.contains("17:00"));
    assert!(answer.confidence >= 0.7, "confidence was {}", answer.confidence);
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].document_name, "Openingstijden");
    assert!(answer.tokens_used > 0);
    assert!(!answer.suggested_questions.is_empty());
    assert!(answer.suggested_questions.len() <= 3);
    assert_eq!(provider.call_count(), 1);

    // Identical request is served from the response cache, no second model call
    let cached = svc
        .generate_answer("Wat zijn de openingstijden?", &passages, &options)
        .await;
    assert_eq!(cached.answer, answer.answer);
    assert_eq!(cached.confidence, answer.confidence);
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_no_context_short_circuits_without_model_call() {
    let provider = Arc::new(ScriptedProvider::new("should never be called"));
    let validator = Arc::new(ScriptedProvider::new(GROUNDED_VERDICT));
    let svc = service(provider.clone(), validator.clone());

    let answer = svc
        .generate_answer("What are your opening hours?", &[], &AnswerOptions::default())
        .await;

    assert_eq!(answer.answer, Language::En.fallback_message());
    assert!((answer.confidence - 0.1).abs() < 1e-6);
    assert_eq!(answer.tokens_used, 0);
    assert!(answer.sources.is_empty());
    assert!(answer.suggested_questions.is_empty());
    assert_eq!(provider.call_count(), 0);
    assert_eq!(validator.call_count(), 0);
}

#[tokio::test]
async fn test_all_passages_below_relevance_threshold_fall_back() {
    let provider = Arc::new(ScriptedProvider::new("should never be called"));
    let validator = Arc::new(ScriptedProvider::new(GROUNDED_VERDICT));
    let svc = service(provider.clone(), validator);

    let passages = vec![RetrievedPassage::new("p1", "Noise", "irrelevant", 0.1)];
    let answer = svc
        .generate_answer("What is the price?", &passages, &AnswerOptions::default())
        .await;

    assert_eq!(answer.answer, Language::En.fallback_message());
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_provider_failure_degrades_to_fallback() {
    let provider = Arc::new(ScriptedProvider::failing());
    let validator = Arc::new(ScriptedProvider::new(GROUNDED_VERDICT));
    let svc = service(provider.clone(), validator);

    let passages = vec![opening_hours_passage()];
    let options = AnswerOptions {
        language: Language::Nl,
        ..Default::default()
    };
    let answer = svc
        .generate_answer("Wat zijn de openingstijden?", &passages, &options)
        .await;

    assert_eq!(answer.answer, Language::Nl.fallback_message());
    assert!((answer.confidence - 0.1).abs() < 1e-6);
    assert_eq!(answer.tokens_used, 0);
}

#[tokio::test]
async fn test_ungrounded_low_confidence_verdict_rejects_answer() {
    let provider = Arc::new(ScriptedProvider::new(
        "Our premium plan costs 99 euros per month.",
    ));
    let validator = Arc::new(ScriptedProvider::new(
        r#"{"is_grounded": false, "verdict": "not-grounded", "confidence": 0.2,
            "unsupported_claims": ["price claim"], "reasoning": "No pricing in sources."}"#,
    ));
    let svc = service(provider.clone(), validator);

    let passages = vec![RetrievedPassage::new(
        "faq-1",
        "About us",
        "We are a family business founded in 1987.",
        0.8,
    )];
    let answer = svc
        .generate_answer("How much does it cost?", &passages, &AnswerOptions::default())
        .await;

    // Rejected: fallback text, but the tokens spent are still reported
    assert_eq!(answer.answer, Language::En.fallback_message());
    assert!((answer.confidence - 0.1).abs() < 1e-6);
    assert_eq!(answer.tokens_used, 120);
    assert!(answer.suggested_questions.is_empty());
}

#[tokio::test]
async fn test_ungrounded_but_confident_verdict_is_accepted() {
    let provider = Arc::new(ScriptedProvider::new(
        "We were founded in 1987 as a family business.",
    ));
    // Ungrounded but held at 0.5 confidence: above the 0.4 reject threshold
    let validator = Arc::new(ScriptedProvider::new(
        r#"{"is_grounded": false, "verdict": "partially", "confidence": 0.5,
            "unsupported_claims": [], "reasoning": "Mostly matches."}"#,
    ));
    let svc = service(provider.clone(), validator);

    let passages = vec![RetrievedPassage::new(
        "faq-1",
        "About us",
        "We are a family business founded in 1987.",
        0.8,
    )];
    let answer = svc
        .generate_answer("When were you founded?", &passages, &AnswerOptions::default())
        .await;

    assert_eq!(answer.answer, "We were founded in 1987 as a family business.");
    assert_ne!(answer.answer, Language::En.fallback_message());
}

#[tokio::test]
async fn test_validator_failure_caps_confidence() {
    // High-relevance context and a long answer would normally score 1.0
    let long_answer = "The workshop runs every Saturday morning from ten until \
        noon and covers the full beginner curriculum, including materials, a \
        guided practice session, and a question round at the end. Registration \
        closes two days in advance and participation is limited to twelve people \
        per session so everyone gets individual attention.";
    let provider = Arc::new(ScriptedProvider::new(long_answer));
    let validator = Arc::new(ScriptedProvider::new("I am not able to judge this."));
    let svc = service(provider.clone(), validator);

    let passages = vec![
        RetrievedPassage::new("w-1", "Workshop schedule", "Saturdays 10:00-12:00.", 0.95),
        RetrievedPassage::new("w-2", "Registration", "Closes two days ahead.", 0.9),
        RetrievedPassage::new("w-3", "Capacity", "Twelve participants max.", 0.85),
    ];
    let answer = svc
        .generate_answer("When is the workshop?", &passages, &AnswerOptions::default())
        .await;

    // Unparseable verdict is inconclusive: answer kept, confidence capped
    assert_eq!(answer.answer, long_answer);
    assert!((answer.confidence - 0.6).abs() < 1e-6);
}

#[tokio::test]
async fn test_history_is_part_of_the_cache_key() {
    let provider = Arc::new(ScriptedProvider::new(
        "De openingstijden zijn maandag t/m vrijdag van 9:00 tot 17:00 uur.",
    ));
    let validator = Arc::new(ScriptedProvider::new(GROUNDED_VERDICT));
    let svc = service(provider.clone(), validator);

    let passages = vec![opening_hours_passage()];
    let standalone = AnswerOptions {
        language: Language::Nl,
        ..Default::default()
    };
    let with_history = AnswerOptions {
        language: Language::Nl,
        conversation_history: vec![
            ragkit_core::message::Message::user("Zijn jullie in het weekend open?"),
            ragkit_core::message::Message::assistant("Nee, alleen doordeweeks."),
        ],
        ..Default::default()
    };

    svc.generate_answer("Wat zijn de openingstijden?", &passages, &standalone)
        .await;
    assert_eq!(provider.call_count(), 1);

    // Same question with history must not hit the standalone entry
    svc.generate_answer("Wat zijn de openingstijden?", &passages, &with_history)
        .await;
    assert_eq!(provider.call_count(), 2);
}
