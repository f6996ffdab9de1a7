//! Answer generation service
//!
//! The pipeline per request:
//!
//! `cache lookup -> (hit: return) | (miss: build context -> generate ->
//! post-process -> validate -> (pass: cache write + return) | (fail:
//! fallback))`
//!
//! Callers always receive a well-formed [`GeneratedAnswer`]; runtime backend
//! failures degrade to the fallback answer instead of surfacing.

mod confidence;
mod postprocess;
mod suggest;

pub use confidence::score as confidence_score;
pub use postprocess::clean_answer;
pub use suggest::suggest_questions;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::embedding::EmbeddingService;
use crate::message::{Message, Role};
use crate::provider::{ChatProvider, ChatRequest};
use crate::rag::RetrievedPassage;
use crate::response_cache::{CachedResponse, ResponseCache, SourceRef};
use crate::validator::ResponseValidator;

/// Answer language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English
    #[default]
    En,
    /// Dutch
    Nl,
}

impl Language {
    /// Human-readable name used in prompts
    pub fn name(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Nl => "Dutch",
        }
    }

    /// Fixed "insufficient information" answer for this language
    pub fn fallback_message(&self) -> &'static str {
        match self {
            Language::En => {
                "I don't have enough information to answer that question. \
                 Please contact us directly and we will be happy to help."
            }
            Language::Nl => {
                "Ik heb niet genoeg informatie om deze vraag te beantwoorden. \
                 Neem gerust direct contact met ons op, dan helpen we u verder."
            }
        }
    }
}

/// Per-request options for answer generation
#[derive(Debug, Clone, Default)]
pub struct AnswerOptions {
    /// Persona/tone instructions (replaces the default persona)
    pub tone: Option<String>,
    /// Target language
    pub language: Language,
    /// Model override
    pub model: Option<String>,
    /// Sampling temperature override
    pub temperature: Option<f64>,
    /// Token budget override
    pub max_tokens: Option<u64>,
    /// Trailing conversation turns (oldest first)
    pub conversation_history: Vec<Message>,
    /// Full system prompt override (skips persona + rules composition)
    pub system_prompt: Option<String>,
}

/// The pipeline's output: always well-formed, never an error
#[derive(Debug, Clone)]
pub struct GeneratedAnswer {
    /// The answer text (or the fixed fallback)
    pub answer: String,
    /// Heuristic confidence in [0.1, 1.0]
    pub confidence: f32,
    /// Sources the answer drew on, ordered by relevance
    pub sources: Vec<SourceRef>,
    /// Tokens consumed (0 when no model was called)
    pub tokens_used: u32,
    /// At most three follow-up suggestions
    pub suggested_questions: Vec<String>,
}

/// Configuration for the answer service
#[derive(Debug, Clone)]
pub struct AnswerConfig {
    /// Default chat model
    pub model: String,
    /// Default sampling temperature (low: accuracy matters)
    pub temperature: f64,
    /// Default token budget
    pub max_tokens: u64,
    /// Passages below this relevance are not shown to the model
    pub min_relevance: f32,
    /// Passages rendered into the prompt (more than are ultimately cited)
    pub context_passages: usize,
    /// Passages reported back as sources
    pub cited_sources: usize,
    /// Trailing history turns sent to the model
    pub max_history_turns: usize,
    /// Persona used when the caller supplies no tone
    pub default_persona: String,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.1,
            max_tokens: 500,
            min_relevance: 0.3,
            context_passages: 5,
            cited_sources: 3,
            max_history_turns: 6,
            default_persona: "You are a friendly, knowledgeable assistant for this organization."
                .to_string(),
        }
    }
}

/// Fixed answering rules appended to every composed system prompt
const ANSWERING_RULES: &str = "\
Rules:
- Answer ONLY from the supplied sources. If they do not contain the answer, say so.
- Use markdown lists and emphasis sparingly where they aid clarity.
- Cite sources inline by index, e.g. [1].
- Do not open with meta-commentary such as \"based on the sources\".
- Keep the answer between roughly 30 and 120 words.
- Speak directly to the user.
- Never give medical, legal or financial advice.
- When the question is ambiguous, ask for clarification instead of guessing.";

/// RAG answer generation service
pub struct AnswerService {
    provider: Arc<dyn ChatProvider>,
    embeddings: Arc<EmbeddingService>,
    response_cache: Arc<ResponseCache>,
    validator: Arc<ResponseValidator>,
    config: AnswerConfig,
}

impl AnswerService {
    /// Create a new answer service
    ///
    /// All collaborators are injected; the service owns no global state.
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        embeddings: Arc<EmbeddingService>,
        response_cache: Arc<ResponseCache>,
        validator: Arc<ResponseValidator>,
        config: AnswerConfig,
    ) -> Self {
        Self {
            provider,
            embeddings,
            response_cache,
            validator,
            config,
        }
    }

    /// Generate an answer for a question over pre-retrieved passages
    pub async fn generate_answer(
        &self,
        question: &str,
        passages: &[RetrievedPassage],
        options: &AnswerOptions,
    ) -> GeneratedAnswer {
        let request_id = uuid::Uuid::new_v4();
        debug!(%request_id, passages = passages.len(), "answer request");

        // Zero-context short-circuit: no model call at all
        if passages.is_empty() {
            debug!(%request_id, "no context supplied, returning fallback without model call");
            return self.fallback(options.language, 0, Vec::new());
        }

        let embedding = self.embeddings.embed(question).await;
        let history = &options.conversation_history;
        let has_history = !history.is_empty();
        let cache_key = self.response_cache.key(&embedding, passages, history);

        if let Some(hit) = self.response_cache.get(&cache_key, has_history) {
            info!(%request_id, "serving cached answer");
            return GeneratedAnswer {
                answer: hit.answer,
                confidence: hit.confidence,
                sources: hit.sources_used,
                tokens_used: hit.tokens_used,
                suggested_questions: suggest_questions(question, options.language),
            };
        }

        // Build context from passages clearing the relevance bar
        let mut ranked: Vec<&RetrievedPassage> = passages
            .iter()
            .filter(|p| p.score >= self.config.min_relevance)
            .collect();
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(self.config.context_passages);

        if ranked.is_empty() {
            debug!("no passage cleared the relevance threshold, returning fallback");
            return self.fallback(options.language, 0, Vec::new());
        }

        let request = self.build_request(question, &ranked, options);
        let completion = match self.provider.complete(request).await {
            Ok(completion) => completion,
            Err(e) => {
                error!("chat completion failed, returning fallback: {}", e);
                return self.fallback(options.language, 0, Vec::new());
            }
        };

        let answer = clean_answer(&completion.text);

        let sources: Vec<SourceRef> = ranked
            .iter()
            .take(self.config.cited_sources)
            .map(|p| SourceRef::from(*p))
            .collect();
        let best_relevance = sources
            .first()
            .map(|s| s.relevance_score)
            .unwrap_or(0.0);
        let any_above_half = passages.iter().any(|p| p.score > 0.5);
        let mut confidence =
            confidence_score(best_relevance, sources.len(), answer.chars().count(), any_above_half);

        // Grounding check
        let context: Vec<RetrievedPassage> = ranked.iter().map(|p| (*p).clone()).collect();
        let verdict = self.validator.validate(question, &answer, &context).await;
        if self.validator.should_reject(&verdict) {
            info!(
                unsupported = verdict.result.unsupported_claims.len(),
                "answer rejected as ungrounded, returning fallback"
            );
            return self.fallback(options.language, completion.tokens_used, Vec::new());
        }
        if verdict.inconclusive {
            confidence = confidence.min(self.validator.failure_confidence());
        }

        // Cache write; admission (confidence bar) is the cache's decision
        self.response_cache.store(
            &cache_key,
            CachedResponse {
                answer: answer.clone(),
                confidence,
                sources_used: sources.clone(),
                tokens_used: completion.tokens_used,
                created_at: chrono::Utc::now(),
            },
        );

        GeneratedAnswer {
            answer,
            confidence,
            sources,
            tokens_used: completion.tokens_used,
            suggested_questions: suggest_questions(question, options.language),
        }
    }

    fn fallback(
        &self,
        language: Language,
        tokens_used: u32,
        sources: Vec<SourceRef>,
    ) -> GeneratedAnswer {
        GeneratedAnswer {
            answer: language.fallback_message().to_string(),
            confidence: 0.1,
            sources,
            tokens_used,
            suggested_questions: Vec::new(),
        }
    }

    fn build_request(
        &self,
        question: &str,
        ranked: &[&RetrievedPassage],
        options: &AnswerOptions,
    ) -> ChatRequest {
        let system_prompt = match &options.system_prompt {
            Some(prompt) => prompt.clone(),
            None => self.compose_system_prompt(ranked, options),
        };

        // Trailing history window, then the current question
        let history = &options.conversation_history;
        let skip = history.len().saturating_sub(self.config.max_history_turns);
        let mut messages: Vec<Message> = history.iter().skip(skip).cloned().collect();
        messages.push(Message::user(question));

        ChatRequest {
            model: options.model.clone().unwrap_or_else(|| self.config.model.clone()),
            system_prompt: Some(system_prompt),
            messages,
            temperature: Some(options.temperature.unwrap_or(self.config.temperature)),
            max_tokens: Some(options.max_tokens.unwrap_or(self.config.max_tokens)),
            json_mode: false,
        }
    }

    fn compose_system_prompt(
        &self,
        ranked: &[&RetrievedPassage],
        options: &AnswerOptions,
    ) -> String {
        let persona = options
            .tone
            .clone()
            .unwrap_or_else(|| self.config.default_persona.clone());

        let mut prompt = format!(
            "{}\n\nAnswer in {}.\n\n{}\n\nSources:\n",
            persona,
            options.language.name(),
            ANSWERING_RULES
        );

        for (i, passage) in ranked.iter().enumerate() {
            prompt.push_str(&format!(
                "[{}] {} ({}% relevant)\n",
                i + 1,
                passage.title,
                (passage.score * 100.0).round() as u32
            ));
            if let Some(url) = &passage.url {
                prompt.push_str(&format!("URL: {}\n", url));
            }
            prompt.push_str(&passage.content);
            prompt.push_str("\n\n");
        }

        if !options.conversation_history.is_empty() {
            prompt.push_str("Recent conversation:\n");
            let skip = options
                .conversation_history
                .len()
                .saturating_sub(self.config.max_history_turns);
            for turn in options.conversation_history.iter().skip(skip) {
                let label = match turn.role {
                    Role::User => "User",
                    Role::Assistant => "Assistant",
                    Role::System => "System",
                };
                prompt.push_str(&format!("{}: {}\n", label, turn.content));
            }
        }

        prompt
    }
}
