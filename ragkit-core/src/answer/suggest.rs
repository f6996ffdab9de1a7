//! Rule-based follow-up suggestions
//!
//! A cheap generator that inspects the question for interrogative keywords
//! in the target language and picks from a fixed bank. No model call; the
//! output is deterministic so cached answers can regenerate suggestions.

use super::Language;

/// Maximum suggestions returned
const MAX_SUGGESTIONS: usize = 3;

struct SuggestionRule {
    keywords: &'static [&'static str],
    suggestions: &'static [&'static str],
}

const EN_RULES: &[SuggestionRule] = &[
    SuggestionRule {
        keywords: &["what", "which"],
        suggestions: &[
            "How does this work in practice?",
            "What are the costs involved?",
            "Where can I find more details?",
        ],
    },
    SuggestionRule {
        keywords: &["how"],
        suggestions: &[
            "What do I need to get started?",
            "How long does this usually take?",
            "Is there a step-by-step guide?",
        ],
    },
    SuggestionRule {
        keywords: &["price", "cost", "fee", "pricing"],
        suggestions: &[
            "Are there any discounts available?",
            "What payment methods do you accept?",
            "Can I cancel at any time?",
        ],
    },
    SuggestionRule {
        keywords: &["when", "time", "hours"],
        suggestions: &[
            "Are you open on weekends?",
            "How can I make an appointment?",
            "What is the best way to reach you?",
        ],
    },
];

const NL_RULES: &[SuggestionRule] = &[
    SuggestionRule {
        keywords: &["wat", "welke"],
        suggestions: &[
            "Hoe werkt dit in de praktijk?",
            "Wat zijn de kosten?",
            "Waar vind ik meer informatie?",
        ],
    },
    SuggestionRule {
        keywords: &["hoe"],
        suggestions: &[
            "Wat heb ik nodig om te beginnen?",
            "Hoe lang duurt dit gewoonlijk?",
            "Is er een stappenplan?",
        ],
    },
    SuggestionRule {
        keywords: &["prijs", "kosten", "tarief"],
        suggestions: &[
            "Zijn er kortingen beschikbaar?",
            "Welke betaalmethoden accepteren jullie?",
            "Kan ik op elk moment opzeggen?",
        ],
    },
    SuggestionRule {
        keywords: &["wanneer", "openingstijden", "tijd"],
        suggestions: &[
            "Zijn jullie in het weekend open?",
            "Hoe kan ik een afspraak maken?",
            "Wat is de beste manier om contact op te nemen?",
        ],
    },
];

const EN_GENERIC: &[&str] = &[
    "How can I contact you?",
    "Where are you located?",
    "What services do you offer?",
];

const NL_GENERIC: &[&str] = &[
    "Hoe kan ik contact opnemen?",
    "Waar zijn jullie gevestigd?",
    "Welke diensten bieden jullie aan?",
];

/// Generate at most three follow-up questions for a given question
pub fn suggest_questions(question: &str, language: Language) -> Vec<String> {
    let lowered = question.to_lowercase();
    let (rules, generic) = match language {
        Language::En => (EN_RULES, EN_GENERIC),
        Language::Nl => (NL_RULES, NL_GENERIC),
    };

    for rule in rules {
        if rule.keywords.iter().any(|k| lowered.contains(k)) {
            return rule
                .suggestions
                .iter()
                .take(MAX_SUGGESTIONS)
                .map(|s| (*s).to_string())
                .collect();
        }
    }

    generic
        .iter()
        .take(MAX_SUGGESTIONS)
        .map(|s| (*s).to_string())
        .collect()
}
