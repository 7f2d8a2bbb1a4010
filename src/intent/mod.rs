//! Navigation intent detection
//!
//! Given an utterance and a conversation context, decide whether the user
//! wants the web client to navigate somewhere, and where. Detection is
//! stateless and never fails: any upstream problem degrades to a
//! no-intent result so the client always gets a well-formed answer.

mod detector;

pub use detector::{IntentDetector, KeywordIntentDetector, LlmIntentDetector};

use serde::{Deserialize, Serialize};

/// Request body for intent detection, as sent by the web client
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentRequest {
    /// Utterance text, usually a transcript
    pub text: String,
    /// Conversation context id, `general` when absent
    #[serde(default)]
    pub context_id: Option<String>,
}

/// Outcome of intent detection, serialized camelCase for the web client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentResult {
    /// Whether the utterance asks to navigate
    pub has_navigation_intent: bool,
    /// Page to navigate to; always `None` when there is no intent,
    /// always `Some` when there is one
    pub target_page: Option<String>,
    /// Detection confidence in `[0.0, 1.0]`
    pub confidence: f32,
    /// Short human-readable explanation of the decision
    pub reasoning: String,
}

impl IntentResult {
    /// The no-intent result, used both for genuine non-navigation
    /// utterances and as the safe fallback when detection is impossible
    #[must_use]
    pub fn no_intent(reasoning: impl Into<String>) -> Self {
        Self {
            has_navigation_intent: false,
            target_page: None,
            confidence: 0.0,
            reasoning: reasoning.into(),
        }
    }

    /// A navigation result; clamps `confidence` into `[0.0, 1.0]`
    #[must_use]
    pub fn navigation(
        target_page: impl Into<String>,
        confidence: f32,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            has_navigation_intent: true,
            target_page: Some(target_page.into()),
            confidence: clamp_confidence(confidence),
            reasoning: reasoning.into(),
        }
    }
}

/// Clamp a confidence score into `[0.0, 1.0]`, mapping non-finite input to `0.0`
#[must_use]
pub fn clamp_confidence(confidence: f32) -> f32 {
    if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
