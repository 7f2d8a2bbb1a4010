//! Intent detector implementations
//!
//! Two detectors share one trait: an LLM-backed classifier used when an
//! OpenAI key is configured, and a keyword matcher that keeps the gateway
//! working deterministically without one. Model output is never trusted:
//! it is parsed leniently and coerced field by field at this boundary.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::context::{
    ContextRegistry, ConversationContext, FALLBACK_PAGE, KeywordMatcher,
};
use crate::intent::{IntentResult, clamp_confidence};
use crate::llm::{ChatClient, ChatMessage, JsonSchemaFormat};

/// Confidence reported for keyword hits, which are exact by construction
const KEYWORD_CONFIDENCE: f32 = 0.9;

/// Classifies utterances into navigation intents
///
/// `detect` is infallible by contract: implementations map every internal
/// failure to a no-intent result instead of surfacing an error.
#[async_trait]
pub trait IntentDetector: Send + Sync {
    /// Classify `text` within `context`
    async fn detect(&self, text: &str, context: &ConversationContext) -> IntentResult;
}

/// LLM-backed intent classifier
pub struct LlmIntentDetector {
    client: Arc<ChatClient>,
}

impl LlmIntentDetector {
    /// Create a detector over an existing chat client
    #[must_use]
    pub fn new(client: Arc<ChatClient>) -> Self {
        Self { client }
    }

    fn system_prompt(context: &ConversationContext) -> String {
        let pages: Vec<String> = context
            .pages()
            .into_iter()
            .map(|page| {
                let description = context
                    .navigation_commands
                    .iter()
                    .find(|command| command.target_page == page && command.description.is_some())
                    .and_then(|command| command.description.as_deref())
                    .unwrap_or("");
                format!("- {page}: {description}")
            })
            .collect();

        format!(
            "You are the intent classifier of a banking web assistant. \
             Users speak Spanish or English. Decide whether the utterance asks \
             to open or use one of these pages:\n{}\n\
             Navigation intent means the user wants to go to a page or perform \
             the action it offers. Greetings, small talk and informational \
             questions are not navigation intents. `targetPage` must be exactly \
             one of the listed paths, or null when there is no intent. \
             `confidence` is between 0.0 and 1.0. Keep `reasoning` to one short \
             sentence.",
            pages.join("\n")
        )
    }

    fn response_schema() -> JsonSchemaFormat {
        JsonSchemaFormat {
            name: "navigation_intent".to_string(),
            strict: true,
            schema: json!({
                "type": "object",
                "properties": {
                    "hasNavigationIntent": {"type": "boolean"},
                    "targetPage": {"type": ["string", "null"]},
                    "confidence": {"type": "number"},
                    "reasoning": {"type": "string"}
                },
                "required": ["hasNavigationIntent", "targetPage", "confidence", "reasoning"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl IntentDetector for LlmIntentDetector {
    async fn detect(&self, text: &str, context: &ConversationContext) -> IntentResult {
        if text.trim().is_empty() {
            return IntentResult::no_intent("empty utterance");
        }

        let messages = [
            ChatMessage::system(Self::system_prompt(context)),
            ChatMessage::user(text),
        ];

        match self
            .client
            .chat_structured(&messages, Self::response_schema())
            .await
        {
            Ok(raw) => parse_intent(&raw, context),
            Err(e) => {
                tracing::warn!(error = %e, context = %context.id, "intent detection unavailable");
                IntentResult::no_intent("intent detection unavailable")
            }
        }
    }
}

/// Parse the model's JSON text and coerce it into a valid result
fn parse_intent(raw: &str, context: &ConversationContext) -> IntentResult {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => coerce_intent(&value, context),
        Err(e) => {
            tracing::debug!(error = %e, "model returned non-JSON intent output");
            IntentResult::no_intent("model output was not valid JSON")
        }
    }
}

/// Coerce an untrusted JSON value into a well-formed [`IntentResult`]
///
/// Every malformed shape lands somewhere safe: wrong or missing field
/// types read as absent, absent intent reads as `false`, and a claimed
/// intent with a missing or out-of-context page falls back to
/// [`FALLBACK_PAGE`].
fn coerce_intent(value: &Value, context: &ConversationContext) -> IntentResult {
    let Some(object) = value.as_object() else {
        return IntentResult::no_intent("model output was not a JSON object");
    };

    let has_intent = object
        .get("hasNavigationIntent")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    #[allow(clippy::cast_possible_truncation)]
    let confidence = clamp_confidence(
        object.get("confidence").and_then(Value::as_f64).unwrap_or(0.0) as f32,
    );
    let reasoning = object
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if !has_intent {
        return IntentResult {
            has_navigation_intent: false,
            target_page: None,
            confidence,
            reasoning,
        };
    }

    let claimed = object
        .get("targetPage")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|page| !page.is_empty());
    let target_page = match claimed {
        Some(page) if context.knows_page(page) => page.to_string(),
        Some(page) => {
            tracing::debug!(page, context = %context.id, "model chose a page outside the context");
            FALLBACK_PAGE.to_string()
        }
        None => FALLBACK_PAGE.to_string(),
    };

    IntentResult {
        has_navigation_intent: true,
        target_page: Some(target_page),
        confidence,
        reasoning,
    }
}

/// Keyword-based intent classifier
///
/// The deterministic path: no network, no key, no latency. Matchers are
/// precompiled per context at construction.
pub struct KeywordIntentDetector {
    matchers: HashMap<String, KeywordMatcher>,
}

impl KeywordIntentDetector {
    /// Precompile matchers for every context in the registry
    #[must_use]
    pub fn new(registry: &ContextRegistry) -> Self {
        let matchers = registry
            .list()
            .into_iter()
            .map(|context| (context.id.clone(), KeywordMatcher::new(context)))
            .collect();
        Self { matchers }
    }

    fn classify(matcher: &KeywordMatcher, text: &str) -> IntentResult {
        match matcher.match_text(text) {
            Some(hit) => IntentResult::navigation(
                hit.target_page,
                KEYWORD_CONFIDENCE,
                format!("matched keyword '{}'", hit.keyword),
            ),
            None => IntentResult::no_intent("no keyword matched"),
        }
    }
}

#[async_trait]
impl IntentDetector for KeywordIntentDetector {
    async fn detect(&self, text: &str, context: &ConversationContext) -> IntentResult {
        if text.trim().is_empty() {
            return IntentResult::no_intent("empty utterance");
        }

        if let Some(matcher) = self.matchers.get(&context.id) {
            Self::classify(matcher, text)
        } else {
            // context not seen at construction, compile once and discard
            Self::classify(&KeywordMatcher::new(context), text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn general() -> ConversationContext {
        let registry = ContextRegistry::builtin().unwrap();
        registry.resolve(Some("general")).clone()
    }

    #[test]
    fn coerce_accepts_valid_navigation() {
        let context = general();
        let value = json!({
            "hasNavigationIntent": true,
            "targetPage": "/transfers",
            "confidence": 0.85,
            "reasoning": "user wants to send money"
        });
        let result = coerce_intent(&value, &context);
        assert!(result.has_navigation_intent);
        assert_eq!(result.target_page.as_deref(), Some("/transfers"));
        assert!((result.confidence - 0.85).abs() < f32::EPSILON);
    }

    #[test]
    fn coerce_drops_page_when_no_intent() {
        let context = general();
        let value = json!({
            "hasNavigationIntent": false,
            "targetPage": "/transfers",
            "confidence": 0.4,
            "reasoning": "just chatting"
        });
        let result = coerce_intent(&value, &context);
        assert!(!result.has_navigation_intent);
        assert_eq!(result.target_page, None);
    }

    #[test]
    fn coerce_defaults_missing_page_to_dashboard() {
        let context = general();
        for value in [
            json!({"hasNavigationIntent": true, "targetPage": null, "confidence": 0.7, "reasoning": ""}),
            json!({"hasNavigationIntent": true, "confidence": 0.7, "reasoning": ""}),
            json!({"hasNavigationIntent": true, "targetPage": "  ", "confidence": 0.7, "reasoning": ""}),
        ] {
            let result = coerce_intent(&value, &context);
            assert_eq!(result.target_page.as_deref(), Some("/dashboard"));
        }
    }

    #[test]
    fn coerce_redirects_invented_page_to_dashboard() {
        let context = general();
        let value = json!({
            "hasNavigationIntent": true,
            "targetPage": "/loans",
            "confidence": 0.9,
            "reasoning": "user wants a loan"
        });
        let result = coerce_intent(&value, &context);
        assert_eq!(result.target_page.as_deref(), Some("/dashboard"));
    }

    #[test]
    fn coerce_clamps_out_of_range_confidence() {
        let context = general();
        let value = json!({"hasNavigationIntent": true, "targetPage": "/cards", "confidence": 3.2, "reasoning": ""});
        assert_eq!(coerce_intent(&value, &context).confidence, 1.0);
        let value = json!({"hasNavigationIntent": false, "targetPage": null, "confidence": -1.0, "reasoning": ""});
        assert_eq!(coerce_intent(&value, &context).confidence, 0.0);
    }

    #[test]
    fn coerce_survives_wrong_field_types() {
        let context = general();
        let value = json!({
            "hasNavigationIntent": "yes",
            "targetPage": 42,
            "confidence": "high",
            "reasoning": ["not", "a", "string"]
        });
        let result = coerce_intent(&value, &context);
        assert!(!result.has_navigation_intent);
        assert_eq!(result.target_page, None);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn parse_handles_prose_output() {
        let context = general();
        let result = parse_intent("I believe the user wants to transfer money.", &context);
        assert!(!result.has_navigation_intent);
        assert_eq!(result.target_page, None);
    }

    #[test]
    fn parse_handles_non_object_json() {
        let context = general();
        let result = parse_intent(r#"["/transfers"]"#, &context);
        assert!(!result.has_navigation_intent);
    }

    #[test]
    fn system_prompt_lists_context_pages() {
        let prompt = LlmIntentDetector::system_prompt(&general());
        assert!(prompt.contains("/transfers"));
        assert!(prompt.contains("/dashboard"));
    }

    #[tokio::test]
    async fn keyword_detector_finds_transfer_intent() {
        let registry = ContextRegistry::builtin().unwrap();
        let detector = KeywordIntentDetector::new(&registry);
        let context = registry.resolve(Some("general"));

        let result = detector.detect("quiero hacer una transferencia", context).await;
        assert!(result.has_navigation_intent);
        assert_eq!(result.target_page.as_deref(), Some("/transfers"));
        assert!((result.confidence - KEYWORD_CONFIDENCE).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn keyword_detector_rejects_small_talk() {
        let registry = ContextRegistry::builtin().unwrap();
        let detector = KeywordIntentDetector::new(&registry);
        let context = registry.resolve(Some("general"));

        let result = detector.detect("cuál es el clima hoy", context).await;
        assert!(!result.has_navigation_intent);
        assert_eq!(result.target_page, None);
    }

    #[tokio::test]
    async fn keyword_detector_handles_empty_text() {
        let registry = ContextRegistry::builtin().unwrap();
        let detector = KeywordIntentDetector::new(&registry);
        let context = registry.resolve(None);

        let result = detector.detect("   ", context).await;
        assert!(!result.has_navigation_intent);
    }

    #[tokio::test]
    async fn keyword_detector_compiles_unseen_context() {
        let registry = ContextRegistry::builtin().unwrap();
        let detector = KeywordIntentDetector::new(&registry);
        let context = ConversationContext::from_json(
            r#"{"id": "adhoc", "name": "Adhoc", "description": "", "navigationCommands": [
                {"keywords": ["prueba"], "targetPage": "/dashboard", "priority": 1}
            ]}"#,
        )
        .unwrap();

        let result = detector.detect("una prueba", &context).await;
        assert_eq!(result.target_page.as_deref(), Some("/dashboard"));
    }
}
