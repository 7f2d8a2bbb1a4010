//! Intent detection integration tests
//!
//! Exercises the keyword fallback path end to end against the built-in
//! banking contexts. The LLM path is covered by unit tests on the
//! response parser, which is the only part that does not need a network.

use teller_gateway::context::ContextRegistry;
use teller_gateway::intent::{IntentDetector, IntentResult, KeywordIntentDetector};

fn registry() -> ContextRegistry {
    ContextRegistry::builtin().expect("builtin contexts")
}

#[tokio::test]
async fn test_transfer_phrase_navigates() {
    let registry = registry();
    let detector = KeywordIntentDetector::new(&registry);

    let result = detector
        .detect("quiero hacer una transferencia", registry.resolve(Some("general")))
        .await;

    assert!(result.has_navigation_intent);
    assert_eq!(result.target_page.as_deref(), Some("/transfers"));
    assert!(result.confidence > 0.0 && result.confidence <= 1.0);
}

#[tokio::test]
async fn test_chitchat_has_no_intent() {
    let registry = registry();
    let detector = KeywordIntentDetector::new(&registry);

    let result = detector
        .detect("cuál es el clima hoy", registry.resolve(Some("general")))
        .await;

    assert!(!result.has_navigation_intent);
    assert!(result.target_page.is_none());
    assert!(result.confidence.abs() < f32::EPSILON);
}

#[tokio::test]
async fn test_blank_utterance_has_no_intent() {
    let registry = registry();
    let detector = KeywordIntentDetector::new(&registry);
    let general = registry.resolve(None);

    assert!(!detector.detect("", general).await.has_navigation_intent);
    assert!(!detector.detect("   ", general).await.has_navigation_intent);
}

#[tokio::test]
async fn test_accents_and_case_do_not_matter() {
    let registry = registry();
    let detector = KeywordIntentDetector::new(&registry);

    let result = detector
        .detect("Quiero abrir un DEPÓSITO A TÉRMINO", registry.resolve(Some("general")))
        .await;

    assert!(result.has_navigation_intent);
    assert_eq!(result.target_page.as_deref(), Some("/cdts"));
}

#[tokio::test]
async fn test_commands_are_scoped_to_their_context() {
    let registry = registry();
    let detector = KeywordIntentDetector::new(&registry);
    let investments = registry.resolve(Some("investments"));

    // The investments flow has no transfer command
    let result = detector.detect("quiero hacer una transferencia", investments).await;
    assert!(!result.has_navigation_intent);

    let result = detector.detect("quiero abrir un cdt", investments).await;
    assert!(result.has_navigation_intent);
    assert_eq!(result.target_page.as_deref(), Some("/cdts"));
}

#[tokio::test]
async fn test_unknown_context_resolves_to_general() {
    let registry = registry();
    let detector = KeywordIntentDetector::new(&registry);
    let context = registry.resolve(Some("definitely-not-a-context"));

    assert_eq!(context.id, "general");

    let result = detector.detect("enviar dinero", context).await;
    assert!(result.has_navigation_intent);
    assert_eq!(result.target_page.as_deref(), Some("/transfers"));
}

#[test]
fn test_result_serializes_for_the_web_client() {
    let result = IntentResult::navigation("/cards", 0.9, "matched keyword 'tarjeta'");
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["hasNavigationIntent"], true);
    assert_eq!(json["targetPage"], "/cards");
    assert_eq!(json["reasoning"], "matched keyword 'tarjeta'");

    let result = IntentResult::no_intent("no keyword matched");
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["hasNavigationIntent"], false);
    assert!(json["targetPage"].is_null());
}

#[test]
fn test_registry_lists_builtin_contexts() {
    let registry = registry();

    assert!(registry.get("general").is_some());
    assert!(registry.get("investments").is_some());
    assert!(registry.get("loans").is_none());

    let pages = registry.resolve(Some("general")).pages();
    assert!(pages.contains(&"/transfers"));
    assert!(pages.contains(&"/dashboard"));
}
