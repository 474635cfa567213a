mod common;

use common::{CannedServer, Route};
use healing_locator::core::InferenceConfig;
use healing_locator::{build_backend, HealError, HealingRequest};
use serde_json::json;

fn config(provider: &str, base_url: &str) -> InferenceConfig {
    let mut config = InferenceConfig {
        provider: provider.to_string(),
        timeout_ms: 5000,
        ..Default::default()
    };
    config.openai.api_key = Some("sk-test".into());
    config.openai.api_base = base_url.to_string();
    config.google.api_key = Some("g-test".into());
    config.google.api_base = base_url.to_string();
    config.xai.api_key = Some("xai-test".into());
    config.xai.api_base = base_url.to_string();
    config
}

fn request() -> HealingRequest {
    HealingRequest::new(
        "productsPage.products",
        "https://www.saucedemo.com/inventory.html",
        "<div class=\"inventory_item\"></div>",
    )
}

#[tokio::test]
async fn test_openai_chat_completion() {
    let server = CannedServer::start(vec![Route::json(
        "/v1/chat/completions",
        json!({"choices": [{"message": {"role": "assistant", "content": "```css\n.inventory_item\n```"}}]}),
    )])
    .await;

    let backend = build_backend(&config("openai", &format!("{}/v1/", server.base_url))).unwrap();
    let selector = backend.infer(&request()).await.unwrap();
    assert_eq!(selector, ".inventory_item");

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let sent = &requests[0];
    assert_eq!(sent.headers["authorization"], "Bearer sk-test");
    let body = sent.json();
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["messages"][0]["role"], "system");
    assert!(body["messages"][1]["content"]
        .as_str()
        .unwrap()
        .contains("Element intent: productsPage.products"));
}

#[tokio::test]
async fn test_xai_uses_openai_wire_format() {
    let server = CannedServer::start(vec![Route::json(
        "/chat/completions",
        json!({"choices": [{"message": {"content": "#add-to-cart"}}]}),
    )])
    .await;

    let backend = build_backend(&config("grok", &server.base_url)).unwrap();
    assert_eq!(backend.name(), "xai");
    assert_eq!(backend.infer(&request()).await.unwrap(), "#add-to-cart");

    let sent = &server.requests()[0];
    assert_eq!(sent.headers["authorization"], "Bearer xai-test");
    assert_eq!(sent.json()["model"], "grok-beta");
}

#[tokio::test]
async fn test_gemini_generate_content() {
    let server = CannedServer::start(vec![Route::json(
        "/models/gemini-pro:generateContent",
        json!({"candidates": [{"content": {"role": "model", "parts": [{"text": "[data-test=\"checkout\"]"}]}}]}),
    )])
    .await;

    let backend = build_backend(&config("gemini", &server.base_url)).unwrap();
    assert_eq!(backend.infer(&request()).await.unwrap(), "[data-test=\"checkout\"]");

    let sent = &server.requests()[0];
    assert_eq!(sent.headers["x-goog-api-key"], "g-test");
    let body = sent.json();
    assert_eq!(body["contents"][0]["role"], "user");
    assert!(body["contents"][0]["parts"][0]["text"]
        .as_str()
        .unwrap()
        .contains("Return ONLY a single stable locator"));
    assert_eq!(body["generationConfig"]["temperature"], 0.0);
}

#[tokio::test]
async fn test_error_status_is_normalized() {
    let server = CannedServer::start(vec![Route::raw(
        "/chat/completions",
        401,
        "application/json",
        r#"{"error":{"message":"Incorrect API key provided"}}"#,
    )])
    .await;

    let backend = build_backend(&config("openai", &server.base_url)).unwrap();
    let err = backend.infer(&request()).await.unwrap_err();
    match err {
        HealError::BackendCall {
            provider,
            status,
            detail,
        } => {
            assert_eq!(provider, "openai");
            assert_eq!(status, Some(401));
            assert!(detail.contains("Incorrect API key"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_and_empty_answers_are_backend_errors() {
    let server = CannedServer::start(vec![
        Route::raw("/bad/chat/completions", 200, "text/html", "<html>gateway</html>"),
        Route::json(
            "/empty/chat/completions",
            json!({"choices": [{"message": {"content": "   "}}]}),
        ),
    ])
    .await;

    let backend = build_backend(&config("openai", &format!("{}/bad", server.base_url))).unwrap();
    let err = backend.infer(&request()).await.unwrap_err();
    assert!(matches!(err, HealError::BackendCall { status: None, ref detail, .. } if detail.starts_with("malformed")));

    let backend = build_backend(&config("openai", &format!("{}/empty", server.base_url))).unwrap();
    let err = backend.infer(&request()).await.unwrap_err();
    assert!(matches!(err, HealError::BackendCall { ref detail, .. } if detail.starts_with("empty locator")));
}

#[tokio::test]
async fn test_long_error_bodies_are_clipped() {
    let long_body = "x".repeat(2000);
    let server = CannedServer::start(vec![Route::raw(
        "/chat/completions",
        500,
        "text/plain",
        &long_body,
    )])
    .await;

    let backend = build_backend(&config("openai", &server.base_url)).unwrap();
    let err = backend.infer(&request()).await.unwrap_err();
    let HealError::BackendCall { status, detail, .. } = err else {
        panic!("expected BackendCall");
    };
    assert_eq!(status, Some(500));
    assert!(detail.chars().count() <= 500);
}
