use super::{enhance_url, spawn_relay};
use burnish_core::provider::MockProvider;
use burnish_core::RelayConfig;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::time::Duration;

#[tokio::test]
async fn streams_fragments_in_order_over_tcp() {
    let provider = Arc::new(MockProvider::with_fragments(["Hello ", "world"]));
    let addr = spawn_relay(provider, RelayConfig::default()).await;

    let response = reqwest::Client::new()
        .post(enhance_url(addr))
        .json(&json!({"prompt": "hi", "apiKey": "gsk_test"}))
        .send()
        .await
        .expect("request");

    assert_eq!(response.status().as_u16(), 200);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    assert_eq!(content_type, "text/event-stream");
    let cache_control = response
        .headers()
        .get("cache-control")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    assert_eq!(cache_control, "no-cache, no-transform");

    let body = response.text().await.expect("body");
    assert_eq!(body, "Hello world");
}

#[tokio::test]
async fn validation_failures_return_400_without_provider_call() {
    let provider = Arc::new(MockProvider::default());
    let addr = spawn_relay(provider.clone(), RelayConfig::default()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(enhance_url(addr))
        .json(&json!({"apiKey": "gsk_test"}))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.expect("json body");
    assert_eq!(body["error"], "Valid prompt text is required");

    let response = client
        .post(enhance_url(addr))
        .json(&json!({"prompt": "hi", "apiKey": ""}))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.expect("json body");
    assert_eq!(body["error"], "Valid API key is required");

    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn malformed_json_returns_format_error() {
    let provider = Arc::new(MockProvider::default());
    let addr = spawn_relay(provider.clone(), RelayConfig::default()).await;

    let response = reqwest::Client::new()
        .post(enhance_url(addr))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("request");

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.expect("json body");
    assert_eq!(body["error"], "Invalid request format");
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn provider_auth_failure_maps_to_401_auth_error() {
    let provider = Arc::new(MockProvider::default().failing_with(401, "Invalid API Key"));
    let addr = spawn_relay(provider, RelayConfig::default()).await;

    let response = reqwest::Client::new()
        .post(enhance_url(addr))
        .json(&json!({"prompt": "hi", "apiKey": "gsk_bad"}))
        .send()
        .await
        .expect("request");

    assert_eq!(response.status().as_u16(), 401);
    let body: Value = response.json().await.expect("json body");
    assert_eq!(body["code"], "AUTH_ERROR");
    assert_eq!(body["message"], "Invalid API Key");
}

#[tokio::test]
async fn rate_limit_maps_to_429() {
    let provider = Arc::new(MockProvider::default().failing_with(429, "Too many requests"));
    let addr = spawn_relay(provider, RelayConfig::default()).await;

    let response = reqwest::Client::new()
        .post(enhance_url(addr))
        .json(&json!({"prompt": "hi", "apiKey": "gsk_test"}))
        .send()
        .await
        .expect("request");

    assert_eq!(response.status().as_u16(), 429);
    let body: Value = response.json().await.expect("json body");
    assert_eq!(body["code"], "RATE_LIMIT_ERROR");
}

#[tokio::test]
async fn slow_provider_initiation_maps_to_504_timeout() {
    let provider = Arc::new(MockProvider::default().delayed_by(Duration::from_millis(500)));
    let config = RelayConfig {
        call_timeout: Duration::from_millis(50),
        ..Default::default()
    };
    let addr = spawn_relay(provider, config).await;

    let response = reqwest::Client::new()
        .post(enhance_url(addr))
        .json(&json!({"prompt": "hi", "apiKey": "gsk_test"}))
        .send()
        .await
        .expect("request");

    assert_eq!(response.status().as_u16(), 504);
    let body: Value = response.json().await.expect("json body");
    assert_eq!(body["code"], "TIMEOUT_ERROR");
}

#[tokio::test]
async fn unknown_route_and_wrong_method_are_rejected() {
    let provider = Arc::new(MockProvider::default());
    let addr = spawn_relay(provider, RelayConfig::default()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/api/other"))
        .json(&json!({}))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 404);

    let response = client
        .get(enhance_url(addr))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 405);
}

#[tokio::test]
async fn cache_busting_query_string_still_routes() {
    let provider = Arc::new(MockProvider::with_fragments(["ok"]));
    let addr = spawn_relay(provider, RelayConfig::default()).await;

    let response = reqwest::Client::new()
        .post(format!("{}?t=1712345678", enhance_url(addr)))
        .json(&json!({"prompt": "hi", "apiKey": "gsk_test"}))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().await.expect("body"), "ok");
}
