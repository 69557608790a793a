//! Integration tests for speech endpoints.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use crate::api::{AppState, create_router};
use crate::cache::{AudioCache, SpeechService};
use crate::config::AppConfig;
use crate::generation::Orchestrator;
use crate::mcp::MockToolInvoker;
use crate::providers::speech::{MockSpeechEngine, SpeechEngine, SpeechEngineKind};
use crate::providers::{ProviderError, SpeechChain, TextChain};

fn test_app(engines: Vec<Arc<dyn SpeechEngine>>) -> (TempDir, axum::Router) {
    let dir = TempDir::new().unwrap();
    let cache = Arc::new(AudioCache::new(dir.path()).unwrap());
    let speech = SpeechService::new(cache, SpeechChain::new(engines));
    let orchestrator = Orchestrator::new(
        Arc::new(MockToolInvoker::new()),
        TextChain::new(Vec::new()),
        speech,
    );
    let app = create_router(AppState::new(orchestrator, AppConfig::default()));
    (dir, app)
}

fn kokoro(times: usize) -> MockSpeechEngine {
    let mut engine = MockSpeechEngine::new();
    engine.expect_kind().return_const(SpeechEngineKind::Kokoro);
    engine
        .expect_synthesize()
        .times(times)
        .returning(|_, _, _| Ok(Bytes::from_static(b"RIFF....WAVE")));
    engine
}

/// Helper to parse JSON response body
async fn json_body(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

fn synthesize(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/speech/synthesize")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn synthesize_then_serve_from_cache() {
    let (_dir, app) = test_app(vec![Arc::new(kokoro(1))]);
    let body = json!({"text": "Hello team", "language": "en", "voice": "af_sarah"});

    let first = app.clone().oneshot(synthesize(body.clone())).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first = json_body(first).await;
    assert_eq!(first["cached"], false);
    assert!(first["audioUrl"].as_str().unwrap().ends_with(".wav"));
    assert!(first["duration"].as_u64().unwrap() >= 1);

    let second = app.oneshot(synthesize(body)).await.unwrap();
    let second = json_body(second).await;
    assert_eq!(second["cached"], true);
    assert_eq!(second["audioUrl"], first["audioUrl"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_text_is_rejected() {
    let (_dir, app) = test_app(vec![Arc::new(kokoro(0))]);

    let response = app
        .oneshot(synthesize(json!({"text": "   "})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread")]
async fn unsupported_language_is_rejected() {
    let (_dir, app) = test_app(vec![Arc::new(kokoro(0))]);

    let response = app
        .oneshot(synthesize(json!({"text": "Guten Tag", "language": "de"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("de"));
}

#[tokio::test(flavor = "multi_thread")]
async fn exhausted_engines_are_502() {
    let mut engine = MockSpeechEngine::new();
    engine.expect_kind().return_const(SpeechEngineKind::Voicevox);
    engine.expect_synthesize().returning(|_, _, _| {
        Err(ProviderError::Network {
            message: "engine down".to_string(),
        })
    });
    let (_dir, app) = test_app(vec![Arc::new(engine)]);

    let response = app
        .oneshot(synthesize(json!({"text": "こんにちは"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test(flavor = "multi_thread")]
async fn engines_report_health() {
    let mut up = MockSpeechEngine::new();
    up.expect_kind().return_const(SpeechEngineKind::Voicevox);
    up.expect_health().returning(|| Ok(()));
    let mut down = MockSpeechEngine::new();
    down.expect_kind().return_const(SpeechEngineKind::MlxAudio);
    down.expect_health().returning(|| {
        Err(ProviderError::Network {
            message: "refused".to_string(),
        })
    });
    let (_dir, app) = test_app(vec![Arc::new(up), Arc::new(down)]);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/speech/engines")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["engines"][0]["engine"], "voicevox");
    assert_eq!(body["engines"][0]["available"], true);
    assert_eq!(body["engines"][1]["engine"], "mlx-audio");
    assert_eq!(body["engines"][1]["available"], false);
    assert!(body["engines"][1]["error"].is_string());
}
