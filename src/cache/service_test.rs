use std::sync::Arc;

use bytes::Bytes;
use tempfile::TempDir;

use super::{AudioCache, SpeechService, estimate_duration_secs};
use crate::providers::speech::{MockSpeechEngine, SpeechEngine, SpeechEngineKind};
use crate::providers::{ProviderError, SpeechChain};

fn service_with(engine: MockSpeechEngine) -> (TempDir, SpeechService) {
    let dir = TempDir::new().unwrap();
    let cache = Arc::new(AudioCache::new(dir.path()).unwrap());
    let engines: Vec<Arc<dyn SpeechEngine>> = vec![Arc::new(engine)];
    (dir, SpeechService::new(cache, SpeechChain::new(engines)))
}

#[tokio::test]
async fn miss_synthesizes_once_then_hits() {
    let mut engine = MockSpeechEngine::new();
    engine.expect_kind().return_const(SpeechEngineKind::Voicevox);
    engine
        .expect_synthesize()
        .times(1)
        .returning(|_, _, _| Ok(Bytes::from_static(b"RIFF")));
    let (_dir, service) = service_with(engine);

    let first = service.synthesize("こんにちは世界", "ja", "").await.unwrap();
    let second = service.synthesize("こんにちは世界", "ja", "").await.unwrap();

    assert!(!first.cache_hit);
    assert!(second.cache_hit);
    assert_eq!(first.audio, second.audio);
}

#[tokio::test]
async fn provider_failure_is_not_cached() {
    let mut engine = MockSpeechEngine::new();
    engine.expect_kind().return_const(SpeechEngineKind::Voicevox);
    engine.expect_synthesize().times(2).returning(|_, _, _| {
        Err(ProviderError::Network {
            message: "down".to_string(),
        })
    });
    let (_dir, service) = service_with(engine);

    assert!(service.synthesize("text", "ja", "").await.is_err());
    assert!(service.synthesize("text", "ja", "").await.is_err());
    assert!(service.cache().is_empty());
}

#[test]
fn duration_estimate() {
    assert_eq!(estimate_duration_secs("", "en"), 1);
    // 150 words at 150 wpm
    let words = vec!["word"; 150].join(" ");
    assert_eq!(estimate_duration_secs(&words, "en"), 60);
    // 300 characters of Japanese count as 100 words → 40 s
    let ja = "あ".repeat(300);
    assert_eq!(estimate_duration_secs(&ja, "ja"), 40);
}
