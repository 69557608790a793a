//! Narrated slide generation from Backlog project data.
//!
//! - [`mcp`]: JSON-RPC tool engine, its transports and the session proxy
//! - [`tools`]: Backlog tool catalogue served by `presenter-tools`
//! - [`providers`]: LLM and TTS fallback chains
//! - [`cache`]: content-addressed audio store
//! - [`generation`]: per-presentation pipeline and event fan-out
//! - [`api`]: HTTP and WebSocket surface of `presenter-api`

pub mod api;
pub mod cache;
pub mod config;
pub mod generation;
pub mod mcp;
pub mod providers;
pub mod tools;

/// Install the process-wide TLS crypto provider.
///
/// Must run before the first HTTP client is built. Repeated calls are no-ops.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}
