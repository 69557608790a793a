//! Upstream AI backends.
//!
//! Two chains live here: [`TextChain`] over the LLM providers and
//! [`SpeechChain`] over the TTS engines. Both are immutable once built and are
//! shared by every presentation.

pub mod error;
pub mod sigv4;
pub mod speech;
pub mod text;

#[cfg(test)]
mod sigv4_test;

pub use error::{ProviderError, ProviderResult};
pub use speech::{SpeechChain, SpeechEngine, SpeechEngineKind, SpeechSettings};
pub use text::{TextChain, TextProvider, TextProviderKind, TextSettings};
