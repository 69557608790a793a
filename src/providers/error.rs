//! Provider error types.
//!
//! Shared by the text and speech chains. Every variant is treated as an
//! upstream failure by the fallback logic: the chain logs it and moves on to
//! the next provider.

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ProviderError {
    #[error("No {kind} provider is configured")]
    #[diagnostic(
        code(presenter::providers::not_configured),
        help("Set OPENAI_API_KEY or AWS credentials for text, or start a TTS engine for speech.")
    )]
    NotConfigured { kind: &'static str },

    #[error("{provider} returned HTTP {status}: {message}")]
    #[diagnostic(code(presenter::providers::api_error))]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Invalid response from {provider}: {message}")]
    #[diagnostic(code(presenter::providers::invalid_response))]
    InvalidResponse { provider: String, message: String },

    #[error("Network error: {message}")]
    #[diagnostic(code(presenter::providers::network))]
    Network { message: String },

    #[error("Request timed out: {message}")]
    #[diagnostic(code(presenter::providers::timeout))]
    Timeout { message: String },

    #[error("Language '{language}' is not supported by any speech engine")]
    #[diagnostic(
        code(presenter::providers::unsupported_language),
        help("Supported languages: ja, en, es, fr, hi, it, pt, zh")
    )]
    UnsupportedLanguage { language: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Signing(#[from] super::sigv4::SignerError),
}

impl ProviderError {
    pub(crate) fn api(provider: &str, status: u16, message: impl Into<String>) -> Self {
        ProviderError::Api {
            provider: provider.to_string(),
            status,
            message: message.into(),
        }
    }

    pub(crate) fn invalid(provider: &str, message: impl Into<String>) -> Self {
        ProviderError::InvalidResponse {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout {
                message: e.to_string(),
            }
        } else {
            ProviderError::Network {
                message: e.to_string(),
            }
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;
