//! Content-addressed audio cache and the speech service built on it.
//!
//! Layout:
//! ```text
//! <cache_dir>/
//!   ├── 3f1a…e9.wav
//!   └── 9b02…41.wav
//! ```
//! File names are the hex SHA-256 of (text, language, voice). Files are never
//! rewritten or evicted.

mod service;
mod store;

#[cfg(test)]
mod service_test;

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

pub use service::{SpeechError, SpeechResult, SpeechService, estimate_duration_secs};
pub use store::{AudioCache, AudioRef, CacheKey};

#[derive(Error, Diagnostic, Debug)]
pub enum CacheError {
    #[error("Cache I/O failed for {}: {source}", path.display())]
    #[diagnostic(
        code(presenter::cache::io),
        help("Check that AUDIO_CACHE_DIR exists and is writable.")
    )]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache write task failed: {message}")]
    #[diagnostic(code(presenter::cache::task))]
    Task { message: String },
}

pub type CacheResult<T> = Result<T, CacheError>;
