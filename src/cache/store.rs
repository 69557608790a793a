use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{CacheError, CacheResult};

/// Hex SHA-256 over the synthesis inputs.
///
/// Each input is length-prefixed so `("a:b", "c")` and `("a", "b:c")` never
/// share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn derive(text: &str, language: &str, voice: &str) -> Self {
        let mut hasher = Sha256::new();
        for part in [text, language, voice] {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part.as_bytes());
        }
        CacheKey(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a cached clip lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioRef {
    pub key: CacheKey,
    #[serde(skip)]
    pub path: PathBuf,
    /// URL clients fetch the clip from, e.g. `/cache/<key>.wav`.
    pub url: String,
}

/// Write-once audio store keyed by [`CacheKey`].
///
/// The in-memory index is a shortcut; the directory is the source of truth so
/// entries written by an earlier process are still hits.
///
/// Clip URLs are `{url_prefix}/{key}.wav`. Nothing in this crate serves them:
/// the prefix must name a static file server (or CDN) that exposes the cache
/// directory.
pub struct AudioCache {
    dir: PathBuf,
    url_prefix: String,
    index: DashMap<CacheKey, AudioRef>,
}

impl AudioCache {
    pub const DEFAULT_URL_PREFIX: &'static str = "/cache";

    pub fn new(dir: impl Into<PathBuf>) -> CacheResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| CacheError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            url_prefix: Self::DEFAULT_URL_PREFIX.to_string(),
            index: DashMap::new(),
        })
    }

    /// Trailing slashes are dropped.
    pub fn with_url_prefix(mut self, prefix: &str) -> Self {
        self.url_prefix = prefix.trim_end_matches('/').to_string();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of entries seen by this process.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn reference(&self, key: CacheKey) -> AudioRef {
        let file_name = format!("{key}.wav");
        AudioRef {
            path: self.dir.join(&file_name),
            url: format!("{}/{file_name}", self.url_prefix),
            key,
        }
    }

    /// Look up a clip. `None` is a miss.
    pub async fn get(&self, text: &str, language: &str, voice: &str) -> Option<AudioRef> {
        let key = CacheKey::derive(text, language, voice);
        if let Some(hit) = self.index.get(&key) {
            return Some(hit.clone());
        }

        let candidate = self.reference(key);
        match tokio::fs::try_exists(&candidate.path).await {
            Ok(true) => {
                debug!(key = %candidate.key, "Audio cache hit on disk");
                self.index.insert(candidate.key.clone(), candidate.clone());
                Some(candidate)
            }
            _ => None,
        }
    }

    /// Store a clip and return its reference.
    ///
    /// The file is written to a temporary name and moved into place; if the
    /// key already exists the first file wins.
    pub async fn put(
        &self,
        text: &str,
        language: &str,
        voice: &str,
        data: &[u8],
    ) -> CacheResult<AudioRef> {
        let reference = self.reference(CacheKey::derive(text, language, voice));
        if let Some(existing) = self.index.get(&reference.key) {
            return Ok(existing.clone());
        }

        let dir = self.dir.clone();
        let target = reference.path.clone();
        let data = data.to_vec();
        tokio::task::spawn_blocking(move || write_once(&dir, &target, &data))
            .await
            .map_err(|e| CacheError::Task {
                message: e.to_string(),
            })??;

        debug!(key = %reference.key, path = %reference.path.display(), "Audio cached");
        self.index.insert(reference.key.clone(), reference.clone());
        Ok(reference)
    }
}

fn write_once(dir: &Path, target: &Path, data: &[u8]) -> CacheResult<()> {
    let io_err = |source: std::io::Error| CacheError::Io {
        path: target.to_path_buf(),
        source,
    };

    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    temp.write_all(data).map_err(io_err)?;
    temp.as_file().sync_all().map_err(io_err)?;

    match temp.persist_noclobber(target) {
        Ok(_) => Ok(()),
        Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(io_err(e.error)),
    }
}
