//! Render cache for faster rebuilds
//!
//! Rendering Markdown (especially with syntax highlighting) is the expensive
//! part of a build. The cache remembers the rendered body of each source file
//! and hands it back only when the file's modification time, its SHA-256
//! content hash and the renderer settings all match what was recorded. Any
//! other case renders from scratch, so the cache can never change the output.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

use crate::content::Post;

/// Cache file name inside the cache directory
const CACHE_FILE: &str = "render.json";

/// Cached render of one source file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    /// SHA-256 of the source file, hex encoded
    pub content_hash: String,
    /// Last modification time (nanoseconds since the unix epoch)
    pub mtime: u64,
    /// Rendered body
    pub body_html: String,
}

/// Render cache, keyed by source file name
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RenderCache {
    /// Version of the cache format
    pub version: u32,
    /// Renderer settings the entries were produced with
    pub renderer: String,
    pub entries: BTreeMap<String, CacheEntry>,
}

impl RenderCache {
    /// Current cache format version
    const VERSION: u32 = 1;

    /// Empty cache for the given renderer fingerprint
    pub fn new(renderer: &str) -> Self {
        Self {
            version: Self::VERSION,
            renderer: renderer.to_string(),
            entries: BTreeMap::new(),
        }
    }

    /// Load cache from disk. A missing, unreadable or outdated cache yields an empty one.
    pub fn load(cache_dir: &Path, renderer: &str) -> Self {
        let cache_path = cache_dir.join(CACHE_FILE);
        let Ok(content) = fs::read_to_string(&cache_path) else {
            return Self::new(renderer);
        };

        match serde_json::from_str::<RenderCache>(&content) {
            Ok(cache) if cache.version == Self::VERSION && cache.renderer == renderer => cache,
            Ok(_) => {
                tracing::info!("Render settings or cache version changed, starting a fresh cache");
                Self::new(renderer)
            }
            Err(e) => {
                tracing::warn!("Ignoring corrupt cache {:?}: {}", cache_path, e);
                Self::new(renderer)
            }
        }
    }

    /// Save cache to disk
    pub fn save(&self, cache_dir: &Path) -> Result<()> {
        fs::create_dir_all(cache_dir)?;
        let content = serde_json::to_string(self)?;
        fs::write(cache_dir.join(CACHE_FILE), content)?;
        Ok(())
    }

    /// Rendered body for `key`, if both mtime and content hash still match
    pub fn lookup(&self, key: &str, mtime: u64, content_hash: &str) -> Option<&str> {
        self.entries
            .get(key)
            .filter(|entry| entry.mtime == mtime && entry.content_hash == content_hash)
            .map(|entry| entry.body_html.as_str())
    }

    /// Cache holding exactly the given posts
    pub fn from_posts(renderer: &str, posts: &[Post]) -> Self {
        let mut cache = Self::new(renderer);
        for post in posts {
            let Some(key) = cache_key(&post.source) else {
                continue;
            };
            let Some(mtime) = post.modified else {
                continue;
            };
            cache.entries.insert(
                key,
                CacheEntry {
                    content_hash: post.content_hash.clone(),
                    mtime,
                    body_html: post.body_html.clone(),
                },
            );
        }
        cache
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Key of a source file in the cache: its file name
pub fn cache_key(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

/// SHA-256 of content, hex encoded
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// File modification time as nanoseconds since the unix epoch
pub fn get_mtime(path: &Path) -> Result<u64> {
    let metadata = fs::metadata(path)?;
    let mtime = metadata.modified()?;
    let nanos = mtime
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    Ok(u64::try_from(nanos).unwrap_or(u64::MAX))
}
