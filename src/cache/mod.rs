//! Analyze-response cache.
//!
//! Caches complete analyze responses on disk, keyed by a content digest of
//! `(module, tenant, sorted headers)`. A hit short-circuits the classifier
//! and the AI provider entirely. The cache is advisory: a read or parse
//! failure is a miss, and a write failure never fails the request.
//!
//! Suitable for a single-instance deployment; disable with
//! `AI_CACHE_ENABLED=false`.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Directory where cached responses are stored (relative to current dir)
/// unless `SHOPLOADER_CACHE_DIR` overrides it.
const DEFAULT_CACHE_DIR: &str = ".shoploader/cache";

/// Content-addressed cache key over tenant, module, and the sorted header
/// set. Header order in the upload does not affect the key.
pub fn cache_key(module: &str, tenant_id: &str, headers: &[String]) -> String {
    let mut sorted: Vec<&str> = headers.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let content = format!("{}:{}:{}", module, tenant_id, sorted.join(","));
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// File-based cache for one module's analyze responses.
pub struct AnalysisCache {
    dir: PathBuf,
    enabled: bool,
}

impl AnalysisCache {
    /// Build a cache from environment configuration for one module.
    pub fn from_env(module_name: &str) -> Self {
        let base = env::var("SHOPLOADER_CACHE_DIR").unwrap_or_else(|_| DEFAULT_CACHE_DIR.into());
        let enabled = env::var("AI_CACHE_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);
        Self::with_dir(Path::new(&base).join(module_name), enabled)
    }

    pub fn with_dir(dir: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            dir: dir.into(),
            enabled,
        }
    }

    /// A cache that never hits and never writes (tests).
    pub fn disabled() -> Self {
        Self::with_dir(DEFAULT_CACHE_DIR, false)
    }

    /// Try to load a cached response. Any failure is a miss.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if !self.enabled {
            return None;
        }
        let path = self.entry_path(key);
        let content = fs::read_to_string(path).ok()?;
        let entry: serde_json::Value = serde_json::from_str(&content).ok()?;
        serde_json::from_value(entry.get("data")?.clone()).ok()
    }

    /// Save a response. Failures are logged and ignored; losing a cache
    /// write degrades cost, not correctness.
    pub fn put<T: Serialize>(&self, key: &str, value: &T) {
        if !self.enabled {
            return;
        }
        if let Err(e) = self.try_put(key, value) {
            warn!(key, error = %e, "cache write failed");
        }
    }

    fn try_put<T: Serialize>(&self, key: &str, value: &T) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let entry = json!({
            "cached_at": Utc::now().to_rfc3339(),
            "data": value,
        });
        let content = serde_json::to_string_pretty(&entry)?;
        fs::write(self.entry_path(key), content)
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}
