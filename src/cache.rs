//! File-backed response cache.
//!
//! One pretty-printed JSON file per request fingerprint. Only deterministic
//! (zero temperature) requests are ever read from or written to disk.

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha512};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::Result;
use crate::models::{CacheEntry, RequestParameters};

/// Temperatures below this count as zero for caching purposes.
pub const TEMPERATURE_EPSILON: f64 = 1e-6;

// Rebuild every object with its keys in sorted order
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(object) => {
            let sorted: BTreeMap<&String, Value> = object.iter().map(|(k, v)| (k, canonicalize(v))).collect();
            let mut out = Map::new();
            for (k, v) in sorted {
                out.insert(k.clone(), v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// SHA-512 hex digest of the request payload with keys sorted at every level.
pub fn fingerprint(params: &RequestParameters) -> String {
    let canonical = canonicalize(&params.to_payload()).to_string();
    let mut hasher = Sha512::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn is_cacheable(params: &RequestParameters) -> bool {
    params.temperature() < TEMPERATURE_EPSILON
}

#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
}

impl ResponseCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, params: &RequestParameters) -> PathBuf {
        self.dir.join(format!("{}.json", fingerprint(params)))
    }

    /// Cached entry for `params`, if one exists and the request is deterministic.
    pub async fn load(&self, params: &RequestParameters) -> Result<Option<CacheEntry>> {
        if !is_cacheable(params) {
            return Ok(None);
        }

        let path = self.path_for(params);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        info!("read cache from {}", path.display());
        Ok(Some(serde_json::from_slice(&raw)?))
    }

    /// Persists `entry`, replacing any file already at that path.
    ///
    /// The directory is created even when the request is not cacheable.
    pub async fn store(&self, entry: &CacheEntry, params: &RequestParameters) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        if !is_cacheable(params) {
            return Ok(());
        }

        let path = self.path_for(params);
        tokio::fs::write(&path, to_pretty_json(entry)?).await?;
        debug!("wrote cache to {}", path.display());
        Ok(())
    }
}

// 4-space indent, the layout existing cache directories already use
fn to_pretty_json(entry: &CacheEntry) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    entry.serialize(&mut ser)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatMessage, ChatParams, CompletionParams, Mode};
    use serde_json::json;

    fn chat(temperature: f64) -> RequestParameters {
        ChatParams::new("gpt-4", vec![ChatMessage::user("hi")], temperature)
            .unwrap()
            .into()
    }

    #[test]
    fn fingerprint_ignores_insertion_order() {
        let a = RequestParameters::from_json(
            Mode::Complete,
            json!({"model": "m", "prompt": "p", "temperature": 0, "max_tokens": 5, "stop": ["\n"]}),
        )
        .unwrap();
        let b: RequestParameters = CompletionParams::new("m", "p", 0.0)
            .unwrap()
            .with_extra("stop", json!(["\n"]))
            .with_extra("max_tokens", 5)
            .into();
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn fingerprint_sorts_nested_objects() {
        let a: RequestParameters = CompletionParams::new("m", "p", 0.0)
            .unwrap()
            .with_extra("logit_bias", json!({"b": 1, "a": 2}))
            .into();
        let b: RequestParameters = CompletionParams::new("m", "p", 0.0)
            .unwrap()
            .with_extra("logit_bias", json!({"a": 2, "b": 1}))
            .into();
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn fingerprint_is_sha512_hex() {
        let key = fingerprint(&chat(0.0));
        assert_eq!(key.len(), 128);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, fingerprint(&chat(0.5)));
    }

    #[tokio::test]
    async fn store_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path().join("nested/cache"));
        let params = chat(0.0);
        let entry = CacheEntry {
            prompt: "hi".into(),
            response: Some(json!({"choices": []})),
        };

        assert_eq!(cache.load(&params).await.unwrap(), None);
        cache.store(&entry, &params).await.unwrap();
        assert_eq!(cache.load(&params).await.unwrap(), Some(entry));

        let written = std::fs::read_to_string(cache.path_for(&params)).unwrap();
        assert!(written.starts_with("{\n    \"prompt\": \"hi\""));
    }

    #[tokio::test]
    async fn nonzero_temperature_is_never_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path());
        let params = chat(0.7);
        let entry = CacheEntry {
            prompt: "hi".into(),
            response: None,
        };

        cache.store(&entry, &params).await.unwrap();
        assert!(!cache.path_for(&params).exists());

        // a file planted at the fingerprint path is still ignored
        std::fs::write(cache.path_for(&params), serde_json::to_vec(&entry).unwrap()).unwrap();
        assert_eq!(cache.load(&params).await.unwrap(), None);
    }

    #[tokio::test]
    async fn store_overwrites_existing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path());
        let params = chat(0.0);

        for n in 0..2 {
            let entry = CacheEntry {
                prompt: "hi".into(),
                response: Some(json!({"n": n})),
            };
            cache.store(&entry, &params).await.unwrap();
        }
        let loaded = cache.load(&params).await.unwrap().unwrap();
        assert_eq!(loaded.response, Some(json!({"n": 1})));
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path());
        let params = chat(0.0);
        std::fs::write(cache.path_for(&params), b"not json").unwrap();
        assert!(matches!(
            cache.load(&params).await,
            Err(crate::error::Error::Serialization(_))
        ));
    }
}
