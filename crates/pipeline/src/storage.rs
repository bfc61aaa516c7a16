//! Durable persistence of variant bytes and run manifests.
//!
//! The sink is an external collaborator: the pipeline only needs an
//! idempotent `put`. Keys are deterministic and hierarchical so re-running
//! a campaign overwrites its previous outputs.

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use remix_core::error::{PipelineError, PipelineResult};
use remix_core::types::AspectKey;
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

/// Result of persisting one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
}

/// Persists bytes under a deterministic key and returns a public URL.
/// Re-running with the same key overwrites. Failure aborts the run; any
/// retry policy belongs to the implementation, not the pipeline.
#[async_trait]
pub trait StorageSink: Send + Sync {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str)
        -> PipelineResult<StoredObject>;

    /// Round-trip a small probe object to confirm the sink is writable.
    async fn healthcheck(&self) -> PipelineResult<()> {
        let key = format!("healthcheck/{}", Uuid::new_v4());
        self.put(&key, Bytes::from_static(b"ok"), "text/plain")
            .await
            .map(|_| ())
    }
}

/// Storage key for one rendered variant.
pub fn variant_key(
    campaign_id: &str,
    locale: &str,
    product_id: &str,
    aspect: AspectKey,
    product_name: &str,
    ext: &str,
) -> String {
    format!(
        "generated/{campaign_id}/{locale}/{product_id}/{aspect}/{}.{ext}",
        safe_slug(product_name)
    )
}

/// Storage key for the run manifest.
pub fn manifest_key(campaign_id: &str, locale: &str) -> String {
    format!("generated/{campaign_id}/manifest-{locale}.json")
}

/// Lowercase, collapse non-alphanumeric runs to `-`, trim the edges.
pub fn safe_slug(s: &str) -> String {
    let mut slug = String::with_capacity(s.len());
    let mut last_dash = false;
    for c in s.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_matches('-').to_string()
}

// ─── In-memory sink ─────────────────────────────────────────────────────

/// DashMap-backed sink for tests and local development.
#[derive(Default)]
pub struct MemorySink {
    objects: DashMap<String, (Bytes, String)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.objects.get(key).map(|entry| entry.0.clone())
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects.get(key).map(|entry| entry.1.clone())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.iter().map(|e| e.key().clone()).collect()
    }
}

#[async_trait]
impl StorageSink for MemorySink {
    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> PipelineResult<StoredObject> {
        self.objects
            .insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(StoredObject {
            key: key.to_string(),
            url: format!("memory://{key}"),
        })
    }
}

// ─── Filesystem sink ────────────────────────────────────────────────────

/// Writes objects under a root directory; public URLs are formed by
/// prefixing the key with a configured base URL.
pub struct FsSink {
    root: PathBuf,
    base_url: String,
}

impl FsSink {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl StorageSink for FsSink {
    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> PipelineResult<StoredObject> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PipelineError::Storage(format!("mkdir {}: {e}", parent.display())))?;
        }
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| PipelineError::Storage(format!("write {}: {e}", path.display())))?;

        let digest = hex::encode(Sha256::digest(&bytes));
        debug!(
            key,
            size = bytes.len(),
            sha256 = &digest[..12],
            content_type,
            "stored object"
        );

        Ok(StoredObject {
            key: key.to_string(),
            url: format!("{}/{key}", self.base_url.trim_end_matches('/')),
        })
    }
}
