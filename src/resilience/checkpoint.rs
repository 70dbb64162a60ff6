use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::SystemTime;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Hex-encoded SHA-256 of `content`.
pub fn content_checksum(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// In-memory snapshot taken before a risky mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: Uuid,
    pub label: String,
    pub version: String,
    /// The string the checksum was computed over.
    pub fingerprint: String,
    pub checksum: String,
    pub config: Value,
    pub created_at: SystemTime,
    pub metadata: BTreeMap<String, Value>,
}

impl Checkpoint {
    pub fn new(
        label: impl Into<String>,
        version: impl Into<String>,
        fingerprint: impl Into<String>,
        config: Value,
    ) -> Self {
        let fingerprint = fingerprint.into();
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            version: version.into(),
            checksum: content_checksum(&fingerprint),
            fingerprint,
            config,
            created_at: SystemTime::now(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Whether the stored checksum still matches the fingerprint.
    pub fn verify(&self) -> bool {
        content_checksum(&self.fingerprint) == self.checksum
    }
}

/// State that can be snapshotted and rolled back.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn checkpoint(&self, label: &str) -> Result<Checkpoint>;

    async fn restore(&self, checkpoint: &Checkpoint) -> Result<()>;

    /// Hard-coded known-good state. Must not fail.
    async fn reset_to_minimal(&self);
}

/// Run `body` inside a checkpoint envelope.
///
/// On failure the store is rolled back to the checkpoint, or reset to its
/// minimal state if the rollback fails, and the body's original error is
/// returned either way.
pub async fn with_checkpoint<S, T, F, Fut>(store: &S, label: &str, body: F) -> Result<T>
where
    S: StateStore + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let checkpoint = store.checkpoint(label).await?;
    info!(operation = label, checkpoint = %checkpoint.id, "starting guarded operation");

    match body().await {
        Ok(value) => {
            debug!(operation = label, checkpoint = %checkpoint.id, "completed, checkpoint discarded");
            Ok(value)
        }
        Err(err) => {
            warn!(operation = label, checkpoint = %checkpoint.id, error = %err, "guarded operation failed, restoring");
            match store.restore(&checkpoint).await {
                Ok(()) => info!(operation = label, version = checkpoint.version.as_str(), "restore completed"),
                Err(restore_err) => {
                    error!(
                        operation = label,
                        error = %restore_err,
                        "critical failure during restore, falling back to minimal state"
                    );
                    store.reset_to_minimal().await;
                }
            }
            Err(err)
        }
    }
}

/// Restore failures carry this source tag.
pub(crate) fn restore_error(msg: impl Into<String>, checkpoint: &Checkpoint) -> Error {
    Error::restore_failed(
        msg,
        crate::ErrorContext::new()
            .with_source("checkpoint")
            .with_details(checkpoint.id.to_string()),
    )
}
