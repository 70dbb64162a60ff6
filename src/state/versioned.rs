use crate::resilience::checkpoint::restore_error;
use crate::resilience::{Checkpoint, StateStore};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// Version the state falls back to when nothing else can be trusted.
pub const MINIMAL_VERSION: &str = "1.0.0";

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// `"1.0.3"` -> `"1.0.4"`.
pub fn next_patch_version(version: &str) -> Result<String> {
    let parts: Vec<&str> = version.split('.').collect();
    let invalid = || {
        Error::validation_with_context(
            format!("'{}' is not a major.minor.patch version", version),
            ErrorContext::new().with_field_path("current_version"),
        )
    };
    if parts.len() != 3 {
        return Err(invalid());
    }
    let mut nums = [0u64; 3];
    for (slot, part) in nums.iter_mut().zip(&parts) {
        *slot = part.parse().map_err(|_| invalid())?;
    }
    let patch = nums[2].checked_add(1).ok_or_else(invalid)?;
    Ok(format!("{}.{}.{}", nums[0], nums[1], patch))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    Normal,
    Safe,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub version: String,
    pub timestamp: u64,
    #[serde(default)]
    pub changes: Vec<String>,
}

impl VersionRecord {
    pub fn new(version: impl Into<String>, changes: Vec<String>) -> Self {
        Self {
            version: version.into(),
            timestamp: unix_now(),
            changes,
        }
    }
}

/// One outcome the system learned from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningEntry {
    pub timestamp: u64,
    pub success: bool,
    #[serde(default)]
    pub lessons: Vec<String>,
}

impl LearningEntry {
    pub fn new(success: bool, lessons: Vec<String>) -> Self {
        Self {
            timestamp: unix_now(),
            success,
            lessons,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemState {
    pub current_version: String,
    pub version_history: Vec<VersionRecord>,
    pub learning: Vec<LearningEntry>,
    pub config: Value,
    pub mode: OperatingMode,
}

impl SystemState {
    pub fn minimal() -> Self {
        Self {
            current_version: MINIMAL_VERSION.to_string(),
            version_history: Vec::new(),
            learning: Vec::new(),
            config: json!({ "learning_enabled": true }),
            mode: OperatingMode::Normal,
        }
    }

    /// Checksum input: `"{version}_{history_len}_{learning_len}"`.
    pub fn fingerprint(&self) -> String {
        format!(
            "{}_{}_{}",
            self.current_version,
            self.version_history.len(),
            self.learning.len()
        )
    }
}

impl Default for SystemState {
    fn default() -> Self {
        Self::minimal()
    }
}

/// Versioned, checkpointable system state.
pub struct VersionedState {
    inner: RwLock<SystemState>,
}

impl VersionedState {
    pub fn new(state: SystemState) -> Self {
        Self {
            inner: RwLock::new(state),
        }
    }

    pub async fn snapshot(&self) -> SystemState {
        self.inner.read().await.clone()
    }

    pub async fn current_version(&self) -> String {
        self.inner.read().await.current_version.clone()
    }

    pub async fn mode(&self) -> OperatingMode {
        self.inner.read().await.mode
    }

    pub async fn set_config(&self, config: Value) {
        self.inner.write().await.config = config;
    }

    /// Make `record` the current version.
    pub async fn apply_version(&self, record: VersionRecord) {
        let mut st = self.inner.write().await;
        info!(from = st.current_version.as_str(), to = record.version.as_str(), "applying version");
        st.current_version = record.version.clone();
        st.version_history.push(record);
    }

    /// Apply the next patch version with `changes`.
    pub async fn bump_patch(&self, changes: Vec<String>) -> Result<VersionRecord> {
        let mut st = self.inner.write().await;
        let record = VersionRecord::new(next_patch_version(&st.current_version)?, changes);
        st.current_version = record.version.clone();
        st.version_history.push(record.clone());
        Ok(record)
    }

    pub async fn record_learning(&self, entry: LearningEntry) {
        self.inner.write().await.learning.push(entry);
    }

    /// Share of successful learning entries; 1.0 when there is no data yet.
    pub async fn success_rate(&self) -> f64 {
        let st = self.inner.read().await;
        if st.learning.is_empty() {
            return 1.0;
        }
        let ok = st.learning.iter().filter(|e| e.success).count();
        ok as f64 / st.learning.len() as f64
    }

    /// Switch to the second-to-last recorded version (or the only one).
    pub async fn restore_previous_version(&self) -> Result<String> {
        let mut st = self.inner.write().await;
        let n = st.version_history.len();
        let previous = match n {
            0 => {
                return Err(Error::restore_failed(
                    "No previous version available",
                    ErrorContext::new().with_source("version_history"),
                ))
            }
            1 => st.version_history[0].version.clone(),
            _ => st.version_history[n - 2].version.clone(),
        };
        warn!(from = st.current_version.as_str(), to = previous.as_str(), "restoring previous version");
        st.current_version = previous.clone();
        Ok(previous)
    }

    pub async fn set_mode(&self, mode: OperatingMode) {
        let mut st = self.inner.write().await;
        match mode {
            OperatingMode::Safe => warn!("activating safe mode"),
            OperatingMode::Shutdown => error!("emergency shutdown initiated"),
            OperatingMode::Normal => info!("returning to normal mode"),
        }
        st.mode = mode;
    }
}

impl Default for VersionedState {
    fn default() -> Self {
        Self::new(SystemState::minimal())
    }
}

fn metadata_len(checkpoint: &Checkpoint, key: &str) -> Result<usize> {
    checkpoint
        .metadata
        .get(key)
        .and_then(Value::as_u64)
        .map(|n| n as usize)
        .ok_or_else(|| restore_error(format!("checkpoint lacks '{}'", key), checkpoint))
}

#[async_trait]
impl StateStore for VersionedState {
    async fn checkpoint(&self, label: &str) -> Result<Checkpoint> {
        let st = self.inner.read().await;
        Ok(Checkpoint::new(
            label,
            st.current_version.clone(),
            st.fingerprint(),
            st.config.clone(),
        )
        .with_metadata("history_len", json!(st.version_history.len()))
        .with_metadata("learning_len", json!(st.learning.len()))
        .with_metadata("mode", serde_json::to_value(st.mode)?))
    }

    async fn restore(&self, checkpoint: &Checkpoint) -> Result<()> {
        if !checkpoint.verify() {
            return Err(restore_error("checksum mismatch", checkpoint));
        }
        let history_len = metadata_len(checkpoint, "history_len")?;
        let learning_len = metadata_len(checkpoint, "learning_len")?;
        let expected = format!("{}_{}_{}", checkpoint.version, history_len, learning_len);
        if expected != checkpoint.fingerprint {
            return Err(restore_error("metadata disagrees with fingerprint", checkpoint));
        }

        let mut st = self.inner.write().await;
        if st.version_history.len() < history_len || st.learning.len() < learning_len {
            return Err(restore_error("state is older than the checkpoint", checkpoint));
        }
        st.version_history.truncate(history_len);
        st.learning.truncate(learning_len);
        st.current_version = checkpoint.version.clone();
        st.config = checkpoint.config.clone();
        if let Some(mode) = checkpoint
            .metadata
            .get("mode")
            .and_then(|m| serde_json::from_value(m.clone()).ok())
        {
            st.mode = mode;
        }
        Ok(())
    }

    async fn reset_to_minimal(&self) {
        error!(version = MINIMAL_VERSION, "falling back to minimal state");
        *self.inner.write().await = SystemState::minimal();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_bump() {
        assert_eq!(next_patch_version("1.0.3").unwrap(), "1.0.4");
        assert_eq!(next_patch_version("2.9.9").unwrap(), "2.9.10");
        assert!(next_patch_version("1.0").is_err());
        assert!(next_patch_version("1.x.0").is_err());
    }

    #[test]
    fn patch_bump_at_u64_max_is_rejected() {
        let version = format!("1.0.{}", u64::MAX);
        let err = next_patch_version(&version).unwrap_err();
        assert_eq!(err.kind(), "validation_failed");
    }

    #[tokio::test]
    async fn previous_version_selection() {
        let s = VersionedState::default();
        assert!(s.restore_previous_version().await.is_err());

        s.bump_patch(vec![]).await.unwrap();
        assert_eq!(s.restore_previous_version().await.unwrap(), "1.0.1");

        s.bump_patch(vec![]).await.unwrap();
        s.bump_patch(vec![]).await.unwrap();
        assert_eq!(s.current_version().await, "1.0.3");
        assert_eq!(s.restore_previous_version().await.unwrap(), "1.0.2");
    }

    #[tokio::test]
    async fn success_rate_defaults_optimistic() {
        let s = VersionedState::default();
        assert_eq!(s.success_rate().await, 1.0);
        s.record_learning(LearningEntry::new(true, vec![])).await;
        s.record_learning(LearningEntry::new(false, vec!["timeout".into()])).await;
        assert_eq!(s.success_rate().await, 0.5);
    }

    #[tokio::test]
    async fn checkpoint_checksum_covers_lengths() {
        let s = VersionedState::default();
        let cp = s.checkpoint("x").await.unwrap();
        assert_eq!(cp.fingerprint, "1.0.0_0_0");
        assert_eq!(cp.checksum, crate::resilience::content_checksum("1.0.0_0_0"));
        assert!(cp.verify());
    }

    #[tokio::test]
    async fn restore_rewinds_history_and_learning() {
        let s = VersionedState::default();
        s.bump_patch(vec!["a".into()]).await.unwrap();
        let cp = s.checkpoint("x").await.unwrap();
        let before = s.snapshot().await;

        s.bump_patch(vec!["b".into()]).await.unwrap();
        s.record_learning(LearningEntry::new(false, vec![])).await;
        s.set_config(json!({"changed": true})).await;
        s.set_mode(OperatingMode::Safe).await;

        s.restore(&cp).await.unwrap();
        assert_eq!(s.snapshot().await, before);
    }

    #[tokio::test]
    async fn tampered_checkpoint_is_rejected() {
        let s = VersionedState::default();
        let mut cp = s.checkpoint("x").await.unwrap();
        cp.checksum = "0".repeat(64);
        assert_eq!(s.restore(&cp).await.unwrap_err().kind(), "restore_failed");
    }

    #[tokio::test]
    async fn minimal_reset_clears_everything() {
        let s = VersionedState::default();
        s.bump_patch(vec![]).await.unwrap();
        s.record_learning(LearningEntry::new(true, vec![])).await;
        s.reset_to_minimal().await;
        let st = s.snapshot().await;
        assert_eq!(st.current_version, "1.0.0");
        assert!(st.version_history.is_empty());
        assert!(st.learning.is_empty());
    }
}
