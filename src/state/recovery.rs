//! Post-failure recovery chain over [`VersionedState`].

use super::versioned::{OperatingMode, VersionedState};
use crate::resilience::{operation, FallbackExecutor, FallbackResult, Operation};
use serde::Serialize;
use std::sync::Arc;

/// What a recovery step did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RecoveryAction {
    RestoredVersion { version: String },
    SafeMode,
    EmergencyShutdown,
}

/// Restore previous version, then safe mode, then emergency shutdown.
pub fn recovery_chain(state: Arc<VersionedState>) -> Vec<Operation<RecoveryAction>> {
    let restore = state.clone();
    let safe = state.clone();
    let shutdown = state;
    vec![
        operation(move || async move {
            let version = restore.restore_previous_version().await?;
            Ok(RecoveryAction::RestoredVersion { version })
        }),
        operation(move || async move {
            safe.set_mode(OperatingMode::Safe).await;
            Ok(RecoveryAction::SafeMode)
        }),
        operation(move || async move {
            shutdown.set_mode(OperatingMode::Shutdown).await;
            Ok(RecoveryAction::EmergencyShutdown)
        }),
    ]
}

/// Run [`recovery_chain`] through `executor`.
pub async fn recover(
    executor: &FallbackExecutor,
    state: Arc<VersionedState>,
) -> FallbackResult<RecoveryAction> {
    let mut chain = recovery_chain(state).into_iter();
    match chain.next() {
        Some(primary) => executor.run_with_fallback(primary, chain.collect(), |_| true).await,
        None => FallbackResult::Minimal(crate::resilience::MinimalState::now()),
    }
}
