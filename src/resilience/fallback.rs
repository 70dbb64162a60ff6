use crate::{Error, ErrorContext, Result};
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// A deferred unit of work for the executor.
///
/// Operations are spawned onto the runtime when their turn comes, so they must
/// own everything they touch.
pub type Operation<T> = Box<dyn FnOnce() -> BoxFuture<'static, Result<T>> + Send>;

/// Box an async closure as an [`Operation`].
pub fn operation<T, F, Fut>(f: F) -> Operation<T>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    Box::new(move || f().boxed())
}

/// Result of running one operation under a deadline.
#[derive(Debug)]
pub enum ExecutionOutcome<T> {
    Completed(T),
    TimedOut,
    Failed(Error),
}

impl<T> ExecutionOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, ExecutionOutcome::Completed(_))
    }
}

/// Which link of the chain produced a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptSource {
    Primary,
    /// Zero-based index into the fallback list.
    Fallback(usize),
}

/// Terminal sentinel returned when every link of a chain failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MinimalState {
    pub status: String,
    pub message: String,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    pub recovery_method: String,
}

impl MinimalState {
    pub fn now() -> Self {
        Self {
            status: "minimal_fallback".to_string(),
            message: "System reverted to basic functionality".to_string(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            recovery_method: "automatic".to_string(),
        }
    }
}

/// Outcome of a whole chain. Exhaustion is a degraded success, never an error.
#[derive(Debug)]
pub enum FallbackResult<T> {
    Completed { value: T, source: AttemptSource },
    Minimal(MinimalState),
}

impl<T> FallbackResult<T> {
    pub fn is_minimal(&self) -> bool {
        matches!(self, FallbackResult::Minimal(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            FallbackResult::Completed { value, .. } => Some(value),
            FallbackResult::Minimal(_) => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            FallbackResult::Completed { value, .. } => Some(value),
            FallbackResult::Minimal(_) => None,
        }
    }

    pub fn source(&self) -> Option<AttemptSource> {
        match self {
            FallbackResult::Completed { source, .. } => Some(*source),
            FallbackResult::Minimal(_) => None,
        }
    }
}

/// Aborts the spawned task when dropped, so an abandoned wait never leaves
/// the work running.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Runs a primary operation and an ordered fallback list, each under the same
/// per-operation deadline.
#[derive(Debug, Clone)]
pub struct FallbackExecutor {
    per_op_timeout: Duration,
}

impl FallbackExecutor {
    pub fn new(per_op_timeout: Duration) -> Self {
        Self { per_op_timeout }
    }

    pub fn per_op_timeout(&self) -> Duration {
        self.per_op_timeout
    }

    /// Run `op` on its own task; on deadline expiry the task is aborted.
    pub async fn run_once<T: Send + 'static>(&self, label: &str, op: Operation<T>) -> ExecutionOutcome<T> {
        let mut task = AbortOnDrop(tokio::spawn(op()));
        match tokio::time::timeout(self.per_op_timeout, &mut task.0).await {
            Ok(Ok(Ok(value))) => ExecutionOutcome::Completed(value),
            Ok(Ok(Err(e))) => ExecutionOutcome::Failed(e),
            Ok(Err(join)) => {
                let what = if join.is_panic() { "panicked" } else { "was cancelled" };
                ExecutionOutcome::Failed(Error::runtime_with_context(
                    format!("operation {}", what),
                    ErrorContext::new().with_source(label),
                ))
            }
            Err(_) => {
                task.0.abort();
                warn!(
                    operation = label,
                    timeout_ms = self.per_op_timeout.as_millis() as u64,
                    "operation exceeded deadline, task aborted"
                );
                ExecutionOutcome::TimedOut
            }
        }
    }

    async fn attempt<T, V>(&self, label: &str, op: Operation<T>, is_valid: &V) -> Option<T>
    where
        T: Send + 'static,
        V: Fn(&T) -> bool,
    {
        match self.run_once(label, op).await {
            ExecutionOutcome::Completed(value) if is_valid(&value) => Some(value),
            ExecutionOutcome::Completed(_) => {
                let e = Error::ValidationFailed {
                    message: "result rejected by validity check".to_string(),
                    context: ErrorContext::new().with_source(label),
                };
                warn!(operation = label, error = %e, "invalid result");
                None
            }
            ExecutionOutcome::TimedOut => None,
            ExecutionOutcome::Failed(e) => {
                warn!(operation = label, kind = e.kind(), error = %e, "operation failed");
                None
            }
        }
    }

    /// Primary, then fallbacks in order; first valid result wins.
    ///
    /// Fallbacks after the winner are never invoked. If nothing produces a
    /// valid result (including when `fallbacks` is empty) the chain yields
    /// [`FallbackResult::Minimal`].
    pub async fn run_with_fallback<T, V>(
        &self,
        primary: Operation<T>,
        fallbacks: Vec<Operation<T>>,
        is_valid: V,
    ) -> FallbackResult<T>
    where
        T: Send + 'static,
        V: Fn(&T) -> bool,
    {
        if let Some(value) = self.attempt("primary", primary, &is_valid).await {
            return FallbackResult::Completed {
                value,
                source: AttemptSource::Primary,
            };
        }

        for (i, op) in fallbacks.into_iter().enumerate() {
            let label = format!("fallback_{}", i + 1);
            info!(operation = label.as_str(), "trying fallback");
            if let Some(value) = self.attempt(&label, op, &is_valid).await {
                info!(operation = label.as_str(), "fallback succeeded");
                return FallbackResult::Completed {
                    value,
                    source: AttemptSource::Fallback(i),
                };
            }
        }

        error!("all fallbacks failed, falling back to minimal state");
        FallbackResult::Minimal(MinimalState::now())
    }

    /// [`run_with_fallback`](Self::run_with_fallback) under an overall
    /// deadline. When it elapses the in-flight operation is aborted and the
    /// minimal state is returned.
    pub async fn run_with_deadline<T, V>(
        &self,
        overall: Duration,
        primary: Operation<T>,
        fallbacks: Vec<Operation<T>>,
        is_valid: V,
    ) -> FallbackResult<T>
    where
        T: Send + 'static,
        V: Fn(&T) -> bool,
    {
        match tokio::time::timeout(overall, self.run_with_fallback(primary, fallbacks, is_valid)).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    deadline_ms = overall.as_millis() as u64,
                    "fallback chain exceeded overall deadline, falling back to minimal state"
                );
                FallbackResult::Minimal(MinimalState::now())
            }
        }
    }
}
