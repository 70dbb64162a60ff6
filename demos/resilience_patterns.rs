//! Resilience patterns
//!
//! 1. A fallback chain whose primary hangs: the executor aborts it at the
//!    per-operation deadline and a fallback answers instead.
//! 2. A chain where everything fails and the minimal-state sentinel comes back.
//! 3. A checkpointed upgrade that fails and is rolled back.
//!
//! Usage:
//!   cargo run --example resilience_patterns

use resilient_llm_backend::resilience::{operation, with_checkpoint, FallbackExecutor, FallbackResult};
use resilient_llm_backend::state::VersionedState;
use resilient_llm_backend::{Error, ErrorContext};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("resilient_llm_backend=info")
        .init();

    let exec = FallbackExecutor::new(Duration::from_millis(500));

    // 1. Hung primary
    let result = exec
        .run_with_fallback(
            operation(|| async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok("never".to_string())
            }),
            vec![operation(|| async { Ok("answer from fallback".to_string()) })],
            |s: &String| !s.is_empty(),
        )
        .await;
    println!("hung primary -> {:?} from {:?}", result.value(), result.source());

    // 2. Everything fails
    let result = exec
        .run_with_fallback(
            operation(|| async {
                Err::<String, _>(Error::runtime_with_context("primary down", ErrorContext::new()))
            }),
            vec![operation(|| async { Ok(String::new()) })],
            |s: &String| !s.is_empty(),
        )
        .await;
    if let FallbackResult::Minimal(state) = &result {
        println!("exhausted -> {}", serde_json::to_string(state)?);
    }

    // 3. Checkpointed upgrade
    let state = VersionedState::default();
    state.bump_patch(vec!["baseline".into()]).await?;
    println!("before upgrade: {}", state.current_version().await);

    let outcome: resilient_llm_backend::Result<()> = with_checkpoint(&state, "upgrade", || async {
        let record = state.bump_patch(vec!["new routing rules".into()]).await?;
        println!("  applied {}", record.version);
        Err(Error::runtime_with_context(
            "post-upgrade health check failed",
            ErrorContext::new().with_source("health_check"),
        ))
    })
    .await;

    println!("upgrade result: {:?}", outcome.err().map(|e| e.to_string()));
    println!("after rollback: {}", state.current_version().await);
    Ok(())
}
