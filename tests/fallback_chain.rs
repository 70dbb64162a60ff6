//! Fallback chain ordering, exhaustion and deadlines.

use resilient_llm_backend::resilience::{
    operation, AttemptSource, FallbackExecutor, FallbackResult, Operation,
};
use resilient_llm_backend::{ChatRequest, ClientConfig, Error, ErrorContext, LlmClient};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn tracked(log: Arc<std::sync::Mutex<Vec<&'static str>>>, name: &'static str, ok: bool) -> Operation<String> {
    operation(move || async move {
        log.lock().unwrap().push(name);
        if ok {
            Ok(name.to_string())
        } else {
            Err(Error::runtime_with_context(
                format!("{name} failed"),
                ErrorContext::new().with_source(name),
            ))
        }
    })
}

fn sleeper(d: Duration) -> Operation<String> {
    operation(move || async move {
        tokio::time::sleep(d).await;
        Ok("late".to_string())
    })
}

#[tokio::test]
async fn exhaustion_with_fallbacks_yields_minimal_state() {
    let log = Arc::new(std::sync::Mutex::new(Vec::new()));
    let exec = FallbackExecutor::new(Duration::from_millis(50));

    let result = exec
        .run_with_fallback(
            tracked(log.clone(), "primary", false),
            vec![
                sleeper(Duration::from_secs(60)),
                operation(|| async { Ok(String::new()) }),
                tracked(log.clone(), "third", false),
            ],
            |s: &String| !s.is_empty(),
        )
        .await;

    match result {
        FallbackResult::Minimal(state) => {
            assert_eq!(state.status, "minimal_fallback");
            assert_eq!(state.recovery_method, "automatic");
        }
        FallbackResult::Completed { .. } => panic!("expected minimal state"),
    }
    assert_eq!(*log.lock().unwrap(), vec!["primary", "third"]);
}

#[tokio::test]
async fn exhaustion_without_fallbacks_yields_minimal_state() {
    let log = Arc::new(std::sync::Mutex::new(Vec::new()));
    let result = FallbackExecutor::new(Duration::from_millis(50))
        .run_with_fallback(tracked(log, "primary", false), Vec::new(), |_| true)
        .await;
    assert!(result.is_minimal());
}

#[tokio::test]
async fn second_fallback_wins_and_third_never_runs() {
    let third_calls = Arc::new(AtomicUsize::new(0));
    let counter = third_calls.clone();
    let log = Arc::new(std::sync::Mutex::new(Vec::new()));

    let result = FallbackExecutor::new(Duration::from_millis(200))
        .run_with_fallback(
            tracked(log.clone(), "primary", false),
            vec![
                tracked(log.clone(), "first", false),
                tracked(log.clone(), "second", true),
                operation(move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok("third".to_string())
                }),
            ],
            |_| true,
        )
        .await;

    assert_eq!(result.source(), Some(AttemptSource::Fallback(1)));
    assert_eq!(result.into_value().as_deref(), Some("second"));
    assert_eq!(third_calls.load(Ordering::SeqCst), 0);
    assert_eq!(*log.lock().unwrap(), vec!["primary", "first", "second"]);
}

#[tokio::test]
async fn hung_primary_is_abandoned_within_deadline() {
    let started = Instant::now();
    let result = FallbackExecutor::new(Duration::from_millis(100))
        .run_with_fallback(
            sleeper(Duration::from_secs(3600)),
            vec![operation(|| async { Ok("fallback".to_string()) })],
            |_| true,
        )
        .await;
    assert_eq!(result.into_value().as_deref(), Some("fallback"));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn overall_deadline_cuts_chain_short() {
    let started = Instant::now();
    let result = FallbackExecutor::new(Duration::from_secs(30))
        .run_with_deadline(
            Duration::from_millis(100),
            sleeper(Duration::from_secs(3600)),
            vec![sleeper(Duration::from_secs(3600))],
            |_| true,
        )
        .await;
    assert!(result.is_minimal());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn dispatch_as_primary_falls_back_when_no_backend_answers() {
    // Nothing listens on port 9 locally; every attempt fails fast.
    let client = Arc::new(
        LlmClient::builder()
            .config(ClientConfig::default().with_default_candidates(false))
            .candidates(["http://127.0.0.1:9"])
            .build()
            .expect("client builds"),
    );

    let primary_client = client.clone();
    let primary = operation(move || async move {
        let result = primary_client
            .chat_completion(&ChatRequest::prompt("hello", "phi3:mini"))
            .await;
        Ok(result)
    });
    let canned = operation(|| async {
        Ok(resilient_llm_backend::NormalizedResult::native("canned reply"))
    });

    let result = FallbackExecutor::new(Duration::from_secs(20))
        .run_with_fallback(primary, vec![canned], |r| r.is_success())
        .await;

    assert_eq!(result.source(), Some(AttemptSource::Fallback(0)));
    assert_eq!(
        result.value().and_then(|r| r.content()),
        Some("canned reply")
    );
}
