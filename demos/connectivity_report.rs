//! Backend connectivity report
//!
//! Probes every candidate address, reports which protocol each one speaks,
//! then lists models and sends one prompt through the dispatcher.
//!
//! Usage:
//!   cargo run --example connectivity_report
//! Or against a specific host:
//!   LLM_API_BASE_URL=http://gpu-box:11434 cargo run --example connectivity_report

use resilient_llm_backend::{ClientConfig, LlmClient, ProtocolKind};
use std::time::Instant;

#[derive(Debug)]
struct Row {
    base_url: String,
    protocol: ProtocolKind,
    duration_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("resilient_llm_backend=info")
        .init();

    let client = LlmClient::new(ClientConfig::from_env()?)?;

    let mut rows = Vec::new();
    for base in client.candidates().iter() {
        let started = Instant::now();
        let protocol = client.probe(base).await;
        rows.push(Row {
            base_url: base.clone(),
            protocol,
            duration_ms: started.elapsed().as_millis() as u64,
        });
    }

    println!("{:<40} {:<20} {:>8}", "ADDRESS", "PROTOCOL", "MS");
    for row in &rows {
        println!("{:<40} {:<20} {:>8}", row.base_url, row.protocol.to_string(), row.duration_ms);
    }
    println!();

    let report = client.test_connection().await;
    println!("connection: {}", serde_json::to_string_pretty(&report.to_envelope())?);
    if !report.is_connected() {
        return Ok(());
    }

    match client.list_models().await {
        Ok(listing) => println!("models at {} ({}): {:?}", listing.base_url, listing.protocol, listing.ids()),
        Err(e) => println!("model listing failed: {e}"),
    }

    let result = client
        .simple_completion("Reply with the single word: pong", None)
        .await;
    println!("chat: {}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
