//! llm-backend-cli — 后端探测、模型列表与对话的命令行工具
//!
//! Usage:
//!   llm-backend-cli candidates                     Show the candidate address list
//!   llm-backend-cli probe [--url <base>]           Probe candidates (or one address)
//!   llm-backend-cli models                         List models at the first reachable address
//!   llm-backend-cli chat <prompt> [--model <m>]    Send one prompt

use anyhow::{bail, Context};
use resilient_llm_backend::{ClientConfig, LlmClient};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let result = match args[1].as_str() {
        "candidates" => cmd_candidates().await,
        "probe" => cmd_probe(&args[2..]).await,
        "models" => cmd_models().await,
        "chat" => cmd_chat(&args[2..]).await,
        "version" | "--version" | "-V" => {
            cmd_version();
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn print_usage() {
    println!(
        r#"llm-backend-cli — 后端探测与对话工具

USAGE:
    llm-backend-cli <COMMAND> [OPTIONS]

COMMANDS:
    candidates                  Show the ordered candidate address list
    probe [--url <base>]        Test connectivity, or classify one address
    models                      List models at the first reachable address
    chat <prompt> [--model <m>] Send a single prompt and print the result envelope
    version                     Show version information
    help                        Show this help message

ENVIRONMENT:
    LLM_API_BASE_URL            Primary backend address (also OLLAMA_HOST, OLLAMA_BASE_URL)
    LLM_API_KEY                 Bearer credential
    LLM_DEFAULT_MODEL           Model used when --model is not given
    RUST_LOG                    Log filter (default: warn)"#
    );
}

fn cmd_version() {
    println!(
        "llm-backend-cli {} (resilient-llm-backend {})",
        env!("CARGO_PKG_VERSION"),
        env!("CARGO_PKG_VERSION"),
    );
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn client() -> anyhow::Result<LlmClient> {
    let config = ClientConfig::from_env().context("loading configuration")?;
    LlmClient::new(config).context("building client")
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn cmd_candidates() -> anyhow::Result<()> {
    let client = client()?;
    for (i, url) in client.candidates().iter().enumerate() {
        println!("{:>2}. {}", i + 1, url);
    }
    Ok(())
}

async fn cmd_probe(args: &[String]) -> anyhow::Result<()> {
    let client = client()?;
    if let Some(url) = flag_value(args, "--url") {
        let kind = client.probe(url.trim_end_matches('/')).await;
        println!("{url}: {kind}");
        return Ok(());
    }
    let report = client.test_connection().await;
    print_json(&report.to_envelope())?;
    if !report.is_connected() {
        std::process::exit(2);
    }
    Ok(())
}

async fn cmd_models() -> anyhow::Result<()> {
    let listing = client()?.list_models().await?;
    print_json(&listing)
}

async fn cmd_chat(args: &[String]) -> anyhow::Result<()> {
    let Some(prompt) = args.first().filter(|a| !a.starts_with("--")) else {
        bail!("usage: llm-backend-cli chat <prompt> [--model <m>]");
    };
    let result = client()?
        .simple_completion(prompt, flag_value(args, "--model"))
        .await;
    print_json(&result)?;
    if !result.is_success() {
        std::process::exit(2);
    }
    Ok(())
}
