use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use euda_orchestrator::config::Config;
use euda_orchestrator::llm::{Client, LlmCollaborators};
use euda_orchestrator::{standard_registry, Orchestrator, OrchestratorError, Payload};

#[derive(Parser, Debug)]
#[command(name = "euda-orchestrator")]
#[command(about = "Answer a question about an Excel EUDA by routing it through the matching analysis pipeline")]
#[command(version)]
struct Cli {
    /// Free-text question
    query: String,
}

fn render(payload: &Payload) -> anyhow::Result<String> {
    match payload {
        Payload::String(text) => Ok(text.clone()),
        other => serde_json::to_string_pretty(other).context("cannot render result"),
    }
}

fn report(err: &OrchestratorError) {
    eprintln!("error [{}] in {}: {}", err.kind(), err.stage(), err);
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let config = Config::from_env().context("failed to load configuration")?;
    log::info!("LLM Configuration:");
    log::info!("  Host: {}", config.llm.host);
    log::info!("  Model: {}", config.llm.model);

    let collaborators = LlmCollaborators::new(Client::from_config(&config.llm));
    let orchestrator = Orchestrator::new(
        standard_registry(Arc::new(collaborators)),
        config.orchestrator_config(),
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling query");
            on_interrupt.cancel();
        }
    });

    match orchestrator.handle_with_cancel(&cli.query, &cancel).await {
        Ok(outcome) => {
            log::info!("Answered as '{}'", outcome.category);
            println!("{}", render(&outcome.payload)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            report(&err);
            Ok(ExitCode::FAILURE)
        }
    }
}
