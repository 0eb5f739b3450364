use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};

mod api;
mod cli;
mod codebase;
mod config;
mod conversation;
mod output;
mod response;
mod session;
mod transcript;
mod turn;

use api::AnthropicClient;
use cli::{resolve_output_dir, Cli};
use codebase::normalize_extensions;
use config::{api_key_from_env, default_config_path, resolve_model, Config};
use session::{Session, SessionSettings, SystemPrompts};
use transcript::TranscriptStore;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG takes precedence over -v
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    println!("ClaudeCLI");

    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let config = Config::load_or_create(&config_path)?;

    let model = match &cli.model {
        Some(name) => resolve_model(name),
        None => config.anthropic_model.clone(),
    };
    println!("Model in use: {}\n", model);

    let api_key = api_key_from_env()?;
    let output_dir = resolve_output_dir(cli.output_dir)?;
    let prompts = SystemPrompts::load(cli.coder_system_prompt, cli.general_system_prompt)?;

    let transport = AnthropicClient::new(&config.anthropic_api_url, api_key, config.timeout_secs)
        .context("Failed to create API client")?;

    let transcript = if config.save_transcripts {
        match TranscriptStore::new(None) {
            Ok(store) => Some(store),
            Err(e) => {
                warn!("Transcripts will not be saved: {:#}", e);
                None
            }
        }
    } else {
        None
    };

    let settings = SessionSettings {
        model,
        output_dir,
        force: cli.force,
        prompts,
    };

    let mut session = Session::new(transport, config, settings, transcript);
    session.load_codebases(&cli.sources, &normalize_extensions(&cli.file_extensions));
    session.run().await
}
