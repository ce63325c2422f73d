//! Headless settings inspector: loads the agent backend's settings, runs the
//! form's model check for the active provider and prints what it found.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use app::{FetchOutcome, SettingsForm};
use providers::registry::all_providers;
use providers::{ApiClient, ModelCatalog};
use shared::config::DashboardConfig;
use shared::events::FormEvent;
use shared::{validate_settings, SettingsFormData};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::unbounded_channel;
use tracing_subscriber::EnvFilter;

fn settings_from_json(value: serde_json::Value) -> SettingsFormData {
    match value {
        serde_json::Value::Object(fields) => fields
            .into_iter()
            .filter_map(|(k, v)| match v {
                serde_json::Value::String(s) => Some((k, s)),
                serde_json::Value::Null => None,
                other => Some((k, other.to_string())),
            })
            .collect(),
        _ => SettingsFormData::new(),
    }
}

async fn list_chats(client: &ApiClient) -> Result<()> {
    let mut chats = client.list_chats().await.context("listing chats")?;
    chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    for chat in chats {
        let updated = chat
            .updated_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        println!("{}  {}  {}", chat.id, updated, chat.name);
    }
    Ok(())
}

async fn inspect_settings(client: ApiClient, config: &DashboardConfig) -> Result<()> {
    let value = client
        .get_settings()
        .await
        .map(settings_from_json)
        .unwrap_or_default();

    let (tx, mut rx) = unbounded_channel();
    let catalog: Arc<dyn ModelCatalog> = Arc::new(client);
    let form = SettingsForm::new(value, catalog, tx, config.debounce());
    let active = form.active_provider();
    let outcome = form.mount().await.context("model check task failed")?;
    form.unmount();

    let mut has_error = false;
    while let Ok(event) = rx.try_recv() {
        if let FormEvent::ValidationError(e) = event {
            has_error = e;
        }
    }

    for info in all_providers() {
        let marker = if info.provider == active { "*" } else { " " };
        let state = form.validation(info.provider);
        println!("{} {:<16} {:?}", marker, info.name, state.status);
        if info.provider == active {
            match &outcome {
                FetchOutcome::Loaded(models) => {
                    for model in models {
                        println!("      {}", model);
                    }
                }
                FetchOutcome::Failed(message) => println!("      error: {}", message),
                FetchOutcome::Superseded => {}
            }
        }
    }

    if has_error {
        let missing = validate_settings(&form.value()).missing;
        let names: Vec<_> = missing.iter().map(|k| k.as_str()).collect();
        println!("incomplete settings, missing: {}", names.join(", "));
    }
    Ok(())
}

/// Inspect the AI agent backend's LLM settings and chat history.
#[derive(Debug, Parser)]
#[command(name = "ai-agent-settings", version)]
struct Cli {
    /// JSON config file; `AI_AGENT_*` environment variables are used otherwise
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
enum Command {
    /// Load the saved settings and check the active provider's models
    Settings,
    /// List saved chats, newest first
    Chats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => DashboardConfig::load(path)?,
        None => DashboardConfig::from_env(),
    };
    tracing::debug!(api = %config.api_url(), "using backend");
    let client = ApiClient::from_config(&config).context("building API client")?;

    match cli.command.unwrap_or(Command::Settings) {
        Command::Settings => inspect_settings(client, &config).await,
        Command::Chats => list_chats(&client).await,
    }
}
