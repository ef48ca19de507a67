//! Interactive streaming chat client over the orchestration engine.
//!
//! ## Provider bootstrap
//!
//! `murmur` requires explicit provider selection through the config file or
//! `MURMUR_PROVIDER`:
//!
//! - `provider = "mock"` for deterministic offline runs
//! - `provider = "chat-api"` for OpenAI-compatible streaming transport
//!
//! When `provider = "chat-api"`, set `base_url` for a non-default backend and
//! supply a bearer token through `MURMUR_API_KEY` (or the `api_key` config
//! field). The config file lives at the platform config dir under
//! `murmur/config.toml` and can be relocated with `MURMUR_CONFIG_PATH`.
//!
//! Session bootstrap is bounded by a timeout; a slow disk surfaces as an
//! ordinary startup error rather than a hang.

mod commands;
mod config;
mod repl;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chat_core::InferenceClient;
use chat_engine::{notification_channel, EngineNotification, Orchestrator};
use inference_chat_api::{ChatApiInferenceClient, ChatApiProviderConfig};
use inference_mock::ScriptedInferenceClient;
use session_store::{Conversation, FileSessionStore, SessionStore};
use tracing_subscriber::EnvFilter;

use config::{AppConfig, ProviderKind};

const BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    tracing::debug!(provider = ?config.provider, model = %config.model, "configuration loaded");
    let client = build_client(&config)?;

    let (store, conversation) =
        tokio::time::timeout(BOOTSTRAP_TIMEOUT, bootstrap_session(config.clone()))
            .await
            .context("session bootstrap timed out")??;

    let (notifications_tx, mut notifications_rx) = notification_channel();
    tokio::spawn(async move {
        while let Some(notification) = notifications_rx.recv().await {
            match notification {
                EngineNotification::Error { message } => eprintln!("error: {message}"),
                EngineNotification::Cancelled => eprintln!("(cancelled)"),
                EngineNotification::ProcessingStateChanged { .. }
                | EngineNotification::SettingsUpdated => {}
            }
        }
    });

    let orchestrator = Orchestrator::new(
        Arc::clone(&client),
        Arc::clone(&store),
        notifications_tx,
        config.generation_settings(),
        conversation,
    );

    repl::run(orchestrator, client, store).await
}

fn build_client(config: &AppConfig) -> Result<Arc<dyn InferenceClient>> {
    match config.provider {
        ProviderKind::Mock => Ok(Arc::new(ScriptedInferenceClient::canned())),
        ProviderKind::ChatApi => {
            let mut provider = ChatApiProviderConfig::new();
            if let Some(api_key) = &config.api_key {
                provider = provider.with_api_key(api_key.clone());
            }
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            if let Some(organization) = &config.organization {
                provider = provider.with_organization(organization.clone());
            }
            if let Some(timeout) = config.request_timeout() {
                provider = provider.with_timeout(timeout);
            }

            let client = ChatApiInferenceClient::new(provider)
                .context("initializing chat-api provider")?;
            Ok(Arc::new(client))
        }
    }
}

/// Opens the session store and picks the most recent session, creating the
/// first one on a fresh install.
async fn bootstrap_session(config: AppConfig) -> Result<(Arc<dyn SessionStore>, Conversation)> {
    tokio::task::spawn_blocking(move || {
        let store: Arc<dyn SessionStore> = Arc::new(
            FileSessionStore::open(config.session_root()).context("opening session store")?,
        );

        let conversation = match store
            .list_sessions()
            .context("listing sessions")?
            .into_iter()
            .last()
        {
            Some(existing) => existing,
            None => store
                .insert_session("default", &[])
                .context("creating initial session")?,
        };

        Ok((store, conversation))
    })
    .await
    .context("session bootstrap task failed")?
}
