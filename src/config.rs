use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chat_core::GenerationSettings;
use serde::Deserialize;

pub const CONFIG_PATH_ENV_VAR: &str = "MURMUR_CONFIG_PATH";
pub const PROVIDER_ENV_VAR: &str = "MURMUR_PROVIDER";
pub const API_KEY_ENV_VAR: &str = "MURMUR_API_KEY";

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_MAX_TOKENS: u32 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    Mock,
    ChatApi,
}

impl ProviderKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "mock" => Some(Self::Mock),
            "chat-api" => Some(Self::ChatApi),
            _ => None,
        }
    }
}

/// Client configuration loaded from a TOML file with env overrides.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub provider: ProviderKind,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub organization: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub frequency_penalty: Option<f64>,
    pub request_timeout_sec: Option<u64>,
    pub session_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Mock,
            base_url: None,
            api_key: None,
            organization: None,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
            top_p: None,
            frequency_penalty: None,
            request_timeout_sec: None,
            session_dir: None,
        }
    }
}

impl AppConfig {
    /// Loads configuration from `MURMUR_CONFIG_PATH` or the default config
    /// file location, then applies env overrides. A missing file yields the
    /// defaults.
    pub fn load() -> Result<Self> {
        let path = config_path();
        let mut config = match path {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("parsing config file {}", path.display()))?
            }
            _ => Self::default(),
        };

        if let Some(provider) = std::env::var(PROVIDER_ENV_VAR)
            .ok()
            .as_deref()
            .and_then(ProviderKind::parse)
        {
            config.provider = provider;
        }

        if let Ok(api_key) = std::env::var(API_KEY_ENV_VAR) {
            if !api_key.trim().is_empty() {
                config.api_key = Some(api_key.trim().to_string());
            }
        }

        Ok(config)
    }

    #[must_use]
    pub fn generation_settings(&self) -> GenerationSettings {
        let mut settings = GenerationSettings::new(self.model.clone(), self.max_tokens);
        if let Some(temperature) = self.temperature {
            settings = settings.with_temperature(temperature);
        }
        if let Some(top_p) = self.top_p {
            settings = settings.with_top_p(top_p);
        }
        if let Some(frequency_penalty) = self.frequency_penalty {
            settings = settings.with_frequency_penalty(frequency_penalty);
        }
        settings
    }

    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_sec.map(Duration::from_secs)
    }

    /// Directory holding session documents: an explicit `session_dir`, or the
    /// conventional location under the user's home directory.
    #[must_use]
    pub fn session_root(&self) -> PathBuf {
        if let Some(dir) = &self.session_dir {
            return dir.clone();
        }

        let base = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        session_store::session_root(&base)
    }
}

fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV_VAR) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    dirs::config_dir().map(|dir| dir.join("murmur").join("config.toml"))
}
