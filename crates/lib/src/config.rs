//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.routechat/config.json`) and environment.
//! Environment variables win over the file; blank values count as unset.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::catalog::{self, ModelEntry};
use crate::chat::DEFAULT_SYSTEM_PROMPT;
use crate::llm::{ProviderSettings, DEFAULT_ENDPOINT};

pub const ENV_CONFIG_PATH: &str = "ROUTECHAT_CONFIG_PATH";
pub const ENV_API_KEY: &str = "OPENROUTER_API_KEY";
pub const ENV_ENDPOINT: &str = "OPENROUTER_API_URL";
pub const ENV_DEFAULT_MODEL: &str = "OPENROUTER_MODEL";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Completion service settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Chat behaviour.
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Completion service endpoint, credentials and identification headers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// OpenRouter API key. Overridden by OPENROUTER_API_KEY env.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Full chat completions URL. Overridden by OPENROUTER_API_URL env.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Default model for new threads: API identifier or catalog display name. Overridden by OPENROUTER_MODEL env.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    /// Value of the HTTP-Referer header (default "http://localhost").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
    /// Value of the X-Title header (default "Routechat").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Upper bound for one completion round trip, in seconds (default 120).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatConfig {
    /// System instruction sent ahead of every conversation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

pub const DEFAULT_REFERER: &str = "http://localhost";
pub const DEFAULT_TITLE: &str = "Routechat";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// First non-blank value, trimmed: env before config.
fn first_non_empty(env: Option<String>, config: Option<&String>) -> Option<String> {
    env.and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
    .or_else(|| {
        config
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Resolve the API key: env OPENROUTER_API_KEY overrides config. None is allowed; the service rejects the call.
pub fn resolve_api_key(config: &Config) -> Option<String> {
    first_non_empty(env_var(ENV_API_KEY), config.provider.api_key.as_ref())
}

/// Resolve the endpoint URL: env OPENROUTER_API_URL overrides config, then the OpenRouter default.
pub fn resolve_endpoint(config: &Config) -> String {
    first_non_empty(env_var(ENV_ENDPOINT), config.provider.endpoint.as_ref())
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
}

/// Resolve the default model for new threads. Names that are not in the catalog fall back
/// to the first catalog entry.
pub fn resolve_default_model(config: &Config) -> &'static ModelEntry {
    let wanted = first_non_empty(
        env_var(ENV_DEFAULT_MODEL),
        config.provider.default_model.as_ref(),
    );
    default_model_from(wanted.as_deref())
}

fn default_model_from(wanted: Option<&str>) -> &'static ModelEntry {
    match wanted {
        None => catalog::default_model(),
        Some(name) => catalog::resolve(name).unwrap_or_else(|| {
            log::warn!(
                "config: default model {:?} is not in the catalog, using {}",
                name,
                catalog::default_model().api_identifier
            );
            catalog::default_model()
        }),
    }
}

/// System prompt from config, or the built-in default.
pub fn resolve_system_prompt(config: &Config) -> String {
    first_non_empty(None, config.chat.system_prompt.as_ref())
        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string())
}

/// Build transport settings from config and environment.
pub fn resolve_provider(config: &Config) -> ProviderSettings {
    provider_settings(config, resolve_api_key(config), resolve_endpoint(config))
}

fn provider_settings(config: &Config, api_key: Option<String>, endpoint: String) -> ProviderSettings {
    let p = &config.provider;
    ProviderSettings {
        api_key,
        endpoint,
        referer: first_non_empty(None, p.referer.as_ref())
            .unwrap_or_else(|| DEFAULT_REFERER.to_string()),
        title: first_non_empty(None, p.title.as_ref()).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        timeout: Duration::from_secs(
            p.timeout_secs
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        ),
    }
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var(ENV_CONFIG_PATH).map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".routechat").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the given path, the default path, or ROUTECHAT_CONFIG_PATH. Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
