//! Initialize the configuration directory: create ~/.routechat and a starter config.json.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::catalog;
use crate::chat::DEFAULT_SYSTEM_PROMPT;
use crate::config::{self, Config};

/// Starter config: every optional field spelled out except the key, which is better kept in
/// OPENROUTER_API_KEY.
fn starter_config() -> Config {
    let mut c = Config::default();
    c.provider.endpoint = Some(crate::llm::DEFAULT_ENDPOINT.to_string());
    c.provider.default_model = Some(catalog::default_model().api_identifier.to_string());
    c.provider.referer = Some(config::DEFAULT_REFERER.to_string());
    c.provider.title = Some(config::DEFAULT_TITLE.to_string());
    c.provider.timeout_secs = Some(config::DEFAULT_TIMEOUT_SECS);
    c.chat.system_prompt = Some(DEFAULT_SYSTEM_PROMPT.to_string());
    c
}

/// Create the config directory and write a starter `config.json` if it does not exist.
/// An existing file is left untouched. Returns the config directory.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        let body = serde_json::to_string_pretty(&starter_config())
            .context("serializing default config")?;
        std::fs::write(config_path, body)
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    } else {
        log::debug!(
            "config already exists at {}, skipping",
            config_path.display()
        );
    }

    Ok(config_dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("routechat-init-{}", uuid::Uuid::new_v4()))
            .join("config.json")
    }

    #[test]
    fn writes_loadable_starter_config() {
        let path = temp_path();
        let dir = init_config_dir(&path).unwrap();
        assert_eq!(Some(dir.as_path()), path.parent());
        let (config, _) = config::load_config(Some(path)).unwrap();
        assert!(config.provider.api_key.is_none());
        assert_eq!(
            config.provider.default_model.as_deref(),
            Some(catalog::default_model().api_identifier)
        );
        assert_eq!(config.chat.system_prompt.as_deref(), Some(DEFAULT_SYSTEM_PROMPT));
    }

    #[test]
    fn existing_config_is_not_overwritten() {
        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"chat":{"systemPrompt":"keep me"}}"#).unwrap();
        init_config_dir(&path).unwrap();
        let (config, _) = config::load_config(Some(path)).unwrap();
        assert_eq!(config.chat.system_prompt.as_deref(), Some("keep me"));
    }
}
