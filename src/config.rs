//! Configuration loading and validation.
//!
//! Settings come from `config.toml` in the working directory with an
//! environment-variable overlay (prefix `RELAY`), so secrets can be kept out
//! of the file in deployments.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Application settings, deserialized once at startup.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub general: GeneralSettings,
    pub telegram: TelegramSettings,
    #[serde(default)]
    pub integrations: Integrations,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneralSettings {
    /// Seconds a history entry stays eligible for provider context.
    #[serde(default = "default_history_ttl")]
    pub text_history_ttl: u64,
    /// Maximum history entries kept per conversation after TTL filtering.
    #[serde(default = "default_history_size")]
    pub text_history_size: usize,
    /// Path of the newline-delimited whitelist file.
    #[serde(default = "default_whitelist_path")]
    pub whitelist_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramSettings {
    pub bot_token: String,
    /// User id allowed to manage the whitelist.
    #[serde(default)]
    pub admin_id: i64,
    /// Statically allowed user ids.
    #[serde(default)]
    pub allowed_users: Vec<i64>,
    /// Statically allowed chat ids.
    #[serde(default)]
    pub allowed_chats: Vec<i64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Integrations {
    pub openai: Option<ProviderSettings>,
    pub replicate: Option<ProviderSettings>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderSettings {
    pub api_key: String,
    #[serde(default)]
    pub networks: Vec<Network>,
}

/// One configured provider network, triggered by a single `/command`.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Network {
    /// Provider-side model identifier, e.g. `gpt-4o-mini` or `openai/whisper`.
    pub name: String,
    /// Command token without the leading slash.
    pub command: String,
    /// Provider-specific model version string; empty when the provider does
    /// not version models.
    #[serde(default)]
    pub version: String,
    #[serde(rename = "type")]
    pub kind: NetworkKind,
}

/// Request modality a network serves.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NetworkKind {
    Text,
    Image,
    Audio,
}

const fn default_history_ttl() -> u64 {
    300
}

const fn default_history_size() -> usize {
    5
}

fn default_whitelist_path() -> String {
    "whitelist.txt".to_string()
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            text_history_ttl: default_history_ttl(),
            text_history_size: default_history_size(),
            whitelist_path: default_whitelist_path(),
        }
    }
}

impl Settings {
    /// Load settings from `config.toml` plus the `RELAY_` environment
    /// overlay (e.g. `RELAY_TELEGRAM__BOT_TOKEN`).
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file is missing, malformed, or the bot
    /// token is left at its placeholder value.
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_file("config")
    }

    /// Load settings from a specific config file basename.
    ///
    /// # Errors
    ///
    /// Same as [`Settings::new`].
    pub fn from_file(name: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(name))
            .add_source(Environment::with_prefix("RELAY").separator("__"))
            .build()?;

        let settings: Self = s.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram.bot_token.is_empty() || self.telegram.bot_token == "TG_BOT_TOKEN" {
            return Err(ConfigError::Message(
                "telegram.bot_token is not set".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Result<Settings, ConfigError> {
        let s = Config::builder()
            .add_source(File::from_str(toml, config::FileFormat::Toml))
            .build()?;
        let settings: Settings = s.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    #[test]
    fn parses_full_config() -> Result<(), ConfigError> {
        let settings = parse(
            r#"
            [general]
            text_history_ttl = 120
            text_history_size = 3

            [telegram]
            bot_token = "123:abc"
            admin_id = 42
            allowed_users = [1, 2]
            allowed_chats = [-100]

            [integrations.openai]
            api_key = "sk-test"
            networks = [
                { name = "gpt-4o-mini", command = "p", type = "text" },
                { name = "dall-e-3", command = "d", type = "image" },
            ]

            [integrations.replicate]
            api_key = "r8-test"
            networks = [
                { name = "openai/whisper", command = "w", version = "deadbeef", type = "audio" },
            ]
            "#,
        )?;

        assert_eq!(settings.general.text_history_ttl, 120);
        assert_eq!(settings.telegram.admin_id, 42);
        let openai = settings
            .integrations
            .openai
            .as_ref()
            .ok_or_else(|| ConfigError::Message("openai integration missing".to_string()))?;
        assert_eq!(openai.networks.len(), 2);
        assert_eq!(openai.networks[1].kind, NetworkKind::Image);
        assert_eq!(openai.networks[1].version, "");
        Ok(())
    }

    #[test]
    fn defaults_apply() -> Result<(), ConfigError> {
        let settings = parse(
            r#"
            [general]
            [telegram]
            bot_token = "123:abc"
            "#,
        )?;
        assert_eq!(settings.general.text_history_ttl, 300);
        assert_eq!(settings.general.text_history_size, 5);
        assert_eq!(settings.general.whitelist_path, "whitelist.txt");
        assert!(settings.integrations.openai.is_none());
        Ok(())
    }

    #[test]
    fn placeholder_token_rejected() {
        let err = parse(
            r#"
            [general]
            [telegram]
            bot_token = "TG_BOT_TOKEN"
            "#,
        );
        assert!(err.is_err());
    }
}
