use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;

/// Top-level configuration for the MindVolta server.
///
/// Loaded from `~/.mindvolta/config.toml` by default. Every section falls
/// back to its defaults when missing from the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MindvoltaConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl MindvoltaConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: MindvoltaConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory holding the SQLite conversation database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.mindvolta/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// TCP port to bind.
    pub port: u16,
    /// Extra allowed CORS origin (the web client). Localhost on `port` is always allowed.
    pub client_url: Option<String>,
    /// Requests allowed per rate-limit window.
    pub rate_limit_max_requests: u64,
    /// Length of a rate-limit window in seconds.
    pub rate_limit_window_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            client_url: None,
            rate_limit_max_requests: 100,
            rate_limit_window_secs: 15 * 60,
        }
    }
}

/// Message dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Maximum message length in characters.
    pub max_message_chars: usize,
    /// Default and maximum number of messages returned by a history query.
    pub history_limit: usize,
    /// Simulated response latency before push delivery of an agent reply.
    pub response_delay_ms: u64,
    /// Contact named in professional-referral responses.
    #[serde(default)]
    pub referral: ReferralConfig,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_chars: 2000,
            history_limit: 100,
            response_delay_ms: 1000,
            referral: ReferralConfig::default(),
        }
    }
}

/// Real-world referral contact embedded in referral responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferralConfig {
    pub name: String,
    pub facility: String,
    pub specialties: String,
}

impl Default for ReferralConfig {
    fn default() -> Self {
        Self {
            name: "Dr. Saheed".to_string(),
            facility: "Psychiatric Hospital, Aro, Abeokuta".to_string(),
            specialties: "anxiety, depression, and addiction therapy for young people".to_string(),
        }
    }
}

/// Bearer-token identity table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Maps an API token to the user id it authenticates.
    pub tokens: BTreeMap<String, String>,
}
