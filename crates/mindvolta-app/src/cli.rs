//! CLI argument definitions for the MindVolta server.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// MindVolta - support chat server with rule-based responses.
#[derive(Parser, Debug)]
#[command(name = "mindvolta", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port", global = true)]
    pub port: Option<u16>,

    /// Data directory for the SQLite database.
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP and WebSocket server (default).
    Serve,
    /// Create a bearer token for a user and store it in the config file.
    IssueToken {
        /// User id the token authenticates as.
        user_id: String,
    },
}

impl CliArgs {
    /// The subcommand to run; `serve` when none is given.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }

    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > MINDVOLTA_CONFIG env var > ~/.mindvolta/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("MINDVOLTA_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > MINDVOLTA_PORT env var > config file value > 5000.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if let Ok(val) = std::env::var("MINDVOLTA_PORT") {
            if let Ok(p) = val.parse::<u16>() {
                return p;
            }
        }
        if config_port != 0 {
            return config_port;
        }
        5000
    }

    /// Resolve the data directory path.
    ///
    /// Returns `None` if not overridden (use config value).
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    /// Resolve the log level.
    ///
    /// Returns `None` if not overridden.
    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".mindvolta").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".mindvolta").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_serve() {
        let args = CliArgs::parse_from(["mindvolta"]);
        assert_eq!(args.command(), Command::Serve);
        assert!(args.resolve_data_dir().is_none());
        assert!(args.resolve_log_level().is_none());
    }

    #[test]
    fn test_issue_token_subcommand() {
        let args = CliArgs::parse_from(["mindvolta", "issue-token", "user-42", "-c", "/tmp/m.toml"]);
        assert_eq!(
            args.command(),
            Command::IssueToken {
                user_id: "user-42".to_string()
            }
        );
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/m.toml"));
    }

    #[test]
    fn test_flag_overrides() {
        let args = CliArgs::parse_from([
            "mindvolta",
            "--port",
            "8080",
            "--data-dir",
            "/srv/mindvolta",
            "--log-level",
            "debug",
            "serve",
        ]);
        assert_eq!(args.resolve_port(5000), 8080);
        assert_eq!(args.resolve_data_dir().as_deref(), Some("/srv/mindvolta"));
        assert_eq!(args.resolve_log_level().as_deref(), Some("debug"));
    }
}
