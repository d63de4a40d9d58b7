use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::supervisor::FailurePolicy;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorConfig {
    /// Directory holding one worker script per exchange
    #[serde(default = "default_bot_dir")]
    pub bot_dir: PathBuf,
    /// Interpreter used to run each script; empty runs the script directly
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    /// File extension that marks a worker script (without the dot)
    #[serde(default = "default_script_extension")]
    pub script_extension: String,
    /// Delay between heartbeat pings in milliseconds
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,
    /// How long a ping may go unanswered before the worker is considered dead
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_ms: u64,
    /// Grace period between stop and start on restart
    #[serde(default = "default_restart_delay")]
    pub restart_delay_ms: u64,
    /// What to do with a worker that missed its heartbeat
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    /// Buffered messages per live subscriber before it starts lagging
    #[serde(default = "default_publish_capacity")]
    pub publish_capacity: usize,
}

fn default_bot_dir() -> PathBuf {
    PathBuf::from("bot-engines")
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_script_extension() -> String {
    "py".to_string()
}

fn default_heartbeat_interval() -> u64 {
    2000
}

fn default_heartbeat_timeout() -> u64 {
    5000
}

fn default_restart_delay() -> u64 {
    2000
}

fn default_publish_capacity() -> usize {
    1000
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            bot_dir: default_bot_dir(),
            interpreter: default_interpreter(),
            script_extension: default_script_extension(),
            heartbeat_interval_ms: default_heartbeat_interval(),
            heartbeat_timeout_ms: default_heartbeat_timeout(),
            restart_delay_ms: default_restart_delay(),
            failure_policy: FailurePolicy::default(),
            publish_capacity: default_publish_capacity(),
        }
    }
}

impl SupervisorConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Enable periodic dumps of the exchange store
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// JSON file the store is dumped to and restored from
    #[serde(default = "default_dump_file")]
    pub dump_file: PathBuf,
    /// Seconds between periodic dumps
    #[serde(default = "default_dump_interval")]
    pub dump_interval_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_dump_file() -> PathBuf {
    PathBuf::from("data/exchanges.json")
}

fn default_dump_interval() -> u64 {
    60
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dump_file: default_dump_file(),
            dump_interval_secs: default_dump_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let mut builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("BOTHERD_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (BOTHERD_SUPERVISOR__BOT_DIR, etc.)
            .add_source(
                Environment::with_prefix("BOTHERD")
                    .separator("__")
                    .try_parsing(true),
            );

        // Legacy override kept for existing deployments
        if let Ok(bot_dir) = std::env::var("BOT_DIR") {
            builder = builder.set_override("supervisor.bot_dir", bot_dir)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.supervisor.heartbeat_interval_ms == 0 {
            errors.push("heartbeat_interval_ms must be positive".to_string());
        }

        if self.supervisor.heartbeat_timeout_ms == 0 {
            errors.push("heartbeat_timeout_ms must be positive".to_string());
        }

        if self.supervisor.script_extension.trim().is_empty() {
            errors.push("script_extension must not be empty".to_string());
        }

        if self.supervisor.publish_capacity == 0 {
            errors.push("publish_capacity must be positive".to_string());
        }

        if self.persistence.enabled && self.persistence.dump_interval_secs == 0 {
            errors.push("dump_interval_secs must be positive when persistence is enabled".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supervisor: SupervisorConfig::default(),
            persistence: PersistenceConfig::default(),
            api: ApiConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_timings() {
        let config = SupervisorConfig::default();
        assert_eq!(config.heartbeat_interval(), Duration::from_millis(2000));
        assert_eq!(config.heartbeat_timeout(), Duration::from_millis(5000));
        assert_eq!(config.restart_delay(), Duration::from_millis(2000));
        assert_eq!(config.failure_policy, FailurePolicy::LeaveStopped);
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("default.toml"),
            r#"
[supervisor]
bot_dir = "/opt/bots"
heartbeat_interval_ms = 750
failure_policy = "restart"

[api]
port = 9090
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(dir.path()).unwrap();
        assert_eq!(config.supervisor.bot_dir, PathBuf::from("/opt/bots"));
        assert_eq!(config.supervisor.heartbeat_interval_ms, 750);
        assert_eq!(config.supervisor.heartbeat_timeout_ms, 5000);
        assert_eq!(config.supervisor.failure_policy, FailurePolicy::Restart);
        assert_eq!(config.api.port, 9090);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = AppConfig::default();
        config.supervisor.heartbeat_interval_ms = 0;
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
    }
}
