use anyhow::{Context, Result};
use confyg::{env, Confygery};
use ims_core::schema::{DatabaseOptions, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the `ims` tool.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (IMS_* prefix)
/// 3. Config file (~/.config/ims/config.toml)
/// 4. Built-in defaults (lowest priority)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the SQLite database.
    ///
    /// Can be set via:
    /// - CLI: --db /path/to/db
    /// - ENV: IMS_DATABASE_PATH
    /// - Config: database_path = "/path/to/db"
    /// - Default: ~/.local/share/ims/ims.db
    #[serde(default = "default_db_path")]
    pub database_path: PathBuf,

    /// How long a statement waits on another writer's lock before the
    /// transaction counts as a conflict.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Retries of a conflicting transaction before giving up.
    #[serde(default = "default_transaction_retries")]
    pub transaction_retries: usize,

    /// First retry delay; later delays back off exponentially.
    #[serde(default = "default_retry_min_delay_ms")]
    pub retry_min_delay_ms: u64,

    /// Where `migrate create` writes new migration modules.
    #[serde(default = "default_scripts_dir")]
    pub scripts_dir: PathBuf,

    #[serde(default)]
    pub logging: twyg::Opts,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            transaction_retries: default_transaction_retries(),
            retry_min_delay_ms: default_retry_min_delay_ms(),
            scripts_dir: default_scripts_dir(),
            logging: twyg::Opts::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_path = config_file_path();

        let mut builder = Confygery::new().context("Failed to create config builder")?;

        if config_path.exists() {
            let path_str = config_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder
                .add_file(path_str)
                .context("Failed to load config file")?;
        }

        let env_opts = env::Options::with_top_level("ims");
        builder
            .add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder.build().context("Failed to build configuration")?;

        Ok(config)
    }

    /// Load configuration, letting `--db` override the database path.
    pub fn load_with_db_path(db_path: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::load()?;
        if let Some(path) = db_path {
            config.database_path = path;
        }
        Ok(config)
    }

    /// Store connection settings derived from this configuration.
    pub fn database_options(&self) -> DatabaseOptions {
        let min_delay = Duration::from_millis(self.retry_min_delay_ms);
        DatabaseOptions {
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
            retry: RetryPolicy {
                max_retries: self.transaction_retries,
                min_delay,
                max_delay: RetryPolicy::default().max_delay.max(min_delay),
            },
        }
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ims")
        .join("ims.db")
}

const fn default_busy_timeout_ms() -> u64 {
    5000
}

const fn default_transaction_retries() -> usize {
    3
}

const fn default_retry_min_delay_ms() -> u64 {
    50
}

fn default_scripts_dir() -> PathBuf {
    PathBuf::from("crates/ims-migrate/src/scripts")
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/ims/config.toml
/// - macOS: ~/Library/Application Support/ims/config.toml
/// - Windows: %APPDATA%\ims\config.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ims")
        .join("config.toml")
}

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# Inventory management system configuration
#
# Configuration is loaded from multiple sources with the following priority:
# 1. CLI arguments (highest priority)
# 2. Environment variables (IMS_* prefix)
# 3. This config file
# 4. Built-in defaults (lowest priority)

# Path to the SQLite database
#
# Can also be set via:
# - CLI: ims --db /custom/path.db migrate status
# - Environment: IMS_DATABASE_PATH=/custom/path.db
#
# Default: Platform-specific data directory
#database_path = "/path/to/custom/ims.db"

# How long (milliseconds) to wait for another writer before a transaction
# counts as a write conflict
#busy_timeout_ms = 5000

# How many times a conflicting transaction is retried, and the first delay
# between attempts (milliseconds, doubling each time)
#transaction_retries = 3
#retry_min_delay_ms = 50

# Where `ims migrate create` writes new migrations (development only)
#scripts_dir = "crates/ims-migrate/src/scripts"

# Logging
#[logging]
#coloured = true
#level = "info"
"#
}

/// Create default config file if it doesn't exist.
///
/// Returns true if a new file was created, false if it already existed.
pub fn ensure_config_file() -> Result<bool> {
    let config_path = config_file_path();

    if config_path.exists() {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    std::fs::write(&config_path, example_config()).context("Failed to write config file")?;

    Ok(true)
}
