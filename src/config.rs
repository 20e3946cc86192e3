use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::workflow::StageMode;

/// Name of the per-repository config file
pub const LOCAL_CONFIG_FILE: &str = ".gitbuddy.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub git: GitConfig,
    #[serde(default)]
    pub commit: CommitConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Git executable name or path
    #[serde(default = "default_program")]
    pub program: String,
    /// Remote that receives the push
    #[serde(default = "default_remote")]
    pub remote: String,
    /// Branch used when the current branch cannot be detected
    #[serde(default = "default_branch")]
    pub default_branch: String,
    /// Pass `-u` so the branch tracks the remote
    #[serde(default = "default_set_upstream")]
    pub set_upstream: bool,
}

fn default_program() -> String {
    "git".to_string()
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_set_upstream() -> bool {
    true
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            remote: default_remote(),
            default_branch: default_branch(),
            set_upstream: default_set_upstream(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitConfig {
    /// Message used when the user leaves the prompt blank
    #[serde(default = "default_message")]
    pub default_message: String,
}

fn default_message() -> String {
    "Update files via Git Buddy".to_string()
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            default_message: default_message(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Push mode offered by default: "changed" or "all"
    #[serde(default = "default_mode")]
    pub default_mode: String,
}

fn default_mode() -> String {
    "changed".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_mode: default_mode(),
        }
    }
}

impl SessionConfig {
    /// Parsed default mode, falling back to changed-only on bad input
    pub fn stage_mode(&self) -> StageMode {
        self.default_mode
            .parse()
            .unwrap_or(StageMode::ChangedOnly)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Write logs to a file under the data directory instead of stderr
    #[serde(default)]
    pub to_file: bool,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: false,
        }
    }
}

impl Config {
    /// Path to the user config file (`~/.config/gitbuddy/config.toml` on Linux)
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("gitbuddy").join("config.toml"))
    }

    /// Load configuration for a working directory.
    ///
    /// Later sources override earlier ones: embedded defaults, `.gitbuddy.toml`
    /// in `cwd`, the user config file, an explicit `config_path`, then
    /// `GITBUDDY__SECTION__KEY` environment variables.
    pub fn load(config_path: Option<&str>, cwd: &Path) -> Result<Self> {
        let defaults = Config::default();
        let defaults_json =
            serde_json::to_string(&defaults).context("Failed to serialize default config")?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        let local_config = cwd.join(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            builder = builder.add_source(
                config::File::from(local_config).format(config::FileFormat::Toml),
            );
        }

        if let Some(user_config) = Self::user_config_path() {
            if user_config.exists() {
                builder = builder.add_source(config::File::from(user_config));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("GITBUDDY")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to load configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Save config as TOML to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_str =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        std::fs::write(path, toml_str).context("Failed to write config file")?;

        Ok(())
    }

    /// Save config to the user config file
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::user_config_path().context("Could not determine config directory")?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Directory for log files
    pub fn logs_path(&self) -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("gitbuddy")
            .join("logs")
    }
}
