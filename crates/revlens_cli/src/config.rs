//! Configuration file support for revlens.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `REVLENS_`, sections separated by
//!    `__`, e.g. `REVLENS_GERRIT__URL`, `REVLENS_MODEL__NAME`)
//! 3. Config file (./revlens.toml, then ~/.config/revlens/config.toml)
//! 4. Built-in defaults
//!
//! The database URL defaults to `sqlite://~/.local/state/revlens/revlens.db` on Linux
//! (using the XDG state directory) if not explicitly configured.
//!
//! Example config file:
//! ```toml
//! [database]
//! url = "sqlite://~/.local/state/revlens/revlens.db"  # optional, this is the default
//!
//! [gerrit]
//! url = "https://review.example.org"
//! username = "bot"           # optional; enables authenticated /a/ requests
//! password = "..."           # or use REVLENS_GERRIT__PASSWORD
//! project = "platform/core"
//! statuses = ["open", "merged", "abandoned"]
//! branches = ["main", "release-*"]
//! exclude_wip = true
//!
//! [gitiles]
//! url = "https://git.example.org"
//!
//! [model]
//! url = "http://localhost:11434"
//! name = "llama3"
//! timeout_secs = 120
//! max_attempts = 3
//!
//! [schedule]
//! enabled = true
//! sync_interval_secs = 900
//! analysis_cron = "*/30 * * * *"
//! analysis_limit = 20
//! ```

use std::path::PathBuf;
use std::time::Duration;

use config::builder::DefaultState;
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use revlens::analysis::{AnalyzerOptions, DEFAULT_ANALYSIS_LIMIT, DEFAULT_MODEL, DEFAULT_MODEL_URL};
use revlens::rate_limit::rate_limits;
use revlens::scheduler::{DEFAULT_ANALYSIS_CRON, SchedulerOptions};
use revlens::sync::{
    BranchFilter, DEFAULT_INITIAL_LOOKBACK_DAYS, DEFAULT_LIGHT_PAGE_SIZE, DEFAULT_PAGE_SIZE,
    SyncOptions,
};
use revlens::{ApiRateLimiter, ChangeStatus, Credentials, RetryPolicy};
use serde::Deserialize;
use thiserror::Error;

/// Invalid configuration values, reported at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("gerrit.url is not set (config file or REVLENS_GERRIT__URL)")]
    MissingGerritUrl,

    #[error("gitiles.url is not set (config file or REVLENS_GITILES__URL)")]
    MissingGitilesUrl,

    #[error("invalid status in gerrit.statuses: {0}")]
    InvalidStatus(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub gerrit: GerritConfig,
    pub gitiles: GitilesConfig,
    pub model: ModelConfig,
    pub schedule: ScheduleConfig,
}

/// Database configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL.
    /// Defaults to `sqlite://~/.local/state/revlens/revlens.db` if not specified.
    pub url: Option<String>,
}

/// Review server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GerritConfig {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Project to sync; empty syncs every visible project.
    pub project: String,
    pub statuses: Vec<String>,
    /// Exact names or `*` wildcards; empty accepts every branch.
    pub branches: Vec<String>,
    pub exclude_wip: bool,
    pub page_size: u32,
    pub light_page_size: u32,
    pub initial_lookback_days: i64,
    pub burst: u32,
    pub requests_per_second: u32,
}

impl Default for GerritConfig {
    fn default() -> Self {
        Self {
            url: None,
            username: None,
            password: None,
            project: String::new(),
            statuses: ChangeStatus::ALL
                .iter()
                .map(|s| s.as_query_value().to_string())
                .collect(),
            branches: Vec::new(),
            exclude_wip: true,
            page_size: DEFAULT_PAGE_SIZE,
            light_page_size: DEFAULT_LIGHT_PAGE_SIZE,
            initial_lookback_days: DEFAULT_INITIAL_LOOKBACK_DAYS,
            burst: rate_limits::DEFAULT_BURST,
            requests_per_second: rate_limits::DEFAULT_RPS,
        }
    }
}

/// Commit browser configuration, used by `explain --diff`.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GitilesConfig {
    pub url: Option<String>,
    pub burst: u32,
    pub requests_per_second: u32,
}

impl Default for GitilesConfig {
    fn default() -> Self {
        Self {
            url: None,
            burst: rate_limits::DEFAULT_BURST,
            requests_per_second: rate_limits::DEFAULT_RPS,
        }
    }
}

/// Local model configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub url: String,
    pub name: String,
    /// Per-call timeout for single-document tasks.
    pub timeout_secs: u64,
    pub max_attempts: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_MODEL_URL.to_string(),
            name: DEFAULT_MODEL.to_string(),
            timeout_secs: 120,
            max_attempts: 3,
        }
    }
}

/// Long-running mode configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub enabled: bool,
    pub sync_interval_secs: u64,
    pub analysis_cron: String,
    pub analysis_limit: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sync_interval_secs: 15 * 60,
            analysis_cron: DEFAULT_ANALYSIS_CRON.to_string(),
            analysis_limit: DEFAULT_ANALYSIS_LIMIT,
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/revlens/config.toml)
    /// 3. Local config file (./revlens.toml)
    /// 4. Environment variables with REVLENS_ prefix
    ///
    /// A value that fails to parse is an error rather than a silent
    /// fallback to the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(xdg_config) = Self::default_config_path()
            && xdg_config.exists()
        {
            tracing::debug!("Loading config from {:?}", xdg_config);
            builder = builder.add_source(
                File::from(xdg_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let local_config = PathBuf::from("revlens.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./revlens.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // e.g., REVLENS_GERRIT__PAGE_SIZE -> gerrit.page_size
        builder = builder.add_source(environment());

        Self::from_builder(builder)
    }

    fn from_builder(builder: config::ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        Ok(builder.build()?.try_deserialize()?)
    }

    /// Get the database URL, falling back to the default state directory path.
    ///
    /// The `mode=rwc` parameter enables read-write access and creates the file if it doesn't exist.
    pub fn database_url(&self) -> Option<String> {
        self.database.url.clone().or_else(|| {
            Self::default_state_dir().map(|state_dir| {
                let db_path = state_dir.join("revlens.db");
                format!("sqlite://{}?mode=rwc", db_path.display())
            })
        })
    }

    pub fn gerrit_url(&self) -> Result<&str, ConfigError> {
        self.gerrit
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or(ConfigError::MissingGerritUrl)
    }

    pub fn gitiles_url(&self) -> Result<&str, ConfigError> {
        self.gitiles
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or(ConfigError::MissingGitilesUrl)
    }

    /// Basic-auth credentials, when both parts are configured.
    pub fn gerrit_credentials(&self) -> Option<Credentials> {
        match (&self.gerrit.username, &self.gerrit.password) {
            (Some(username), Some(password)) if !username.is_empty() => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }

    pub fn gerrit_rate_limiter(&self) -> ApiRateLimiter {
        ApiRateLimiter::new(self.gerrit.burst, self.gerrit.requests_per_second)
    }

    pub fn gitiles_rate_limiter(&self) -> ApiRateLimiter {
        ApiRateLimiter::new(self.gitiles.burst, self.gitiles.requests_per_second)
    }

    pub fn sync_options(&self) -> Result<SyncOptions, ConfigError> {
        let gerrit = &self.gerrit;
        if gerrit.page_size == 0 {
            return Err(ConfigError::Zero("gerrit.page_size"));
        }
        if gerrit.light_page_size == 0 {
            return Err(ConfigError::Zero("gerrit.light_page_size"));
        }
        if gerrit.initial_lookback_days <= 0 {
            return Err(ConfigError::Zero("gerrit.initial_lookback_days"));
        }

        let statuses = gerrit
            .statuses
            .iter()
            .map(|s| {
                s.parse::<ChangeStatus>()
                    .map_err(|_| ConfigError::InvalidStatus(s.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SyncOptions {
            project: gerrit.project.trim().to_string(),
            statuses,
            branches: BranchFilter::new(&gerrit.branches),
            page_size: gerrit.page_size,
            light_page_size: gerrit.light_page_size,
            exclude_wip: gerrit.exclude_wip,
            initial_lookback: chrono::Duration::days(gerrit.initial_lookback_days),
        })
    }

    pub fn analyzer_options(&self) -> Result<AnalyzerOptions, ConfigError> {
        if self.model.timeout_secs == 0 {
            return Err(ConfigError::Zero("model.timeout_secs"));
        }
        Ok(AnalyzerOptions {
            base_timeout: Duration::from_secs(self.model.timeout_secs),
            retry: RetryPolicy::new(self.model.max_attempts),
        })
    }

    pub fn scheduler_options(&self) -> Result<SchedulerOptions, ConfigError> {
        if self.schedule.sync_interval_secs == 0 {
            return Err(ConfigError::Zero("schedule.sync_interval_secs"));
        }
        Ok(SchedulerOptions {
            enabled: self.schedule.enabled,
            sync_interval: Duration::from_secs(self.schedule.sync_interval_secs),
            analysis_cron: self.schedule.analysis_cron.clone(),
        })
    }

    /// Get the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "revlens").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the default state directory path.
    ///
    /// On Linux, this is `$XDG_STATE_HOME/revlens` or `~/.local/state/revlens`.
    /// On macOS/Windows, falls back to the data directory.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "revlens").map(|dirs| {
            // state_dir() returns None on macOS/Windows, fall back to data_dir
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }
}

fn environment() -> Environment {
    Environment::with_prefix("REVLENS")
        .prefix_separator("_")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("gerrit.statuses")
        .with_list_parse_key("gerrit.branches")
        .try_parsing(true)
}
