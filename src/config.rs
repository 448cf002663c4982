//! Configuration
//!
//! Settings are layered, lowest priority first:
//!
//! 1. built-in defaults
//! 2. `lockstep.toml` in the search directory, if present
//! 3. an explicit config file (`--config`)
//! 4. `LOCKSTEP_*` environment variables
//! 5. overrides set on the builder (CLI flags)
//!
//! # Example
//!
//! ```rust,no_run
//! use lockstep_core::config::Config;
//!
//! let config = Config::builder()
//!     .config_path(Some("ci.toml".into()))
//!     .lanes(32)
//!     .build()?;
//! # Ok::<(), lockstep_core::config::ConfigError>(())
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

/// File looked up in the search directory
pub const CONFIG_FILE_NAME: &str = "lockstep.toml";

/// Prefix of environment variables, e.g. `LOCKSTEP_LANES`
pub const ENV_PREFIX: &str = "LOCKSTEP";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Effective settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,
    /// Lanes per run when no dataset decides
    pub lanes: usize,
    /// Resume budget per run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_resumes: Option<u64>,
    /// Directory holding generated datasets
    pub data_dir: PathBuf,
    /// Content values per generated dataset
    pub task_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            lanes: 8,
            max_resumes: None,
            data_dir: PathBuf::from("DATA"),
            task_size: 10_000_000,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Load with every layer except builder overrides
    pub fn load() -> Result<Self, ConfigError> {
        Self::builder().build()
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.lanes == 0 {
            return Err(ConfigError::Invalid("lanes must be at least 1".to_string()));
        }
        if self.task_size == 0 {
            return Err(ConfigError::Invalid("task_size must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Builder for [`Config`]
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    search_dir: Option<PathBuf>,
    config_path: Option<PathBuf>,
    env: Option<HashMap<String, String>>,
    log_level: Option<String>,
    lanes: Option<usize>,
    max_resumes: Option<u64>,
    data_dir: Option<PathBuf>,
    task_size: Option<usize>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory searched for `lockstep.toml` (default: current directory)
    pub fn search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dir = Some(dir.into());
        self
    }

    /// Explicit config file; it must exist
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Read variables from this map instead of the process environment
    pub fn env_source(mut self, vars: HashMap<String, String>) -> Self {
        self.env = Some(vars);
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }

    pub fn lanes(mut self, lanes: usize) -> Self {
        self.lanes = Some(lanes);
        self
    }

    pub fn max_resumes(mut self, budget: u64) -> Self {
        self.max_resumes = Some(budget);
        self
    }

    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn task_size(mut self, size: usize) -> Self {
        self.task_size = Some(size);
        self
    }

    /// Merge every layer and validate the result
    pub fn build(self) -> Result<Config, ConfigError> {
        let search_dir = self.search_dir.unwrap_or_else(|| PathBuf::from("."));

        let mut builder = config::Config::builder().add_source(
            File::from(search_dir.join(CONFIG_FILE_NAME))
                .format(FileFormat::Toml)
                .required(false),
        );
        if let Some(path) = &self.config_path {
            builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Toml).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .source(self.env),
        );

        let mut config: Config = builder.build()?.try_deserialize()?;

        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if let Some(lanes) = self.lanes {
            config.lanes = lanes;
        }
        if let Some(budget) = self.max_resumes {
            config.max_resumes = Some(budget);
        }
        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        if let Some(size) = self.task_size {
            config.task_size = size;
        }

        config.validate()?;
        Ok(config)
    }
}
