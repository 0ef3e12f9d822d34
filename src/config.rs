/*!
 * Configuration support for medrank
 *
 * Provides runtime configuration options for loading data and deriving rankings.
 */

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::data_types::{AveragePolicy, IdentityPolicy, ProcedureCode, RankingMetric};
use crate::ranking::AggregationOptions;

/// Prefix for environment overrides, e.g. `MEDRANK_TOP_N=25`
pub const ENV_PREFIX: &str = "MEDRANK";

/// Global configuration for medrank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedrankConfig {
    /// Whether to show progress bars while loading
    #[serde(default)]
    pub enable_progress_bar: bool,

    /// Billing data file (or directory holding one)
    #[serde(default)]
    pub data_path: Option<PathBuf>,

    /// Procedure code ranked when nothing else is selected
    #[serde(default = "default_procedure")]
    pub default_procedure: String,

    /// Metric ranked by when nothing else is selected
    #[serde(default)]
    pub default_metric: RankingMetric,

    /// Number of providers in a top-N listing
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// How records are attributed to providers
    #[serde(default)]
    pub identity_policy: IdentityPolicy,

    /// How average amounts combine across merged records
    #[serde(default)]
    pub average_policy: AveragePolicy,

    /// Whether to skip invalid records during parsing
    #[serde(default)]
    pub skip_invalid_records: bool,

    /// Default export format
    #[serde(default)]
    pub default_export_format: crate::ExportFormat,

    /// Whether the CLI restores and saves the last selection
    #[serde(default = "default_remember_selection")]
    pub remember_selection: bool,
}

impl Default for MedrankConfig {
    fn default() -> Self {
        Self {
            enable_progress_bar: false,
            data_path: None,
            default_procedure: default_procedure(),
            default_metric: RankingMetric::ServiceCount,
            top_n: default_top_n(),
            identity_policy: IdentityPolicy::Name,
            average_policy: AveragePolicy::FirstRecord,
            skip_invalid_records: false,
            default_export_format: crate::ExportFormat::Json,
            remember_selection: default_remember_selection(),
        }
    }
}

// Default value functions for serde
fn default_procedure() -> String {
    ProcedureCode::TOTAL_KNEE.to_string()
}

fn default_top_n() -> usize {
    10
}

fn default_remember_selection() -> bool {
    true
}

impl MedrankConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregation policies from this configuration
    pub fn aggregation_options(&self) -> AggregationOptions {
        AggregationOptions {
            identity: self.identity_policy,
            averages: self.average_policy,
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| crate::MedrankError::Configuration {
                message: format!("Failed to parse config file: {}", e),
                suggestion: Some("Check that the file is valid TOML format".to_string()),
            })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| crate::MedrankError::Configuration {
                message: format!("Failed to serialize config: {}", e),
                suggestion: None,
            })?;
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/medrank/config.toml` on Unix-like systems
    /// or `%APPDATA%\medrank\config.toml` on Windows
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "medrank")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Layer a TOML file and `MEDRANK_*` environment variables over the defaults.
    ///
    /// Later sources win: defaults, then the file, then the environment. A
    /// missing file is an error only when `required` is set.
    pub fn layered(file: Option<&Path>, required: bool) -> crate::Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(required));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .try_parsing(true),
        );

        builder
            .build()
            .and_then(|settings| settings.try_deserialize::<Self>())
            .map_err(|e| crate::MedrankError::Configuration {
                message: format!("Failed to load configuration: {}", e),
                suggestion: Some(format!(
                    "Check the config file and any {}_* environment variables",
                    ENV_PREFIX
                )),
            })
    }

    /// Load configuration from the default location and environment, or defaults
    pub fn load() -> Self {
        let path = Self::default_config_path();
        match Self::layered(path.as_deref(), false) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("{}; using defaults", e);
                Self::default()
            }
        }
    }
}

// Global configuration support
use std::sync::RwLock;

lazy_static::lazy_static! {
    static ref GLOBAL_CONFIG: RwLock<Option<MedrankConfig>> = RwLock::new(None);
}

/// Set the global configuration
pub fn set_global_config(config: MedrankConfig) {
    if let Ok(mut guard) = GLOBAL_CONFIG.write() {
        *guard = Some(config);
    }
}

/// Get the global configuration (or load it from the default location if not set)
pub fn global_config() -> MedrankConfig {
    GLOBAL_CONFIG
        .read()
        .ok()
        .and_then(|guard| guard.as_ref().cloned())
        .unwrap_or_else(MedrankConfig::load)
}

/// Clear the global configuration
pub fn clear_global_config() {
    if let Ok(mut guard) = GLOBAL_CONFIG.write() {
        *guard = None;
    }
}

/// Builder for customizing configuration
#[derive(Default)]
pub struct ConfigBuilder {
    config: MedrankConfig,
}

impl ConfigBuilder {
    /// Start building a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set progress bar enabled
    pub fn progress_bar(mut self, enabled: bool) -> Self {
        self.config.enable_progress_bar = enabled;
        self
    }

    /// Set the data file
    pub fn data_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.data_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the default procedure code
    pub fn default_procedure(mut self, code: &str) -> Self {
        self.config.default_procedure = code.trim().to_string();
        self
    }

    /// Set the default ranking metric
    pub fn default_metric(mut self, metric: RankingMetric) -> Self {
        self.config.default_metric = metric;
        self
    }

    /// Set the top-N listing size
    pub fn top_n(mut self, n: usize) -> Self {
        self.config.top_n = n;
        self
    }

    /// Set provider identity policy
    pub fn identity_policy(mut self, policy: IdentityPolicy) -> Self {
        self.config.identity_policy = policy;
        self
    }

    /// Set average-amount policy
    pub fn average_policy(mut self, policy: AveragePolicy) -> Self {
        self.config.average_policy = policy;
        self
    }

    /// Set skip invalid records
    pub fn skip_invalid_records(mut self, skip: bool) -> Self {
        self.config.skip_invalid_records = skip;
        self
    }

    /// Set whether the last selection is remembered
    pub fn remember_selection(mut self, remember: bool) -> Self {
        self.config.remember_selection = remember;
        self
    }

    /// Build the configuration
    pub fn build(self) -> MedrankConfig {
        self.config
    }
}
