//! Analysis configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. CLI flags override individual values after loading.

use divlab_core::analysis::DEFAULT_RADIUS_DAYS;
use divlab_core::data::{PriceColumns, RetryPolicy, DEFAULT_YEARS_BACK, MAX_YEARS_BACK};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub cache: CacheConfig,
    pub analysis: WindowConfig,
    pub provider: ProviderConfig,
    pub output: OutputConfig,
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/cache"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Calendar days either side of each event date.
    pub window_radius_days: u32,
    /// Trailing calendar years of dividend history, inclusive of this year.
    pub years_back: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_radius_days: DEFAULT_RADIUS_DAYS,
            years_back: DEFAULT_YEARS_BACK,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
    pub breaker_cooldown_secs: u64,
    pub breaker_failure_threshold: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
            jitter_ms: 250,
            breaker_cooldown_secs: 30 * 60,
            breaker_failure_threshold: 3,
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn breaker_cooldown(&self) -> Duration {
        Duration::from_secs(self.breaker_cooldown_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter: Duration::from_millis(self.jitter_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// Also write a JSON report next to the CSV.
    pub json: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("out"),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    Yahoo,
    Csv,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub prices: SourceKind,
    pub dividends: SourceKind,
    /// Directory of `{symbol}.csv` price exports, for `prices = "csv"`.
    pub price_dir: Option<PathBuf>,
    pub price_columns: PriceColumns,
    /// Dividend export file, for `dividends = "csv"`.
    pub dividend_file: Option<PathBuf>,
    /// baostock industry export used by `divlab industries`.
    pub profile_file: Option<PathBuf>,
    /// Classification scheme to read from the industry export. Defaults to
    /// the CSRC scheme.
    pub profile_classification: Option<String>,
}

impl AnalysisConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_window(self.analysis.window_radius_days, self.analysis.years_back)?;
        if self.provider.timeout_secs == 0 {
            return Err(ConfigError::Invalid("provider.timeout_secs must be positive".into()));
        }
        if self.sources.prices == SourceKind::Csv && self.sources.price_dir.is_none() {
            return Err(ConfigError::Invalid(
                "sources.price_dir is required when sources.prices = \"csv\"".into(),
            ));
        }
        if self.sources.dividends == SourceKind::Csv && self.sources.dividend_file.is_none() {
            return Err(ConfigError::Invalid(
                "sources.dividend_file is required when sources.dividends = \"csv\"".into(),
            ));
        }
        Ok(())
    }
}

/// Bounds shared by the config file and the pipeline builder.
pub fn validate_window(radius_days: u32, years_back: u32) -> Result<(), ConfigError> {
    if radius_days == 0 {
        return Err(ConfigError::Invalid(
            "analysis.window_radius_days must be positive".into(),
        ));
    }
    if !(1..=MAX_YEARS_BACK).contains(&years_back) {
        return Err(ConfigError::Invalid(format!(
            "analysis.years_back must be between 1 and {MAX_YEARS_BACK}"
        )));
    }
    Ok(())
}
