use std::time::Duration;

use anyhow::Result;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, FileFormat};
use serde::Deserialize;

use crate::error::{CoreError, CoreResult};
use crate::types::{FoldPolicy, UntilBoundary};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub logging: LoggingConfig,
    pub refresh: RefreshConfig,
    pub tick: TickConfig,
    pub countdown: CountdownConfig,
    pub expansion: ExpansionConfig,
    pub timezone: TimezoneConfig,
    pub filter: FilterConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Slow cycle: fetch, expand, merge, select.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshConfig {
    pub period_secs: u64,
    pub jitter_secs: u64,
    pub timeout_secs: u64,
    /// Delay after the n-th consecutive failure. The last entry repeats.
    pub backoff_secs: Vec<u64>,
    pub sustained_failure_secs: u64,
    /// Data older than this is flagged stale in every snapshot.
    pub stale_after_secs: u64,
}

impl RefreshConfig {
    #[must_use]
    pub const fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }

    #[must_use]
    pub const fn jitter(&self) -> Duration {
        Duration::from_secs(self.jitter_secs)
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub fn backoff(&self) -> Vec<Duration> {
        self.backoff_secs
            .iter()
            .copied()
            .map(Duration::from_secs)
            .collect()
    }
}

/// Fast cycle: local re-classification only.
#[derive(Debug, Clone, Deserialize)]
pub struct TickConfig {
    pub period_secs: u64,
}

impl TickConfig {
    #[must_use]
    pub const fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CountdownConfig {
    pub critical_secs: i64,
    pub tight_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExpansionConfig {
    pub max_instances: usize,
    pub window_days: i64,
    pub lookback_hours: i64,
    pub until_boundary: UntilBoundary,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimezoneConfig {
    /// IANA zone used for floating and all-day values.
    pub assumed_zone: String,
    pub fold: FoldPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub hidden_uids: Vec<String>,
    #[serde(default = "default_true")]
    pub exclude_all_day: bool,
    #[serde(default = "default_true")]
    pub exclude_transparent: bool,
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    pub path: String,
}

impl Settings {
    fn defaults() -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
        Ok(Config::builder()
            .set_default("logging.level", "debug")?
            .set_default("refresh.period_secs", 60)?
            .set_default("refresh.jitter_secs", 10)?
            .set_default("refresh.timeout_secs", 45)?
            .set_default("refresh.backoff_secs", vec![60, 120, 300, 600])?
            .set_default("refresh.sustained_failure_secs", 900)?
            .set_default("refresh.stale_after_secs", 180)?
            .set_default("tick.period_secs", 5)?
            .set_default("countdown.critical_secs", 300)?
            .set_default("countdown.tight_secs", 900)?
            .set_default("expansion.max_instances", 1000)?
            .set_default("expansion.window_days", 730)?
            .set_default("expansion.lookback_hours", 24)?
            .set_default("expansion.until_boundary", "inclusive")?
            .set_default("timezone.assumed_zone", "UTC")?
            .set_default("timezone.fold", "earlier")?
            .set_default("filter.exclude_all_day", true)?
            .set_default("filter.exclude_transparent", true)?)
    }

    /// ## Summary
    /// Loads configuration from defaults, `config.toml` and environment variables.
    /// Environment variables (`CADENCE__SECTION__KEY`) take precedence over the file.
    ///
    /// ## Errors
    /// Returns an error if building the configuration, deserializing it, or
    /// validating it fails.
    pub fn load() -> Result<Self> {
        let settings = Self::defaults()?
            // TOML file
            .add_source(config::File::with_name("config.toml").required(false))
            // Env
            .add_source(
                config::Environment::with_prefix("CADENCE")
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("refresh.backoff_secs")
                    .with_list_parse_key("filter.hidden_uids"),
            )
            .build()?
            .try_deserialize::<Settings>()?;
        settings.validate()?;
        Ok(settings)
    }

    /// ## Summary
    /// Builds settings from the defaults overlaid with a TOML document.
    ///
    /// ## Errors
    /// Returns `CoreError::ConfigError` if the document does not parse or
    /// deserialize, and `CoreError::InvalidConfiguration` if it fails
    /// validation.
    pub fn from_toml(document: &str) -> CoreResult<Self> {
        let settings = Self::defaults()?
            .add_source(config::File::from_str(document, FileFormat::Toml))
            .build()?
            .try_deserialize::<Settings>()?;
        settings.validate()?;
        Ok(settings)
    }

    /// ## Summary
    /// Checks cross-field constraints that serde cannot express.
    ///
    /// ## Errors
    /// Returns `CoreError::InvalidConfiguration` naming the first offending key.
    pub fn validate(&self) -> CoreResult<()> {
        if self.tick.period_secs == 0 {
            return Err(invalid("tick.period_secs must be positive"));
        }
        if self.refresh.period_secs == 0 {
            return Err(invalid("refresh.period_secs must be positive"));
        }
        if self.refresh.timeout_secs == 0 {
            return Err(invalid("refresh.timeout_secs must be positive"));
        }
        if self.refresh.backoff_secs.is_empty() {
            return Err(invalid("refresh.backoff_secs must not be empty"));
        }
        if self.countdown.critical_secs < 0
            || self.countdown.tight_secs < self.countdown.critical_secs
        {
            return Err(invalid(
                "countdown thresholds must satisfy 0 <= critical_secs <= tight_secs",
            ));
        }
        if self.expansion.max_instances == 0 || self.expansion.window_days <= 0 {
            return Err(invalid(
                "expansion.max_instances and expansion.window_days must be positive",
            ));
        }
        if self.expansion.lookback_hours < 0 {
            return Err(invalid("expansion.lookback_hours must not be negative"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> CoreError {
    CoreError::InvalidConfiguration(message.to_string())
}

/// ## Summary
/// Loads configuration from environment variables and `.env` file.
///
/// ## Errors
/// Returns an error if loading or deserializing the configuration fails.
pub fn load_config() -> Result<Settings> {
    dotenvy::dotenv().ok();

    Settings::load()
}
