//! Deployment configuration and evaluator wiring.
//!
//! Configuration is immutable once loaded: one [`MailgateConfig`] per
//! deployment, validated and turned into policy instances at
//! construction time. Malformed values fail here, never during
//! evaluation.

use crate::evaluator::Evaluator;
use crate::group::GroupStore;
use crate::policy::{
    Fallback, LoggerFilterPolicy, Policy, ThrottleConfig, ThrottlePolicy, WakeupConfig,
    WakeupPolicy,
};
use crate::store::KvStore;
use chrono::Duration as ChronoDuration;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse the YAML configuration.
    #[error("Failed to parse YAML configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The rate limit string is malformed.
    #[error("Invalid rate limit '{input}': {message}")]
    InvalidRateLimit { input: String, message: String },

    /// A configuration value is out of range.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Time unit of a rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateUnit {
    Second,
    Minute,
    Hour,
    Day,
}

impl RateUnit {
    /// Seconds per unit.
    pub fn divisor(self) -> f64 {
        match self {
            RateUnit::Second => 1.0,
            RateUnit::Minute => 60.0,
            RateUnit::Hour => 3600.0,
            RateUnit::Day => 86400.0,
        }
    }

    fn symbol(self) -> char {
        match self {
            RateUnit::Second => 's',
            RateUnit::Minute => 'm',
            RateUnit::Hour => 'h',
            RateUnit::Day => 'd',
        }
    }
}

/// A parsed rate limit of the form `"N/unit"`, e.g. `"5/s"` or `"30/m"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimit {
    /// Admitted count per unit. Positive and finite.
    pub count: f64,
    /// The unit the count applies to.
    pub unit: RateUnit,
}

impl RateLimit {
    /// The limit normalized to events per second.
    pub fn per_second(&self) -> f64 {
        self.count / self.unit.divisor()
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            count: 5.0,
            unit: RateUnit::Second,
        }
    }
}

impl fmt::Display for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.count, self.unit.symbol())
    }
}

impl FromStr for RateLimit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |message: &str| ConfigError::InvalidRateLimit {
            input: s.to_string(),
            message: message.to_string(),
        };

        let (count, unit) = s.split_once('/').ok_or_else(|| invalid("expected N/unit"))?;

        let count: f64 = count
            .trim()
            .parse()
            .map_err(|_| invalid("count is not a number"))?;
        if !count.is_finite() || count <= 0.0 {
            return Err(invalid("count must be positive and finite"));
        }

        // The unit is keyed by its first character, so "s", "sec" and
        // "second" all work.
        let unit = match unit.trim().chars().next() {
            Some('s') => RateUnit::Second,
            Some('m') => RateUnit::Minute,
            Some('h') => RateUnit::Hour,
            Some('d') => RateUnit::Day,
            _ => return Err(invalid("unit must be one of s, m, h, d")),
        };

        Ok(Self { count, unit })
    }
}

/// Deployment configuration for the notification gate.
///
/// Every field has a default matching a conservative production setup,
/// so a partial (or empty) YAML document is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailgateConfig {
    /// Seconds per counter bucket.
    pub resolution: u32,
    /// Number of trailing buckets in the throughput window.
    pub samples: u32,
    /// Maximum admitted throughput as `"N/unit"`.
    pub rate_limit: String,
    /// Throttle cooldown in seconds.
    pub cooldown_secs: u64,
    /// Occurrences since the last notification that force a re-notify.
    pub amount_trigger: u64,
    /// Quiet period in seconds after which a group is re-notified.
    pub wakeup_period_secs: u64,
    /// Logger names whose events never notify.
    pub skip_loggers: HashSet<String>,
    /// Whether store outages approve (`true`) or deny (`false`).
    pub fail_open: bool,
}

impl Default for MailgateConfig {
    fn default() -> Self {
        Self {
            resolution: 10,
            samples: 15,
            rate_limit: "5/s".to_string(),
            cooldown_secs: 600,
            amount_trigger: 100,
            wakeup_period_secs: 30 * 24 * 3600,
            skip_loggers: ["http404".to_string()].into_iter().collect(),
            fail_open: true,
        }
    }
}

impl MailgateConfig {
    /// The fallback decision store-backed policies apply on outages.
    pub fn fallback(&self) -> Fallback {
        if self.fail_open {
            Fallback::Open
        } else {
            Fallback::Closed
        }
    }

    /// Validates the configuration and wires the full policy set into
    /// an [`Evaluator`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a malformed rate limit or values out
    /// of range. Nothing fails later at evaluation time.
    pub fn build_evaluator(
        &self,
        store: Arc<dyn KvStore>,
        groups: Arc<dyn GroupStore>,
    ) -> Result<Evaluator, ConfigError> {
        if self.resolution == 0 || self.resolution > 3600 {
            return Err(ConfigError::InvalidValue(format!(
                "resolution must be in 1..=3600, got {}",
                self.resolution
            )));
        }
        // Bucket truncation restarts at each hour, so a resolution that
        // does not divide the hour evenly would misalign increment and
        // window keys near hour boundaries.
        if 3600 % self.resolution != 0 {
            return Err(ConfigError::InvalidValue(format!(
                "resolution must divide 3600 evenly, got {}",
                self.resolution
            )));
        }
        if self.samples == 0 {
            return Err(ConfigError::InvalidValue("samples must be nonzero".into()));
        }
        if self.cooldown_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "cooldown_secs must be nonzero".into(),
            ));
        }

        let rate_limit: RateLimit = self.rate_limit.parse()?;
        let fallback = self.fallback();

        let policies: Vec<Box<dyn Policy>> = vec![
            Box::new(LoggerFilterPolicy::new(self.skip_loggers.clone())),
            Box::new(WakeupPolicy::new(
                WakeupConfig {
                    amount_trigger: self.amount_trigger,
                    wakeup_period: ChronoDuration::seconds(self.wakeup_period_secs as i64),
                    fallback,
                },
                groups,
            )),
            Box::new(ThrottlePolicy::new(
                ThrottleConfig {
                    resolution: self.resolution,
                    samples: self.samples,
                    rate_limit,
                    cooldown_secs: self.cooldown_secs,
                    fallback,
                },
                store,
            )),
        ];

        Ok(Evaluator::new(policies))
    }
}

/// Loads a [`MailgateConfig`] from a YAML file.
pub fn load_config(path: impl AsRef<Path>) -> Result<MailgateConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config = serde_yaml::from_str(&contents)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::MemoryGroupStore;
    use crate::store::MemoryStore;

    #[test]
    fn test_rate_limit_parse() {
        let limit: RateLimit = "5/s".parse().unwrap();
        assert_eq!(limit.count, 5.0);
        assert_eq!(limit.unit, RateUnit::Second);
        assert_eq!(limit.per_second(), 5.0);

        let limit: RateLimit = "30/m".parse().unwrap();
        assert_eq!(limit.unit, RateUnit::Minute);
        assert!((limit.per_second() - 0.5).abs() < f64::EPSILON);

        let limit: RateLimit = "120/hour".parse().unwrap();
        assert_eq!(limit.unit, RateUnit::Hour);

        let limit: RateLimit = "1/d".parse().unwrap();
        assert_eq!(limit.unit, RateUnit::Day);
    }

    #[test]
    fn test_rate_limit_parse_errors() {
        assert!("5".parse::<RateLimit>().is_err());
        assert!("x/s".parse::<RateLimit>().is_err());
        assert!("5/w".parse::<RateLimit>().is_err());
        assert!("5/".parse::<RateLimit>().is_err());
        assert!("-1/s".parse::<RateLimit>().is_err());
        assert!("0/s".parse::<RateLimit>().is_err());
    }

    #[test]
    fn test_rate_limit_display_round_trip() {
        let limit: RateLimit = "5/s".parse().unwrap();
        let back: RateLimit = limit.to_string().parse().unwrap();
        assert_eq!(back, limit);
    }

    #[test]
    fn test_defaults() {
        let config = MailgateConfig::default();
        assert_eq!(config.resolution, 10);
        assert_eq!(config.samples, 15);
        assert_eq!(config.rate_limit, "5/s");
        assert_eq!(config.cooldown_secs, 600);
        assert_eq!(config.amount_trigger, 100);
        assert_eq!(config.wakeup_period_secs, 2_592_000);
        assert!(config.skip_loggers.contains("http404"));
        assert_eq!(config.fallback(), Fallback::Open);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: MailgateConfig = serde_yaml::from_str("rate_limit: \"10/m\"\n").unwrap();
        assert_eq!(config.rate_limit, "10/m");
        assert_eq!(config.resolution, 10);
        assert_eq!(config.samples, 15);
    }

    #[test]
    fn test_full_yaml() {
        let yaml = r#"
resolution: 5
samples: 30
rate_limit: "100/m"
cooldown_secs: 120
amount_trigger: 50
wakeup_period_secs: 86400
skip_loggers: ["http404", "health"]
fail_open: false
"#;
        let config: MailgateConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.resolution, 5);
        assert_eq!(config.samples, 30);
        assert_eq!(config.cooldown_secs, 120);
        assert!(config.skip_loggers.contains("health"));
        assert_eq!(config.fallback(), Fallback::Closed);
    }

    #[test]
    fn test_build_evaluator_wires_all_policies() {
        let config = MailgateConfig::default();
        let evaluator = config
            .build_evaluator(Arc::new(MemoryStore::new()), Arc::new(MemoryGroupStore::new()))
            .unwrap();
        assert_eq!(evaluator.len(), 3);
    }

    #[test]
    fn test_build_evaluator_accepts_hour_dividing_resolution() {
        let mut config = MailgateConfig::default();
        config.resolution = 30;
        assert!(config
            .build_evaluator(Arc::new(MemoryStore::new()), Arc::new(MemoryGroupStore::new()))
            .is_ok());
    }

    #[test]
    fn test_build_evaluator_rejects_bad_values() {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let groups: Arc<MemoryGroupStore> = Arc::new(MemoryGroupStore::new());

        let mut config = MailgateConfig::default();
        config.resolution = 0;
        assert!(matches!(
            config.build_evaluator(store.clone(), groups.clone()),
            Err(ConfigError::InvalidValue(_))
        ));

        let mut config = MailgateConfig::default();
        config.resolution = 7;
        assert!(matches!(
            config.build_evaluator(store.clone(), groups.clone()),
            Err(ConfigError::InvalidValue(_))
        ));

        let mut config = MailgateConfig::default();
        config.samples = 0;
        assert!(config.build_evaluator(store.clone(), groups.clone()).is_err());

        let mut config = MailgateConfig::default();
        config.cooldown_secs = 0;
        assert!(config.build_evaluator(store.clone(), groups.clone()).is_err());

        let mut config = MailgateConfig::default();
        config.rate_limit = "fast".to_string();
        assert!(matches!(
            config.build_evaluator(store, groups),
            Err(ConfigError::InvalidRateLimit { .. })
        ));
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config("/nonexistent/mailgate.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
