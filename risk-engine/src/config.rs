//! Configuration for risk scoring
//!
//! The engine never reads the environment on its own. Callers build a
//! [`RiskConfig`] (defaults, TOML file or `RISK_*` variables) and hand it over.

use crate::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Risk scoring configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Scores at or above this are high risk
    pub high_risk_threshold: f64,

    /// Scores at or above this are critical
    pub critical_risk_threshold: f64,

    /// Signal weights, must sum to 1
    pub weights: RiskWeights,

    /// Number of latest payments looked at by the recent-failure signal
    pub recent_window: usize,

    /// Current amount at or below this maps to a low-amount signal of 1
    pub low_amount_floor: Decimal,

    /// Current amount at or above this maps to a low-amount signal of 0
    pub low_amount_reference: Decimal,

    /// Accounts at least this old carry no age signal
    pub age_cutoff_days: i64,

    /// Default size of the risky subscriber listing
    pub risky_list_limit: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            high_risk_threshold: 0.4,
            critical_risk_threshold: 0.7,
            weights: RiskWeights::default(),
            recent_window: 3,
            low_amount_floor: Decimal::new(120, 2),       // 1.20
            low_amount_reference: Decimal::new(1000, 2),  // 10.00
            age_cutoff_days: 180,
            risky_list_limit: 100,
        }
    }
}

/// Weights of the five signals
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    /// Recent-failure rate
    pub recent_failure: f64,

    /// Downgrade / low amount
    pub downgrade: f64,

    /// All-time failure rate
    pub global_failure: f64,

    /// Pay-once-then-decline
    pub pattern: f64,

    /// Account age
    pub account_age: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            recent_failure: 0.50,
            downgrade: 0.20,
            global_failure: 0.15,
            pattern: 0.10,
            account_age: 0.05,
        }
    }
}

impl RiskWeights {
    /// Sum of all weights
    pub fn total(&self) -> f64 {
        self.as_array().iter().sum()
    }

    fn as_array(&self) -> [f64; 5] {
        [
            self.recent_failure,
            self.downgrade,
            self.global_failure,
            self.pattern,
            self.account_age,
        ]
    }

    fn validate(&self) -> Result<()> {
        for weight in self.as_array() {
            if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
                return Err(Error::Config(format!(
                    "Weight {} must be a finite value in [0, 1]",
                    weight
                )));
            }
        }

        let total = self.total();
        if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(Error::Config(format!(
                "Weights must sum to 1.0, got {}",
                total
            )));
        }
        Ok(())
    }
}

impl RiskConfig {
    /// Check weights, thresholds and normalization references
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;

        let (high, critical) = (self.high_risk_threshold, self.critical_risk_threshold);
        if !high.is_finite() || !critical.is_finite() {
            return Err(Error::Config("Thresholds must be finite".to_string()));
        }
        if !(0.0 <= high && high < critical && critical <= 1.0) {
            return Err(Error::Config(format!(
                "Thresholds must satisfy 0 <= high < critical <= 1, got high={} critical={}",
                high, critical
            )));
        }

        if self.recent_window == 0 {
            return Err(Error::Config("Recent window must hold at least one payment".to_string()));
        }

        if self.low_amount_floor < Decimal::ZERO
            || self.low_amount_floor >= self.low_amount_reference
        {
            return Err(Error::Config(format!(
                "Low amount floor {} must be non-negative and below reference {}",
                self.low_amount_floor, self.low_amount_reference
            )));
        }

        if self.age_cutoff_days <= 0 {
            return Err(Error::Config(format!(
                "Age cutoff must be positive, got {} days",
                self.age_cutoff_days
            )));
        }

        Ok(())
    }

    /// Load from a TOML file; missing keys keep their defaults
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RiskConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load defaults overridden by `RISK_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`RiskConfig::from_env`] over an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = RiskConfig::default();

        override_with(&lookup, "RISK_HIGH_THRESHOLD", &mut config.high_risk_threshold)?;
        override_with(&lookup, "RISK_CRITICAL_THRESHOLD", &mut config.critical_risk_threshold)?;
        override_with(&lookup, "RISK_WEIGHT_RECENT_FAILURE", &mut config.weights.recent_failure)?;
        override_with(&lookup, "RISK_WEIGHT_DOWNGRADE", &mut config.weights.downgrade)?;
        override_with(&lookup, "RISK_WEIGHT_GLOBAL_FAILURE", &mut config.weights.global_failure)?;
        override_with(&lookup, "RISK_WEIGHT_PATTERN", &mut config.weights.pattern)?;
        override_with(&lookup, "RISK_WEIGHT_ACCOUNT_AGE", &mut config.weights.account_age)?;
        override_with(&lookup, "RISK_RECENT_WINDOW", &mut config.recent_window)?;
        override_with(&lookup, "RISK_LOW_AMOUNT_FLOOR", &mut config.low_amount_floor)?;
        override_with(&lookup, "RISK_LOW_AMOUNT_REFERENCE", &mut config.low_amount_reference)?;
        override_with(&lookup, "RISK_AGE_CUTOFF_DAYS", &mut config.age_cutoff_days)?;

        config.validate()?;
        Ok(config)
    }
}

fn override_with<F, T>(lookup: &F, key: &str, target: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse::<T>()
            .map_err(|e| Error::Config(format!("{}={:?}: {}", key, raw, e)))?;
    }
    Ok(())
}
