//! Engine configuration.
//!
//! Thresholds used by alerting and the defaults applied when a filament or job
//! is created without explicit per-unit figures.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_MAINTENANCE_THRESHOLD_PCT: &str = "FILAFORGE_MAINTENANCE_THRESHOLD_PCT";
pub const ENV_FREE_MINUTES_WARN_24H: &str = "FILAFORGE_FREE_MINUTES_WARN_24H";
pub const ENV_DEFAULT_EST_PRINT_MIN_PER_UNIT: &str = "FILAFORGE_DEFAULT_EST_PRINT_MIN_PER_UNIT";
pub const ENV_DEFAULT_GRAMS_PER_UNIT: &str = "FILAFORGE_DEFAULT_GRAMS_PER_UNIT";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: expected a number, got {value:?}")]
    NotANumber { var: &'static str, value: String },

    #[error("{var}: {reason}")]
    OutOfRange { var: &'static str, reason: &'static str },
}

/// Tunables shared by the alert engine, ATP calculator and create operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Maintenance ratio (hours used / interval) at which an alert fires.
    pub maintenance_threshold_pct: f64,
    /// Minimum free machine-minutes in the next 24h before a queue counts as saturated.
    pub free_minutes_warn_24h: f64,
    pub default_est_print_min_per_unit: f64,
    pub default_grams_per_unit: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            maintenance_threshold_pct: 0.9,
            free_minutes_warn_24h: 120.0,
            default_est_print_min_per_unit: 30.0,
            default_grams_per_unit: 80.0,
        }
    }
}

impl EngineConfig {
    /// Load from process environment; unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (environment, test fixtures).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = read_number(&lookup, ENV_MAINTENANCE_THRESHOLD_PCT)? {
            config.maintenance_threshold_pct = v;
        }
        if let Some(v) = read_number(&lookup, ENV_FREE_MINUTES_WARN_24H)? {
            config.free_minutes_warn_24h = v;
        }
        if let Some(v) = read_number(&lookup, ENV_DEFAULT_EST_PRINT_MIN_PER_UNIT)? {
            config.default_est_print_min_per_unit = v;
        }
        if let Some(v) = read_number(&lookup, ENV_DEFAULT_GRAMS_PER_UNIT)? {
            config.default_grams_per_unit = v;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.maintenance_threshold_pct > 0.0) {
            return Err(ConfigError::OutOfRange {
                var: ENV_MAINTENANCE_THRESHOLD_PCT,
                reason: "must be greater than zero",
            });
        }
        if !(self.free_minutes_warn_24h >= 0.0) {
            return Err(ConfigError::OutOfRange {
                var: ENV_FREE_MINUTES_WARN_24H,
                reason: "must not be negative",
            });
        }
        if !(self.default_est_print_min_per_unit > 0.0) {
            return Err(ConfigError::OutOfRange {
                var: ENV_DEFAULT_EST_PRINT_MIN_PER_UNIT,
                reason: "must be greater than zero",
            });
        }
        if !(self.default_grams_per_unit > 0.0) {
            return Err(ConfigError::OutOfRange {
                var: ENV_DEFAULT_GRAMS_PER_UNIT,
                reason: "must be greater than zero",
            });
        }
        Ok(())
    }
}

fn read_number<F>(lookup: &F, var: &'static str) -> Result<Option<f64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(ConfigError::NotANumber {
            var,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = EngineConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.maintenance_threshold_pct, 0.9);
        assert_eq!(config.free_minutes_warn_24h, 120.0);
        assert_eq!(config.default_est_print_min_per_unit, 30.0);
        assert_eq!(config.default_grams_per_unit, 80.0);
    }

    #[test]
    fn overrides_are_read_from_lookup() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            (ENV_MAINTENANCE_THRESHOLD_PCT, "0.75"),
            (ENV_DEFAULT_GRAMS_PER_UNIT, " 42 "),
        ]))
        .unwrap();
        assert_eq!(config.maintenance_threshold_pct, 0.75);
        assert_eq!(config.default_grams_per_unit, 42.0);
        assert_eq!(config.free_minutes_warn_24h, 120.0);
    }

    #[test]
    fn garbage_values_name_the_variable() {
        let err = EngineConfig::from_lookup(lookup_from(&[(ENV_FREE_MINUTES_WARN_24H, "lots")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::NotANumber {
                var: ENV_FREE_MINUTES_WARN_24H,
                value: "lots".to_string()
            }
        );
    }

    #[test]
    fn non_positive_defaults_are_rejected() {
        let err = EngineConfig::from_lookup(lookup_from(&[(ENV_DEFAULT_GRAMS_PER_UNIT, "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { var, .. } if var == ENV_DEFAULT_GRAMS_PER_UNIT));
    }

    #[test]
    fn deserializes_camel_case_with_partial_fields() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"freeMinutesWarn24h": 60}"#).unwrap();
        assert_eq!(config.free_minutes_warn_24h, 60.0);
        assert_eq!(config.default_grams_per_unit, 80.0);
    }
}
