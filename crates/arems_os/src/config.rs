#![forbid(unsafe_code)]

use std::env;

use arems_kernel_contracts::progress::DEFAULT_TOTAL_HOURS;
use thiserror::Error;

pub const ENV_NOTIFICATIONS_ENABLED: &str = "AREMS_NOTIFICATIONS_ENABLED";
pub const ENV_DEFAULT_TOTAL_HOURS: &str = "AREMS_DEFAULT_TOTAL_HOURS";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var}: {reason}")]
    Invalid {
        var: &'static str,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AremsOsConfig {
    pub notifications_enabled: bool,
    /// Target hours for orientees created without an explicit total.
    pub default_total_hours: f64,
}

impl AremsOsConfig {
    pub fn mvp_v1() -> Self {
        Self {
            notifications_enabled: true,
            default_total_hours: DEFAULT_TOTAL_HOURS,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_var_map(|key| env::var(key).ok())
    }

    pub fn from_env_var_map<F>(mut env_getter: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut config = Self::mvp_v1();
        if let Some(raw) = env_getter(ENV_NOTIFICATIONS_ENABLED) {
            config.notifications_enabled = !matches!(
                raw.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "off" | "no"
            );
        }
        if let Some(raw) = env_getter(ENV_DEFAULT_TOTAL_HOURS) {
            let raw = raw.trim();
            if !raw.is_empty() {
                let hours: f64 = raw.parse().map_err(|_| ConfigError::Invalid {
                    var: ENV_DEFAULT_TOTAL_HOURS,
                    reason: "must be a number",
                })?;
                if !hours.is_finite() || hours <= 0.0 {
                    return Err(ConfigError::Invalid {
                        var: ENV_DEFAULT_TOTAL_HOURS,
                        reason: "must be finite and > 0",
                    });
                }
                config.default_total_hours = hours;
            }
        }
        Ok(config)
    }
}

impl Default for AremsOsConfig {
    fn default() -> Self {
        Self::mvp_v1()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn from(vars: &[(&str, &str)]) -> Result<AremsOsConfig, ConfigError> {
        let map: BTreeMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AremsOsConfig::from_env_var_map(|k| map.get(k).cloned())
    }

    #[test]
    fn at_os_config_01_defaults() {
        let c = from(&[]).unwrap();
        assert!(c.notifications_enabled);
        assert_eq!(c.default_total_hours, 96.0);
    }

    #[test]
    fn at_os_config_02_overrides() {
        let c = from(&[
            (ENV_NOTIFICATIONS_ENABLED, "off"),
            (ENV_DEFAULT_TOTAL_HOURS, "120"),
        ])
        .unwrap();
        assert!(!c.notifications_enabled);
        assert_eq!(c.default_total_hours, 120.0);
    }

    #[test]
    fn at_os_config_03_rejects_non_positive_total() {
        assert!(from(&[(ENV_DEFAULT_TOTAL_HOURS, "0")]).is_err());
        assert!(from(&[(ENV_DEFAULT_TOTAL_HOURS, "NaN")]).is_err());
        assert!(from(&[(ENV_DEFAULT_TOTAL_HOURS, "lots")]).is_err());
    }
}
