//! Controller configuration.
//!
//! Read once from the environment at startup and passed by value into the
//! components that need it.

use crate::error::ControllerError;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Process-wide settings for the Node Fencing Controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Namespace holding PodTemplates and remediation Jobs
    pub namespace: String,
    /// Max concurrent reconciliations
    pub concurrency: u16,
    /// Event debounce before reconciling
    pub debounce: Duration,
    /// Re-trigger nodes when their remediation Job changes
    pub watch_jobs: bool,
    /// Listen address for probes and metrics
    pub probe_addr: SocketAddr,
    /// Retry backoff floor in minutes
    pub retry_min_minutes: u64,
    /// Retry backoff cap in minutes
    pub retry_max_minutes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            concurrency: 4,
            debounce: Duration::from_secs(1),
            watch_jobs: true,
            probe_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            retry_min_minutes: 1,
            retry_max_minutes: 10,
        }
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, ControllerError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ControllerError::InvalidConfig(format!("{}={:?}: {}", key, value, e)))
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration using `lookup` to read variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(ns) = lookup("FENCING_NAMESPACE").or_else(|| lookup("WATCH_NAMESPACE")) {
            if ns.trim().is_empty() {
                return Err(ControllerError::InvalidConfig(
                    "FENCING_NAMESPACE must not be empty".to_string(),
                ));
            }
            config.namespace = ns.trim().to_string();
        }
        if let Some(v) = lookup("FENCING_CONCURRENCY") {
            config.concurrency = parse("FENCING_CONCURRENCY", &v)?;
            if config.concurrency == 0 {
                return Err(ControllerError::InvalidConfig(
                    "FENCING_CONCURRENCY must be at least 1".to_string(),
                ));
            }
        }
        if let Some(v) = lookup("FENCING_DEBOUNCE_SECS") {
            config.debounce = Duration::from_secs(parse("FENCING_DEBOUNCE_SECS", &v)?);
        }
        if let Some(v) = lookup("FENCING_WATCH_JOBS") {
            config.watch_jobs = parse("FENCING_WATCH_JOBS", &v)?;
        }
        if let Some(v) = lookup("FENCING_PROBE_ADDR") {
            config.probe_addr = parse("FENCING_PROBE_ADDR", &v)?;
        }
        if let Some(v) = lookup("FENCING_RETRY_MIN_MINUTES") {
            config.retry_min_minutes = parse("FENCING_RETRY_MIN_MINUTES", &v)?;
        }
        if let Some(v) = lookup("FENCING_RETRY_MAX_MINUTES") {
            config.retry_max_minutes = parse("FENCING_RETRY_MAX_MINUTES", &v)?;
        }
        if config.retry_min_minutes == 0 || config.retry_max_minutes < config.retry_min_minutes {
            return Err(ControllerError::InvalidConfig(format!(
                "retry backoff bounds must satisfy 1 <= min <= max, got {}..{}",
                config.retry_min_minutes, config.retry_max_minutes
            )));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ControllerError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        assert_eq!(load(&[]).unwrap(), Config::default());
    }

    #[test]
    fn test_namespace_fallback() {
        assert_eq!(load(&[("WATCH_NAMESPACE", "ops")]).unwrap().namespace, "ops");
        let config = load(&[("WATCH_NAMESPACE", "ops"), ("FENCING_NAMESPACE", "fencing")]).unwrap();
        assert_eq!(config.namespace, "fencing");
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("FENCING_CONCURRENCY", "8"),
            ("FENCING_DEBOUNCE_SECS", "0"),
            ("FENCING_WATCH_JOBS", "false"),
            ("FENCING_PROBE_ADDR", "127.0.0.1:9090"),
        ])
        .unwrap();
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.debounce, Duration::ZERO);
        assert!(!config.watch_jobs);
        assert_eq!(config.probe_addr.port(), 9090);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            load(&[("FENCING_CONCURRENCY", "many")]),
            Err(ControllerError::InvalidConfig(_))
        ));
        assert!(matches!(
            load(&[("FENCING_CONCURRENCY", "0")]),
            Err(ControllerError::InvalidConfig(_))
        ));
        assert!(matches!(
            load(&[("FENCING_WATCH_JOBS", "yes")]),
            Err(ControllerError::InvalidConfig(_))
        ));
        assert!(matches!(
            load(&[("FENCING_RETRY_MIN_MINUTES", "5"), ("FENCING_RETRY_MAX_MINUTES", "2")]),
            Err(ControllerError::InvalidConfig(_))
        ));
        assert!(matches!(
            load(&[("FENCING_NAMESPACE", " ")]),
            Err(ControllerError::InvalidConfig(_))
        ));
    }
}
