//! Server configuration, read once from the environment at startup

use maac_plugin::{CallContext, Capabilities, Capability};
use std::env;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid log filter '{filter}': {reason}")]
    LogFilter { filter: String, reason: String },

    #[error("MAAC_BOOTSTRAP_SEED must be an unsigned integer, got '{0}'")]
    Seed(String),

    #[error("MAAC_DISABLED_BACKENDS: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// `tracing` filter directives (MAAC_LOG, then RUST_LOG)
    pub log_filter: String,
    /// Fixed seed for every resampling method
    pub bootstrap_seed: Option<u64>,
    pub capabilities: Capabilities,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let log_filter = get("MAAC_LOG")
            .or_else(|| get("RUST_LOG"))
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        EnvFilter::try_new(&log_filter).map_err(|e| ConfigError::LogFilter {
            filter: log_filter.clone(),
            reason: e.to_string(),
        })?;

        let bootstrap_seed = match get("MAAC_BOOTSTRAP_SEED") {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|_| ConfigError::Seed(raw.clone()))?),
            None => None,
        };

        let mut capabilities = Capabilities::all();
        if let Some(raw) = get("MAAC_DISABLED_BACKENDS") {
            for name in raw.split(',').filter(|s| !s.trim().is_empty()) {
                let cap: Capability = name.parse().map_err(ConfigError::Backend)?;
                capabilities = capabilities.without(cap);
            }
        }

        Ok(Self {
            log_filter,
            bootstrap_seed,
            capabilities,
        })
    }

    /// Base context handed to every method call
    pub fn call_context(&self) -> CallContext {
        CallContext::new()
            .with_seed(self.bootstrap_seed)
            .with_capabilities(self.capabilities.clone())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            bootstrap_seed: None,
            capabilities: Capabilities::all(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ServerConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        assert_eq!(config(&[]).unwrap(), ServerConfig::default());
    }

    #[test]
    fn test_maac_log_wins_over_rust_log() {
        let c = config(&[("MAAC_LOG", "debug"), ("RUST_LOG", "warn")]).unwrap();
        assert_eq!(c.log_filter, "debug");
        let c = config(&[("RUST_LOG", "warn")]).unwrap();
        assert_eq!(c.log_filter, "warn");
    }

    #[test]
    fn test_seed() {
        let c = config(&[("MAAC_BOOTSTRAP_SEED", "1234")]).unwrap();
        assert_eq!(c.bootstrap_seed, Some(1234));
        assert_eq!(c.call_context().seed, Some(1234));
        assert_eq!(
            config(&[("MAAC_BOOTSTRAP_SEED", "-1")]),
            Err(ConfigError::Seed("-1".to_string()))
        );
    }

    #[test]
    fn test_disabled_backends() {
        let c = config(&[("MAAC_DISABLED_BACKENDS", "factor, Power,")]).unwrap();
        assert!(!c.capabilities.is_enabled(Capability::Factor));
        assert!(!c.capabilities.is_enabled(Capability::Power));
        assert!(c.capabilities.is_enabled(Capability::Mediation));
        assert!(matches!(
            config(&[("MAAC_DISABLED_BACKENDS", "gpu")]),
            Err(ConfigError::Backend(_))
        ));
    }

    #[test]
    fn test_bad_log_filter() {
        assert!(matches!(
            config(&[("MAAC_LOG", "maac=notalevel")]),
            Err(ConfigError::LogFilter { .. })
        ));
    }
}
