//! Server configuration.
//!
//! Loaded from environment variables. The JWT secret is redacted in Debug
//! output.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Default listen address when neither `BIND_ADDRESS` nor `PORT` is set.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Hub configuration.
#[derive(Clone)]
pub struct Config {
    /// Listen address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Shared secret the login flow signs identity tokens with.
    pub jwt_secret: String,

    /// How long a connection may stay unauthenticated. `None` means no
    /// limit.
    pub auth_timeout: Option<Duration>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("jwt_secret", &"[REDACTED]")
            .field("auth_timeout", &self.auth_timeout)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let jwt_secret = vars
            .get("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("JWT_SECRET".to_string()))?
            .clone();

        let bind_address = match (vars.get("BIND_ADDRESS"), vars.get("PORT")) {
            (Some(addr), _) => addr.clone(),
            (None, Some(port)) => {
                let port: u16 = port.parse().map_err(|e| {
                    ConfigError::Invalid(format!(
                        "PORT must be a valid port number, got '{port}': {e}"
                    ))
                })?;
                format!("0.0.0.0:{port}")
            }
            (None, None) => DEFAULT_BIND_ADDRESS.to_string(),
        };

        let auth_timeout = match vars.get("AUTH_TIMEOUT_SECS") {
            Some(value_str) => {
                let secs: u64 = value_str.parse().map_err(|e| {
                    ConfigError::Invalid(format!(
                        "AUTH_TIMEOUT_SECS must be a non-negative integer, got '{value_str}': {e}"
                    ))
                })?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => None,
        };

        Ok(Config {
            bind_address,
            jwt_secret,
            auth_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_from_vars_defaults() {
        let config = Config::from_vars(&vars(&[("JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.auth_timeout, None);
    }

    #[test]
    fn test_from_vars_missing_secret_fails() {
        let result = Config::from_vars(&vars(&[]));
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "JWT_SECRET"));

        let result = Config::from_vars(&vars(&[("JWT_SECRET", "")]));
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(_))));
    }

    #[test]
    fn test_from_vars_port_builds_bind_address() {
        let config =
            Config::from_vars(&vars(&[("JWT_SECRET", "s"), ("PORT", "9000")])).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:9000");
    }

    #[test]
    fn test_from_vars_bind_address_wins_over_port() {
        let config = Config::from_vars(&vars(&[
            ("JWT_SECRET", "s"),
            ("BIND_ADDRESS", "127.0.0.1:7000"),
            ("PORT", "9000"),
        ]))
        .unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:7000");
    }

    #[test]
    fn test_from_vars_invalid_port_fails() {
        let result = Config::from_vars(&vars(&[("JWT_SECRET", "s"), ("PORT", "http")]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_from_vars_auth_timeout() {
        let config =
            Config::from_vars(&vars(&[("JWT_SECRET", "s"), ("AUTH_TIMEOUT_SECS", "30")]))
                .unwrap();
        assert_eq!(config.auth_timeout, Some(Duration::from_secs(30)));

        let config =
            Config::from_vars(&vars(&[("JWT_SECRET", "s"), ("AUTH_TIMEOUT_SECS", "0")]))
                .unwrap();
        assert_eq!(config.auth_timeout, None);

        let result =
            Config::from_vars(&vars(&[("JWT_SECRET", "s"), ("AUTH_TIMEOUT_SECS", "soon")]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = Config::from_vars(&vars(&[("JWT_SECRET", "hunter2")])).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }
}
