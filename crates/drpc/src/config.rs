// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Client configuration.
//!
//! Supports both programmatic and file-based configuration:
//!
//! ```toml
//! client_id = "sensor-gateway"
//! worker_threads = 4
//! max_retries = 5
//! call_timeout_ms = 2000
//! qos = "at_least_once"
//! codec = "cdr"
//! ```

use crate::codec::CodecKind;
use crate::runner::{DEFAULT_MAX_RETRIES, DEFAULT_WORKER_THREADS};
use crate::transport::{ConnectOptions, QosLevel};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// RPC client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Client identifier; a random UUID when absent.
    #[serde(default)]
    pub client_id: Option<String>,

    /// Transport worker threads.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Retry ceiling of the default failure policy.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// How long a single call waits for its response (milliseconds).
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Delivery guarantee for every publish.
    #[serde(default)]
    pub qos: QosLevel,

    /// Keep-alive interval (seconds).
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    #[serde(default = "default_true")]
    pub clean_session: bool,

    #[serde(default)]
    pub codec: CodecKind,
}

fn default_worker_threads() -> usize {
    DEFAULT_WORKER_THREADS
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_call_timeout_ms() -> u64 {
    60_000
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            worker_threads: default_worker_threads(),
            max_retries: default_max_retries(),
            call_timeout_ms: default_call_timeout_ms(),
            qos: QosLevel::default(),
            keep_alive_secs: default_keep_alive_secs(),
            clean_session: true,
            codec: CodecKind::default(),
        }
    }
}

impl RpcConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_threads == 0 {
            return Err(ConfigError::Invalid(
                "worker_threads must be at least 1".into(),
            ));
        }
        if self.call_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "call_timeout_ms must be greater than 0".into(),
            ));
        }
        if let Some(id) = &self.client_id {
            if id.is_empty() || id.contains(['/', '+', '#']) {
                return Err(ConfigError::Invalid(format!(
                    "client_id {:?} must be non-empty and free of '/', '+', '#'",
                    id
                )));
            }
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Session options for `client_id`.
    pub fn connect_options(&self, client_id: &str) -> ConnectOptions {
        ConnectOptions {
            client_id: client_id.to_string(),
            keep_alive: Duration::from_secs(self.keep_alive_secs),
            clean_session: self.clean_session,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RpcConfig::default();
        assert_eq!(config.worker_threads, 10);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.call_timeout(), Duration::from_secs(60));
        assert_eq!(config.qos, QosLevel::ExactlyOnce);
        assert_eq!(config.codec, CodecKind::Json);
        assert!(config.clean_session);
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(RpcConfig::from_toml_str("").unwrap(), RpcConfig::default());
    }

    #[test]
    fn test_parse_toml() {
        let config = RpcConfig::from_toml_str(
            r#"
            client_id = "gateway"
            worker_threads = 2
            call_timeout_ms = 250
            qos = "at_least_once"
            codec = "cdr"
            clean_session = false
            "#,
        )
        .unwrap();

        assert_eq!(config.client_id.as_deref(), Some("gateway"));
        assert_eq!(config.worker_threads, 2);
        assert_eq!(config.call_timeout_ms, 250);
        assert_eq!(config.qos, QosLevel::AtLeastOnce);
        assert_eq!(config.codec, CodecKind::Cdr);
        assert_eq!(config.max_retries, 5);

        let options = config.connect_options("gateway");
        assert!(!options.clean_session);
        assert_eq!(options.keep_alive, Duration::from_secs(30));
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let err = RpcConfig::from_toml_str("worker_threads = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_validate_rejects_reserved_client_id() {
        let config = RpcConfig {
            client_id: Some("a/b".into()),
            ..RpcConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_codec_is_parse_error() {
        let err = RpcConfig::from_toml_str(r#"codec = "xml""#).unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }
}
