/// Service configuration
///
/// Loaded from `WAKEWORD_*` environment variables with defaults matching the
/// classic two-port deployment (HTTP on 8503, streaming on `/ws`).

use crate::audio::CHUNK_SIZE;
use crate::audio_buffer::WINDOW_CAPACITY;
use crate::keywords::{KeywordError, KeywordSet};
use crate::session::{SessionConfig, DETECTION_THRESHOLD};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8503";
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid wake word list: {0}")]
    Keywords(#[from] KeywordError),
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Control plane and `/ws` listener
    pub http_addr: SocketAddr,

    /// Optional dedicated streaming listener serving WebSocket on `/`
    pub stream_addr: Option<SocketAddr>,

    /// Wake words active at startup
    pub keywords: KeywordSet,

    /// Detection threshold (exclusive)
    pub threshold: f32,

    /// Send a status message after every scored round
    pub emit_status: bool,

    /// Close streaming connections idle for this long
    pub idle_timeout: Option<Duration>,

    /// Body limit for `/detect` uploads
    pub max_upload_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 8503)),
            stream_addr: None,
            keywords: KeywordSet::default(),
            threshold: DETECTION_THRESHOLD,
            emit_status: true,
            idle_timeout: Some(Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS)),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let http_addr = match lookup("WAKEWORD_HTTP_ADDR") {
            Some(value) => parse_value("WAKEWORD_HTTP_ADDR", &value)?,
            None => defaults.http_addr,
        };

        let stream_addr = match lookup("WAKEWORD_STREAM_ADDR") {
            Some(value) if !value.trim().is_empty() => Some(parse_value("WAKEWORD_STREAM_ADDR", &value)?),
            _ => None,
        };

        let keywords = match lookup("WAKEWORD_KEYWORDS") {
            Some(value) => KeywordSet::parse_list(&value)?,
            None => defaults.keywords,
        };

        let threshold = match lookup("WAKEWORD_THRESHOLD") {
            Some(value) => parse_value("WAKEWORD_THRESHOLD", &value)?,
            None => defaults.threshold,
        };

        let emit_status = match lookup("WAKEWORD_EMIT_STATUS") {
            Some(value) => parse_value("WAKEWORD_EMIT_STATUS", &value)?,
            None => defaults.emit_status,
        };

        let idle_timeout = match lookup("WAKEWORD_IDLE_TIMEOUT_SECS") {
            Some(value) => match parse_value::<u64>("WAKEWORD_IDLE_TIMEOUT_SECS", &value)? {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            None => defaults.idle_timeout,
        };

        let max_upload_bytes = match lookup("WAKEWORD_MAX_UPLOAD_BYTES") {
            Some(value) => parse_value("WAKEWORD_MAX_UPLOAD_BYTES", &value)?,
            None => defaults.max_upload_bytes,
        };

        let config = Self {
            http_addr,
            stream_addr,
            keywords,
            threshold,
            emit_status,
            idle_timeout,
            max_upload_bytes,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(ConfigError::Invalid {
                key: "WAKEWORD_THRESHOLD",
                value: self.threshold.to_string(),
                reason: "must be between 0.0 and 1.0 (exclusive)".to_string(),
            });
        }

        if self.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid {
                key: "WAKEWORD_MAX_UPLOAD_BYTES",
                value: "0".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.stream_addr.is_some_and(|addr| addr == self.http_addr) {
            return Err(ConfigError::Invalid {
                key: "WAKEWORD_STREAM_ADDR",
                value: self.http_addr.to_string(),
                reason: "must differ from WAKEWORD_HTTP_ADDR".to_string(),
            });
        }

        Ok(())
    }

    /// Per-connection settings derived from this configuration
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            threshold: self.threshold,
            emit_status: self.emit_status,
            chunk_size: CHUNK_SIZE,
            window_capacity: WINDOW_CAPACITY,
        }
    }
}

fn parse_value<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.http_addr.to_string(), DEFAULT_HTTP_ADDR);
        assert!(config.stream_addr.is_none());
        assert_eq!(config.keywords, KeywordSet::default());
        assert_eq!(config.threshold, 0.5);
        assert!(config.emit_status);
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_overrides() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("WAKEWORD_HTTP_ADDR", "127.0.0.1:9000"),
            ("WAKEWORD_STREAM_ADDR", "127.0.0.1:9001"),
            ("WAKEWORD_KEYWORDS", "alexa"),
            ("WAKEWORD_THRESHOLD", "0.7"),
            ("WAKEWORD_EMIT_STATUS", "false"),
            ("WAKEWORD_IDLE_TIMEOUT_SECS", "0"),
        ]))
        .unwrap();

        assert_eq!(config.stream_addr.unwrap().port(), 9001);
        assert_eq!(config.keywords.as_slice(), &["alexa".to_string()]);
        assert!(!config.emit_status);
        assert!(config.idle_timeout.is_none());

        let session = config.session_config();
        assert_eq!(session.threshold, 0.7);
        assert_eq!(session.chunk_size, 1280);
    }

    #[test]
    fn test_invalid_threshold() {
        let result = ServiceConfig::from_lookup(lookup(&[("WAKEWORD_THRESHOLD", "1.5")]));
        assert!(matches!(result, Err(ConfigError::Invalid { key: "WAKEWORD_THRESHOLD", .. })));

        let result = ServiceConfig::from_lookup(lookup(&[("WAKEWORD_THRESHOLD", "high")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_keywords() {
        let result = ServiceConfig::from_lookup(lookup(&[("WAKEWORD_KEYWORDS", "alexa,alexa")]));
        assert!(matches!(result, Err(ConfigError::Keywords(_))));
    }

    #[test]
    fn test_stream_addr_must_differ() {
        let result = ServiceConfig::from_lookup(lookup(&[
            ("WAKEWORD_HTTP_ADDR", "127.0.0.1:9000"),
            ("WAKEWORD_STREAM_ADDR", "127.0.0.1:9000"),
        ]));
        assert!(result.is_err());
    }
}
