// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Handles environment variables, relay timing constants, and upstream connection settings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hookrelay Contributors

//! Environment-based configuration management for production deployment

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use url::Url;

/// Which event source variant a stream session attaches to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Long-poll subscription; upstream re-delivers the full current result
    /// set on every change
    #[default]
    Push,
    /// Fixed-interval point queries for new-only events
    Pull,
}

impl SourceMode {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pull" | "poll" => Self::Pull,
            _ => Self::Push,
        }
    }
}

impl std::fmt::Display for SourceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Push => write!(f, "push"),
            Self::Pull => write!(f, "pull"),
        }
    }
}

/// Upstream control-plane connection settings
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL of the upstream control-plane API
    pub base_url: Url,
    /// Service credential sent on store/watch queries
    pub service_token: Option<String>,
    /// Timeout for point requests
    pub request_timeout: Duration,
    /// Timeout for long-poll watch requests; must comfortably exceed the
    /// upstream's own hold time
    pub watch_timeout: Duration,
    /// Maximum accepted upstream response body size in bytes
    pub max_response_bytes: usize,
}

/// Relay timing and sizing constants
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Interval between keepalive comment frames
    pub keepalive_interval: Duration,
    /// Tick interval for the pull variant
    pub poll_interval: Duration,
    /// Hard ceiling on connection lifetime
    pub max_stream_duration: Duration,
    /// Result-set cap for the push variant; a saturated batch forces a
    /// re-attach with the advanced cursor
    pub page_cap: usize,
    /// Which event source variant to attach
    pub source_mode: SourceMode,
    /// Consecutive source errors tolerated before the session closes
    pub source_error_limit: u32,
    /// Delay before retrying a failed push subscription request
    pub source_retry_backoff: Duration,
    /// Frame channel capacity between session and transport
    pub frame_buffer: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
            max_stream_duration: Duration::from_secs(30 * 60),
            page_cap: 100,
            source_mode: SourceMode::default(),
            source_error_limit: 3,
            source_retry_backoff: Duration::from_secs(1),
            frame_buffer: 64,
        }
    }
}

/// Top-level server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port
    pub http_port: u16,
    /// HTTP listen host
    pub host: String,
    /// Upstream connection settings
    pub upstream: UpstreamConfig,
    /// Relay timing constants
    pub relay: RelayConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if `UPSTREAM_BASE_URL` is missing or unparseable, or
    /// if any numeric override fails to parse.
    pub fn from_env() -> Result<Self> {
        let base_url = env::var("UPSTREAM_BASE_URL")
            .context("UPSTREAM_BASE_URL environment variable is required")?;
        let base_url = Url::parse(&base_url).context("UPSTREAM_BASE_URL is not a valid URL")?;

        let config = Self {
            http_port: parse_env("HTTP_PORT", 8080)?,
            host: env_or("HOST", "0.0.0.0"),
            upstream: UpstreamConfig {
                base_url,
                service_token: env::var("UPSTREAM_SERVICE_TOKEN").ok(),
                request_timeout: Duration::from_secs(parse_env("UPSTREAM_TIMEOUT_SECS", 10)?),
                watch_timeout: Duration::from_secs(parse_env("UPSTREAM_WATCH_TIMEOUT_SECS", 60)?),
                max_response_bytes: parse_env("UPSTREAM_MAX_RESPONSE_BYTES", 1024 * 1024)?,
            },
            relay: RelayConfig {
                keepalive_interval: Duration::from_secs(parse_env("RELAY_KEEPALIVE_SECS", 30)?),
                poll_interval: Duration::from_millis(parse_env("RELAY_POLL_INTERVAL_MS", 500)?),
                max_stream_duration: Duration::from_secs(parse_env(
                    "RELAY_MAX_STREAM_SECS",
                    30 * 60,
                )?),
                page_cap: parse_env("RELAY_PAGE_CAP", 100)?,
                source_mode: SourceMode::from_str_or_default(&env_or(
                    "RELAY_SOURCE_MODE",
                    "push",
                )),
                source_error_limit: parse_env("RELAY_SOURCE_ERROR_LIMIT", 3)?,
                source_retry_backoff: Duration::from_millis(parse_env(
                    "RELAY_SOURCE_RETRY_BACKOFF_MS",
                    1000,
                )?),
                frame_buffer: parse_env("RELAY_FRAME_BUFFER", 64)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants
    ///
    /// # Errors
    ///
    /// Returns an error for values that would make the relay misbehave.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            matches!(self.upstream.base_url.scheme(), "http" | "https"),
            "UPSTREAM_BASE_URL must use http or https"
        );
        anyhow::ensure!(self.relay.page_cap > 0, "RELAY_PAGE_CAP must be positive");
        anyhow::ensure!(
            self.relay.frame_buffer > 0,
            "RELAY_FRAME_BUFFER must be positive"
        );
        anyhow::ensure!(
            !self.relay.poll_interval.is_zero(),
            "RELAY_POLL_INTERVAL_MS must be positive"
        );
        anyhow::ensure!(
            !self.relay.keepalive_interval.is_zero(),
            "RELAY_KEEPALIVE_SECS must be positive"
        );
        Ok(())
    }

    /// One-line configuration summary for startup logging
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "listen={}:{} upstream={} source={} keepalive={}s max_stream={}s poll={}ms page_cap={}",
            self.host,
            self.http_port,
            self.upstream.base_url,
            self.relay.source_mode,
            self.relay.keepalive_interval.as_secs(),
            self.relay.max_stream_duration.as_secs(),
            self.relay.poll_interval.as_millis(),
            self.relay.page_cap,
        )
    }
}

/// Get an environment variable with a default fallback
fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to a default when unset
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_defaults_match_observed_constants() {
        let relay = RelayConfig::default();
        assert_eq!(relay.keepalive_interval, Duration::from_secs(30));
        assert_eq!(relay.poll_interval, Duration::from_millis(500));
        assert_eq!(relay.max_stream_duration, Duration::from_secs(1800));
        assert_eq!(relay.page_cap, 100);
        assert_eq!(relay.source_error_limit, 3);
    }

    #[test]
    fn test_source_mode_parsing() {
        assert_eq!(SourceMode::from_str_or_default("pull"), SourceMode::Pull);
        assert_eq!(SourceMode::from_str_or_default("poll"), SourceMode::Pull);
        assert_eq!(SourceMode::from_str_or_default("push"), SourceMode::Push);
        assert_eq!(SourceMode::from_str_or_default("bogus"), SourceMode::Push);
    }

    #[test]
    fn test_validate_rejects_zero_page_cap() {
        let mut config = ServerConfig {
            http_port: 8080,
            host: "127.0.0.1".into(),
            upstream: UpstreamConfig {
                base_url: Url::parse("http://localhost:3210").unwrap(),
                service_token: None,
                request_timeout: Duration::from_secs(10),
                watch_timeout: Duration::from_secs(60),
                max_response_bytes: 1024,
            },
            relay: RelayConfig::default(),
        };
        assert!(config.validate().is_ok());

        config.relay.page_cap = 0;
        assert!(config.validate().is_err());
    }
}
