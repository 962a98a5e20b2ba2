//! Configuration module for the musicbox application.
//!
//! Values come from the process environment (after `.env` is loaded) through
//! figment. Every key has a default, so an empty environment runs a working
//! server against the public Saavn wrapper without the durable tier.

use crate::saavn::RetryPolicy;
use anyhow::Context;
use figment::{Figment, providers::Env};
use fundu::{DurationParser, TimeUnit};
use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Main application configuration containing all sub-configurations
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Log level for musicbox crates
    ///
    /// Valid values are: "trace", "debug", "info", "warn", "error".
    /// Defaults to "info" if not specified.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Port for the web server (default: 3000)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Base URL of the Saavn API wrapper
    #[serde(default = "default_saavn_api_url")]
    pub saavn_api_url: String,
    /// PostgreSQL connection string. Enables the durable cache tier when set.
    #[serde(default)]
    pub database_url: Option<String>,
    /// Tries per upstream request, including the first
    #[serde(default = "default_max_attempts")]
    pub upstream_max_attempts: u32,
    #[serde(
        default = "default_base_delay",
        deserialize_with = "deserialize_duration"
    )]
    pub upstream_base_delay: Duration,
    /// How long a 429 blocks all upstream calls
    #[serde(default = "default_cooldown", deserialize_with = "deserialize_duration")]
    pub upstream_cooldown: Duration,
    #[serde(default = "default_timeout", deserialize_with = "deserialize_duration")]
    pub upstream_timeout: Duration,
    /// Minimum gap between upstream requests; "0s" disables pacing
    #[serde(
        default = "default_min_spacing",
        deserialize_with = "deserialize_duration"
    )]
    pub upstream_min_spacing: Duration,
    /// Pending durable writes kept before new ones are dropped
    #[serde(default = "default_write_queue")]
    pub durable_write_queue: usize,
    /// Graceful shutdown timeout duration
    ///
    /// Accepts both numeric values (seconds) and duration strings.
    /// Defaults to 8 seconds if not specified.
    #[serde(
        default = "default_shutdown_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub shutdown_timeout: Duration,
}

impl Config {
    /// Extract configuration from the environment.
    pub fn load() -> anyhow::Result<Self> {
        Self::from_figment(Figment::new().merge(Env::raw()))
    }

    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        figment.extract().context("Failed to load config")
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.upstream_max_attempts.max(1),
            base_delay: self.upstream_base_delay,
            cooldown: self.upstream_cooldown,
            min_spacing: self.upstream_min_spacing,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_saavn_api_url() -> String {
    "https://saavn.sumit.co".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_cooldown() -> Duration {
    Duration::from_secs(60)
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_min_spacing() -> Duration {
    Duration::ZERO
}

fn default_write_queue() -> usize {
    1024
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(8)
}

/// Parse a duration string such as `"500ms"`, `"10s"`, `"2m"`, `"1h"`, or bare seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let parsed = DurationParser::with_time_units(&[
        TimeUnit::MilliSecond,
        TimeUnit::Second,
        TimeUnit::Minute,
        TimeUnit::Hour,
    ])
    .parse(s.trim())
    .map_err(|e| format!("Invalid duration '{s}': {e}"))?;
    Duration::try_from(parsed).map_err(|e| format!("Duration '{s}' out of range: {e}"))
}

/// Custom deserializer for duration fields that accepts both numeric and string values
///
/// Numbers are interpreted as seconds; strings go through [`parse_duration`].
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Visitor;

    struct DurationVisitor;

    impl<'de> Visitor<'de> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a duration string or number")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            parse_duration(value).map_err(serde::de::Error::custom)
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Duration::from_secs(value))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            u64::try_from(value)
                .map(Duration::from_secs)
                .map_err(|_| serde::de::Error::custom("Duration cannot be negative"))
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Duration::try_from_secs_f64(value).map_err(serde::de::Error::custom)
        }
    }

    deserializer.deserialize_any(DurationVisitor)
}
