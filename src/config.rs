//! Relay configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`), with defaults for everything except
//! what must be validated.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::RelayError;

/// Largest accepted coordinator mailbox.
pub const MAX_MAILBOX_CAPACITY: usize = 4096;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

/// Top-level relay configuration.
///
/// Loaded once at startup via [`RelayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// URL of the upstream NATS server.
    pub nats_url: String,

    /// Subject the relay subscribes to and publishes on by default.
    pub upstream_subject: String,

    /// Master switch for the upstream connection.
    pub upstream_enabled: bool,

    /// How long after subscribing messages are still treated as backlog.
    pub backlog_window: Duration,

    /// Bound of the coordinator mailbox.
    pub mailbox_capacity: usize,

    /// Bound of each viewer's outgoing frame queue.
    pub viewer_queue_capacity: usize,

    /// How long a replay request waits for its completion signal.
    pub replay_timeout: Duration,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            nats_url: "nats://127.0.0.1:4222".to_string(),
            upstream_subject: "location.1.kiosk.config".to_string(),
            upstream_enabled: true,
            backlog_window: Duration::from_millis(500),
            mailbox_capacity: 128,
            viewer_queue_capacity: 256,
            replay_timeout: Duration::from_millis(5000),
            log_format: LogFormat::Text,
        }
    }
}

impl RelayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to [`RelayConfig::default`] values when a variable is not
    /// set. Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Config`] if a variable is set but cannot be
    /// parsed, or the resulting configuration fails
    /// [`RelayConfig::validate`].
    pub fn from_env() -> Result<Self, RelayError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from any key/value source, `lookup` returning
    /// `None` for unset keys.
    ///
    /// # Errors
    ///
    /// Same as [`RelayConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RelayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let backlog_ms = parse_env(
            &lookup,
            "BACKLOG_WINDOW_MS",
            duration_ms(defaults.backlog_window),
        )?;
        let replay_ms = parse_env(
            &lookup,
            "REPLAY_TIMEOUT_MS",
            duration_ms(defaults.replay_timeout),
        )?;

        let config = Self {
            listen_addr: parse_env(&lookup, "LISTEN_ADDR", defaults.listen_addr)?,
            nats_url: lookup("NATS_URL").unwrap_or(defaults.nats_url),
            upstream_subject: lookup("UPSTREAM_SUBJECT").unwrap_or(defaults.upstream_subject),
            upstream_enabled: parse_env_bool(
                &lookup,
                "UPSTREAM_ENABLED",
                defaults.upstream_enabled,
            )?,
            backlog_window: Duration::from_millis(backlog_ms),
            mailbox_capacity: parse_env(&lookup, "MAILBOX_CAPACITY", defaults.mailbox_capacity)?,
            viewer_queue_capacity: parse_env(
                &lookup,
                "VIEWER_QUEUE_CAPACITY",
                defaults.viewer_queue_capacity,
            )?,
            replay_timeout: Duration::from_millis(replay_ms),
            log_format: parse_log_format(lookup("LOG_FORMAT").as_deref()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Config`] naming the first offending setting.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.upstream_enabled && self.nats_url.trim().is_empty() {
            return Err(RelayError::Config("NATS_URL is required".to_string()));
        }
        if self.upstream_subject.trim().is_empty() {
            return Err(RelayError::Config("UPSTREAM_SUBJECT is required".to_string()));
        }
        if !(1..=MAX_MAILBOX_CAPACITY).contains(&self.mailbox_capacity) {
            return Err(RelayError::Config(format!(
                "MAILBOX_CAPACITY {} out of range (1-{MAX_MAILBOX_CAPACITY})",
                self.mailbox_capacity
            )));
        }
        if self.viewer_queue_capacity == 0 {
            return Err(RelayError::Config(
                "VIEWER_QUEUE_CAPACITY must be at least 1".to_string(),
            ));
        }
        if self.replay_timeout.is_zero() {
            return Err(RelayError::Config(
                "REPLAY_TIMEOUT_MS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Parses `key` as `T`. Unset means `default`; set but unparsable is a
/// [`RelayError::Config`].
fn parse_env<F, T>(lookup: &F, key: &str, default: T) -> Result<T, RelayError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| RelayError::Config(format!("invalid {key} {raw:?}: {e}"))),
        None => Ok(default),
    }
}

/// Parses `key` as a boolean. Accepts `true`, `1`, `false`, `0`
/// (case-insensitive); anything else is a [`RelayError::Config`].
fn parse_env_bool<F>(lookup: &F, key: &str, default: bool) -> Result<bool, RelayError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(RelayError::Config(format!(
            "invalid {key} {raw:?}: expected true/false/1/0"
        ))),
    }
}

fn parse_log_format(raw: Option<&str>) -> LogFormat {
    match raw {
        Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
        _ => LogFormat::Text,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<RelayConfig, RelayError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        RelayConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn unset_variables_take_defaults() {
        let config = load(&[]).unwrap_or_else(|e| panic!("defaults rejected: {e}"));
        let defaults = RelayConfig::default();
        assert_eq!(config.listen_addr, defaults.listen_addr);
        assert_eq!(config.backlog_window, defaults.backlog_window);
        assert_eq!(config.replay_timeout, defaults.replay_timeout);
        assert_eq!(config.mailbox_capacity, defaults.mailbox_capacity);
        assert!(config.upstream_enabled);
    }

    #[test]
    fn set_variables_override_defaults() {
        let config = load(&[
            ("LISTEN_ADDR", "127.0.0.1:8080"),
            ("UPSTREAM_ENABLED", "FALSE"),
            ("BACKLOG_WINDOW_MS", "250"),
            ("MAILBOX_CAPACITY", " 64 "),
            ("REPLAY_TIMEOUT_MS", "1500"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap_or_else(|e| panic!("valid overrides rejected: {e}"));
        assert_eq!(config.listen_addr, SocketAddr::from(([127, 0, 0, 1], 8080)));
        assert!(!config.upstream_enabled);
        assert_eq!(config.backlog_window, Duration::from_millis(250));
        assert_eq!(config.mailbox_capacity, 64);
        assert_eq!(config.replay_timeout, Duration::from_millis(1500));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn malformed_numbers_are_config_errors() {
        let Err(RelayError::Config(msg)) = load(&[("MAILBOX_CAPACITY", "-5")]) else {
            panic!("negative capacity accepted");
        };
        assert!(msg.contains("MAILBOX_CAPACITY"));

        let Err(RelayError::Config(msg)) = load(&[("REPLAY_TIMEOUT_MS", "five seconds")]) else {
            panic!("non-numeric timeout accepted");
        };
        assert!(msg.contains("REPLAY_TIMEOUT_MS"));

        assert!(matches!(
            load(&[("LISTEN_ADDR", "localhost")]),
            Err(RelayError::Config(_))
        ));
    }

    #[test]
    fn unrecognized_bool_is_config_error() {
        let Err(RelayError::Config(msg)) = load(&[("UPSTREAM_ENABLED", "yes please")]) else {
            panic!("unrecognized boolean accepted");
        };
        assert!(msg.contains("UPSTREAM_ENABLED"));
    }

    #[test]
    fn parsed_values_still_go_through_validation() {
        assert!(matches!(
            load(&[("MAILBOX_CAPACITY", "0")]),
            Err(RelayError::Config(_))
        ));
    }

    #[test]
    fn defaults_are_valid() {
        assert!(RelayConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_subject_is_rejected() {
        let config = RelayConfig {
            upstream_subject: "  ".to_string(),
            ..RelayConfig::default()
        };
        assert!(matches!(config.validate(), Err(RelayError::Config(_))));
    }

    #[test]
    fn mailbox_capacity_bounds() {
        let zero = RelayConfig {
            mailbox_capacity: 0,
            ..RelayConfig::default()
        };
        let huge = RelayConfig {
            mailbox_capacity: MAX_MAILBOX_CAPACITY + 1,
            ..RelayConfig::default()
        };
        assert!(zero.validate().is_err());
        assert!(huge.validate().is_err());
    }

    #[test]
    fn nats_url_only_required_when_upstream_enabled() {
        let disabled = RelayConfig {
            nats_url: String::new(),
            upstream_enabled: false,
            ..RelayConfig::default()
        };
        assert!(disabled.validate().is_ok());

        let enabled = RelayConfig {
            upstream_enabled: true,
            ..disabled
        };
        assert!(enabled.validate().is_err());
    }

    #[test]
    fn log_format_parsing() {
        assert_eq!(parse_log_format(Some("JSON")), LogFormat::Json);
        assert_eq!(parse_log_format(Some("text")), LogFormat::Text);
        assert_eq!(parse_log_format(None), LogFormat::Text);
    }
}
