//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use parlor_shared::UserId;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP and WebSocket server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./parlor.db`
    pub database_path: PathBuf,

    /// JSON file mapping bearer tokens to principals.
    /// Env: `PRINCIPALS_FILE`
    /// Default: unset (every request is unauthorized).
    pub principals_file: Option<PathBuf>,

    /// The one principal that sees and clears system-wide notifications.
    /// Env: `NOTIFICATION_CURATOR_ID`
    /// Default: unset (nobody sees system-wide notifications).
    pub notification_curator: Option<UserId>,

    /// Sessions silent for longer than this are disconnected.
    /// Env: `HEARTBEAT_TIMEOUT_SECS`
    pub heartbeat_timeout: Duration,

    /// How often idle sessions are swept.
    /// Env: `REAPER_INTERVAL_SECS`
    pub reaper_interval: Duration,

    /// Upper bound on a mutation's persistence step.
    /// Env: `MUTATION_TIMEOUT_SECS`
    pub mutation_timeout: Duration,

    /// Outbound frames buffered per session before new ones are dropped.
    /// Env: `SESSION_BUFFER`
    pub session_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 8080).into(),
            database_path: PathBuf::from("./parlor.db"),
            principals_file: None,
            notification_curator: None,
            heartbeat_timeout: Duration::from_secs(60),
            reaper_interval: Duration::from_secs(15),
            mutation_timeout: Duration::from_secs(10),
            session_buffer: 256,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            config.http_addr = parse_or("HTTP_ADDR", &addr, config.http_addr);
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Some(path) = lookup("PRINCIPALS_FILE").filter(|p| !p.is_empty()) {
            config.principals_file = Some(PathBuf::from(path));
        }

        if let Some(id) = lookup("NOTIFICATION_CURATOR_ID").filter(|v| !v.is_empty()) {
            match id.parse::<UserId>() {
                Ok(curator) => config.notification_curator = Some(curator),
                Err(e) => {
                    tracing::warn!(
                        value = %id,
                        error = %e,
                        "Invalid NOTIFICATION_CURATOR_ID, system notifications stay hidden"
                    );
                }
            }
        }

        if let Some(val) = lookup("HEARTBEAT_TIMEOUT_SECS") {
            config.heartbeat_timeout = secs_or("HEARTBEAT_TIMEOUT_SECS", &val, config.heartbeat_timeout);
        }

        if let Some(val) = lookup("REAPER_INTERVAL_SECS") {
            config.reaper_interval = secs_or("REAPER_INTERVAL_SECS", &val, config.reaper_interval);
        }

        if let Some(val) = lookup("MUTATION_TIMEOUT_SECS") {
            config.mutation_timeout = secs_or("MUTATION_TIMEOUT_SECS", &val, config.mutation_timeout);
        }

        if let Some(val) = lookup("SESSION_BUFFER") {
            config.session_buffer = parse_or("SESSION_BUFFER", &val, config.session_buffer).max(1);
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

fn parse_or<T: FromStr + Copy>(key: &str, value: &str, default: T) -> T {
    match value.trim().parse::<T>() {
        Ok(parsed) => parsed,
        Err(_) => {
            tracing::warn!(key, value, "Invalid setting, using default");
            default
        }
    }
}

/// Whole seconds; zero is rejected because it would disable the bound.
fn secs_or(key: &str, value: &str, default: Duration) -> Duration {
    match parse_or::<u64>(key, value, 0) {
        0 => default,
        secs => Duration::from_secs(secs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_map(pairs: &[(&str, &str)]) -> ServerConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.heartbeat_timeout, Duration::from_secs(60));
        assert!(config.notification_curator.is_none());
    }

    #[test]
    fn test_overrides_apply() {
        let curator = UserId::new();
        let curator_str = curator.to_string();
        let config = from_map(&[
            ("HTTP_ADDR", "127.0.0.1:9000"),
            ("NOTIFICATION_CURATOR_ID", curator_str.as_str()),
            ("MUTATION_TIMEOUT_SECS", "3"),
            ("SESSION_BUFFER", "16"),
        ]);
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 9000).into());
        assert_eq!(config.notification_curator, Some(curator));
        assert_eq!(config.mutation_timeout, Duration::from_secs(3));
        assert_eq!(config.session_buffer, 16);
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let config = from_map(&[
            ("HTTP_ADDR", "nowhere"),
            ("NOTIFICATION_CURATOR_ID", "not-a-uuid"),
            ("HEARTBEAT_TIMEOUT_SECS", "0"),
            ("REAPER_INTERVAL_SECS", "soon"),
        ]);
        let defaults = ServerConfig::default();
        assert_eq!(config.http_addr, defaults.http_addr);
        assert!(config.notification_curator.is_none());
        assert_eq!(config.heartbeat_timeout, defaults.heartbeat_timeout);
        assert_eq!(config.reaper_interval, defaults.reaper_interval);
    }
}
