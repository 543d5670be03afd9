use crate::adapters::outbound::{TcpAuthConfig, TmdbConfig};
use crate::infrastructure::ReconnectConfig;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // HTTP surface
    pub listen_addr: String,
    pub debug: bool,

    // Authorization backend
    pub auth_host: String,
    pub auth_port: u16,
    pub auth_connect_timeout_secs: u64,
    pub auth_response_timeout_secs: u64,
    pub auth_idle_timeout_secs: Option<u64>,
    pub auth_max_reconnect_attempts: u32,

    // Cache
    pub redis_url: Option<String>,
    pub redis_key_prefix: String,
    pub cache_single_flight: bool,

    // Metadata API
    pub tmdb_access_key: Option<String>,
    pub tmdb_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9010".to_string(),
            debug: false,
            auth_host: "localhost".to_string(),
            auth_port: 3001,
            auth_connect_timeout_secs: 10,
            auth_response_timeout_secs: 10,
            auth_idle_timeout_secs: None,
            auth_max_reconnect_attempts: 5,
            redis_url: None,
            redis_key_prefix: "media-gateway".to_string(),
            cache_single_flight: false,
            tmdb_access_key: None,
            tmdb_base_url: "https://api.themoviedb.org/3".to_string(),
        }
    }
}

impl Config {
    /// Socket client settings derived from this config.
    pub fn auth_client_config(&self) -> TcpAuthConfig {
        TcpAuthConfig {
            host: self.auth_host.clone(),
            port: self.auth_port,
            connect_timeout: Duration::from_secs(self.auth_connect_timeout_secs),
            response_timeout: Duration::from_secs(self.auth_response_timeout_secs),
            idle_timeout: self.auth_idle_timeout_secs.map(Duration::from_secs),
            reconnect: ReconnectConfig {
                max_attempts: self.auth_max_reconnect_attempts,
                ..ReconnectConfig::default()
            },
        }
    }

    /// Metadata client settings; fails when no access key is configured.
    pub fn tmdb_config(&self) -> anyhow::Result<TmdbConfig> {
        let access_key = self
            .tmdb_access_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("TMDB_ACCESS_KEY is not set"))?;
        Ok(TmdbConfig {
            base_url: self.tmdb_base_url.clone(),
            access_key,
            ..TmdbConfig::default()
        })
    }
}

fn flag(value: &str) -> bool {
    value == "1" || value.to_lowercase() == "true"
}

/// Build a config from an arbitrary variable lookup.
///
/// Unparseable numbers fall back to their defaults.
pub fn config_from<F>(lookup: F) -> Config
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = Config::default();
    let number = |name: &str, default: u64| -> u64 {
        lookup(name)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    };

    let listen_addr = lookup("GATEWAY_LISTEN_ADDR").unwrap_or(defaults.listen_addr);

    let debug = lookup("DEBUG").is_some();

    // Authorization backend
    let auth_host = lookup("AUTH_BACKEND_HOST").unwrap_or(defaults.auth_host);

    let auth_port = lookup("AUTH_BACKEND_PORT")
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(defaults.auth_port);

    let auth_connect_timeout_secs =
        number("AUTH_CONNECT_TIMEOUT_SECS", defaults.auth_connect_timeout_secs);

    let auth_response_timeout_secs =
        number("AUTH_RESPONSE_TIMEOUT_SECS", defaults.auth_response_timeout_secs);

    let auth_idle_timeout_secs = lookup("AUTH_IDLE_TIMEOUT_SECS")
        .and_then(|v| v.trim().parse().ok())
        .filter(|secs| *secs > 0);

    let auth_max_reconnect_attempts = lookup("AUTH_MAX_RECONNECT_ATTEMPTS")
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(defaults.auth_max_reconnect_attempts);

    // Cache
    let redis_url = lookup("REDIS_URL").filter(|v| !v.is_empty());

    let redis_key_prefix = lookup("REDIS_KEY_PREFIX").unwrap_or(defaults.redis_key_prefix);

    let cache_single_flight = lookup("CACHE_SINGLE_FLIGHT")
        .map(|v| flag(&v))
        .unwrap_or(false);

    // Metadata API
    let tmdb_access_key = lookup("TMDB_ACCESS_KEY").filter(|v| !v.is_empty());

    let tmdb_base_url = lookup("TMDB_BASE_URL").unwrap_or(defaults.tmdb_base_url);

    Config {
        listen_addr,
        debug,
        auth_host,
        auth_port,
        auth_connect_timeout_secs,
        auth_response_timeout_secs,
        auth_idle_timeout_secs,
        auth_max_reconnect_attempts,
        redis_url,
        redis_key_prefix,
        cache_single_flight,
        tmdb_access_key,
        tmdb_base_url,
    }
}

pub fn load_config() -> anyhow::Result<Config> {
    Ok(config_from(|name| std::env::var(name).ok()))
}
