//! Service configuration.
//!
//! Settings come from the process environment, optionally seeded from a
//! `.env` file. Anything unset falls back to a development default.
//!
//! # Middleware Settings
//!
//! Every response cache setting can be overridden with `CACHE_<KEY>` and every
//! IP filter setting with `IP_FILTER_<KEY>`, where `<KEY>` is the upper-cased
//! setting name. Values are parsed as JSON when they are valid JSON and taken
//! as a bare string otherwise:
//!
//! ```bash
//! CACHE_EXCLUDED_PATH='["^/admin"]'
//! CACHE_TTL=600
//! CACHE_METHODS=GET
//! CACHE_INCLUDED_QUERY=null          # query strings bust the cache
//! IP_FILTER_BLACKLIST='["10.0.0.0/8"]'
//! IP_FILTER_BLACKLISTED_REDIRECT=https://example.com/blocked
//! ```
//!
//! # Service Settings
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `HOST` / `PORT` | `0.0.0.0` / `3000` | Listen address |
//! | `CACHE_ENABLED` | `true` | Mount the response cache |
//! | `CACHE_MAX_ENTRIES` | `10000` | Capacity of the in-memory store |
//! | `CORS_ALLOWED_ORIGINS` | `*` | Comma-separated origins |
//! | `RUST_LOG` | `info` | Tracing filter |
//! | `METRICS_PORT` | `9090` | Prometheus listener, `0` disables it |

use std::net::SocketAddr;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::cache::CacheConfig;
use crate::cache::config::CACHE_KEYS;
use crate::cache::memory::DEFAULT_MAX_ENTRIES;
use crate::error::{AppError, AppResult};
use crate::middleware::ip_filter::{IP_FILTER_KEYS, IpFilterConfig};

/// Environment prefix for response cache settings.
pub const CACHE_ENV_PREFIX: &str = "CACHE_";

/// Environment prefix for IP filter settings.
pub const IP_FILTER_ENV_PREFIX: &str = "IP_FILTER_";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_METRICS_PORT: u16 = 9090;

/// Resolved service configuration.
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// let listener = TcpListener::bind(config.server_addr()).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Listener
    // =========================================================================
    pub host: String,
    pub port: u16,

    /// Origins allowed by the CORS layer; `"*"` allows any.
    pub cors_allowed_origins: Vec<String>,

    // =========================================================================
    // Response Cache
    // =========================================================================
    /// Whether the response cache is mounted at all.
    pub cache_enabled: bool,

    /// Capacity of the in-memory store.
    pub cache_max_entries: u64,

    pub cache: CacheConfig,

    // =========================================================================
    // IP Filter
    // =========================================================================
    /// Disabled when both lists are empty.
    pub ip_filter: IpFilterConfig,

    // =========================================================================
    // Observability
    // =========================================================================
    /// Tracing filter directive, e.g. `info` or `edgeguard=debug`.
    pub log_level: String,

    /// Prometheus listener port; `0` disables the exporter.
    pub metrics_port: u16,
}

impl Config {
    /// Read the process environment (after loading `.env`, if any).
    ///
    /// # Errors
    ///
    /// `AppError::ConfigError` for unparsable values such as a non-numeric
    /// `PORT` or an empty `CACHE_METHODS`, and the pattern/CIDR variants for
    /// rules that do not compile.
    pub fn from_env() -> AppResult<Self> {
        // A missing .env file is the normal case
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            host: lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_var(&lookup, "PORT", DEFAULT_PORT)?,
            cors_allowed_origins: split_origins(
                lookup("CORS_ALLOWED_ORIGINS").as_deref().unwrap_or("*"),
            ),
            cache_enabled: parse_var(&lookup, "CACHE_ENABLED", true)?,
            cache_max_entries: parse_var(&lookup, "CACHE_MAX_ENTRIES", DEFAULT_MAX_ENTRIES)?,
            cache: CacheConfig::from_overrides(&overrides_from(
                CACHE_ENV_PREFIX,
                &CACHE_KEYS,
                &lookup,
            ))?,
            ip_filter: IpFilterConfig::from_overrides(&overrides_from(
                IP_FILTER_ENV_PREFIX,
                &IP_FILTER_KEYS,
                &lookup,
            ))?,
            log_level: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            metrics_port: parse_var(&lookup, "METRICS_PORT", DEFAULT_METRICS_PORT)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> AppResult<()> {
        if self.cache_max_entries == 0 {
            return Err(AppError::ConfigError(
                "CACHE_MAX_ENTRIES must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// `host:port` for the HTTP listener.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port != 0
    }

    /// Bind address for the Prometheus exporter, if enabled.
    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_enabled()
            .then(|| SocketAddr::from(([0, 0, 0, 0], self.metrics_port)))
    }
}

/// Parse a scalar variable, falling back to `default` when unset.
fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> AppResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(name).map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}")))
    })
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

/// Collect `<prefix><KEY>` variables for each known key into an override map.
///
/// Only set variables produce entries, so unset keys keep their defaults
/// while `null` clears them.
pub fn overrides_from<F>(prefix: &str, keys: &[&str], lookup: &F) -> Map<String, Value>
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter()
        .filter_map(|key| {
            let name = format!("{prefix}{}", key.to_ascii_uppercase());
            lookup(&name).map(|raw| ((*key).to_string(), parse_value(&raw)))
        })
        .collect()
}

/// JSON when it parses, a bare string otherwise.
fn parse_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}

/// Development defaults; tests build on these with struct update syntax.
impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cors_allowed_origins: vec!["*".to_string()],
            cache_enabled: true,
            cache_max_entries: DEFAULT_MAX_ENTRIES,
            cache: CacheConfig::default(),
            ip_filter: IpFilterConfig::default(),
            log_level: "info".to_string(),
            metrics_port: DEFAULT_METRICS_PORT,
        }
    }
}
