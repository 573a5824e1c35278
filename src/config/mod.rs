//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{
    CliArgs, Command, DatabaseOverride, MigrateArgs, PrefetchArgs, ServeArgs, ServeOverrides,
};

use std::{net::SocketAddr, num::NonZeroU32, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "storefront";
const ENV_PREFIX: &str = "STOREFRONT";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_CACHE_MAX_ENTRIES: u64 = 10_000;
const DEFAULT_HIERARCHY_TTL_SECS: u64 = 12 * 60 * 60;
const DEFAULT_COUNT_TTL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_LISTING_TTL_SECS: u64 = 60 * 60;
const DEFAULT_SEARCH_TTL_SECS: u64 = 60 * 60;
const DEFAULT_EMPTY_RESULT_TTL_SECS: u64 = 5 * 60;
const MAX_CACHE_TTL_SECS: u64 = 365 * 24 * 60 * 60;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
const DEFAULT_CATALOG_MAX_REQUESTS: u64 = 100;
const DEFAULT_CART_READ_MAX_REQUESTS: u64 = 60;
const DEFAULT_CART_WRITE_MAX_REQUESTS: u64 = 20;
const DEFAULT_RATE_LIMIT_PURGE_SECS: u64 = 60;
const DEFAULT_CART_MAX_AGE_SECS: u64 = 7 * 24 * 60 * 60;
const DEFAULT_PREFETCH_ORIGIN: &str = "http://127.0.0.1:3000";
const DEFAULT_PREFETCH_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PREFETCH_SEEN_CAPACITY: u64 = 1_000;
const DEFAULT_PREFETCH_LIST_CAPACITY: u64 = 256;
const DEFAULT_PREFETCH_DEBOUNCE_MS: u64 = 150;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub rate_limit: RateLimitSettings,
    pub cart: CartSettings,
    pub prefetch: PrefetchSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub max_entries: NonZeroU32,
    pub hierarchy_ttl: Duration,
    pub count_ttl: Duration,
    pub listing_ttl: Duration,
    pub search_ttl: Duration,
    pub empty_result_ttl: Duration,
}

/// Quota for one limiter class.
#[derive(Debug, Clone)]
pub struct LimiterSettings {
    pub window_seconds: NonZeroU32,
    pub max_requests: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub catalog: LimiterSettings,
    pub cart_read: LimiterSettings,
    pub cart_write: LimiterSettings,
    pub purge_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct CartSettings {
    pub secure_cookie: bool,
    pub max_age: Duration,
}

#[derive(Debug, Clone)]
pub struct PrefetchSettings {
    pub origin_url: String,
    pub timeout: Duration,
    pub seen_capacity: NonZeroU32,
    pub list_capacity: NonZeroU32,
    pub debounce: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Migrate(args)) => raw.apply_database_override(&args.database),
        Some(Command::Prefetch(_)) => {}
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    rate_limit: RawRateLimitSettings,
    cart: RawCartSettings,
    prefetch: RawPrefetchSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(max) = overrides.cache_max_entries {
            self.cache.max_entries = Some(max);
        }
        if let Some(secure) = overrides.cart_secure_cookie {
            self.cart.secure_cookie = Some(secure);
        }
        if let Some(origin) = overrides.prefetch_origin_url.as_ref() {
            self.prefetch.origin_url = Some(origin.clone());
        }
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            cache,
            rate_limit,
            cart,
            prefetch,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            cache: build_cache_settings(cache)?,
            rate_limit: build_rate_limit_settings(rate_limit)?,
            cart: build_cart_settings(cart)?,
            prefetch: build_prefetch_settings(prefetch)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr =
        parse_socket_addr(&host, port).map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_shutdown = positive_secs(
        server.graceful_shutdown_seconds,
        DEFAULT_GRACEFUL_SHUTDOWN_SECS,
        "server.graceful_shutdown_seconds",
    )?;

    Ok(ServerSettings {
        addr,
        graceful_shutdown,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        max_entries: non_zero_u32(
            cache.max_entries.unwrap_or(DEFAULT_CACHE_MAX_ENTRIES),
            "cache.max_entries",
        )?,
        hierarchy_ttl: cache_ttl(
            cache.hierarchy_ttl_seconds,
            DEFAULT_HIERARCHY_TTL_SECS,
            "cache.hierarchy_ttl_seconds",
        )?,
        count_ttl: cache_ttl(
            cache.count_ttl_seconds,
            DEFAULT_COUNT_TTL_SECS,
            "cache.count_ttl_seconds",
        )?,
        listing_ttl: cache_ttl(
            cache.listing_ttl_seconds,
            DEFAULT_LISTING_TTL_SECS,
            "cache.listing_ttl_seconds",
        )?,
        search_ttl: cache_ttl(
            cache.search_ttl_seconds,
            DEFAULT_SEARCH_TTL_SECS,
            "cache.search_ttl_seconds",
        )?,
        empty_result_ttl: cache_ttl(
            cache.empty_result_ttl_seconds,
            DEFAULT_EMPTY_RESULT_TTL_SECS,
            "cache.empty_result_ttl_seconds",
        )?,
    })
}

fn build_limiter_settings(
    raw: RawLimiterSettings,
    default_max_requests: u64,
    window_key: &'static str,
    max_key: &'static str,
) -> Result<LimiterSettings, LoadError> {
    Ok(LimiterSettings {
        window_seconds: non_zero_u32(
            raw.window_seconds.unwrap_or(DEFAULT_RATE_LIMIT_WINDOW_SECS),
            window_key,
        )?,
        max_requests: non_zero_u32(raw.max_requests.unwrap_or(default_max_requests), max_key)?,
    })
}

fn build_rate_limit_settings(
    rate_limit: RawRateLimitSettings,
) -> Result<RateLimitSettings, LoadError> {
    Ok(RateLimitSettings {
        catalog: build_limiter_settings(
            rate_limit.catalog,
            DEFAULT_CATALOG_MAX_REQUESTS,
            "rate_limit.catalog.window_seconds",
            "rate_limit.catalog.max_requests",
        )?,
        cart_read: build_limiter_settings(
            rate_limit.cart_read,
            DEFAULT_CART_READ_MAX_REQUESTS,
            "rate_limit.cart_read.window_seconds",
            "rate_limit.cart_read.max_requests",
        )?,
        cart_write: build_limiter_settings(
            rate_limit.cart_write,
            DEFAULT_CART_WRITE_MAX_REQUESTS,
            "rate_limit.cart_write.window_seconds",
            "rate_limit.cart_write.max_requests",
        )?,
        purge_interval: positive_secs(
            rate_limit.purge_interval_seconds,
            DEFAULT_RATE_LIMIT_PURGE_SECS,
            "rate_limit.purge_interval_seconds",
        )?,
    })
}

fn build_cart_settings(cart: RawCartSettings) -> Result<CartSettings, LoadError> {
    let max_age = positive_secs(
        cart.max_age_seconds,
        DEFAULT_CART_MAX_AGE_SECS,
        "cart.max_age_seconds",
    )?;
    i64::try_from(max_age.as_secs()).map_err(|_| {
        LoadError::invalid(
            "cart.max_age_seconds",
            "value exceeds supported range for i64",
        )
    })?;

    Ok(CartSettings {
        secure_cookie: cart.secure_cookie.unwrap_or(true),
        max_age,
    })
}

fn build_prefetch_settings(prefetch: RawPrefetchSettings) -> Result<PrefetchSettings, LoadError> {
    let origin_url = prefetch
        .origin_url
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| DEFAULT_PREFETCH_ORIGIN.to_string());
    url::Url::parse(&origin_url).map_err(|err| {
        LoadError::invalid("prefetch.origin_url", format!("invalid url `{origin_url}`: {err}"))
    })?;

    let debounce_ms = prefetch.debounce_ms.unwrap_or(DEFAULT_PREFETCH_DEBOUNCE_MS);

    Ok(PrefetchSettings {
        origin_url,
        timeout: positive_secs(
            prefetch.timeout_seconds,
            DEFAULT_PREFETCH_TIMEOUT_SECS,
            "prefetch.timeout_seconds",
        )?,
        seen_capacity: non_zero_u32(
            prefetch
                .seen_capacity
                .unwrap_or(DEFAULT_PREFETCH_SEEN_CAPACITY),
            "prefetch.seen_capacity",
        )?,
        list_capacity: non_zero_u32(
            prefetch
                .list_capacity
                .unwrap_or(DEFAULT_PREFETCH_LIST_CAPACITY),
            "prefetch.list_capacity",
        )?,
        debounce: Duration::from_millis(debounce_ms),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    max_entries: Option<u64>,
    hierarchy_ttl_seconds: Option<u64>,
    count_ttl_seconds: Option<u64>,
    listing_ttl_seconds: Option<u64>,
    search_ttl_seconds: Option<u64>,
    empty_result_ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLimiterSettings {
    window_seconds: Option<u64>,
    max_requests: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRateLimitSettings {
    catalog: RawLimiterSettings,
    cart_read: RawLimiterSettings,
    cart_write: RawLimiterSettings,
    purge_interval_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCartSettings {
    secure_cookie: Option<bool>,
    max_age_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPrefetchSettings {
    origin_url: Option<String>,
    timeout_seconds: Option<u64>,
    seen_capacity: Option<u64>,
    list_capacity: Option<u64>,
    debounce_ms: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn positive_secs(value: Option<u64>, default: u64, key: &'static str) -> Result<Duration, LoadError> {
    match value.unwrap_or(default) {
        0 => Err(LoadError::invalid(key, "must be greater than zero")),
        secs => Ok(Duration::from_secs(secs)),
    }
}

fn cache_ttl(value: Option<u64>, default: u64, key: &'static str) -> Result<Duration, LoadError> {
    let ttl = positive_secs(value, default, key)?;
    if ttl.as_secs() > MAX_CACHE_TTL_SECS {
        return Err(LoadError::invalid(key, "must not exceed one year"));
    }
    Ok(ttl)
}
