use std::net::{AddrParseError, SocketAddr};
use std::num::ParseIntError;
use std::time::Duration;

use url::Url;

pub const DEFAULT_GENERATION_URL: &str = "http://localhost:11434/api/generate";
pub const DEFAULT_MODEL: &str = "llama3";
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_CATALOG_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_POOL_TIMEOUT_SECS: u64 = 5;
/// Upper bound for every `*_TIMEOUT_SECS` setting: one day.
pub const MAX_TIMEOUT_SECS: u64 = 86_400;
pub const DEFAULT_DB_PORT: u16 = 5432;

/// Everything the process needs to know about its collaborators.
/// Read once at startup and handed by reference to whatever needs it; never reloaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Postgres connection URL.
    pub database_url: String,
    /// Full URL of the `/api/generate` endpoint.
    pub generation_url: Url,
    /// Model identifier sent with every generation request.
    pub model: String,
    pub generation_timeout: Duration,
    pub catalog_timeout: Duration,
    pub query_timeout: Duration,
    /// How long a request waits for a free database connection.
    pub pool_timeout: Duration,
    /// Where the API server listens.
    pub bind_address: SocketAddr,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DATABASE_URL is not set and {0} is missing to assemble one from the DB_* variables")]
    MissingDatabaseUrl(&'static str),
    #[error("Invalid {name}: {source}")]
    InvalidUrl {
        name: &'static str,
        source: url::ParseError,
    },
    #[error("{0} can't be used in a database URL")]
    InvalidDatabasePart(&'static str),
    #[error("{name} must be a number of seconds between 1 and {max}, got '{value}'", max = MAX_TIMEOUT_SECS)]
    InvalidTimeout { name: &'static str, value: String },
    #[error("Invalid port: {0}")]
    InvalidPort(#[from] ParseIntError),
    #[error("Invalid hostname: {0}")]
    InvalidHostname(#[from] AddrParseError),
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let database_url = match var("DATABASE_URL") {
            Some(url) => url,
            None => assemble_database_url(&var)?,
        };

        let generation_url = var("GENERATION_API_URL").unwrap_or_else(|| DEFAULT_GENERATION_URL.to_string());
        let generation_url = Url::parse(generation_url.trim()).map_err(|source| ConfigError::InvalidUrl {
            name: "GENERATION_API_URL",
            source,
        })?;

        let model = var("GENERATION_MODEL")
            .map(|m| m.trim().to_string())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let host = var("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = match var("PORT") {
            Some(p) => p.trim().parse::<u16>()?,
            None => 3000,
        };
        let bind_address = format!("{}:{}", host.trim(), port).parse::<SocketAddr>()?;

        Ok(Self {
            database_url,
            generation_url,
            model,
            generation_timeout: timeout_secs(&var, "GENERATION_TIMEOUT_SECS", DEFAULT_GENERATION_TIMEOUT_SECS)?,
            catalog_timeout: timeout_secs(&var, "CATALOG_TIMEOUT_SECS", DEFAULT_CATALOG_TIMEOUT_SECS)?,
            query_timeout: timeout_secs(&var, "QUERY_TIMEOUT_SECS", DEFAULT_QUERY_TIMEOUT_SECS)?,
            pool_timeout: timeout_secs(&var, "POOL_TIMEOUT_SECS", DEFAULT_POOL_TIMEOUT_SECS)?,
            bind_address,
        })
    }
}

fn timeout_secs<F>(var: &F, name: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs = match var(name) {
        Some(value) => match value.trim().parse::<u64>() {
            Ok(secs) if (1..=MAX_TIMEOUT_SECS).contains(&secs) => secs,
            _ => return Err(ConfigError::InvalidTimeout { name, value }),
        },
        None => default,
    };
    Ok(Duration::from_secs(secs))
}

/// `postgres://DB_USER:DB_PASSWORD@DB_HOST:DB_PORT/DB_NAME`, with user and password percent-encoded.
fn assemble_database_url<F>(var: &F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let required = |name: &'static str| var(name).ok_or(ConfigError::MissingDatabaseUrl(name));
    let host = required("DB_HOST")?;
    let user = required("DB_USER")?;
    let name = required("DB_NAME")?;
    let password = var("DB_PASSWORD");
    let port = match var("DB_PORT") {
        Some(p) => p.trim().parse::<u16>()?,
        None => DEFAULT_DB_PORT,
    };

    let mut url = Url::parse(&format!("postgres://{}:{}/", host.trim(), port))
        .map_err(|source| ConfigError::InvalidUrl { name: "DB_HOST", source })?;
    url.set_username(user.trim())
        .map_err(|_| ConfigError::InvalidDatabasePart("DB_USER"))?;
    url.set_password(password.as_deref())
        .map_err(|_| ConfigError::InvalidDatabasePart("DB_PASSWORD"))?;
    url.set_path(name.trim());
    Ok(url.to_string())
}
