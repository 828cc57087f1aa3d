//! Configuration for the OAuth authorization server.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, bail};
use rand::RngCore;

use crate::server::oauth::GrantSettings;
use crate::token::MIN_SECRET_LEN;

/// Default values, overridable through the environment.
pub mod defaults {
    use std::time::Duration;

    pub const PORT: u16 = 8080;

    pub const JWT_ISSUER: &str = "oauth-core";

    /// Access token lifetime (1 hour).
    pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(3600);

    /// Refresh token lifetime (30 days).
    pub const REFRESH_TOKEN_TTL: Duration = Duration::from_secs(2_592_000);

    /// Authorization code lifetime (10 minutes).
    pub const AUTH_CODE_TTL: Duration = Duration::from_secs(600);

    /// Bound on every store and cache call.
    pub const STORE_TIMEOUT: Duration = Duration::from_millis(3000);

    pub const RATE_LIMIT_RPS: u32 = 100;

    pub const AUDIT_QUEUE_CAPACITY: usize = 1024;

    pub const AUDIT_WORKERS: usize = 2;

    pub const DB_MAX_CONNECTIONS: u32 = 10;

    /// Interval between expired code/token prunes.
    pub const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(300);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" | "test" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("unknown APP_ENV: {other}")),
        }
    }
}

/// Server configuration.
#[derive(Clone)]
pub struct Config {
    pub environment: Environment,

    pub port: u16,

    /// Public base URL advertised in the metadata document.
    pub base_url: String,

    /// HMAC signing secret. Required in production.
    pub jwt_secret: Option<String>,

    pub jwt_issuer: String,

    pub access_token_ttl: Duration,

    pub refresh_token_ttl: Duration,

    pub auth_code_ttl: Duration,

    pub store_timeout: Duration,

    /// PostgreSQL store when set, in-memory otherwise.
    pub database_url: Option<String>,

    pub db_max_connections: u32,

    /// Redis revocation ledger when set, in-process otherwise.
    pub redis_url: Option<String>,

    pub rate_limit_rps: u32,

    pub audit_queue_capacity: usize,

    pub audit_workers: usize,

    pub rotate_refresh_tokens: bool,

    pub maintenance_interval: Duration,
}

impl Config {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns error if a variable is set but cannot be parsed.
    pub fn from_env() -> anyhow::Result<Self> {
        let port = env_parse("PORT", defaults::PORT)?;
        Ok(Self {
            environment: env_parse("APP_ENV", Environment::Development)?,
            port,
            base_url: env_var("BASE_URL").unwrap_or_else(|| format!("http://localhost:{port}")),
            jwt_secret: env_var("JWT_SECRET"),
            jwt_issuer: env_var("JWT_ISSUER").unwrap_or_else(|| defaults::JWT_ISSUER.to_owned()),
            access_token_ttl: env_secs("OAUTH_ACCESS_TOKEN_EXPIRY", defaults::ACCESS_TOKEN_TTL)?,
            refresh_token_ttl: env_secs("OAUTH_REFRESH_TOKEN_EXPIRY", defaults::REFRESH_TOKEN_TTL)?,
            auth_code_ttl: env_secs("AUTH_CODE_TTL", defaults::AUTH_CODE_TTL)?,
            store_timeout: Duration::from_millis(env_parse(
                "STORE_TIMEOUT_MS",
                defaults::STORE_TIMEOUT.as_millis() as u64,
            )?),
            database_url: env_var("DATABASE_URL"),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", defaults::DB_MAX_CONNECTIONS)?,
            redis_url: env_var("REDIS_URL"),
            rate_limit_rps: env_parse("RATE_LIMIT_RPS", defaults::RATE_LIMIT_RPS)?,
            audit_queue_capacity: env_parse(
                "AUDIT_QUEUE_CAPACITY",
                defaults::AUDIT_QUEUE_CAPACITY,
            )?,
            audit_workers: env_parse("AUDIT_WORKERS", defaults::AUDIT_WORKERS)?,
            rotate_refresh_tokens: env_parse("ROTATE_REFRESH_TOKENS", false)?,
            maintenance_interval: env_secs("MAINTENANCE_INTERVAL", defaults::MAINTENANCE_INTERVAL)?,
        })
    }

    /// Deterministic configuration for tests: fixed secret, in-memory backends.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            environment: Environment::Development,
            port: 0,
            base_url: "http://localhost".to_owned(),
            jwt_secret: Some("test-secret-that-is-at-least-32-bytes-long".to_owned()),
            jwt_issuer: defaults::JWT_ISSUER.to_owned(),
            access_token_ttl: defaults::ACCESS_TOKEN_TTL,
            refresh_token_ttl: defaults::REFRESH_TOKEN_TTL,
            auth_code_ttl: defaults::AUTH_CODE_TTL,
            store_timeout: Duration::from_secs(1),
            database_url: None,
            db_max_connections: 2,
            redis_url: None,
            rate_limit_rps: 10_000,
            audit_queue_capacity: 64,
            audit_workers: 1,
            rotate_refresh_tokens: false,
            maintenance_interval: defaults::MAINTENANCE_INTERVAL,
        }
    }

    /// Reject configurations that must not reach request time.
    ///
    /// # Errors
    ///
    /// Returns error for a missing production secret, a short secret, or zero lifetimes.
    pub fn validate(&self) -> anyhow::Result<()> {
        match (&self.jwt_secret, self.environment) {
            (None, Environment::Production) => bail!("JWT_SECRET is required in production"),
            (Some(secret), _) if secret.len() < MIN_SECRET_LEN => {
                bail!("JWT_SECRET must be at least {MIN_SECRET_LEN} bytes")
            }
            _ => {}
        }
        for (name, ttl) in [
            ("OAUTH_ACCESS_TOKEN_EXPIRY", self.access_token_ttl),
            ("OAUTH_REFRESH_TOKEN_EXPIRY", self.refresh_token_ttl),
            ("AUTH_CODE_TTL", self.auth_code_ttl),
            ("STORE_TIMEOUT_MS", self.store_timeout),
        ] {
            if ttl.is_zero() {
                bail!("{name} must be greater than zero");
            }
        }
        Ok(())
    }

    /// The configured signing secret, or a random one for development.
    ///
    /// A random secret invalidates every token on restart.
    #[must_use]
    pub fn signing_secret(&self) -> Vec<u8> {
        if let Some(secret) = &self.jwt_secret {
            return secret.as_bytes().to_vec();
        }
        tracing::warn!("JWT_SECRET not set, using an ephemeral development secret");
        let mut secret = vec![0u8; MIN_SECRET_LEN * 2];
        rand::thread_rng().fill_bytes(&mut secret);
        secret
    }

    /// Lifetimes and policy for the grant flows.
    ///
    /// # Errors
    ///
    /// Returns error if a lifetime does not fit a signed duration.
    pub fn grant_settings(&self) -> anyhow::Result<GrantSettings> {
        let ttl = |d: Duration| chrono::Duration::from_std(d).context("lifetime out of range");
        Ok(GrantSettings {
            access_token_ttl: ttl(self.access_token_ttl)?,
            refresh_token_ttl: ttl(self.refresh_token_ttl)?,
            code_ttl: ttl(self.auth_code_ttl)?,
            store_timeout: self.store_timeout,
            rotate_refresh_tokens: self.rotate_refresh_tokens,
        })
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("environment", &self.environment)
            .field("port", &self.port)
            .field("base_url", &self.base_url)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("jwt_issuer", &self.jwt_issuer)
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("auth_code_ttl", &self.auth_code_ttl)
            .field("store_timeout", &self.store_timeout)
            .field("database", &self.database_url.is_some())
            .field("redis", &self.redis_url.is_some())
            .field("rate_limit_rps", &self.rate_limit_rps)
            .field("rotate_refresh_tokens", &self.rotate_refresh_tokens)
            .finish_non_exhaustive()
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(name) {
        Some(raw) => raw.trim().parse().map_err(|e| anyhow::anyhow!("invalid {name}: {e}")),
        None => Ok(default),
    }
}

fn env_secs(name: &str, default: Duration) -> anyhow::Result<Duration> {
    env_parse(name, default.as_secs()).map(Duration::from_secs)
}
