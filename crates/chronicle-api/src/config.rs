//! Process configuration read from environment variables.

use chronicle_core::codec::{CodecOptions, NamingPolicy};
use chronicle_core::seeding::SeedVerification;

use crate::error::AppError;

/// Runtime configuration for the API server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// `PostgreSQL` connection string (`DATABASE_URL`).
    pub database_url: String,
    /// Bind address (`HOST`).
    pub host: String,
    /// Bind port (`PORT`).
    pub port: u16,
    /// Pool size (`DATABASE_MAX_CONNECTIONS`).
    pub max_connections: u32,
    /// Run the seeding orchestrator before serving (`SEED_ON_STARTUP`).
    pub seed_on_startup: bool,
    /// Prefix check used while seeding (`SEED_VERIFY_PREFIX`).
    pub seed_verification: SeedVerification,
    /// Serializer settings (`CODEC_NAMING_POLICY`, `CODEC_OMIT_NULL_FIELDS`).
    pub codec: CodecOptions,
}

impl AppConfig {
    /// Reads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required variable is missing or a
    /// value cannot be parsed.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required variable is missing or a
    /// value cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or_else(|| {
            AppError::Config("DATABASE_URL environment variable must be set".into())
        })?;
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_owned());
        let port = parse_or(&lookup, "PORT", 3000_u16)?;
        let max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10_u32)?;
        let seed_on_startup = parse_bool_or(&lookup, "SEED_ON_STARTUP", true)?;
        let seed_verification = if parse_bool_or(&lookup, "SEED_VERIFY_PREFIX", false)? {
            SeedVerification::Digest
        } else {
            SeedVerification::Trust
        };
        let naming_policy = match lookup("CODEC_NAMING_POLICY").as_deref() {
            None | Some("preserve") => NamingPolicy::Preserve,
            Some("camel_case") => NamingPolicy::CamelCase,
            Some(other) => {
                return Err(AppError::Config(format!(
                    "CODEC_NAMING_POLICY must be `preserve` or `camel_case`, got `{other}`"
                )));
            }
        };
        let omit_null_fields = parse_bool_or(&lookup, "CODEC_OMIT_NULL_FIELDS", false)?;

        Ok(Self {
            database_url,
            host,
            port,
            max_connections,
            seed_on_startup,
            seed_verification,
            codec: CodecOptions {
                naming_policy,
                omit_null_fields,
            },
        })
    }

    /// `HOST:PORT` for binding the listener.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} is invalid: {e}"))),
    }
}

fn parse_bool_or<F>(lookup: &F, key: &str, default: bool) -> Result<bool, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).as_deref().map(str::trim) {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(AppError::Config(format!(
            "{key} must be a boolean, got `{other}`"
        ))),
    }
}
