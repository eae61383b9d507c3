//! Process configuration, read once from the environment at startup.

use std::net::SocketAddr;

use thiserror::Error;
use tracing::warn;

const DEV_JWT_SECRET: &str = "dev-secret";
const DEV_ADMIN_PASSWORD: &str = "admin123";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Where events are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persistence {
    InMemory,
    Postgres { database_url: String },
}

/// Account created at startup when no user with this e-mail exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminBootstrap {
    pub email: String,
    pub password: String,
    pub name: String,
    /// Set when the password is the built-in development default.
    pub must_change_password: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
    pub stock_max_attempts: u32,
    pub admin: AdminBootstrap,
    pub persistence: Persistence,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr: SocketAddr = parse_or("OFICINA_BIND_ADDR", &lookup, "0.0.0.0:8080".parse().ok())?;

        let jwt_secret = lookup("JWT_SECRET").filter(|s| !s.is_empty()).unwrap_or_else(|| {
            warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let token_ttl_minutes: i64 = parse_or("OFICINA_TOKEN_TTL_MINUTES", &lookup, Some(480))?;
        if token_ttl_minutes <= 0 {
            return Err(invalid("OFICINA_TOKEN_TTL_MINUTES", token_ttl_minutes, "must be positive"));
        }

        let stock_max_attempts: u32 = parse_or("OFICINA_STOCK_MAX_ATTEMPTS", &lookup, Some(3))?;
        if stock_max_attempts == 0 {
            return Err(invalid("OFICINA_STOCK_MAX_ATTEMPTS", stock_max_attempts, "must be at least 1"));
        }

        let admin_password = lookup("OFICINA_ADMIN_PASSWORD").filter(|s| !s.is_empty());
        let must_change_password = admin_password.is_none();
        if must_change_password {
            warn!("OFICINA_ADMIN_PASSWORD not set; bootstrap admin gets the dev default and must change it");
        }
        let admin = AdminBootstrap {
            email: lookup("OFICINA_ADMIN_EMAIL").unwrap_or_else(|| "admin@oficina.local".to_string()),
            password: admin_password.unwrap_or_else(|| DEV_ADMIN_PASSWORD.to_string()),
            name: lookup("OFICINA_ADMIN_NAME").unwrap_or_else(|| "Administrador".to_string()),
            must_change_password,
        };

        let use_persistent: bool = parse_or("USE_PERSISTENT_STORES", &lookup, Some(false))?;
        let persistence = if use_persistent {
            let database_url = lookup("DATABASE_URL")
                .filter(|s| !s.is_empty())
                .ok_or(ConfigError::Missing("DATABASE_URL"))?;
            Persistence::Postgres { database_url }
        } else {
            Persistence::InMemory
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            token_ttl_minutes,
            stock_max_attempts,
            admin,
            persistence,
        })
    }
}

fn parse_or<T>(key: &'static str, lookup: &impl Fn(&str) -> Option<String>, default: Option<T>) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).filter(|raw| !raw.trim().is_empty()) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => default.ok_or(ConfigError::Missing(key)),
    }
}

fn invalid(key: &'static str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
