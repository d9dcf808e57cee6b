use dotenvy::dotenv;
use std::fmt;
use std::str::FromStr;

use crate::db::DbConfig;
use crate::error::AppError;

/// Where polls and ballots live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    /// In-process store; state is lost on restart
    Memory,
}

impl FromStr for StoreBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(AppError::Config(format!(
                "STORE_BACKEND must be 'postgres' or 'memory', got '{other}'"
            ))),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub store_backend: StoreBackend,
    /// Present when `store_backend` is Postgres
    pub database: Option<DbConfig>,
    pub jwt_secret: String,
    /// Empty means any origin
    pub cors_allowed_origins: Vec<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("store_backend", &self.store_backend)
            .field("database", &self.database)
            .field("jwt_secret", &"[REDACTED]")
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .finish()
    }
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AppError::Config("JWT_SECRET is not defined".into()))?;

        let store_backend = match lookup("STORE_BACKEND") {
            Some(value) => value.parse()?,
            None => StoreBackend::Postgres,
        };

        let database = match store_backend {
            StoreBackend::Memory => None,
            StoreBackend::Postgres => {
                let defaults = DbConfig::default();
                let database_url = lookup("DATABASE_URL")
                    .ok_or_else(|| AppError::Config("DATABASE_URL missing".into()))?;
                Some(DbConfig {
                    database_url,
                    max_connections: parse_or(lookup("DB_MAX_CONNECTIONS"), defaults.max_connections),
                    min_connections: parse_or(lookup("DB_MIN_CONNECTIONS"), defaults.min_connections),
                    acquire_timeout_secs: parse_or(
                        lookup("DB_ACQUIRE_TIMEOUT_SECS"),
                        defaults.acquire_timeout_secs,
                    ),
                    idle_timeout_secs: parse_or(
                        lookup("DB_IDLE_TIMEOUT_SECS"),
                        defaults.idle_timeout_secs,
                    ),
                })
            }
        };

        Ok(Self {
            port: parse_or(lookup("PORT"), 5000),
            store_backend,
            database,
            jwt_secret,
            cors_allowed_origins: lookup("CORS_ALLOWED_ORIGINS")
                .map(|v| parse_list(&v))
                .unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_memory_backend_needs_no_database() {
        let cfg = Config::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("STORE_BACKEND", "memory"),
        ]))
        .unwrap();
        assert_eq!(cfg.store_backend, StoreBackend::Memory);
        assert!(cfg.database.is_none());
        assert_eq!(cfg.port, 5000);
        assert!(cfg.cors_allowed_origins.is_empty());
    }

    #[test]
    fn test_postgres_is_default_and_requires_url() {
        let err = Config::from_lookup(lookup(&[("JWT_SECRET", "s3cret")])).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));

        let cfg = Config::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("DATABASE_URL", "postgres://localhost/polls"),
            ("DB_MAX_CONNECTIONS", "4"),
            ("PORT", "8080"),
            ("CORS_ALLOWED_ORIGINS", "https://a.example, ,https://b.example"),
        ]))
        .unwrap();
        let db = cfg.database.unwrap();
        assert_eq!(db.max_connections, 4);
        assert_eq!(db.min_connections, DbConfig::default().min_connections);
        assert_eq!(cfg.port, 8080);
        assert_eq!(
            cfg.cors_allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn test_missing_secret_is_rejected() {
        let err = Config::from_lookup(lookup(&[("STORE_BACKEND", "memory")])).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        assert!("redis".parse::<StoreBackend>().is_err());
        assert_eq!("Postgres".parse::<StoreBackend>().unwrap(), StoreBackend::Postgres);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let cfg = Config::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("DATABASE_URL", "postgres://user:pw@localhost/polls"),
        ]))
        .unwrap();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("s3cret"));
        assert!(!rendered.contains("pw@"));
    }
}
