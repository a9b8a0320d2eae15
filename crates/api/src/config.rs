//! Server configuration from environment variables.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use catalog_infra::db::PoolSettings;

pub const DEFAULT_PORT: u16 = 4000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 25;
pub const DEFAULT_DB_TIMEOUT_SECS: u64 = 3;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}: {expected}")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("DATABASE_URL must be set in production")]
    MissingDatabaseUrl,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub environment: Environment,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_timeout: Duration,
    /// `None` disables the rating sweep.
    pub rating_sweep_interval: Option<Duration>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let port = parse_or(get("PORT"), "PORT", DEFAULT_PORT, "a port number")?;
        let environment = parse_or(
            get("APP_ENV"),
            "APP_ENV",
            Environment::Development,
            "one of development, staging, production",
        )?;

        let database_url = get("DATABASE_URL");
        if database_url.is_none() {
            if environment == Environment::Production {
                return Err(ConfigError::MissingDatabaseUrl);
            }
            warn!("DATABASE_URL not set; catalog data will be kept in memory");
        }

        let db_max_connections = parse_or(
            get("DB_MAX_CONNECTIONS"),
            "DB_MAX_CONNECTIONS",
            DEFAULT_DB_MAX_CONNECTIONS,
            "a positive integer",
        )?;
        if db_max_connections == 0 {
            return Err(ConfigError::Invalid {
                var: "DB_MAX_CONNECTIONS",
                value: "0".to_string(),
                expected: "a positive integer",
            });
        }

        let db_timeout_secs: u64 = parse_or(
            get("DB_TIMEOUT_SECS"),
            "DB_TIMEOUT_SECS",
            DEFAULT_DB_TIMEOUT_SECS,
            "a whole number of seconds",
        )?;
        let sweep_secs: u64 = parse_or(
            get("RATING_SWEEP_SECS"),
            "RATING_SWEEP_SECS",
            0,
            "a whole number of seconds",
        )?;

        Ok(Self {
            port,
            environment,
            database_url,
            db_max_connections,
            db_timeout: Duration::from_secs(db_timeout_secs.max(1)),
            rating_sweep_interval: (sweep_secs > 0).then(|| Duration::from_secs(sweep_secs)),
        })
    }

    pub fn pool_settings(&self) -> Option<PoolSettings> {
        self.database_url.as_ref().map(|url| {
            let mut settings = PoolSettings::new(url.clone());
            settings.max_connections = self.db_max_connections;
            settings.operation_timeout = self.db_timeout;
            settings
        })
    }
}

fn parse_or<T: FromStr + fmt::Debug>(
    raw: Option<String>,
    var: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError> {
    match raw {
        None => {
            warn!(var, default = ?default, "environment variable not set; using default");
            Ok(default)
        }
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            var,
            value,
            expected,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.port, 4000);
        assert_eq!(cfg.environment, Environment::Development);
        assert_eq!(cfg.database_url, None);
        assert_eq!(cfg.db_max_connections, 25);
        assert_eq!(cfg.db_timeout, Duration::from_secs(3));
        assert_eq!(cfg.rating_sweep_interval, None);
        assert!(cfg.pool_settings().is_none());
    }

    #[test]
    fn explicit_values_are_used() {
        let cfg = config(&[
            ("PORT", "8080"),
            ("APP_ENV", "staging"),
            ("DATABASE_URL", "postgres://catalog@localhost/catalog"),
            ("DB_MAX_CONNECTIONS", "5"),
            ("DB_TIMEOUT_SECS", "7"),
            ("RATING_SWEEP_SECS", "60"),
        ])
        .unwrap();

        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.environment, Environment::Staging);
        assert_eq!(cfg.rating_sweep_interval, Some(Duration::from_secs(60)));

        let pool = cfg.pool_settings().unwrap();
        assert_eq!(pool.database_url, "postgres://catalog@localhost/catalog");
        assert_eq!(pool.max_connections, 5);
        assert_eq!(pool.operation_timeout, Duration::from_secs(7));
    }

    #[test]
    fn unknown_environment_is_rejected() {
        let err = config(&[("APP_ENV", "prod")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "APP_ENV", .. }));
    }

    #[test]
    fn malformed_port_is_rejected() {
        let err = config(&[("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "PORT", .. }));
    }

    #[test]
    fn production_requires_a_database() {
        assert_eq!(
            config(&[("APP_ENV", "production")]).unwrap_err(),
            ConfigError::MissingDatabaseUrl
        );
        assert!(
            config(&[("APP_ENV", "production"), ("DATABASE_URL", "postgres://db/catalog")]).is_ok()
        );
    }

    #[test]
    fn empty_values_count_as_unset() {
        let cfg = config(&[("PORT", ""), ("DATABASE_URL", "  ")]).unwrap();
        assert_eq!(cfg.port, 4000);
        assert_eq!(cfg.database_url, None);
    }
}
