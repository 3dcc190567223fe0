use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use thiserror::Error;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub max_connections: usize,
    pub keep_alive_seconds: u64,
    pub client_timeout_seconds: u64,
    pub client_shutdown_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: usize,
    pub connect_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub refresh_token_expiration_days: i64,
    pub bcrypt_cost: u32,
    pub max_login_attempts: i32,
    pub lockout_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub cors_allowed_origins: Vec<String>,
    pub rate_limit_requests: u32,
    pub rate_limit_window_seconds: u64,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} must be a valid number, got {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("JWT_SECRET must be at least {min} bytes long")]
    WeakSecret { min: usize },
}

const MIN_JWT_SECRET_LEN: usize = 16;

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parsed<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

fn string_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn comma_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = required("JWT_SECRET")?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::WeakSecret { min: MIN_JWT_SECRET_LEN });
        }

        Ok(Self {
            server: ServerConfig {
                host: string_or("HOST", "127.0.0.1"),
                port: parsed("PORT", 8080)?,
                workers: parsed("WORKERS", 4)?,
                max_connections: parsed("MAX_CONNECTIONS", 1000)?,
                keep_alive_seconds: parsed("KEEP_ALIVE_SECONDS", 75)?,
                client_timeout_seconds: parsed("CLIENT_TIMEOUT_SECONDS", 30)?,
                client_shutdown_seconds: parsed("CLIENT_SHUTDOWN_SECONDS", 5)?,
            },
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                max_connections: parsed("DB_MAX_CONNECTIONS", 10)?,
                connect_timeout_seconds: parsed("DB_CONNECT_TIMEOUT", 10)?,
                idle_timeout_seconds: parsed("DB_IDLE_TIMEOUT", 300)?,
            },
            auth: AuthConfig {
                jwt_secret,
                jwt_expiration_hours: parsed("JWT_EXPIRATION_HOURS", 24)?,
                refresh_token_expiration_days: parsed("REFRESH_TOKEN_EXPIRATION_DAYS", 7)?,
                bcrypt_cost: parsed("BCRYPT_COST", 12)?,
                max_login_attempts: parsed("MAX_LOGIN_ATTEMPTS", 5)?,
                lockout_minutes: parsed("LOCKOUT_MINUTES", 15)?,
            },
            security: SecurityConfig {
                cors_allowed_origins: comma_list(&string_or(
                    "CORS_ALLOWED_ORIGINS",
                    "http://localhost:3000,http://127.0.0.1:3000",
                )),
                rate_limit_requests: parsed("RATE_LIMIT_REQUESTS", 100)?,
                rate_limit_window_seconds: parsed("RATE_LIMIT_WINDOW_SECONDS", 60)?,
                max_request_size_bytes: parsed("MAX_REQUEST_SIZE_BYTES", 1_048_576)?, // 1MB
            },
            logging: LoggingConfig {
                level: string_or("LOG_LEVEL", "info"),
                directory: string_or("LOG_DIRECTORY", "logs"),
            },
        })
    }
}

impl AuthConfig {
    /// Settings suitable for tests: a cheap bcrypt cost and a fixed secret.
    pub fn for_tests() -> Self {
        Self {
            jwt_secret: "agriloop-test-secret-0123456789".to_string(),
            jwt_expiration_hours: 1,
            refresh_token_expiration_days: 1,
            bcrypt_cost: 4,
            max_login_attempts: 5,
            lockout_minutes: 15,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_list_trims_and_skips_empty_entries() {
        assert_eq!(
            comma_list(" http://a.test , ,http://b.test,"),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
    }

    #[test]
    fn parsed_reports_the_offending_variable() {
        env::set_var("AGRILOOP_TEST_PORT", "eighty");
        let err = parsed::<u16>("AGRILOOP_TEST_PORT", 8080).unwrap_err();
        assert_eq!(err.to_string(), "AGRILOOP_TEST_PORT must be a valid number, got \"eighty\"");
        env::remove_var("AGRILOOP_TEST_PORT");

        assert_eq!(parsed::<u16>("AGRILOOP_TEST_PORT", 8080).unwrap(), 8080);
    }
}
