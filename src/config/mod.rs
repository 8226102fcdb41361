//! Configuration module for the flashcards backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Longest accepted session lifetime, one year.
const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Human-readable or JSON log lines
    pub log_format: LogFormat,
    /// Lifetime of a login session in hours
    pub session_ttl_hours: i64,
    /// Maximum accepted request body size (applies to card imports)
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();

        let db_path = env::var("FLASHCARDS_DB_PATH")
            .unwrap_or_else(|_| "./data/flashcards.sqlite".to_string())
            .into();

        let bind_addr = env::var("FLASHCARDS_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .map_err(|e| format!("Invalid FLASHCARDS_BIND_ADDR format: {}", e))?;

        let log_level = env::var("FLASHCARDS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_format = match env::var("FLASHCARDS_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("text") | Err(_) => LogFormat::Text,
            Ok(other) => return Err(format!("Invalid FLASHCARDS_LOG_FORMAT: {}", other)),
        };

        let session_ttl_hours =
            check_session_ttl(parse_var("FLASHCARDS_SESSION_TTL_HOURS", 24 * 14)?)?;
        let max_upload_bytes = parse_var("FLASHCARDS_MAX_UPLOAD_BYTES", 5 * 1024 * 1024)?;

        Ok(Self {
            db_path,
            bind_addr,
            log_level,
            log_format,
            session_ttl_hours,
            max_upload_bytes,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| format!("Invalid {}: {}", name, e)),
        Err(_) => Ok(default),
    }
}

fn check_session_ttl(hours: i64) -> Result<i64, String> {
    if (1..=MAX_SESSION_TTL_HOURS).contains(&hours) {
        Ok(hours)
    } else {
        Err(format!(
            "Invalid FLASHCARDS_SESSION_TTL_HOURS: {} (expected 1..={})",
            hours, MAX_SESSION_TTL_HOURS
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        // Clear any existing env vars
        env::remove_var("FLASHCARDS_DB_PATH");
        env::remove_var("FLASHCARDS_BIND_ADDR");
        env::remove_var("FLASHCARDS_LOG_LEVEL");
        env::remove_var("FLASHCARDS_LOG_FORMAT");
        env::remove_var("FLASHCARDS_SESSION_TTL_HOURS");
        env::remove_var("FLASHCARDS_MAX_UPLOAD_BYTES");

        let config = Config::from_env().unwrap();

        assert_eq!(config.db_path, PathBuf::from("./data/flashcards.sqlite"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.session_ttl_hours, 336);
        assert_eq!(config.max_upload_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        env::set_var("FLASHCARDS_TEST_NUMBER", "twelve");
        let parsed: Result<i64, String> = parse_var("FLASHCARDS_TEST_NUMBER", 1);
        assert!(parsed.unwrap_err().contains("FLASHCARDS_TEST_NUMBER"));

        env::set_var("FLASHCARDS_TEST_NUMBER", " 12 ");
        let parsed: Result<i64, String> = parse_var("FLASHCARDS_TEST_NUMBER", 1);
        assert_eq!(parsed.unwrap(), 12);
        env::remove_var("FLASHCARDS_TEST_NUMBER");
    }

    #[test]
    fn test_session_ttl_bounds() {
        assert_eq!(check_session_ttl(1), Ok(1));
        assert_eq!(check_session_ttl(24 * 365), Ok(24 * 365));
        assert!(check_session_ttl(0).is_err());
        assert!(check_session_ttl(-5).is_err());
        assert!(check_session_ttl(i64::MAX).is_err());
    }
}
