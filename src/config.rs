use std::env;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}, expected compact/json")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub event_buffer_size: usize,
    pub upload_dir: String,
    pub upload_base_url: String,
    pub max_upload_bytes: usize,
    pub order_number_prefix: String,
    pub loyalty_point_rate: f64,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", defaults.http_port)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format: parse_or_default("LOG_FORMAT", defaults.log_format)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", defaults.event_buffer_size)?,
            upload_dir: env::var("UPLOAD_DIR").unwrap_or(defaults.upload_dir),
            upload_base_url: env::var("UPLOAD_BASE_URL").unwrap_or(defaults.upload_base_url),
            max_upload_bytes: parse_or_default("MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            order_number_prefix: env::var("ORDER_NUMBER_PREFIX")
                .unwrap_or(defaults.order_number_prefix),
            loyalty_point_rate: parse_or_default("LOYALTY_POINT_RATE", defaults.loyalty_point_rate)?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
            event_buffer_size: 1024,
            upload_dir: "uploads".to_string(),
            upload_base_url: "/uploads".to_string(),
            max_upload_bytes: 5 * 1024 * 1024,
            order_number_prefix: "SC".to_string(),
            loyalty_point_rate: 0.01,
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
