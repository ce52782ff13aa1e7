use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;
use crate::geocoder::FallbackLocation;
use crate::models::driver::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format {other:?}, expected compact or json")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub event_buffer_size: usize,
    pub geocoder_base_url: String,
    pub geocoder_user_agent: String,
    pub geocoder_country_codes: Option<String>,
    pub geocoder_timeout: Duration,
    pub fallback: FallbackLocation,
    pub auto_confirm_after: Duration,
    pub auto_confirm_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let fallback_default = FallbackLocation::default();
        let fallback = FallbackLocation {
            location: GeoPoint::new(
                parse_or_default("GEOCODER_FALLBACK_LAT", fallback_default.location.lat)?,
                parse_or_default("GEOCODER_FALLBACK_LNG", fallback_default.location.lng)?,
            ),
            label: env::var("GEOCODER_FALLBACK_LABEL").unwrap_or(fallback_default.label),
        };
        if !fallback.location.is_valid() {
            return Err(AppError::Internal(
                "invalid GEOCODER_FALLBACK_LAT/GEOCODER_FALLBACK_LNG".to_string(),
            ));
        }

        let country_codes = env::var("GEOCODER_COUNTRY_CODES").unwrap_or_else(|_| "ke".to_string());

        let auto_confirm_interval_secs: u64 = parse_or_default("AUTO_CONFIRM_INTERVAL_SECS", 60)?;
        if auto_confirm_interval_secs == 0 {
            return Err(AppError::Internal(
                "AUTO_CONFIRM_INTERVAL_SECS must be > 0".to_string(),
            ));
        }

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: parse_or_default("LOG_FORMAT", LogFormat::Compact)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            geocoder_base_url: env::var("GEOCODER_BASE_URL")
                .unwrap_or_else(|_| "https://nominatim.openstreetmap.org".to_string()),
            geocoder_user_agent: env::var("GEOCODER_USER_AGENT")
                .unwrap_or_else(|_| format!("parcel-engine/{}", env!("CARGO_PKG_VERSION"))),
            geocoder_country_codes: Some(country_codes).filter(|codes| !codes.trim().is_empty()),
            geocoder_timeout: Duration::from_millis(parse_or_default("GEOCODER_TIMEOUT_MS", 5_000)?),
            fallback,
            auto_confirm_after: Duration::from_secs(parse_or_default(
                "AUTO_CONFIRM_AFTER_SECS",
                86_400,
            )?),
            auto_confirm_interval: Duration::from_secs(auto_confirm_interval_secs),
        })
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
