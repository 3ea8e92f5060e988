use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;
use crate::intake::IntakeSettings;
use crate::intake::extract::DEFAULT_GEMINI_BASE_URL;
use crate::intake::geocode::DEFAULT_NOMINATIM_URL;
use crate::security::RateLimitConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub rate_limits: RateLimitConfig,
    pub sweep_interval: Duration,
    pub intake: IntakeSettings,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub geocoder_url: String,
    pub geocoder_country_codes: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let defaults = RateLimitConfig::default();
        let rate_limits = RateLimitConfig {
            max_requests_per_hour: setting(
                "RATE_LIMIT_MAX_REQUESTS_PER_HOUR",
                defaults.max_requests_per_hour,
            )?,
            max_sessions_per_ip: setting(
                "RATE_LIMIT_MAX_SESSIONS_PER_IP",
                defaults.max_sessions_per_ip,
            )?,
            cooldown_minutes: setting("RATE_LIMIT_COOLDOWN_MINUTES", defaults.cooldown_minutes)?,
            violation_threshold: setting(
                "RATE_LIMIT_VIOLATION_THRESHOLD",
                defaults.violation_threshold,
            )?,
            block_duration_minutes: setting(
                "RATE_LIMIT_BLOCK_DURATION_MINUTES",
                defaults.block_duration_minutes,
            )?,
        };

        let intake_defaults = IntakeSettings::default();
        let intake = IntakeSettings {
            apply_progressive_delay: switch(
                "INTAKE_APPLY_DELAY",
                intake_defaults.apply_progressive_delay,
            )?,
            auto_match: switch("INTAKE_AUTO_MATCH", intake_defaults.auto_match)?,
            extraction_timeout: seconds(
                "EXTRACTION_TIMEOUT_SECONDS",
                intake_defaults.extraction_timeout,
            )?,
            geocode_timeout: seconds("GEOCODE_TIMEOUT_SECONDS", intake_defaults.geocode_timeout)?,
        };

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("compact") => LogFormat::Compact,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(AppError::Internal(format!(
                    "LOG_FORMAT={other:?} is not valid, expected compact or json"
                )));
            }
        };

        Ok(Self {
            http_port: setting("HTTP_PORT", 3000)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_format,
            rate_limits,
            sweep_interval: seconds("SWEEP_INTERVAL_SECONDS", Duration::from_secs(60))?,
            intake,
            gemini_api_key: lookup("GEMINI_API_KEY"),
            gemini_model: lookup("GEMINI_MODEL").unwrap_or_else(|| "gemini-2.5-flash".to_string()),
            gemini_base_url: lookup("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            geocoder_url: lookup("GEOCODER_URL").unwrap_or_else(|| DEFAULT_NOMINATIM_URL.to_string()),
            geocoder_country_codes: lookup("GEOCODER_COUNTRY_CODES")
                .unwrap_or_else(|| "us".to_string()),
        })
    }
}

/// Trimmed value of `key`; blank counts as unset.
fn lookup(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

fn setting<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    parse_setting(key, lookup(key), default)
}

fn switch(key: &str, default: bool) -> Result<bool, AppError> {
    parse_switch(key, lookup(key), default)
}

fn seconds(key: &str, default: Duration) -> Result<Duration, AppError> {
    parse_seconds(key, lookup(key), default)
}

fn parse_setting<T>(key: &str, raw: Option<String>, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = raw else {
        return Ok(default);
    };

    raw.parse::<T>()
        .map_err(|err| AppError::Internal(format!("{key}={raw:?} is not valid: {err}")))
}

/// Feature toggles accept the usual deployment spellings.
fn parse_switch(key: &str, raw: Option<String>, default: bool) -> Result<bool, AppError> {
    match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("true" | "1" | "yes" | "on") => Ok(true),
        Some("false" | "0" | "no" | "off") => Ok(false),
        Some(other) => Err(AppError::Internal(format!(
            "{key}={other:?} is not valid, expected true or false"
        ))),
    }
}

/// Timeouts and the sweep period must be at least one second.
fn parse_seconds(key: &str, raw: Option<String>, default: Duration) -> Result<Duration, AppError> {
    match parse_setting::<u64>(key, raw, default.as_secs())? {
        0 => Err(AppError::Internal(format!("{key} must be at least 1 second"))),
        secs => Ok(Duration::from_secs(secs)),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{parse_seconds, parse_setting, parse_switch};

    #[test]
    fn missing_values_fall_back_to_defaults() {
        assert_eq!(parse_setting::<u16>("HTTP_PORT", None, 3000).unwrap(), 3000);
        assert!(parse_switch("INTAKE_AUTO_MATCH", None, true).unwrap());
        assert_eq!(
            parse_seconds("SWEEP_INTERVAL_SECONDS", None, Duration::from_secs(60)).unwrap(),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn switches_accept_common_spellings() {
        assert!(!parse_switch("INTAKE_APPLY_DELAY", Some("off".into()), true).unwrap());
        assert!(parse_switch("INTAKE_APPLY_DELAY", Some("YES".into()), false).unwrap());
        assert!(parse_switch("INTAKE_APPLY_DELAY", Some("maybe".into()), true).is_err());
    }

    #[test]
    fn zero_second_periods_are_rejected() {
        let err = parse_seconds("SWEEP_INTERVAL_SECONDS", Some("0".into()), Duration::from_secs(60));
        assert!(err.is_err());
        assert_eq!(
            parse_seconds("GEOCODE_TIMEOUT_SECONDS", Some("8".into()), Duration::from_secs(5)).unwrap(),
            Duration::from_secs(8)
        );
    }

    #[test]
    fn malformed_numbers_name_the_key() {
        let err = parse_setting::<usize>("RATE_LIMIT_MAX_REQUESTS_PER_HOUR", Some("five".into()), 5)
            .unwrap_err();
        assert!(err.to_string().contains("RATE_LIMIT_MAX_REQUESTS_PER_HOUR"));
    }
}
