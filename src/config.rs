//! Configuration module for the tweetchain service.
//!
//! This module contains the settings structures and environment variable handling.
//! Each entry point validates a fixed set of required variables at startup; the
//! process exits with status 1 when any of them is missing.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use log::{debug, error, info};
use std::env;
use std::path::PathBuf;

use crate::db::describe_database_url;
use crate::error::{Error, Result};

pub const TWITTER_USERNAME: &str = "TWITTER_USERNAME";
pub const TWITTER_PASSWORD: &str = "TWITTER_PASSWORD";
pub const TWITTER_EMAIL: &str = "TWITTER_EMAIL";
pub const TWEET_ID: &str = "TWEET_ID";
pub const SERVICE_FROM: &str = "SERVICE_FROM";
pub const DATABASE_URL: &str = "DATABASE_URL";
pub const COOKIES_PATH: &str = "COOKIES_PATH";

/// Variables the HTTP service cannot start without.
pub const SERVICE_REQUIRED: &[&str] = &[
    TWITTER_USERNAME,
    TWITTER_PASSWORD,
    TWITTER_EMAIL,
    SERVICE_FROM,
    DATABASE_URL,
];

/// Variables the CSV export scripts cannot start without.
pub const EXPORT_REQUIRED: &[&str] = &[TWITTER_USERNAME, TWITTER_PASSWORD, TWITTER_EMAIL, TWEET_ID];

const DEFAULT_COOKIES_PATH: &str = "cookies.json";

/// Credentials of the automated account.
#[derive(Clone)]
pub struct Account {
    pub username: String,
    pub password: String,
    pub email: String,
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("email", &self.email)
            .finish()
    }
}

/// Settings loaded from the process environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub account: Account,
    pub tweet_id: Option<String>,
    pub service_from: Option<DateTime<Utc>>,
    pub database_url: Option<String>,
    pub cookies_path: PathBuf,
}

impl Settings {
    /// Loads settings from the environment, requiring every variable in `required`.
    ///
    /// # Returns
    ///
    /// - `Ok(Settings)`: If every required variable is present and well-formed
    /// - `Err(Error::Configuration)`: Naming every missing variable, or the malformed one
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use tweetchain::config::{Settings, EXPORT_REQUIRED};
    ///
    /// let settings = Settings::from_env(EXPORT_REQUIRED).unwrap();
    /// println!("exporting for @{}", settings.account.username);
    /// ```
    pub fn from_env(required: &[&str]) -> Result<Self> {
        Self::from_lookup(required, |name| env::var(name).ok())
    }

    /// Same as [`Settings::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(required: &[&str], lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        info!("Loading configuration from environment variables");

        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|name| read(*name).is_none())
            .collect();
        if !missing.is_empty() {
            for name in &missing {
                error!("Please set {} in the environment or .env file", name);
            }
            return Err(Error::Configuration(format!(
                "missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        let account = Account {
            username: read(TWITTER_USERNAME).unwrap_or_default(),
            password: read(TWITTER_PASSWORD).unwrap_or_default(),
            email: read(TWITTER_EMAIL).unwrap_or_default(),
        };
        debug!("Account username: @{}", account.username);

        let service_from = match read(SERVICE_FROM) {
            Some(raw) => {
                let parsed = parse_service_from(&raw)?;
                info!("Service start cutoff: {}", parsed);
                Some(parsed)
            }
            None => None,
        };

        let database_url = read(DATABASE_URL);
        if let Some(url) = &database_url {
            debug!("Database: {}", describe_database_url(url));
        }

        let cookies_path =
            PathBuf::from(read(COOKIES_PATH).unwrap_or_else(|| DEFAULT_COOKIES_PATH.to_string()));
        debug!("Cookie cache path: {}", cookies_path.display());

        info!("Configuration loaded successfully");
        Ok(Settings {
            account,
            tweet_id: read(TWEET_ID),
            service_from,
            database_url,
            cookies_path,
        })
    }
}

/// Parses the service-start cutoff.
///
/// Accepts RFC 3339 (`2024-05-01T08:00:00+08:00`), a naive UTC date-time
/// (`2024-05-01 00:00:00` or `2024-05-01T00:00:00`) or a bare date (`2024-05-01`).
pub fn parse_service_from(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }
    Err(Error::Configuration(format!(
        "{} is not a recognised timestamp: {}",
        SERVICE_FROM, raw
    )))
}

/// Gets the server port from environment variables or returns the default.
///
/// This function reads the `PORT` environment variable and parses it as a u16.
/// If the variable is not set, it defaults to 3000.
///
/// # Errors
///
/// Returns [`Error::Configuration`] when `PORT` is set to something that is not a port number.
pub fn get_server_port() -> Result<u16> {
    match env::var("PORT") {
        Ok(port) => port
            .parse()
            .map_err(|_| Error::Configuration(format!("PORT must be a valid number: {}", port))),
        Err(_) => Ok(3000),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn reports_every_missing_variable() {
        let err = Settings::from_lookup(
            SERVICE_REQUIRED,
            lookup(&[(TWITTER_USERNAME, "bot"), (TWITTER_PASSWORD, "  ")]),
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains(TWITTER_PASSWORD));
        assert!(message.contains(TWITTER_EMAIL));
        assert!(message.contains(SERVICE_FROM));
        assert!(message.contains(DATABASE_URL));
        assert!(!message.contains(TWITTER_USERNAME));
    }

    #[test]
    fn loads_export_settings() {
        let settings = Settings::from_lookup(
            EXPORT_REQUIRED,
            lookup(&[
                (TWITTER_USERNAME, "bot"),
                (TWITTER_PASSWORD, "pw"),
                (TWITTER_EMAIL, "bot@example.com"),
                (TWEET_ID, "123"),
            ]),
        )
        .unwrap();
        assert_eq!(settings.account.username, "bot");
        assert_eq!(settings.tweet_id.as_deref(), Some("123"));
        assert_eq!(settings.cookies_path, PathBuf::from("cookies.json"));
        assert!(settings.service_from.is_none());
        assert!(!format!("{:?}", settings.account).contains("pw\""));
    }

    #[test]
    fn malformed_cutoff_is_a_configuration_error() {
        let err = Settings::from_lookup(
            &[SERVICE_FROM],
            lookup(&[(SERVICE_FROM, "yesterday")]),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn parses_cutoff_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_service_from("2024-05-01").unwrap(), expected);
        assert_eq!(parse_service_from("2024-05-01 00:00:00").unwrap(), expected);
        assert_eq!(parse_service_from("2024-05-01T00:00:00Z").unwrap(), expected);
        assert_eq!(
            parse_service_from("2024-05-01T08:00:00+08:00").unwrap(),
            expected
        );
    }

    #[test]
    fn test_get_server_port() {
        std::env::remove_var("PORT");
        assert_eq!(get_server_port().unwrap(), 3000);

        std::env::set_var("PORT", "8080");
        assert_eq!(get_server_port().unwrap(), 8080);

        std::env::set_var("PORT", "not-a-port");
        assert!(get_server_port().is_err());

        std::env::remove_var("PORT");
    }
}
