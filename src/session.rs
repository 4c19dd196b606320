//! Session management for the scraper.
//!
//! A session is resumed from a local cookie cache when one exists; otherwise the
//! scraper logs in with the configured credentials and the resulting cookies are
//! written to the cache for the next run.

use chrono::{DateTime, SecondsFormat, Utc};
use cookie::{time::Duration, time::OffsetDateTime, Cookie, SameSite};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use crate::config::Account;
use crate::error::{Error, Result};
use crate::twitter::Scraper;

/// One entry of the cookie cache, in the JSON shape the cache file uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCookie {
    pub key: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_only: Option<bool>,
    /// RFC 3339 timestamp or `"Infinity"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<Value>,
    /// Seconds, or `"Infinity"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
    /// Attributes we do not interpret (`hostOnly`, `creation`, ...), kept for round trips
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StoredCookie {
    pub fn from_cookie(cookie: &Cookie<'_>) -> Self {
        let expires = cookie
            .expires_datetime()
            .and_then(|dt| DateTime::<Utc>::from_timestamp(dt.unix_timestamp(), 0))
            .map(|dt| Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true)));

        Self {
            key: cookie.name().to_string(),
            value: cookie.value().to_string(),
            domain: cookie.domain().map(str::to_string),
            path: cookie.path().map(str::to_string),
            secure: cookie.secure(),
            http_only: cookie.http_only(),
            expires,
            max_age: cookie.max_age().map(|d| Value::from(d.whole_seconds())),
            same_site: cookie.same_site().map(|s| match s {
                SameSite::Strict => "strict".to_string(),
                SameSite::Lax => "lax".to_string(),
                SameSite::None => "none".to_string(),
            }),
            extra: Map::new(),
        }
    }

    fn expires_at(&self) -> Option<OffsetDateTime> {
        let seconds = match self.expires.as_ref()? {
            Value::String(s) => DateTime::parse_from_rfc3339(s).ok()?.timestamp(),
            Value::Number(n) => n.as_i64()?,
            _ => return None,
        };
        OffsetDateTime::from_unix_timestamp(seconds).ok()
    }

    fn max_age_seconds(&self) -> Option<i64> {
        self.max_age.as_ref()?.as_i64()
    }

    fn same_site_policy(&self) -> Option<SameSite> {
        match self.same_site.as_deref()?.to_ascii_lowercase().as_str() {
            "strict" => Some(SameSite::Strict),
            "lax" => Some(SameSite::Lax),
            "none" => Some(SameSite::None),
            _ => None,
        }
    }

    /// Renders the cookie as a `Set-Cookie` style string with its attributes.
    pub fn to_cookie_string(&self) -> String {
        let mut builder = Cookie::build((self.key.clone(), self.value.clone()));
        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }
        if let Some(path) = &self.path {
            builder = builder.path(path.clone());
        }
        if let Some(secure) = self.secure {
            builder = builder.secure(secure);
        }
        if let Some(http_only) = self.http_only {
            builder = builder.http_only(http_only);
        }
        if let Some(expires) = self.expires_at() {
            builder = builder.expires(expires);
        }
        if let Some(max_age) = self.max_age_seconds() {
            builder = builder.max_age(Duration::seconds(max_age));
        }
        if let Some(same_site) = self.same_site_policy() {
            builder = builder.same_site(same_site);
        }
        builder.build().to_string()
    }
}

/// Converts cached cookies into the strings the scraper installs, one per entry, in order.
pub fn to_cookie_strings(cookies: &[StoredCookie]) -> Vec<String> {
    cookies.iter().map(StoredCookie::to_cookie_string).collect()
}

pub fn load_cookies(path: &Path) -> Result<Vec<StoredCookie>> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn save_cookies(path: &Path, cookies: &[StoredCookie]) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(cookies)?)?;
    Ok(())
}

/// Establishes an authenticated scraper session.
///
/// # Behavior
///
/// - If `cookies_path` exists, its cookies are installed and no login happens
/// - Otherwise the account logs in, the session cookies are written to
///   `cookies_path`, and then installed
///
/// # Errors
///
/// Returns [`Error::Authentication`] when no credentials are configured, the login
/// fails, or the cookie cache cannot be read or installed. Writing a fresh cache
/// fails with [`Error::Io`].
pub async fn ensure_session(
    scraper: &dyn Scraper,
    account: &Account,
    cookies_path: &Path,
) -> Result<()> {
    if cookies_path.exists() {
        info!(
            "Found {}, restoring session from cookies",
            cookies_path.display()
        );
        let cookies = load_cookies(cookies_path).map_err(|e| {
            error!("Failed to read cookie cache: {}", e);
            Error::Authentication(format!(
                "unreadable cookie cache {}: {}",
                cookies_path.display(),
                e
            ))
        })?;
        debug!(
            "Cookie names: {}",
            cookies
                .iter()
                .map(|c| c.key.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        install(scraper, &cookies).await?;
    } else {
        info!(
            "No cookie cache at {}, logging in as @{}",
            cookies_path.display(),
            account.username
        );
        if account.username.is_empty() || account.password.is_empty() {
            error!("No credentials configured for login");
            return Err(Error::Authentication(
                "no credentials configured".to_string(),
            ));
        }

        let email = Some(account.email.as_str()).filter(|e| !e.is_empty());
        scraper
            .login(&account.username, &account.password, email)
            .await
            .map_err(|e| {
                error!("Login failed: {}", e);
                Error::Authentication(e.to_string())
            })?;

        let cookies = scraper
            .get_cookies()
            .await
            .map_err(|e| Error::Authentication(e.to_string()))?;
        save_cookies(cookies_path, &cookies)?;
        info!(
            "Saved {} cookies to {}",
            cookies.len(),
            cookies_path.display()
        );
        install(scraper, &cookies).await?;
    }

    info!("Session established for @{}", account.username);
    Ok(())
}

async fn install(scraper: &dyn Scraper, cookies: &[StoredCookie]) -> Result<()> {
    scraper
        .set_cookies(&to_cookie_strings(cookies))
        .await
        .map_err(|e| {
            error!("Failed to install session cookies: {}", e);
            Error::Authentication(e.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeScraper;
    use serde_json::json;

    fn account() -> Account {
        Account {
            username: "bot".to_string(),
            password: "pw".to_string(),
            email: "bot@example.com".to_string(),
        }
    }

    #[test]
    fn parses_cache_entries_and_renders_attributes() {
        let cookies: Vec<StoredCookie> = serde_json::from_value(json!([
            {
                "key": "auth_token", "value": "abc", "domain": "x.com", "path": "/",
                "secure": true, "httpOnly": true, "expires": "2030-01-01T00:00:00.000Z",
                "sameSite": "none", "hostOnly": false, "creation": "2024-01-01T00:00:00.000Z"
            },
            { "key": "ct0", "value": "csrf", "maxAge": 3600 },
            { "key": "guest_id", "value": "v1", "expires": "Infinity", "maxAge": "Infinity" }
        ]))
        .unwrap();

        let strings = to_cookie_strings(&cookies);
        assert_eq!(strings.len(), 3);
        assert!(strings[0].starts_with("auth_token=abc"));
        assert!(strings[0].contains("HttpOnly"));
        assert!(strings[0].contains("Secure"));
        assert!(strings[0].contains("Expires=Tue, 01 Jan 2030 00:00:00 GMT"));
        assert!(strings[1].starts_with("ct0=csrf"));
        assert!(strings[1].contains("Max-Age=3600"));
        assert_eq!(strings[2], "guest_id=v1");
        assert_eq!(cookies[0].extra.get("hostOnly"), Some(&json!(false)));
    }

    #[test]
    fn stored_cookie_round_trips_through_cookie() {
        let cookie = Cookie::parse("ct0=csrf; Domain=x.com; Path=/; Secure; SameSite=Lax; Max-Age=60")
            .unwrap();
        let stored = StoredCookie::from_cookie(&cookie);
        assert_eq!(stored.key, "ct0");
        assert_eq!(stored.same_site.as_deref(), Some("lax"));
        assert_eq!(stored.max_age, Some(json!(60)));

        let reparsed = Cookie::parse(stored.to_cookie_string()).unwrap();
        assert_eq!(reparsed.value(), "csrf");
        assert_eq!(reparsed.domain(), Some("x.com"));
    }

    #[tokio::test]
    async fn installs_every_cached_cookie_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        let cached: Vec<StoredCookie> = (0..5)
            .map(|i| StoredCookie {
                key: format!("c{}", i),
                value: format!("v{}", i),
                domain: None,
                path: None,
                secure: None,
                http_only: None,
                expires: None,
                max_age: None,
                same_site: None,
                extra: Map::new(),
            })
            .collect();
        save_cookies(&path, &cached).unwrap();

        let scraper = FakeScraper::new("bot");
        ensure_session(&scraper, &account(), &path).await.unwrap();

        let installed = scraper.installed_cookies();
        assert_eq!(installed.len(), 5);
        for (i, s) in installed.iter().enumerate() {
            assert_eq!(s, &format!("c{}=v{}", i, i));
        }
        assert_eq!(scraper.login_count(), 0);
    }

    #[tokio::test]
    async fn logs_in_once_then_reuses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");

        let first = FakeScraper::new("bot");
        ensure_session(&first, &account(), &path).await.unwrap();
        assert_eq!(first.login_count(), 1);
        assert!(path.exists());
        let written = load_cookies(&path).unwrap();
        assert_eq!(written, first.session_cookies());
        assert_eq!(first.installed_cookies().len(), written.len());

        let second = FakeScraper::new("bot");
        ensure_session(&second, &account(), &path).await.unwrap();
        assert_eq!(second.login_count(), 0);
        assert_eq!(second.installed_cookies().len(), written.len());
    }

    #[tokio::test]
    async fn missing_credentials_fail_authentication() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        let mut account = account();
        account.password.clear();

        let scraper = FakeScraper::new("bot");
        let err = ensure_session(&scraper, &account, &path).await.unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn failed_login_is_an_authentication_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        let scraper = FakeScraper::new("bot");
        scraper.fail_login();

        let err = ensure_session(&scraper, &account(), &path).await.unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn corrupt_cache_is_an_authentication_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        fs::write(&path, "not json").unwrap();

        let scraper = FakeScraper::new("bot");
        let err = ensure_session(&scraper, &account(), &path).await.unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
        assert_eq!(scraper.login_count(), 0);
    }
}
