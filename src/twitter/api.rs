//! Core web API utilities.
//!
//! This module contains the [`WebScraper`] client, its cookie-jar session state and
//! the low-level helper that attaches session headers to every request.

use async_trait::async_trait;
use cookie::Cookie;
use log::{debug, error, info, warn};
use reqwest::header::{HeaderMap, SET_COOKIE};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::session::StoredCookie;

use super::{MediaAttachment, Scraper, ScraperError, SearchMode, TweetPage};

/// Public bearer token of the web client.
pub(crate) const BEARER_TOKEN: &str = "AAAAAAAAAAAAAAAAAAAAANRILgAAAAAAnNwIzUejRCOuH5E6I8xnZz4puTs%3D1Zv7ttfk8LF81IUq16cHjhLTvJu4FA33AGWWjCpTnA";
const GUEST_ACTIVATE_URL: &str = "https://api.x.com/1.1/guest/activate.json";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Sanitizes text for safe logging by truncating and escaping control characters.
///
/// This function:
/// - Replaces newlines and tabs with spaces so one event stays on one log line
/// - Replaces other control characters with `?`
/// - Truncates long text, on a character boundary, to `max_len` bytes at most
pub(crate) fn sanitize_for_logging(text: &str, max_len: usize) -> String {
    let sanitized: String = text
        .chars()
        .map(|c| match c {
            '\n' | '\r' | '\t' => ' ',
            c if c.is_control() => '?',
            c => c,
        })
        .collect();

    if sanitized.len() > max_len {
        let mut cut = max_len;
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        format!(
            "{}... [truncated, {} total bytes]",
            &sanitized[..cut],
            text.len()
        )
    } else {
        sanitized
    }
}

/// Cookie jar and tokens of the current session.
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    /// Ordered by first insertion, unique by name
    pub(crate) cookies: Vec<Cookie<'static>>,
    pub(crate) guest_token: Option<String>,
}

impl SessionState {
    pub(crate) fn upsert(&mut self, cookie: Cookie<'static>) {
        match self.cookies.iter_mut().find(|c| c.name() == cookie.name()) {
            Some(existing) => *existing = cookie,
            None => self.cookies.push(cookie),
        }
    }

    fn absorb(&mut self, headers: &HeaderMap) {
        for value in headers.get_all(SET_COOKIE) {
            let Ok(raw) = value.to_str() else {
                continue;
            };
            match Cookie::parse(raw.to_owned()) {
                Ok(cookie) => {
                    debug!("Received cookie {}", cookie.name());
                    self.upsert(cookie);
                }
                Err(e) => warn!("Ignoring unparsable Set-Cookie header: {}", e),
            }
        }
    }

    fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|c| format!("{}={}", c.name(), c.value()))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    pub(crate) fn cookie_value(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|c| c.name() == name)
            .map(|c| c.value())
    }

    pub(crate) fn is_logged_in(&self) -> bool {
        self.cookie_value("auth_token").is_some()
    }
}

/// Cookie-authenticated client for the Twitter/X web API.
pub struct WebScraper {
    pub(crate) client: Client,
    pub(crate) state: Mutex<SessionState>,
}

impl WebScraper {
    pub fn new() -> Result<Self, ScraperError> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            state: Mutex::new(SessionState::default()),
        })
    }

    /// Obtains a fresh guest token, required before the login flow starts.
    pub(crate) async fn activate_guest_token(&self) -> Result<String, ScraperError> {
        info!("Activating guest token");
        let request_builder = self.client.post(GUEST_ACTIVATE_URL);
        let json = self.send_request(request_builder, "guest_activate").await?;

        let token = json
            .get("guest_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ScraperError::Unexpected("guest_token missing".to_string()))?
            .to_string();

        self.state.lock().await.guest_token = Some(token.clone());
        Ok(token)
    }

    /// Sends a request carrying the session headers and returns the JSON body.
    ///
    /// The session's cookies, CSRF token and guest token (when present) are attached,
    /// and any `Set-Cookie` headers on the response are folded back into the jar.
    pub(crate) async fn send_request(
        &self,
        request_builder: RequestBuilder,
        operation_name: &str,
    ) -> Result<Value, ScraperError> {
        info!("Sending request for operation: {}", operation_name);

        let mut request_builder = request_builder
            .header("Authorization", format!("Bearer {}", BEARER_TOKEN))
            .header("x-twitter-active-user", "yes")
            .header("x-twitter-client-language", "en");

        {
            let state = self.state.lock().await;
            if let Some(cookie_header) = state.cookie_header() {
                request_builder = request_builder.header("Cookie", cookie_header);
            }
            if let Some(csrf) = state.cookie_value("ct0") {
                request_builder = request_builder.header("x-csrf-token", csrf);
            }
            if state.is_logged_in() {
                request_builder = request_builder.header("x-twitter-auth-type", "OAuth2Session");
            } else if let Some(guest_token) = &state.guest_token {
                request_builder = request_builder.header("x-guest-token", guest_token);
            }
        }

        let response = request_builder.send().await?;
        let status = response.status();
        info!(
            "Received response with status: {} for operation: {}",
            status, operation_name
        );

        self.state.lock().await.absorb(response.headers());

        let body = response.text().await?;
        debug!(
            "Response summary for '{}': {} bytes received",
            operation_name,
            body.len()
        );

        if !status.is_success() {
            error!("Operation '{}' failed - Status: {}", operation_name, status);
            debug!(
                "Error response for '{}': {}",
                operation_name,
                sanitize_for_logging(&body, 200)
            );
            return Err(ScraperError::Api {
                status: status.as_u16(),
                message: first_error_message(&body)
                    .unwrap_or_else(|| sanitize_for_logging(&body, 200)),
            });
        }

        let json: Value = serde_json::from_str(&body)?;

        // GraphQL reports failures with a 200 and an `errors` array
        if json.get("data").is_none() {
            if let Some(message) = json
                .get("errors")
                .and_then(|e| e.get(0))
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
            {
                error!(
                    "Operation '{}' returned an error payload: {}",
                    operation_name,
                    sanitize_for_logging(message, 200)
                );
                return Err(ScraperError::Api {
                    status: status.as_u16(),
                    message: message.to_string(),
                });
            }
        }

        Ok(json)
    }

    /// Fails with [`ScraperError::NotAuthenticated`] unless session cookies are installed.
    pub(crate) async fn require_session(&self) -> Result<(), ScraperError> {
        if self.state.lock().await.is_logged_in() {
            Ok(())
        } else {
            Err(ScraperError::NotAuthenticated)
        }
    }
}

fn first_error_message(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    json.get("errors")?
        .get(0)?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

#[async_trait]
impl Scraper for WebScraper {
    async fn set_cookies(&self, cookies: &[String]) -> Result<(), ScraperError> {
        let mut state = self.state.lock().await;
        for raw in cookies {
            let cookie = Cookie::parse(raw.clone())
                .map_err(|e| ScraperError::Unexpected(format!("invalid cookie string: {}", e)))?;
            state.upsert(cookie);
        }
        info!("Installed {} session cookies", cookies.len());
        Ok(())
    }

    async fn login(
        &self,
        username: &str,
        password: &str,
        email: Option<&str>,
    ) -> Result<(), ScraperError> {
        self.run_login_flow(username, password, email).await
    }

    async fn get_cookies(&self) -> Result<Vec<StoredCookie>, ScraperError> {
        let state = self.state.lock().await;
        Ok(state.cookies.iter().map(StoredCookie::from_cookie).collect())
    }

    async fn search_tweets(
        &self,
        query: &str,
        count: usize,
        mode: SearchMode,
        cursor: Option<&str>,
    ) -> Result<TweetPage, ScraperError> {
        self.fetch_search_page(query, count, mode, cursor).await
    }

    async fn get_tweets(
        &self,
        username: &str,
        count: usize,
        cursor: Option<&str>,
    ) -> Result<TweetPage, ScraperError> {
        self.fetch_user_tweets_page(username, count, cursor).await
    }

    async fn send_tweet(
        &self,
        text: &str,
        reply_to: Option<&str>,
        media: &[MediaAttachment],
    ) -> Result<(), ScraperError> {
        self.create_tweet(text, reply_to, media).await
    }
}
