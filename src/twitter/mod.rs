//! Twitter/X scraping client.
//!
//! This module defines the [`Scraper`] seam the orchestration layer talks to,
//! the types that cross it, and [`WebScraper`], a cookie-authenticated client for
//! the platform's private web API.

mod api;
mod login;
mod parsing;
mod search;
mod tweets;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::StoredCookie;

pub use api::WebScraper;
pub(crate) use api::sanitize_for_logging;
pub use parsing::render_html;
pub use tweets::MAX_MEDIA;

/// Errors raised by a [`Scraper`] implementation.
#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The platform answered with a non-success status or an `errors` payload
    #[error("Twitter API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The login task flow ended in a state we cannot complete
    #[error("login flow failed: {0}")]
    Login(String),

    /// An operation needing an authenticated session was called without one
    #[error("no authenticated session")]
    NotAuthenticated,

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

/// Result ordering requested from search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchMode {
    Top,
    Latest,
}

impl SearchMode {
    pub(crate) fn product(self) -> &'static str {
        match self {
            SearchMode::Top => "Top",
            SearchMode::Latest => "Latest",
        }
    }
}

/// A single tweet as returned by the scraper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedTweet {
    pub id: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
    /// Unix seconds
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub is_reply: bool,
    #[serde(default)]
    pub in_reply_to_status_id: Option<String>,
}

impl ScrapedTweet {
    pub fn is_authored_by(&self, username: &str) -> bool {
        self.username.as_deref() == Some(username)
    }
}

/// One page of a cursor-paginated result stream.
#[derive(Debug, Clone, Default)]
pub struct TweetPage {
    pub tweets: Vec<ScrapedTweet>,
    pub next_cursor: Option<String>,
}

/// An image attached to a new tweet.
#[derive(Debug, Clone)]
pub struct MediaAttachment {
    pub data: Vec<u8>,
    pub media_type: String,
}

/// The operations the orchestration layer consumes from a scraping client.
///
/// Implementations keep their session state internally; every method takes
/// `&self` so one client can be shared behind an `Arc`.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Installs cookie strings (`name=value; Domain=...`) as the active session.
    async fn set_cookies(&self, cookies: &[String]) -> Result<(), ScraperError>;

    /// Performs a credential login. `email` answers the alternate-identifier challenge.
    async fn login(
        &self,
        username: &str,
        password: &str,
        email: Option<&str>,
    ) -> Result<(), ScraperError>;

    /// Returns the cookies of the current session.
    async fn get_cookies(&self) -> Result<Vec<StoredCookie>, ScraperError>;

    /// Fetches one page of search results.
    async fn search_tweets(
        &self,
        query: &str,
        count: usize,
        mode: SearchMode,
        cursor: Option<&str>,
    ) -> Result<TweetPage, ScraperError>;

    /// Fetches one page of a user's timeline.
    async fn get_tweets(
        &self,
        username: &str,
        count: usize,
        cursor: Option<&str>,
    ) -> Result<TweetPage, ScraperError>;

    /// Submits a new tweet, optionally as a reply and with up to four images.
    async fn send_tweet(
        &self,
        text: &str,
        reply_to: Option<&str>,
        media: &[MediaAttachment],
    ) -> Result<(), ScraperError>;
}
