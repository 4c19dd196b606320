//! Error types for the tweetchain service.
//!
//! Read-path failures from the scraper surface as [`QueryFailure`] so callers can
//! tell "no matches" apart from "the call failed". Write-path failures (publish,
//! persist) propagate through [`Error`] and abort the current operation.

use thiserror::Error;

use crate::twitter::ScraperError;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A scraper lookup that failed, tagged with the query that was issued.
#[derive(Debug, Error)]
#[error("query `{query}` failed: {source}")]
pub struct QueryFailure {
    pub query: String,
    #[source]
    pub source: ScraperError,
}

/// Errors that can occur in the tweetchain service.
#[derive(Debug, Error)]
pub enum Error {
    /// Login failed, no credentials were configured, or the cookie cache was unusable
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A required setting is missing or malformed
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A read query against the scraper failed
    #[error(transparent)]
    Query(#[from] QueryFailure),

    /// The tweet could not be located after publishing
    #[error("published tweet could not be found after {attempts} lookups")]
    TweetNotFound { attempts: u32 },

    /// The ancestor walk exceeded its depth bound
    #[error("reply chain for tweet {tweet_id} exceeds {max_depth} ancestors")]
    ChainTooDeep { tweet_id: String, max_depth: usize },

    /// The ancestor walk revisited a record
    #[error("reply chain for tweet {tweet_id} revisits record {record_id}")]
    ChainCycle { tweet_id: String, record_id: i64 },

    /// The request body was rejected
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Scraper(#[from] ScraperError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
