//! # Tweetchain Library
//!
//! A Rust service library that drives a Twitter/X bot account through the
//! platform's web API. It finds new replies to the account's recent tweets and
//! rebuilds each reply's conversation chain from stored records, surfaces fresh
//! mentions, and publishes tweets while recording them in PostgreSQL.
//!
//! ## Features
//!
//! - Cookie-cached sessions with credential login as the fallback
//! - Cursor-paginated search with self-exclusion and a page bound
//! - Reply chain reconstruction with cycle and depth guards
//! - Publish-then-locate with a bounded retry loop
//! - CSV export of replies and quotes
//!
//! ## Configuration
//!
//! - `TWITTER_USERNAME`, `TWITTER_PASSWORD`, `TWITTER_EMAIL`: account credentials
//! - `SERVICE_FROM`: content published before this instant is ignored
//! - `DATABASE_URL`: PostgreSQL connection string
//! - `TWEET_ID`: target tweet of the export scripts
//! - `COOKIES_PATH`: session cookie cache (defaults to `cookies.json`)
//! - `PORT`: server port (defaults to 3000)
//!
//! ## API Endpoints
//!
//! - `GET /health`: Returns service health status
//! - `GET /replies`: Returns new reply chains
//! - `GET /mentions`: Returns new mentions
//! - `POST /tweet`: Publishes and stores a tweet

pub mod chain;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod export;
pub mod handlers;
pub mod publish;
pub mod query;
pub mod session;
pub mod twitter;

// Re-export commonly used types and functions
pub use chain::{get_latest_refer_tweets, get_latest_replies, get_tweet_links, ReplyChain, ReplyScan};
pub use config::{get_server_port, Settings};
pub use context::Context;
pub use error::{Error, QueryFailure, Result};
pub use export::{export_csv, export_to_path};
pub use handlers::{router, AppState};
pub use publish::{publish_tweet, PublishOptions, PublishRequest};
pub use session::ensure_session;
pub use twitter::{ScrapedTweet, Scraper, WebScraper};

#[cfg(test)]
mod testing;
