//! Database module for the tweet record store.
//!
//! This module defines the [`TweetStore`] seam and its PostgreSQL implementation.
//! Records are insert-only: they are created when a tweet is published and are
//! never updated or deleted by this service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use sqlx::postgres::{PgConnectOptions, PgRow};
use std::str::FromStr;
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use crate::error::Result;
use crate::twitter::ScrapedTweet;

/// A persisted tweet.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TweetRecord {
    /// Internal identifier, referenced by child records
    pub id: i64,
    pub tweet_id: String,
    pub tweet_pub_date: DateTime<Utc>,
    pub tweeter_username: String,
    pub sender: Option<String>,
    pub html: Option<String>,
    /// Internal identifier of the parent record
    pub reply_to: Option<i64>,
    pub tweet: ScrapedTweet,
    pub character: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The fields supplied when creating a record.
#[derive(Debug, Clone)]
pub struct NewTweetRecord {
    pub tweet_id: String,
    pub tweet_pub_date: DateTime<Utc>,
    pub tweeter_username: String,
    pub sender: Option<String>,
    pub html: Option<String>,
    pub reply_to: Option<i64>,
    pub tweet: ScrapedTweet,
    pub character: Option<String>,
}

impl NewTweetRecord {
    /// Builds a record for a scraped tweet. A missing timestamp falls back to now.
    pub fn from_scraped(
        tweet: ScrapedTweet,
        reply_to: Option<i64>,
        character: Option<String>,
    ) -> Self {
        let tweet_pub_date = tweet
            .timestamp
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .unwrap_or_else(Utc::now);
        Self {
            tweet_id: tweet.id.clone(),
            tweet_pub_date,
            tweeter_username: tweet.username.clone().unwrap_or_default(),
            sender: None,
            html: tweet.html.clone(),
            reply_to,
            tweet,
            character,
        }
    }
}

/// Persistence operations the orchestration layer needs.
#[async_trait]
pub trait TweetStore: Send + Sync {
    /// Whether a record with this platform tweet id exists.
    async fn exists(&self, tweet_id: &str) -> Result<bool>;

    async fn find_by_tweet_id(&self, tweet_id: &str) -> Result<Option<TweetRecord>>;

    async fn find_by_id(&self, id: i64) -> Result<Option<TweetRecord>>;

    /// Records authored by `username` and created after `since`, oldest first.
    async fn recent_by_author(
        &self,
        username: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<TweetRecord>>;

    async fn insert(&self, record: NewTweetRecord) -> Result<TweetRecord>;
}

/// Describes a connection string by host, port and database only, for logging.
pub fn describe_database_url(database_url: &str) -> String {
    match PgConnectOptions::from_str(database_url) {
        Ok(options) => format!(
            "{}:{}/{}",
            options.get_host(),
            options.get_port(),
            options.get_database().unwrap_or("")
        ),
        Err(_) => "<unparseable connection string>".to_string(),
    }
}

/// Establishes a connection pool to the PostgreSQL database.
///
/// # Returns
///
/// - `Ok(PgPool)`: A connection pool to the database
/// - `Err(Error::Database)`: If the connection fails
pub async fn get_db_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL database");
    debug!("Database: {}", describe_database_url(database_url));

    let pool = PgPool::connect(database_url).await?;
    info!("Successfully connected to PostgreSQL database");

    Ok(pool)
}

/// [`TweetStore`] backed by the `tweets` table.
#[derive(Debug, Clone)]
pub struct PgTweetStore {
    pool: PgPool,
}

const SELECT_COLUMNS: &str = "id, tweet_id, tweet_pub_date, tweeter_username, sender, html, reply_to, tweet, \"character\", created_at";

impl PgTweetStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the `tweets` table and its indexes if they do not exist yet.
    pub async fn create_tweets_table(&self) -> Result<()> {
        info!("Ensuring tweets table exists");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tweets (
                id BIGSERIAL PRIMARY KEY,
                tweet_id TEXT NOT NULL UNIQUE,
                tweet_pub_date TIMESTAMPTZ NOT NULL,
                tweeter_username TEXT NOT NULL,
                sender TEXT,
                html TEXT,
                reply_to BIGINT REFERENCES tweets (id),
                tweet JSONB NOT NULL,
                "character" TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS tweets_author_created_idx
            ON tweets (tweeter_username, created_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Tweets table is ready");
        Ok(())
    }
}

fn record_from_row(row: &PgRow) -> Result<TweetRecord> {
    let Json(tweet): Json<ScrapedTweet> = row.try_get("tweet")?;
    Ok(TweetRecord {
        id: row.try_get("id")?,
        tweet_id: row.try_get("tweet_id")?,
        tweet_pub_date: row.try_get("tweet_pub_date")?,
        tweeter_username: row.try_get("tweeter_username")?,
        sender: row.try_get("sender")?,
        html: row.try_get("html")?,
        reply_to: row.try_get("reply_to")?,
        tweet,
        character: row.try_get("character")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl TweetStore for PgTweetStore {
    async fn exists(&self, tweet_id: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM tweets WHERE tweet_id = $1)")
                .bind(tweet_id)
                .fetch_one(&self.pool)
                .await?;
        debug!("Tweet {} stored: {}", tweet_id, exists);
        Ok(exists)
    }

    async fn find_by_tweet_id(&self, tweet_id: &str) -> Result<Option<TweetRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM tweets WHERE tweet_id = $1",
            SELECT_COLUMNS
        ))
        .bind(tweet_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<TweetRecord>> {
        let row = sqlx::query(&format!("SELECT {} FROM tweets WHERE id = $1", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn recent_by_author(
        &self,
        username: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<TweetRecord>> {
        info!(
            "Querying records by @{} created after {}",
            username, since
        );
        let rows = sqlx::query(&format!(
            "SELECT {} FROM tweets WHERE tweeter_username = $1 AND created_at > $2 ORDER BY created_at ASC",
            SELECT_COLUMNS
        ))
        .bind(username)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        let records = rows.iter().map(record_from_row).collect::<Result<Vec<_>>>()?;
        info!("Found {} recent records by @{}", records.len(), username);
        Ok(records)
    }

    async fn insert(&self, record: NewTweetRecord) -> Result<TweetRecord> {
        info!(
            "Storing tweet {} by @{} (reply to record: {:?})",
            record.tweet_id, record.tweeter_username, record.reply_to
        );

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO tweets (tweet_id, tweet_pub_date, tweeter_username, sender, html, reply_to, tweet, "character")
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            SELECT_COLUMNS
        ))
        .bind(&record.tweet_id)
        .bind(record.tweet_pub_date)
        .bind(&record.tweeter_username)
        .bind(&record.sender)
        .bind(&record.html)
        .bind(record.reply_to)
        .bind(Json(&record.tweet))
        .bind(&record.character)
        .fetch_one(&self.pool)
        .await?;

        let stored = record_from_row(&row)?;
        info!("Successfully stored tweet {} as record {}", stored.tweet_id, stored.id);
        Ok(stored)
    }
}
