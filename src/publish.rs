//! Publishing tweets and recording them in the store.
//!
//! The platform does not report the id of a tweet submitted through the web API
//! reliably, so after sending we wait for it to settle and look it up again.

use log::{debug, info, warn};
use std::time::Duration;

use crate::context::Context;
use crate::db::{NewTweetRecord, TweetRecord};
use crate::error::{Error, QueryFailure, Result};
use crate::query::{collect_search, conversation_query, own_tweets};
use crate::twitter::{sanitize_for_logging, MediaAttachment, ScrapedTweet, SearchMode, MAX_MEDIA};

/// Result limit of the lookup that locates a freshly published tweet.
const REQUERY_LIMIT: usize = 10;

/// A tweet to publish.
#[derive(Debug, Clone, Default)]
pub struct PublishRequest {
    pub text: String,
    pub media: Vec<MediaAttachment>,
    /// Platform id of the tweet being replied to
    pub reply_to: Option<String>,
    /// Free-form persona tag stored with the record
    pub character: Option<String>,
    /// Conversation the new tweet joins; narrows the lookup after sending
    pub conversation_id: Option<String>,
}

/// Timing of the lookup that follows a send.
#[derive(Debug, Clone)]
pub struct PublishOptions {
    pub settle_delay: Duration,
    /// Lookups in total, including the first
    pub requery_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(10),
            requery_attempts: 3,
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// Sends a tweet, locates it on the platform and stores it.
///
/// When `reply_to` names a stored tweet, the new record links to that record.
///
/// # Errors
///
/// - [`Error::TweetNotFound`] if no lookup finds the new tweet, failed lookups included; nothing is stored
/// - [`Error::Scraper`] if sending fails
/// - [`Error::Database`] if the store fails
pub async fn publish_tweet(
    ctx: &Context,
    request: PublishRequest,
    options: &PublishOptions,
) -> Result<TweetRecord> {
    let parent = match request.reply_to.as_deref() {
        Some(tweet_id) => {
            let parent = ctx.store.find_by_tweet_id(tweet_id).await?;
            if parent.is_none() {
                debug!("Reply target {} is not stored", tweet_id);
            }
            parent
        }
        None => None,
    };

    ctx.scraper
        .send_tweet(
            &request.text,
            request.reply_to.as_deref(),
            &request.media[..request.media.len().min(MAX_MEDIA)],
        )
        .await?;
    info!(
        "Sent tweet '{}', waiting {:?} before looking it up",
        sanitize_for_logging(&request.text, 80),
        options.settle_delay
    );
    tokio::time::sleep(options.settle_delay).await;

    let attempts = options.requery_attempts.max(1);
    let mut published = None;
    for attempt in 1..=attempts {
        published = find_published(ctx, &request).await?;
        if published.is_some() {
            break;
        }
        if attempt < attempts {
            warn!(
                "Published tweet not visible yet (attempt {} of {}), retrying in {:?}",
                attempt, attempts, options.retry_delay
            );
            tokio::time::sleep(options.retry_delay).await;
        }
    }
    let Some(tweet) = published else {
        return Err(Error::TweetNotFound { attempts });
    };

    let record = NewTweetRecord::from_scraped(
        tweet,
        parent.map(|p| p.id),
        request.character,
    );
    ctx.store.insert(record).await
}

async fn lookup_candidates(
    ctx: &Context,
    request: &PublishRequest,
) -> Result<Vec<ScrapedTweet>, QueryFailure> {
    match request.conversation_id.as_deref() {
        Some(conversation_id) => {
            collect_search(
                ctx.scraper.as_ref(),
                &conversation_query(conversation_id),
                REQUERY_LIMIT,
                SearchMode::Latest,
            )
            .await
        }
        None => own_tweets(ctx.scraper.as_ref(), ctx.username(), REQUERY_LIMIT).await,
    }
}

/// One lookup for the tweet just sent. A failed query counts as a miss.
async fn find_published(
    ctx: &Context,
    request: &PublishRequest,
) -> Result<Option<ScrapedTweet>> {
    let candidates = match lookup_candidates(ctx, request).await {
        Ok(candidates) => candidates,
        Err(failure) => {
            warn!("Lookup for the published tweet failed: {}", failure);
            return Ok(None);
        }
    };

    let mut fresh = Vec::new();
    for tweet in candidates {
        if !tweet.is_authored_by(ctx.username()) {
            continue;
        }
        if ctx.store.exists(&tweet.id).await? {
            continue;
        }
        fresh.push(tweet);
    }

    if let Some(pos) = fresh
        .iter()
        .position(|t| t.text.as_deref() == Some(request.text.as_str()))
    {
        return Ok(Some(fresh.swap_remove(pos)));
    }
    Ok(fresh
        .into_iter()
        .max_by_key(|t| t.timestamp.unwrap_or(i64::MIN)))
}
