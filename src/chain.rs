//! Reply discovery and chain reconstruction.
//!
//! A reply chain is the root-first list of stored records a reply descends from,
//! followed by the reply itself. Stored records link to their parent through
//! `reply_to`, the parent's internal id.

use chrono::{Duration, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::HashSet;

use crate::context::Context;
use crate::db::{TweetRecord, TweetStore};
use crate::error::{Error, Result};
use crate::query::{mentions_of, replies_to, REPLY_LIMIT};
use crate::twitter::ScrapedTweet;

/// Own records older than this are no longer scanned for replies.
pub const RETENTION_DAYS: i64 = 3;

/// Upper bound on ancestors followed for one reply.
pub const MAX_CHAIN_DEPTH: usize = 64;

/// A new reply and the stored records it descends from.
#[derive(Debug, Clone, Serialize)]
pub struct ReplyChain {
    /// Root first
    pub ancestors: Vec<TweetRecord>,
    pub reply: ScrapedTweet,
}

impl ReplyChain {
    /// The chain as scraped tweets, root first and ending with the reply.
    pub fn tweets(&self) -> Vec<ScrapedTweet> {
        self.ancestors
            .iter()
            .map(|record| record.tweet.clone())
            .chain(std::iter::once(self.reply.clone()))
            .collect()
    }
}

/// Outcome of a reply scan.
#[derive(Debug, Default)]
pub struct ReplyScan {
    pub chains: Vec<ReplyChain>,
    /// Queries or chain walks that failed and were skipped
    pub failed_queries: Vec<String>,
}

/// Walks from `reply` up through stored ancestors.
///
/// Returns the ancestors root first. The walk starts at the direct parent, or at
/// the conversation root when the parent is not stored. A record whose parent is
/// missing from the store ends the walk; whatever was found up to that point is
/// returned.
///
/// # Errors
///
/// - [`Error::ChainCycle`] if a record is reached twice
/// - [`Error::ChainTooDeep`] if more than [`MAX_CHAIN_DEPTH`] ancestors are found
/// - [`Error::Database`] on store failures
pub async fn get_tweet_links(
    store: &dyn TweetStore,
    reply: &ScrapedTweet,
) -> Result<Vec<TweetRecord>> {
    let mut next = None;
    for parent_id in reply
        .in_reply_to_status_id
        .iter()
        .chain(reply.conversation_id.iter())
    {
        next = store.find_by_tweet_id(parent_id).await?;
        if next.is_some() {
            break;
        }
        debug!("Tweet {} above {} is not stored", parent_id, reply.id);
    }

    let mut ancestors = Vec::new();
    let mut visited = HashSet::new();
    while let Some(record) = next.take() {
        if !visited.insert(record.id) {
            return Err(Error::ChainCycle {
                tweet_id: reply.id.clone(),
                record_id: record.id,
            });
        }
        if ancestors.len() == MAX_CHAIN_DEPTH {
            return Err(Error::ChainTooDeep {
                tweet_id: reply.id.clone(),
                max_depth: MAX_CHAIN_DEPTH,
            });
        }

        if let Some(parent) = record.reply_to {
            next = store.find_by_id(parent).await?;
            if next.is_none() {
                debug!("Record {} links to missing record {}", record.id, parent);
            }
        }
        ancestors.push(record);
    }

    ancestors.reverse();
    Ok(ancestors)
}

/// Finds new replies to the account's recent tweets and rebuilds their chains.
///
/// A failed conversation query or a broken chain is logged, recorded in
/// [`ReplyScan::failed_queries`] and skipped. Store errors abort the scan.
pub async fn get_latest_replies(ctx: &Context) -> Result<ReplyScan> {
    let since = Utc::now() - Duration::days(RETENTION_DAYS);
    let own_records = ctx.store.recent_by_author(ctx.username(), since).await?;
    info!(
        "Scanning {} recent tweets by @{} for replies",
        own_records.len(),
        ctx.username()
    );

    let mut scan = ReplyScan::default();
    let mut seen = HashSet::new();
    let mut replies = Vec::new();

    for record in &own_records {
        let conversation_id = record
            .tweet
            .conversation_id
            .as_deref()
            .unwrap_or(&record.tweet_id);
        let found = match replies_to(
            ctx.scraper.as_ref(),
            conversation_id,
            ctx.username(),
            REPLY_LIMIT,
        )
        .await
        {
            Ok(found) => found,
            Err(failure) => {
                warn!("Skipping conversation {}: {}", conversation_id, failure);
                scan.failed_queries.push(failure.query);
                continue;
            }
        };

        for reply in found {
            if !ctx.is_after_cutoff(reply.timestamp) {
                debug!("Reply {} predates the service cutoff", reply.id);
                continue;
            }
            if seen.contains(&reply.id) {
                continue;
            }
            if ctx.store.exists(&reply.id).await? {
                debug!("Reply {} is already stored", reply.id);
                continue;
            }
            seen.insert(reply.id.clone());
            replies.push(reply);
        }
    }

    for reply in replies {
        match get_tweet_links(ctx.store.as_ref(), &reply).await {
            Ok(ancestors) => scan.chains.push(ReplyChain { ancestors, reply }),
            Err(Error::Database(e)) => return Err(Error::Database(e)),
            Err(e) => {
                error!("Skipping reply {}: {}", reply.id, e);
                scan.failed_queries.push(format!("chain:{}", reply.id));
            }
        }
    }

    info!(
        "Found {} new reply chains ({} failed lookups)",
        scan.chains.len(),
        scan.failed_queries.len()
    );
    Ok(scan)
}

/// New tweets that mention the account without replying to it.
pub async fn get_latest_refer_tweets(ctx: &Context) -> Result<Vec<ScrapedTweet>> {
    let mentions = mentions_of(ctx.scraper.as_ref(), ctx.username()).await?;

    let mut fresh = Vec::new();
    for tweet in mentions {
        if tweet.is_reply
            || tweet.is_authored_by(ctx.username())
            || !ctx.is_after_cutoff(tweet.timestamp)
        {
            continue;
        }
        if ctx.store.exists(&tweet.id).await? {
            continue;
        }
        fresh.push(tweet);
    }

    info!("Found {} new mentions of @{}", fresh.len(), ctx.username());
    Ok(fresh)
}
