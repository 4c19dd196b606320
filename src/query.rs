//! Read queries against the scraper.
//!
//! Every lookup drains a cursor-paginated stream up to a result limit and returns
//! `Result<Vec<ScrapedTweet>, QueryFailure>`, so an empty result always means
//! "no matches" and never "the call failed".

use log::{debug, error, info, warn};

use crate::error::QueryFailure;
use crate::twitter::{sanitize_for_logging, ScrapedTweet, Scraper, ScraperError, SearchMode};

/// Upper bound on page fetches for a single lookup.
pub const MAX_PAGES: usize = 20;

pub const REPLY_LIMIT: usize = 100;
pub const QUOTE_LIMIT: usize = 10;
pub const MENTION_LIMIT: usize = 100;

pub fn conversation_query(conversation_id: &str) -> String {
    format!("conversation_id:{}", conversation_id)
}

pub fn quote_query(tweet_id: &str) -> String {
    format!("quoted_tweet_id:{}", tweet_id)
}

pub fn mention_query(username: &str) -> String {
    format!("@{}", username)
}

/// Drains search results for `query` until `limit` tweets are collected.
pub async fn collect_search(
    scraper: &dyn Scraper,
    query: &str,
    limit: usize,
    mode: SearchMode,
) -> Result<Vec<ScrapedTweet>, QueryFailure> {
    info!("Searching '{}' (limit {})", sanitize_for_logging(query, 80), limit);
    let mut tweets = Vec::new();
    let mut cursor: Option<String> = None;

    for page_number in 1..=MAX_PAGES {
        let page = scraper
            .search_tweets(query, limit - tweets.len(), mode, cursor.as_deref())
            .await
            .map_err(|e| fail(query, e))?;
        debug!(
            "Page {} of '{}' returned {} tweets",
            page_number,
            query,
            page.tweets.len()
        );

        if page.tweets.is_empty() {
            break;
        }
        tweets.extend(page.tweets);
        if tweets.len() >= limit {
            tweets.truncate(limit);
            break;
        }
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
        if page_number == MAX_PAGES {
            warn!(
                "Stopped '{}' after {} pages with {} of {} tweets",
                query,
                MAX_PAGES,
                tweets.len(),
                limit
            );
        }
    }

    info!("'{}' returned {} tweets", sanitize_for_logging(query, 80), tweets.len());
    Ok(tweets)
}

/// Drains `username`'s timeline, keeping only tweets they authored.
pub async fn own_tweets(
    scraper: &dyn Scraper,
    username: &str,
    limit: usize,
) -> Result<Vec<ScrapedTweet>, QueryFailure> {
    let query = format!("timeline:@{}", username);
    let mut tweets = Vec::new();
    let mut cursor: Option<String> = None;

    for page_number in 1..=MAX_PAGES {
        let page = scraper
            .get_tweets(username, limit - tweets.len(), cursor.as_deref())
            .await
            .map_err(|e| fail(&query, e))?;
        if page.tweets.is_empty() {
            break;
        }
        tweets.extend(page.tweets.into_iter().filter(|t| t.is_authored_by(username)));
        if tweets.len() >= limit {
            tweets.truncate(limit);
            break;
        }
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
        if page_number == MAX_PAGES {
            warn!(
                "Stopped timeline of @{} after {} pages with {} of {} tweets",
                username,
                MAX_PAGES,
                tweets.len(),
                limit
            );
        }
    }

    debug!("Timeline of @{} returned {} own tweets", username, tweets.len());
    Ok(tweets)
}

/// Removes all and only the tweets authored by `own_username`.
pub fn exclude_own(tweets: Vec<ScrapedTweet>, own_username: &str) -> Vec<ScrapedTweet> {
    tweets
        .into_iter()
        .filter(|t| !t.is_authored_by(own_username))
        .collect()
}

/// Replies in a conversation, excluding the account's own.
pub async fn replies_to(
    scraper: &dyn Scraper,
    conversation_id: &str,
    own_username: &str,
    limit: usize,
) -> Result<Vec<ScrapedTweet>, QueryFailure> {
    let tweets = collect_search(
        scraper,
        &conversation_query(conversation_id),
        limit,
        SearchMode::Latest,
    )
    .await?;
    Ok(exclude_own(tweets, own_username))
}

/// Quote tweets of `tweet_id`, excluding the account's own.
pub async fn quotes_of(
    scraper: &dyn Scraper,
    tweet_id: &str,
    own_username: &str,
) -> Result<Vec<ScrapedTweet>, QueryFailure> {
    let tweets = collect_search(scraper, &quote_query(tweet_id), QUOTE_LIMIT, SearchMode::Latest)
        .await?;
    Ok(exclude_own(tweets, own_username))
}

/// Tweets mentioning `username`. Self-authored mentions are left for the caller to filter.
pub async fn mentions_of(
    scraper: &dyn Scraper,
    username: &str,
) -> Result<Vec<ScrapedTweet>, QueryFailure> {
    collect_search(
        scraper,
        &mention_query(username),
        MENTION_LIMIT,
        SearchMode::Latest,
    )
    .await
}

fn fail(query: &str, source: ScraperError) -> QueryFailure {
    error!(
        "Query '{}' failed: {}",
        sanitize_for_logging(query, 80),
        sanitize_for_logging(&source.to_string(), 200)
    );
    QueryFailure {
        query: query.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{tweet, FakeScraper};

    #[test]
    fn exclude_own_removes_only_own_tweets() {
        let tweets = vec![
            tweet("1", "alice", 0),
            tweet("2", "bot", 0),
            tweet("3", "bob", 0),
            tweet("4", "bot2", 0),
            ScrapedTweet {
                username: None,
                ..tweet("5", "x", 0)
            },
        ];
        let kept: Vec<String> = exclude_own(tweets, "bot").into_iter().map(|t| t.id).collect();
        assert_eq!(kept, vec!["1", "3", "4", "5"]);
    }

    #[tokio::test]
    async fn replies_exclude_the_account() {
        let scraper = FakeScraper::new("bot").with_search(
            "conversation_id:100",
            vec![tweet("1", "alice", 0), tweet("2", "bot", 0)],
        );
        let replies = replies_to(&scraper, "100", "bot", REPLY_LIMIT).await.unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].id, "1");
    }

    #[tokio::test]
    async fn limit_truncates_results() {
        let scraper = FakeScraper::new("bot").with_search(
            "quoted_tweet_id:7",
            (0..15).map(|i| tweet(&i.to_string(), "alice", 0)).collect(),
        );
        let quotes = quotes_of(&scraper, "7", "bot").await.unwrap();
        assert_eq!(quotes.len(), QUOTE_LIMIT);
    }

    #[tokio::test]
    async fn endless_cursor_stops_at_page_bound() {
        let scraper = FakeScraper::new("bot");
        scraper.make_endless();
        let tweets = collect_search(&scraper, "anything", 1000, SearchMode::Latest)
            .await
            .unwrap();
        assert_eq!(tweets.len(), MAX_PAGES);
        assert_eq!(scraper.search_calls().len(), MAX_PAGES);
    }

    #[tokio::test]
    async fn endless_timeline_stops_at_page_bound() {
        let scraper = FakeScraper::new("bot");
        scraper.make_endless();
        let tweets = own_tweets(&scraper, "bot", 1000).await.unwrap();
        assert_eq!(tweets.len(), MAX_PAGES);
        assert_eq!(scraper.search_calls().len(), MAX_PAGES);
    }

    #[tokio::test]
    async fn failure_is_tagged_with_query() {
        let scraper = FakeScraper::new("bot");
        scraper.fail_query("@bot");
        let failure = mentions_of(&scraper, "bot").await.unwrap_err();
        assert_eq!(failure.query, "@bot");
        assert!(matches!(failure.source, ScraperError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn no_matches_is_an_empty_success() {
        let scraper = FakeScraper::new("bot");
        let replies = replies_to(&scraper, "404", "bot", REPLY_LIMIT).await.unwrap();
        assert!(replies.is_empty());
    }

    #[tokio::test]
    async fn own_tweets_keeps_only_the_account() {
        let scraper = FakeScraper::new("bot")
            .with_timeline(vec![tweet("1", "bot", 0), tweet("2", "alice", 0)]);
        let tweets = own_tweets(&scraper, "bot", 10).await.unwrap();
        assert_eq!(tweets.len(), 1);
        assert_eq!(tweets[0].id, "1");
    }
}
