//! Test doubles for the scraper and the record store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Map;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::db::{NewTweetRecord, TweetRecord, TweetStore};
use crate::error::Result;
use crate::session::StoredCookie;
use crate::twitter::{MediaAttachment, ScrapedTweet, Scraper, ScraperError, SearchMode, TweetPage};

pub fn tweet(id: &str, username: &str, timestamp: i64) -> ScrapedTweet {
    ScrapedTweet {
        id: id.to_string(),
        conversation_id: Some(id.to_string()),
        username: Some(username.to_string()),
        text: Some(format!("tweet {}", id)),
        html: Some(format!("<p>tweet {}</p>", id)),
        timestamp: Some(timestamp),
        ..Default::default()
    }
}

pub fn reply(id: &str, username: &str, timestamp: i64, parent: &str, conversation: &str) -> ScrapedTweet {
    ScrapedTweet {
        conversation_id: Some(conversation.to_string()),
        is_reply: true,
        in_reply_to_status_id: Some(parent.to_string()),
        ..tweet(id, username, timestamp)
    }
}

#[derive(Debug, Clone)]
pub struct SentTweet {
    pub text: String,
    pub reply_to: Option<String>,
    pub media_count: usize,
}

struct Pending {
    tweet: ScrapedTweet,
    hidden_lookups: usize,
}

#[derive(Default)]
struct FakeState {
    searches: HashMap<String, Vec<ScrapedTweet>>,
    failing_queries: HashSet<String>,
    timeline: Vec<ScrapedTweet>,
    endless: bool,
    login_fails: bool,
    logged_in: bool,
    logins: usize,
    installed: Vec<String>,
    sent: Vec<SentTweet>,
    search_calls: Vec<String>,
    scheduled: Option<Pending>,
    pending: Option<Pending>,
}

impl FakeState {
    fn reveal_pending(&mut self) {
        let Some(mut pending) = self.pending.take() else {
            return;
        };
        if pending.hidden_lookups > 0 {
            pending.hidden_lookups -= 1;
            self.pending = Some(pending);
            return;
        }
        if let Some(conversation) = pending.tweet.conversation_id.clone() {
            self.searches
                .entry(format!("conversation_id:{}", conversation))
                .or_default()
                .insert(0, pending.tweet.clone());
        }
        self.timeline.insert(0, pending.tweet);
    }
}

/// Scripted [`Scraper`] recording every call.
pub struct FakeScraper {
    username: String,
    state: Mutex<FakeState>,
}

impl FakeScraper {
    pub fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            state: Mutex::new(FakeState::default()),
        }
    }

    pub fn with_search(self, query: &str, tweets: Vec<ScrapedTweet>) -> Self {
        self.state
            .lock()
            .unwrap()
            .searches
            .insert(query.to_string(), tweets);
        self
    }

    pub fn with_timeline(self, tweets: Vec<ScrapedTweet>) -> Self {
        self.state.lock().unwrap().timeline = tweets;
        self
    }

    pub fn fail_query(&self, query: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_queries
            .insert(query.to_string());
    }

    /// Every search or timeline page returns one tweet and a further cursor.
    pub fn make_endless(&self) {
        self.state.lock().unwrap().endless = true;
    }

    pub fn fail_login(&self) {
        self.state.lock().unwrap().login_fails = true;
    }

    /// After the next `send_tweet`, `tweet` shows up once `hidden_lookups` lookups have missed it.
    pub fn publish_as(&self, tweet: ScrapedTweet, hidden_lookups: usize) {
        self.state.lock().unwrap().scheduled = Some(Pending {
            tweet,
            hidden_lookups,
        });
    }

    pub fn login_count(&self) -> usize {
        self.state.lock().unwrap().logins
    }

    pub fn installed_cookies(&self) -> Vec<String> {
        self.state.lock().unwrap().installed.clone()
    }

    pub fn sent(&self) -> Vec<SentTweet> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn search_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().search_calls.clone()
    }

    /// The cookies a successful login produces.
    pub fn session_cookies(&self) -> Vec<StoredCookie> {
        ["auth_token", "ct0"]
            .iter()
            .map(|name| StoredCookie {
                key: name.to_string(),
                value: format!("{}-for-{}", name, self.username),
                domain: Some("x.com".to_string()),
                path: Some("/".to_string()),
                secure: Some(true),
                http_only: None,
                expires: None,
                max_age: None,
                same_site: None,
                extra: Map::new(),
            })
            .collect()
    }
}

#[async_trait]
impl Scraper for FakeScraper {
    async fn set_cookies(&self, cookies: &[String]) -> Result<(), ScraperError> {
        let mut state = self.state.lock().unwrap();
        state.installed = cookies.to_vec();
        state.logged_in = true;
        Ok(())
    }

    async fn login(
        &self,
        _username: &str,
        _password: &str,
        _email: Option<&str>,
    ) -> Result<(), ScraperError> {
        let mut state = self.state.lock().unwrap();
        state.logins += 1;
        if state.login_fails {
            return Err(ScraperError::Login("login was denied".to_string()));
        }
        state.logged_in = true;
        Ok(())
    }

    async fn get_cookies(&self) -> Result<Vec<StoredCookie>, ScraperError> {
        let logged_in = self.state.lock().unwrap().logged_in;
        Ok(if logged_in {
            self.session_cookies()
        } else {
            Vec::new()
        })
    }

    async fn search_tweets(
        &self,
        query: &str,
        count: usize,
        _mode: SearchMode,
        _cursor: Option<&str>,
    ) -> Result<TweetPage, ScraperError> {
        let mut state = self.state.lock().unwrap();
        state.search_calls.push(query.to_string());
        state.reveal_pending();

        if state.failing_queries.contains(query) {
            return Err(ScraperError::Api {
                status: 500,
                message: "search unavailable".to_string(),
            });
        }
        if state.endless {
            let n = state.search_calls.len();
            return Ok(TweetPage {
                tweets: vec![tweet(&format!("endless-{}", n), "someone", 0)],
                next_cursor: Some(format!("cursor-{}", n)),
            });
        }

        let tweets = state
            .searches
            .get(query)
            .map(|t| t.iter().take(count).cloned().collect())
            .unwrap_or_default();
        Ok(TweetPage {
            tweets,
            next_cursor: None,
        })
    }

    async fn get_tweets(
        &self,
        username: &str,
        count: usize,
        _cursor: Option<&str>,
    ) -> Result<TweetPage, ScraperError> {
        let mut state = self.state.lock().unwrap();
        state.search_calls.push(format!("timeline:{}", username));
        state.reveal_pending();

        if state.endless {
            let n = state.search_calls.len();
            return Ok(TweetPage {
                tweets: vec![tweet(&format!("endless-{}", n), username, 0)],
                next_cursor: Some(format!("cursor-{}", n)),
            });
        }

        let tweets = state
            .timeline
            .iter()
            .filter(|t| t.is_authored_by(username))
            .take(count)
            .cloned()
            .collect();
        Ok(TweetPage {
            tweets,
            next_cursor: None,
        })
    }

    async fn send_tweet(
        &self,
        text: &str,
        reply_to: Option<&str>,
        media: &[MediaAttachment],
    ) -> Result<(), ScraperError> {
        let mut state = self.state.lock().unwrap();
        state.sent.push(SentTweet {
            text: text.to_string(),
            reply_to: reply_to.map(str::to_string),
            media_count: media.len(),
        });
        state.pending = state.scheduled.take();
        Ok(())
    }
}

/// In-memory [`TweetStore`].
#[derive(Default)]
pub struct MemoryTweetStore {
    records: Mutex<Vec<TweetRecord>>,
}

impl MemoryTweetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a record created at `created_at`, bypassing the async API.
    pub fn seed_at(&self, record: NewTweetRecord, created_at: DateTime<Utc>) -> TweetRecord {
        let mut records = self.records.lock().unwrap();
        let stored = TweetRecord {
            id: records.len() as i64 + 1,
            tweet_id: record.tweet_id,
            tweet_pub_date: record.tweet_pub_date,
            tweeter_username: record.tweeter_username,
            sender: record.sender,
            html: record.html,
            reply_to: record.reply_to,
            tweet: record.tweet,
            character: record.character,
            created_at,
        };
        records.push(stored.clone());
        stored
    }

    pub fn seed(&self, tweet: ScrapedTweet, reply_to: Option<i64>) -> TweetRecord {
        self.seed_at(NewTweetRecord::from_scraped(tweet, reply_to, None), Utc::now())
    }

    /// Rewrites a record's parent link, for building inconsistent graphs.
    pub fn relink(&self, id: i64, reply_to: Option<i64>) {
        let mut records = self.records.lock().unwrap();
        if let Some(record) = records.iter_mut().find(|r| r.id == id) {
            record.reply_to = reply_to;
        }
    }

    pub fn records(&self) -> Vec<TweetRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl TweetStore for MemoryTweetStore {
    async fn exists(&self, tweet_id: &str) -> Result<bool> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .any(|r| r.tweet_id == tweet_id))
    }

    async fn find_by_tweet_id(&self, tweet_id: &str) -> Result<Option<TweetRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.tweet_id == tweet_id)
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<TweetRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn recent_by_author(
        &self,
        username: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<TweetRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.tweeter_username == username && r.created_at > since)
            .cloned()
            .collect())
    }

    async fn insert(&self, record: NewTweetRecord) -> Result<TweetRecord> {
        Ok(self.seed_at(record, Utc::now()))
    }
}
