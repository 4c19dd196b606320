//! Handles shared by every orchestration operation.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::Account;
use crate::db::TweetStore;
use crate::twitter::Scraper;

/// The scraper, the record store and the account the service acts as.
#[derive(Clone)]
pub struct Context {
    pub scraper: Arc<dyn Scraper>,
    pub store: Arc<dyn TweetStore>,
    pub account: Account,
    /// Content published before this instant is ignored. `None` keeps everything.
    pub service_from: Option<DateTime<Utc>>,
}

impl Context {
    pub fn new(
        scraper: Arc<dyn Scraper>,
        store: Arc<dyn TweetStore>,
        account: Account,
        service_from: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            scraper,
            store,
            account,
            service_from,
        }
    }

    pub fn username(&self) -> &str {
        &self.account.username
    }

    /// Whether a tweet published at `timestamp` (unix seconds) is at or after the cutoff.
    ///
    /// A missing timestamp counts as before the cutoff.
    pub fn is_after_cutoff(&self, timestamp: Option<i64>) -> bool {
        let Some(cutoff) = self.service_from else {
            return true;
        };
        match timestamp {
            Some(ts) => ts.saturating_mul(1000) >= cutoff.timestamp_millis(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeScraper, MemoryTweetStore};
    use chrono::TimeZone;

    fn context(service_from: Option<DateTime<Utc>>) -> Context {
        Context::new(
            Arc::new(FakeScraper::new("bot")),
            Arc::new(MemoryTweetStore::new()),
            Account {
                username: "bot".to_string(),
                password: "pw".to_string(),
                email: "bot@example.com".to_string(),
            },
            service_from,
        )
    }

    #[test]
    fn cutoff_is_inclusive() {
        let cutoff = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let ctx = context(Some(cutoff));
        assert!(ctx.is_after_cutoff(Some(cutoff.timestamp())));
        assert!(ctx.is_after_cutoff(Some(cutoff.timestamp() + 1)));
        assert!(!ctx.is_after_cutoff(Some(cutoff.timestamp() - 1)));
        assert!(!ctx.is_after_cutoff(None));
    }

    #[test]
    fn no_cutoff_keeps_everything() {
        let ctx = context(None);
        assert!(ctx.is_after_cutoff(None));
        assert!(ctx.is_after_cutoff(Some(0)));
    }
}
