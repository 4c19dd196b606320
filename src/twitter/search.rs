//! Tweet search and user timeline fetching.
//!
//! Both go through GraphQL GET endpoints whose `variables` and `features` travel
//! as URL-encoded JSON.

use log::{debug, info};
use serde_json::{json, Value};

use super::api::WebScraper;
use super::parsing::parse_timeline;
use super::{ScraperError, SearchMode, TweetPage};

const GRAPHQL_BASE: &str = "https://x.com/i/api/graphql";
const SEARCH_TIMELINE: &str = "nK1dw4oV3k4w5TdtcAdSww/SearchTimeline";
const USER_BY_SCREEN_NAME: &str = "G3KGOASz96M-Qu0nwmGXNg/UserByScreenName";
const USER_TWEETS: &str = "E3opETHurmVJflFsUBVuUQ/UserTweets";

/// Search caps a page at this many results.
const MAX_SEARCH_PAGE: usize = 50;

pub(crate) fn timeline_features() -> Value {
    json!({
        "rweb_lists_timeline_redesign_enabled": true,
        "responsive_web_graphql_exclude_directive_enabled": true,
        "verified_phone_label_enabled": false,
        "creator_subscriptions_tweet_preview_api_enabled": true,
        "responsive_web_graphql_timeline_navigation_enabled": true,
        "responsive_web_graphql_skip_user_profile_image_extensions_enabled": false,
        "tweetypie_unmention_optimization_enabled": true,
        "responsive_web_edit_tweet_api_enabled": true,
        "graphql_is_translatable_rweb_tweet_is_translatable_enabled": true,
        "view_counts_everywhere_api_enabled": true,
        "longform_notetweets_consumption_enabled": true,
        "tweet_awards_web_tipping_enabled": false,
        "freedom_of_speech_not_reach_fetch_enabled": true,
        "standardized_nudges_misinfo": true,
        "longform_notetweets_rich_text_read_enabled": true,
        "longform_notetweets_inline_media_enabled": true,
        "responsive_web_enhance_cards_enabled": false
    })
}

pub(crate) fn graphql_url(operation: &str, variables: &Value, features: &Value) -> String {
    format!(
        "{}/{}?variables={}&features={}",
        GRAPHQL_BASE,
        operation,
        urlencoding::encode(&variables.to_string()),
        urlencoding::encode(&features.to_string())
    )
}

pub(crate) fn search_variables(
    query: &str,
    count: usize,
    mode: SearchMode,
    cursor: Option<&str>,
) -> Value {
    let mut variables = json!({
        "rawQuery": query,
        "count": count.clamp(1, MAX_SEARCH_PAGE),
        "querySource": "typed_query",
        "product": mode.product(),
    });
    if let Some(cursor) = cursor {
        variables["cursor"] = json!(cursor);
    }
    variables
}

impl WebScraper {
    pub(crate) async fn fetch_search_page(
        &self,
        query: &str,
        count: usize,
        mode: SearchMode,
        cursor: Option<&str>,
    ) -> Result<TweetPage, ScraperError> {
        self.require_session().await?;
        info!("Searching tweets: {} ({:?})", query, mode);

        let variables = search_variables(query, count, mode, cursor);
        let url = graphql_url(SEARCH_TIMELINE, &variables, &timeline_features());
        debug!("Search URL: {}", url);

        let json = self
            .send_request(self.client.get(&url), "search_tweets")
            .await?;

        let instructions =
            &json["data"]["search_by_raw_query"]["search_timeline"]["timeline"]["instructions"];
        Ok(parse_timeline(instructions))
    }

    pub(crate) async fn fetch_user_tweets_page(
        &self,
        username: &str,
        count: usize,
        cursor: Option<&str>,
    ) -> Result<TweetPage, ScraperError> {
        self.require_session().await?;
        let user_id = self.lookup_user_id(username).await?;
        info!("Fetching timeline of @{} ({})", username, user_id);

        let mut variables = json!({
            "userId": user_id,
            "count": count.clamp(1, 200),
            "includePromotedContent": false,
            "withQuickPromoteEligibilityTweetFields": false,
            "withVoice": true,
            "withV2Timeline": true,
        });
        if let Some(cursor) = cursor {
            variables["cursor"] = json!(cursor);
        }
        let url = graphql_url(USER_TWEETS, &variables, &timeline_features());

        let json = self
            .send_request(self.client.get(&url), "user_tweets")
            .await?;

        let result = &json["data"]["user"]["result"];
        let timeline = if result["timeline_v2"].is_null() {
            &result["timeline"]
        } else {
            &result["timeline_v2"]
        };
        Ok(parse_timeline(&timeline["timeline"]["instructions"]))
    }

    async fn lookup_user_id(&self, username: &str) -> Result<String, ScraperError> {
        debug!("Looking up user id for @{}", username);
        let variables = json!({ "screen_name": username, "withSafetyModeUserFields": true });
        let features = json!({
            "hidden_profile_likes_enabled": false,
            "responsive_web_graphql_exclude_directive_enabled": true,
            "verified_phone_label_enabled": false,
            "subscriptions_verification_info_verified_since_enabled": true,
            "highlights_tweets_tab_ui_enabled": true,
            "creator_subscriptions_tweet_preview_api_enabled": true,
            "responsive_web_graphql_skip_user_profile_image_extensions_enabled": false,
            "responsive_web_graphql_timeline_navigation_enabled": true
        });
        let url = graphql_url(USER_BY_SCREEN_NAME, &variables, &features);

        let json = self
            .send_request(self.client.get(&url), "lookup_user")
            .await?;

        json["data"]["user"]["result"]
            .get("rest_id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| ScraperError::Unexpected(format!("user @{} not found", username)))
    }
}
