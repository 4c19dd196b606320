//! Parsing of GraphQL timeline payloads into [`ScrapedTweet`]s.
//!
//! Search and user timelines share one shape: a list of `instructions`, each
//! adding entries. Entries are either tweets, conversation modules wrapping
//! tweets, or cursors.

use chrono::DateTime;
use log::{debug, warn};
use serde_json::Value;

use super::{ScrapedTweet, TweetPage};

/// Walks the instructions of a timeline and collects tweets plus the bottom cursor.
pub(crate) fn parse_timeline(instructions: &Value) -> TweetPage {
    let mut page = TweetPage::default();

    let Some(instructions) = instructions.as_array() else {
        warn!("Timeline payload had no instructions array");
        return page;
    };

    for instruction in instructions {
        if let Some(entries) = instruction.get("entries").and_then(|e| e.as_array()) {
            for entry in entries {
                parse_entry(entry, &mut page);
            }
        }
        // TimelineReplaceEntry carries the refreshed cursor on later pages
        if let Some(entry) = instruction.get("entry") {
            parse_entry(entry, &mut page);
        }
    }

    debug!(
        "Parsed {} tweets from timeline (next cursor: {})",
        page.tweets.len(),
        page.next_cursor.is_some()
    );
    page
}

fn parse_entry(entry: &Value, page: &mut TweetPage) {
    let content = &entry["content"];

    if content.get("cursorType").and_then(|c| c.as_str()) == Some("Bottom") {
        page.next_cursor = content
            .get("value")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        return;
    }

    if let Some(result) = content["itemContent"]["tweet_results"].get("result") {
        if let Some(tweet) = parse_tweet_result(result) {
            page.tweets.push(tweet);
        }
        return;
    }

    if let Some(items) = content.get("items").and_then(|i| i.as_array()) {
        for item in items {
            if let Some(result) = item["item"]["itemContent"]["tweet_results"].get("result") {
                if let Some(tweet) = parse_tweet_result(result) {
                    page.tweets.push(tweet);
                }
            }
        }
    }
}

/// Converts one `tweet_results.result` object, unwrapping visibility wrappers.
pub(crate) fn parse_tweet_result(result: &Value) -> Option<ScrapedTweet> {
    let result = match result.get("__typename").and_then(|t| t.as_str()) {
        Some("TweetWithVisibilityResults") => result.get("tweet")?,
        Some("TweetTombstone") | Some("TweetUnavailable") => return None,
        _ => result,
    };

    let legacy = result.get("legacy")?;
    let id = result
        .get("rest_id")
        .or_else(|| legacy.get("id_str"))
        .and_then(|v| v.as_str())?
        .to_string();

    let user = &result["core"]["user_results"]["result"];
    let username = user["core"]
        .get("screen_name")
        .or_else(|| user["legacy"].get("screen_name"))
        .and_then(|v| v.as_str())
        .map(str::to_string);

    // Long posts keep their full text outside `legacy`
    let text = result["note_tweet"]["note_tweet_results"]["result"]
        .get("text")
        .or_else(|| legacy.get("full_text"))
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let timestamp = legacy
        .get("created_at")
        .and_then(|v| v.as_str())
        .and_then(parse_created_at);

    let urls = legacy["entities"]["urls"]
        .as_array()
        .map(|urls| {
            urls.iter()
                .filter_map(|u| u.get("expanded_url").and_then(|v| v.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let photos: Vec<String> = legacy["extended_entities"]["media"]
        .as_array()
        .map(|media| {
            media
                .iter()
                .filter(|m| m.get("type").and_then(|t| t.as_str()) == Some("photo"))
                .filter_map(|m| m.get("media_url_https").and_then(|v| v.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let in_reply_to_status_id = legacy
        .get("in_reply_to_status_id_str")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let html = text.as_deref().map(|t| render_html(t, &photos));

    Some(ScrapedTweet {
        id,
        conversation_id: legacy
            .get("conversation_id_str")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        username,
        text,
        html,
        timestamp,
        urls,
        photos,
        is_reply: in_reply_to_status_id.is_some(),
        in_reply_to_status_id,
    })
}

/// Parses the legacy `created_at` format, e.g. `Wed Oct 10 20:19:24 +0000 2018`.
pub(crate) fn parse_created_at(value: &str) -> Option<i64> {
    match DateTime::parse_from_str(value, "%a %b %d %H:%M:%S %z %Y") {
        Ok(dt) => Some(dt.timestamp()),
        Err(e) => {
            warn!("Failed to parse created_at '{}': {}", value, e);
            None
        }
    }
}

/// Renders tweet text as HTML: links, mentions and hashtags become anchors,
/// newlines become `<br>`, and photos are appended as images.
pub fn render_html(text: &str, photos: &[String]) -> String {
    let escaped = text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");

    let linked = match regex::Regex::new(r"(https?://[^\s<]+)|@(\w{1,15})|#(\w+)") {
        Ok(re) => re
            .replace_all(&escaped, |caps: &regex::Captures| {
                if let Some(url) = caps.get(1) {
                    format!(r#"<a href="{0}">{0}</a>"#, url.as_str())
                } else if let Some(user) = caps.get(2) {
                    format!(
                        r#"<a href="https://x.com/{0}">@{0}</a>"#,
                        user.as_str()
                    )
                } else if let Some(tag) = caps.get(3) {
                    format!(
                        r#"<a href="https://x.com/hashtag/{0}">#{0}</a>"#,
                        tag.as_str()
                    )
                } else {
                    caps[0].to_string()
                }
            })
            .into_owned(),
        Err(_) => escaped,
    };

    let mut html = linked.replace('\n', "<br>");
    for photo in photos {
        html.push_str(&format!(r#"<br><img src="{}"/>"#, photo));
    }
    html
}
