//! Tweet creation for the web API.
//!
//! Images are uploaded first through the v1.1 media endpoint; the returned media ids
//! are attached to the `CreateTweet` mutation.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{debug, info, warn};
use serde_json::{json, Value};

use super::api::{sanitize_for_logging, WebScraper};
use super::search::timeline_features;
use super::{MediaAttachment, ScraperError};

const CREATE_TWEET: &str = "a1p9RWpkYKBjWv_I3WzS-A/CreateTweet";
const MEDIA_UPLOAD_URL: &str = "https://upload.x.com/1.1/media/upload.json";
/// Images accepted per tweet.
pub const MAX_MEDIA: usize = 4;

/// Builds the `CreateTweet` variables.
pub(crate) fn create_tweet_variables(
    text: &str,
    reply_to: Option<&str>,
    media_ids: &[String],
) -> Value {
    let media_entities: Vec<Value> = media_ids
        .iter()
        .map(|id| json!({ "media_id": id, "tagged_users": [] }))
        .collect();

    let mut variables = json!({
        "tweet_text": text,
        "dark_request": false,
        "media": {
            "media_entities": media_entities,
            "possibly_sensitive": false
        },
        "semantic_annotation_ids": []
    });
    if let Some(reply_to) = reply_to {
        variables["reply"] = json!({
            "in_reply_to_tweet_id": reply_to,
            "exclude_reply_user_ids": []
        });
    }
    variables
}

impl WebScraper {
    pub(crate) async fn create_tweet(
        &self,
        text: &str,
        reply_to: Option<&str>,
        media: &[MediaAttachment],
    ) -> Result<(), ScraperError> {
        self.require_session().await?;
        info!(
            "Sending tweet ({} chars, reply to: {}): '{}'",
            text.chars().count(),
            reply_to.unwrap_or("none"),
            sanitize_for_logging(text, 80)
        );

        if media.len() > MAX_MEDIA {
            warn!(
                "Dropping {} media items beyond the limit of {}",
                media.len() - MAX_MEDIA,
                MAX_MEDIA
            );
        }
        let mut media_ids = Vec::new();
        for attachment in media.iter().take(MAX_MEDIA) {
            media_ids.push(self.upload_media(attachment).await?);
        }

        let (operation_id, operation_name) = CREATE_TWEET
            .split_once('/')
            .unwrap_or(("", CREATE_TWEET));
        let payload = json!({
            "variables": create_tweet_variables(text, reply_to, &media_ids),
            "features": timeline_features(),
            "queryId": operation_id,
        });
        debug!("CreateTweet operation {}", operation_name);

        let url = format!("https://x.com/i/api/graphql/{}", CREATE_TWEET);
        let json = self
            .send_request(self.client.post(&url).json(&payload), "create_tweet")
            .await?;

        match json["data"]["create_tweet"]["tweet_results"]["result"]
            .get("rest_id")
            .and_then(|v| v.as_str())
        {
            Some(id) => info!("Tweet accepted, reported id {}", id),
            None => info!("Tweet accepted without a reported id"),
        }
        Ok(())
    }

    async fn upload_media(&self, attachment: &MediaAttachment) -> Result<String, ScraperError> {
        info!(
            "Uploading {} bytes of {}",
            attachment.data.len(),
            attachment.media_type
        );
        let encoded = STANDARD.encode(&attachment.data);
        let request_builder = self
            .client
            .post(MEDIA_UPLOAD_URL)
            .form(&[("media_data", encoded.as_str())]);

        let json = self.send_request(request_builder, "media_upload").await?;
        json.get("media_id_string")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| ScraperError::Unexpected("media_id_string missing".to_string()))
    }
}
