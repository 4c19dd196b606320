//! HTTP route handlers for the tweetchain service.
//!
//! This module contains the route handler functions and the router that binds
//! them. Every handler works through the shared [`AppState`].

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{error, info};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::chain::{get_latest_refer_tweets, get_latest_replies};
use crate::context::Context;
use crate::error::Error;
use crate::publish::{publish_tweet, PublishOptions, PublishRequest};
use crate::twitter::{sanitize_for_logging, MediaAttachment};

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub ctx: Context,
    pub publish: Arc<PublishOptions>,
}

impl AppState {
    pub fn new(ctx: Context, publish: PublishOptions) -> Self {
        Self {
            ctx,
            publish: Arc::new(publish),
        }
    }
}

type HandlerResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

/// Builds the application router without middleware.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/replies", get(handle_replies))
        .route("/mentions", get(handle_mentions))
        .route("/tweet", post(handle_tweet))
        .with_state(state)
}

fn error_response(context: &str, e: Error) -> (StatusCode, Json<Value>) {
    let status = match &e {
        Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        Error::TweetNotFound { .. } => StatusCode::NOT_FOUND,
        Error::Query(_) | Error::Scraper(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error!("{}: {}", context, sanitize_for_logging(&e.to_string(), 200));
    (
        status,
        Json(json!({"status": "error", "message": e.to_string()})),
    )
}

/// Handles GET requests to the `/health` endpoint.
///
/// # Example Response
///
/// ```json
/// {
///   "status": "healthy",
///   "service": "tweetchain"
/// }
/// ```
pub async fn handle_health() -> Json<Value> {
    Json(json!({"status": "healthy", "service": "tweetchain"}))
}

/// Handles GET requests to the `/replies` endpoint.
///
/// Scans the account's recent tweets for new replies and returns each reply
/// with its stored ancestors, root first.
///
/// # Success Response
///
/// ```json
/// {
///   "status": "ok",
///   "chains": [[{"id": "1", "...": "..."}, {"id": "2", "...": "..."}]],
///   "failed_queries": ["conversation_id:3"]
/// }
/// ```
pub async fn handle_replies(State(state): State<AppState>) -> HandlerResult {
    let scan = get_latest_replies(&state.ctx)
        .await
        .map_err(|e| error_response("Failed to scan replies", e))?;
    info!("Returning {} reply chains", scan.chains.len());

    let chains: Vec<Value> = scan
        .chains
        .iter()
        .map(|chain| json!(chain.tweets()))
        .collect();
    Ok(Json(json!({
        "status": "ok",
        "chains": chains,
        "failed_queries": scan.failed_queries,
    })))
}

/// Handles GET requests to the `/mentions` endpoint.
pub async fn handle_mentions(State(state): State<AppState>) -> HandlerResult {
    let tweets = get_latest_refer_tweets(&state.ctx)
        .await
        .map_err(|e| error_response("Failed to fetch mentions", e))?;
    Ok(Json(json!({"status": "ok", "tweets": tweets})))
}

#[derive(Debug, Deserialize)]
pub struct ImageBody {
    /// Base64-encoded bytes
    pub data: String,
    pub media_type: String,
}

#[derive(Debug, Deserialize)]
pub struct TweetBody {
    pub text: String,
    #[serde(default)]
    pub images: Vec<ImageBody>,
    pub reply_to: Option<String>,
    pub character: Option<String>,
    pub conversation_id: Option<String>,
}

impl TweetBody {
    fn into_request(self) -> Result<PublishRequest, Error> {
        if self.text.trim().is_empty() {
            return Err(Error::InvalidRequest("text must not be empty".to_string()));
        }
        let media = self
            .images
            .into_iter()
            .enumerate()
            .map(|(i, image)| {
                STANDARD
                    .decode(image.data.as_bytes())
                    .map(|data| MediaAttachment {
                        data,
                        media_type: image.media_type,
                    })
                    .map_err(|e| {
                        Error::InvalidRequest(format!("image {} is not valid base64: {}", i, e))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PublishRequest {
            text: self.text,
            media,
            reply_to: self.reply_to,
            character: self.character,
            conversation_id: self.conversation_id,
        })
    }
}

/// Handles POST requests to the `/tweet` endpoint.
///
/// Publishes the tweet, waits for it to appear on the platform and returns the
/// stored record.
///
/// # Request Body
///
/// ```json
/// {
///   "text": "Hello",
///   "images": [{"data": "<base64>", "media_type": "image/png"}],
///   "reply_to": "1790000000000000000",
///   "character": "narrator",
///   "conversation_id": "1790000000000000000"
/// }
/// ```
pub async fn handle_tweet(
    State(state): State<AppState>,
    Json(body): Json<TweetBody>,
) -> HandlerResult {
    let request = body
        .into_request()
        .map_err(|e| error_response("Rejected tweet request", e))?;

    let record = publish_tweet(&state.ctx, request, &state.publish)
        .await
        .map_err(|e| error_response("Failed to publish tweet", e))?;
    info!("Tweet {} stored as record {}", record.tweet_id, record.id);
    Ok(Json(json!(record)))
}
