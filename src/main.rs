//! # Tweetchain
//!
//! HTTP service driving a Twitter/X bot account: it reports new reply chains
//! and mentions, and publishes tweets while recording them in PostgreSQL.
//!
//! ## Environment Variables
//!
//! - `TWITTER_USERNAME`, `TWITTER_PASSWORD`, `TWITTER_EMAIL`: account credentials
//! - `SERVICE_FROM`: content published before this instant is ignored
//! - `DATABASE_URL`: PostgreSQL connection string
//! - `COOKIES_PATH`: session cookie cache (defaults to `cookies.json`)
//! - `PORT`: Server port (defaults to 3000)
//!
//! Variables may also be given in a `.env` file.
//!
//! ## API Endpoints
//!
//! - `GET /health`: Returns service health status
//! - `GET /replies`: Returns new reply chains
//! - `GET /mentions`: Returns new mentions
//! - `POST /tweet`: Publishes and stores a tweet

use log::{error, info};
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use tweetchain::config::{get_server_port, Settings, SERVICE_REQUIRED};
use tweetchain::db::{get_db_pool, PgTweetStore};
use tweetchain::{ensure_session, router, AppState, Context, PublishOptions, WebScraper};

/// Main entry point for the tweetchain web service.
///
/// Loads the configuration, connects to the database, restores or creates the
/// scraper session and serves requests until Ctrl-C.
///
/// # Example Usage
///
/// ```bash
/// # Run with default port 3000
/// cargo run
///
/// # Run with debug logging
/// RUST_LOG=debug cargo run
/// ```
///
/// # Exit Status
///
/// Exits with status 1 when configuration is missing, the database or the
/// platform cannot be reached at startup, or the server fails.
#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    env_logger::init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> tweetchain::Result<()> {
    let settings = Settings::from_env(SERVICE_REQUIRED)?;
    let database_url = settings.database_url.clone().unwrap_or_default();

    let pool = get_db_pool(&database_url).await?;
    let store = PgTweetStore::new(pool);
    store.create_tweets_table().await?;

    let scraper = WebScraper::new()?;
    ensure_session(&scraper, &settings.account, &settings.cookies_path).await?;

    let ctx = Context::new(
        Arc::new(scraper),
        Arc::new(store),
        settings.account.clone(),
        settings.service_from,
    );
    let app = router(AppState::new(ctx, PublishOptions::default()))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    let port = get_server_port()?;
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!("Starting tweetchain server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
