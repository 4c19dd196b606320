//! Reply Export Script
//!
//! Exports the replies in the conversation of `TWEET_ID` to a CSV file,
//! excluding the bot account's own replies.
//!
//! ```bash
//! cargo run --bin export_replies -- replies.csv
//! ```

use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;

use tweetchain::config::{Settings, EXPORT_REQUIRED};
use tweetchain::export::export_to_path;
use tweetchain::query::replies_to;
use tweetchain::session::ensure_session;
use tweetchain::twitter::WebScraper;

const REPLY_EXPORT_LIMIT: usize = 10;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    env_logger::init();

    println!("💬 Reply Export");
    println!("===============");

    match run().await {
        Ok(path) => {
            println!("✅ Replies written to {}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Reply export failed: {}", e);
            println!("❌ Reply export failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> tweetchain::Result<PathBuf> {
    let settings = Settings::from_env(EXPORT_REQUIRED)?;
    let output = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("replies.csv"));
    let tweet_id = settings.tweet_id.clone().unwrap_or_default();

    let scraper = WebScraper::new()?;
    ensure_session(&scraper, &settings.account, &settings.cookies_path).await?;

    info!("Fetching replies to tweet {}", tweet_id);
    let replies = replies_to(
        &scraper,
        &tweet_id,
        &settings.account.username,
        REPLY_EXPORT_LIMIT,
    )
    .await?;
    println!("📥 Found {} replies", replies.len());

    export_to_path(&output, &replies)?;
    Ok(output)
}
