//! Quote Export Script
//!
//! Exports quote tweets of `TWEET_ID` to a CSV file, excluding the bot
//! account's own quotes.
//!
//! ```bash
//! cargo run --bin export_quotes -- quotes.csv
//! ```

use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;

use tweetchain::config::{Settings, EXPORT_REQUIRED};
use tweetchain::export::export_to_path;
use tweetchain::query::quotes_of;
use tweetchain::session::ensure_session;
use tweetchain::twitter::WebScraper;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    env_logger::init();

    println!("🔁 Quote Export");
    println!("===============");

    match run().await {
        Ok(path) => {
            println!("✅ Quotes written to {}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Quote export failed: {}", e);
            println!("❌ Quote export failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> tweetchain::Result<PathBuf> {
    let settings = Settings::from_env(EXPORT_REQUIRED)?;
    let output = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("quotes.csv"));
    let tweet_id = settings.tweet_id.clone().unwrap_or_default();

    let scraper = WebScraper::new()?;
    ensure_session(&scraper, &settings.account, &settings.cookies_path).await?;

    info!("Fetching quotes of tweet {}", tweet_id);
    let quotes = quotes_of(&scraper, &tweet_id, &settings.account.username).await?;
    println!("📥 Found {} quotes", quotes.len());

    export_to_path(&output, &quotes)?;
    Ok(output)
}
