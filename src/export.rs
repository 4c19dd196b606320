//! CSV export of scraped tweets.

use log::info;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::Result;
use crate::twitter::ScrapedTweet;

pub const CSV_HEADER: [&str; 5] = ["Username", "Text", "Timestamp", "URLs", "HTML"];

/// Writes a header row and one row per tweet to `writer`.
///
/// Missing fields become `unknown` for the username and empty cells otherwise.
pub fn export_csv<W: Write>(writer: W, tweets: &[ScrapedTweet]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(CSV_HEADER)?;
    for tweet in tweets {
        let timestamp = tweet.timestamp.map(|ts| ts.to_string()).unwrap_or_default();
        csv.write_record([
            tweet.username.as_deref().unwrap_or("unknown"),
            tweet.text.as_deref().unwrap_or(""),
            timestamp.as_str(),
            tweet.urls.join(", ").as_str(),
            tweet.html.as_deref().unwrap_or(""),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

/// Creates (or truncates) `path` and exports `tweets` into it.
pub fn export_to_path(path: &Path, tweets: &[ScrapedTweet]) -> Result<()> {
    let file = File::create(path)?;
    export_csv(file, tweets)?;
    info!("Wrote {} tweets to {}", tweets.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::tweet;

    fn render(tweets: &[ScrapedTweet]) -> String {
        let mut out = Vec::new();
        export_csv(&mut out, tweets).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn empty_export_is_header_only() {
        assert_eq!(render(&[]), "Username,Text,Timestamp,URLs,HTML\n");
    }

    #[test]
    fn missing_fields_use_defaults() {
        let bare = ScrapedTweet {
            id: "1".to_string(),
            ..Default::default()
        };
        assert_eq!(
            render(&[bare]),
            "Username,Text,Timestamp,URLs,HTML\nunknown,,,,\n"
        );
    }

    #[test]
    fn rows_quote_embedded_separators() {
        let mut t = tweet("1", "alice", 1_700_000_000);
        t.text = Some("hi, \"there\"".to_string());
        t.urls = vec!["https://a.example".to_string(), "https://b.example".to_string()];
        t.html = Some("<p>hi</p>".to_string());
        let lines: Vec<String> = render(&[t]).lines().map(str::to_string).collect();
        assert_eq!(
            lines[1],
            "alice,\"hi, \"\"there\"\"\",1700000000,\"https://a.example, https://b.example\",<p>hi</p>"
        );
    }

    #[test]
    fn writes_to_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replies.csv");
        export_to_path(&path, &[tweet("1", "alice", 5)]).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.starts_with("Username,"));
    }
}
