use anyhow::{bail, Result};
use clap::Parser;
use reqwest::Url;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "bot")]
#[command(about = "Learn forum posts and answer new ones with the most similar earlier post")]
pub struct Cli {
    /// Base URL of the Flarum forum
    #[arg(long, env = "FLARUM_URL")]
    pub forum_url: Url,
    /// Account the bot logs in and replies as
    #[arg(long, env = "FLARUM_USERNAME")]
    pub username: String,
    #[arg(long, env = "FLARUM_PASSWORD", hide_env_values = true)]
    pub password: String,
    /// Minimum similarity for a reply, in [0, 1]
    #[arg(long, env = "REPLY_CONFIDENCE", default_value_t = engine::DEFAULT_CONFIDENCE_THRESHOLD)]
    pub confidence: f32,
    /// Seconds between refresh cycles
    #[arg(long, env = "REFRESH_INTERVAL_SECS", default_value_t = 300)]
    pub interval_secs: u64,
    /// Corpus database directory
    #[arg(long, env = "FORUM_DB", default_value = "./forum_ai.db")]
    pub db: PathBuf,
    /// Discussions fetched per cycle
    #[arg(long, env = "DISCUSSION_LIMIT", default_value_t = 10)]
    pub discussion_limit: usize,
    /// Appended to every reply so readers know it was automated
    #[arg(long, env = "REPLY_SIGNATURE", default_value = "THIS MESSAGE WAS SENT VIA AN AI ASSISTANT")]
    pub signature: String,
    /// Request timeout seconds
    #[arg(long, default_value_t = 15)]
    pub timeout_secs: u64,
    /// Run a single cycle and exit
    #[arg(long, default_value_t = false)]
    pub once: bool,
    /// Log replies instead of posting them
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

impl Cli {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence) {
            bail!("--confidence must be within [0, 1], got {}", self.confidence);
        }
        if self.interval_secs < 1 {
            bail!("--interval-secs must be >= 1");
        }
        if self.discussion_limit < 1 {
            bail!("--discussion-limit must be >= 1");
        }
        // an unsigned reply is a verbatim copy of its source post and would
        // be answered again on every later cycle
        if self.signature.trim().is_empty() {
            bail!("--signature must not be blank");
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Cli {
        let mut args = vec!["bot", "--forum-url", "https://forum.example.com", "--username", "helper", "--password", "pw"];
        args.extend_from_slice(extra);
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn defaults_are_valid() {
        let cli = parse(&[]);
        cli.validate().unwrap();
        assert_eq!(cli.confidence, 0.8);
        assert_eq!(cli.refresh_interval(), Duration::from_secs(300));
        assert_eq!(cli.discussion_limit, 10);
        assert!(!cli.once && !cli.dry_run);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(parse(&["--confidence", "1.5"]).validate().is_err());
        assert!(parse(&["--interval-secs", "0"]).validate().is_err());
        assert!(parse(&["--discussion-limit", "0"]).validate().is_err());
    }

    #[test]
    fn rejects_blank_signature() {
        assert!(parse(&["--signature", ""]).validate().is_err());
        assert!(parse(&["--signature", "   "]).validate().is_err());
        parse(&["--signature", "sent by a bot"]).validate().unwrap();
    }
}
