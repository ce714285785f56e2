//! Command-line interface definitions.
//!
//! Every option can also come from the environment, which is how the bot is
//! usually deployed.

use clap::Parser;

/// Command-line arguments for the local news bot.
///
/// # Examples
///
/// ```sh
/// # Print one digest to stdout without delivering it
/// local_news_bot --dry-run
///
/// # Run on schedule, delivering through a messaging bridge
/// local_news_bot -c config.yaml --webhook-url http://127.0.0.1:3000/send -j ./runs
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to config.yaml file
    #[arg(short, long, env = "NEWS_BOT_CONFIG")]
    pub config: Option<String>,

    /// Run once immediately, deliver, and exit
    #[arg(long, env = "NEWS_BOT_ONCE")]
    pub once: bool,

    /// Scrape once and print the digest without delivering it
    #[arg(long, env = "NEWS_BOT_DRY_RUN", conflicts_with = "once")]
    pub dry_run: bool,

    /// Messaging bridge endpoint; chunks are printed to stdout when absent
    #[arg(long, env = "NEWS_BOT_WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// Override the configured destination chat
    #[arg(long, env = "NEWS_BOT_DESTINATION")]
    pub destination: Option<String>,

    /// Directory for per-run JSON archives
    #[arg(short, long, env = "NEWS_BOT_JSON_DIR")]
    pub json_output_dir: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "local_news_bot",
            "--config",
            "./config.yaml",
            "--once",
            "--webhook-url",
            "http://127.0.0.1:3000/send",
            "--destination",
            "123@g.us",
        ]);

        assert_eq!(cli.config.as_deref(), Some("./config.yaml"));
        assert!(cli.once);
        assert_eq!(cli.webhook_url.as_deref(), Some("http://127.0.0.1:3000/send"));
        assert_eq!(cli.destination.as_deref(), Some("123@g.us"));
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from(["local_news_bot", "-c", "/etc/bot.yaml", "-j", "/tmp/runs"]);

        assert_eq!(cli.config.as_deref(), Some("/etc/bot.yaml"));
        assert_eq!(cli.json_output_dir.as_deref(), Some("/tmp/runs"));
        assert!(!cli.once);
        assert!(!cli.dry_run);
    }

    #[test]
    fn test_every_option_has_env_fallback() {
        let command = Cli::command();
        let envs: Vec<(String, Option<String>)> = command
            .get_arguments()
            .filter(|arg| !matches!(arg.get_id().as_str(), "help" | "version"))
            .map(|arg| {
                (
                    arg.get_id().to_string(),
                    arg.get_env().map(|env| env.to_string_lossy().into_owned()),
                )
            })
            .collect();

        assert!(envs.iter().all(|(_, env)| env.is_some()), "{envs:?}");
        assert!(envs.contains(&("once".to_string(), Some("NEWS_BOT_ONCE".to_string()))));
        assert!(envs.contains(&("dry_run".to_string(), Some("NEWS_BOT_DRY_RUN".to_string()))));
    }

    #[test]
    fn test_once_conflicts_with_dry_run() {
        assert!(Cli::try_parse_from(["local_news_bot", "--once", "--dry-run"]).is_err());
    }
}
