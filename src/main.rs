//! # Local News Bot
//!
//! Scrapes a handful of local news sites twice a day, keeps only the stories
//! published today or yesterday, and delivers them to a group chat as a short
//! series of formatted messages.
//!
//! ## Usage
//!
//! ```sh
//! local_news_bot -c config.yaml --webhook-url http://127.0.0.1:3000/send
//! ```
//!
//! ## Architecture
//!
//! 1. **Scheduling**: a ticker checks the configured slots; a manual command on
//!    stdin triggers the same run. Only one run may be in progress.
//! 2. **Scraping**: sites are visited one at a time; listing links, then
//!    article pages, each validated against today's reference dates.
//! 3. **Formatting**: accepted stories become numbered message chunks.
//! 4. **Delivery**: chunks go out one by one with retry, optionally archived as JSON.

use chrono::Utc;
use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod dates;
mod delivery;
mod error;
mod fetch;
mod models;
mod outputs;
mod scheduler;
mod scrapers;
mod text;
mod utils;

use cli::Cli;
use config::Config;
use delivery::{ConsoleSink, RetrySink, Sink, WebhookSink};
use fetch::page_fetcher;
use scheduler::{Scheduler, Trigger};
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!("local_news_bot starting up");

    let args = Cli::parse();
    debug!(
        ?args.config,
        ?args.json_output_dir,
        once = args.once,
        dry_run = args.dry_run,
        "Parsed CLI arguments"
    );

    let mut config = Config::load(args.config.as_deref()).await?;
    if let Some(destination) = args.destination.clone() {
        config.destination = destination;
    }

    if let Some(dir) = &args.json_output_dir {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(path = %dir, error = %e, "JSON output directory is not writable");
            return Err(e);
        }
    }

    let fetcher = page_fetcher(&config.fetch)?;
    let sink = match &args.webhook_url {
        Some(url) => {
            info!(%url, "Delivering through webhook");
            Sink::Webhook(WebhookSink::new(url, config.fetch.timeout())?)
        }
        None => {
            info!("No webhook configured; printing digests to stdout");
            Sink::Console(ConsoleSink)
        }
    };
    let sink = RetrySink::from_settings(sink, &config.delivery);
    let scheduler = Arc::new(Scheduler::new(
        fetcher,
        sink,
        &config,
        args.json_output_dir.clone(),
    )?);

    if args.dry_run {
        if let Some(chunks) = scheduler.run_once(Utc::now()).await {
            for chunk in chunks {
                println!("{chunk}\n");
            }
        }
        return Ok(());
    }

    if args.once {
        scheduler.send_digest(Trigger::Manual, Utc::now()).await;
        return Ok(());
    }

    let slots: Vec<String> = config
        .schedule
        .iter()
        .map(|s| format!("{:02}:{:02}", s.hour, s.minute))
        .collect();
    info!(
        ?slots,
        manual_command = %config.manual_command,
        "Waiting for scheduled slots"
    );

    let mut ticker = interval(Duration::from_secs(config.pacing.tick_secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let scheduler = Arc::clone(&scheduler);
                tokio::spawn(async move {
                    scheduler.tick(Utc::now()).await;
                });
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) if line.trim() == config.manual_command => {
                    info!("Manual command received");
                    let scheduler = Arc::clone(&scheduler);
                    tokio::spawn(async move {
                        scheduler.send_digest(Trigger::Manual, Utc::now()).await;
                    });
                }
                Ok(Some(_)) => {}
                Ok(None) => {
                    debug!("stdin closed; manual command disabled");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin; manual command disabled");
                    stdin_open = false;
                }
            },
            _ = &mut shutdown => {
                info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}
