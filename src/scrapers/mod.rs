//! Scraping pipeline for the configured local news sites.
//!
//! # Submodules
//!
//! | Module | Role |
//! |--------|------|
//! | [`links`] | Candidate article URLs from a listing page |
//! | [`article`] | Title, raw date and summary from an article page |
//! | [`feed`] | Items from an RSS or Atom document |
//! | [`site`] | Per-site state machine: fetch, extract, validate, stop |
//!
//! [`ScrapeOrchestrator`] runs every site strictly one after another, with a
//! fixed pause in between, against a single [`ReferenceDates`] snapshot.

pub mod article;
pub mod feed;
pub mod links;
pub mod site;

use crate::config::{Config, Limits, Pacing, SiteProfile};
use crate::dates::DateInterpreter;
use crate::error::ConfigError;
use crate::fetch::PageSource;
use crate::models::{ReferenceDates, RunReport, SiteResult};
use crate::utils::pause;
use chrono::{DateTime, FixedOffset, Utc};
use futures::stream::{self, StreamExt};
use site::SiteScraper;
use tracing::{info, instrument};

pub struct ScrapeOrchestrator<S> {
    source: S,
    sites: Vec<SiteProfile>,
    limits: Limits,
    pacing: Pacing,
    offset: FixedOffset,
}

impl<S: PageSource> ScrapeOrchestrator<S> {
    pub fn new(source: S, config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            source,
            sites: config.sites.clone(),
            limits: config.limits.clone(),
            pacing: config.pacing.clone(),
            offset: config.offset()?,
        })
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    #[cfg(test)]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Today and the recency window as seen in the configured zone.
    pub fn reference_dates(&self, now: DateTime<Utc>) -> ReferenceDates {
        ReferenceDates::new(
            now.with_timezone(&self.offset),
            self.limits.recency_window_days,
        )
    }

    /// Scrape every site once. Failed sites are reported, never raised.
    #[instrument(level = "info", skip_all)]
    pub async fn run(&self, now: DateTime<Utc>) -> RunReport {
        let reference = self.reference_dates(now);
        info!(
            today = %reference.today.label,
            yesterday = %reference.yesterday.label,
            sites = self.sites.len(),
            "Run starting"
        );
        let dates = DateInterpreter::new(reference.clone());
        let scraper = SiteScraper::new(&self.source, &dates, &self.limits, &self.pacing);

        let results: Vec<SiteResult> = stream::iter(self.sites.iter().enumerate())
            .then(|(i, profile)| {
                let scraper = &scraper;
                async move {
                    if i > 0 {
                        pause(self.pacing.site_pause_ms).await;
                    }
                    scraper.scrape(profile).await
                }
            })
            .collect()
            .await;

        let report = RunReport::new(reference, results);
        info!(
            total_accepted = report.total_accepted,
            failed_sites = report.results.iter().filter(|r| r.error.is_some()).count(),
            "Run finished"
        );
        report
    }
}
