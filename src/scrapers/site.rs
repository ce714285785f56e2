//! One site, one run: listing → links → articles → verdicts.
//!
//! Articles are visited in listing order, which sites keep newest first. A
//! rejected article older than `staleness_days` therefore ends the site: the
//! rest of the listing can only be older.

use crate::config::{Limits, Pacing, SiteProfile, SourceKind};
use crate::dates::DateInterpreter;
use crate::error::ScrapeError;
use crate::fetch::PageSource;
use crate::models::{AcceptedArticle, DATE_NOT_FOUND, ExtractedArticle, NO_TITLE, SiteResult};
use crate::scrapers::article::ArticleExtractor;
use crate::scrapers::feed::parse_feed;
use crate::scrapers::links::{LinkExtractor, LinkRules};
use crate::text::{clean, truncate_at_sentence};
use crate::utils::{random_pause, truncate_for_log};
use std::fmt;
use std::ops::ControlFlow;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// Why an article was left out. Not an error: logged and skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    DateOutsideWindow,
    SummaryTooShort,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Rejection::DateOutsideWindow => "date outside window",
            Rejection::SummaryTooShort => "summary too short",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted(AcceptedArticle),
    Rejected {
        reason: Rejection,
        /// The parsed date is past the staleness threshold.
        stale: bool,
    },
}

/// Scrapes sites against one run's reference dates.
pub struct SiteScraper<'a, S> {
    source: &'a S,
    dates: &'a DateInterpreter,
    limits: &'a Limits,
    pacing: &'a Pacing,
}

impl<'a, S: PageSource> SiteScraper<'a, S> {
    pub fn new(
        source: &'a S,
        dates: &'a DateInterpreter,
        limits: &'a Limits,
        pacing: &'a Pacing,
    ) -> Self {
        Self {
            source,
            dates,
            limits,
            pacing,
        }
    }

    /// Never fails: site-level errors end up in [`SiteResult::error`].
    #[instrument(level = "info", skip_all, fields(site = %profile.name))]
    pub async fn scrape(&self, profile: &SiteProfile) -> SiteResult {
        let t0 = Instant::now();
        let outcome = match profile.kind {
            SourceKind::Markup => self.scrape_markup(profile).await,
            SourceKind::Feed => self.scrape_feed(profile).await,
        };
        match outcome {
            Ok(result) => {
                info!(
                    accepted = result.articles.len(),
                    no_news = result.no_news,
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    "Site done"
                );
                result
            }
            Err(e) => {
                error!(error = %e, "Site failed");
                SiteResult::failed(&profile.name, &profile.url, e.to_string())
            }
        }
    }

    async fn scrape_markup(&self, profile: &SiteProfile) -> Result<SiteResult, ScrapeError> {
        let extractor = LinkExtractor::for_profile(profile, LinkRules::from(self.limits))?;
        let links = self.listing_links(profile, &extractor).await?;
        info!(count = links.len(), "Candidate links");

        let articles = ArticleExtractor::new(self.limits.min_paragraph_chars);
        let mut result = SiteResult::new(&profile.name, &profile.url);

        for (i, link) in links.iter().enumerate() {
            if result.articles.len() >= self.limits.max_articles_per_site {
                break;
            }
            if i > 0 {
                random_pause(self.pacing.article_pause_ms).await;
            }
            let html = match self.source.fetch(link, &profile.headers).await {
                Ok(html) => html,
                Err(e) => {
                    warn!(url = %link, error = %e, "Skipping article");
                    continue;
                }
            };
            let extracted = articles.extract(&html);
            if self.record(&mut result, extracted, link).is_break() {
                break;
            }
        }

        result.no_news = result.articles.is_empty();
        Ok(result)
    }

    /// Listing links, trying `fallback_url` when the main listing fails or is empty.
    async fn listing_links(
        &self,
        profile: &SiteProfile,
        extractor: &LinkExtractor,
    ) -> Result<Vec<String>, ScrapeError> {
        let primary = self
            .source
            .fetch(&profile.url, &profile.headers)
            .await
            .map(|html| extractor.extract(&html, &profile.url));

        let Some(fallback) = profile.fallback_url.as_deref() else {
            return Ok(primary?);
        };
        match primary {
            Ok(links) if !links.is_empty() => return Ok(links),
            Ok(_) => info!(%fallback, "No links on listing; trying fallback URL"),
            Err(e) => warn!(%fallback, error = %e, "Listing failed; trying fallback URL"),
        }
        let html = self.source.fetch(fallback, &profile.headers).await?;
        Ok(extractor.extract(&html, fallback))
    }

    async fn scrape_feed(&self, profile: &SiteProfile) -> Result<SiteResult, ScrapeError> {
        let xml = self.source.fetch(&profile.url, &profile.headers).await?;
        let entries = parse_feed(&xml)?;
        info!(count = entries.len(), "Feed entries");

        let mut result = SiteResult::new(&profile.name, &profile.url);
        for entry in entries {
            if result.articles.len() >= self.limits.max_articles_per_site {
                break;
            }
            let extracted = ExtractedArticle {
                title: if entry.title.is_empty() {
                    NO_TITLE.to_string()
                } else {
                    entry.title
                },
                date: entry.date.unwrap_or_else(|| DATE_NOT_FOUND.to_string()),
                summary: entry.description,
            };
            if self.record(&mut result, extracted, &entry.link).is_break() {
                break;
            }
        }

        result.no_news = result.articles.is_empty();
        Ok(result)
    }

    /// Log the verdict, keep accepted articles, break on a stale rejection.
    fn record(
        &self,
        result: &mut SiteResult,
        extracted: ExtractedArticle,
        url: &str,
    ) -> ControlFlow<()> {
        let raw_date = extracted.date.clone();
        match self.evaluate(extracted, url) {
            Verdict::Accepted(article) => {
                info!(
                    day = ?article.day,
                    title = %truncate_for_log(&article.title, 80),
                    "ACCEPTED"
                );
                result.articles.push(article);
                ControlFlow::Continue(())
            }
            Verdict::Rejected { reason, stale } => {
                info!(%url, date = %raw_date, %reason, "REJECTED");
                if stale {
                    info!(
                        staleness_days = self.limits.staleness_days,
                        "Listing reached old articles; stopping site early"
                    );
                    return ControlFlow::Break(());
                }
                ControlFlow::Continue(())
            }
        }
    }

    /// Date first, then summary length.
    pub fn evaluate(&self, extracted: ExtractedArticle, url: &str) -> Verdict {
        let Some(day) = self.dates.classify(&extracted.date) else {
            let reference = self.dates.reference();
            let stale = self
                .dates
                .parse(&extracted.date)
                .is_some_and(|d| reference.age_in_days(d) > self.limits.staleness_days);
            return Verdict::Rejected {
                reason: Rejection::DateOutsideWindow,
                stale,
            };
        };

        let summary = clean(&extracted.summary);
        if summary.chars().count() < self.limits.min_summary_chars {
            return Verdict::Rejected {
                reason: Rejection::SummaryTooShort,
                stale: false,
            };
        }

        Verdict::Accepted(AcceptedArticle {
            day,
            display_date: self.dates.format_display(&extracted.date),
            title: clean(&extracted.title),
            summary: truncate_at_sentence(&summary, self.limits.max_summary_chars),
            url: url.to_string(),
        })
    }
}
