//! Data models shared by the scraping pipeline and the digest.
//!
//! - [`ReferenceDates`]: the "today"/"yesterday" snapshot taken once per run
//! - [`ExtractedArticle`]: raw fields pulled from an article page or feed item
//! - [`AcceptedArticle`]: an article that passed date and summary validation
//! - [`SiteResult`]: the outcome of scraping one site
//! - [`RunReport`]: every site result of one run

use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

/// Shown when no title selector matched.
pub const NO_TITLE: &str = "Sin titular";

/// Shown (and never parsed) when no date candidate was found.
pub const DATE_NOT_FOUND: &str = "Fecha no encontrada";

/// Which recent day an accepted article belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DayTag {
    Today,
    /// Yesterday, or any older day still inside the recency window.
    Yesterday,
}

/// A calendar day together with its `DD/MM/YYYY` label.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DayRef {
    pub date: NaiveDate,
    pub label: String,
}

impl DayRef {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            label: display_label(date),
        }
    }
}

/// Render a date the way the digest shows it.
pub fn display_label(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// The run's notion of "now", computed once and shared by every site.
///
/// All comparisons happen on calendar dates in the fixed offset carried by
/// `now`, never in UTC and never in the machine's zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceDates {
    pub now: DateTime<FixedOffset>,
    pub today: DayRef,
    pub yesterday: DayRef,
    /// Days before today that still count as recent (at least 1).
    pub window_days: u32,
}

impl ReferenceDates {
    pub fn new(now: DateTime<FixedOffset>, window_days: u32) -> Self {
        let today = now.date_naive();
        Self {
            now,
            today: DayRef::new(today),
            yesterday: DayRef::new(today - Duration::days(1)),
            window_days: window_days.max(1),
        }
    }

    /// Whole days between `date` and today; negative for future dates.
    pub fn age_in_days(&self, date: NaiveDate) -> i64 {
        (self.today.date - date).num_days()
    }

    pub fn classify_date(&self, date: NaiveDate) -> Option<DayTag> {
        match self.age_in_days(date) {
            0 => Some(DayTag::Today),
            age if age >= 1 && age <= i64::from(self.window_days) => Some(DayTag::Yesterday),
            _ => None,
        }
    }
}

/// Raw fields from one article. Consumed immediately by validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArticle {
    pub title: String,
    /// Raw date text, or [`DATE_NOT_FOUND`].
    pub date: String,
    /// Raw summary, possibly empty.
    pub summary: String,
}

/// An article that made it into the digest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AcceptedArticle {
    pub day: DayTag,
    /// `DD/MM/YYYY`, or the raw date text if it could not be re-rendered.
    pub display_date: String,
    pub title: String,
    pub summary: String,
    pub url: String,
}

/// Outcome of scraping one site in one run.
///
/// An error on the listing fetch short-circuits before any article is
/// accepted, so `error` and a non-empty `articles` never coexist.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SiteResult {
    pub site: String,
    pub url: String,
    pub articles: Vec<AcceptedArticle>,
    pub no_news: bool,
    pub error: Option<String>,
}

impl SiteResult {
    pub fn new(site: &str, url: &str) -> Self {
        Self {
            site: site.to_string(),
            url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn failed(site: &str, url: &str, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::new(site, url)
        }
    }

    pub fn has_articles(&self) -> bool {
        !self.articles.is_empty()
    }
}

/// Everything one run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub reference: ReferenceDates,
    pub results: Vec<SiteResult>,
    pub total_accepted: usize,
}

impl RunReport {
    pub fn new(reference: ReferenceDates, results: Vec<SiteResult>) -> Self {
        let total_accepted = results.iter().map(|r| r.articles.len()).sum();
        Self {
            reference,
            results,
            total_accepted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<FixedOffset> {
        FixedOffset::west_opt(6 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 15, 12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_reference_dates_labels() {
        let refs = ReferenceDates::new(now(), 1);
        assert_eq!(refs.today.label, "15/03/2024");
        assert_eq!(refs.yesterday.label, "14/03/2024");
    }

    #[test]
    fn test_reference_dates_use_local_calendar_day() {
        // 23:30 local on the 15th is already the 16th in UTC.
        let late = FixedOffset::west_opt(6 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 15, 23, 30, 0)
            .unwrap();
        let refs = ReferenceDates::new(late, 1);
        assert_eq!(refs.today.date, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
    }

    #[test]
    fn test_classify_date_window() {
        let refs = ReferenceDates::new(now(), 1);
        let day = |d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap();
        assert_eq!(refs.classify_date(day(15)), Some(DayTag::Today));
        assert_eq!(refs.classify_date(day(14)), Some(DayTag::Yesterday));
        assert_eq!(refs.classify_date(day(13)), None);
        assert_eq!(refs.classify_date(day(16)), None);

        let wide = ReferenceDates::new(now(), 2);
        assert_eq!(wide.classify_date(day(13)), Some(DayTag::Yesterday));
        assert_eq!(wide.classify_date(day(12)), None);
    }

    #[test]
    fn test_window_is_at_least_one_day() {
        let refs = ReferenceDates::new(now(), 0);
        assert_eq!(refs.window_days, 1);
    }

    #[test]
    fn test_run_report_totals() {
        let refs = ReferenceDates::new(now(), 1);
        let mut ok = SiteResult::new("A", "https://a.example/");
        ok.articles.push(AcceptedArticle {
            day: DayTag::Today,
            display_date: "15/03/2024".into(),
            title: "Title".into(),
            summary: "Summary".into(),
            url: "https://a.example/1".into(),
        });
        let failed = SiteResult::failed("B", "https://b.example/", "blocked".into());
        let report = RunReport::new(refs, vec![ok, failed]);
        assert_eq!(report.total_accepted, 1);
        assert!(!report.results[1].has_articles());
    }

    #[test]
    fn test_site_result_serialization() {
        let result = SiteResult::failed("Zona Franca", "https://zonafranca.mx/local/", "x".into());
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("Zona Franca"));
        assert!(json.contains("\"error\":\"x\""));
    }
}
