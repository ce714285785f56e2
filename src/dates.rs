//! Free-text publish date interpretation.
//!
//! News sites write dates in every shape imaginable: ISO timestamps in meta
//! tags, `15/03/2024`, `15 de marzo de 2024`, `March 15, 2024`, `hace 2 horas`.
//! [`DateInterpreter`] runs an ordered list of [`DateFormatStrategy`]
//! implementations and stops at the first one that yields a calendar date.
//!
//! Every result is a calendar date in the run's fixed local offset, so it can
//! be compared directly against [`ReferenceDates`].

use crate::models::{DATE_NOT_FOUND, DayTag, ReferenceDates, display_label};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::trace;

/// Returned for "N weeks/months/years ago", and for offsets too large to
/// represent, so the article is always rejected and counts as stale.
pub const FAR_PAST: NaiveDate = NaiveDate::MIN;

/// One way of reading a date out of text.
pub trait DateFormatStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `lowered` is the trimmed, lowercased input; `original` is only trimmed.
    fn parse(&self, lowered: &str, original: &str, now: &DateTime<FixedOffset>)
    -> Option<NaiveDate>;
}

static RELATIVE_ES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"hace\s+(\d+|una?)\s+(segundos?|minutos?|mins?|horas?|hrs?|d[ií]as?|semanas?|mes(?:es)?|a[ñn]os?)\b",
    )
    .expect("valid regex")
});

static RELATIVE_EN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(\d+|an?|one)\s+(seconds?|minutes?|mins?|hours?|hrs?|days?|weeks?|months?|years?)\s+ago\b",
    )
    .expect("valid regex")
});

static ISO_LIKE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(\d{4})[-/](\d{1,2})[-/](\d{1,2})(?:[t\s]+(\d{1,2}):(\d{2})(?::(\d{2}))?(?:[.,]\d+)?\s*(z|utc|gmt|[+-]\d{2}:?\d{2})?)?",
    )
    .expect("valid regex")
});

static DAY_FIRST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2})[-/.](\d{1,2})[-/.](\d{4})").expect("valid regex"));

static DAY_MONTH_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2})\s+(?:de\s+)?([a-záéíóúñ]+)\.?,?\s+(?:de[l]?\s+)?(\d{4})")
        .expect("valid regex")
});

static MONTH_DAY_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([a-záéíóúñ]+)\.?\s+(\d{1,2}),?\s+(?:de\s+)?(\d{4})").expect("valid regex")
});

/// Spanish month names and abbreviations, plus English names.
fn month_number(name: &str) -> Option<u32> {
    let month = match name {
        "enero" | "ene" | "january" | "jan" => 1,
        "febrero" | "feb" | "february" => 2,
        "marzo" | "mar" | "march" => 3,
        "abril" | "abr" | "april" | "apr" => 4,
        "mayo" | "may" => 5,
        "junio" | "jun" | "june" => 6,
        "julio" | "jul" | "july" => 7,
        "agosto" | "ago" | "august" | "aug" => 8,
        "septiembre" | "setiembre" | "sep" | "sept" | "set" | "september" => 9,
        "octubre" | "oct" | "october" => 10,
        "noviembre" | "nov" | "november" => 11,
        "diciembre" | "dic" | "december" | "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn number(caps: &Captures<'_>, idx: usize) -> Option<u32> {
    caps.get(idx)?.as_str().parse().ok()
}

fn ymd(year: u32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)
}

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("valid regex"));
static SLASH_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,2}/\d{1,2}(?:/\d{2,4})?\b").expect("valid regex"));
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-záéíóúñ]+").expect("valid regex"));

/// True for "hace N unidades" / "N units ago" phrases.
pub fn looks_relative(text: &str) -> bool {
    let lowered = text.to_lowercase();
    RELATIVE_ES.is_match(&lowered) || RELATIVE_EN.is_match(&lowered)
}

/// Cheap check used to reject category labels posing as dates: a year, a
/// slash date, a month name or a relative phrase.
pub fn looks_like_date(text: &str) -> bool {
    let lowered = text.to_lowercase();
    YEAR.is_match(&lowered)
        || SLASH_DATE.is_match(&lowered)
        || WORD
            .find_iter(&lowered)
            .any(|word| month_number(word.as_str()).is_some())
        || looks_relative(&lowered)
}

/// `hace 2 horas`, `3 days ago`.
pub struct RelativePhrase;

impl RelativePhrase {
    /// `None` for weeks, months and years, and for amounts out of range.
    fn offset(amount: &str, unit: &str) -> Option<TimeDelta> {
        let amount: i64 = match amount {
            "un" | "una" | "a" | "an" | "one" => 1,
            n => n.parse().ok()?,
        };
        let unit = unit.trim_end_matches('s');
        if unit.starts_with("seg") || unit.starts_with("sec") {
            TimeDelta::try_seconds(amount)
        } else if unit.starts_with("min") {
            TimeDelta::try_minutes(amount)
        } else if unit.starts_with("hora") || unit.starts_with("hour") || unit.starts_with("hr") {
            TimeDelta::try_hours(amount)
        } else if unit.starts_with('d') {
            TimeDelta::try_days(amount)
        } else {
            None
        }
    }
}

impl DateFormatStrategy for RelativePhrase {
    fn name(&self) -> &'static str {
        "relative"
    }

    fn parse(&self, lowered: &str, _: &str, now: &DateTime<FixedOffset>) -> Option<NaiveDate> {
        let caps = RELATIVE_ES
            .captures(lowered)
            .or_else(|| RELATIVE_EN.captures(lowered))?;
        let Some(offset) = Self::offset(caps.get(1)?.as_str(), caps.get(2)?.as_str()) else {
            return Some(FAR_PAST);
        };
        Some(
            now.checked_sub_signed(offset)
                .map_or(FAR_PAST, |then| then.date_naive()),
        )
    }
}

/// `2024-03-15`, `2024-03-15T10:00:00Z`, `2024/03/15 10:00 -06:00`.
///
/// A time with an explicit offset is converted to local time before the date
/// is taken; without an offset the date portion is used as written.
pub struct IsoLike;

impl IsoLike {
    fn parse_offset(raw: &str) -> Option<FixedOffset> {
        match raw {
            "z" | "utc" | "gmt" => FixedOffset::east_opt(0),
            _ => {
                let sign = if raw.starts_with('-') { -1 } else { 1 };
                let digits: String = raw[1..].chars().filter(|c| c.is_ascii_digit()).collect();
                if digits.len() != 4 {
                    return None;
                }
                let hours: i32 = digits[..2].parse().ok()?;
                let minutes: i32 = digits[2..].parse().ok()?;
                FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            }
        }
    }
}

impl DateFormatStrategy for IsoLike {
    fn name(&self) -> &'static str {
        "iso"
    }

    fn parse(&self, lowered: &str, _: &str, now: &DateTime<FixedOffset>) -> Option<NaiveDate> {
        let caps = ISO_LIKE.captures(lowered)?;
        let date = ymd(number(&caps, 1)?, number(&caps, 2)?, number(&caps, 3)?)?;

        let (Some(hour), Some(minute)) = (number(&caps, 4), number(&caps, 5)) else {
            return Some(date);
        };
        let Some(offset) = caps.get(7).and_then(|m| Self::parse_offset(m.as_str())) else {
            return Some(date);
        };
        let time = NaiveTime::from_hms_opt(hour, minute, number(&caps, 6).unwrap_or(0))?;
        let stamp = offset
            .from_local_datetime(&NaiveDateTime::new(date, time))
            .single()?;
        Some(stamp.with_timezone(&now.timezone()).date_naive())
    }
}

/// `Fri, 15 Mar 2024 10:00:00 -0600`, as found in RSS `pubDate`.
pub struct Rfc2822;

impl DateFormatStrategy for Rfc2822 {
    fn name(&self) -> &'static str {
        "rfc2822"
    }

    fn parse(&self, _: &str, original: &str, now: &DateTime<FixedOffset>) -> Option<NaiveDate> {
        let stamp = DateTime::parse_from_rfc2822(original).ok()?;
        Some(stamp.with_timezone(&now.timezone()).date_naive())
    }
}

/// `15/03/2024`, `15-03-2024`.
pub struct DayFirst;

impl DateFormatStrategy for DayFirst {
    fn name(&self) -> &'static str {
        "day-first"
    }

    fn parse(&self, lowered: &str, _: &str, _: &DateTime<FixedOffset>) -> Option<NaiveDate> {
        let caps = DAY_FIRST.captures(lowered)?;
        ymd(number(&caps, 3)?, number(&caps, 2)?, number(&caps, 1)?)
    }
}

/// `15 de marzo de 2024`, `15 mar 2024`.
pub struct DayMonthYear;

impl DateFormatStrategy for DayMonthYear {
    fn name(&self) -> &'static str {
        "day-month-year"
    }

    fn parse(&self, lowered: &str, _: &str, _: &DateTime<FixedOffset>) -> Option<NaiveDate> {
        DAY_MONTH_YEAR.captures_iter(lowered).find_map(|caps| {
            let month = month_number(caps.get(2)?.as_str())?;
            ymd(number(&caps, 3)?, month, number(&caps, 1)?)
        })
    }
}

/// `marzo 15, 2024`, `March 15 2024`.
pub struct MonthDayYear;

impl DateFormatStrategy for MonthDayYear {
    fn name(&self) -> &'static str {
        "month-day-year"
    }

    fn parse(&self, lowered: &str, _: &str, _: &DateTime<FixedOffset>) -> Option<NaiveDate> {
        MONTH_DAY_YEAR.captures_iter(lowered).find_map(|caps| {
            let month = month_number(caps.get(1)?.as_str())?;
            ymd(number(&caps, 3)?, month, number(&caps, 2)?)
        })
    }
}

/// Last resort: a handful of locale-agnostic layouts on the untouched input.
pub struct Fallback;

impl DateFormatStrategy for Fallback {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn parse(&self, _: &str, original: &str, now: &DateTime<FixedOffset>) -> Option<NaiveDate> {
        if let Ok(stamp) = DateTime::parse_from_rfc3339(original) {
            return Some(stamp.with_timezone(&now.timezone()).date_naive());
        }
        const STAMPS: [&str; 3] = ["%Y%m%dT%H%M%S", "%d.%m.%Y %H:%M", "%B %d %Y %H:%M"];
        for fmt in STAMPS {
            if let Ok(stamp) = NaiveDateTime::parse_from_str(original, fmt) {
                return Some(stamp.date());
            }
        }
        const DATES: [&str; 4] = ["%Y%m%d", "%Y.%m.%d", "%d %b %Y", "%b %d %Y"];
        DATES
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(original, fmt).ok())
    }
}

/// Parses and classifies publish dates relative to one run's reference dates.
pub struct DateInterpreter {
    reference: ReferenceDates,
    strategies: Vec<Box<dyn DateFormatStrategy>>,
}

impl DateInterpreter {
    pub fn new(reference: ReferenceDates) -> Self {
        Self {
            reference,
            strategies: vec![
                Box::new(RelativePhrase),
                Box::new(IsoLike),
                Box::new(Rfc2822),
                Box::new(DayFirst),
                Box::new(DayMonthYear),
                Box::new(MonthDayYear),
                Box::new(Fallback),
            ],
        }
    }

    pub fn reference(&self) -> &ReferenceDates {
        &self.reference
    }

    /// Calendar date in the run's local offset, or `None` if nothing matched.
    pub fn parse(&self, text: &str) -> Option<NaiveDate> {
        let original = text.trim();
        if original.is_empty() || original == DATE_NOT_FOUND {
            return None;
        }
        let lowered = original.to_lowercase();
        self.strategies.iter().find_map(|strategy| {
            let date = strategy.parse(&lowered, original, &self.reference.now)?;
            trace!(strategy = strategy.name(), input = original, %date, "Parsed date");
            Some(date)
        })
    }

    /// `Some(tag)` when the text names a day inside the recency window.
    pub fn classify(&self, text: &str) -> Option<DayTag> {
        self.parse(text)
            .and_then(|date| self.reference.classify_date(date))
    }

    /// `DD/MM/YYYY` when parseable, otherwise the input unchanged.
    pub fn format_display(&self, text: &str) -> String {
        match self.parse(text) {
            Some(date) => display_label(date),
            None => text.to_string(),
        }
    }
}
