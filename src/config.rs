//! Bot configuration loaded from YAML.
//!
//! Every field has a default, so an empty file (or no file at all) yields the
//! stock deployment: two León, Guanajuato news sites, delivered twice a day.
//!
//! ```yaml
//! utc_offset_minutes: -360
//! destination: "120363371012169967@g.us"
//! schedule:
//!   - { hour: 0, minute: 25 }
//!   - { hour: 19, minute: 50 }
//! sites:
//!   - name: Zona Franca
//!     url: https://zonafranca.mx/local/
//!     domain: zonafranca.mx
//! ```

use crate::error::ConfigError;
use chrono::FixedOffset;
use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, instrument};

/// How a site publishes its article list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// HTML listing page whose links lead to article pages.
    #[default]
    Markup,
    /// RSS or Atom document carrying title, date and description per item.
    Feed,
}

/// One configured news site.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteProfile {
    pub name: String,
    /// Listing page (or feed document for [`SourceKind::Feed`]).
    pub url: String,
    #[serde(default)]
    pub fallback_url: Option<String>,
    /// Links outside this domain (or its subdomains) are ignored.
    pub domain: String,
    #[serde(default)]
    pub kind: SourceKind,
    /// Extra request headers; these override the browser defaults.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// CSS selectors for candidate links. Empty means every `a[href]`.
    #[serde(default)]
    pub link_selectors: Vec<String>,
    /// Tried on the same page when the primary selectors find nothing usable.
    #[serde(default)]
    pub fallback_link_selectors: Vec<String>,
}

impl SiteProfile {
    pub fn new(name: &str, url: &str, domain: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            fallback_url: None,
            domain: domain.to_string(),
            kind: SourceKind::Markup,
            headers: BTreeMap::new(),
            link_selectors: Vec::new(),
            fallback_link_selectors: Vec::new(),
        }
    }
}

/// A daily delivery time in the configured zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ScheduleSlot {
    pub hour: u32,
    pub minute: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Limits {
    pub max_articles_per_site: usize,
    pub max_links_per_site: usize,
    pub max_summary_chars: usize,
    pub min_summary_chars: usize,
    pub min_paragraph_chars: usize,
    pub min_url_len: usize,
    pub min_anchor_text_len: usize,
    /// Days before today still accepted. Day 0 is tagged "today", the rest "yesterday".
    pub recency_window_days: u32,
    /// A rejected article older than this stops the site early.
    pub staleness_days: i64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_articles_per_site: 2,
            max_links_per_site: 10,
            max_summary_chars: 900,
            min_summary_chars: 50,
            min_paragraph_chars: 60,
            min_url_len: 60,
            min_anchor_text_len: 15,
            recency_window_days: 1,
            staleness_days: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Pacing {
    /// Random pause range between article fetches within a site.
    pub article_pause_ms: (u64, u64),
    pub site_pause_ms: u64,
    pub message_pause_ms: u64,
    pub tick_secs: u64,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            article_pause_ms: (1200, 1800),
            site_pause_ms: 2000,
            message_pause_ms: 1500,
            tick_secs: 30,
        }
    }
}

#[cfg(test)]
impl Pacing {
    /// No pauses at all.
    pub fn immediate() -> Self {
        Self {
            article_pause_ms: (0, 0),
            site_pause_ms: 0,
            message_pause_ms: 0,
            tick_secs: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchSettings {
    pub max_attempts: u32,
    pub timeout_secs: u64,
    pub max_redirects: usize,
    pub blocked_backoff_ms: u64,
    pub network_backoff_ms: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout_secs: 20,
            max_redirects: 5,
            blocked_backoff_ms: 3000,
            network_backoff_ms: 2000,
        }
    }
}

impl FetchSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeliverySettings {
    pub max_retries: usize,
    pub base_delay_ms: u64,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 2000,
        }
    }
}

/// What readers see for sites that failed or had nothing recent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteNotices {
    /// Say nothing about them.
    #[default]
    Silent,
    /// Emit a short "no news" / "inaccessible" line per site.
    Discreet,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DigestSettings {
    pub title: String,
    pub location: String,
    pub footer_link: String,
    pub site_notices: SiteNotices,
}

impl Default for DigestSettings {
    fn default() -> Self {
        Self {
            title: "NOTICIAS LOCALES".to_string(),
            location: "León, Guanajuato".to_string(),
            footer_link: "https://whatsapp.com/channel/0029Vb6Ml1x0gcfBHsUjPs06".to_string(),
            site_notices: SiteNotices::Silent,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub utc_offset_minutes: i32,
    pub destination: String,
    pub schedule: Vec<ScheduleSlot>,
    pub manual_command: String,
    pub limits: Limits,
    pub pacing: Pacing,
    pub fetch: FetchSettings,
    pub delivery: DeliverySettings,
    pub digest: DigestSettings,
    pub sites: Vec<SiteProfile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            utc_offset_minutes: -6 * 60,
            destination: "120363371012169967@g.us".to_string(),
            schedule: vec![
                ScheduleSlot { hour: 0, minute: 25 },
                ScheduleSlot { hour: 19, minute: 50 },
            ],
            manual_command: "@sendinstructionsnotice".to_string(),
            limits: Limits::default(),
            pacing: Pacing::default(),
            fetch: FetchSettings::default(),
            delivery: DeliverySettings::default(),
            digest: DigestSettings::default(),
            sites: vec![
                SiteProfile::new(
                    "UM Noticias",
                    "https://umnoticias.com.mx/seccion/local/",
                    "umnoticias.com.mx",
                ),
                SiteProfile::new("Zona Franca", "https://zonafranca.mx/local/", "zonafranca.mx"),
            ],
        }
    }
}

impl Config {
    /// Load from a YAML file, or fall back to the defaults when no path is given.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let raw = tokio::fs::read_to_string(path).await?;
                let config = Self::from_yaml(&raw)?;
                info!(path, sites = config.sites.len(), "Loaded configuration");
                config
            }
            None => {
                info!("No config file given; using built-in defaults");
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// The fixed local zone used for dates and schedule slots.
    pub fn offset(&self) -> Result<FixedOffset, ConfigError> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "utc_offset_minutes out of range: {}",
                self.utc_offset_minutes
            ))
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.offset()?;
        if self.sites.is_empty() {
            return Err(ConfigError::Invalid("no sites configured".into()));
        }
        for slot in &self.schedule {
            if slot.hour > 23 || slot.minute > 59 {
                return Err(ConfigError::Invalid(format!(
                    "schedule slot {:02}:{:02} is not a valid time",
                    slot.hour, slot.minute
                )));
            }
        }
        let (min, max) = self.pacing.article_pause_ms;
        if min > max {
            return Err(ConfigError::Invalid(format!(
                "article_pause_ms range is inverted: {min} > {max}"
            )));
        }
        if self.fetch.max_attempts == 0 {
            return Err(ConfigError::Invalid("fetch.max_attempts must be at least 1".into()));
        }
        for site in &self.sites {
            if site.domain.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("site {} has no domain", site.name)));
            }
            for selector in site
                .link_selectors
                .iter()
                .chain(site.fallback_link_selectors.iter())
            {
                if let Err(e) = Selector::parse(selector) {
                    return Err(ConfigError::Invalid(format!(
                        "site {}: selector {selector:?} does not parse: {e:?}",
                        site.name
                    )));
                }
            }
        }
        Ok(())
    }
}
