//! Candidate article links from a listing page.
//!
//! Listing pages mix real stories with navigation, section indexes, author
//! pages and "read more" buttons. A link survives only if it stays on the
//! site's domain, is long enough to be an article slug, carries a real
//! headline as anchor text, has no fragment, and avoids known index paths.

use crate::config::{Limits, SiteProfile};
use crate::error::ParseError;
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("valid selector"));

/// Path segments that mark index pages rather than stories.
const INDEX_SEGMENTS: &[&str] = &[
    "/seccion/",
    "/section/",
    "/categoria/",
    "/category/",
    "/tag/",
    "/etiqueta/",
    "/author/",
    "/autor/",
    "/page/",
];

/// Anchor texts of pagination and teaser buttons (compared uppercased).
const BUTTON_TEXTS: &[&str] = &["LEER MÁS", "LEER MAS", "CONTINUAR", "VER TODAS", "READ MORE"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkRules {
    pub min_url_len: usize,
    pub min_anchor_text_len: usize,
    pub max_links: usize,
}

impl From<&Limits> for LinkRules {
    fn from(limits: &Limits) -> Self {
        Self {
            min_url_len: limits.min_url_len,
            min_anchor_text_len: limits.min_anchor_text_len,
            max_links: limits.max_links_per_site,
        }
    }
}

fn compile(selectors: &[String]) -> Result<Vec<Selector>, ParseError> {
    selectors
        .iter()
        .map(|s| Selector::parse(s).map_err(|e| ParseError::Selector(format!("{s}: {e:?}"))))
        .collect()
}

fn bare_host(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Link discovery for one site profile.
#[derive(Debug)]
pub struct LinkExtractor {
    domain: String,
    primary: Vec<Selector>,
    secondary: Vec<Selector>,
    rules: LinkRules,
}

impl LinkExtractor {
    pub fn for_profile(profile: &SiteProfile, rules: LinkRules) -> Result<Self, ParseError> {
        let primary = if profile.link_selectors.is_empty() {
            vec![(*ANCHOR).clone()]
        } else {
            compile(&profile.link_selectors)?
        };
        Ok(Self {
            domain: bare_host(profile.domain.trim()).to_lowercase(),
            primary,
            secondary: compile(&profile.fallback_link_selectors)?,
            rules,
        })
    }

    /// Deduplicated article URLs in page order, at most `max_links`.
    ///
    /// Falls back to the secondary selectors when the primary ones yield nothing.
    pub fn extract(&self, html: &str, page_url: &str) -> Vec<String> {
        let base = Url::parse(page_url)
            .or_else(|_| Url::parse(&format!("https://{}/", self.domain)))
            .ok();
        let Some(base) = base else {
            return Vec::new();
        };
        let document = Html::parse_document(html);

        let links = self.extract_with(&document, &self.primary, &base);
        if links.is_empty() && !self.secondary.is_empty() {
            debug!(domain = %self.domain, "Primary selectors found nothing; trying secondary");
            return self.extract_with(&document, &self.secondary, &base);
        }
        links
    }

    fn extract_with(&self, document: &Html, selectors: &[Selector], base: &Url) -> Vec<String> {
        selectors
            .iter()
            .flat_map(|selector| document.select(selector))
            .filter_map(|element| {
                let anchor = if element.value().attr("href").is_some() {
                    element
                } else {
                    element.select(&ANCHOR).next()?
                };
                self.candidate(anchor, base)
            })
            .unique()
            .take(self.rules.max_links)
            .collect()
    }

    fn candidate(&self, anchor: ElementRef<'_>, base: &Url) -> Option<String> {
        let href = anchor.value().attr("href")?.trim();
        if href.contains('#') {
            return None;
        }
        let text = anchor.text().collect::<Vec<_>>().join(" ");
        let text = text.split_whitespace().join(" ");
        if text.chars().count() <= self.rules.min_anchor_text_len {
            return None;
        }
        let upper = text.to_uppercase();
        if BUTTON_TEXTS.iter().any(|b| upper.contains(b)) {
            return None;
        }

        let url = base.join(href).ok()?;
        if !matches!(url.scheme(), "http" | "https") || !self.on_domain(&url) {
            return None;
        }
        let url = url.to_string();
        if url.chars().count() <= self.rules.min_url_len {
            return None;
        }
        let lowered = url.to_lowercase();
        if INDEX_SEGMENTS.iter().any(|segment| lowered.contains(segment)) {
            return None;
        }
        Some(url)
    }

    fn on_domain(&self, url: &Url) -> bool {
        url.host_str()
            .map(|host| {
                let host = bare_host(host);
                host == self.domain || host.ends_with(&format!(".{}", self.domain))
            })
            .unwrap_or(false)
    }
}
