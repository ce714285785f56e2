//! RSS 2.0 and Atom documents.
//!
//! Feed sites skip link and article extraction: each item already carries a
//! title, a link, a publish date and a description.

use crate::error::ParseError;
use crate::text::strip_markup;
use serde::Deserialize;

/// One item of a syndication feed, with markup stripped from the description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub date: Option<String>,
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<AtomText>,
    published: Option<String>,
    updated: Option<String>,
    summary: Option<AtomText>,
    content: Option<AtomText>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
}

#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl From<RssItem> for FeedEntry {
    fn from(item: RssItem) -> Self {
        Self {
            title: trimmed(item.title).unwrap_or_default(),
            link: trimmed(item.link).unwrap_or_default(),
            date: trimmed(item.pub_date),
            description: item
                .description
                .map(|d| strip_markup(&d))
                .unwrap_or_default(),
        }
    }
}

impl From<AtomEntry> for FeedEntry {
    fn from(entry: AtomEntry) -> Self {
        let body = entry.summary.or(entry.content).map(|t| t.value);
        Self {
            title: trimmed(entry.title.map(|t| t.value)).unwrap_or_default(),
            link: entry
                .links
                .into_iter()
                .find_map(|l| trimmed(l.href))
                .unwrap_or_default(),
            date: trimmed(entry.published).or_else(|| trimmed(entry.updated)),
            description: body.map(|b| strip_markup(&b)).unwrap_or_default(),
        }
    }
}

/// Entries in document order. Atom is detected by a `<feed` root without `<rss`.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>, ParseError> {
    let is_atom = xml.contains("<feed") && !xml.contains("<rss");
    if is_atom {
        let feed: AtomFeed =
            quick_xml::de::from_str(xml).map_err(|e| ParseError::Feed(e.to_string()))?;
        return Ok(feed.entries.into_iter().map(FeedEntry::from).collect());
    }
    let rss: Rss = quick_xml::de::from_str(xml).map_err(|e| ParseError::Feed(e.to_string()))?;
    Ok(rss.channel.items.into_iter().map(FeedEntry::from).collect())
}
