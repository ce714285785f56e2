//! WhatsApp-style digest chunks.
//!
//! Layout of one run's digest:
//!
//! ```text
//! header            📡 *NOTICIAS LOCALES* / 📍 location / 📅 today
//! article 1..N      numbered across all sites, one chunk each
//! footer            channel link, only when N > 0
//! ```
//!
//! Failed or empty sites are omitted unless [`SiteNotices::Discreet`] is set,
//! and even then the notice never carries the underlying error.

use crate::config::{DigestSettings, SiteNotices};
use crate::models::{AcceptedArticle, DayTag, ReferenceDates, SiteResult};

const SEPARATOR_WIDTH: usize = 30;

/// Sent alongside the header when no site produced anything.
pub const NO_UPDATES: &str = "📭 Sin noticias locales recientes por ahora. Volveremos en el siguiente horario.";

fn separator() -> String {
    "━".repeat(SEPARATOR_WIDTH)
}

pub struct DigestFormatter<'a> {
    settings: &'a DigestSettings,
}

impl<'a> DigestFormatter<'a> {
    pub fn new(settings: &'a DigestSettings) -> Self {
        Self { settings }
    }

    pub fn format(&self, results: &[SiteResult], reference: &ReferenceDates) -> Vec<String> {
        let header = self.header(reference);
        let total: usize = results.iter().map(|r| r.articles.len()).sum();
        if total == 0 {
            return vec![format!("{header}\n{NO_UPDATES}")];
        }

        let mut chunks = vec![header];
        let mut number = 0;
        for result in results {
            if !result.has_articles() {
                if let Some(notice) = self.notice(result) {
                    chunks.push(notice);
                }
                continue;
            }
            for article in &result.articles {
                number += 1;
                chunks.push(Self::article(number, &result.site, article));
            }
        }
        chunks.push(self.footer());
        chunks
    }

    fn header(&self, reference: &ReferenceDates) -> String {
        format!(
            "📡 *{}*\n📍 {}\n📅 {}\n{}",
            self.settings.title,
            self.settings.location,
            reference.today.label,
            separator()
        )
    }

    fn article(number: usize, site: &str, article: &AcceptedArticle) -> String {
        let tag = match article.day {
            DayTag::Today => "✅ HOY",
            DayTag::Yesterday => "📆 AYER",
        };
        let sep = separator();
        format!(
            "📰 *NOTICIA {number}*\n{sep}\n*{}*\n📅 {}  {tag}\n🔹 *{site}*\n{sep}\n📝 *RESUMEN:*\n\n{}",
            article.title.to_uppercase(),
            article.display_date,
            article.summary
        )
    }

    fn notice(&self, result: &SiteResult) -> Option<String> {
        if self.settings.site_notices == SiteNotices::Silent {
            return None;
        }
        Some(if result.error.is_some() {
            format!("⚠️ *{}*: No se pudo acceder al sitio.", result.site)
        } else {
            format!("📭 *{}*\nSin noticias recientes para hoy.", result.site)
        })
    }

    fn footer(&self) -> String {
        format!(
            "{}\n📲 Más info en nuestro canal:\n{}",
            separator(),
            self.settings.footer_link
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn reference() -> ReferenceDates {
        let now = FixedOffset::west_opt(6 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 15, 19, 50, 0)
            .unwrap();
        ReferenceDates::new(now, 1)
    }

    fn accepted(title: &str, day: DayTag) -> AcceptedArticle {
        AcceptedArticle {
            day,
            display_date: "15/03/2024".into(),
            title: title.into(),
            summary: "Resumen de la nota.".into(),
            url: "https://zonafranca.mx/local/nota/".into(),
        }
    }

    fn site(name: &str, articles: Vec<AcceptedArticle>) -> SiteResult {
        SiteResult {
            no_news: articles.is_empty(),
            articles,
            ..SiteResult::new(name, "https://example.mx/")
        }
    }

    #[test]
    fn test_zero_articles_is_single_chunk_without_footer() {
        let settings = DigestSettings::default();
        let results = vec![
            SiteResult::failed("UM Noticias", "https://umnoticias.com.mx/", "blocked".into()),
            site("Zona Franca", vec![]),
        ];
        let chunks = DigestFormatter::new(&settings).format(&results, &reference());
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].starts_with("📡 *NOTICIAS LOCALES*\n📍 León, Guanajuato\n📅 15/03/2024\n"));
        assert!(chunks[0].ends_with(NO_UPDATES));
        assert!(!chunks[0].contains(&settings.footer_link));
    }

    #[test]
    fn test_header_articles_and_footer() {
        let settings = DigestSettings::default();
        let results = vec![
            site("UM Noticias", vec![accepted("Obra en bulevar", DayTag::Today)]),
            SiteResult::failed("Caído", "https://caido.mx/", "status 503".into()),
            site(
                "Zona Franca",
                vec![
                    accepted("Feria estatal", DayTag::Yesterday),
                    accepted("Nueva ruta", DayTag::Today),
                ],
            ),
        ];
        let chunks = DigestFormatter::new(&settings).format(&results, &reference());

        assert_eq!(chunks.len(), 1 + 3 + 1);
        assert!(chunks[1].starts_with("📰 *NOTICIA 1*\n"));
        assert!(chunks[1].contains("*OBRA EN BULEVAR*"));
        assert!(chunks[1].contains("📅 15/03/2024  ✅ HOY"));
        assert!(chunks[1].contains("🔹 *UM Noticias*"));
        assert!(chunks[1].ends_with("📝 *RESUMEN:*\n\nResumen de la nota."));
        assert!(chunks[2].starts_with("📰 *NOTICIA 2*\n"));
        assert!(chunks[2].contains("📆 AYER"));
        assert!(chunks[3].starts_with("📰 *NOTICIA 3*\n"));
        assert_eq!(
            chunks[4],
            format!(
                "{}\n📲 Más info en nuestro canal:\n{}",
                "━".repeat(30),
                settings.footer_link
            )
        );
        assert!(chunks.iter().all(|c| !c.contains("503")));
    }

    #[test]
    fn test_discreet_notices() {
        let settings = DigestSettings {
            site_notices: SiteNotices::Discreet,
            ..DigestSettings::default()
        };
        let results = vec![
            SiteResult::failed("Caído", "https://caido.mx/", "status 503".into()),
            site("Vacío", vec![]),
            site("Zona Franca", vec![accepted("Nueva ruta", DayTag::Today)]),
        ];
        let chunks = DigestFormatter::new(&settings).format(&results, &reference());
        assert_eq!(chunks[1], "⚠️ *Caído*: No se pudo acceder al sitio.");
        assert_eq!(chunks[2], "📭 *Vacío*\nSin noticias recientes para hoy.");
        assert!(chunks[3].starts_with("📰 *NOTICIA 1*"));
        assert_eq!(chunks.len(), 5);
    }
}
