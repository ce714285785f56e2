//! Title, date and summary extraction from an article page.
//!
//! Each field is found by trying selectors in priority order and keeping the
//! first usable hit. Dates go through a list of [`DateCandidate`] strategies,
//! from machine-readable metadata down to visible text in date-ish classes.

use crate::dates::{looks_like_date, looks_relative};
use crate::models::{DATE_NOT_FOUND, ExtractedArticle, NO_TITLE};
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

fn selectors(list: &[&str]) -> Vec<Selector> {
    list.iter().map(|css| selector(css)).collect()
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().join(" ")
}

static TITLE: Lazy<Vec<Selector>> = Lazy::new(|| {
    selectors(&[
        "h1",
        ".entry-title",
        ".post-title",
        ".titulo-noticia",
        ".article-title",
        ".headline",
    ])
});

static OG_TITLE: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property="og:title"]"#));

static CONTENT_PARAGRAPHS: Lazy<Vec<Selector>> = Lazy::new(|| {
    selectors(&[
        "article .entry-content p",
        "article .post-content p",
        ".entry-content p",
        ".post-content p",
        r#"[itemprop="articleBody"] p"#,
        ".article-body p",
        ".contenido p",
        ".nota-contenido p",
        "article p",
    ])
});

/// Paragraph fragments that mark styling, legal text, ads and share prompts.
const BOILERPLATE: &[&str] = &[
    "{",
    "font-",
    "margin:",
    "margin-",
    "color:#",
    "display:",
    "!important",
    "©",
    "todos los derechos",
    "publicidad",
    "suscríbete",
    "suscribete",
    "newsletter",
    "compartir",
    "comparte esta",
    "share this",
];

fn is_boilerplate(paragraph: &str) -> bool {
    let lowered = paragraph.to_lowercase();
    BOILERPLATE.iter().any(|marker| lowered.contains(marker))
}

/// A source of raw publish-date text on an article page.
pub trait DateCandidate: Send + Sync {
    fn name(&self) -> &'static str;
    fn find(&self, document: &Html) -> Option<String>;
}

/// `content` of publish-date meta tags.
pub struct MetaTags {
    selectors: Vec<Selector>,
}

impl Default for MetaTags {
    fn default() -> Self {
        Self {
            selectors: selectors(&[
                r#"meta[property="article:published_time"]"#,
                r#"meta[name="date"]"#,
                r#"meta[name="publish-date"]"#,
                r#"meta[name="pubdate"]"#,
                r#"meta[itemprop="datePublished"]"#,
                r#"[itemprop="datePublished"][content]"#,
            ]),
        }
    }
}

impl DateCandidate for MetaTags {
    fn name(&self) -> &'static str {
        "meta"
    }

    fn find(&self, document: &Html) -> Option<String> {
        self.selectors
            .iter()
            .flat_map(|s| document.select(s))
            .filter_map(|el| el.value().attr("content"))
            .map(str::trim)
            .find(|content| !content.is_empty())
            .map(str::to_string)
    }
}

/// `<time datetime="...">`.
pub struct TimeAttribute {
    selector: Selector,
}

impl Default for TimeAttribute {
    fn default() -> Self {
        Self {
            selector: selector("time[datetime]"),
        }
    }
}

impl DateCandidate for TimeAttribute {
    fn name(&self) -> &'static str {
        "time-attr"
    }

    fn find(&self, document: &Html) -> Option<String> {
        document
            .select(&self.selector)
            .next()
            .and_then(|el| el.value().attr("datetime"))
            .map(|v| v.trim().to_string())
    }
}

/// Short "hace 3 horas" snippets in small inline elements.
pub struct RelativeSnippet {
    selector: Selector,
    max_chars: usize,
}

impl Default for RelativeSnippet {
    fn default() -> Self {
        Self {
            selector: selector("span, small, time, em, abbr"),
            max_chars: 40,
        }
    }
}

impl DateCandidate for RelativeSnippet {
    fn name(&self) -> &'static str {
        "relative"
    }

    fn find(&self, document: &Html) -> Option<String> {
        document
            .select(&self.selector)
            .map(element_text)
            .find(|text| text.chars().count() <= self.max_chars && looks_relative(text))
    }
}

/// Visible text of the first `<time>`, when short and containing a digit.
pub struct TimeText {
    selector: Selector,
    max_chars: usize,
}

impl Default for TimeText {
    fn default() -> Self {
        Self {
            selector: selector("time"),
            max_chars: 60,
        }
    }
}

impl DateCandidate for TimeText {
    fn name(&self) -> &'static str {
        "time-text"
    }

    fn find(&self, document: &Html) -> Option<String> {
        let text = element_text(document.select(&self.selector).next()?);
        (text.chars().any(|c| c.is_ascii_digit()) && text.chars().count() <= self.max_chars)
            .then_some(text)
    }
}

/// Text of date-labelled classes, only if it actually looks like a date.
pub struct DateClass {
    selector: Selector,
}

impl Default for DateClass {
    fn default() -> Self {
        Self {
            selector: selector(
                ".fecha, .post-date, .published, .entry-date, .date, .article-date, .td-post-date, .meta-date",
            ),
        }
    }
}

impl DateCandidate for DateClass {
    fn name(&self) -> &'static str {
        "date-class"
    }

    fn find(&self, document: &Html) -> Option<String> {
        document
            .select(&self.selector)
            .map(element_text)
            .find(|text| looks_like_date(text))
    }
}

/// Pulls [`ExtractedArticle`] fields out of article HTML.
pub struct ArticleExtractor {
    date_candidates: Vec<Box<dyn DateCandidate>>,
    min_paragraph_chars: usize,
    max_paragraphs: usize,
}

impl ArticleExtractor {
    pub fn new(min_paragraph_chars: usize) -> Self {
        Self {
            date_candidates: vec![
                Box::new(MetaTags::default()),
                Box::new(TimeAttribute::default()),
                Box::new(RelativeSnippet::default()),
                Box::new(TimeText::default()),
                Box::new(DateClass::default()),
            ],
            min_paragraph_chars,
            max_paragraphs: 2,
        }
    }

    pub fn extract(&self, html: &str) -> ExtractedArticle {
        let document = Html::parse_document(html);
        ExtractedArticle {
            title: Self::title(&document),
            date: self.date(&document),
            summary: self.summary(&document),
        }
    }

    fn title(document: &Html) -> String {
        TITLE
            .iter()
            .filter_map(|s| document.select(s).next())
            .map(element_text)
            .find(|t| !t.is_empty())
            .or_else(|| {
                document
                    .select(&OG_TITLE)
                    .next()
                    .and_then(|el| el.value().attr("content"))
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
            })
            .unwrap_or_else(|| NO_TITLE.to_string())
    }

    fn date(&self, document: &Html) -> String {
        self.date_candidates
            .iter()
            .filter_map(|candidate| {
                let found = candidate.find(document)?;
                tracing::trace!(source = candidate.name(), date = %found, "Date candidate");
                Some(found)
            })
            .find(|d| d.chars().count() > 3 && !d.contains('{'))
            .unwrap_or_else(|| DATE_NOT_FOUND.to_string())
    }

    fn summary(&self, document: &Html) -> String {
        let mut paragraphs: Vec<String> = Vec::new();
        for selector in CONTENT_PARAGRAPHS.iter() {
            for element in document.select(selector) {
                if paragraphs.len() >= self.max_paragraphs {
                    return paragraphs.join("\n\n");
                }
                let text = element.text().collect::<String>().trim().to_string();
                if text.chars().count() < self.min_paragraph_chars
                    || is_boilerplate(&text)
                    || paragraphs.contains(&text)
                {
                    continue;
                }
                paragraphs.push(text);
            }
        }
        paragraphs.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> ArticleExtractor {
        ArticleExtractor::new(60)
    }

    const ARTICLE: &str = r#"
<html><head>
  <meta property="og:title" content="Título OG">
  <meta property="article:published_time" content="2024-03-15T09:30:00-06:00">
</head><body>
  <article>
    <h1>  Inauguran nueva biblioteca
        pública municipal </h1>
    <span class="cat">Cultura</span>
    <div class="entry-content">
      <p>Breve.</p>
      <p>Publicidad: conoce las ofertas de temporada en nuestra tienda en línea y aprovecha.</p>
      <p>La nueva biblioteca pública municipal abrió sus puertas este viernes en la colonia Centro de León.</p>
      <p>El recinto cuenta con más de veinte mil volúmenes y una sala de lectura para niñas y niños.</p>
      <p>Tercer párrafo que no debe aparecer porque solo se toman dos párrafos del contenido.</p>
    </div>
  </article>
</body></html>"#;

    #[test]
    fn test_extracts_all_fields() {
        let article = extractor().extract(ARTICLE);
        assert_eq!(article.title, "Inauguran nueva biblioteca pública municipal");
        assert_eq!(article.date, "2024-03-15T09:30:00-06:00");
        assert_eq!(
            article.summary,
            "La nueva biblioteca pública municipal abrió sus puertas este viernes en la colonia Centro de León.\n\n\
             El recinto cuenta con más de veinte mil volúmenes y una sala de lectura para niñas y niños."
        );
    }

    #[test]
    fn test_defaults_when_nothing_found() {
        let article = extractor().extract("<html><body><div>nada</div></body></html>");
        assert_eq!(article.title, NO_TITLE);
        assert_eq!(article.date, DATE_NOT_FOUND);
        assert_eq!(article.summary, "");
    }

    #[test]
    fn test_title_falls_back_to_og_meta() {
        let html = r#"<html><head><meta property="og:title" content="Título desde meta"></head><body></body></html>"#;
        assert_eq!(extractor().extract(html).title, "Título desde meta");
    }

    #[test]
    fn test_time_attribute_beats_visible_text() {
        let html = r#"<html><body><time datetime="2024-03-14">14 de marzo</time></body></html>"#;
        assert_eq!(extractor().extract(html).date, "2024-03-14");
    }

    #[test]
    fn test_relative_snippet() {
        let html = r#"<html><body><div class="meta"><span>Por Redacción</span><span>hace 3 horas</span></div></body></html>"#;
        assert_eq!(extractor().extract(html).date, "hace 3 horas");
    }

    #[test]
    fn test_time_text_without_attribute() {
        let html = r#"<html><body><time>15/03/2024 10:20</time></body></html>"#;
        assert_eq!(extractor().extract(html).date, "15/03/2024 10:20");
    }

    #[test]
    fn test_date_class_must_look_like_a_date() {
        let html = r#"<html><body>
            <div class="date">Seguridad</div>
            <div class="fecha">15 de marzo de 2024</div>
        </body></html>"#;
        assert_eq!(extractor().extract(html).date, "15 de marzo de 2024");

        let html = r#"<html><body><div class="date">Seguridad</div></body></html>"#;
        assert_eq!(extractor().extract(html).date, DATE_NOT_FOUND);
    }

    #[test]
    fn test_summary_skips_css_and_duplicates() {
        let html = r#"<html><body><article><div class="entry-content">
            <p>.wp-block { margin-top: 10px; font-size: 12px } .x { display:none }</p>
            <p>Vecinos de la colonia San Juan de Dios denunciaron baches que llevan meses sin reparación.</p>
        </div></article></body></html>"#;
        let summary = extractor().extract(html).summary;
        assert_eq!(
            summary,
            "Vecinos de la colonia San Juan de Dios denunciaron baches que llevan meses sin reparación."
        );
    }
}
