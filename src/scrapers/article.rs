//! Article page downloader and metadata extractor.
//!
//! Publisher pages vary wildly, so each field is read from a ranked list of
//! sources and the first hit wins:
//!
//! | Field | Sources, in order |
//! |-------|-------------------|
//! | title | `og:title`, `<title>`, first `<h1>` |
//! | authors | JSON-LD `author`, `meta[name=author]`, `[rel=author]` |
//! | publish date | JSON-LD `datePublished`, `article:published_time`, date meta tags, `<time datetime>`, `/YYYY/MM/DD/` in the URL |
//! | text | `<p>` inside `<article>`, else every `<p>` |
//! | top image | `og:image`, `twitter:image`, `link[rel=image_src]` |

use crate::api::ContentExtractor;
use crate::error::ExtractError;
use crate::models::{Article, DATE_FORMAT};
use crate::utils::normalize_whitespace;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::{debug, info, instrument};
use url::Url;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

static JSON_LD: Lazy<Selector> = Lazy::new(|| selector("script[type='application/ld+json']"));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));
static H1: Lazy<Selector> = Lazy::new(|| selector("h1"));
static META: Lazy<Selector> = Lazy::new(|| selector("meta[content]"));
static REL_AUTHOR: Lazy<Selector> = Lazy::new(|| selector("[rel='author']"));
static TIME: Lazy<Selector> = Lazy::new(|| selector("time[datetime]"));
static ARTICLE_P: Lazy<Selector> = Lazy::new(|| selector("article p"));
static P: Lazy<Selector> = Lazy::new(|| selector("p"));
static IMAGE_SRC: Lazy<Selector> = Lazy::new(|| selector("link[rel='image_src'][href]"));
static URL_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(\d{4})/(\d{1,2})/(\d{1,2})(?:/|$)").expect("static regex"));

const DATE_META_KEYS: [&str; 8] = [
    "article:published_time",
    "og:published_time",
    "datepublished",
    "pubdate",
    "publishdate",
    "publish-date",
    "date",
    "dc.date.issued",
];

/// Parse a downloaded page into an [`Article`] whose `link` is `url`.
pub fn parse_article(html: &str, url: &str) -> Result<Article, ExtractError> {
    let document = Html::parse_document(html);
    let json_ld = json_ld_objects(&document);

    let title = extract_title(&document);
    let text = extract_text(&document);
    if title.is_empty() && text.is_empty() {
        return Err(ExtractError::Empty);
    }

    Ok(Article {
        title,
        authors: extract_authors(&document, &json_ld),
        publish_date: extract_publish_date(&document, &json_ld, url).map(|d| d.format(DATE_FORMAT).to_string()),
        text,
        top_image: extract_top_image(&document, url),
        link: url.to_string(),
    })
}

/// Every JSON-LD object on the page, with top-level arrays and `@graph`
/// containers flattened.
fn json_ld_objects(document: &Html) -> Vec<Value> {
    let mut objects = Vec::new();
    for script in document.select(&JSON_LD) {
        let raw = script.text().collect::<String>();
        let Ok(value) = serde_json::from_str::<Value>(raw.trim()) else {
            continue;
        };
        let mut stack = vec![value];
        while let Some(value) = stack.pop() {
            match value {
                Value::Array(items) => stack.extend(items.into_iter().rev()),
                Value::Object(mut map) => {
                    if let Some(graph) = map.remove("@graph") {
                        stack.push(graph);
                    }
                    objects.push(Value::Object(map));
                }
                _ => {}
            }
        }
    }
    objects
}

/// `content` of the first `<meta>` whose `property`, `name` or `itemprop`
/// matches one of `keys` (case-insensitive), honouring the order of `keys`.
fn meta_content(document: &Html, keys: &[&str]) -> Option<String> {
    let metas: Vec<ElementRef> = document.select(&META).collect();
    keys.iter().find_map(|key| {
        metas.iter().find_map(|meta| {
            let el = meta.value();
            let matches = ["property", "name", "itemprop"]
                .iter()
                .filter_map(|attr| el.attr(attr))
                .any(|v| v.eq_ignore_ascii_case(key));
            if !matches {
                return None;
            }
            el.attr("content")
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
        })
    })
}

fn element_text(element: ElementRef) -> String {
    normalize_whitespace(&element.text().collect::<String>())
}

fn extract_title(document: &Html) -> String {
    meta_content(document, &["og:title"])
        .map(|t| normalize_whitespace(&t))
        .or_else(|| document.select(&TITLE).next().map(element_text))
        .filter(|t| !t.is_empty())
        .or_else(|| document.select(&H1).next().map(element_text))
        .unwrap_or_default()
}

fn author_names(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.trim().to_string()],
        Value::Object(obj) => obj
            .get("name")
            .map(author_names)
            .unwrap_or_default(),
        Value::Array(items) => items.iter().flat_map(author_names).collect(),
        _ => Vec::new(),
    }
}

fn extract_authors(document: &Html, json_ld: &[Value]) -> Vec<String> {
    let mut authors: Vec<String> = json_ld
        .iter()
        .filter_map(|obj| obj.get("author"))
        .flat_map(author_names)
        .collect();

    if authors.is_empty() {
        authors.extend(meta_content(document, &["author", "article:author"]));
    }
    if authors.is_empty() {
        authors.extend(document.select(&REL_AUTHOR).map(element_text));
    }

    authors
        .into_iter()
        .map(|a| normalize_whitespace(&a))
        .filter(|a| !a.is_empty() && !a.starts_with("http"))
        .unique()
        .collect()
}

/// Parse a date in any of the layouts publishers commonly emit.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.date_naive());
    }
    for layout in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, layout) {
            return Some(dt.date());
        }
    }
    for layout in ["%Y-%m-%d", "%B %d, %Y", "%b %d, %Y", "%d %B %Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(raw, layout) {
            return Some(d);
        }
    }
    // Offsets like `+0530` that RFC 3339 rejects.
    raw.get(..10).and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
}

fn date_from_url(url: &str) -> Option<NaiveDate> {
    let caps = URL_DATE.captures(url)?;
    NaiveDate::from_ymd_opt(
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    )
}

fn extract_publish_date(document: &Html, json_ld: &[Value], url: &str) -> Option<NaiveDate> {
    json_ld
        .iter()
        .filter_map(|obj| obj.get("datePublished").and_then(Value::as_str))
        .find_map(parse_date)
        .or_else(|| meta_content(document, &DATE_META_KEYS).and_then(|d| parse_date(&d)))
        .or_else(|| {
            document
                .select(&TIME)
                .filter_map(|t| t.value().attr("datetime"))
                .find_map(parse_date)
        })
        .or_else(|| date_from_url(url))
}

fn extract_text(document: &Html) -> String {
    let in_article: Vec<String> = document
        .select(&ARTICLE_P)
        .map(element_text)
        .filter(|p| !p.is_empty())
        .collect();
    let paragraphs = if in_article.is_empty() {
        document
            .select(&P)
            .map(element_text)
            .filter(|p| !p.is_empty())
            .collect()
    } else {
        in_article
    };
    paragraphs.join("\n\n")
}

fn extract_top_image(document: &Html, url: &str) -> Option<String> {
    let raw = meta_content(document, &["og:image", "og:image:url", "twitter:image", "twitter:image:src"])
        .or_else(|| {
            document
                .select(&IMAGE_SRC)
                .next()
                .and_then(|l| l.value().attr("href"))
                .map(str::to_string)
        })?;
    match Url::parse(url).and_then(|base| base.join(&raw)) {
        Ok(resolved) => Some(resolved.to_string()),
        Err(_) => Some(raw),
    }
}

/// [`ContentExtractor`] that downloads pages over HTTP.
#[derive(Debug, Clone)]
pub struct HttpArticleExtractor {
    client: Client,
}

impl HttpArticleExtractor {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl ContentExtractor for HttpArticleExtractor {
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn extract(&self, url: &str) -> Result<Article, ExtractError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        debug!(bytes = body.len(), "Downloaded article page");

        let article = parse_article(&body, url)?;
        info!(
            title = %article.title,
            chars = article.text.chars().count(),
            date = ?article.publish_date,
            "Parsed article"
        );
        Ok(article)
    }
}
