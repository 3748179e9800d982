//! RSS 2.0 export of the article store.
//!
//! ```text
//! <?xml version="1.0" encoding="UTF-8"?>
//! <rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
//!   <channel>
//!     <title/> <link/> <description/> <language/>
//!     <item>
//!       <title/> <link/> <description><![CDATA[first 500 chars...]]></description>
//!       <pubDate/>?  <author/>?  <media:content url=".." medium="image"/>?
//!     </item>
//!   </channel>
//! </rss>
//! ```

use crate::config::Channel;
use crate::error::StoreError;
use crate::models::Article;
use crate::utils::truncate_chars;
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use tracing::{info, instrument};

pub const MEDIA_NS: &str = "http://search.yahoo.com/mrss/";

/// Characters of article text carried in each item description.
pub const DESCRIPTION_CHARS: usize = 500;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct RenderError(String);

fn put<W: Write>(w: &mut Writer<W>, event: Event<'_>) -> Result<(), RenderError> {
    w.write_event(event).map_err(|e| RenderError(e.to_string()))
}

/// Drop control characters that XML 1.0 cannot carry.
fn sanitize(input: &str) -> String {
    input
        .chars()
        .filter(|&c| matches!(c, '\t' | '\n' | '\r') || c >= ' ')
        .collect()
}

fn text_element<W: Write>(w: &mut Writer<W>, name: &str, text: &str) -> Result<(), RenderError> {
    put(w, Event::Start(BytesStart::new(name)))?;
    put(w, Event::Text(BytesText::new(&sanitize(text))))?;
    put(w, Event::End(BytesEnd::new(name)))
}

/// Split `content` into CDATA-safe sections.
///
/// A literal `]]>` would end the section early, so it is broken across two
/// adjacent sections (`]]` + `>`); readers concatenate them back.
pub fn cdata_sections(content: &str) -> Vec<String> {
    let parts: Vec<&str> = content.split("]]>").collect();
    let last = parts.len() - 1;
    parts
        .iter()
        .enumerate()
        .map(|(i, part)| {
            let mut section = String::with_capacity(part.len() + 3);
            if i > 0 {
                section.push('>');
            }
            section.push_str(part);
            if i < last {
                section.push_str("]]");
            }
            section
        })
        .collect()
}

/// Item description: the first [`DESCRIPTION_CHARS`] characters plus `...`.
pub fn description(text: &str) -> String {
    format!("{}...", truncate_chars(&sanitize(text), DESCRIPTION_CHARS))
}

fn pub_date(article: &Article) -> Option<String> {
    match article.publish_day() {
        Some(day) => day.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().to_rfc2822()),
        None => article.publish_date.clone().filter(|d| !d.trim().is_empty()),
    }
}

fn write_item<W: Write>(w: &mut Writer<W>, article: &Article) -> Result<(), RenderError> {
    put(w, Event::Start(BytesStart::new("item")))?;
    text_element(w, "title", &article.title)?;
    text_element(w, "link", &article.link)?;

    put(w, Event::Start(BytesStart::new("description")))?;
    for section in cdata_sections(&description(&article.text)) {
        put(w, Event::CData(BytesCData::new(section)))?;
    }
    put(w, Event::End(BytesEnd::new("description")))?;

    if let Some(date) = pub_date(article) {
        text_element(w, "pubDate", &date)?;
    }
    if !article.authors.is_empty() {
        text_element(w, "author", &article.authors.join(", "))?;
    }
    if let Some(image) = article.image() {
        let mut media = BytesStart::new("media:content");
        media.push_attribute(("url", sanitize(image).as_str()));
        media.push_attribute(("medium", "image"));
        put(w, Event::Empty(media))?;
    }

    put(w, Event::End(BytesEnd::new("item")))
}

/// Render the store as an RSS 2.0 document.
pub fn render_rss(articles: &[Article], channel: &Channel) -> Result<Vec<u8>, RenderError> {
    let mut w = Writer::new_with_indent(Vec::new(), b' ', 2);
    put(&mut w, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    rss.push_attribute(("xmlns:media", MEDIA_NS));
    put(&mut w, Event::Start(rss))?;
    put(&mut w, Event::Start(BytesStart::new("channel")))?;

    text_element(&mut w, "title", &channel.title)?;
    text_element(&mut w, "link", &channel.link)?;
    text_element(&mut w, "description", &channel.description)?;
    text_element(&mut w, "language", &channel.language)?;

    for article in articles {
        write_item(&mut w, article)?;
    }

    put(&mut w, Event::End(BytesEnd::new("channel")))?;
    put(&mut w, Event::End(BytesEnd::new("rss")))?;

    let mut out = w.into_inner();
    out.push(b'\n');
    Ok(out)
}

/// Render and write the RSS export.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_rss(articles: &[Article], channel: &Channel, path: &Path) -> Result<(), StoreError> {
    let display = path.display().to_string();
    let xml = render_rss(articles, channel).map_err(|e| StoreError::Xml {
        path: display.clone(),
        message: e.to_string(),
    })?;
    fs::write(path, xml).await.map_err(|source| StoreError::Io {
        path: display,
        source,
    })?;
    info!(items = articles.len(), "Wrote RSS export");
    Ok(())
}
