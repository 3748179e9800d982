//! JSON output for the article store and the processed-link history.
//!
//! Files are pretty-printed with four-space indentation and keep non-ASCII
//! text literal, so headlines in Telugu or Hindi stay readable on disk.

use crate::error::StoreError;
use crate::models::Article;
use crate::store::ProcessedLinks;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Serialize `value` with the store's formatting.
pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}

async fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<(), StoreError> {
    let display = path.display().to_string();
    let bytes = to_pretty_json(value).map_err(|source| StoreError::Json {
        path: display.clone(),
        source,
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(|source| StoreError::Io {
            path: parent.display().to_string(),
            source,
        })?;
    }
    fs::write(path, bytes).await.map_err(|source| StoreError::Io {
        path: display,
        source,
    })
}

/// Write the article store.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_articles(articles: &[Article], path: &Path) -> Result<(), StoreError> {
    write_json(&articles, path).await?;
    info!(count = articles.len(), "Wrote article store");
    Ok(())
}

/// Write the processed-link history.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_processed_links(links: &ProcessedLinks, path: &Path) -> Result<(), StoreError> {
    write_json(links, path).await?;
    info!(count = links.len(), "Wrote processed links");
    Ok(())
}
