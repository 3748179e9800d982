//! Output generation for the article store.
//!
//! - [`json`]: The article store and processed-link history as JSON
//! - [`rss`]: The article store as an RSS 2.0 feed
//!
//! ```text
//! output_dir/
//! ├── new_articles.json     # article store
//! ├── new_articles.xml      # RSS export
//! └── processed_links.json  # link history
//! ```

pub mod json;
pub mod rss;
