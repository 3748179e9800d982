//! Utility functions for string handling and file system checks.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Truncate a string for logging purposes.
///
/// # Arguments
///
/// * `s` - The string to potentially truncate
/// * `max` - Maximum number of characters to keep
///
/// # Returns
///
/// The original string if it has at most `max` characters, otherwise the
/// first `max` with `"…(+N chars)"` appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 chars)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    let total = s.chars().count();
    if total <= max {
        s.to_string()
    } else {
        format!("{}…(+{} chars)", truncate_chars(s, max), total - max)
    }
}

/// The first `max` characters of `s`, never splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn normalize_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

/// Capitalize the first character of a string.
///
/// ```ignore
/// assert_eq!(upcase("gadwal"), "Gadwal");
/// assert_eq!(upcase(""), "");
/// ```
pub fn upcase(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().collect::<String>() + c.as_str(),
    }
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then creates and removes a probe file.
///
/// # Arguments
///
/// * `path` - The output directory
///
/// # Returns
///
/// `Ok(())` when a file could be created there, otherwise the I/O error.
///
/// # Examples
///
/// ```ignore
/// ensure_writable_dir("./out").await?;
/// ```
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Output directory is writable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.ends_with("…(+400 chars)"));
    }

    #[test]
    fn test_truncate_chars_respects_code_points() {
        assert_eq!(truncate_chars("గద్వాల్ news", 3), "గద్");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a \n\t b   c "), "a b c");
    }

    #[test]
    fn test_upcase() {
        assert_eq!(upcase("gadwal"), "Gadwal");
        assert_eq!(upcase(""), "");
        assert_eq!(upcase("a"), "A");
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        ensure_writable_dir(nested.to_str().unwrap()).await.unwrap();
        assert!(nested.is_dir());
    }
}
