//! Google News wrapper-link decoder.
//!
//! Feed items link to `https://news.google.com/rss/articles/<id>` rather than
//! to the publisher. The destination is recovered in two requests:
//!
//! 1. Fetch the article page for `<id>` and read the signature
//!    (`data-n-a-sg`) and timestamp (`data-n-a-ts`) attributes of the
//!    `c-wiz > div[jscontroller]` element.
//! 2. POST a `garturlreq` envelope carrying id, timestamp and signature to the
//!    `batchexecute` RPC endpoint; the reply embeds the publisher URL.
//!
//! Links that are not hosted on `news.google.com` are returned unchanged.

use crate::api::LinkResolver;
use crate::error::ResolveError;
use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use reqwest::header::CONTENT_TYPE;
use scraper::{Html, Selector};
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};
use url::Url;

const GOOGLE_NEWS_HOST: &str = "news.google.com";
const BATCH_EXECUTE_URL: &str = "https://news.google.com/_/DotsSplashUi/data/batchexecute";
const PAGE_BASES: [&str; 2] = [
    "https://news.google.com/articles/",
    "https://news.google.com/rss/articles/",
];

static PARAMS_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("c-wiz > div[jscontroller]").expect("static selector"));

/// Signature and timestamp required by the `batchexecute` call.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodingParams {
    pub signature: String,
    pub timestamp: u64,
}

/// Extract the article id from a Google News wrapper link.
///
/// Returns `Ok(None)` for links on other hosts, which need no decoding.
pub fn article_id(link: &str) -> Result<Option<String>, ResolveError> {
    let url = Url::parse(link).map_err(|_| ResolveError::NotGoogleNews(link.to_string()))?;
    if url.host_str() != Some(GOOGLE_NEWS_HOST) {
        return Ok(None);
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();
    match segments.as_slice() {
        [.., kind, id] if matches!(*kind, "articles" | "read") => Ok(Some((*id).to_string())),
        _ => Err(ResolveError::NotGoogleNews(link.to_string())),
    }
}

/// Read the decoding parameters from an article page.
pub fn parse_decoding_params(html: &str) -> Option<DecodingParams> {
    let document = Html::parse_document(html);
    let element = document.select(&PARAMS_SELECTOR).next()?;
    let signature = element.value().attr("data-n-a-sg")?.to_string();
    let timestamp = element.value().attr("data-n-a-ts")?.trim().parse().ok()?;
    Some(DecodingParams { signature, timestamp })
}

/// Build the `f.req` form value for one article.
pub fn batchexecute_request(id: &str, params: &DecodingParams) -> String {
    let inner = format!(
        r#"["garturlreq",[["X","X",["X","X"],null,null,1,1,"US:en",null,1,null,null,null,null,null,0,1],"X","X",1,[1,1,1],1,1,null,0,0,null,0],"{}",{},"{}"]"#,
        id, params.timestamp, params.signature
    );
    json!([[["Fbv4je", inner]]]).to_string()
}

/// Pull the decoded URL out of a `batchexecute` response body.
///
/// The body is an anti-XSSI prefix, a blank line, then a JSON array whose
/// first entry's third element is itself a JSON string `["garturlres", url, ..]`.
pub fn parse_batchexecute(body: &str) -> Result<String, ResolveError> {
    let chunk = body
        .split("\n\n")
        .nth(1)
        .ok_or_else(|| ResolveError::BadResponse("missing payload chunk".into()))?;
    let outer: Value =
        serde_json::from_str(chunk.trim()).map_err(|e| ResolveError::BadResponse(e.to_string()))?;

    let payload = match outer.get(0).and_then(|entry| entry.get(2)) {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => return Err(ResolveError::Unsuccessful),
        Some(other) => return Err(ResolveError::BadResponse(format!("unexpected payload {other}"))),
    };
    let inner: Value =
        serde_json::from_str(payload).map_err(|e| ResolveError::BadResponse(e.to_string()))?;

    inner
        .get(1)
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .ok_or(ResolveError::Unsuccessful)
}

/// Rate limiting and server errors are worth another attempt; any other
/// status means the page variant simply has no parameters.
fn transient_status(url: &str, status: StatusCode) -> Option<ResolveError> {
    (status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error())
        .then(|| ResolveError::Network(format!("{url} returned status {status}")))
}

/// [`LinkResolver`] that talks to Google News.
#[derive(Debug, Clone)]
pub struct GoogleNewsDecoder {
    client: Client,
}

impl GoogleNewsDecoder {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Try each article page variant until one carries decoding parameters.
    async fn fetch_params(&self, id: &str) -> Result<DecodingParams, ResolveError> {
        let mut last_error = ResolveError::MissingParams;
        for base in PAGE_BASES {
            let page_url = format!("{base}{id}");
            let response = match self.client.get(&page_url).send().await {
                Ok(r) => r,
                Err(e) => {
                    debug!(%page_url, error = %e, "Article page request failed");
                    last_error = e.into();
                    continue;
                }
            };
            let status = response.status();
            if !status.is_success() {
                debug!(%page_url, %status, "Article page returned error status");
                if let Some(e) = transient_status(&page_url, status) {
                    last_error = e;
                }
                continue;
            }
            let html = response.text().await?;
            if let Some(params) = parse_decoding_params(&html) {
                return Ok(params);
            }
        }
        Err(last_error)
    }
}

impl LinkResolver for GoogleNewsDecoder {
    #[instrument(level = "debug", skip_all, fields(%link))]
    async fn resolve(&self, link: &str) -> Result<String, ResolveError> {
        let Some(id) = article_id(link)? else {
            debug!("Link is not wrapped; using as-is");
            return Ok(link.to_string());
        };

        let params = self.fetch_params(&id).await?;
        let body = self
            .client
            .post(BATCH_EXECUTE_URL)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded;charset=UTF-8")
            .form(&[("f.req", batchexecute_request(&id, &params))])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_batchexecute(&body).inspect_err(|e| warn!(error = %e, "batchexecute returned no URL"))
    }
}
