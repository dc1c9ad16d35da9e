use anyhow::{Context, Result};
use reqwest::Url;
use serde::Deserialize;

use crate::http_client::http_client;

pub const DEFAULT_SUMMARY_URL: &str = "https://en.wikipedia.org/api/rest_v1/page/summary/";

/// Remote page-summary lookup used to find an image for an answer.
pub trait SummaryLookup: Sync {
    /// `Ok(Some(url))` when the page exists and has a thumbnail, `Ok(None)`
    /// when it answered without one (including non-success statuses).
    fn thumbnail(&self, title: &str) -> Result<Option<String>>;
}

#[derive(Debug, Clone)]
pub struct WikiSummaryClient {
    base_url: String,
}

impl WikiSummaryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn summary_url(&self, title: &str) -> Result<Url> {
        summary_url(&self.base_url, title)
    }
}

impl Default for WikiSummaryClient {
    fn default() -> Self {
        Self::new(DEFAULT_SUMMARY_URL)
    }
}

impl SummaryLookup for WikiSummaryClient {
    fn thumbnail(&self, title: &str) -> Result<Option<String>> {
        let client = http_client()?;
        let url = self.summary_url(title)?;
        let resp = client.get(url).send().context("summary request failed")?;
        if !resp.status().is_success() {
            return Ok(None);
        }
        let body = resp.text().context("failed reading summary body")?;
        parse_summary_thumbnail(&body)
    }
}

/// Builds `{base}{title}` with the title encoded as a single path segment.
pub fn summary_url(base: &str, title: &str) -> Result<Url> {
    let mut url = Url::parse(base).with_context(|| format!("invalid summary url {base}"))?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("summary url cannot take a path: {base}"))?
        .pop_if_empty()
        .push(title);
    Ok(url)
}

#[derive(Debug, Deserialize)]
struct PageSummary {
    #[serde(default)]
    thumbnail: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    #[serde(default)]
    source: Option<String>,
}

pub fn parse_summary_thumbnail(raw: &str) -> Result<Option<String>> {
    let summary: PageSummary = serde_json::from_str(raw).context("invalid summary json")?;
    Ok(summary
        .thumbnail
        .and_then(|t| t.source)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}
