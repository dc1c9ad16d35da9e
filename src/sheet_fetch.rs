use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::header::{CACHE_CONTROL, PRAGMA};

use crate::http_client::http_client;

/// Published CSV export of the poll's response sheet.
pub const DEFAULT_SHEET_URL: &str = "https://docs.google.com/spreadsheets/d/e/2PACX-1vTh3Yhj4a01BmOlK9dPQlv-B525nDC_AJS3M9rIKx33SOwRt1eyuQ8D_zDBXJ0D5nUyMBVfXdVJFikt/pub?output=csv";

/// Anything that can hand back the raw poll CSV.
pub trait SheetSource: Sync {
    fn fetch_csv(&self) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct PublishedSheet {
    pub url: String,
}

impl PublishedSheet {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl SheetSource for PublishedSheet {
    fn fetch_csv(&self) -> Result<String> {
        let client = http_client()?;
        let url = with_cache_buster(&self.url);
        let resp = client
            .get(&url)
            .header(CACHE_CONTROL, "no-store")
            .header(PRAGMA, "no-cache")
            .send()
            .context("sheet request failed")?;
        let status = resp.status();
        let body = resp.text().context("failed reading sheet body")?;
        if !status.is_success() {
            return Err(anyhow::anyhow!("sheet http {status}"));
        }
        Ok(body)
    }
}

/// Appends a `_=<millis>` query parameter unless one is already present.
pub fn with_cache_buster(url: &str) -> String {
    if url.contains("?_=") || url.contains("&_=") {
        return url.to_string();
    }
    let ts = Utc::now().timestamp_millis();
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}_={ts}")
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_SHEET_URL, with_cache_buster};

    #[test]
    fn with_cache_buster_keeps_existing_param() {
        let input = "https://example.com/pub?output=csv&_=123";
        assert_eq!(with_cache_buster(input), input);
    }

    #[test]
    fn with_cache_buster_ignores_params_ending_in_underscore() {
        let out = with_cache_buster("https://example.com/pub?foo_=1");
        assert!(out.starts_with("https://example.com/pub?foo_=1&_="));
        let out = with_cache_buster("https://example.com/pub?_=9");
        assert_eq!(out, "https://example.com/pub?_=9");
    }

    #[test]
    fn with_cache_buster_appends_to_existing_query() {
        let out = with_cache_buster(DEFAULT_SHEET_URL);
        assert!(out.starts_with(DEFAULT_SHEET_URL));
        assert!(out[DEFAULT_SHEET_URL.len()..].starts_with("&_="));
    }

    #[test]
    fn with_cache_buster_starts_query_when_missing() {
        let out = with_cache_buster("https://example.com/sheet.csv");
        assert!(out.starts_with("https://example.com/sheet.csv?_="));
    }
}
