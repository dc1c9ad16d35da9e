use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::resolve::DefaultImagePolicy;
use crate::sheet_fetch::DEFAULT_SHEET_URL;
use crate::wiki_fetch::DEFAULT_SUMMARY_URL;

#[derive(Debug, Clone)]
pub struct Config {
    pub sheet_url: String,
    pub summary_url: String,
    pub poll_interval: Duration,
    pub fetch_parallelism: usize,
    pub image_cache_path: Option<PathBuf>,
    pub default_image_policy: DefaultImagePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sheet_url: DEFAULT_SHEET_URL.to_string(),
            summary_url: DEFAULT_SUMMARY_URL.to_string(),
            poll_interval: Duration::from_secs(100),
            fetch_parallelism: 6,
            image_cache_path: None,
            default_image_policy: DefaultImagePolicy::Remember,
        }
    }
}

impl Config {
    /// Reads configuration from the environment. Call after `dotenvy` has
    /// loaded any `.env` files.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|val| !val.trim().is_empty());

        let poll_secs = non_empty("POLL_SECS")
            .and_then(|val| val.trim().parse::<u64>().ok())
            .unwrap_or(defaults.poll_interval.as_secs())
            .max(10);
        let fetch_parallelism = non_empty("FETCH_PARALLELISM")
            .and_then(|val| val.trim().parse::<usize>().ok())
            .unwrap_or(defaults.fetch_parallelism)
            .clamp(2, 32);
        let cache_default = non_empty("CACHE_DEFAULT_IMAGE").and_then(|val| parse_flag(&val));
        let default_image_policy = match cache_default {
            Some(false) => DefaultImagePolicy::Skip,
            _ => DefaultImagePolicy::Remember,
        };

        Self {
            sheet_url: non_empty("SHEET_URL").unwrap_or(defaults.sheet_url),
            summary_url: non_empty("WIKI_SUMMARY_URL").unwrap_or(defaults.summary_url),
            poll_interval: Duration::from_secs(poll_secs),
            fetch_parallelism,
            image_cache_path: non_empty("IMAGE_CACHE_PATH").map(PathBuf::from),
            default_image_policy,
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
