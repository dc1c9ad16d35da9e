use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Identifies the board to the APIs it polls; Wikipedia rejects anonymous clients.
pub const CLIENT_USER_AGENT: &str = "WankilPoll/1.0 (https://example.com; contact@example.com)";

static CLIENT: OnceCell<Client> = OnceCell::new();

pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(CLIENT_USER_AGENT)
            .build()
            .context("failed to build http client")
    })
}
