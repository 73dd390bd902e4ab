// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use reqwest::header::USER_AGENT;

use crate::error::{RenderError, Result};
use crate::models::ScraperConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &ScraperConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.page_timeout())
        .build()?;
    Ok(client)
}

/// Fetch a page body with a per-request timeout and optional user agent
/// override. Non-success statuses are reported as `RenderError::Status`.
pub async fn fetch_text(
    client: &reqwest::Client,
    url: &str,
    user_agent: Option<&str>,
    timeout: Duration,
) -> std::result::Result<String, RenderError> {
    let classify = |e: reqwest::Error| {
        if e.is_timeout() {
            RenderError::Timeout(timeout)
        } else {
            RenderError::from(e)
        }
    };

    let mut request = client.get(url).timeout(timeout);
    if let Some(agent) = user_agent {
        request = request.header(USER_AGENT, agent);
    }

    let response = request.send().await.map_err(classify)?;
    let status = response.status();
    if !status.is_success() {
        return Err(RenderError::Status(status.as_u16()));
    }
    response.text().await.map_err(classify)
}
