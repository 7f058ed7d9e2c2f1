//! HTTP client with rate limiting and error handling
//!
//! Shared by every remote source. Requests wait on a `governor` quota, and a
//! non-success status is an error just like a transport failure.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, direct::NotKeyed},
};
use reqwest::{
    Client, Response,
    header::{HeaderMap, HeaderValue, USER_AGENT},
};
use serde::de::DeserializeOwned;

use crate::infrastructure::config::SourceConfig;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    /// 0 disables rate limiting
    pub max_requests_per_second: u32,
    pub follow_redirects: bool,
}

impl HttpClientConfig {
    pub fn from_source_config(sources: &SourceConfig) -> Self {
        Self {
            user_agent: sources.user_agent.clone(),
            timeout_seconds: sources.request_timeout_seconds,
            max_requests_per_second: sources.max_requests_per_second,
            follow_redirects: sources.follow_redirects,
        }
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self::from_source_config(&SourceConfig::default())
    }
}

/// Cheap to clone; clones share the connection pool and the rate limiter.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    rate_limiter: Option<Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>>,
}

impl HttpClient {
    pub fn new(config: &HttpClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .gzip(true)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()
            .context("Failed to create HTTP client")?;

        let rate_limiter = NonZeroU32::new(config.max_requests_per_second)
            .map(|rps| Arc::new(RateLimiter::direct(Quota::per_second(rps))));

        Ok(Self { client, rate_limiter })
    }

    /// Fetch a URL with rate limiting; non-2xx statuses are errors.
    pub async fn get(&self, url: &str) -> Result<Response> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        tracing::debug!("Fetching URL: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch URL: {url}"))?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP request failed with status {}: {}", response.status(), url);
        }

        Ok(response)
    }

    pub async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.get(url).await?;
        response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from: {url}"))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body).with_context(|| format!("Failed to decode JSON from: {url}"))
    }
}
