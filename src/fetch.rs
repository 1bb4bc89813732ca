use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, warn};
use url::Url;

use crate::error::FetchError;

pub const MAX_RETRIES: u32 = 3;
pub const BASE_BACKOFF_MS: u64 = 2000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 45;
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Applied to each attempt, not to the whole retry sequence.
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff: Duration,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: MAX_RETRIES,
            backoff: Duration::from_millis(BASE_BACKOFF_MS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// A response after redirects, whatever its status.
#[derive(Debug, Clone)]
pub struct Page {
    pub final_url: String,
    pub status: u16,
    pub body: String,
}

/// Shared HTTP transport. Ignores proxy settings from the environment and
/// follows redirects.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .no_proxy()
            .build()?;
        Ok(Self { client, config })
    }

    /// GET with retries on 429, 5xx and transport errors. Once retries run
    /// out the last response is returned as is, so callers can inspect it.
    pub async fn get(&self, url: &str) -> Result<Page, FetchError> {
        self.get_within(url, None).await
    }

    /// Body of a successful response; any status of 400 or above is an error.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        self.text_of(self.get_within(url, None).await?)
    }

    /// Like [`Fetcher::get_text`] with a per-attempt timeout overriding the
    /// client default, for large downloads.
    pub async fn get_text_with_timeout(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        self.text_of(self.get_within(url, Some(timeout)).await?)
    }

    fn text_of(&self, page: Page) -> Result<String, FetchError> {
        if page.status >= 400 {
            return Err(FetchError::Status {
                status: page.status,
                url: page.final_url,
            });
        }
        Ok(page.body)
    }

    async fn get_within(&self, url: &str, timeout: Option<Duration>) -> Result<Page, FetchError> {
        let parsed = Url::parse(url).map_err(|source| FetchError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        let mut attempt = 0u32;
        loop {
            let result = self.send_once(parsed.clone(), timeout).await;
            let retry = match &result {
                Ok(page) => is_retriable_status(page.status),
                Err(e) => e.is_retriable(),
            };
            if !retry || attempt >= self.config.max_retries {
                return result;
            }

            let backoff = self.config.backoff.saturating_mul(2u32.saturating_pow(attempt));
            match &result {
                Ok(page) => warn!(
                    "HTTP {} on {} (attempt {}/{}), backing off {:.1}s",
                    page.status,
                    url,
                    attempt + 1,
                    self.config.max_retries,
                    backoff.as_secs_f64()
                ),
                Err(e) => warn!(
                    "{} (attempt {}/{}), backing off {:.1}s",
                    e,
                    attempt + 1,
                    self.config.max_retries,
                    backoff.as_secs_f64()
                ),
            }
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }

    async fn send_once(&self, url: Url, timeout: Option<Duration>) -> Result<Page, FetchError> {
        let mut request = self.client.get(url);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await?;
        let final_url = response.url().to_string();
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!("GET {} -> {} ({} bytes)", final_url, status, body.len());
        Ok(Page {
            final_url,
            status,
            body,
        })
    }
}

fn is_retriable_status(status: u16) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS.as_u16() || status >= 500
}
