//! Network-client seam. Adapters only ever see [PageFetcher]; [HttpClient] is the blocking
//! reqwest implementation used in production. No delays and no retries: every request is sent once.

use crate::adapter::error::{FetchFailure, RetrievalError};
use std::time::Duration;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; fanficdl/0.1; +https://github.com/fanficdl)";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_REDIRECTS: usize = 10;

/// Fetches one page as UTF-8 text. Implementations must be safe for concurrent use.
pub trait PageFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<String, RetrievalError>;
}

/// Blocking HTTP client with a per-request timeout. Cheap to share: reqwest pools connections.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::blocking::Client,
}

impl HttpClient {
    /// Build a client with default User-Agent and timeout.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::builder().build()
    }

    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }
}

fn classify(e: &reqwest::Error) -> FetchFailure {
    if e.is_timeout() {
        FetchFailure::Timeout
    } else if e.is_connect() {
        FetchFailure::Connect
    } else if let Some(status) = e.status() {
        FetchFailure::Status(status.as_u16())
    } else if e.is_body() || e.is_decode() {
        FetchFailure::Body
    } else {
        FetchFailure::Other(e.to_string())
    }
}

impl PageFetcher for HttpClient {
    fn fetch(&self, url: &str) -> Result<String, RetrievalError> {
        let fail = |kind| RetrievalError::Fetch {
            url: url.to_string(),
            index: None,
            kind,
        };
        let response = self.inner.get(url).send().map_err(|e| fail(classify(&e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fail(FetchFailure::Status(status.as_u16())));
        }
        // reqwest decodes using the charset from Content-Type, falling back to UTF-8.
        response.text().map_err(|e| fail(classify(&e)))
    }
}

/// Builder for [HttpClient] with optional User-Agent and timeout.
#[derive(Debug)]
pub struct HttpClientBuilder {
    user_agent: Option<String>,
    timeout_secs: u64,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            user_agent: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl HttpClientBuilder {
    /// Set a custom User-Agent. If not set, a default identifying the tool is used.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Set request timeout in seconds. Default 30; zero is bumped to one.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs.max(1);
        self
    }

    pub fn build(self) -> Result<HttpClient, reqwest::Error> {
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let inner = reqwest::blocking::Client::builder()
            .cookie_store(true)
            .user_agent(user_agent)
            .timeout(Duration::from_secs(self.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(HttpClient { inner })
    }
}
