//! Archive download with timeout and bounded retry.

use std::fmt;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::{ExtensionError, Result};

/// Downloads a remote archive into memory.
pub trait ArchiveFetcher: fmt::Debug {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Timeout and retry settings for archive downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Delay before retry `n` is `backoff * n`.
    pub backoff: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(500),
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts are used up.
    pub fn run<T>(&self, url: &str, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < attempts => {
                    let delay = self.backoff * attempt;
                    warn!(
                        url,
                        attempt,
                        error = %err,
                        "Download failed, retrying in {}ms",
                        delay.as_millis()
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Blocking HTTP fetcher used for `github:` references.
#[derive(Debug)]
pub struct HttpArchiveFetcher {
    client: reqwest::blocking::Client,
    policy: RetryPolicy,
}

impl HttpArchiveFetcher {
    pub fn new() -> Result<Self> {
        Self::with_policy(RetryPolicy::default())
    }

    pub fn with_policy(policy: RetryPolicy) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("tabext/", env!("CARGO_PKG_VERSION")))
            .timeout(policy.timeout)
            .build()
            .map_err(|e| ExtensionError::Download {
                url: String::new(),
                message: format!("failed to build HTTP client: {}", e),
                retryable: false,
            })?;
        Ok(Self { client, policy })
    }

    fn fetch_once(&self, url: &str) -> Result<Vec<u8>> {
        let transport = |e: reqwest::Error| ExtensionError::Download {
            url: url.to_string(),
            message: e.to_string(),
            retryable: true,
        };

        let response = self.client.get(url).send().map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExtensionError::Download {
                url: url.to_string(),
                message: format!("HTTP {}", status),
                retryable: status.is_server_error(),
            });
        }

        let bytes = response.bytes().map_err(transport)?;
        Ok(bytes.to_vec())
    }
}

impl ArchiveFetcher for HttpArchiveFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        info!(url, "Downloading archive");
        self.policy.run(url, || self.fetch_once(url))
    }
}
