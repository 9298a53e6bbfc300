//! HTTP session: one pooled client plus the retry policy for the whole run.
//!
//! ## Retry Strategy
//!
//! Viewer backends answer 500/502/503/504 under load. Those statuses (and
//! connection failures / timeouts) are retried with exponential backoff
//! (`retry_backoff_ms * 2^(retry - 1)`); with the defaults the wait sequence
//! is 1 s → 2 s → 4 s. Every other non-2xx status fails on the first answer.
//!
//! The session is shared by reference between all workers of a batch.
//! `reqwest::Client` synchronises its own connection pool, so no locking
//! happens here. [`Session::close`] releases the pool explicitly; the
//! pipeline calls it on every exit path.

use crate::config::HttpConfig;
use crate::error::{DocsendError, HttpError};
use reqwest::{RequestBuilder, Response};
use serde::Serialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Which failures are retried, how often, and how long to wait between tries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub retry_statuses: Vec<u16>,
}

impl RetryPolicy {
    pub fn from_config(config: &HttpConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_backoff: Duration::from_millis(config.retry_backoff_ms),
            retry_statuses: config.retry_statuses.clone(),
        }
    }

    /// Delay before the `retry`-th retry (1-indexed).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_backoff.saturating_mul(factor)
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }

    fn is_retryable_error(err: &reqwest::Error) -> bool {
        err.is_connect() || err.is_timeout()
    }
}

/// A configured HTTP client shared by every stage of one download.
pub struct Session {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl Session {
    /// Build the client: cookie store on (the authorization cookie must carry
    /// over to page requests), pool limit and timeouts from `config`.
    pub fn open(config: &HttpConfig) -> Result<Self, DocsendError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(config.user_agent.clone())
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| DocsendError::Internal(format!("Failed to build HTTP client: {e}")))?;

        debug!(
            "HTTP session opened (pool {}/host, {} retries)",
            config.pool_max_idle_per_host, config.max_retries
        );

        Ok(Self {
            client,
            retry: RetryPolicy::from_config(config),
        })
    }

    /// GET `url`, returning the successful response.
    pub async fn get(&self, url: &str) -> Result<Response, HttpError> {
        self.send_with_retry(url, || self.client.get(url)).await
    }

    /// GET `url` and read the whole body.
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        let response = self.get(url).await?;
        let bytes = response.bytes().await.map_err(|source| HttpError::Body {
            url: url.to_string(),
            source,
        })?;
        Ok(bytes.to_vec())
    }

    /// POST `form` as `application/x-www-form-urlencoded`.
    pub async fn post_form<T: Serialize + ?Sized>(
        &self,
        url: &str,
        form: &T,
    ) -> Result<Response, HttpError> {
        self.send_with_retry(url, || self.client.post(url).form(form))
            .await
    }

    /// Release the connection pool.
    pub fn close(self) {
        debug!("HTTP session closed");
        drop(self.client);
    }

    async fn send_with_retry<F>(&self, url: &str, build: F) -> Result<Response, HttpError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut last_failure = String::new();

        for attempt in 0..=self.retry.max_retries {
            if attempt > 0 {
                let backoff = self.retry.delay_for(attempt);
                warn!(
                    "{}: retry {}/{} after {}ms ({})",
                    url,
                    attempt,
                    self.retry.max_retries,
                    backoff.as_millis(),
                    last_failure
                );
                sleep(backoff).await;
            }

            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        debug!("{} → {}", url, status);
                        return Ok(response);
                    }
                    if self.retry.is_retryable_status(status.as_u16()) {
                        last_failure = format!("HTTP {}", status.as_u16());
                        continue;
                    }
                    return Err(HttpError::Status {
                        url: url.to_string(),
                        status: status.as_u16(),
                    });
                }
                Err(e) if RetryPolicy::is_retryable_error(&e) => {
                    last_failure = e.to_string();
                }
                Err(source) => {
                    return Err(HttpError::Request {
                        url: url.to_string(),
                        source,
                    });
                }
            }
        }

        Err(HttpError::RetriesExhausted {
            url: url.to_string(),
            attempts: self.retry.max_retries + 1,
            last: last_failure,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_config() -> HttpConfig {
        HttpConfig {
            retry_backoff_ms: 1,
            ..HttpConfig::default()
        }
    }

    #[test]
    fn backoff_doubles_from_base() {
        let policy = RetryPolicy::from_config(&HttpConfig::default());
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
    }

    #[test]
    fn only_gateway_and_server_errors_retryable() {
        let policy = RetryPolicy::from_config(&HttpConfig::default());
        for s in [500, 502, 503, 504] {
            assert!(policy.is_retryable_status(s), "{s}");
        }
        for s in [400, 401, 403, 404, 429, 501] {
            assert!(!policy.is_retryable_status(s), "{s}");
        }
    }

    #[tokio::test]
    async fn transient_503_then_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let session = Session::open(&fast_config()).unwrap();
        let body = session
            .get_bytes(&format!("{}/flaky", server.uri()))
            .await
            .expect("503 followed by 200 should succeed");
        assert_eq!(body, b"ok");
    }

    #[tokio::test]
    async fn persistent_503_exhausts_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(503))
            .expect(4)
            .mount(&server)
            .await;

        let session = Session::open(&fast_config()).unwrap();
        let err = session
            .get(&format!("{}/down", server.uri()))
            .await
            .unwrap_err();
        assert!(err.is_retries_exhausted(), "got: {err}");
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn client_error_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let session = Session::open(&fast_config()).unwrap();
        let err = session
            .get(&format!("{}/missing", server.uri()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn post_form_retries_5xx() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/form"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/form"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let session = Session::open(&fast_config()).unwrap();
        let response = session
            .post_form(&format!("{}/form", server.uri()), &[("a", "b")])
            .await
            .unwrap();
        assert!(response.status().is_success());
    }
}
