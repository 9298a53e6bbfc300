//! Configuration types for document downloads.
//!
//! All download behaviour is controlled through [`DownloadConfig`], built via
//! [`DownloadConfigBuilder`]. Transport behaviour (pool size, timeouts, the
//! retry policy for transient 5xx answers) lives in the nested [`HttpConfig`]
//! so tests can inject a fast retry policy and a mock-server base URL.

use crate::error::DocsendError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Host used when no `base_url` is configured.
pub const DEFAULT_BASE_URL: &str = "https://docsend.com";

/// Pages fetched concurrently per batch when not configured.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Configuration for a document download.
///
/// # Example
/// ```rust
/// use docsend_dl::{Credentials, DownloadConfig};
///
/// let config = DownloadConfig::builder()
///     .batch_size(8)
///     .credentials(Credentials::new("me@example.com"))
///     .build()
///     .unwrap();
/// assert_eq!(config.batch_size, 8);
/// ```
#[derive(Clone)]
pub struct DownloadConfig {
    /// Scheme and host of the viewer, without trailing slash. Default: `https://docsend.com`.
    pub base_url: String,

    /// Pages fetched concurrently per batch. Default: 5.
    ///
    /// Also the memory ceiling: at most one batch of decoded pages is held
    /// at a time, whatever the document length.
    pub batch_size: usize,

    /// Email / passcode submitted when the viewer asks for them.
    pub credentials: Option<Credentials>,

    /// Transport settings shared by every request of the run.
    pub http: HttpConfig,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            credentials: None,
            http: HttpConfig::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for DownloadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadConfig")
            .field("base_url", &self.base_url)
            .field("batch_size", &self.batch_size)
            .field("credentials", &self.credentials)
            .field("http", &self.http)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn DownloadProgressCallback>"),
            )
            .finish()
    }
}

impl DownloadConfig {
    /// Create a new builder for `DownloadConfig`.
    pub fn builder() -> DownloadConfigBuilder {
        DownloadConfigBuilder {
            config: Self::default(),
        }
    }

    /// Check the constraints `build()` enforces.
    ///
    /// The fields are public, so every download entry point calls this again
    /// before touching the network.
    pub fn validate(&self) -> Result<(), DocsendError> {
        if self.batch_size == 0 {
            return Err(DocsendError::InvalidConfig(
                "Batch size must be ≥ 1".into(),
            ));
        }
        if reqwest::Url::parse(&self.base_url).is_err() {
            return Err(DocsendError::InvalidConfig(format!(
                "Base URL is not a valid URL: '{}'",
                self.base_url
            )));
        }
        if let Some(ref creds) = self.credentials {
            if creds.email.trim().is_empty() {
                return Err(DocsendError::InvalidConfig(
                    "Email must not be empty".into(),
                ));
            }
        }
        if self.http.request_timeout_secs == 0 {
            return Err(DocsendError::InvalidConfig(
                "Request timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(())
    }
}

/// Email and optional passcode for gated documents.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub passcode: Option<String>,
}

impl Credentials {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            passcode: None,
        }
    }

    pub fn with_passcode(mut self, passcode: impl Into<String>) -> Self {
        self.passcode = Some(passcode.into());
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("passcode", &self.passcode.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Transport configuration: connection pool, timeouts and retry policy.
///
/// Transient server errors are retried with exponential backoff:
/// `retry_backoff_ms * 2^(retry - 1)`, so the defaults wait 1 s → 2 s → 4 s
/// before giving up after the third retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Retries after the first attempt for a transient failure. Default: 3.
    pub max_retries: u32,

    /// Delay before the first retry, doubled for each further retry. Default: 1000.
    pub retry_backoff_ms: u64,

    /// Status codes treated as transient. Default: 500, 502, 503, 504.
    ///
    /// Anything else outside 2xx fails immediately; a 401/403 means bad
    /// credentials and will not get better by asking again.
    pub retry_statuses: Vec<u16>,

    /// Idle connections kept per host. Default: 50.
    pub pool_max_idle_per_host: usize,

    /// Per-request timeout in seconds. Default: 60.
    pub request_timeout_secs: u64,

    /// TCP/TLS connect timeout in seconds. Default: 30.
    pub connect_timeout_secs: u64,

    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_backoff_ms: 1000,
            retry_statuses: vec![500, 502, 503, 504],
            pool_max_idle_per_host: 50,
            request_timeout_secs: 60,
            connect_timeout_secs: 30,
            user_agent: concat!("docsend-dl/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Builder for [`DownloadConfig`].
#[derive(Debug)]
pub struct DownloadConfigBuilder {
    config: DownloadConfig,
}

impl DownloadConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.batch_size = n;
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.config.credentials = Some(credentials);
        self
    }

    pub fn http(mut self, http: HttpConfig) -> Self {
        self.config.http = http;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.http.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.http.retry_backoff_ms = ms;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.http.request_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<DownloadConfig, DocsendError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = DownloadConfig::default();
        assert_eq!(config.base_url, "https://docsend.com");
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.http.max_retries, 3);
        assert_eq!(config.http.retry_backoff_ms, 1000);
        assert_eq!(config.http.retry_statuses, vec![500, 502, 503, 504]);
        assert_eq!(config.http.pool_max_idle_per_host, 50);
    }

    #[test]
    fn zero_batch_size_rejected() {
        let err = DownloadConfig::builder().batch_size(0).build().unwrap_err();
        assert!(matches!(err, DocsendError::InvalidConfig(_)));
    }

    #[test]
    fn struct_literal_validated_like_builder() {
        let config = DownloadConfig {
            batch_size: 0,
            ..DownloadConfig::default()
        };
        assert!(matches!(config.validate(), Err(DocsendError::InvalidConfig(_))));
        assert!(DownloadConfig::default().validate().is_ok());
    }

    #[test]
    fn bad_base_url_rejected() {
        let err = DownloadConfig::builder()
            .base_url("not a url")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Base URL"));
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let config = DownloadConfig::builder()
            .base_url("http://127.0.0.1:8080/")
            .build()
            .unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:8080");
    }

    #[test]
    fn empty_email_rejected() {
        let err = DownloadConfig::builder()
            .credentials(Credentials::new("  "))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Email"));
    }

    #[test]
    fn debug_redacts_passcode() {
        let config = DownloadConfig::builder()
            .credentials(Credentials::new("a@b.c").with_passcode("hunter2"))
            .build()
            .unwrap();
        let dbg = format!("{config:?}");
        assert!(dbg.contains("a@b.c"));
        assert!(!dbg.contains("hunter2"), "passcode leaked: {dbg}");
        assert!(dbg.contains("<redacted>"));
    }
}
