//! Resilient HTTP client: auth header injection plus bounded exponential
//! back-off.

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, error, warn};

use super::error::StorageError;
use super::transport::{HttpRequest, HttpResponse, HttpTransport};

/// Retry schedule for outbound calls.
///
/// After failed attempt `i` (0-based) the client sleeps
/// `initial_delay * backoff_multiplier^i`, except after the last attempt.
/// With the defaults that is 1s then 2s, and three attempts in total.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Default number of attempts.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    /// Default delay after the first failure.
    pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(1000);
    /// Default growth factor.
    pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

    /// Create a policy.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `max_attempts` is zero or the
    /// multiplier is below 1 or not finite.
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        backoff_multiplier: f64,
    ) -> Result<Self, StorageError> {
        if max_attempts == 0 {
            return Err(StorageError::configuration(
                "retry max_attempts must be at least 1",
            ));
        }
        if !backoff_multiplier.is_finite() || backoff_multiplier < 1.0 {
            return Err(StorageError::configuration(format!(
                "retry backoff_multiplier must be a finite number >= 1, got {backoff_multiplier}"
            )));
        }
        Ok(Self {
            max_attempts,
            initial_delay,
            backoff_multiplier,
        })
    }

    /// Total attempts, including the first.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the first failure.
    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Growth factor between consecutive delays.
    #[must_use]
    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    /// Delay to wait after failed attempt `attempt_index` (0-based).
    #[must_use]
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        let exponent = i32::try_from(attempt_index).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            initial_delay: Self::DEFAULT_INITIAL_DELAY,
            backoff_multiplier: Self::DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

/// HTTP client that authenticates every request and retries transient
/// failures.
///
/// - 2xx and 4xx responses are returned as-is on the first occurrence.
/// - Any other status, or a transport error, is retried per the
///   [`RetryPolicy`]; when attempts run out the last failure is logged and
///   returned as [`StorageError::ExhaustedRetries`].
pub struct ResilientClient<T> {
    transport: T,
    policy: RetryPolicy,
    default_headers: HeaderMap,
    authorization: HeaderValue,
}

impl<T: HttpTransport> ResilientClient<T> {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the token or user agent cannot be
    /// used as a header value.
    pub fn new(
        transport: T,
        token: &str,
        user_agent: &str,
        policy: RetryPolicy,
    ) -> Result<Self, StorageError> {
        let mut authorization = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| StorageError::configuration("token is not a valid header value"))?;
        authorization.set_sensitive(true);

        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .map_err(|_| StorageError::configuration("user agent is not a valid header value"))?,
        );

        Ok(Self {
            transport,
            policy,
            default_headers,
            authorization,
        })
    }

    /// The retry policy in use.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send `request`, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ExhaustedRetries`] once every attempt has
    /// failed with a retryable status or a transport error.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, StorageError> {
        let request = self.prepare(request);
        let attempts = self.policy.max_attempts;
        let mut last_error = String::new();

        for attempt in 0..attempts {
            match self.transport.execute(request.clone()).await {
                Ok(response) if response.status.is_client_error() => {
                    debug!(
                        method = %request.method,
                        url = %request.url,
                        status = %response.status,
                        "origin rejected request"
                    );
                    return Ok(response);
                }
                Ok(response) if response.status.is_success() => return Ok(response),
                Ok(response) => {
                    last_error = format!("origin returned {}", response.status);
                }
                Err(e) => {
                    last_error = e.to_string();
                }
            }

            warn!(
                method = %request.method,
                url = %request.url,
                attempt = attempt + 1,
                max_attempts = attempts,
                error = %last_error,
                "request attempt failed"
            );

            if attempt + 1 < attempts {
                tokio::time::sleep(self.policy.delay_for(attempt)).await;
            }
        }

        error!(
            method = %request.method,
            url = %request.url,
            attempts,
            error = %last_error,
            "request failed after exhausting retries"
        );
        Err(StorageError::exhausted(attempts, last_error))
    }

    /// Merge defaults, caller headers and the forced authorization header.
    fn prepare(&self, mut request: HttpRequest) -> HttpRequest {
        let mut headers = self.default_headers.clone();
        for (name, value) in &request.headers {
            headers.insert(name.clone(), value.clone());
        }
        headers.insert(AUTHORIZATION, self.authorization.clone());
        request.headers = headers;
        request
    }
}
