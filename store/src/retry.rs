//! The retrying writer.
//!
//! Every store request goes through [`send_with_retry`] so backoff policy
//! lives in exactly one place instead of being scattered across mutation
//! handlers.
//!
//! - Retryable: connection errors and HTTP 408, 429, 5xx.
//! - Not retryable: 409/412 — those are compare-and-swap conflicts and
//!   must surface immediately so the caller can re-read.
//! - Delay: `initial * 2^attempt`, capped, with down-jitter; a valid
//!   `Retry-After` from the server wins.
//! - The same `Idempotency-Key` is sent on every attempt of one write.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode, header::HeaderMap};
use uuid::Uuid;

/// Backoff policy for store requests.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries (not counting the initial request).
    pub max_retries: u32,
    /// Backoff delay before the first retry.
    pub initial_delay: Duration,
    /// Backoff ceiling.
    pub max_delay: Duration,
    /// Down-jitter factor (0.25 = up to 25% reduction).
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
            jitter_factor: 0.25,
        }
    }
}

/// Parse a `Retry-After` header (integer seconds form).
///
/// Returns `Some` only for values in `(0, 60s)`; anything else falls back
/// to computed backoff.
#[must_use]
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get("retry-after")?.to_str().ok()?;
    let secs = raw.trim().parse::<u64>().ok()?;
    let duration = Duration::from_secs(secs);
    if duration > Duration::ZERO && duration < Duration::from_secs(60) {
        Some(duration)
    } else {
        None
    }
}

/// Whether a response status is worth another attempt.
#[must_use]
pub fn should_retry(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429 | 500..=599)
}

/// Backoff delay before retry number `attempt` (0-based).
#[must_use]
pub fn retry_delay(attempt: u32, config: &RetryConfig, headers: Option<&HeaderMap>) -> Duration {
    if let Some(headers) = headers
        && let Some(delay) = parse_retry_after(headers)
    {
        return delay;
    }

    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(attempt as i32);
    let capped = base.min(config.max_delay.as_secs_f64());
    let jitter = 1.0 - rand::random::<f64>() * config.jitter_factor;
    Duration::from_secs_f64(capped * jitter)
}

#[must_use]
pub fn generate_idempotency_key() -> String {
    format!("pact-write-{}", Uuid::new_v4())
}

/// Outcome of a retried request, with success and failure structurally
/// separate so an error response cannot be mistaken for a result.
#[derive(Debug)]
pub enum WriteOutcome {
    /// 2xx response.
    Success(Response),
    /// Non-2xx response, after retries if the status warranted them.
    HttpError(Response),
    /// Transport failure that survived every retry.
    ConnectionError {
        attempts: u32,
        source: reqwest::Error,
    },
    /// Transport failure on the first attempt that is not worth retrying.
    NonRetryable(reqwest::Error),
}

impl WriteOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout() || error.is_request()
}

/// Send a request, retrying per `config`.
///
/// `build_request` is called once per attempt; the idempotency key is
/// generated once and reused across all of them.
pub async fn send_with_retry<F>(build_request: F, config: &RetryConfig) -> WriteOutcome
where
    F: Fn() -> RequestBuilder,
{
    let idempotency_key = generate_idempotency_key();
    let mut attempt: u32 = 0;

    loop {
        let request = build_request().header("Idempotency-Key", &idempotency_key);

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return WriteOutcome::Success(response);
                }

                if attempt < config.max_retries && should_retry(status) {
                    let delay = retry_delay(attempt, config, Some(response.headers()));
                    tracing::debug!(
                        status = %status,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis(),
                        "retrying store request after error status"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }

                return WriteOutcome::HttpError(response);
            }
            Err(error) => {
                if attempt < config.max_retries && is_retryable_error(&error) {
                    let delay = retry_delay(attempt, config, None);
                    tracing::debug!(
                        error = %error,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis(),
                        "retrying store request after connection error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }

                if attempt == 0 && !is_retryable_error(&error) {
                    return WriteOutcome::NonRetryable(error);
                }
                return WriteOutcome::ConnectionError {
                    attempts: attempt + 1,
                    source: error,
                };
            }
        }
    }
}


#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Fast retry config for tests (no real delays).
    fn fast_retry_config() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            jitter_factor: 0.0,
        }
    }

    #[tokio::test]
    async fn success_on_first_attempt() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/doc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/doc", server.uri());
        let config = fast_retry_config();

        let outcome = send_with_retry(|| client.put(&url), &config).await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn retries_on_503_then_succeeds() {
        let server = MockServer::start().await;
        let attempt = AtomicU32::new(0);

        Mock::given(method("PUT"))
            .and(path("/doc"))
            .respond_with(move |_: &wiremock::Request| {
                if attempt.fetch_add(1, Ordering::SeqCst) == 0 {
                    ResponseTemplate::new(503)
                } else {
                    ResponseTemplate::new(200)
                }
            })
            .expect(2)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/doc", server.uri());

        let outcome = send_with_retry(|| client.put(&url), &fast_retry_config()).await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn exhausts_retries_and_returns_the_error_response() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/doc"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3) // initial + 2 retries
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/doc", server.uri());

        let outcome = send_with_retry(|| client.put(&url), &fast_retry_config()).await;
        match outcome {
            WriteOutcome::HttpError(response) => {
                assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
            }
            other => panic!("expected HttpError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn conflict_is_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/doc"))
            .respond_with(ResponseTemplate::new(412))
            .expect(1) // precondition failures surface immediately
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/doc", server.uri());

        let outcome = send_with_retry(|| client.put(&url), &fast_retry_config()).await;
        match outcome {
            WriteOutcome::HttpError(response) => {
                assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);
            }
            other => panic!("expected HttpError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn idempotency_key_is_stable_across_attempts() {
        let server = MockServer::start().await;
        let keys: std::sync::Arc<std::sync::Mutex<Vec<String>>> =
            std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let keys_clone = keys.clone();

        Mock::given(method("PUT"))
            .and(path("/doc"))
            .respond_with(move |req: &wiremock::Request| {
                let key = req
                    .headers
                    .get("Idempotency-Key")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                keys_clone.lock().unwrap().push(key);

                if keys_clone.lock().unwrap().len() < 3 {
                    ResponseTemplate::new(500)
                } else {
                    ResponseTemplate::new(200)
                }
            })
            .expect(3)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/doc", server.uri());

        let _ = send_with_retry(|| client.put(&url), &fast_retry_config()).await;

        let collected = keys.lock().unwrap();
        assert_eq!(collected.len(), 3);
        assert!(collected[0].starts_with("pact-write-"));
        assert_eq!(collected[0], collected[1]);
        assert_eq!(collected[1], collected[2]);
    }
}
