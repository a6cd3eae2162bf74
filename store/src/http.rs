//! HTTP document store client.
//!
//! Speaks a minimal document API: one JSON document per path, versions
//! carried as entity tags, preconditions via `If-Match`/`If-None-Match`,
//! and change delivery via long-polled conditional GETs. Every request is
//! sent through the retrying writer in [`crate::retry`].

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, ETAG, IF_MATCH, IF_NONE_MATCH};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use tokio::sync::mpsc;

use pact_types::LedgerState;

use crate::path::DocumentPath;
use crate::retry::{RetryConfig, WriteOutcome, send_with_retry};
use crate::watch::Watch;
use crate::{LedgerStore, StoreError, Version, VersionedState};

/// How long the server may hold a watch poll before answering 304.
const DEFAULT_WATCH_WAIT: Duration = Duration::from_secs(25);
/// Pause before re-polling after a failed watch request.
const WATCH_RETRY_DELAY: Duration = Duration::from_secs(2);
const WATCH_CHANNEL_CAPACITY: usize = 32;

/// Write precondition for a document PUT.
#[derive(Debug, Clone, Copy)]
enum Precondition {
    None,
    Absent,
    Version(Version),
}

/// Client for the hosted document store.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: reqwest::Client,
    base_url: String,
    bearer: Option<String>,
    retry: RetryConfig,
    watch_wait: Duration,
}

impl HttpStore {
    #[must_use]
    pub fn new(base_url: impl Into<String>, bearer: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self {
            client: reqwest::Client::new(),
            base_url,
            bearer,
            retry: RetryConfig::default(),
            watch_wait: DEFAULT_WATCH_WAIT,
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_watch_wait(mut self, wait: Duration) -> Self {
        self.watch_wait = wait;
        self
    }

    fn url(&self, path: &DocumentPath) -> String {
        format!("{}/{}", self.base_url, path.as_str())
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.bearer {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn put_document(
        &self,
        path: &DocumentPath,
        state: &LedgerState,
        precondition: Precondition,
    ) -> Result<Version, StoreError> {
        let body = serde_json::to_vec(state)?;
        let url = self.url(path);

        let outcome = send_with_retry(
            || {
                let request = self
                    .request(Method::PUT, &url)
                    .header(CONTENT_TYPE, "application/json")
                    .body(body.clone());
                match precondition {
                    Precondition::None => request,
                    Precondition::Absent => request.header(IF_NONE_MATCH, "*"),
                    Precondition::Version(version) => request.header(IF_MATCH, version.etag()),
                }
            },
            &self.retry,
        )
        .await;

        match outcome {
            WriteOutcome::Success(response) => etag_version(&response),
            WriteOutcome::HttpError(response) => {
                Err(map_error_status(path, response.status(), precondition))
            }
            WriteOutcome::ConnectionError { attempts, source } => Err(StoreError::Connectivity {
                attempts,
                detail: source.to_string(),
            }),
            WriteOutcome::NonRetryable(source) => Err(StoreError::Connectivity {
                attempts: 1,
                detail: source.to_string(),
            }),
        }
    }
}

fn etag_version(response: &Response) -> Result<Version, StoreError> {
    response
        .headers()
        .get(ETAG)
        .and_then(|value| value.to_str().ok())
        .and_then(Version::parse_etag)
        .ok_or_else(|| StoreError::Protocol {
            detail: "response carried no numeric ETag".to_owned(),
        })
}

fn map_error_status(
    path: &DocumentPath,
    status: StatusCode,
    precondition: Precondition,
) -> StoreError {
    match status.as_u16() {
        404 => StoreError::NotFound {
            path: path.to_string(),
        },
        401 | 403 => StoreError::Denied {
            status: status.as_u16(),
        },
        409 | 412 => match precondition {
            Precondition::Absent => StoreError::AlreadyExists {
                path: path.to_string(),
            },
            _ => StoreError::Conflict {
                path: path.to_string(),
            },
        },
        _ => StoreError::Unexpected {
            status: status.as_u16(),
        },
    }
}

async fn decode_snapshot(response: Response) -> Result<VersionedState, StoreError> {
    let version = etag_version(&response)?;
    let bytes = response
        .bytes()
        .await
        .map_err(|error| StoreError::Protocol {
            detail: format!("failed to read document body: {error}"),
        })?;
    let state: LedgerState = serde_json::from_slice(&bytes)?;
    Ok(VersionedState { version, state })
}

impl LedgerStore for HttpStore {
    async fn create(
        &self,
        path: &DocumentPath,
        state: &LedgerState,
    ) -> Result<Version, StoreError> {
        self.put_document(path, state, Precondition::Absent).await
    }

    async fn load(&self, path: &DocumentPath) -> Result<VersionedState, StoreError> {
        let url = self.url(path);
        let outcome = send_with_retry(|| self.request(Method::GET, &url), &self.retry).await;

        match outcome {
            WriteOutcome::Success(response) => decode_snapshot(response).await,
            WriteOutcome::HttpError(response) => Err(map_error_status(
                path,
                response.status(),
                Precondition::None,
            )),
            WriteOutcome::ConnectionError { attempts, source } => Err(StoreError::Connectivity {
                attempts,
                detail: source.to_string(),
            }),
            WriteOutcome::NonRetryable(source) => Err(StoreError::Connectivity {
                attempts: 1,
                detail: source.to_string(),
            }),
        }
    }

    async fn replace(
        &self,
        path: &DocumentPath,
        state: &LedgerState,
    ) -> Result<Version, StoreError> {
        self.put_document(path, state, Precondition::None).await
    }

    async fn replace_if(
        &self,
        path: &DocumentPath,
        expected: Version,
        state: &LedgerState,
    ) -> Result<Version, StoreError> {
        self.put_document(path, state, Precondition::Version(expected))
            .await
    }

    async fn watch(&self, path: &DocumentPath, from: Version) -> Result<Watch, StoreError> {
        let client = self.client.clone();
        let bearer = self.bearer.clone();
        let url = self.url(path);
        let wait_secs = self.watch_wait.as_secs();
        let (tx, rx) = mpsc::channel(WATCH_CHANNEL_CAPACITY);

        let pump = tokio::spawn(async move {
            let mut current = from;
            loop {
                let mut request = client
                    .get(&url)
                    .header(IF_NONE_MATCH, current.etag())
                    .query(&[("wait", wait_secs)]);
                if let Some(token) = &bearer {
                    request = request.bearer_auth(token);
                }

                match request.send().await {
                    Ok(response) if response.status() == StatusCode::NOT_MODIFIED => {
                        // The server held the poll for its full window;
                        // ask again.
                    }
                    Ok(response) if response.status().is_success() => {
                        match decode_snapshot(response).await {
                            Ok(snapshot) if snapshot.version > current => {
                                current = snapshot.version;
                                if tx.send(snapshot).await.is_err() {
                                    break;
                                }
                            }
                            Ok(_) => {}
                            Err(error) => {
                                tracing::warn!(%error, "watch poll returned a bad document");
                                tokio::time::sleep(WATCH_RETRY_DELAY).await;
                            }
                        }
                    }
                    Ok(response) => {
                        tracing::warn!(status = %response.status(), "watch poll failed");
                        tokio::time::sleep(WATCH_RETRY_DELAY).await;
                    }
                    Err(error) => {
                        tracing::warn!(%error, "watch poll failed");
                        tokio::time::sleep(WATCH_RETRY_DELAY).await;
                    }
                }
            }
        });

        Ok(Watch::new(rx, pump))
    }
}
