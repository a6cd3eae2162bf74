//! Remote document store client for Pact.
//!
//! The system of record is a remote, versioned, single-document key-value
//! store: the whole [`LedgerState`] lives in one JSON document, every
//! reader observes the same document, and writes are either plain
//! overwrites or version-guarded compare-and-swap.
//!
//! [`LedgerStore`] is the contract; [`HttpStore`] speaks a minimal HTTP
//! document API (ETag versions, `If-Match` preconditions, long-poll
//! watches) and routes every request through one retrying writer;
//! [`MemoryStore`] implements the same contract in-process for tests —
//! including tests that demonstrate the lost-update race the plain
//! overwrite path permits.
//!
//! [`LedgerState`]: pact_types::LedgerState

mod error;
mod http;
mod memory;
mod path;
mod retry;
mod watch;

pub use error::StoreError;
pub use http::HttpStore;
pub use memory::MemoryStore;
pub use path::{DocumentPath, generate_room_code};
pub use retry::{RetryConfig, WriteOutcome, send_with_retry};
pub use watch::Watch;

use serde::{Deserialize, Serialize};

use pact_types::LedgerState;

/// Monotonic document version; the compare-and-swap token.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Render as a quoted HTTP entity tag.
    #[must_use]
    pub fn etag(self) -> String {
        format!("\"{}\"", self.0)
    }

    /// Parse a quoted (or bare) entity tag.
    #[must_use]
    pub fn parse_etag(raw: &str) -> Option<Self> {
        raw.trim()
            .trim_matches('"')
            .parse::<u64>()
            .ok()
            .map(Self)
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A document snapshot together with the version that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedState {
    pub version: Version,
    pub state: LedgerState,
}

/// The remote single-document store contract.
///
/// `replace` is the default write mode and is deliberately non-atomic: two
/// clients that both read version N and both write will silently lose one
/// update. `replace_if` is the compare-and-swap used where that race is
/// unacceptable (role claiming).
#[allow(async_fn_in_trait)]
pub trait LedgerStore {
    /// Create the document; fails with [`StoreError::AlreadyExists`] if
    /// something is already stored at `path`.
    async fn create(
        &self,
        path: &DocumentPath,
        state: &LedgerState,
    ) -> Result<Version, StoreError>;

    async fn load(&self, path: &DocumentPath) -> Result<VersionedState, StoreError>;

    /// Unconditional full-document overwrite.
    async fn replace(
        &self,
        path: &DocumentPath,
        state: &LedgerState,
    ) -> Result<Version, StoreError>;

    /// Compare-and-swap overwrite: applies only if the stored version is
    /// still `expected`, otherwise [`StoreError::Conflict`].
    async fn replace_if(
        &self,
        path: &DocumentPath,
        expected: Version,
        state: &LedgerState,
    ) -> Result<Version, StoreError>;

    /// Subscribe to every change after `from`. Dropping the returned
    /// [`Watch`] unsubscribes, so a listener's lifetime is scoped to
    /// whoever holds the handle.
    async fn watch(&self, path: &DocumentPath, from: Version) -> Result<Watch, StoreError>;
}
