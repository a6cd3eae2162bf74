use thiserror::Error;

/// Store failure taxonomy.
///
/// `Conflict` is the compare-and-swap signal and is never retried; callers
/// re-read and decide. `Connectivity` is produced only after the retrying
/// writer has exhausted its attempts.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no document at {path}")]
    NotFound { path: String },

    #[error("a document already exists at {path}")]
    AlreadyExists { path: String },

    #[error("version conflict at {path}: the document changed underneath this write")]
    Conflict { path: String },

    #[error("the store rejected the credential (HTTP {status})")]
    Denied { status: u16 },

    #[error("could not reach the store after {attempts} attempt(s): {detail}")]
    Connectivity { attempts: u32, detail: String },

    #[error("unexpected store response (HTTP {status})")]
    Unexpected { status: u16 },

    #[error("store response violated the document protocol: {detail}")]
    Protocol { detail: String },

    #[error("malformed document: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl StoreError {
    /// True when a later identical call could plausibly succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Connectivity { .. })
    }
}
