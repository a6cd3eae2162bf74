//! The failure funnel.
//!
//! Five families of failure reach users — configuration, membership,
//! connectivity, validation, domain — and all of them are presented
//! through one [`Notice`] shape. None are silent.

use thiserror::Error;

use pact_core::DomainError;
use pact_store::StoreError;

use crate::forms::FormError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Form(#[from] FormError),

    #[error("no ledger selected")]
    NoLedger,

    #[error("both role slots are taken; this session is observing")]
    Observer,

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("the ledger subscription ended")]
    WatchEnded,
}

/// One user-visible failure, ready for whatever surface presents it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub body: String,
}

impl Notice {
    #[must_use]
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

impl EngineError {
    /// The notice a surface should show for this failure.
    #[must_use]
    pub fn notice(&self) -> Notice {
        let title = match self {
            EngineError::Domain(DomainError::InsufficientPoints { .. }) => "Insufficient Points",
            EngineError::Domain(_) => "Not Allowed",
            EngineError::Store(StoreError::Conflict { .. }) => "Out of Date",
            EngineError::Store(StoreError::Connectivity { .. }) => "Connection Error",
            EngineError::Store(StoreError::Denied { .. }) => "Permission Denied",
            EngineError::Store(StoreError::NotFound { .. }) => "Not Found",
            EngineError::Store(StoreError::AlreadyExists { .. }) => "Already Exists",
            EngineError::Store(_) => "Store Error",
            EngineError::Form(_) => "Invalid Input",
            EngineError::NoLedger => "No Ledger Selected",
            EngineError::Observer => "Observing Only",
            EngineError::NothingToUndo => "Nothing to Undo",
            EngineError::WatchEnded => "Connection Error",
        };
        Notice::new(title, self.to_string())
    }
}
