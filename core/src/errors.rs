use thiserror::Error;

use pact_types::{Collection, EntryId, Points, Score};

/// Why the reducer rejected an action. No rejection mutates state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("no entry {id} in {collection}")]
    NotFound { collection: Collection, id: EntryId },

    #[error("an entry with id {id} already exists in {collection}")]
    AlreadyPresent { collection: Collection, id: EntryId },

    #[error("habit {id} is already fulfilled for this cycle")]
    HabitFulfilled { id: EntryId },

    #[error("insufficient points: need {needed}, have {available}")]
    InsufficientPoints { needed: Points, available: Score },
}
