//! Actions, receipts, and deletion tombstones.

use serde::{Deserialize, Serialize};

use pact_types::{
    Collection, Entry, EntryId, Habit, LedgerState, NonEmptyString, Points, Punishment, Reward,
    Role, Score,
};

/// One user-initiated mutation of the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    AddHabit(Habit),
    AddReward(Reward),
    AddPunishment(Punishment),
    CompleteHabit {
        id: EntryId,
    },
    RedeemReward {
        id: EntryId,
        payer: Role,
    },
    AssignPunishment {
        id: EntryId,
        target: Role,
    },
    DeleteEntry {
        collection: Collection,
        id: EntryId,
    },
    /// Single-level undo: re-insert a previously deleted entry.
    Restore(Tombstone),
    /// Manual score correction, clamped at zero.
    AdjustScore {
        role: Role,
        delta: i64,
    },
    RenamePlayer {
        role: Role,
        name: NonEmptyString,
    },
}

/// A deleted entry, kept whole so a single-level undo can re-insert it at
/// its original position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tombstone {
    pub index: usize,
    pub entry: Entry,
}

impl Tombstone {
    #[must_use]
    pub fn collection(&self) -> Collection {
        self.entry.collection()
    }
}

/// What an accepted action did, for callers that report or undo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Receipt {
    Added {
        collection: Collection,
        id: EntryId,
    },
    HabitCompleted {
        id: EntryId,
        credited: Role,
        award: Points,
        fulfilled: bool,
    },
    RewardRedeemed {
        id: EntryId,
        payer: Role,
        cost: Points,
    },
    PunishmentAssigned {
        id: EntryId,
        target: Role,
    },
    Deleted(Tombstone),
    Restored {
        collection: Collection,
        id: EntryId,
    },
    ScoreAdjusted {
        role: Role,
        new_score: Score,
    },
    PlayerRenamed {
        role: Role,
    },
}

/// A successor state plus the receipt for the action that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub state: LedgerState,
    pub receipt: Receipt,
}
