//! The three entry kinds a ledger tracks, plus the audit record.

use std::num::NonZeroU32;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EntryId, NonEmptyString, Points, Role};

/// A recurring task with a point award, assigned to one role.
///
/// Lifecycle: active while `completions < target`, fulfilled once the
/// counter reaches the target. Only habit completion moves the counter;
/// there is no failed or expired state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    pub id: EntryId,
    pub description: NonEmptyString,
    /// Points awarded per completion.
    pub value: Points,
    /// Completions per cycle before the habit counts as fulfilled.
    pub target: NonZeroU32,
    pub assignee: Role,
    #[serde(default)]
    pub completions: u32,
}

impl Habit {
    #[must_use]
    pub fn new(
        description: NonEmptyString,
        value: Points,
        target: NonZeroU32,
        assignee: Role,
    ) -> Self {
        Self {
            id: EntryId::generate(),
            description,
            value,
            target,
            assignee,
            completions: 0,
        }
    }

    #[must_use]
    pub fn is_fulfilled(&self) -> bool {
        self.completions >= self.target.get()
    }
}

/// A redeemable item with a point cost. One-time: removed on redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub id: EntryId,
    pub title: NonEmptyString,
    pub description: NonEmptyString,
    pub cost: Points,
}

impl Reward {
    #[must_use]
    pub fn new(title: NonEmptyString, description: NonEmptyString, cost: Points) -> Self {
        Self {
            id: EntryId::generate(),
            title,
            description,
            cost,
        }
    }
}

/// A non-scored task that can be pinned on a role for the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Punishment {
    pub id: EntryId,
    pub title: NonEmptyString,
    pub description: NonEmptyString,
    #[serde(default)]
    pub assigned_to: Option<Role>,
}

impl Punishment {
    #[must_use]
    pub fn new(title: NonEmptyString, description: NonEmptyString) -> Self {
        Self {
            id: EntryId::generate(),
            title,
            description,
            assigned_to: None,
        }
    }
}

/// An immutable audit record of a point-affecting or notable action.
///
/// Append-only; never mutated after creation. The history list is pruned
/// oldest-first once it exceeds the configured cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub message: String,
    pub delta: i64,
    pub timestamp: DateTime<Utc>,
}

/// Which of the three entry lists an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Habits,
    Rewards,
    Punishments,
}

impl Collection {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Collection::Habits => "habits",
            Collection::Rewards => "rewards",
            Collection::Punishments => "punishments",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry from any of the three lists, kept whole for undo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entry {
    Habit(Habit),
    Reward(Reward),
    Punishment(Punishment),
}

impl Entry {
    #[must_use]
    pub fn id(&self) -> &EntryId {
        match self {
            Entry::Habit(h) => &h.id,
            Entry::Reward(r) => &r.id,
            Entry::Punishment(p) => &p.id,
        }
    }

    #[must_use]
    pub const fn collection(&self) -> Collection {
        match self {
            Entry::Habit(_) => Collection::Habits,
            Entry::Reward(_) => Collection::Rewards,
            Entry::Punishment(_) => Collection::Punishments,
        }
    }

    /// The entry's user-facing label.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Entry::Habit(h) => h.description.as_str(),
            Entry::Reward(r) => r.title.as_str(),
            Entry::Punishment(p) => p.title.as_str(),
        }
    }
}
