//! The shared ledger document.

use serde::{Deserialize, Serialize};

use crate::{Habit, HistoryEntry, IdentityId, Punishment, Reward, Role, RoleMap, Score};

/// Which identity holds each role slot.
///
/// The first two distinct identities to appear claim the two slots; anyone
/// else observes. Claiming is guarded by a compare-and-swap write at the
/// store layer, so two sessions racing for the last slot cannot both win.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Members(RoleMap<Option<IdentityId>>);

impl Members {
    /// The role already held by `identity`, if any.
    #[must_use]
    pub fn role_of(&self, identity: &IdentityId) -> Option<Role> {
        self.0
            .iter()
            .find(|(_, member)| member.as_ref() == Some(identity))
            .map(|(role, _)| role)
    }

    /// The first unclaimed slot, if any.
    #[must_use]
    pub fn vacancy(&self) -> Option<Role> {
        self.0
            .iter()
            .find(|(_, member)| member.is_none())
            .map(|(role, _)| role)
    }

    #[must_use]
    pub fn holder(&self, role: Role) -> Option<&IdentityId> {
        self.0.get(role).as_ref()
    }

    /// Record `identity` as the holder of `role`.
    ///
    /// Pure bookkeeping; the caller is responsible for writing the result
    /// through a compare-and-swap so concurrent claims serialize.
    pub fn claim(&mut self, role: Role, identity: IdentityId) {
        self.0.set(role, Some(identity));
    }
}

/// The single shared record: everything one pair of users tracks.
///
/// Every reader observes the same document; there is no other durable
/// storage. The wire shape is this struct as a JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    /// Display names, layered over the role type.
    pub players: RoleMap<String>,
    pub scores: RoleMap<Score>,
    #[serde(default)]
    pub habits: Vec<Habit>,
    #[serde(default)]
    pub rewards: Vec<Reward>,
    #[serde(default)]
    pub punishments: Vec<Punishment>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub members: Members,
}

impl LedgerState {
    /// A fresh ledger with zeroed scores and placeholder names.
    #[must_use]
    pub fn new() -> Self {
        Self {
            players: RoleMap::new("Player A".to_owned(), "Player B".to_owned()),
            scores: RoleMap::default(),
            habits: Vec::new(),
            rewards: Vec::new(),
            punishments: Vec::new(),
            history: Vec::new(),
            members: Members::default(),
        }
    }

    #[must_use]
    pub fn habit(&self, id: &crate::EntryId) -> Option<&Habit> {
        self.habits.iter().find(|h| &h.id == id)
    }

    #[must_use]
    pub fn reward(&self, id: &crate::EntryId) -> Option<&Reward> {
        self.rewards.iter().find(|r| &r.id == id)
    }

    #[must_use]
    pub fn punishment(&self, id: &crate::EntryId) -> Option<&Punishment> {
        self.punishments.iter().find(|p| &p.id == id)
    }
}

impl Default for LedgerState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ledger_has_zero_scores_and_empty_lists() {
        let state = LedgerState::new();
        assert_eq!(state.scores.get(Role::A).value(), 0);
        assert_eq!(state.scores.get(Role::B).value(), 0);
        assert!(state.habits.is_empty());
        assert!(state.history.is_empty());
    }

    #[test]
    fn members_claim_and_lookup() {
        let mut members = Members::default();
        let first = IdentityId::generate();
        let second = IdentityId::generate();
        let third = IdentityId::generate();

        assert_eq!(members.vacancy(), Some(Role::A));
        members.claim(Role::A, first.clone());
        assert_eq!(members.vacancy(), Some(Role::B));
        members.claim(Role::B, second.clone());

        assert_eq!(members.vacancy(), None);
        assert_eq!(members.role_of(&first), Some(Role::A));
        assert_eq!(members.role_of(&second), Some(Role::B));
        assert_eq!(members.role_of(&third), None);
    }

    #[test]
    fn wire_shape_round_trips() {
        let state = LedgerState::new();
        let json = serde_json::to_string(&state).unwrap();
        let back: LedgerState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, back);
    }

    #[test]
    fn wire_shape_tolerates_missing_optional_lists() {
        let json = r#"{"players":{"a":"K","b":"N"},"scores":{"a":0,"b":0}}"#;
        let state: LedgerState = serde_json::from_str(json).unwrap();
        assert!(state.rewards.is_empty());
        assert_eq!(state.members.vacancy(), Some(Role::A));
    }
}
