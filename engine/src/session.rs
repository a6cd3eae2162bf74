//! The session controller.

use chrono::Utc;

use pact_core::{Action, DomainError, Receipt, Tombstone, apply};
use pact_store::{
    DocumentPath, LedgerStore, StoreError, Version, VersionedState, Watch, generate_room_code,
};
use pact_types::{
    Collection, EntryId, IdentityId, LedgerId, LedgerPolicy, LedgerState, NonEmptyString, Role,
};

use crate::errors::EngineError;
use crate::forms::{FormError, HabitForm, PunishmentForm, RewardForm};

/// How many fresh room codes creation tries before giving up.
const CREATE_CODE_ATTEMPTS: u32 = 4;
/// How many compare-and-swap rounds a join will fight through.
const CLAIM_ATTEMPTS: u32 = 8;

/// This session's standing in the selected ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participation {
    /// Holds one of the two role slots.
    Member(Role),
    /// Both slots belong to other identities; read-only.
    Observer,
}

impl Participation {
    #[must_use]
    pub const fn role(self) -> Option<Role> {
        match self {
            Participation::Member(role) => Some(role),
            Participation::Observer => None,
        }
    }
}

#[derive(Debug)]
struct ActiveLedger {
    id: LedgerId,
    path: DocumentPath,
    participation: Participation,
    snapshot: VersionedState,
    /// Dropped (and therefore unsubscribed) whenever the selection changes.
    watch: Watch,
    undo: Option<Tombstone>,
}

/// One client's connection to at most one ledger at a time.
///
/// Owns the only mutable copy of the remote state this client keeps; every
/// mutation goes reducer-first, then through the store, and the local copy
/// commits only after the write succeeds. Remote snapshots replace the
/// local copy wholesale.
#[derive(Debug)]
pub struct Session<S> {
    store: S,
    app_id: String,
    identity: IdentityId,
    policy: LedgerPolicy,
    active: Option<ActiveLedger>,
}

impl<S: LedgerStore> Session<S> {
    #[must_use]
    pub fn new(
        store: S,
        app_id: impl Into<String>,
        identity: IdentityId,
        policy: LedgerPolicy,
    ) -> Self {
        Self {
            store,
            app_id: app_id.into(),
            identity,
            policy,
            active: None,
        }
    }

    #[must_use]
    pub fn identity(&self) -> &IdentityId {
        &self.identity
    }

    #[must_use]
    pub fn ledger_id(&self) -> Option<&LedgerId> {
        self.active.as_ref().map(|active| &active.id)
    }

    #[must_use]
    pub fn participation(&self) -> Option<Participation> {
        self.active.as_ref().map(|active| active.participation)
    }

    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.participation().and_then(Participation::role)
    }

    pub fn state(&self) -> Result<&LedgerState, EngineError> {
        self.active
            .as_ref()
            .map(|active| &active.snapshot.state)
            .ok_or(EngineError::NoLedger)
    }

    #[must_use]
    pub fn version(&self) -> Option<Version> {
        self.active.as_ref().map(|active| active.snapshot.version)
    }

    /// Create a fresh ledger under a new room code and become role A.
    pub async fn create_ledger(
        &mut self,
        player_name: Option<String>,
    ) -> Result<LedgerId, EngineError> {
        let mut state = LedgerState::new();
        state.members.claim(Role::A, self.identity.clone());
        if let Some(name) = player_name {
            state.players.set(Role::A, name);
        }

        let mut attempt = 0;
        loop {
            let id = generate_room_code();
            let path = DocumentPath::ledger(&self.app_id, &id);
            match self.store.create(&path, &state).await {
                Ok(version) => {
                    tracing::info!(ledger = %id, "created ledger");
                    let snapshot = VersionedState {
                        version,
                        state: state.clone(),
                    };
                    self.activate(id.clone(), path, Participation::Member(Role::A), snapshot)
                        .await?;
                    return Ok(id);
                }
                Err(StoreError::AlreadyExists { .. }) if attempt + 1 < CREATE_CODE_ATTEMPTS => {
                    attempt += 1;
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    /// Open an existing ledger, claiming a free role slot when possible.
    ///
    /// Slot claiming is the one write that must be atomic: the claim goes
    /// through a compare-and-swap against the version it was computed
    /// from, and a conflict means someone else moved first, so re-read and
    /// try again. With both slots held by other identities, the session
    /// joins as an observer.
    pub async fn join(&mut self, ledger: LedgerId) -> Result<Participation, EngineError> {
        let path = DocumentPath::ledger(&self.app_id, &ledger);
        let mut snapshot = self.store.load(&path).await?;

        let mut attempt = 0;
        let participation = loop {
            if let Some(role) = snapshot.state.members.role_of(&self.identity) {
                break Participation::Member(role);
            }
            let Some(slot) = snapshot.state.members.vacancy() else {
                break Participation::Observer;
            };
            if attempt >= CLAIM_ATTEMPTS {
                return Err(StoreError::Conflict {
                    path: path.to_string(),
                }
                .into());
            }
            attempt += 1;

            let mut next = snapshot.state.clone();
            next.members.claim(slot, self.identity.clone());
            match self.store.replace_if(&path, snapshot.version, &next).await {
                Ok(version) => {
                    tracing::info!(ledger = %ledger, role = %slot, "claimed role slot");
                    snapshot = VersionedState {
                        version,
                        state: next,
                    };
                    break Participation::Member(slot);
                }
                Err(StoreError::Conflict { .. }) => {
                    tracing::debug!(ledger = %ledger, "role claim lost a race; re-reading");
                    snapshot = self.store.load(&path).await?;
                }
                Err(error) => return Err(error.into()),
            }
        };

        self.activate(ledger, path, participation, snapshot).await?;
        Ok(participation)
    }

    /// Drop the current selection (and with it, the watch).
    pub fn deselect(&mut self) {
        self.active = None;
    }

    async fn activate(
        &mut self,
        id: LedgerId,
        path: DocumentPath,
        participation: Participation,
        snapshot: VersionedState,
    ) -> Result<(), EngineError> {
        let watch = self.store.watch(&path, snapshot.version).await?;
        // Replacing the previous selection drops its watch handle.
        self.active = Some(ActiveLedger {
            id,
            path,
            participation,
            snapshot,
            watch,
            undo: None,
        });
        Ok(())
    }

    /// Run one action through the reducer and write the result.
    ///
    /// The local copy commits only after the store accepts the write;
    /// rejected actions and failed writes leave it untouched.
    pub async fn submit(&mut self, action: Action) -> Result<Receipt, EngineError> {
        let active = self.active.as_mut().ok_or(EngineError::NoLedger)?;
        if active.participation == Participation::Observer {
            return Err(EngineError::Observer);
        }

        let applied = apply(&active.snapshot.state, &self.policy, action, Utc::now())?;
        let version = self.store.replace(&active.path, &applied.state).await?;

        if let Receipt::Deleted(tombstone) = &applied.receipt {
            active.undo = Some(tombstone.clone());
        }
        active.snapshot = VersionedState {
            version,
            state: applied.state,
        };
        tracing::debug!(version = %version, "committed action");
        Ok(applied.receipt)
    }

    pub async fn add_habit(&mut self, form: HabitForm) -> Result<EntryId, EngineError> {
        let habit = form.validate()?;
        let id = habit.id.clone();
        self.submit(Action::AddHabit(habit)).await?;
        Ok(id)
    }

    pub async fn add_reward(&mut self, form: RewardForm) -> Result<EntryId, EngineError> {
        let reward = form.validate()?;
        let id = reward.id.clone();
        self.submit(Action::AddReward(reward)).await?;
        Ok(id)
    }

    pub async fn add_punishment(&mut self, form: PunishmentForm) -> Result<EntryId, EngineError> {
        let punishment = form.validate()?;
        let id = punishment.id.clone();
        self.submit(Action::AddPunishment(punishment)).await?;
        Ok(id)
    }

    pub async fn complete_habit(&mut self, id: EntryId) -> Result<Receipt, EngineError> {
        self.submit(Action::CompleteHabit { id }).await
    }

    /// Redeem a reward, paying from this session's own score.
    pub async fn redeem_reward(&mut self, id: EntryId) -> Result<Receipt, EngineError> {
        let payer = match self.participation() {
            None => return Err(EngineError::NoLedger),
            Some(Participation::Observer) => return Err(EngineError::Observer),
            Some(Participation::Member(role)) => role,
        };
        self.submit(Action::RedeemReward { id, payer }).await
    }

    pub async fn assign_punishment(
        &mut self,
        id: EntryId,
        target: Role,
    ) -> Result<Receipt, EngineError> {
        self.submit(Action::AssignPunishment { id, target }).await
    }

    /// Delete an entry, remembering it for a single-level undo.
    ///
    /// Deleting something already gone is a quiet `Ok(false)`: the second
    /// click of a double-click must not be an error.
    pub async fn delete_entry(
        &mut self,
        collection: Collection,
        id: EntryId,
    ) -> Result<bool, EngineError> {
        match self.submit(Action::DeleteEntry { collection, id }).await {
            Ok(_) => Ok(true),
            Err(EngineError::Domain(DomainError::NotFound { .. })) => Ok(false),
            Err(error) => Err(error),
        }
    }

    /// Re-insert the most recently deleted entry at its original position.
    pub async fn undo(&mut self) -> Result<Receipt, EngineError> {
        let tombstone = self
            .active
            .as_mut()
            .ok_or(EngineError::NoLedger)?
            .undo
            .take()
            .ok_or(EngineError::NothingToUndo)?;

        match self.submit(Action::Restore(tombstone.clone())).await {
            Ok(receipt) => Ok(receipt),
            Err(error) => {
                // A failed write must not eat the undo buffer.
                if let Some(active) = self.active.as_mut() {
                    active.undo = Some(tombstone);
                }
                Err(error)
            }
        }
    }

    pub async fn adjust_score(&mut self, role: Role, delta: i64) -> Result<Receipt, EngineError> {
        self.submit(Action::AdjustScore { role, delta }).await
    }

    pub async fn rename_player(
        &mut self,
        role: Role,
        name: &str,
    ) -> Result<Receipt, EngineError> {
        let name = NonEmptyString::new(name.trim())
            .map_err(|_| FormError::EmptyText { field: "name" })?;
        self.submit(Action::RenamePlayer { role, name }).await
    }

    /// Apply every remote snapshot already buffered on the watch.
    ///
    /// Returns how many snapshots were applied. Each one replaces the
    /// local copy wholesale.
    pub fn poll_remote(&mut self) -> Result<usize, EngineError> {
        let active = self.active.as_mut().ok_or(EngineError::NoLedger)?;
        let mut applied = 0;
        while let Some(snapshot) = active.watch.try_recv() {
            if snapshot.version > active.snapshot.version {
                active.snapshot = snapshot;
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Wait for the next remote change and apply it.
    pub async fn next_change(&mut self) -> Result<&VersionedState, EngineError> {
        let active = self.active.as_mut().ok_or(EngineError::NoLedger)?;
        match active.watch.recv().await {
            Some(snapshot) => {
                if snapshot.version > active.snapshot.version {
                    active.snapshot = snapshot;
                }
                Ok(&active.snapshot)
            }
            None => Err(EngineError::WatchEnded),
        }
    }
}
