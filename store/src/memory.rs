//! In-process store with the same contract as the HTTP client.
//!
//! Used by engine tests and by the concurrency tests that demonstrate the
//! lost-update race of the plain overwrite path. Cloning the store shares
//! the underlying documents, so two "sessions" in one test really do race
//! against the same ledger.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc};

use pact_types::LedgerState;

use crate::path::DocumentPath;
use crate::watch::Watch;
use crate::{LedgerStore, StoreError, Version, VersionedState};

const UPDATE_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug)]
struct Slot {
    version: Version,
    state: LedgerState,
    updates: broadcast::Sender<VersionedState>,
}

/// Shared in-memory document table.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_slots<T>(&self, f: impl FnOnce(&mut HashMap<String, Slot>) -> T) -> T {
        let mut slots = self.slots.lock().expect("document table mutex poisoned");
        f(&mut slots)
    }

    fn commit(slot: &mut Slot, state: &LedgerState) -> Version {
        slot.version = slot.version.next();
        slot.state = state.clone();
        // Nobody watching is fine.
        let _ = slot.updates.send(VersionedState {
            version: slot.version,
            state: slot.state.clone(),
        });
        slot.version
    }
}

impl LedgerStore for MemoryStore {
    async fn create(
        &self,
        path: &DocumentPath,
        state: &LedgerState,
    ) -> Result<Version, StoreError> {
        self.with_slots(|slots| {
            if slots.contains_key(path.as_str()) {
                return Err(StoreError::AlreadyExists {
                    path: path.to_string(),
                });
            }
            let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
            let version = Version::new(1);
            slots.insert(
                path.as_str().to_owned(),
                Slot {
                    version,
                    state: state.clone(),
                    updates,
                },
            );
            Ok(version)
        })
    }

    async fn load(&self, path: &DocumentPath) -> Result<VersionedState, StoreError> {
        self.with_slots(|slots| {
            slots
                .get(path.as_str())
                .map(|slot| VersionedState {
                    version: slot.version,
                    state: slot.state.clone(),
                })
                .ok_or_else(|| StoreError::NotFound {
                    path: path.to_string(),
                })
        })
    }

    async fn replace(
        &self,
        path: &DocumentPath,
        state: &LedgerState,
    ) -> Result<Version, StoreError> {
        self.with_slots(|slots| {
            let slot = slots
                .get_mut(path.as_str())
                .ok_or_else(|| StoreError::NotFound {
                    path: path.to_string(),
                })?;
            Ok(Self::commit(slot, state))
        })
    }

    async fn replace_if(
        &self,
        path: &DocumentPath,
        expected: Version,
        state: &LedgerState,
    ) -> Result<Version, StoreError> {
        self.with_slots(|slots| {
            let slot = slots
                .get_mut(path.as_str())
                .ok_or_else(|| StoreError::NotFound {
                    path: path.to_string(),
                })?;
            if slot.version != expected {
                return Err(StoreError::Conflict {
                    path: path.to_string(),
                });
            }
            Ok(Self::commit(slot, state))
        })
    }

    async fn watch(&self, path: &DocumentPath, from: Version) -> Result<Watch, StoreError> {
        let mut updates = self.with_slots(|slots| {
            slots
                .get(path.as_str())
                .map(|slot| slot.updates.subscribe())
                .ok_or_else(|| StoreError::NotFound {
                    path: path.to_string(),
                })
        })?;

        let (tx, rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        let pump = tokio::spawn(async move {
            loop {
                match updates.recv().await {
                    Ok(snapshot) => {
                        if snapshot.version <= from {
                            continue;
                        }
                        if tx.send(snapshot).await.is_err() {
                            break;
                        }
                    }
                    // Skipped deliveries are fine; the next snapshot is
                    // always the full document.
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(Watch::new(rx, pump))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pact_types::{LedgerId, Role, Score};

    fn ledger_path(code: &str) -> DocumentPath {
        DocumentPath::ledger("pact-test", &LedgerId::new(code).unwrap())
    }

    #[tokio::test]
    async fn create_then_load_round_trips() {
        let store = MemoryStore::new();
        let path = ledger_path("AAAAAA");
        let state = LedgerState::new();

        let version = store.create(&path, &state).await.unwrap();
        assert_eq!(version, Version::new(1));

        let loaded = store.load(&path).await.unwrap();
        assert_eq!(loaded.version, version);
        assert_eq!(loaded.state, state);
    }

    #[tokio::test]
    async fn create_refuses_an_existing_document() {
        let store = MemoryStore::new();
        let path = ledger_path("AAAAAA");
        store.create(&path, &LedgerState::new()).await.unwrap();

        let err = store.create(&path, &LedgerState::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn load_of_a_missing_document_fails() {
        let store = MemoryStore::new();
        let err = store.load(&ledger_path("ZZZZZZ")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn replace_bumps_the_version_unconditionally() {
        let store = MemoryStore::new();
        let path = ledger_path("AAAAAA");
        store.create(&path, &LedgerState::new()).await.unwrap();

        let mut state = LedgerState::new();
        state.scores.set(Role::A, Score::new(10));
        let v2 = store.replace(&path, &state).await.unwrap();
        assert_eq!(v2, Version::new(2));

        // A second writer with a stale picture still wins: this is the
        // documented lost-update hazard of the plain overwrite path.
        let stale = LedgerState::new();
        let v3 = store.replace(&path, &stale).await.unwrap();
        assert_eq!(v3, Version::new(3));
        assert_eq!(store.load(&path).await.unwrap().state, stale);
    }

    #[tokio::test]
    async fn replace_if_rejects_a_stale_version() {
        let store = MemoryStore::new();
        let path = ledger_path("AAAAAA");
        let v1 = store.create(&path, &LedgerState::new()).await.unwrap();

        let mut state = LedgerState::new();
        state.scores.set(Role::B, Score::new(5));
        let v2 = store.replace_if(&path, v1, &state).await.unwrap();
        assert_eq!(v2, Version::new(2));

        let err = store
            .replace_if(&path, v1, &LedgerState::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        assert_eq!(store.load(&path).await.unwrap().version, v2);
    }

    #[tokio::test]
    async fn watch_delivers_later_versions_only() {
        let store = MemoryStore::new();
        let path = ledger_path("AAAAAA");
        let v1 = store.create(&path, &LedgerState::new()).await.unwrap();

        let mut watch = store.watch(&path, v1).await.unwrap();

        let mut state = LedgerState::new();
        state.scores.set(Role::A, Score::new(30));
        store.replace(&path, &state).await.unwrap();

        let snapshot = watch.recv().await.unwrap();
        assert_eq!(snapshot.version, Version::new(2));
        assert_eq!(snapshot.state.scores.get(Role::A).value(), 30);
    }

    #[tokio::test]
    async fn dropping_the_watch_unsubscribes() {
        let store = MemoryStore::new();
        let path = ledger_path("AAAAAA");
        let v1 = store.create(&path, &LedgerState::new()).await.unwrap();

        let watch = store.watch(&path, v1).await.unwrap();
        drop(watch);

        // The pump is gone; the broadcast send must not block or panic.
        store.replace(&path, &LedgerState::new()).await.unwrap();
    }
}
