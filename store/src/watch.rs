//! Watch handles.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::VersionedState;

/// A live subscription to one document.
///
/// Snapshots arrive in version order, for self-inflicted and remote writes
/// alike. Dropping the handle aborts the background pump, so unsubscribing
/// is tied to ownership instead of being a cleanup step callers can forget.
#[derive(Debug)]
pub struct Watch {
    receiver: mpsc::Receiver<VersionedState>,
    pump: JoinHandle<()>,
}

impl Watch {
    pub(crate) fn new(receiver: mpsc::Receiver<VersionedState>, pump: JoinHandle<()>) -> Self {
        Self { receiver, pump }
    }

    /// The next snapshot, or `None` once the subscription has ended.
    pub async fn recv(&mut self) -> Option<VersionedState> {
        self.receiver.recv().await
    }

    /// A snapshot if one is already buffered; never waits.
    pub fn try_recv(&mut self) -> Option<VersionedState> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Watch {
    fn drop(&mut self) {
        self.pump.abort();
    }
}
