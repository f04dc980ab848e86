//! Channel-shaped interface to the consensus engine
//!
//! The consensus/log-replication engine itself is an external
//! collaborator; this module pins down the only surface the state machine
//! sees of it:
//!
//! - an outbound proposal channel taking one opaque serialized transaction
//!   per send,
//! - an inbound commit feed yielding entries in an order identical on
//!   every replica,
//! - an inbound error feed yielding at most one terminal error,
//! - a snapshot loader keyed to the log's compaction point (the save side
//!   is pulled by the engine through [`crate::Ledger::snapshot`]).

use crate::{Error, Result};
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// One value off the commit feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Commit {
    /// A serialized transaction agreed by the cluster
    Entry(Vec<u8>),

    /// Sentinel marking the end of replay, or an instruction to reload
    /// the persisted snapshot
    Boundary,
}

/// Outbound proposal channel. Send blocks when the consensus intake is
/// saturated; no timeout is imposed at this layer.
pub type ProposalSender = mpsc::Sender<Vec<u8>>;

/// Consensus-side receiver of proposals
pub type ProposalReceiver = mpsc::Receiver<Vec<u8>>;

/// Inbound commit feed
pub type CommitReceiver = mpsc::Receiver<Commit>;

/// Commit feed sender, held by the consensus engine
pub type CommitSender = mpsc::Sender<Commit>;

/// Inbound error feed; receipt of any value is fatal
pub type ErrorReceiver = mpsc::Receiver<Error>;

/// Error feed sender, held by the consensus engine
pub type ErrorSender = mpsc::Sender<Error>;

/// Source of the snapshot persisted at the consensus log's compaction
/// point. `Ok(None)` means no snapshot exists yet, which is normal at
/// startup.
pub trait SnapshotLoader: Send + Sync {
    /// Load the latest persisted snapshot, if any
    fn load(&self) -> Result<Option<Vec<u8>>>;
}

/// Snapshot store backed by process memory, for tests and single-process
/// nodes. The engine side saves through [`InMemorySnapshots::save`]; the
/// ledger side loads through [`SnapshotLoader`].
#[derive(Debug, Default)]
pub struct InMemorySnapshots {
    latest: Mutex<Option<Vec<u8>>>,
}

impl InMemorySnapshots {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the persisted snapshot
    pub fn save(&self, snapshot: Vec<u8>) {
        *self.latest.lock() = Some(snapshot);
    }
}

impl SnapshotLoader for InMemorySnapshots {
    fn load(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.latest.lock().clone())
    }
}

/// Snapshot loader for nodes running without compaction
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSnapshots;

impl SnapshotLoader for NoSnapshots {
    fn load(&self) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

/// A loader that fails, for exercising the fatal snapshot path
#[cfg(test)]
pub(crate) struct BrokenSnapshots;

#[cfg(test)]
impl SnapshotLoader for BrokenSnapshots {
    fn load(&self) -> Result<Option<Vec<u8>>> {
        Err(Error::Snapshot("backing store unavailable".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_snapshots_round_trip() {
        let store = InMemorySnapshots::new();
        assert_eq!(store.load().unwrap(), None);

        store.save(vec![1, 2, 3]);
        assert_eq!(store.load().unwrap(), Some(vec![1, 2, 3]));

        store.save(vec![4]);
        assert_eq!(store.load().unwrap(), Some(vec![4]));
    }

    #[test]
    fn test_no_snapshots_always_empty() {
        assert_eq!(NoSnapshots.load().unwrap(), None);
    }
}
