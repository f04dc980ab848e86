//! The authoritative balance table and its operations
//!
//! Exactly one logical writer mutates the table: the apply loop in
//! [`crate::apply`]. Everything else is either a read under the shared
//! lock (`lookup`, `prefix_search`, `snapshot`) or a write-intent that
//! never touches the table directly (`propose`).

use crate::apply::ReplicaState;
use crate::consensus::{ProposalSender, SnapshotLoader};
use crate::metrics::Metrics;
use crate::transaction::Transaction;
use crate::types::{Account, Amount, Currency, PublicKey};
use crate::{Error, Result};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Per-identity balance table, ordered for deterministic serialization
pub type BalanceTable = BTreeMap<PublicKey, Account>;

/// Replicated wallet ledger: one identical instance runs on every cluster
/// node, fed by the same totally ordered commit stream.
pub struct Ledger {
    /// Balance table; one entry per identity ever touched
    table: RwLock<BalanceTable>,

    /// Outbound proposal channel into the consensus engine
    proposals: ProposalSender,

    /// Snapshot source for replay boundaries
    snapshots: Arc<dyn SnapshotLoader>,

    /// Identities this node reports notices for
    watched: BTreeSet<PublicKey>,

    /// Replica lifecycle state, owned by the apply loop
    state: RwLock<ReplicaState>,

    /// Counters
    metrics: Metrics,
}

impl Ledger {
    /// Create an empty ledger wired to the consensus channels.
    ///
    /// The ledger starts in [`ReplicaState::Bootstrapping`]; spawning the
    /// apply loop moves it to replay.
    pub fn new(proposals: ProposalSender, snapshots: Arc<dyn SnapshotLoader>) -> Result<Self> {
        Ok(Self {
            table: RwLock::new(BTreeMap::new()),
            proposals,
            snapshots,
            watched: BTreeSet::new(),
            state: RwLock::new(ReplicaState::Bootstrapping),
            metrics: Metrics::new()?,
        })
    }

    /// Set the identities whose activity this node logs notices for
    pub fn with_watched_keys(mut self, keys: BTreeSet<PublicKey>) -> Self {
        self.watched = keys;
        self
    }

    /// Verify and submit a transaction for replication.
    ///
    /// Success means accepted into replication, not committed: no commit
    /// acknowledgement ever flows back through this call. The send blocks
    /// while the consensus intake is saturated; callers needing bounded
    /// latency must wrap this with their own cancellation.
    pub async fn propose(&self, tx: &Transaction) -> Result<()> {
        if !tx.is_verified() {
            return Err(Error::InvalidSignature(
                "provided signature does not match the public key".to_string(),
            ));
        }

        let bytes = tx.to_bytes()?;
        self.proposals
            .send(bytes)
            .await
            .map_err(|_| Error::Consensus("proposal intake closed".to_string()))?;
        self.metrics.proposals_total.inc();

        Ok(())
    }

    /// Point read of one identity's balances
    pub fn lookup(&self, key: &PublicKey) -> Option<Account> {
        self.table.read().get(key).cloned()
    }

    /// Find the unique identity whose hex encoding starts with `prefix`.
    ///
    /// Returns a match only when exactly one exists; an ambiguous prefix
    /// is treated as not found.
    pub fn prefix_search(&self, prefix: &str) -> Option<PublicKey> {
        let table = self.table.read();
        let mut matches = table
            .keys()
            .filter(|key| key.to_hex().starts_with(prefix));

        let first = *matches.next()?;
        if matches.next().is_some() {
            return None;
        }
        Some(first)
    }

    /// Serialize the full balance table for external persistence.
    ///
    /// The encoding is structural and ordered, so re-serializing a
    /// restored table reproduces the same bytes on every node.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        let table = self.table.read();
        Ok(bincode::serialize(&*table)?)
    }

    /// Replace the balance table wholesale from snapshot bytes
    pub fn restore_from_snapshot(&self, snapshot: &[u8]) -> Result<()> {
        let table: BalanceTable = bincode::deserialize(snapshot)
            .map_err(|e| Error::Snapshot(format!("malformed snapshot: {}", e)))?;
        *self.table.write() = table;
        self.metrics.snapshot_restores_total.inc();
        Ok(())
    }

    /// Check that `key` can cover `amount` in `currency`: the balance
    /// minus the amount must remain non-negative in both fields.
    pub fn check_balance(
        &self,
        key: &PublicKey,
        currency: &Currency,
        amount: Amount,
    ) -> Result<()> {
        let table = self.table.read();
        let account = table.get(key).ok_or_else(|| {
            Error::InsufficientBalance(format!("no account for {}", key.short()))
        })?;

        let held = account.balance(currency);
        let remaining = held.subtract(amount);
        if !remaining.is_positive() {
            return Err(Error::InsufficientBalance(format!(
                "need {}, only have {}, would end up with {}",
                amount, held, remaining
            )));
        }

        Ok(())
    }

    /// Current replica lifecycle state
    pub fn state(&self) -> ReplicaState {
        *self.state.read()
    }

    /// Counters for this ledger instance
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub(crate) fn set_state(&self, state: ReplicaState) {
        *self.state.write() = state;
    }

    pub(crate) fn is_watched(&self, key: &PublicKey) -> bool {
        self.watched.contains(key)
    }

    /// Apply a validated transaction under the exclusive lock.
    ///
    /// Accounts are replaced as whole values, never mutated field by
    /// field in place. The destination is read before the source debit
    /// is written, so a self-transfer credits the pre-debit balance and
    /// nets positive.
    pub(crate) fn apply(&self, tx: &Transaction) {
        let transfer = Account::single(tx.currency.clone(), tx.amount);
        let mut table = self.table.write();

        let credited = table.get(&tx.dest).cloned().unwrap_or_default();

        if !tx.create {
            if let Some(src) = tx.src {
                let debited = table.get(&src).cloned().unwrap_or_default();
                table.insert(src, debited.subtract(&transfer));
            }
        }

        table.insert(tx.dest, credited.subtract(&transfer.inverse()));

        self.metrics.commits_applied_total.inc();
    }

    /// Handle a replay-boundary sentinel: reload the persisted snapshot if
    /// one exists; absence is normal at startup. Any loader or parse
    /// failure is fatal to the apply loop.
    pub(crate) fn reload_snapshot(&self) -> Result<()> {
        match self.snapshots.load()? {
            Some(snapshot) => {
                tracing::info!(bytes = snapshot.len(), "loading snapshot");
                self.restore_from_snapshot(&snapshot)
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::{InMemorySnapshots, NoSnapshots};
    use crate::crypto::KeyPair;
    use tokio::sync::mpsc;

    fn test_ledger() -> (Ledger, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(8);
        let ledger = Ledger::new(tx, Arc::new(NoSnapshots)).unwrap();
        (ledger, rx)
    }

    fn creation(dest: PublicKey, amount: Amount) -> Transaction {
        Transaction::new(None, Some(dest), "usd".into(), amount, true).unwrap()
    }

    #[tokio::test]
    async fn test_propose_sends_encoded_transaction() {
        let (ledger, mut rx) = test_ledger();
        let dest = KeyPair::generate().public_key();
        let tx = creation(dest, Amount::new(100, 0));

        ledger.propose(&tx).await.unwrap();

        let bytes = rx.recv().await.unwrap();
        let decoded = Transaction::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(ledger.metrics().proposals_total.get(), 1);
    }

    #[tokio::test]
    async fn test_propose_rejects_bad_signature() {
        let (ledger, mut rx) = test_ledger();
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();

        // unsigned transfer
        let tx = Transaction::new(
            Some(alice.public_key()),
            Some(bob.public_key()),
            "usd".into(),
            Amount::new(1, 0),
            false,
        )
        .unwrap();

        let err = ledger.propose(&tx).await.unwrap_err();
        assert!(matches!(err, Error::InvalidSignature(_)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_apply_creation_then_lookup() {
        let (ledger, _rx) = test_ledger();
        let dest = KeyPair::generate().public_key();

        ledger.apply(&creation(dest, Amount::new(100, 0)));

        let account = ledger.lookup(&dest).unwrap();
        assert_eq!(account.balance(&"usd".into()), Amount::new(100, 0));
    }

    #[test]
    fn test_apply_transfer_moves_balance() {
        let (ledger, _rx) = test_ledger();
        let alice = KeyPair::generate();
        let bob = KeyPair::generate().public_key();

        ledger.apply(&creation(alice.public_key(), Amount::new(100, 0)));

        let mut tx = Transaction::new(
            Some(alice.public_key()),
            Some(bob),
            "usd".into(),
            Amount::new(40, 0),
            false,
        )
        .unwrap();
        tx.sign(&alice).unwrap();
        ledger.apply(&tx);

        assert_eq!(
            ledger.lookup(&alice.public_key()).unwrap().balance(&"usd".into()),
            Amount::new(60, 0)
        );
        assert_eq!(
            ledger.lookup(&bob).unwrap().balance(&"usd".into()),
            Amount::new(40, 0)
        );
    }

    #[test]
    fn test_apply_self_transfer_credits_pre_debit_balance() {
        let (ledger, _rx) = test_ledger();
        let alice = KeyPair::generate();

        ledger.apply(&creation(alice.public_key(), Amount::new(100, 0)));

        let mut tx = Transaction::new(
            Some(alice.public_key()),
            Some(alice.public_key()),
            "usd".into(),
            Amount::new(40, 0),
            false,
        )
        .unwrap();
        tx.sign(&alice).unwrap();
        ledger.apply(&tx);

        // the credit reads the balance as it stood before the debit was
        // written, so sending to yourself nets the amount
        assert_eq!(
            ledger
                .lookup(&alice.public_key())
                .unwrap()
                .balance(&"usd".into()),
            Amount::new(140, 0)
        );
    }

    #[test]
    fn test_check_balance() {
        let (ledger, _rx) = test_ledger();
        let key = KeyPair::generate().public_key();
        ledger.apply(&creation(key, Amount::new(60, 0)));

        // covered
        assert!(ledger
            .check_balance(&key, &"usd".into(), Amount::new(60, 0))
            .is_ok());

        // overdraft
        let err = ledger
            .check_balance(&key, &"usd".into(), Amount::new(1000, 0))
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientBalance(_)));

        // account that has never been touched
        let stranger = KeyPair::generate().public_key();
        assert!(ledger
            .check_balance(&stranger, &"usd".into(), Amount::new(1, 0))
            .is_err());
    }

    #[test]
    fn test_lookup_missing() {
        let (ledger, _rx) = test_ledger();
        let key = KeyPair::generate().public_key();
        assert!(ledger.lookup(&key).is_none());
    }

    #[test]
    fn test_prefix_search_unique_and_ambiguous() {
        let (ledger, _rx) = test_ledger();

        let mut a = [0u8; 32];
        a[..4].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        let mut b = [0u8; 32];
        b[..4].copy_from_slice(&[0x12, 0x34, 0xbe, 0xef]);
        let key_a = PublicKey::from_bytes(a);
        let key_b = PublicKey::from_bytes(b);

        ledger.apply(&creation(key_a, Amount::new(1, 0)));
        ledger.apply(&creation(key_b, Amount::new(1, 0)));

        assert_eq!(ledger.prefix_search("deadbeef"), Some(key_a));
        assert_eq!(ledger.prefix_search("1234"), Some(key_b));
        // both keys share the empty prefix: ambiguous, so not found
        assert_eq!(ledger.prefix_search(""), None);
        assert_eq!(ledger.prefix_search("ffff"), None);
    }

    #[test]
    fn test_snapshot_round_trip_bytes() {
        let (ledger, _rx) = test_ledger();
        let alice = KeyPair::generate().public_key();
        let bob = KeyPair::generate().public_key();
        ledger.apply(&creation(alice, Amount::new(100, 0)));
        ledger.apply(&creation(bob, Amount::new(5, 25)));

        let snapshot = ledger.snapshot().unwrap();

        let (restored, _rx2) = test_ledger();
        restored.restore_from_snapshot(&snapshot).unwrap();

        assert_eq!(restored.snapshot().unwrap(), snapshot);
        assert_eq!(
            restored.lookup(&alice).unwrap().balance(&"usd".into()),
            Amount::new(100, 0)
        );
    }

    #[test]
    fn test_restore_rejects_garbage() {
        let (ledger, _rx) = test_ledger();
        let err = ledger.restore_from_snapshot(&[0xff; 3]).unwrap_err();
        assert!(matches!(err, Error::Snapshot(_)));
    }

    #[test]
    fn test_reload_snapshot_absent_is_normal() {
        let (tx, _rx) = mpsc::channel(1);
        let store = Arc::new(InMemorySnapshots::new());
        let ledger = Ledger::new(tx, store.clone()).unwrap();

        ledger.reload_snapshot().unwrap();
        assert_eq!(ledger.metrics().snapshot_restores_total.get(), 0);

        let donor_key = KeyPair::generate().public_key();
        ledger.apply(&creation(donor_key, Amount::new(7, 0)));
        store.save(ledger.snapshot().unwrap());

        ledger.reload_snapshot().unwrap();
        assert_eq!(ledger.metrics().snapshot_restores_total.get(), 1);
    }
}
