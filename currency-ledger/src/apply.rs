//! The commit-apply loop
//!
//! One task per node consumes the commit feed in the order the consensus
//! engine agreed on and applies each entry to the local balance table.
//! Validation here runs identically on every replica: it is purely a
//! function of the entry and of prior, already-agreed state, which is what
//! keeps independently running nodes in lockstep.
//!
//! Invalid entries are dropped silently with respect to the proposer: no
//! rejection flows back through the commit path. Decode failures and
//! snapshot failures are not business errors; they indicate a protocol
//! mismatch and terminate the loop.

use crate::consensus::{Commit, CommitReceiver, ErrorReceiver};
use crate::ledger::Ledger;
use crate::metrics::drop_reason;
use crate::transaction::Transaction;
use crate::Result;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Replica lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaState {
    /// Constructed, apply loop not yet running
    Bootstrapping,

    /// Consuming the replayed prefix of the log
    Replaying,

    /// Caught up; consuming fresh commits
    Live,

    /// Commit feed closed and error feed drained without error; terminal
    Closed,
}

/// Consume the commit feed until it closes, then drain the error feed.
///
/// Returns `Err` on the fatal class only: malformed commit entry,
/// malformed or unloadable snapshot, or a value on the error feed. Drops
/// of invalid transactions are not errors.
pub async fn run(
    ledger: Arc<Ledger>,
    mut commits: CommitReceiver,
    mut errors: ErrorReceiver,
) -> Result<()> {
    ledger.set_state(ReplicaState::Replaying);

    while let Some(commit) = commits.recv().await {
        match commit {
            Commit::Boundary => {
                ledger.reload_snapshot()?;
                if ledger.state() == ReplicaState::Replaying {
                    tracing::info!("replay complete, ledger is live");
                    ledger.set_state(ReplicaState::Live);
                }
            }
            Commit::Entry(bytes) => apply_entry(&ledger, &bytes)?,
        }
    }

    // commit feed closed: anything on the error feed is fatal
    if let Some(err) = errors.recv().await {
        tracing::error!(error = %err, "consensus engine reported a terminal error");
        return Err(err);
    }

    ledger.set_state(ReplicaState::Closed);
    Ok(())
}

/// Spawn the apply loop on the current runtime
pub fn spawn(
    ledger: Arc<Ledger>,
    commits: CommitReceiver,
    errors: ErrorReceiver,
) -> JoinHandle<Result<()>> {
    tokio::spawn(run(ledger, commits, errors))
}

fn apply_entry(ledger: &Ledger, bytes: &[u8]) -> Result<()> {
    // decode failure is a log/application protocol mismatch, not a
    // business error
    let tx = Transaction::from_bytes(bytes)?;

    if tx.currency.is_empty() {
        tracing::warn!("dropping transaction with invalid currency");
        ledger.metrics().record_drop(drop_reason::CURRENCY);
        return Ok(());
    }

    if !tx.create {
        if !tx.is_verified() {
            tracing::warn!("dropping transaction with bad signature");
            ledger.metrics().record_drop(drop_reason::SIGNATURE);
            return Ok(());
        }

        // verified implies a source is present
        let Some(src) = tx.src else {
            ledger.metrics().record_drop(drop_reason::SIGNATURE);
            return Ok(());
        };

        if let Err(e) = ledger.check_balance(&src, &tx.currency, tx.amount) {
            tracing::warn!(error = %e, "dropping transaction with bad balance");
            ledger.metrics().record_drop(drop_reason::BALANCE);
            return Ok(());
        }
    }

    ledger.apply(&tx);
    notify_watched(ledger, &tx);

    Ok(())
}

/// Observational side effect only: report activity on identities this node
/// was configured to watch. Never affects state.
fn notify_watched(ledger: &Ledger, tx: &Transaction) {
    if let Some(src) = tx.src {
        if ledger.is_watched(&src) {
            tracing::info!(
                amount = %tx.amount,
                currency = %tx.currency,
                dest = %tx.dest.short(),
                "transfer sent from watched account"
            );
        }
    }

    if ledger.is_watched(&tx.dest) {
        if tx.create {
            tracing::info!(
                amount = %tx.amount,
                currency = %tx.currency,
                "currency created in watched account"
            );
        } else {
            tracing::info!(
                amount = %tx.amount,
                currency = %tx.currency,
                "transfer received in watched account"
            );
        }
    }
}
