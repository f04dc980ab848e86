//! Replicated multi-currency wallet ledger
//!
//! Application-level state machine for a cluster-distributed currency
//! ledger: every node runs an identical deterministic machine that
//! consumes a totally ordered stream of signed transactions from a
//! consensus log and mutates per-identity balances.
//!
//! # Architecture
//!
//! - **Single writer**: one apply loop per node owns every mutation of
//!   the balance table; reads share a lock and never block each other
//! - **Deterministic validation**: apply-time checks depend only on the
//!   entry and prior agreed state, so replicas never diverge
//! - **Fire-and-forget commits**: invalid entries are dropped silently;
//!   proposers poll balances rather than await acknowledgements
//! - **Snapshot compaction**: the full table serializes to ordered,
//!   byte-stable snapshots so the consensus log can be truncated

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod apply;
pub mod config;
pub mod consensus;
pub mod crypto;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod transaction;
pub mod types;

// Re-exports
pub use apply::ReplicaState;
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use metrics::Metrics;
pub use transaction::Transaction;
pub use types::{Account, Amount, Currency, PublicKey, Signature};
