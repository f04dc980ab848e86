//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `ledger_proposals_total` - Transactions accepted into replication
//! - `ledger_commits_applied_total` - Commit entries applied to the table
//! - `ledger_commits_dropped_total` - Commit entries dropped, by reason
//! - `ledger_snapshot_restores_total` - Wholesale table replacements

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;

/// Metrics collector.
///
/// Counters are registered on an owned registry, not the process-global
/// one, so several ledgers can coexist in one process (replicas in tests).
#[derive(Clone)]
pub struct Metrics {
    /// Transactions sent to the proposal channel
    pub proposals_total: IntCounter,

    /// Commit entries applied
    pub commits_applied_total: IntCounter,

    /// Commit entries dropped, labeled by reason
    pub commits_dropped_total: IntCounterVec,

    /// Snapshot restores
    pub snapshot_restores_total: IntCounter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

/// Drop reasons used as the `reason` label value
pub mod drop_reason {
    /// Empty currency identifier
    pub const CURRENCY: &str = "invalid_currency";
    /// Signature failed re-verification at apply time
    pub const SIGNATURE: &str = "invalid_signature";
    /// Source balance would go negative
    pub const BALANCE: &str = "insufficient_balance";
}

impl Metrics {
    /// Create a new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let proposals_total = IntCounter::with_opts(Opts::new(
            "ledger_proposals_total",
            "Transactions accepted into replication",
        ))?;
        registry.register(Box::new(proposals_total.clone()))?;

        let commits_applied_total = IntCounter::with_opts(Opts::new(
            "ledger_commits_applied_total",
            "Commit entries applied to the balance table",
        ))?;
        registry.register(Box::new(commits_applied_total.clone()))?;

        let commits_dropped_total = IntCounterVec::new(
            Opts::new(
                "ledger_commits_dropped_total",
                "Commit entries dropped at apply time",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(commits_dropped_total.clone()))?;

        let snapshot_restores_total = IntCounter::with_opts(Opts::new(
            "ledger_snapshot_restores_total",
            "Wholesale balance table replacements from snapshots",
        ))?;
        registry.register(Box::new(snapshot_restores_total.clone()))?;

        Ok(Self {
            proposals_total,
            commits_applied_total,
            commits_dropped_total,
            snapshot_restores_total,
            registry,
        })
    }

    /// Record a dropped commit entry
    pub fn record_drop(&self, reason: &str) {
        self.commits_dropped_total.with_label_values(&[reason]).inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.proposals_total.get(), 0);
        assert_eq!(metrics.commits_applied_total.get(), 0);
    }

    #[test]
    fn test_two_collectors_coexist() {
        // owned registries, so no duplicate-registration clash
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.proposals_total.inc();
        assert_eq!(a.proposals_total.get(), 1);
        assert_eq!(b.proposals_total.get(), 0);
    }

    #[test]
    fn test_record_drop() {
        let metrics = Metrics::new().unwrap();
        metrics.record_drop(drop_reason::SIGNATURE);
        metrics.record_drop(drop_reason::SIGNATURE);
        metrics.record_drop(drop_reason::BALANCE);
        assert_eq!(
            metrics
                .commits_dropped_total
                .with_label_values(&[drop_reason::SIGNATURE])
                .get(),
            2
        );
        assert_eq!(
            metrics
                .commits_dropped_total
                .with_label_values(&[drop_reason::BALANCE])
                .get(),
            1
        );
    }
}
