//! Single-process demo node
//!
//! Wires a ledger to loopback consensus channels (every proposal is
//! committed immediately, in order) and walks through a creation and a
//! transfer. Stands in for a real deployment where the channels belong to
//! a log-replication engine.

use currency_ledger::consensus::{Commit, InMemorySnapshots};
use currency_ledger::crypto::KeyPair;
use currency_ledger::{apply, Amount, Config, Ledger, Transaction};
use std::sync::Arc;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(service = %config.service_name, "starting ledger node");

    let (proposal_tx, mut proposal_rx) = mpsc::channel::<Vec<u8>>(config.proposal_buffer);
    let (commit_tx, commit_rx) = mpsc::channel::<Commit>(config.commit_buffer);
    let (error_tx, error_rx) = mpsc::channel(1);

    let snapshots = Arc::new(InMemorySnapshots::new());
    let ledger = Arc::new(
        Ledger::new(proposal_tx, snapshots)?.with_watched_keys(config.watched_keys()?),
    );

    // loopback "consensus": replay is empty, then every proposal commits
    // in submission order
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let forwarder = tokio::spawn(async move {
        let _ = commit_tx.send(Commit::Boundary).await;
        loop {
            tokio::select! {
                maybe = proposal_rx.recv() => match maybe {
                    Some(bytes) => {
                        if commit_tx.send(Commit::Entry(bytes)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                _ = &mut shutdown_rx => break,
            }
        }
    });

    let apply_loop = apply::spawn(ledger.clone(), commit_rx, error_rx);

    let alice = KeyPair::generate();
    let bob = KeyPair::generate();

    let mint = Transaction::new(
        None,
        Some(alice.public_key()),
        "usd".into(),
        Amount::new(100, 0),
        true,
    )?;
    ledger.propose(&mint).await?;

    let mut payment = Transaction::new(
        Some(alice.public_key()),
        Some(bob.public_key()),
        "usd".into(),
        Amount::new(40, 0),
        false,
    )?;
    payment.sign(&alice)?;
    ledger.propose(&payment).await?;

    // let the loopback deliver both commits
    tokio::task::yield_now().await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    for (name, key) in [("alice", alice.public_key()), ("bob", bob.public_key())] {
        if let Some(account) = ledger.lookup(&key) {
            let balances: std::collections::BTreeMap<String, String> = account
                .iter()
                .map(|(c, a)| (c.to_string(), a.to_string()))
                .collect();
            println!(
                "{} ({}): {}",
                name,
                key.short(),
                serde_json::to_string(&balances)?
            );
        }
    }

    // stopping the loopback closes the commit feed; the apply loop then
    // drains the (empty) error feed and closes
    let _ = shutdown_tx.send(());
    forwarder.await?;
    drop(error_tx);
    apply_loop.await??;

    tracing::info!("ledger node closed cleanly");
    Ok(())
}
