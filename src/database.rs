//! The downstream rollup database collaborator (§6). Out of scope for
//! this crate beyond its interface: the publisher only ever writes
//! `callData` before submitting and the final `txHash` once dispatch
//! completes, so a restarting process can reconstruct or locate a
//! pending batch.

use async_trait::async_trait;
use ethers::types::{Bytes, TxHash};

use crate::chain::RollupId;

#[async_trait]
pub trait RollupDatabase: Send + Sync {
    /// Persists the built proof transaction payload before any
    /// on-chain attempt.
    async fn set_call_data(&self, rollup_id: &RollupId, rollup_proof_tx: Bytes) -> Result<(), String>;

    /// Persists the hash of the final (rollup-proof) transaction once
    /// every transaction in the batch has been dispatched.
    async fn confirm_sent(&self, rollup_id: &RollupId, final_tx_hash: TxHash) -> Result<(), String>;
}

/// Stand-in for the real rollup database when none is wired up: logs
/// what would have been persisted instead of writing it anywhere.
/// Mirrors `metrics::LoggingMetrics` — useful for running the
/// publisher standalone, never for production.
pub struct LoggingRollupDatabase;

#[async_trait]
impl RollupDatabase for LoggingRollupDatabase {
    async fn set_call_data(&self, rollup_id: &RollupId, rollup_proof_tx: Bytes) -> Result<(), String> {
        tracing::info!(rollup_id = %rollup_id, size = rollup_proof_tx.len(), "callData (not persisted, no database configured)");
        Ok(())
    }

    async fn confirm_sent(&self, rollup_id: &RollupId, final_tx_hash: TxHash) -> Result<(), String> {
        tracing::info!(rollup_id = %rollup_id, hash = ?final_tx_hash, "sent (not persisted, no database configured)");
        Ok(())
    }
}
