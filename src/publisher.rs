//! The publisher orchestrator (§4.1): the outer state machine that
//! composes the gate, submitter, and confirmer into the one public
//! entry point, `Publisher::publish`.
//!
//! This is the only module that talks to the downstream rollup
//! database and the only one that owns the interrupt flag's lifetime
//! for the instance — everything else borrows it for the duration of
//! one call.

use std::sync::Arc;
use std::time::Duration;

use ethers::types::{Address, U256};
use tracing::{info, warn};

use crate::chain::{ChainClient, Rollup};
use crate::confirmer::{ConfirmOutcome, ReceiptConfirmer};
use crate::database::RollupDatabase;
use crate::error::BuildError;
use crate::gate::{GasBalanceGate, GateOutcome};
use crate::interrupt::InterruptHandle;
use crate::metrics::PublishMetrics;
use crate::status::{build_statuses, TxStatus};
use crate::submitter::{BatchSubmitter, SubmitOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    Aborted,
}

/// The fee ceilings, gas limit, and the two fixed timing knobs
/// (§6/§7 spec the sleep and receipt timeout at 60s/300s; exposed
/// here so an operator can tune them without forking the crate).
#[derive(Debug, Clone, Copy)]
pub struct PublisherSettings {
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    pub gas_limit: U256,
    pub poll_interval: Duration,
    pub receipt_timeout: Duration,
}

/// Ties one chain client, one rollup database, and one metrics sink
/// to a single interrupt flag. Not re-entrant: the caller must
/// serialize `publish` calls against one instance (§5).
pub struct Publisher {
    chain: Arc<dyn ChainClient>,
    database: Arc<dyn RollupDatabase>,
    metrics: Arc<dyn PublishMetrics>,
    interrupt: InterruptHandle,
    settings: PublisherSettings,
}

impl Publisher {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        database: Arc<dyn RollupDatabase>,
        metrics: Arc<dyn PublishMetrics>,
        settings: PublisherSettings,
    ) -> Self {
        Self {
            chain,
            database,
            metrics,
            interrupt: InterruptHandle::new(),
            settings,
        }
    }

    /// Idempotent signal causing any in-progress `publish` to return
    /// `Aborted` as soon as possible.
    pub fn interrupt(&self) {
        self.interrupt.interrupt();
    }

    /// Must be called before the next `publish` can proceed.
    pub fn clear_interrupt(&self) {
        self.interrupt.clear();
    }

    pub async fn publish(&self, rollup: Rollup, estimated_gas: U256) -> PublishOutcome {
        if self.interrupt.is_set() {
            warn!(rollup_id = %rollup.id, "publish called while interrupt is set, aborting immediately");
            return PublishOutcome::Aborted;
        }

        let mut statuses = match self.build_and_persist(&rollup).await {
            Ok(statuses) => statuses,
            Err(e) => {
                warn!(rollup_id = %rollup.id, error = %e, "failed before any on-chain attempt");
                return PublishOutcome::Aborted;
            }
        };

        let signer = match self.signer_address().await {
            Ok(addr) => addr,
            Err(()) => return PublishOutcome::Aborted,
        };

        let balance = self.chain.get_balance(signer).await.ok();
        info!(
            rollup_id = %rollup.id,
            signer = ?signer,
            balance_eth = ?balance.map(format_ether),
            broadcast_count = statuses.len() - 1,
            "starting publish"
        );

        let timer = self.metrics.publish_timer();

        loop {
            if self.interrupt.is_set() {
                warn!(rollup_id = %rollup.id, "interrupt observed at top of outer loop, aborting");
                return PublishOutcome::Aborted;
            }

            let gate = GasBalanceGate::new(self.chain.as_ref(), &self.interrupt, self.settings.poll_interval);
            match gate
                .await_clear(
                    signer,
                    estimated_gas,
                    self.settings.max_fee_per_gas,
                    self.settings.max_priority_fee_per_gas,
                )
                .await
            {
                GateOutcome::Interrupted => {
                    warn!(rollup_id = %rollup.id, "interrupted while waiting on gas/balance gate");
                    return PublishOutcome::Aborted;
                }
                GateOutcome::Cleared => {}
            }

            let start_nonce = match self.chain.get_transaction_count(signer).await {
                Ok(nonce) => nonce,
                Err(e) => {
                    warn!(rollup_id = %rollup.id, error = %e, "failed to read signer nonce, aborting");
                    return PublishOutcome::Aborted;
                }
            };

            let submitter = BatchSubmitter::new(self.chain.as_ref(), &self.interrupt, self.settings.poll_interval);
            let submit_outcome = submitter
                .submit(
                    &mut statuses,
                    start_nonce,
                    self.settings.gas_limit,
                    self.settings.max_fee_per_gas,
                    self.settings.max_priority_fee_per_gas,
                )
                .await;

            if submit_outcome == SubmitOutcome::Interrupted || statuses.iter().any(|s| !s.is_sent()) {
                warn!(rollup_id = %rollup.id, "interrupted mid-send, aborting");
                return PublishOutcome::Aborted;
            }

            // The final (rollup-proof) transaction's hash is always
            // the one worth locating a pending batch by, whether this
            // is the first dispatch or a retry that resent the proof
            // tx under a fresh hash.
            if let Some(final_hash) = statuses.last().and_then(|s| s.tx_hash) {
                if let Err(e) = self.database.confirm_sent(&rollup.id, final_hash).await {
                    warn!(rollup_id = %rollup.id, error = %e, "failed to persist sent txHash");
                }
            }

            let confirmer = ReceiptConfirmer::new(
                self.chain.as_ref(),
                &self.interrupt,
                self.settings.receipt_timeout,
                self.settings.poll_interval,
            );
            match confirmer.confirm(&mut statuses).await {
                ConfirmOutcome::AllConfirmed => {
                    timer.stop();
                    info!(rollup_id = %rollup.id, "publish complete, all transactions confirmed");
                    return PublishOutcome::Published;
                }
                ConfirmOutcome::Abort => {
                    warn!(rollup_id = %rollup.id, "receipt confirmer aborted publish");
                    return PublishOutcome::Aborted;
                }
                ConfirmOutcome::Retry => {
                    info!(rollup_id = %rollup.id, "retrying outer loop after non-fatal revert");
                    continue;
                }
            }
        }
    }

    /// Step 1 of §4.1: build the submission unit and persist its
    /// `callData` before any on-chain attempt. Kept as its own
    /// fallible step, distinct from the retry loop, because a failure
    /// here means the coordinator must fix something (a bad proof, an
    /// unreachable database) rather than something the publisher can
    /// itself wait out.
    async fn build_and_persist(&self, rollup: &Rollup) -> Result<Vec<TxStatus>, BuildError> {
        let built = self.chain.build_batch(rollup).await?;
        self.database
            .set_call_data(&rollup.id, built.rollup_proof_tx.clone())
            .await
            .map_err(BuildError::Database)?;
        Ok(build_statuses(built.rollup_proof_tx, built.broadcast_txs))
    }

    async fn signer_address(&self) -> Result<Address, ()> {
        match self.chain.get_accounts().await {
            Ok(accounts) => match accounts.into_iter().next() {
                Some(addr) => Ok(addr),
                None => {
                    warn!("chain client returned no accounts");
                    Err(())
                }
            },
            Err(e) => {
                warn!(error = %e, "failed to read signer address");
                Err(())
            }
        }
    }
}

fn format_ether(wei: U256) -> String {
    ethers::utils::format_units(wei, "ether").unwrap_or_else(|_| wei.to_string())
}
