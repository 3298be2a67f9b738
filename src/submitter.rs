//! The batch submitter (§4.3): ordered, nonce-assigned submission of
//! the broadcast transactions followed by the rollup-proof
//! transaction, with per-send retry.

use std::time::Duration;

use ethers::types::U256;
use tracing::{info, warn};

use crate::chain::{ChainClient, SendParams};
use crate::interrupt::InterruptHandle;
use crate::status::TxStatus;

#[derive(Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Every status entry obtained a transaction hash.
    Completed,
    /// The interrupt fired before every entry obtained a hash.
    Interrupted,
}

pub struct BatchSubmitter<'a> {
    client: &'a dyn ChainClient,
    interrupt: &'a InterruptHandle,
    retry_interval: Duration,
}

impl<'a> BatchSubmitter<'a> {
    pub fn new(client: &'a dyn ChainClient, interrupt: &'a InterruptHandle, retry_interval: Duration) -> Self {
        Self {
            client,
            interrupt,
            retry_interval,
        }
    }

    /// Assigns `start_nonce, start_nonce+1, ...` to each not-yet-
    /// `txHash`'d entry in list order and sends it. Already-confirmed
    /// entries, and entries still carrying a hash from a dispatch this
    /// same outer iteration's confirmer never got around to polling,
    /// are both skipped and consume no nonce — only an entry the
    /// confirmer has positively identified as needing a fresh nonce
    /// (by clearing its hash) is resent.
    pub async fn submit(
        &self,
        statuses: &mut [TxStatus],
        start_nonce: U256,
        gas_limit: U256,
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
    ) -> SubmitOutcome {
        let mut nonce = start_nonce;

        for status in statuses.iter_mut() {
            if status.confirmed || status.tx_hash.is_some() {
                continue;
            }

            let assigned_nonce = nonce;
            nonce = nonce.saturating_add(U256::one());

            loop {
                if self.interrupt.is_set() {
                    return SubmitOutcome::Interrupted;
                }

                let params = SendParams {
                    nonce: assigned_nonce,
                    gas_limit,
                    max_fee_per_gas,
                    max_priority_fee_per_gas,
                };

                match self.client.send_tx(status.payload.clone(), params).await {
                    Ok(hash) => {
                        info!(
                            name = %status.name,
                            nonce = %assigned_nonce,
                            size = status.payload.len(),
                            hash = ?hash,
                            "transaction sent"
                        );
                        status.tx_hash = Some(hash);
                        break;
                    }
                    Err(e) => {
                        warn!(name = %status.name, nonce = %assigned_nonce, error = %e, "send failed, will retry");
                        if !self.interrupt.sleep_or_interrupted(self.retry_interval).await {
                            return SubmitOutcome::Interrupted;
                        }
                    }
                }
            }
        }

        SubmitOutcome::Completed
    }
}
