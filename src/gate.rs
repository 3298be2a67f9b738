//! The gas/balance gate (§4.2): a pre-flight loop that blocks
//! publishing while predicted fee exceeds the configured ceiling or
//! the signer's balance is insufficient for worst-case spend.

use std::time::Duration;

use ethers::types::{Address, U256};
use tracing::{info, warn};

use crate::chain::ChainClient;
use crate::error::ChainError;
use crate::interrupt::InterruptHandle;

#[derive(Debug, PartialEq, Eq)]
pub enum GateOutcome {
    Cleared,
    Interrupted,
}

pub struct GasBalanceGate<'a> {
    client: &'a dyn ChainClient,
    interrupt: &'a InterruptHandle,
    poll_interval: Duration,
}

impl<'a> GasBalanceGate<'a> {
    pub fn new(client: &'a dyn ChainClient, interrupt: &'a InterruptHandle, poll_interval: Duration) -> Self {
        Self {
            client,
            interrupt,
            poll_interval,
        }
    }

    /// Blocks until both the fee condition and the balance condition
    /// hold, or the interrupt is set.
    ///
    /// Fee condition:    latestBaseFee + maxPriorityFee <= maxFeePerGas
    /// Balance condition: signerBalance >= maxFeePerGas * estimatedGas
    pub async fn await_clear(
        &self,
        signer: Address,
        estimated_gas: U256,
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
    ) -> GateOutcome {
        let required_balance = max_fee_per_gas.saturating_mul(estimated_gas);

        loop {
            if self.interrupt.is_set() {
                return GateOutcome::Interrupted;
            }

            match self.check_once(signer, max_priority_fee_per_gas, max_fee_per_gas, required_balance).await {
                Ok(true) => return GateOutcome::Cleared,
                Ok(false) => {
                    if !self.interrupt.sleep_or_interrupted(self.poll_interval).await {
                        return GateOutcome::Interrupted;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "gate check failed, treating as not-yet-clear");
                    if !self.interrupt.sleep_or_interrupted(self.poll_interval).await {
                        return GateOutcome::Interrupted;
                    }
                }
            }
        }
    }

    /// Returns `Ok(true)` only if both conditions currently hold.
    async fn check_once(
        &self,
        signer: Address,
        max_priority_fee_per_gas: U256,
        max_fee_per_gas: U256,
        required_balance: U256,
    ) -> Result<bool, ChainError> {
        let base_fee = self.client.get_latest_base_fee().await?;
        let predicted_fee = base_fee.saturating_add(max_priority_fee_per_gas);

        if predicted_fee > max_fee_per_gas {
            info!(
                predicted_fee_gwei = %format_gwei(predicted_fee),
                ceiling_gwei = %format_gwei(max_fee_per_gas),
                "predicted fee exceeds ceiling, waiting"
            );
            return Ok(false);
        }

        let balance = self.client.get_balance(signer).await?;
        if balance < required_balance {
            info!(
                balance_eth = %format_ether(balance),
                required_eth = %format_ether(required_balance),
                "signer balance below required worst-case spend, waiting"
            );
            return Ok(false);
        }

        Ok(true)
    }
}

fn format_gwei(wei: U256) -> String {
    ethers::utils::format_units(wei, "gwei").unwrap_or_else(|_| wei.to_string())
}

fn format_ether(wei: U256) -> String {
    ethers::utils::format_units(wei, "ether").unwrap_or_else(|_| wei.to_string())
}
