//! The receipt confirmer (§4.4): polls receipts in order, classifies
//! outcomes, and decides whether the outer publish loop should retry
//! or abort.

use std::time::Duration;

use tracing::{info, warn};

use crate::chain::{ChainClient, INCORRECT_STATE_HASH};
use crate::interrupt::InterruptHandle;
use crate::status::TxStatus;

#[derive(Debug, PartialEq, Eq)]
pub enum ConfirmOutcome {
    AllConfirmed,
    Retry,
    Abort,
}

pub struct ReceiptConfirmer<'a> {
    client: &'a dyn ChainClient,
    interrupt: &'a InterruptHandle,
    receipt_timeout: Duration,
    retry_interval: Duration,
}

impl<'a> ReceiptConfirmer<'a> {
    pub fn new(
        client: &'a dyn ChainClient,
        interrupt: &'a InterruptHandle,
        receipt_timeout: Duration,
        retry_interval: Duration,
    ) -> Self {
        Self {
            client,
            interrupt,
            receipt_timeout,
            retry_interval,
        }
    }

    pub async fn confirm(&self, statuses: &mut [TxStatus]) -> ConfirmOutcome {
        for status in statuses.iter_mut() {
            if status.confirmed {
                continue;
            }

            if self.interrupt.is_set() {
                return ConfirmOutcome::Abort;
            }

            let tx_hash = match status.tx_hash {
                Some(h) => h,
                None => return ConfirmOutcome::Abort,
            };

            let receipt = match self.client.get_transaction_receipt_safe(tx_hash, self.receipt_timeout).await {
                Ok(Some(receipt)) => receipt,
                Ok(None) => {
                    warn!(name = %status.name, hash = ?tx_hash, "receipt poll timed out, no receipt ever returned");
                    return ConfirmOutcome::Abort;
                }
                Err(e) => {
                    warn!(name = %status.name, hash = ?tx_hash, error = %e, "receipt fetch failed");
                    return ConfirmOutcome::Abort;
                }
            };

            if receipt.status {
                info!(name = %status.name, hash = ?tx_hash, "transaction confirmed");
                status.confirmed = true;
                continue;
            }

            let revert_name = receipt
                .revert
                .as_ref()
                .map(|r| r.name.as_str())
                .unwrap_or("<undecoded>");
            warn!(name = %status.name, hash = ?tx_hash, revert = revert_name, "transaction reverted");

            if revert_name == INCORRECT_STATE_HASH {
                return ConfirmOutcome::Abort;
            }

            // The mined-but-reverted tx has already consumed its nonce,
            // so only *this* entry needs a fresh one next round. Entries
            // later in the list that this pass never reached keep their
            // hash — they were already dispatched and may still be
            // mining; the submitter must not resend them.
            status.tx_hash = None;

            if !self.interrupt.sleep_or_interrupted(self.retry_interval).await {
                return ConfirmOutcome::Abort;
            }
            return ConfirmOutcome::Retry;
        }

        ConfirmOutcome::AllConfirmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{BuiltBatch, ChainError, ReceiptOutcome, RevertInfo, Rollup, SendParams};
    use async_trait::async_trait;
    use ethers::types::{Address, Bytes, TxHash, U256};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct ScriptedClient {
        receipts: Mutex<HashMap<TxHash, Result<Option<ReceiptOutcome>, String>>>,
    }

    #[async_trait]
    impl ChainClient for ScriptedClient {
        async fn build_batch(&self, _rollup: &Rollup) -> Result<BuiltBatch, ChainError> {
            unimplemented!()
        }
        async fn get_accounts(&self) -> Result<Vec<Address>, ChainError> {
            unimplemented!()
        }
        async fn get_latest_base_fee(&self) -> Result<U256, ChainError> {
            unimplemented!()
        }
        async fn get_balance(&self, _address: Address) -> Result<U256, ChainError> {
            unimplemented!()
        }
        async fn get_transaction_count(&self, _address: Address) -> Result<U256, ChainError> {
            unimplemented!()
        }
        async fn send_tx(&self, _payload: Bytes, _params: SendParams) -> Result<TxHash, ChainError> {
            unimplemented!()
        }
        async fn get_transaction_receipt_safe(
            &self,
            tx_hash: TxHash,
            _timeout: Duration,
        ) -> Result<Option<ReceiptOutcome>, ChainError> {
            match self.receipts.lock().unwrap().get(&tx_hash).unwrap() {
                Ok(outcome) => Ok(outcome.clone()),
                Err(e) => Err(ChainError::Rpc(e.clone())),
            }
        }
        async fn get_user_proof_approval_status(&self, _address: Address, _tx_id: &str) -> Result<bool, ChainError> {
            unimplemented!()
        }
    }

    fn sent_status(name: &str, hash: TxHash) -> TxStatus {
        let mut status = TxStatus::new(name, Bytes::from(vec![0x01]));
        status.tx_hash = Some(hash);
        status
    }

    #[tokio::test]
    async fn all_successful_receipts_confirms_everything() {
        let h0 = TxHash::repeat_byte(1);
        let h1 = TxHash::repeat_byte(2);
        let mut receipts = HashMap::new();
        receipts.insert(h0, Ok(Some(ReceiptOutcome { status: true, revert: None })));
        receipts.insert(h1, Ok(Some(ReceiptOutcome { status: true, revert: None })));
        let client = ScriptedClient { receipts: Mutex::new(receipts) };
        let interrupt = InterruptHandle::new();
        let confirmer = ReceiptConfirmer::new(&client, &interrupt, Duration::from_secs(300), Duration::from_millis(5));

        let mut statuses = vec![sent_status("broadcast-0", h0), sent_status("rollup-proof", h1)];
        let outcome = confirmer.confirm(&mut statuses).await;

        assert_eq!(outcome, ConfirmOutcome::AllConfirmed);
        assert!(statuses.iter().all(|s| s.confirmed));
    }

    #[tokio::test]
    async fn timeout_with_no_receipt_aborts() {
        let h0 = TxHash::repeat_byte(1);
        let mut receipts = HashMap::new();
        receipts.insert(h0, Ok(None));
        let client = ScriptedClient { receipts: Mutex::new(receipts) };
        let interrupt = InterruptHandle::new();
        let confirmer = ReceiptConfirmer::new(&client, &interrupt, Duration::from_secs(300), Duration::from_millis(5));

        let mut statuses = vec![sent_status("rollup-proof", h0)];
        let outcome = confirmer.confirm(&mut statuses).await;
        assert_eq!(outcome, ConfirmOutcome::Abort);
    }

    #[tokio::test]
    async fn incorrect_state_hash_revert_aborts_immediately() {
        let h0 = TxHash::repeat_byte(1);
        let mut receipts = HashMap::new();
        receipts.insert(
            h0,
            Ok(Some(ReceiptOutcome {
                status: false,
                revert: Some(RevertInfo {
                    name: INCORRECT_STATE_HASH.to_string(),
                    params: vec![],
                }),
            })),
        );
        let client = ScriptedClient { receipts: Mutex::new(receipts) };
        let interrupt = InterruptHandle::new();
        let confirmer = ReceiptConfirmer::new(&client, &interrupt, Duration::from_secs(300), Duration::from_millis(5));

        let mut statuses = vec![sent_status("rollup-proof", h0)];
        let outcome = confirmer.confirm(&mut statuses).await;
        assert_eq!(outcome, ConfirmOutcome::Abort);
        assert!(!statuses[0].confirmed);
    }

    #[tokio::test]
    async fn non_fatal_revert_returns_retry_and_leaves_entry_unconfirmed() {
        let h0 = TxHash::repeat_byte(1);
        let mut receipts = HashMap::new();
        receipts.insert(
            h0,
            Ok(Some(ReceiptOutcome {
                status: false,
                revert: Some(RevertInfo {
                    name: "OTHER_ERROR".to_string(),
                    params: vec![],
                }),
            })),
        );
        let client = ScriptedClient { receipts: Mutex::new(receipts) };
        let interrupt = InterruptHandle::new();
        let confirmer = ReceiptConfirmer::new(&client, &interrupt, Duration::from_secs(300), Duration::from_millis(5));

        let mut statuses = vec![sent_status("rollup-proof", h0)];
        let outcome = confirmer.confirm(&mut statuses).await;
        assert_eq!(outcome, ConfirmOutcome::Retry);
        assert!(!statuses[0].confirmed);
        // The mined-but-reverted hash is cleared so the submitter
        // assigns this entry a fresh nonce next round.
        assert_eq!(statuses[0].tx_hash, None);
    }

    /// A non-fatal revert on a non-last entry must only clear that
    /// entry's hash; entries later in the list that this pass never
    /// reached must keep theirs untouched, so the submitter doesn't
    /// treat them as needing a resend.
    #[tokio::test]
    async fn non_fatal_revert_on_non_last_entry_leaves_unreached_entries_hash_intact() {
        let h0 = TxHash::repeat_byte(1);
        let h1 = TxHash::repeat_byte(2);
        let mut receipts = HashMap::new();
        receipts.insert(
            h0,
            Ok(Some(ReceiptOutcome {
                status: false,
                revert: Some(RevertInfo { name: "OTHER_ERROR".to_string(), params: vec![] }),
            })),
        );
        let client = ScriptedClient { receipts: Mutex::new(receipts) };
        let interrupt = InterruptHandle::new();
        let confirmer = ReceiptConfirmer::new(&client, &interrupt, Duration::from_secs(300), Duration::from_millis(5));

        let mut statuses = vec![sent_status("broadcast-0", h0), sent_status("broadcast-1", h1), sent_status("rollup-proof", h1)];
        let outcome = confirmer.confirm(&mut statuses).await;

        assert_eq!(outcome, ConfirmOutcome::Retry);
        assert_eq!(statuses[0].tx_hash, None);
        assert!(!statuses[0].confirmed);
        // broadcast-1 and rollup-proof were never reached this pass —
        // their hashes must survive untouched.
        assert_eq!(statuses[1].tx_hash, Some(h1));
        assert!(!statuses[1].confirmed);
        assert_eq!(statuses[2].tx_hash, Some(h1));
        assert!(!statuses[2].confirmed);
    }

    #[tokio::test]
    async fn already_confirmed_entries_are_not_re_polled() {
        let client = ScriptedClient { receipts: Mutex::new(HashMap::new()) };
        let interrupt = InterruptHandle::new();
        let confirmer = ReceiptConfirmer::new(&client, &interrupt, Duration::from_secs(300), Duration::from_millis(5));

        let mut confirmed = sent_status("broadcast-0", TxHash::repeat_byte(9));
        confirmed.confirmed = true;
        let mut statuses = vec![confirmed];
        let outcome = confirmer.confirm(&mut statuses).await;
        assert_eq!(outcome, ConfirmOutcome::AllConfirmed);
    }
}
