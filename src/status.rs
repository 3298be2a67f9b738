//! The per-transaction status list: the one piece of mutable state a
//! `publish` call owns for its lifetime.

use ethers::types::{Bytes, TxHash};

/// One transaction in a batch. Order in the owning `Vec` is invariant:
/// broadcast-data transactions first in original order, the
/// rollup-proof transaction last.
#[derive(Debug, Clone)]
pub struct TxStatus {
    pub name: String,
    pub payload: Bytes,
    pub tx_hash: Option<TxHash>,
    pub confirmed: bool,
}

impl TxStatus {
    pub fn new(name: impl Into<String>, payload: Bytes) -> Self {
        Self {
            name: name.into(),
            payload,
            tx_hash: None,
            confirmed: false,
        }
    }

    pub fn is_sent(&self) -> bool {
        self.tx_hash.is_some()
    }
}

/// Builds the ordered status list from a built submission unit:
/// broadcast transactions first (in their given order), then the
/// rollup-proof transaction last. This ordering is what encodes the
/// nonce-assignment policy for the rest of the publisher.
pub fn build_statuses(proof_tx: Bytes, broadcast_txs: Vec<Bytes>) -> Vec<TxStatus> {
    let mut statuses: Vec<TxStatus> = broadcast_txs
        .into_iter()
        .enumerate()
        .map(|(i, payload)| TxStatus::new(format!("broadcast-{i}"), payload))
        .collect();
    statuses.push(TxStatus::new("rollup-proof", proof_tx));
    statuses
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::Bytes;

    #[test]
    fn proof_tx_is_always_last() {
        let statuses = build_statuses(
            Bytes::from(vec![0xAA]),
            vec![Bytes::from(vec![0x01]), Bytes::from(vec![0x02])],
        );
        assert_eq!(statuses.len(), 3);
        assert_eq!(statuses[2].name, "rollup-proof");
        assert_eq!(statuses[0].name, "broadcast-0");
        assert_eq!(statuses[1].name, "broadcast-1");
    }

    #[test]
    fn zero_broadcast_transactions_is_just_the_proof_tx() {
        let statuses = build_statuses(Bytes::from(vec![0xAA]), vec![]);
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].name, "rollup-proof");
    }
}
