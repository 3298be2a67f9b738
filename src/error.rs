use thiserror::Error;

/// Errors raised by the external chain client collaborator.
///
/// These never escape the publisher: every call site that can produce
/// one folds it into the retry loop (see `gate`, `submitter`, `confirmer`).
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("rpc call failed: {0}")]
    Rpc(String),

    #[error("transaction send rejected: {0}")]
    SendRejected(String),

    #[error("receipt poll timed out after {0}s")]
    ReceiptTimeout(u64),
}

/// Errors raised while building the submission unit, before any
/// on-chain interaction starts. Unlike `ChainError` these are not part
/// of the retry loop — batch construction is assumed to either succeed
/// or indicate a problem the coordinator must fix before retrying.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("chain client failed to build batch: {0}")]
    Chain(#[from] ChainError),

    #[error("rollup database rejected callData write: {0}")]
    Database(String),
}
