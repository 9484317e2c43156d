//! Error types for the agent wallet service

use thiserror::Error;

/// Main error type for the wallet service
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Chain connection error: {0}")]
    ChainConnection(String),

    #[error("Fee estimation failed after retry: {0}")]
    Estimation(String),

    #[error("Remote signer reported failure for ticket {ticket}: {reason}")]
    SigningFailed { ticket: String, reason: String },

    #[error("Signature for ticket {ticket} still pending after {polls} polls")]
    SigningTimeout { ticket: String, polls: u32 },

    #[error("Broadcast rejected by node: {reason}")]
    BroadcastRejected { reason: String },

    #[error("Broadcast outcome unknown, re-query account state before retrying: {reason}")]
    BroadcastAmbiguous { reason: String },

    #[error("Timed out waiting for receipt of {tx_hash}")]
    ConfirmationTimeout { tx_hash: String },

    #[error("Transaction {tx_hash} reverted on chain")]
    TransactionFailed { tx_hash: String },

    #[error("Signer transport error: {0}")]
    Signer(String),

    #[error("Action error: {0}")]
    Action(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WalletError {
    /// Check if the operation can be retried as-is by the caller
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WalletError::ChainConnection(_)
                | WalletError::Estimation(_)
                | WalletError::SigningTimeout { .. }
                | WalletError::Signer(_)
                | WalletError::ConfirmationTimeout { .. }
        )
    }

    /// Check if the error leaves the account's nonce state in doubt.
    ///
    /// When this returns true the caller must re-query the chain before
    /// resubmitting; the submission may already be in the mempool.
    pub fn nonce_state_unknown(&self) -> bool {
        matches!(self, WalletError::BroadcastAmbiguous { .. })
    }
}

/// Result type for wallet operations
pub type WalletResult<T> = Result<T, WalletError>;
