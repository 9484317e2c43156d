//! Transaction submission pipeline
//!
//! A submission travels: lane lock -> nonce resolve -> build -> sign ->
//! broadcast -> lane release. Receipt confirmation happens outside the lane
//! and never blocks the next submission.

pub mod builder;
pub mod lane;

pub use builder::TransactionBuilder;
pub use lane::SubmissionQueue;

use ethers::types::{Address, Bytes, H256, U256};

/// A logical "send this transaction" request. Immutable once created;
/// unset fee fields are resolved from the chain at build time.
#[derive(Debug, Clone, Default)]
pub struct SubmissionRequest {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    /// Native value in wei; treated as zero when absent
    pub value: Option<U256>,
    pub gas: Option<U256>,
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
}

/// RLP-encoded signed transaction, ready for broadcast. Produced once,
/// consumed by exactly one broadcast attempt.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub raw: Bytes,
    pub hash: H256,
}
