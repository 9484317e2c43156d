//! Chain module - RPC access used by the submission pipeline
//!
//! This module provides:
//! - The [`ChainRpc`] contract the pipeline depends on
//! - Multi-RPC provider management with automatic failover

pub mod provider;

pub use provider::ChainProvider;

use crate::error::WalletResult;

use async_trait::async_trait;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256};

/// EIP-1559 fee estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeEstimate {
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
}

/// RPC operations the submission pipeline needs from a chain.
///
/// Everything here is read-only external state except
/// `broadcast_raw_transaction`, which is deliberately single-shot: the
/// pipeline never retries a broadcast on its own.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainRpc: Send + Sync {
    fn chain_id(&self) -> u64;

    /// Pending-inclusive transaction count for an account
    async fn get_transaction_count(&self, address: Address) -> WalletResult<u64>;

    /// Current fee estimate for an EIP-1559 transaction
    async fn estimate_fees(&self) -> WalletResult<FeeEstimate>;

    /// Gas limit estimate for a prepared transaction
    async fn estimate_gas(&self, tx: &TypedTransaction) -> WalletResult<U256>;

    /// Submit a signed raw transaction to the network
    async fn broadcast_raw_transaction(&self, raw: Bytes) -> WalletResult<H256>;

    /// Receipt for a mined transaction, None while still pending
    async fn get_transaction_receipt(
        &self,
        hash: H256,
    ) -> WalletResult<Option<TransactionReceipt>>;

    /// Read-only contract call
    async fn call(&self, tx: &TypedTransaction) -> WalletResult<Bytes>;

    /// Native balance of an account
    async fn get_balance(&self, address: Address) -> WalletResult<U256>;
}
