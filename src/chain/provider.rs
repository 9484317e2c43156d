//! Chain provider with multi-RPC support and automatic failover

use crate::chain::{ChainRpc, FeeEstimate};
use crate::config::ChainConfig;
use crate::error::{WalletError, WalletResult};

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::providers::{Http, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Default priority fee when the chain gives us nothing better (2 gwei)
const DEFAULT_PRIORITY_FEE: u64 = 2_000_000_000;

/// Multi-provider wrapper with automatic failover for reads.
///
/// Broadcast is single-shot on the current provider: retrying a broadcast
/// across providers risks double submission.
pub struct ChainProvider {
    config: ChainConfig,
    http_providers: Vec<Provider<Http>>,
    current_provider: AtomicUsize,
}

impl ChainProvider {
    /// Create a new chain provider
    pub fn new(config: ChainConfig) -> WalletResult<Self> {
        let mut http_providers = Vec::new();

        for url in &config.rpc_urls {
            match Provider::<Http>::try_from(url.as_str()) {
                Ok(provider) => {
                    let provider = provider.interval(Duration::from_millis(100));
                    http_providers.push(provider);
                    debug!("Added HTTP provider for chain {}: {}", config.chain_id, url);
                }
                Err(e) => {
                    warn!("Failed to create provider for {}: {}", url, e);
                }
            }
        }

        if http_providers.is_empty() {
            return Err(WalletError::Config("No valid RPC providers".to_string()));
        }

        Ok(Self {
            config,
            http_providers,
            current_provider: AtomicUsize::new(0),
        })
    }

    /// Get the active HTTP provider
    fn http(&self) -> &Provider<Http> {
        let idx = self.current_provider.load(Ordering::Relaxed);
        &self.http_providers[idx % self.http_providers.len()]
    }

    /// Switch to next available provider
    fn failover(&self) {
        let current = self.current_provider.load(Ordering::Relaxed);
        let next = (current + 1) % self.http_providers.len();
        self.current_provider.store(next, Ordering::Relaxed);
        warn!("Chain {} failover to provider {}", self.config.chain_id, next);
    }

    /// Run a read against each provider in turn until one answers
    async fn with_failover<T, F, Fut>(&self, operation: &str, f: F) -> WalletResult<T>
    where
        F: Fn(Provider<Http>) -> Fut,
        Fut: std::future::Future<Output = Result<T, ProviderError>>,
    {
        for _ in 0..self.http_providers.len() {
            match f(self.http().clone()).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(
                        "{} failed on chain {}: {}",
                        operation, self.config.chain_id, e
                    );
                    self.failover();
                }
            }
        }

        Err(WalletError::ChainConnection(format!(
            "All providers failed: {}",
            operation
        )))
    }

    /// Estimate EIP-1559 fees from the latest block base fee
    async fn estimate_eip1559_fees(&self) -> WalletResult<FeeEstimate> {
        let block = self
            .with_failover("get latest block", |p| async move {
                p.get_block(BlockNumber::Latest).await
            })
            .await?
            .ok_or_else(|| WalletError::ChainConnection("No latest block".to_string()))?;

        let base_fee = block
            .base_fee_per_gas
            .ok_or_else(|| WalletError::Estimation("No base fee in block".to_string()))?;

        let priority_fee = U256::from(DEFAULT_PRIORITY_FEE);

        // Max fee = 2 * base_fee + priority_fee (buffer for block variability)
        let max_fee = base_fee * 2 + priority_fee;

        // Cap at configured max
        let max_gwei =
            U256::from(self.config.max_gas_price_gwei) * U256::from(1_000_000_000u64);
        let max_fee = std::cmp::min(max_fee, max_gwei);

        Ok(FeeEstimate {
            max_fee_per_gas: max_fee,
            max_priority_fee_per_gas: priority_fee,
        })
    }
}

#[async_trait]
impl ChainRpc for ChainProvider {
    fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    async fn get_transaction_count(&self, address: Address) -> WalletResult<u64> {
        let count = self
            .with_failover("get transaction count", move |p| async move {
                p.get_transaction_count(address, Some(BlockNumber::Pending.into()))
                    .await
            })
            .await?;
        Ok(count.as_u64())
    }

    async fn estimate_fees(&self) -> WalletResult<FeeEstimate> {
        self.estimate_eip1559_fees().await
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> WalletResult<U256> {
        let tx = tx.clone();
        self.with_failover("estimate gas", move |p| {
            let tx = tx.clone();
            async move { p.estimate_gas(&tx, None).await }
        })
        .await
        .map_err(|e| WalletError::Estimation(e.to_string()))
    }

    async fn broadcast_raw_transaction(&self, raw: Bytes) -> WalletResult<H256> {
        let send = timeout(
            self.config.broadcast_timeout(),
            self.http().send_raw_transaction(raw),
        )
        .await;

        match send {
            Err(_) => Err(WalletError::BroadcastAmbiguous {
                reason: "broadcast timed out".to_string(),
            }),
            Ok(Err(e)) => {
                let reason = e.to_string();
                if is_definitive_rejection(&reason) {
                    Err(WalletError::BroadcastRejected { reason })
                } else {
                    Err(WalletError::BroadcastAmbiguous { reason })
                }
            }
            Ok(Ok(pending)) => {
                let hash = pending.tx_hash();
                debug!("Broadcast accepted on chain {}: {:?}", self.config.chain_id, hash);
                Ok(hash)
            }
        }
    }

    async fn get_transaction_receipt(
        &self,
        hash: H256,
    ) -> WalletResult<Option<TransactionReceipt>> {
        self.with_failover("get transaction receipt", move |p| async move {
            p.get_transaction_receipt(hash).await
        })
        .await
    }

    async fn call(&self, tx: &TypedTransaction) -> WalletResult<Bytes> {
        let tx = tx.clone();
        self.with_failover("eth_call", move |p| {
            let tx = tx.clone();
            async move { p.call(&tx, None).await }
        })
        .await
    }

    async fn get_balance(&self, address: Address) -> WalletResult<U256> {
        self.with_failover("get balance", move |p| async move {
            p.get_balance(address, None).await
        })
        .await
    }
}

/// Node error messages that prove the transaction was examined and refused.
///
/// Anything not in this set is treated as ambiguous: the node may still have
/// accepted the transaction into its pool.
fn is_definitive_rejection(message: &str) -> bool {
    const REJECTIONS: [&str; 6] = [
        "nonce too low",
        "insufficient funds",
        "replacement transaction underpriced",
        "intrinsic gas too low",
        "exceeds block gas limit",
        "invalid sender",
    ];

    let lower = message.to_lowercase();
    REJECTIONS.iter().any(|r| lower.contains(r))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_classification() {
        assert!(is_definitive_rejection(
            "JsonRpcError: nonce too low: next nonce 7, tx nonce 5"
        ));
        assert!(is_definitive_rejection(
            "Insufficient funds for gas * price + value"
        ));
        assert!(!is_definitive_rejection("connection reset by peer"));
        assert!(!is_definitive_rejection("request timed out"));
    }
}
