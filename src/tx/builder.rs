//! Transaction builder - assembles unsigned EIP-1559 transactions
//!
//! Pure with respect to queue state: nonce assignment belongs to the
//! submission lane, the builder only fills in what the request left unset.

use super::SubmissionRequest;
use crate::chain::{ChainRpc, FeeEstimate};
use crate::error::{WalletError, WalletResult};

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Eip1559TransactionRequest, U256};
use std::sync::Arc;
use tracing::debug;

/// Buffer applied on top of the node's gas estimate
const GAS_LIMIT_BUFFER_PERCENT: u64 = 20;

/// Assembles unsigned transactions, querying the chain for anything the
/// request does not pin down
pub struct TransactionBuilder {
    chain: Arc<dyn ChainRpc>,
    chain_id: u64,
}

impl TransactionBuilder {
    pub fn new(chain: Arc<dyn ChainRpc>) -> Self {
        let chain_id = chain.chain_id();
        Self { chain, chain_id }
    }

    /// Build an unsigned transaction for the given request and nonce
    pub async fn build(
        &self,
        request: &SubmissionRequest,
        nonce: u64,
    ) -> WalletResult<TypedTransaction> {
        let mut tx = Eip1559TransactionRequest::new()
            .from(request.from)
            .to(request.to)
            .data(request.data.clone())
            .value(request.value.unwrap_or_default())
            .nonce(nonce)
            .chain_id(self.chain_id);

        let (max_fee, priority_fee) =
            match (request.max_fee_per_gas, request.max_priority_fee_per_gas) {
                (Some(max_fee), Some(priority_fee)) => (max_fee, priority_fee),
                _ => {
                    let estimate = self.estimate_fees_with_retry().await?;
                    (
                        request.max_fee_per_gas.unwrap_or(estimate.max_fee_per_gas),
                        request
                            .max_priority_fee_per_gas
                            .unwrap_or(estimate.max_priority_fee_per_gas),
                    )
                }
            };
        tx = tx
            .max_fee_per_gas(max_fee)
            .max_priority_fee_per_gas(priority_fee);

        let gas = match request.gas {
            Some(gas) => gas,
            None => {
                let estimate = self
                    .estimate_gas_with_retry(&TypedTransaction::Eip1559(tx.clone()))
                    .await?;
                estimate + estimate * GAS_LIMIT_BUFFER_PERCENT / 100
            }
        };
        tx = tx.gas(gas);

        debug!(
            "Built transaction for {:?}: nonce {}, gas {}, max fee {}",
            request.from, nonce, gas, max_fee
        );

        Ok(TypedTransaction::Eip1559(tx))
    }

    /// One retry on fee estimation; two consecutive failures surface as an
    /// estimation error
    async fn estimate_fees_with_retry(&self) -> WalletResult<FeeEstimate> {
        match self.chain.estimate_fees().await {
            Ok(estimate) => Ok(estimate),
            Err(first) => {
                debug!("Fee estimation failed, retrying once: {}", first);
                self.chain
                    .estimate_fees()
                    .await
                    .map_err(|e| WalletError::Estimation(e.to_string()))
            }
        }
    }

    async fn estimate_gas_with_retry(&self, tx: &TypedTransaction) -> WalletResult<U256> {
        match self.chain.estimate_gas(tx).await {
            Ok(gas) => Ok(gas),
            Err(first) => {
                debug!("Gas estimation failed, retrying once: {}", first);
                self.chain
                    .estimate_gas(tx)
                    .await
                    .map_err(|e| WalletError::Estimation(e.to_string()))
            }
        }
    }
}
