//! Receipt confirmation for broadcast transactions
//!
//! Confirmation is deliberately decoupled from the submission lanes: any
//! number of waits can run at once, and an abandoned wait changes nothing
//! about the transaction's on-chain fate or the lane's nonce state.

use crate::chain::ChainRpc;
use crate::error::{WalletError, WalletResult};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use ethers::types::H256;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Confirmation state of a broadcast transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConfirmationState {
    Broadcast,
    Confirmed {
        block_number: u64,
        gas_used: Option<u64>,
    },
    Failed,
    TimedOut,
}

impl ConfirmationState {
    fn is_terminal(&self) -> bool {
        !matches!(self, ConfirmationState::Broadcast)
    }
}

/// Record of a broadcast transaction in the process-wide pending set
#[derive(Debug, Clone, Serialize)]
pub struct TransactionRecord {
    pub hash: H256,
    pub submitted_at: DateTime<Utc>,
    #[serde(flatten)]
    pub state: ConfirmationState,
}

/// Polls the chain for mined receipts of broadcast transactions
pub struct ReceiptConfirmer {
    chain: Arc<dyn ChainRpc>,
    poll_interval: Duration,
    pending: DashMap<H256, TransactionRecord>,
}

impl ReceiptConfirmer {
    pub fn new(chain: Arc<dyn ChainRpc>, poll_interval: Duration) -> Self {
        Self {
            chain,
            poll_interval,
            pending: DashMap::new(),
        }
    }

    /// Register a freshly broadcast hash in the pending set
    pub fn track(&self, hash: H256) {
        self.pending.insert(
            hash,
            TransactionRecord {
                hash,
                submitted_at: Utc::now(),
                state: ConfirmationState::Broadcast,
            },
        );
        debug!("Tracking {:?} for confirmation", hash);
    }

    /// Look up the current record for a hash, if tracked
    pub fn get(&self, hash: H256) -> Option<TransactionRecord> {
        self.pending.get(&hash).map(|r| r.clone())
    }

    /// Wait until the transaction is mined, reverted, or the timeout passes.
    ///
    /// Timing out here leaves the transaction alone: it may still be mined
    /// later, and the record stays queryable until pruned.
    pub async fn wait_for_confirmation(
        &self,
        hash: H256,
        timeout: Duration,
    ) -> WalletResult<TransactionRecord> {
        if !self.pending.contains_key(&hash) {
            // External hash: start tracking so the record is queryable
            self.track(hash);
        }

        let started = tokio::time::Instant::now();
        let deadline = started + timeout;

        loop {
            if let Some(receipt) = self.chain.get_transaction_receipt(hash).await? {
                let record = if receipt.status == Some(1.into()) {
                    let state = ConfirmationState::Confirmed {
                        block_number: receipt.block_number.map(|b| b.as_u64()).unwrap_or_default(),
                        gas_used: receipt.gas_used.map(|g| g.as_u64()),
                    };
                    info!(
                        "Transaction {:?} confirmed in block {:?}",
                        hash, receipt.block_number
                    );
                    crate::metrics::record_confirmation("confirmed");
                    crate::metrics::observe_confirmation_wait(started.elapsed().as_secs_f64());
                    self.update_state(hash, state)
                } else {
                    warn!("Transaction {:?} reverted", hash);
                    crate::metrics::record_confirmation("reverted");
                    self.update_state(hash, ConfirmationState::Failed);
                    return Err(WalletError::TransactionFailed {
                        tx_hash: format!("{:?}", hash),
                    });
                };
                return Ok(record);
            }

            if tokio::time::Instant::now() >= deadline {
                warn!(
                    "No receipt for {:?} after {:?}, abandoning wait",
                    hash, timeout
                );
                crate::metrics::record_confirmation("timed_out");
                self.update_state(hash, ConfirmationState::TimedOut);
                return Err(WalletError::ConfirmationTimeout {
                    tx_hash: format!("{:?}", hash),
                });
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    fn update_state(&self, hash: H256, state: ConfirmationState) -> TransactionRecord {
        let mut entry = self.pending.entry(hash).or_insert(TransactionRecord {
            hash,
            submitted_at: Utc::now(),
            state: ConfirmationState::Broadcast,
        });
        entry.state = state;
        entry.clone()
    }

    /// Drop terminal records older than `max_age` (call periodically)
    pub fn prune(&self, max_age: chrono::Duration) {
        let cutoff = Utc::now() - max_age;
        let before = self.pending.len();
        self.pending
            .retain(|_, record| !record.state.is_terminal() || record.submitted_at > cutoff);
        let removed = before - self.pending.len();
        if removed > 0 {
            debug!("Pruned {} confirmation records", removed);
        }
    }

    /// Number of tracked records
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
