//! Nonce-ordered submission lanes
//!
//! One FIFO lane per account. A lane's lock covers resolve nonce -> build ->
//! sign -> broadcast and nothing else: waiting for a receipt happens outside
//! the lane, so the next submission can start building as soon as the
//! previous one is in the mempool.
//!
//! Nonce bookkeeping invariants:
//! - the local counter only advances after a successful broadcast, so a
//!   build or signing failure leaves the nonce free for the next caller;
//! - an ambiguous broadcast clears the cached counter instead of rolling it
//!   back, forcing the next submission to re-query the chain.

use super::{SignedTransaction, SubmissionRequest, TransactionBuilder};
use crate::chain::ChainRpc;
use crate::confirm::ReceiptConfirmer;
use crate::error::{WalletError, WalletResult};
use crate::signer::SignaturePoller;

use dashmap::DashMap;
use ethers::types::{Address, H256};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Per-account lane state, guarded by the lane lock
#[derive(Default)]
struct LaneState {
    /// Next nonce to hand out; None forces an on-chain re-query
    next_nonce: Option<u64>,
}

/// Serializes build-through-broadcast per account while leaving
/// confirmation waits unconstrained
pub struct SubmissionQueue {
    chain: Arc<dyn ChainRpc>,
    builder: Arc<TransactionBuilder>,
    poller: Arc<SignaturePoller>,
    confirmer: Arc<ReceiptConfirmer>,
    // tokio's Mutex queues waiters fairly, which is what makes lane order
    // equal lock-acquisition order
    lanes: DashMap<Address, Arc<Mutex<LaneState>>>,
}

impl SubmissionQueue {
    pub fn new(
        chain: Arc<dyn ChainRpc>,
        builder: Arc<TransactionBuilder>,
        poller: Arc<SignaturePoller>,
        confirmer: Arc<ReceiptConfirmer>,
    ) -> Self {
        Self {
            chain,
            builder,
            poller,
            confirmer,
            lanes: DashMap::new(),
        }
    }

    fn lane(&self, account: Address) -> Arc<Mutex<LaneState>> {
        self.lanes
            .entry(account)
            .or_insert_with(|| Arc::new(Mutex::new(LaneState::default())))
            .clone()
    }

    /// Submit a transaction through the account's lane.
    ///
    /// Returns as soon as the transaction is broadcast; the hash can be
    /// handed to the confirmer to wait for mining. Dropping this future
    /// before broadcast leaves the lane consistent (the nonce has not
    /// advanced) but may orphan an in-flight signing ticket.
    pub async fn submit(&self, request: &SubmissionRequest) -> WalletResult<H256> {
        let account = request.from;
        let lane = self.lane(account);
        let mut state = lane.lock().await;

        crate::metrics::record_submission(account);

        // Resolve: on-chain pending count, bumped past anything we already
        // broadcast that the node has not seen yet
        let on_chain = self.chain.get_transaction_count(account).await?;
        let nonce = state.next_nonce.map_or(on_chain, |n| n.max(on_chain));

        let unsigned = self.builder.build(request, nonce).await.map_err(|e| {
            crate::metrics::record_stage_failure(account, "build");
            e
        })?;

        let signed: SignedTransaction =
            self.poller.sign_transaction(&unsigned).await.map_err(|e| {
                crate::metrics::record_stage_failure(account, "sign");
                e
            })?;

        match self.chain.broadcast_raw_transaction(signed.raw.clone()).await {
            Ok(hash) => {
                state.next_nonce = Some(nonce + 1);
                debug!(
                    "Broadcast {:?} for {:?} at nonce {}, lane advanced to {}",
                    hash,
                    account,
                    nonce,
                    nonce + 1
                );
                self.confirmer.track(hash);
                crate::metrics::record_broadcast(account);
                Ok(hash)
            }
            Err(e @ WalletError::BroadcastAmbiguous { .. }) => {
                // The node may have accepted it anyway. Do not roll back;
                // the next submission must re-query the chain.
                warn!(
                    "Ambiguous broadcast for {:?} at nonce {}, lane will re-sync: {}",
                    account, nonce, e
                );
                state.next_nonce = None;
                crate::metrics::record_stage_failure(account, "broadcast");
                Err(e)
            }
            Err(e @ WalletError::BroadcastRejected { .. }) => {
                // Definitive refusal: the nonce was not consumed. A
                // nonce-too-low refusal additionally proves our counter is
                // stale, so drop it.
                if e.to_string().contains("nonce too low") {
                    state.next_nonce = None;
                }
                warn!(
                    "Broadcast rejected for {:?} at nonce {}: {}",
                    account, nonce, e
                );
                crate::metrics::record_stage_failure(account, "broadcast");
                Err(e)
            }
            Err(e) => {
                crate::metrics::record_stage_failure(account, "broadcast");
                Err(e)
            }
        }
    }

    /// Number of accounts with a lane allocated
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }
}
