//! Shared test doubles for the submission pipeline
//!
//! `StubChain` is a scripted in-memory chain; `ScriptedSigner` is a remote
//! signer backed by a real local key so signatures verify end to end.

use crate::chain::{ChainRpc, FeeEstimate};
use crate::confirm::ReceiptConfirmer;
use crate::error::{WalletError, WalletResult};
use crate::network;
use crate::signer::{RemoteSigner, SignaturePoller, SignatureStatus, TicketId};
use crate::tx::{SubmissionQueue, TransactionBuilder};
use crate::wallet::WalletService;

use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{
    Address, Bytes, NameOrAddress, Signature, TransactionReceipt, H256, U256,
};
use ethers::utils::keccak256;
use ethers::utils::rlp::Rlp;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TEST_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

// ---------------------------------------------------------------------------
// StubChain
// ---------------------------------------------------------------------------

/// Scripted chain: fixed fees, recorded broadcasts, injectable failures
pub struct StubChain {
    chain_id: u64,
    transaction_count: AtomicU64,
    count_queries: AtomicU64,
    broadcasts: Mutex<Vec<Bytes>>,
    broadcast_failures: Mutex<VecDeque<WalletError>>,
    receipts: Mutex<HashMap<H256, TransactionReceipt>>,
    receipt_misses: AtomicU64,
    auto_receipt: Mutex<Option<TransactionReceipt>>,
    call_result: Mutex<Bytes>,
}

impl StubChain {
    pub fn new(chain_id: u64, transaction_count: u64) -> Self {
        Self {
            chain_id,
            transaction_count: AtomicU64::new(transaction_count),
            count_queries: AtomicU64::new(0),
            broadcasts: Mutex::new(Vec::new()),
            broadcast_failures: Mutex::new(VecDeque::new()),
            receipts: Mutex::new(HashMap::new()),
            receipt_misses: AtomicU64::new(0),
            auto_receipt: Mutex::new(None),
            call_result: Mutex::new(Bytes::new()),
        }
    }

    pub fn set_transaction_count(&self, count: u64) {
        self.transaction_count.store(count, Ordering::SeqCst);
    }

    pub fn count_queries(&self) -> u64 {
        self.count_queries.load(Ordering::SeqCst)
    }

    pub fn push_broadcast_failure(&self, err: WalletError) {
        self.broadcast_failures.lock().unwrap().push_back(err);
    }

    pub fn set_receipt(&self, hash: H256, receipt: TransactionReceipt) {
        self.receipts.lock().unwrap().insert(hash, receipt);
    }

    /// Return None from the next `misses` receipt queries
    pub fn set_receipt_misses(&self, misses: u64) {
        self.receipt_misses.store(misses, Ordering::SeqCst);
    }

    /// Attach a receipt to whatever hash the next broadcast produces
    pub fn confirm_next_broadcast(&self, receipt: TransactionReceipt) {
        *self.auto_receipt.lock().unwrap() = Some(receipt);
    }

    pub fn set_call_result(&self, result: Bytes) {
        *self.call_result.lock().unwrap() = result;
    }

    pub fn broadcasts(&self) -> Vec<Bytes> {
        self.broadcasts.lock().unwrap().clone()
    }

    fn decoded(&self) -> Vec<TypedTransaction> {
        self.broadcasts()
            .iter()
            .map(|raw| TypedTransaction::decode_signed(&Rlp::new(raw)).unwrap().0)
            .collect()
    }

    pub fn broadcast_nonces(&self) -> Vec<u64> {
        self.decoded()
            .iter()
            .map(|tx| tx.nonce().unwrap().as_u64())
            .collect()
    }

    pub fn broadcast_values(&self) -> Vec<u64> {
        self.decoded()
            .iter()
            .map(|tx| tx.value().copied().unwrap_or_default().as_u64())
            .collect()
    }

    pub fn broadcast_destinations(&self) -> Vec<Address> {
        self.decoded()
            .iter()
            .map(|tx| match tx.to() {
                Some(NameOrAddress::Address(address)) => *address,
                other => panic!("unexpected destination: {:?}", other),
            })
            .collect()
    }
}

#[async_trait]
impl ChainRpc for StubChain {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn get_transaction_count(&self, _address: Address) -> WalletResult<u64> {
        self.count_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.transaction_count.load(Ordering::SeqCst))
    }

    async fn estimate_fees(&self) -> WalletResult<FeeEstimate> {
        Ok(FeeEstimate {
            max_fee_per_gas: U256::from(100_000_000_000u64),
            max_priority_fee_per_gas: U256::from(2_000_000_000u64),
        })
    }

    async fn estimate_gas(&self, _tx: &TypedTransaction) -> WalletResult<U256> {
        Ok(U256::from(21_000))
    }

    async fn broadcast_raw_transaction(&self, raw: Bytes) -> WalletResult<H256> {
        if let Some(err) = self.broadcast_failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        let hash = H256::from(keccak256(&raw));
        self.broadcasts.lock().unwrap().push(raw);

        if let Some(receipt) = self.auto_receipt.lock().unwrap().take() {
            self.receipts.lock().unwrap().insert(hash, receipt);
        }

        Ok(hash)
    }

    async fn get_transaction_receipt(
        &self,
        hash: H256,
    ) -> WalletResult<Option<TransactionReceipt>> {
        if self.receipt_misses.load(Ordering::SeqCst) > 0 {
            self.receipt_misses.fetch_sub(1, Ordering::SeqCst);
            return Ok(None);
        }
        Ok(self.receipts.lock().unwrap().get(&hash).cloned())
    }

    async fn call(&self, _tx: &TypedTransaction) -> WalletResult<Bytes> {
        Ok(self.call_result.lock().unwrap().clone())
    }

    async fn get_balance(&self, _address: Address) -> WalletResult<U256> {
        Ok(U256::from(1_000_000_000_000_000_000u64))
    }
}

// ---------------------------------------------------------------------------
// ScriptedSigner
// ---------------------------------------------------------------------------

struct TicketState {
    payload: H256,
    remaining_pending: u32,
    fail: bool,
}

struct SignerInner {
    wallet: LocalWallet,
    default_pending: u32,
    fail_all_reason: Option<String>,
    fail_nth_request: Option<u64>,
    never_complete: bool,
    pending_per_address: Mutex<HashMap<Address, u32>>,
    tickets: Mutex<HashMap<String, TicketState>>,
    request_calls: AtomicU64,
    status_calls: AtomicU64,
}

/// Remote signer with scripted status sequences, signing with a real key
#[derive(Clone)]
pub struct ScriptedSigner {
    inner: Arc<SignerInner>,
}

impl ScriptedSigner {
    fn build(
        default_pending: u32,
        fail_all_reason: Option<String>,
        fail_nth_request: Option<u64>,
        never_complete: bool,
    ) -> Self {
        Self {
            inner: Arc::new(SignerInner {
                wallet: TEST_KEY.parse().unwrap(),
                default_pending,
                fail_all_reason,
                fail_nth_request,
                never_complete,
                pending_per_address: Mutex::new(HashMap::new()),
                tickets: Mutex::new(HashMap::new()),
                request_calls: AtomicU64::new(0),
                status_calls: AtomicU64::new(0),
            }),
        }
    }

    /// Every ticket reports pending `polls` times, then completes
    pub fn completing_after(polls: u32) -> Self {
        Self::build(polls, None, None, false)
    }

    /// Every ticket fails on its first status poll
    pub fn failing(reason: &str) -> Self {
        Self::build(0, Some(reason.to_string()), None, false)
    }

    /// The n-th signature request (1-based) produces a failing ticket
    pub fn failing_nth(n: u64) -> Self {
        Self::build(1, None, Some(n), false)
    }

    /// Tickets never leave the pending state
    pub fn never_completing() -> Self {
        Self::build(0, None, None, true)
    }

    /// Override the pending-poll count for one account's tickets
    pub fn with_delay_for(self, address: Address, polls: u32) -> Self {
        self.inner
            .pending_per_address
            .lock()
            .unwrap()
            .insert(address, polls);
        self
    }

    pub fn wallet_address(&self) -> Address {
        self.inner.wallet.address()
    }

    pub fn request_calls(&self) -> u64 {
        self.inner.request_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> u64 {
        self.inner.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteSigner for ScriptedSigner {
    async fn request_signature(&self, address: Address, payload: H256) -> WalletResult<TicketId> {
        let n = self.inner.request_calls.fetch_add(1, Ordering::SeqCst) + 1;

        let remaining_pending = self
            .inner
            .pending_per_address
            .lock()
            .unwrap()
            .get(&address)
            .copied()
            .unwrap_or(self.inner.default_pending);

        let fail =
            self.inner.fail_all_reason.is_some() || self.inner.fail_nth_request == Some(n);

        let id = format!("ticket-{}", n);
        self.inner.tickets.lock().unwrap().insert(
            id.clone(),
            TicketState {
                payload,
                remaining_pending,
                fail,
            },
        );

        Ok(TicketId(id))
    }

    async fn signature_status(&self, ticket: &TicketId) -> WalletResult<SignatureStatus> {
        self.inner.status_calls.fetch_add(1, Ordering::SeqCst);

        if self.inner.never_complete {
            return Ok(SignatureStatus::Pending);
        }

        let mut tickets = self.inner.tickets.lock().unwrap();
        let state = tickets
            .get_mut(&ticket.0)
            .ok_or_else(|| WalletError::Signer(format!("Unknown ticket: {}", ticket)))?;

        if state.fail {
            let reason = self
                .inner
                .fail_all_reason
                .clone()
                .unwrap_or_else(|| "scripted failure".to_string());
            return Ok(SignatureStatus::Failed(reason));
        }

        if state.remaining_pending > 0 {
            state.remaining_pending -= 1;
            return Ok(SignatureStatus::Pending);
        }

        let signature: Signature = self
            .inner
            .wallet
            .sign_hash(state.payload)
            .map_err(|e| WalletError::Signer(e.to_string()))?;

        Ok(SignatureStatus::Completed(Bytes::from(signature.to_vec())))
    }
}

// ---------------------------------------------------------------------------
// Wiring helpers
// ---------------------------------------------------------------------------

pub fn test_queue(chain: Arc<StubChain>, signer: Arc<ScriptedSigner>) -> Arc<SubmissionQueue> {
    let chain: Arc<dyn ChainRpc> = chain;
    let builder = Arc::new(TransactionBuilder::new(chain.clone()));
    let poller = Arc::new(SignaturePoller::new(
        signer,
        Duration::from_millis(100),
        60,
    ));
    let confirmer = Arc::new(ReceiptConfirmer::new(
        chain.clone(),
        Duration::from_millis(500),
    ));
    Arc::new(SubmissionQueue::new(chain, builder, poller, confirmer))
}

pub fn test_wallet(chain: Arc<StubChain>, signer: Arc<ScriptedSigner>) -> WalletService {
    let address = signer.wallet_address();
    let chain: Arc<dyn ChainRpc> = chain;
    let builder = Arc::new(TransactionBuilder::new(chain.clone()));
    let poller = Arc::new(SignaturePoller::new(
        signer,
        Duration::from_millis(100),
        60,
    ));
    let confirmer = Arc::new(ReceiptConfirmer::new(
        chain.clone(),
        Duration::from_millis(500),
    ));
    let queue = Arc::new(SubmissionQueue::new(
        chain.clone(),
        builder,
        poller.clone(),
        confirmer.clone(),
    ));

    WalletService::new(
        address,
        network::network_from_id("base-sepolia").unwrap(),
        chain,
        queue,
        poller,
        confirmer,
        Duration::from_secs(10),
    )
}
