//! Wallet facade - the surface action providers call
//!
//! Composes the chain provider, signature poller, submission lanes and
//! receipt confirmer. Transactions go through the account lane; message and
//! typed-data signing go straight to the signer since they consume no nonce.

use crate::chain::ChainRpc;
use crate::confirm::{ReceiptConfirmer, TransactionRecord};
use crate::error::WalletResult;
use crate::network::Network;
use crate::signer::SignaturePoller;
use crate::tx::{SubmissionQueue, SubmissionRequest};

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::transaction::eip712::{Eip712, TypedData};
use ethers::types::{Address, Bytes, Eip1559TransactionRequest, Signature, H256, U256};
use ethers::utils::{hash_message, id};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Provider name reported to callers
const PROVIDER_NAME: &str = "agent_wallet";

/// Public wallet surface composed over the submission pipeline
pub struct WalletService {
    address: Address,
    network: Network,
    chain: Arc<dyn ChainRpc>,
    queue: Arc<SubmissionQueue>,
    poller: Arc<SignaturePoller>,
    confirmer: Arc<ReceiptConfirmer>,
    confirmation_timeout: Duration,
}

impl WalletService {
    pub fn new(
        address: Address,
        network: Network,
        chain: Arc<dyn ChainRpc>,
        queue: Arc<SubmissionQueue>,
        poller: Arc<SignaturePoller>,
        confirmer: Arc<ReceiptConfirmer>,
        confirmation_timeout: Duration,
    ) -> Self {
        info!(
            "Wallet service for {:?} on {} (chain {})",
            address, network.network_id, network.chain_id
        );
        Self {
            address,
            network,
            chain,
            queue,
            poller,
            confirmer,
            confirmation_timeout,
        }
    }

    pub fn get_name(&self) -> &'static str {
        PROVIDER_NAME
    }

    pub fn get_address(&self) -> Address {
        self.address
    }

    pub fn get_network(&self) -> &Network {
        &self.network
    }

    pub async fn get_balance(&self) -> WalletResult<U256> {
        self.chain.get_balance(self.address).await
    }

    /// Queue a transaction through this account's lane and return its hash
    /// as soon as it is broadcast
    pub async fn send_transaction(&self, request: SubmissionRequest) -> WalletResult<H256> {
        let request = SubmissionRequest {
            from: self.address,
            ..request
        };
        self.queue.submit(&request).await
    }

    /// Queue a transaction and block until it is mined (or the configured
    /// confirmation timeout passes)
    pub async fn send_transaction_and_wait(
        &self,
        request: SubmissionRequest,
    ) -> WalletResult<TransactionRecord> {
        let hash = self.send_transaction(request).await?;
        self.wait_for_confirmation(hash).await
    }

    /// Wait for a previously broadcast transaction to be mined
    pub async fn wait_for_confirmation(&self, hash: H256) -> WalletResult<TransactionRecord> {
        self.confirmer
            .wait_for_confirmation(hash, self.confirmation_timeout)
            .await
    }

    /// Look up the tracked record for a hash, if any
    pub fn transaction_record(&self, hash: H256) -> Option<TransactionRecord> {
        self.confirmer.get(hash)
    }

    /// Accounts with a submission lane allocated
    pub fn active_lanes(&self) -> usize {
        self.queue.lane_count()
    }

    /// Broadcast transactions currently tracked for confirmation
    pub fn tracked_transactions(&self) -> usize {
        self.confirmer.pending_count()
    }

    /// Transfer native currency
    pub async fn native_transfer(&self, to: Address, value_wei: U256) -> WalletResult<H256> {
        self.send_transaction(SubmissionRequest {
            to,
            value: Some(value_wei),
            ..Default::default()
        })
        .await
    }

    /// Transfer an ERC-20 token held by this account
    pub async fn erc20_transfer(
        &self,
        token: Address,
        to: Address,
        amount: U256,
    ) -> WalletResult<H256> {
        self.send_transaction(SubmissionRequest {
            to: token,
            data: erc20_transfer_calldata(to, amount),
            ..Default::default()
        })
        .await
    }

    /// Read-only contract call; consumes no nonce and bypasses the lane
    pub async fn read_contract(&self, to: Address, data: Bytes) -> WalletResult<Bytes> {
        let tx = Eip1559TransactionRequest::new().to(to).data(data);
        self.chain.call(&TypedTransaction::Eip1559(tx)).await
    }

    /// Sign an EIP-191 message; consumes no nonce and bypasses the lane
    pub async fn sign_message(&self, message: &str) -> WalletResult<Signature> {
        self.poller
            .sign_payload(self.address, hash_message(message))
            .await
    }

    /// Sign EIP-712 typed data; consumes no nonce and bypasses the lane
    pub async fn sign_typed_data(&self, typed_data: &TypedData) -> WalletResult<Signature> {
        let digest = typed_data
            .encode_eip712()
            .map_err(|e| crate::error::WalletError::InvalidArgument(e.to_string()))?;
        self.poller
            .sign_payload(self.address, H256::from(digest))
            .await
    }
}

/// ABI-encode `transfer(address,uint256)`
fn erc20_transfer_calldata(to: Address, amount: U256) -> Bytes {
    let mut data = id("transfer(address,uint256)").to_vec();
    data.extend_from_slice(&[0u8; 12]);
    data.extend_from_slice(to.as_bytes());
    let mut amount_bytes = [0u8; 32];
    amount.to_big_endian(&mut amount_bytes);
    data.extend_from_slice(&amount_bytes);
    data.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WalletError;
    use crate::testutil::{test_wallet, ScriptedSigner, StubChain};
    use ethers::types::{TransactionReceipt, U64};
    use ethers::utils::rlp::Rlp;

    #[tokio::test(start_paused = true)]
    async fn test_send_transaction_round_trips_through_wire_encoding() {
        let chain = Arc::new(StubChain::new(84532, 5));
        let signer = ScriptedSigner::completing_after(1);
        let wallet = test_wallet(chain.clone(), Arc::new(signer.clone()));

        let destination = Address::random();
        let value = U256::from(1_000_000_000u64);

        let hash = wallet.native_transfer(destination, value).await.unwrap();

        let raw = chain.broadcasts()[0].clone();
        let (decoded, sig) = TypedTransaction::decode_signed(&Rlp::new(&raw)).unwrap();

        assert_eq!(decoded.nonce(), Some(&U256::from(5)));
        let expected_to: ethers::types::NameOrAddress = destination.into();
        assert_eq!(decoded.to(), Some(&expected_to));
        assert_eq!(decoded.value(), Some(&value));

        // The signature recovers to the account that signed
        let recovered = sig.recover(decoded.sighash()).unwrap();
        assert_eq!(recovered, signer.wallet_address());

        // The broadcast hash matches the wire form
        assert_eq!(hash, H256::from(ethers::utils::keccak256(&raw)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_message_signing_bypasses_the_lane() {
        let chain = Arc::new(StubChain::new(84532, 5));
        let signer = ScriptedSigner::completing_after(0);
        let wallet = test_wallet(chain.clone(), Arc::new(signer.clone()));

        let signature = wallet.sign_message("Hello, world!").await.unwrap();
        let recovered = signature.recover(hash_message("Hello, world!")).unwrap();
        assert_eq!(recovered, signer.wallet_address());

        // No nonce query, nothing broadcast
        assert_eq!(chain.count_queries(), 0);
        assert!(chain.broadcasts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_contract_bypasses_the_lane() {
        let chain = Arc::new(StubChain::new(84532, 5));
        chain.set_call_result(Bytes::from(vec![0xaa, 0xbb]));
        let signer = ScriptedSigner::completing_after(0);
        let wallet = test_wallet(chain.clone(), Arc::new(signer));

        let result = wallet
            .read_contract(Address::random(), Bytes::from(vec![0x01]))
            .await
            .unwrap();

        assert_eq!(result, Bytes::from(vec![0xaa, 0xbb]));
        assert!(chain.broadcasts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_confirmation_wait_leaves_lane_intact() {
        let chain = Arc::new(StubChain::new(84532, 5));
        let signer = ScriptedSigner::completing_after(0);
        let wallet = test_wallet(chain.clone(), Arc::new(signer));

        let to = Address::random();
        let hash = wallet.native_transfer(to, U256::from(1u64)).await.unwrap();

        // No receipt ever appears; the wait times out
        let err = wallet.wait_for_confirmation(hash).await.unwrap_err();
        assert!(matches!(err, WalletError::ConfirmationTimeout { .. }));

        // The lane still advances normally afterwards
        wallet.native_transfer(to, U256::from(2u64)).await.unwrap();
        assert_eq!(chain.broadcast_nonces(), vec![5, 6]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_and_wait_returns_confirmed_record() {
        let chain = Arc::new(StubChain::new(84532, 5));
        let signer = ScriptedSigner::completing_after(0);
        let wallet = test_wallet(chain.clone(), Arc::new(signer));

        chain.confirm_next_broadcast(TransactionReceipt {
            status: Some(U64::from(1)),
            block_number: Some(U64::from(7777)),
            ..Default::default()
        });

        let record = wallet
            .send_transaction_and_wait(SubmissionRequest {
                to: Address::random(),
                value: Some(U256::from(5u64)),
                ..Default::default()
            })
            .await
            .unwrap();

        match record.state {
            crate::confirm::ConfirmationState::Confirmed { block_number, .. } => {
                assert_eq!(block_number, 7777)
            }
            other => panic!("expected confirmed, got {:?}", other),
        }
    }

    #[test]
    fn test_erc20_transfer_calldata_layout() {
        let to: Address = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e"
            .parse()
            .unwrap();
        let data = erc20_transfer_calldata(to, U256::from(1_000u64));

        // selector + two 32-byte words
        assert_eq!(data.len(), 4 + 32 + 32);
        assert_eq!(&data[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(&data[16..36], to.as_bytes());
        assert_eq!(U256::from_big_endian(&data[36..68]), U256::from(1_000u64));
    }
}
