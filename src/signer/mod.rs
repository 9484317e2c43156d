//! Remote signing - ticket-based asynchronous signature service access
//!
//! Keys never live in this process. A signature is requested from the
//! signing service, which returns an opaque ticket; the ticket is polled
//! until it reaches a terminal state.

pub mod http;
pub mod poller;

pub use http::HttpSigner;
pub use poller::SignaturePoller;

use crate::error::WalletResult;

use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256};

/// Opaque handle for an in-flight signing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketId(pub String);

impl std::fmt::Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status of a signing ticket as reported by the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureStatus {
    Pending,
    /// 65-byte r || s || v signature
    Completed(Bytes),
    Failed(String),
}

/// Contract of the asynchronous signing service.
///
/// `request_signature` is not idempotent: callers must issue exactly one
/// request per payload they want signed.
#[async_trait]
pub trait RemoteSigner: Send + Sync {
    async fn request_signature(&self, address: Address, payload: H256) -> WalletResult<TicketId>;

    async fn signature_status(&self, ticket: &TicketId) -> WalletResult<SignatureStatus>;
}
