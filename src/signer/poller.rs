//! Signature poller - turns the ticket-based signer into one blocking call
//!
//! The poll loop yields between attempts so other submissions, confirmation
//! waits and API traffic keep running while a signature is outstanding.

use super::{RemoteSigner, SignatureStatus, TicketId};
use crate::error::{WalletError, WalletResult};
use crate::tx::SignedTransaction;

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Signature, H256};
use ethers::utils::keccak256;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Polls the remote signer until a requested signature reaches a terminal
/// state
pub struct SignaturePoller {
    signer: Arc<dyn RemoteSigner>,
    poll_interval: Duration,
    max_polls: u32,
}

impl SignaturePoller {
    pub fn new(signer: Arc<dyn RemoteSigner>, poll_interval: Duration, max_polls: u32) -> Self {
        Self {
            signer,
            poll_interval,
            max_polls,
        }
    }

    /// Request a signature over an arbitrary 32-byte payload and wait for it.
    ///
    /// One logical call per payload: the signer does not deduplicate
    /// requests, so callers must not re-enter this for the same payload
    /// while a ticket is outstanding.
    pub async fn sign_payload(&self, address: Address, payload: H256) -> WalletResult<Signature> {
        let started = Instant::now();
        let ticket = self.signer.request_signature(address, payload).await?;

        for poll in 0..self.max_polls {
            crate::metrics::record_signer_poll();

            match self.signer.signature_status(&ticket).await? {
                SignatureStatus::Completed(bytes) => {
                    let signature = Signature::try_from(bytes.as_ref()).map_err(|e| {
                        WalletError::Signer(format!(
                            "Ticket {} returned malformed signature: {}",
                            ticket, e
                        ))
                    })?;
                    debug!(
                        "Ticket {} completed after {} polls ({}ms)",
                        ticket,
                        poll + 1,
                        started.elapsed().as_millis()
                    );
                    crate::metrics::observe_signer_wait(started.elapsed().as_secs_f64());
                    return Ok(signature);
                }
                SignatureStatus::Failed(reason) => {
                    warn!("Ticket {} failed: {}", ticket, reason);
                    return Err(WalletError::SigningFailed {
                        ticket: ticket.0,
                        reason,
                    });
                }
                SignatureStatus::Pending => {
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }

        warn!(
            "Ticket {} still pending after {} polls, giving up",
            ticket, self.max_polls
        );
        Err(WalletError::SigningTimeout {
            ticket: ticket.0,
            polls: self.max_polls,
        })
    }

    /// Sign a prepared transaction and produce its broadcastable wire form
    pub async fn sign_transaction(
        &self,
        unsigned: &TypedTransaction,
    ) -> WalletResult<SignedTransaction> {
        let from = unsigned
            .from()
            .copied()
            .ok_or_else(|| WalletError::Internal("Unsigned transaction has no sender".into()))?;

        let mut signature = self.sign_payload(from, unsigned.sighash()).await?;
        // Signers return v as 27/28; the typed-transaction encoding wants
        // the bare y-parity bit
        if signature.v >= 27 {
            signature.v -= 27;
        }
        let raw = unsigned.rlp_signed(&signature);
        let hash = H256::from(keccak256(&raw));

        Ok(SignedTransaction { raw, hash })
    }
}
