//! HTTP client for the remote signing service

use super::{RemoteSigner, SignatureStatus, TicketId};
use crate::config::SignerConfig;
use crate::error::{WalletError, WalletResult};

use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// JSON client for the signing service's ticket API
pub struct HttpSigner {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct SignatureRequestBody {
    address: String,
    payload: String,
    request_id: Uuid,
}

#[derive(Deserialize)]
struct SignatureRequestResponse {
    ticket_id: String,
}

#[derive(Deserialize)]
struct SignatureStatusResponse {
    status: String,
    signature: Option<String>,
    reason: Option<String>,
}

impl HttpSigner {
    pub fn new(config: &SignerConfig) -> WalletResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| WalletError::Signer(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RemoteSigner for HttpSigner {
    async fn request_signature(&self, address: Address, payload: H256) -> WalletResult<TicketId> {
        let body = SignatureRequestBody {
            address: format!("{:?}", address),
            payload: format!("{:?}", payload),
            request_id: Uuid::new_v4(),
        };

        let response = self
            .client
            .post(format!("{}/v1/signatures", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| WalletError::Signer(e.to_string()))?
            .error_for_status()
            .map_err(|e| WalletError::Signer(e.to_string()))?
            .json::<SignatureRequestResponse>()
            .await
            .map_err(|e| WalletError::Signer(e.to_string()))?;

        debug!(
            "Signature requested for {:?}, ticket {}",
            address, response.ticket_id
        );

        Ok(TicketId(response.ticket_id))
    }

    async fn signature_status(&self, ticket: &TicketId) -> WalletResult<SignatureStatus> {
        let response = self
            .client
            .get(format!("{}/v1/signatures/{}", self.base_url, ticket))
            .send()
            .await
            .map_err(|e| WalletError::Signer(e.to_string()))?
            .error_for_status()
            .map_err(|e| WalletError::Signer(e.to_string()))?
            .json::<SignatureStatusResponse>()
            .await
            .map_err(|e| WalletError::Signer(e.to_string()))?;

        match response.status.as_str() {
            "pending" => Ok(SignatureStatus::Pending),
            "completed" => {
                let signature = response.signature.ok_or_else(|| {
                    WalletError::Signer(format!(
                        "Ticket {} completed without signature bytes",
                        ticket
                    ))
                })?;
                let bytes = hex::decode(signature.trim_start_matches("0x"))
                    .map_err(|e| WalletError::Signer(format!("Invalid signature hex: {}", e)))?;
                Ok(SignatureStatus::Completed(Bytes::from(bytes)))
            }
            "failed" => Ok(SignatureStatus::Failed(
                response.reason.unwrap_or_else(|| "unspecified".to_string()),
            )),
            other => Err(WalletError::Signer(format!(
                "Unknown signature status: {}",
                other
            ))),
        }
    }
}
