//! Built-in wallet actions: transfers, balance, contract reads

use super::{ActionDescriptor, ActionProvider};
use crate::error::{WalletError, WalletResult};
use crate::network::{Network, EVM_PROTOCOL_FAMILY};
use crate::wallet::WalletService;

use async_trait::async_trait;
use ethers::types::{Address, Bytes, U256};
use serde::Deserialize;
use serde_json::json;

/// Provider exposing the wallet's own operations as actions
pub struct WalletActionProvider;

#[derive(Deserialize)]
struct NativeTransferArgs {
    to: String,
    /// Amount in wei, decimal string
    value_wei: String,
}

#[derive(Deserialize)]
struct Erc20TransferArgs {
    token: String,
    to: String,
    /// Token amount in base units, decimal string
    amount: String,
}

#[derive(Deserialize)]
struct ReadContractArgs {
    to: String,
    /// 0x-prefixed calldata
    data: String,
}

#[derive(Deserialize)]
struct SendTransactionArgs {
    to: String,
    /// 0x-prefixed calldata, empty when absent
    data: Option<String>,
    /// Native value in wei, decimal string
    value_wei: Option<String>,
    /// Block until the transaction is mined
    #[serde(default)]
    wait: bool,
}

fn parse_address(value: &str, field: &str) -> WalletResult<Address> {
    value
        .parse()
        .map_err(|_| WalletError::InvalidArgument(format!("{} is not a valid address", field)))
}

fn parse_amount(value: &str, field: &str) -> WalletResult<U256> {
    U256::from_dec_str(value)
        .map_err(|_| WalletError::InvalidArgument(format!("{} is not a valid amount", field)))
}

fn parse_args<T: serde::de::DeserializeOwned>(args: serde_json::Value) -> WalletResult<T> {
    serde_json::from_value(args).map_err(|e| WalletError::InvalidArgument(e.to_string()))
}

#[async_trait]
impl ActionProvider for WalletActionProvider {
    fn name(&self) -> &'static str {
        "wallet"
    }

    fn supports_network(&self, network: &Network) -> bool {
        network.protocol_family == EVM_PROTOCOL_FAMILY
    }

    fn actions(&self) -> Vec<ActionDescriptor> {
        vec![
            ActionDescriptor {
                name: "send_transaction",
                description: "Send a raw transaction, optionally waiting for it to mine",
            },
            ActionDescriptor {
                name: "native_transfer",
                description: "Transfer native currency to an address",
            },
            ActionDescriptor {
                name: "erc20_transfer",
                description: "Transfer an ERC-20 token to an address",
            },
            ActionDescriptor {
                name: "get_balance",
                description: "Native balance of the wallet account",
            },
            ActionDescriptor {
                name: "read_contract",
                description: "Read-only contract call with raw calldata",
            },
        ]
    }

    async fn invoke(
        &self,
        wallet: &WalletService,
        action: &str,
        args: serde_json::Value,
    ) -> WalletResult<serde_json::Value> {
        match action {
            "send_transaction" => {
                let args: SendTransactionArgs = parse_args(args)?;
                let to = parse_address(&args.to, "to")?;
                let data = match args.data.as_deref() {
                    Some(hex_data) => Bytes::from(
                        hex::decode(hex_data.trim_start_matches("0x")).map_err(|_| {
                            WalletError::InvalidArgument("data is not valid hex".into())
                        })?,
                    ),
                    None => Bytes::new(),
                };
                let value = args
                    .value_wei
                    .as_deref()
                    .map(|v| parse_amount(v, "value_wei"))
                    .transpose()?;

                let request = crate::tx::SubmissionRequest {
                    to,
                    data,
                    value,
                    ..Default::default()
                };

                if args.wait {
                    let record = wallet.send_transaction_and_wait(request).await?;
                    Ok(serde_json::to_value(record)
                        .map_err(|e| WalletError::Internal(e.to_string()))?)
                } else {
                    let hash = wallet.send_transaction(request).await?;
                    Ok(json!({ "transaction_hash": format!("{:?}", hash) }))
                }
            }
            "native_transfer" => {
                let args: NativeTransferArgs = parse_args(args)?;
                let to = parse_address(&args.to, "to")?;
                let value = parse_amount(&args.value_wei, "value_wei")?;
                let hash = wallet.native_transfer(to, value).await?;
                Ok(json!({ "transaction_hash": format!("{:?}", hash) }))
            }
            "erc20_transfer" => {
                let args: Erc20TransferArgs = parse_args(args)?;
                let token = parse_address(&args.token, "token")?;
                let to = parse_address(&args.to, "to")?;
                let amount = parse_amount(&args.amount, "amount")?;
                let hash = wallet.erc20_transfer(token, to, amount).await?;
                Ok(json!({ "transaction_hash": format!("{:?}", hash) }))
            }
            "get_balance" => {
                let balance = wallet.get_balance().await?;
                Ok(json!({
                    "address": format!("{:?}", wallet.get_address()),
                    "balance_wei": balance.to_string(),
                }))
            }
            "read_contract" => {
                let args: ReadContractArgs = parse_args(args)?;
                let to = parse_address(&args.to, "to")?;
                let data = hex::decode(args.data.trim_start_matches("0x"))
                    .map_err(|_| WalletError::InvalidArgument("data is not valid hex".into()))?;
                let result = wallet.read_contract(to, Bytes::from(data)).await?;
                Ok(json!({ "result": format!("0x{}", hex::encode(&result)) }))
            }
            other => Err(WalletError::Action(format!("Unknown action: {}", other))),
        }
    }
}
