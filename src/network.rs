//! Network identity for the wallet service
//!
//! A wallet is scoped to exactly one network at construction time. The chain
//! id is always resolved server-side from the network id; requests never
//! carry their own chain id.

use serde::Serialize;

/// Protocol family for all networks this service supports
pub const EVM_PROTOCOL_FAMILY: &str = "evm";

/// Identity of the network a wallet operates on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Network {
    pub protocol_family: String,
    pub network_id: String,
    pub chain_id: u64,
}

impl Network {
    pub fn evm(network_id: impl Into<String>, chain_id: u64) -> Self {
        Self {
            protocol_family: EVM_PROTOCOL_FAMILY.to_string(),
            network_id: network_id.into(),
            chain_id,
        }
    }
}

/// Map a human network id to its chain id
pub fn chain_id_for(network_id: &str) -> Option<u64> {
    let chain_id = match network_id {
        "mainnet" | "ethereum-mainnet" => 1,
        "sepolia" | "ethereum-sepolia" => 11_155_111,
        "base-mainnet" => 8453,
        "base-sepolia" => 84532,
        "polygon-mainnet" => 137,
        "polygon-amoy" => 80002,
        "arbitrum-mainnet" => 42161,
        "arbitrum-sepolia" => 421_614,
        "optimism-mainnet" => 10,
        "optimism-sepolia" => 11_155_420,
        "avalanche-mainnet" => 43114,
        _ => return None,
    };
    Some(chain_id)
}

/// Build a [`Network`] from a known network id
pub fn network_from_id(network_id: &str) -> Option<Network> {
    chain_id_for(network_id).map(|chain_id| Network::evm(network_id, chain_id))
}
