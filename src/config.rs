//! Configuration management for the agent wallet service
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::network;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub service: ServiceConfig,
    pub wallet: WalletConfig,
    pub chain: ChainConfig,
    pub signer: SignerConfig,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub instance_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// Account address operated by this service, 0x-prefixed
    pub address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub network_id: String,
    pub chain_id: u64,
    pub rpc_urls: Vec<String>,
    pub max_gas_price_gwei: u64,
    pub broadcast_timeout_ms: u64,
    pub confirmation_poll_interval_ms: u64,
    pub confirmation_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignerConfig {
    /// Base URL of the remote signing service
    pub url: String,
    pub poll_interval_ms: u64,
    pub max_polls: u32,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Settings {
    /// Load settings from configuration files
    pub fn load() -> Result<Self> {
        let config_path = env::var("AGENT_WALLET_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        // Substitute environment variables
        let config_str = substitute_env_vars(&config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.chain.rpc_urls.is_empty() {
            anyhow::bail!("At least one RPC URL must be configured");
        }

        if self.signer.url.is_empty() {
            anyhow::bail!("Remote signer URL must be configured");
        }

        if self.signer.max_polls == 0 {
            anyhow::bail!("signer.max_polls must be at least 1");
        }

        self.wallet
            .address
            .parse::<ethers::types::Address>()
            .map_err(|e| anyhow::anyhow!("Invalid wallet address {}: {}", self.wallet.address, e))?;

        match network::chain_id_for(&self.chain.network_id) {
            Some(chain_id) if chain_id == self.chain.chain_id => {}
            Some(chain_id) => anyhow::bail!(
                "Network {} maps to chain id {}, configuration says {}",
                self.chain.network_id,
                chain_id,
                self.chain.chain_id
            ),
            None => anyhow::bail!("Unknown network id: {}", self.chain.network_id),
        }

        Ok(())
    }
}

impl ChainConfig {
    pub fn broadcast_timeout(&self) -> Duration {
        Duration::from_millis(self.broadcast_timeout_ms)
    }

    pub fn confirmation_poll_interval(&self) -> Duration {
        Duration::from_millis(self.confirmation_poll_interval_ms)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }
}

impl SignerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
