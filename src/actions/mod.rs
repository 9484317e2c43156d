//! Action providers - the operations an agent can invoke
//!
//! A provider is a capability set: a name, a network predicate, and a list
//! of invocable actions with JSON arguments. Providers are registered once
//! at startup; there is no dynamic discovery.

pub mod wallet_provider;

pub use wallet_provider::WalletActionProvider;

use crate::error::{WalletError, WalletResult};
use crate::network::Network;
use crate::wallet::WalletService;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Description of one invocable action
#[derive(Debug, Clone, Serialize)]
pub struct ActionDescriptor {
    pub name: &'static str,
    pub description: &'static str,
}

/// A named set of actions available on supported networks
#[async_trait]
pub trait ActionProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn supports_network(&self, network: &Network) -> bool;

    fn actions(&self) -> Vec<ActionDescriptor>;

    async fn invoke(
        &self,
        wallet: &WalletService,
        action: &str,
        args: serde_json::Value,
    ) -> WalletResult<serde_json::Value>;
}

/// Registry of providers applicable to the service's network
pub struct ActionRegistry {
    network: Network,
    providers: Vec<Arc<dyn ActionProvider>>,
}

impl ActionRegistry {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            providers: Vec::new(),
        }
    }

    /// Register a provider; skipped with a warning if it does not support
    /// the service network
    pub fn register(&mut self, provider: Arc<dyn ActionProvider>) {
        if !provider.supports_network(&self.network) {
            warn!(
                "Provider {} does not support network {}, skipping",
                provider.name(),
                self.network.network_id
            );
            return;
        }
        info!("Registered action provider: {}", provider.name());
        self.providers.push(provider);
    }

    /// All registered actions as (provider, action) pairs
    pub fn list_actions(&self) -> Vec<(&'static str, ActionDescriptor)> {
        self.providers
            .iter()
            .flat_map(|p| p.actions().into_iter().map(|a| (p.name(), a)))
            .collect()
    }

    /// Dispatch an action invocation to its provider
    pub async fn invoke(
        &self,
        wallet: &WalletService,
        provider_name: &str,
        action: &str,
        args: serde_json::Value,
    ) -> WalletResult<serde_json::Value> {
        let provider = self
            .providers
            .iter()
            .find(|p| p.name() == provider_name)
            .ok_or_else(|| WalletError::Action(format!("Unknown provider: {}", provider_name)))?;

        provider.invoke(wallet, action, args).await
    }
}
