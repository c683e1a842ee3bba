//! Canonical network registry: alias ↔ CAIP-2 id, chain metadata, default
//! asset, default router, and default built-in hook addresses.
//!
//! Built once at startup from [`known_networks`] plus any operator
//! overrides, then treated as read-only for the lifetime of the process.

use std::collections::HashMap;

use crate::hex_types::Address20;

/// Token metadata needed both to convert human amounts to atomic units and
/// to build the EIP-712 domain used for signature verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetInfo {
    /// ERC-20-like token contract address.
    pub address: Address20,
    /// Number of decimals the token uses for atomic-unit conversion.
    pub decimals: u8,
    /// EIP-712 domain `name` as reported by the token's `name()` (or
    /// overridden by `extra.name` in router mode).
    pub eip712_name: String,
    /// EIP-712 domain `version` as reported by the token's `version()` (or
    /// overridden by `extra.version` in router mode).
    pub eip712_version: String,
}

/// A single known network's static metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    /// Human alias, e.g. `"base-sepolia"`.
    pub alias: String,
    /// EVM chain id, e.g. `84532`.
    pub chain_id: u64,
    /// Default RPC URL, overridable via `<NET>_RPC_URL`.
    pub default_rpc_url: Option<String>,
    /// Default accepted asset for this network.
    pub default_asset: Option<AssetInfo>,
    /// Default `SettlementRouter` address, overridable via
    /// `<NET>_SETTLEMENT_ROUTER_ADDRESS`.
    pub default_router: Option<Address20>,
    /// Default built-in hook addresses allow-listed for this network,
    /// overridable via `<NET>_ALLOWED_HOOKS`.
    pub default_hooks: Vec<Address20>,
}

impl NetworkInfo {
    /// The canonical CAIP-2 identifier, e.g. `"eip155:84532"`.
    #[must_use]
    pub fn caip2(&self) -> String {
        format!("eip155:{}", self.chain_id)
    }

    /// A network is mainnet iff its alias contains none of the well-known
    /// testnet markers.
    #[must_use]
    pub fn is_mainnet(&self) -> bool {
        const TESTNET_MARKERS: [&str; 5] = ["sepolia", "testnet", "fuji", "amoy", "goerli"];
        !TESTNET_MARKERS.iter().any(|marker| self.alias.contains(marker))
    }
}

/// The network named in a request does not match any registered alias or
/// CAIP-2 id.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown network: {0}")]
pub struct UnknownNetwork(pub String);

/// Read-only (after construction) bijection between aliases and CAIP-2 ids,
/// plus per-network metadata.
#[derive(Debug, Clone, Default)]
pub struct NetworkRegistry {
    by_alias: HashMap<String, NetworkInfo>,
    alias_by_caip2: HashMap<String, String>,
}

impl NetworkRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry pre-populated from a list of networks.
    #[must_use]
    pub fn from_networks(networks: Vec<NetworkInfo>) -> Self {
        let mut registry = Self::new();
        for info in networks {
            registry.register(info);
        }
        registry
    }

    /// Registers (or overwrites) a network.
    pub fn register(&mut self, info: NetworkInfo) {
        let caip2 = info.caip2();
        self.alias_by_caip2.insert(caip2, info.alias.clone());
        self.by_alias.insert(info.alias.clone(), info);
    }

    /// Returns every registered network.
    #[must_use]
    pub fn list_supported(&self) -> Vec<&NetworkInfo> {
        self.by_alias.values().collect()
    }

    /// Resolves a request's `network` field (alias or CAIP-2 id) to the
    /// registered [`NetworkInfo`].
    ///
    /// # Errors
    ///
    /// Returns [`UnknownNetwork`] if `name` matches neither an alias nor a
    /// CAIP-2 id.
    pub fn resolve(&self, name: &str) -> Result<&NetworkInfo, UnknownNetwork> {
        if let Some(info) = self.by_alias.get(name) {
            return Ok(info);
        }
        if let Some(alias) = self.alias_by_caip2.get(name) {
            return Ok(&self.by_alias[alias]);
        }
        Err(UnknownNetwork(name.to_owned()))
    }

    /// Canonicalizes a network name to its CAIP-2 id.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownNetwork`] if `name` is not registered.
    pub fn canonicalize(&self, name: &str) -> Result<String, UnknownNetwork> {
        Ok(self.resolve(name)?.caip2())
    }

    /// Returns the human alias for a CAIP-2 id.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownNetwork`] if `caip2` is not registered.
    pub fn alias(&self, caip2: &str) -> Result<&str, UnknownNetwork> {
        Ok(&self.resolve(caip2)?.alias)
    }

    /// Returns the default accepted asset for a network.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownNetwork`] if `name` is not registered.
    pub fn default_asset(&self, name: &str) -> Result<Option<&AssetInfo>, UnknownNetwork> {
        Ok(self.resolve(name)?.default_asset.as_ref())
    }

    /// Returns the default `SettlementRouter` address for a network.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownNetwork`] if `name` is not registered.
    pub fn default_router(&self, name: &str) -> Result<Option<Address20>, UnknownNetwork> {
        Ok(self.resolve(name)?.default_router)
    }

    /// Returns the default RPC URL for a network.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownNetwork`] if `name` is not registered.
    pub fn rpc_url(&self, name: &str) -> Result<Option<&str>, UnknownNetwork> {
        Ok(self.resolve(name)?.default_rpc_url.as_deref())
    }

    /// Returns `true` iff `name` resolves to a mainnet network.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownNetwork`] if `name` is not registered.
    pub fn is_mainnet(&self, name: &str) -> Result<bool, UnknownNetwork> {
        Ok(self.resolve(name)?.is_mainnet())
    }
}

/// Built-in network metadata shipped with the facilitator.
///
/// Mirrors the reference implementation's `known_networks()`: a short list
/// of well-known EVM chains with their canonical USDC-style asset. Router
/// and hook addresses are left unset here — this protocol's
/// `SettlementRouter`/`Hook` contracts are deployment-specific and must be
/// supplied via `<NET>_SETTLEMENT_ROUTER_ADDRESS` / `<NET>_ALLOWED_HOOKS`.
#[must_use]
pub fn known_networks() -> Vec<NetworkInfo> {
    fn usdc(address: &str, name: &str) -> AssetInfo {
        AssetInfo {
            address: address.parse().expect("hard-coded address is valid"),
            decimals: 6,
            eip712_name: name.to_owned(),
            eip712_version: "2".to_owned(),
        }
    }

    vec![
        NetworkInfo {
            alias: "base".to_owned(),
            chain_id: 8453,
            default_rpc_url: Some("https://mainnet.base.org".to_owned()),
            default_asset: Some(usdc(
                "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
                "USD Coin",
            )),
            default_router: None,
            default_hooks: Vec::new(),
        },
        NetworkInfo {
            alias: "base-sepolia".to_owned(),
            chain_id: 84532,
            default_rpc_url: Some("https://sepolia.base.org".to_owned()),
            default_asset: Some(usdc("0x036CbD53842c5426634e7929541eC2318f3dCF7e", "USDC")),
            default_router: None,
            default_hooks: Vec::new(),
        },
        NetworkInfo {
            alias: "ethereum".to_owned(),
            chain_id: 1,
            default_rpc_url: None,
            default_asset: Some(usdc(
                "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
                "USD Coin",
            )),
            default_router: None,
            default_hooks: Vec::new(),
        },
        NetworkInfo {
            alias: "polygon".to_owned(),
            chain_id: 137,
            default_rpc_url: None,
            default_asset: Some(usdc(
                "0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359",
                "USD Coin",
            )),
            default_router: None,
            default_hooks: Vec::new(),
        },
        NetworkInfo {
            alias: "polygon-amoy".to_owned(),
            chain_id: 80002,
            default_rpc_url: None,
            default_asset: Some(usdc("0x41E94Eb019C0762f9Bfcf9Fb1E58725BfB0e7582", "USDC")),
            default_router: None,
            default_hooks: Vec::new(),
        },
        NetworkInfo {
            alias: "avalanche".to_owned(),
            chain_id: 43114,
            default_rpc_url: None,
            default_asset: Some(usdc(
                "0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E",
                "USD Coin",
            )),
            default_router: None,
            default_hooks: Vec::new(),
        },
        NetworkInfo {
            alias: "avalanche-fuji".to_owned(),
            chain_id: 43113,
            default_rpc_url: None,
            default_asset: Some(usdc(
                "0x5425890298aed601595a70AB815c96711a31Bc65",
                "USD Coin",
            )),
            default_router: None,
            default_hooks: Vec::new(),
        },
    ]
}
