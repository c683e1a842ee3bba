//! Wires a loaded [`FacilitatorConfig`] into the running collaborators
//! every handler needs: the network registry, one [`ChainConnection`] +
//! [`SignerPool`] pair per network, the shared oracles/policy singletons,
//! and the [`Verifier`]/[`SettlementExecutor`] built over clones of them.
//!
//! `Verifier`'s own collaborator accessors are `pub(crate)` to `x402x-evm`,
//! so this module keeps its own copies of the oracles, the fee policy, the
//! gas estimator, and the hook allow-list for `/calculate-fee` to use
//! directly, passing clones into [`Verifier::new`].

use std::collections::HashMap;
use std::sync::Arc;

use alloy_signer_local::PrivateKeySigner;
use tokio_util::sync::CancellationToken;
use url::Url;
use x402x_evm::oracle::ProviderGasPriceSource;
use x402x_evm::{
    ChainConnection, Dispatcher, FeePolicy, FeePolicyConfig, GasEstimationStrategy, GasEstimator, GasEstimatorConfig,
    GasPriceConfig, GasPriceOracle, GasPriceSource, HookAllowList, NoRpcEndpoints, PriceOracle, RpcEndpoint,
    SettlementExecutor, SignerPool, SignerProvider, StaticPriceFeed, VersionPolicy, Verifier, VerifierNetworkConfig,
    wire,
};
use x402x_types::network::{known_networks, NetworkInfo};
use x402x_types::NetworkRegistry;

use crate::config::FacilitatorConfig;

/// A single network's chain connection plus its signer pool, when the
/// deployment has at least one signer account configured.
pub struct NetworkRuntime {
    /// Shared RPC transport and nonce tracking for this network.
    pub chain: Arc<ChainConnection>,
    /// `None` iff no signer accounts are configured — the network is still
    /// registered (so `/verify` and `/supported` work) but cannot settle.
    pub pool: Option<Arc<SignerPool<SignerProvider>>>,
}

impl std::fmt::Debug for NetworkRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkRuntime").field("has_pool", &self.pool.is_some()).finish_non_exhaustive()
    }
}

/// Everything an Axum handler needs, built once at startup.
pub struct AppState {
    /// Per-network chain connections and signer pools, keyed by CAIP-2 id.
    pub networks: HashMap<String, NetworkRuntime>,
    /// Canonical network metadata; `Verifier`'s own copy is `pub(crate)`, so
    /// `/supported` and `/calculate-fee` read this one directly.
    pub registry: Arc<NetworkRegistry>,
    /// Version/mode/network resolution ahead of verification.
    pub dispatcher: Dispatcher,
    /// The shared verification pipeline.
    pub verifier: Arc<Verifier>,
    /// The shared settlement pipeline, built over the same verifier.
    pub executor: Arc<SettlementExecutor>,
    /// Retained for `/calculate-fee`, which estimates gas without a payload.
    pub gas_estimator: GasEstimator,
    /// Retained for `/calculate-fee`'s minimum-fee quote.
    pub fee_policy: FeePolicy,
    /// Retained for `/calculate-fee`'s `hookAllowed` field.
    pub hook_allow_list: HookAllowList,
    /// Retained for `/calculate-fee`'s gas-price input.
    pub gas_price_oracle: Arc<GasPriceOracle>,
    /// Retained for `/calculate-fee`'s native-price input.
    pub price_oracle: Arc<PriceOracle>,
    /// Token every component rejecting new work on shutdown observes.
    pub shutdown: CancellationToken,
    /// Requests/minute this deployment permits on `/verify`.
    pub verify_rate_limit: u32,
    /// Requests/minute this deployment permits on `/settle`.
    pub settle_rate_limit: u32,
    /// Maximum request body size, in bytes.
    pub max_body_bytes: usize,
    /// Whether v2 requests are served, for `/supported`'s listing.
    pub v2_enabled: bool,
    /// Whether v1 requests are rejected as deprecated, for `/supported`'s listing.
    pub v1_deprecated: bool,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").field("networks", &self.networks.keys().collect::<Vec<_>>()).finish_non_exhaustive()
    }
}

/// Failure building [`AppState`] from a loaded configuration. Never carries
/// private-key material — signer keys that fail to parse are identified by
/// their index in `signer_private_keys`, not their value.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// `facilitator.signer_private_keys[index]` is not a valid secp256k1 key.
    #[error("signer_private_keys[{0}] is not a valid private key")]
    InvalidSignerKey(usize),
    /// A configured RPC URL did not parse.
    #[error("network {network}: invalid RPC URL {url:?}")]
    InvalidRpcUrl {
        /// The network the bad URL was configured under.
        network: String,
        /// The offending URL string.
        url: String,
    },
    /// None of a network's configured RPC URLs use an `http(s)` scheme.
    #[error(transparent)]
    NoRpcEndpoints(#[from] NoRpcEndpoints),
}

/// Builds the full application state from `config`.
///
/// # Errors
///
/// Returns [`BuildError`] if a signer key fails to parse or a network's RPC
/// endpoints are unusable. Networks whose key resolves to neither a known
/// alias nor a valid `eip155:<chainId>` CAIP-2 id are skipped with a
/// warning rather than failing the whole deployment.
pub fn build(config: &FacilitatorConfig, shutdown: CancellationToken) -> Result<AppState, BuildError> {
    let signers: Vec<PrivateKeySigner> = config
        .facilitator
        .signer_private_keys
        .iter()
        .enumerate()
        .map(|(index, key)| key.trim().parse::<PrivateKeySigner>().map_err(|_| BuildError::InvalidSignerKey(index)))
        .collect::<Result<_, _>>()?;

    if signers.is_empty() {
        #[cfg(feature = "telemetry")]
        tracing::warn!("no signer_private_keys configured — /settle will be unavailable on every network");
    }

    let defaults = NetworkRegistry::from_networks(known_networks());
    let mut registry = NetworkRegistry::new();
    let mut networks = HashMap::new();
    let mut verifier_network_configs = HashMap::new();
    let mut hook_tables: HashMap<String, Vec<alloy_primitives::Address>> = HashMap::new();
    let mut gas_price_sources: HashMap<String, Arc<dyn GasPriceSource>> = HashMap::new();
    let mut gas_price_configs = HashMap::new();
    let mut native_fallbacks = HashMap::new();

    for (key, net_cfg) in &config.networks {
        let mut info = if let Ok(known) = defaults.resolve(key) {
            known.clone()
        } else if let Some(chain_id) = parse_eip155_chain_id(key) {
            NetworkInfo {
                alias: key.clone(),
                chain_id,
                default_rpc_url: None,
                default_asset: None,
                default_router: None,
                default_hooks: Vec::new(),
            }
        } else {
            #[cfg(feature = "telemetry")]
            tracing::warn!(network = %key, "unrecognized network (not a known alias or eip155:<chainId>); skipping");
            continue;
        };

        if let Some(first) = net_cfg.rpc_urls.first() {
            info.default_rpc_url = Some(first.url.clone());
        }
        if let Some(router) = net_cfg.allowed_routers.first() {
            info.default_router = Some(wire::address_to_wire(*router));
        }
        if !net_cfg.hook_allow_list.is_empty() {
            info.default_hooks = net_cfg.hook_allow_list.iter().copied().map(wire::address_to_wire).collect();
        }

        let canonical = info.caip2();

        let endpoints: Vec<RpcEndpoint> = net_cfg
            .rpc_urls
            .iter()
            .map(|endpoint| {
                endpoint.url.parse::<Url>().map(|url| RpcEndpoint { url, rate_limit: endpoint.rate_limit }).map_err(
                    |_| BuildError::InvalidRpcUrl { network: canonical.clone(), url: endpoint.url.clone() },
                )
            })
            .collect::<Result<_, _>>()?;
        let chain = Arc::new(ChainConnection::new(info.chain_id, &endpoints, net_cfg.eip1559)?);

        let pool = if signers.is_empty() {
            None
        } else {
            let accounts =
                signers.iter().map(|signer| (signer.address(), chain.provider_for_signer(signer.clone()))).collect();
            Some(Arc::new(SignerPool::new(
                canonical.clone(),
                accounts,
                config.facilitator.selection_strategy.into(),
                config.facilitator.max_queue_depth,
                config.facilitator.warning_threshold,
                shutdown.clone(),
            )))
        };

        gas_price_sources.insert(canonical.clone(), Arc::new(ProviderGasPriceSource::new(chain.reader())));
        gas_price_configs
            .insert(canonical.clone(), GasPriceConfig::new(net_cfg.gas_price_strategy.map(Into::into), net_cfg.gas_price_static_wei));
        if let Some(fallback) = net_cfg.native_price_fallback_usd {
            native_fallbacks.insert(canonical.clone(), fallback);
        }
        if !net_cfg.hook_allow_list.is_empty() {
            hook_tables.insert(canonical.clone(), net_cfg.hook_allow_list.clone());
        }
        verifier_network_configs.insert(
            canonical.clone(),
            VerifierNetworkConfig {
                allowed_routers: net_cfg.allowed_routers.clone(),
                clock_skew_tolerance: net_cfg.clock_skew_tolerance_secs,
            },
        );

        networks.insert(canonical.clone(), NetworkRuntime { chain, pool });
        registry.register(info);
    }

    let registry = Arc::new(registry);

    let gas = &config.facilitator.gas;
    let gas_estimator = GasEstimator::new(GasEstimatorConfig {
        min_gas_limit: gas.min_gas_limit,
        max_gas_limit: gas.max_gas_limit,
        safety_multiplier: gas.safety_multiplier,
        code_validation_enabled: gas.code_validation_enabled,
        simulation_timeout: gas.simulation_timeout(),
        base_router_cost: gas.base_router_cost,
        hook_overhead: gas.hook_overhead.clone(),
        pay_to_overhead: gas.pay_to_overhead,
    });

    let fee_policy = FeePolicy::new(FeePolicyConfig {
        min_gas_limit: gas.min_gas_limit,
        max_gas_limit: gas.max_gas_limit,
        dynamic_gas_limit_margin: config.facilitator.fee.dynamic_gas_limit_margin,
        validation_tolerance: config.facilitator.fee.validation_tolerance,
        hook_whitelist_enabled: config.facilitator.hook_whitelist_enabled,
    });

    let hook_allow_list = HookAllowList::new(hook_tables);

    let gas_price_oracle = Arc::new(GasPriceOracle::new(gas_price_sources, gas_price_configs, GasPriceOracle::default_cache_ttl()));

    let price_oracle = Arc::new(PriceOracle::new(
        Arc::new(StaticPriceFeed::default()),
        config.facilitator.price.ttl(),
        config.facilitator.price.refresh_interval(),
        native_fallbacks,
        config.facilitator.price.default_fallback_usd,
    ));
    let _refresher = price_oracle.spawn_refresher(networks.keys().cloned().collect(), shutdown.clone());

    let gas_strategy: GasEstimationStrategy = config.facilitator.gas_strategy.into();

    let verifier = Arc::new(Verifier::new(
        Arc::clone(&registry),
        verifier_network_configs,
        hook_allow_list.clone(),
        fee_policy,
        gas_estimator,
        Arc::clone(&gas_price_oracle),
        Arc::clone(&price_oracle),
        gas_strategy,
    ));

    let executor = Arc::new(SettlementExecutor::new(Arc::clone(&verifier), config.facilitator.receipt_timeout()));

    let dispatcher = Dispatcher::new(
        Arc::clone(&registry),
        VersionPolicy { v2_enabled: config.facilitator.v2_enabled, v1_deprecated: config.facilitator.v1_deprecated },
    );

    let verify_rate_limit = config.facilitator.rate_limit_per_minute;
    let settle_rate_limit = (config.facilitator.rate_limit_per_minute / 2).max(1);

    Ok(AppState {
        networks,
        registry,
        dispatcher,
        verifier,
        executor,
        gas_estimator,
        fee_policy,
        hook_allow_list,
        gas_price_oracle,
        price_oracle,
        shutdown,
        verify_rate_limit,
        settle_rate_limit,
        max_body_bytes: config.request_body_limit,
        v2_enabled: config.facilitator.v2_enabled,
        v1_deprecated: config.facilitator.v1_deprecated,
    })
}

impl AppState {
    /// `true` iff at least one network has a signer pool with at least one
    /// account — the readiness condition `/ready` reports.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.networks.values().any(|runtime| runtime.pool.as_ref().is_some_and(|pool| !pool.is_empty()))
    }
}

/// Parses a bare CAIP-2 EVM identifier (`"eip155:<chainId>"`) that doesn't
/// match any built-in alias.
fn parse_eip155_chain_id(key: &str) -> Option<u64> {
    key.strip_prefix("eip155:")?.parse().ok()
}

/// Shared, reference-counted application state.
pub type SharedAppState = Arc<AppState>;
