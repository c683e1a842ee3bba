//! Facilitator configuration: a TOML file with `$VAR` / `${VAR}` environment
//! expansion for secrets, plus `HOST`/`PORT` overrides.
//!
//! # Example
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 4021
//!
//! [facilitator]
//! signer_private_keys = ["$SIGNER_KEY_1", "$SIGNER_KEY_2"]
//!
//! [networks."eip155:84532"]
//! rpc_urls = ["https://sepolia.base.org"]
//! allowed_routers = ["0x0000000000000000000000000000000000000a"]
//! ```
//!
//! # Environment variables
//!
//! - `CONFIG` — path to the TOML file (default `config.toml`)
//! - `HOST` / `PORT` — override the bound address after the file loads
//! - `REQUEST_BODY_LIMIT` — override the maximum accepted request body size, in bytes
//! - Whatever `$VAR` references appear inside the file itself (signer keys
//!   in particular are never written to disk in plaintext)

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use x402x_evm::{GasEstimationStrategy, GasPriceStrategy, SignerSelectionStrategy};

/// Top-level facilitator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilitatorConfig {
    /// Server bind address.
    #[serde(default = "default_host")]
    pub host: IpAddr,
    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Deployment-wide policy and pool settings.
    #[serde(default)]
    pub facilitator: FacilitatorSettings,
    /// Per-network configuration, keyed by alias or CAIP-2 id (anything
    /// [`x402x_types::NetworkRegistry::resolve`] accepts).
    #[serde(default)]
    pub networks: HashMap<String, NetworkConfig>,
    /// Maximum accepted request body size, in bytes, across every route.
    #[serde(default = "default_request_body_limit")]
    pub request_body_limit: usize,
}

const fn default_request_body_limit() -> usize {
    1_048_576
}

fn default_host() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0))
}

const fn default_port() -> u16 {
    4021
}

/// Deployment-wide settlement policy, independent of any one network.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilitatorSettings {
    /// Private keys shared by every configured network's signer pool (the
    /// same EOAs operate across chains). Supports `$VAR`/`${VAR}` expansion.
    #[serde(default)]
    pub signer_private_keys: Vec<String>,
    /// Maximum queued+running settlements per signer before `QueueOverload`.
    #[serde(default = "default_max_queue_depth")]
    pub max_queue_depth: usize,
    /// Queue depth at which a warning is logged.
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: usize,
    /// How the pool picks among multiple signers.
    #[serde(default)]
    pub selection_strategy: SelectionStrategyConfig,
    /// Which gas-estimation strategy `/settle` and `/calculate-fee` use.
    #[serde(default)]
    pub gas_strategy: GasStrategyConfig,
    /// Seconds to await a settlement receipt before `ReceiptTimeout`.
    #[serde(default = "default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,
    /// Whether v2 (router-only) requests are served.
    #[serde(default = "default_true")]
    pub v2_enabled: bool,
    /// Whether v1 requests are rejected as deprecated.
    #[serde(default)]
    pub v1_deprecated: bool,
    /// Whether hooks are restricted to each network's `hook_allow_list`.
    #[serde(default = "default_true")]
    pub hook_whitelist_enabled: bool,
    /// Requests per minute a single client IP may issue to `/verify` and
    /// `/settle` combined.
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,
    /// Gas-limit estimation bounds and overhead table.
    #[serde(default)]
    pub gas: GasSettings,
    /// Fee-profitability derivation parameters.
    #[serde(default)]
    pub fee: FeeSettings,
    /// USD price cache policy.
    #[serde(default)]
    pub price: PriceSettings,
}

impl Default for FacilitatorSettings {
    fn default() -> Self {
        Self {
            signer_private_keys: Vec::new(),
            max_queue_depth: default_max_queue_depth(),
            warning_threshold: default_warning_threshold(),
            selection_strategy: SelectionStrategyConfig::default(),
            gas_strategy: GasStrategyConfig::default(),
            receipt_timeout_secs: default_receipt_timeout_secs(),
            v2_enabled: true,
            v1_deprecated: false,
            hook_whitelist_enabled: true,
            rate_limit_per_minute: default_rate_limit_per_minute(),
            gas: GasSettings::default(),
            fee: FeeSettings::default(),
            price: PriceSettings::default(),
        }
    }
}

const fn default_max_queue_depth() -> usize {
    50
}

const fn default_warning_threshold() -> usize {
    40
}

const fn default_receipt_timeout_secs() -> u64 {
    30
}

const fn default_rate_limit_per_minute() -> u32 {
    120
}

const fn default_true() -> bool {
    true
}

/// Wire form of [`SignerSelectionStrategy`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionStrategyConfig {
    /// Cycle through signers in order.
    #[default]
    RoundRobin,
    /// Pick a signer uniformly at random.
    Random,
}

impl From<SelectionStrategyConfig> for SignerSelectionStrategy {
    fn from(value: SelectionStrategyConfig) -> Self {
        match value {
            SelectionStrategyConfig::RoundRobin => Self::RoundRobin,
            SelectionStrategyConfig::Random => Self::Random,
        }
    }
}

/// Wire form of [`GasEstimationStrategy`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GasStrategyConfig {
    /// Analytic estimate for recognized built-in hooks only.
    Code,
    /// RPC simulation of the full call.
    Simulation,
    /// Code-based when possible, simulation otherwise.
    #[default]
    Smart,
}

impl From<GasStrategyConfig> for GasEstimationStrategy {
    fn from(value: GasStrategyConfig) -> Self {
        match value {
            GasStrategyConfig::Code => Self::Code,
            GasStrategyConfig::Simulation => Self::Simulation,
            GasStrategyConfig::Smart => Self::Smart,
        }
    }
}

/// Gas-limit estimation bounds, shared across every configured network.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasSettings {
    /// Floor applied to every estimate.
    pub min_gas_limit: u64,
    /// Ceiling applied to every estimate.
    pub max_gas_limit: u64,
    /// Multiplier applied to a raw estimate before clamping.
    pub safety_multiplier: f64,
    /// Whether `Smart` may try the code-based path first.
    pub code_validation_enabled: bool,
    /// Timeout, in seconds, for the RPC `estimateGas` call.
    pub simulation_timeout_secs: u64,
    /// Base router overhead before any hook-specific cost.
    pub base_router_cost: u64,
    /// Per-built-in-hook analytic overhead, keyed by hook address.
    #[serde(default)]
    pub hook_overhead: HashMap<Address, u64>,
    /// Fixed overhead when `payTo` differs from `from`.
    pub pay_to_overhead: u64,
}

impl Default for GasSettings {
    fn default() -> Self {
        Self {
            min_gas_limit: 100_000,
            max_gas_limit: 1_000_000,
            safety_multiplier: 1.2,
            code_validation_enabled: true,
            simulation_timeout_secs: x402x_evm::GasEstimatorConfig::default_simulation_timeout().as_secs(),
            base_router_cost: 80_000,
            hook_overhead: HashMap::new(),
            pay_to_overhead: 5_000,
        }
    }
}

/// Fee-profitability derivation parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeSettings {
    /// Fraction of the facilitator fee reserved as margin before computing
    /// the gas limit it can afford.
    pub dynamic_gas_limit_margin: f64,
    /// Fraction of slack allowed when validating fee-vs-estimated-cost.
    pub validation_tolerance: f64,
}

impl Default for FeeSettings {
    fn default() -> Self {
        Self { dynamic_gas_limit_margin: 0.1, validation_tolerance: 0.05 }
    }
}

/// USD price cache policy, shared by the price oracle across networks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSettings {
    /// How long a cached price remains valid.
    pub ttl_secs: u64,
    /// How often the background refresher re-fetches.
    pub refresh_interval_secs: u64,
    /// Fallback USD price for a network with no explicit
    /// `native_price_fallback_usd` and no live feed.
    pub default_fallback_usd: f64,
}

impl Default for PriceSettings {
    fn default() -> Self {
        Self {
            ttl_secs: x402x_evm::PriceOracle::default_ttl().as_secs(),
            refresh_interval_secs: x402x_evm::PriceOracle::default_refresh_interval().as_secs(),
            default_fallback_usd: 100.0,
        }
    }
}

/// Per-network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    /// RPC endpoints, tried in order with automatic fallback.
    pub rpc_urls: Vec<RpcEndpointConfig>,
    /// Whether this chain prices gas via EIP-1559.
    #[serde(default = "default_true")]
    pub eip1559: bool,
    /// Router addresses this deployment is willing to call on this network.
    #[serde(default)]
    pub allowed_routers: Vec<Address>,
    /// Hooks allowed on this network, consulted only when
    /// `facilitator.hook_whitelist_enabled` is set.
    #[serde(default)]
    pub hook_allow_list: Vec<Address>,
    /// Clock-skew grace seconds applied to the authorization validity window.
    #[serde(default)]
    pub clock_skew_tolerance_secs: u64,
    /// How this network's gas price is determined. Defaults per
    /// [`x402x_evm::GasPriceConfig::new`]'s rule when absent.
    #[serde(default)]
    pub gas_price_strategy: Option<GasPriceStrategyConfig>,
    /// Fixed gas price (wei), used by `Static` and as the `Hybrid` fallback.
    #[serde(default)]
    pub gas_price_static_wei: Option<u128>,
    /// Native gas token USD price used once the oracle's TTL has expired
    /// with no fresh feed data.
    #[serde(default)]
    pub native_price_fallback_usd: Option<f64>,
}

/// A single RPC endpoint, with an optional per-endpoint rate limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcEndpointConfig {
    /// Endpoint URL.
    pub url: String,
    /// Requests per second this endpoint alone is throttled to.
    #[serde(default)]
    pub rate_limit: Option<u32>,
}

/// Wire form of [`GasPriceStrategy`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GasPriceStrategyConfig {
    /// Always use the configured static price.
    Static,
    /// Always query the chain.
    Dynamic,
    /// Query the chain, falling back to the static price on failure.
    Hybrid,
}

impl From<GasPriceStrategyConfig> for GasPriceStrategy {
    fn from(value: GasPriceStrategyConfig) -> Self {
        match value {
            GasPriceStrategyConfig::Static => Self::Static,
            GasPriceStrategyConfig::Dynamic => Self::Dynamic,
            GasPriceStrategyConfig::Hybrid => Self::Hybrid,
        }
    }
}

impl FacilitatorSettings {
    /// The configured receipt timeout as a [`Duration`].
    #[must_use]
    pub const fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }
}

impl GasSettings {
    /// The configured simulation timeout as a [`Duration`].
    #[must_use]
    pub const fn simulation_timeout(&self) -> Duration {
        Duration::from_secs(self.simulation_timeout_secs)
    }
}

impl PriceSettings {
    /// The configured cache TTL as a [`Duration`].
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// The configured refresh interval as a [`Duration`].
    #[must_use]
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

/// Loading a configuration file failed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path that failed to read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The (expanded) TOML content did not parse into [`FacilitatorConfig`].
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

impl FacilitatorConfig {
    /// Loads configuration from the path given by the `CONFIG` environment
    /// variable, falling back to `config.toml` in the current directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read or
    /// parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("CONFIG").unwrap_or_else(|_| "config.toml".to_owned());
        Self::load_from(&path)
    }

    /// Loads configuration from a specific file path. A missing file is
    /// treated as an empty document, so a deployment can run purely off
    /// `HOST`/`PORT` defaults plus environment-supplied overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read or
    /// parsed.
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let content = if Path::new(path).exists() {
            std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_owned(), source })?
        } else {
            String::new()
        };

        let expanded = expand_env_vars(&content);
        let mut config: Self = toml::from_str(&expanded)?;

        if let Ok(host) = std::env::var("HOST")
            && let Ok(addr) = host.parse()
        {
            config.host = addr;
        }
        if let Ok(port) = std::env::var("PORT")
            && let Ok(p) = port.parse()
        {
            config.port = p;
        }
        if let Ok(limit) = std::env::var("REQUEST_BODY_LIMIT")
            && let Ok(bytes) = limit.parse()
        {
            config.request_body_limit = bytes;
        }

        Ok(config)
    }
}

/// Expands `$VAR` and `${VAR}` patterns in a string from the process
/// environment. Unresolved variables are left as-is, so a misconfigured
/// deployment fails loudly downstream (an invalid private key or URL)
/// rather than silently substituting an empty string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }

        let braced = chars.peek() == Some(&'{');
        if braced {
            chars.next();
        }

        let mut var_name = String::new();
        while let Some(&c) = chars.peek() {
            if braced {
                if c == '}' {
                    chars.next();
                    break;
                }
            } else if !c.is_ascii_alphanumeric() && c != '_' {
                break;
            }
            var_name.push(c);
            chars.next();
        }

        if var_name.is_empty() {
            result.push('$');
            if braced {
                result.push('{');
            }
        } else if let Ok(val) = std::env::var(&var_name) {
            result.push_str(&val);
        } else {
            result.push('$');
            if braced {
                result.push('{');
            }
            result.push_str(&var_name);
            if braced {
                result.push('}');
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_braced_and_bare_variables() {
        // SAFETY-equivalent: test env vars are process-local and this test
        // does not run concurrently with others that read the same names.
        unsafe {
            std::env::set_var("X402X_TEST_VAR", "resolved");
        }
        assert_eq!(expand_env_vars("prefix-${X402X_TEST_VAR}-suffix"), "prefix-resolved-suffix");
        assert_eq!(expand_env_vars("$X402X_TEST_VAR"), "resolved");
        unsafe {
            std::env::remove_var("X402X_TEST_VAR");
        }
    }

    #[test]
    fn leaves_unresolved_variables_untouched() {
        assert_eq!(expand_env_vars("$X402X_DOES_NOT_EXIST"), "$X402X_DOES_NOT_EXIST");
        assert_eq!(expand_env_vars("${X402X_DOES_NOT_EXIST}"), "${X402X_DOES_NOT_EXIST}");
    }

    #[test]
    fn empty_config_file_uses_defaults() {
        let config: FacilitatorConfig = toml::from_str("").unwrap();
        assert_eq!(config.port, 4021);
        assert!(config.networks.is_empty());
    }

    #[test]
    fn network_config_parses_from_toml() {
        let toml_str = r#"
            [networks."eip155:84532"]
            rpc_urls = [{ url = "https://sepolia.base.org" }]
            allowed_routers = ["0x000000000000000000000000000000000000aa"]
        "#;
        let config: FacilitatorConfig = toml::from_str(toml_str).unwrap();
        let network = &config.networks["eip155:84532"];
        assert_eq!(network.rpc_urls.len(), 1);
        assert_eq!(network.allowed_routers.len(), 1);
        assert!(network.eip1559);
    }
}
