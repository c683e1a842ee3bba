//! Gas estimator: code-based, simulation-based, and smart gas-limit
//! strategies for a `settleAndExecute` call.

use std::collections::HashMap;
use std::time::Duration;

use alloy_primitives::{Address, Bytes, U256};
use alloy_provider::Provider;
#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::contracts::SettlementRouter;

/// Which strategy produced a [`GasEstimate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasEstimationStrategy {
    /// Analytic estimate for a recognized built-in hook; no RPC call.
    Code,
    /// RPC `estimateGas` simulation of the full router call.
    Simulation,
    /// Code-based when possible, simulation otherwise.
    Smart,
}

/// Bounds and multipliers applied uniformly regardless of strategy.
#[derive(Debug, Clone, Copy)]
pub struct GasEstimatorConfig {
    /// Floor applied to every estimate.
    pub min_gas_limit: u64,
    /// Ceiling applied to every estimate.
    pub max_gas_limit: u64,
    /// Multiplier applied to a raw estimate before clamping (> 1.0).
    pub safety_multiplier: f64,
    /// Whether the `Smart` strategy is allowed to try the code-based path.
    pub code_validation_enabled: bool,
    /// Timeout for the RPC `estimateGas` call.
    pub simulation_timeout: Duration,
    /// Base router overhead (gas) before any hook-specific cost, used by
    /// the code-based strategy.
    pub base_router_cost: u64,
    /// Per-built-in-hook-type analytic overhead, keyed by hook address.
    pub hook_overhead: HashMap<Address, u64>,
    /// Fixed overhead charged when `payTo` differs from `from` (a fresh
    /// storage slot on the token, in the common case).
    pub pay_to_overhead: u64,
}

impl GasEstimatorConfig {
    /// Default timeout for simulation-based estimation (5s).
    #[must_use]
    pub const fn default_simulation_timeout() -> Duration {
        Duration::from_secs(5)
    }
}

/// All inputs the estimator needs to size a `settleAndExecute` call.
#[derive(Debug, Clone)]
pub struct SettlementGasParams {
    /// Router contract address.
    pub router: Address,
    /// Payment token address.
    pub token: Address,
    /// Payer address.
    pub from: Address,
    /// Amount in atomic units.
    pub value: U256,
    /// Authorization `validAfter`.
    pub valid_after: U256,
    /// Authorization `validBefore`.
    pub valid_before: U256,
    /// Authorization nonce (commitment in router mode).
    pub nonce: alloy_primitives::B256,
    /// Raw signature bytes.
    pub signature: Bytes,
    /// Commitment salt.
    pub salt: alloy_primitives::B256,
    /// Final recipient.
    pub pay_to: Address,
    /// Atomic-unit facilitator fee.
    pub facilitator_fee: U256,
    /// Hook contract address.
    pub hook: Address,
    /// Opaque hook calldata.
    pub hook_data: Bytes,
    /// The account that would submit the transaction (used by `estimateGas`
    /// as the `from` for the simulated call, which is the signer, not the payer).
    pub sender: Address,
}

/// A gas estimate, always clamped into `[min_gas_limit, max_gas_limit]`.
#[derive(Debug, Clone)]
pub struct GasEstimate {
    /// The clamped gas limit to submit with.
    pub gas_limit: u64,
    /// `false` only on simulation timeout or failure with no fallback.
    pub is_valid: bool,
    /// Parsed revert reason or timeout detail, when `is_valid` is `false`.
    pub error_reason: Option<String>,
    /// Which strategy actually produced this result.
    pub strategy_used: GasEstimationStrategy,
}

impl GasEstimate {
    fn clamp(raw: u64, config: &GasEstimatorConfig, strategy_used: GasEstimationStrategy) -> Self {
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let scaled = ((raw as f64) * config.safety_multiplier).ceil() as u64;
        let clamped = scaled.clamp(config.min_gas_limit, config.max_gas_limit);
        Self { gas_limit: clamped, is_valid: true, error_reason: None, strategy_used }
    }

    fn failed(config: &GasEstimatorConfig, strategy_used: GasEstimationStrategy, reason: impl Into<String>) -> Self {
        Self {
            gas_limit: config.min_gas_limit,
            is_valid: false,
            error_reason: Some(reason.into()),
            strategy_used,
        }
    }
}

/// Recognizes built-in hooks whose gas cost is known analytically.
///
/// Built-in "default transfer" / "split" / "mint" hooks have a known,
/// bounded gas footprint, looked up in [`GasEstimatorConfig::hook_overhead`]:
/// presence of an entry is what "built-in" means here.
#[must_use]
pub fn is_builtin_hook(config: &GasEstimatorConfig, hook: Address) -> bool {
    config.hook_overhead.contains_key(&hook)
}

/// Computes a gas estimate for `params` using `strategy`.
#[derive(Clone, Copy)]
pub struct GasEstimator {
    config: GasEstimatorConfig,
}

impl std::fmt::Debug for GasEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GasEstimator").finish_non_exhaustive()
    }
}

impl GasEstimator {
    /// Builds an estimator over the given bounds/overhead configuration.
    #[must_use]
    pub const fn new(config: GasEstimatorConfig) -> Self {
        Self { config }
    }

    /// Code-based analytic estimate: only valid for built-in hooks.
    #[must_use]
    pub fn estimate_code_based(&self, params: &SettlementGasParams) -> GasEstimate {
        if !is_builtin_hook(&self.config, params.hook) {
            return GasEstimate::failed(
                &self.config,
                GasEstimationStrategy::Code,
                "no analytic cost known for this hook",
            );
        }
        let hook_overhead = self.config.hook_overhead.get(&params.hook).copied().unwrap_or_default();
        let pay_to_overhead = if params.pay_to == params.from { 0 } else { self.config.pay_to_overhead };
        let raw = self.config.base_router_cost + hook_overhead + pay_to_overhead;
        GasEstimate::clamp(raw.max(self.config.min_gas_limit), &self.config, GasEstimationStrategy::Code)
    }

    /// Simulation-based estimate: RPC `estimateGas` against the real router
    /// call, bounded by `simulation_timeout`.
    #[cfg_attr(feature = "telemetry", instrument(skip_all, fields(router = %params.router)))]
    pub async fn estimate_simulated<P: Provider>(
        &self,
        provider: &P,
        params: &SettlementGasParams,
    ) -> GasEstimate {
        let contract = SettlementRouter::new(params.router, provider);
        let call = contract
            .settleAndExecute(
                params.token,
                params.from,
                params.value,
                params.valid_after,
                params.valid_before,
                params.nonce,
                params.signature.clone(),
                params.salt,
                params.pay_to,
                params.facilitator_fee,
                params.hook,
                params.hook_data.clone(),
            )
            .from(params.sender);

        match tokio::time::timeout(self.config.simulation_timeout, call.estimate_gas()).await {
            Ok(Ok(raw)) => GasEstimate::clamp(raw, &self.config, GasEstimationStrategy::Simulation),
            Ok(Err(err)) => {
                GasEstimate::failed(&self.config, GasEstimationStrategy::Simulation, parse_revert_reason(&err))
            }
            Err(_) => GasEstimate::failed(&self.config, GasEstimationStrategy::Simulation, "estimateGas timed out"),
        }
    }

    /// Smart strategy: tries code-based first when enabled and the hook is
    /// recognized, else falls through to simulation.
    pub async fn estimate_smart<P: Provider>(&self, provider: &P, params: &SettlementGasParams) -> GasEstimate {
        if self.config.code_validation_enabled && is_builtin_hook(&self.config, params.hook) {
            let code_based = self.estimate_code_based(params);
            if code_based.is_valid {
                return GasEstimate { strategy_used: GasEstimationStrategy::Smart, ..code_based };
            }
        }
        let simulated = self.estimate_simulated(provider, params).await;
        GasEstimate { strategy_used: GasEstimationStrategy::Smart, ..simulated }
    }

    /// Dispatches to the requested strategy.
    pub async fn estimate<P: Provider>(
        &self,
        provider: &P,
        params: &SettlementGasParams,
        strategy: GasEstimationStrategy,
    ) -> GasEstimate {
        match strategy {
            GasEstimationStrategy::Code => self.estimate_code_based(params),
            GasEstimationStrategy::Simulation => self.estimate_simulated(provider, params).await,
            GasEstimationStrategy::Smart => self.estimate_smart(provider, params).await,
        }
    }
}

fn parse_revert_reason<E: std::fmt::Display>(err: &E) -> String {
    err.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{B256, address};

    fn config() -> GasEstimatorConfig {
        let mut hook_overhead = HashMap::new();
        hook_overhead.insert(address!("0x00000000000000000000000000000000000001"), 40_000);
        GasEstimatorConfig {
            min_gas_limit: 100_000,
            max_gas_limit: 500_000,
            safety_multiplier: 1.2,
            code_validation_enabled: true,
            simulation_timeout: GasEstimatorConfig::default_simulation_timeout(),
            base_router_cost: 80_000,
            hook_overhead,
            pay_to_overhead: 5_000,
        }
    }

    fn params(hook: Address, pay_to: Address, from: Address) -> SettlementGasParams {
        SettlementGasParams {
            router: address!("0x000000000000000000000000000000000000aa"),
            token: address!("0x000000000000000000000000000000000000bb"),
            from,
            value: U256::from(1_000_000u64),
            valid_after: U256::ZERO,
            valid_before: U256::from(9_999_999_999u64),
            nonce: B256::repeat_byte(1),
            signature: Bytes::new(),
            salt: B256::repeat_byte(2),
            pay_to,
            facilitator_fee: U256::from(10_000u64),
            hook,
            hook_data: Bytes::new(),
            sender: address!("0x000000000000000000000000000000000000cc"),
        }
    }

    #[test]
    fn code_based_estimate_is_within_bounds() {
        let estimator = GasEstimator::new(config());
        let hook = address!("0x00000000000000000000000000000000000001");
        let p = params(hook, address!("0x00000000000000000000000000000000000003"), address!(
            "0x00000000000000000000000000000000000004"
        ));
        let estimate = estimator.estimate_code_based(&p);
        assert!(estimate.is_valid);
        assert!(estimate.gas_limit >= 100_000 && estimate.gas_limit <= 500_000);
    }

    #[test]
    fn code_based_fails_for_unknown_hook() {
        let estimator = GasEstimator::new(config());
        let hook = address!("0x00000000000000000000000000000000000009");
        let p = params(hook, address!("0x00000000000000000000000000000000000003"), address!(
            "0x00000000000000000000000000000000000004"
        ));
        let estimate = estimator.estimate_code_based(&p);
        assert!(!estimate.is_valid);
        assert_eq!(estimate.gas_limit, 100_000);
    }

    #[test]
    fn pay_to_overhead_only_applies_when_recipient_differs() {
        let estimator = GasEstimator::new(config());
        let hook = address!("0x00000000000000000000000000000000000001");
        let same = params(hook, address!("0x00000000000000000000000000000000000004"), address!(
            "0x00000000000000000000000000000000000004"
        ));
        let different = params(hook, address!("0x00000000000000000000000000000000000003"), address!(
            "0x00000000000000000000000000000000000004"
        ));
        let same_estimate = estimator.estimate_code_based(&same);
        let different_estimate = estimator.estimate_code_based(&different);
        assert!(different_estimate.gas_limit >= same_estimate.gas_limit);
    }

    #[test]
    fn estimate_above_max_is_clamped_but_still_valid() {
        let mut cfg = config();
        cfg.base_router_cost = 10_000_000;
        let estimator = GasEstimator::new(cfg);
        let hook = address!("0x00000000000000000000000000000000000001");
        let p = params(hook, address!("0x00000000000000000000000000000000000003"), address!(
            "0x00000000000000000000000000000000000004"
        ));
        let estimate = estimator.estimate_code_based(&p);
        assert!(estimate.is_valid);
        assert_eq!(estimate.gas_limit, 500_000);
    }

    /// Responds to any JSON-RPC request with a fixed `eth_estimateGas`
    /// result, echoing back whatever `id` the client sent.
    struct EstimateGasResponder(u64);

    impl wiremock::Respond for EstimateGasResponder {
        fn respond(&self, request: &wiremock::Request) -> wiremock::ResponseTemplate {
            let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
            let id = body["id"].clone();
            wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": format!("0x{:x}", self.0),
            }))
        }
    }

    #[tokio::test]
    async fn estimate_simulated_clamps_the_rpc_estimategas_result() {
        use alloy_provider::ProviderBuilder;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(EstimateGasResponder(250_000))
            .mount(&server)
            .await;

        let provider = ProviderBuilder::new().connect_http(server.uri().parse().unwrap());
        let estimator = GasEstimator::new(config());
        let hook = address!("0x00000000000000000000000000000000000009");
        let p = params(hook, address!("0x00000000000000000000000000000000000003"), address!(
            "0x00000000000000000000000000000000000004"
        ));

        let estimate = estimator.estimate_simulated(&provider, &p).await;
        assert!(estimate.is_valid);
        assert_eq!(estimate.strategy_used, GasEstimationStrategy::Simulation);
        // 250_000 * 1.2 safety multiplier, within [min, max] bounds.
        assert_eq!(estimate.gas_limit, 300_000);
    }
}
