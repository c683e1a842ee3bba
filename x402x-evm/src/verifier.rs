//! Verifier: the fixed-sequence validation pipeline shared by `/verify` and
//! (as a mandatory first step) `/settle`.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use alloy_provider::Provider;
use alloy_sol_types::SolStruct;
#[cfg(feature = "telemetry")]
use tracing::instrument;

use x402x_types::{
    Address20, ExternalReason, FacilitatorError, NetworkRegistry, PaymentInvalidReason, PaymentPayload,
    PaymentRequirements,
};

use crate::commitment::{self, CommitmentParams};
use crate::contracts::IEip3009Token;
use crate::eip712::TransferWithAuthorization;
use crate::fee_policy::{FeePolicy, FeeVerdict, HookAllowList};
use crate::gas_estimator::{GasEstimationStrategy, GasEstimator, SettlementGasParams};
use crate::oracle::gas_price::GasPriceOracle;
use crate::oracle::price::PriceOracle;
use crate::signature::StructuredSignature;
use crate::wire;

/// Which on-chain path a payload takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementMode {
    /// Direct `transferWithAuthorization` to `payTo`, no router/hook.
    Standard,
    /// Pull-and-invoke-hook through a `SettlementRouter`.
    Router,
}

/// A successful verification result.
#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    /// The payer recovered from the signature (and, for v2, cross-checked
    /// against the payload's top-level `payer`).
    pub payer: Address20,
    /// Which settlement path this payload takes.
    pub mode: SettlementMode,
}

/// A verification failure, carrying whatever payer address could still be
/// derived: the recovered payer is reported even on failure when it could
/// be derived.
#[derive(Debug, Clone)]
pub struct VerifyFailure {
    /// The closed machine-readable error, spanning payment-invalid,
    /// external/RPC, and internal conditions — not just `PaymentInvalidReason`,
    /// since a chain read failure partway through the pipeline is not the
    /// client's fault and must not be reported as a 400.
    pub error: FacilitatorError,
    /// The payer, if derivable before the failing step.
    pub payer: Option<Address20>,
}

impl VerifyFailure {
    fn new(reason: PaymentInvalidReason, payer: Option<Address20>) -> Self {
        Self { error: FacilitatorError::PaymentInvalid(reason), payer }
    }

    fn rpc_unavailable(detail: impl Into<String>, payer: Option<Address20>) -> Self {
        Self { error: FacilitatorError::rpc_unavailable(detail), payer }
    }

    fn gas_estimation_failed(detail: impl Into<String>, payer: Option<Address20>) -> Self {
        Self { error: FacilitatorError::gas_estimation_failed(detail), payer }
    }
}

/// Per-network configuration the verifier needs beyond the registry.
#[derive(Debug, Clone)]
pub struct VerifierNetworkConfig {
    /// Router addresses this deployment is willing to call on this network.
    pub allowed_routers: Vec<Address>,
    /// Seconds of clock-skew grace applied to the validity window.
    pub clock_skew_tolerance: u64,
}

/// The fixed-sequence payment verification pipeline.
pub struct Verifier {
    registry: Arc<NetworkRegistry>,
    network_configs: HashMap<String, VerifierNetworkConfig>,
    hook_allow_list: HookAllowList,
    fee_policy: FeePolicy,
    gas_estimator: GasEstimator,
    gas_price_oracle: Arc<GasPriceOracle>,
    price_oracle: Arc<PriceOracle>,
    gas_strategy: GasEstimationStrategy,
}

impl std::fmt::Debug for Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier").finish_non_exhaustive()
    }
}

impl Verifier {
    /// Builds a verifier over the given registry and per-network policy.
    #[must_use]
    pub fn new(
        registry: Arc<NetworkRegistry>,
        network_configs: HashMap<String, VerifierNetworkConfig>,
        hook_allow_list: HookAllowList,
        fee_policy: FeePolicy,
        gas_estimator: GasEstimator,
        gas_price_oracle: Arc<GasPriceOracle>,
        price_oracle: Arc<PriceOracle>,
        gas_strategy: GasEstimationStrategy,
    ) -> Self {
        Self {
            registry,
            network_configs,
            hook_allow_list,
            fee_policy,
            gas_estimator,
            gas_price_oracle,
            price_oracle,
            gas_strategy,
        }
    }

    /// Runs the full verification pipeline, start to finish.
    ///
    /// `provider` is a read-only connection to `requirements.network`'s
    /// chain; the caller (the dispatcher) resolves which provider to pass
    /// based on the already-canonicalized network.
    #[cfg_attr(feature = "telemetry", instrument(skip_all, fields(network = %requirements.network)))]
    pub async fn verify<P: Provider>(
        &self,
        provider: &P,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyOutcome, VerifyFailure> {
        // 1. Schema.
        if payload.scheme != "exact" || requirements.scheme != "exact" {
            return Err(VerifyFailure::new(PaymentInvalidReason::SchemaInvalid, None));
        }

        // 2. Network policy.
        let network_info = self
            .registry
            .resolve(&requirements.network)
            .map_err(|_| VerifyFailure::new(PaymentInvalidReason::UnsupportedNetwork, None))?;
        let canonical_network = network_info.caip2();
        let is_router_mode = requirements.is_router_mode();
        if network_info.is_mainnet() && !is_router_mode {
            return Err(VerifyFailure::new(PaymentInvalidReason::StandardModeNotAllowed, None));
        }

        let payer = payload.payer_or_authorization_from();
        let authorization = &payload.payload.authorization;
        let from = wire::address(authorization.from);

        // A v2 payload's top-level `payer` must agree with the authorization
        // it signed for; otherwise `payer` is an unverified, caller-supplied
        // claim that never goes through signature recovery below.
        if let Some(declared) = payload.payer
            && declared != authorization.from
        {
            return Err(VerifyFailure::new(PaymentInvalidReason::SchemaInvalid, Some(payer)));
        }

        let network_config = self.network_configs.get(&canonical_network);

        // 3. Mode detection already done above via `is_router_mode`.
        let mode = if is_router_mode { SettlementMode::Router } else { SettlementMode::Standard };

        if let (SettlementMode::Router, Some(extra)) = (mode, &requirements.extra) {
            let router_address = wire::address(extra.settlement_router);

            // 4. Router allow-list.
            let allowed = network_config.is_some_and(|c| c.allowed_routers.contains(&router_address));
            if !allowed {
                return Err(VerifyFailure::new(PaymentInvalidReason::RouterNotAllowed, Some(payer)));
            }

            // 5. Hook allow-list.
            let hook_address = wire::address(extra.hook);
            if !self.fee_policy.hook_allowed(&self.hook_allow_list, &canonical_network, hook_address) {
                return Err(VerifyFailure::new(PaymentInvalidReason::HookNotAllowed, Some(payer)));
            }

            // 6. Commitment check.
            let value =
                wire::parse_amount(&requirements.max_amount_required).map_err(|_| {
                    VerifyFailure::new(PaymentInvalidReason::SchemaInvalid, Some(payer))
                })?;
            let facilitator_fee = wire::parse_amount(&extra.facilitator_fee)
                .map_err(|_| VerifyFailure::new(PaymentInvalidReason::SchemaInvalid, Some(payer)))?;
            let hook_data = wire::parse_hex(&extra.hook_data)
                .map_err(|_| VerifyFailure::new(PaymentInvalidReason::SchemaInvalid, Some(payer)))?;

            let commitment_params = CommitmentParams {
                chain_id: network_info.chain_id,
                hub: router_address,
                token: wire::address(requirements.asset),
                from,
                value,
                valid_after: U256::from(authorization.valid_after.as_secs()),
                valid_before: U256::from(authorization.valid_before.as_secs()),
                salt: wire::hash32(extra.salt),
                pay_to: wire::address(extra.pay_to),
                facilitator_fee,
                hook: hook_address,
                hook_data: hook_data.clone(),
            };
            if !commitment::matches(&commitment_params, wire::hash32(authorization.nonce)) {
                return Err(VerifyFailure::new(PaymentInvalidReason::CommitmentMismatch, Some(payer)));
            }

            // 7. Signature, using the `extra`-supplied EIP-712 name/version
            // (router mode never needs an on-chain `name()`/`version()` call).
            let domain = crate::eip712::token_domain(
                &extra.name,
                &extra.version,
                network_info.chain_id,
                wire::address(requirements.asset),
            );
            self.verify_signature(provider, payload, from, &domain).await.map_err(|reason| {
                VerifyFailure::new(reason, Some(payer))
            })?;

            // 8. Validity window.
            self.assert_validity_window(authorization, network_config).map_err(|reason| {
                VerifyFailure::new(reason, Some(payer))
            })?;

            // 9. Replay.
            let router = crate::contracts::SettlementRouter::new(router_address, provider);
            let settled = router
                .isSettled(router_address, wire::hash32(extra.salt))
                .call()
                .await
                .map_err(|err| VerifyFailure::rpc_unavailable(err.to_string(), Some(payer)))?;
            if settled {
                return Err(VerifyFailure::new(PaymentInvalidReason::AlreadySettled, Some(payer)));
            }

            // 10. Balance.
            let token = IEip3009Token::new(wire::address(requirements.asset), provider);
            let balance = token
                .balanceOf(from)
                .call()
                .await
                .map_err(|err| VerifyFailure::rpc_unavailable(err.to_string(), Some(payer)))?;
            if balance < value {
                return Err(VerifyFailure::new(PaymentInvalidReason::InsufficientBalance, Some(payer)));
            }

            // 11. Fee profitability.
            let decimals = self
                .registry
                .default_asset(&canonical_network)
                .ok()
                .flatten()
                .map_or(6, |asset| asset.decimals);
            let gas_price = self.gas_price_oracle.gas_price_wei(&canonical_network).await.unwrap_or(0);
            let native_price = self.price_oracle.native_price_usd(&canonical_network).await.price;
            let gas_params = SettlementGasParams {
                router: router_address,
                token: wire::address(requirements.asset),
                from,
                value,
                valid_after: U256::from(authorization.valid_after.as_secs()),
                valid_before: U256::from(authorization.valid_before.as_secs()),
                nonce: wire::hash32(authorization.nonce),
                signature: wire::parse_signature(&payload.payload.signature)
                    .map_err(|_| VerifyFailure::new(PaymentInvalidReason::BadSignature, Some(payer)))?,
                salt: wire::hash32(extra.salt),
                pay_to: wire::address(extra.pay_to),
                facilitator_fee,
                hook: hook_address,
                hook_data,
                sender: from,
            };
            let estimate = self.gas_estimator.estimate(provider, &gas_params, self.gas_strategy).await;
            if !estimate.is_valid {
                let detail = estimate.error_reason.unwrap_or_else(|| "gas estimate unavailable".to_owned());
                return Err(VerifyFailure::gas_estimation_failed(detail, Some(payer)));
            }
            let verdict =
                self.fee_policy.validate_fee(facilitator_fee, decimals, estimate.gas_limit, gas_price, native_price);
            if verdict == FeeVerdict::TooLow {
                return Err(VerifyFailure::new(PaymentInvalidReason::FeeTooLow, Some(payer)));
            }

            return Ok(VerifyOutcome { payer, mode });
        }

        // Standard mode.
        let domain = self
            .standard_mode_domain(provider, requirements, network_info.chain_id)
            .await
            .map_err(|error| VerifyFailure { error, payer: Some(payer) })?;
        self.verify_signature(provider, payload, from, &domain).await.map_err(|reason| {
            VerifyFailure::new(reason, Some(payer))
        })?;
        self.assert_validity_window(authorization, network_config).map_err(|reason| {
            VerifyFailure::new(reason, Some(payer))
        })?;

        let token = IEip3009Token::new(wire::address(requirements.asset), provider);
        let used = token
            .authorizationState(from, wire::hash32(authorization.nonce))
            .call()
            .await
            .map_err(|err| VerifyFailure::rpc_unavailable(err.to_string(), Some(payer)))?;
        if used {
            return Err(VerifyFailure::new(PaymentInvalidReason::AlreadySettled, Some(payer)));
        }

        let value = wire::parse_amount(&requirements.max_amount_required)
            .map_err(|_| VerifyFailure::new(PaymentInvalidReason::SchemaInvalid, Some(payer)))?;
        let balance = token
            .balanceOf(from)
            .call()
            .await
            .map_err(|err| VerifyFailure::rpc_unavailable(err.to_string(), Some(payer)))?;
        if balance < value {
            return Err(VerifyFailure::new(PaymentInvalidReason::InsufficientBalance, Some(payer)));
        }

        Ok(VerifyOutcome { payer, mode })
    }

    async fn standard_mode_domain<P: Provider>(
        &self,
        provider: &P,
        requirements: &PaymentRequirements,
        chain_id: u64,
    ) -> Result<alloy_sol_types::Eip712Domain, FacilitatorError> {
        let token = IEip3009Token::new(wire::address(requirements.asset), provider);
        let (name, version) = tokio::try_join!(token.name().call(), token.version().call()).map_err(|err| {
            FacilitatorError::External { reason: ExternalReason::RpcUnavailable, detail: err.to_string() }
        })?;
        Ok(crate::eip712::token_domain(&name, &version, chain_id, wire::address(requirements.asset)))
    }

    async fn verify_signature<P: Provider>(
        &self,
        provider: &P,
        payload: &PaymentPayload,
        expected_signer: Address,
        domain: &alloy_sol_types::Eip712Domain,
    ) -> Result<(), PaymentInvalidReason> {
        let authorization = &payload.payload.authorization;
        let typed = TransferWithAuthorization {
            from: expected_signer,
            to: wire::address(authorization.to),
            value: wire::parse_amount(&authorization.value).map_err(|_| PaymentInvalidReason::SchemaInvalid)?,
            validAfter: U256::from(authorization.valid_after.as_secs()),
            validBefore: U256::from(authorization.valid_before.as_secs()),
            nonce: wire::hash32(authorization.nonce),
        };
        let digest = typed.eip712_signing_hash(domain);
        let signature_bytes = wire::parse_signature(&payload.payload.signature)
            .map_err(|_| PaymentInvalidReason::BadSignature)?;
        let structured = StructuredSignature::classify(&signature_bytes, expected_signer, &digest);
        structured.verify(provider, expected_signer, digest).await.map_err(|_| PaymentInvalidReason::BadSignature)
    }

    /// The network registry this verifier resolves against.
    ///
    /// Exposed so the settlement executor can re-derive the same
    /// per-network metadata (decimals, canonical id) without holding a
    /// second copy of the registry.
    pub(crate) fn registry(&self) -> &Arc<NetworkRegistry> {
        &self.registry
    }

    pub(crate) const fn fee_policy(&self) -> &FeePolicy {
        &self.fee_policy
    }

    pub(crate) const fn gas_estimator(&self) -> &GasEstimator {
        &self.gas_estimator
    }

    pub(crate) fn gas_price_oracle(&self) -> &Arc<GasPriceOracle> {
        &self.gas_price_oracle
    }

    pub(crate) fn price_oracle(&self) -> &Arc<PriceOracle> {
        &self.price_oracle
    }

    pub(crate) const fn gas_strategy(&self) -> GasEstimationStrategy {
        self.gas_strategy
    }

    fn assert_validity_window(
        &self,
        authorization: &x402x_types::Authorization,
        network_config: Option<&VerifierNetworkConfig>,
    ) -> Result<(), PaymentInvalidReason> {
        let tolerance = network_config.map_or(0, |c| c.clock_skew_tolerance);
        let now = x402x_types::UnixTimestamp::now();
        if authorization.valid_before.as_secs() < now.as_secs() + tolerance {
            return Err(PaymentInvalidReason::ExpiredAuthorization);
        }
        if authorization.valid_after.as_secs() > now.as_secs() + tolerance {
            return Err(PaymentInvalidReason::NotYetValid);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_provider::{ProviderBuilder, RootProvider};
    use std::time::Duration;
    use x402x_types::network::{AssetInfo, NetworkInfo};

    fn dummy_provider() -> RootProvider {
        ProviderBuilder::new().connect_http("http://127.0.0.1:1".parse().unwrap())
    }

    fn verifier() -> Verifier {
        let registry = Arc::new(NetworkRegistry::from_networks(vec![
            NetworkInfo {
                alias: "base".to_owned(),
                chain_id: 8453,
                default_rpc_url: None,
                default_asset: Some(AssetInfo {
                    address: "0x000000000000000000000000000000000000aa".parse().unwrap(),
                    decimals: 6,
                    eip712_name: "USD Coin".to_owned(),
                    eip712_version: "2".to_owned(),
                }),
                default_router: None,
                default_hooks: Vec::new(),
            },
            NetworkInfo {
                alias: "base-sepolia".to_owned(),
                chain_id: 84532,
                default_rpc_url: None,
                default_asset: None,
                default_router: None,
                default_hooks: Vec::new(),
            },
        ]));
        let gas_estimator = GasEstimator::new(crate::gas_estimator::GasEstimatorConfig {
            min_gas_limit: 100_000,
            max_gas_limit: 500_000,
            safety_multiplier: 1.2,
            code_validation_enabled: false,
            simulation_timeout: Duration::from_secs(5),
            base_router_cost: 80_000,
            hook_overhead: HashMap::new(),
            pay_to_overhead: 5_000,
        });
        let fee_policy = FeePolicy::new(crate::fee_policy::FeePolicyConfig {
            min_gas_limit: 100_000,
            max_gas_limit: 500_000,
            dynamic_gas_limit_margin: 0.0,
            validation_tolerance: 0.05,
            hook_whitelist_enabled: false,
        });
        Verifier::new(
            registry,
            HashMap::new(),
            HookAllowList::default(),
            fee_policy,
            gas_estimator,
            Arc::new(GasPriceOracle::new(HashMap::new(), HashMap::new(), GasPriceOracle::default_cache_ttl())),
            Arc::new(PriceOracle::new(
                Arc::new(crate::oracle::price::StaticPriceFeed::default()),
                PriceOracle::default_ttl(),
                PriceOracle::default_refresh_interval(),
                HashMap::new(),
                3000.0,
            )),
            GasEstimationStrategy::Simulation,
        )
    }

    fn base_requirements(network: &str, router: bool) -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".to_owned(),
            network: network.to_owned(),
            asset: "0x000000000000000000000000000000000000aa".parse().unwrap(),
            max_amount_required: "1000000".to_owned(),
            pay_to: "0x000000000000000000000000000000000000bb".parse().unwrap(),
            max_timeout_seconds: 300,
            extra: router.then(|| x402x_types::RouterExtra {
                settlement_router: "0x000000000000000000000000000000000000cc".parse().unwrap(),
                salt: "0x0101010101010101010101010101010101010101010101010101010101010a".parse().unwrap(),
                pay_to: "0x000000000000000000000000000000000000bb".parse().unwrap(),
                facilitator_fee: "10000".to_owned(),
                hook: "0x000000000000000000000000000000000000dd".parse().unwrap(),
                hook_data: "0x".to_owned(),
                name: "USDC".to_owned(),
                version: "2".to_owned(),
            }),
        }
    }

    fn base_payload(network: &str, scheme: &str) -> PaymentPayload {
        PaymentPayload {
            x402_version: 1,
            scheme: scheme.to_owned(),
            network: network.to_owned(),
            payload: x402x_types::SignedPayload {
                signature: "0xdead".to_owned(),
                authorization: x402x_types::Authorization {
                    from: "0x000000000000000000000000000000000000ee".parse().unwrap(),
                    to: "0x000000000000000000000000000000000000cc".parse().unwrap(),
                    value: "1000000".to_owned(),
                    valid_after: x402x_types::UnixTimestamp::from_secs(0),
                    valid_before: x402x_types::UnixTimestamp::from_secs(9_999_999_999),
                    nonce: "0x0101010101010101010101010101010101010101010101010101010101010a".parse().unwrap(),
                },
            },
            payer: None,
            payment_requirements: None,
        }
    }

    #[tokio::test]
    async fn schema_invalid_rejected_before_any_network_lookup() {
        let v = verifier();
        let provider = dummy_provider();
        let requirements = base_requirements("base-sepolia", false);
        let payload = base_payload("base-sepolia", "not-exact");
        let result = v.verify(&provider, &payload, &requirements).await;
        assert!(matches!(
            result,
            Err(VerifyFailure { error: FacilitatorError::PaymentInvalid(PaymentInvalidReason::SchemaInvalid), payer: None })
        ));
    }

    #[tokio::test]
    async fn standard_mode_rejected_on_mainnet() {
        let v = verifier();
        let provider = dummy_provider();
        let requirements = base_requirements("base", false);
        let payload = base_payload("base", "exact");
        let result = v.verify(&provider, &payload, &requirements).await;
        assert!(matches!(
            result,
            Err(VerifyFailure { error: FacilitatorError::PaymentInvalid(PaymentInvalidReason::StandardModeNotAllowed), .. })
        ));
    }

    #[tokio::test]
    async fn unknown_network_rejected() {
        let v = verifier();
        let provider = dummy_provider();
        let requirements = base_requirements("nowhere", false);
        let payload = base_payload("nowhere", "exact");
        let result = v.verify(&provider, &payload, &requirements).await;
        assert!(matches!(
            result,
            Err(VerifyFailure { error: FacilitatorError::PaymentInvalid(PaymentInvalidReason::UnsupportedNetwork), payer: None })
        ));
    }

    #[tokio::test]
    async fn v2_payer_mismatch_rejected_before_signature_recovery() {
        let v = verifier();
        let provider = dummy_provider();
        let requirements = base_requirements("base-sepolia", false);
        let mut payload = base_payload("base-sepolia", "exact");
        payload.x402_version = 2;
        payload.payer = Some("0x00000000000000000000000000000000000fff".parse().unwrap());
        let result = v.verify(&provider, &payload, &requirements).await;
        assert!(matches!(
            result,
            Err(VerifyFailure { error: FacilitatorError::PaymentInvalid(PaymentInvalidReason::SchemaInvalid), .. })
        ));
    }

    #[tokio::test]
    async fn v2_payer_matching_authorization_from_passes_the_gate() {
        let v = verifier();
        let provider = dummy_provider();
        let requirements = base_requirements("base-sepolia", false);
        let mut payload = base_payload("base-sepolia", "exact");
        payload.x402_version = 2;
        payload.payer = Some("0x000000000000000000000000000000000000ee".parse().unwrap());
        let result = v.verify(&provider, &payload, &requirements).await;
        // The gate passes; the request still fails later (bad dummy signature/RPC),
        // but not with the payer-mismatch SchemaInvalid.
        assert!(!matches!(
            result,
            Err(VerifyFailure { error: FacilitatorError::PaymentInvalid(PaymentInvalidReason::SchemaInvalid), .. })
        ));
    }
}
