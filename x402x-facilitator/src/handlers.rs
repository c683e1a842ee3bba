//! Axum route handlers binding the version/mode dispatcher, verifier, and
//! settlement executor to `/verify`, `/settle`, `/supported`,
//! `/calculate-fee`, and the health endpoints.
//!
//! One thin handler per route, `State<SharedAppState>` extraction, a single
//! `router` assembling them, with per-route rate limiting layered on top of
//! a shared CORS policy.

use alloy_primitives::{Address, B256, Bytes, U256};
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower::ServiceBuilder;
use tower_http::cors::{self, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;

use x402x_evm::{wire, GasEstimationStrategy, SettlementGasParams};
use x402x_types::{
    Address20, CalculateFeeRequest, CalculateFeeResponse, FacilitatorError, PaymentInvalidReason,
    PaymentRequirements, SettleRequest, SettleResponse, SupportedKind, SupportedResponse, VerifyRequest,
    VerifyResponse,
};

use crate::error::AppError;
use crate::rate_limit::RateLimitLayer;
use crate::state::SharedAppState;

/// `GET /health` — liveness only; never depends on chain connectivity.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// `GET /ready` — 200 iff at least one network has a non-empty signer pool,
/// else 503 with a per-network breakdown.
pub async fn ready(State(state): State<SharedAppState>) -> (StatusCode, Json<serde_json::Value>) {
    let checks: serde_json::Map<String, serde_json::Value> = state
        .networks
        .iter()
        .map(|(network, runtime)| {
            let signer_count = runtime.pool.as_ref().map_or(0, |pool| pool.len());
            (network.clone(), serde_json::json!({ "hasPool": signer_count > 0, "signerCount": signer_count }))
        })
        .collect();

    if state.is_ready() {
        (StatusCode::OK, Json(serde_json::json!({ "status": "ok", "checks": checks })))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(serde_json::json!({ "status": "unavailable", "checks": checks })))
    }
}

/// `GET /supported` — every `(x402Version, scheme, network)` combination
/// this deployment currently serves.
pub async fn supported(State(state): State<SharedAppState>) -> Json<SupportedResponse> {
    let mut kinds = Vec::new();
    for info in state.registry.list_supported() {
        let network = info.caip2();
        if !state.v1_deprecated {
            kinds.push(SupportedKind { x402_version: 1, scheme: "exact".to_owned(), network: network.clone() });
        }
        if state.v2_enabled {
            kinds.push(SupportedKind { x402_version: 2, scheme: "exact".to_owned(), network });
        }
    }
    Json(SupportedResponse { kinds })
}

/// `POST /verify` — runs the verification pipeline without submitting a
/// transaction.
pub async fn verify(
    State(state): State<SharedAppState>,
    Json(body): Json<VerifyRequest>,
) -> (StatusCode, Json<VerifyResponse>) {
    let version = resolve_version(&body);

    let dispatched = match state.dispatcher.dispatch(
        body.x402_version,
        body.payment_payload.x402_version,
        &body.payment_requirements,
    ) {
        Ok(dispatched) => dispatched,
        Err(reason) => return invalid_response(version, reason, None),
    };

    if let Some(embedded) = &body.payment_payload.payment_requirements
        && !requirements_match(embedded, &body.payment_requirements)
    {
        return invalid_response(version, PaymentInvalidReason::SchemaInvalid, None);
    }

    let Some(runtime) = state.networks.get(&dispatched.canonical_network) else {
        return invalid_response(version, PaymentInvalidReason::UnsupportedNetwork, None);
    };

    let reader = runtime.chain.reader();
    match state.verifier.verify(&reader, &body.payment_payload, &body.payment_requirements).await {
        Ok(outcome) => (StatusCode::OK, Json(VerifyResponse::valid(version, outcome.payer))),
        Err(failure) => {
            let status = AppError::from(failure.error.clone()).status();
            let body_json = match failure.error {
                FacilitatorError::PaymentInvalid(reason) => VerifyResponse::invalid(version, reason, failure.payer, vec![]),
                other => VerifyResponse::failed(version, failure.payer, other.to_string()),
            };
            (status, Json(body_json))
        }
    }
}

/// `POST /settle` — re-verifies and, on success, submits the settlement
/// transaction via this network's signer pool.
pub async fn settle(
    State(state): State<SharedAppState>,
    Json(body): Json<SettleRequest>,
) -> (StatusCode, Json<SettleResponse>) {
    let version = resolve_version(&body);
    let fallback_network = body.payment_requirements.network.clone();

    let dispatched = match state.dispatcher.dispatch(
        body.x402_version,
        body.payment_payload.x402_version,
        &body.payment_requirements,
    ) {
        Ok(dispatched) => dispatched,
        Err(reason) => {
            return settle_rejected(version, fallback_network, None, reason, &body.payment_requirements);
        }
    };

    if let Some(embedded) = &body.payment_payload.payment_requirements
        && !requirements_match(embedded, &body.payment_requirements)
    {
        return settle_rejected(
            version,
            dispatched.canonical_network,
            None,
            PaymentInvalidReason::SchemaInvalid,
            &body.payment_requirements,
        );
    }

    let Some(runtime) = state.networks.get(&dispatched.canonical_network) else {
        return settle_rejected(
            version,
            dispatched.canonical_network,
            None,
            PaymentInvalidReason::UnsupportedNetwork,
            &body.payment_requirements,
        );
    };

    let Some(pool) = runtime.pool.as_deref() else {
        let detail = "no signer accounts configured for this network";
        let status = AppError::from(FacilitatorError::internal(detail)).status();
        return (status, Json(SettleResponse::failed(version, dispatched.canonical_network, None, detail)));
    };

    let reader = runtime.chain.reader();
    match state.executor.settle(&reader, pool, &body.payment_payload, &body.payment_requirements).await {
        Ok(outcome) => {
            let tx = format!("{:#x}", outcome.transaction);
            (StatusCode::OK, Json(SettleResponse::success(version, tx, dispatched.canonical_network, outcome.payer)))
        }
        Err(failure) => {
            let status = AppError::from(failure.error.clone()).status();
            let body_json = match failure.error {
                FacilitatorError::PaymentInvalid(reason) => SettleResponse::rejected(
                    version,
                    dispatched.canonical_network,
                    failure.payer,
                    reason,
                    vec![body.payment_requirements.clone()],
                ),
                other => SettleResponse::failed(version, dispatched.canonical_network, failure.payer, other.to_string()),
            };
            (status, Json(body_json))
        }
    }
}

/// `POST /calculate-fee` — quotes the minimum facilitator fee and gas limit
/// a settlement through `hook` would currently require.
///
/// # Errors
///
/// Returns [`AppError`] if `network` does not resolve or `hookData` is not
/// valid hex.
pub async fn calculate_fee(
    State(state): State<SharedAppState>,
    Json(body): Json<CalculateFeeRequest>,
) -> Result<Json<CalculateFeeResponse>, AppError> {
    let network_info = state.registry.resolve(&body.network)?;
    let canonical = network_info.caip2();
    let decimals = network_info.default_asset.as_ref().map_or(6, |asset| asset.decimals);

    let gas_price = state.gas_price_oracle.gas_price_wei(&canonical).await.unwrap_or(0);
    let native_price = state.price_oracle.native_price_usd(&canonical).await.price;
    let hook = wire::address(body.hook);
    let hook_allowed = state.fee_policy.hook_allowed(&state.hook_allow_list, &canonical, hook);

    let hook_data = wire::parse_hex(&body.hook_data)
        .map_err(|_| AppError::from(FacilitatorError::PaymentInvalid(PaymentInvalidReason::SchemaInvalid)))?;

    // No authorization exists yet at quote time; every field but `hook`
    // and `hookData` is a placeholder the code-based strategy ignores.
    let params = SettlementGasParams {
        router: Address::ZERO,
        token: Address::ZERO,
        from: Address::ZERO,
        value: U256::ZERO,
        valid_after: U256::ZERO,
        valid_before: U256::ZERO,
        nonce: B256::ZERO,
        signature: Bytes::new(),
        salt: B256::ZERO,
        pay_to: Address::ZERO,
        facilitator_fee: U256::ZERO,
        hook,
        hook_data,
        sender: Address::ZERO,
    };

    let estimate = state.gas_estimator.estimate_code_based(&params);
    let minimum_fee = state.fee_policy.minimum_fee_for_gas(estimate.gas_limit, decimals, gas_price, native_price);

    Ok(Json(CalculateFeeResponse {
        facilitator_fee: minimum_fee.to_string(),
        hook_allowed,
        gas_limit: estimate.gas_limit,
        strategy_used: strategy_label(estimate.strategy_used).to_owned(),
    }))
}

const fn strategy_label(strategy: GasEstimationStrategy) -> &'static str {
    match strategy {
        GasEstimationStrategy::Code => "code",
        GasEstimationStrategy::Simulation => "simulation",
        GasEstimationStrategy::Smart => "smart",
    }
}

/// `x402Version` wins over the payload's own field when present, matching
/// the dispatcher's own resolution order.
fn resolve_version(request: &VerifyRequest) -> u32 {
    request.x402_version.unwrap_or(request.payment_payload.x402_version)
}

/// A v2 payload's embedded `paymentRequirements` must match the
/// server-supplied requirements on the five protocol-critical fields the
/// teacher's `assert_requirements_match` checks, ignoring `maxTimeoutSeconds`
/// and `extra` so harmless divergence there doesn't cause a false rejection.
fn requirements_match(accepted: &PaymentRequirements, requirements: &PaymentRequirements) -> bool {
    accepted.scheme == requirements.scheme
        && accepted.network == requirements.network
        && accepted.max_amount_required == requirements.max_amount_required
        && accepted.asset == requirements.asset
        && accepted.pay_to == requirements.pay_to
}

fn invalid_response(
    version: u32,
    reason: PaymentInvalidReason,
    payer: Option<Address20>,
) -> (StatusCode, Json<VerifyResponse>) {
    let status = if reason.is_client_input() { StatusCode::BAD_REQUEST } else { StatusCode::PAYMENT_REQUIRED };
    (status, Json(VerifyResponse::invalid(version, reason, payer, vec![])))
}

fn settle_rejected(
    version: u32,
    network: impl Into<String>,
    payer: Option<Address20>,
    reason: PaymentInvalidReason,
    requirements: &PaymentRequirements,
) -> (StatusCode, Json<SettleResponse>) {
    let status = if reason.is_client_input() { StatusCode::BAD_REQUEST } else { StatusCode::PAYMENT_REQUIRED };
    (status, Json(SettleResponse::rejected(version, network, payer, reason, vec![requirements.clone()])))
}

/// Builds the full Axum router: health/ready/supported unprotected,
/// `/verify`+`/calculate-fee` and `/settle` each behind their own per-IP
/// rate limit (settle limited tighter than verify), CORS open by default.
#[must_use]
pub fn router(state: SharedAppState) -> Router {
    let max_body_bytes = state.max_body_bytes;

    let verify_routes = Router::new()
        .route("/verify", post(verify))
        .route("/calculate-fee", post(calculate_fee))
        .layer(RateLimitLayer::new(state.verify_rate_limit));

    let settle_routes =
        Router::new().route("/settle", post(settle)).layer(RateLimitLayer::new(state.settle_rate_limit));

    let open_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/supported", get(supported));

    Router::new()
        .merge(open_routes)
        .merge(verify_routes)
        .merge(settle_routes)
        .layer(
            ServiceBuilder::new()
                .layer(RequestBodyLimitLayer::new(max_body_bytes))
                .layer(
                    CorsLayer::new()
                        .allow_origin(cors::Any)
                        .allow_methods([Method::GET, Method::POST])
                        .allow_headers(cors::Any),
                ),
        )
        .with_state(state)
}
