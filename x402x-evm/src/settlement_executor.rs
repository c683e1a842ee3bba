//! Settlement executor: re-verifies, sizes gas, submits via the signer
//! pool, and awaits a receipt.
//!
//! Settlement never trusts a prior `/verify` call — every `settle` re-runs
//! the full pipeline in [`crate::verifier::Verifier`] before touching the
//! signer pool.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{B256, U256};
use alloy_provider::Provider;
#[cfg(feature = "telemetry")]
use tracing::{info, warn};

use x402x_types::{
    Address20, ExternalReason, FacilitatorError, PaymentPayload, PaymentRequirements,
};

use crate::contracts::{IEip3009Token, SettlementRouter};
use crate::gas_estimator::SettlementGasParams;
use crate::signer_pool::SignerPool;
use crate::verifier::{SettlementMode, VerifyFailure, Verifier};
use crate::wire;

/// A settlement that landed on chain.
#[derive(Debug, Clone)]
pub struct SettleOutcome {
    /// Hash of the mined settlement transaction.
    pub transaction: B256,
    /// The payer this settlement ran for.
    pub payer: Address20,
    /// Which path (standard or router) this settlement took.
    pub mode: SettlementMode,
}

/// A settlement failure, carrying whatever payer could be derived before
/// the failing step: the recovered payer is reported even on failure when
/// it could be derived.
#[derive(Debug, Clone)]
pub struct SettleFailure {
    /// The closed error this failure maps to at the HTTP boundary.
    pub error: FacilitatorError,
    /// The payer, if derivable before the failing step.
    pub payer: Option<Address20>,
}

impl SettleFailure {
    const fn new(error: FacilitatorError, payer: Option<Address20>) -> Self {
        Self { error, payer }
    }

    fn from_verify(failure: VerifyFailure) -> Self {
        Self { error: failure.error, payer: failure.payer }
    }
}

/// Runs the settlement pipeline over an already-built [`Verifier`].
pub struct SettlementExecutor {
    verifier: Arc<Verifier>,
    receipt_timeout: Duration,
}

impl std::fmt::Debug for SettlementExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementExecutor").field("receipt_timeout", &self.receipt_timeout).finish_non_exhaustive()
    }
}

impl SettlementExecutor {
    /// Builds an executor over `verifier`, awaiting receipts for at most
    /// `receipt_timeout`.
    #[must_use]
    pub const fn new(verifier: Arc<Verifier>, receipt_timeout: Duration) -> Self {
        Self { verifier, receipt_timeout }
    }

    /// Default receipt wait timeout (30s).
    #[must_use]
    pub const fn default_receipt_timeout() -> Duration {
        Duration::from_secs(30)
    }

    /// Settles `payload` against `requirements`.
    ///
    /// `reader` is a read-only connection used for re-verification and gas
    /// estimation; `pool` is the signer pool for this payload's network,
    /// used only to submit the final transaction once every prior step has
    /// passed. Estimation's `sender` field (the account alloy will simulate
    /// `from`) uses the pool's first configured signer as a stand-in, since
    /// no specific signer is chosen until admission runs after
    /// re-verification and gas estimation.
    #[cfg_attr(feature = "telemetry", tracing::instrument(skip_all, fields(network = %requirements.network)))]
    pub async fn settle<P, H>(
        &self,
        reader: &P,
        pool: &SignerPool<H>,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleOutcome, SettleFailure>
    where
        P: Provider,
        H: Provider + Clone + Send + Sync + 'static,
    {
        let outcome = self.verifier.verify(reader, payload, requirements).await.map_err(SettleFailure::from_verify)?;

        let network_info = self
            .verifier
            .registry()
            .resolve(&requirements.network)
            .map_err(|_| SettleFailure::new(FacilitatorError::internal("network resolved during verify but not during settle"), Some(outcome.payer)))?;
        let canonical_network = network_info.caip2();
        let decimals =
            self.verifier.registry().default_asset(&canonical_network).ok().flatten().map_or(6, |asset| asset.decimals);

        let authorization = &payload.payload.authorization;
        let from = wire::address(outcome.payer);
        let value = wire::parse_amount(&requirements.max_amount_required)
            .map_err(|e| SettleFailure::new(FacilitatorError::internal(e.to_string()), Some(outcome.payer)))?;
        let valid_after = U256::from(authorization.valid_after.as_secs());
        let valid_before = U256::from(authorization.valid_before.as_secs());
        let nonce = wire::hash32(authorization.nonce);
        let signature = wire::parse_signature(&payload.payload.signature)
            .map_err(|e| SettleFailure::new(FacilitatorError::internal(e.to_string()), Some(outcome.payer)))?;
        let token = wire::address(requirements.asset);

        let receipt_timeout = self.receipt_timeout;

        match (outcome.mode, &requirements.extra) {
            (SettlementMode::Router, Some(extra)) => {
                let router = wire::address(extra.settlement_router);
                let hook = wire::address(extra.hook);
                let salt = wire::hash32(extra.salt);
                let pay_to = wire::address(extra.pay_to);
                let facilitator_fee = wire::parse_amount(&extra.facilitator_fee)
                    .map_err(|e| SettleFailure::new(FacilitatorError::internal(e.to_string()), Some(outcome.payer)))?;
                let hook_data = wire::parse_hex(&extra.hook_data)
                    .map_err(|e| SettleFailure::new(FacilitatorError::internal(e.to_string()), Some(outcome.payer)))?;

                let gas_price = self.verifier.gas_price_oracle().gas_price_wei(&canonical_network).await.unwrap_or(0);
                let native_price = self.verifier.price_oracle().native_price_usd(&canonical_network).await.price;
                let effective_limit =
                    self.verifier.fee_policy().effective_gas_limit(facilitator_fee, decimals, gas_price, native_price);

                let sender_for_estimate = pool.addresses().first().copied().unwrap_or(from);
                let gas_params = SettlementGasParams {
                    router,
                    token,
                    from,
                    value,
                    valid_after,
                    valid_before,
                    nonce,
                    signature: signature.clone(),
                    salt,
                    pay_to,
                    facilitator_fee,
                    hook,
                    hook_data: hook_data.clone(),
                    sender: sender_for_estimate,
                };
                let estimate =
                    self.verifier.gas_estimator().estimate(reader, &gas_params, self.verifier.gas_strategy()).await;
                if !estimate.is_valid {
                    return Err(SettleFailure::new(
                        FacilitatorError::gas_estimation_failed(
                            estimate.error_reason.unwrap_or_else(|| "gas estimation failed".to_owned()),
                        ),
                        Some(outcome.payer),
                    ));
                }
                let gas_limit = estimate.gas_limit.min(effective_limit);

                let payer_addr = Some(from);
                let submitted = pool
                    .execute(payer_addr, move |_signer, handle| async move {
                        let contract = SettlementRouter::new(router, &handle);
                        let call = contract
                            .settleAndExecute(
                                token,
                                from,
                                value,
                                valid_after,
                                valid_before,
                                nonce,
                                signature,
                                salt,
                                pay_to,
                                facilitator_fee,
                                hook,
                                hook_data,
                            )
                            .gas(gas_limit);
                        submit_and_await(call, receipt_timeout).await
                    })
                    .await
                    .map_err(|e| SettleFailure::new(e, Some(outcome.payer)))?
                    .map_err(|e| SettleFailure::new(e, Some(outcome.payer)))?;

                #[cfg(feature = "telemetry")]
                info!(network = %canonical_network, tx = %submitted, "router settlement succeeded");

                Ok(SettleOutcome { transaction: submitted, payer: outcome.payer, mode: outcome.mode })
            }
            _ => {
                let to = wire::address(requirements.pay_to);
                let payer_addr = Some(from);
                let submitted = pool
                    .execute(payer_addr, move |_signer, handle| async move {
                        let contract = IEip3009Token::new(token, &handle);
                        let call = contract.transferWithAuthorization_1(from, to, value, valid_after, valid_before, nonce, signature);
                        submit_and_await(call, receipt_timeout).await
                    })
                    .await
                    .map_err(|e| SettleFailure::new(e, Some(outcome.payer)))?
                    .map_err(|e| SettleFailure::new(e, Some(outcome.payer)))?;

                #[cfg(feature = "telemetry")]
                info!(network = %canonical_network, tx = %submitted, "standard settlement succeeded");

                Ok(SettleOutcome { transaction: submitted, payer: outcome.payer, mode: outcome.mode })
            }
        }
    }
}

/// Sends a prepared contract call and waits for its receipt, bounded by
/// `timeout`. Shared by both the router and standard-mode submission paths.
async fn submit_and_await<P, C>(
    call: alloy_contract::SolCallBuilder<P, C>,
    timeout: Duration,
) -> Result<B256, FacilitatorError>
where
    P: Provider,
    C: alloy_sol_types::SolCall,
{
    let pending = call.send().await.map_err(|err| FacilitatorError::rpc_unavailable(err.to_string()))?;
    let tx_hash = *pending.tx_hash();
    let receipt = match tokio::time::timeout(timeout, pending.get_receipt()).await {
        Ok(Ok(receipt)) => receipt,
        Ok(Err(err)) => return Err(FacilitatorError::rpc_unavailable(err.to_string())),
        Err(_) => {
            #[cfg(feature = "telemetry")]
            warn!(tx = %tx_hash, "receipt wait timed out");
            return Err(FacilitatorError::External {
                reason: ExternalReason::ReceiptTimeout,
                detail: format!("no receipt for {tx_hash} within {}s", timeout.as_secs()),
            });
        }
    };

    if receipt.status() {
        Ok(receipt.transaction_hash)
    } else {
        Err(FacilitatorError::External {
            reason: ExternalReason::TxReverted,
            detail: format!("transaction {} reverted", receipt.transaction_hash),
        })
    }
}
