//! Closed error taxonomy.
//!
//! Every component returns one of the variants below rather than a free-form
//! string or a dynamic error object. The HTTP adapter in `x402x-facilitator`
//! is the only place that converts these into wire JSON and status codes —
//! nothing else in the workspace formats an error for a client.

use serde::{Deserialize, Serialize};

/// `ClientInput ∪ PaymentInvalid`: the closed set of machine-readable
/// reasons that can appear in a `/verify` or `/settle` response's
/// `invalidReason` field.
///
/// These two categories share a wire representation because both are
/// reported the same way (402, `invalidReason` echoed, `accepts` included);
/// they differ only in *when* they are detected (schema/network policy vs.
/// payment-specific checks), which callers don't need to distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentInvalidReason {
    /// Request body failed schema validation (bad scheme, malformed address, …).
    SchemaInvalid,
    /// `network` does not resolve to a registered network.
    UnsupportedNetwork,
    /// `x402Version` is present but not a version this deployment serves.
    UnsupportedVersion,
    /// Mainnet network requested without router mode.
    StandardModeNotAllowed,
    /// EIP-712 signature did not recover to the claimed payer.
    BadSignature,
    /// `authorization.nonce` does not equal the recomputed commitment.
    CommitmentMismatch,
    /// `now > validBefore`.
    ExpiredAuthorization,
    /// `now < validAfter`.
    NotYetValid,
    /// Payer's token balance is less than `value`.
    InsufficientBalance,
    /// The router reports this commitment's salt as already settled.
    AlreadySettled,
    /// `extra.settlementRouter` is not in this network's allow-list.
    RouterNotAllowed,
    /// `extra.hook` is not in this network's hook allow-list.
    HookNotAllowed,
    /// `facilitatorFee` does not cover estimated gas plus the provider margin.
    FeeTooLow,
}

/// `Capacity`: back-pressure and lifecycle conditions from the signer pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapacityReason {
    /// Another settlement for the same normalized payer is already in flight
    /// on this network's pool.
    DuplicatePayer,
    /// The selected signer's queue is already at `maxQueueDepth`.
    QueueOverload,
    /// The pool is draining for shutdown and refuses new work.
    Shutting,
}

/// `External`: failures attributable to the chain or its RPC, surfaced with
/// whatever detail (including a parsed revert reason) the RPC layer gave us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExternalReason {
    /// The RPC endpoint could not be reached or timed out.
    RpcUnavailable,
    /// Gas estimation failed (simulation revert, timeout, or no code-based
    /// route for a custom hook).
    GasEstimationFailed,
    /// The settlement transaction was mined but reverted.
    TxReverted,
    /// The transaction was submitted but no receipt arrived within the
    /// configured timeout.
    ReceiptTimeout,
}

/// The top-level closed error type every core component returns.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FacilitatorError {
    /// A `ClientInput`/`PaymentInvalid` condition — HTTP 402 (400 for pure
    /// schema failures detected before any chain interaction).
    #[error("payment invalid: {0:?}")]
    PaymentInvalid(PaymentInvalidReason),

    /// A `Capacity` condition — HTTP 429.
    #[error("capacity exceeded: {0:?}")]
    Capacity(CapacityReason),

    /// An `External` condition — HTTP 502/504, with any parsed detail
    /// (e.g. a decoded revert reason) preserved for the caller.
    #[error("external failure ({reason:?}): {detail}")]
    External {
        /// Which external-failure bucket this falls into.
        reason: ExternalReason,
        /// Human-readable detail, e.g. a decoded revert reason.
        detail: String,
    },

    /// Anything unexpected — HTTP 500, sanitized before leaving the process.
    #[error("internal error [{correlation_id}]")]
    Internal {
        /// Correlation id included in the response so operators can grep logs.
        correlation_id: String,
    },
}

impl PaymentInvalidReason {
    /// `true` iff this reason is detected before any chain interaction —
    /// the HTTP adapter reports these as 400 rather than 402, since the
    /// request itself (not the payment) is what's wrong.
    #[must_use]
    pub const fn is_client_input(self) -> bool {
        matches!(
            self,
            Self::SchemaInvalid | Self::UnsupportedNetwork | Self::UnsupportedVersion | Self::StandardModeNotAllowed
        )
    }
}

impl FacilitatorError {
    /// Convenience constructor for an [`ExternalReason::RpcUnavailable`] error.
    #[must_use]
    pub fn rpc_unavailable(detail: impl Into<String>) -> Self {
        Self::External {
            reason: ExternalReason::RpcUnavailable,
            detail: detail.into(),
        }
    }

    /// Convenience constructor for an [`ExternalReason::GasEstimationFailed`] error.
    #[must_use]
    pub fn gas_estimation_failed(detail: impl Into<String>) -> Self {
        Self::External {
            reason: ExternalReason::GasEstimationFailed,
            detail: detail.into(),
        }
    }

    /// Convenience constructor for an internal error, generating a fresh
    /// correlation id.
    #[must_use]
    pub fn internal(correlation_id: impl Into<String>) -> Self {
        Self::Internal {
            correlation_id: correlation_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_invalid_reason_serializes_as_unit_variant_name() {
        let json = serde_json::to_string(&PaymentInvalidReason::FeeTooLow).unwrap();
        assert_eq!(json, "\"FeeTooLow\"");
    }

    #[test]
    fn only_pre_chain_reasons_are_client_input() {
        assert!(PaymentInvalidReason::SchemaInvalid.is_client_input());
        assert!(PaymentInvalidReason::UnsupportedNetwork.is_client_input());
        assert!(PaymentInvalidReason::UnsupportedVersion.is_client_input());
        assert!(PaymentInvalidReason::StandardModeNotAllowed.is_client_input());
        assert!(!PaymentInvalidReason::BadSignature.is_client_input());
        assert!(!PaymentInvalidReason::FeeTooLow.is_client_input());
    }
}
