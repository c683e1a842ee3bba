//! Facilitator request/response bodies: `/verify`, `/settle`,
//! `/calculate-fee`, `/supported`.

use serde::{Deserialize, Serialize};

use crate::error::PaymentInvalidReason;
use crate::hex_types::Address20;
use crate::proto::payload::PaymentPayload;
use crate::proto::requirements::PaymentRequirements;

/// Body of `POST /verify` and `POST /settle`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    /// The signed payload to check.
    pub payment_payload: PaymentPayload,
    /// The requirements to check it against.
    pub payment_requirements: PaymentRequirements,
    /// Explicit version override; defaults to `payment_payload.x402_version`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x402_version: Option<u32>,
}

/// Body of `POST /settle`. Identical shape to [`VerifyRequest`]; kept as a
/// distinct type so the two endpoints' request schemas can diverge later
/// without a breaking rename.
pub type SettleRequest = VerifyRequest;

/// Response from `POST /verify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    /// `x402Version` echoed back for client compatibility.
    pub x402_version: u32,
    /// Whether the payment passed every pipeline stage.
    pub is_valid: bool,
    /// The recovered payer, when derivable even on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<Address20>,
    /// Machine-readable reason, present iff `is_valid` is `false`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<PaymentInvalidReason>,
    /// Requirements the client may retry against, echoed on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepts: Option<Vec<PaymentRequirements>>,
    /// Free-text detail for failures that don't fit [`PaymentInvalidReason`]
    /// (external/RPC or internal errors).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerifyResponse {
    /// Builds a successful verification response.
    #[must_use]
    pub const fn valid(x402_version: u32, payer: Address20) -> Self {
        Self {
            x402_version,
            is_valid: true,
            payer: Some(payer),
            invalid_reason: None,
            accepts: None,
            error: None,
        }
    }

    /// Builds a failed verification response.
    #[must_use]
    pub fn invalid(
        x402_version: u32,
        reason: PaymentInvalidReason,
        payer: Option<Address20>,
        accepts: Vec<PaymentRequirements>,
    ) -> Self {
        Self {
            x402_version,
            is_valid: false,
            payer,
            invalid_reason: Some(reason),
            accepts: Some(accepts),
            error: None,
        }
    }

    /// Builds a failed verification response for a condition outside the
    /// closed [`PaymentInvalidReason`] taxonomy (external/RPC or internal
    /// failures), carrying free-text detail instead.
    #[must_use]
    pub fn failed(x402_version: u32, payer: Option<Address20>, detail: impl Into<String>) -> Self {
        Self {
            x402_version,
            is_valid: false,
            payer,
            invalid_reason: None,
            accepts: None,
            error: Some(detail.into()),
        }
    }
}

/// Response from `POST /settle`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    /// `x402Version` echoed back for client compatibility.
    pub x402_version: u32,
    /// Whether the settlement transaction landed successfully.
    pub success: bool,
    /// Transaction hash, present iff `success` is `true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    /// CAIP-2 network the settlement ran (or attempted to run) on.
    pub network: String,
    /// The payer, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<Address20>,
    /// Machine-readable failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<PaymentInvalidReason>,
    /// Requirements the client may retry against, echoed on pre-submission failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepts: Option<Vec<PaymentRequirements>>,
    /// Free-text detail for failures that don't fit [`PaymentInvalidReason`]
    /// (capacity, external/RPC, or internal errors).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SettleResponse {
    /// Builds a successful settlement response.
    #[must_use]
    pub fn success(
        x402_version: u32,
        transaction: impl Into<String>,
        network: impl Into<String>,
        payer: Address20,
    ) -> Self {
        Self {
            x402_version,
            success: true,
            transaction: Some(transaction.into()),
            network: network.into(),
            payer: Some(payer),
            error_reason: None,
            accepts: None,
            error: None,
        }
    }

    /// Builds a failed settlement response detected before submission.
    #[must_use]
    pub fn rejected(
        x402_version: u32,
        network: impl Into<String>,
        payer: Option<Address20>,
        reason: PaymentInvalidReason,
        accepts: Vec<PaymentRequirements>,
    ) -> Self {
        Self {
            x402_version,
            success: false,
            transaction: None,
            network: network.into(),
            payer,
            error_reason: Some(reason),
            accepts: Some(accepts),
            error: None,
        }
    }

    /// Builds a failed settlement response for a condition outside the
    /// closed [`PaymentInvalidReason`] taxonomy (capacity, external, or
    /// internal failures), carrying free-text detail instead.
    #[must_use]
    pub fn failed(
        x402_version: u32,
        network: impl Into<String>,
        payer: Option<Address20>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            x402_version,
            success: false,
            transaction: None,
            network: network.into(),
            payer,
            error_reason: None,
            accepts: None,
            error: Some(detail.into()),
        }
    }
}

/// Body of `POST /calculate-fee`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateFeeRequest {
    /// Alias or CAIP-2 network identifier.
    pub network: String,
    /// Hook contract the caller intends to invoke.
    pub hook: Address20,
    /// Opaque hook calldata, used by code-based gas estimation for built-in hooks.
    pub hook_data: String,
}

/// Response from `POST /calculate-fee`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateFeeResponse {
    /// Minimum `facilitatorFee` (atomic units) that would currently pass
    /// fee-profitability validation.
    pub facilitator_fee: String,
    /// `true` iff `hook` is on this network's allow-list.
    pub hook_allowed: bool,
    /// Gas limit the estimator chose.
    pub gas_limit: u64,
    /// Which gas-estimation strategy produced `gas_limit`.
    pub strategy_used: String,
}

/// A single `(x402Version, scheme, network)` combination this facilitator serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedKind {
    /// Protocol version this combination is served under.
    pub x402_version: u32,
    /// Payment scheme, e.g. `"exact"`.
    pub scheme: String,
    /// CAIP-2 network identifier.
    pub network: String,
}

/// Response from `GET /supported`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedResponse {
    /// Every `(version, scheme, network)` combination this deployment serves.
    pub kinds: Vec<SupportedKind>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_response_omits_accepts_field_when_serialized_as_empty_none() {
        let resp = VerifyResponse {
            x402_version: 2,
            is_valid: true,
            payer: None,
            invalid_reason: None,
            accepts: None,
            error: None,
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("accepts").is_none());
        assert!(json.get("invalidReason").is_none());
    }

    #[test]
    fn settle_rejected_carries_reason_and_accepts() {
        let resp = SettleResponse::rejected(
            2,
            "eip155:84532",
            None,
            PaymentInvalidReason::RouterNotAllowed,
            vec![],
        );
        assert!(!resp.success);
        assert_eq!(
            resp.error_reason,
            Some(PaymentInvalidReason::RouterNotAllowed)
        );
    }

    #[test]
    fn settle_failed_carries_free_text_detail_and_omits_reason() {
        let resp = SettleResponse::failed(2, "eip155:8453", None, "no receipt within 30s");
        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("no receipt within 30s"));
        assert!(resp.error_reason.is_none());
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("errorReason").is_none());
        assert_eq!(json.get("error").and_then(|v| v.as_str()), Some("no receipt within 30s"));
    }
}
