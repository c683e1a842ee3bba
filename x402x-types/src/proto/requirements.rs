//! `PaymentRequirements`: what the resource side declares a payment must
//! satisfy.

use serde::{Deserialize, Serialize};

use crate::hex_types::{Address20, Hash32};

/// Router-mode settlement parameters, carried in `PaymentRequirements.extra`.
///
/// Presence of this struct (equivalently, of `extra.settlementRouter` on the
/// wire) is what switches a request from standard mode into router mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterExtra {
    /// `SettlementRouter` contract this request pays through.
    pub settlement_router: Address20,
    /// Caller-chosen salt; combined with `settlement_router` forms the
    /// on-chain single-use key for this commitment.
    pub salt: Hash32,
    /// Final recipient of the settled funds (distinct from the router
    /// itself, which only custodies funds within the one transaction).
    pub pay_to: Address20,
    /// Atomic-unit fee paid to whichever facilitator signer submits this
    /// settlement, denominated in the same asset as the payment.
    pub facilitator_fee: String,
    /// Hook contract invoked after the transfer completes.
    pub hook: Address20,
    /// Opaque calldata forwarded to the hook.
    pub hook_data: String,
    /// EIP-712 domain `name` for the asset (overrides the asset's own
    /// `name()` when the two diverge, e.g. for proxies).
    pub name: String,
    /// EIP-712 domain `version` for the asset.
    pub version: String,
}

/// What the resource side declares a payment must satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Payment scheme; only `"exact"` is in scope.
    pub scheme: String,
    /// Alias or CAIP-2 network identifier.
    pub network: String,
    /// ERC-20-like token contract address.
    pub asset: Address20,
    /// Maximum amount required, in atomic units (kept as a decimal string
    /// to avoid precision loss in JSON number types).
    pub max_amount_required: String,
    /// Recipient address in standard mode; ignored in router mode in favor
    /// of `extra.pay_to`.
    pub pay_to: Address20,
    /// Maximum seconds the resource side will wait for settlement.
    pub max_timeout_seconds: u64,
    /// Router-mode settlement parameters. Absent ⇒ standard mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<RouterExtra>,
}

impl PaymentRequirements {
    /// Router mode iff `extra` carries a `settlementRouter`.
    #[must_use]
    pub const fn is_router_mode(&self) -> bool {
        self.extra.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> serde_json::Value {
        serde_json::json!({
            "scheme": "exact",
            "network": "eip155:84532",
            "asset": "0x036cbd53842c5426634e7929541ec2318f3dcf7e",
            "maxAmountRequired": "1000000",
            "payTo": "0x0000000000000000000000000000000000000a",
            "maxTimeoutSeconds": 300,
            "extra": {
                "settlementRouter": "0x0000000000000000000000000000000000000b",
                "salt": "0x0101010101010101010101010101010101010101010101010101010101010a",
                "payTo": "0x0000000000000000000000000000000000000c",
                "facilitatorFee": "10000",
                "hook": "0x0000000000000000000000000000000000000d",
                "hookData": "0x",
                "name": "USDC",
                "version": "2",
            },
        })
    }

    #[test]
    fn deserializes_router_mode() {
        let req: PaymentRequirements = serde_json::from_value(sample_json()).unwrap();
        assert!(req.is_router_mode());
        assert_eq!(req.extra.unwrap().facilitator_fee, "10000");
    }

    #[test]
    fn standard_mode_has_no_extra() {
        let mut json = sample_json();
        json.as_object_mut().unwrap().remove("extra");
        let req: PaymentRequirements = serde_json::from_value(json).unwrap();
        assert!(!req.is_router_mode());
    }
}
