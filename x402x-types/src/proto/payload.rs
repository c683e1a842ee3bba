//! `PaymentPayload`: the signed authorization a payer presents.

use serde::{Deserialize, Serialize};

use crate::hex_types::{Address20, Hash32};
use crate::proto::requirements::PaymentRequirements;
use crate::timestamp::UnixTimestamp;

/// An EIP-3009-shaped authorization.
///
/// In router mode, `to == settlementRouter` and `nonce` equals the
/// recomputed commitment. In standard mode, `to == payTo` and `nonce` is
/// arbitrary caller-chosen random bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    /// Payer address, also the EIP-712 signer.
    pub from: Address20,
    /// Transfer destination as seen by the token contract.
    pub to: Address20,
    /// Amount in atomic units.
    pub value: String,
    /// Authorization not valid before this time.
    pub valid_after: UnixTimestamp,
    /// Authorization not valid at or after this time.
    pub valid_before: UnixTimestamp,
    /// 32-byte nonce; the commitment in router mode, arbitrary in standard mode.
    pub nonce: Hash32,
}

/// The scheme-specific signed payload: a raw EIP-712 signature over the
/// authorization plus the authorization itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedPayload {
    /// Hex-encoded 65-byte `(r, s, v)` signature, or an EIP-1271/EIP-6492
    /// wrapped signature when the payer is a smart-contract wallet.
    pub signature: String,
    /// The authorization the signature covers.
    pub authorization: Authorization,
}

/// A complete payment payload as presented by a payer.
///
/// V1 carries just `scheme`/`network`/`payload`. V2 additionally carries a
/// top-level `payer` (redundant with `payload.authorization.from`, used to
/// fail fast on a malformed payload before touching the signature) and may
/// embed the `paymentRequirements` the payer believes it is satisfying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    /// Protocol version: `1` or `2`.
    pub x402_version: u32,
    /// Payment scheme; only `"exact"` is in scope.
    pub scheme: String,
    /// Alias or CAIP-2 network identifier.
    pub network: String,
    /// The signed authorization.
    pub payload: SignedPayload,
    /// V2 only: the payer's address, echoed outside the signed payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<Address20>,
    /// V2 only: requirements embedded by the payer alongside the payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_requirements: Option<PaymentRequirements>,
}

impl PaymentPayload {
    /// `true` iff this payload took the v2 shape.
    #[must_use]
    pub const fn is_v2(&self) -> bool {
        self.x402_version >= 2
    }

    /// The payer address: the v2 top-level field if present, otherwise the
    /// signed authorization's `from`.
    #[must_use]
    pub fn payer_or_authorization_from(&self) -> Address20 {
        self.payer.unwrap_or(self.payload.authorization.from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v1_json() -> serde_json::Value {
        serde_json::json!({
            "x402Version": 1,
            "scheme": "exact",
            "network": "eip155:84532",
            "payload": {
                "signature": "0xdead",
                "authorization": {
                    "from": "0x0000000000000000000000000000000000000a",
                    "to": "0x0000000000000000000000000000000000000b",
                    "value": "1000000",
                    "validAfter": "0",
                    "validBefore": "9999999999",
                    "nonce": "0x0101010101010101010101010101010101010101010101010101010101010a",
                },
            },
        })
    }

    #[test]
    fn v1_payload_has_no_top_level_payer() {
        let payload: PaymentPayload = serde_json::from_value(v1_json()).unwrap();
        assert!(!payload.is_v2());
        assert_eq!(
            payload.payer_or_authorization_from(),
            payload.payload.authorization.from
        );
    }

    #[test]
    fn v2_payload_prefers_top_level_payer() {
        let mut json = v1_json();
        json["x402Version"] = serde_json::json!(2);
        json["payer"] = serde_json::json!("0x000000000000000000000000000000000000ff");
        let payload: PaymentPayload = serde_json::from_value(json).unwrap();
        assert!(payload.is_v2());
        assert_ne!(
            payload.payer_or_authorization_from(),
            payload.payload.authorization.from
        );
    }
}
