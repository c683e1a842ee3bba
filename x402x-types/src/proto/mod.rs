//! Wire format types for the x402x protocol.
//!
//! Covers both protocol versions the facilitator serves: v1 (`scheme`/
//! `network` flat on the payload) and v2 (adds a top-level `payer` and may
//! embed `paymentRequirements` alongside the signed payload). Rather than
//! two parallel type trees, both versions share one [`PaymentRequirements`]
//! / [`PaymentPayload`] pair — the v2-only fields are simply optional, and
//! [`PaymentPayload::is_v2`] reports which shape a given payload actually
//! took. This keeps the facilitator from ever holding a "looks like either"
//! `serde_json::Value` past the initial parse.

mod payload;
mod requirements;
mod responses;

pub use payload::{Authorization, PaymentPayload, SignedPayload};
pub use requirements::{PaymentRequirements, RouterExtra};
pub use responses::{
    CalculateFeeRequest, CalculateFeeResponse, SettleRequest, SettleResponse, SupportedKind,
    SupportedResponse, VerifyRequest, VerifyResponse,
};
