#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Wire protocol types, network registry, and the closed error taxonomy
//! shared by every x402x facilitator component.
//!
//! This crate has no knowledge of any particular chain SDK or RPC
//! transport — it only describes the shapes that cross the wire and the
//! pure, deterministic network lookup that every component needs. Chain
//! I/O, including the commitment codec (which needs `keccak256` to match
//! the on-chain router), lives in `x402x-evm`.

pub mod error;
pub mod hex_types;
pub mod network;
pub mod proto;
pub mod timestamp;

pub use error::{CapacityReason, ExternalReason, FacilitatorError, PaymentInvalidReason};
pub use hex_types::{Address20, Hash32};
pub use network::{AssetInfo, NetworkInfo, NetworkRegistry, UnknownNetwork};
pub use proto::{
    Authorization, CalculateFeeRequest, CalculateFeeResponse, PaymentPayload, PaymentRequirements,
    RouterExtra, SettleRequest, SettleResponse, SignedPayload, SupportedKind, SupportedResponse,
    VerifyRequest, VerifyResponse,
};
pub use timestamp::UnixTimestamp;
