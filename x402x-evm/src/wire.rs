//! Conversions between `x402x-types`' chain-agnostic wire types
//! (`Address20`, `Hash32`, decimal-string amounts) and `alloy`'s native
//! types. `x402x-types` has no `alloy` dependency by design, so every
//! component in this crate that reads a wire payload passes through here
//! first.

use alloy_primitives::{Address, B256, Bytes, U256};
use x402x_types::{Address20, Hash32};

/// A wire value did not convert cleanly into its on-chain representation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WireConversionError {
    /// An amount string was not a valid base-10 unsigned integer.
    #[error("invalid atomic amount: {0}")]
    InvalidAmount(String),
    /// A hex blob (e.g. `hookData` or a signature) did not decode.
    #[error("invalid hex data: {0}")]
    InvalidHex(String),
}

/// Converts a chain-agnostic address into its `alloy` representation.
#[must_use]
pub fn address(value: Address20) -> Address {
    Address::from(*value.as_bytes())
}

/// Converts an `alloy` address back into the chain-agnostic wire type.
#[must_use]
pub fn address_to_wire(value: Address) -> Address20 {
    Address20::from_bytes(value.into_array())
}

/// Converts a chain-agnostic 32-byte hash into its `alloy` representation.
#[must_use]
pub fn hash32(value: Hash32) -> B256 {
    B256::from(*value.as_bytes())
}

/// Parses a decimal-string atomic amount into a `U256`.
///
/// # Errors
///
/// Returns [`WireConversionError::InvalidAmount`] if `amount` is not a
/// valid base-10 unsigned integer.
pub fn parse_amount(amount: &str) -> Result<U256, WireConversionError> {
    U256::from_str_radix(amount, 10).map_err(|_| WireConversionError::InvalidAmount(amount.to_owned()))
}

/// Parses a `0x`-prefixed (or bare) hex blob into [`Bytes`].
///
/// # Errors
///
/// Returns [`WireConversionError::InvalidHex`] if `data` is not valid hex.
pub fn parse_hex(data: &str) -> Result<Bytes, WireConversionError> {
    let stripped = data.strip_prefix("0x").unwrap_or(data);
    hex::decode(stripped)
        .map(Bytes::from)
        .map_err(|_| WireConversionError::InvalidHex(data.to_owned()))
}

/// Parses a raw signature hex string into [`Bytes`] (kept distinct from
/// [`parse_hex`] so call sites read as intent rather than incidental reuse).
///
/// # Errors
///
/// Returns [`WireConversionError::InvalidHex`] if `signature` is not valid hex.
pub fn parse_signature(signature: &str) -> Result<Bytes, WireConversionError> {
    parse_hex(signature)
}
