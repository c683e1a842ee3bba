//! Fixed-width hex-encoded wire types: EVM addresses and 32-byte hashes.
//!
//! Kept chain-SDK agnostic on purpose — `x402x-types` has no `alloy`
//! dependency, so these are the wire-level stand-ins for
//! `alloy_primitives::{Address, B256}` used by `x402x-evm`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A 20-byte EVM address, always normalized to lower-case hex on parse.
///
/// Normalizing on parse (rather than on use) is what makes the commitment
/// codec in `x402x-evm` deterministic regardless of how a caller cased
/// their input (checksummed or not).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address20([u8; 20]);

/// Error returned when a string does not parse as a 20-byte hex address.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid address: {0}")]
pub struct InvalidAddress(pub String);

impl Address20 {
    /// Builds an address from a raw 20-byte array known at compile time.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// The zero address, used as a sentinel for "no hook" in standard mode.
    pub const ZERO: Self = Self([0u8; 20]);

    /// Returns the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Returns `true` if this is the zero address.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl FromStr for Address20 {
    type Err = InvalidAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        if stripped.len() != 40 {
            return Err(InvalidAddress(s.to_owned()));
        }
        let mut out = [0u8; 20];
        hex::decode_to_slice(stripped, &mut out).map_err(|_| InvalidAddress(s.to_owned()))?;
        Ok(Self(out))
    }
}

impl fmt::Display for Address20 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for Address20 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address20 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A 32-byte hex value: used for authorization nonces, commitments, and salts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hash32([u8; 32]);

/// Error returned when a string does not parse as a 32-byte hex value.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid 32-byte hex value: {0}")]
pub struct InvalidHash32(pub String);

impl Hash32 {
    /// Builds a hash from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for Hash32 {
    type Err = InvalidHash32;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        if stripped.len() != 64 {
            return Err(InvalidHash32(s.to_owned()));
        }
        let mut out = [0u8; 32];
        hex::decode_to_slice(stripped, &mut out).map_err(|_| InvalidHash32(s.to_owned()))?;
        Ok(Self(out))
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for Hash32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash32 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_normalizes_case() {
        let a: Address20 = "0xAbCd000000000000000000000000000000000A".parse().unwrap();
        let b: Address20 = "0xabcd000000000000000000000000000000000a".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "0xabcd000000000000000000000000000000000a");
    }

    #[test]
    fn address_rejects_wrong_length() {
        assert!("0x1234".parse::<Address20>().is_err());
    }

    #[test]
    fn hash32_round_trips() {
        let h: Hash32 = "0x0101010101010101010101010101010101010101010101010101010101010a"
            .parse()
            .unwrap();
        assert_eq!(h.to_string().len(), 66);
    }
}
