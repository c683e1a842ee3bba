//! Unix timestamp utilities for payment authorization validity windows.
//!
//! Used throughout the protocol for `validAfter`/`validBefore` bounds on
//! EIP-3009-shaped authorizations.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::ops::Add;
use std::time::{SystemTime, UNIX_EPOCH};

/// A Unix timestamp, seconds since the epoch.
///
/// Serialized as a stringified integer to avoid precision loss in JSON
/// consumers whose number type cannot safely represent all 64-bit integers.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Ord, Eq)]
pub struct UnixTimestamp(u64);

impl UnixTimestamp {
    /// The current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self(secs)
    }

    /// Builds a timestamp from raw seconds.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Returns the raw seconds value.
    #[must_use]
    pub const fn as_secs(self) -> u64 {
        self.0
    }
}

impl Serialize for UnixTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for UnixTimestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum StrOrInt {
            Str(String),
            Int(u64),
        }
        let value = StrOrInt::deserialize(deserializer)?;
        let ts = match value {
            StrOrInt::Int(n) => n,
            StrOrInt::Str(s) => s
                .parse::<u64>()
                .map_err(|_| serde::de::Error::custom("timestamp must be a non-negative integer"))?,
        };
        Ok(Self(ts))
    }
}

impl Display for UnixTimestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add<u64> for UnixTimestamp {
    type Output = Self;

    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_string() {
        let ts = UnixTimestamp::from_secs(1_700_000_000);
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"1700000000\"");
    }

    #[test]
    fn deserializes_from_string_or_int() {
        let from_str: UnixTimestamp = serde_json::from_str("\"42\"").unwrap();
        let from_int: UnixTimestamp = serde_json::from_str("42").unwrap();
        assert_eq!(from_str, UnixTimestamp::from_secs(42));
        assert_eq!(from_int, UnixTimestamp::from_secs(42));
    }
}
