//! EIP-712 typed-data struct and domain construction shared by router mode
//! and standard mode.

use alloy_primitives::Address;
use alloy_sol_types::{Eip712Domain, eip712_domain, sol};

sol! {
    /// The typed-data struct every payer signs, in both modes.
    ///
    /// In router mode `to == settlementRouter` and `nonce` is the
    /// commitment; in standard mode `to == payTo` and `nonce` is arbitrary.
    #[derive(Debug)]
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
}

/// Builds the EIP-712 domain for a token, given its on-chain (or
/// `extra`-overridden) `name`/`version`.
#[must_use]
pub fn token_domain(name: &str, version: &str, chain_id: u64, asset: Address) -> Eip712Domain {
    eip712_domain! {
        name: name,
        version: version,
        chain_id: chain_id,
        verifying_contract: asset,
    }
}
