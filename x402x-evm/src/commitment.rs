//! Commitment codec: the deterministic hash that binds every router-mode
//! settlement parameter into the authorization's `nonce`.
//!
//! `authorization.nonce` must equal this hash exactly, or the EIP-712
//! signature the payer produced over `TransferWithAuthorization{..., nonce}`
//! will not match what the on-chain router recomputes — any tampering with
//! a router-mode parameter (fee, hook, salt, final recipient, …) silently
//! invalidates the signature rather than merely failing a separate check.
//! `assert_commitment` below makes that failure explicit and early.

use alloy_primitives::{Address, B256, Bytes, U256, keccak256};
use alloy_sol_types::SolValue;

/// All fields the on-chain router hashes together to produce a commitment.
///
/// Addresses are expected to already be lower-case normalized (the wire
/// types in `x402x-types` normalize on parse), since ABI encoding is
/// case-insensitive but callers should not rely on that coincidence.
#[derive(Debug, Clone)]
pub struct CommitmentParams {
    /// EIP-155 chain id the settlement will occur on.
    pub chain_id: u64,
    /// `SettlementRouter` address (the "hub").
    pub hub: Address,
    /// ERC-20-like token address.
    pub token: Address,
    /// Payer address.
    pub from: Address,
    /// Amount in atomic units.
    pub value: U256,
    /// Authorization not valid before this time.
    pub valid_after: U256,
    /// Authorization not valid at or after this time.
    pub valid_before: U256,
    /// Caller-chosen salt.
    pub salt: B256,
    /// Final recipient of settled funds.
    pub pay_to: Address,
    /// Atomic-unit fee paid to the facilitator.
    pub facilitator_fee: U256,
    /// Hook contract invoked after transfer.
    pub hook: Address,
    /// Opaque hook calldata.
    pub hook_data: Bytes,
}

/// Computes the commitment hash for a set of router-mode parameters.
///
/// Uses plain ABI encoding (`abi.encode`, not packed) over the ordered
/// tuple followed by `keccak256`, matching the router's on-chain
/// computation byte for byte.
#[must_use]
pub fn compute(params: &CommitmentParams) -> B256 {
    let encoded = (
        U256::from(params.chain_id),
        params.hub,
        params.token,
        params.from,
        params.value,
        params.valid_after,
        params.valid_before,
        params.salt,
        params.pay_to,
        params.facilitator_fee,
        params.hook,
        params.hook_data.clone(),
    )
        .abi_encode();
    keccak256(encoded)
}

/// Recomputes the commitment for `params` and compares it against the
/// authorization's claimed `nonce`.
#[must_use]
pub fn matches(params: &CommitmentParams, nonce: B256) -> bool {
    compute(params) == nonce
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    fn sample_params() -> CommitmentParams {
        CommitmentParams {
            chain_id: 84532,
            hub: address!("0x0000000000000000000000000000000000000b"),
            token: address!("0x0000000000000000000000000000000000000c"),
            from: address!("0x000000000000000000000000000000000000fa"),
            value: U256::from(1_000_000u64),
            valid_after: U256::ZERO,
            valid_before: U256::from(9_999_999_999u64),
            salt: B256::repeat_byte(0x0a),
            pay_to: address!("0x000000000000000000000000000000000000fb"),
            facilitator_fee: U256::from(10_000u64),
            hook: address!("0x000000000000000000000000000000000000fc"),
            hook_data: Bytes::new(),
        }
    }

    #[test]
    fn deterministic_for_identical_params() {
        let params = sample_params();
        assert_eq!(compute(&params), compute(&params));
    }

    #[test]
    fn any_field_change_changes_the_commitment() {
        let base = sample_params();
        let mut tampered = base.clone();
        tampered.pay_to = address!("0x0000000000000000000000000000000000dead");
        assert_ne!(compute(&base), compute(&tampered));
    }

    #[test]
    fn matches_reports_tampering() {
        let params = sample_params();
        let nonce = compute(&params);
        assert!(matches(&params, nonce));

        let mut tampered = params.clone();
        tampered.facilitator_fee = U256::from(1u64);
        assert!(!matches(&tampered, nonce));
    }
}
