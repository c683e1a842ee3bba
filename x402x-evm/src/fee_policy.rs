//! Fee policy: effective gas limit derivation, fee-profitability
//! validation, and hook allow-list enforcement.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};

/// Bounds and tolerances the fee policy applies.
#[derive(Debug, Clone, Copy)]
pub struct FeePolicyConfig {
    /// Floor for any derived or validated gas limit.
    pub min_gas_limit: u64,
    /// Ceiling for any derived or validated gas limit.
    pub max_gas_limit: u64,
    /// Fraction of the facilitator fee reserved as provider profit before
    /// computing how much gas the remainder can afford (`0` = spend the fee
    /// entirely on gas).
    pub dynamic_gas_limit_margin: f64,
    /// Fraction of slack allowed when validating fee-vs-estimated-cost: fee
    /// is valid if it covers at least `(1 - tolerance)` of the estimated
    /// on-chain cost.
    pub validation_tolerance: f64,
    /// Whether hooks are restricted to an explicit per-network allow-list.
    pub hook_whitelist_enabled: bool,
}

/// Per-network hook allow-list, only consulted when
/// [`FeePolicyConfig::hook_whitelist_enabled`] is set.
#[derive(Debug, Clone, Default)]
pub struct HookAllowList {
    allowed: HashMap<String, Vec<Address>>,
}

impl HookAllowList {
    /// Builds an allow-list from a per-network table.
    #[must_use]
    pub fn new(allowed: HashMap<String, Vec<Address>>) -> Self {
        Self { allowed }
    }

    /// `true` iff `hook` is allow-listed for `network`.
    #[must_use]
    pub fn is_allowed(&self, network: &str, hook: Address) -> bool {
        self.allowed.get(network).is_some_and(|hooks| hooks.contains(&hook))
    }
}

/// A fee-validity verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeVerdict {
    /// The facilitator fee covers the estimated cost within tolerance.
    Sufficient,
    /// The facilitator fee falls short of the estimated cost.
    TooLow,
}

/// Computes effective gas limits and validates fee profitability.
#[derive(Debug, Clone, Copy)]
pub struct FeePolicy {
    config: FeePolicyConfig,
}

impl FeePolicy {
    /// Builds a policy over `config`.
    #[must_use]
    pub const fn new(config: FeePolicyConfig) -> Self {
        Self { config }
    }

    /// Derives the effective gas limit the facilitator fee can afford.
    ///
    /// `facilitator_fee` and `decimals` describe the payment token amount;
    /// `gas_price_wei` and `native_price_usd` are the current oracle reads.
    /// Falls back to `min_gas_limit` if `native_price_usd` is non-positive
    /// or non-finite.
    #[must_use]
    pub fn effective_gas_limit(
        &self,
        facilitator_fee: U256,
        decimals: u8,
        gas_price_wei: u128,
        native_price_usd: f64,
    ) -> u64 {
        if !native_price_usd.is_finite() || native_price_usd <= 0.0 {
            return self.config.min_gas_limit;
        }

        let fee_usd = atomic_to_usd(facilitator_fee, decimals);
        let available_usd = fee_usd * (1.0 - self.config.dynamic_gas_limit_margin);
        if gas_price_wei == 0 {
            return self.config.max_gas_limit;
        }

        #[allow(clippy::cast_precision_loss)]
        let gas_price_eth = (gas_price_wei as f64) / 1e18_f64;
        let max_affordable_gas = available_usd / native_price_usd / gas_price_eth;

        if !max_affordable_gas.is_finite() {
            return self.config.min_gas_limit;
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let affordable = max_affordable_gas.max(0.0) as u64;
        affordable.clamp(self.config.min_gas_limit, self.config.max_gas_limit)
    }

    /// Validates that `facilitator_fee` covers `estimated_gas_limit` at
    /// `gas_price_wei`/`native_price_usd`, within `validation_tolerance`.
    ///
    /// Applied identically regardless of which estimation strategy produced
    /// `estimated_gas_limit` (DESIGN.md Open Question decision).
    #[must_use]
    pub fn validate_fee(
        &self,
        facilitator_fee: U256,
        decimals: u8,
        estimated_gas_limit: u64,
        gas_price_wei: u128,
        native_price_usd: f64,
    ) -> FeeVerdict {
        let fee_usd = atomic_to_usd(facilitator_fee, decimals);
        #[allow(clippy::cast_precision_loss)]
        let gas_price_eth = (gas_price_wei as f64) / 1e18_f64;
        #[allow(clippy::cast_precision_loss)]
        let required_usd =
            (estimated_gas_limit as f64) * gas_price_eth * native_price_usd * (1.0 - self.config.validation_tolerance);

        if fee_usd >= required_usd {
            FeeVerdict::Sufficient
        } else {
            FeeVerdict::TooLow
        }
    }

    /// `true` iff `hook` is permitted for `network`, given `allow_list` and
    /// this policy's `hook_whitelist_enabled` flag.
    #[must_use]
    pub fn hook_allowed(&self, allow_list: &HookAllowList, network: &str, hook: Address) -> bool {
        !self.config.hook_whitelist_enabled || allow_list.is_allowed(network, hook)
    }

    /// The algebraic inverse of [`Self::validate_fee`]: the smallest
    /// `facilitatorFee` (atomic units) that would currently pass validation
    /// for `gas_limit` at the given gas price and native price. Used by
    /// `/calculate-fee` to quote a minimum fee before a payload exists.
    #[must_use]
    pub fn minimum_fee_for_gas(&self, gas_limit: u64, decimals: u8, gas_price_wei: u128, native_price_usd: f64) -> U256 {
        if !native_price_usd.is_finite() || native_price_usd <= 0.0 {
            return U256::ZERO;
        }
        #[allow(clippy::cast_precision_loss)]
        let gas_price_eth = (gas_price_wei as f64) / 1e18_f64;
        let required_usd = (gas_limit as f64) * gas_price_eth * native_price_usd * (1.0 - self.config.validation_tolerance);
        usd_to_atomic(required_usd.max(0.0), decimals)
    }
}

#[allow(clippy::cast_precision_loss)]
fn atomic_to_usd(amount: U256, decimals: u8) -> f64 {
    let scale = 10f64.powi(i32::from(decimals));
    let amount_f64: f64 = amount.to_string().parse().unwrap_or(0.0);
    amount_f64 / scale
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn usd_to_atomic(amount_usd: f64, decimals: u8) -> U256 {
    let scale = 10f64.powi(i32::from(decimals));
    let atomic = (amount_usd * scale).ceil();
    if !atomic.is_finite() || atomic <= 0.0 {
        return U256::ZERO;
    }
    U256::from_str_radix(&format!("{atomic:.0}"), 10).unwrap_or(U256::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    fn policy() -> FeePolicy {
        FeePolicy::new(FeePolicyConfig {
            min_gas_limit: 100_000,
            max_gas_limit: 1_000_000,
            dynamic_gas_limit_margin: 0.0,
            validation_tolerance: 0.05,
            hook_whitelist_enabled: true,
        })
    }

    #[test]
    fn fee_too_low_matches_the_spec_scenario() {
        // facilitatorFee 100 (0.0001 USDC, 6 decimals), gasPrice 10 gwei, ETH $3000.
        let fee = U256::from(100u64);
        let gas_price_wei = 10_000_000_000u128;
        let verdict = policy().validate_fee(fee, 6, 200_000, gas_price_wei, 3000.0);
        assert_eq!(verdict, FeeVerdict::TooLow);
    }

    #[test]
    fn sufficient_fee_passes_validation() {
        // facilitatorFee covers 200_000 gas at 10 gwei and $3000 ETH plus margin.
        let required_usd = 200_000.0 * 10e-9 * 3000.0;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let fee_atomic = ((required_usd * 1.1) * 1_000_000.0) as u64;
        let fee = U256::from(fee_atomic);
        let verdict = policy().validate_fee(fee, 6, 200_000, 10_000_000_000u128, 3000.0);
        assert_eq!(verdict, FeeVerdict::Sufficient);
    }

    #[test]
    fn effective_gas_limit_is_clamped() {
        let p = policy();
        // Enormous fee would afford far more gas than the cap allows.
        let huge_fee = U256::from(1_000_000_000u64);
        let limit = p.effective_gas_limit(huge_fee, 6, 1_000_000_000u128, 3000.0);
        assert!(limit <= 1_000_000);

        // Tiny fee floors at the minimum.
        let tiny_fee = U256::from(1u64);
        let limit = p.effective_gas_limit(tiny_fee, 6, 10_000_000_000u128, 3000.0);
        assert_eq!(limit, 100_000);
    }

    #[test]
    fn non_finite_native_price_falls_back_to_minimum() {
        let p = policy();
        let fee = U256::from(1_000_000u64);
        let limit = p.effective_gas_limit(fee, 6, 10_000_000_000u128, 0.0);
        assert_eq!(limit, 100_000);
        let limit = p.effective_gas_limit(fee, 6, 10_000_000_000u128, f64::NAN);
        assert_eq!(limit, 100_000);
    }

    #[test]
    fn hook_allow_list_blocks_unknown_hooks_when_enabled() {
        let p = policy();
        let allowed = address!("0x0000000000000000000000000000000000000a");
        let unknown = address!("0x0000000000000000000000000000000000000b");
        let mut table = HashMap::new();
        table.insert("eip155:84532".to_owned(), vec![allowed]);
        let list = HookAllowList::new(table);
        assert!(p.hook_allowed(&list, "eip155:84532", allowed));
        assert!(!p.hook_allowed(&list, "eip155:84532", unknown));
    }

    #[test]
    fn hook_allow_list_permits_everything_when_disabled() {
        let mut config = policy();
        config = FeePolicy::new(FeePolicyConfig { hook_whitelist_enabled: false, ..config.config });
        let unknown = address!("0x0000000000000000000000000000000000000b");
        let list = HookAllowList::default();
        assert!(config.hook_allowed(&list, "eip155:84532", unknown));
    }

    #[test]
    fn minimum_fee_for_gas_is_the_inverse_of_validate_fee() {
        let p = policy();
        let fee = p.minimum_fee_for_gas(200_000, 6, 10_000_000_000u128, 3000.0);
        assert_eq!(p.validate_fee(fee, 6, 200_000, 10_000_000_000u128, 3000.0), FeeVerdict::Sufficient);
        let one_atomic_unit_less = fee - U256::from(1u64);
        assert_eq!(
            p.validate_fee(one_atomic_unit_less, 6, 200_000, 10_000_000_000u128, 3000.0),
            FeeVerdict::TooLow
        );
    }

    #[test]
    fn minimum_fee_for_gas_is_zero_for_non_finite_native_price() {
        let p = policy();
        assert_eq!(p.minimum_fee_for_gas(200_000, 6, 10_000_000_000u128, 0.0), U256::ZERO);
        assert_eq!(p.minimum_fee_for_gas(200_000, 6, 10_000_000_000u128, f64::NAN), U256::ZERO);
    }
}
