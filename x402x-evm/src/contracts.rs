//! Solidity interface definitions for on-chain interactions.
//!
//! Contains the minimal ABI surface the facilitator needs:
//! - [`SettlementRouter`] — pulls the payment token from the payer and
//!   invokes the chosen [`Hook`] atomically.
//! - [`Hook`] — opaque business-logic contract invoked with `hookData`.
//! - [`IEip3009Token`] — ERC-20 + ERC-3009 subset shared by router and
//!   standard-mode settlement.
//! - [`Validator6492`] — EIP-6492 universal signature validator, used only
//!   when the `eip6492` feature is enabled.

use alloy_sol_types::sol;

sol! {
    /// On-chain router that atomically pulls tokens via
    /// `transferWithAuthorization` and then invokes a hook.
    ///
    /// Only the facilitator-relevant entry point is declared; the router's
    /// own commitment hashing must match [`crate::commitment::compute`]
    /// exactly or the signature recovered on-chain will not match `from`.
    #[allow(missing_docs)]
    #[allow(clippy::too_many_arguments)]
    #[derive(Debug)]
    #[sol(rpc)]
    interface SettlementRouter {
        function settleAndExecute(
            address token,
            address from,
            uint256 value,
            uint256 validAfter,
            uint256 validBefore,
            bytes32 nonce,
            bytes signature,
            bytes32 salt,
            address payTo,
            uint256 facilitatorFee,
            address hook,
            bytes hookData
        ) external;

        function isSettled(address router, bytes32 salt) external view returns (bool);
    }
}

sol! {
    /// Business-logic contract invoked by the router after a successful
    /// pull. The facilitator never calls this directly — it only needs the
    /// selector to recognize built-in hooks for code-based gas estimation.
    #[allow(missing_docs)]
    #[derive(Debug)]
    #[sol(rpc)]
    interface Hook {
        function onSettled(address payer, address payTo, uint256 value, bytes hookData) external;
    }
}

sol! {
    /// ERC-20 + ERC-3009 subset for USDC-style tokens, used both for
    /// router-mode balance checks and for standard-mode direct settlement.
    #[allow(missing_docs)]
    #[allow(clippy::too_many_arguments)]
    #[derive(Debug)]
    #[sol(rpc)]
    interface IEip3009Token {
        function name() external view returns (string);
        function version() external view returns (string);
        function decimals() external view returns (uint8);
        function balanceOf(address account) external view returns (uint256);
        function authorizationState(address authorizer, bytes32 nonce) external view returns (bool);
        function transferWithAuthorization(
            address from,
            address to,
            uint256 value,
            uint256 validAfter,
            uint256 validBefore,
            bytes32 nonce,
            uint8 v,
            bytes32 r,
            bytes32 s
        ) external;
        function transferWithAuthorization(
            address from,
            address to,
            uint256 value,
            uint256 validAfter,
            uint256 validBefore,
            bytes32 nonce,
            bytes signature
        ) external;
    }
}

/// EIP-6492 universal signature validator, deployed at the same address on
/// every chain that supports it. Only compiled in behind the `eip6492`
/// feature — standard-mode and router-mode payers are assumed to be EOAs or
/// already-deployed EIP-1271 wallets otherwise.
#[cfg(feature = "eip6492")]
pub mod eip6492 {
    use alloy_sol_types::sol;

    sol! {
        #[allow(missing_docs)]
        #[derive(Debug)]
        #[sol(rpc)]
        interface Validator6492 {
            function isValidSigWithSideEffects(address signer, bytes32 hash, bytes calldata signature) external returns (bool);
        }
    }

    sol! {
        /// Decodable prefix of an EIP-6492 wrapped signature.
        #[derive(Debug)]
        struct Sig6492 {
            address factory;
            bytes factoryCalldata;
            bytes innerSig;
        }
    }

    /// The fixed 32-byte magic suffix defined by EIP-6492.
    pub const MAGIC_SUFFIX: [u8; 32] = alloy_primitives::hex!(
        "6492649264926492649264926492649264926492649264926492649264926492"
    );

    /// Universally deployed EIP-6492 validator address.
    pub const VALIDATOR_ADDRESS: alloy_primitives::Address =
        alloy_primitives::address!("0xdAcD51A54883eb67D95FAEb2BBfdC4a9a6BD2a3B");
}
