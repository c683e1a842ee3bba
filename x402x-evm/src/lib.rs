#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! EVM chain logic for the x402x facilitator: commitment hashing, signature
//! verification, gas estimation, fee policy, oracles, the signer pool, and
//! the settlement pipeline that ties them together.
//!
//! This crate has no HTTP surface of its own — the facilitator binary is the
//! only thing that constructs a [`verifier::Verifier`] /
//! [`settlement_executor::SettlementExecutor`] and drives them from a
//! network.

pub mod chain;
pub mod commitment;
pub mod contracts;
pub mod dispatcher;
pub mod eip712;
pub mod fee_policy;
pub mod gas_estimator;
pub mod oracle;
pub mod settlement_executor;
pub mod signature;
pub mod signer_pool;
pub mod verifier;
pub mod wire;

pub use chain::{ChainConnection, NoRpcEndpoints, RpcEndpoint, SharedChainConnection, SignerProvider};
pub use commitment::CommitmentParams;
pub use dispatcher::{DispatchedRequest, Dispatcher, RequestKind, VersionPolicy};
pub use eip712::TransferWithAuthorization;
pub use fee_policy::{FeePolicy, FeePolicyConfig, FeeVerdict, HookAllowList};
pub use gas_estimator::{GasEstimate, GasEstimationStrategy, GasEstimator, GasEstimatorConfig, SettlementGasParams};
pub use oracle::gas_price::{GasPriceConfig, GasPriceOracle, GasPriceSource, GasPriceStrategy};
pub use oracle::price::{PriceFeed, PriceLookup, PriceOracle, StaticPriceFeed};
pub use settlement_executor::{SettleFailure, SettleOutcome, SettlementExecutor};
pub use signature::StructuredSignature;
pub use signer_pool::{SignerPool, SignerSelectionStrategy};
pub use verifier::{SettlementMode, Verifier, VerifierNetworkConfig, VerifyFailure, VerifyOutcome};
pub use wire::WireConversionError;
