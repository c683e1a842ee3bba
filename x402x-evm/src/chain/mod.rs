//! EVM chain connectivity: RPC transport, per-signer provider fillers, and
//! nonce tracking.

pub mod nonce;
pub mod provider;

pub use nonce::PendingNonceManager;
pub use provider::{ChainConnection, NoRpcEndpoints, RpcEndpoint, SharedChainConnection, SignerProvider};
