//! Per-network RPC connection: transport fallback/throttling plus the
//! per-signer provider fillers (gas, nonce, chain id).
//!
//! One [`ChainConnection`] is built per configured network; the signer pool
//! (`x402x-evm::signer_pool`) then derives one [`SignerProvider`] per signer
//! account from it, so every account gets its own nonce-filled, wallet-bound
//! provider while sharing the same underlying transport.

use std::num::NonZeroUsize;
use std::sync::Arc;

use alloy_network::EthereumWallet;
use alloy_provider::fillers::{
    BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, Identity, JoinFill, NonceFiller,
    WalletFiller,
};
use alloy_provider::{ProviderBuilder, RootProvider};
use alloy_rpc_client::RpcClient;
use alloy_signer_local::PrivateKeySigner;
use alloy_transport::layers::{FallbackLayer, ThrottleLayer};
use alloy_transport_http::Http;
use tower::ServiceBuilder;
use url::Url;

use crate::chain::nonce::PendingNonceManager;

/// Combined filler stack: gas, blob gas, nonce (via [`PendingNonceManager`]), chain id.
pub type ConnectionFiller =
    JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller<PendingNonceManager>, ChainIdFiller>>>;

/// A fully composed, wallet-bound provider for exactly one signer account.
pub type SignerProvider =
    FillProvider<JoinFill<JoinFill<Identity, ConnectionFiller>, WalletFiller<EthereumWallet>>, RootProvider>;

/// An RPC endpoint with an optional per-endpoint rate limit (requests/sec).
#[derive(Debug, Clone)]
pub struct RpcEndpoint {
    /// Endpoint URL.
    pub url: Url,
    /// Optional throttle applied to this endpoint only.
    pub rate_limit: Option<u32>,
}

/// Failed to build a chain connection: no usable RPC endpoints were configured.
#[derive(Debug, Clone, thiserror::Error)]
#[error("no HTTP(S) RPC endpoints configured for chain {0}")]
pub struct NoRpcEndpoints(pub u64);

/// Shared per-network RPC transport plus the nonce manager every signer on
/// this network's provider draws from.
#[derive(Debug, Clone)]
pub struct ChainConnection {
    chain_id: u64,
    client: RpcClient,
    nonce_manager: PendingNonceManager,
    eip1559: bool,
}

impl ChainConnection {
    /// Builds a fallback/throttled RPC transport across `endpoints`.
    ///
    /// # Errors
    ///
    /// Returns [`NoRpcEndpoints`] if none of `endpoints` use an `http(s)` scheme.
    pub fn new(chain_id: u64, endpoints: &[RpcEndpoint], eip1559: bool) -> Result<Self, NoRpcEndpoints> {
        let transports: Vec<_> = endpoints
            .iter()
            .filter(|e| matches!(e.url.scheme(), "http" | "https"))
            .map(|e| {
                ServiceBuilder::new()
                    .layer(ThrottleLayer::new(e.rate_limit.unwrap_or(u32::MAX)))
                    .service(Http::new(e.url.clone()))
            })
            .collect();
        let count = NonZeroUsize::new(transports.len()).ok_or(NoRpcEndpoints(chain_id))?;
        let fallback = ServiceBuilder::new()
            .layer(FallbackLayer::default().with_active_transport_count(count))
            .service(transports);
        Ok(Self {
            chain_id,
            client: RpcClient::new(fallback, false),
            nonce_manager: PendingNonceManager::default(),
            eip1559,
        })
    }

    /// This connection's chain id.
    #[must_use]
    pub const fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Whether this network prices gas via EIP-1559 (`maxFeePerGas`/`maxPriorityFeePerGas`)
    /// rather than a legacy `gasPrice`.
    #[must_use]
    pub const fn eip1559(&self) -> bool {
        self.eip1559
    }

    /// Forces the next transaction from `signer` on this connection to
    /// re-query its nonce from the chain.
    pub async fn reset_nonce(&self, signer: alloy_primitives::Address) {
        self.nonce_manager.reset_nonce(signer).await;
    }

    /// Builds a wallet-bound, nonce-filled provider for a single signer,
    /// sharing this connection's transport.
    #[must_use]
    pub fn provider_for_signer(&self, signer: PrivateKeySigner) -> SignerProvider {
        let wallet = EthereumWallet::from(signer);
        let filler = JoinFill::new(
            GasFiller,
            JoinFill::new(
                BlobGasFiller::default(),
                JoinFill::new(
                    NonceFiller::new(self.nonce_manager.clone()),
                    ChainIdFiller::default(),
                ),
            ),
        );
        ProviderBuilder::default()
            .filler(filler)
            .wallet(wallet)
            .connect_client(self.client.clone())
    }

    /// A plain read-only provider over this connection's transport, for
    /// calls that need no signer (oracles, balance/allow-list checks).
    #[must_use]
    pub fn reader(&self) -> RootProvider {
        RootProvider::new(self.client.clone())
    }
}

/// Reference-counted handle, cheaply cloned into every signer-pool worker.
pub type SharedChainConnection = Arc<ChainConnection>;
