//! Price oracle: cached USD prices for native gas tokens and payment
//! assets, with a background refresher and a per-network fallback value.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy_primitives::Address;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
#[cfg(feature = "telemetry")]
use tracing::instrument;

/// Where [`PriceOracle`] pulls fresh USD prices from. Implementations talk
/// to whatever upstream a deployment uses (an HTTP price API, an on-chain
/// feed, …); the oracle itself only owns caching and fallback policy.
pub trait PriceFeed: Send + Sync {
    /// Fetches the current USD price of a network's native gas token.
    fn native_price_usd<'a>(
        &'a self,
        network: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<f64, PriceFeedError>> + Send + 'a>>;

    /// Fetches the current USD price of a token on a network.
    fn token_price_usd<'a>(
        &'a self,
        network: &'a str,
        token: Address,
    ) -> Pin<Box<dyn Future<Output = Result<f64, PriceFeedError>> + Send + 'a>>;
}

/// A [`PriceFeed`] backed by a fixed, operator-supplied price table.
///
/// Stablecoins are the only payment assets this protocol accepts, pegged to
/// USD, so a static table is a reasonable default feed; deployments that
/// need live native-asset pricing supply their own [`PriceFeed`] (e.g.
/// backed by an HTTP price API).
#[derive(Debug, Clone, Default)]
pub struct StaticPriceFeed {
    native: HashMap<String, f64>,
    token: HashMap<(String, Address), f64>,
}

impl StaticPriceFeed {
    /// Builds a feed from explicit native and token price tables.
    #[must_use]
    pub fn new(native: HashMap<String, f64>, token: HashMap<(String, Address), f64>) -> Self {
        Self { native, token }
    }
}

impl PriceFeed for StaticPriceFeed {
    fn native_price_usd<'a>(
        &'a self,
        network: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<f64, PriceFeedError>> + Send + 'a>> {
        let result = self
            .native
            .get(network)
            .copied()
            .ok_or_else(|| PriceFeedError::NotConfigured(network.to_owned()));
        Box::pin(async move { result })
    }

    fn token_price_usd<'a>(
        &'a self,
        network: &'a str,
        token: Address,
    ) -> Pin<Box<dyn Future<Output = Result<f64, PriceFeedError>> + Send + 'a>> {
        let result = self
            .token
            .get(&(network.to_owned(), token))
            .copied()
            .ok_or_else(|| PriceFeedError::NotConfigured(format!("{network}/{token}")));
        Box::pin(async move { result })
    }
}

/// A feed lookup failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PriceFeedError {
    /// No price configured/available for this key.
    #[error("no price configured for {0}")]
    NotConfigured(String),
    /// The upstream source returned an error.
    #[error("price feed error: {0}")]
    Upstream(String),
}

#[derive(Debug, Clone, Copy)]
struct CachedPrice {
    value: f64,
    fetched_at: Instant,
}

/// Cached USD prices with TTL-based expiry and a configured fallback.
#[derive(Debug)]
pub struct PriceOracle {
    feed: Arc<dyn PriceFeed>,
    native_cache: DashMap<String, CachedPrice>,
    token_cache: DashMap<(String, Address), CachedPrice>,
    /// How long a cached price remains valid after a successful fetch.
    ttl: Duration,
    /// How often the background refresher attempts to re-fetch.
    refresh_interval: Duration,
    /// Per-network fallback USD price used once TTL has expired with no
    /// fresh data available.
    fallback: HashMap<String, f64>,
    default_fallback: f64,
}

/// A price lookup and whether it came from the live feed, the stale cache,
/// or the configured fallback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceLookup {
    /// The USD price to use.
    pub price: f64,
    /// `true` iff this value came from the configured fallback table rather
    /// than a cached or freshly fetched feed result. The fee policy treats
    /// this as a signal to prefer conservative decisions.
    pub is_fallback: bool,
}

impl PriceOracle {
    /// Builds an oracle with explicit TTL/refresh intervals and fallbacks.
    #[must_use]
    pub fn new(
        feed: Arc<dyn PriceFeed>,
        ttl: Duration,
        refresh_interval: Duration,
        fallback: HashMap<String, f64>,
        default_fallback: f64,
    ) -> Self {
        Self {
            feed,
            native_cache: DashMap::new(),
            token_cache: DashMap::new(),
            ttl,
            refresh_interval,
            fallback,
            default_fallback,
        }
    }

    /// Default TTL (1 hour).
    #[must_use]
    pub const fn default_ttl() -> Duration {
        Duration::from_secs(3600)
    }

    /// Default refresh interval (10 minutes).
    #[must_use]
    pub const fn default_refresh_interval() -> Duration {
        Duration::from_secs(600)
    }

    fn fallback_for(&self, network: &str) -> f64 {
        self.fallback.get(network).copied().unwrap_or(self.default_fallback)
    }

    /// Looks up the native gas token's USD price for `network`.
    #[cfg_attr(feature = "telemetry", instrument(skip(self)))]
    pub async fn native_price_usd(&self, network: &str) -> PriceLookup {
        if let Some(cached) = self.native_cache.get(network)
            && cached.fetched_at.elapsed() < self.ttl
        {
            return PriceLookup { price: cached.value, is_fallback: false };
        }
        match self.feed.native_price_usd(network).await {
            Ok(price) => {
                self.native_cache.insert(
                    network.to_owned(),
                    CachedPrice { value: price, fetched_at: Instant::now() },
                );
                PriceLookup { price, is_fallback: false }
            }
            Err(_) => {
                if let Some(cached) = self.native_cache.get(network) {
                    PriceLookup { price: cached.value, is_fallback: false }
                } else {
                    PriceLookup { price: self.fallback_for(network), is_fallback: true }
                }
            }
        }
    }

    /// Looks up a token's USD price on `network`.
    #[cfg_attr(feature = "telemetry", instrument(skip(self)))]
    pub async fn token_price_usd(&self, network: &str, token: Address) -> PriceLookup {
        let key = (network.to_owned(), token);
        if let Some(cached) = self.token_cache.get(&key)
            && cached.fetched_at.elapsed() < self.ttl
        {
            return PriceLookup { price: cached.value, is_fallback: false };
        }
        match self.feed.token_price_usd(network, token).await {
            Ok(price) => {
                self.token_cache
                    .insert(key, CachedPrice { value: price, fetched_at: Instant::now() });
                PriceLookup { price, is_fallback: false }
            }
            Err(_) => {
                if let Some(cached) = self.token_cache.get(&key) {
                    PriceLookup { price: cached.value, is_fallback: false }
                } else {
                    PriceLookup { price: self.fallback_for(network), is_fallback: true }
                }
            }
        }
    }

    /// Spawns a background task that proactively refreshes every tracked
    /// network at `refresh_interval`, stopping once `shutdown` is cancelled.
    ///
    /// Networks are only tracked once something has looked their price up
    /// at least once; this just keeps already-warm entries from going
    /// stale under steady load.
    pub fn spawn_refresher(
        self: &Arc<Self>,
        networks: Vec<String>,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let oracle = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(oracle.refresh_interval);
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        for network in &networks {
                            let _ = oracle.feed.native_price_usd(network).await.map(|price| {
                                oracle.native_cache.insert(
                                    network.clone(),
                                    CachedPrice { value: price, fetched_at: Instant::now() },
                                );
                            });
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oracle_with(native: HashMap<String, f64>) -> PriceOracle {
        let feed = Arc::new(StaticPriceFeed::new(native, HashMap::new()));
        PriceOracle::new(
            feed,
            PriceOracle::default_ttl(),
            PriceOracle::default_refresh_interval(),
            HashMap::from([("base".to_owned(), 3000.0)]),
            100.0,
        )
    }

    #[tokio::test]
    async fn returns_configured_price() {
        let oracle = oracle_with(HashMap::from([("base".to_owned(), 3100.5)]));
        let lookup = oracle.native_price_usd("base").await;
        assert_eq!(lookup.price, 3100.5);
        assert!(!lookup.is_fallback);
    }

    #[tokio::test]
    async fn falls_back_when_unconfigured() {
        let oracle = oracle_with(HashMap::new());
        let lookup = oracle.native_price_usd("base").await;
        assert_eq!(lookup.price, 3000.0);
        assert!(lookup.is_fallback);
    }

    #[tokio::test]
    async fn falls_back_to_generic_default_for_unknown_network() {
        let oracle = oracle_with(HashMap::new());
        let lookup = oracle.native_price_usd("polygon").await;
        assert_eq!(lookup.price, 100.0);
        assert!(lookup.is_fallback);
    }
}
