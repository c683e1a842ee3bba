//! Pending-nonce tracking for concurrent settlement submission.
//!
//! Each network's signer pool drives one [`PendingNonceManager`] per
//! account-scoped provider. Nonces are cached after the first on-chain
//! lookup and incremented locally; a failed submission resets the cached
//! value so the next attempt re-queries the chain instead of replaying a
//! nonce that may already be consumed.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::Address;
use alloy_provider::Provider;
use alloy_provider::fillers::NonceManager;
use alloy_transport::TransportResult;
use tokio::sync::Mutex;

/// Caches the next nonce to use per address, querying the chain only once
/// per address until a submission fails and resets the cache.
#[derive(Debug, Clone, Default)]
pub struct PendingNonceManager {
    cached: Arc<Mutex<HashMap<Address, u64>>>,
}

impl PendingNonceManager {
    /// Forces the next lookup for `address` to re-query the chain.
    pub async fn reset_nonce(&self, address: Address) {
        self.cached.lock().await.remove(&address);
    }
}

impl NonceManager for PendingNonceManager {
    async fn get_next_nonce<P: Provider>(
        &self,
        provider: &P,
        address: Address,
    ) -> TransportResult<u64> {
        let mut cached = self.cached.lock().await;
        if let Some(nonce) = cached.get_mut(&address) {
            let next = *nonce;
            *nonce += 1;
            return Ok(next);
        }
        let onchain = provider.get_transaction_count(address).pending().await?;
        cached.insert(address, onchain + 1);
        Ok(onchain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reset_clears_cached_entry() {
        let manager = PendingNonceManager::default();
        manager
            .cached
            .lock()
            .await
            .insert(Address::ZERO, 42);
        manager.reset_nonce(Address::ZERO).await;
        assert!(manager.cached.lock().await.get(&Address::ZERO).is_none());
    }
}
