//! Signer pool: per-network signer accounts with strictly serial
//! per-account execution, round-robin/random selection, a duplicate-payer
//! guard, and queue-depth back-pressure.
//!
//! Each signer is its own single-consumer worker reading an unbounded
//! channel of boxed tasks, with one worker task per signer instead of one
//! lock over all of them. This is what gives serial-per-signer ordering and
//! a live queue-depth metric without a separate scheduler.
//!
//! The pool is generic over the per-signer handle `H` (in this crate,
//! [`crate::chain::SignerProvider`]) so it can be exercised in tests
//! without building a real chain connection.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use alloy_primitives::Address;
use dashmap::DashSet;
use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
#[cfg(feature = "telemetry")]
use tracing::warn;

use x402x_types::{CapacityReason, FacilitatorError};

/// How the pool picks which signer account handles the next request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignerSelectionStrategy {
    /// Cycle through signers in a fixed order.
    #[default]
    RoundRobin,
    /// Pick a signer uniformly at random.
    Random,
}

type BoxedJob = Pin<Box<dyn Future<Output = ()> + Send>>;

struct Worker<H> {
    address: Address,
    handle: H,
    sender: mpsc::UnboundedSender<BoxedJob>,
    /// `queued + running` for this signer, decremented when a job finishes.
    depth: Arc<AtomicUsize>,
}

/// A per-network pool of funded signer accounts.
///
/// Each account runs its own single-consumer background task, so work
/// submitted to one account is strictly serialized while different accounts
/// make progress independently.
pub struct SignerPool<H> {
    network: String,
    workers: Vec<Worker<H>>,
    strategy: SignerSelectionStrategy,
    cursor: AtomicUsize,
    max_queue_depth: usize,
    warning_threshold: usize,
    pending_payers: Arc<DashSet<Address>>,
    shutdown: CancellationToken,
}

impl<H> std::fmt::Debug for SignerPool<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerPool")
            .field("network", &self.network)
            .field("signers", &self.workers.len())
            .field("strategy", &self.strategy)
            .field("max_queue_depth", &self.max_queue_depth)
            .finish_non_exhaustive()
    }
}

impl<H: Clone + Send + Sync + 'static> SignerPool<H> {
    /// Builds a pool over `accounts`, one worker per `(address, handle)` pair.
    ///
    /// # Panics
    ///
    /// Panics if `accounts` is empty — a pool with no signer accounts
    /// cannot exist.
    #[must_use]
    pub fn new(
        network: impl Into<String>,
        accounts: Vec<(Address, H)>,
        strategy: SignerSelectionStrategy,
        max_queue_depth: usize,
        warning_threshold: usize,
        shutdown: CancellationToken,
    ) -> Self {
        assert!(!accounts.is_empty(), "signer pool requires at least one account");
        let workers = accounts.into_iter().map(|(address, handle)| Self::spawn_worker(address, handle)).collect();
        Self {
            network: network.into(),
            workers,
            strategy,
            cursor: AtomicUsize::new(0),
            max_queue_depth,
            warning_threshold,
            pending_payers: Arc::new(DashSet::new()),
            shutdown,
        }
    }

    fn spawn_worker(address: Address, handle: H) -> Worker<H> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<BoxedJob>();
        let depth = Arc::new(AtomicUsize::new(0));
        let worker_depth = Arc::clone(&depth);
        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                job.await;
                worker_depth.fetch_sub(1, Ordering::SeqCst);
            }
        });
        Worker { address, handle, sender, depth }
    }

    /// This pool's network identifier.
    #[must_use]
    pub fn network(&self) -> &str {
        &self.network
    }

    /// Number of configured signer accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// `true` iff this pool has no configured signer accounts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Every configured signer address, in pool order.
    #[must_use]
    pub fn addresses(&self) -> Vec<Address> {
        self.workers.iter().map(|w| w.address).collect()
    }

    fn select_worker(&self) -> &Worker<H> {
        let index = match self.strategy {
            SignerSelectionStrategy::RoundRobin => {
                self.cursor.fetch_add(1, Ordering::Relaxed) % self.workers.len()
            }
            SignerSelectionStrategy::Random => rand::rng().random_range(0..self.workers.len()),
        };
        &self.workers[index]
    }

    /// Submits `job` to be run by exactly one signer, gated by `payer`.
    ///
    /// `payer`, when given, is the normalized payer address used for the
    /// duplicate-payer guard.
    ///
    /// Selection happens once, before admission; a queue-depth rejection is
    /// never retried against a different account.
    ///
    /// # Errors
    ///
    /// - [`CapacityReason::Shutting`] if the pool is draining.
    /// - [`CapacityReason::DuplicatePayer`] if `payer` already has an
    ///   in-flight task on this pool.
    /// - [`CapacityReason::QueueOverload`] if the selected signer's queue is
    ///   already at `max_queue_depth`.
    pub async fn execute<F, Fut, T>(&self, payer: Option<Address>, job: F) -> Result<T, FacilitatorError>
    where
        F: FnOnce(Address, H) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if self.shutdown.is_cancelled() {
            return Err(FacilitatorError::Capacity(CapacityReason::Shutting));
        }

        if let Some(p) = payer
            && !self.pending_payers.insert(p)
        {
            return Err(FacilitatorError::Capacity(CapacityReason::DuplicatePayer));
        }

        let release_guard = |payer: Option<Address>, pending: &DashSet<Address>| {
            if let Some(p) = payer {
                pending.remove(&p);
            }
        };

        let worker = self.select_worker();
        let queue_depth = worker.depth.load(Ordering::SeqCst);
        if queue_depth >= self.max_queue_depth {
            release_guard(payer, &self.pending_payers);
            return Err(FacilitatorError::Capacity(CapacityReason::QueueOverload));
        }

        #[cfg(feature = "telemetry")]
        if queue_depth + 1 >= self.warning_threshold {
            warn!(network = %self.network, signer = %worker.address, queue_depth = queue_depth + 1, "signer queue depth approaching limit");
        }
        #[cfg(not(feature = "telemetry"))]
        let _ = self.warning_threshold;

        worker.depth.fetch_add(1, Ordering::SeqCst);

        let (result_tx, result_rx) = oneshot::channel::<T>();
        let started = Arc::new(AtomicBool::new(false));
        let cancelled = Arc::new(AtomicBool::new(false));
        let job_started = Arc::clone(&started);
        let job_cancelled = Arc::clone(&cancelled);
        let address = worker.address;
        let handle = worker.handle.clone();
        let pending_payers = Arc::clone(&self.pending_payers);

        let task: BoxedJob = Box::pin(async move {
            job_started.store(true, Ordering::SeqCst);
            if job_cancelled.load(Ordering::SeqCst) {
                release_guard(payer, &pending_payers);
            } else {
                let result = job(address, handle).await;
                release_guard(payer, &pending_payers);
                let _ = result_tx.send(result);
            }
        });

        if worker.sender.send(task).is_err() {
            release_guard(payer, &self.pending_payers);
            worker.depth.fetch_sub(1, Ordering::SeqCst);
            return Err(FacilitatorError::Capacity(CapacityReason::Shutting));
        }

        tokio::select! {
            biased;
            () = self.shutdown.cancelled(), if !started.load(Ordering::SeqCst) => {
                cancelled.store(true, Ordering::SeqCst);
                Err(FacilitatorError::Capacity(CapacityReason::Shutting))
            }
            result = result_rx => {
                result.map_err(|_| FacilitatorError::internal("signer pool task dropped without a result"))
            }
        }
    }

    /// Initiates shutdown: new `execute` calls fail immediately with
    /// [`CapacityReason::Shutting`]; already-queued work still drains (the
    /// worker loops keep running until their channels close).
    pub fn begin_shutdown(&self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use std::time::Duration;

    fn pool(addresses: Vec<Address>, strategy: SignerSelectionStrategy, max_queue_depth: usize) -> SignerPool<()> {
        let accounts = addresses.into_iter().map(|a| (a, ())).collect();
        SignerPool::new("eip155:84532", accounts, strategy, max_queue_depth, usize::MAX, CancellationToken::new())
    }

    #[tokio::test]
    async fn serial_per_signer_preserves_arrival_order() {
        let addr = address!("0x0000000000000000000000000000000000000a");
        let pool = pool(vec![addr], SignerSelectionStrategy::RoundRobin, 10);
        let order = Arc::new(tokio::sync::Mutex::new(Vec::<u32>::new()));

        let mut handles = Vec::new();
        for i in 0..5u32 {
            let order = Arc::clone(&order);
            handles.push(pool.execute(None, move |_addr, ()| async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                order.lock().await.push(i);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(*order.lock().await, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn duplicate_payer_rejected_before_selection() {
        let addr = address!("0x0000000000000000000000000000000000000a");
        let payer = address!("0x000000000000000000000000000000000000fa");
        let pool = pool(vec![addr], SignerSelectionStrategy::RoundRobin, 10);

        let blocker = pool.execute(Some(payer), |_, ()| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = pool.execute(Some(payer), |_, ()| async {}).await;
        assert!(matches!(
            second,
            Err(FacilitatorError::Capacity(CapacityReason::DuplicatePayer))
        ));
        blocker.await.unwrap();
    }

    #[tokio::test]
    async fn queue_overload_rejects_without_taking_payer_guard() {
        let addr = address!("0x0000000000000000000000000000000000000a");
        let pool = pool(vec![addr], SignerSelectionStrategy::RoundRobin, 1);

        let payer_a = address!("0x00000000000000000000000000000000000001");
        let payer_b = address!("0x00000000000000000000000000000000000002");

        let first = pool.execute(Some(payer_a), |_, ()| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = pool.execute(Some(payer_b), |_, ()| async {}).await;
        assert!(matches!(
            second,
            Err(FacilitatorError::Capacity(CapacityReason::QueueOverload))
        ));
        first.await.unwrap();

        // payer_b's guard was never taken, so it can proceed immediately now.
        let third = pool.execute(Some(payer_b), |_, ()| async {}).await;
        assert!(third.is_ok());
    }

    #[tokio::test]
    async fn round_robin_visits_every_signer() {
        let addrs = vec![
            address!("0x0000000000000000000000000000000000000a"),
            address!("0x0000000000000000000000000000000000000b"),
        ];
        let pool = pool(addrs.clone(), SignerSelectionStrategy::RoundRobin, 10);
        let first = pool.execute(None, |addr, ()| async move { addr }).await.unwrap();
        let second = pool.execute(None, |addr, ()| async move { addr }).await.unwrap();
        assert_ne!(first, second);
        assert!(addrs.contains(&first));
        assert!(addrs.contains(&second));
    }

    #[tokio::test]
    async fn shutdown_rejects_new_work() {
        let addr = address!("0x0000000000000000000000000000000000000a");
        let pool = pool(vec![addr], SignerSelectionStrategy::RoundRobin, 10);
        pool.begin_shutdown();
        let result = pool.execute(None, |_, ()| async {}).await;
        assert!(matches!(
            result,
            Err(FacilitatorError::Capacity(CapacityReason::Shutting))
        ));
    }
}
