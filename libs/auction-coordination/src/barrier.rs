//! Entry barrier gating auction participation.
//!
//! A bidder that joins before the auction officially opens blocks here until
//! the auctioneer creates the start marker. The wait is watch-driven, not
//! polled: arm a one-shot watch, re-check the condition, suspend until the
//! watch fires, repeat. The re-check after arming is what closes the gap in
//! which a release could slip past an unarmed waiter, and the re-check after
//! a fire is deliberate: a watch event says something changed, never that
//! the release condition now holds.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::error::{CoordinationError, CoordinationResult};
use crate::paths::PathResolver;
use crate::store::CoordinationStore;

/// Terminal outcome of a barrier wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierWait {
    /// The release condition held at the final re-check.
    Released,
    /// The optional deadline expired before release.
    TimedOut,
}

/// Watch-and-recheck barrier on an auction's start marker.
#[derive(Debug)]
pub struct AuctionBarrier<S: CoordinationStore + ?Sized> {
    store: Arc<S>,
    paths: PathResolver,
}

impl<S: CoordinationStore + ?Sized> Clone for AuctionBarrier<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            paths: self.paths.clone(),
        }
    }
}

impl<S: CoordinationStore + ?Sized> AuctionBarrier<S> {
    /// Create a barrier handle.
    pub fn new(store: Arc<S>, paths: PathResolver) -> Self {
        Self { store, paths }
    }

    /// Block until the auction's start marker exists, the optional timeout
    /// expires, or the auction is removed while waiting (surfaced as
    /// `NotFound`, the aborted terminal state).
    ///
    /// A caller entering after release observes `Released` immediately.
    pub async fn enter(
        &self,
        auction_path: &str,
        timeout: Option<Duration>,
    ) -> CoordinationResult<BarrierWait> {
        let marker = self.paths.start_marker(auction_path);
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            if !self.store.exists(auction_path).await? {
                return Err(CoordinationError::NotFound(format!(
                    "auction removed while waiting: {auction_path}"
                )));
            }

            // Arm both watches before the condition check so neither a
            // release nor a cancellation can slip into the gap.
            let marker_watch = self.store.watch(&marker).await?;
            let auction_watch = self.store.watch(auction_path).await?;

            if self.store.exists(&marker).await? {
                debug!(auction = auction_path, "barrier released");
                return Ok(BarrierWait::Released);
            }

            let woken = async {
                tokio::select! {
                    event = marker_watch.fired() => event,
                    event = auction_watch.fired() => event,
                }
            };

            match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Ok(BarrierWait::TimedOut);
                    }
                    match tokio::time::timeout(remaining, woken).await {
                        Ok(Ok(event)) => {
                            debug!(?event, "barrier watch fired, re-checking");
                        }
                        Ok(Err(e)) => return Err(e),
                        Err(_) => return Ok(BarrierWait::TimedOut),
                    }
                }
                None => {
                    let event = woken.await?;
                    debug!(?event, "barrier watch fired, re-checking");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Auction;
    use crate::registry::AuctionRegistry;
    use crate::store::memory::MemoryStore;
    use chrono::Utc;

    async fn barrier_fixture() -> (
        Arc<MemoryStore>,
        AuctionRegistry<MemoryStore>,
        AuctionBarrier<MemoryStore>,
        String,
    ) {
        let store = Arc::new(MemoryStore::new());
        let paths = PathResolver::with_defaults();
        let registry = AuctionRegistry::new(Arc::clone(&store), paths.clone());
        let auction = registry
            .create_auction(Auction {
                id: None,
                product_name: "gated lot".into(),
                start_bid: 10_000,
                start_date: Utc::now() + chrono::Duration::minutes(1),
                deadline_minutes: 10,
            })
            .await
            .unwrap();
        let path = auction.id.unwrap();
        let barrier = AuctionBarrier::new(Arc::clone(&store), paths);
        (store, registry, barrier, path)
    }

    #[tokio::test]
    async fn test_enter_after_release_returns_immediately() {
        let (_store, registry, barrier, auction) = barrier_fixture().await;
        registry.open_auction(&auction).await.unwrap();

        let outcome = barrier
            .enter(&auction, Some(Duration::from_secs(1)))
            .await
            .unwrap();
        assert_eq!(outcome, BarrierWait::Released);
    }

    #[tokio::test]
    async fn test_enter_blocks_until_release() {
        let (_store, registry, barrier, auction) = barrier_fixture().await;

        let waiter = {
            let barrier = barrier.clone();
            let auction = auction.clone();
            tokio::spawn(async move { barrier.enter(&auction, None).await })
        };
        // Give the waiter time to arm its watch.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        registry.open_auction(&auction).await.unwrap();
        let outcome = waiter.await.unwrap().unwrap();
        assert_eq!(outcome, BarrierWait::Released);
    }

    #[tokio::test]
    async fn test_waiters_before_and_after_release_both_observe_released() {
        let (_store, registry, barrier, auction) = barrier_fixture().await;

        let early = {
            let barrier = barrier.clone();
            let auction = auction.clone();
            tokio::spawn(async move { barrier.enter(&auction, None).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        registry.open_auction(&auction).await.unwrap();

        let late = barrier
            .enter(&auction, Some(Duration::from_secs(1)))
            .await
            .unwrap();
        assert_eq!(late, BarrierWait::Released);
        assert_eq!(early.await.unwrap().unwrap(), BarrierWait::Released);
    }

    #[tokio::test]
    async fn test_enter_times_out() {
        let (_store, _registry, barrier, auction) = barrier_fixture().await;
        let outcome = barrier
            .enter(&auction, Some(Duration::from_millis(50)))
            .await
            .unwrap();
        assert_eq!(outcome, BarrierWait::TimedOut);
    }

    #[tokio::test]
    async fn test_enter_aborts_when_auction_removed() {
        let (store, _registry, barrier, auction) = barrier_fixture().await;

        let waiter = {
            let barrier = barrier.clone();
            let auction = auction.clone();
            tokio::spawn(async move { barrier.enter(&auction, Some(Duration::from_secs(5))).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        store.delete_if_version(&auction, 0).await.unwrap();
        let err = waiter.await.unwrap().unwrap_err();
        assert!(matches!(err, CoordinationError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_enter_missing_auction_errors() {
        let (_store, _registry, barrier, _auction) = barrier_fixture().await;
        let err = barrier
            .enter("/auctions/auction-9999999999", None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinationError::NotFound(_)));
    }
}
