//! Distributed FIFO bid queue.
//!
//! Bids are sequential children under an auction's `bids` node. The store
//! assigns the sequence suffix at creation, so submission order is global
//! across bidder processes and independent of submitter clocks. Polling is
//! multi-consumer safe: winning a node is a version-conditioned delete, and a
//! loser moves on to the next-lowest child instead of failing.

use std::sync::Arc;

use tracing::debug;

use crate::error::{CoordinationError, CoordinationResult};
use crate::models::{self, Bid};
use crate::paths::PathResolver;
use crate::store::{CoordinationStore, CreateMode};

/// Append/poll queue over an auction's sequential bid nodes.
#[derive(Debug)]
pub struct BidQueue<S: CoordinationStore + ?Sized> {
    store: Arc<S>,
    paths: PathResolver,
}

impl<S: CoordinationStore + ?Sized> Clone for BidQueue<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            paths: self.paths.clone(),
        }
    }
}

impl<S: CoordinationStore + ?Sized> BidQueue<S> {
    /// Create a queue handle.
    pub fn new(store: Arc<S>, paths: PathResolver) -> Self {
        Self { store, paths }
    }

    /// Append a bid to the auction's queue and return the assigned node path.
    ///
    /// Ordering is guaranteed per auction only; nothing relates bids queued
    /// for different auctions.
    pub async fn submit(&self, auction_path: &str, bid: &Bid) -> CoordinationResult<String> {
        bid.validate()?;
        let payload = models::encode(bid)?;
        let node = self
            .store
            .create(
                &self.paths.bid_prefix(auction_path),
                &payload,
                CreateMode::PersistentSequential,
            )
            .await?;
        debug!(node, value = bid.value, "bid queued");
        Ok(node)
    }

    /// Remove and return the lowest-sequence remaining bid, or `None` when
    /// the queue is empty.
    ///
    /// Concurrent pollers race on the delete; at most one wins each node. A
    /// node that vanishes between listing and delete belongs to another
    /// poller and is skipped.
    pub async fn poll(&self, auction_path: &str) -> CoordinationResult<Option<Bid>> {
        let parent = self.paths.bids(auction_path);
        loop {
            let children = self.store.list_children(&parent).await?;
            if children.is_empty() {
                return Ok(None);
            }

            for name in &children {
                let node = format!("{parent}/{name}");
                let value = match self.store.read(&node).await {
                    Ok(value) => value,
                    Err(CoordinationError::NotFound(_)) => continue,
                    Err(e) => return Err(e),
                };
                match self.store.delete_if_version(&node, value.version).await {
                    Ok(()) => {
                        debug!(node, "bid polled");
                        return Ok(Some(models::decode(&value.data)?));
                    }
                    Err(CoordinationError::NotFound(_))
                    | Err(CoordinationError::VersionConflict { .. }) => continue,
                    Err(e) => return Err(e),
                }
            }

            // Every listed child was consumed by other pollers; re-list to
            // see what (if anything) is left.
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Amount, Auction};
    use crate::registry::AuctionRegistry;
    use crate::store::memory::MemoryStore;
    use chrono::Utc;

    async fn queue_fixture() -> (Arc<MemoryStore>, BidQueue<MemoryStore>, String) {
        let store = Arc::new(MemoryStore::new());
        let paths = PathResolver::with_defaults();
        let registry = AuctionRegistry::new(Arc::clone(&store), paths.clone());
        let auction = registry
            .create_auction(Auction {
                id: None,
                product_name: "test lot".into(),
                start_bid: 10_000,
                start_date: Utc::now() + chrono::Duration::minutes(1),
                deadline_minutes: 10,
            })
            .await
            .unwrap();
        let auction_path = auction.id.unwrap();
        (store.clone(), BidQueue::new(store, paths), auction_path)
    }

    fn bid(auction: &str, value: Amount) -> Bid {
        Bid {
            auction: auction.into(),
            bidder: Some("bidder-test".into()),
            value,
        }
    }

    #[tokio::test]
    async fn test_poll_empty_queue_is_none() {
        let (_store, queue, auction) = queue_fixture().await;
        assert_eq!(queue.poll(&auction).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_fifo_order_across_submitters() {
        let (_store, queue, auction) = queue_fixture().await;
        let other = queue.clone();

        queue.submit(&auction, &bid(&auction, 11_000)).await.unwrap();
        other.submit(&auction, &bid(&auction, 12_000)).await.unwrap();
        queue.submit(&auction, &bid(&auction, 13_000)).await.unwrap();

        let polled: Vec<Amount> = [
            queue.poll(&auction).await.unwrap().unwrap().value,
            queue.poll(&auction).await.unwrap().unwrap().value,
            queue.poll(&auction).await.unwrap().unwrap().value,
        ]
        .into();
        assert_eq!(polled, vec![11_000, 12_000, 13_000]);
        assert_eq!(queue.poll(&auction).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_submit_rejects_invalid_bid() {
        let (_store, queue, auction) = queue_fixture().await;
        let err = queue.submit(&auction, &bid(&auction, 0)).await.unwrap_err();
        assert!(matches!(err, CoordinationError::CorruptRecord(_)));
    }

    #[tokio::test]
    async fn test_concurrent_pollers_never_share_a_bid() {
        let (_store, queue, auction) = queue_fixture().await;
        for value in [11_000u64, 12_000, 13_000, 14_000] {
            queue.submit(&auction, &bid(&auction, value)).await.unwrap();
        }

        let a = queue.clone();
        let b = queue.clone();
        let auction_a = auction.clone();
        let auction_b = auction.clone();
        let (got_a, got_b) = tokio::join!(
            tokio::spawn(async move {
                let mut out = Vec::new();
                while let Some(bid) = a.poll(&auction_a).await.unwrap() {
                    out.push(bid.value);
                }
                out
            }),
            tokio::spawn(async move {
                let mut out = Vec::new();
                while let Some(bid) = b.poll(&auction_b).await.unwrap() {
                    out.push(bid.value);
                }
                out
            }),
        );

        let mut all: Vec<Amount> = got_a.unwrap();
        all.extend(got_b.unwrap());
        all.sort_unstable();
        assert_eq!(all, vec![11_000, 12_000, 13_000, 14_000]);
    }

    #[tokio::test]
    async fn test_poll_missing_auction_errors() {
        let (_store, queue, _auction) = queue_fixture().await;
        let err = queue.poll("/auctions/auction-9999999999").await.unwrap_err();
        assert!(matches!(err, CoordinationError::NotFound(_)));
    }
}
