//! Auction registry rooted at the configured namespace.
//!
//! The auctioneer creates auctions here; bidders list and watch them. A
//! created auction is a sequential node carrying the serialized record plus
//! three fixed children: the seeded `bestbid` register, the `bidders`
//! registry, and the `bids` queue. Records are immutable after creation.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{CoordinationError, CoordinationResult};
use crate::models::{self, Auction, Bid};
use crate::paths::PathResolver;
use crate::store::{CoordinationStore, CreateMode, NodeWatch};

/// Registry of auctions under a common root.
#[derive(Debug)]
pub struct AuctionRegistry<S: CoordinationStore + ?Sized> {
    store: Arc<S>,
    paths: PathResolver,
}

impl<S: CoordinationStore + ?Sized> Clone for AuctionRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            paths: self.paths.clone(),
        }
    }
}

impl<S: CoordinationStore + ?Sized> AuctionRegistry<S> {
    /// Create a registry handle.
    pub fn new(store: Arc<S>, paths: PathResolver) -> Self {
        Self { store, paths }
    }

    /// Path helpers shared with the other components.
    pub fn paths(&self) -> &PathResolver {
        &self.paths
    }

    /// Create an auction and its child nodes; returns the auction with `id`
    /// set to the store-assigned path.
    ///
    /// The root is ensured first; racing another creator there is expected
    /// and absorbed. The best-bid child starts at version 0 holding the seed
    /// record built from `start_bid`.
    pub async fn create_auction(&self, auction: Auction) -> CoordinationResult<Auction> {
        auction.validate()?;

        match self
            .store
            .create(self.paths.root(), b"", CreateMode::Persistent)
            .await
        {
            Ok(_) => debug!(root = self.paths.root(), "auction root created"),
            Err(CoordinationError::AlreadyExists(_)) => {}
            Err(e) => return Err(e),
        }

        let payload = models::encode(&auction)?;
        let auction_path = self
            .store
            .create(
                &self.paths.auction_prefix(),
                &payload,
                CreateMode::PersistentSequential,
            )
            .await?;

        let seed = Bid::seed(&auction_path, auction.start_bid);
        self.store
            .create(
                &self.paths.best_bid(&auction_path),
                &models::encode(&seed)?,
                CreateMode::Persistent,
            )
            .await?;
        self.store
            .create(
                &self.paths.bidders(&auction_path),
                b"",
                CreateMode::Persistent,
            )
            .await?;
        self.store
            .create(&self.paths.bids(&auction_path), b"", CreateMode::Persistent)
            .await?;

        info!(
            auction = auction_path,
            product = auction.product_name,
            start_bid = auction.start_bid,
            "auction created"
        );
        Ok(Auction {
            id: Some(auction_path),
            ..auction
        })
    }

    /// List auctions whose start date is strictly in the future.
    ///
    /// A record that fails to decode is logged and skipped; one bad entry
    /// never aborts the listing.
    pub async fn list_open_auctions(&self) -> CoordinationResult<Vec<Auction>> {
        let children = match self.store.list_children(self.paths.root()).await {
            Ok(children) => children,
            // No root yet means no auctions yet.
            Err(CoordinationError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let now = Utc::now();
        let mut auctions = Vec::new();
        for child in children {
            let path = self.paths.auction(&child);
            let value = match self.store.read(&path).await {
                Ok(value) => value,
                // Deleted between listing and read; skip.
                Err(CoordinationError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            let auction: Auction = match models::decode(&value.data) {
                Ok(auction) => auction,
                Err(e) => {
                    warn!(path, error = %e, "skipping corrupt auction record");
                    continue;
                }
            };
            if auction.is_upcoming(now) {
                auctions.push(Auction {
                    id: Some(path),
                    ..auction
                });
            }
        }
        Ok(auctions)
    }

    /// Create the start marker that releases the auction's entry barrier.
    ///
    /// Idempotent: opening an already-open auction is a no-op.
    pub async fn open_auction(&self, auction_path: &str) -> CoordinationResult<()> {
        if !self.store.exists(auction_path).await? {
            return Err(CoordinationError::NotFound(auction_path.to_string()));
        }
        match self
            .store
            .create(
                &self.paths.start_marker(auction_path),
                b"",
                CreateMode::Persistent,
            )
            .await
        {
            Ok(_) => {
                info!(auction = auction_path, "auction opened");
                Ok(())
            }
            Err(CoordinationError::AlreadyExists(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// One-shot watch firing when an auction is created or removed.
    pub async fn watch_auctions(&self) -> CoordinationResult<NodeWatch> {
        self.store.watch_children(self.paths.root()).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn sample_auction(product: &str, minutes_from_now: i64) -> Auction {
        Auction {
            id: None,
            product_name: product.into(),
            start_bid: 10_000,
            start_date: Utc::now() + chrono::Duration::minutes(minutes_from_now),
            deadline_minutes: 30,
        }
    }

    fn registry() -> AuctionRegistry<MemoryStore> {
        AuctionRegistry::new(Arc::new(MemoryStore::new()), PathResolver::with_defaults())
    }

    #[tokio::test]
    async fn test_create_auction_assigns_id_and_children() {
        let registry = registry();
        let auction = registry
            .create_auction(sample_auction("lamp", 5))
            .await
            .unwrap();

        let path = auction.id.expect("id assigned");
        assert!(path.starts_with("/auctions/auction-"));

        let store = registry.store.clone();
        assert!(store.exists(&format!("{path}/bestbid")).await.unwrap());
        assert!(store.exists(&format!("{path}/bidders")).await.unwrap());
        assert!(store.exists(&format!("{path}/bids")).await.unwrap());

        // Seed record at version 0, carrying the start bid with no bidder.
        let value = store.read(&format!("{path}/bestbid")).await.unwrap();
        assert_eq!(value.version, 0);
        let seed: Bid = models::decode(&value.data).unwrap();
        assert_eq!(seed.value, 10_000);
        assert_eq!(seed.bidder, None);
    }

    #[tokio::test]
    async fn test_create_auction_twice_shares_root() {
        let registry = registry();
        let first = registry
            .create_auction(sample_auction("lamp", 5))
            .await
            .unwrap();
        let second = registry
            .create_auction(sample_auction("clock", 5))
            .await
            .unwrap();
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_create_auction_validates_record() {
        let registry = registry();
        let mut auction = sample_auction("", 5);
        auction.product_name = "".into();
        assert!(registry.create_auction(auction).await.is_err());
    }

    #[tokio::test]
    async fn test_list_open_auctions_filters_started() {
        let registry = registry();
        registry
            .create_auction(sample_auction("future", 5))
            .await
            .unwrap();
        registry
            .create_auction(sample_auction("past", -5))
            .await
            .unwrap();

        let open = registry.list_open_auctions().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].product_name, "future");
        assert!(open[0].id.is_some());
    }

    #[tokio::test]
    async fn test_list_open_auctions_empty_without_root() {
        let registry = registry();
        assert!(registry.list_open_auctions().await.unwrap().is_empty());
    }

    #[tracing_test::traced_test]
    #[tokio::test]
    async fn test_list_open_auctions_skips_corrupt_record() {
        let registry = registry();
        registry
            .create_auction(sample_auction("good", 5))
            .await
            .unwrap();
        // Plant a record that does not decode as an auction.
        registry
            .store
            .create(
                "/auctions/auction-garbage",
                b"not json",
                CreateMode::Persistent,
            )
            .await
            .unwrap();

        let open = registry.list_open_auctions().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].product_name, "good");
        assert!(logs_contain("skipping corrupt auction record"));
    }

    #[tokio::test]
    async fn test_open_auction_is_idempotent() {
        let registry = registry();
        let auction = registry
            .create_auction(sample_auction("lamp", 5))
            .await
            .unwrap();
        let path = auction.id.unwrap();

        registry.open_auction(&path).await.unwrap();
        registry.open_auction(&path).await.unwrap();
        assert!(
            registry
                .store
                .exists(&format!("{path}/start"))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_open_missing_auction_errors() {
        let registry = registry();
        let err = registry
            .open_auction("/auctions/auction-9999999999")
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinationError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_watch_auctions_fires_on_create() {
        let registry = registry();
        // Root must exist before a children watch makes sense to arm.
        registry
            .create_auction(sample_auction("first", 5))
            .await
            .unwrap();

        let watch = registry.watch_auctions().await.unwrap();
        registry
            .create_auction(sample_auction("second", 5))
            .await
            .unwrap();
        let event = watch.fired().await.unwrap();
        assert_eq!(event.path(), "/auctions");
    }
}
