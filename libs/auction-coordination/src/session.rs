//! Per-process session contexts.
//!
//! Sessions are explicit context objects, one per auction a process takes
//! part in, so a process can hold several independent sessions at once
//! instead of relying on ambient mutable state. `AuctioneerSession` is the
//! creating side; `BidderSession` is the participating side. Both are thin
//! compositions of the registry, queue, register, barrier, and dispatcher.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::barrier::{AuctionBarrier, BarrierWait};
use crate::error::{CoordinationError, CoordinationResult};
use crate::models::{self, Amount, Auction, Bid, Bidder};
use crate::notify::{BestBidFeed, NotificationDispatcher};
use crate::paths::PathResolver;
use crate::queue::BidQueue;
use crate::register::{BestBidRegister, PromotionOutcome, RetryPolicy};
use crate::registry::AuctionRegistry;
use crate::store::{CoordinationStore, CreateMode};

/// Outcome of a bid submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The bid cleared the pre-filter and was queued for promotion.
    Accepted {
        /// Store-assigned queue node path.
        queued_node: String,
    },
    /// The bid did not exceed the best bid observed at submission time.
    RejectedBelowBest { best: Amount },
}

// ---------------------------------------------------------------------------
// Bidder session
// ---------------------------------------------------------------------------

/// A bidder's participation in one auction.
#[derive(Debug)]
pub struct BidderSession<S: CoordinationStore + ?Sized> {
    auction_path: String,
    bidder: Bidder,
    queue: BidQueue<S>,
    register: BestBidRegister<S>,
}

impl<S: CoordinationStore + ?Sized + 'static> BidderSession<S> {
    /// Join an auction: register the bidder, subscribe to best-bid changes,
    /// and wait at the entry barrier.
    ///
    /// The subscription is armed before the barrier wait, so the feed
    /// carries the running best from the moment of registration. A barrier
    /// timeout is reported in the returned [`BarrierWait`], not as an error;
    /// the session and feed are usable either way.
    pub async fn participate(
        store: Arc<S>,
        paths: PathResolver,
        auction: &Auction,
        bidder: Bidder,
        wait: Option<Duration>,
    ) -> CoordinationResult<(Self, BestBidFeed, BarrierWait)> {
        let auction_path = auction
            .id
            .clone()
            .ok_or_else(|| CoordinationError::Config("auction has no assigned id".into()))?;

        let payload = models::encode(&bidder)?;
        let bidder_path = store
            .create(
                &paths.bidder_prefix(&auction_path),
                &payload,
                CreateMode::PersistentSequential,
            )
            .await?;
        let bidder = Bidder {
            id: Some(bidder_path.clone()),
            ..bidder
        };
        info!(
            auction = auction_path,
            bidder = bidder_path,
            name = bidder.display_name,
            "bidder registered"
        );

        let dispatcher = NotificationDispatcher::new(Arc::clone(&store), paths.clone());
        let feed = dispatcher.subscribe(&auction_path);

        let barrier = AuctionBarrier::new(Arc::clone(&store), paths.clone());
        let entered = barrier.enter(&auction_path, wait).await?;

        let session = Self {
            queue: BidQueue::new(Arc::clone(&store), paths.clone()),
            register: BestBidRegister::new(store, paths),
            auction_path,
            bidder,
        };
        Ok((session, feed, entered))
    }

    /// The bidder record, with its store-assigned id.
    pub fn bidder(&self) -> &Bidder {
        &self.bidder
    }

    /// Path of the auction this session is bound to.
    pub fn auction_path(&self) -> &str {
        &self.auction_path
    }

    /// Submit a bid.
    ///
    /// The current best is read as a pre-filter: a value not strictly above
    /// it is rejected without touching the queue. Acceptance only means the
    /// bid was queued; promotion re-validates against whatever the best bid
    /// is by then. Submission is not time-gated; the barrier gates
    /// participation, not individual bids.
    pub async fn submit_bid(&self, value: Amount) -> CoordinationResult<SubmitOutcome> {
        let (best, _) = self.register.read(&self.auction_path).await?;
        if value <= best.value {
            return Ok(SubmitOutcome::RejectedBelowBest { best: best.value });
        }
        let bid = Bid {
            auction: self.auction_path.clone(),
            bidder: self.bidder.id.clone(),
            value,
        };
        let queued_node = self.queue.submit(&self.auction_path, &bid).await?;
        Ok(SubmitOutcome::Accepted { queued_node })
    }

    /// Read the current canonical best bid.
    pub async fn best_bid(&self) -> CoordinationResult<Bid> {
        let (bid, _) = self.register.read(&self.auction_path).await?;
        Ok(bid)
    }
}

// ---------------------------------------------------------------------------
// Auctioneer session
// ---------------------------------------------------------------------------

/// The auctioneer's side of one auction: creation, opening, and the
/// promotion step that drains the queue into the best-bid register.
#[derive(Debug)]
pub struct AuctioneerSession<S: CoordinationStore + ?Sized> {
    auction: Auction,
    registry: AuctionRegistry<S>,
    queue: BidQueue<S>,
    register: BestBidRegister<S>,
}

impl<S: CoordinationStore + ?Sized> Clone for AuctioneerSession<S> {
    fn clone(&self) -> Self {
        Self {
            auction: self.auction.clone(),
            registry: self.registry.clone(),
            queue: self.queue.clone(),
            register: self.register.clone(),
        }
    }
}

impl<S: CoordinationStore + ?Sized + 'static> AuctioneerSession<S> {
    /// Create the auction in the store and return a session bound to it.
    pub async fn create(
        store: Arc<S>,
        paths: PathResolver,
        auction: Auction,
    ) -> CoordinationResult<Self> {
        Self::create_with_retry_policy(store, paths, auction, RetryPolicy::default()).await
    }

    /// Create with a custom promotion retry policy.
    pub async fn create_with_retry_policy(
        store: Arc<S>,
        paths: PathResolver,
        auction: Auction,
        retry_policy: RetryPolicy,
    ) -> CoordinationResult<Self> {
        let registry = AuctionRegistry::new(Arc::clone(&store), paths.clone());
        let auction = registry.create_auction(auction).await?;
        Ok(Self {
            registry,
            queue: BidQueue::new(Arc::clone(&store), paths.clone()),
            register: BestBidRegister::with_retry_policy(store, paths, retry_policy),
            auction,
        })
    }

    /// The created auction, id included.
    pub fn auction(&self) -> &Auction {
        &self.auction
    }

    fn auction_path(&self) -> &str {
        self.auction
            .id
            .as_deref()
            .expect("session auction always carries its assigned id")
    }

    /// Release the entry barrier; waiting bidders resume.
    pub async fn open(&self) -> CoordinationResult<()> {
        self.registry.open_auction(self.auction_path()).await
    }

    /// Promote the oldest queued bid, if any.
    ///
    /// `None` means the queue was empty. A polled bid that no longer beats
    /// the register is consumed and discarded; an exhausted retry budget
    /// surfaces as `PromotionAborted` and the bid is dropped; resubmitting
    /// is the submitter's call.
    pub async fn promote_next(&self) -> CoordinationResult<Option<PromotionOutcome>> {
        match self.queue.poll(self.auction_path()).await? {
            None => Ok(None),
            Some(bid) => {
                let outcome = self.register.promote(self.auction_path(), bid).await?;
                Ok(Some(outcome))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
