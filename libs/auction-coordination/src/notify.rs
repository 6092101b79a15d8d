//! Best-bid change notifications.
//!
//! The store's watches are one-shot: forgetting to re-arm after a fire stops
//! delivery silently, which is the classic failure mode this module exists
//! to contain. Each subscription runs a dedicated dispatch task that arms a
//! fresh watch *before* every read, so no update can land between observing
//! a value and re-arming. Version tracking suppresses re-deliveries of an
//! already-reported value, leaving the subscriber with the initial value
//! plus exactly one notification per promotion.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::models::{self, Bid};
use crate::paths::PathResolver;
use crate::store::CoordinationStore;

/// Per-subscription delivery buffer.
const FEED_BUFFER: usize = 16;

/// A live subscription to an auction's best bid.
///
/// A lazy, infinite sequence of `Bid` values: the current value at subscribe
/// time, then one value per promotion. It ends only on [`unsubscribe`],
/// drop, deletion of the auction, or loss of the store, after which `recv`
/// yields `None`.
///
/// [`unsubscribe`]: BestBidFeed::unsubscribe
#[derive(Debug)]
pub struct BestBidFeed {
    rx: mpsc::Receiver<Bid>,
    cancel: CancellationToken,
}

impl BestBidFeed {
    /// Receive the next best-bid value, or `None` once the feed is closed.
    pub async fn recv(&mut self) -> Option<Bid> {
        self.rx.recv().await
    }

    /// Stop the subscription. No further watches are armed; a delivery
    /// already in flight completes.
    pub fn unsubscribe(&self) {
        self.cancel.cancel();
    }
}

impl Drop for BestBidFeed {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Stream for BestBidFeed {
    type Item = Bid;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Bid>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// Registers best-bid watches on behalf of bidder sessions.
#[derive(Debug)]
pub struct NotificationDispatcher<S: CoordinationStore + ?Sized> {
    store: Arc<S>,
    paths: PathResolver,
}

impl<S: CoordinationStore + ?Sized> Clone for NotificationDispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            paths: self.paths.clone(),
        }
    }
}

impl<S: CoordinationStore + ?Sized + 'static> NotificationDispatcher<S> {
    /// Create a dispatcher handle.
    pub fn new(store: Arc<S>, paths: PathResolver) -> Self {
        Self { store, paths }
    }

    /// Subscribe to an auction's best bid.
    ///
    /// The subscriber first receives the current value, then one value per
    /// promotion for as long as the feed stays open.
    pub fn subscribe(&self, auction_path: &str) -> BestBidFeed {
        let (tx, rx) = mpsc::channel(FEED_BUFFER);
        let cancel = CancellationToken::new();
        let subscription = uuid::Uuid::new_v4().to_string();
        let node = self.paths.best_bid(auction_path);
        let store = Arc::clone(&self.store);

        debug!(subscription, node, "best-bid subscription armed");
        tokio::spawn(dispatch(store, node, tx, cancel.clone(), subscription));

        BestBidFeed { rx, cancel }
    }
}

/// Dispatch loop for one subscription: arm, read, deliver, wait, repeat.
async fn dispatch<S: CoordinationStore + ?Sized>(
    store: Arc<S>,
    node: String,
    tx: mpsc::Sender<Bid>,
    cancel: CancellationToken,
    subscription: String,
) {
    let mut last_seen: Option<u64> = None;
    loop {
        // Arm before reading: an update between the read and a later arm
        // would otherwise be lost until the following update.
        let watch = match store.watch(&node).await {
            Ok(watch) => watch,
            Err(e) => {
                warn!(subscription, error = %e, "failed to arm best-bid watch, closing feed");
                return;
            }
        };

        match store.read(&node).await {
            Ok(value) => {
                if last_seen.map_or(true, |seen| value.version > seen) {
                    last_seen = Some(value.version);
                    let bid: Bid = match models::decode(&value.data) {
                        Ok(bid) => bid,
                        Err(e) => {
                            warn!(subscription, node, error = %e, "corrupt best-bid record, closing feed");
                            return;
                        }
                    };
                    debug!(
                        subscription,
                        value = bid.value,
                        version = value.version,
                        "best bid reported"
                    );
                    if tx.send(bid).await.is_err() {
                        // Subscriber went away.
                        return;
                    }
                }
            }
            Err(e) if e.is_not_found() => {
                debug!(subscription, node, "best-bid node gone, closing feed");
                return;
            }
            Err(e) => {
                warn!(subscription, node, error = %e, "best-bid read failed, closing feed");
                return;
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(subscription, "unsubscribed");
                return;
            }
            event = watch.fired() => {
                if event.is_err() {
                    warn!(subscription, "store dropped the watch, closing feed");
                    return;
                }
                // Fall through to re-read and re-arm; the event itself is
                // only a hint that something changed.
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
    use crate::register::BestBidRegister;
    use crate::registry::AuctionRegistry;
    use crate::store::memory::MemoryStore;
    use chrono::Utc;
    use futures::StreamExt;
    use std::time::Duration;

    async fn feed_fixture() -> (
        Arc<MemoryStore>,
        BestBidRegister<MemoryStore>,
        NotificationDispatcher<MemoryStore>,
        String,
    ) {
        let store = Arc::new(MemoryStore::new());
        let paths = PathResolver::with_defaults();
        let registry = AuctionRegistry::new(Arc::clone(&store), paths.clone());
        let auction = registry
            .create_auction(Auction {
                id: None,
                product_name: "watched lot".into(),
                start_bid: 10_000,
                start_date: Utc::now() + chrono::Duration::minutes(1),
                deadline_minutes: 10,
            })
            .await
            .unwrap();
        let path = auction.id.unwrap();
        let register = BestBidRegister::new(Arc::clone(&store), paths.clone());
        let dispatcher = NotificationDispatcher::new(Arc::clone(&store), paths);
        (store, register, dispatcher, path)
    }

    fn candidate(auction: &str, value: u64) -> Bid {
        Bid {
            auction: auction.into(),
            bidder: Some("bidder-test".into()),
            value,
        }
    }

    #[tokio::test]
    async fn test_subscriber_receives_initial_value() {
        let (_store, _register, dispatcher, auction) = feed_fixture().await;
        let mut feed = dispatcher.subscribe(&auction);
        let initial = feed.recv().await.unwrap();
        assert_eq!(initial.value, 10_000);
        assert_eq!(initial.bidder, None);
    }

    #[tokio::test]
    async fn test_one_notification_per_promotion() {
        let (_store, register, dispatcher, auction) = feed_fixture().await;
        let mut feed = dispatcher.subscribe(&auction);
        assert_eq!(feed.recv().await.unwrap().value, 10_000);

        for value in [12_000u64, 14_000, 16_000] {
            register
                .promote(&auction, candidate(&auction, value))
                .await
                .unwrap();
            assert_eq!(feed.recv().await.unwrap().value, value);
        }

        // Nothing further pending: three promotions, three notifications.
        let extra = tokio::time::timeout(Duration::from_millis(100), feed.recv()).await;
        assert!(extra.is_err());
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let (_store, register, dispatcher, auction) = feed_fixture().await;
        let mut feed = dispatcher.subscribe(&auction);
        feed.recv().await.unwrap();

        feed.unsubscribe();
        // Give the dispatch task time to observe the cancellation.
        tokio::time::sleep(Duration::from_millis(20)).await;
        register
            .promote(&auction, candidate(&auction, 12_000))
            .await
            .unwrap();

        assert_eq!(feed.recv().await, None);
    }

    #[tokio::test]
    async fn test_feed_closes_when_auction_removed() {
        let (store, _register, dispatcher, auction) = feed_fixture().await;
        let mut feed = dispatcher.subscribe(&auction);
        feed.recv().await.unwrap();

        store.delete_if_version(&auction, 0).await.unwrap();
        assert_eq!(feed.recv().await, None);
    }

    #[tokio::test]
    async fn test_two_subscribers_both_notified() {
        let (_store, register, dispatcher, auction) = feed_fixture().await;
        let mut first = dispatcher.subscribe(&auction);
        let mut second = dispatcher.subscribe(&auction);
        first.recv().await.unwrap();
        second.recv().await.unwrap();

        register
            .promote(&auction, candidate(&auction, 15_000))
            .await
            .unwrap();
        assert_eq!(first.recv().await.unwrap().value, 15_000);
        assert_eq!(second.recv().await.unwrap().value, 15_000);
    }

    #[tokio::test]
    async fn test_feed_is_a_stream() {
        let (_store, register, dispatcher, auction) = feed_fixture().await;
        let mut feed = dispatcher.subscribe(&auction);
        assert_eq!(feed.next().await.unwrap().value, 10_000);

        register
            .promote(&auction, candidate(&auction, 13_000))
            .await
            .unwrap();
        assert_eq!(feed.next().await.unwrap().value, 13_000);
    }
}
