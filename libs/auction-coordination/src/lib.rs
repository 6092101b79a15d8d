//! # auction-coordination
//!
//! Multi-bidder auction coordination over a shared hierarchical store.
//! Bidders and the auctioneer never talk to each other directly; every
//! interaction goes through named store nodes with atomic create,
//! version-conditioned writes, child listing, and one-shot change watches.
//!
//! This library provides:
//! - **Typed records** for auctions, bids, and bidders, with symmetric
//!   codecs that surface corrupt data instead of defaulting it.
//! - **Path resolver** with a configurable root and no hard-coded paths in
//!   runtime code.
//! - **Store abstraction** ([`CoordinationStore`]) with an in-memory
//!   implementation for tests and local runs.
//! - **Auction registry** for creating, listing, and opening auctions.
//! - **Bid queue** with store-ordered FIFO submission and multi-consumer
//!   polling.
//! - **Best-bid register** whose only mutation path is a bounded
//!   compare-and-set loop.
//! - **Entry barrier** and **best-bid notification feeds** built on the
//!   watch-and-recheck discipline one-shot watches demand.
//!
//! ## Design Principles
//!
//! - The best-bid node is the single mutable shared resource; it is never
//!   overwritten unconditionally.
//! - Validation happens again at promotion time, because a queued bid can go
//!   stale between submission and its turn.
//! - Watches are one-shot and are always re-armed before the state they
//!   guard is read.
//! - Sessions are explicit per-auction context objects, not ambient process
//!   state.

pub mod barrier;
pub mod error;
pub mod models;
pub mod notify;
pub mod paths;
pub mod queue;
pub mod register;
pub mod registry;
pub mod session;
pub mod store;

// Re-export key types for convenient access
pub use barrier::{AuctionBarrier, BarrierWait};
pub use error::{CoordinationError, CoordinationResult};
pub use models::{Amount, Auction, Bid, Bidder};
pub use notify::{BestBidFeed, NotificationDispatcher};
pub use paths::PathResolver;
pub use queue::BidQueue;
pub use register::{BestBidRegister, PromotionOutcome, RetryPolicy};
pub use registry::AuctionRegistry;
pub use session::{AuctioneerSession, BidderSession, SubmitOutcome};
pub use store::{CoordinationStore, CreateMode, NodeEvent, NodeValue, NodeWatch};
pub use store::memory::MemoryStore;
