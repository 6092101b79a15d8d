//! Typed records and codecs for store payloads.
//!
//! Every record written to the coordination store round-trips through these
//! structures. The encoding is symmetric JSON: `decode(encode(x)) == x` for
//! every field, and a decode failure is always surfaced as
//! [`CoordinationError::CorruptRecord`], never silently defaulted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoordinationError, CoordinationResult};

/// Monetary value in minor currency units (e.g. cents).
pub type Amount = u64;

// ---------------------------------------------------------------------------
// Auction record
// ---------------------------------------------------------------------------

/// An auction as written by the auctioneer at creation time.
///
/// The record itself is immutable once created. `id` is the store-assigned
/// path: it is `None` until creation and is written back into the in-memory
/// value, not into the stored record (the path already names the node).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auction {
    /// Store-assigned node path, set once at creation.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<String>,
    /// Product being auctioned.
    pub product_name: String,
    /// Opening price; bids must exceed the running best, which starts here.
    pub start_bid: Amount,
    /// When the auction officially opens for bidding participants.
    pub start_date: DateTime<Utc>,
    /// Advertised duration. Informational only; no timer enforces it.
    pub deadline_minutes: u32,
}

impl Auction {
    /// Validate field requirements for a record about to be stored.
    pub fn validate(&self) -> CoordinationResult<()> {
        if self.product_name.trim().is_empty() {
            return Err(CoordinationError::CorruptRecord(
                "auction record requires a product name".into(),
            ));
        }
        if self.deadline_minutes == 0 {
            return Err(CoordinationError::CorruptRecord(
                "auction record requires a positive deadline".into(),
            ));
        }
        Ok(())
    }

    /// True when the auction's start date is strictly in the future, i.e. it
    /// still accepts new participants.
    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.start_date > now
    }
}

// ---------------------------------------------------------------------------
// Bid record
// ---------------------------------------------------------------------------

/// A single bid, queued by a bidder and possibly promoted to the best bid.
///
/// Submission order among queued bids is carried by the store's sequence
/// suffix on the queue node, not by any field here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    /// Path of the auction this bid belongs to.
    pub auction: String,
    /// Registered bidder id. `None` only for the seed record that carries the
    /// auction's start bid before any promotion.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bidder: Option<String>,
    /// Offered value; must be positive.
    pub value: Amount,
}

impl Bid {
    /// The record the best-bid node is initialized with at auction creation.
    pub fn seed(auction: impl Into<String>, start_bid: Amount) -> Self {
        Self {
            auction: auction.into(),
            bidder: None,
            value: start_bid,
        }
    }

    /// Validate field requirements for a record about to be queued.
    pub fn validate(&self) -> CoordinationResult<()> {
        if self.auction.trim().is_empty() {
            return Err(CoordinationError::CorruptRecord(
                "bid record requires an auction reference".into(),
            ));
        }
        if self.value == 0 {
            return Err(CoordinationError::CorruptRecord(
                "bid record requires a positive value".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Bidder record
// ---------------------------------------------------------------------------

/// A registered auction participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bidder {
    /// Store-assigned registration path, set once when the bidder joins.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<String>,
    /// Human-readable name shown alongside bids.
    pub display_name: String,
}

impl Bidder {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            id: None,
            display_name: display_name.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Codec helpers
// ---------------------------------------------------------------------------

/// Encode a record to bytes for the store.
pub fn encode<T: Serialize>(value: &T) -> CoordinationResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| CoordinationError::CorruptRecord(e.to_string()))
}

/// Decode bytes from the store into a typed record.
pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> CoordinationResult<T> {
    serde_json::from_slice(data).map_err(|e| CoordinationError::CorruptRecord(e.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
