//! Best-bid register: the single mutable node per auction.
//!
//! All mutation goes through a version-conditioned write; there is no
//! unconditional overwrite anywhere. Promotion re-reads and re-validates on
//! every attempt, so a queued bid that went stale while waiting is discarded
//! instead of clobbering a better value that won the race.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{CoordinationError, CoordinationResult};
use crate::models::{self, Bid};
use crate::paths::PathResolver;
use crate::store::CoordinationStore;

/// Default maximum attempts for a contended promotion.
const DEFAULT_MAX_RETRIES: u32 = 5;

/// Retry policy for promotion conflict resolution.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts before surfacing `PromotionAborted`.
    pub max_retries: u32,
    /// Base delay between attempts (actual delay uses exponential backoff).
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(25),
        }
    }
}

impl From<&config::PromotionSettings> for RetryPolicy {
    fn from(settings: &config::PromotionSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.base_delay_ms),
        }
    }
}

/// Outcome of a promotion attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromotionOutcome {
    /// The candidate became the canonical best bid at the given version.
    Promoted { bid: Bid, version: u64 },
    /// The candidate was not greater than the current best and was dropped.
    Discarded { best: Bid },
}

/// Versioned register holding an auction's canonical best bid.
#[derive(Debug)]
pub struct BestBidRegister<S: CoordinationStore + ?Sized> {
    store: Arc<S>,
    paths: PathResolver,
    retry_policy: RetryPolicy,
}

impl<S: CoordinationStore + ?Sized> Clone for BestBidRegister<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            paths: self.paths.clone(),
            retry_policy: self.retry_policy.clone(),
        }
    }
}

impl<S: CoordinationStore + ?Sized> BestBidRegister<S> {
    /// Create a register handle with the default retry policy.
    pub fn new(store: Arc<S>, paths: PathResolver) -> Self {
        Self {
            store,
            paths,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Create a register handle with a custom retry policy.
    pub fn with_retry_policy(store: Arc<S>, paths: PathResolver, retry_policy: RetryPolicy) -> Self {
        Self {
            store,
            paths,
            retry_policy,
        }
    }

    /// Read the current best bid and the version guarding it.
    pub async fn read(&self, auction_path: &str) -> CoordinationResult<(Bid, u64)> {
        let node = self.paths.best_bid(auction_path);
        let value = self.store.read(&node).await?;
        let bid = models::decode(&value.data)?;
        Ok((bid, value.version))
    }

    /// Write `candidate` only if the register's version still equals
    /// `expected`; returns the new version. A mismatch is `VersionConflict`
    /// and writes nothing.
    pub async fn compare_and_set(
        &self,
        auction_path: &str,
        candidate: &Bid,
        expected: u64,
    ) -> CoordinationResult<u64> {
        let node = self.paths.best_bid(auction_path);
        let payload = models::encode(candidate)?;
        self.store.write_if_version(&node, &payload, expected).await
    }

    /// Promote `candidate` to the canonical best bid.
    ///
    /// Read, validate, compare-and-set; on conflict re-read and retry from
    /// scratch with exponential backoff. The validate step runs on every
    /// attempt: a candidate that was ahead when queued may be stale by the
    /// time its turn comes, in which case it is discarded, not written.
    pub async fn promote(
        &self,
        auction_path: &str,
        candidate: Bid,
    ) -> CoordinationResult<PromotionOutcome> {
        candidate.validate()?;
        let mut attempts = 0u32;
        loop {
            let (best, version) = self.read(auction_path).await?;
            if candidate.value <= best.value {
                debug!(
                    auction_path,
                    candidate = candidate.value,
                    best = best.value,
                    "candidate not above best, discarding"
                );
                return Ok(PromotionOutcome::Discarded { best });
            }

            match self.compare_and_set(auction_path, &candidate, version).await {
                Ok(new_version) => {
                    debug!(
                        auction_path,
                        value = candidate.value,
                        version = new_version,
                        "best bid promoted"
                    );
                    return Ok(PromotionOutcome::Promoted {
                        bid: candidate,
                        version: new_version,
                    });
                }
                Err(err) if err.is_conflict() => {
                    attempts += 1;
                    if attempts >= self.retry_policy.max_retries {
                        warn!(auction_path, attempts, "promotion retry budget exhausted");
                        return Err(CoordinationError::PromotionAborted { attempts });
                    }
                    tokio::time::sleep(
                        self.retry_policy.base_delay * 2u32.saturating_pow(attempts - 1),
                    )
                    .await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
