//! Namespace resolver with a configurable root.
//!
//! The resolver is a pure, stateless translator from auction identity to
//! concrete node paths. No hard-coded path strings appear in runtime code;
//! every component asks the resolver. Layout under the root:
//!
//! ```text
//! <root>/auction-<seq>                     auction record
//! <root>/auction-<seq>/bestbid             versioned best-bid record
//! <root>/auction-<seq>/bidders/bidder-<seq>
//! <root>/auction-<seq>/bids/bid-<seq>
//! <root>/auction-<seq>/start               barrier release marker
//! ```

use config::DEFAULT_ROOT_PATH;

use crate::error::{CoordinationError, CoordinationResult};

/// Pure path resolver rooted at a configurable namespace.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: String,
}

impl PathResolver {
    /// Create a resolver for the given root path.
    ///
    /// Returns an error if the root is empty, relative, slash-terminated,
    /// contains whitespace, or carries an unresolved `{…}` placeholder.
    pub fn new(root: impl Into<String>) -> CoordinationResult<Self> {
        let root = root.into();
        if root.trim().is_empty() {
            return Err(CoordinationError::Config("root path is empty".into()));
        }
        if !root.starts_with('/') {
            return Err(CoordinationError::Config(format!(
                "root path must be absolute: '{root}'"
            )));
        }
        if root.len() > 1 && root.ends_with('/') {
            return Err(CoordinationError::Config(format!(
                "root path must not end with '/': '{root}'"
            )));
        }
        if root.chars().any(char::is_whitespace) {
            return Err(CoordinationError::Config(format!(
                "root path contains whitespace: '{root}'"
            )));
        }
        if root.contains('{') || root.contains('}') {
            return Err(CoordinationError::Config(format!(
                "root path contains unresolved placeholder: '{root}'"
            )));
        }
        Ok(Self { root })
    }

    /// Create a resolver using the default root.
    pub fn with_defaults() -> Self {
        Self {
            root: DEFAULT_ROOT_PATH.to_owned(),
        }
    }

    /// The configured root path.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Sequential-create prefix for new auction nodes.
    pub fn auction_prefix(&self) -> String {
        format!("{}/auction-", self.root)
    }

    /// Full path of an auction from its child name under the root.
    pub fn auction(&self, child: &str) -> String {
        format!("{}/{child}", self.root)
    }

    /// Best-bid node of an auction.
    pub fn best_bid(&self, auction_path: &str) -> String {
        format!("{auction_path}/bestbid")
    }

    /// Bidder registry node of an auction.
    pub fn bidders(&self, auction_path: &str) -> String {
        format!("{auction_path}/bidders")
    }

    /// Sequential-create prefix for new bidder registrations.
    pub fn bidder_prefix(&self, auction_path: &str) -> String {
        format!("{auction_path}/bidders/bidder-")
    }

    /// Bid queue node of an auction.
    pub fn bids(&self, auction_path: &str) -> String {
        format!("{auction_path}/bids")
    }

    /// Sequential-create prefix for queued bids.
    pub fn bid_prefix(&self, auction_path: &str) -> String {
        format!("{auction_path}/bids/bid-")
    }

    /// Barrier release marker of an auction.
    pub fn start_marker(&self, auction_path: &str) -> String {
        format!("{auction_path}/start")
    }
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
