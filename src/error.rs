//! Error types for minibus.

use thiserror::Error;

use crate::bus::CYCLIC_DISPATCH_LIMIT;

/// Main error type for all bus operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BusError {
    /// A send resulted in a cyclic dispatch chain.
    ///
    /// Raised exactly once, at the top-level `send` whose recursive subtree
    /// exceeded [`CYCLIC_DISPATCH_LIMIT`] nested dispatches.
    #[error("send resulted in a cyclic dispatch chain ({limit} nested sends)", limit = CYCLIC_DISPATCH_LIMIT)]
    CyclicDispatch,

    /// `auto_register` was called with an empty subscriber list.
    #[error("no subscribers specified")]
    NoSubscribers,
}

/// Result type alias using BusError.
pub type Result<T> = std::result::Result<T, BusError>;
