//! Error types for fstree.

use thiserror::Error;

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in the tree engine.
///
/// Composite operations stop at the first error and return it upward. Changes
/// applied before the error are kept; atomicity is the job of the caller's
/// transaction layer.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed argument: a coordinate that does not address what the
    /// operation needs, an item that can never fit into a node, a bad config.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Structural corruption detected in a node or in the tree.
    #[error("block {block} is corrupted: {reason}")]
    Corrupted { block: u64, reason: String },

    /// The block allocator has no free blocks, or a node cannot be made to
    /// hold the requested bytes.
    #[error("no space left")]
    NoSpace,

    /// The node cache cannot hold another node.
    #[error("out of memory")]
    OutOfMemory,

    /// I/O error from the block device.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An item with the same key is already stored.
    #[error("key already exists")]
    AlreadyExists,

    /// The requested key or block does not exist.
    #[error("not found")]
    NotFound,

    /// A node handle refers to a node that has since been unloaded.
    #[error("stale node handle")]
    StaleHandle,

    /// A mutating operation was attempted on a read-only tree.
    #[error("tree is read-only")]
    ReadOnly,

    /// A node is still referenced and cannot be unloaded.
    #[error("node at block {0} is busy")]
    NodeBusy(u64),
}

impl Error {
    /// Shorthand for a corruption error.
    pub fn corrupted(block: u64, reason: impl Into<String>) -> Self {
        Error::Corrupted {
            block,
            reason: reason.into(),
        }
    }

    /// Shorthand for an invalid argument error.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Error::InvalidArgument(reason.into())
    }
}
