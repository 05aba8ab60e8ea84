//! Node handle type.

use std::fmt;

/// Identifies a loaded node in the node cache.
///
/// A handle is a slot index plus the generation of the slot at the time the
/// node was loaded. Unloading a node bumps the slot's generation, so a handle
/// kept past an eviction is detected as stale instead of silently addressing
/// whatever node reuses the slot.
///
/// # Example
/// ```
/// use fstree::NodeId;
///
/// let id = NodeId::new(5, 1);
/// assert_eq!(id.index(), 5);
/// assert!(!NodeId::INVALID.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    /// Sentinel handle that never resolves.
    pub const INVALID: NodeId = NodeId {
        index: u32::MAX,
        generation: u32::MAX,
    };

    /// Create a new NodeId.
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        NodeId { index, generation }
    }

    /// Slot index in the cache arena.
    #[inline]
    pub fn index(&self) -> usize {
        self.index as usize
    }

    /// Slot generation this handle was issued for.
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Check if this handle is not the sentinel value.
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "Node(INVALID)")
        } else {
            write!(f, "Node({}#{})", self.index, self.generation)
        }
    }
}
