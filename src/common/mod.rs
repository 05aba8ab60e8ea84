//! Common types and utilities shared across fstree.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Format constants, keys, block numbers and errors (from `fstree-core`)
//! - Node handles ([`NodeId`])
//! - Tree configuration ([`TreeConfig`])

pub mod config;
mod node_id;

pub use config::{NodeFormat, TreeConfig};
pub use fstree_core::config as format;
pub use fstree_core::{BlockNr, Error, Key, KeyType, Result, KEY_SIZE};
pub use node_id::NodeId;
