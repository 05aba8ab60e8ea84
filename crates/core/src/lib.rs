//! Core types and constants for fstree.
//!
//! This crate provides the fundamental abstractions shared by every layer of
//! the tree engine:
//!
//! # Types
//! - [`Key`] - The 24-byte composite key addressing every stored item
//! - [`KeyType`] - Minor type tag packed into the key's first word
//! - [`BlockNr`] - Identifier for blocks on the device
//!
//! # Constants
//! - [`config`] - On-disk format constants (node header sizes, magic, levels)
//!
//! # Error Handling
//! - [`Error`] - Unified error type
//! - [`Result<T>`] - Convenient result alias
//!
//! # Example
//! ```
//! use fstree_core::{Key, KeyType};
//!
//! let a = Key::stat_data(42, 100);
//! let b = Key::file_body(42, 100, 0);
//!
//! assert_eq!(a.minor(), KeyType::StatData);
//! assert!(a < b);
//! assert!(Key::minimal() < a && b < Key::maximal());
//! ```

pub mod config;
pub mod error;
pub mod key;
pub mod types;

pub use error::{Error, Result};
pub use key::{Key, KeyType, KEY_SIZE};
pub use types::BlockNr;
