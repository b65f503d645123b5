//! # Orestes Collections
//!
//! Ordered containers backing the plural attributes of managed entities.
//!
//! This crate provides:
//! - `List`: indexed sequence with negative indexing and auto-grow
//! - `Set`: insertion-ordered sequence with uniqueness by equality scan
//! - `Map`: association list of parallel key and value sequences
//! - `Cursor`: single-pass snapshot cursor signalling `StopIteration`
//! - `Sequenceable`: generic algorithms built on the cursor protocol
//!
//! The containers scan linearly. They are sized for attribute values of a
//! single entity, not for general purpose key/value storage.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod iter;
mod list;
mod map;
mod set;

pub use error::{IterResult, StopIteration};
pub use iter::{Cursor, Sequenceable};
pub use list::List;
pub use map::{Map, Record};
pub use set::Set;
