//! # Orestes Testkit
//!
//! Test utilities for Orestes.
//!
//! This crate provides:
//! - `MemoryServer`: an in-memory document server implementing `Transport`
//! - `ManualTransport`: parks requests until the test answers them, in any order
//! - Fixtures: a small domain model and ready-made sessions
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use orestes_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn saves_person() {
//!     let (server, em) = memory_session().await.unwrap();
//!     let person = em.create("Person").unwrap();
//!     em.save(&person).await.unwrap();
//!     assert_eq!(server.object_count(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod manual;
pub mod server;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::manual::*;
    pub use crate::server::*;
}

pub use fixtures::*;
pub use generators::*;
pub use manual::{ManualTransport, PendingRequest};
pub use server::{MemoryServer, SERVER_VERSION};
