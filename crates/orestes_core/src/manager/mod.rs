//! Sessions and their factory.
//!
//! The [`EntityManagerFactory`] bootstraps the metamodel against the server
//! once; each [`EntityManager`] it creates is a session with its own
//! identity map that saves, loads, refreshes and deletes entities through
//! the shared transport.

mod factory;
mod identity;
mod message;
mod session;

pub use factory::EntityManagerFactory;
pub use session::EntityManager;
