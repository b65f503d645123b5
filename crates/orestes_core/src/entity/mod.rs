//! Managed objects.
//!
//! An [`Entity`] is a shared handle: clones refer to the same object. Every
//! entity owns a hidden [`State`] with its lifecycle, version and dirty
//! flags, and one attribute slot per attribute of its managed type.
//! Attribute values point at other entities through [`EntityRef`]s, which
//! do not keep an identified entity alive.

mod handle;
mod id;
mod reference;
mod state;

pub use handle::{DetachedResolver, Entity, WeakEntity};
pub use id::{format_ref, parse_ref, EntityId, REF_PREFIX};
pub(crate) use reference::Scope;
pub use reference::EntityRef;
pub(crate) use state::SaveTicket;
pub use state::{Lifecycle, State};
