//! Entity identifier and object references.

use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Prefix of every object reference on the wire.
///
/// References name objects in the logical `/db/<Type>/<uuid>` namespace of
/// the server. They do not follow `Config::base_path`, which only locates
/// the REST resources, so documents stay valid when the API is mounted
/// elsewhere.
pub const REF_PREFIX: &str = "/db/";

/// Unique identifier for an entity.
///
/// Entity IDs are 128-bit UUIDs that are:
/// - Assigned optimistically by the client on first save
/// - Immutable once assigned
/// - Rendered in hyphenated form on the wire
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId([u8; 16]);

impl EntityId {
    /// Creates an entity ID from raw bytes.
    #[inline]
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Creates a new random entity ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().into_bytes())
    }

    /// Returns the raw bytes.
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Converts to a UUID.
    #[must_use]
    pub fn to_uuid(&self) -> Uuid {
        Uuid::from_bytes(self.0)
    }

    /// Parses the hyphenated wire form.
    ///
    /// Returns `None` if the text is not a UUID.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        Uuid::parse_str(text).ok().map(Self::from)
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.to_uuid())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uuid())
    }
}

impl FromStr for EntityId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self::from)
    }
}

impl From<Uuid> for EntityId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid.into_bytes())
    }
}

impl From<EntityId> for Uuid {
    fn from(id: EntityId) -> Self {
        id.to_uuid()
    }
}

/// Formats the reference path of an object: `/db/<Type>/<id>`.
#[must_use]
pub fn format_ref(type_name: &str, id: EntityId) -> String {
    format!("{REF_PREFIX}{type_name}/{id}")
}

/// Splits a reference path into type name and id.
#[must_use]
pub fn parse_ref(reference: &str) -> Option<(&str, EntityId)> {
    let rest = reference.strip_prefix(REF_PREFIX)?;
    let (type_name, id) = rest.rsplit_once('/')?;
    if type_name.is_empty() {
        return None;
    }
    Some((type_name, EntityId::parse(id)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_unique() {
        let id1 = EntityId::new();
        let id2 = EntityId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn display_parses_back() {
        let id = EntityId::new();
        let text = id.to_string();
        assert_eq!(EntityId::parse(&text), Some(id));
        assert_eq!(text.parse::<EntityId>().unwrap(), id);
        assert!(EntityId::parse("not-a-uuid").is_none());
    }

    #[test]
    fn uuid_conversion() {
        let uuid = Uuid::new_v4();
        let id = EntityId::from(uuid);
        assert_eq!(id.to_uuid(), uuid);
    }

    #[test]
    fn references() {
        let id = EntityId::from_bytes([7; 16]);
        let reference = format_ref("Person", id);
        assert!(reference.starts_with("/db/Person/"));
        assert_eq!(parse_ref(&reference), Some(("Person", id)));

        assert_eq!(parse_ref("/db/Person"), None);
        assert_eq!(parse_ref("/other/Person/x"), None);
        assert_eq!(parse_ref(&format!("/db//{id}")), None);
    }
}
