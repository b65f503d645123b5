//! Access control lists.
//!
//! Every entity carries two rule tables, one for read access and one for
//! write access. A table maps principal references (users or roles) to
//! `allow` or `deny`. An empty table means the access is public.

use crate::entity::Entity;
use crate::error::{OrmError, OrmResult};
use orestes_collections::Map;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};
use std::fmt;

/// Effect of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rule {
    /// Grants access.
    Allow,
    /// Denies access.
    Deny,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        })
    }
}

/// Reference path of a user or role, e.g. `/db/User/<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalRef(String);

impl PrincipalRef {
    /// Wraps a reference path.
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// The reference path.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Something rules can be granted to.
pub trait Principal {
    /// Reference under which rules for this principal are stored.
    fn principal_ref(&self) -> OrmResult<PrincipalRef>;
}

impl Principal for PrincipalRef {
    fn principal_ref(&self) -> OrmResult<PrincipalRef> {
        Ok(self.clone())
    }
}

impl Principal for Entity {
    /// Fails with `IllegalEntity` if the entity has no id yet.
    fn principal_ref(&self) -> OrmResult<PrincipalRef> {
        self.ref_path()
            .map(PrincipalRef)
            .ok_or_else(|| OrmError::illegal_entity(self.to_string()))
    }
}

impl<P: Principal + ?Sized> Principal for &P {
    fn principal_ref(&self) -> OrmResult<PrincipalRef> {
        (**self).principal_ref()
    }
}

/// One rule table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permission {
    rules: Map<PrincipalRef, Rule>,
}

impl Permission {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Principals with a rule, in insertion order.
    #[must_use]
    pub fn all_rules(&self) -> Vec<PrincipalRef> {
        self.rules.keys().collect()
    }

    /// The rule for `principal`, if any.
    pub fn get_rule(&self, principal: &impl Principal) -> OrmResult<Option<Rule>> {
        Ok(self.rules.get(&principal.principal_ref()?).copied())
    }

    /// Returns true if no rule is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns true if `principal` is explicitly allowed.
    pub fn is_allowed(&self, principal: &impl Principal) -> OrmResult<bool> {
        Ok(self.get_rule(principal)? == Some(Rule::Allow))
    }

    /// Returns true if `principal` is explicitly denied.
    pub fn is_denied(&self, principal: &impl Principal) -> OrmResult<bool> {
        Ok(self.get_rule(principal)? == Some(Rule::Deny))
    }

    /// Allows `principal`, replacing a deny rule.
    pub fn allow(&mut self, principal: &impl Principal) -> OrmResult<()> {
        self.rules.set(principal.principal_ref()?, Rule::Allow);
        Ok(())
    }

    /// Denies `principal`, replacing an allow rule.
    pub fn deny(&mut self, principal: &impl Principal) -> OrmResult<()> {
        self.rules.set(principal.principal_ref()?, Rule::Deny);
        Ok(())
    }

    /// Removes the rule for `principal`.
    pub fn delete(&mut self, principal: &impl Principal) -> OrmResult<()> {
        self.rules.remove(&principal.principal_ref()?);
        Ok(())
    }

    /// Removes every rule.
    pub fn clear(&mut self) {
        self.rules.clear();
    }

    fn to_json(&self) -> Json {
        Json::Array(
            self.rules
                .entries()
                .map(|(principal, rule)| json!({ "principal": principal, "rule": rule }))
                .collect(),
        )
    }

    fn from_json(json: &Json) -> OrmResult<Self> {
        #[derive(Deserialize)]
        struct Entry {
            principal: PrincipalRef,
            rule: Rule,
        }

        let entries: Vec<Entry> = match json {
            Json::Null => Vec::new(),
            other => serde_json::from_value(other.clone())
                .map_err(|e| OrmError::conversion(format!("invalid acl: {e}")))?,
        };
        let mut permission = Self::new();
        for entry in entries {
            permission.rules.set(entry.principal, entry.rule);
        }
        Ok(permission)
    }
}

/// Read and write rule tables of one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Acl {
    /// Read access rules.
    pub read: Permission,
    /// Write access rules.
    pub write: Permission,
}

impl Acl {
    /// Creates an ACL with public read and write access.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wire form: `{"read": [{"principal", "rule"}], "write": [...]}`.
    #[must_use]
    pub fn to_json(&self) -> Json {
        json!({ "read": self.read.to_json(), "write": self.write.to_json() })
    }

    /// Parses the wire form. Missing tables are empty.
    pub fn from_json(json: &Json) -> OrmResult<Self> {
        if json.is_null() {
            return Ok(Self::default());
        }
        let object = json
            .as_object()
            .ok_or_else(|| OrmError::conversion(format!("invalid acl: {json}")))?;
        Ok(Self {
            read: Permission::from_json(object.get("read").unwrap_or(&Json::Null))?,
            write: Permission::from_json(object.get("write").unwrap_or(&Json::Null))?,
        })
    }
}

/// The ACL of one entity.
///
/// Every mutation marks the entity's `acl` attribute dirty, whether or not
/// the rule tables actually change. Mutations return the handle so they
/// can be chained with `?`.
pub struct AclHandle<'a> {
    entity: &'a Entity,
}

impl<'a> AclHandle<'a> {
    pub(crate) fn new(entity: &'a Entity) -> Self {
        Self { entity }
    }

    /// Copy of both rule tables.
    #[must_use]
    pub fn snapshot(&self) -> Acl {
        self.entity.with_acl(Clone::clone)
    }

    /// Copy of the read rules.
    #[must_use]
    pub fn read(&self) -> Permission {
        self.entity.with_acl(|acl| acl.read.clone())
    }

    /// Copy of the write rules.
    #[must_use]
    pub fn write(&self) -> Permission {
        self.entity.with_acl(|acl| acl.write.clone())
    }

    /// True if no read rule is set.
    #[must_use]
    pub fn is_public_read_allowed(&self) -> bool {
        self.entity.with_acl(|acl| acl.read.is_empty())
    }

    /// True if no write rule is set.
    #[must_use]
    pub fn is_public_write_allowed(&self) -> bool {
        self.entity.with_acl(|acl| acl.write.is_empty())
    }

    /// True if `principal` is explicitly allowed to read.
    pub fn is_read_allowed(&self, principal: &impl Principal) -> OrmResult<bool> {
        self.entity.with_acl(|acl| acl.read.is_allowed(principal))
    }

    /// True if `principal` is explicitly denied reading.
    pub fn is_read_denied(&self, principal: &impl Principal) -> OrmResult<bool> {
        self.entity.with_acl(|acl| acl.read.is_denied(principal))
    }

    /// True if `principal` is explicitly allowed to write.
    pub fn is_write_allowed(&self, principal: &impl Principal) -> OrmResult<bool> {
        self.entity.with_acl(|acl| acl.write.is_allowed(principal))
    }

    /// True if `principal` is explicitly denied writing.
    pub fn is_write_denied(&self, principal: &impl Principal) -> OrmResult<bool> {
        self.entity.with_acl(|acl| acl.write.is_denied(principal))
    }

    /// Allows `principal` to read.
    pub fn allow_read_access(&self, principal: &impl Principal) -> OrmResult<&Self> {
        let principal = principal.principal_ref()?;
        self.mutate(|acl| acl.read.allow(&principal))
    }

    /// Denies `principal` reading.
    pub fn deny_read_access(&self, principal: &impl Principal) -> OrmResult<&Self> {
        let principal = principal.principal_ref()?;
        self.mutate(|acl| acl.read.deny(&principal))
    }

    /// Removes the read rule of `principal`.
    pub fn delete_read_access(&self, principal: &impl Principal) -> OrmResult<&Self> {
        let principal = principal.principal_ref()?;
        self.mutate(|acl| acl.read.delete(&principal))
    }

    /// Allows `principal` to write.
    pub fn allow_write_access(&self, principal: &impl Principal) -> OrmResult<&Self> {
        let principal = principal.principal_ref()?;
        self.mutate(|acl| acl.write.allow(&principal))
    }

    /// Denies `principal` writing.
    pub fn deny_write_access(&self, principal: &impl Principal) -> OrmResult<&Self> {
        let principal = principal.principal_ref()?;
        self.mutate(|acl| acl.write.deny(&principal))
    }

    /// Removes the write rule of `principal`.
    pub fn delete_write_access(&self, principal: &impl Principal) -> OrmResult<&Self> {
        let principal = principal.principal_ref()?;
        self.mutate(|acl| acl.write.delete(&principal))
    }

    /// Removes every rule from both tables.
    pub fn clear(&self) -> OrmResult<&Self> {
        self.mutate(|acl| {
            acl.read.clear();
            acl.write.clear();
            Ok(())
        })
    }

    /// Replaces both tables.
    pub fn replace(&self, rules: Acl) -> OrmResult<&Self> {
        self.mutate(|acl| {
            *acl = rules;
            Ok(())
        })
    }

    fn mutate(&self, change: impl FnOnce(&mut Acl) -> OrmResult<()>) -> OrmResult<&Self> {
        self.entity.mutate_acl(change)??;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> PrincipalRef {
        PrincipalRef::new("/db/User/1")
    }

    fn role() -> PrincipalRef {
        PrincipalRef::new("/db/Role/2")
    }

    #[test]
    fn empty_permission_is_public() {
        let acl = Acl::new();
        assert!(acl.read.is_empty());
        assert!(!acl.read.is_allowed(&user()).unwrap());
        assert!(!acl.read.is_denied(&user()).unwrap());
    }

    #[test]
    fn allow_replaces_deny() {
        let mut permission = Permission::new();
        permission.deny(&user()).unwrap();
        permission.allow(&user()).unwrap();
        assert!(permission.is_allowed(&user()).unwrap());
        assert!(!permission.is_denied(&user()).unwrap());
        assert_eq!(permission.all_rules(), vec![user()]);
    }

    #[test]
    fn rules_keep_insertion_order() {
        let mut permission = Permission::new();
        permission.allow(&role()).unwrap();
        permission.deny(&user()).unwrap();
        permission.allow(&role()).unwrap();
        assert_eq!(permission.all_rules(), vec![role(), user()]);
        assert_eq!(permission.get_rule(&user()).unwrap(), Some(Rule::Deny));

        permission.delete(&role()).unwrap();
        assert_eq!(permission.get_rule(&role()).unwrap(), None);
    }

    #[test]
    fn wire_format() {
        let mut acl = Acl::new();
        acl.read.allow(&user()).unwrap();
        acl.write.deny(&role()).unwrap();

        let json = acl.to_json();
        assert_eq!(
            json,
            json!({
                "read": [{"principal": "/db/User/1", "rule": "allow"}],
                "write": [{"principal": "/db/Role/2", "rule": "deny"}],
            })
        );
        assert_eq!(Acl::from_json(&json).unwrap(), acl);
        assert_eq!(Acl::from_json(&Json::Null).unwrap(), Acl::new());
        assert!(Acl::from_json(&json!({"read": [{"principal": "x", "rule": "maybe"}]})).is_err());
    }
}
