//! Per-entity lifecycle state.

use std::collections::BTreeMap;

/// Persistence status of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    /// Newly constructed, never sent to the server, no id.
    Transient,
    /// Has an optimistic id; a save was requested but not yet confirmed.
    Attached,
    /// Confirmed by the server, or loaded from it.
    Persistent,
    /// Deleted on the server. Terminal.
    Removed,
}

impl Lifecycle {
    /// Returns true once the server has confirmed the entity.
    pub fn is_persistent(&self) -> bool {
        matches!(self, Lifecycle::Persistent)
    }

    /// Returns true for the terminal state.
    pub fn is_removed(&self) -> bool {
        matches!(self, Lifecycle::Removed)
    }
}

/// What a save request carried, needed to apply its acknowledgement.
#[derive(Debug, Clone)]
pub(crate) struct SaveTicket {
    /// The entity was transient when the save was requested.
    pub(crate) insert: bool,
    /// All attributes are serialized, not only the dirty ones.
    pub(crate) full: bool,
    /// Dirty attributes with the mutation stamp they had when sent.
    pub(crate) sent: Vec<(String, u64)>,
}

impl SaveTicket {
    pub(crate) fn includes(&self, attribute: &str) -> bool {
        self.full || self.sent.iter().any(|(name, _)| name == attribute)
    }
}

/// Hidden lifecycle record of one entity.
///
/// Dirty flags are stamped with a per-entity mutation sequence number. An
/// acknowledgement only clears a flag whose stamp still equals the stamp
/// that was sent, so mutations made while a save is in flight stay dirty.
#[derive(Debug, Clone)]
pub struct State {
    type_name: String,
    version: Option<u64>,
    lifecycle: Lifecycle,
    loaded: bool,
    dirty: BTreeMap<String, u64>,
    sequence: u64,
}

impl State {
    /// State of a freshly constructed entity.
    pub(crate) fn transient(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            version: None,
            lifecycle: Lifecycle::Transient,
            loaded: true,
            dirty: BTreeMap::new(),
            sequence: 0,
        }
    }

    /// State of a reference known by id only.
    pub(crate) fn hollow(type_name: &str) -> Self {
        Self {
            lifecycle: Lifecycle::Persistent,
            loaded: false,
            ..Self::transient(type_name)
        }
    }

    /// Name of the entity type, for diagnostics.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Last version confirmed by the server.
    pub fn version(&self) -> Option<u64> {
        self.version
    }

    /// Current lifecycle status.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// False for references whose attributes were never fetched.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Returns true if any attribute is dirty.
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Returns true if the attribute is dirty.
    pub fn is_attribute_dirty(&self, attribute: &str) -> bool {
        self.dirty.contains_key(attribute)
    }

    /// Names of the dirty attributes in name order.
    pub fn dirty_attributes(&self) -> Vec<String> {
        self.dirty.keys().cloned().collect()
    }

    /// Flags an attribute as locally modified.
    pub(crate) fn mark_dirty(&mut self, attribute: &str) {
        self.sequence += 1;
        self.dirty.insert(attribute.to_string(), self.sequence);
    }

    /// Marks the entity as in sync with the server without a round trip.
    pub fn set_persistent(&mut self) {
        if self.lifecycle != Lifecycle::Removed {
            self.lifecycle = Lifecycle::Persistent;
        }
        self.loaded = true;
        self.dirty.clear();
    }

    /// Starts a save: transient entities become attached.
    ///
    /// Returns `None` if the entity is removed.
    pub(crate) fn begin_save(&mut self) -> Option<SaveTicket> {
        let insert = match self.lifecycle {
            Lifecycle::Removed => return None,
            Lifecycle::Transient => {
                self.lifecycle = Lifecycle::Attached;
                true
            }
            Lifecycle::Attached | Lifecycle::Persistent => false,
        };

        Some(SaveTicket {
            insert,
            full: self.version.is_none() && self.loaded,
            sent: self
                .dirty
                .iter()
                .map(|(name, stamp)| (name.clone(), *stamp))
                .collect(),
        })
    }

    /// Applies a save acknowledgement.
    ///
    /// Returns false if the response is stale (its version is not newer than
    /// the confirmed one) or the entity was removed meanwhile; nothing changes
    /// in that case.
    pub(crate) fn confirm_save(&mut self, version: u64, ticket: &SaveTicket) -> bool {
        if self.lifecycle == Lifecycle::Removed || self.is_stale(version, false) {
            return false;
        }

        self.version = Some(version);
        self.lifecycle = Lifecycle::Persistent;
        for (name, stamp) in &ticket.sent {
            if self.dirty.get(name) == Some(stamp) {
                self.dirty.remove(name);
            }
        }
        true
    }

    /// Returns true if a load response carrying `version` may be applied.
    pub(crate) fn accepts_load(&self, version: u64) -> bool {
        self.lifecycle != Lifecycle::Removed && !self.is_stale(version, true)
    }

    /// Sequence number of the latest local mutation.
    pub(crate) fn mutation_mark(&self) -> u64 {
        self.sequence
    }

    /// Returns true if `attribute` was mutated after `mark` was taken.
    pub(crate) fn dirtied_since(&self, attribute: &str, mark: u64) -> bool {
        self.dirty.get(attribute).is_some_and(|stamp| *stamp > mark)
    }

    /// Applies a load: persistent and loaded.
    ///
    /// Flags stamped after `mark` belong to mutations the response cannot
    /// reflect and stay dirty; every older flag is cleared.
    pub(crate) fn confirm_load(&mut self, version: u64, mark: u64) {
        self.version = Some(version);
        self.lifecycle = Lifecycle::Persistent;
        self.loaded = true;
        self.dirty.retain(|_, stamp| *stamp > mark);
    }

    /// Applies a delete acknowledgement.
    pub(crate) fn confirm_delete(&mut self) {
        self.lifecycle = Lifecycle::Removed;
        self.dirty.clear();
    }

    fn is_stale(&self, version: u64, allow_equal: bool) -> bool {
        match self.version {
            Some(current) if allow_equal => version < current,
            Some(current) => version <= current,
            None => false,
        }
    }
}
