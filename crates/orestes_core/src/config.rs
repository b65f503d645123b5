//! Runtime configuration.

/// What to do with a map entry whose key has no wire representation
/// (for example a reference to an entity that was never saved).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapKeyPolicy {
    /// Leave the entry in memory and omit it from the wire.
    #[default]
    Hide,
    /// Remove the entry from the in-memory map as well.
    Evict,
}

/// Configuration shared by an entity manager factory and its sessions.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path prefix of the object REST resources.
    pub base_path: String,

    /// Handling of map keys without a wire representation.
    pub map_key_policy: MapKeyPolicy,

    /// Whether malformed map records on load are an error instead of being
    /// reconciled best effort.
    pub strict_map_records: bool,

    /// Whether the metamodel is sealed once bootstrap completes.
    pub seal_metamodel: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_path: "/db".to_string(),
            map_key_policy: MapKeyPolicy::Hide,
            strict_map_records: false,
            seal_metamodel: true,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the object resource prefix.
    #[must_use]
    pub fn base_path(mut self, path: impl Into<String>) -> Self {
        self.base_path = path.into();
        self
    }

    /// Sets the map key policy.
    #[must_use]
    pub fn map_key_policy(mut self, policy: MapKeyPolicy) -> Self {
        self.map_key_policy = policy;
        self
    }

    /// Sets strict map record validation.
    #[must_use]
    pub fn strict_map_records(mut self, value: bool) -> Self {
        self.strict_map_records = value;
        self
    }

    /// Sets whether bootstrap seals the metamodel.
    #[must_use]
    pub fn seal_metamodel(mut self, value: bool) -> Self {
        self.seal_metamodel = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.base_path, "/db");
        assert_eq!(config.map_key_policy, MapKeyPolicy::Hide);
        assert!(!config.strict_map_records);
        assert!(config.seal_metamodel);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .base_path("/v1/db")
            .map_key_policy(MapKeyPolicy::Evict)
            .strict_map_records(true)
            .seal_metamodel(false);

        assert_eq!(config.base_path, "/v1/db");
        assert_eq!(config.map_key_policy, MapKeyPolicy::Evict);
        assert!(config.strict_map_records);
        assert!(!config.seal_metamodel);
    }
}
