//! Property-based test generators using proptest.

use orestes_core::EntityId;
use proptest::prelude::*;
use serde_json::{json, Value as Json};

/// Strategy for entity ids.
pub fn entity_id_strategy() -> impl Strategy<Value = EntityId> {
    prop::array::uniform16(any::<u8>()).prop_map(EntityId::from_bytes)
}

/// Strategy for short lowercase words, used as tags and map keys.
pub fn word_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,8}"
}

/// Strategy for finite numbers that survive a JSON round trip exactly.
pub fn number_strategy() -> impl Strategy<Value = f64> {
    (-1_000_000i64..1_000_000).prop_map(|n| n as f64 / 4.0)
}

/// Strategy for tag lists, possibly with duplicates.
pub fn tags_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(word_strategy(), 0..12)
}

/// Strategy for score records with distinct keys, in generation order.
pub fn scores_strategy() -> impl Strategy<Value = Vec<(String, f64)>> {
    prop::collection::vec((word_strategy(), number_strategy()), 0..10).prop_map(|pairs| {
        let mut seen = std::collections::HashSet::new();
        pairs
            .into_iter()
            .filter(|(key, _)| seen.insert(key.clone()))
            .collect()
    })
}

/// Strategy for the wire document of a persisted `Person`.
///
/// Tags and score keys are distinct, so the document is already in the
/// normalized form the mapper produces.
pub fn person_document_strategy() -> impl Strategy<Value = Json> {
    (
        entity_id_strategy(),
        1u64..1_000,
        word_strategy(),
        prop::option::of(number_strategy()),
        tags_strategy(),
        scores_strategy(),
    )
        .prop_map(|(id, version, name, age, tags, scores)| {
            let mut seen = std::collections::HashSet::new();
            let tags: Vec<String> = tags.into_iter().filter(|t| seen.insert(t.clone())).collect();
            let scores: Vec<Json> = scores
                .into_iter()
                .map(|(key, value)| json!({ "key": key, "value": value }))
                .collect();
            json!({
                "id": id.to_string(),
                "version": version,
                "name": name,
                "age": age,
                "tags": tags,
                "scores": scores,
            })
        })
}

/// One mutation of a `Person`, for state machine style tests.
#[derive(Debug, Clone)]
pub enum PersonMutation {
    /// Assign `name`.
    Rename(String),
    /// Add a tag.
    AddTag(String),
    /// Remove a tag.
    RemoveTag(String),
    /// Put a score.
    Score(String, f64),
    /// Append a nickname.
    AddNickname(String),
}

impl PersonMutation {
    /// The attribute the mutation dirties.
    pub fn attribute(&self) -> &'static str {
        match self {
            Self::Rename(_) => "name",
            Self::AddTag(_) | Self::RemoveTag(_) => "tags",
            Self::Score(..) => "scores",
            Self::AddNickname(_) => "nicknames",
        }
    }
}

/// Strategy for a single mutation.
pub fn person_mutation_strategy() -> impl Strategy<Value = PersonMutation> {
    prop_oneof![
        word_strategy().prop_map(PersonMutation::Rename),
        word_strategy().prop_map(PersonMutation::AddTag),
        word_strategy().prop_map(PersonMutation::RemoveTag),
        (word_strategy(), number_strategy()).prop_map(|(k, v)| PersonMutation::Score(k, v)),
        word_strategy().prop_map(PersonMutation::AddNickname),
    ]
}
