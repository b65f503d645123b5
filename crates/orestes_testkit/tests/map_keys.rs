//! Map attributes on the wire: keys without a wire form, record
//! reconciliation and malformed records.

use orestes_core::{Config, MapKeyPolicy, OrmError, Value};
use orestes_testkit::prelude::*;
use serde_json::json;

#[tokio::test]
async fn unsaved_keys_are_hidden_by_default() {
    let (server, em) = memory_session().await.unwrap();
    let saved = em.create("Person").unwrap();
    em.save(&saved).await.unwrap();
    let unsaved = em.create("Person").unwrap();

    let person = em.create("Person").unwrap();
    let ratings = person.get("ratings").unwrap();
    let ratings = ratings.as_map().unwrap();
    ratings.set(&saved, 5).unwrap();
    ratings.set(&unsaved, 3).unwrap();
    em.save(&person).await.unwrap();

    let stored = server.object("Person", person.id().unwrap()).unwrap();
    assert_eq!(
        stored["ratings"],
        json!([{"key": saved.ref_path().unwrap(), "value": 5.0}])
    );
    assert_eq!(ratings.len(), 2);
    assert!(ratings.has(&Value::from(&unsaved)));
}

#[tokio::test]
async fn unsaved_keys_can_be_evicted() {
    let config = Config::default().map_key_policy(MapKeyPolicy::Evict);
    let (server, factory) = memory_factory(config).await.unwrap();
    let em = factory.create_entity_manager();
    let unsaved = em.create("Person").unwrap();

    let person = em.create("Person").unwrap();
    let ratings = person.get("ratings").unwrap();
    let ratings = ratings.as_map().unwrap();
    ratings.set(&unsaved, 3).unwrap();
    ratings.set(Value::Null, 1).unwrap();
    em.save(&person).await.unwrap();

    let stored = server.object("Person", person.id().unwrap()).unwrap();
    assert_eq!(stored["ratings"], json!([{"key": null, "value": 1.0}]));
    assert_eq!(ratings.len(), 1);
    assert!(!ratings.has(&Value::from(&unsaved)));
    assert!(!person.is_dirty());
}

#[tokio::test]
async fn reload_keeps_collection_identity() {
    let (_server, factory) = memory_factory(Config::default()).await.unwrap();
    let em = factory.create_entity_manager();
    let person = em.create("Person").unwrap();
    let scores = person.get("scores").unwrap();
    let scores = scores.as_map().unwrap().clone();
    scores.set("a", 1).unwrap();
    scores.set("b", 2).unwrap();
    let tags = person.get("tags").unwrap().as_set().unwrap().clone();
    tags.add("x").unwrap();
    em.save(&person).await.unwrap();
    let id = person.id().unwrap();

    let other = factory.create_entity_manager();
    let copy = other.load("Person", id).await.unwrap().unwrap();
    let copy_scores = copy.get("scores").unwrap();
    copy_scores.as_map().unwrap().remove(&Value::from("a")).unwrap();
    copy_scores.as_map().unwrap().set("c", 3).unwrap();
    copy.get("tags").unwrap().as_set().unwrap().add("y").unwrap();
    other.save(&copy).await.unwrap();

    em.refresh(&person).await.unwrap();
    assert_eq!(person.get("scores").unwrap().as_map(), Some(&scores));
    assert_eq!(person.get("tags").unwrap().as_set(), Some(&tags));

    let keys: Vec<Value> = scores.keys().collect();
    assert_eq!(keys, vec![Value::from("b"), Value::from("c")]);
    assert!(tags.has(&Value::from("y")));
    assert!(!person.is_dirty());
}

#[tokio::test]
async fn malformed_records_are_reconciled_best_effort() {
    let (server, em) = memory_session().await.unwrap();
    let id = server.seed(
        "Person",
        json!({"scores": [
            {"key": "a", "value": 1},
            {"key": "a", "value": 2},
            {"value": 3},
        ]}),
    );

    let person = em.load("Person", id).await.unwrap().unwrap();
    let scores = person.get("scores").unwrap();
    let scores = scores.as_map().unwrap();
    assert_eq!(scores.len(), 2);
    assert_eq!(scores.get(&Value::from("a")), Some(Value::from(2)));
    assert_eq!(scores.get(&Value::Null), Some(Value::from(3)));
}

#[tokio::test]
async fn strict_mode_rejects_malformed_records() {
    let config = Config::default().strict_map_records(true);
    let (server, factory) = memory_factory(config).await.unwrap();
    let em = factory.create_entity_manager();

    let duplicate = server.seed(
        "Person",
        json!({"scores": [{"key": "a", "value": 1}, {"key": "a", "value": 2}]}),
    );
    let incomplete = server.seed("Person", json!({"scores": [{"key": "a"}]}));

    for id in [duplicate, incomplete] {
        let result = em.load("Person", id).await;
        assert!(matches!(result, Err(OrmError::MalformedRecords { .. })));
    }
}
