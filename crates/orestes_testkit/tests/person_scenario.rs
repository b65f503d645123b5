//! End-to-end save and load of the fixture `Person` against the in-memory
//! server.

use chrono::{TimeZone, Utc};
use orestes_core::{Config, Embedded, Method, Value};
use orestes_testkit::prelude::*;
use serde_json::json;

#[tokio::test]
async fn duplicate_tag_ignored_and_resave_sends_only_tags() {
    let (server, em) = memory_session().await.unwrap();

    let person = em.create("Person").unwrap();
    person.set("name", "Ada").unwrap();
    let tags = person.get("tags").unwrap();
    let tags = tags.as_set().unwrap();
    assert!(tags.add("math").unwrap());
    assert!(!tags.add("math").unwrap());
    assert_eq!(tags.len(), 1);

    em.save(&person).await.unwrap();
    let id = person.id().unwrap();
    let stored = server.object("Person", id).unwrap();
    assert_eq!(stored["name"], "Ada");
    assert_eq!(stored["tags"], json!(["math"]));
    assert_eq!(person.version(), Some(1));
    assert!(!person.is_dirty());

    tags.add("logic").unwrap();
    assert!(person.is_attribute_dirty("tags"));
    assert!(!person.is_attribute_dirty("name"));
    assert_eq!(person.dirty_attributes(), vec!["tags".to_string()]);

    em.save(&person).await.unwrap();
    let update = server.requests().pop().unwrap();
    assert_eq!(update.method, Method::Put);
    let body = update.body.unwrap();
    let mut keys: Vec<&String> = body.as_object().unwrap().keys().collect();
    keys.sort();
    assert_eq!(keys, vec!["id", "tags", "version"]);
    assert_eq!(body["version"], 1);

    assert_eq!(person.version(), Some(2));
    let stored = server.object("Person", id).unwrap();
    assert_eq!(stored["name"], "Ada");
    assert_eq!(stored["tags"], json!(["math", "logic"]));
}

#[tokio::test]
async fn all_attribute_kinds_survive_the_server() {
    let (_server, factory) = memory_factory(orestes_core::Config::default()).await.unwrap();
    let em = factory.create_entity_manager();

    let friend = em.create("Person").unwrap();
    friend.set("name", "Grace").unwrap();
    em.save(&friend).await.unwrap();

    let born = Utc.with_ymd_and_hms(1815, 12, 10, 8, 30, 0).unwrap();
    let person = em.create("Person").unwrap();
    person.set("name", "Ada").unwrap();
    person.set("age", 36).unwrap();
    person.set("born", born).unwrap();
    person
        .set("address", Embedded::new("Address").with("street", "St James's Square").with("city", "London"))
        .unwrap();
    let nicknames = person.get("nicknames").unwrap();
    nicknames.as_list().unwrap().add("Enchantress of Numbers").unwrap();
    person.get("friends").unwrap().as_list().unwrap().add(&friend).unwrap();
    person.get("scores").unwrap().as_map().unwrap().set("analysis", 9.5).unwrap();
    em.save(&person).await.unwrap();
    let id = person.id().unwrap();

    let other = factory.create_entity_manager();
    let loaded = other.load("Person", id).await.unwrap().unwrap();
    assert!(!loaded.ptr_eq(&person));
    assert_eq!(loaded, person);
    assert_eq!(loaded.get("name").unwrap(), Value::from("Ada"));
    assert_eq!(loaded.get("age").unwrap().as_f64(), Some(36.0));
    assert_eq!(loaded.get("born").unwrap().as_date(), Some(&born));

    let address = loaded.get("address").unwrap();
    let address = address.as_embedded().unwrap();
    assert_eq!(address.get("city"), &Value::from("London"));

    let nicknames = loaded.get("nicknames").unwrap();
    assert_eq!(
        nicknames.as_list().unwrap().get(-1),
        Some(Value::from("Enchantress of Numbers"))
    );

    let friends = loaded.get("friends").unwrap();
    let reference = friends.as_list().unwrap().get(0).unwrap();
    let reference = reference.as_entity().unwrap();
    assert_eq!(reference.id(), friend.id());
    assert!(!reference.is_loaded());

    let scores = loaded.get("scores").unwrap();
    assert_eq!(
        scores.as_map().unwrap().get(&Value::from("analysis")),
        Some(Value::from(9.5))
    );
    assert!(!loaded.is_dirty());
}

#[tokio::test]
async fn subtype_round_trip() {
    let (server, em) = memory_session().await.unwrap();
    let employee = em.create("Employee").unwrap();
    employee.set("name", "Ada").unwrap();
    employee.set("company", "Analytical Engines").unwrap();
    em.save(&employee).await.unwrap();

    let stored = server.object("Employee", employee.id().unwrap()).unwrap();
    assert_eq!(stored["company"], "Analytical Engines");
    assert_eq!(stored["name"], "Ada");
    assert_eq!(stored["tags"], json!([]));
}

#[tokio::test]
async fn delete_removes_the_object() {
    let (server, em) = memory_session().await.unwrap();
    let person = em.create("Person").unwrap();
    em.save(&person).await.unwrap();
    let id = person.id().unwrap();
    assert_eq!(server.object_count(), 1);

    em.delete(&person).await.unwrap();
    assert_eq!(server.object_count(), 0);
    assert!(person.lifecycle().is_removed());
    assert!(em.load("Person", id).await.unwrap().is_none());
}

#[tokio::test]
async fn references_stay_logical_under_a_custom_base_path() {
    let (server, factory) = memory_factory(Config::default().base_path("/v1/db")).await.unwrap();
    let em = factory.create_entity_manager();

    let friend = em.create("Person").unwrap();
    em.save(&friend).await.unwrap();
    let person = em.create("Person").unwrap();
    person.get("friends").unwrap().as_list().unwrap().add(&friend).unwrap();
    em.save(&person).await.unwrap();

    let insert = server.requests().pop().unwrap();
    assert_eq!(insert.path, "/v1/db/Person");
    let friend_id = friend.id().unwrap();
    let stored = server.object("Person", person.id().unwrap()).unwrap();
    assert_eq!(stored["friends"], json!([format!("/db/Person/{friend_id}")]));

    let fresh = factory.create_entity_manager();
    let loaded = fresh.load("Person", person.id().unwrap()).await.unwrap().unwrap();
    let friends = loaded.get("friends").unwrap();
    let reference = friends.as_list().unwrap().get(0).unwrap();
    assert_eq!(reference.as_entity().unwrap().id(), Some(friend_id));
}
