use std::sync::Arc;

use serde_json::{Value, json};
use tempfile::TempDir;

use changeset::{
    persist::{ModelRegistry, PersistError, PersistenceHandle, sqlite::SqliteRegistry},
    runtime::processor::{ChangeSetProcessor, ProcessorConfig, SaveError},
};

fn entity(ty: &str, state: &str, id: Value, fields: Value) -> Value {
    let mut out = fields.as_object().cloned().unwrap_or_default();
    out.insert("id".into(), id);
    out.insert(
        "entityAspect".into(),
        json!({ "entityTypeName": format!("{ty}:#App"), "entityState": state }),
    );
    Value::Object(out)
}

#[tokio::test]
async fn sqlite_round_trips_a_change_set_across_reopen() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("docs.db");

    let registry = SqliteRegistry::open(&db_path)
        .expect("open sqlite")
        .with_model("Customer");
    let processor = ChangeSetProcessor::new(Arc::new(registry), ProcessorConfig::default());

    let created = processor
        .process_batch(&[
            entity("Customer", "Added", json!(-1), json!({ "name": "Ada", "address": { "city": "X" } })),
            entity("Customer", "Added", json!(-2), json!({ "name": "Bob" })),
        ])
        .await
        .expect("create");
    assert_eq!(created.key_mappings.len(), 2);
    let ada = created
        .key_mappings
        .iter()
        .find(|k| k.temp_value == json!(-1))
        .map(|k| k.real_value.clone())
        .expect("ada mapping");
    let bob = created
        .key_mappings
        .iter()
        .find(|k| k.temp_value == json!(-2))
        .map(|k| k.real_value.clone())
        .expect("bob mapping");
    drop(processor);

    let reopened = SqliteRegistry::open(&db_path)
        .expect("reopen")
        .with_model("Customer");
    let handle = reopened.model_for("Customer").expect("model");
    let stored = handle.find_by_id(&ada).await.expect("find").expect("doc");
    assert_eq!(stored.body.fields.get("name"), Some(&json!("Ada")));
    assert_eq!(stored.body.embedded("address").map(|e| e.docs.len()), Some(1));

    let processor = ChangeSetProcessor::new(Arc::new(reopened), ProcessorConfig::default());
    let saved = processor
        .process_batch(&[
            entity("Customer", "Modified", json!(ada), json!({ "name": "Ada L." })),
            entity("Customer", "Deleted", json!(bob), json!({})),
        ])
        .await
        .expect("update + delete");

    assert!(saved.key_mappings.is_empty());
    let updated = saved.entity(&ada).expect("updated");
    assert_eq!(updated.fields.get("name"), Some(&json!("Ada L.")));
    assert_eq!(updated.fields.get("address"), Some(&json!({ "city": "X" })));
    assert_eq!(saved.entity(&bob).and_then(|e| e.fields.get("name")), Some(&json!("Bob")));
    assert!(handle.find_by_id(&bob).await.expect("find").is_none());
}

#[tokio::test]
async fn sqlite_update_of_missing_row_rejects_batch() {
    let registry = SqliteRegistry::open_in_memory()
        .expect("open sqlite")
        .with_model("Customer");
    let processor = ChangeSetProcessor::new(Arc::new(registry), ProcessorConfig::default());

    let err = processor
        .process_batch(&[entity("Customer", "Modified", json!(999), json!({ "name": "x" }))])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SaveError::Store { source: PersistError::NotFound { ref id, .. }, .. } if id == "999"
    ));
}

#[tokio::test]
async fn sqlite_models_do_not_see_each_other() {
    let registry = SqliteRegistry::open_in_memory()
        .expect("open sqlite")
        .with_model("A")
        .with_model("B");
    let a = registry.model_for("A").expect("a");
    let b = registry.model_for("B").expect("b");

    let doc = a.create(Default::default()).await.expect("create");
    assert!(a.find_by_id(&doc.id).await.expect("find").is_some());
    assert!(b.find_by_id(&doc.id).await.expect("find").is_none());
    assert!(matches!(
        registry.model_for("C"),
        Err(PersistError::UnknownModel(_))
    ));
}
