use rest_scaffold::{
    FindConditions, ProviderError, QueryError, QueryParams, QueryParser, QueryProfile, Resource,
    ResourceProvider,
};
use sea_orm::{
    DatabaseBackend, DatabaseConnection, EntityTrait, MockDatabase, MockExecResult, Transaction,
};
use serde_json::json;
use std::sync::Arc;

mod common;
use common::{drive_entity, setup_test_db, tag_entity};

fn drive(name: &str, capacity: i32) -> drive_entity::Model {
    drive_entity::Model {
        id: 0,
        name: name.to_string(),
        capacity,
        locked: false,
    }
}

fn tag(drive_id: i32, label: &str) -> tag_entity::Model {
    tag_entity::Model {
        id: 0,
        drive_id,
        label: label.to_string(),
        deleted_at: None,
    }
}

fn conditions(pairs: &[(&str, &str)]) -> FindConditions {
    let params: QueryParams = pairs
        .iter()
        .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
        .collect();
    QueryParser::new(QueryProfile::SimpleRest)
        .parse(&params)
        .expect("valid query")
}

async fn seeded() -> (Arc<DatabaseConnection>, i32, i32) {
    let db = setup_test_db().await.expect("Failed to setup test database");
    let drives = ResourceProvider::<drive_entity::Entity>::new(Arc::clone(&db));
    let tags = ResourceProvider::<tag_entity::Entity>::new(Arc::clone(&db));

    let ssd = drives.insert(drive("ssd", 512)).await.unwrap();
    let hdd = drives.insert(drive("hdd", 4000)).await.unwrap();
    tags.insert(tag(ssd.id, "fast")).await.unwrap();
    tags.insert(tag(ssd.id, "boot")).await.unwrap();
    tags.insert(tag(hdd.id, "backup")).await.unwrap();

    (db, ssd.id, hdd.id)
}

// ============================================================================
// Reads
// ============================================================================

#[tokio::test]
async fn test_find_one_missing_row() {
    let db = setup_test_db().await.unwrap();
    let drives = ResourceProvider::<drive_entity::Entity>::new(db);

    let err = drives.find_one(42).await.unwrap_err();
    assert!(matches!(err, ProviderError::NotFound { id: 42, .. }), "{err:?}");
}

#[tokio::test]
async fn test_insert_then_find_one() {
    let db = setup_test_db().await.unwrap();
    let drives = ResourceProvider::<drive_entity::Entity>::new(db);

    let created = drives.insert(drive("nvme", 1024)).await.unwrap();
    assert!(created.id > 0);

    let record = drives.find_one(i64::from(created.id)).await.unwrap();
    assert_eq!(record.model.name, "nvme");
    assert_eq!(record.model.capacity, 1024);
    // Nothing is preloaded for plain drives
    assert!(record.embedded.is_empty());
}

#[tokio::test]
async fn test_find_filters_orders_and_paginates() {
    let (db, _, _) = seeded().await;
    let drives = ResourceProvider::<drive_entity::Entity>::new(db);
    drives.insert(drive("usb", 64)).await.unwrap();

    let big = drives
        .find(&conditions(&[("filter", r#"{"capacity_gte":500}"#)]))
        .await
        .unwrap();
    let names: Vec<&str> = big.iter().map(|r| r.model.name.as_str()).collect();
    assert_eq!(names, vec!["ssd", "hdd"]);

    let sorted = drives
        .find(&conditions(&[("sort", r#"["capacity","DESC"]"#), ("range", "[0,1]")]))
        .await
        .unwrap();
    let names: Vec<&str> = sorted.iter().map(|r| r.model.name.as_str()).collect();
    assert_eq!(names, vec!["hdd", "ssd"]);

    let none = drives
        .find(&conditions(&[("filter", r#"{"name":"floppy"}"#)]))
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_unknown_filter_column_is_ignored() {
    let (db, _, _) = seeded().await;
    let drives = ResourceProvider::<drive_entity::Entity>::new(db);

    let all = drives
        .find(&conditions(&[("filter", r#"{"colour":"red"}"#)]))
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn test_like_matches_case_insensitively_and_literally() {
    let db = setup_test_db().await.unwrap();
    let drives = ResourceProvider::<drive_entity::Entity>::new(db);
    drives.insert(drive("Samsung SSD", 1000)).await.unwrap();
    drives.insert(drive("100% cache", 8)).await.unwrap();
    drives.insert(drive("1000 cache", 8)).await.unwrap();

    let found = drives
        .find(&conditions(&[("filter", r#"{"name_like":"ssd"}"#)]))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].model.name, "Samsung SSD");

    let literal = drives
        .find(&conditions(&[("filter", r#"{"name_like":"100%"}"#)]))
        .await
        .unwrap();
    assert_eq!(literal.len(), 1);
    assert_eq!(literal[0].model.name, "100% cache");
}

#[tokio::test]
async fn test_invalid_operand_is_rejected() {
    let (db, _, _) = seeded().await;
    let drives = ResourceProvider::<drive_entity::Entity>::new(db);

    let err = drives
        .find(&conditions(&[("filter", r#"{"capacity_gt":"lots"}"#)]))
        .await
        .unwrap_err();
    assert!(
        matches!(err, ProviderError::Query(QueryError::InvalidOperand { .. })),
        "{err:?}"
    );
}

#[tokio::test]
async fn test_count_uses_filters_only() {
    let (db, _, _) = seeded().await;
    let drives = ResourceProvider::<drive_entity::Entity>::new(db);

    let cond = conditions(&[("filter", r#"{"capacity_lt":1000}"#), ("range", "[5,9]")]);
    assert_eq!(drives.count(&cond.filters).await.unwrap(), 1);
    assert!(drives.find(&cond).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_find_assoc_scopes_to_parent() {
    let (db, ssd, hdd) = seeded().await;
    let tags = ResourceProvider::<tag_entity::Entity>::new(db);

    let parent = drive_entity::Entity::new_with_id(i64::from(ssd));
    let found = tags
        .find_assoc::<drive_entity::Entity>(&parent, "tags", &FindConditions::default())
        .await
        .unwrap();
    let labels: Vec<&str> = found.iter().map(|r| r.model.label.as_str()).collect();
    assert_eq!(labels, vec!["fast", "boot"]);

    let filtered = conditions(&[("filter", r#"{"label":"boot"}"#)]);
    assert_eq!(
        tags.count_assoc::<drive_entity::Entity>(&parent, "tags", &filtered.filters)
            .await
            .unwrap(),
        1
    );

    let other = drive_entity::Entity::new_with_id(i64::from(hdd));
    assert_eq!(
        tags.count_assoc::<drive_entity::Entity>(&other, "tags", &FindConditions::default().filters)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_embed_loads_children() {
    let (db, ssd, _) = seeded().await;
    let drives = ResourceProvider::<drive_entity::Entity>::new(db);

    let records = drives
        .find(&conditions(&[("embed", r#"["tags"]"#), ("sort", r#"["id","ASC"]"#)]))
        .await
        .unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].model.id, ssd);
    assert_eq!(records[0].embedded["tags"].len(), 2);
    assert_eq!(records[1].embedded["tags"].len(), 1);
    assert_eq!(records[0].embedded["tags"][0]["label"], "fast");
}

#[tokio::test]
async fn test_unknown_embed_is_rejected() {
    let (db, _, _) = seeded().await;
    let drives = ResourceProvider::<drive_entity::Entity>::new(db);

    let err = drives
        .find(&conditions(&[("embed", r#"["partitions"]"#)]))
        .await
        .unwrap_err();
    assert!(
        matches!(&err, ProviderError::UnknownRelation { relation, .. } if relation == "partitions"),
        "{err:?}"
    );
}

#[tokio::test]
async fn test_preloads_on_find_one() {
    let (db, ssd, _) = seeded().await;
    let drives = ResourceProvider::<drive_entity::PreloadedDrives>::new(db);

    // The undeclared "snapshots" preload is dropped at registration
    assert_eq!(drives.capabilities().preloads(), &["tags"]);

    let record = drives.find_one(i64::from(ssd)).await.unwrap();
    assert_eq!(record.embedded.len(), 1);
    assert_eq!(record.embedded["tags"].len(), 2);

    let serialized = serde_json::to_value(&record).unwrap();
    assert_eq!(serialized["name"], "ssd");
    assert_eq!(serialized["tags"][1]["label"], "boot");
}

// ============================================================================
// Writes
// ============================================================================

#[tokio::test]
async fn test_insert_batch_splits_statements() {
    let db = setup_test_db().await.unwrap();
    let drives = ResourceProvider::<drive_entity::Entity>::new(db);

    let models: Vec<_> = (0..5).map(|i| drive(&format!("disk{i}"), i * 10)).collect();
    assert_eq!(drives.insert_batch(models, 2).await.unwrap(), 5);
    assert_eq!(drives.insert_many(Vec::new()).await.unwrap(), 0);
    assert_eq!(drives.count(&FindConditions::default().filters).await.unwrap(), 5);
}

#[tokio::test]
async fn test_update_replaces_row() {
    let (db, ssd, _) = seeded().await;
    let drives = ResourceProvider::<drive_entity::Entity>::new(db);

    let mut replacement = drive("ssd-2", 1024);
    replacement.locked = true;
    assert_eq!(drives.update(i64::from(ssd), &replacement).await.unwrap(), 1);
    assert_eq!(drives.update(999, &replacement).await.unwrap(), 0);

    let record = drives.find_one(i64::from(ssd)).await.unwrap();
    assert_eq!(record.model.id, ssd);
    assert_eq!(record.model.name, "ssd-2");
    assert!(record.model.locked);
}

#[tokio::test]
async fn test_update_fields() {
    let (db, ssd, _) = seeded().await;
    let drives = ResourceProvider::<drive_entity::Entity>::new(db);
    let id = i64::from(ssd);

    let fields = json!({"name": "renamed", "locked": true});
    let record = drives
        .update_fields(id, fields.as_object().unwrap())
        .await
        .unwrap();
    assert_eq!(record.model.name, "renamed");
    assert!(record.model.locked);
    assert_eq!(record.model.capacity, 512);

    for bad in [json!({"colour": "red"}), json!({"id": 7})] {
        let err = drives
            .update_fields(id, bad.as_object().unwrap())
            .await
            .unwrap_err();
        assert!(
            matches!(err, ProviderError::Query(QueryError::InvalidField(_))),
            "{err:?}"
        );
    }

    let err = drives
        .update_fields(id, json!({"capacity": "huge"}).as_object().unwrap())
        .await
        .unwrap_err();
    assert!(
        matches!(err, ProviderError::Query(QueryError::InvalidOperand { .. })),
        "{err:?}"
    );

    let err = drives
        .update_fields(999, json!({"name": "ghost"}).as_object().unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::NotFound { id: 999, .. }), "{err:?}");
}

#[tokio::test]
async fn test_full_update_leaves_deletion_stamp_alone() {
    let (db, ssd, _) = seeded().await;
    let tags = ResourceProvider::<tag_entity::Entity>::new(db);
    let created = tags.insert(tag(ssd, "spare")).await.unwrap();

    let mut replacement = tag(ssd, "renamed");
    replacement.deleted_at = Some("2024-01-01 00:00:00".to_string());
    assert_eq!(
        tags.update(i64::from(created.id), &replacement).await.unwrap(),
        1
    );

    let record = tags.find_one(i64::from(created.id)).await.unwrap();
    assert_eq!(record.model.label, "renamed");
    assert!(record.model.deleted_at.is_none());
}

#[tokio::test]
async fn test_soft_delete_hides_row() {
    let (db, ssd, _) = seeded().await;
    let tags = ResourceProvider::<tag_entity::Entity>::new(Arc::clone(&db));
    let parent = drive_entity::Entity::new_with_id(i64::from(ssd));
    let before = tags
        .find_assoc::<drive_entity::Entity>(&parent, "tags", &FindConditions::default())
        .await
        .unwrap();
    let victim = before[0].model.id;

    assert_eq!(tags.delete(i64::from(victim)).await.unwrap(), 1);

    let err = tags.find_one(i64::from(victim)).await.unwrap_err();
    assert!(matches!(err, ProviderError::NotFound { .. }), "{err:?}");
    assert_eq!(
        tags.count_assoc::<drive_entity::Entity>(&parent, "tags", &FindConditions::default().filters)
            .await
            .unwrap(),
        1
    );

    // The row is still there, stamped
    let raw = tag_entity::Entity::find_by_id(victim)
        .one(db.as_ref())
        .await
        .unwrap()
        .expect("soft-deleted row kept");
    assert!(raw.deleted_at.is_some());

    // And it is hidden from embeds too
    let drives = ResourceProvider::<drive_entity::PreloadedDrives>::new(db);
    let record = drives.find_one(i64::from(ssd)).await.unwrap();
    assert_eq!(record.embedded["tags"].len(), 1);

    let err = tags.delete(i64::from(victim)).await.unwrap_err();
    assert!(matches!(err, ProviderError::NotFound { .. }), "{err:?}");
}

#[tokio::test]
async fn test_locked_drive_is_not_deletable() {
    let (db, ssd, _) = seeded().await;
    let drives = ResourceProvider::<drive_entity::Entity>::new(db);
    let id = i64::from(ssd);
    drives
        .update_fields(id, json!({"locked": true}).as_object().unwrap())
        .await
        .unwrap();

    let err = drives.delete(id).await.unwrap_err();
    assert!(matches!(err, ProviderError::NotDeletable { .. }), "{err:?}");
    assert!(drives.find_one(id).await.is_ok());
}

#[tokio::test]
async fn test_delete_many() {
    let (db, ssd, hdd) = seeded().await;
    let drives = ResourceProvider::<drive_entity::Entity>::new(db);
    let usb = drives.insert(drive("usb", 64)).await.unwrap();
    drives
        .update_fields(i64::from(hdd), json!({"locked": true}).as_object().unwrap())
        .await
        .unwrap();

    assert_eq!(drives.delete_many(&[]).await.unwrap(), 0);

    let err = drives
        .delete_many(&[i64::from(ssd), i64::from(hdd)])
        .await
        .unwrap_err();
    assert!(
        matches!(err, ProviderError::NotDeletable { id, .. } if id == i64::from(hdd)),
        "{err:?}"
    );
    assert_eq!(drives.count(&FindConditions::default().filters).await.unwrap(), 3);

    // Ids that match nothing don't count
    let removed = drives
        .delete_many(&[i64::from(ssd), i64::from(usb.id), 999])
        .await
        .unwrap();
    assert_eq!(removed, 2);
    assert_eq!(drives.count(&FindConditions::default().filters).await.unwrap(), 1);
}

// ============================================================================
// Statement-level checks against a mock connection
// ============================================================================

/// Takes the log back once every provider sharing the mock is gone.
fn transaction_log(db: Arc<DatabaseConnection>) -> Vec<Transaction> {
    Arc::try_unwrap(db)
        .ok()
        .expect("providers still hold the connection")
        .into_transaction_log()
}

fn locked_drive() -> drive_entity::Model {
    drive_entity::Model {
        id: 1,
        name: "vault".to_string(),
        capacity: 100,
        locked: true,
    }
}

#[tokio::test]
async fn test_vetoed_delete_issues_no_statement() {
    let db = MockDatabase::new(DatabaseBackend::Sqlite)
        .append_query_results([vec![locked_drive()]])
        .into_connection();
    let db = Arc::new(db);
    let drives = ResourceProvider::<drive_entity::Entity>::new(Arc::clone(&db));

    let err = drives.delete(1).await.unwrap_err();
    assert!(matches!(err, ProviderError::NotDeletable { id: 1, .. }), "{err:?}");

    drop(drives);
    let log = transaction_log(db);
    assert_eq!(log.len(), 1);
    assert!(!format!("{log:?}").contains("DELETE"));
}

#[tokio::test]
async fn test_permanent_resource_never_deletes() {
    let mut unlocked = locked_drive();
    unlocked.locked = false;
    let db = MockDatabase::new(DatabaseBackend::Sqlite)
        .append_query_results([vec![unlocked]])
        .into_connection();
    let db = Arc::new(db);
    let drives = ResourceProvider::<drive_entity::ArchivedDrives>::new(Arc::clone(&db));

    let err = drives.delete(1).await.unwrap_err();
    assert!(matches!(err, ProviderError::NotDeletable { .. }), "{err:?}");
    let err = drives.delete_many(&[1, 2]).await.unwrap_err();
    assert!(matches!(err, ProviderError::NotDeletable { .. }), "{err:?}");

    drop(drives);
    let log = transaction_log(db);
    assert_eq!(log.len(), 1);
    assert!(!format!("{log:?}").contains("DELETE"));
}

#[tokio::test]
async fn test_hard_delete_statement() {
    let mut unlocked = locked_drive();
    unlocked.locked = false;
    let db = MockDatabase::new(DatabaseBackend::Sqlite)
        .append_query_results([vec![unlocked]])
        .append_exec_results([MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }])
        .into_connection();
    let db = Arc::new(db);
    let drives = ResourceProvider::<drive_entity::Entity>::new(Arc::clone(&db));

    assert_eq!(drives.delete(1).await.unwrap(), 1);

    drop(drives);
    let log = format!("{:?}", transaction_log(db));
    assert!(log.contains("DELETE FROM"), "{log}");
}

#[tokio::test]
async fn test_soft_delete_statement() {
    let db = MockDatabase::new(DatabaseBackend::Sqlite)
        .append_query_results([vec![tag_entity::Model {
            id: 3,
            drive_id: 1,
            label: "old".to_string(),
            deleted_at: None,
        }]])
        .append_exec_results([MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }])
        .into_connection();
    let db = Arc::new(db);
    let tags = ResourceProvider::<tag_entity::Entity>::new(Arc::clone(&db));

    assert_eq!(tags.delete(3).await.unwrap(), 1);

    drop(tags);
    let log = format!("{:?}", transaction_log(db));
    assert!(log.contains("UPDATE"), "{log}");
    assert!(log.contains("CURRENT_TIMESTAMP"), "{log}");
    assert!(log.contains("IS NULL"), "{log}");
    assert!(!log.contains("DELETE"), "{log}");
}

#[tokio::test]
async fn test_regex_filter_binds_numbered_placeholder_on_postgres() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![drive("ssd", 512)]])
        .into_connection();
    let db = Arc::new(db);
    let drives = ResourceProvider::<drive_entity::Entity>::new(Arc::clone(&db));

    let found = drives
        .find(&conditions(&[("filter", r#"{"name_regex":"^s"}"#)]))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);

    drop(drives);
    let log = format!("{:?}", transaction_log(db));
    assert!(log.contains("~* $1"), "{log}");
    assert!(!log.contains("~* ?"), "{log}");
    assert!(log.contains("^s"), "{log}");
}
