use chrono::{TimeZone, Utc};
use course_catalog_sync::store::latest_version;
use course_catalog_sync::{MappingRecord, MappingStore, ObjectKind, SqliteMappingStore, StoreError};

fn record(local_id: i64, kind: ObjectKind, remote_id: i64) -> MappingRecord {
    MappingRecord {
        local_id,
        local_kind: kind,
        remote_id,
        remote_global_id: format!("g-{remote_id}"),
        display_name: format!("object {local_id}"),
        content_hash: None,
        last_synced_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
    }
}

#[test]
fn upsert_is_idempotent() {
    let store = SqliteMappingStore::open_in_memory().unwrap();
    let mapping = record(77, ObjectKind::Module, 500);

    store.upsert(&mapping).unwrap();
    store.upsert(&mapping).unwrap();

    assert_eq!(store.find(77, ObjectKind::Module).unwrap(), Some(mapping));
    assert_eq!(store.list(None).unwrap().len(), 1);
}

#[test]
fn same_local_id_is_tracked_per_kind() {
    let store = SqliteMappingStore::open_in_memory().unwrap();

    store.upsert(&record(3, ObjectKind::Course, 10)).unwrap();
    store.upsert(&record(3, ObjectKind::Grouping, 10)).unwrap();

    assert_eq!(store.find(3, ObjectKind::Course).unwrap().unwrap().remote_id, 10);
    assert_eq!(store.find(3, ObjectKind::Grouping).unwrap().unwrap().remote_id, 10);
    assert_eq!(store.list(Some(ObjectKind::Grouping)).unwrap().len(), 1);
}

#[test]
fn upsert_overwrites_remote_identity() {
    let store = SqliteMappingStore::open_in_memory().unwrap();

    store.upsert(&record(77, ObjectKind::Module, 500)).unwrap();
    store.upsert(&record(77, ObjectKind::Module, 501)).unwrap();

    let found = store.find(77, ObjectKind::Module).unwrap().unwrap();
    assert_eq!(found.remote_id, 501);
    assert_eq!(found.remote_global_id, "g-501");
}

#[test]
fn newest_claim_on_a_remote_id_wins() {
    let store = SqliteMappingStore::open_in_memory().unwrap();

    store.upsert(&record(77, ObjectKind::Module, 500)).unwrap();
    store.upsert(&record(78, ObjectKind::Module, 500)).unwrap();

    assert_eq!(store.find(77, ObjectKind::Module).unwrap(), None);
    assert_eq!(store.find(78, ObjectKind::Module).unwrap().unwrap().remote_id, 500);
}

#[test]
fn remove_reports_whether_a_record_existed() {
    let store = SqliteMappingStore::open_in_memory().unwrap();
    store.upsert(&record(77, ObjectKind::Module, 500)).unwrap();

    assert!(store.remove(77, ObjectKind::Module).unwrap());
    assert!(!store.remove(77, ObjectKind::Module).unwrap());
    assert_eq!(store.find(77, ObjectKind::Module).unwrap(), None);
}

#[test]
fn list_is_ordered_and_filtered() {
    let store = SqliteMappingStore::open_in_memory().unwrap();
    store.upsert(&record(9, ObjectKind::Module, 509)).unwrap();
    store.upsert(&record(2, ObjectKind::Module, 502)).unwrap();
    store.upsert(&record(3, ObjectKind::Course, 600)).unwrap();

    let modules = store
        .list(Some(ObjectKind::Module))
        .unwrap()
        .into_iter()
        .map(|record| record.local_id)
        .collect::<Vec<_>>();

    assert_eq!(modules, vec![2, 9]);
    assert_eq!(store.list(None).unwrap().len(), 3);
}

#[test]
fn records_survive_reopening() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mappings.db");

    {
        let store = SqliteMappingStore::open(&path).unwrap();
        let mut mapping = record(77, ObjectKind::Module, 500);
        mapping.content_hash = Some("abc".to_owned());
        store.upsert(&mapping).unwrap();
    }

    let store = SqliteMappingStore::open(&path).unwrap();
    let found = store.find(77, ObjectKind::Module).unwrap().unwrap();

    assert_eq!(found.content_hash.as_deref(), Some("abc"));
    assert_eq!(found.last_synced_at, Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
}

#[test]
fn newer_schema_versions_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mappings.db");

    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.pragma_update(None, "user_version", latest_version() + 1)
            .unwrap();
    }

    let err = SqliteMappingStore::open(&path).err().unwrap();
    assert!(matches!(err, StoreError::UnsupportedSchemaVersion { .. }));
}
