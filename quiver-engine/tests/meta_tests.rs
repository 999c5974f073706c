//! LocalMeta behaviour: catalog lookups, state transitions, reclamation.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use quiver_core::{
    ArchiveOptions, EngineType, Error, FileType, MetricType, TableIndex, TableSchema,
    DEFAULT_NLIST,
};
use quiver_engine::{LocalMeta, MetaStore};

fn schema(table_id: &str, engine_type: EngineType) -> TableSchema {
    TableSchema {
        table_id: table_id.to_string(),
        dimension: 4,
        index_file_size: 1024 * 1024,
        engine_type,
        metric_type: MetricType::L2,
        nlist: 16,
        flag: 0,
        created_on: 0,
    }
}

async fn meta_with(archive: ArchiveOptions) -> (Arc<LocalMeta>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let meta = Arc::new(LocalMeta::new(dir.path(), archive).await.unwrap());
    (meta, dir)
}

async fn fresh_meta() -> (Arc<LocalMeta>, tempfile::TempDir) {
    meta_with(ArchiveOptions::default()).await
}

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

#[tokio::test]
async fn table_lifecycle() {
    let (meta, _dir) = fresh_meta().await;

    meta.create_table(schema("t", EngineType::Idmap)).await.unwrap();
    assert!(meta.has_table("t").await.unwrap());
    assert_eq!(meta.all_tables().await.unwrap().len(), 1);

    let err = meta.create_table(schema("t", EngineType::Idmap)).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyExists { .. }));

    meta.delete_table("t").await.unwrap();
    assert!(!meta.has_table("t").await.unwrap());
    assert!(matches!(meta.describe_table("t").await.unwrap_err(), Error::NotFound { .. }));

    // Soft-deleted ids stay reserved until the sweep reclaims them
    let err = meta.create_table(schema("t", EngineType::Idmap)).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyExists { .. }));
}

#[tokio::test]
async fn created_file_inherits_schema() {
    let (meta, dir) = fresh_meta().await;
    meta.create_table(schema("t", EngineType::IvfFlat)).await.unwrap();

    let file = meta.create_table_file("t", None, FileType::New).await.unwrap();
    assert_eq!(file.dimension, 4);
    assert_eq!(file.engine_type, EngineType::IvfFlat);
    assert_eq!(file.metric_type, MetricType::L2);
    assert_eq!(file.nlist, 16);
    assert_eq!(file.index_file_size, 1024 * 1024);
    assert!(file.location.starts_with(dir.path().to_str().unwrap()));

    let err = meta.create_table_file("missing", None, FileType::New).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn batch_update_is_atomic_to_observers() {
    let (meta, _dir) = fresh_meta().await;
    meta.create_table(schema("t", EngineType::Idmap)).await.unwrap();

    let mut a = meta.create_table_file("t", None, FileType::Raw).await.unwrap();
    let mut b = meta.create_table_file("t", None, FileType::Raw).await.unwrap();
    let mut merged = meta.create_table_file("t", None, FileType::NewMerge).await.unwrap();

    a.file_type = FileType::ToDelete;
    b.file_type = FileType::ToDelete;
    merged.file_type = FileType::Raw;
    merged.row_count = 42;
    meta.update_table_files(&[a, b, merged]).await.unwrap();

    let files = meta.table_files("t").await.unwrap();
    let raw: Vec<_> = files.iter().filter(|f| f.file_type == FileType::Raw).collect();
    let dead: Vec<_> = files.iter().filter(|f| f.file_type == FileType::ToDelete).collect();
    assert_eq!(raw.len(), 1);
    assert_eq!(raw[0].row_count, 42);
    assert_eq!(dead.len(), 2);
}

#[tokio::test]
async fn update_on_deleted_table_forces_to_delete() {
    let (meta, _dir) = fresh_meta().await;
    meta.create_table(schema("t", EngineType::Idmap)).await.unwrap();
    let mut file = meta.create_table_file("t", None, FileType::New).await.unwrap();

    meta.delete_table("t").await.unwrap();

    // A flush finishing after the drop must not resurrect the file
    file.file_type = FileType::Raw;
    meta.update_table_file(&file).await.unwrap();

    let files = meta.table_files("t").await.unwrap();
    assert_eq!(files[0].file_type, FileType::ToDelete);
}

#[tokio::test]
async fn files_to_merge_filters_small_raw_files() {
    let (meta, _dir) = fresh_meta().await;
    meta.create_table(schema("t", EngineType::Idmap)).await.unwrap();

    let mut small = meta.create_table_file("t", None, FileType::Raw).await.unwrap();
    small.file_size = 100;
    let mut smaller = meta.create_table_file("t", None, FileType::Raw).await.unwrap();
    smaller.file_size = 10;
    let mut big = meta.create_table_file("t", None, FileType::Raw).await.unwrap();
    big.file_size = 2 * 1024 * 1024; // over the index threshold
    let pending = meta.create_table_file("t", None, FileType::New).await.unwrap();
    meta.update_table_files(&[small.clone(), smaller.clone(), big, pending]).await.unwrap();

    let groups = meta.files_to_merge("t").await.unwrap();
    assert_eq!(groups.len(), 1);
    let group = groups.values().next().unwrap();
    let ids: Vec<u64> = group.iter().map(|f| f.file_id).collect();
    // Biggest first, threshold-sized and pending files excluded
    assert_eq!(ids, vec![small.file_id, smaller.file_id]);
}

#[tokio::test]
async fn files_to_search_filters_by_date_and_id() {
    let (meta, _dir) = fresh_meta().await;
    meta.create_table(schema("t", EngineType::Idmap)).await.unwrap();

    let d1 = date("2026-07-01");
    let d2 = date("2026-07-02");
    let f1 = meta.create_table_file("t", Some(d1), FileType::Raw).await.unwrap();
    let f2 = meta.create_table_file("t", Some(d2), FileType::Raw).await.unwrap();
    meta.create_table_file("t", Some(d2), FileType::ToDelete).await.unwrap();

    let all = meta.files_to_search("t", &[], &[]).await.unwrap();
    assert_eq!(all.len(), 2);

    let only_d2 = meta.files_to_search("t", &[], &[d2]).await.unwrap();
    assert_eq!(only_d2.len(), 1);
    assert_eq!(only_d2[&d2].len(), 1);
    assert_eq!(only_d2[&d2][0].file_id, f2.file_id);

    let only_f1 = meta.files_to_search("t", &[f1.file_id], &[]).await.unwrap();
    assert_eq!(only_f1[&d1][0].file_id, f1.file_id);
    assert_eq!(only_f1.len(), 1);
}

#[tokio::test]
async fn drop_index_restores_raw_data() {
    let (meta, _dir) = fresh_meta().await;
    meta.create_table(schema("t", EngineType::IvfFlat)).await.unwrap();

    let mut index_file = meta.create_table_file("t", None, FileType::New).await.unwrap();
    index_file.file_type = FileType::Index;
    let mut backup_file = meta.create_table_file("t", None, FileType::New).await.unwrap();
    backup_file.file_type = FileType::Backup;
    let mut queued = meta.create_table_file("t", None, FileType::New).await.unwrap();
    queued.file_type = FileType::ToIndex;
    meta.update_table_files(&[index_file.clone(), backup_file.clone(), queued.clone()])
        .await
        .unwrap();

    meta.drop_table_index("t").await.unwrap();

    let files = meta.table_files("t").await.unwrap();
    let state_of = |id: u64| files.iter().find(|f| f.file_id == id).unwrap().file_type;
    assert_eq!(state_of(index_file.file_id), FileType::ToDelete);
    assert_eq!(state_of(backup_file.file_id), FileType::Raw);
    assert_eq!(state_of(queued.file_id), FileType::Raw);

    let index = meta.describe_table_index("t").await.unwrap();
    assert_eq!(index.engine_type, EngineType::Idmap);
    assert_eq!(index.nlist, DEFAULT_NLIST);
}

#[tokio::test]
async fn update_table_index_rewrites_live_files() {
    let (meta, _dir) = fresh_meta().await;
    meta.create_table(schema("t", EngineType::IvfFlat)).await.unwrap();
    let raw = meta.create_table_file("t", None, FileType::Raw).await.unwrap();
    assert_eq!(raw.engine_type, EngineType::IvfFlat);

    let index = TableIndex {
        engine_type: EngineType::IvfSq8,
        nlist: 64,
        metric_type: MetricType::L2,
    };
    meta.update_table_index("t", &index).await.unwrap();

    let files = meta.table_files("t").await.unwrap();
    assert_eq!(files[0].engine_type, EngineType::IvfSq8);
    assert_eq!(files[0].nlist, 64);
    assert_eq!(meta.describe_table_index("t").await.unwrap().engine_type, EngineType::IvfSq8);
}

#[tokio::test]
async fn ttl_sweep_removes_expired_files_and_empty_tables() {
    let (meta, _dir) = fresh_meta().await;
    meta.create_table(schema("t", EngineType::Idmap)).await.unwrap();

    let mut file = meta.create_table_file("t", None, FileType::Raw).await.unwrap();
    std::fs::write(&file.location, b"segment bytes").unwrap();
    file.file_type = FileType::ToDelete;
    meta.update_table_file(&file).await.unwrap();
    meta.delete_table("t").await.unwrap();

    // Too young for a long TTL
    meta.cleanup_files_with_ttl(Duration::from_secs(3600)).await.unwrap();
    assert_eq!(meta.table_files("t").await.unwrap().len(), 1);
    assert!(std::path::Path::new(&file.location).exists());

    // TTL zero reclaims immediately, table record goes with its last file
    meta.cleanup_files_with_ttl(Duration::ZERO).await.unwrap();
    assert!(meta.table_files("t").await.unwrap().is_empty());
    assert!(!std::path::Path::new(&file.location).exists());

    // The id is free again
    meta.create_table(schema("t", EngineType::Idmap)).await.unwrap();
}

#[tokio::test]
async fn cleanup_removes_in_progress_files() {
    let (meta, _dir) = fresh_meta().await;
    meta.create_table(schema("t", EngineType::Idmap)).await.unwrap();

    let pending = meta.create_table_file("t", None, FileType::NewMerge).await.unwrap();
    std::fs::write(&pending.location, b"half written").unwrap();
    let keep = meta.create_table_file("t", None, FileType::Raw).await.unwrap();

    meta.cleanup().await.unwrap();

    let files = meta.table_files("t").await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].file_id, keep.file_id);
    assert!(!std::path::Path::new(&pending.location).exists());
}

#[tokio::test]
async fn archive_by_age_marks_old_partitions() {
    let (meta, _dir) = meta_with(ArchiveOptions { days: Some(30), disk_capacity: None }).await;
    meta.create_table(schema("t", EngineType::Idmap)).await.unwrap();

    let old = meta.create_table_file("t", Some(date("2020-01-01")), FileType::Raw).await.unwrap();
    let fresh = meta.create_table_file("t", None, FileType::Raw).await.unwrap();

    meta.archive().await.unwrap();

    let files = meta.table_files("t").await.unwrap();
    let state_of = |id: u64| files.iter().find(|f| f.file_id == id).unwrap().file_type;
    assert_eq!(state_of(old.file_id), FileType::ToDelete);
    assert_eq!(state_of(fresh.file_id), FileType::Raw);
}

#[tokio::test]
async fn archive_by_disk_capacity_drops_oldest_first() {
    let (meta, _dir) = meta_with(ArchiveOptions { days: None, disk_capacity: Some(150) }).await;
    meta.create_table(schema("t", EngineType::Idmap)).await.unwrap();

    let mut first = meta.create_table_file("t", None, FileType::Raw).await.unwrap();
    first.file_size = 100;
    meta.update_table_file(&first).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let mut second = meta.create_table_file("t", None, FileType::Raw).await.unwrap();
    second.file_size = 100;
    meta.update_table_file(&second).await.unwrap();

    meta.archive().await.unwrap();

    let files = meta.table_files("t").await.unwrap();
    let state_of = |id: u64| files.iter().find(|f| f.file_id == id).unwrap().file_type;
    assert_eq!(state_of(first.file_id), FileType::ToDelete);
    assert_eq!(state_of(second.file_id), FileType::Raw);
}

#[tokio::test]
async fn size_and_count_track_live_files() {
    let (meta, _dir) = fresh_meta().await;
    meta.create_table(schema("t", EngineType::Idmap)).await.unwrap();

    let mut a = meta.create_table_file("t", None, FileType::Raw).await.unwrap();
    a.file_size = 100;
    a.row_count = 10;
    let mut b = meta.create_table_file("t", None, FileType::Raw).await.unwrap();
    b.file_size = 50;
    b.row_count = 5;
    b.file_type = FileType::ToDelete;
    meta.update_table_files(&[a, b]).await.unwrap();

    assert_eq!(meta.size().await.unwrap(), 100);
    assert_eq!(meta.count("t").await.unwrap(), 10);
}

#[tokio::test]
async fn drop_partitions_by_dates_spares_other_dates() {
    let (meta, _dir) = fresh_meta().await;
    meta.create_table(schema("t", EngineType::Idmap)).await.unwrap();

    let d1 = date("2026-07-01");
    let d2 = date("2026-07-02");
    meta.create_table_file("t", Some(d1), FileType::Raw).await.unwrap();
    meta.create_table_file("t", Some(d2), FileType::Raw).await.unwrap();

    meta.drop_partitions_by_dates("t", &[d1]).await.unwrap();

    let remaining = meta.files_to_search("t", &[], &[]).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert!(remaining.contains_key(&d2));
}
