//! End-to-end coordinator tests: insert/flush/query, merge and TTL
//! reclamation, index promotion, preload admission, drops and shutdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use rand::Rng;

use quiver_core::{
    DbOptions, EngineType, Error, FileType, MetricType, TableFile, TableIndex, TableSchema,
};
use quiver_engine::{Database, LocalMeta, MetaStore};

struct Harness {
    db: Database,
    meta: Arc<LocalMeta>,
    _dir: tempfile::TempDir,
}

async fn open_db(configure: impl FnOnce(&mut DbOptions)) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let mut options = DbOptions::with_path(dir.path());
    options.merge_trigger_number = 2;
    configure(&mut options);

    let meta = Arc::new(LocalMeta::new(&options.path, options.archive.clone()).await.unwrap());
    let db = Database::with_meta(options, meta.clone() as Arc<dyn MetaStore>)
        .await
        .unwrap();
    Harness { db, meta, _dir: dir }
}

fn table_schema(table_id: &str, dimension: u16, engine_type: EngineType, mb: u64) -> TableSchema {
    TableSchema {
        table_id: table_id.to_string(),
        dimension,
        index_file_size: mb, // megabytes at the API boundary
        engine_type,
        metric_type: MetricType::L2,
        nlist: 16,
        flag: 0,
        created_on: 0,
    }
}

async fn wait_for_rows(meta: &Arc<LocalMeta>, table_id: &str, expect: u64) {
    for _ in 0..300 {
        if meta.count(table_id).await.unwrap() == expect {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("timed out waiting for {table_id} to reach {expect} rows");
}

async fn files_in_state(meta: &Arc<LocalMeta>, table_id: &str, state: FileType) -> Vec<TableFile> {
    meta.table_files(table_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|f| f.file_type == state)
        .collect()
}

async fn wait_for_files(
    meta: &Arc<LocalMeta>,
    table_id: &str,
    state: FileType,
    expect: usize,
) -> Vec<TableFile> {
    for _ in 0..300 {
        let files = files_in_state(meta, table_id, state).await;
        if files.len() == expect {
            return files;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("timed out waiting for {expect} {state} files of {table_id}");
}

fn random_vectors(n: usize, dimension: usize) -> Vec<f32> {
    let mut rng = rand::thread_rng();
    (0..n * dimension).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
}

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn insert_then_query_same_date() {
    let h = open_db(|_| {}).await;
    h.db.create_table(table_schema("t", 4, EngineType::Idmap, 32)).await.unwrap();

    let ids = h
        .db
        .insert_vectors(
            "t",
            &[1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            None,
        )
        .await
        .unwrap();
    assert_eq!(ids.len(), 3);
    assert!(ids.windows(2).all(|w| w[0] < w[1]), "generated ids must increase");

    // Inserts are searchable only after the next serialisation tick
    wait_for_rows(&h.meta, "t", 3).await;

    let result = h.db.query("t", 1, 1, 1, &[1.0, 0.0, 0.0, 0.0]).await.unwrap();
    assert_eq!(result.ids, vec![ids[0]]);
    assert!(result.distances[0].abs() < 1e-6);

    h.db.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn merge_consumes_small_files_and_ttl_reclaims_them() {
    let h = open_db(|options| {
        options.file_ttl = Some(Duration::ZERO);
    })
    .await;
    h.db.create_table(table_schema("t", 4, EngineType::Idmap, 32)).await.unwrap();

    // Two flush rounds produce two RAW files for the same date
    h.db.insert_vectors("t", &[1.0, 0.0, 0.0, 0.0], None).await.unwrap();
    wait_for_rows(&h.meta, "t", 1).await;
    h.db.insert_vectors("t", &[0.0, 1.0, 0.0, 0.0], None).await.unwrap();
    wait_for_rows(&h.meta, "t", 2).await;

    // One compaction tick merges them; the TTL sweep then removes the
    // consumed sources physically
    let merged = wait_for_files(&h.meta, "t", FileType::Raw, 1).await;
    assert_eq!(merged[0].row_count, 2);

    for _ in 0..300 {
        let all = h.meta.table_files("t").await.unwrap();
        if all.len() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    let all = h.meta.table_files("t").await.unwrap();
    assert_eq!(all.len(), 1, "consumed sources must be reclaimed");

    // Exactly one segment left on disk; physical removal trails the
    // record removal by a moment
    let table_dir = h._dir.path().join("t");
    let mut on_disk = std::fs::read_dir(&table_dir).unwrap().count();
    for _ in 0..100 {
        if on_disk == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        on_disk = std::fs::read_dir(&table_dir).unwrap().count();
    }
    assert_eq!(on_disk, 1);

    // The merged file still answers queries
    let result = h.db.query("t", 2, 1, 1, &[1.0, 0.0, 0.0, 0.0]).await.unwrap();
    assert_eq!(result.ids.len(), 2);
    assert!(result.distances[0].abs() < 1e-6);

    h.db.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn large_file_is_promoted_to_index() {
    let h = open_db(|_| {}).await;
    h.db.create_table(table_schema("t", 128, EngineType::IvfFlat, 1)).await.unwrap();

    // 4096 * 128 * 4B = 2 MB of vectors, over the 1 MB threshold
    let vectors = random_vectors(4096, 128);
    let ids = h.db.insert_vectors("t", &vectors, None).await.unwrap();
    wait_for_rows(&h.meta, "t", 4096).await;

    let index_files = wait_for_files(&h.meta, "t", FileType::Index, 1).await;
    assert_eq!(index_files[0].engine_type, EngineType::IvfFlat);
    assert_eq!(index_files[0].row_count, 4096);
    assert!(files_in_state(&h.meta, "t", FileType::ToIndex).await.is_empty());
    assert!(files_in_state(&h.meta, "t", FileType::NewIndex).await.is_empty());

    let index = h.db.describe_index("t").await.unwrap();
    assert_eq!(index.engine_type, EngineType::IvfFlat);
    assert_eq!(index.nlist, 16);
    assert_eq!(index.metric_type, MetricType::L2);

    // The index must find an exact match for a stored vector
    let probe = &vectors[7 * 128..8 * 128];
    let result = h.db.query("t", 1, 1, 16, probe).await.unwrap();
    assert_eq!(result.ids[0], ids[7]);

    h.db.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn preload_fails_cache_full_without_overshooting() {
    let h = open_db(|options| {
        options.cache_capacity = 1024;
    })
    .await;
    h.db.create_table(table_schema("t", 8, EngineType::Idmap, 32)).await.unwrap();

    // 100 vectors * (8 floats + id) is far beyond the 1 KiB budget
    h.db.insert_vectors("t", &random_vectors(100, 8), None).await.unwrap();
    wait_for_rows(&h.meta, "t", 100).await;

    let err = h.db.preload_table("t").await.unwrap_err();
    assert!(matches!(err, Error::CacheFull));

    let cache = h.db.cache();
    assert!(cache.usage() <= cache.capacity());
    assert_eq!(cache.usage(), 0, "nothing may be loaded past the budget");

    h.db.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn preload_within_budget_warms_cache() {
    let h = open_db(|_| {}).await;
    h.db.create_table(table_schema("t", 8, EngineType::Idmap, 32)).await.unwrap();

    h.db.insert_vectors("t", &random_vectors(100, 8), None).await.unwrap();
    wait_for_rows(&h.meta, "t", 100).await;

    h.db.preload_table("t").await.unwrap();
    let cache = h.db.cache();
    assert!(cache.usage() > 0);
    assert!(cache.usage() <= cache.capacity());

    h.db.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn delete_table_with_dates_drops_only_those_partitions() {
    let h = open_db(|_| {}).await;
    h.db.create_table(table_schema("t", 4, EngineType::Idmap, 32)).await.unwrap();

    let d1 = date("2026-07-01");
    let d2 = date("2026-07-02");
    let d3 = date("2026-07-03");
    for d in [d1, d2, d3] {
        h.meta.create_table_file("t", Some(d), FileType::Raw).await.unwrap();
    }

    h.db.delete_table("t", &[d2]).await.unwrap();

    let remaining = h.meta.files_to_search("t", &[], &[d1, d2, d3]).await.unwrap();
    let dates: Vec<NaiveDate> = remaining.keys().copied().collect();
    assert_eq!(dates, vec![d1, d3]);
    assert!(h.db.has_table("t").await.unwrap(), "table itself survives a partition drop");

    h.db.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn delete_table_releases_everything() {
    let h = open_db(|_| {}).await;
    h.db.create_table(table_schema("t", 4, EngineType::Idmap, 32)).await.unwrap();
    h.db.insert_vectors("t", &[1.0, 0.0, 0.0, 0.0], None).await.unwrap();
    wait_for_rows(&h.meta, "t", 1).await;

    h.db.delete_table("t", &[]).await.unwrap();

    assert!(!h.db.has_table("t").await.unwrap());
    for file in h.meta.table_files("t").await.unwrap() {
        assert_eq!(file.file_type, FileType::ToDelete);
    }
    let err = h.db.insert_vectors("t", &[1.0, 0.0, 0.0, 0.0], None).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));

    h.db.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn create_index_rebuilds_under_new_engine() {
    let h = open_db(|_| {}).await;
    h.db.create_table(table_schema("t", 128, EngineType::IvfFlat, 1)).await.unwrap();

    h.db.insert_vectors("t", &random_vectors(4096, 128), None).await.unwrap();
    wait_for_rows(&h.meta, "t", 4096).await;
    wait_for_files(&h.meta, "t", FileType::Index, 1).await;

    // Re-index under a different engine family; the call is level-triggered
    // and only returns once every convertible file reached INDEX
    let requested = TableIndex {
        engine_type: EngineType::IvfSq8,
        nlist: 16,
        metric_type: MetricType::L2,
    };
    h.db.create_index("t", requested).await.unwrap();

    let index = h.db.describe_index("t").await.unwrap();
    assert_eq!(index.engine_type, EngineType::IvfSq8);

    for file in h.meta.table_files("t").await.unwrap() {
        if file.file_type == FileType::Index {
            assert_eq!(file.engine_type, EngineType::IvfSq8, "no mixed-engine INDEX state");
        }
        assert!(
            !matches!(file.file_type, FileType::Raw | FileType::ToIndex | FileType::NewIndex),
            "create_index returned with convertible files left"
        );
    }

    // Idempotence: an equal request performs no additional work
    let before: Vec<u64> = files_in_state(&h.meta, "t", FileType::Index)
        .await
        .iter()
        .map(|f| f.file_id)
        .collect();
    h.db.create_index("t", requested).await.unwrap();
    let after: Vec<u64> = files_in_state(&h.meta, "t", FileType::Index)
        .await
        .iter()
        .map(|f| f.file_id)
        .collect();
    assert_eq!(before, after);

    h.db.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn describe_round_trips_index_file_size_in_mb() {
    let h = open_db(|_| {}).await;
    let schema = table_schema("t", 16, EngineType::IvfFlat, 7);
    h.db.create_table(schema.clone()).await.unwrap();

    let described = h.db.describe_table("t").await.unwrap();
    assert_eq!(described.index_file_size, 7);
    assert_eq!(described.dimension, schema.dimension);
    assert_eq!(described.engine_type, schema.engine_type);
    assert_eq!(described.metric_type, schema.metric_type);
    assert_eq!(described.nlist, schema.nlist);

    h.db.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn flag_row_count_and_listing() {
    let h = open_db(|_| {}).await;
    h.db.create_table(table_schema("a", 4, EngineType::Idmap, 32)).await.unwrap();
    h.db.create_table(table_schema("b", 4, EngineType::Idmap, 32)).await.unwrap();

    assert_eq!(h.db.all_tables().await.unwrap().len(), 2);

    h.db.update_table_flag("a", 0x5a).await.unwrap();
    assert_eq!(h.db.describe_table("a").await.unwrap().flag, 0x5a);

    h.db.insert_vectors("a", &random_vectors(5, 4), None).await.unwrap();
    wait_for_rows(&h.meta, "a", 5).await;
    assert_eq!(h.db.table_row_count("a").await.unwrap(), 5);
    assert_eq!(h.db.table_row_count("b").await.unwrap(), 0);
    assert!(h.db.size().await.unwrap() > 0);

    h.db.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn validation_rejects_bad_input() {
    let h = open_db(|_| {}).await;
    h.db.create_table(table_schema("t", 4, EngineType::Idmap, 32)).await.unwrap();

    // Zero-dimension table
    let err = h.db.create_table(table_schema("bad", 0, EngineType::Idmap, 32)).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { .. }));

    // Wrong vector shape
    let err = h.db.insert_vectors("t", &[1.0, 2.0, 3.0], None).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { .. }));

    // Mismatched id count
    let err = h.db.insert_vectors("t", &[1.0; 4], Some(vec![1, 2])).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { .. }));

    // Unknown table
    let err = h.db.insert_vectors("missing", &[1.0; 4], None).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));

    // Invalid query params
    let err = h.db.query("t", 0, 1, 1, &[1.0; 4]).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { .. }));
    let err = h.db.query("t", 1, 0, 1, &[1.0; 4]).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { .. }));
    let err = h.db.query("t", 1, 1, 1, &[]).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { .. }));

    // Malformed and unknown file ids
    let err = h
        .db
        .query_by_file_ids("t", &["not-a-number".into()], 1, 1, 1, &[1.0; 4], &[])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { .. }));
    let err = h
        .db
        .query_by_file_ids("t", &["999".into()], 1, 1, 1, &[1.0; 4], &[])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { .. }));

    h.db.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn supplied_ids_are_echoed_back() {
    let h = open_db(|_| {}).await;
    h.db.create_table(table_schema("t", 4, EngineType::Idmap, 32)).await.unwrap();

    let ids = h
        .db
        .insert_vectors("t", &[1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0], Some(vec![7, 9]))
        .await
        .unwrap();
    assert_eq!(ids, vec![7, 9]);
    wait_for_rows(&h.meta, "t", 2).await;

    let result = h.db.query("t", 1, 1, 1, &[0.0, 1.0, 0.0, 0.0]).await.unwrap();
    assert_eq!(result.ids, vec![9]);

    h.db.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn query_pads_short_results() {
    let h = open_db(|_| {}).await;
    h.db.create_table(table_schema("t", 4, EngineType::Idmap, 32)).await.unwrap();
    h.db.insert_vectors("t", &[1.0, 0.0, 0.0, 0.0], None).await.unwrap();
    wait_for_rows(&h.meta, "t", 1).await;

    let result = h.db.query("t", 5, 1, 1, &[1.0, 0.0, 0.0, 0.0]).await.unwrap();
    assert_eq!(result.ids.len(), 5);
    assert_eq!(result.distances.len(), 5);
    assert_ne!(result.ids[0], u64::MAX);
    assert_eq!(result.ids[4], u64::MAX);
    assert_eq!(result.distances[4], f32::MAX);

    h.db.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn query_by_dates_spans_partitions() {
    let h = open_db(|_| {}).await;
    h.db.create_table(table_schema("t", 4, EngineType::Idmap, 32)).await.unwrap();
    h.db.insert_vectors("t", &[1.0, 0.0, 0.0, 0.0], Some(vec![1])).await.unwrap();
    wait_for_rows(&h.meta, "t", 1).await;

    // Today's partition plus an empty one
    let result = h
        .db
        .query_by_dates(
            "t",
            1,
            1,
            1,
            &[1.0, 0.0, 0.0, 0.0],
            &[quiver_core::utils::today(), date("2020-01-01")],
        )
        .await
        .unwrap();
    assert_eq!(result.ids, vec![1]);

    // A range with no files still answers, with padding only
    let result = h
        .db
        .query_by_dates("t", 1, 1, 1, &[1.0, 0.0, 0.0, 0.0], &[date("2020-01-01")])
        .await
        .unwrap();
    assert_eq!(result.ids, vec![u64::MAX]);

    h.db.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stop_flushes_buffers_and_blocks_further_work() {
    let h = open_db(|_| {}).await;
    h.db.create_table(table_schema("t", 4, EngineType::Idmap, 32)).await.unwrap();

    // No waiting: stop itself must serialise the buffer
    h.db.insert_vectors("t", &random_vectors(3, 4), None).await.unwrap();
    h.db.stop().await.unwrap();
    assert_eq!(h.meta.count("t").await.unwrap(), 3);

    let err = h.db.query("t", 1, 1, 1, &[1.0; 4]).await.unwrap_err();
    assert!(matches!(err, Error::ShuttingDown));
    let err = h.db.insert_vectors("t", &[1.0; 4], None).await.unwrap_err();
    assert!(matches!(err, Error::ShuttingDown));
    let err = h.db.drop_all().await.unwrap_err();
    assert!(matches!(err, Error::ShuttingDown));

    // Idempotent
    h.db.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn restart_resumes_background_work() {
    let h = open_db(|_| {}).await;
    h.db.create_table(table_schema("t", 4, EngineType::Idmap, 32)).await.unwrap();

    h.db.stop().await.unwrap();
    h.db.start().await.unwrap();

    h.db.insert_vectors("t", &[1.0, 0.0, 0.0, 0.0], None).await.unwrap();
    wait_for_rows(&h.meta, "t", 1).await;
    let result = h.db.query("t", 1, 1, 1, &[1.0, 0.0, 0.0, 0.0]).await.unwrap();
    assert_eq!(result.ids.len(), 1);

    h.db.stop().await.unwrap();
}
