// Tests for the SQLite graph store

use sprawl_core::data::{RunRecord, SqliteGraphStore};
use sprawl_scanner::store::{GraphStore, UrlRank};
use tempfile::TempDir;

async fn create_test_store() -> (TempDir, SqliteGraphStore) {
    let temp_dir = TempDir::new().unwrap();
    let store = SqliteGraphStore::new(temp_dir.path().join("graph.db"));
    store.initialize().await.unwrap();
    (temp_dir, store)
}

// ============================================================================
// Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_initialize_creates_database() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("graph.db");

    assert!(!SqliteGraphStore::exists(&db_path));

    let store = SqliteGraphStore::new(&db_path);
    store.initialize().await.unwrap();

    assert!(SqliteGraphStore::exists(&db_path));
    assert!(store.is_open());
}

#[tokio::test]
async fn test_initialize_creates_parent_directories() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("dir").join("graph.db");

    let store = SqliteGraphStore::new(&db_path);
    store.initialize().await.unwrap();

    assert!(db_path.exists());
}

#[tokio::test]
async fn test_initialize_fails_on_unopenable_path() {
    let temp_dir = TempDir::new().unwrap();
    // A directory cannot be opened as a database file.
    let store = SqliteGraphStore::new(temp_dir.path());

    assert!(store.initialize().await.is_err());
    assert!(!store.is_open());
}

#[tokio::test]
async fn test_queries_before_initialize_fail() {
    let temp_dir = TempDir::new().unwrap();
    let store = SqliteGraphStore::new(temp_dir.path().join("graph.db"));

    assert!(store.count_nodes().await.is_err());
    assert!(store.merge_edge("http://a.com", "http://b.com").await.is_err());
}

#[tokio::test]
async fn test_close_releases_connection() {
    let (_temp_dir, store) = create_test_store().await;

    store.close().await.unwrap();

    assert!(!store.is_open());
    assert!(store.count_nodes().await.is_err());
    // Closing twice is harmless.
    store.close().await.unwrap();
}

#[tokio::test]
async fn test_graph_survives_reopen_without_clear_on_close() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("graph.db");

    let store = SqliteGraphStore::new(&db_path);
    store.initialize().await.unwrap();
    store.merge_edge("http://a.com", "http://b.com").await.unwrap();
    store.close().await.unwrap();

    store.initialize().await.unwrap();
    assert_eq!(store.count_nodes().await.unwrap(), 2);
}

#[tokio::test]
async fn test_clear_on_close_wipes_graph() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("graph.db");

    let store = SqliteGraphStore::new(&db_path).with_clear_on_close(true);
    store.initialize().await.unwrap();
    store.merge_edge("http://a.com", "http://b.com").await.unwrap();
    store.close().await.unwrap();

    store.initialize().await.unwrap();
    assert_eq!(store.count_nodes().await.unwrap(), 0);
    assert_eq!(store.count_edges().await.unwrap(), 0);
}

// ============================================================================
// Edge Tests
// ============================================================================

#[tokio::test]
async fn test_merge_edge_creates_both_nodes() {
    let (_temp_dir, store) = create_test_store().await;

    store
        .merge_edge("https://www.wikipedia.org", "https://en.wikipedia.org")
        .await
        .unwrap();

    assert_eq!(store.count_nodes().await.unwrap(), 2);
    assert_eq!(store.count_edges().await.unwrap(), 1);
    assert!(store.node_id("https://www.wikipedia.org").await.unwrap().is_some());
    assert!(store.node_id("https://en.wikipedia.org").await.unwrap().is_some());
    assert!(store.node_id("https://de.wikipedia.org").await.unwrap().is_none());
}

#[tokio::test]
async fn test_merge_edge_is_idempotent() {
    let (_temp_dir, store) = create_test_store().await;

    for _ in 0..3 {
        store.merge_edge("http://a.com", "http://b.com").await.unwrap();
    }

    assert_eq!(store.count_nodes().await.unwrap(), 2);
    assert_eq!(store.count_edges().await.unwrap(), 1);
}

#[tokio::test]
async fn test_merge_edge_reuses_existing_nodes() {
    let (_temp_dir, store) = create_test_store().await;

    store.merge_edge("http://a.com", "http://b.com").await.unwrap();
    let b_id = store.node_id("http://b.com").await.unwrap();

    store.merge_edge("http://b.com", "http://c.com").await.unwrap();

    assert_eq!(store.node_id("http://b.com").await.unwrap(), b_id);
    assert_eq!(store.count_nodes().await.unwrap(), 3);
    assert_eq!(store.count_edges().await.unwrap(), 2);
}

#[tokio::test]
async fn test_concurrent_merges() {
    let (_temp_dir, store) = create_test_store().await;
    let store = std::sync::Arc::new(store);

    let mut handles = Vec::new();
    for i in 0..20 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .merge_edge("http://hub.com", &format!("http://leaf{}.com", i % 10))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(store.count_nodes().await.unwrap(), 11);
    assert_eq!(store.count_edges().await.unwrap(), 10);
}

#[tokio::test]
async fn test_clear_all() {
    let (_temp_dir, store) = create_test_store().await;

    store.merge_edge("http://a.com", "http://b.com").await.unwrap();
    store.clear_all().await.unwrap();

    assert_eq!(store.count_nodes().await.unwrap(), 0);
    assert_eq!(store.count_edges().await.unwrap(), 0);

    // The schema is intact after clearing.
    store.merge_edge("http://a.com", "http://b.com").await.unwrap();
    assert_eq!(store.count_nodes().await.unwrap(), 2);
}

// ============================================================================
// Ranking Tests
// ============================================================================

#[tokio::test]
async fn test_rank_by_in_degree() {
    let (_temp_dir, store) = create_test_store().await;

    store.merge_edge("http://a.com", "http://b.com").await.unwrap();
    store.merge_edge("http://a.com", "http://c.com").await.unwrap();
    store.merge_edge("http://c.com", "http://b.com").await.unwrap();
    store.merge_edge("http://d.com", "http://b.com").await.unwrap();
    store.merge_edge("http://d.com", "http://c.com").await.unwrap();

    let ranks = store.rank_by_in_degree().await.unwrap();

    assert_eq!(
        ranks,
        vec![
            UrlRank { url: "http://b.com".to_string(), in_degree: 3 },
            UrlRank { url: "http://c.com".to_string(), in_degree: 2 },
            UrlRank { url: "http://a.com".to_string(), in_degree: 0 },
            UrlRank { url: "http://d.com".to_string(), in_degree: 0 },
        ]
    );
}

#[tokio::test]
async fn test_rank_on_empty_graph() {
    let (_temp_dir, store) = create_test_store().await;
    assert!(store.rank_by_in_degree().await.unwrap().is_empty());
}

// ============================================================================
// Benchmark History Tests
// ============================================================================

fn sample_run(mode: &str, started_at: i64, nodes: u64) -> RunRecord {
    RunRecord {
        id: String::new(),
        mode: mode.to_string(),
        seeds: vec!["https://www.wikipedia.org".to_string()],
        deadline_ms: 4000,
        started_at,
        finished_at: started_at + 4,
        nodes,
    }
}

#[tokio::test]
async fn test_insert_run_generates_id() {
    let (_temp_dir, store) = create_test_store().await;

    let id = store.insert_run(&sample_run("sync", 1_700_000_000, 42)).await.unwrap();
    assert_eq!(id.len(), 36);

    let runs = store.recent_runs(10).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].id, id);
    assert_eq!(runs[0].mode, "sync");
    assert_eq!(runs[0].nodes, 42);
    assert_eq!(runs[0].seeds, vec!["https://www.wikipedia.org"]);
}

#[tokio::test]
async fn test_recent_runs_newest_first() {
    let (_temp_dir, store) = create_test_store().await;

    store.insert_run(&sample_run("sync", 100, 1)).await.unwrap();
    store.insert_run(&sample_run("async", 300, 3)).await.unwrap();
    store.insert_run(&sample_run("async", 200, 2)).await.unwrap();

    let runs = store.recent_runs(2).await.unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].started_at, 300);
    assert_eq!(runs[1].started_at, 200);
}

#[tokio::test]
async fn test_invalid_mode_is_rejected() {
    let (_temp_dir, store) = create_test_store().await;
    assert!(store.insert_run(&sample_run("turbo", 100, 1)).await.is_err());
}

#[tokio::test]
async fn test_clear_all_keeps_run_history() {
    let (_temp_dir, store) = create_test_store().await;

    store.insert_run(&sample_run("sync", 100, 1)).await.unwrap();
    store.clear_all().await.unwrap();

    assert_eq!(store.recent_runs(10).await.unwrap().len(), 1);
}
