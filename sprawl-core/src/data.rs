use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use sprawl_scanner::error::{Result, ScanError};
use sprawl_scanner::store::{GraphStore, UrlRank};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// One finished benchmark run, as kept in `benchmark_runs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub mode: String,
    pub seeds: Vec<String>,
    pub deadline_ms: u64,
    /// Unix timestamps in seconds.
    pub started_at: i64,
    pub finished_at: i64,
    pub nodes: u64,
}

/// SQLite-backed [`GraphStore`].
///
/// The connection is opened by `initialize` and dropped by `close`; every
/// query runs on the blocking pool.
pub struct SqliteGraphStore {
    path: PathBuf,
    conn: Arc<Mutex<Option<Connection>>>,
    clear_on_close: bool,
}

impl SqliteGraphStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            conn: Arc::new(Mutex::new(None)),
            clear_on_close: false,
        }
    }

    pub fn with_clear_on_close(mut self, clear_on_close: bool) -> Self {
        self.clear_on_close = clear_on_close;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn is_open(&self) -> bool {
        self.conn.lock().map(|conn| conn.is_some()).unwrap_or(false)
    }

    fn open(path: &Path) -> rusqlite::Result<Connection> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS urls (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                address TEXT NOT NULL UNIQUE
            );

            -- parent page contains a link to child page
            CREATE TABLE IF NOT EXISTS contains (
                source_id INTEGER NOT NULL,
                target_id INTEGER NOT NULL,
                UNIQUE(source_id, target_id),
                FOREIGN KEY(source_id) REFERENCES urls(id) ON DELETE CASCADE,
                FOREIGN KEY(target_id) REFERENCES urls(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_contains_target ON contains(target_id);

            CREATE TABLE IF NOT EXISTS benchmark_runs (
                id TEXT PRIMARY KEY,
                mode TEXT NOT NULL CHECK(mode IN ('sync', 'async')),
                seeds TEXT NOT NULL,      -- JSON array
                deadline_ms INTEGER NOT NULL,
                started_at INTEGER NOT NULL,
                finished_at INTEGER NOT NULL,
                nodes INTEGER NOT NULL
            );
            ",
        )?;

        Ok(conn)
    }

    /// Run `f` against the open connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| ScanError::StoreError("connection lock poisoned".to_string()))?;
            let conn = guard
                .as_mut()
                .ok_or_else(|| ScanError::StoreError("store is not initialized".to_string()))?;
            f(conn).map_err(ScanError::store)
        })
        .await?
    }

    /// Append a finished benchmark run and return its id.
    pub async fn insert_run(&self, run: &RunRecord) -> Result<String> {
        let run = run.clone();
        let seeds = serde_json::to_string(&run.seeds).map_err(ScanError::store)?;

        self.with_conn(move |conn| {
            let id = if run.id.is_empty() {
                uuid::Uuid::new_v4().to_string()
            } else {
                run.id.clone()
            };
            conn.execute(
                "INSERT INTO benchmark_runs (id, mode, seeds, deadline_ms, started_at, finished_at, nodes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    &id,
                    &run.mode,
                    seeds,
                    run.deadline_ms as i64,
                    run.started_at,
                    run.finished_at,
                    run.nodes as i64,
                ],
            )?;
            Ok(id)
        })
        .await
    }

    /// Most recent runs first.
    pub async fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let rows = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, mode, seeds, deadline_ms, started_at, finished_at, nodes
                     FROM benchmark_runs
                     ORDER BY started_at DESC, rowid DESC
                     LIMIT ?1",
                )?;

                stmt.query_map(params![limit as i64], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, i64>(6)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()
            })
            .await?;

        rows.into_iter()
            .map(|(id, mode, seeds, deadline_ms, started_at, finished_at, nodes)| {
                Ok(RunRecord {
                    id,
                    mode,
                    seeds: serde_json::from_str(&seeds).map_err(ScanError::store)?,
                    deadline_ms: deadline_ms as u64,
                    started_at,
                    finished_at,
                    nodes: nodes as u64,
                })
            })
            .collect()
    }

    pub async fn node_id(&self, address: &str) -> Result<Option<i64>> {
        let address = address.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id FROM urls WHERE address = ?1",
                params![address],
                |row| row.get(0),
            )
            .optional()
        })
        .await
    }

    pub async fn count_edges(&self) -> Result<u64> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM contains", [], |row| row.get::<_, i64>(0))
        })
        .await
        .map(|n| n as u64)
    }
}

#[async_trait]
impl GraphStore for SqliteGraphStore {
    async fn initialize(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let path = self.path.clone();
        let conn = tokio::task::spawn_blocking(move || Self::open(&path))
            .await?
            .map_err(|e| {
                ScanError::StoreError(format!("cannot open {}: {}", self.path.display(), e))
            })?;

        *self
            .conn
            .lock()
            .map_err(|_| ScanError::StoreError("connection lock poisoned".to_string()))? =
            Some(conn);

        info!("Graph store opened at {}", self.path.display());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.clear_on_close && self.is_open() {
            self.clear_all().await?;
        }

        let conn = self
            .conn
            .lock()
            .map_err(|_| ScanError::StoreError("connection lock poisoned".to_string()))?
            .take();

        if let Some(conn) = conn {
            conn.close().map_err(|(_, e)| ScanError::store(e))?;
            debug!("Graph store at {} closed", self.path.display());
        }
        Ok(())
    }

    async fn merge_edge(&self, parent: &str, child: &str) -> Result<()> {
        let parent = parent.to_string();
        let child = child.to_string();

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT OR IGNORE INTO urls (address) VALUES (?1)",
                params![&parent],
            )?;
            tx.execute(
                "INSERT OR IGNORE INTO urls (address) VALUES (?1)",
                params![&child],
            )?;
            tx.execute(
                "INSERT OR IGNORE INTO contains (source_id, target_id)
                 SELECT p.id, c.id FROM urls p, urls c
                 WHERE p.address = ?1 AND c.address = ?2",
                params![&parent, &child],
            )?;
            tx.commit()
        })
        .await
    }

    async fn count_nodes(&self) -> Result<u64> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM urls", [], |row| row.get::<_, i64>(0))
        })
        .await
        .map(|n| n as u64)
    }

    async fn rank_by_in_degree(&self) -> Result<Vec<UrlRank>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.address, COUNT(c.source_id) AS referenced
                 FROM urls u
                 LEFT JOIN contains c ON c.target_id = u.id
                 GROUP BY u.id
                 ORDER BY referenced DESC, u.address ASC",
            )?;

            stmt.query_map([], |row| {
                Ok(UrlRank {
                    url: row.get(0)?,
                    in_degree: row.get::<_, i64>(1)? as u64,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
    }

    async fn clear_all(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute_batch(
                "
                DELETE FROM contains;
                DELETE FROM urls;
                ",
            )
        })
        .await
    }
}
