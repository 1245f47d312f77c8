use crate::error::{Result, ScanError};
use async_trait::async_trait;
use petgraph::Direction;
use petgraph::graphmap::DiGraphMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

/// A URL node and the number of distinct pages linking to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRank {
    pub url: String,
    pub in_degree: u64,
}

impl fmt::Display for UrlRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "URL: {} (Referenced by {} pages)", self.url, self.in_degree)
    }
}

/// Persistence for the containment graph.
///
/// Write failures are returned, never panicked; the traversal logs them and
/// carries on.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Connect and prepare the schema. A failure here is fatal to the run.
    async fn initialize(&self) -> Result<()>;

    /// Release the connection, clearing the graph first if configured to.
    async fn close(&self) -> Result<()>;

    /// Idempotently ensure both URL nodes and the `parent -> child`
    /// containment edge exist.
    async fn merge_edge(&self, parent: &str, child: &str) -> Result<()>;

    async fn count_nodes(&self) -> Result<u64>;

    /// Nodes ordered by in-degree, highest first.
    async fn rank_by_in_degree(&self) -> Result<Vec<UrlRank>>;

    async fn clear_all(&self) -> Result<()>;
}

#[derive(Debug, Default)]
struct MemoryGraph {
    ids: HashMap<String, u32>,
    addresses: Vec<String>,
    graph: DiGraphMap<u32, ()>,
}

impl MemoryGraph {
    fn intern(&mut self, address: &str) -> u32 {
        if let Some(id) = self.ids.get(address) {
            return *id;
        }
        let id = self.addresses.len() as u32;
        self.addresses.push(address.to_string());
        self.ids.insert(address.to_string(), id);
        self.graph.add_node(id);
        id
    }
}

/// In-process graph store backed by a petgraph `DiGraphMap`.
#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    inner: Mutex<MemoryGraph>,
    clear_on_close: bool,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clear_on_close(mut self, clear_on_close: bool) -> Self {
        self.clear_on_close = clear_on_close;
        self
    }

    fn graph(&self) -> Result<std::sync::MutexGuard<'_, MemoryGraph>> {
        self.inner
            .lock()
            .map_err(|_| ScanError::StoreError("memory graph lock poisoned".to_string()))
    }

    /// All persisted edges as `(parent, child)` pairs.
    pub fn edges(&self) -> Vec<(String, String)> {
        let Ok(inner) = self.graph() else {
            return Vec::new();
        };
        inner
            .graph
            .all_edges()
            .map(|(from, to, _)| {
                (
                    inner.addresses[from as usize].clone(),
                    inner.addresses[to as usize].clone(),
                )
            })
            .collect()
    }

    pub fn contains_edge(&self, parent: &str, child: &str) -> bool {
        let Ok(inner) = self.graph() else {
            return false;
        };
        match (inner.ids.get(parent), inner.ids.get(child)) {
            (Some(from), Some(to)) => inner.graph.contains_edge(*from, *to),
            _ => false,
        }
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn initialize(&self) -> Result<()> {
        self.graph().map(|_| ())
    }

    async fn close(&self) -> Result<()> {
        if self.clear_on_close {
            self.clear_all().await?;
        }
        Ok(())
    }

    async fn merge_edge(&self, parent: &str, child: &str) -> Result<()> {
        let mut inner = self.graph()?;
        let from = inner.intern(parent);
        let to = inner.intern(child);
        inner.graph.add_edge(from, to, ());
        Ok(())
    }

    async fn count_nodes(&self) -> Result<u64> {
        Ok(self.graph()?.graph.node_count() as u64)
    }

    async fn rank_by_in_degree(&self) -> Result<Vec<UrlRank>> {
        let inner = self.graph()?;
        let mut ranks: Vec<UrlRank> = inner
            .graph
            .nodes()
            .map(|id| UrlRank {
                url: inner.addresses[id as usize].clone(),
                in_degree: inner
                    .graph
                    .neighbors_directed(id, Direction::Incoming)
                    .count() as u64,
            })
            .collect();

        ranks.sort_by(|a, b| b.in_degree.cmp(&a.in_degree).then_with(|| a.url.cmp(&b.url)));
        Ok(ranks)
    }

    async fn clear_all(&self) -> Result<()> {
        *self.graph()? = MemoryGraph::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_merge_edge_is_idempotent() {
        let store = MemoryGraphStore::new();
        store.initialize().await.unwrap();

        store.merge_edge("http://a.com", "http://b.com").await.unwrap();
        store.merge_edge("http://a.com", "http://b.com").await.unwrap();

        assert_eq!(store.count_nodes().await.unwrap(), 2);
        assert_eq!(store.edges().len(), 1);
        assert!(store.contains_edge("http://a.com", "http://b.com"));
        assert!(!store.contains_edge("http://b.com", "http://a.com"));
    }

    #[tokio::test]
    async fn test_rank_by_in_degree() {
        let store = MemoryGraphStore::new();
        store.merge_edge("A", "B").await.unwrap();
        store.merge_edge("A", "C").await.unwrap();
        store.merge_edge("C", "B").await.unwrap();
        store.merge_edge("D", "B").await.unwrap();

        let ranks = store.rank_by_in_degree().await.unwrap();
        assert_eq!(ranks[0], UrlRank { url: "B".to_string(), in_degree: 3 });
        assert_eq!(ranks[1], UrlRank { url: "C".to_string(), in_degree: 1 });
        assert_eq!(ranks[2].in_degree, 0);
        assert_eq!(ranks.len(), 4);
    }

    #[tokio::test]
    async fn test_clear_all_and_close() {
        let store = MemoryGraphStore::new().with_clear_on_close(true);
        store.merge_edge("A", "B").await.unwrap();
        store.close().await.unwrap();
        assert_eq!(store.count_nodes().await.unwrap(), 0);
        assert!(store.edges().is_empty());
    }

    #[tokio::test]
    async fn test_close_keeps_graph_by_default() {
        let store = MemoryGraphStore::new();
        store.merge_edge("A", "B").await.unwrap();
        store.close().await.unwrap();
        assert_eq!(store.count_nodes().await.unwrap(), 2);
    }

    #[test]
    fn test_url_rank_display() {
        let rank = UrlRank {
            url: "https://example.com".to_string(),
            in_degree: 7,
        };
        assert_eq!(
            rank.to_string(),
            "URL: https://example.com (Referenced by 7 pages)"
        );
    }
}
