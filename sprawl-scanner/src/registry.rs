use dashmap::{DashMap, DashSet};

/// Per-run deduplication and first-discovery ancestry.
///
/// `visited` is the only authority on whether a URL has been seen. The
/// `parents` map is a tree over first-discovery edges and is consulted only
/// when cycle-checking a non-tree edge; a short gap between a successful
/// [`mark_if_new`](Self::mark_if_new) and the matching
/// [`record_parent`](Self::record_parent) is tolerated.
#[derive(Debug, Default)]
pub struct VisitedRegistry {
    visited: DashSet<String>,
    /// child -> discovering parent; `None` marks a seed.
    parents: DashMap<String, Option<String>>,
}

impl VisitedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically insert `url`, returning true iff this call was the first
    /// to see it during the run.
    pub fn mark_if_new(&self, url: &str) -> bool {
        self.visited.insert(url.to_string())
    }

    /// Record the first-discovery parent of `child`. Only the caller that got
    /// `true` from `mark_if_new(child)` may call this; later writes are
    /// ignored.
    pub fn record_parent(&self, child: &str, parent: &str) {
        self.parents
            .entry(child.to_string())
            .or_insert_with(|| Some(parent.to_string()));
    }

    /// Mark a seed URL: visited, with the sentinel (no) parent.
    /// Returns false if it was already present.
    pub fn seed(&self, url: &str) -> bool {
        if !self.mark_if_new(url) {
            return false;
        }
        self.parents.entry(url.to_string()).or_insert(None);
        true
    }

    /// First-discovery parent of `child`.
    ///
    /// `None` when the child has no recorded entry (yet), `Some(None)` for a
    /// seed.
    pub fn parent_of(&self, child: &str) -> Option<Option<String>> {
        self.parents.get(child).map(|entry| entry.value().clone())
    }

    /// Walk first-discovery parents from `start` (inclusive) and report
    /// whether `target` is reached before the sentinel.
    pub fn ancestor_chain_contains(&self, start: &str, target: &str) -> bool {
        let mut current = start.to_string();
        // The map is a tree, so the walk is bounded by its size.
        let mut remaining = self.parents.len() + 1;

        while remaining > 0 {
            if current == target {
                return true;
            }
            match self.parent_of(&current) {
                Some(Some(parent)) => current = parent,
                _ => return false,
            }
            remaining -= 1;
        }
        false
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    pub fn len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }

    /// Forget everything; used when a traversal is force-stopped.
    pub fn clear(&self) {
        self.visited.clear();
        self.parents.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_mark_if_new_is_idempotent() {
        let registry = VisitedRegistry::new();
        assert!(registry.mark_if_new("http://a.com"));
        assert!(!registry.mark_if_new("http://a.com"));
        assert!(!registry.mark_if_new("http://a.com"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_seed_has_sentinel_parent() {
        let registry = VisitedRegistry::new();
        assert!(registry.seed("http://root.com"));
        assert!(!registry.seed("http://root.com"));
        assert_eq!(registry.parent_of("http://root.com"), Some(None));
        assert!(registry.is_visited("http://root.com"));
    }

    #[test]
    fn test_record_parent_first_writer_wins() {
        let registry = VisitedRegistry::new();
        registry.record_parent("http://c.com", "http://p1.com");
        registry.record_parent("http://c.com", "http://p2.com");
        assert_eq!(
            registry.parent_of("http://c.com"),
            Some(Some("http://p1.com".to_string()))
        );
    }

    #[test]
    fn test_ancestor_chain_walks_to_root() {
        let registry = VisitedRegistry::new();
        registry.seed("A");
        registry.mark_if_new("B");
        registry.record_parent("B", "A");
        registry.mark_if_new("C");
        registry.record_parent("C", "B");

        assert!(registry.ancestor_chain_contains("C", "A"));
        assert!(registry.ancestor_chain_contains("C", "B"));
        assert!(registry.ancestor_chain_contains("C", "C"));
        assert!(!registry.ancestor_chain_contains("A", "C"));
        assert!(!registry.ancestor_chain_contains("B", "C"));
    }

    #[test]
    fn test_ancestor_chain_with_single_link() {
        let registry = VisitedRegistry::new();
        registry.record_parent("https://youtube.com", "https://google.com");
        assert!(registry.ancestor_chain_contains("https://youtube.com", "https://google.com"));
    }

    #[test]
    fn test_ancestor_chain_unknown_start() {
        let registry = VisitedRegistry::new();
        registry.seed("A");
        assert!(!registry.ancestor_chain_contains("Z", "A"));
    }

    #[test]
    fn test_clear_forgets_everything() {
        let registry = VisitedRegistry::new();
        registry.seed("A");
        registry.mark_if_new("B");
        registry.record_parent("B", "A");
        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.parent_of("B"), None);
        assert!(registry.mark_if_new("A"));
    }

    #[test]
    fn test_concurrent_mark_has_single_winner() {
        let registry = Arc::new(VisitedRegistry::new());
        let winners = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                let winners = winners.clone();
                std::thread::spawn(move || {
                    if registry.mark_if_new("http://contested.com") {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }
}
