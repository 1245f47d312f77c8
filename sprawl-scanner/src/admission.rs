use crate::registry::VisitedRegistry;

/// Outcome of offering a discovered `parent -> child` link to the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// First discovery of the child: persist, and enqueue the child.
    Tree,
    /// Extra reference to an already-visited child that closes no cycle.
    NonTree,
    /// Self-reference, repeat of the first parent, or a back edge into the
    /// parent's own ancestor chain.
    Dropped,
}

/// Decide whether `parent -> child` becomes an edge.
///
/// Tree edges are never cycle-checked. Only the non-tree path consults the
/// ancestor chain, and it never writes to the registry's parent map.
pub fn admit(registry: &VisitedRegistry, parent: &str, child: &str) -> Admission {
    if registry.mark_if_new(child) {
        registry.record_parent(child, parent);
        return Admission::Tree;
    }

    let same_parent = matches!(
        registry.parent_of(child),
        Some(Some(existing)) if existing == parent
    );

    if !same_parent && !registry.ancestor_chain_contains(parent, child) {
        Admission::NonTree
    } else {
        Admission::Dropped
    }
}
