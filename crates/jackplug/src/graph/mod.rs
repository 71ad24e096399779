//! Directed dependency graph with deterministic topological ordering.
//!
//! Nodes are identified by the index returned from [`DependencyGraph::add_node`]
//! and carry the name of the plugin they stand for plus the indices of their
//! parents (the plugins they depend on). The sort is stable with respect to
//! node index: two nodes with no ordering constraint between them appear in
//! insertion order, which makes the load order deterministic for a given
//! discovery sequence.

use std::collections::BTreeSet;

use thiserror::Error;

/// The graph contains at least one cycle; no valid ordering exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("the dependency graph contains a cycle")]
pub struct CycleDetected;

#[derive(Debug, Clone)]
struct Node {
    name: String,
    parents: Vec<usize>,
}

/// A directed graph of named nodes ordered by their dependencies.
///
/// # Example
///
/// ```
/// use jackplug::DependencyGraph;
///
/// let mut graph = DependencyGraph::new();
/// let base = graph.add_node("base");
/// let tool = graph.add_node("tool");
/// graph.add_parent(tool, base);
///
/// let order = graph.topological_sort().expect("acyclic");
/// assert_eq!(order, ["base", "tool"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<Node>,
}

impl DependencyGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node and returns its stable index.
    pub fn add_node(&mut self, name: impl Into<String>) -> usize {
        self.nodes.push(Node {
            name: name.into(),
            parents: Vec::new(),
        });
        self.nodes.len() - 1
    }

    /// Declares that `node` depends on `parent`.
    ///
    /// Unknown indices and duplicate declarations are ignored.
    pub fn add_parent(&mut self, node: usize, parent: usize) {
        if parent >= self.nodes.len() {
            return;
        }
        let Some(entry) = self.nodes.get_mut(node) else {
            return;
        };
        if !entry.parents.contains(&parent) {
            entry.parents.push(parent);
        }
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` when the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Produces an ordering in which every node appears after all of its
    /// parents, breaking ties by ascending node index.
    ///
    /// # Errors
    ///
    /// Returns [`CycleDetected`] when a cycle (including a self-loop) makes
    /// a total ordering impossible. The partial order computed up to that
    /// point is discarded.
    pub fn topological_sort(&self) -> Result<Vec<String>, CycleDetected> {
        let mut indegree: Vec<usize> = self.nodes.iter().map(|n| n.parents.len()).collect();
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for (id, node) in self.nodes.iter().enumerate() {
            for &parent in &node.parents {
                children[parent].push(id);
            }
        }

        let mut ready: BTreeSet<usize> = indegree
            .iter()
            .enumerate()
            .filter(|(_, &degree)| degree == 0)
            .map(|(id, _)| id)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = ready.pop_first() {
            order.push(self.nodes[id].name.clone());
            for &child in &children[id] {
                indegree[child] -= 1;
                if indegree[child] == 0 {
                    ready.insert(child);
                }
            }
        }

        if order.len() == self.nodes.len() {
            Ok(order)
        } else {
            Err(CycleDetected)
        }
    }
}
