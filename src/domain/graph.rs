//! Dependency graph over a candidate container set.
//!
//! Produces a deterministic recreation order (dependencies before dependents)
//! via depth-first topological sort with explicit cycle detection, plus the
//! reverse order for stop sequencing, and single-hop implicit-restart
//! propagation.

use std::collections::{HashMap, HashSet};

use crate::domain::container::ManagedContainer;
use crate::domain::error::CycleError;

/// Dependency graph built from one pass's candidate set.
///
/// Nodes are keyed by display name; the index additionally maps each node's
/// full ID and short ID to the same node so network-namespace references
/// (which may use either form) resolve. Keys are unique per pass — if the
/// runtime returns duplicate names, the last one wins.
pub struct DependencyGraph<'a> {
    nodes: Vec<&'a ManagedContainer>,
    index: HashMap<&'a str, usize>,
}

impl<'a> DependencyGraph<'a> {
    /// Build the graph and its name/ID index.
    #[must_use]
    pub fn build(containers: &'a [ManagedContainer]) -> Self {
        let mut index = HashMap::new();
        for (i, container) in containers.iter().enumerate() {
            index.insert(container.name.as_str(), i);
            if !container.id.is_empty() {
                index.insert(container.id.as_str(), i);
            }
            if !container.short_id.is_empty() {
                index.insert(container.short_id.as_str(), i);
            }
        }
        Self {
            nodes: containers.iter().collect(),
            index,
        }
    }

    /// Topological sort: every dependency strictly precedes its dependents.
    ///
    /// Nodes are visited in input order so containers nothing depends on
    /// still appear in the output. Dependency names with no matching node are
    /// ignored — a declared dependency outside the candidate set is not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns a [`CycleError`] naming the node where a cycle was detected.
    /// A cycle anywhere aborts the entire sort with no partial result.
    pub fn sort(&self) -> Result<Vec<ManagedContainer>, CycleError> {
        let mut visited = vec![false; self.nodes.len()];
        let mut in_progress = vec![false; self.nodes.len()];
        let mut output = Vec::with_capacity(self.nodes.len());

        for i in 0..self.nodes.len() {
            self.visit(i, &mut visited, &mut in_progress, &mut output)?;
        }
        Ok(output)
    }

    /// [`Self::sort`] reversed: dependents first, for stop sequencing.
    ///
    /// # Errors
    ///
    /// Same cycle contract as [`Self::sort`].
    pub fn sort_reverse(&self) -> Result<Vec<ManagedContainer>, CycleError> {
        let mut order = self.sort()?;
        order.reverse();
        Ok(order)
    }

    fn visit(
        &self,
        node: usize,
        visited: &mut [bool],
        in_progress: &mut [bool],
        output: &mut Vec<ManagedContainer>,
    ) -> Result<(), CycleError> {
        if in_progress[node] {
            return Err(CycleError {
                container: self.nodes[node].name.clone(),
            });
        }
        if visited[node] {
            return Ok(());
        }

        in_progress[node] = true;
        for dep in self.nodes[node].dependency_names() {
            if let Some(&dep_node) = self.index.get(dep) {
                self.visit(dep_node, visited, in_progress, output)?;
            }
        }
        in_progress[node] = false;
        visited[node] = true;
        output.push(self.nodes[node].clone());
        Ok(())
    }
}

/// Mark containers whose direct dependencies are already marked for restart.
///
/// Single-hop per call: only direct dependents of `marked` entries are
/// marked, and checking stops at the first matching dependency. A chain of
/// three dependencies needs three calls — callers loop to a fixed point to
/// reach transitive closure. Already-marked containers are never re-added.
///
/// Returns the display names newly marked by this call.
pub fn propagate_restarts(
    containers: &mut [ManagedContainer],
    marked: &HashSet<String>,
) -> Vec<String> {
    let mut newly_marked = Vec::new();
    for container in containers.iter_mut() {
        if marked.contains(&container.name) {
            continue;
        }
        let hit = container
            .dependency_names()
            .iter()
            .any(|dep| marked.contains(*dep));
        if hit {
            container.implicit_restart = true;
            newly_marked.push(container.name.clone());
        }
    }
    newly_marked
}
