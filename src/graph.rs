//! Dependency graph over catalog fields.
//!
//! Edges run from a field to the fields it reads (formula inputs and the
//! visibility source). The graph is sorted once when the catalog loads; the
//! cached order lets the evaluator resolve a record in a single pass.

use std::collections::{BTreeMap, BTreeSet};

use crate::errors::CatalogError;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Field ids in declaration order.
    nodes: Vec<String>,
    /// `deps[i]` holds the node indices field `i` reads.
    deps: Vec<Vec<usize>>,
    index: BTreeMap<String, usize>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node. Returns `false` if the id is already present.
    pub fn add_node(&mut self, id: &str) -> bool {
        if self.index.contains_key(id) {
            return false;
        }
        self.index.insert(id.to_string(), self.nodes.len());
        self.nodes.push(id.to_string());
        self.deps.push(Vec::new());
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Record that `from` reads `to`. Both must be registered.
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<(), CatalogError> {
        let unknown = |reference: &str| CatalogError::UnknownReference {
            field: from.to_string(),
            reference: reference.to_string(),
        };
        let f = *self.index.get(from).ok_or_else(|| unknown(from))?;
        let t = *self.index.get(to).ok_or_else(|| unknown(to))?;
        if !self.deps[f].contains(&t) {
            self.deps[f].push(t);
        }
        Ok(())
    }

    /// All nodes ordered so every field comes after the fields it reads.
    ///
    /// Iterative depth-first search with an explicit work stack; a node seen
    /// again while still in progress closes a cycle, which is reported with
    /// the full path.
    pub fn topo_sort(&self) -> Result<Vec<String>, CatalogError> {
        let mut marks: Vec<Option<Mark>> = vec![None; self.nodes.len()];
        let mut sorted = Vec::with_capacity(self.nodes.len());

        for root in 0..self.nodes.len() {
            if marks[root].is_some() {
                continue;
            }
            // (node, index of the next dependency to look at)
            let mut work_stack: Vec<(usize, usize)> = vec![(root, 0)];
            marks[root] = Some(Mark::InProgress);

            while let Some(&(node, next)) = work_stack.last() {
                if let Some(&dep) = self.deps[node].get(next) {
                    let top = work_stack.len() - 1;
                    work_stack[top].1 += 1;
                    match marks[dep] {
                        None => {
                            marks[dep] = Some(Mark::InProgress);
                            work_stack.push((dep, 0));
                        }
                        Some(Mark::InProgress) => {
                            return Err(self.cycle_error(&work_stack, dep));
                        }
                        Some(Mark::Done) => {}
                    }
                } else {
                    marks[node] = Some(Mark::Done);
                    sorted.push(self.nodes[node].clone());
                    work_stack.pop();
                }
            }
        }
        Ok(sorted)
    }

    fn cycle_error(&self, work_stack: &[(usize, usize)], repeated: usize) -> CatalogError {
        let start = work_stack
            .iter()
            .position(|&(node, _)| node == repeated)
            .unwrap_or(0);
        let mut path: Vec<String> = work_stack[start..]
            .iter()
            .map(|&(node, _)| self.nodes[node].clone())
            .collect();
        path.push(self.nodes[repeated].clone());
        CatalogError::Cycle(path)
    }

    /// Every field that reads `id`, directly or through other fields.
    pub fn dependents_of(&self, id: &str) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        let Some(&target) = self.index.get(id) else {
            return found;
        };
        let mut stack = vec![target];
        let mut visited = BTreeSet::new();
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            for (node, deps) in self.deps.iter().enumerate() {
                if deps.contains(&current) && !visited.contains(&node) {
                    found.insert(self.nodes[node].clone());
                    stack.push(node);
                }
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(nodes: &[&str], edges: &[(&str, &str)]) -> DependencyGraph {
        let mut g = DependencyGraph::new();
        for n in nodes {
            g.add_node(n);
        }
        for (from, to) in edges {
            g.add_edge(from, to).unwrap();
        }
        g
    }

    #[test]
    fn inputs_sort_before_their_readers() {
        let g = graph(
            &["yieldPerM2", "surface", "dimensions", "dryWeight"],
            &[
                ("yieldPerM2", "surface"),
                ("yieldPerM2", "dryWeight"),
                ("surface", "dimensions"),
            ],
        );
        let order = g.topo_sort().unwrap();
        let pos = |id: &str| order.iter().position(|n| n == id).unwrap();
        assert_eq!(order.len(), 4);
        assert!(pos("dimensions") < pos("surface"));
        assert!(pos("surface") < pos("yieldPerM2"));
        assert!(pos("dryWeight") < pos("yieldPerM2"));
    }

    #[test]
    fn indirect_cycle_is_reported_with_its_path() {
        let g = graph(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("c", "a")]);
        match g.topo_sort() {
            Err(CatalogError::Cycle(path)) => {
                assert_eq!(path.first(), path.last());
                assert_eq!(path.len(), 4);
            }
            other => panic!("expected a cycle, got {other:?}"),
        }
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let g = graph(&["a"], &[("a", "a")]);
        assert_eq!(
            g.topo_sort(),
            Err(CatalogError::Cycle(vec!["a".into(), "a".into()]))
        );
    }

    #[test]
    fn edge_to_unknown_node_is_rejected() {
        let mut g = graph(&["a"], &[]);
        assert_eq!(
            g.add_edge("a", "ghost"),
            Err(CatalogError::UnknownReference {
                field: "a".into(),
                reference: "ghost".into()
            })
        );
    }

    #[test]
    fn dependents_are_transitive() {
        let g = graph(
            &["dims", "surface", "yield", "other"],
            &[("surface", "dims"), ("yield", "surface")],
        );
        let deps = g.dependents_of("dims");
        assert!(deps.contains("surface"));
        assert!(deps.contains("yield"));
        assert!(!deps.contains("other"));
    }
}
