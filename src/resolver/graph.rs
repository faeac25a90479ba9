// src/resolver/graph.rs

//! Action DAG and dependency-closure algorithms
//!
//! `ActionGraph` is the solver's output for the add phase: nodes are
//! install/recompile actions, edges run from a dependency's action to
//! its dependents'. Any topological order is a legal execution
//! sequence; the executor additionally runs independent nodes in
//! parallel.

use super::{Action, Universe};
use crate::error::{Error, Result};
use crate::types::PkgName;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Debug, Default)]
pub struct ActionGraph {
    nodes: Vec<Action>,
    succs: Vec<BTreeSet<usize>>,
    preds: Vec<BTreeSet<usize>>,
}

impl ActionGraph {
    pub fn new() -> Self {
        ActionGraph::default()
    }

    pub fn add_node(&mut self, action: Action) -> usize {
        self.nodes.push(action);
        self.succs.push(BTreeSet::new());
        self.preds.push(BTreeSet::new());
        self.nodes.len() - 1
    }

    /// Add an edge from a dependency's node to a dependent's node.
    pub fn add_edge(&mut self, from: usize, to: usize) {
        self.succs[from].insert(to);
        self.preds[to].insert(from);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, i: usize) -> &Action {
        &self.nodes[i]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Action> {
        self.nodes.iter()
    }

    pub fn predecessors(&self, i: usize) -> &BTreeSet<usize> {
        &self.preds[i]
    }

    pub fn successors(&self, i: usize) -> &BTreeSet<usize> {
        &self.succs[i]
    }

    /// Kahn's algorithm. Fails on cycles, which a well-formed universe
    /// cannot produce but a buggy repository can.
    pub fn topological_sort(&self) -> Result<Vec<usize>> {
        let mut in_degree: Vec<usize> = self.preds.iter().map(|p| p.len()).collect();
        let mut queue: VecDeque<usize> = (0..self.nodes.len())
            .filter(|&i| in_degree[i] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(i) = queue.pop_front() {
            order.push(i);
            for &j in &self.succs[i] {
                in_degree[j] -= 1;
                if in_degree[j] == 0 {
                    queue.push_back(j);
                }
            }
        }

        if order.len() != self.nodes.len() {
            return Err(Error::Message(
                "dependency cycle in the action graph".to_string(),
            ));
        }
        Ok(order)
    }
}

// =============================================================================
// Name-level closures over a universe
// =============================================================================

/// Dependency edges of a universe at name granularity:
/// `edges[name]` = names this package depends on.
fn dependency_edges(universe: &Universe) -> BTreeMap<&PkgName, BTreeSet<&PkgName>> {
    let mut edges: BTreeMap<&PkgName, BTreeSet<&PkgName>> = BTreeMap::new();
    for pkg in &universe.packages {
        let entry = edges.entry(&pkg.nv.name).or_default();
        for dep in &pkg.depends {
            entry.insert(&dep.name);
        }
    }
    edges
}

/// Seeds plus every package that transitively depends on one of them.
pub fn forward_closure(universe: &Universe, seeds: &BTreeSet<PkgName>) -> BTreeSet<PkgName> {
    let edges = dependency_edges(universe);
    // Reverse the edges: who depends on whom.
    let mut dependents: BTreeMap<&PkgName, BTreeSet<&PkgName>> = BTreeMap::new();
    for (name, deps) in &edges {
        for dep in deps {
            dependents.entry(*dep).or_default().insert(*name);
        }
    }
    closure(seeds, |name| {
        dependents
            .get(name)
            .map(|s| s.iter().map(|n| (*n).clone()).collect())
            .unwrap_or_default()
    })
}

/// Seeds plus everything they transitively depend on.
pub fn backward_closure(universe: &Universe, seeds: &BTreeSet<PkgName>) -> BTreeSet<PkgName> {
    let edges = dependency_edges(universe);
    closure(seeds, |name| {
        edges
            .get(name)
            .map(|s| s.iter().map(|n| (*n).clone()).collect())
            .unwrap_or_default()
    })
}

fn closure<F>(seeds: &BTreeSet<PkgName>, next: F) -> BTreeSet<PkgName>
where
    F: Fn(&PkgName) -> Vec<PkgName>,
{
    let mut seen: BTreeSet<PkgName> = seeds.clone();
    let mut work: VecDeque<PkgName> = seeds.iter().cloned().collect();
    while let Some(name) = work.pop_front() {
        for n in next(&name) {
            if seen.insert(n.clone()) {
                work.push_back(n);
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::PkgDesc;
    use crate::types::{Dep, Nv};

    fn desc(nv: &str, depends: &[&str]) -> PkgDesc {
        PkgDesc {
            nv: Nv::parse(nv).unwrap(),
            depends: depends.iter().map(|d| Dep::parse(d).unwrap()).collect(),
            depopts: vec![],
            conflicts: vec![],
            installed: false,
        }
    }

    fn names(set: &BTreeSet<PkgName>) -> Vec<&str> {
        set.iter().map(|n| n.as_str()).collect()
    }

    #[test]
    fn topological_sort_orders_dependencies_first() {
        let mut g = ActionGraph::new();
        let a = g.add_node(Action::Change {
            from: None,
            to: Nv::parse("a.1").unwrap(),
        });
        let b = g.add_node(Action::Change {
            from: None,
            to: Nv::parse("b.1").unwrap(),
        });
        let c = g.add_node(Action::Change {
            from: None,
            to: Nv::parse("c.1").unwrap(),
        });
        g.add_edge(a, b);
        g.add_edge(b, c);
        let order = g.topological_sort().unwrap();
        let pos = |i| order.iter().position(|&x| x == i).unwrap();
        assert!(pos(a) < pos(b));
        assert!(pos(b) < pos(c));
    }

    #[test]
    fn topological_sort_detects_cycles() {
        let mut g = ActionGraph::new();
        let a = g.add_node(Action::Recompile(Nv::parse("a.1").unwrap()));
        let b = g.add_node(Action::Recompile(Nv::parse("b.1").unwrap()));
        g.add_edge(a, b);
        g.add_edge(b, a);
        assert!(g.topological_sort().is_err());
    }

    #[test]
    fn closures() {
        // c -> b -> a (c depends on b depends on a)
        let universe = Universe {
            packages: vec![
                desc("a.1", &[]),
                desc("b.1", &["a"]),
                desc("c.1", &["b"]),
            ],
        };
        let seeds: BTreeSet<PkgName> = [PkgName::new("a")].into_iter().collect();
        assert_eq!(names(&forward_closure(&universe, &seeds)), vec!["a", "b", "c"]);

        let seeds: BTreeSet<PkgName> = [PkgName::new("c")].into_iter().collect();
        assert_eq!(names(&backward_closure(&universe, &seeds)), vec!["a", "b", "c"]);

        let seeds: BTreeSet<PkgName> = [PkgName::new("b")].into_iter().collect();
        assert_eq!(names(&forward_closure(&universe, &seeds)), vec!["b", "c"]);
        assert_eq!(names(&backward_closure(&universe, &seeds)), vec!["a", "b"]);
    }
}
