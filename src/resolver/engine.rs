// src/resolver/engine.rs

//! A deliberately simple solver satisfying the `Solver` contract
//!
//! Version selection is greedy: an install keeps whatever is already
//! installed when it satisfies the constraints, an upgrade always takes
//! the newest candidate. The dependency closure is a worklist; any
//! constraint clash or conflict makes the whole request unsatisfiable
//! (`None`) rather than backtracking. Given the same universe and
//! request the output DAG is deterministic up to independent-sibling
//! ordering.

use super::graph::{backward_closure, forward_closure, ActionGraph};
use super::{Action, PkgDesc, Request, Solution, Solver, Universe, VConstraint};
use crate::error::Result;
use crate::types::{Nv, PkgName, VersionConstraint};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

pub struct BasicSolver;

/// Version preference when several candidates satisfy a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prefer {
    /// Keep the installed version when it qualifies.
    Installed,
    /// Take the newest qualifying version.
    Latest,
}

impl Solver for BasicSolver {
    fn resolve(
        &self,
        universe: &Universe,
        request: &Request,
        reinstall: &BTreeSet<Nv>,
    ) -> Result<Option<Solution>> {
        if !request.wish_remove.is_empty() {
            Ok(self.solve_remove(universe, request))
        } else if !request.wish_upgrade.is_empty() {
            Ok(self.solve_change(universe, &request.wish_upgrade, reinstall, Prefer::Latest))
        } else {
            Ok(self.solve_change(universe, &request.wish_install, reinstall, Prefer::Installed))
        }
    }

    fn filter_forward_dependencies(
        &self,
        universe: &Universe,
        seeds: &BTreeSet<PkgName>,
    ) -> BTreeSet<PkgName> {
        forward_closure(universe, seeds)
    }

    fn filter_backward_dependencies(
        &self,
        universe: &Universe,
        seeds: &BTreeSet<PkgName>,
    ) -> BTreeSet<PkgName> {
        backward_closure(universe, seeds)
    }
}

impl BasicSolver {
    /// Install and upgrade share one shape: choose a version for every
    /// wished name, close over dependencies, check conflicts, then emit
    /// the difference against the installed world as an action DAG.
    fn solve_change(
        &self,
        universe: &Universe,
        wishes: &[VConstraint],
        reinstall: &BTreeSet<Nv>,
        prefer: Prefer,
    ) -> Option<Solution> {
        let mut chosen: BTreeMap<PkgName, Nv> = BTreeMap::new();
        let mut work: VecDeque<Nv> = VecDeque::new();

        for wish in wishes {
            if universe.versions(&wish.name).is_empty() {
                match wish.constraint {
                    // An installed package no repository publishes (the
                    // synthetic base package, or a withdrawn one) is
                    // left alone rather than failing the request.
                    VersionConstraint::Any => continue,
                    _ => {
                        debug!("{} is not available", wish.name);
                        return None;
                    }
                }
            }
            let pick = choose(universe, reinstall, &wish.name, &wish.constraint, prefer)?;
            if chosen.insert(wish.name.clone(), pick.clone()).is_none() {
                work.push_back(pick);
            }
        }

        // Dependency closure.
        while let Some(nv) = work.pop_front() {
            let desc = universe.find(&nv)?;
            for dep in &desc.depends {
                match chosen.get(&dep.name) {
                    Some(existing) => {
                        if !dep.constraint.matches(&existing.version) {
                            debug!(
                                "{} needs {} but {} is selected",
                                nv, dep, existing
                            );
                            return None;
                        }
                    }
                    None => {
                        let pick =
                            choose(universe, reinstall, &dep.name, &dep.constraint, prefer)?;
                        chosen.insert(dep.name.clone(), pick.clone());
                        work.push_back(pick);
                    }
                }
            }
        }

        // Conflicts.
        for nv in chosen.values() {
            let desc = universe.find(nv)?;
            for conflict in &desc.conflicts {
                if let Some(other) = chosen.get(&conflict.name) {
                    if conflict.constraint.matches(&other.version) {
                        debug!("{} conflicts with {}", nv, other);
                        return None;
                    }
                }
            }
        }

        // Emit actions for whatever differs from the installed world.
        let mut graph = ActionGraph::new();
        let mut node_of: BTreeMap<PkgName, usize> = BTreeMap::new();
        for (name, nv) in &chosen {
            let current = installed_version(universe, reinstall, name);
            let action = match &current {
                Some(old) if old == nv => {
                    if prefer == Prefer::Latest && reinstall.contains(nv) {
                        Some(Action::Recompile(nv.clone()))
                    } else {
                        None
                    }
                }
                Some(old) => Some(Action::Change {
                    from: Some(old.clone()),
                    to: nv.clone(),
                }),
                None => Some(Action::Change {
                    from: None,
                    to: nv.clone(),
                }),
            };
            if let Some(action) = action {
                let idx = graph.add_node(action);
                node_of.insert(name.clone(), idx);
            }
        }

        // Edges: a package's action waits for its dependencies' actions.
        for (name, &idx) in &node_of {
            let desc = universe.find(&chosen[name])?;
            for dep in desc.depends.iter().chain(desc.depopts.iter()) {
                if let Some(&dep_idx) = node_of.get(&dep.name) {
                    graph.add_edge(dep_idx, idx);
                }
            }
        }

        Some(Solution {
            to_remove: Vec::new(),
            to_add: graph,
        })
    }

    /// Removal takes the target and its installed forward closure,
    /// ordered so every package leaves before anything it depends on.
    fn solve_remove(&self, universe: &Universe, request: &Request) -> Option<Solution> {
        let seeds: BTreeSet<PkgName> = request.wish_remove.iter().cloned().collect();
        let doomed_names = forward_closure(universe, &seeds);

        let installed: BTreeMap<&PkgName, &PkgDesc> = universe
            .packages
            .iter()
            .filter(|p| p.installed)
            .map(|p| (&p.nv.name, p))
            .collect();

        let mut remaining: BTreeSet<&PkgName> = doomed_names
            .iter()
            .filter(|n| installed.contains_key(n))
            .collect();

        let mut to_remove = Vec::new();
        while !remaining.is_empty() {
            let leaves: Vec<&PkgName> = remaining
                .iter()
                .filter(|n| {
                    !remaining.iter().any(|m| {
                        m != *n
                            && installed[*m]
                                .depends
                                .iter()
                                .any(|d| &d.name == **n)
                    })
                })
                .copied()
                .collect();
            if leaves.is_empty() {
                // Dependency cycle among the doomed; drain in name order.
                to_remove.extend(remaining.iter().map(|n| installed[*n].nv.clone()));
                break;
            }
            for leaf in leaves {
                to_remove.push(installed[leaf].nv.clone());
                remaining.remove(leaf);
            }
        }

        Some(Solution {
            to_remove,
            to_add: ActionGraph::new(),
        })
    }
}

/// The version of `name` that is currently installed. The universe's
/// flag hides packages pending reinstall during upgrades, so the
/// reinstall set is consulted as well.
fn installed_version(
    universe: &Universe,
    reinstall: &BTreeSet<Nv>,
    name: &PkgName,
) -> Option<Nv> {
    universe
        .versions(name)
        .into_iter()
        .find(|p| p.installed || reinstall.contains(&p.nv))
        .map(|p| p.nv.clone())
}

/// Pick a version of `name` satisfying `constraint`.
fn choose(
    universe: &Universe,
    reinstall: &BTreeSet<Nv>,
    name: &PkgName,
    constraint: &VersionConstraint,
    prefer: Prefer,
) -> Option<Nv> {
    let versions = universe.versions(name);
    if prefer == Prefer::Installed {
        if let Some(current) = versions
            .iter()
            .find(|p| (p.installed || reinstall.contains(&p.nv)) && constraint.matches(&p.nv.version))
        {
            return Some(current.nv.clone());
        }
    }
    versions
        .into_iter()
        .rev()
        .find(|p| constraint.matches(&p.nv.version))
        .map(|p| p.nv.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Dep;

    fn desc(nv: &str, depends: &[&str], installed: bool) -> PkgDesc {
        PkgDesc {
            nv: Nv::parse(nv).unwrap(),
            depends: depends.iter().map(|d| Dep::parse(d).unwrap()).collect(),
            depopts: vec![],
            conflicts: vec![],
            installed,
        }
    }

    fn wish(name: &str, constraint: VersionConstraint) -> VConstraint {
        VConstraint {
            name: PkgName::new(name),
            constraint,
        }
    }

    fn no_reinstall() -> BTreeSet<Nv> {
        BTreeSet::new()
    }

    #[test]
    fn install_pulls_dependencies() {
        let universe = Universe {
            packages: vec![
                desc("foo.1", &["bar"], false),
                desc("bar.1", &[], false),
                desc("bar.2", &[], false),
            ],
        };
        let request = Request {
            wish_install: vec![wish("foo", VersionConstraint::Exact("1".into()))],
            ..Request::default()
        };
        let solution = BasicSolver
            .resolve(&universe, &request, &no_reinstall())
            .unwrap()
            .unwrap();
        assert!(solution.to_remove.is_empty());
        let targets: Vec<String> = solution
            .to_add
            .nodes()
            .map(|a| a.target().to_string())
            .collect();
        assert!(targets.contains(&"foo.1".to_string()));
        // Latest bar satisfies the unconstrained dependency.
        assert!(targets.contains(&"bar.2".to_string()));

        // The dependency's node precedes the dependent's.
        let order = solution.to_add.topological_sort().unwrap();
        let pos = |t: &str| {
            order
                .iter()
                .position(|&i| solution.to_add.node(i).target().to_string() == t)
                .unwrap()
        };
        assert!(pos("bar.2") < pos("foo.1"));
    }

    #[test]
    fn install_keeps_installed_versions() {
        let universe = Universe {
            packages: vec![
                desc("foo.1", &["bar"], false),
                desc("bar.1", &[], true),
                desc("bar.2", &[], false),
            ],
        };
        let request = Request {
            wish_install: vec![
                wish("foo", VersionConstraint::Exact("1".into())),
                wish("bar", VersionConstraint::Any),
            ],
            ..Request::default()
        };
        let solution = BasicSolver
            .resolve(&universe, &request, &no_reinstall())
            .unwrap()
            .unwrap();
        let targets: Vec<String> = solution
            .to_add
            .nodes()
            .map(|a| a.target().to_string())
            .collect();
        // bar stays at 1: only foo is new.
        assert_eq!(targets, vec!["foo.1".to_string()]);
    }

    #[test]
    fn unsatisfiable_constraint_returns_none() {
        let universe = Universe {
            packages: vec![desc("foo.1", &["bar >= 2"], false), desc("bar.1", &[], false)],
        };
        let request = Request {
            wish_install: vec![wish("foo", VersionConstraint::Exact("1".into()))],
            ..Request::default()
        };
        assert!(BasicSolver
            .resolve(&universe, &request, &no_reinstall())
            .unwrap()
            .is_none());
    }

    #[test]
    fn conflict_returns_none() {
        let mut evil = desc("foo.1", &[], false);
        evil.conflicts = vec![Dep::parse("bar").unwrap()];
        let universe = Universe {
            packages: vec![evil, desc("bar.1", &[], true)],
        };
        let request = Request {
            wish_install: vec![
                wish("foo", VersionConstraint::Exact("1".into())),
                wish("bar", VersionConstraint::Any),
            ],
            ..Request::default()
        };
        assert!(BasicSolver
            .resolve(&universe, &request, &no_reinstall())
            .unwrap()
            .is_none());
    }

    #[test]
    fn upgrade_changes_and_recompiles() {
        let universe = Universe {
            packages: vec![
                desc("foo.1", &[], true),
                desc("foo.2", &[], false),
                // pinned in reinstall: flagged not-installed for upgrade
                desc("baz.1", &[], false),
            ],
        };
        let reinstall: BTreeSet<Nv> = [Nv::parse("baz.1").unwrap()].into_iter().collect();
        let request = Request {
            wish_upgrade: vec![
                wish("foo", VersionConstraint::GreaterOrEqual("1".into())),
                wish("baz", VersionConstraint::GreaterOrEqual("1".into())),
            ],
            ..Request::default()
        };
        let solution = BasicSolver
            .resolve(&universe, &request, &reinstall)
            .unwrap()
            .unwrap();
        let mut actions: Vec<String> =
            solution.to_add.nodes().map(|a| a.to_string()).collect();
        actions.sort();
        assert_eq!(
            actions,
            vec!["change foo.1 -> foo.2".to_string(), "recompile baz.1".to_string()]
        );
    }

    #[test]
    fn remove_orders_dependents_first() {
        // bar depends on foo; removing foo takes bar first.
        let universe = Universe {
            packages: vec![desc("foo.1", &[], true), desc("bar.1", &["foo"], true)],
        };
        let request = Request {
            wish_remove: vec![PkgName::new("foo")],
            ..Request::default()
        };
        let solution = BasicSolver
            .resolve(&universe, &request, &no_reinstall())
            .unwrap()
            .unwrap();
        let order: Vec<String> = solution.to_remove.iter().map(|nv| nv.to_string()).collect();
        assert_eq!(order, vec!["bar.1".to_string(), "foo.1".to_string()]);
        assert!(solution.to_add.is_empty());
    }
}
