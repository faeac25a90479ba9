// src/resolver/mod.rs

//! Solver interface and request construction
//!
//! The core never decides version selection itself: it converts the
//! available world into a `Universe`, phrases the user's wish as a
//! `Request`, and hands both to a `Solver`. The reply is a `Solution`:
//! an ordered removal list (leaves first) and a DAG of install or
//! recompile actions whose topological order is the legal execution
//! sequence.
//!
//! `BasicSolver` in `engine` satisfies the contract with a closure
//! construction; a SAT-based implementation can slot in behind the same
//! trait.

pub mod engine;
pub mod graph;

pub use engine::BasicSolver;
pub use graph::ActionGraph;

use crate::error::Result;
use crate::state::State;
use crate::types::{Dep, Nv, PkgName, VersionConstraint};
use std::collections::BTreeSet;
use std::fmt;

/// One package in the solver's world.
#[derive(Debug, Clone)]
pub struct PkgDesc {
    pub nv: Nv,
    pub depends: Vec<Dep>,
    pub depopts: Vec<Dep>,
    pub conflicts: Vec<Dep>,
    pub installed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Universe {
    pub packages: Vec<PkgDesc>,
}

impl Universe {
    /// All versions of one name, ascending.
    pub fn versions(&self, name: &PkgName) -> Vec<&PkgDesc> {
        let mut v: Vec<&PkgDesc> = self
            .packages
            .iter()
            .filter(|p| &p.nv.name == name)
            .collect();
        v.sort_by(|a, b| a.nv.version.cmp(&b.nv.version));
        v
    }

    pub fn find(&self, nv: &Nv) -> Option<&PkgDesc> {
        self.packages.iter().find(|p| &p.nv == nv)
    }
}

/// A named version constraint in a wish list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VConstraint {
    pub name: PkgName,
    pub constraint: VersionConstraint,
}

impl fmt::Display for VConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.constraint {
            VersionConstraint::Any => write!(f, "{}", self.name),
            c => write!(f, "{} {}", self.name, c),
        }
    }
}

/// A user-level wish handed to the solver.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub wish_install: Vec<VConstraint>,
    pub wish_remove: Vec<PkgName>,
    pub wish_upgrade: Vec<VConstraint>,
}

/// One node of the add DAG. `Delete` never appears here: removals
/// travel in `Solution::to_remove`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Change { from: Option<Nv>, to: Nv },
    Recompile(Nv),
}

impl Action {
    /// The package this action produces.
    pub fn target(&self) -> &Nv {
        match self {
            Action::Change { to, .. } => to,
            Action::Recompile(nv) => nv,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Change { from: None, to } => write!(f, "install {}", to),
            Action::Change {
                from: Some(old),
                to,
            } => write!(f, "change {} -> {}", old, to),
            Action::Recompile(nv) => write!(f, "recompile {}", nv),
        }
    }
}

/// The solver's reply.
#[derive(Debug, Default)]
pub struct Solution {
    /// Ordered leaves-first: dependents come before their dependencies.
    pub to_remove: Vec<Nv>,
    pub to_add: ActionGraph,
}

impl Solution {
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }
}

/// The contract an external solver must satisfy.
pub trait Solver {
    /// `None` means the request is unsatisfiable; the operation then
    /// stops with an informational message and no state change.
    fn resolve(
        &self,
        universe: &Universe,
        request: &Request,
        reinstall: &BTreeSet<Nv>,
    ) -> Result<Option<Solution>>;

    /// Seeds plus every package transitively depending on one of them.
    fn filter_forward_dependencies(
        &self,
        universe: &Universe,
        seeds: &BTreeSet<PkgName>,
    ) -> BTreeSet<PkgName>;

    /// Seeds plus everything they transitively depend on.
    fn filter_backward_dependencies(
        &self,
        universe: &Universe,
        seeds: &BTreeSet<PkgName>,
    ) -> BTreeSet<PkgName>;
}

// =============================================================================
// Universe and request construction
// =============================================================================

/// How the `installed` flag of the universe is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InstalledFlag {
    /// Installed packages count as installed.
    Plain,
    /// Packages pending reinstall count as not installed, which makes
    /// an upgrade rebuild them.
    ExceptReinstall,
}

fn universe(state: &State, flag: InstalledFlag) -> Result<Universe> {
    let mut packages = Vec::with_capacity(state.available.len());
    for nv in &state.available {
        let manifest = state.manifest(nv)?;
        let installed = match flag {
            InstalledFlag::Plain => state.installed.contains(nv),
            InstalledFlag::ExceptReinstall => {
                state.installed.contains(nv) && !state.reinstall.contains(nv)
            }
        };
        packages.push(PkgDesc {
            nv: nv.clone(),
            depends: manifest.depends,
            depopts: manifest.depopts,
            conflicts: manifest.conflicts,
            installed,
        });
    }
    Ok(Universe { packages })
}

/// Resolve an install of explicit targets: the targets pinned exactly,
/// everything already installed pinned to any version.
pub fn resolve_install(
    state: &State,
    solver: &dyn Solver,
    targets: &[Nv],
) -> Result<Option<Solution>> {
    let universe = universe(state, InstalledFlag::Plain)?;
    let mut wish_install: Vec<VConstraint> = targets
        .iter()
        .map(|nv| VConstraint {
            name: nv.name.clone(),
            constraint: VersionConstraint::Exact(nv.version.clone()),
        })
        .collect();
    for nv in &state.installed {
        if targets.iter().any(|t| t.name == nv.name) {
            continue;
        }
        wish_install.push(VConstraint {
            name: nv.name.clone(),
            constraint: VersionConstraint::Any,
        });
    }
    let request = Request {
        wish_install,
        ..Request::default()
    };
    solver.resolve(&universe, &request, &state.reinstall)
}

/// Resolve a removal: everything installed except the target's forward
/// closure stays pinned; the target goes.
pub fn resolve_remove(
    state: &State,
    solver: &dyn Solver,
    target: &PkgName,
) -> Result<Option<Solution>> {
    let universe = universe(state, InstalledFlag::Plain)?;
    let seeds: BTreeSet<PkgName> = [target.clone()].into_iter().collect();
    let doomed = solver.filter_forward_dependencies(&universe, &seeds);
    let wish_install = state
        .installed
        .iter()
        .filter(|nv| !doomed.contains(&nv.name))
        .map(|nv| VConstraint {
            name: nv.name.clone(),
            constraint: VersionConstraint::Exact(nv.version.clone()),
        })
        .collect();
    let request = Request {
        wish_install,
        wish_remove: vec![target.clone()],
        ..Request::default()
    };
    solver.resolve(&universe, &request, &state.reinstall)
}

/// Resolve an upgrade of everything installed to the latest available.
pub fn resolve_upgrade(state: &State, solver: &dyn Solver) -> Result<Option<Solution>> {
    let universe = universe(state, InstalledFlag::ExceptReinstall)?;
    let mut wish_upgrade = Vec::new();
    for nv in &state.installed {
        match state.latest(&nv.name) {
            Some(latest) if latest.version >= nv.version => {
                wish_upgrade.push(VConstraint {
                    name: nv.name.clone(),
                    constraint: VersionConstraint::GreaterOrEqual(nv.version.clone()),
                });
            }
            _ => {}
        }
    }
    let request = Request {
        wish_upgrade,
        ..Request::default()
    };
    solver.resolve(&universe, &request, &state.reinstall)
}

/// Resolve the population of a fresh switch: the compiler's required
/// packages, plus (when cloning) the previous switch's installed set,
/// each pinned to the latest available version of its name.
pub fn resolve_switch(
    state: &State,
    solver: &dyn Solver,
    compiler_packages: &[PkgName],
    clone_set: Option<&BTreeSet<Nv>>,
) -> Result<Option<Solution>> {
    let universe = universe(state, InstalledFlag::Plain)?;
    let mut names: BTreeSet<PkgName> = compiler_packages.iter().cloned().collect();
    if let Some(clone) = clone_set {
        names.extend(clone.iter().map(|nv| nv.name.clone()));
    }
    let mut wish_install = Vec::new();
    for name in names {
        let Some(latest) = state.latest(&name) else {
            // A cloned package the repositories no longer publish is
            // skipped rather than failing the whole switch.
            tracing::warn!("{} is not available anymore, skipping", name);
            continue;
        };
        wish_install.push(VConstraint {
            name: name.clone(),
            constraint: VersionConstraint::Exact(latest.version.clone()),
        });
    }
    for nv in &state.installed {
        if wish_install.iter().any(|w| w.name == nv.name) {
            continue;
        }
        wish_install.push(VConstraint {
            name: nv.name.clone(),
            constraint: VersionConstraint::Any,
        });
    }
    let request = Request {
        wish_install,
        ..Request::default()
    };
    solver.resolve(&universe, &request, &state.reinstall)
}
