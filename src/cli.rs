// src/cli.rs

//! Command handlers
//!
//! One function per CLI command. Write-path commands take the exclusive
//! root lock for their whole duration; read-only queries run without
//! it. Everything loads a fresh `State`, works through the library
//! modules, and persists through the file layer.

use crate::config::{RepoKind, Repository};
use crate::error::{Error, Result};
use crate::executor::{self, ExecOptions};
use crate::lock::RootLock;
use crate::paths::Layout;
use crate::query::{self, CompileMode};
use crate::repository::sync;
use crate::resolver::{self, BasicSolver};
use crate::state::State;
use crate::switch;
use crate::types::{Nv, PkgName, BASE_PACKAGE};
use std::path::Path;
use tracing::info;

// =============================================================================
// Write-path commands
// =============================================================================

pub fn cmd_init(
    root: &Path,
    repo_name: &str,
    repo_address: &str,
    repo_kind: RepoKind,
    alias: &str,
    compiler: &str,
    yes: bool,
) -> Result<()> {
    let layout = Layout::new(root);
    if layout.config_file().exists() {
        return Err(Error::AlreadyInitialized(root.to_path_buf()));
    }
    let _lock = RootLock::acquire(&layout)?;
    let repo = Repository {
        name: repo_name.to_string(),
        address: repo_address.to_string(),
        kind: repo_kind,
    };
    switch::init(root, repo, alias, compiler, &ExecOptions { assume_yes: yes })?;
    println!("Initialized {} on switch {} ({})", root.display(), alias, compiler);
    Ok(())
}

pub fn cmd_update(root: &Path) -> Result<()> {
    let _lock = RootLock::acquire(&Layout::new(root))?;
    sync::update(root)
}

pub fn cmd_install(root: &Path, packages: &[String], yes: bool) -> Result<()> {
    let _lock = RootLock::acquire(&Layout::new(root))?;
    let state = State::load(root)?;

    let mut targets: Vec<Nv> = Vec::new();
    for arg in packages {
        let name = PkgName::new(arg.as_str());
        if state.is_available_name(&name) || state.is_installed(&name) {
            if let Some(nv) = state.installed_version(&name) {
                return Err(Error::AlreadyInstalled(
                    name.to_string(),
                    nv.version.to_string(),
                ));
            }
            let latest = state
                .latest(&name)
                .ok_or_else(|| Error::UnknownPackage(arg.clone()))?;
            targets.push(latest.clone());
        } else if arg.contains('.') {
            // A dotted argument that names no package falls back to
            // literal name.version parsing.
            let nv = Nv::parse(arg)?;
            if !state.available.contains(&nv) {
                return Err(Error::UnknownPackage(arg.clone()));
            }
            if state.installed.contains(&nv) {
                return Err(Error::AlreadyInstalled(
                    nv.name.to_string(),
                    nv.version.to_string(),
                ));
            }
            targets.push(nv);
        } else {
            return Err(Error::UnknownPackage(arg.clone()));
        }
    }

    let opts = ExecOptions { assume_yes: yes };
    match resolver::resolve_install(&state, &BasicSolver, &targets)? {
        Some(solution) => executor::apply_solution(&state, &solution, &opts),
        None => Err(Error::NoSolution),
    }
}

pub fn cmd_remove(root: &Path, package: &str, yes: bool) -> Result<()> {
    let _lock = RootLock::acquire(&Layout::new(root))?;
    let state = State::load(root)?;

    if package == BASE_PACKAGE {
        // The compiler-config package is reserved.
        return Err(Error::UnknownPackage(package.to_string()));
    }
    let name = PkgName::new(package);
    if !state.is_installed(&name) {
        return Err(Error::NotInstalled(package.to_string()));
    }

    let opts = ExecOptions { assume_yes: yes };
    match resolver::resolve_remove(&state, &BasicSolver, &name)? {
        Some(solution) => executor::apply_solution(&state, &solution, &opts),
        None => Err(Error::NoSolution),
    }
}

pub fn cmd_upgrade(root: &Path, yes: bool) -> Result<()> {
    let _lock = RootLock::acquire(&Layout::new(root))?;
    let state = State::load(root)?;
    let opts = ExecOptions { assume_yes: yes };
    match resolver::resolve_upgrade(&state, &BasicSolver)? {
        Some(solution) => executor::apply_solution(&state, &solution, &opts),
        None => Err(Error::NoSolution),
    }
}

pub fn cmd_upload(
    root: &Path,
    manifest: &Path,
    descr: &Path,
    archive: &Path,
    repo: Option<&str>,
) -> Result<()> {
    let _lock = RootLock::acquire(&Layout::new(root))?;
    sync::upload(root, manifest, descr, archive, repo)
}

pub fn cmd_remote_add(root: &Path, name: &str, address: &str, kind: RepoKind) -> Result<()> {
    let _lock = RootLock::acquire(&Layout::new(root))?;
    sync::add_remote(
        root,
        Repository {
            name: name.to_string(),
            address: address.to_string(),
            kind,
        },
    )
}

pub fn cmd_remote_rm(root: &Path, name: &str) -> Result<()> {
    let _lock = RootLock::acquire(&Layout::new(root))?;
    sync::remove_remote(root, name)
}

pub fn cmd_switch(
    root: &Path,
    clone: bool,
    alias: &str,
    compiler: Option<&str>,
    yes: bool,
) -> Result<()> {
    let _lock = RootLock::acquire(&Layout::new(root))?;
    switch::switch_to(root, clone, alias, compiler, &ExecOptions { assume_yes: yes })
}

// =============================================================================
// Read-only commands
// =============================================================================

pub fn cmd_list(root: &Path) -> Result<()> {
    let state = State::load(root)?;
    print!("{}", query::list(&state)?);
    Ok(())
}

pub fn cmd_info(root: &Path, package: &str) -> Result<()> {
    let state = State::load(root)?;
    print!("{}", query::info(&state, package)?);
    Ok(())
}

pub fn cmd_remote_list(root: &Path) -> Result<()> {
    let state = State::load(root)?;
    print!("{}", query::remote_list(&state)?);
    Ok(())
}

pub fn cmd_compiler_list(root: &Path) -> Result<()> {
    let state = State::load(root)?;
    print!("{}", query::compiler_list(&state)?);
    Ok(())
}

pub fn cmd_config_env(root: &Path) -> Result<()> {
    let state = State::load(root)?;
    print!("{}", query::config_env(&state)?);
    Ok(())
}

pub fn cmd_config_list_vars(root: &Path) -> Result<()> {
    let state = State::load(root)?;
    print!("{}", query::config_list_vars(&state)?);
    Ok(())
}

pub fn cmd_config_variable(root: &Path, variable: &str) -> Result<()> {
    let state = State::load(root)?;
    print!("{}", query::config_variable(&state, variable)?);
    Ok(())
}

pub fn cmd_config_subst(root: &Path, files: &[String]) -> Result<()> {
    let state = State::load(root)?;
    query::config_subst(&state, files)?;
    info!("substituted {} file(s)", files.len());
    Ok(())
}

pub fn cmd_config_includes(root: &Path, recursive: bool, names: &[String]) -> Result<()> {
    let state = State::load(root)?;
    print!("{}", query::config_includes(&state, recursive, names)?);
    Ok(())
}

pub fn cmd_config_compil(root: &Path, mode: &str, sections: &[String]) -> Result<()> {
    let state = State::load(root)?;
    let mode = CompileMode::parse(mode)?;
    print!("{}", query::config_compil(&state, mode, sections)?);
    Ok(())
}
