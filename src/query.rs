// src/query.rs

//! Read-only query surfaces: `list`, `info`, `config ...`,
//! `remote list`, `compiler-list`
//!
//! Rendering functions return the text to print so the command layer
//! stays a thin shell and tests can assert on output.

use crate::error::{Error, Result};
use crate::executor;
use crate::manifest::{BuildConfig, SectionConfig};
use crate::paths::COMPILER_EXT;
use crate::state::State;
use crate::subst;
use crate::types::{FullVariable, Nv, PkgName};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// `list`: every known package with its installed version (or `--`)
/// and synopsis, padded to column widths computed over the set.
pub fn list(state: &State) -> Result<String> {
    let mut names: BTreeSet<PkgName> = state.available.iter().map(|nv| nv.name.clone()).collect();
    names.extend(state.installed.iter().map(|nv| nv.name.clone()));

    let mut rows = Vec::new();
    for name in names {
        let installed = state.installed_version(&name);
        let version = installed
            .map(|nv| nv.version.to_string())
            .unwrap_or_else(|| "--".to_string());
        let shown: Option<&Nv> = installed.or_else(|| state.latest(&name));
        let synopsis = match shown {
            Some(nv) => state.descr(nv)?.synopsis,
            None => String::new(),
        };
        rows.push((name.to_string(), version, synopsis));
    }

    let name_width = rows.iter().map(|r| r.0.len()).max().unwrap_or(0);
    let version_width = rows.iter().map(|r| r.1.len()).max().unwrap_or(0);
    let mut out = String::new();
    for (name, version, synopsis) in rows {
        writeln!(
            out,
            "{:name_width$}  {:version_width$}  {}",
            name, version, synopsis
        )
        .ok();
    }
    Ok(out)
}

/// `info PKG`: versions, sections and the full description.
pub fn info(state: &State, package: &str) -> Result<String> {
    let name = PkgName::new(package);
    let installed = state.installed_version(&name);
    let available: Vec<&Nv> = state
        .available_versions(&name)
        .into_iter()
        .filter(|nv| Some(*nv) != installed)
        .collect();
    if installed.is_none() && available.is_empty() {
        return Err(Error::UnknownPackage(package.to_string()));
    }

    let shown = installed.or_else(|| state.latest(&name));
    let mut out = String::new();
    writeln!(out, "package: {}", name).ok();
    if let Some(nv) = installed {
        writeln!(out, "installed-version: {}", nv.version).ok();
    }
    if !available.is_empty() {
        let versions: Vec<String> = available.iter().map(|nv| nv.version.to_string()).collect();
        writeln!(out, "available-versions: {}", versions.join(", ")).ok();
    }
    if let Some(nv) = shown {
        if let Ok(manifest) = state.manifest(nv) {
            if !manifest.libraries.is_empty() {
                writeln!(out, "libraries: {}", manifest.libraries.join(", ")).ok();
            }
            if !manifest.syntax.is_empty() {
                writeln!(out, "syntax: {}", manifest.syntax.join(", ")).ok();
            }
        }
        let descr = state.descr(nv)?;
        writeln!(out, "description: {}", descr.synopsis).ok();
        if !descr.body.is_empty() {
            writeln!(out, "{}", descr.body).ok();
        }
    }
    Ok(out)
}

/// `config env`: the composed environment, `KEY=VALUE` per line.
pub fn config_env(state: &State) -> Result<String> {
    let env = executor::compose_env(state)?;
    let mut out = String::new();
    for (key, value) in env {
        writeln!(out, "{}={}", key, value).ok();
    }
    Ok(out)
}

/// `config list-vars`: every variable of every installed package.
pub fn config_list_vars(state: &State) -> Result<String> {
    let mut out = String::new();
    for nv in &state.installed {
        let config = BuildConfig::load_opt(
            &state
                .layout
                .pkg_config_file(&state.alias, nv.name.as_str()),
        )?;
        for (var, value) in &config.variables {
            writeln!(out, "{}:{} {}", nv.name, var, value).ok();
        }
        for section in &config.sections {
            for (var, value) in &section.variables {
                writeln!(out, "{}:{}:{} {}", nv.name, section.name, var, value).ok();
            }
        }
    }
    Ok(out)
}

/// `config variable V`
pub fn config_variable(state: &State, variable: &str) -> Result<String> {
    let var = FullVariable::parse(variable)?;
    let value = subst::eval_variable(state, &var)?;
    Ok(format!("{}\n", value))
}

/// `config subst F...`: apply file substitution to each template.
pub fn config_subst(state: &State, files: &[String]) -> Result<()> {
    for file in files {
        subst::substitute_file(state, Path::new(file))?;
    }
    Ok(())
}

/// `config includes [-r] N...`: `-I <libdir>` flags, transitively
/// closed over dependencies with `-r`.
pub fn config_includes(state: &State, recursive: bool, names: &[String]) -> Result<String> {
    let mut order: Vec<PkgName> = Vec::new();
    let mut seen: BTreeSet<PkgName> = BTreeSet::new();
    let mut work: VecDeque<PkgName> = names.iter().map(|n| PkgName::new(n.as_str())).collect();

    while let Some(name) = work.pop_front() {
        if !seen.insert(name.clone()) {
            continue;
        }
        let nv = state
            .installed_version(&name)
            .ok_or_else(|| Error::NotInstalled(name.to_string()))?;
        if recursive {
            let manifest = state.manifest(nv)?;
            for dep in &manifest.depends {
                work.push_back(dep.name.clone());
            }
        }
        order.push(name);
    }

    let flags: Vec<String> = order
        .iter()
        .map(|name| {
            format!(
                "-I {}",
                state.layout.lib_dir(&state.alias, name.as_str()).display()
            )
        })
        .collect();
    Ok(format!("{}\n", flags.join(" ")))
}

/// Flag family selected by `config compil`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileMode {
    Bytecomp,
    Asmcomp,
    Bytelink,
    Asmlink,
}

impl CompileMode {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "bytecomp" => Ok(CompileMode::Bytecomp),
            "asmcomp" => Ok(CompileMode::Asmcomp),
            "bytelink" => Ok(CompileMode::Bytelink),
            "asmlink" => Ok(CompileMode::Asmlink),
            _ => Err(Error::parse("compilation mode", s)),
        }
    }

    fn variable(&self) -> &'static str {
        match self {
            CompileMode::Bytecomp => "bytecomp",
            CompileMode::Asmcomp => "asmcomp",
            CompileMode::Bytelink => "bytelink",
            CompileMode::Asmlink => "asmlink",
        }
    }
}

/// `config compil MODE pkg:section...`: close the given sections plus
/// the compiler's required sections over `requires`, order them
/// topologically, and emit the compiler's flags followed by each
/// section's flags for the mode.
pub fn config_compil(state: &State, mode: CompileMode, sections: &[String]) -> Result<String> {
    // Every section exported by an installed package, with its owner.
    let mut exported: BTreeMap<String, Vec<(PkgName, SectionConfig)>> = BTreeMap::new();
    for nv in &state.installed {
        let config = BuildConfig::load_opt(
            &state
                .layout
                .pkg_config_file(&state.alias, nv.name.as_str()),
        )?;
        for section in config.sections {
            exported
                .entry(section.name.clone())
                .or_default()
                .push((nv.name.clone(), section));
        }
    }

    let lookup = |name: &str| -> Result<SectionConfig> {
        match exported.get(name).map(Vec::as_slice) {
            Some([(_, section)]) => Ok(section.clone()),
            Some(_) => Err(Error::NameCollision(name.to_string())),
            None => Err(Error::UnresolvedRequire(name.to_string())),
        }
    };

    // Seeds: explicit pkg:section arguments, then the compiler's own
    // required sections.
    let mut work: VecDeque<SectionConfig> = VecDeque::new();
    for spec in sections {
        let (pkg, section_name) = spec
            .split_once(':')
            .ok_or_else(|| Error::parse("full section", spec.as_str()))?;
        let name = PkgName::new(pkg);
        if !state.is_installed(&name) {
            return Err(Error::NotInstalled(pkg.to_string()));
        }
        let config = BuildConfig::load_opt(&state.layout.pkg_config_file(&state.alias, pkg))?;
        let section = config
            .section(section_name)
            .ok_or_else(|| Error::UnresolvedRequire(section_name.to_string()))?;
        work.push_back(section.clone());
    }
    let descr = state.compiler_descr()?;
    for required in &descr.requires {
        work.push_back(lookup(required)?);
    }

    // Least fixed point over requires.
    let mut closed: BTreeMap<String, SectionConfig> = BTreeMap::new();
    while let Some(section) = work.pop_front() {
        if closed.contains_key(&section.name) {
            continue;
        }
        for required in &section.requires {
            if !closed.contains_key(required) {
                work.push_back(lookup(required)?);
            }
        }
        closed.insert(section.name.clone(), section);
    }

    // Topological order, requirements first.
    let mut order: Vec<String> = Vec::new();
    let mut visited: BTreeSet<String> = BTreeSet::new();
    let names: Vec<String> = closed.keys().cloned().collect();
    for name in names {
        visit(&closed, &mut visited, &mut order, &name);
    }

    let mut flags: Vec<String> = match mode {
        CompileMode::Bytecomp => descr.bytecomp.clone(),
        CompileMode::Asmcomp => descr.asmcomp.clone(),
        CompileMode::Bytelink => descr.bytelink.clone(),
        CompileMode::Asmlink => descr.asmlink.clone(),
    };
    for name in order {
        if let Some(value) = closed[&name].variables.get(mode.variable()) {
            flags.push(value.to_string());
        }
    }
    Ok(format!("{}\n", flags.join(" ")))
}

fn visit(
    closed: &BTreeMap<String, SectionConfig>,
    visited: &mut BTreeSet<String>,
    order: &mut Vec<String>,
    name: &str,
) {
    if !visited.insert(name.to_string()) {
        return;
    }
    if let Some(section) = closed.get(name) {
        for required in &section.requires {
            visit(closed, visited, order, required);
        }
        order.push(name.to_string());
    }
}

/// `remote list`
pub fn remote_list(state: &State) -> Result<String> {
    let repos = state.repositories();
    let name_width = repos.iter().map(|r| r.name.len()).max().unwrap_or(0);
    let address_width = repos.iter().map(|r| r.address.len()).max().unwrap_or(0);
    let mut out = String::new();
    for repo in repos {
        writeln!(
            out,
            "{:name_width$}  {:address_width$}  {}",
            repo.name, repo.address, repo.kind
        )
        .ok();
    }
    Ok(out)
}

/// `compiler-list`: every compiler description in the global view.
pub fn compiler_list(state: &State) -> Result<String> {
    let dir = state.layout.compiler_dir();
    let mut versions = Vec::new();
    let entries = match fs::read_dir(&dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(String::new());
        }
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(COMPILER_EXT) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            versions.push(stem.to_string());
        }
    }
    versions.sort();
    let mut out = String::new();
    for version in versions {
        if version == state.compiler {
            writeln!(out, "{} *", version).ok();
        } else {
            writeln!(out, "{}", version).ok();
        }
    }
    Ok(out)
}
