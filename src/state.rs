// src/state.rs

//! Immutable per-command state snapshot
//!
//! Every command starts by loading a `State`: the global config, the
//! current switch, the ordered repositories, the repo index, and the
//! available/installed/reinstall sets. Loading does no network I/O and
//! no writes; missing optional files read as empty. All mutations go
//! through file writes and require a fresh `load` to observe, which is
//! also how executor workers see the parent's progress.

use crate::config::{load_nv_set, AliasMap, GlobalConfig, RepoIndex, Repository};
use crate::error::{Error, Result};
use crate::manifest::{CompilerDescr, Descr, Manifest};
use crate::paths::{Layout, MANIFEST_EXT};
use crate::types::{Nv, PkgName};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

#[derive(Debug)]
pub struct State {
    pub layout: Layout,
    pub config: GlobalConfig,
    /// Current switch
    pub alias: String,
    /// Compiler version the current switch is bound to
    pub compiler: String,
    pub aliases: AliasMap,
    pub index: RepoIndex,
    pub available: BTreeSet<Nv>,
    pub installed: BTreeSet<Nv>,
    pub reinstall: BTreeSet<Nv>,
}

impl State {
    pub fn load(root: &Path) -> Result<State> {
        let layout = Layout::new(root);
        let config_file = layout.config_file();
        if !config_file.exists() {
            return Err(Error::Uninitialized(root.to_path_buf()));
        }
        let config = GlobalConfig::load(&config_file)?;
        let aliases = AliasMap::load(&layout.aliases_file())?;
        let compiler = aliases
            .get(&config.alias)
            .ok_or_else(|| {
                Error::format(
                    layout.aliases_file(),
                    format!("current switch {} has no compiler entry", config.alias),
                )
            })?
            .to_string();
        let index = RepoIndex::load(&layout.index_file())?;
        let available = enumerate_available(&layout)?;
        let installed = load_nv_set(&layout.installed_file(&config.alias))?;
        let reinstall = load_nv_set(&layout.reinstall_file(&config.alias))?;
        let alias = config.alias.clone();

        Ok(State {
            layout,
            config,
            alias,
            compiler,
            aliases,
            index,
            available,
            installed,
            reinstall,
        })
    }

    pub fn repositories(&self) -> &[Repository] {
        &self.config.repositories
    }

    /// The repository a package name is bound to in the index.
    pub fn repository_of(&self, name: &PkgName) -> Option<&Repository> {
        self.index
            .get(name)
            .and_then(|repo| self.config.repository(repo))
    }

    pub fn installed_version(&self, name: &PkgName) -> Option<&Nv> {
        self.installed.iter().find(|nv| &nv.name == name)
    }

    pub fn is_installed(&self, name: &PkgName) -> bool {
        self.installed_version(name).is_some()
    }

    /// Available versions of one name, ascending.
    pub fn available_versions(&self, name: &PkgName) -> Vec<&Nv> {
        self.available.iter().filter(|nv| &nv.name == name).collect()
    }

    /// Latest available version of one name.
    pub fn latest(&self, name: &PkgName) -> Option<&Nv> {
        self.available_versions(name).into_iter().next_back()
    }

    pub fn is_available_name(&self, name: &PkgName) -> bool {
        self.available.iter().any(|nv| &nv.name == name)
    }

    /// Load the manifest of an available package from the global view.
    pub fn manifest(&self, nv: &Nv) -> Result<Manifest> {
        let path = self.layout.manifest_file(nv);
        if !path.exists() {
            return Err(Error::UnknownPackage(nv.to_string()));
        }
        Manifest::load(&path)
    }

    /// Load the description of a package; missing reads as empty.
    pub fn descr(&self, nv: &Nv) -> Result<Descr> {
        Descr::load_opt(&self.layout.descr_file(nv))
    }

    /// Description of the current compiler. A compiler with no `.comp`
    /// file is treated as preinstalled with an empty description.
    pub fn compiler_descr(&self) -> Result<CompilerDescr> {
        let path = self.layout.compiler_file(&self.compiler);
        if path.exists() {
            CompilerDescr::load(&path)
        } else {
            Ok(CompilerDescr {
                preinstalled: true,
                ..CompilerDescr::default()
            })
        }
    }
}

/// Enumerate the global manifest view: every `<nv>.pkg` entry.
fn enumerate_available(layout: &Layout) -> Result<BTreeSet<Nv>> {
    let dir = layout.manifest_dir();
    let mut set = BTreeSet::new();
    let entries = match fs::read_dir(&dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(set),
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(MANIFEST_EXT) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        match Nv::parse(stem) {
            Ok(nv) => {
                set.insert(nv);
            }
            Err(_) => {
                tracing::warn!("ignoring stray manifest {}", path.display());
            }
        }
    }
    Ok(set)
}
