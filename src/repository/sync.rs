// src/repository/sync.rs

//! Repository synchronization and remote management
//!
//! `update` is the single rebuilder of every derived view:
//!
//! 1. pull each configured repository, in priority order;
//! 2. recompute the package -> repository index, first bind wins;
//! 3. surface each repository's `updated` set, marking packages
//!    installed in the current switch, and fold it into every switch's
//!    reinstall set (intersected with that switch's installed set);
//! 4. rebuild the global manifest and description symlink views;
//! 5. rebuild the global compiler view;
//! 6. reload and verify: manifests must match their published
//!    name.version, and every dependency must resolve to some
//!    available package.
//!
//! Running `update` twice in a row is a no-op on the index, the derived
//! views, and the reinstall sets.

use super::{backend, mirror_packages, relink};
use crate::config::{
    load_nv_set, save_nv_set, AliasMap, GlobalConfig, RepoIndex, RepoMirrorConfig, Repository,
};
use crate::error::{Error, Result};
use crate::manifest::Manifest;
use crate::paths::{Layout, COMPILER_EXT};
use crate::state::State;
use crate::types::PkgName;
use chrono::Utc;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Synchronize every configured repository and rebuild the derived
/// global views.
pub fn update(root: &Path) -> Result<()> {
    let layout = Layout::new(root);
    let config_file = layout.config_file();
    if !config_file.exists() {
        return Err(Error::Uninitialized(root.to_path_buf()));
    }
    let config = GlobalConfig::load(&config_file)?;
    let aliases = AliasMap::load(&layout.aliases_file())?;

    // 1. Pull mirrors.
    for repo in &config.repositories {
        info!("updating repository {}", repo.name);
        backend(repo.kind).update(&layout, repo)?;
        let mut mirror = RepoMirrorConfig::from_repo(repo);
        mirror.last_update = Some(Utc::now());
        mirror.save(&layout.repo_config_file(&repo.name))?;
    }

    // 2. Recompute the index, repositories consulted in declared order.
    let mut index = RepoIndex::default();
    for repo in &config.repositories {
        for nv in mirror_packages(&layout, &repo.name)? {
            index.bind(nv.name, &repo.name);
        }
    }
    fs::create_dir_all(layout.repo_root())?;
    index.save(&layout.index_file())?;

    // 3. Surface updated packages and grow the reinstall sets.
    let current_installed = load_nv_set(&layout.installed_file(&config.alias))?;
    for repo in &config.repositories {
        let updated = load_nv_set(&layout.repo_updated_file(&repo.name))?;
        if updated.is_empty() {
            continue;
        }
        println!("Updated packages from {}:", repo.name);
        for nv in &updated {
            if current_installed.contains(nv) {
                println!("  {} *", nv);
            } else {
                println!("  {}", nv);
            }
        }
        for (alias, _) in aliases.iter() {
            let installed = load_nv_set(&layout.installed_file(alias))?;
            let mut reinstall = load_nv_set(&layout.reinstall_file(alias))?;
            let before = reinstall.len();
            reinstall.extend(updated.intersection(&installed).cloned());
            if reinstall.len() != before {
                debug!(
                    "switch {}: {} package(s) pending reinstall",
                    alias,
                    reinstall.len()
                );
                save_nv_set(&layout.reinstall_file(alias), &reinstall)?;
            }
        }
    }

    // 4. Rebuild the derived manifest and description views.
    clear_dir(&layout.manifest_dir())?;
    clear_dir(&layout.descr_dir())?;
    for (name, repo) in index.iter() {
        for nv in mirror_packages(&layout, repo)? {
            if &nv.name != name {
                continue;
            }
            relink(
                &layout.repo_manifest_file(repo, &nv),
                &layout.manifest_file(&nv),
            )?;
            let descr = layout.repo_descr_file(repo, &nv);
            if descr.exists() {
                relink(&descr, &layout.descr_file(&nv))?;
            } else {
                warn!("package {} has no description", nv);
            }
        }
    }

    // 5. Rebuild the compiler view; earlier repositories win.
    clear_dir(&layout.compiler_dir())?;
    for repo in &config.repositories {
        let dir = layout.repo_compilers_dir(&repo.name);
        let entries = match fs::read_dir(&dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(COMPILER_EXT) {
                continue;
            }
            let link = layout.compiler_dir().join(entry.file_name());
            if link.symlink_metadata().is_err() {
                relink(&path, &link)?;
            }
        }
    }

    // 6. Verify the new world is consistent.
    verify_consistency(root)?;
    Ok(())
}

fn clear_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Every available manifest must match its published name.version, and
/// every dependency must name an available package.
fn verify_consistency(root: &Path) -> Result<()> {
    let state = State::load(root)?;
    let names: BTreeSet<&PkgName> = state.available.iter().map(|nv| &nv.name).collect();
    for nv in &state.available {
        let manifest = state.manifest(nv)?;
        if manifest.name != nv.name || manifest.version != nv.version {
            return Err(Error::InconsistentManifest {
                file: state.layout.manifest_file(nv),
                declared: manifest.nv().to_string(),
                published: nv.to_string(),
            });
        }
        for dep in manifest.depends.iter().chain(manifest.depopts.iter()) {
            if !names.contains(&dep.name) {
                return Err(Error::InconsistentRepo {
                    nv: nv.to_string(),
                    dep: dep.name.to_string(),
                });
            }
        }
    }
    Ok(())
}

// =============================================================================
// Remote management
// =============================================================================

/// Add a repository: initialize its mirror, record it in the config,
/// then rebuild the world.
pub fn add_remote(root: &Path, repo: Repository) -> Result<()> {
    let layout = Layout::new(root);
    let config_file = layout.config_file();
    if !config_file.exists() {
        return Err(Error::Uninitialized(root.to_path_buf()));
    }
    let mut config = GlobalConfig::load(&config_file)?;
    if config.repository(&repo.name).is_some() {
        return Err(Error::Message(format!(
            "repository {} already exists",
            repo.name
        )));
    }
    backend(repo.kind).init(&layout, &repo)?;
    config.repositories.push(repo);
    config.save(&config_file)?;
    update(root)
}

/// Remove a repository from the config. The first entry carrying the
/// name goes; identically-named-but-different entries, would there ever
/// be any, stay.
pub fn remove_remote(root: &Path, name: &str) -> Result<()> {
    let layout = Layout::new(root);
    let config_file = layout.config_file();
    if !config_file.exists() {
        return Err(Error::Uninitialized(root.to_path_buf()));
    }
    let mut config = GlobalConfig::load(&config_file)?;
    let position = config
        .repositories
        .iter()
        .position(|r| r.name == name)
        .ok_or_else(|| Error::UnknownRepo(name.to_string()))?;
    config.repositories.remove(position);
    config.save(&config_file)?;
    info!("removed repository {}", name);
    Ok(())
}

// =============================================================================
// Upload
// =============================================================================

/// Publish a package (manifest, description, archive) into a repository
/// mirror, push it upstream, and rebuild the world.
pub fn upload(
    root: &Path,
    manifest_path: &Path,
    descr_path: &Path,
    archive_path: &Path,
    repo_name: Option<&str>,
) -> Result<()> {
    let layout = Layout::new(root);
    let config_file = layout.config_file();
    if !config_file.exists() {
        return Err(Error::Uninitialized(root.to_path_buf()));
    }
    let config = GlobalConfig::load(&config_file)?;
    let repo = match repo_name {
        Some(name) => config
            .repository(name)
            .ok_or_else(|| Error::UnknownRepo(name.to_string()))?,
        None => config
            .repositories
            .first()
            .ok_or_else(|| Error::Message("no repository configured".to_string()))?,
    };

    let manifest = Manifest::load(manifest_path)?;
    let nv = manifest.nv();
    info!("uploading {} to {}", nv, repo.name);

    let pkg_dir = layout.repo_package_dir(&repo.name, &nv);
    fs::create_dir_all(&pkg_dir)?;
    fs::copy(manifest_path, layout.repo_manifest_file(&repo.name, &nv))?;
    fs::copy(descr_path, layout.repo_descr_file(&repo.name, &nv))?;
    fs::create_dir_all(layout.repo_archives_dir(&repo.name))?;
    fs::copy(archive_path, layout.repo_archive_file(&repo.name, &nv))?;

    backend(repo.kind).upload(&layout, repo)?;
    update(root)
}
