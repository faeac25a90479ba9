// src/repository/mod.rs

//! Repository backends and archive fetching
//!
//! Three repository kinds share one capability interface:
//! `init`/`update`/`download`/`upload`. The mirror under
//! `$ROOT/repo/<name>/` is the source of truth for everything a
//! repository publishes; the global `pkg/`, `descr/`, `archive/` and
//! `compiler/` directories are derived views rebuilt by `sync::update`.
//!
//! Each backend's `update` also writes the mirror's `updated` file: the
//! set of packages whose manifest changed since the previous pull,
//! computed by snapshotting manifest digests around the refresh.

mod git;
mod http;
mod local;
pub mod sync;

pub use git::GitBackend;
pub use http::HttpBackend;
pub use local::LocalBackend;

use crate::config::{save_nv_set, RepoKind, Repository};
use crate::error::{Error, Result};
use crate::manifest::UrlFile;
use crate::paths::Layout;
use crate::state::State;
use crate::types::Nv;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Operations the core invokes on a repository.
pub trait RepoBackend {
    /// Create the local mirror for a newly configured repository.
    fn init(&self, layout: &Layout, repo: &Repository) -> Result<()>;

    /// Refresh the local mirror and write its `updated` file.
    fn update(&self, layout: &Layout, repo: &Repository) -> Result<()>;

    /// Make sure the mirror holds the archive for `nv`; returns its path.
    fn download(&self, layout: &Layout, repo: &Repository, nv: &Nv) -> Result<PathBuf>;

    /// Publish local mirror additions back to the repository.
    fn upload(&self, layout: &Layout, repo: &Repository) -> Result<()>;
}

pub fn backend(kind: RepoKind) -> &'static dyn RepoBackend {
    match kind {
        RepoKind::Git => &GitBackend,
        RepoKind::Http => &HttpBackend,
        RepoKind::Local => &LocalBackend,
    }
}

/// Fetch the archive for `nv` through its repository and refresh the
/// global `archive/` link. Returns the global path.
pub fn download(state: &State, nv: &Nv) -> Result<PathBuf> {
    let global = state.layout.archive_file(nv);
    if global.symlink_metadata().is_ok() {
        return Ok(global);
    }
    let repo = state
        .repository_of(&nv.name)
        .ok_or_else(|| Error::UnknownPackage(nv.to_string()))?;
    let mirror = backend(repo.kind).download(&state.layout, repo, nv)?;
    fs::create_dir_all(state.layout.archive_dir())?;
    relink(&mirror, &global)?;
    Ok(global)
}

// =============================================================================
// Shared helpers
// =============================================================================

/// Point `link` at `target`, replacing any previous entry.
pub(crate) fn relink(target: &Path, link: &Path) -> Result<()> {
    if link.symlink_metadata().is_ok() {
        fs::remove_file(link)?;
    }
    std::os::unix::fs::symlink(target, link)?;
    Ok(())
}

/// Resolve a `file://` or plain-path address to a local path.
pub(crate) fn local_path(address: &str) -> PathBuf {
    PathBuf::from(address.strip_prefix("file://").unwrap_or(address))
}

/// Fetch an address (http(s), file:// or plain path) into `dest`.
pub(crate) fn fetch_address(address: &str, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    if address.starts_with("http://") || address.starts_with("https://") {
        info!("downloading {}", address);
        let response = reqwest::blocking::get(address).map_err(|e| Error::Download {
            url: address.to_string(),
            reason: e.to_string(),
        })?;
        if !response.status().is_success() {
            return Err(Error::Download {
                url: address.to_string(),
                reason: format!("HTTP status {}", response.status()),
            });
        }
        let bytes = response.bytes().map_err(|e| Error::Download {
            url: address.to_string(),
            reason: e.to_string(),
        })?;
        fs::write(dest, &bytes)?;
    } else {
        let src = local_path(address);
        fs::copy(&src, dest)?;
    }
    Ok(())
}

/// Verify a file against a hex SHA-256 digest.
pub(crate) fn verify_checksum(path: &Path, expected: &str) -> Result<()> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let actual = format!("{:x}", hasher.finalize());
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(Error::Checksum {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            actual,
        })
    }
}

/// Make sure the mirror archive for `nv` exists, fetching it through the
/// package's url file if needed. Shared by every backend's `download`.
pub(crate) fn ensure_archive(layout: &Layout, repo: &Repository, nv: &Nv) -> Result<PathBuf> {
    let archive = layout.repo_archive_file(&repo.name, nv);
    if archive.exists() {
        return Ok(archive);
    }
    let url_file = layout.repo_url_file(&repo.name, nv);
    if !url_file.exists() {
        return Err(Error::Download {
            url: format!("{}/{}", repo.name, nv),
            reason: "no archive in the mirror and no url file".to_string(),
        });
    }
    let url = UrlFile::load(&url_file)?;
    fetch_address(&url.archive, &archive)?;
    if let Some(checksum) = &url.checksum {
        verify_checksum(&archive, checksum)?;
    }
    Ok(archive)
}

/// Digest of every manifest in a mirror, keyed by package. Used to
/// compute the `updated` set across a refresh.
pub(crate) fn mirror_snapshot(layout: &Layout, repo: &Repository) -> Result<BTreeMap<Nv, String>> {
    let mut snapshot = BTreeMap::new();
    for nv in mirror_packages(layout, &repo.name)? {
        let manifest = layout.repo_manifest_file(&repo.name, &nv);
        if let Ok(bytes) = fs::read(&manifest) {
            snapshot.insert(nv, format!("{:x}", Sha256::digest(&bytes)));
        }
    }
    Ok(snapshot)
}

/// Enumerate the `<nv>` package directories of a mirror.
pub(crate) fn mirror_packages(layout: &Layout, repo: &str) -> Result<Vec<Nv>> {
    let dir = layout.repo_packages_dir(repo);
    let mut out = Vec::new();
    let entries = match fs::read_dir(&dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if let Ok(nv) = Nv::parse(name) {
                out.push(nv);
            }
        }
    }
    out.sort();
    Ok(out)
}

/// Run a mirror refresh and record which packages changed.
pub(crate) fn refresh_with<F>(layout: &Layout, repo: &Repository, pull: F) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    let before = mirror_snapshot(layout, repo)?;
    pull()?;
    let after = mirror_snapshot(layout, repo)?;

    let updated: BTreeSet<Nv> = after
        .iter()
        .filter(|(nv, digest)| before.get(*nv) != Some(*digest))
        .map(|(nv, _)| nv.clone())
        .collect();
    debug!(
        "repository {}: {} package(s) updated",
        repo.name,
        updated.len()
    );
    save_nv_set(&layout.repo_updated_file(&repo.name), &updated)?;
    Ok(())
}

/// Recursively copy a directory tree.
pub(crate) fn copy_dir_all(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;
    for entry in walkdir::WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| Error::Message(e.to_string()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| Error::Message(e.to_string()))?;
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
