// src/repository/local.rs

//! Local (directory) repository backend
//!
//! The address is a directory (optionally `file://`-prefixed) laid out
//! like a mirror: `packages/`, `archives/`, `compilers/`. Updating
//! replaces the mirrored metadata wholesale so deletions propagate;
//! archives are copied lazily on download.

use super::{copy_dir_all, ensure_archive, refresh_with, RepoBackend};
use crate::config::Repository;
use crate::error::{Error, Result};
use crate::paths::Layout;
use crate::types::Nv;
use std::fs;
use std::path::PathBuf;
use tracing::info;

pub struct LocalBackend;

impl RepoBackend for LocalBackend {
    fn init(&self, layout: &Layout, repo: &Repository) -> Result<()> {
        let source = super::local_path(&repo.address);
        if !source.is_dir() {
            return Err(Error::Download {
                url: repo.address.clone(),
                reason: "not a directory".to_string(),
            });
        }
        fs::create_dir_all(layout.repo_dir(&repo.name))?;
        self.update(layout, repo)
    }

    fn update(&self, layout: &Layout, repo: &Repository) -> Result<()> {
        let source = super::local_path(&repo.address);
        if !source.is_dir() {
            return Err(Error::Download {
                url: repo.address.clone(),
                reason: "not a directory".to_string(),
            });
        }
        refresh_with(layout, repo, || {
            for sub in ["packages", "compilers"] {
                let from = source.join(sub);
                let to = layout.repo_dir(&repo.name).join(sub);
                if to.exists() {
                    fs::remove_dir_all(&to)?;
                }
                if from.is_dir() {
                    copy_dir_all(&from, &to)?;
                } else {
                    fs::create_dir_all(&to)?;
                }
            }
            info!("refreshed mirror of {}", repo.name);
            Ok(())
        })
    }

    fn download(&self, layout: &Layout, repo: &Repository, nv: &Nv) -> Result<PathBuf> {
        let mirror = layout.repo_archive_file(&repo.name, nv);
        if mirror.exists() {
            return Ok(mirror);
        }
        let source = super::local_path(&repo.address)
            .join("archives")
            .join(format!("{}.tar.gz", nv));
        if source.exists() {
            fs::create_dir_all(layout.repo_archives_dir(&repo.name))?;
            fs::copy(&source, &mirror)?;
            return Ok(mirror);
        }
        ensure_archive(layout, repo, nv)
    }

    fn upload(&self, layout: &Layout, repo: &Repository) -> Result<()> {
        let target = super::local_path(&repo.address);
        for sub in ["packages", "archives", "compilers"] {
            let from = layout.repo_dir(&repo.name).join(sub);
            if from.is_dir() {
                copy_dir_all(&from, &target.join(sub))?;
            }
        }
        info!("published mirror of {} back to {}", repo.name, repo.address);
        Ok(())
    }
}
