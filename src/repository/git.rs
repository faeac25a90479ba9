// src/repository/git.rs

//! Git repository backend
//!
//! The mirror is a clone of the repository; updating fast-forwards it,
//! uploading commits and pushes whatever the client published into the
//! mirror. All git work shells out to the `git` binary.

use super::{ensure_archive, refresh_with, RepoBackend};
use crate::config::Repository;
use crate::error::{Error, Result};
use crate::paths::Layout;
use crate::types::Nv;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

pub struct GitBackend;

fn git(cwd: &Path, args: &[&str]) -> Result<()> {
    debug!("git {}", args.join(" "));
    let output = Command::new("git").args(args).current_dir(cwd).output()?;
    if output.status.success() {
        Ok(())
    } else {
        Err(Error::Message(format!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}

impl RepoBackend for GitBackend {
    fn init(&self, layout: &Layout, repo: &Repository) -> Result<()> {
        let mirror = layout.repo_dir(&repo.name);
        std::fs::create_dir_all(layout.repo_root())?;
        let mirror_str = mirror
            .to_str()
            .ok_or_else(|| Error::Message(format!("non-UTF8 mirror path for {}", repo.name)))?
            .to_string();
        let repo_root = layout.repo_root();
        refresh_with(layout, repo, || {
            git(&repo_root, &["clone", &repo.address, &mirror_str])
        })
    }

    fn update(&self, layout: &Layout, repo: &Repository) -> Result<()> {
        let mirror = layout.repo_dir(&repo.name);
        refresh_with(layout, repo, || {
            git(&mirror, &["pull", "--ff-only"])?;
            info!("refreshed mirror of {}", repo.name);
            Ok(())
        })
    }

    fn download(&self, layout: &Layout, repo: &Repository, nv: &Nv) -> Result<PathBuf> {
        ensure_archive(layout, repo, nv)
    }

    fn upload(&self, layout: &Layout, repo: &Repository) -> Result<()> {
        let mirror = layout.repo_dir(&repo.name);
        git(&mirror, &["add", "-A"])?;
        git(&mirror, &["commit", "-m", "publish packages"])?;
        git(&mirror, &["push"])?;
        info!("pushed mirror of {}", repo.name);
        Ok(())
    }
}
