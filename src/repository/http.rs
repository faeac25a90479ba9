// src/repository/http.rs

//! HTTP repository backend
//!
//! The address serves `index.tar.gz`, a tarball of the repository's
//! `packages/` and `compilers/` trees. Updating fetches and re-extracts
//! it; archives are fetched one by one on demand, either from the
//! repository's `archives/` area or from the package's url file.

use super::{ensure_archive, fetch_address, refresh_with, RepoBackend};
use crate::config::Repository;
use crate::error::{Error, Result};
use crate::paths::Layout;
use crate::types::Nv;
use flate2::read::GzDecoder;
use std::fs;
use std::path::PathBuf;
use tracing::info;

pub struct HttpBackend;

impl RepoBackend for HttpBackend {
    fn init(&self, layout: &Layout, repo: &Repository) -> Result<()> {
        fs::create_dir_all(layout.repo_dir(&repo.name))?;
        self.update(layout, repo)
    }

    fn update(&self, layout: &Layout, repo: &Repository) -> Result<()> {
        let index_url = format!("{}/index.tar.gz", repo.address.trim_end_matches('/'));
        refresh_with(layout, repo, || {
            let mirror = layout.repo_dir(&repo.name);
            let tarball = mirror.join("index.tar.gz");
            fetch_address(&index_url, &tarball)?;
            for sub in ["packages", "compilers"] {
                let dir = mirror.join(sub);
                if dir.exists() {
                    fs::remove_dir_all(&dir)?;
                }
            }
            let file = fs::File::open(&tarball)?;
            tar::Archive::new(GzDecoder::new(file))
                .unpack(&mirror)
                .map_err(|e| Error::Download {
                    url: index_url.clone(),
                    reason: format!("bad index tarball: {e}"),
                })?;
            fs::remove_file(&tarball)?;
            info!("refreshed mirror of {}", repo.name);
            Ok(())
        })
    }

    fn download(&self, layout: &Layout, repo: &Repository, nv: &Nv) -> Result<PathBuf> {
        let mirror = layout.repo_archive_file(&repo.name, nv);
        if mirror.exists() {
            return Ok(mirror);
        }
        let remote = format!(
            "{}/archives/{}.tar.gz",
            repo.address.trim_end_matches('/'),
            nv
        );
        if fetch_address(&remote, &mirror).is_ok() {
            return Ok(mirror);
        }
        ensure_archive(layout, repo, nv)
    }

    fn upload(&self, _layout: &Layout, repo: &Repository) -> Result<()> {
        Err(Error::Message(format!(
            "repository {} is read-only (http)",
            repo.name
        )))
    }
}
