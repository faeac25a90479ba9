// tests/common/mod.rs

//! Shared test fixtures: scratch roots and local-kind repositories
//! publishing real (tiny) tar.gz source archives.

// Not every helper is used by every test binary.
#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use smelt::config::{load_nv_set, GlobalConfig};
use smelt::{Layout, Nv};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct Fixture {
    /// Keep alive for the test's duration.
    #[allow(dead_code)]
    pub scratch: TempDir,
    pub root: PathBuf,
    /// Source directory the `local` repository points at.
    pub repo: PathBuf,
}

pub fn fixture() -> Fixture {
    let scratch = tempfile::tempdir().unwrap();
    let root = scratch.path().join("root");
    let repo = scratch.path().join("repo-src");
    for sub in ["packages", "archives", "compilers"] {
        fs::create_dir_all(repo.join(sub)).unwrap();
    }
    Fixture { scratch, root, repo }
}

impl Fixture {
    pub fn repo_address(&self) -> String {
        format!("file://{}", self.repo.display())
    }

    /// `init` against the fixture repository, switch `sys`, compiler 4.0.
    pub fn init(&self) {
        smelt::cli::cmd_init(
            &self.root,
            "default",
            &self.repo_address(),
            smelt::config::RepoKind::Local,
            "sys",
            "4.0",
            true,
        )
        .unwrap();
    }

    pub fn layout(&self) -> Layout {
        Layout::new(&self.root)
    }

    pub fn installed(&self, alias: &str) -> BTreeSet<Nv> {
        load_nv_set(&self.layout().installed_file(alias)).unwrap()
    }

    pub fn reinstall(&self, alias: &str) -> BTreeSet<Nv> {
        load_nv_set(&self.layout().reinstall_file(alias)).unwrap()
    }

    pub fn set_cores(&self, cores: usize) {
        let config_file = self.layout().config_file();
        let mut config = GlobalConfig::load(&config_file).unwrap();
        config.cores = cores;
        config.save(&config_file).unwrap();
    }
}

/// Publish one package into the fixture repository.
pub fn add_package(repo: &Path, nv: &str, manifest: &str, descr: &str, files: &[(&str, &str)]) {
    let pkg_dir = repo.join("packages").join(nv);
    fs::create_dir_all(&pkg_dir).unwrap();
    fs::write(pkg_dir.join("pkg"), manifest).unwrap();
    fs::write(pkg_dir.join("descr"), descr).unwrap();
    write_archive(
        &repo.join("archives").join(format!("{nv}.tar.gz")),
        files,
    );
}

/// A package whose build succeeds trivially and installs one shell
/// script as a binary.
pub fn simple_package(repo: &Path, name: &str, version: &str, depends: &[&str]) {
    let deps: Vec<String> = depends.iter().map(|d| format!("\"{d}\"")).collect();
    let manifest = format!(
        "name = \"{name}\"\nversion = \"{version}\"\ndepends = [{}]\nbuild = [[\"sh\", \"-c\", \"true\"]]\n",
        deps.join(", ")
    );
    let install = format!("bin = [{{ src = \"{name}.sh\", dst = \"{name}\" }}]\n");
    let script = format!("#!/bin/sh\necho {name}\n");
    add_package(
        repo,
        &format!("{name}.{version}"),
        &manifest,
        &format!("The {name} package\n"),
        &[
            (&format!("{name}.install"), install.as_str()),
            (&format!("{name}.sh"), script.as_str()),
        ],
    );
}

pub fn write_archive(path: &Path, files: &[(&str, &str)]) {
    let file = fs::File::create(path).unwrap();
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    for (name, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, *name, content.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
}
