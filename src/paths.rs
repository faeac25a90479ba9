// src/paths.rs

//! Filesystem layout under the smelt root
//!
//! `Layout` is a pure mapping from logical identifiers (switch, package,
//! repository, file kind) to paths. It never touches the disk.
//!
//! ```text
//! $ROOT/
//!   config                      global config
//!   aliases                     switch -> compiler map
//!   lock                        exclusive lock for write commands
//!   repo/index                  package name -> repository name
//!   repo/<r>/                   per-repository mirror
//!   pkg/<nv>.pkg                derived manifest view (symlinks)
//!   descr/<nv>                  derived description view
//!   archive/<nv>.tar.gz         derived archive view
//!   compiler/<v>.comp           derived compiler view
//!   <alias>/                    one tree per switch
//! ```

use crate::types::Nv;
use std::path::{Path, PathBuf};

/// Extension of published package manifests
pub const MANIFEST_EXT: &str = "pkg";

/// Extension of compiler descriptions
pub const COMPILER_EXT: &str = "comp";

#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Layout { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // -- global files ---------------------------------------------------------

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config")
    }

    pub fn aliases_file(&self) -> PathBuf {
        self.root.join("aliases")
    }

    pub fn lock_file(&self) -> PathBuf {
        self.root.join("lock")
    }

    // -- repository mirrors ---------------------------------------------------

    pub fn repo_root(&self) -> PathBuf {
        self.root.join("repo")
    }

    pub fn index_file(&self) -> PathBuf {
        self.repo_root().join("index")
    }

    pub fn repo_dir(&self, repo: &str) -> PathBuf {
        self.repo_root().join(repo)
    }

    pub fn repo_config_file(&self, repo: &str) -> PathBuf {
        self.repo_dir(repo).join("config")
    }

    pub fn repo_packages_dir(&self, repo: &str) -> PathBuf {
        self.repo_dir(repo).join("packages")
    }

    pub fn repo_package_dir(&self, repo: &str, nv: &Nv) -> PathBuf {
        self.repo_packages_dir(repo).join(nv.to_string())
    }

    pub fn repo_manifest_file(&self, repo: &str, nv: &Nv) -> PathBuf {
        self.repo_package_dir(repo, nv).join(MANIFEST_EXT)
    }

    pub fn repo_descr_file(&self, repo: &str, nv: &Nv) -> PathBuf {
        self.repo_package_dir(repo, nv).join("descr")
    }

    pub fn repo_url_file(&self, repo: &str, nv: &Nv) -> PathBuf {
        self.repo_package_dir(repo, nv).join("url")
    }

    pub fn repo_files_dir(&self, repo: &str, nv: &Nv) -> PathBuf {
        self.repo_package_dir(repo, nv).join("files")
    }

    pub fn repo_archives_dir(&self, repo: &str) -> PathBuf {
        self.repo_dir(repo).join("archives")
    }

    pub fn repo_archive_file(&self, repo: &str, nv: &Nv) -> PathBuf {
        self.repo_archives_dir(repo).join(format!("{}.tar.gz", nv))
    }

    pub fn repo_compilers_dir(&self, repo: &str) -> PathBuf {
        self.repo_dir(repo).join("compilers")
    }

    pub fn repo_updated_file(&self, repo: &str) -> PathBuf {
        self.repo_dir(repo).join("updated")
    }

    // -- derived global views -------------------------------------------------

    pub fn manifest_dir(&self) -> PathBuf {
        self.root.join("pkg")
    }

    pub fn manifest_file(&self, nv: &Nv) -> PathBuf {
        self.manifest_dir()
            .join(format!("{}.{}", nv, MANIFEST_EXT))
    }

    pub fn descr_dir(&self) -> PathBuf {
        self.root.join("descr")
    }

    pub fn descr_file(&self, nv: &Nv) -> PathBuf {
        self.descr_dir().join(nv.to_string())
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.root.join("archive")
    }

    pub fn archive_file(&self, nv: &Nv) -> PathBuf {
        self.archive_dir().join(format!("{}.tar.gz", nv))
    }

    pub fn compiler_dir(&self) -> PathBuf {
        self.root.join("compiler")
    }

    pub fn compiler_file(&self, version: &str) -> PathBuf {
        self.compiler_dir()
            .join(format!("{}.{}", version, COMPILER_EXT))
    }

    // -- per-switch trees -----------------------------------------------------

    pub fn switch_dir(&self, alias: &str) -> PathBuf {
        self.root.join(alias)
    }

    pub fn installed_file(&self, alias: &str) -> PathBuf {
        self.switch_dir(alias).join("installed")
    }

    pub fn reinstall_file(&self, alias: &str) -> PathBuf {
        self.switch_dir(alias).join("reinstall")
    }

    pub fn switch_config_dir(&self, alias: &str) -> PathBuf {
        self.switch_dir(alias).join("config")
    }

    pub fn pkg_config_file(&self, alias: &str, pkg: &str) -> PathBuf {
        self.switch_config_dir(alias).join(format!("{}.config", pkg))
    }

    pub fn switch_install_dir(&self, alias: &str) -> PathBuf {
        self.switch_dir(alias).join("install")
    }

    pub fn pkg_install_file(&self, alias: &str, pkg: &str) -> PathBuf {
        self.switch_install_dir(alias)
            .join(format!("{}.install", pkg))
    }

    pub fn build_root(&self, alias: &str) -> PathBuf {
        self.switch_dir(alias).join("build")
    }

    pub fn build_dir(&self, alias: &str, nv: &Nv) -> PathBuf {
        self.build_root(alias).join(nv.to_string())
    }

    pub fn lib_root(&self, alias: &str) -> PathBuf {
        self.switch_dir(alias).join("lib")
    }

    pub fn lib_dir(&self, alias: &str, pkg: &str) -> PathBuf {
        self.lib_root(alias).join(pkg)
    }

    pub fn bin_dir(&self, alias: &str) -> PathBuf {
        self.switch_dir(alias).join("bin")
    }

    pub fn doc_dir(&self, alias: &str) -> PathBuf {
        self.switch_dir(alias).join("doc")
    }

    pub fn stublibs_dir(&self, alias: &str) -> PathBuf {
        self.switch_dir(alias).join("stublibs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Nv;

    #[test]
    fn paths_compose_under_the_root() {
        let layout = Layout::new("/tmp/s");
        let nv = Nv::parse("foo.1").unwrap();

        assert_eq!(layout.config_file(), PathBuf::from("/tmp/s/config"));
        assert_eq!(
            layout.manifest_file(&nv),
            PathBuf::from("/tmp/s/pkg/foo.1.pkg")
        );
        assert_eq!(
            layout.repo_archive_file("default", &nv),
            PathBuf::from("/tmp/s/repo/default/archives/foo.1.tar.gz")
        );
        assert_eq!(
            layout.pkg_config_file("sys", "foo"),
            PathBuf::from("/tmp/s/sys/config/foo.config")
        );
        assert_eq!(
            layout.build_dir("sys", &nv),
            PathBuf::from("/tmp/s/sys/build/foo.1")
        );
        assert_eq!(
            layout.compiler_file("4.0"),
            PathBuf::from("/tmp/s/compiler/4.0.comp")
        );
    }
}
