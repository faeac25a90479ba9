// src/manifest.rs

//! Per-package metadata documents
//!
//! - `Manifest`: what a repository publishes for one name.version:
//!   dependencies, build and remove commands, substitution templates,
//!   exported library/syntax sections.
//! - `InstallDescriptor`: the artifacts to copy after a successful build.
//! - `BuildConfig`: the runtime-queryable variables and sections a
//!   package installs alongside itself.
//! - `CompilerDescr`: how to obtain and build one compiler release.
//! - `UrlFile` / `Descr`: archive address and human description.
//!
//! All documents are TOML except `Descr`, which is plain text (first
//! line synopsis, remainder body).

use crate::config::{read_toml, write_toml};
use crate::error::{Error, Result};
use crate::types::{Dep, Nv, PkgName, PkgVersion, VariableValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

// =============================================================================
// Package manifest
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: PkgName,
    pub version: PkgVersion,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<Dep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depopts: Vec<Dep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<Dep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove: Vec<Vec<String>>,
    /// Base names of `%{..}%` templates: `b` is produced from `b.in`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub substs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub libraries: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub syntax: Vec<String>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let manifest: Manifest = read_toml(path)?;
        if !manifest.name.is_valid() {
            return Err(Error::format(
                path,
                format!("invalid package name {}", manifest.name),
            ));
        }
        Ok(manifest)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_toml(path, self)
    }

    pub fn nv(&self) -> Nv {
        Nv {
            name: self.name.clone(),
            version: self.version.clone(),
        }
    }
}

// =============================================================================
// Install descriptor
// =============================================================================

/// One artifact to copy. `src` is relative to the build directory;
/// `dst` defaults to the source basename for `bin` entries and is the
/// absolute destination (required) for `misc` entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyPair {
    pub src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstallDescriptor {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lib: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bin: Vec<CopyPair>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub misc: Vec<CopyPair>,
}

impl InstallDescriptor {
    pub fn load(path: &Path) -> Result<Self> {
        read_toml(path)
    }

    /// Load the descriptor; a missing file reads as empty.
    pub fn load_opt(path: &Path) -> Result<Self> {
        match fs::metadata(path) {
            Ok(_) => Self::load(path),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(InstallDescriptor::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_toml(path, self)
    }
}

// =============================================================================
// Build config
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Library,
    Syntax,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionConfig {
    pub name: String,
    pub kind: SectionKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, VariableValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, VariableValue>,
    #[serde(default, rename = "section", skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<SectionConfig>,
}

impl BuildConfig {
    pub fn load(path: &Path) -> Result<Self> {
        read_toml(path)
    }

    /// Load the config; a missing file reads as empty.
    pub fn load_opt(path: &Path) -> Result<Self> {
        match fs::metadata(path) {
            Ok(_) => Self::load(path),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BuildConfig::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_toml(path, self)
    }

    pub fn section(&self, name: &str) -> Option<&SectionConfig> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn section_names(&self, kind: SectionKind) -> Vec<&str> {
        self.sections
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| s.name.as_str())
            .collect()
    }
}

// =============================================================================
// Compiler description
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CompilerDescr {
    /// Source archive address; absent for preinstalled compilers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub configure: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub make: Vec<String>,
    /// Lines `NAME op VALUE` with op one of `=`, `+=`, `=+`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    /// Library sections every build in the switch links against.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
    /// Packages installed when a switch on this compiler is created.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<String>,
    #[serde(default)]
    pub preinstalled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bytecomp: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub asmcomp: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bytelink: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub asmlink: Vec<String>,
}

impl CompilerDescr {
    pub fn load(path: &Path) -> Result<Self> {
        read_toml(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_toml(path, self)
    }
}

// =============================================================================
// Url file and description
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlFile {
    pub archive: String,
    /// Hex SHA-256 of the archive, verified after download when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl UrlFile {
    pub fn load(path: &Path) -> Result<Self> {
        read_toml(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_toml(path, self)
    }
}

/// Human description: first line synopsis, rest body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Descr {
    pub synopsis: String,
    pub body: String,
}

impl Descr {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(Descr::from_text(&text))
    }

    /// Load the description; a missing file reads as empty.
    pub fn load_opt(path: &Path) -> Result<Self> {
        match fs::metadata(path) {
            Ok(_) => Self::load(path),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Descr::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_text(text: &str) -> Self {
        match text.split_once('\n') {
            Some((first, rest)) => Descr {
                synopsis: first.trim_end().to_string(),
                body: rest.trim_end().to_string(),
            },
            None => Descr {
                synopsis: text.trim_end().to_string(),
                body: String::new(),
            },
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut text = self.synopsis.clone();
        text.push('\n');
        if !self.body.is_empty() {
            text.push_str(&self.body);
            text.push('\n');
        }
        fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VersionConstraint;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"
name = "foo"
version = "1.2"
depends = ["bar >= 1", "baz"]
build = [["./configure", "--prefix", "%{prefix}%"], ["make"]]
remove = [["make", "uninstall"]]
substs = ["foo.config"]
libraries = ["foo"]
"#;

    #[test]
    fn manifest_parses_and_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pkg");
        fs::write(&path, SAMPLE).unwrap();

        let m = Manifest::load(&path).unwrap();
        assert_eq!(m.nv().to_string(), "foo.1.2");
        assert_eq!(m.depends.len(), 2);
        assert_eq!(
            m.depends[0].constraint,
            VersionConstraint::GreaterOrEqual(PkgVersion::new("1"))
        );
        assert_eq!(m.build[0][2], "%{prefix}%");

        let back = dir.path().join("pkg2");
        m.save(&back).unwrap();
        assert_eq!(Manifest::load(&back).unwrap(), m);
    }

    #[test]
    fn manifest_rejects_dotted_names() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pkg");
        fs::write(&path, "name = \"a.b\"\nversion = \"1\"\n").unwrap();
        assert!(Manifest::load(&path).is_err());
    }

    #[test]
    fn install_descriptor_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("foo.install");
        let d = InstallDescriptor {
            lib: vec!["foo.cma".to_string()],
            bin: vec![CopyPair {
                src: "main.exe".to_string(),
                dst: Some("foo".to_string()),
            }],
            misc: vec![],
        };
        d.save(&path).unwrap();
        assert_eq!(InstallDescriptor::load(&path).unwrap(), d);
        assert_eq!(
            InstallDescriptor::load_opt(&dir.path().join("missing")).unwrap(),
            InstallDescriptor::default()
        );
    }

    #[test]
    fn build_config_sections() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("foo.config");
        fs::write(
            &path,
            r#"
[variables]
enabled = true
flag = "-x"

[[section]]
name = "foo"
kind = "library"
requires = ["bar"]
[section.variables]
asmcomp = "-I ."
"#,
        )
        .unwrap();

        let c = BuildConfig::load(&path).unwrap();
        assert_eq!(c.variables["enabled"], VariableValue::Bool(true));
        assert_eq!(c.section_names(SectionKind::Library), vec!["foo"]);
        let s = c.section("foo").unwrap();
        assert_eq!(s.requires, vec!["bar"]);
        assert_eq!(
            s.variables["asmcomp"],
            VariableValue::String("-I .".to_string())
        );

        let back = dir.path().join("back.config");
        c.save(&back).unwrap();
        assert_eq!(BuildConfig::load(&back).unwrap(), c);
    }

    #[test]
    fn compiler_descr_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("4.0.comp");
        let c = CompilerDescr {
            source: Some("https://example.org/c-4.0.tar.gz".to_string()),
            configure: vec!["-prefix".to_string(), "%{prefix}%".to_string()],
            make: vec!["world".to_string()],
            env: vec!["LD_LIBRARY_PATH += %{lib}%/stublibs".to_string()],
            requires: vec!["stdlib".to_string()],
            packages: vec!["base-unix".to_string()],
            ..CompilerDescr::default()
        };
        c.save(&path).unwrap();
        assert_eq!(CompilerDescr::load(&path).unwrap(), c);
    }

    #[test]
    fn descr_splits_synopsis_and_body() {
        let d = Descr::from_text("A tool\n\nLong text\nhere\n");
        assert_eq!(d.synopsis, "A tool");
        assert_eq!(d.body, "\nLong text\nhere");

        let d = Descr::from_text("only a synopsis");
        assert_eq!(d.synopsis, "only a synopsis");
        assert_eq!(d.body, "");
    }
}
