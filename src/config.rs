// src/config.rs

//! Global configuration and line-format state files
//!
//! The structured documents (global config, repository mirror config) are
//! TOML; ordered or set-valued state (alias map, repo index, installed
//! and reinstall sets) uses plain line formats so insertion order and
//! diffs stay obvious. Every codec round-trips: `load(save(x)) == x`.

use crate::error::{Error, Result};
use crate::types::{Nv, PkgName};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::str::FromStr;

/// On-disk format version written by `init`
pub const FORMAT_VERSION: &str = "1";

// =============================================================================
// TOML helpers
// =============================================================================

pub(crate) fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)?;
    toml::from_str(&text).map_err(|e| Error::format(path, e))
}

pub(crate) fn write_toml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = toml::to_string_pretty(value).map_err(|e| Error::format(path, e))?;
    fs::write(path, text)?;
    Ok(())
}

// =============================================================================
// Global config
// =============================================================================

/// Kind of a repository backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoKind {
    Git,
    Http,
    Local,
}

impl RepoKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoKind::Git => "git",
            RepoKind::Http => "http",
            RepoKind::Local => "local",
        }
    }
}

impl FromStr for RepoKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "git" => Ok(RepoKind::Git),
            "http" => Ok(RepoKind::Http),
            "local" => Ok(RepoKind::Local),
            _ => Err(Error::parse("repository kind", s)),
        }
    }
}

impl fmt::Display for RepoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured repository. Priority is positional: earlier entries in
/// the global config win package-name bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub address: String,
    pub kind: RepoKind,
}

/// The global config at `$ROOT/config`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GlobalConfig {
    pub format_version: String,
    /// Current switch
    pub alias: String,
    /// Worker count for the action executor
    pub cores: usize,
    #[serde(rename = "repository", default)]
    pub repositories: Vec<Repository>,
}

impl GlobalConfig {
    pub fn load(path: &Path) -> Result<Self> {
        read_toml(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_toml(path, self)
    }

    pub fn repository(&self, name: &str) -> Option<&Repository> {
        self.repositories.iter().find(|r| r.name == name)
    }
}

/// Per-mirror config at `$ROOT/repo/<r>/config`, a copy of the
/// repository triple plus the last successful sync time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RepoMirrorConfig {
    pub name: String,
    pub address: String,
    pub kind: RepoKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
}

impl RepoMirrorConfig {
    pub fn from_repo(repo: &Repository) -> Self {
        RepoMirrorConfig {
            name: repo.name.clone(),
            address: repo.address.clone(),
            kind: repo.kind,
            last_update: None,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        read_toml(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_toml(path, self)
    }
}

// =============================================================================
// Alias map
// =============================================================================

/// Ordered map from switch alias to compiler version, one `alias
/// compiler` pair per line. Insertion order is lookup order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasMap {
    entries: Vec<(String, String)>,
}

impl AliasMap {
    /// Load the map; a missing file reads as empty.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(AliasMap::default()),
            Err(e) => return Err(e.into()),
        };
        let mut entries = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line.split_once(char::is_whitespace) {
                Some((alias, compiler)) => {
                    entries.push((alias.to_string(), compiler.trim().to_string()))
                }
                None => return Err(Error::format(path, format!("bad alias line: {line}"))),
            }
        }
        Ok(AliasMap { entries })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut out = String::new();
        for (alias, compiler) in &self.entries {
            out.push_str(alias);
            out.push(' ');
            out.push_str(compiler);
            out.push('\n');
        }
        fs::write(path, out)?;
        Ok(())
    }

    pub fn get(&self, alias: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(a, _)| a == alias)
            .map(|(_, c)| c.as_str())
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.get(alias).is_some()
    }

    /// Append an entry. Keys are unique: inserting an existing alias
    /// replaces its compiler in place.
    pub fn insert(&mut self, alias: &str, compiler: &str) {
        match self.entries.iter_mut().find(|(a, _)| a == alias) {
            Some(entry) => entry.1 = compiler.to_string(),
            None => self.entries.push((alias.to_string(), compiler.to_string())),
        }
    }

    pub fn remove(&mut self, alias: &str) {
        self.entries.retain(|(a, _)| a != alias);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(a, c)| (a.as_str(), c.as_str()))
    }
}

// =============================================================================
// Repo index
// =============================================================================

/// The package-name to repository-name binding at `$ROOT/repo/index`,
/// one `name repo` pair per line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoIndex {
    map: BTreeMap<PkgName, String>,
}

impl RepoIndex {
    pub fn load(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(RepoIndex::default()),
            Err(e) => return Err(e.into()),
        };
        let mut map = BTreeMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line.split_once(char::is_whitespace) {
                Some((name, repo)) => {
                    map.insert(PkgName::new(name), repo.trim().to_string());
                }
                None => return Err(Error::format(path, format!("bad index line: {line}"))),
            }
        }
        Ok(RepoIndex { map })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut out = String::new();
        for (name, repo) in &self.map {
            out.push_str(name.as_str());
            out.push(' ');
            out.push_str(repo);
            out.push('\n');
        }
        fs::write(path, out)?;
        Ok(())
    }

    pub fn get(&self, name: &PkgName) -> Option<&str> {
        self.map.get(name).map(String::as_str)
    }

    /// Bind a name to a repository unless already bound (first wins).
    pub fn bind(&mut self, name: PkgName, repo: &str) {
        self.map.entry(name).or_insert_with(|| repo.to_string());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PkgName, &str)> {
        self.map.iter().map(|(n, r)| (n, r.as_str()))
    }
}

// =============================================================================
// NV set files
// =============================================================================

/// Load a set of `name.version` lines; a missing file reads as empty.
pub fn load_nv_set(path: &Path) -> Result<BTreeSet<Nv>> {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(e) => return Err(e.into()),
    };
    let mut set = BTreeSet::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        set.insert(Nv::parse(line).map_err(|e| Error::format(path, e))?);
    }
    Ok(set)
}

/// Written via a temp file and rename: executor workers read these
/// files while the parent rewrites them.
pub fn save_nv_set(path: &Path, set: &BTreeSet<Nv>) -> Result<()> {
    let mut out = String::new();
    for nv in set {
        out.push_str(&nv.to_string());
        out.push('\n');
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, out)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_config() -> GlobalConfig {
        GlobalConfig {
            format_version: FORMAT_VERSION.to_string(),
            alias: "sys".to_string(),
            cores: 4,
            repositories: vec![
                Repository {
                    name: "default".to_string(),
                    address: "/srv/packages".to_string(),
                    kind: RepoKind::Local,
                },
                Repository {
                    name: "extra".to_string(),
                    address: "https://pkg.example.org".to_string(),
                    kind: RepoKind::Http,
                },
            ],
        }
    }

    #[test]
    fn global_config_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config");
        let config = sample_config();
        config.save(&path).unwrap();
        let loaded = GlobalConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        // Priority is positional.
        assert_eq!(loaded.repositories[0].name, "default");
    }

    #[test]
    fn alias_map_round_trip_preserves_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("aliases");

        let mut map = AliasMap::default();
        map.insert("zz", "4.1");
        map.insert("aa", "4.0");
        map.save(&path).unwrap();

        let loaded = AliasMap::load(&path).unwrap();
        assert_eq!(loaded, map);
        let order: Vec<&str> = loaded.iter().map(|(a, _)| a).collect();
        assert_eq!(order, vec!["zz", "aa"]);
        assert_eq!(loaded.get("aa"), Some("4.0"));
    }

    #[test]
    fn alias_map_missing_reads_empty() {
        let dir = tempdir().unwrap();
        let map = AliasMap::load(&dir.path().join("nope")).unwrap();
        assert_eq!(map, AliasMap::default());
    }

    #[test]
    fn repo_index_first_bind_wins() {
        let mut index = RepoIndex::default();
        index.bind(PkgName::new("foo"), "default");
        index.bind(PkgName::new("foo"), "extra");
        assert_eq!(index.get(&PkgName::new("foo")), Some("default"));
    }

    #[test]
    fn repo_index_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index");
        let mut index = RepoIndex::default();
        index.bind(PkgName::new("foo"), "default");
        index.bind(PkgName::new("bar"), "extra");
        index.save(&path).unwrap();
        assert_eq!(RepoIndex::load(&path).unwrap(), index);
    }

    #[test]
    fn nv_set_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("installed");
        let mut set = BTreeSet::new();
        set.insert(Nv::parse("foo.1").unwrap());
        set.insert(Nv::parse("base.4.0").unwrap());
        save_nv_set(&path, &set).unwrap();
        assert_eq!(load_nv_set(&path).unwrap(), set);
        assert_eq!(load_nv_set(&dir.path().join("missing")).unwrap().len(), 0);
    }
}
