// src/types.rs

//! Core identifiers: package names, versions, name.version pairs,
//! dependency atoms, and package-qualified variables
//!
//! All identifiers are thin wrappers over strings with total orderings
//! and string round-trips. `Nv` parsing splits at the *first* dot: the
//! package name charset excludes `.`, so `base.4.0` always reads as
//! (`base`, `4.0`).

use crate::error::{Error, Result};
use crate::version;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Name of the synthetic package every switch carries. It records the
/// switch's prefix/lib/bin/doc variables and can never be removed.
pub const BASE_PACKAGE: &str = "base";

// =============================================================================
// Package names and versions
// =============================================================================

/// A package name: `[A-Za-z0-9_-]+`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PkgName(String);

impl PkgName {
    pub fn new(name: impl Into<String>) -> Self {
        PkgName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the name matches the published charset. Checked when
    /// manifests load, not at construction: user input is allowed to
    /// carry dots so it can fall back to literal `Nv` parsing.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
            && self
                .0
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    }
}

impl fmt::Display for PkgName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PkgName {
    fn from(s: &str) -> Self {
        PkgName(s.to_string())
    }
}

/// An opaque version string, ordered by `version::compare`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PkgVersion(String);

impl PkgVersion {
    pub fn new(version: impl Into<String>) -> Self {
        PkgVersion(version.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PkgVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PkgVersion {
    fn from(s: &str) -> Self {
        PkgVersion(s.to_string())
    }
}

impl Ord for PkgVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        // Tie-break on the raw string so Ord stays consistent with Eq
        // when two spellings compare equal ("4.0" vs "4.00").
        version::compare(&self.0, &other.0).then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for PkgVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// =============================================================================
// Name.version pairs
// =============================================================================

/// A (name, version) pair, printed `name.version`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Nv {
    pub name: PkgName,
    pub version: PkgVersion,
}

impl Nv {
    pub fn new(name: impl Into<PkgName>, version: impl Into<PkgVersion>) -> Self {
        Nv {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Parse `name.version`, splitting at the first dot.
    pub fn parse(s: &str) -> Result<Self> {
        match s.split_once('.') {
            Some((name, version)) if !name.is_empty() && !version.is_empty() => {
                Ok(Nv::new(name, version))
            }
            _ => Err(Error::parse("package name.version", s)),
        }
    }
}

impl fmt::Display for Nv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.version)
    }
}

// =============================================================================
// Version constraints and dependency atoms
// =============================================================================

/// A constraint against a package version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    Any,
    Exact(PkgVersion),
    GreaterThan(PkgVersion),
    GreaterOrEqual(PkgVersion),
    LessThan(PkgVersion),
    LessOrEqual(PkgVersion),
    NotEqual(PkgVersion),
}

impl VersionConstraint {
    pub fn matches(&self, v: &PkgVersion) -> bool {
        match self {
            VersionConstraint::Any => true,
            VersionConstraint::Exact(w) => v.cmp(w) == Ordering::Equal,
            VersionConstraint::GreaterThan(w) => v.cmp(w) == Ordering::Greater,
            VersionConstraint::GreaterOrEqual(w) => v.cmp(w) != Ordering::Less,
            VersionConstraint::LessThan(w) => v.cmp(w) == Ordering::Less,
            VersionConstraint::LessOrEqual(w) => v.cmp(w) != Ordering::Greater,
            VersionConstraint::NotEqual(w) => v.cmp(w) != Ordering::Equal,
        }
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionConstraint::Any => Ok(()),
            VersionConstraint::Exact(v) => write!(f, "= {}", v),
            VersionConstraint::GreaterThan(v) => write!(f, "> {}", v),
            VersionConstraint::GreaterOrEqual(v) => write!(f, ">= {}", v),
            VersionConstraint::LessThan(v) => write!(f, "< {}", v),
            VersionConstraint::LessOrEqual(v) => write!(f, "<= {}", v),
            VersionConstraint::NotEqual(v) => write!(f, "!= {}", v),
        }
    }
}

/// A dependency atom: a name and an optional version constraint,
/// written `"name"`, `"name >= 1.2"`, `"name = 2"`, ...
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dep {
    pub name: PkgName,
    pub constraint: VersionConstraint,
}

impl Dep {
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        let name = match parts.next() {
            Some(n) => PkgName::new(n),
            None => return Err(Error::parse("dependency", s)),
        };
        let constraint = match (parts.next(), parts.next()) {
            (None, _) => VersionConstraint::Any,
            (Some(op), Some(v)) => {
                let v = PkgVersion::new(v);
                match op {
                    "=" => VersionConstraint::Exact(v),
                    ">" => VersionConstraint::GreaterThan(v),
                    ">=" => VersionConstraint::GreaterOrEqual(v),
                    "<" => VersionConstraint::LessThan(v),
                    "<=" => VersionConstraint::LessOrEqual(v),
                    "!=" => VersionConstraint::NotEqual(v),
                    _ => return Err(Error::parse("dependency", s)),
                }
            }
            (Some(_), None) => return Err(Error::parse("dependency", s)),
        };
        if parts.next().is_some() {
            return Err(Error::parse("dependency", s));
        }
        Ok(Dep { name, constraint })
    }
}

impl fmt::Display for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.constraint {
            VersionConstraint::Any => write!(f, "{}", self.name),
            c => write!(f, "{} {}", self.name, c),
        }
    }
}

impl Serialize for Dep {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Dep {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Dep::parse(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Variables
// =============================================================================

/// A package-qualified variable: `pkg:var` or `pkg:section:var`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FullVariable {
    pub package: PkgName,
    pub section: Option<String>,
    pub variable: String,
}

impl FullVariable {
    /// Parse a variable reference. A bare name with no qualifier
    /// resolves against the sentinel `base` package, which is what
    /// compiler descriptions rely on (`%{prefix}%`, `%{lib}%`).
    pub fn parse(s: &str) -> Result<Self> {
        if s.chars().any(char::is_whitespace) {
            return Err(Error::parse("variable", s));
        }
        let parts: Vec<&str> = s.split(':').collect();
        let var = match parts.as_slice() {
            [var] => FullVariable {
                package: PkgName::new(BASE_PACKAGE),
                section: None,
                variable: var.to_string(),
            },
            [pkg, var] => FullVariable {
                package: PkgName::new(*pkg),
                section: None,
                variable: var.to_string(),
            },
            [pkg, section, var] => FullVariable {
                package: PkgName::new(*pkg),
                section: Some(section.to_string()),
                variable: var.to_string(),
            },
            _ => return Err(Error::parse("variable", s)),
        };
        if var.package.as_str().is_empty()
            || var.variable.is_empty()
            || var.section.as_deref() == Some("")
        {
            return Err(Error::parse("variable", s));
        }
        Ok(var)
    }
}

impl fmt::Display for FullVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.section {
            Some(section) => write!(f, "{}:{}:{}", self.package, section, self.variable),
            None => write!(f, "{}:{}", self.package, self.variable),
        }
    }
}

/// The value of an evaluated variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Bool(bool),
    String(String),
}

impl fmt::Display for VariableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableValue::Bool(b) => write!(f, "{}", b),
            VariableValue::String(s) => f.write_str(s),
        }
    }
}
