// src/lib.rs

//! smelt - source-based package manager with per-compiler switches
//!
//! The crate is the client state machine and transaction engine:
//!
//! - `paths` / `config` / `manifest`: the on-disk world under `$ROOT`
//! - `state`: the immutable per-command snapshot
//! - `subst`: package-qualified variables and `%{..}%` substitution
//! - `repository`: backend capability trait, mirrors, the `update`
//!   synchronizer and its derived symlink views
//! - `resolver`: solver contract, request construction, action DAG
//! - `executor`: sequential removals + parallel DAG of builds, with
//!   compensation on failure
//! - `switch`: per-compiler install trees and compiler bootstrap
//! - `query` / `cli`: the user-facing surfaces

pub mod cli;
pub mod config;
pub mod console;
mod error;
pub mod executor;
pub mod lock;
pub mod manifest;
pub mod paths;
pub mod query;
pub mod repository;
pub mod resolver;
pub mod state;
pub mod subst;
pub mod switch;
pub mod types;
pub mod version;

pub use error::{Error, Result};
pub use paths::Layout;
pub use state::State;
pub use types::{
    Dep, FullVariable, Nv, PkgName, PkgVersion, VariableValue, VersionConstraint, BASE_PACKAGE,
};
