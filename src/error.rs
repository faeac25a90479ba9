// src/error.rs

//! Central error type for the smelt client
//!
//! Every failure a command can surface is a variant here. All errors are
//! fatal to the current command: the top level maps them to a message and
//! a non-zero exit. Compensating actions (executor cleanup, init rollback)
//! run before an error propagates this far.

use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} is not initialized, run `smelt init` first")]
    Uninitialized(PathBuf),

    #[error("{0} is already initialized")]
    AlreadyInitialized(PathBuf),

    #[error("unknown package {0}")]
    UnknownPackage(String),

    #[error("unknown variable {0}")]
    UnknownVariable(String),

    #[error("unknown repository {0}")]
    UnknownRepo(String),

    #[error("package {0} is not installed")]
    NotInstalled(String),

    #[error("package {0} is already installed at version {1}")]
    AlreadyInstalled(String, String),

    #[error("manifest {file} declares {declared} but is published as {published}")]
    InconsistentManifest {
        file: PathBuf,
        declared: String,
        published: String,
    },

    #[error("package {nv} depends on {dep}, which no repository provides")]
    InconsistentRepo { nv: String, dep: String },

    #[error("section {0} differs between the manifest and the build config")]
    ConfigMismatch(String),

    #[error("required section {0} is neither local nor provided by a direct dependency")]
    UnresolvedRequire(String),

    #[error("build of {nv} failed with exit code {code}")]
    BuildFailed { nv: String, code: i32 },

    #[error("removal of {0} failed")]
    RemoveFailed(String),

    #[error("no solution satisfies the request")]
    NoSolution,

    #[error("library section {0} is exported by more than one package")]
    NameCollision(String),

    #[error("invalid {what}: {input}")]
    Parse { what: &'static str, input: String },

    #[error("{file}: {message}")]
    FileFormat { file: PathBuf, message: String },

    #[error("download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    #[error("checksum mismatch for {path} (expected {expected}, got {actual})")]
    Checksum {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for parse failures
    pub fn parse(what: &'static str, input: impl Into<String>) -> Self {
        Error::Parse {
            what,
            input: input.into(),
        }
    }

    /// Shorthand for file format failures
    pub fn format(file: impl Into<PathBuf>, message: impl ToString) -> Self {
        Error::FileFormat {
            file: file.into(),
            message: message.to_string(),
        }
    }
}
