// src/switch.rs

//! Switch management and compiler bootstrap
//!
//! A switch is one isolated install tree bound to one compiler version.
//! Creating one writes the empty per-switch state, registers the alias,
//! installs the synthetic `base` package carrying the switch's
//! prefix/lib/bin/doc variables, refreshes the repositories, and builds
//! the compiler from source unless it is preinstalled. Every step is
//! enclosed in a rollback that erases the switch tree and the alias
//! entry on failure.

use crate::config::{load_nv_set, save_nv_set, AliasMap, GlobalConfig, Repository, FORMAT_VERSION};
use crate::error::{Error, Result};
use crate::executor::{self, ExecOptions};
use crate::manifest::{BuildConfig, CompilerDescr, InstallDescriptor};
use crate::paths::Layout;
use crate::repository::{self, sync};
use crate::resolver::{self, BasicSolver};
use crate::state::State;
use crate::subst;
use crate::types::{Nv, PkgName, VariableValue};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::process::Command;
use tracing::{info, warn};

/// Initialize the root: global config with one repository, the global
/// directories, the repository mirror, and the first switch.
pub fn init(
    root: &Path,
    repo: Repository,
    alias: &str,
    compiler: &str,
    opts: &ExecOptions,
) -> Result<()> {
    let layout = Layout::new(root);
    if layout.config_file().exists() {
        return Err(Error::AlreadyInitialized(root.to_path_buf()));
    }
    fs::create_dir_all(root)?;

    let result = (|| {
        let config = GlobalConfig {
            format_version: FORMAT_VERSION.to_string(),
            alias: alias.to_string(),
            cores: default_cores(),
            repositories: vec![repo.clone()],
        };
        config.save(&layout.config_file())?;
        for dir in [
            layout.repo_root(),
            layout.manifest_dir(),
            layout.descr_dir(),
            layout.archive_dir(),
            layout.compiler_dir(),
        ] {
            fs::create_dir_all(dir)?;
        }
        repository::backend(repo.kind).init(&layout, &repo)?;
        init_switch(root, alias, compiler, opts)
    })();

    if result.is_err() {
        warn!("initialization failed, rolling back {}", root.display());
        rollback_init(&layout, alias);
    }
    result
}

fn default_cores() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1)
}

fn rollback_init(layout: &Layout, alias: &str) {
    for file in [layout.config_file(), layout.aliases_file()] {
        let _ = fs::remove_file(file);
    }
    for dir in [
        layout.repo_root(),
        layout.manifest_dir(),
        layout.descr_dir(),
        layout.archive_dir(),
        layout.compiler_dir(),
        layout.switch_dir(alias),
    ] {
        let _ = fs::remove_dir_all(dir);
    }
}

/// Create a switch if it does not exist yet. An existing switch
/// directory makes this a no-op.
pub fn init_switch(root: &Path, alias: &str, compiler: &str, opts: &ExecOptions) -> Result<()> {
    let layout = Layout::new(root);
    if layout.switch_dir(alias).exists() {
        return Ok(());
    }
    info!("creating switch {} on compiler {}", alias, compiler);

    let aliases_before = AliasMap::load(&layout.aliases_file())?;
    let result = (|| {
        for dir in [
            layout.lib_root(alias),
            layout.bin_dir(alias),
            layout.doc_dir(alias),
            layout.stublibs_dir(alias),
            layout.build_root(alias),
            layout.switch_config_dir(alias),
            layout.switch_install_dir(alias),
        ] {
            fs::create_dir_all(dir)?;
        }
        save_nv_set(&layout.installed_file(alias), &Default::default())?;

        let mut aliases = aliases_before.clone();
        aliases.insert(alias, compiler);
        aliases.save(&layout.aliases_file())?;

        install_compiler_config(&layout, alias, compiler)?;
        sync::update(root)?;

        let state = State::load(root)?;
        let descr = state.compiler_descr()?;
        if !descr.preinstalled {
            build_compiler(&state, &descr, opts)?;
        }
        Ok(())
    })();

    if result.is_err() {
        warn!("switch {} failed to initialize, rolling back", alias);
        let _ = fs::remove_dir_all(layout.switch_dir(alias));
        let _ = aliases_before.save(&layout.aliases_file());
    }
    result
}

/// Record the synthetic `base` package: its build config carries the
/// switch's prefix/lib/bin/doc, and it sits in the installed set so
/// every other package can depend on its variables.
fn install_compiler_config(layout: &Layout, alias: &str, compiler: &str) -> Result<()> {
    let prefix = layout.switch_dir(alias);
    let mut variables = BTreeMap::new();
    variables.insert(
        "prefix".to_string(),
        VariableValue::String(prefix.to_string_lossy().into_owned()),
    );
    variables.insert(
        "lib".to_string(),
        VariableValue::String(layout.lib_root(alias).to_string_lossy().into_owned()),
    );
    variables.insert(
        "bin".to_string(),
        VariableValue::String(layout.bin_dir(alias).to_string_lossy().into_owned()),
    );
    variables.insert(
        "doc".to_string(),
        VariableValue::String(layout.doc_dir(alias).to_string_lossy().into_owned()),
    );
    BuildConfig {
        variables,
        sections: vec![],
    }
    .save(&layout.pkg_config_file(alias, crate::types::BASE_PACKAGE))?;
    InstallDescriptor::default().save(&layout.pkg_install_file(alias, crate::types::BASE_PACKAGE))?;
    fs::create_dir_all(layout.lib_dir(alias, crate::types::BASE_PACKAGE))?;

    let installed_file = layout.installed_file(alias);
    let mut installed = load_nv_set(&installed_file)?;
    installed.insert(Nv::new(crate::types::BASE_PACKAGE, compiler));
    save_nv_set(&installed_file, &installed)
}

/// Download, patch, configure, make, make install.
fn build_compiler(state: &State, descr: &CompilerDescr, _opts: &ExecOptions) -> Result<()> {
    let nv = Nv::new(crate::types::BASE_PACKAGE, state.compiler.as_str());
    info!("building compiler {} from source", state.compiler);

    let build = state.layout.build_dir(&state.alias, &nv);
    if build.exists() {
        fs::remove_dir_all(&build)?;
    }
    fs::create_dir_all(&build)?;

    let source = descr.source.as_deref().ok_or_else(|| {
        Error::Message(format!(
            "compiler {} is not preinstalled and has no source",
            state.compiler
        ))
    })?;
    let scratch = tempfile::tempdir()?;
    let tarball = scratch.path().join("compiler.tar.gz");
    repository::fetch_address(source, &tarball)?;
    executor::extract_archive(&tarball, &build)?;

    for (i, patch) in descr.patches.iter().enumerate() {
        let file = scratch.path().join(format!("patch-{i}"));
        repository::fetch_address(patch, &file)?;
        run_in(state, &build, &nv, vec![
            "patch".to_string(),
            "-p1".to_string(),
            "-i".to_string(),
            file.to_string_lossy().into_owned(),
        ])?;
    }

    if !descr.configure.is_empty() {
        let mut cmd = vec!["./configure".to_string()];
        cmd.extend(descr.configure.iter().cloned());
        run_in(state, &build, &nv, cmd)?;
    }
    let mut make = vec!["make".to_string()];
    make.extend(descr.make.iter().cloned());
    run_in(state, &build, &nv, make)?;
    run_in(state, &build, &nv, vec!["make".to_string(), "install".to_string()])?;
    Ok(())
}

fn run_in(state: &State, cwd: &Path, nv: &Nv, command: Vec<String>) -> Result<()> {
    let args: Vec<String> = command
        .iter()
        .map(|a| subst::substitute_string(state, a))
        .collect::<Result<_>>()?;
    let Some((program, rest)) = args.split_first() else {
        return Ok(());
    };
    let env = executor::compose_env(state)?;
    info!("running {:?} in {}", args, cwd.display());
    let status = Command::new(program)
        .args(rest)
        .current_dir(cwd)
        .env_clear()
        .envs(&env)
        .status()?;
    if status.success() {
        Ok(())
    } else {
        Err(Error::BuildFailed {
            nv: nv.to_string(),
            code: status.code().unwrap_or(-1),
        })
    }
}

/// Select (and create, when new) a switch, then install the compiler's
/// required packages plus, when cloning, the previous switch's
/// installed set pinned to the latest available versions.
pub fn switch_to(
    root: &Path,
    clone: bool,
    alias: &str,
    compiler: Option<&str>,
    opts: &ExecOptions,
) -> Result<()> {
    let layout = Layout::new(root);
    let config_file = layout.config_file();
    if !config_file.exists() {
        return Err(Error::Uninitialized(root.to_path_buf()));
    }
    let mut config = GlobalConfig::load(&config_file)?;
    let aliases = AliasMap::load(&layout.aliases_file())?;

    let compiler = match compiler {
        Some(v) => v.to_string(),
        None => aliases
            .get(alias)
            .ok_or_else(|| {
                Error::Message(format!(
                    "switch {} does not exist, give a compiler version to create it",
                    alias
                ))
            })?
            .to_string(),
    };

    let previous_alias = config.alias.clone();
    let previous_installed = load_nv_set(&layout.installed_file(&previous_alias))?;

    config.alias = alias.to_string();
    config.save(&config_file)?;
    if let Err(e) = init_switch(root, alias, &compiler, opts) {
        config.alias = previous_alias;
        let _ = config.save(&config_file);
        return Err(e);
    }
    info!("now on switch {}", alias);

    let state = State::load(root)?;
    let descr = state.compiler_descr()?;
    let packages: Vec<PkgName> = descr.packages.iter().map(PkgName::new).collect();
    let clone_set = if clone { Some(&previous_installed) } else { None };

    match resolver::resolve_switch(&state, &BasicSolver, &packages, clone_set)? {
        Some(solution) => executor::apply_solution(&state, &solution, opts),
        None => Err(Error::NoSolution),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn init_switch_is_idempotent_and_rolls_back() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let layout = Layout::new(root);

        // A config pointing at the switch so update/State::load work.
        GlobalConfig {
            format_version: FORMAT_VERSION.to_string(),
            alias: "sys".to_string(),
            cores: 1,
            repositories: vec![],
        }
        .save(&layout.config_file())
        .unwrap();

        let opts = ExecOptions { assume_yes: true };
        init_switch(root, "sys", "4.0", &opts).unwrap();
        assert!(layout.switch_dir("sys").is_dir());
        let installed = load_nv_set(&layout.installed_file("sys")).unwrap();
        assert!(installed.contains(&Nv::parse("base.4.0").unwrap()));
        let aliases = AliasMap::load(&layout.aliases_file()).unwrap();
        assert_eq!(aliases.get("sys"), Some("4.0"));

        // Second run is a no-op.
        init_switch(root, "sys", "4.0", &opts).unwrap();

        // A failing repository refresh rolls everything back.
        let mut config = GlobalConfig::load(&layout.config_file()).unwrap();
        config.alias = "broken".to_string();
        config.repositories = vec![Repository {
            name: "gone".to_string(),
            address: root.join("no-such-repo").to_string_lossy().into_owned(),
            kind: crate::config::RepoKind::Local,
        }];
        config.save(&layout.config_file()).unwrap();

        assert!(init_switch(root, "broken", "9.9", &opts).is_err());
        assert!(!layout.switch_dir("broken").exists());
        let aliases = AliasMap::load(&layout.aliases_file()).unwrap();
        assert!(!aliases.contains("broken"));
    }
}
