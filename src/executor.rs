// src/executor.rs

//! Action executor
//!
//! Takes a resolved `Solution` and applies it:
//!
//! 1. prints the plan and asks for confirmation when it contains a
//!    removal or a downgrade (`--yes` auto-accepts);
//! 2. runs the removals sequentially, persisting the installed set
//!    after every single one;
//! 3. schedules the add/recompile DAG on a bounded pool of worker
//!    threads. A node runs only after all of its predecessors
//!    succeeded; each worker loads a fresh state; the installed set is
//!    written only by the parent thread. On a failure the node's
//!    handler removes the half-installed package, in-flight siblings
//!    are left to finish, nothing new starts, and the first error is
//!    reported.
//!
//! A single package install is atomic with respect to the installed
//! set: the package is recorded only after the build and the artifact
//! copy both succeeded. A crash leaves either "not installed" or
//! "installed correctly"; half-built trees under `build/` are
//! acceptable residue.

use crate::config::save_nv_set;
use crate::console;
use crate::error::{Error, Result};
use crate::manifest::{BuildConfig, InstallDescriptor, Manifest, SectionKind};
use crate::repository;
use crate::resolver::{Action, Solution};
use crate::state::State;
use crate::subst;
use crate::types::Nv;
use flate2::read::GzDecoder;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecOptions {
    /// Accept every interactive question.
    pub assume_yes: bool,
}

/// Apply a resolved solution to the current switch.
pub fn apply_solution(state: &State, solution: &Solution, opts: &ExecOptions) -> Result<()> {
    if solution.is_empty() {
        println!("Nothing to do.");
        return Ok(());
    }

    println!("The following actions will be performed:");
    for nv in &solution.to_remove {
        println!("  remove {}", nv);
    }
    for action in solution.to_add.nodes() {
        println!("  {}", action);
    }

    if needs_confirmation(solution)
        && !console::confirm("Continue?", opts.assume_yes)?
    {
        println!("Aborted.");
        return Ok(());
    }

    let mut installed = state.installed.clone();
    let mut reinstall = state.reinstall.clone();
    let installed_file = state.layout.installed_file(&state.alias);
    let reinstall_file = state.layout.reinstall_file(&state.alias);

    // Sequential removals, durable after each one.
    for nv in &solution.to_remove {
        if !installed.contains(nv) {
            continue;
        }
        proc_remove(state, nv, opts)?;
        installed.remove(nv);
        reinstall.retain(|r| r.name != nv.name);
        save_nv_set(&installed_file, &installed)?;
        save_nv_set(&reinstall_file, &reinstall)?;
    }

    // Parallel adds.
    let graph = &solution.to_add;
    if graph.is_empty() {
        return Ok(());
    }
    let workers = state.config.cores.clamp(1, graph.len());
    debug!("scheduling {} action(s) on {} worker(s)", graph.len(), workers);

    let (job_tx, job_rx) = mpsc::channel::<usize>();
    let job_rx = Arc::new(Mutex::new(job_rx));
    let (done_tx, done_rx) = mpsc::channel::<(usize, Result<()>)>();

    let root = state.layout.root().to_path_buf();
    let mut first_error: Option<Error> = None;

    thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = Arc::clone(&job_rx);
            let done_tx = done_tx.clone();
            let root = root.clone();
            let opts = *opts;
            scope.spawn(move || loop {
                let job = match job_rx.lock() {
                    Ok(rx) => rx.recv(),
                    Err(_) => break,
                };
                match job {
                    Ok(i) => {
                        let result = run_action_at(&root, graph.node(i), &opts);
                        if done_tx.send((i, result)).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            });
        }
        drop(done_tx);

        let mut pending: Vec<usize> = (0..graph.len())
            .map(|i| graph.predecessors(i).len())
            .collect();
        let mut dispatched = 0usize;
        let mut completed = 0usize;

        for i in 0..graph.len() {
            if pending[i] == 0 {
                let _ = job_tx.send(i);
                dispatched += 1;
            }
        }

        while completed < dispatched {
            let Ok((i, result)) = done_rx.recv() else {
                break;
            };
            completed += 1;
            match result {
                Ok(()) => {
                    let action = graph.node(i);
                    match action {
                        Action::Change { from, to } => {
                            if let Some(old) = from {
                                installed.remove(old);
                            }
                            installed.retain(|nv| nv.name != to.name);
                            installed.insert(to.clone());
                        }
                        Action::Recompile(nv) => {
                            installed.insert(nv.clone());
                        }
                    }
                    reinstall.retain(|r| r.name != action.target().name);
                    if let Err(e) = save_nv_set(&installed_file, &installed)
                        .and_then(|()| save_nv_set(&reinstall_file, &reinstall))
                    {
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                        continue;
                    }
                    info!("{} done", action);
                    if first_error.is_none() {
                        for &j in graph.successors(i) {
                            pending[j] -= 1;
                            if pending[j] == 0 {
                                let _ = job_tx.send(j);
                                dispatched += 1;
                            }
                        }
                    }
                }
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    } else {
                        warn!("{} also failed: {}", graph.node(i), e);
                    }
                }
            }
        }
        drop(job_tx);
    });

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn needs_confirmation(solution: &Solution) -> bool {
    if !solution.to_remove.is_empty() {
        return true;
    }
    solution.to_add.nodes().any(|action| match action {
        Action::Change {
            from: Some(old),
            to,
        } => to.version < old.version,
        _ => false,
    })
}

/// Run one DAG node with a fresh state. On an install failure the
/// half-installed package is cleaned up before the error propagates.
fn run_action_at(root: &Path, action: &Action, opts: &ExecOptions) -> Result<()> {
    match action {
        Action::Change { from, to } => {
            let state = State::load(root)?;
            if let Some(old) = from {
                proc_remove(&state, old, opts)?;
            }
            install_with_cleanup(&state, to, opts)
        }
        Action::Recompile(nv) => {
            let state = State::load(root)?;
            proc_remove(&state, nv, opts)?;
            install_with_cleanup(&state, nv, opts)
        }
    }
}

fn install_with_cleanup(state: &State, nv: &Nv, opts: &ExecOptions) -> Result<()> {
    match proc_install(state, nv, opts) {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!("install of {} failed, cleaning up", nv);
            let cleanup = ExecOptions { assume_yes: true };
            if let Some(manifest) = load_manifest_opt(state, nv) {
                let _ = run_remove_commands(state, &manifest, nv);
            }
            let _ = erase_artifacts(state, nv, &cleanup);
            Err(e)
        }
    }
}

// =============================================================================
// Install of one package
// =============================================================================

/// Build and install one package into the current switch.
pub fn proc_install(state: &State, nv: &Nv, opts: &ExecOptions) -> Result<()> {
    let name = nv.name.as_str();
    let manifest = state.manifest(nv)?;
    info!("installing {}", nv);

    // Fresh build tree, archive, overlay.
    let build = state.layout.build_dir(&state.alias, nv);
    if build.exists() {
        fs::remove_dir_all(&build)?;
    }
    fs::create_dir_all(&build)?;
    let archive = repository::download(state, nv)?;
    extract_archive(&archive, &build)?;
    if let Some(repo) = state.repository_of(&nv.name) {
        let files = state.layout.repo_files_dir(&repo.name, nv);
        if files.is_dir() {
            repository::copy_dir_all(&files, &build)?;
        }
    }

    // Substitution templates.
    for base in &manifest.substs {
        subst::substitute_file(state, &build.join(base))?;
    }

    // Environment: compiler env block, then the switch bin on PATH.
    // Both the new and the previous environment are kept next to the
    // build for debugging and for scripts that want to restore it.
    let env = compose_env(state)?;
    write_env_file(&build.join(format!("{}.env", name)), &env)?;
    let previous: BTreeMap<String, String> = std::env::vars().collect();
    write_env_file(&build.join(format!("{}.env.old", name)), &previous)?;

    run_commands(state, &manifest.build, &build, &env, nv, false)?;

    // What the build produced.
    let descriptor = InstallDescriptor::load_opt(&build.join(format!("{}.install", name)))?;
    let build_config = BuildConfig::load_opt(&build.join(format!("{}.config", name)))?;
    check_sections(&manifest, &build_config)?;
    check_requires(state, &manifest, &build_config)?;

    copy_artifacts(state, nv, &build, &descriptor, opts)?;

    descriptor.save(&state.layout.pkg_install_file(&state.alias, name))?;
    build_config.save(&state.layout.pkg_config_file(&state.alias, name))?;
    Ok(())
}

/// Manifest vs build config: the library and syntax section sets must
/// agree exactly, in both directions.
fn check_sections(manifest: &Manifest, config: &BuildConfig) -> Result<()> {
    for (kind, declared) in [
        (SectionKind::Library, &manifest.libraries),
        (SectionKind::Syntax, &manifest.syntax),
    ] {
        let declared: BTreeSet<&str> = declared.iter().map(String::as_str).collect();
        let built: BTreeSet<&str> = config.section_names(kind).into_iter().collect();
        if let Some(odd) = built.symmetric_difference(&declared).next() {
            return Err(Error::ConfigMismatch((*odd).to_string()));
        }
    }
    Ok(())
}

/// Every required section must be local or exported by a direct
/// dependency that is installed.
fn check_requires(state: &State, manifest: &Manifest, config: &BuildConfig) -> Result<()> {
    let local: BTreeSet<&str> = config.sections.iter().map(|s| s.name.as_str()).collect();
    let mut provided: BTreeSet<String> = BTreeSet::new();
    for dep in manifest.depends.iter().chain(manifest.depopts.iter()) {
        if let Some(dep_nv) = state.installed_version(&dep.name) {
            if let Ok(m) = state.manifest(dep_nv) {
                provided.extend(m.libraries.iter().cloned());
                provided.extend(m.syntax.iter().cloned());
            }
        }
    }
    for section in &config.sections {
        for required in &section.requires {
            if !local.contains(required.as_str()) && !provided.contains(required) {
                return Err(Error::UnresolvedRequire(required.clone()));
            }
        }
    }
    Ok(())
}

fn copy_artifacts(
    state: &State,
    nv: &Nv,
    build: &Path,
    descriptor: &InstallDescriptor,
    opts: &ExecOptions,
) -> Result<()> {
    let name = nv.name.as_str();
    let lib_dir = state.layout.lib_dir(&state.alias, name);
    fs::create_dir_all(&lib_dir)?;
    for file in &descriptor.lib {
        let src = build.join(file);
        let file_name = src
            .file_name()
            .ok_or_else(|| Error::format(&src, "lib entry has no file name"))?
            .to_os_string();
        fs::copy(&src, lib_dir.join(file_name))?;
    }

    let bin_dir = state.layout.bin_dir(&state.alias);
    fs::create_dir_all(&bin_dir)?;
    for pair in &descriptor.bin {
        let src = build.join(&pair.src);
        let dst = bin_dir.join(bin_basename(pair.dst.as_deref(), &src)?);
        fs::copy(&src, &dst)?;
        fs::set_permissions(&dst, fs::Permissions::from_mode(0o755))?;
    }

    for pair in &descriptor.misc {
        let src = build.join(&pair.src);
        let dst = match &pair.dst {
            Some(d) => PathBuf::from(d),
            None => {
                return Err(Error::format(
                    state.layout.pkg_install_file(&state.alias, name),
                    format!("misc entry {} has no destination", pair.src),
                ))
            }
        };
        if dst.exists()
            && !console::confirm(
                &format!("{} already exists, overwrite?", dst.display()),
                opts.assume_yes,
            )?
        {
            continue;
        }
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&src, &dst)?;
    }
    Ok(())
}

fn bin_basename(dst: Option<&str>, src: &Path) -> Result<String> {
    match dst {
        Some(d) => Ok(d.to_string()),
        None => src
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.to_string())
            .ok_or_else(|| Error::format(src, "bin entry has no file name")),
    }
}

// =============================================================================
// Remove of one package
// =============================================================================

/// Remove one package from the current switch: remove commands first,
/// then the recorded artifacts, descriptor and build config.
pub fn proc_remove(state: &State, nv: &Nv, opts: &ExecOptions) -> Result<()> {
    info!("removing {}", nv);
    if let Some(manifest) = load_manifest_opt(state, nv) {
        run_remove_commands(state, &manifest, nv)?;
    }
    erase_artifacts(state, nv, opts)
}

fn load_manifest_opt(state: &State, nv: &Nv) -> Option<Manifest> {
    match state.manifest(nv) {
        Ok(m) => Some(m),
        Err(_) => {
            warn!("{} has no manifest anymore, skipping its remove commands", nv);
            None
        }
    }
}

fn run_remove_commands(state: &State, manifest: &Manifest, nv: &Nv) -> Result<()> {
    if manifest.remove.is_empty() {
        return Ok(());
    }
    let build = state.layout.build_dir(&state.alias, nv);
    let cwd = if build.is_dir() {
        build
    } else {
        warn!(
            "build directory of {} is gone, running its remove commands from the root",
            nv
        );
        state.layout.root().to_path_buf()
    };
    let env = compose_env(state)?;
    run_commands(state, &manifest.remove, &cwd, &env, nv, true)
}

fn erase_artifacts(state: &State, nv: &Nv, opts: &ExecOptions) -> Result<()> {
    let name = nv.name.as_str();
    let install_file = state.layout.pkg_install_file(&state.alias, name);
    let descriptor = InstallDescriptor::load_opt(&install_file)?;

    let lib_dir = state.layout.lib_dir(&state.alias, name);
    if lib_dir.is_dir() {
        fs::remove_dir_all(&lib_dir)?;
    }

    let bin_dir = state.layout.bin_dir(&state.alias);
    for pair in &descriptor.bin {
        let dst = bin_dir.join(bin_basename(pair.dst.as_deref(), Path::new(&pair.src))?);
        if dst.exists() {
            fs::remove_file(&dst)?;
        }
    }
    for pair in &descriptor.misc {
        let Some(d) = &pair.dst else { continue };
        let dst = Path::new(d);
        if dst.exists()
            && console::confirm(&format!("delete {}?", dst.display()), opts.assume_yes)?
        {
            fs::remove_file(dst)?;
        }
    }

    if install_file.exists() {
        fs::remove_file(&install_file)?;
    }
    let config_file = state.layout.pkg_config_file(&state.alias, name);
    if config_file.exists() {
        fs::remove_file(&config_file)?;
    }
    Ok(())
}

// =============================================================================
// Environment and command execution
// =============================================================================

/// Compose the build environment: the process environment, the compiler
/// description's `NAME op VALUE` updates (colon-joined for `+=`/`=+`),
/// then the switch bin directory prepended to PATH.
pub fn compose_env(state: &State) -> Result<BTreeMap<String, String>> {
    let mut env: BTreeMap<String, String> = std::env::vars().collect();
    let descr = state.compiler_descr()?;
    for line in &descr.env {
        apply_env_op(state, &mut env, line)?;
    }
    let bin = state.layout.bin_dir(&state.alias);
    let bin = bin.to_string_lossy();
    match env.get_mut("PATH") {
        Some(path) if !path.is_empty() => *path = format!("{}:{}", bin, path),
        _ => {
            env.insert("PATH".to_string(), bin.to_string());
        }
    }
    Ok(env)
}

fn apply_env_op(state: &State, env: &mut BTreeMap<String, String>, line: &str) -> Result<()> {
    let parts: Vec<&str> = line.splitn(3, ' ').collect();
    let [name, op, raw] = parts.as_slice() else {
        return Err(Error::parse("environment update", line));
    };
    let value = subst::substitute_string(state, raw)?;
    match *op {
        "=" => {
            env.insert(name.to_string(), value);
        }
        "+=" => match env.get_mut(*name) {
            Some(old) if !old.is_empty() => *old = format!("{}:{}", value, old),
            _ => {
                env.insert(name.to_string(), value);
            }
        },
        "=+" => match env.get_mut(*name) {
            Some(old) if !old.is_empty() => *old = format!("{}:{}", old, value),
            _ => {
                env.insert(name.to_string(), value);
            }
        },
        _ => return Err(Error::parse("environment update", line)),
    }
    Ok(())
}

fn write_env_file(path: &Path, env: &BTreeMap<String, String>) -> Result<()> {
    let mut out = String::new();
    for (key, value) in env {
        out.push_str(key);
        out.push('=');
        out.push_str(value);
        out.push('\n');
    }
    fs::write(path, out)?;
    Ok(())
}

/// Run a command list with per-argument substitution. A non-zero exit
/// aborts with `BuildFailed` or `RemoveFailed` depending on the phase.
fn run_commands(
    state: &State,
    commands: &[Vec<String>],
    cwd: &Path,
    env: &BTreeMap<String, String>,
    nv: &Nv,
    removing: bool,
) -> Result<()> {
    for command in commands {
        let args: Vec<String> = command
            .iter()
            .map(|a| subst::substitute_string(state, a))
            .collect::<Result<_>>()?;
        let Some((program, rest)) = args.split_first() else {
            continue;
        };
        debug!("running {:?} in {}", args, cwd.display());
        let status = Command::new(program)
            .args(rest)
            .current_dir(cwd)
            .env_clear()
            .envs(env)
            .status()?;
        if !status.success() {
            return Err(if removing {
                Error::RemoveFailed(nv.to_string())
            } else {
                Error::BuildFailed {
                    nv: nv.to_string(),
                    code: status.code().unwrap_or(-1),
                }
            });
        }
    }
    Ok(())
}

// =============================================================================
// Archive extraction
// =============================================================================

/// Extract a `.tar.gz` into `dest`, hoisting a single top-level
/// directory so build commands always run at the source root.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<()> {
    let file = fs::File::open(archive)?;
    tar::Archive::new(GzDecoder::new(file)).unpack(dest)?;

    let entries: Vec<fs::DirEntry> = fs::read_dir(dest)?.collect::<io::Result<_>>()?;
    if entries.len() == 1 && entries[0].file_type()?.is_dir() {
        let inner = entries[0].path();
        for entry in fs::read_dir(&inner)? {
            let entry = entry?;
            fs::rename(entry.path(), dest.join(entry.file_name()))?;
        }
        fs::remove_dir(&inner)?;
    }
    Ok(())
}
