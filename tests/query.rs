// tests/query.rs

//! Query-surface tests: list/info rendering, config subcommands,
//! remote management, upload.

mod common;

use common::{add_package, fixture, simple_package, write_archive};
use smelt::query::{self, CompileMode};
use smelt::{cli, Error, Nv, State};

#[test]
fn list_shows_installed_and_available_versions() {
    let f = fixture();
    simple_package(&f.repo, "foo", "1", &[]);
    simple_package(&f.repo, "zoo", "3", &[]);
    f.init();
    cli::cmd_install(&f.root, &["foo".to_string()], true).unwrap();

    let state = State::load(&f.root).unwrap();
    let out = query::list(&state).unwrap();

    let foo_line = out.lines().find(|l| l.starts_with("foo")).unwrap();
    assert!(foo_line.contains(" 1 "));
    assert!(foo_line.contains("The foo package"));

    let zoo_line = out.lines().find(|l| l.starts_with("zoo")).unwrap();
    assert!(zoo_line.contains("--"));
    assert!(zoo_line.contains("The zoo package"));
}

#[test]
fn info_reports_versions_and_description() {
    let f = fixture();
    simple_package(&f.repo, "foo", "1", &[]);
    simple_package(&f.repo, "foo", "2", &[]);
    f.init();
    cli::cmd_install(&f.root, &["foo.1".to_string()], true).unwrap();

    let state = State::load(&f.root).unwrap();
    let out = query::info(&state, "foo").unwrap();
    assert!(out.contains("package: foo"));
    assert!(out.contains("installed-version: 1"));
    assert!(out.contains("available-versions: 2"));
    assert!(out.contains("description: The foo package"));

    let err = query::info(&state, "ghost").unwrap_err();
    assert!(matches!(err, Error::UnknownPackage(_)));
}

#[test]
fn config_env_leads_with_the_switch_bin() {
    let f = fixture();
    f.init();
    let state = State::load(&f.root).unwrap();
    let out = query::config_env(&state).unwrap();
    let path_line = out.lines().find(|l| l.starts_with("PATH=")).unwrap();
    let bin = f.layout().bin_dir("sys");
    assert!(path_line.starts_with(&format!("PATH={}", bin.display())));
}

#[test]
fn config_variable_reads_the_base_package() {
    let f = fixture();
    f.init();
    let state = State::load(&f.root).unwrap();

    let out = query::config_variable(&state, "base:prefix").unwrap();
    assert_eq!(out.trim(), f.layout().switch_dir("sys").to_str().unwrap());

    // Unqualified names resolve against base as well.
    let out = query::config_variable(&state, "lib").unwrap();
    assert_eq!(out.trim(), f.layout().lib_root("sys").to_str().unwrap());

    let err = query::config_variable(&state, "base:ghost").unwrap_err();
    assert!(matches!(err, Error::UnknownVariable(_)));
}

#[test]
fn config_subst_expands_templates() {
    let f = fixture();
    f.init();
    let state = State::load(&f.root).unwrap();

    let target = f.scratch.path().join("flags.txt");
    std::fs::write(
        f.scratch.path().join("flags.txt.in"),
        "prefix=%{base:prefix}%\ninstalled=%{base:installed}%\n",
    )
    .unwrap();
    query::config_subst(&state, &[target.to_string_lossy().into_owned()]).unwrap();

    let text = std::fs::read_to_string(&target).unwrap();
    assert_eq!(
        text,
        format!(
            "prefix={}\ninstalled=true\n",
            f.layout().switch_dir("sys").display()
        )
    );
}

#[test]
fn config_includes_closes_over_dependencies() {
    let f = fixture();
    simple_package(&f.repo, "foo", "1", &[]);
    simple_package(&f.repo, "bar", "1", &["foo"]);
    f.init();
    cli::cmd_install(&f.root, &["bar".to_string()], true).unwrap();

    let state = State::load(&f.root).unwrap();
    let layout = f.layout();

    let out = query::config_includes(&state, false, &["bar".to_string()]).unwrap();
    assert_eq!(
        out.trim(),
        format!("-I {}", layout.lib_dir("sys", "bar").display())
    );

    let out = query::config_includes(&state, true, &["bar".to_string()]).unwrap();
    assert!(out.contains(&format!("-I {}", layout.lib_dir("sys", "bar").display())));
    assert!(out.contains(&format!("-I {}", layout.lib_dir("sys", "foo").display())));
}

#[test]
fn config_compil_emits_section_flags() {
    let f = fixture();
    // The package ships a config template; the build substitutes it
    // into the installed config, which exports one library section
    // with per-mode flags.
    let template = r#"[[section]]
name = "mylib"
kind = "library"
[section.variables]
asmcomp = "-I %{lib}%/mylib"
bytecomp = "-I %{lib}%/mylib -byte"
"#;
    add_package(
        &f.repo,
        "mylib.1",
        "name = \"mylib\"\nversion = \"1\"\nsubsts = [\"mylib.config\"]\nbuild = [[\"sh\", \"-c\", \"true\"]]\nlibraries = [\"mylib\"]\n",
        "A library\n",
        &[("mylib.install", ""), ("mylib.config.in", template)],
    );
    f.init();
    cli::cmd_install(&f.root, &["mylib".to_string()], true).unwrap();

    let state = State::load(&f.root).unwrap();
    let out = query::config_compil(&state, CompileMode::Asmcomp, &["mylib:mylib".to_string()])
        .unwrap();
    assert_eq!(
        out.trim(),
        format!("-I {}/mylib", f.layout().lib_root("sys").display())
    );
}

#[test]
fn remote_add_and_rm() {
    let f = fixture();
    simple_package(&f.repo, "foo", "1", &[]);
    f.init();

    // A second source repository publishing one more package.
    let extra = f.scratch.path().join("extra-src");
    for sub in ["packages", "archives", "compilers"] {
        std::fs::create_dir_all(extra.join(sub)).unwrap();
    }
    simple_package(&extra, "bar", "1", &[]);

    cli::cmd_remote_add(
        &f.root,
        "extra",
        &format!("file://{}", extra.display()),
        smelt::config::RepoKind::Local,
    )
    .unwrap();

    let state = State::load(&f.root).unwrap();
    assert!(state.is_available_name(&smelt::PkgName::new("bar")));
    let out = query::remote_list(&state).unwrap();
    assert!(out.contains("default"));
    assert!(out.contains("extra"));

    // Duplicate names are rejected, unknown removals too.
    assert!(cli::cmd_remote_add(
        &f.root,
        "extra",
        &format!("file://{}", extra.display()),
        smelt::config::RepoKind::Local,
    )
    .is_err());
    assert!(matches!(
        cli::cmd_remote_rm(&f.root, "nope").unwrap_err(),
        Error::UnknownRepo(_)
    ));

    cli::cmd_remote_rm(&f.root, "extra").unwrap();
    let state = State::load(&f.root).unwrap();
    assert_eq!(state.repositories().len(), 1);
}

#[test]
fn index_binding_follows_repository_priority() {
    let f = fixture();
    simple_package(&f.repo, "foo", "1", &[]);
    f.init();

    let extra = f.scratch.path().join("extra-src");
    for sub in ["packages", "archives", "compilers"] {
        std::fs::create_dir_all(extra.join(sub)).unwrap();
    }
    // The same name with a different version in the lower-priority repo.
    simple_package(&extra, "foo", "9", &[]);
    cli::cmd_remote_add(
        &f.root,
        "extra",
        &format!("file://{}", extra.display()),
        smelt::config::RepoKind::Local,
    )
    .unwrap();

    let state = State::load(&f.root).unwrap();
    // First bind wins: foo stays with the first repository, so only
    // its versions are available.
    assert_eq!(
        state.index.get(&smelt::PkgName::new("foo")),
        Some("default")
    );
    assert!(state.available.contains(&Nv::parse("foo.1").unwrap()));
    assert!(!state.available.contains(&Nv::parse("foo.9").unwrap()));
}

#[test]
fn upload_publishes_into_the_repository() {
    let f = fixture();
    simple_package(&f.repo, "foo", "1", &[]);
    f.init();

    let staging = f.scratch.path().join("staging");
    std::fs::create_dir_all(&staging).unwrap();
    std::fs::write(
        staging.join("pkg"),
        "name = \"new\"\nversion = \"1\"\nbuild = [[\"sh\", \"-c\", \"true\"]]\n",
    )
    .unwrap();
    std::fs::write(staging.join("descr"), "Uploaded package\n").unwrap();
    write_archive(&staging.join("new.tar.gz"), &[("new.install", "")]);

    cli::cmd_upload(
        &f.root,
        &staging.join("pkg"),
        &staging.join("descr"),
        &staging.join("new.tar.gz"),
        None,
    )
    .unwrap();

    let state = State::load(&f.root).unwrap();
    assert!(state.available.contains(&Nv::parse("new.1").unwrap()));
    cli::cmd_install(&f.root, &["new".to_string()], true).unwrap();
    assert!(f.installed("sys").contains(&Nv::parse("new.1").unwrap()));
}

#[test]
fn compiler_list_reads_the_global_view() {
    let f = fixture();
    std::fs::write(
        f.repo.join("compilers").join("4.0.comp"),
        "preinstalled = true\n",
    )
    .unwrap();
    std::fs::write(
        f.repo.join("compilers").join("5.0.comp"),
        "preinstalled = true\n",
    )
    .unwrap();
    f.init();

    let state = State::load(&f.root).unwrap();
    let out = query::compiler_list(&state).unwrap();
    assert_eq!(out, "4.0 *\n5.0\n");
}
