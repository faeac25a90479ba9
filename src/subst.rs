// src/subst.rs

//! Variable evaluation and `%{..}%` substitution
//!
//! Variables are package-qualified (`pkg:var`, `pkg:section:var`).
//! Evaluation rules:
//! - `enable` yields `"enable"` / `"disable"` depending on whether the
//!   package is installed;
//! - `installed` yields a boolean;
//! - anything else requires the package to be installed and looks the
//!   name up in its build config, globally or inside the named section.
//!
//! Substitution replaces each well-formed `%{f}%` occurrence exactly
//! once with the string form of the value and is the identity on every
//! other byte. Replacement text is never re-scanned.

use crate::error::{Error, Result};
use crate::manifest::BuildConfig;
use crate::state::State;
use crate::types::{FullVariable, VariableValue};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Evaluate one variable against the current state.
pub fn eval_variable(state: &State, var: &FullVariable) -> Result<VariableValue> {
    let installed = state.is_installed(&var.package);
    if var.section.is_none() {
        match var.variable.as_str() {
            "enable" => {
                return Ok(VariableValue::String(
                    if installed { "enable" } else { "disable" }.to_string(),
                ))
            }
            "installed" => return Ok(VariableValue::Bool(installed)),
            _ => {}
        }
    }
    if !installed {
        return Err(Error::NotInstalled(var.package.to_string()));
    }
    let config = BuildConfig::load_opt(
        &state
            .layout
            .pkg_config_file(&state.alias, var.package.as_str()),
    )?;
    let value = match &var.section {
        None => config.variables.get(&var.variable),
        Some(section) => config
            .section(section)
            .and_then(|s| s.variables.get(&var.variable)),
    };
    value
        .cloned()
        .ok_or_else(|| Error::UnknownVariable(var.to_string()))
}

/// Substitute every `%{f}%` occurrence in a string.
pub fn substitute_string(state: &State, input: &str) -> Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("%{") {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match tail[2..].find("}%") {
            Some(end) => {
                let name = &tail[2..2 + end];
                match FullVariable::parse(name) {
                    Ok(var) => {
                        let value = eval_variable(state, &var)?;
                        out.push_str(&value.to_string());
                    }
                    // Not a variable reference: copy the marker through.
                    Err(_) => out.push_str(&tail[..end + 4]),
                }
                rest = &tail[end + 4..];
            }
            None => {
                // Unterminated marker: the remainder is literal text.
                out.push_str(tail);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

/// Produce `base` from `base.in` with substitutions applied. Bytes
/// outside markers are preserved as-is.
pub fn substitute_file(state: &State, base: &Path) -> Result<()> {
    let template = base.with_extension(match base.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{ext}.in"),
        None => "in".to_string(),
    });
    let input = fs::read_to_string(&template)?;
    let output = substitute_string(state, &input)?;
    fs::write(base, output)?;
    debug!("substituted {} -> {}", template.display(), base.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{save_nv_set, AliasMap, GlobalConfig, FORMAT_VERSION};
    use crate::manifest::{SectionConfig, SectionKind};
    use crate::paths::Layout;
    use crate::types::Nv;
    use std::collections::{BTreeMap, BTreeSet};
    use tempfile::{tempdir, TempDir};

    fn state_with_foo() -> (TempDir, State) {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path());

        GlobalConfig {
            format_version: FORMAT_VERSION.to_string(),
            alias: "sys".to_string(),
            cores: 1,
            repositories: vec![],
        }
        .save(&layout.config_file())
        .unwrap();
        let mut aliases = AliasMap::default();
        aliases.insert("sys", "4.0");
        aliases.save(&layout.aliases_file()).unwrap();

        std::fs::create_dir_all(layout.switch_config_dir("sys")).unwrap();
        let mut installed = BTreeSet::new();
        installed.insert(Nv::parse("foo.1").unwrap());
        save_nv_set(&layout.installed_file("sys"), &installed).unwrap();

        let mut variables = BTreeMap::new();
        variables.insert(
            "flag".to_string(),
            VariableValue::String("-fast".to_string()),
        );
        variables.insert("native".to_string(), VariableValue::Bool(true));
        let mut section_vars = BTreeMap::new();
        section_vars.insert(
            "asmcomp".to_string(),
            VariableValue::String("-I lib".to_string()),
        );
        BuildConfig {
            variables,
            sections: vec![SectionConfig {
                name: "foo".to_string(),
                kind: SectionKind::Library,
                requires: vec![],
                variables: section_vars,
            }],
        }
        .save(&layout.pkg_config_file("sys", "foo"))
        .unwrap();

        let state = State::load(dir.path()).unwrap();
        (dir, state)
    }

    #[test]
    fn pseudo_variables() {
        let (_dir, state) = state_with_foo();
        let v = eval_variable(&state, &FullVariable::parse("foo:enable").unwrap()).unwrap();
        assert_eq!(v.to_string(), "enable");
        let v = eval_variable(&state, &FullVariable::parse("ghost:enable").unwrap()).unwrap();
        assert_eq!(v.to_string(), "disable");
        let v = eval_variable(&state, &FullVariable::parse("foo:installed").unwrap()).unwrap();
        assert_eq!(v, VariableValue::Bool(true));
    }

    #[test]
    fn config_lookup_global_and_section() {
        let (_dir, state) = state_with_foo();
        let v = eval_variable(&state, &FullVariable::parse("foo:flag").unwrap()).unwrap();
        assert_eq!(v.to_string(), "-fast");
        let v = eval_variable(&state, &FullVariable::parse("foo:foo:asmcomp").unwrap()).unwrap();
        assert_eq!(v.to_string(), "-I lib");

        let err = eval_variable(&state, &FullVariable::parse("foo:ghost").unwrap()).unwrap_err();
        assert!(matches!(err, Error::UnknownVariable(_)));
        let err = eval_variable(&state, &FullVariable::parse("ghost:flag").unwrap()).unwrap_err();
        assert!(matches!(err, Error::NotInstalled(_)));
    }

    #[test]
    fn substitution_replaces_each_marker_once() {
        let (_dir, state) = state_with_foo();
        let out = substitute_string(&state, "x %{foo:flag}% y %{foo:native}% z").unwrap();
        assert_eq!(out, "x -fast y true z");
    }

    #[test]
    fn substitution_is_identity_outside_markers() {
        let (_dir, state) = state_with_foo();
        for s in ["no markers", "50% off }% %{", "a %{not a var}% b"] {
            assert_eq!(substitute_string(&state, s).unwrap(), s);
        }
    }

    #[test]
    fn substitution_does_not_rescan_replacements() {
        let (dir, _) = state_with_foo();
        let layout = Layout::new(dir.path());
        let mut variables = BTreeMap::new();
        variables.insert(
            "flag".to_string(),
            VariableValue::String("%{foo:native}%".to_string()),
        );
        BuildConfig {
            variables,
            sections: vec![],
        }
        .save(&layout.pkg_config_file("sys", "foo"))
        .unwrap();
        let state = State::load(dir.path()).unwrap();

        let out = substitute_string(&state, "%{foo:flag}%").unwrap();
        assert_eq!(out, "%{foo:native}%");
    }

    #[test]
    fn file_substitution() {
        let (dir, state) = state_with_foo();
        let base = dir.path().join("out.txt");
        std::fs::write(dir.path().join("out.txt.in"), "flag=%{foo:flag}%\n").unwrap();
        substitute_file(&state, &base).unwrap();
        assert_eq!(std::fs::read_to_string(&base).unwrap(), "flag=-fast\n");
    }
}
