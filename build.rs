// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("smelt")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Source-based package manager with per-compiler switches")
        .arg(
            Arg::new("root")
                .long("root")
                .value_name("DIR")
                .help("Root directory (defaults to ~/.smelt)"),
        )
        .arg(
            Arg::new("yes")
                .long("yes")
                .short('y')
                .action(clap::ArgAction::SetTrue)
                .help("Answer yes to every question"),
        )
        .subcommand(
            Command::new("init")
                .about("Initialize the root with one repository and a first switch")
                .arg(Arg::new("repo-name").long("repo-name").default_value("default"))
                .arg(Arg::new("repo-address").long("repo-address").required(true))
                .arg(Arg::new("repo-kind").long("repo-kind").default_value("local"))
                .arg(Arg::new("alias").long("alias").default_value("default"))
                .arg(Arg::new("compiler").long("compiler").default_value("system")),
        )
        .subcommand(Command::new("list").about("List known packages"))
        .subcommand(
            Command::new("info")
                .about("Show details about one package")
                .arg(Arg::new("package").required(true)),
        )
        .subcommand(
            Command::new("install")
                .about("Install packages")
                .arg(Arg::new("packages").required(true).num_args(1..)),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove an installed package")
                .arg(Arg::new("package").required(true)),
        )
        .subcommand(Command::new("upgrade").about("Upgrade installed packages"))
        .subcommand(Command::new("update").about("Synchronize repositories"))
        .subcommand(
            Command::new("upload")
                .about("Publish a package into a repository")
                .arg(Arg::new("manifest").long("manifest").required(true))
                .arg(Arg::new("descr").long("descr").required(true))
                .arg(Arg::new("archive").long("archive").required(true))
                .arg(Arg::new("repo")),
        )
        .subcommand(
            Command::new("remote")
                .about("Manage repositories")
                .subcommand(Command::new("list"))
                .subcommand(
                    Command::new("add")
                        .arg(Arg::new("name").required(true))
                        .arg(Arg::new("address").required(true))
                        .arg(Arg::new("kind").required(true)),
                )
                .subcommand(Command::new("rm").arg(Arg::new("name").required(true))),
        )
        .subcommand(
            Command::new("switch")
                .about("Select (and create if needed) a switch")
                .arg(
                    Arg::new("clone")
                        .long("clone")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(Arg::new("alias").required(true))
                .arg(Arg::new("compiler")),
        )
        .subcommand(Command::new("compiler-list").about("List available compilers"))
        .subcommand(
            Command::new("config")
                .about("Query the current switch's configuration")
                .subcommand(Command::new("env"))
                .subcommand(Command::new("list-vars"))
                .subcommand(Command::new("variable").arg(Arg::new("variable").required(true)))
                .subcommand(Command::new("subst").arg(Arg::new("files").required(true).num_args(1..)))
                .subcommand(
                    Command::new("includes")
                        .arg(
                            Arg::new("recursive")
                                .long("recursive")
                                .short('r')
                                .action(clap::ArgAction::SetTrue),
                        )
                        .arg(Arg::new("names").required(true).num_args(1..)),
                )
                .subcommand(
                    Command::new("compil")
                        .arg(Arg::new("mode").required(true))
                        .arg(Arg::new("sections").num_args(0..)),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("smelt.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
