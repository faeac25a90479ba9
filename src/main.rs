// src/main.rs
//! smelt - CLI entry point

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use smelt::cli;
use smelt::config::RepoKind;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;

// =============================================================================
// CLI Definitions
// =============================================================================

#[derive(Parser)]
#[command(name = "smelt")]
#[command(version)]
#[command(about = "Source-based package manager with per-compiler switches", long_about = None)]
struct Cli {
    /// Root directory (defaults to ~/.smelt)
    #[arg(long, global = true, env = "SMELT_ROOT")]
    root: Option<PathBuf>,

    /// Answer yes to every question
    #[arg(long, short = 'y', global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the root with one repository and a first switch
    Init {
        /// Repository name
        #[arg(long, default_value = "default")]
        repo_name: String,

        /// Repository address (directory, file:// or http(s) URL, git URL)
        #[arg(long)]
        repo_address: String,

        /// Repository kind: git, http or local
        #[arg(long, default_value = "local")]
        repo_kind: String,

        /// Name of the first switch
        #[arg(long, default_value = "default")]
        alias: String,

        /// Compiler version the first switch is bound to
        #[arg(long, default_value = "system")]
        compiler: String,
    },

    /// List known packages
    List,

    /// Show details about one package
    Info {
        /// Package name
        package: String,
    },

    /// Install packages
    Install {
        /// Package names, or name.version to pin a version
        #[arg(required = true)]
        packages: Vec<String>,
    },

    /// Remove an installed package
    Remove {
        /// Package name
        package: String,
    },

    /// Upgrade installed packages to the latest available versions
    Upgrade,

    /// Synchronize repositories and rebuild the derived views
    Update,

    /// Publish a package into a repository
    Upload {
        /// Package manifest file
        #[arg(long)]
        manifest: PathBuf,

        /// Description file
        #[arg(long)]
        descr: PathBuf,

        /// Source archive (.tar.gz)
        #[arg(long)]
        archive: PathBuf,

        /// Target repository (defaults to the highest-priority one)
        repo: Option<String>,
    },

    /// Manage repositories
    Remote {
        #[command(subcommand)]
        command: RemoteCommands,
    },

    /// Select (and create if needed) a switch
    Switch {
        /// Also install the previous switch's packages
        #[arg(long)]
        clone: bool,

        /// Switch name
        alias: String,

        /// Compiler version (required to create a new switch)
        compiler: Option<String>,
    },

    /// List the available compiler descriptions
    CompilerList,

    /// Query the current switch's configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum RemoteCommands {
    /// List configured repositories
    List,
    /// Add a repository
    Add {
        name: String,
        address: String,
        /// git, http or local
        kind: String,
    },
    /// Remove a repository
    Rm { name: String },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the composed build environment
    Env,
    /// Enumerate the variables of every installed package
    ListVars,
    /// Print the value of one variable
    Variable { variable: String },
    /// Apply file substitution to templates
    Subst {
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// Print -I flags for package library directories
    Includes {
        /// Close over dependencies
        #[arg(short = 'r', long)]
        recursive: bool,
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Print compiler flags for a section closure
    Compil {
        /// bytecomp, asmcomp, bytelink or asmlink
        mode: String,
        sections: Vec<String>,
    },
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn default_root() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".smelt")
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Cli::parse();
    let root = args.root.clone().unwrap_or_else(default_root);
    let yes = args.yes;

    match args.command {
        Commands::Init {
            repo_name,
            repo_address,
            repo_kind,
            alias,
            compiler,
        } => {
            let kind = RepoKind::from_str(&repo_kind)?;
            cli::cmd_init(&root, &repo_name, &repo_address, kind, &alias, &compiler, yes)?;
        }

        Commands::List => cli::cmd_list(&root)?,

        Commands::Info { package } => cli::cmd_info(&root, &package)?,

        Commands::Install { packages } => cli::cmd_install(&root, &packages, yes)?,

        Commands::Remove { package } => cli::cmd_remove(&root, &package, yes)?,

        Commands::Upgrade => cli::cmd_upgrade(&root, yes)?,

        Commands::Update => cli::cmd_update(&root)?,

        Commands::Upload {
            manifest,
            descr,
            archive,
            repo,
        } => cli::cmd_upload(&root, &manifest, &descr, &archive, repo.as_deref())?,

        Commands::Remote { command } => match command {
            RemoteCommands::List => cli::cmd_remote_list(&root)?,
            RemoteCommands::Add {
                name,
                address,
                kind,
            } => {
                let kind = RepoKind::from_str(&kind)?;
                cli::cmd_remote_add(&root, &name, &address, kind)?;
            }
            RemoteCommands::Rm { name } => cli::cmd_remote_rm(&root, &name)?,
        },

        Commands::Switch {
            clone,
            alias,
            compiler,
        } => cli::cmd_switch(&root, clone, &alias, compiler.as_deref(), yes)?,

        Commands::CompilerList => cli::cmd_compiler_list(&root)?,

        Commands::Config { command } => match command {
            ConfigCommands::Env => cli::cmd_config_env(&root)?,
            ConfigCommands::ListVars => cli::cmd_config_list_vars(&root)?,
            ConfigCommands::Variable { variable } => cli::cmd_config_variable(&root, &variable)?,
            ConfigCommands::Subst { files } => cli::cmd_config_subst(&root, &files)?,
            ConfigCommands::Includes { recursive, names } => {
                cli::cmd_config_includes(&root, recursive, &names)?;
            }
            ConfigCommands::Compil { mode, sections } => {
                cli::cmd_config_compil(&root, &mode, &sections)?;
            }
        },

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "smelt", &mut io::stdout());
        }
    }

    Ok(())
}
