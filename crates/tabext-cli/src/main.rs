//! Tabext - table extension manager
//!
//! Usage:
//!   tabext list                         # Show installed extensions
//!   tabext install NAME --from PATH     # Install an extension
//!   tabext import extensions.txt        # Install everything in a spec file
//!   tabext repo list                    # Show repositories in search order

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tabext_core::context::AppContext;
use tabext_core::repository::{ExtensionRepository, ImportReport};

#[derive(Parser)]
#[command(name = "tabext")]
#[command(about = "Table extension manager", long_about = None)]
struct Cli {
    /// Repository config file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List installed extensions
    #[command(alias = "ls")]
    List {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show usage and documentation of one extension
    Show {
        /// Extension name (`name` or `collection.name`)
        name: String,
    },

    /// Install extensions from a directory, a .tbx file, or a github: reference
    Install(InstallArgs),

    /// Install every `location -> name` line of a spec file into the default repository
    Import {
        /// Spec file path
        file: PathBuf,
    },

    /// Enable an extension
    Enable { name: String },

    /// Disable an extension (it stays installed but does nothing when called)
    Disable { name: String },

    /// Remove an extension
    #[command(alias = "rm")]
    Remove { name: String },

    /// Reinstall an extension from the location it was installed from
    Reinstall { name: String },

    /// Manage repositories
    Repo(RepoArgs),
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// Machine-readable JSON
    Json,
}

#[derive(Args)]
struct InstallArgs {
    /// Extension names (`name` or `collection.name`)
    #[arg(required = true)]
    names: Vec<String>,

    /// Where the extension files are: directory, .tbx file, or github:owner/repo[@ref][/path]
    #[arg(long)]
    from: String,

    /// Collection to install into
    #[arg(long, short)]
    collection: Option<String>,

    /// Repository to install into (defaults to the default repository)
    #[arg(long, short)]
    repository: Option<String>,
}

#[derive(Args)]
struct RepoArgs {
    #[command(subcommand)]
    command: RepoSubcommand,
}

#[derive(Subcommand)]
enum RepoSubcommand {
    /// List repositories in search order
    List {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Add a repository
    Add {
        /// Repository name
        name: String,

        /// Directory holding the repository (`~/` is expanded)
        location: String,

        /// Search this repository last instead of first
        #[arg(long)]
        back: bool,

        /// Make this the default repository
        #[arg(long)]
        default: bool,
    },

    /// Remove a repository from the config (its files are kept)
    Remove { name: String },

    /// Set the search order; every repository must be named once
    Order {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Set the default repository
    Default { name: String },
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tabext=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let ctx = match cli.config {
        Some(path) => AppContext::new(path)?,
        None => AppContext::with_defaults()?,
    };
    tracing::debug!(config = %ctx.config_path().display(), "Using repository config");
    let mut repo = ctx
        .repository()
        .with_context(|| format!("Failed to open repositories from {}", ctx.config_path().display()))?;

    run_cli(&mut repo, cli.command)
}

fn run_cli(repo: &mut ExtensionRepository, command: Commands) -> Result<()> {
    match command {
        Commands::List { format } => match format {
            OutputFormat::Text => print!("{}", repo.list_all()),
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&repo.summaries())?);
            }
        },
        Commands::Show { name } => {
            println!("{}", repo.show(&name)?);
        }
        Commands::Install(args) => run_install(repo, args)?,
        Commands::Import { file } => {
            let report = repo
                .import_file(&file)
                .with_context(|| format!("Failed to import {}", file.display()))?;
            print_import_report(&report);
        }
        Commands::Enable { name } => {
            repo.enable(&name)?;
            println!("✓ Enabled '{}'", name);
        }
        Commands::Disable { name } => {
            repo.disable(&name)?;
            println!("✓ Disabled '{}'", name);
        }
        Commands::Remove { name } => {
            repo.remove(&name)?;
            println!("✓ Removed '{}'", name);
        }
        Commands::Reinstall { name } => {
            repo.reinstall(&name)?;
            println!("✓ Reinstalled '{}'", name);
        }
        Commands::Repo(args) => run_repo(repo, args)?,
    }

    Ok(())
}

fn run_install(repo: &mut ExtensionRepository, args: InstallArgs) -> Result<()> {
    let names: Vec<&str> = args.names.iter().map(String::as_str).collect();
    let installed = repo.install(
        &names,
        &args.from,
        args.collection.as_deref(),
        args.repository.as_deref(),
    )?;

    let target = args
        .repository
        .unwrap_or_else(|| repo.default_repository().to_string());
    for name in installed {
        println!("✓ Installed '{}' into repository '{}'", name, target);
        if let Ok(function) = repo.resolve(&name.collection, &name.name)
            && let Some(missing) = function.missing_dependency()
        {
            println!("  ⚠ module '{}' needs to be installed before it can run", missing.module);
        }
    }
    Ok(())
}

fn print_import_report(report: &ImportReport) {
    for name in &report.installed {
        println!("✓ Installed '{}'", name);
    }
    for name in &report.unchanged {
        println!("• '{}' is already installed", name);
    }
    for name in &report.degraded {
        println!("⚠ '{}' is installed but has a missing module dependency", name);
    }
    if report.installed.is_empty() && report.unchanged.is_empty() && report.degraded.is_empty() {
        println!("No extensions listed in spec");
    }
}

fn run_repo(repo: &mut ExtensionRepository, args: RepoArgs) -> Result<()> {
    match args.command {
        RepoSubcommand::List { format } => match format {
            OutputFormat::Text => print_repo_table(repo),
            OutputFormat::Json => {
                let output: Vec<_> = repo
                    .repositories()
                    .iter()
                    .map(|r| {
                        serde_json::json!({
                            "name": r.name,
                            "location": r.location,
                            "default": r.name == repo.default_repository(),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
        },
        RepoSubcommand::Add {
            name,
            location,
            back,
            default,
        } => {
            repo.add_repository(&name, &location, !back, default)?;
            println!("Added repository '{}' at {}", name, location);
        }
        RepoSubcommand::Remove { name } => {
            repo.remove_repository(&name)?;
            println!("Removed repository '{}'", name);
        }
        RepoSubcommand::Order { names } => {
            repo.reorder_repositories(&names)?;
            println!("Search order: {}", repo.search_order().join(", "));
        }
        RepoSubcommand::Default { name } => {
            repo.set_default_repository(&name)?;
            println!("Default repository: {}", name);
        }
    }

    Ok(())
}

fn print_repo_table(repo: &ExtensionRepository) {
    println!("{:<20} {:<10} Location", "Name", "Default");
    println!("{}", "-".repeat(60));

    for entry in repo.repositories() {
        let marker = if entry.name == repo.default_repository() {
            "*"
        } else {
            ""
        };
        println!("{:<20} {:<10} {}", entry.name, marker, entry.location);
    }
}
