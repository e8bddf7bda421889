//! DCvs Administration CLI

mod status;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use dcvs_core::repos::short_repository;
use dcvs_core::{
    ClassifyOptions, CvsRoot, Entries, LockManager, RootAllowList, VersionRequest, name_repository, resolve_root,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "dcvs-admin")]
#[command(author = "DCvs Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Inspect CVS working copies and repository locks")]
struct Cli {
    /// Repository root, overriding CVS/Root
    #[arg(short = 'd', long, global = true)]
    root: Option<String>,

    /// Fallback root when neither -d nor CVS/Root give one
    #[arg(long, env = "CVSROOT", global = true, hide_env_values = true)]
    env_root: Option<String>,

    /// Only accept these repository roots (repeatable)
    #[arg(long = "allow-root", global = true)]
    allow_root: Vec<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify the files of a working directory
    Status {
        #[arg(default_value = ".")]
        dir: PathBuf,
        /// Compare against this tag or revision
        #[arg(short = 'r', long)]
        tag: Option<String>,
        /// Compare against the latest revision before this RCS date
        #[arg(short = 'D', long)]
        date: Option<String>,
        /// Keyword expansion options, e.g. -kb
        #[arg(short = 'k', long)]
        options: Option<String>,
        /// Ignore files that do not carry the tag
        #[arg(short = 'f', long)]
        force_tag_match: bool,
    },

    /// List the Entries of a working directory
    Entries {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },

    /// Show the root and repository a working directory maps to
    Where {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },

    /// Show (or clear) the locks of a repository directory
    Locks {
        /// Repository directory, absolute or relative to the root
        path: String,
        /// Remove lock files older than this many seconds
        #[arg(long)]
        clear_stale: Option<u64>,
    },
}

/// Local root selected for a working directory
fn local_root(cli: &Cli, dir: &Path) -> Result<CvsRoot> {
    let root = resolve_root(cli.root.as_deref(), dir, cli.env_root.as_deref())?;
    if root.is_remote() {
        bail!("{} is a remote root; only local repositories can be inspected", root);
    }
    if !cli.allow_root.is_empty() {
        let mut allowed = RootAllowList::new();
        for r in &cli.allow_root {
            allowed.add(r);
        }
        allowed.check(&root.directory)?;
    }
    Ok(root)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
struct Location {
    root: String,
    repository: String,
    relative: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = if cli.debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();

    match &cli.command {
        Commands::Status {
            dir,
            tag,
            date,
            options,
            force_tag_match,
        } => {
            let root = local_root(&cli, dir)?;
            let repository = name_repository(dir, &root)?;
            let request = VersionRequest {
                tag: tag.clone(),
                date: date.clone(),
                options: options.clone(),
                force_tag_match: *force_tag_match,
                ..Default::default()
            };
            let opts = ClassifyOptions {
                force_tag_match: *force_tag_match,
                ..Default::default()
            };
            let statuses = status::run(dir, &root, &repository, &request, &opts).await?;
            if cli.json {
                print_json(&statuses)?;
            } else {
                print!("{}", status::render(&statuses, &repository, &root));
            }
        }

        Commands::Entries { dir } => {
            let entries = Entries::open_readonly(dir)
                .with_context(|| format!("cannot read entries of {}", dir.display()))?;
            if cli.json {
                let list: Vec<_> = entries.list().values().collect();
                print_json(&list)?;
            } else {
                for entry in entries.list().values() {
                    println!("{}", entry);
                }
                if entries.subdirs_known() && entries.dirs().next().is_none() {
                    println!("D");
                }
            }
        }

        Commands::Where { dir } => {
            let root = resolve_root(cli.root.as_deref(), dir, cli.env_root.as_deref())?;
            let repository = name_repository(dir, &root)?;
            let location = Location {
                root: root.to_string(),
                relative: short_repository(&repository, &root.directory).to_string(),
                repository,
            };
            if cli.json {
                print_json(&location)?;
            } else {
                println!("Root:       {}", location.root);
                println!("Repository: {}", location.repository);
                println!("Relative:   {}", location.relative);
            }
        }

        Commands::Locks { path, clear_stale } => {
            let root = local_root(&cli, Path::new("."))?;
            let root_dir = PathBuf::from(&root.directory);
            let repository = if Path::new(path).is_absolute() {
                PathBuf::from(path)
            } else {
                root_dir.join(path)
            };
            let manager = LockManager::for_repository(&root_dir)
                .with_context(|| format!("cannot read configuration of {}", root))?;
            if let Some(secs) = clear_stale {
                let removed = manager.clear_stale(&repository, Duration::from_secs(*secs))?;
                tracing::info!("removed {} stale lock files", removed);
                if !cli.json {
                    println!("Removed {} stale lock file(s)", removed);
                }
            }
            let lock_status = manager.lock_status(&repository)?;
            if cli.json {
                print_json(&lock_status)?;
            } else if lock_status.is_free() {
                println!("{}: no locks", repository.display());
            } else {
                println!("{}:", repository.display());
                if lock_status.master {
                    let age = lock_status.master_age_secs.unwrap_or_default();
                    println!("  master lock held ({}s)", age);
                }
                for holder in &lock_status.writers {
                    println!("  write     {}", holder);
                }
                for holder in &lock_status.promotable {
                    println!("  promotable {}", holder);
                }
                for holder in &lock_status.readers {
                    println!("  read      {}", holder);
                }
            }
        }
    }

    Ok(())
}
