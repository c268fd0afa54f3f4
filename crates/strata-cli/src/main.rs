use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use strata_config::{LoggingConfig, VfsConfig};
use strata_vfs::{MountInfo, Vfs, VfsPath};

#[derive(Parser)]
#[command(name = "strata", version, about = "Strata asset VFS (mounts, listing, reads)")]
struct Cli {
    /// TOML file describing the mounts
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory relative mount paths resolve against (defaults to the config
    /// file's directory, or the current directory)
    #[arg(long)]
    base_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List mounts in priority order
    Mounts(JsonArgs),
    /// List every file at or below a rooted path
    Find(FindArgs),
    /// Write the contents of a file to stdout
    Cat(PathArgs),
    /// Exit 0 if the file exists, 1 otherwise
    Exists(PathArgs),
    /// Print the on-disk location of a file (exit 1 if it has none)
    Which(PathArgs),
}

#[derive(Args)]
struct JsonArgs {
    /// Emit JSON suitable for scripts
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct FindArgs {
    /// Rooted VFS path, e.g. `/textures`
    #[arg(default_value = "/")]
    path: String,
    /// Emit JSON suitable for scripts
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct PathArgs {
    /// Rooted VFS path, e.g. `/textures/grass.png`
    path: String,
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            2
        }
    };

    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32> {
    let config = match &cli.config {
        Some(path) => VfsConfig::load_from_path(path)?,
        None => VfsConfig {
            logging: LoggingConfig {
                level: "warn".to_owned(),
                ..LoggingConfig::default()
            },
            ..VfsConfig::default()
        },
    };
    strata_config::init_tracing(&config.logging);

    let base_dir = resolve_base_dir(cli.base_dir.as_deref(), cli.config.as_deref())?;
    let vfs = Vfs::from_config_with_base_dir(&config, &base_dir)
        .with_context(|| format!("failed to mount assets from {}", base_dir.display()))?;
    tracing::debug!(
        target = "strata.cli",
        base_dir = %base_dir.display(),
        mounts = vfs.mounts().len(),
        "vfs ready"
    );

    match cli.command {
        Command::Mounts(args) => {
            let mounts: Vec<MountInfo> = vfs.mounts().collect();
            if args.json {
                print_json(&mounts)?;
            } else {
                for (priority, mount) in mounts.iter().enumerate() {
                    println!(
                        "{priority}: {} <- {} {}",
                        mount.prefix, mount.kind, mount.origin
                    );
                }
            }
            Ok(0)
        }
        Command::Find(args) => {
            let path = parse_path(&args.path)?;
            let files = vfs
                .find(&path)?
                .collect::<strata_vfs::Result<Vec<_>>>()
                .with_context(|| format!("failed to list {path}"))?;
            if args.json {
                print_json(&files)?;
            } else {
                for file in &files {
                    println!("{file}");
                }
            }
            Ok(0)
        }
        Command::Cat(args) => {
            let path = parse_path(&args.path)?;
            let mut stream = vfs.read(&path)?;
            let mut stdout = io::stdout().lock();
            io::copy(&mut stream, &mut stdout)
                .with_context(|| format!("failed to read {path}"))?;
            stdout.flush()?;
            Ok(0)
        }
        Command::Exists(args) => {
            let path = parse_path(&args.path)?;
            Ok(if vfs.exists(&path)? { 0 } else { 1 })
        }
        Command::Which(args) => {
            let path = parse_path(&args.path)?;
            match vfs.get_disk_path(&path)? {
                Some(disk) => {
                    println!("{}", disk.display());
                    Ok(0)
                }
                None => {
                    eprintln!("{path}: no on-disk copy");
                    Ok(1)
                }
            }
        }
    }
}

fn resolve_base_dir(base_dir: Option<&Path>, config: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = base_dir {
        return Ok(dir.to_path_buf());
    }
    if let Some(parent) = config.and_then(Path::parent) {
        if !parent.as_os_str().is_empty() {
            return Ok(parent.to_path_buf());
        }
    }
    std::env::current_dir().context("failed to determine current directory")
}

fn parse_path(input: &str) -> Result<VfsPath> {
    VfsPath::parse(input).with_context(|| format!("invalid VFS path `{input}`"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value)?;
    println!("{out}");
    Ok(())
}
