#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use cast_sync::{CastConfig, CastError, CastHome, HorizontalSync, Registry, SyncOptions};

#[derive(Debug, Parser)]
#[command(name = "cast", about = "Peer-to-peer sync for note vaults", version)]
struct Cli {
    /// Cast root to operate on; defaults to the nearest ancestor with .cast/
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a fresh .cast/config.yaml in the target root
    Init {
        /// Human name for this cast
        #[arg(long)]
        name: String,
    },
    /// Register the cast root in the machine registry
    Install,
    /// Remove a cast from the machine registry
    Uninstall {
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        name: Option<String>,
    },
    /// List registered casts
    List,
    /// Run horizontal sync from this root
    Sync {
        /// Plan only, change nothing
        #[arg(long)]
        dry_run: bool,
        /// Resolve conflicts by keeping local, never prompt
        #[arg(long)]
        non_interactive: bool,
        /// Do not recurse into peers-of-peers
        #[arg(long)]
        no_cascade: bool,
        /// Restrict to these peer names
        #[arg(long = "peer")]
        peers: Vec<String>,
        /// Restrict to one relpath or cast-id
        #[arg(long)]
        file: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let code = run(&cli);
    ExitCode::from(u8::try_from(code).unwrap_or(2))
}

fn run(cli: &Cli) -> i32 {
    let home = CastHome::from_env();

    match &cli.command {
        Command::Init { name } => {
            let _ = cast_sync::logger::init_console();
            let root = cli
                .root
                .clone()
                .or_else(|| std::env::current_dir().ok());
            let Some(root) = root else {
                log::error!("no target root; pass --root");
                return 2;
            };
            let config_path = cast_sync::fsutil::config_path(&root);
            if config_path.exists() {
                log::error!("already initialized: {}", config_path.display());
                return 2;
            }
            let config = CastConfig::new(name);
            match config.save(&root) {
                Ok(()) => {
                    log::info!("initialized cast '{}' (id={})", config.cast_name, config.cast_id);
                    0
                }
                Err(e) => {
                    log::error!("init failed: {e}");
                    2
                }
            }
        }
        Command::Install => {
            let _ = cast_sync::logger::init_console();
            let Some(root) = target_root(cli, true) else {
                return 2;
            };
            match Registry::register(&home, &root) {
                Ok(entry) => {
                    log::info!(
                        "installed cast: {} (id={})\n  root: {}",
                        entry.name,
                        entry.cast_id,
                        entry.root.display()
                    );
                    0
                }
                Err(e) => {
                    log::error!("install failed: {e}");
                    2
                }
            }
        }
        Command::Uninstall { id, name } => {
            let _ = cast_sync::logger::init_console();
            let root = if id.is_none() && name.is_none() { target_root(cli, false) } else { None };
            match Registry::unregister(&home, id.as_deref(), name.as_deref(), root.as_deref()) {
                Ok(Some(entry)) => {
                    log::info!("uninstalled cast: {} (id={})", entry.name, entry.cast_id);
                    0
                }
                Ok(None) => {
                    log::warn!("no matching cast in registry");
                    1
                }
                Err(e) => {
                    log::error!("uninstall failed: {e}");
                    2
                }
            }
        }
        Command::List => {
            let _ = cast_sync::logger::init_console();
            match Registry::load(&home) {
                Ok(reg) => {
                    for entry in reg.list() {
                        log::info!(
                            "{}\t{}\t{}",
                            entry.name,
                            entry.cast_id,
                            entry.root.display()
                        );
                    }
                    0
                }
                Err(e) => {
                    log::error!("registry load failed: {e}");
                    2
                }
            }
        }
        Command::Sync { dry_run, non_interactive, no_cascade, peers, file } => {
            let Some(root) = target_root(cli, false) else {
                eprintln!("error: not in a cast root (no .cast/ found)");
                return 2;
            };
            let _ = cast_sync::logger::init_for_root(&root, cli.verbose);
            let opts = SyncOptions {
                peer_filter: peers.clone(),
                file_filter: file.clone(),
                dry_run: *dry_run,
                non_interactive: *non_interactive,
                cascade: !*no_cascade,
            };
            match HorizontalSync::new(&root, &home).and_then(|mut hs| hs.sync(&opts)) {
                Ok(code) => code,
                Err(e @ (CastError::LockBusy(_) | CastError::ConfigMissing(_))) => {
                    log::error!("unable to start: {e}");
                    2
                }
                Err(e) => {
                    log::error!("sync failed: {e}");
                    2
                }
            }
        }
    }
}

/// Resolve the root to act on: `--root`, else walk up from the current
/// directory. With `must_exist` the root must already contain `.cast/`.
fn target_root(cli: &Cli, must_exist: bool) -> Option<PathBuf> {
    if let Some(root) = &cli.root {
        if must_exist && !cast_sync::fsutil::cast_dir(root).is_dir() {
            log::error!("not a cast root (no .cast/): {}", root.display());
            return None;
        }
        return Some(root.clone());
    }
    let cwd = std::env::current_dir().ok()?;
    let found = cast_sync::find_cast_root(&cwd);
    if found.is_none() {
        log::error!("not in a cast root directory (no .cast/ found)");
    }
    found
}
