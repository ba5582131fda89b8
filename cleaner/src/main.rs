//! Maya worm cleaner.
//!
//! Removes the `vaccine`/`leukocyte` worm from scenes and user script
//! directories. Every file is snapshotted into the backup staging directory
//! before it is changed.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use cleaner::core::signatures::SignatureSet;
use cleaner::engine::Cleaner;
use cleaner::exit_codes;
use cleaner::io::ascii_scene::AsciiSceneRuntime;
use cleaner::io::backup::BackupCoordinator;
use cleaner::io::config::{CleanerConfig, load_config, write_config};
use cleaner::io::discover::home_dir;
use cleaner::io::report::{LogFileSink, write_summary};
use cleaner::ledger::{ConsoleSink, RunLedger, RunStatus};
use cleaner::logging;
use cleaner::modes::Mode;

#[derive(Parser)]
#[command(
    name = "cleaner",
    version,
    about = "Detect and remove the vaccine/leukocyte Maya script worm"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Append every event to this file.
    #[arg(long, global = true, value_name = "FILE")]
    log: Option<PathBuf>,

    /// Write the run result as JSON to this file.
    #[arg(long, global = true, value_name = "FILE")]
    json: Option<PathBuf>,

    /// TOML configuration; defaults apply when absent.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Clean one scene file (`.ma`).
    Scene {
        /// Scene to clean. Without it the runtime's open scene is used.
        path: Option<PathBuf>,
    },
    /// Clean every scene file under a directory, recursively.
    Directory { path: PathBuf },
    /// Clean `userSetup.py` and remove worm files in Maya user script dirs.
    User {
        /// Home directory to search instead of `HOME`/`USERPROFILE`.
        #[arg(long, value_name = "DIR")]
        home: Option<PathBuf>,
    },
    /// Write the default configuration to a TOML file.
    InitConfig {
        path: PathBuf,
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let code = match &cli.command {
        Command::InitConfig { path, force } => match init_config(path, *force) {
            Ok(()) => exit_codes::OK,
            Err(err) => {
                eprintln!("{err:#}");
                exit_codes::ERROR
            }
        },
        _ => clean(&cli),
    };
    std::process::exit(code);
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &CleanerConfig::default())
}

fn clean(cli: &Cli) -> i32 {
    let mut ledger = RunLedger::new().with_sink(ConsoleSink);
    if let Some(path) = &cli.log {
        match LogFileSink::open(path) {
            Ok(sink) => ledger.attach(sink),
            Err(err) => ledger.warn(format!("WARNING: Could not open log file: {err:#}")),
        }
    }

    let ledger = match prepare(cli) {
        Ok((config, mode)) => {
            let backups = BackupCoordinator::new(config.backup_root());
            let mut cleaner = Cleaner::new(
                config,
                SignatureSet::v1(),
                backups,
                AsciiSceneRuntime::new(),
                ledger,
            );
            if let Err(err) = cleaner.run(&mode) {
                cleaner.ledger_mut().fail(format!("{err:#}"));
            }
            cleaner.finish();
            cleaner.into_ledger()
        }
        Err(err) => {
            ledger.fail(format!("{err:#}"));
            ledger
        }
    };

    let summary = ledger.finalize();
    if let Some(path) = &cli.json {
        if let Err(err) = write_summary(path, &summary) {
            eprintln!("{err:#}");
            return exit_codes::ERROR;
        }
    }
    match summary.status {
        RunStatus::Success => exit_codes::OK,
        RunStatus::Error => exit_codes::ERROR,
    }
}

fn prepare(cli: &Cli) -> Result<(CleanerConfig, Mode)> {
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => CleanerConfig::default(),
    };
    let mode = match &cli.command {
        Command::Scene { path } => Mode::Scene(path.clone()),
        Command::Directory { path } => Mode::Directory(path.clone()),
        Command::User { home } => {
            let home = home
                .clone()
                .or_else(home_dir)
                .context("cannot determine the home directory; pass --home")?;
            Mode::User { home }
        }
        Command::InitConfig { .. } => bail!("init-config does not clean anything"),
    };
    Ok((config, mode))
}
