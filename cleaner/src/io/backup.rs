//! Pre-mutation snapshots under a dated staging directory.
//!
//! Layout: `<root>/<YYYYMMDD>/<file name>_<HHMMSS>[_<n>].backup`. The day is
//! fixed when the coordinator is created, so one run writes into one
//! directory even across midnight. Backups are never pruned here.

use std::ffi::OsStr;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use tracing::debug;

/// Name of the staging directory created under the system temp dir.
pub const DEFAULT_BACKUP_DIR_NAME: &str = "maya_cleaner_backups";

/// Upper bound on same-second collisions for one file name.
const MAX_NAME_ATTEMPTS: u32 = 10_000;

/// A verified byte-for-byte copy of a file taken before it was changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    pub source: PathBuf,
    pub backup: PathBuf,
    pub bytes: u64,
}

/// Creates [`BackupRecord`]s for one run.
///
/// Holds no mutable state: directory creation is idempotent and each
/// destination is reserved with `create_new`, so concurrent snapshots of
/// distinct sources never collide.
#[derive(Debug, Clone)]
pub struct BackupCoordinator {
    day_dir: PathBuf,
}

impl BackupCoordinator {
    /// Stage backups under `root` in a directory for today's date.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::for_day(root, Local::now().date_naive())
    }

    pub fn for_day(root: impl Into<PathBuf>, day: NaiveDate) -> Self {
        let day_dir = root.into().join(day.format("%Y%m%d").to_string());
        Self { day_dir }
    }

    /// Default staging root: `<temp dir>/maya_cleaner_backups`.
    pub fn default_root() -> PathBuf {
        std::env::temp_dir().join(DEFAULT_BACKUP_DIR_NAME)
    }

    pub fn day_dir(&self) -> &Path {
        &self.day_dir
    }

    /// Copy `source` into the staging directory and verify the copy length.
    pub fn snapshot(&self, source: &Path) -> Result<BackupRecord> {
        let meta =
            fs::metadata(source).with_context(|| format!("stat {}", source.display()))?;
        if !meta.is_file() {
            bail!("{} is not a regular file", source.display());
        }
        let file_name = source
            .file_name()
            .with_context(|| format!("{} has no file name", source.display()))?;

        fs::create_dir_all(&self.day_dir)
            .with_context(|| format!("create backup dir {}", self.day_dir.display()))?;

        let stamp = Local::now().format("%H%M%S").to_string();
        let (backup, mut dest) = reserve_destination(&self.day_dir, file_name, &stamp)?;

        let copied = copy_into(source, &mut dest);
        let bytes = match copied {
            Ok(bytes) if bytes == meta.len() => bytes,
            Ok(bytes) => {
                drop(dest);
                let _ = fs::remove_file(&backup);
                bail!(
                    "backup {} is incomplete: copied {} of {} bytes",
                    backup.display(),
                    bytes,
                    meta.len()
                );
            }
            Err(err) => {
                drop(dest);
                let _ = fs::remove_file(&backup);
                return Err(err)
                    .with_context(|| format!("copy {} to {}", source.display(), backup.display()));
            }
        };

        // Metadata is best effort; the bytes are what matter.
        if let Ok(modified) = meta.modified() {
            if let Err(err) = dest.set_modified(modified) {
                debug!(err = %err, backup = %backup.display(), "could not preserve mtime");
            }
        }
        drop(dest);
        if let Err(err) = fs::set_permissions(&backup, meta.permissions()) {
            debug!(err = %err, backup = %backup.display(), "could not preserve permissions");
        }

        debug!(source = %source.display(), backup = %backup.display(), bytes, "backup written");
        Ok(BackupRecord {
            source: source.to_path_buf(),
            backup,
            bytes,
        })
    }
}

fn copy_into(source: &Path, dest: &mut File) -> io::Result<u64> {
    let mut reader = File::open(source)?;
    let bytes = io::copy(&mut reader, dest)?;
    dest.sync_all()?;
    Ok(bytes)
}

fn reserve_destination(dir: &Path, file_name: &OsStr, stamp: &str) -> Result<(PathBuf, File)> {
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let mut name = file_name.to_os_string();
        name.push("_");
        name.push(stamp);
        if attempt > 0 {
            name.push(format!("_{attempt}"));
        }
        name.push(".backup");
        let path = dir.join(name);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
            Err(err) => {
                return Err(err).with_context(|| format!("create backup {}", path.display()));
            }
        }
    }
    bail!(
        "no free backup name for {} in {}",
        Path::new(file_name).display(),
        dir.display()
    )
}
