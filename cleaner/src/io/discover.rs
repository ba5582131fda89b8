//! Enumeration of candidate scene files and Maya user script directories.

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::io::config::CleanerConfig;

/// Per-platform parents of `<version>/scripts` directories, relative to home.
const MAYA_PREFS_ROOTS: &[&[&str]] = &[
    &["Documents", "maya"],
    &["AppData", "Roaming", "Autodesk", "maya"],
    &["maya"],
    &["Library", "Preferences", "Autodesk", "maya"],
];

/// Recursively collect scene files under `root`, sorted by path.
///
/// Unreadable entries are skipped with a warning rather than failing the walk.
pub fn find_scene_files(root: &Path, config: &CleanerConfig) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(anyhow!("{} is not a directory", root.display()));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(err = %err, "skipping unreadable entry");
                continue;
            }
        };
        if entry.file_type().is_file() && config.is_scene_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    debug!(root = %root.display(), count = files.len(), "scene files found");
    Ok(files)
}

/// Home directory from `HOME` or `USERPROFILE`.
pub fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
}

/// Existing Maya user script directories under `home`, plus `runtime_dir`.
///
/// Returns a sorted, de-duplicated list. A missing or unreadable preference
/// root is not an error; it is logged and contributes nothing.
pub fn user_script_dirs(home: &Path, runtime_dir: Option<&Path>) -> Vec<PathBuf> {
    let mut dirs = BTreeSet::new();
    for parts in MAYA_PREFS_ROOTS {
        let prefs_root = parts.iter().fold(home.to_path_buf(), |acc, part| acc.join(part));
        if !prefs_root.is_dir() {
            continue;
        }
        let entries = match fs::read_dir(&prefs_root) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(root = %prefs_root.display(), err = %err, "skipping unreadable preference root");
                continue;
            }
        };
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(root = %prefs_root.display(), err = %err, "skipping unreadable entry");
                    continue;
                }
            };
            let scripts = entry.path().join("scripts");
            if scripts.is_dir() {
                dirs.insert(scripts);
            }
        }
    }
    if let Some(dir) = runtime_dir.filter(|dir| dir.is_dir()) {
        dirs.insert(dir.to_path_buf());
    }
    dirs.into_iter().collect()
}
