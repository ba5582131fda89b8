//! Cleaner configuration loaded from an optional TOML file (`--config`).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::io::backup::BackupCoordinator;
use crate::io::fs::write_atomic;

/// Cleaner configuration (TOML).
///
/// Missing fields default to the values the cleaner ships with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CleanerConfig {
    /// Staging root for backups. Defaults to `<temp>/maya_cleaner_backups`.
    pub backup_root: Option<PathBuf>,

    /// Skip a scene when its backup cannot be written.
    ///
    /// Text files always require a backup. Scenes are remediated without one
    /// unless this is set.
    pub scene_requires_backup: bool,

    /// File extensions (without dot, case-insensitive) treated as scenes in
    /// directory mode.
    pub scene_extensions: Vec<String>,

    /// Startup script rewritten in user script directories.
    pub setup_file_name: String,

    /// Stand-alone worm files deleted from user script directories.
    pub dropper_files: Vec<String>,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            backup_root: None,
            scene_requires_backup: false,
            scene_extensions: vec!["ma".to_string(), "mb".to_string()],
            setup_file_name: "userSetup.py".to_string(),
            dropper_files: vec![
                "userSetup.mel".to_string(),
                "vaccine.py".to_string(),
                "fuckVirus.py".to_string(),
            ],
        }
    }
}

impl CleanerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.scene_extensions.is_empty() {
            return Err(anyhow!("scene_extensions must not be empty"));
        }
        if let Some(ext) = self
            .scene_extensions
            .iter()
            .find(|ext| ext.trim().is_empty() || ext.starts_with('.'))
        {
            return Err(anyhow!(
                "scene_extensions entries must be bare extensions, got {ext:?}"
            ));
        }
        if !is_bare_file_name(&self.setup_file_name) {
            return Err(anyhow!(
                "setup_file_name must be a plain file name, got {:?}",
                self.setup_file_name
            ));
        }
        if let Some(name) = self.dropper_files.iter().find(|name| !is_bare_file_name(name)) {
            return Err(anyhow!(
                "dropper_files entries must be plain file names, got {name:?}"
            ));
        }
        Ok(())
    }

    pub fn backup_root(&self) -> PathBuf {
        self.backup_root
            .clone()
            .unwrap_or_else(BackupCoordinator::default_root)
    }

    pub fn is_scene_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.scene_extensions
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
    }
}

fn is_bare_file_name(name: &str) -> bool {
    !name.trim().is_empty()
        && Path::new(name).file_name().and_then(|f| f.to_str()) == Some(name)
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `CleanerConfig::default()`.
pub fn load_config(path: &Path) -> Result<CleanerConfig> {
    if !path.exists() {
        let cfg = CleanerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: CleanerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &CleanerConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    write_atomic(path, buf.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, CleanerConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("cleaner.toml");
        let cfg = CleanerConfig {
            backup_root: Some(temp.path().join("backups")),
            scene_requires_backup: true,
            ..CleanerConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("cleaner.toml");
        fs::write(&path, "scene_requires_backup = true\n").expect("write");

        let cfg = load_config(&path).expect("load");
        assert!(cfg.scene_requires_backup);
        assert_eq!(cfg.scene_extensions, vec!["ma", "mb"]);
        assert_eq!(cfg.setup_file_name, "userSetup.py");
    }

    #[test]
    fn rejects_invalid_values() {
        let cfg = CleanerConfig {
            scene_extensions: Vec::new(),
            ..CleanerConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = CleanerConfig {
            scene_extensions: vec![".ma".to_string()],
            ..CleanerConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = CleanerConfig {
            dropper_files: vec!["../vaccine.py".to_string()],
            ..CleanerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn scene_extension_match_is_case_insensitive() {
        let cfg = CleanerConfig::default();
        assert!(cfg.is_scene_file(Path::new("shots/a.MA")));
        assert!(cfg.is_scene_file(Path::new("b.mb")));
        assert!(!cfg.is_scene_file(Path::new("notes.txt")));
        assert!(!cfg.is_scene_file(Path::new("ma")));
    }
}
