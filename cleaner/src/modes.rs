//! The three run modes. Each is a thin sweep over the shared engine.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use tracing::{debug, instrument};

use crate::engine::Cleaner;
use crate::error::TargetError;
use crate::io::discover::{find_scene_files, user_script_dirs};
use crate::io::runtime::SceneRuntime;

/// What a run should clean.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// One scene; `None` means the runtime's current scene.
    Scene(Option<PathBuf>),
    /// Every scene file under a directory tree.
    Directory(PathBuf),
    /// Startup scripts and dropper files in the user's Maya script dirs.
    User { home: PathBuf },
}

impl<R: SceneRuntime> Cleaner<R> {
    /// Run `mode` to completion. Errors here fail the whole run; per-target
    /// failures are only recorded in the ledger.
    pub fn run(&mut self, mode: &Mode) -> Result<()> {
        self.ledger.info(format!(
            "Using signature set v{}",
            self.signatures.version
        ));
        match mode {
            Mode::Scene(path) => self.run_scene(path.as_deref()),
            Mode::Directory(dir) => self.run_directory(dir),
            Mode::User { home } => self.run_user(home),
        }
    }

    /// Record the closing summary lines.
    pub fn finish(&mut self) {
        let processed = self.ledger.files_processed();
        let cleaned = self.ledger.issues_cleaned();
        self.ledger.info("=== CLEANING COMPLETE ===");
        self.ledger.info(format!("Files processed: {processed}"));
        self.ledger.info(format!("Issues fixed: {cleaned}"));
    }

    fn run_scene(&mut self, path: Option<&Path>) -> Result<()> {
        match self.clean_scene(path) {
            Ok(_) => Ok(()),
            Err(TargetError::NoTarget) => bail!(TargetError::NoTarget),
            Err(err) => {
                debug!(err = %err, "scene not cleaned");
                Ok(())
            }
        }
    }

    #[instrument(skip_all, fields(dir = %dir.display()))]
    fn run_directory(&mut self, dir: &Path) -> Result<()> {
        if !dir.is_dir() {
            let err = TargetError::NotFound {
                path: dir.to_path_buf(),
            };
            bail!(err);
        }

        let files = find_scene_files(dir, &self.config)?;
        self.ledger
            .info(format!("Found {} Maya files to process", files.len()));
        for file in files {
            if let Err(err) = self.clean_scene(Some(&file)) {
                debug!(file = %file.display(), err = %err, "scene not cleaned");
            }
        }
        Ok(())
    }

    #[instrument(skip_all, fields(home = %home.display()))]
    fn run_user(&mut self, home: &Path) -> Result<()> {
        let runtime_dir = self.runtime.user_script_dir();
        let dirs = user_script_dirs(home, runtime_dir.as_deref());
        self.ledger
            .info(format!("Found {} Maya user directories", dirs.len()));

        for dir in dirs {
            self.ledger
                .info(format!("Checking directory: {}", dir.display()));

            let setup = dir.join(&self.config.setup_file_name);
            if setup.is_file() {
                if let Err(err) = self.clean_text_file(&setup) {
                    debug!(file = %setup.display(), err = %err, "startup script not cleaned");
                }
            }

            let droppers: Vec<PathBuf> = self
                .config
                .dropper_files
                .iter()
                .map(|name| dir.join(name))
                .filter(|path| path.is_file())
                .collect();
            for dropper in droppers {
                if let Err(err) = self.remove_dropper_file(&dropper) {
                    debug!(file = %dropper.display(), err = %err, "dropper not removed");
                }
            }
        }
        Ok(())
    }
}
