//! Text remediation: `userSetup.py` and other startup scripts.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::instrument;

use crate::core::text::{TextVerdict, classify_text};
use crate::engine::Cleaner;
use crate::error::TargetError;
use crate::io::fs::{read_lossy, write_atomic};
use crate::io::runtime::SceneRuntime;

/// What happened to a text file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextOutcome {
    Clean,
    /// Infected lines were dropped; the rest of the file was kept.
    Rewritten { removed_lines: usize, backup: PathBuf },
    /// The whole file was replaced by the remediation notice.
    Replaced { backup: PathBuf },
}

/// What happened to a worm dropper file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedFile {
    pub path: PathBuf,
    pub backup: PathBuf,
}

impl<R: SceneRuntime> Cleaner<R> {
    /// Detect and remove worm code from a text script.
    ///
    /// The file is snapshotted before it is read; without a snapshot it is
    /// never touched. Rewrites go through a temp file and rename.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn clean_text_file(&mut self, path: &Path) -> Result<TextOutcome, TargetError> {
        if !path.is_file() {
            self.ledger
                .error(format!("File not found: {}", path.display()));
            return Err(TargetError::NotFound {
                path: path.to_path_buf(),
            });
        }

        self.ensure_writable(path);
        let record = self.backup(path).map_err(|cause| TargetError::Backup {
            path: path.to_path_buf(),
            cause,
        })?;

        let content = match read_lossy(path) {
            Ok(content) => content,
            Err(cause) => return Err(self.io_failure(path, cause)),
        };
        self.ledger.mark_processed(path);

        let verdict = classify_text(&content, &self.signatures);
        let Some(replacement) = verdict.replacement() else {
            self.ledger
                .info(format!("No issues detected in {}", path.display()));
            return Ok(TextOutcome::Clean);
        };

        if let Err(cause) = write_atomic(path, replacement.as_bytes()) {
            return Err(self.io_failure(path, cause));
        }
        self.ledger.add_cleaned(1);

        let outcome = match verdict {
            TextVerdict::Heavy { infected, .. } => {
                self.ledger.info(format!(
                    "Replaced infected file ({infected} infected lines): {}",
                    path.display()
                ));
                TextOutcome::Replaced {
                    backup: record.backup,
                }
            }
            TextVerdict::Partial { removed, .. } => {
                self.ledger.info(format!(
                    "Selectively cleaned {removed} lines from {}",
                    path.display()
                ));
                TextOutcome::Rewritten {
                    removed_lines: removed,
                    backup: record.backup,
                }
            }
            TextVerdict::Clean => TextOutcome::Clean,
        };
        Ok(outcome)
    }

    /// Back up and delete a stand-alone worm file.
    ///
    /// Deletion is skipped when the backup cannot be written.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn remove_dropper_file(&mut self, path: &Path) -> Result<RemovedFile, TargetError> {
        if !path.is_file() {
            return Err(TargetError::NotFound {
                path: path.to_path_buf(),
            });
        }
        self.ensure_writable(path);
        let record = self.backup(path).map_err(|cause| TargetError::Backup {
            path: path.to_path_buf(),
            cause,
        })?;

        if let Err(err) = fs::remove_file(path) {
            let cause = anyhow::Error::new(err).context(format!("remove {}", path.display()));
            return Err(self.io_failure(path, cause));
        }
        self.ledger.add_cleaned(1);
        self.ledger
            .info(format!("Removed infected file: {}", path.display()));
        Ok(RemovedFile {
            path: path.to_path_buf(),
            backup: record.backup,
        })
    }

    fn io_failure(&mut self, path: &Path, cause: anyhow::Error) -> TargetError {
        let cause = cause.context(format!("remediate {}", path.display()));
        self.ledger
            .error(format!("Error cleaning {}: {cause:#}", path.display()));
        TargetError::Io {
            path: path.to_path_buf(),
            cause,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::text::REMEDIATED_NOTICE;
    use crate::test_support::TestCleaner;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).expect("write");
        path
    }

    #[test]
    fn clean_file_is_left_byte_identical() {
        let env = TestCleaner::new();
        let mut cleaner = env.cleaner();
        let contents = "import maya.cmds as cmds\ncmds.polyCube()\n";
        let path = write(&env.work_dir(), "userSetup.py", contents);

        let outcome = cleaner.clean_text_file(&path).expect("clean");

        assert_eq!(outcome, TextOutcome::Clean);
        assert_eq!(fs::read_to_string(&path).expect("read"), contents);
        assert_eq!(cleaner.ledger().issues_cleaned(), 0);
        assert_eq!(cleaner.ledger().files_processed(), 1);
    }

    #[test]
    fn equal_split_is_rewritten_and_backed_up() {
        let env = TestCleaner::new();
        let mut cleaner = env.cleaner();
        let original = "import vaccine\nprint('hi')\nimport vaccine\nx=1";
        let path = write(&env.work_dir(), "userSetup.py", original);

        let outcome = cleaner.clean_text_file(&path).expect("clean");

        let TextOutcome::Rewritten {
            removed_lines,
            backup,
        } = outcome
        else {
            panic!("expected rewrite, got {outcome:?}");
        };
        assert_eq!(removed_lines, 2);
        assert_eq!(fs::read_to_string(&path).expect("read"), "print('hi')\nx=1");
        assert_eq!(fs::read_to_string(&backup).expect("backup"), original);
        assert_eq!(cleaner.ledger().issues_cleaned(), 1);
    }

    #[test]
    fn mostly_infected_file_becomes_notice() {
        let env = TestCleaner::new();
        let mut cleaner = env.cleaner();
        let original = "import vaccine\nimport leukocyte\ncmds.evalDeferred('phage')\nx=1\n";
        let path = write(&env.work_dir(), "userSetup.py", original);

        let outcome = cleaner.clean_text_file(&path).expect("clean");

        assert!(matches!(outcome, TextOutcome::Replaced { .. }));
        assert_eq!(fs::read_to_string(&path).expect("read"), REMEDIATED_NOTICE);
        assert_eq!(cleaner.ledger().issues_cleaned(), 1);
    }

    #[test]
    fn missing_file_is_not_found() {
        let env = TestCleaner::new();
        let mut cleaner = env.cleaner();

        let err = cleaner
            .clean_text_file(&env.work_dir().join("userSetup.py"))
            .expect_err("missing");

        assert!(matches!(err, TargetError::NotFound { .. }));
        assert_eq!(cleaner.ledger().files_processed(), 0);
    }

    #[test]
    fn backup_failure_leaves_file_untouched() {
        let env = TestCleaner::new();
        // A file where the staging root should be makes every backup fail.
        fs::write(env.backup_root(), "not a directory").expect("block staging root");
        let mut cleaner = env.cleaner();
        let original = "import vaccine\nimport vaccine\nx=1";
        let path = write(&env.work_dir(), "userSetup.py", original);

        let err = cleaner.clean_text_file(&path).expect_err("backup fails");

        assert!(matches!(err, TargetError::Backup { .. }));
        assert_eq!(fs::read_to_string(&path).expect("read"), original);
        assert_eq!(cleaner.ledger().issues_cleaned(), 0);
        assert_eq!(cleaner.ledger().files_processed(), 0);
    }

    #[test]
    fn dropper_file_is_backed_up_then_removed() {
        let env = TestCleaner::new();
        let mut cleaner = env.cleaner();
        let path = write(&env.work_dir(), "vaccine.py", "def phage(): pass\n");

        let removed = cleaner.remove_dropper_file(&path).expect("remove");

        assert!(!path.exists());
        assert_eq!(
            fs::read_to_string(&removed.backup).expect("backup"),
            "def phage(): pass\n"
        );
        assert_eq!(cleaner.ledger().issues_cleaned(), 1);
    }
}
