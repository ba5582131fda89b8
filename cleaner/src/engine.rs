//! The remediation engine shared by every CLI mode.

use std::path::Path;

use crate::core::signatures::SignatureSet;
use crate::io::backup::{BackupCoordinator, BackupRecord};
use crate::io::config::CleanerConfig;
use crate::io::fs::make_writable;
use crate::io::runtime::SceneRuntime;
use crate::ledger::RunLedger;

/// One run's worth of remediation state.
///
/// Text remediation lives in [`crate::text`], scene remediation in
/// [`crate::scene`], and the mode sweeps in [`crate::modes`]; all of them
/// share this struct so there is a single set of signatures, one backup
/// staging directory, and one ledger per run.
pub struct Cleaner<R> {
    pub(crate) config: CleanerConfig,
    pub(crate) signatures: SignatureSet,
    pub(crate) backups: BackupCoordinator,
    pub(crate) runtime: R,
    pub(crate) ledger: RunLedger,
}

impl<R: SceneRuntime> Cleaner<R> {
    pub fn new(
        config: CleanerConfig,
        signatures: SignatureSet,
        backups: BackupCoordinator,
        runtime: R,
        ledger: RunLedger,
    ) -> Self {
        Self {
            config,
            signatures,
            backups,
            runtime,
            ledger,
        }
    }

    pub fn ledger(&self) -> &RunLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut RunLedger {
        &mut self.ledger
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn into_ledger(self) -> RunLedger {
        self.ledger
    }

    /// Clear a read-only flag before mutation; failure is only a warning.
    pub(crate) fn ensure_writable(&mut self, path: &Path) {
        if let Err(err) = make_writable(path) {
            self.ledger.warn(format!(
                "WARNING: Could not change permissions for {}: {err:#}",
                path.display()
            ));
        }
    }

    /// Snapshot `path` and record the outcome in the ledger.
    pub(crate) fn backup(&mut self, path: &Path) -> anyhow::Result<BackupRecord> {
        match self.backups.snapshot(path) {
            Ok(record) => {
                self.ledger
                    .info(format!("Created backup: {}", record.backup.display()));
                Ok(record)
            }
            Err(err) => {
                self.ledger.error(format!(
                    "Failed to create backup of {}: {err:#}",
                    path.display()
                ));
                Err(err)
            }
        }
    }
}
