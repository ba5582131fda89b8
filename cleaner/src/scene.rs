//! Scene remediation: infected script nodes and script jobs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::instrument;

use crate::core::jobs::parse_job_id;
use crate::core::types::{
    BEFORE_ATTR, FindingReason, SCRIPT_NODE_TYPE, SceneFinding, SceneObjectKind,
};
use crate::engine::Cleaner;
use crate::error::TargetError;
use crate::io::runtime::SceneRuntime;

/// Result of remediating one scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneOutcome {
    pub path: PathBuf,
    /// Removed objects, nodes first then jobs, in runtime order.
    pub findings: Vec<SceneFinding>,
    /// Snapshot taken before the scene was opened, if one was written.
    pub backup: Option<PathBuf>,
}

impl SceneOutcome {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

impl<R: SceneRuntime> Cleaner<R> {
    /// Open a scene, strip worm nodes and jobs, and save it when anything
    /// was removed.
    ///
    /// With no `path` the runtime's current scene is used. A scene with no
    /// findings is never saved.
    #[instrument(skip_all, fields(path = ?path))]
    pub fn clean_scene(&mut self, path: Option<&Path>) -> Result<SceneOutcome, TargetError> {
        let path = self.resolve_scene_target(path)?;

        if !path.is_file() {
            self.ledger
                .error(format!("File not found: {}", path.display()));
            return Err(TargetError::NotFound { path });
        }

        self.ledger
            .info(format!("Processing Maya file: {}", path.display()));
        self.ensure_writable(&path);

        let backup = match self.backup(&path) {
            Ok(record) => Some(record.backup),
            Err(cause) if self.config.scene_requires_backup => {
                return Err(TargetError::Backup { path, cause });
            }
            Err(_) => {
                self.ledger.warn(format!(
                    "WARNING: Continuing without a backup of {}",
                    path.display()
                ));
                None
            }
        };

        self.persist_open_scene();
        if let Err(cause) = self.load_scene(&path) {
            self.ledger
                .error(format!("Failed to open file {}: {cause:#}", path.display()));
            return Err(TargetError::Runtime { path, cause });
        }
        self.ledger.mark_processed(&path);

        let mut findings = self.remove_infected_nodes();
        findings.extend(self.kill_infected_jobs());

        if findings.is_empty() {
            self.ledger
                .info(format!("No issues found in {}", path.display()));
            return Ok(SceneOutcome {
                path,
                findings,
                backup,
            });
        }

        if let Err(cause) = self.runtime.save_scene() {
            self.ledger.error(format!(
                "Failed to save cleaned file {}: {cause:#}",
                path.display()
            ));
            return Err(TargetError::SaveFailed {
                path,
                removed: findings.len(),
                cause,
            });
        }
        self.ledger.add_cleaned(findings.len());
        self.ledger
            .info(format!("Saved cleaned file: {}", path.display()));
        self.ledger.info(format!(
            "Cleaned {} issues from {}",
            findings.len(),
            path.display()
        ));

        Ok(SceneOutcome {
            path,
            findings,
            backup,
        })
    }

    fn resolve_scene_target(&mut self, path: Option<&Path>) -> Result<PathBuf, TargetError> {
        if let Some(path) = path {
            return Ok(path.to_path_buf());
        }
        match self.runtime.current_scene() {
            Ok(Some(current)) => Ok(current),
            Ok(None) => {
                self.ledger.error("No file specified and no current scene");
                Err(TargetError::NoTarget)
            }
            Err(err) => {
                self.ledger.error(format!(
                    "No file specified and the current scene is unavailable: {err:#}"
                ));
                Err(TargetError::NoTarget)
            }
        }
    }

    /// Save whatever is open if it has unsaved changes. Never fatal.
    fn persist_open_scene(&mut self) {
        let modified = match self.runtime.is_modified() {
            Ok(modified) => modified,
            Err(err) => {
                self.ledger.warn(format!(
                    "WARNING: Could not query the open scene's modified flag: {err:#}"
                ));
                false
            }
        };
        if !modified {
            return;
        }
        if let Err(err) = self.runtime.save_scene() {
            self.ledger.warn(format!(
                "WARNING: Could not save the open scene before switching: {err:#}"
            ));
        }
    }

    fn load_scene(&mut self, path: &Path) -> Result<()> {
        self.runtime.new_scene().context("create empty scene")?;
        self.runtime
            .open_scene(path)
            .with_context(|| format!("open {}", path.display()))
    }

    fn remove_infected_nodes(&mut self) -> Vec<SceneFinding> {
        let nodes = match self.runtime.list_nodes(SCRIPT_NODE_TYPE) {
            Ok(nodes) => nodes,
            Err(err) => {
                self.ledger
                    .warn(format!("Error listing script nodes: {err:#}"));
                return Vec::new();
            }
        };

        let mut findings = Vec::new();
        for node in nodes {
            match self.inspect_node(&node) {
                Ok(Some(reason)) => {
                    if let Err(err) = self.runtime.delete_node(&node) {
                        self.ledger
                            .warn(format!("Error checking script node {node}: {err:#}"));
                        continue;
                    }
                    self.ledger
                        .info(format!("Removed infected script node: {node} ({reason})"));
                    findings.push(SceneFinding {
                        kind: SceneObjectKind::ScriptNode,
                        id: node,
                        reason,
                    });
                }
                Ok(None) => {}
                Err(err) => {
                    self.ledger
                        .warn(format!("Error checking script node {node}: {err:#}"));
                }
            }
        }
        findings
    }

    /// Name markers short-circuit; the code attribute is read only when the
    /// name is clean.
    fn inspect_node(&mut self, node: &str) -> Result<Option<FindingReason>> {
        if !self.runtime.node_exists(node)? {
            return Ok(None);
        }
        if let Some(marker) = self.signatures.node_name_marker(node) {
            return Ok(Some(FindingReason::NameMarker(marker.to_string())));
        }
        if !self.runtime.has_attribute(node, BEFORE_ATTR)? {
            return Ok(None);
        }
        let code = match self.runtime.string_attribute(node, BEFORE_ATTR) {
            Ok(code) => code.unwrap_or_default(),
            Err(err) => {
                self.ledger
                    .warn(format!("Error reading {node}.{BEFORE_ATTR}: {err:#}"));
                String::new()
            }
        };
        Ok(self
            .signatures
            .node_code_marker(&code)
            .map(|marker| FindingReason::CodeSignature(marker.to_string())))
    }

    fn kill_infected_jobs(&mut self) -> Vec<SceneFinding> {
        let jobs = match self.runtime.list_jobs() {
            Ok(jobs) => jobs,
            Err(err) => {
                self.ledger
                    .warn(format!("Error listing script jobs: {err:#}"));
                return Vec::new();
            }
        };

        let mut findings = Vec::new();
        for job in jobs {
            let Some(marker) = self.signatures.job_marker(&job) else {
                continue;
            };
            let marker = marker.to_string();
            let Some(id) = parse_job_id(&job) else {
                self.ledger
                    .warn(format!("Error killing script job {job}: unparseable job id"));
                continue;
            };
            if let Err(err) = self.runtime.kill_job(id) {
                self.ledger
                    .warn(format!("Error killing script job {job}: {err:#}"));
                continue;
            }
            self.ledger
                .info(format!("Killed infected script job: {job}"));
            findings.push(SceneFinding {
                kind: SceneObjectKind::ScriptJob,
                id: job,
                reason: FindingReason::JobSignature(marker),
            });
        }
        findings
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::test_support::{FakeScene, FakeSceneRuntime, TestCleaner};

    fn infected_scene() -> FakeScene {
        FakeScene::new()
            .with_node("vaccine_gene", Some("import vaccine"))
            .with_node("sceneConfigurationScriptNode", Some("playbackOptions -min 1"))
            .with_node(
                "uiConfigurationScriptNode",
                Some("open(userSetup.py, 'a').write(payload)"),
            )
    }

    #[test]
    fn removes_name_and_code_matches_then_saves() {
        let env = TestCleaner::new();
        let path = env.touch("shot.ma");
        let runtime = FakeSceneRuntime::new().with_scene(&path, infected_scene());
        let mut cleaner = env.cleaner_with(runtime);

        let outcome = cleaner.clean_scene(Some(&path)).expect("clean");

        let ids: Vec<&str> = outcome.findings.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["vaccine_gene", "uiConfigurationScriptNode"]);
        assert_eq!(
            outcome.findings[0].reason,
            FindingReason::NameMarker("vaccine_gene".into())
        );
        assert_eq!(
            outcome.findings[1].reason,
            FindingReason::CodeSignature("userSetup.py".into())
        );
        assert!(outcome.backup.is_some());

        let runtime = cleaner.runtime();
        assert_eq!(runtime.saved(), vec![path.clone()]);
        assert_eq!(
            runtime.remaining_nodes(&path),
            vec!["sceneConfigurationScriptNode".to_string()]
        );
        assert_eq!(cleaner.ledger().issues_cleaned(), 2);
        assert_eq!(cleaner.ledger().files_processed(), 1);
    }

    #[test]
    fn name_marker_skips_code_inspection() {
        let env = TestCleaner::new();
        let path = env.touch("shot.ma");
        let scene = FakeScene::new().with_node("breed_gene7", Some("harmless"));
        let mut cleaner = env.cleaner_with(FakeSceneRuntime::new().with_scene(&path, scene));

        cleaner.clean_scene(Some(&path)).expect("clean");

        assert!(cleaner.runtime().attribute_reads().is_empty());
        assert_eq!(cleaner.ledger().issues_cleaned(), 1);
    }

    #[test]
    fn clean_scene_is_never_saved() {
        let env = TestCleaner::new();
        let path = env.touch("clean.ma");
        let scene = FakeScene::new().with_node("sceneConfigurationScriptNode", Some("x = 1"));
        let mut cleaner = env.cleaner_with(FakeSceneRuntime::new().with_scene(&path, scene));

        let outcome = cleaner.clean_scene(Some(&path)).expect("clean");

        assert!(outcome.is_clean());
        assert!(cleaner.runtime().saved().is_empty());
        assert_eq!(cleaner.ledger().issues_cleaned(), 0);
        assert_eq!(cleaner.ledger().files_processed(), 1);
    }

    #[test]
    fn infected_jobs_are_killed_by_id() {
        let env = TestCleaner::new();
        let path = env.touch("shot.ma");
        let runtime = FakeSceneRuntime::new()
            .with_scene(&path, FakeScene::new())
            .with_job(12, "event=SceneSaved leukocyte.antivirus()")
            .with_job(3, "idle autosave");
        let mut cleaner = env.cleaner_with(runtime);

        let outcome = cleaner.clean_scene(Some(&path)).expect("clean");

        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].kind, SceneObjectKind::ScriptJob);
        assert_eq!(cleaner.runtime().killed(), vec![12]);
        assert_eq!(cleaner.ledger().issues_cleaned(), 1);
    }

    #[test]
    fn per_node_failures_do_not_stop_the_scan() {
        let env = TestCleaner::new();
        let path = env.touch("shot.ma");
        let scene = FakeScene::new()
            .with_node("brokenNode", Some("import phage"))
            .with_node("fuckVirus_gene", None);
        let runtime = FakeSceneRuntime::new()
            .with_scene(&path, scene)
            .failing_attribute("brokenNode");
        let mut cleaner = env.cleaner_with(runtime);

        let outcome = cleaner.clean_scene(Some(&path)).expect("clean");

        assert_eq!(outcome.findings.len(), 1);
        assert!(
            cleaner
                .ledger()
                .events()
                .iter()
                .any(|e| e.message.starts_with("Error checking script node brokenNode"))
        );
    }

    #[test]
    fn no_path_and_no_current_scene_is_no_target() {
        let env = TestCleaner::new();
        let mut cleaner = env.cleaner();

        let err = cleaner.clean_scene(None).expect_err("no target");

        assert!(matches!(err, TargetError::NoTarget));
    }

    #[test]
    fn current_scene_is_used_when_no_path_given() {
        let env = TestCleaner::new();
        let path = env.touch("open.ma");
        let scene = FakeScene::new().with_node("vaccine_gene", None);
        let runtime = FakeSceneRuntime::new()
            .with_scene(&path, scene)
            .with_current(&path);
        let mut cleaner = env.cleaner_with(runtime);

        let outcome = cleaner.clean_scene(None).expect("clean");

        assert_eq!(outcome.path, path);
        assert_eq!(outcome.findings.len(), 1);
    }

    #[test]
    fn missing_file_stops_before_backup() {
        let env = TestCleaner::new();
        let mut cleaner = env.cleaner();
        let path = env.work_dir().join("gone.ma");

        let err = cleaner.clean_scene(Some(&path)).expect_err("missing");

        assert!(matches!(err, TargetError::NotFound { .. }));
        assert!(!env.backup_root().exists());
    }

    #[test]
    fn backup_failure_continues_unless_required() {
        let env = TestCleaner::new();
        fs::write(env.backup_root(), "blocked").expect("block staging root");
        let path = env.touch("shot.ma");
        let scene = || FakeScene::new().with_node("vaccine_gene", None);

        let mut lenient = env.cleaner_with(FakeSceneRuntime::new().with_scene(&path, scene()));
        let outcome = lenient.clean_scene(Some(&path)).expect("continues");
        assert_eq!(outcome.backup, None);
        assert_eq!(outcome.findings.len(), 1);

        let mut strict = env.cleaner_with(FakeSceneRuntime::new().with_scene(&path, scene()));
        strict.config.scene_requires_backup = true;
        let err = strict.clean_scene(Some(&path)).expect_err("aborts");
        assert!(matches!(err, TargetError::Backup { .. }));
        assert!(strict.runtime().opened().is_empty());
    }

    #[test]
    fn open_failure_aborts_without_scan() {
        let env = TestCleaner::new();
        let path = env.touch("binary.mb");
        let mut cleaner = env.cleaner();

        let err = cleaner.clean_scene(Some(&path)).expect_err("open fails");

        assert!(matches!(err, TargetError::Runtime { .. }));
        assert_eq!(cleaner.ledger().files_processed(), 0);
    }

    #[test]
    fn save_failure_is_reported_distinctly() {
        let env = TestCleaner::new();
        let path = env.touch("shot.ma");
        let scene = FakeScene::new().with_node("vaccine_gene", None);
        let runtime = FakeSceneRuntime::new()
            .with_scene(&path, scene)
            .failing_save();
        let mut cleaner = env.cleaner_with(runtime);

        let err = cleaner.clean_scene(Some(&path)).expect_err("save fails");

        assert!(matches!(err, TargetError::SaveFailed { removed: 1, .. }));
        assert_eq!(cleaner.ledger().issues_cleaned(), 0);
    }

    #[test]
    fn modified_open_scene_is_saved_before_switching() {
        let env = TestCleaner::new();
        let open = env.touch("work.ma");
        let target = env.touch("shot.ma");
        let runtime = FakeSceneRuntime::new()
            .with_scene(&open, FakeScene::new())
            .with_scene(&target, FakeScene::new())
            .with_current(&open)
            .modified();
        let mut cleaner = env.cleaner_with(runtime);

        cleaner.clean_scene(Some(&target)).expect("clean");

        assert_eq!(cleaner.runtime().saved(), vec![open]);
    }

    fn logged(cleaner: &Cleaner<FakeSceneRuntime>, prefix: &str) -> bool {
        cleaner
            .ledger()
            .events()
            .iter()
            .any(|event| event.message.starts_with(prefix))
    }

    #[test]
    fn unreadable_code_is_logged_and_treated_as_empty() {
        let env = TestCleaner::new();
        let path = env.touch("shot.ma");
        let scene = FakeScene::new()
            .with_node("someNode", Some("import phage"))
            .with_node("vaccine_gene", None);
        let runtime = FakeSceneRuntime::new()
            .with_scene(&path, scene)
            .failing_string_attribute("someNode");
        let mut cleaner = env.cleaner_with(runtime);

        let outcome = cleaner.clean_scene(Some(&path)).expect("clean");

        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].id, "vaccine_gene");
        assert!(logged(&cleaner, "Error reading someNode.before: getAttr someNode.before failed"));
        assert_eq!(
            cleaner.runtime().remaining_nodes(&path),
            vec!["someNode".to_string()]
        );
    }

    #[test]
    fn modified_flag_failure_is_logged() {
        let env = TestCleaner::new();
        let open = env.touch("work.ma");
        let target = env.touch("shot.ma");
        let runtime = FakeSceneRuntime::new()
            .with_scene(&open, FakeScene::new())
            .with_scene(&target, FakeScene::new())
            .with_current(&open)
            .failing_modified();
        let mut cleaner = env.cleaner_with(runtime);

        cleaner.clean_scene(Some(&target)).expect("clean");

        assert!(logged(&cleaner, "WARNING: Could not query the open scene's modified flag"));
        assert!(cleaner.runtime().saved().is_empty());
        assert_eq!(cleaner.runtime().opened(), vec![target]);
    }

    #[test]
    fn existence_check_failure_skips_only_that_node() {
        let env = TestCleaner::new();
        let path = env.touch("shot.ma");
        let scene = FakeScene::new()
            .with_node("vaccine_gene", None)
            .with_node("breed_gene", None);
        let runtime = FakeSceneRuntime::new()
            .with_scene(&path, scene)
            .failing_exists("vaccine_gene");
        let mut cleaner = env.cleaner_with(runtime);

        let outcome = cleaner.clean_scene(Some(&path)).expect("clean");

        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].id, "breed_gene");
        assert!(logged(&cleaner, "Error checking script node vaccine_gene"));
        assert_eq!(cleaner.ledger().issues_cleaned(), 1);
    }

    #[test]
    fn failed_delete_is_logged_and_not_counted() {
        let env = TestCleaner::new();
        let path = env.touch("shot.ma");
        let scene = FakeScene::new()
            .with_node("vaccine_gene", None)
            .with_node("fuckVirus_gene", None);
        let runtime = FakeSceneRuntime::new()
            .with_scene(&path, scene)
            .failing_delete("vaccine_gene");
        let mut cleaner = env.cleaner_with(runtime);

        let outcome = cleaner.clean_scene(Some(&path)).expect("clean");

        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].id, "fuckVirus_gene");
        assert!(logged(&cleaner, "Error checking script node vaccine_gene: vaccine_gene is locked"));
        assert_eq!(cleaner.ledger().issues_cleaned(), 1);
        assert_eq!(
            cleaner.runtime().remaining_nodes(&path),
            vec!["vaccine_gene".to_string()]
        );
    }

    #[test]
    fn node_listing_failure_still_scans_jobs() {
        let env = TestCleaner::new();
        let path = env.touch("shot.ma");
        let runtime = FakeSceneRuntime::new()
            .with_scene(&path, FakeScene::new().with_node("vaccine_gene", None))
            .with_job(5, "event=SceneSaved vaccine.run()")
            .failing_list_nodes();
        let mut cleaner = env.cleaner_with(runtime);

        let outcome = cleaner.clean_scene(Some(&path)).expect("clean");

        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].kind, SceneObjectKind::ScriptJob);
        assert!(logged(&cleaner, "Error listing script nodes"));
        assert_eq!(cleaner.runtime().killed(), vec![5]);
        assert_eq!(cleaner.ledger().issues_cleaned(), 1);
    }

    #[test]
    fn job_listing_failure_still_removes_nodes() {
        let env = TestCleaner::new();
        let path = env.touch("shot.ma");
        let runtime = FakeSceneRuntime::new()
            .with_scene(&path, FakeScene::new().with_node("breed_gene", None))
            .with_job(5, "phage")
            .failing_list_jobs();
        let mut cleaner = env.cleaner_with(runtime);

        let outcome = cleaner.clean_scene(Some(&path)).expect("clean");

        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].kind, SceneObjectKind::ScriptNode);
        assert!(logged(&cleaner, "Error listing script jobs"));
        assert!(cleaner.runtime().killed().is_empty());
        assert_eq!(cleaner.runtime().saved(), vec![path]);
    }

    #[test]
    fn unparseable_job_id_is_skipped() {
        let env = TestCleaner::new();
        let path = env.touch("shot.ma");
        let runtime = FakeSceneRuntime::new()
            .with_scene(&path, FakeScene::new())
            .with_raw_job("abc: vaccine")
            .with_job(7, "phage()");
        let mut cleaner = env.cleaner_with(runtime);

        let outcome = cleaner.clean_scene(Some(&path)).expect("clean");

        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].id, "7: phage()");
        assert!(logged(&cleaner, "Error killing script job abc: vaccine: unparseable job id"));
        assert_eq!(cleaner.runtime().killed(), vec![7]);
        assert_eq!(cleaner.ledger().issues_cleaned(), 1);
    }
}
