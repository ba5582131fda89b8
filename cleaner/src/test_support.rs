//! Test-only helpers: an in-memory scene runtime and a scratch cleaner.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow, bail};
use tempfile::TempDir;

use crate::core::signatures::SignatureSet;
use crate::core::types::{BEFORE_ATTR, SCRIPT_NODE_TYPE};
use crate::engine::Cleaner;
use crate::io::backup::BackupCoordinator;
use crate::io::config::CleanerConfig;
use crate::io::runtime::SceneRuntime;
use crate::ledger::RunLedger;

/// Script nodes of one fake scene, in creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FakeScene {
    nodes: Vec<(String, Option<String>)>,
}

impl FakeScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a script node; `None` means the node has no `before` attribute.
    pub fn with_node(mut self, name: &str, before: Option<&str>) -> Self {
        self.nodes
            .push((name.to_string(), before.map(str::to_string)));
        self
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|(node, _)| node == name)
    }
}

/// In-memory [`SceneRuntime`] that records every mutation.
#[derive(Debug, Default)]
pub struct FakeSceneRuntime {
    disk: BTreeMap<PathBuf, FakeScene>,
    open: FakeScene,
    current: Option<PathBuf>,
    modified: bool,
    jobs: Vec<(u32, String)>,
    raw_jobs: Vec<String>,
    user_script_dir: Option<PathBuf>,
    failing_attributes: BTreeSet<String>,
    failing_strings: BTreeSet<String>,
    failing_exists: BTreeSet<String>,
    failing_deletes: BTreeSet<String>,
    fail_list_nodes: bool,
    fail_list_jobs: bool,
    fail_modified: bool,
    fail_save: bool,
    saved: Vec<PathBuf>,
    opened: Vec<PathBuf>,
    killed: Vec<u32>,
    attribute_reads: RefCell<Vec<String>>,
}

impl FakeSceneRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `scene` openable at `path`.
    pub fn with_scene(mut self, path: &Path, scene: FakeScene) -> Self {
        self.disk.insert(path.to_path_buf(), scene);
        self
    }

    /// Start with `path` already open.
    pub fn with_current(mut self, path: &Path) -> Self {
        self.open = self.disk.get(path).cloned().unwrap_or_default();
        self.current = Some(path.to_path_buf());
        self
    }

    /// Mark the open scene as having unsaved changes.
    pub fn modified(mut self) -> Self {
        self.modified = true;
        self
    }

    pub fn with_job(mut self, id: u32, description: &str) -> Self {
        self.jobs.push((id, description.to_string()));
        self
    }

    /// List `entry` verbatim, even if it has no parseable id.
    pub fn with_raw_job(mut self, entry: &str) -> Self {
        self.raw_jobs.push(entry.to_string());
        self
    }

    pub fn with_user_script_dir(mut self, dir: &Path) -> Self {
        self.user_script_dir = Some(dir.to_path_buf());
        self
    }

    /// Attribute queries on `node` fail.
    pub fn failing_attribute(mut self, node: &str) -> Self {
        self.failing_attributes.insert(node.to_string());
        self
    }

    /// Only reads of the `before` value on `node` fail.
    pub fn failing_string_attribute(mut self, node: &str) -> Self {
        self.failing_strings.insert(node.to_string());
        self
    }

    pub fn failing_exists(mut self, node: &str) -> Self {
        self.failing_exists.insert(node.to_string());
        self
    }

    pub fn failing_delete(mut self, node: &str) -> Self {
        self.failing_deletes.insert(node.to_string());
        self
    }

    pub fn failing_list_nodes(mut self) -> Self {
        self.fail_list_nodes = true;
        self
    }

    pub fn failing_list_jobs(mut self) -> Self {
        self.fail_list_jobs = true;
        self
    }

    pub fn failing_modified(mut self) -> Self {
        self.fail_modified = true;
        self
    }

    pub fn failing_save(mut self) -> Self {
        self.fail_save = true;
        self
    }

    pub fn saved(&self) -> Vec<PathBuf> {
        self.saved.clone()
    }

    pub fn opened(&self) -> Vec<PathBuf> {
        self.opened.clone()
    }

    pub fn killed(&self) -> Vec<u32> {
        self.killed.clone()
    }

    /// Nodes whose attributes were queried, in query order.
    pub fn attribute_reads(&self) -> Vec<String> {
        self.attribute_reads.borrow().clone()
    }

    /// Node names of the scene as last saved to `path`.
    pub fn remaining_nodes(&self, path: &Path) -> Vec<String> {
        self.disk
            .get(path)
            .map(|scene| scene.nodes.iter().map(|(name, _)| name.clone()).collect())
            .unwrap_or_default()
    }

    fn attribute_query(&self, node: &str) -> Result<Option<&Option<String>>> {
        self.attribute_reads.borrow_mut().push(node.to_string());
        if self.failing_attributes.contains(node) {
            bail!("attribute query on {node} failed");
        }
        Ok(self
            .open
            .position(node)
            .map(|index| &self.open.nodes[index].1))
    }
}

impl SceneRuntime for FakeSceneRuntime {
    fn current_scene(&self) -> Result<Option<PathBuf>> {
        Ok(self.current.clone())
    }

    fn is_modified(&self) -> Result<bool> {
        if self.fail_modified {
            bail!("modified flag unavailable");
        }
        Ok(self.modified)
    }

    fn save_scene(&mut self) -> Result<()> {
        if self.fail_save {
            bail!("disk is read-only");
        }
        let path = self
            .current
            .clone()
            .ok_or_else(|| anyhow!("untitled scene has no path"))?;
        self.disk.insert(path.clone(), self.open.clone());
        self.saved.push(path);
        self.modified = false;
        Ok(())
    }

    fn new_scene(&mut self) -> Result<()> {
        self.open = FakeScene::default();
        self.current = None;
        self.modified = false;
        Ok(())
    }

    fn open_scene(&mut self, path: &Path) -> Result<()> {
        let scene = self
            .disk
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("cannot open {}", path.display()))?;
        self.open = scene;
        self.current = Some(path.to_path_buf());
        self.modified = false;
        self.opened.push(path.to_path_buf());
        Ok(())
    }

    fn list_nodes(&self, node_type: &str) -> Result<Vec<String>> {
        if self.fail_list_nodes {
            bail!("ls -type {node_type} failed");
        }
        if node_type != SCRIPT_NODE_TYPE {
            return Ok(Vec::new());
        }
        Ok(self.open.nodes.iter().map(|(name, _)| name.clone()).collect())
    }

    fn node_exists(&self, node: &str) -> Result<bool> {
        if self.failing_exists.contains(node) {
            bail!("objExists {node} failed");
        }
        Ok(self.open.position(node).is_some())
    }

    fn has_attribute(&self, node: &str, attr: &str) -> Result<bool> {
        let before = self.attribute_query(node)?;
        Ok(attr == BEFORE_ATTR && matches!(before, Some(Some(_))))
    }

    fn string_attribute(&self, node: &str, attr: &str) -> Result<Option<String>> {
        let before = self.attribute_query(node)?;
        if self.failing_strings.contains(node) {
            bail!("getAttr {node}.{attr} failed");
        }
        if attr != BEFORE_ATTR {
            return Ok(None);
        }
        Ok(before.cloned().flatten())
    }

    fn delete_node(&mut self, node: &str) -> Result<()> {
        if self.failing_deletes.contains(node) {
            bail!("{node} is locked");
        }
        let index = self
            .open
            .position(node)
            .ok_or_else(|| anyhow!("no node named {node}"))?;
        self.open.nodes.remove(index);
        self.modified = true;
        Ok(())
    }

    fn list_jobs(&self) -> Result<Vec<String>> {
        if self.fail_list_jobs {
            bail!("scriptJob -listJobs failed");
        }
        Ok(self
            .jobs
            .iter()
            .map(|(id, description)| format!("{id}: {description}"))
            .chain(self.raw_jobs.iter().cloned())
            .collect())
    }

    fn kill_job(&mut self, id: u32) -> Result<()> {
        let index = self
            .jobs
            .iter()
            .position(|(job, _)| *job == id)
            .ok_or_else(|| anyhow!("no job {id}"))?;
        self.jobs.remove(index);
        self.killed.push(id);
        Ok(())
    }

    fn user_script_dir(&self) -> Option<PathBuf> {
        self.user_script_dir.clone()
    }
}

/// Scratch directories plus a factory for cleaners that stage backups there.
pub struct TestCleaner {
    temp: TempDir,
}

impl TestCleaner {
    pub fn new() -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(temp.path().join("work")).expect("create work dir");
        Self { temp }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Directory for target files.
    pub fn work_dir(&self) -> PathBuf {
        self.temp.path().join("work")
    }

    /// Backup staging root; not created until the first snapshot.
    pub fn backup_root(&self) -> PathBuf {
        self.temp.path().join("backups")
    }

    pub fn config(&self) -> CleanerConfig {
        CleanerConfig {
            backup_root: Some(self.backup_root()),
            ..CleanerConfig::default()
        }
    }

    /// Create a placeholder file under the work dir and return its path.
    pub fn touch(&self, name: &str) -> PathBuf {
        let path = self.work_dir().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&path, "//Maya ASCII 2024 scene\n").expect("touch");
        path
    }

    pub fn cleaner(&self) -> Cleaner<FakeSceneRuntime> {
        self.cleaner_with(FakeSceneRuntime::new())
    }

    pub fn cleaner_with<R: SceneRuntime>(&self, runtime: R) -> Cleaner<R> {
        let config = self.config();
        let backups = BackupCoordinator::new(config.backup_root());
        Cleaner::new(
            config,
            SignatureSet::v1(),
            backups,
            runtime,
            RunLedger::new(),
        )
    }
}

impl Default for TestCleaner {
    fn default() -> Self {
        Self::new()
    }
}
