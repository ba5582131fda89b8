//! Scene runtime port used by the scene remediator.
//!
//! A runtime owns exactly one open scene at a time. Opening another scene
//! invalidates every node name obtained earlier, so callers must not hold
//! names across `open_scene`/`new_scene`. Every call may fail on transient
//! state; the remediator catches failures per call.

use std::path::{Path, PathBuf};

use anyhow::Result;

pub trait SceneRuntime {
    /// Path of the open scene, or `None` for an untitled scene.
    fn current_scene(&self) -> Result<Option<PathBuf>>;

    /// Whether the open scene has unsaved changes.
    fn is_modified(&self) -> Result<bool>;

    /// Save the open scene to its own path.
    fn save_scene(&mut self) -> Result<()>;

    /// Discard the open scene and start an untitled empty one.
    fn new_scene(&mut self) -> Result<()>;

    /// Open `path`, replacing the current scene.
    fn open_scene(&mut self, path: &Path) -> Result<()>;

    /// Names of all nodes of `node_type`, in scene order.
    fn list_nodes(&self, node_type: &str) -> Result<Vec<String>>;

    fn node_exists(&self, node: &str) -> Result<bool>;

    fn has_attribute(&self, node: &str, attr: &str) -> Result<bool>;

    /// String value of `node.attr`; `None` when unset.
    fn string_attribute(&self, node: &str, attr: &str) -> Result<Option<String>>;

    fn delete_node(&mut self, node: &str) -> Result<()>;

    /// Registered script jobs as `"<id>: <description>"` strings.
    fn list_jobs(&self) -> Result<Vec<String>>;

    /// Force-kill the script job with `id`.
    fn kill_job(&mut self, id: u32) -> Result<()>;

    /// The runtime's per-user script directory, if it can be resolved.
    fn user_script_dir(&self) -> Option<PathBuf>;
}
