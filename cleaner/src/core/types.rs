//! Shared deterministic types for cleaner core logic.

use std::fmt;

use serde::Serialize;

/// Node type tag of the scene objects that can carry worm code.
pub const SCRIPT_NODE_TYPE: &str = "script";
/// Script node attribute executed when a scene is opened.
pub const BEFORE_ATTR: &str = "before";

/// Kind of in-scene object removed by the scene remediator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneObjectKind {
    ScriptNode,
    ScriptJob,
}

/// Why a scene object was considered infected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "marker")]
pub enum FindingReason {
    /// Object identifier contains a worm node-name fragment.
    NameMarker(String),
    /// Script node code contains a signature token.
    CodeSignature(String),
    /// Script job description contains a signature token.
    JobSignature(String),
}

/// A scene object that was detected and removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SceneFinding {
    pub kind: SceneObjectKind,
    /// Node name, or the job description as listed by the runtime.
    pub id: String,
    #[serde(flatten)]
    pub reason: FindingReason,
}

impl fmt::Display for FindingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FindingReason::NameMarker(marker) => write!(f, "name contains `{marker}`"),
            FindingReason::CodeSignature(marker) => write!(f, "code contains `{marker}`"),
            FindingReason::JobSignature(marker) => write!(f, "job contains `{marker}`"),
        }
    }
}
