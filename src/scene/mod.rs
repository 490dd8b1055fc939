//! Narrow interface onto the host's scene-graph/scripting runtime.
//!
//! Everything the detection and remediation engine needs from the host goes
//! through [`SceneApi`], so the whole pipeline is testable against the
//! in-process [`headless::HeadlessScene`] implementation. Queries that probe
//! state ("is this node locked", "does this node exist") return
//! booleans/options; errors are reserved for genuine failures.

pub mod headless;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::errors::Result;

/// Host lifecycle events the defender can bind to. Dispatch is synchronous
/// within the host's own event-firing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum SceneEvent {
    AfterOpen,
    Initialized,
    AfterImport,
    AfterImportReference,
    AfterLoadReference,
    BeforeSave,
    BeforeImport,
    BeforeLoadReference,
    BeforeImportReference,
    Exiting,
}

#[allow(missing_docs)]
impl SceneEvent {
    /// Every lifecycle event, in registration order.
    pub const ALL: [Self; 10] = [
        Self::AfterOpen,
        Self::Initialized,
        Self::AfterImport,
        Self::AfterImportReference,
        Self::AfterLoadReference,
        Self::BeforeSave,
        Self::BeforeImport,
        Self::BeforeLoadReference,
        Self::BeforeImportReference,
        Self::Exiting,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AfterOpen => "after_open",
            Self::Initialized => "initialized",
            Self::AfterImport => "after_import",
            Self::AfterImportReference => "after_import_reference",
            Self::AfterLoadReference => "after_load_reference",
            Self::BeforeSave => "before_save",
            Self::BeforeImport => "before_import",
            Self::BeforeLoadReference => "before_load_reference",
            Self::BeforeImportReference => "before_import_reference",
            Self::Exiting => "exiting",
        }
    }
}

impl fmt::Display for SceneEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque handle for a registered callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackId(pub u64);

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cb#{}", self.0)
    }
}

/// A lifecycle callback. Failures are isolated per callback — one failing
/// callback never blocks its siblings for the same event.
pub type SceneCallback = Arc<dyn Fn(SceneEvent) -> Result<()> + Send + Sync>;

/// The consumed host interface.
pub trait SceneApi: Send + Sync {
    // ── node graph ──
    /// Names of all script-type nodes in the current scene.
    fn script_nodes(&self) -> Vec<String>;
    /// Whether a node of any type exists.
    fn node_exists(&self, node: &str) -> bool;
    /// Read a named string attribute; `None` if node or attribute is absent.
    fn string_attr(&self, node: &str, attr: &str) -> Option<String>;
    /// Write a named string attribute.
    fn set_string_attr(&self, node: &str, attr: &str, value: &str) -> Result<()>;
    /// Write a named integer attribute (e.g. a script-type selector).
    fn set_int_attr(&self, node: &str, attr: &str, value: i64) -> Result<()>;
    /// Whether the node is owned by a loaded external reference.
    fn is_node_referenced(&self, node: &str) -> bool;
    /// File path of the reference owning this node, when there is one.
    fn reference_file_of(&self, node: &str) -> Option<PathBuf>;
    /// Unlock a node. Returns false when the node does not exist.
    fn unlock_node(&self, node: &str) -> bool;
    /// Delete a node. Fails on missing, locked, or undeletable nodes.
    fn delete_node(&self, node: &str) -> Result<()>;

    // ── script jobs ──
    /// Descriptors of all scheduled script jobs, `"<id>: <event> -> <expr>"`.
    fn script_jobs(&self) -> Vec<String>;
    /// Force-terminate a job by integer id.
    fn kill_script_job(&self, id: i64) -> Result<()>;

    // ── files ──
    /// Open a scene file, replacing the current scene.
    fn open_scene(&self, path: &Path, suppress_prompts: bool) -> Result<()>;
    /// Start a fresh, empty scene.
    fn new_scene(&self) -> Result<()>;
    /// Save the current scene to its own path.
    fn save_scene(&self) -> Result<()>;
    /// Path of the currently open scene file, if any.
    fn current_scene(&self) -> Option<PathBuf>;

    // ── environment ──
    /// The user application directory.
    fn user_app_dir(&self) -> PathBuf;
    /// The per-user script directory.
    fn user_script_dir(&self) -> PathBuf;
    /// The host's installation root.
    fn install_root(&self) -> PathBuf;
    /// Scripts shared across host versions, under the application directory.
    fn local_script_dir(&self) -> PathBuf {
        self.user_app_dir().join("scripts")
    }

    // ── callbacks ──
    /// Register a callback for a lifecycle event; events fire synchronously.
    fn register_callback(&self, event: SceneEvent, callback: SceneCallback) -> CallbackId;
    /// Remove a callback by id. Returns false when the id is unknown.
    fn remove_callback(&self, id: CallbackId) -> bool;
}
