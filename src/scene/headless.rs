//! In-process scene implementation backed by JSON documents on disk.
//!
//! Stands in for the host runtime in tests and in the CLI batch mode. Scene
//! documents are flat JSON: a node list (name, attributes, lock flag,
//! optional owning-reference path) and a script-job list. Lifecycle events
//! fire synchronously, and a failing callback never blocks its siblings.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, SentinelError};
use crate::core::paths::atomic_write;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::scene::{CallbackId, SceneApi, SceneCallback, SceneEvent};

/// The node type that can hold executable script text.
pub const SCRIPT_NODE_TYPE: &str = "script";

/// One node of a scene document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SceneNode {
    /// Unique node name.
    pub name: String,
    /// Host node type; only `"script"` nodes carry script text.
    #[serde(default = "default_node_type")]
    pub node_type: String,
    /// Named string attributes (`before`, `after`, `notes`, ...).
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    /// Integer attributes (`scriptType`, ...).
    #[serde(default)]
    pub int_attrs: BTreeMap<String, i64>,
    /// Whether the node is locked against deletion.
    #[serde(default)]
    pub locked: bool,
    /// Path of the external reference file owning this node, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_path: Option<PathBuf>,
}

fn default_node_type() -> String {
    SCRIPT_NODE_TYPE.to_string()
}

impl SceneNode {
    /// A plain, unreferenced script node.
    #[must_use]
    pub fn script(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node_type: default_node_type(),
            attrs: BTreeMap::new(),
            int_attrs: BTreeMap::new(),
            locked: false,
            reference_path: None,
        }
    }

    /// Set a string attribute, builder style.
    #[must_use]
    pub fn with_attr(mut self, attr: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(attr.into(), value.into());
        self
    }

    /// Mark the node as owned by an external reference file.
    #[must_use]
    pub fn referenced_from(mut self, path: impl Into<PathBuf>) -> Self {
        self.reference_path = Some(path.into());
        self
    }

    /// Lock the node, builder style.
    #[must_use]
    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }
}

/// One scheduled script job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScriptJob {
    /// Host-assigned job id.
    pub id: i64,
    /// Triggering event name.
    pub event: String,
    /// The scheduled expression.
    pub expression: String,
}

impl ScriptJob {
    /// The descriptor form exposed through [`SceneApi::script_jobs`].
    #[must_use]
    pub fn descriptor(&self) -> String {
        format!("{}: {} -> {}", self.id, self.event, self.expression)
    }
}

/// A whole scene document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SceneDoc {
    /// All nodes, script-type or otherwise.
    #[serde(default)]
    pub nodes: Vec<SceneNode>,
    /// Scheduled script jobs.
    #[serde(default)]
    pub jobs: Vec<ScriptJob>,
}

impl SceneDoc {
    /// Load a document from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| SentinelError::io(path, e))?;
        serde_json::from_str(&raw).map_err(|e| SentinelError::ScanOpen {
            path: path.to_path_buf(),
            details: e.to_string(),
        })
    }

    /// Write the document to disk atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_vec_pretty(self)?;
        atomic_write(path, &raw)
    }
}

/// Fixed directory layout handed to a [`HeadlessScene`].
#[derive(Debug, Clone)]
pub struct SceneDirs {
    /// The user application directory.
    pub user_app_dir: PathBuf,
    /// The per-user script directory.
    pub user_script_dir: PathBuf,
    /// The host installation root.
    pub install_root: PathBuf,
}

struct SceneState {
    doc: SceneDoc,
    current_path: Option<PathBuf>,
    callbacks: Vec<(CallbackId, SceneEvent, SceneCallback)>,
    next_callback_id: u64,
    callback_errors: Vec<SentinelError>,
    log: Option<ActivityLoggerHandle>,
}

/// The headless scene runtime.
pub struct HeadlessScene {
    dirs: SceneDirs,
    state: Mutex<SceneState>,
}

impl HeadlessScene {
    /// An empty scene with the given directory layout.
    #[must_use]
    pub fn new(dirs: SceneDirs) -> Self {
        Self {
            dirs,
            state: Mutex::new(SceneState {
                doc: SceneDoc::default(),
                current_path: None,
                callbacks: Vec::new(),
                next_callback_id: 1,
                callback_errors: Vec::new(),
                log: None,
            }),
        }
    }

    /// Replace the in-memory document, without touching disk. Test seam.
    pub fn load_doc(&self, doc: SceneDoc) {
        let mut state = self.state.lock();
        state.doc = doc;
    }

    /// Snapshot of the in-memory document.
    #[must_use]
    pub fn doc(&self) -> SceneDoc {
        self.state.lock().doc.clone()
    }

    /// Route callback failures into the activity log as well as the
    /// drainable error buffer.
    pub fn set_activity_log(&self, log: ActivityLoggerHandle) {
        self.state.lock().log = Some(log);
    }

    /// Fire a lifecycle event, invoking every registered callback in
    /// registration order. A failing callback is recorded and skipped; its
    /// siblings still run. Returns the number of callbacks invoked.
    pub fn fire(&self, event: SceneEvent) -> usize {
        // Snapshot outside the lock: callbacks re-enter the scene.
        let (snapshot, log) = {
            let state = self.state.lock();
            let snapshot: Vec<SceneCallback> = state
                .callbacks
                .iter()
                .filter(|(_, e, _)| *e == event)
                .map(|(_, _, cb)| cb.clone())
                .collect();
            (snapshot, state.log.clone())
        };
        let mut errors = Vec::new();
        for cb in &snapshot {
            if let Err(e) = cb(event) {
                let wrapped = SentinelError::Callback {
                    event: event.name().to_string(),
                    details: e.to_string(),
                };
                if let Some(log) = &log {
                    log.send(ActivityEvent::CallbackFailed {
                        event: event.name().to_string(),
                        error_code: wrapped.code().to_string(),
                        details: e.to_string(),
                    });
                }
                errors.push(wrapped);
            }
        }
        let count = snapshot.len();
        if !errors.is_empty() {
            self.state.lock().callback_errors.extend(errors);
        }
        count
    }

    /// Drain errors recorded by failing callbacks.
    #[must_use]
    pub fn take_callback_errors(&self) -> Vec<SentinelError> {
        std::mem::take(&mut self.state.lock().callback_errors)
    }

    /// Number of currently registered callbacks.
    #[must_use]
    pub fn callback_count(&self) -> usize {
        self.state.lock().callbacks.len()
    }

    fn with_node<T>(&self, node: &str, f: impl FnOnce(&mut SceneNode) -> T) -> Option<T> {
        let mut state = self.state.lock();
        state.doc.nodes.iter_mut().find(|n| n.name == node).map(f)
    }

    fn missing_node(context: &'static str, node: &str) -> SentinelError {
        SentinelError::Scene {
            context,
            details: format!("node does not exist: {node}"),
        }
    }
}

impl SceneApi for HeadlessScene {
    fn script_nodes(&self) -> Vec<String> {
        self.state
            .lock()
            .doc
            .nodes
            .iter()
            .filter(|n| n.node_type == SCRIPT_NODE_TYPE)
            .map(|n| n.name.clone())
            .collect()
    }

    fn node_exists(&self, node: &str) -> bool {
        self.state.lock().doc.nodes.iter().any(|n| n.name == node)
    }

    fn string_attr(&self, node: &str, attr: &str) -> Option<String> {
        self.with_node(node, |n| n.attrs.get(attr).cloned()).flatten()
    }

    fn set_string_attr(&self, node: &str, attr: &str, value: &str) -> Result<()> {
        self.with_node(node, |n| {
            n.attrs.insert(attr.to_string(), value.to_string());
        })
        .ok_or_else(|| Self::missing_node("set_string_attr", node))
    }

    fn set_int_attr(&self, node: &str, attr: &str, value: i64) -> Result<()> {
        self.with_node(node, |n| {
            n.int_attrs.insert(attr.to_string(), value);
        })
        .ok_or_else(|| Self::missing_node("set_int_attr", node))
    }

    fn is_node_referenced(&self, node: &str) -> bool {
        self.with_node(node, |n| n.reference_path.is_some())
            .unwrap_or(false)
    }

    fn reference_file_of(&self, node: &str) -> Option<PathBuf> {
        self.with_node(node, |n| n.reference_path.clone()).flatten()
    }

    fn unlock_node(&self, node: &str) -> bool {
        self.with_node(node, |n| n.locked = false).is_some()
    }

    fn delete_node(&self, node: &str) -> Result<()> {
        let mut state = self.state.lock();
        let Some(idx) = state.doc.nodes.iter().position(|n| n.name == node) else {
            return Err(Self::missing_node("delete_node", node));
        };
        if state.doc.nodes[idx].locked {
            return Err(SentinelError::Scene {
                context: "delete_node",
                details: format!("node is locked: {node}"),
            });
        }
        state.doc.nodes.remove(idx);
        Ok(())
    }

    fn script_jobs(&self) -> Vec<String> {
        self.state
            .lock()
            .doc
            .jobs
            .iter()
            .map(ScriptJob::descriptor)
            .collect()
    }

    fn kill_script_job(&self, id: i64) -> Result<()> {
        let mut state = self.state.lock();
        let before = state.doc.jobs.len();
        state.doc.jobs.retain(|j| j.id != id);
        if state.doc.jobs.len() == before {
            return Err(SentinelError::Scene {
                context: "kill_script_job",
                details: format!("no script job with id {id}"),
            });
        }
        Ok(())
    }

    fn open_scene(&self, path: &Path, _suppress_prompts: bool) -> Result<()> {
        let doc = SceneDoc::load(path)?;
        {
            let mut state = self.state.lock();
            state.doc = doc;
            state.current_path = Some(path.to_path_buf());
        }
        self.fire(SceneEvent::AfterOpen);
        Ok(())
    }

    fn new_scene(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.doc = SceneDoc::default();
        state.current_path = None;
        Ok(())
    }

    fn save_scene(&self) -> Result<()> {
        self.fire(SceneEvent::BeforeSave);
        let (doc, path) = {
            let state = self.state.lock();
            let Some(path) = state.current_path.clone() else {
                return Err(SentinelError::Scene {
                    context: "save_scene",
                    details: "no current scene file".to_string(),
                });
            };
            (state.doc.clone(), path)
        };
        doc.save(&path)
    }

    fn current_scene(&self) -> Option<PathBuf> {
        self.state.lock().current_path.clone()
    }

    fn user_app_dir(&self) -> PathBuf {
        self.dirs.user_app_dir.clone()
    }

    fn user_script_dir(&self) -> PathBuf {
        self.dirs.user_script_dir.clone()
    }

    fn install_root(&self) -> PathBuf {
        self.dirs.install_root.clone()
    }

    fn register_callback(&self, event: SceneEvent, callback: SceneCallback) -> CallbackId {
        let mut state = self.state.lock();
        let id = CallbackId(state.next_callback_id);
        state.next_callback_id += 1;
        state.callbacks.push((id, event, callback));
        id
    }

    fn remove_callback(&self, id: CallbackId) -> bool {
        let mut state = self.state.lock();
        let before = state.callbacks.len();
        state.callbacks.retain(|(cid, _, _)| *cid != id);
        state.callbacks.len() != before
    }
}
