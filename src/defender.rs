//! Lifecycle defender: binds detection and remediation to host events.
//!
//! Each `Defender` instance tracks exactly the callback ids it registered,
//! so two defenders on one scene never interfere and `stop()` removes only
//! its own hooks. Armed state and the ledger live behind one mutex; the host
//! fires events on its single scripting thread, so there is no contention in
//! practice.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::cleaner::Cleaner;
use crate::core::config::Config;
use crate::core::errors::Result;
use crate::core::paths::safe_remove_file;
use crate::ledger::Ledger;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::scene::{CallbackId, SceneApi, SceneEvent};
use crate::signature::catalog::SignatureCatalog;
use crate::vaccines::{self, Vaccine, VaccineContext};

/// What an armed defender does when an event fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefenderMode {
    /// Collect, then remediate everything found.
    AutoFix,
    /// Collect and report; never mutates the scene or the filesystem.
    ReportOnly,
}

impl fmt::Display for DefenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AutoFix => "auto_fix",
            Self::ReportOnly => "report_only",
        })
    }
}

struct DefenderState {
    ledger: Ledger,
    callback_ids: Vec<CallbackId>,
}

struct DefenderInner {
    scene: Arc<dyn SceneApi>,
    catalog: SignatureCatalog,
    config: Config,
    mode: DefenderMode,
    log: ActivityLoggerHandle,
    vaccines: Vec<Box<dyn Vaccine>>,
    state: Mutex<DefenderState>,
}

/// The session defender. Cheap to clone; clones share one instance.
#[derive(Clone)]
pub struct Defender {
    inner: Arc<DefenderInner>,
}

impl Defender {
    /// Build a defender for `scene`. Vaccines that fail to construct are
    /// logged and skipped; the built-in signature catalog must compile.
    pub fn new(
        scene: Arc<dyn SceneApi>,
        config: Config,
        mode: DefenderMode,
        log: ActivityLoggerHandle,
    ) -> Result<Self> {
        let catalog = SignatureCatalog::builtin()?;
        let vaccines = vaccines::load_vaccines(&log);
        Ok(Self {
            inner: Arc::new(DefenderInner {
                scene,
                catalog,
                config,
                mode,
                log,
                vaccines,
                state: Mutex::new(DefenderState {
                    ledger: Ledger::new(),
                    callback_ids: Vec::new(),
                }),
            }),
        })
    }

    /// Arm the defender: register the dispatch callback for every lifecycle
    /// event, plus the temp-file sweeper on session start and exit.
    /// Idempotent.
    pub fn setup(&self) {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        if !state.callback_ids.is_empty() {
            return;
        }

        for event in SceneEvent::ALL {
            let weak = Arc::downgrade(inner);
            let id = inner.scene.register_callback(
                event,
                Arc::new(move |fired| {
                    if let Some(inner) = Weak::upgrade(&weak) {
                        inner.handle_event(fired);
                    }
                    Ok(())
                }),
            );
            state.callback_ids.push(id);
        }

        for event in [SceneEvent::Initialized, SceneEvent::Exiting] {
            let weak = Arc::downgrade(inner);
            let id = inner.scene.register_callback(
                event,
                Arc::new(move |_| {
                    if let Some(inner) = Weak::upgrade(&weak) {
                        inner.sweep_temp_files();
                    }
                    Ok(())
                }),
            );
            state.callback_ids.push(id);
        }

        inner.log.send(ActivityEvent::DefenderArmed {
            mode: inner.mode.to_string(),
            callbacks: state.callback_ids.len(),
        });
    }

    /// Disarm: remove exactly the callbacks this instance registered.
    /// Idempotent.
    pub fn stop(&self) {
        let inner = &self.inner;
        let ids = {
            let mut state = inner.state.lock();
            std::mem::take(&mut state.callback_ids)
        };
        if ids.is_empty() {
            return;
        }
        let mut removed = 0;
        for id in ids {
            if inner.scene.remove_callback(id) {
                removed += 1;
            }
        }
        inner.log.send(ActivityEvent::DefenderDisarmed { removed });
    }

    /// Whether the defender currently has callbacks registered.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        !self.inner.state.lock().callback_ids.is_empty()
    }

    /// Run every vaccine over the current scene, replacing prior findings.
    pub fn collect(&self) {
        self.inner.collect();
    }

    /// Remediate current findings. No-op in report-only mode.
    pub fn fix(&self) {
        if self.inner.mode == DefenderMode::AutoFix {
            self.inner.fix();
        }
    }

    /// Emit current findings through the activity log.
    pub fn report(&self) {
        let state = self.inner.state.lock();
        state.ledger.report(&self.inner.log);
    }

    /// Whether the last collection found anything still outstanding.
    #[must_use]
    pub fn have_issues(&self) -> bool {
        self.inner.state.lock().ledger.have_issues()
    }

    /// Run `f` with read access to the current findings.
    pub fn with_ledger<T>(&self, f: impl FnOnce(&Ledger) -> T) -> T {
        f(&self.inner.state.lock().ledger)
    }

    /// Disarm now and re-arm when the guard drops. The batch scanner uses
    /// this so its own opens and saves do not retrigger the defender. A
    /// defender that was not armed stays that way after the guard drops.
    #[must_use]
    pub fn paused(&self) -> PausedDefender {
        let rearm = self.is_armed();
        self.stop();
        PausedDefender {
            defender: self.clone(),
            rearm,
        }
    }
}

impl DefenderInner {
    fn handle_event(&self, _event: SceneEvent) {
        self.collect();
        match self.mode {
            DefenderMode::AutoFix => {
                self.fix();
                self.sweep_temp_files();
            }
            DefenderMode::ReportOnly => {
                let state = self.state.lock();
                state.ledger.report(&self.log);
            }
        }
    }

    fn collect(&self) {
        let mut state = self.state.lock();
        state.ledger.reset();
        for vaccine in &self.vaccines {
            let mut ctx = VaccineContext {
                scene: self.scene.as_ref(),
                ledger: &mut state.ledger,
                catalog: &self.catalog,
                config: &self.config,
                log: &self.log,
            };
            if let Err(e) = vaccine.collect(&mut ctx) {
                self.log.send(ActivityEvent::VaccineLoadFailed {
                    family: vaccine.family().to_string(),
                    error_code: e.code().to_string(),
                    details: e.to_string(),
                });
            }
        }
        let (malicious, infected, nodes, jobs, references) = state.ledger.counts();
        self.log.send(ActivityEvent::IssuesCollected {
            malicious_files: malicious,
            infected_files: infected,
            infected_nodes: nodes,
            infected_jobs: jobs,
            reference_files: references,
        });
    }

    fn fix(&self) {
        let mut state = self.state.lock();
        let cleaner = Cleaner::new(self.scene.as_ref(), &self.catalog, &self.config, &self.log);
        cleaner.fix(&mut state.ledger);
    }

    /// Remove `._*` litter from the local script dir. Crash leftovers from
    /// interrupted atomic rewrites; errors are logged and swallowed.
    fn sweep_temp_files(&self) {
        let pattern = self.scene.local_script_dir().join("._*");
        let Ok(entries) = glob::glob(&pattern.to_string_lossy()) else {
            return;
        };
        for path in entries.flatten() {
            if let Err(e) = safe_remove_file(&path) {
                self.log.send(ActivityEvent::FixFailed {
                    target: path.display().to_string(),
                    error_code: e.code().to_string(),
                    details: e.to_string(),
                });
            }
        }
    }
}

/// RAII guard from [`Defender::paused`]; re-arms on drop.
pub struct PausedDefender {
    defender: Defender,
    rearm: bool,
}

impl Drop for PausedDefender {
    fn drop(&mut self) {
        if self.rearm {
            self.defender.setup();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::headless::{HeadlessScene, SceneDirs, SceneDoc, SceneNode};
    use std::fs;
    use std::path::Path;

    fn scene_in(root: &Path) -> Arc<HeadlessScene> {
        Arc::new(HeadlessScene::new(SceneDirs {
            user_app_dir: root.join("app"),
            user_script_dir: root.join("app").join("2026").join("scripts"),
            install_root: root.join("install"),
        }))
    }

    fn defender(scene: Arc<HeadlessScene>, mode: DefenderMode) -> Defender {
        Defender::new(
            scene,
            Config::default(),
            mode,
            ActivityLoggerHandle::disabled(),
        )
        .unwrap()
    }

    #[test]
    fn setup_and_stop_track_exact_callback_set() {
        let dir = tempfile::tempdir().unwrap();
        let scene = scene_in(dir.path());
        let d = defender(scene.clone(), DefenderMode::AutoFix);

        d.setup();
        assert!(d.is_armed());
        let registered = scene.callback_count();
        assert_eq!(registered, SceneEvent::ALL.len() + 2);

        // Second setup adds nothing.
        d.setup();
        assert_eq!(scene.callback_count(), registered);

        d.stop();
        assert!(!d.is_armed());
        assert_eq!(scene.callback_count(), 0);

        // Second stop is a no-op.
        d.stop();
        assert_eq!(scene.callback_count(), 0);
    }

    #[test]
    fn stop_leaves_foreign_callbacks_alone() {
        let dir = tempfile::tempdir().unwrap();
        let scene = scene_in(dir.path());
        let foreign = scene.register_callback(SceneEvent::AfterOpen, Arc::new(|_| Ok(())));

        let d = defender(scene.clone(), DefenderMode::AutoFix);
        d.setup();
        d.stop();

        assert_eq!(scene.callback_count(), 1);
        assert!(scene.remove_callback(foreign));
    }

    #[test]
    fn open_event_triggers_autofix() {
        let dir = tempfile::tempdir().unwrap();
        let scene = scene_in(dir.path());
        let scene_path = dir.path().join("infected.scene");
        SceneDoc {
            nodes: vec![SceneNode::script("uifiguration")],
            jobs: vec![],
        }
        .save(&scene_path)
        .unwrap();

        let d = defender(scene.clone(), DefenderMode::AutoFix);
        d.setup();
        scene.open_scene(&scene_path, true).unwrap();

        assert!(!scene.node_exists("uifiguration"));
        assert!(!d.have_issues());
    }

    #[test]
    fn report_only_never_mutates() {
        let dir = tempfile::tempdir().unwrap();
        let scene = scene_in(dir.path());
        let scene_path = dir.path().join("infected.scene");
        SceneDoc {
            nodes: vec![SceneNode::script("uifiguration")],
            jobs: vec![],
        }
        .save(&scene_path)
        .unwrap();

        let d = defender(scene.clone(), DefenderMode::ReportOnly);
        d.setup();
        scene.open_scene(&scene_path, true).unwrap();

        assert!(scene.node_exists("uifiguration"));
        assert!(d.have_issues());
        d.fix();
        assert!(scene.node_exists("uifiguration"));
    }

    #[test]
    fn paused_guard_rearms_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let scene = scene_in(dir.path());
        let d = defender(scene.clone(), DefenderMode::AutoFix);
        d.setup();

        {
            let _guard = d.paused();
            assert!(!d.is_armed());
            assert_eq!(scene.callback_count(), 0);
        }
        assert!(d.is_armed());
        assert_eq!(scene.callback_count(), SceneEvent::ALL.len() + 2);
    }

    #[test]
    fn sweeper_clears_temp_litter_on_init() {
        let dir = tempfile::tempdir().unwrap();
        let scene = scene_in(dir.path());
        let script_dir = scene.local_script_dir();
        fs::create_dir_all(&script_dir).unwrap();
        fs::write(script_dir.join("._A1B2C3"), "partial").unwrap();
        fs::write(script_dir.join("keep.py"), "fine").unwrap();

        let d = defender(scene.clone(), DefenderMode::AutoFix);
        d.setup();
        scene.fire(SceneEvent::Initialized);

        assert!(!script_dir.join("._A1B2C3").exists());
        assert!(script_dir.join("keep.py").exists());
        drop(d);
    }

    #[test]
    fn collect_populates_ledger_without_fixing() {
        let dir = tempfile::tempdir().unwrap();
        let scene = scene_in(dir.path());
        scene.load_doc(SceneDoc {
            nodes: vec![SceneNode::script("codeExtractor")],
            jobs: vec![],
        });
        let d = defender(scene.clone(), DefenderMode::AutoFix);
        d.collect();
        assert!(d.have_issues());
        assert!(scene.node_exists("codeExtractor"));
        d.fix();
        assert!(!scene.node_exists("codeExtractor"));
    }
}
