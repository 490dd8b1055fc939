//! Batch scanner: opens scene files one by one, fixing what it finds.
//!
//! Infected reference files discovered inside a scene are appended to the
//! worklist, so an infection is chased across the whole reference graph. A
//! done-set keeps every path to at most one visit per run, which makes
//! reference cycles terminate. One unreadable input never aborts the run;
//! it is recorded in the failed list and the scan moves on.

use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::core::config::Config;
use crate::core::errors::{Result, SentinelError};
use crate::core::paths::backup_path_for;
use crate::defender::{Defender, DefenderMode};
use crate::ledger::Ledger;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::scene::SceneApi;

/// Outcome of one batch run.
#[derive(Debug, Default)]
pub struct ScanReport {
    fixed: Vec<PathBuf>,
    failed: Vec<(PathBuf, String)>,
    visited: usize,
}

impl ScanReport {
    /// Paths that carried issues and were remediated and saved.
    #[must_use]
    pub fn fixed(&self) -> &[PathBuf] {
        &self.fixed
    }

    /// Paths that could not be processed, with the failure rendered.
    #[must_use]
    pub fn failed(&self) -> &[(PathBuf, String)] {
        &self.failed
    }

    /// Total number of distinct paths visited.
    #[must_use]
    pub const fn visited(&self) -> usize {
        self.visited
    }
}

/// Scans batches of scene files through a paused defender.
pub struct BatchScanner {
    scene: std::sync::Arc<dyn SceneApi>,
    defender: Defender,
    config: Config,
    log: ActivityLoggerHandle,
}

impl BatchScanner {
    /// Build a scanner. `[scan].extra_env` overrides are folded into the
    /// working config first, and the scanner's own defender is built from
    /// the folded config so every fix step sees the overridden knobs.
    pub fn new(
        scene: std::sync::Arc<dyn SceneApi>,
        mode: DefenderMode,
        mut config: Config,
        log: ActivityLoggerHandle,
    ) -> Result<Self> {
        let extra_env = config.scan.extra_env.clone();
        config.apply_overrides(&extra_env)?;
        let defender = Defender::new(scene.clone(), config.clone(), mode, log.clone())?;
        Ok(Self {
            scene,
            defender,
            config,
            log,
        })
    }

    /// The defender driving collect/fix for this scanner.
    #[must_use]
    pub const fn defender(&self) -> &Defender {
        &self.defender
    }

    /// Scan every path matching a glob pattern.
    pub fn scan_pattern(&self, pattern: &str) -> Result<ScanReport> {
        let entries = glob::glob(pattern).map_err(|e| SentinelError::ScanInput {
            details: format!("bad glob pattern {pattern:?}: {e}"),
        })?;
        Ok(self.scan_paths(entries.flatten()))
    }

    /// Scan paths read from a newline-delimited list file. Blank lines and
    /// `#` comments are skipped.
    pub fn scan_list_file(&self, list: &Path) -> Result<ScanReport> {
        let raw = fs::read_to_string(list).map_err(|e| SentinelError::io(list, e))?;
        let paths: Vec<PathBuf> = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(PathBuf::from)
            .collect();
        Ok(self.scan_paths(paths))
    }

    /// Scan an explicit set of paths, chasing reference edges.
    pub fn scan_paths(&self, paths: impl IntoIterator<Item = PathBuf>) -> ScanReport {
        let _paused = self.defender.paused();

        let mut worklist: VecDeque<PathBuf> = paths.into_iter().collect();
        let mut done: HashSet<PathBuf> = HashSet::new();
        let mut report = ScanReport::default();

        while let Some(path) = worklist.pop_front() {
            if !done.insert(path.clone()) {
                continue;
            }
            report.visited += 1;
            self.scan_one(&path, &mut worklist, &done, &mut report);
        }

        self.log.send(ActivityEvent::ScanCompleted {
            fixed: report.fixed.len(),
            failed: report.failed.len(),
            visited: report.visited,
        });
        report
    }

    fn scan_one(
        &self,
        path: &Path,
        worklist: &mut VecDeque<PathBuf>,
        done: &HashSet<PathBuf>,
        report: &mut ScanReport,
    ) {
        if let Err(e) = self.scene.new_scene() {
            self.record_failure(path, &e, report);
            return;
        }
        if let Err(e) = self
            .scene
            .open_scene(path, self.config.scan.suppress_prompts)
        {
            self.record_failure(path, &e, report);
            return;
        }

        self.defender.collect();
        if !self.defender.have_issues() {
            return;
        }

        if let Err(e) = self.backup_original(path) {
            // A failed backup is logged but never blocks the fix.
            self.log.send(ActivityEvent::FixFailed {
                target: path.display().to_string(),
                error_code: e.code().to_string(),
                details: e.to_string(),
            });
        }

        self.defender.fix();
        if let Err(e) = self.scene.save_scene() {
            self.record_failure(path, &e, report);
            return;
        }

        self.log.send(ActivityEvent::ScanFileFixed {
            path: path.display().to_string(),
        });
        report.fixed.push(path.to_path_buf());

        for reference in self.defender.with_ledger(Ledger::infected_reference_files) {
            if !done.contains(&reference) {
                worklist.push_back(reference);
            }
        }
    }

    /// Copy the pre-fix bytes aside and log their digest.
    fn backup_original(&self, path: &Path) -> Result<()> {
        let Some(dest) = backup_path_for(path, &self.config.backup)? else {
            return Ok(());
        };
        let bytes = fs::read(path).map_err(|e| SentinelError::io(path, e))?;
        fs::write(&dest, &bytes).map_err(|e| SentinelError::io(&dest, e))?;

        let digest = Sha256::digest(&bytes);
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        self.log.send(ActivityEvent::BackupCreated {
            path: path.display().to_string(),
            backup_path: dest.display().to_string(),
            digest: hex,
        });
        Ok(())
    }

    fn record_failure(&self, path: &Path, error: &SentinelError, report: &mut ScanReport) {
        self.log.send(ActivityEvent::ScanFileFailed {
            path: path.display().to_string(),
            error_code: error.code().to_string(),
            details: error.to_string(),
        });
        report.failed.push((path.to_path_buf(), error.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defender::DefenderMode;
    use crate::scene::headless::{HeadlessScene, SceneDirs, SceneDoc, SceneNode};
    use std::sync::Arc;

    fn harness(root: &Path) -> (Arc<HeadlessScene>, BatchScanner) {
        harness_with_config(root, Config::default())
    }

    fn harness_with_config(root: &Path, config: Config) -> (Arc<HeadlessScene>, BatchScanner) {
        let scene = Arc::new(HeadlessScene::new(SceneDirs {
            user_app_dir: root.join("app"),
            user_script_dir: root.join("app").join("2026").join("scripts"),
            install_root: root.join("install"),
        }));
        let log = ActivityLoggerHandle::disabled();
        let scanner = BatchScanner::new(
            scene.clone(),
            DefenderMode::AutoFix,
            config,
            log,
        )
        .unwrap();
        (scene, scanner)
    }

    fn infected_doc() -> SceneDoc {
        SceneDoc {
            nodes: vec![SceneNode::script("uifiguration")],
            jobs: vec![],
        }
    }

    #[test]
    fn infected_file_is_fixed_saved_and_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.scene");
        infected_doc().save(&path).unwrap();

        let (_scene, scanner) = harness(dir.path());
        let report = scanner.scan_paths(vec![path.clone()]);

        assert_eq!(report.fixed(), [path.clone()]);
        assert!(report.failed().is_empty());

        let fixed = SceneDoc::load(&path).unwrap();
        assert!(fixed.nodes.iter().all(|n| n.name != "uifiguration"));

        // Pre-fix bytes live in the sibling backup folder.
        let backup = dir.path().join("_virus").join("shot.scene");
        let original = SceneDoc::load(&backup).unwrap();
        assert!(original.nodes.iter().any(|n| n.name == "uifiguration"));
    }

    #[test]
    fn clean_file_is_left_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clean.scene");
        SceneDoc::default().save(&path).unwrap();
        let before = fs::read(&path).unwrap();

        let (_scene, scanner) = harness(dir.path());
        let report = scanner.scan_paths(vec![path.clone()]);

        assert!(report.fixed().is_empty());
        assert_eq!(fs::read(&path).unwrap(), before);
        assert!(!dir.path().join("_virus").exists());
    }

    #[test]
    fn unreadable_input_is_recorded_and_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.scene");
        infected_doc().save(&good).unwrap();
        let missing = dir.path().join("missing.scene");

        let (_scene, scanner) = harness(dir.path());
        let report = scanner.scan_paths(vec![missing.clone(), good.clone()]);

        assert_eq!(report.fixed(), [good]);
        assert_eq!(report.failed().len(), 1);
        assert_eq!(report.failed()[0].0, missing);
    }

    #[test]
    fn reference_cycle_visits_each_file_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.scene");
        let b = dir.path().join("b.scene");

        // a carries an infected node owned by b; b the mirror image.
        SceneDoc {
            nodes: vec![
                SceneNode::script("badA")
                    .with_attr("before", "leukocyte.occupation()")
                    .referenced_from(&b),
            ],
            jobs: vec![],
        }
        .save(&a)
        .unwrap();
        SceneDoc {
            nodes: vec![
                SceneNode::script("badB")
                    .with_attr("before", "leukocyte.occupation()")
                    .referenced_from(&a),
            ],
            jobs: vec![],
        }
        .save(&b)
        .unwrap();

        let (_scene, scanner) = harness(dir.path());
        let report = scanner.scan_paths(vec![a.clone()]);

        assert_eq!(report.visited(), 2);
        assert_eq!(report.fixed(), [a.clone(), b.clone()]);

        for path in [a, b] {
            let doc = SceneDoc::load(&path).unwrap();
            for node in &doc.nodes {
                assert_eq!(node.attrs.get("before").map(String::as_str), Some(""));
            }
        }
    }

    #[test]
    fn scan_list_file_skips_comments_and_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.scene");
        infected_doc().save(&path).unwrap();
        let list = dir.path().join("targets.txt");
        fs::write(
            &list,
            format!("# batch targets\n\n{}\n", path.display()),
        )
        .unwrap();

        let (_scene, scanner) = harness(dir.path());
        let report = scanner.scan_list_file(&list).unwrap();
        assert_eq!(report.fixed(), [path]);
    }

    #[test]
    fn scan_pattern_expands_glob() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["one.scene", "two.scene"] {
            infected_doc().save(&dir.path().join(name)).unwrap();
        }

        let (_scene, scanner) = harness(dir.path());
        let pattern = dir.path().join("*.scene");
        let report = scanner.scan_pattern(&pattern.to_string_lossy()).unwrap();
        assert_eq!(report.fixed().len(), 2);
    }

    #[test]
    fn extra_env_overrides_disable_backups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.scene");
        infected_doc().save(&path).unwrap();

        let mut config = Config::default();
        config
            .scan
            .extra_env
            .insert("SSN_IGNORE_BACKUP".to_string(), "1".to_string());
        let (_scene, scanner) = harness_with_config(dir.path(), config);

        let report = scanner.scan_paths(vec![path]);
        assert_eq!(report.fixed().len(), 1);
        assert!(!dir.path().join("_virus").exists());
    }

    #[test]
    fn extra_env_threshold_is_honored_by_the_fix_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.scene");
        SceneDoc::default().save(&path).unwrap();

        let mut config = Config::default();
        config
            .scan
            .extra_env
            .insert("SSN_EMPTY_THRESHOLD".to_string(), "8".to_string());
        let (scene, scanner) = harness_with_config(dir.path(), config);

        // The legit remainder is 13 bytes: below the default threshold but
        // above the overridden one, so the startup script must survive a
        // rewrite instead of being deleted.
        let script_dir = scene.user_script_dir();
        fs::create_dir_all(&script_dir).unwrap();
        let startup = script_dir.join("userSetup.py");
        fs::write(&startup, "import vaccine\nprint('keep')\n").unwrap();

        let report = scanner.scan_paths(vec![path]);
        assert_eq!(report.fixed().len(), 1);
        let after = fs::read_to_string(&startup).unwrap();
        assert!(after.contains("print('keep')"));
        assert!(!after.contains("import vaccine"));
    }

    #[test]
    fn defender_is_rearmed_after_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let (scene, scanner) = harness(dir.path());
        scanner.defender.setup();
        let armed = scene.callback_count();

        let report = scanner.scan_paths(Vec::new());
        assert_eq!(report.visited(), 0);
        assert_eq!(scene.callback_count(), armed);
    }
}
