//! Known dropper files at fixed filesystem locations.
//!
//! The observed strains install themselves under the user script directories
//! and the host's bundled Python site-packages, plus a `syssst` directory in
//! the user application dir. These are wholly malicious, so they go to the
//! malicious-files category and are deleted, never sanitized.

use std::path::PathBuf;

use crate::core::errors::Result;
use crate::logger::activity::ActivityEvent;
use crate::vaccines::{Vaccine, VaccineContext};

const DROPPER_STEMS: [&str; 3] = ["vaccine", "fuckVirus", "maya_secure_system"];

/// Detector for dropper files at known paths.
pub struct FilePathVaccine;

impl FilePathVaccine {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn candidate_dirs(ctx: &VaccineContext<'_>) -> Vec<PathBuf> {
        let install = ctx.scene.install_root();
        vec![
            ctx.scene.user_script_dir(),
            ctx.scene.local_script_dir(),
            install.join("Python").join("Lib").join("site-packages"),
            install.join("Python37").join("Lib").join("site-packages"),
        ]
    }
}

impl Default for FilePathVaccine {
    fn default() -> Self {
        Self::new()
    }
}

impl Vaccine for FilePathVaccine {
    fn family(&self) -> &'static str {
        "dropper_files"
    }

    fn collect(&self, ctx: &mut VaccineContext<'_>) -> Result<()> {
        for dir in Self::candidate_dirs(ctx) {
            for stem in DROPPER_STEMS {
                for ext in ["py", "pyc"] {
                    let candidate = dir.join(format!("{stem}.{ext}"));
                    if candidate.exists() {
                        ctx.log.send(ActivityEvent::IssueFound {
                            family: self.family().to_string(),
                            target: candidate.display().to_string(),
                        });
                        ctx.ledger.add_malicious_file(candidate);
                    }
                }
            }
        }

        // The 2024 strain hides its stager under an innocuous-looking
        // directory in the user application dir.
        let syssst = ctx.scene.user_app_dir().join("syssst");
        if syssst.exists() {
            ctx.log.send(ActivityEvent::IssueFound {
                family: self.family().to_string(),
                target: syssst.display().to_string(),
            });
            ctx.ledger.add_malicious_file(syssst);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::ledger::Ledger;
    use crate::logger::activity::ActivityLoggerHandle;
    use crate::scene::SceneApi;
    use crate::scene::headless::{HeadlessScene, SceneDirs};
    use crate::signature::catalog::SignatureCatalog;
    use std::fs;

    fn scene_with_dirs(root: &std::path::Path) -> HeadlessScene {
        HeadlessScene::new(SceneDirs {
            user_app_dir: root.join("app"),
            user_script_dir: root.join("app").join("2026").join("scripts"),
            install_root: root.join("install"),
        })
    }

    #[test]
    fn finds_droppers_in_script_and_site_package_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let scene = scene_with_dirs(dir.path());
        let script_dir = scene.user_script_dir();
        fs::create_dir_all(&script_dir).unwrap();
        fs::write(script_dir.join("vaccine.py"), "payload").unwrap();

        let site = scene
            .install_root()
            .join("Python")
            .join("Lib")
            .join("site-packages");
        fs::create_dir_all(&site).unwrap();
        fs::write(site.join("fuckVirus.pyc"), [0u8; 4]).unwrap();

        let syssst = scene.user_app_dir().join("syssst");
        fs::create_dir_all(&syssst).unwrap();

        let catalog = SignatureCatalog::builtin().unwrap();
        let config = Config::default();
        let log = ActivityLoggerHandle::disabled();
        let mut ledger = Ledger::new();
        let mut ctx = VaccineContext {
            scene: &scene,
            ledger: &mut ledger,
            catalog: &catalog,
            config: &config,
            log: &log,
        };
        FilePathVaccine::new().collect(&mut ctx).unwrap();

        let found = ledger.malicious_files();
        assert!(found.contains(&script_dir.join("vaccine.py")));
        assert!(found.contains(&site.join("fuckVirus.pyc")));
        assert!(found.contains(&syssst));
    }

    #[test]
    fn clean_environment_records_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let scene = scene_with_dirs(dir.path());
        let catalog = SignatureCatalog::builtin().unwrap();
        let config = Config::default();
        let log = ActivityLoggerHandle::disabled();
        let mut ledger = Ledger::new();
        let mut ctx = VaccineContext {
            scene: &scene,
            ledger: &mut ledger,
            catalog: &catalog,
            config: &config,
            log: &log,
        };
        FilePathVaccine::new().collect(&mut ctx).unwrap();
        assert!(!ledger.have_issues());
    }
}
