//! Startup scripts that the host executes on launch.
//!
//! `userSetup.py` / `usersetup.mel` are legitimate user customization points
//! that the observed strains append themselves to, so an infected startup
//! script is sanitized rather than deleted. When stripping would leave
//! nothing useful the file is classified as wholly malicious up front.
//!
//! Also registers the pass-scoped sweep of localized plug-in resource
//! overrides under the install root, where one strain re-seeds itself for
//! every installed locale.

use std::fs;
use std::path::{Path, PathBuf};

use crate::core::errors::{Result, SentinelError};
use crate::logger::activity::ActivityEvent;
use crate::signature::matcher::{self, FileAction};
use crate::signature::catalog::SignatureScope;
use crate::vaccines::{Vaccine, VaccineContext};

const STARTUP_NAMES: [&str; 2] = ["userSetup.py", "usersetup.mel"];

/// Detector for infected startup scripts.
pub struct StartupScriptVaccine;

impl StartupScriptVaccine {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for StartupScriptVaccine {
    fn default() -> Self {
        Self::new()
    }
}

fn read_text(path: &Path) -> Result<Option<String>> {
    let bytes = fs::read(path).map_err(|e| SentinelError::io(path, e))?;
    Ok(String::from_utf8(bytes).ok())
}

/// Glob pattern matching every locale's plug-in resource override.
fn l10n_pattern(install_root: &Path) -> PathBuf {
    install_root
        .join("resources")
        .join("l10n")
        .join("*")
        .join("plug-ins")
        .join("*.pres.mel")
}

impl Vaccine for StartupScriptVaccine {
    fn family(&self) -> &'static str {
        "startup_scripts"
    }

    fn collect(&self, ctx: &mut VaccineContext<'_>) -> Result<()> {
        let threshold = ctx.config.matcher.empty_threshold_bytes;

        for dir in [ctx.scene.user_script_dir(), ctx.scene.local_script_dir()] {
            for name in STARTUP_NAMES {
                let path = dir.join(name);
                if !path.exists() {
                    continue;
                }
                let Some(content) = read_text(&path)? else {
                    continue;
                };
                if !matcher::check_content(&content, ctx.catalog, SignatureScope::Content) {
                    continue;
                }
                ctx.log.send(ActivityEvent::IssueFound {
                    family: self.family().to_string(),
                    target: path.display().to_string(),
                });
                if matcher::strips_to_empty(&content, ctx.catalog, threshold) {
                    ctx.ledger.add_malicious_file(path);
                } else {
                    ctx.ledger.add_infected_file(path);
                }
            }
        }

        // Locale resource overrides are swept during remediation, whether or
        // not a startup script was hit this pass.
        let pattern = l10n_pattern(&ctx.scene.install_root());
        ctx.ledger.add_extra_fix(Box::new(move |fix_ctx| {
            let threshold = fix_ctx.config.matcher.empty_threshold_bytes;
            let pattern = pattern.to_string_lossy();
            let entries = glob::glob(&pattern).map_err(|e| SentinelError::Runtime {
                details: format!("bad l10n glob {pattern}: {e}"),
            })?;
            for path in entries.flatten() {
                match matcher::sanitize_file(&path, fix_ctx.catalog, threshold)? {
                    FileAction::Clean => {}
                    FileAction::Rewritten => fix_ctx.log.send(ActivityEvent::FileSanitized {
                        path: path.display().to_string(),
                        details: "l10n resource override".to_string(),
                    }),
                    FileAction::Deleted => fix_ctx.log.send(ActivityEvent::FileDeleted {
                        path: path.display().to_string(),
                    }),
                }
            }
            Ok(())
        }));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::ledger::{FixContext, Ledger};
    use crate::logger::activity::ActivityLoggerHandle;
    use crate::scene::headless::{HeadlessScene, SceneDirs};
    use crate::signature::catalog::SignatureCatalog;
    use crate::scene::SceneApi;

    fn scene_with_dirs(root: &Path) -> HeadlessScene {
        HeadlessScene::new(SceneDirs {
            user_app_dir: root.join("app"),
            user_script_dir: root.join("app").join("2026").join("scripts"),
            install_root: root.join("install"),
        })
    }

    fn collect(scene: &HeadlessScene, ledger: &mut Ledger) {
        let catalog = SignatureCatalog::builtin().unwrap();
        let config = Config::default();
        let log = ActivityLoggerHandle::disabled();
        let mut ctx = VaccineContext {
            scene,
            ledger,
            catalog: &catalog,
            config: &config,
            log: &log,
        };
        StartupScriptVaccine::new().collect(&mut ctx).unwrap();
    }

    #[test]
    fn mixed_startup_script_is_infected_not_malicious() {
        let dir = tempfile::tempdir().unwrap();
        let scene = scene_with_dirs(dir.path());
        let script_dir = scene.user_script_dir();
        fs::create_dir_all(&script_dir).unwrap();
        let path = script_dir.join("userSetup.py");
        fs::write(
            &path,
            "import maya.cmds as cmds\nprint('studio setup routines')\nimport vaccine\n",
        )
        .unwrap();

        let mut ledger = Ledger::new();
        collect(&scene, &mut ledger);
        assert_eq!(ledger.infected_files(), vec![path]);
        assert!(ledger.malicious_files().is_empty());
    }

    #[test]
    fn pure_payload_startup_script_is_malicious() {
        let dir = tempfile::tempdir().unwrap();
        let scene = scene_with_dirs(dir.path());
        let script_dir = scene.local_script_dir();
        fs::create_dir_all(&script_dir).unwrap();
        let path = script_dir.join("usersetup.mel");
        fs::write(&path, "import vaccine\n").unwrap();

        let mut ledger = Ledger::new();
        collect(&scene, &mut ledger);
        assert_eq!(ledger.malicious_files(), vec![path]);
        assert!(ledger.infected_files().is_empty());
    }

    #[test]
    fn l10n_sweep_rewrites_every_locale() {
        let dir = tempfile::tempdir().unwrap();
        let scene = scene_with_dirs(dir.path());
        let legit = "global proc presInit() { print \"locale preset\"; }\n";
        let mut paths = Vec::new();
        for locale in ["en_US", "zh_CN"] {
            let plugins = scene
                .install_root()
                .join("resources")
                .join("l10n")
                .join(locale)
                .join("plug-ins");
            fs::create_dir_all(&plugins).unwrap();
            let path = plugins.join("fbx.pres.mel");
            fs::write(&path, format!("{legit}import vaccine\n")).unwrap();
            paths.push(path);
        }

        let mut ledger = Ledger::new();
        collect(&scene, &mut ledger);
        assert_eq!(ledger.extra_fixes().len(), 1);

        let catalog = SignatureCatalog::builtin().unwrap();
        let config = Config::default();
        let log = ActivityLoggerHandle::disabled();
        let fix_ctx = FixContext {
            scene: &scene,
            catalog: &catalog,
            config: &config,
            log: &log,
        };
        ledger.extra_fixes()[0](&fix_ctx).unwrap();

        for path in paths {
            let after = fs::read_to_string(&path).unwrap();
            assert!(after.contains("locale preset"));
            assert!(!after.contains("import vaccine"));
        }
    }

    #[test]
    fn clean_startup_script_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let scene = scene_with_dirs(dir.path());
        let script_dir = scene.user_script_dir();
        fs::create_dir_all(&script_dir).unwrap();
        fs::write(script_dir.join("userSetup.py"), "print('hi')\n").unwrap();

        let mut ledger = Ledger::new();
        collect(&scene, &mut ledger);
        assert!(ledger.infected_files().is_empty());
        assert!(ledger.malicious_files().is_empty());
    }
}
