//! Script nodes whose `before`/`after` hooks carry payload text.
//!
//! When an infected node is owned by a loaded reference, the reference's
//! backing file is infected too and is queued for the batch scanner. The
//! node itself is still recorded; the cleaner resets it instead of deleting
//! it, since deleting a referenced node would break the reference.

use crate::core::errors::Result;
use crate::logger::activity::ActivityEvent;
use crate::signature::catalog::SignatureScope;
use crate::signature::matcher;
use crate::vaccines::{Vaccine, VaccineContext};

const SCRIPT_ATTRS: [&str; 2] = ["before", "after"];

/// Detector for payload text in script-node hook attributes.
pub struct ScriptNodeVaccine;

impl ScriptNodeVaccine {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for ScriptNodeVaccine {
    fn default() -> Self {
        Self::new()
    }
}

impl Vaccine for ScriptNodeVaccine {
    fn family(&self) -> &'static str {
        "script_nodes"
    }

    fn collect(&self, ctx: &mut VaccineContext<'_>) -> Result<()> {
        for node in ctx.scene.script_nodes() {
            // Hook attributes carry arbitrary script text, so both the
            // file-content families and the job-descriptor families apply.
            let hit = SCRIPT_ATTRS.iter().any(|attr| {
                ctx.scene.string_attr(&node, attr).is_some_and(|text| {
                    matcher::check_content(&text, ctx.catalog, SignatureScope::Content)
                        || matcher::check_content(&text, ctx.catalog, SignatureScope::Job)
                })
            });
            if !hit {
                continue;
            }
            ctx.log.send(ActivityEvent::IssueFound {
                family: self.family().to_string(),
                target: node.clone(),
            });
            if ctx.scene.is_node_referenced(&node) {
                if let Some(reference) = ctx.scene.reference_file_of(&node) {
                    ctx.ledger.add_infected_reference_file(reference);
                }
            }
            ctx.ledger.add_infected_node(node);
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
    use crate::scene::headless::{HeadlessScene, SceneDirs, SceneDoc, SceneNode};
    use crate::signature::catalog::SignatureCatalog;
    use std::path::PathBuf;

    fn scene() -> HeadlessScene {
        HeadlessScene::new(SceneDirs {
            user_app_dir: PathBuf::from("/tmp/app"),
            user_script_dir: PathBuf::from("/tmp/app/2026/scripts"),
            install_root: PathBuf::from("/tmp/install"),
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
        ScriptNodeVaccine::new().collect(&mut ctx).unwrap();
    }

    #[test]
    fn flags_payload_in_before_attr() {
        let scene = scene();
        scene.load_doc(SceneDoc {
            nodes: vec![
                SceneNode::script("clean").with_attr("before", "print('ok')"),
                SceneNode::script("bad")
                    .with_attr("before", "petri_dish_path = cmds.internalVar(uad=True)"),
            ],
            jobs: vec![],
        });
        let mut ledger = Ledger::new();
        collect(&scene, &mut ledger);
        assert_eq!(ledger.infected_nodes(), vec!["bad".to_string()]);
    }

    #[test]
    fn secure_system_stager_in_attr_is_flagged() {
        let scene = scene();
        scene.load_doc(SceneDoc {
            nodes: vec![SceneNode::script("innocentLookingNode").with_attr(
                "before",
                "import maya_secure_system\nmaya_secure_system.MayaSecureSystem().startup()",
            )],
            jobs: vec![],
        });
        let mut ledger = Ledger::new();
        collect(&scene, &mut ledger);
        assert_eq!(
            ledger.infected_nodes(),
            vec!["innocentLookingNode".to_string()]
        );
        assert!(ledger.have_issues());
    }

    #[test]
    fn referenced_node_queues_its_backing_file() {
        let dir = tempfile::tempdir().unwrap();
        let reference = dir.path().join("asset.scene");
        std::fs::write(&reference, "{}").unwrap();

        let scene = scene();
        scene.load_doc(SceneDoc {
            nodes: vec![
                SceneNode::script("refBad")
                    .with_attr("after", "fuckVirus.main()")
                    .referenced_from(&reference),
            ],
            jobs: vec![],
        });
        let mut ledger = Ledger::new();
        collect(&scene, &mut ledger);
        assert_eq!(ledger.infected_nodes(), vec!["refBad".to_string()]);
        assert_eq!(ledger.infected_reference_files(), vec![reference]);
    }

    #[test]
    fn node_without_script_attrs_is_ignored() {
        let scene = scene();
        scene.load_doc(SceneDoc {
            nodes: vec![SceneNode::script("empty")],
            jobs: vec![],
        });
        let mut ledger = Ledger::new();
        collect(&scene, &mut ledger);
        assert!(!ledger.have_issues());
    }
}
