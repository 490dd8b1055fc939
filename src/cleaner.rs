//! Remediation engine: drains the issue ledger in a fixed order.
//!
//! Order matters: whole files go first so later steps never re-detect
//! content a deleted file carried, then infected files are sanitized, then
//! in-scene nodes and jobs, then the pass-scoped extra fixes. Every failure
//! is logged with its error code and skipped; one stubborn item never blocks
//! the rest of the pass.

use crate::core::config::Config;
use crate::core::errors::{Result, SentinelError};
use crate::core::paths::safe_remove_any;
use crate::ledger::{FixContext, Ledger};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::scene::SceneApi;
use crate::signature::catalog::SignatureCatalog;
use crate::signature::matcher::{self, FileAction};

/// Attributes reset on reference-owned script nodes.
const SCRIPT_ATTRS: [&str; 2] = ["before", "after"];

/// Runs one remediation pass over a populated ledger.
pub struct Cleaner<'a> {
    scene: &'a dyn SceneApi,
    catalog: &'a SignatureCatalog,
    config: &'a Config,
    log: &'a ActivityLoggerHandle,
}

impl<'a> Cleaner<'a> {
    #[must_use]
    pub fn new(
        scene: &'a dyn SceneApi,
        catalog: &'a SignatureCatalog,
        config: &'a Config,
        log: &'a ActivityLoggerHandle,
    ) -> Self {
        Self {
            scene,
            catalog,
            config,
            log,
        }
    }

    /// Remediate everything in the ledger. No-op when there is nothing to
    /// fix. Infected reference files are left in place for the batch
    /// scanner; they cannot be fixed from inside this scene.
    pub fn fix(&self, ledger: &mut Ledger) {
        if !ledger.have_issues() {
            return;
        }
        self.fix_malicious_files(ledger);
        self.fix_infected_files(ledger);
        self.fix_nodes(ledger);
        self.fix_jobs(ledger);
        self.run_extra_fixes(ledger);
    }

    fn report_failure(&self, target: String, error: &SentinelError) {
        self.log.send(ActivityEvent::FixFailed {
            target,
            error_code: error.code().to_string(),
            details: error.to_string(),
        });
    }

    fn fix_malicious_files(&self, ledger: &mut Ledger) {
        for path in ledger.malicious_files() {
            match safe_remove_any(&path) {
                Ok(()) => {
                    self.log.send(ActivityEvent::FileDeleted {
                        path: path.display().to_string(),
                    });
                    ledger.remove_malicious_file(&path);
                }
                Err(e) => self.report_failure(path.display().to_string(), &e),
            }
        }
    }

    fn fix_infected_files(&self, ledger: &mut Ledger) {
        let threshold = self.config.matcher.empty_threshold_bytes;
        for path in ledger.infected_files() {
            match matcher::sanitize_file(&path, self.catalog, threshold) {
                Ok(action) => {
                    match action {
                        FileAction::Clean => {}
                        FileAction::Rewritten => self.log.send(ActivityEvent::FileSanitized {
                            path: path.display().to_string(),
                            details: "signature matches stripped".to_string(),
                        }),
                        FileAction::Deleted => self.log.send(ActivityEvent::FileDeleted {
                            path: path.display().to_string(),
                        }),
                    }
                    ledger.remove_infected_file(&path);
                }
                Err(e) => self.report_failure(path.display().to_string(), &e),
            }
        }
    }

    fn fix_nodes(&self, ledger: &mut Ledger) {
        for node in ledger.infected_nodes() {
            let result = if self.scene.is_node_referenced(&node) {
                // Deleting a referenced node would break the reference;
                // neutralize it in place instead.
                self.reset_node(&node)
            } else {
                self.delete_node(&node)
            };
            match result {
                Ok(()) => ledger.remove_infected_node(&node),
                Err(e) => self.report_failure(node.clone(), &e),
            }
        }
    }

    fn reset_node(&self, node: &str) -> Result<()> {
        for attr in SCRIPT_ATTRS {
            self.scene.set_string_attr(node, attr, "")?;
        }
        self.scene.set_int_attr(node, "scriptType", 0)?;
        self.log.send(ActivityEvent::NodeReset {
            node: node.to_string(),
        });
        Ok(())
    }

    fn delete_node(&self, node: &str) -> Result<()> {
        self.scene.unlock_node(node);
        self.scene.delete_node(node)?;
        self.log.send(ActivityEvent::NodeDeleted {
            node: node.to_string(),
        });
        Ok(())
    }

    fn fix_jobs(&self, ledger: &mut Ledger) {
        for descriptor in ledger.infected_script_jobs() {
            match Self::job_id(&descriptor) {
                Ok(id) => match self.scene.kill_script_job(id) {
                    Ok(()) => {
                        self.log.send(ActivityEvent::JobKilled {
                            job_id: id,
                            descriptor: descriptor.clone(),
                        });
                        ledger.remove_infected_script_job(&descriptor);
                    }
                    Err(e) => self.report_failure(descriptor.clone(), &e),
                },
                Err(e) => self.report_failure(descriptor.clone(), &e),
            }
        }
    }

    /// Parse the leading integer id out of `"<id>: <event> -> <expr>"`.
    fn job_id(descriptor: &str) -> Result<i64> {
        descriptor
            .split(':')
            .next()
            .and_then(|head| head.trim().parse::<i64>().ok())
            .ok_or_else(|| SentinelError::Remediation {
                target: descriptor.to_string(),
                details: "job descriptor has no leading integer id".to_string(),
            })
    }

    fn run_extra_fixes(&self, ledger: &Ledger) {
        let ctx = FixContext {
            scene: self.scene,
            catalog: self.catalog,
            config: self.config,
            log: self.log,
        };
        for fix in ledger.extra_fixes() {
            if let Err(e) = fix(&ctx) {
                self.report_failure("extra_fix".to_string(), &e);
            }
        }
    }
}
