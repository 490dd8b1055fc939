//! Scheduled script jobs carrying payload expressions.
//!
//! Beyond the job-scope signature catalog, a long base64-looking run in a
//! job expression is treated as a payload carrier: legitimate job
//! expressions call named procedures, they do not embed encoded blobs.

use regex::Regex;

use crate::core::errors::{Result, SentinelError};
use crate::logger::activity::ActivityEvent;
use crate::signature::catalog::SignatureScope;
use crate::signature::matcher;
use crate::vaccines::{Vaccine, VaccineContext};

/// Detector for infected script-job descriptors.
pub struct ScriptJobVaccine {
    base64_run: Regex,
}

impl ScriptJobVaccine {
    /// Compile the base64-run probe.
    pub fn new() -> Result<Self> {
        let base64_run =
            Regex::new("[A-Za-z0-9+/]{50,}={0,2}").map_err(|e| SentinelError::PluginLoad {
                family: "script_jobs".to_string(),
                details: e.to_string(),
            })?;
        Ok(Self { base64_run })
    }
}

impl Vaccine for ScriptJobVaccine {
    fn family(&self) -> &'static str {
        "script_jobs"
    }

    fn collect(&self, ctx: &mut VaccineContext<'_>) -> Result<()> {
        for descriptor in ctx.scene.script_jobs() {
            let hit = matcher::check_content(&descriptor, ctx.catalog, SignatureScope::Job)
                || self.base64_run.is_match(&descriptor);
            if !hit {
                continue;
            }
            ctx.log.send(ActivityEvent::IssueFound {
                family: self.family().to_string(),
                target: descriptor.clone(),
            });
            ctx.ledger.add_infected_script_job(descriptor);
        }
        Ok(())
    }
}
