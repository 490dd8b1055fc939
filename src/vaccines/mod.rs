//! Detector plugins ("vaccines").
//!
//! Each vaccine scans one surface of the host environment and records its
//! findings in the issue ledger. Vaccines never remediate; the cleaner does
//! that. All vaccines are compiled in, and a vaccine that fails to construct
//! is logged and skipped so the remaining ones still protect the session.

use crate::core::config::Config;
use crate::core::errors::Result;
use crate::ledger::Ledger;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::scene::SceneApi;
use crate::signature::catalog::SignatureCatalog;

pub mod file_path;
pub mod node_identity;
pub mod script_job;
pub mod script_node;
pub mod startup_script;

/// Everything a vaccine may look at during a collection pass. The ledger is
/// the only thing it may mutate.
#[allow(missing_docs)]
pub struct VaccineContext<'a> {
    pub scene: &'a dyn SceneApi,
    pub ledger: &'a mut Ledger,
    pub catalog: &'a SignatureCatalog,
    pub config: &'a Config,
    pub log: &'a ActivityLoggerHandle,
}

/// One detector family.
pub trait Vaccine: Send + Sync {
    /// Stable family name, used in log entries.
    fn family(&self) -> &'static str;
    /// Scan and record findings in `ctx.ledger`.
    fn collect(&self, ctx: &mut VaccineContext<'_>) -> Result<()>;
}

/// A named vaccine constructor, fallible so that e.g. a pattern compile
/// failure in one family never takes the others down.
pub type VaccineCtor = (&'static str, fn() -> Result<Box<dyn Vaccine>>);

/// Constructors for every built-in vaccine, in collection order.
#[must_use]
pub fn builtin_ctors() -> Vec<VaccineCtor> {
    vec![
        ("dropper_files", || {
            Ok(Box::new(file_path::FilePathVaccine::new()))
        }),
        ("startup_scripts", || {
            Ok(Box::new(startup_script::StartupScriptVaccine::new()))
        }),
        ("script_nodes", || {
            Ok(Box::new(script_node::ScriptNodeVaccine::new()))
        }),
        ("node_identity", || {
            Ok(Box::new(node_identity::NodeIdentityVaccine::new()))
        }),
        ("script_jobs", || {
            Ok(Box::new(script_job::ScriptJobVaccine::new()?))
        }),
    ]
}

/// Construct vaccines from `ctors`, logging and skipping any that fail.
pub fn load_from(ctors: Vec<VaccineCtor>, log: &ActivityLoggerHandle) -> Vec<Box<dyn Vaccine>> {
    let mut vaccines = Vec::with_capacity(ctors.len());
    for (family, ctor) in ctors {
        match ctor() {
            Ok(vaccine) => vaccines.push(vaccine),
            Err(error) => log.send(ActivityEvent::VaccineLoadFailed {
                family: family.to_string(),
                error_code: error.code().to_string(),
                details: error.to_string(),
            }),
        }
    }
    vaccines
}

/// All built-in vaccines that constructed successfully.
pub fn load_vaccines(log: &ActivityLoggerHandle) -> Vec<Box<dyn Vaccine>> {
    load_from(builtin_ctors(), log)
}
