//! Issue ledger: categorized, deduplicated finding sets for one
//! detection/fix pass.
//!
//! Vaccines populate the ledger during `collect`; the cleaner drains it
//! during `fix`; `reset` clears everything at pass start. Lifetime is one
//! opened scene. Single-threaded use — the host runs all of this on its one
//! scripting thread.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::core::config::Config;
use crate::core::errors::Result;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::scene::SceneApi;
use crate::signature::catalog::SignatureCatalog;

/// Context handed to extra fix functions (remediation step 5).
#[allow(missing_docs)]
pub struct FixContext<'a> {
    pub scene: &'a dyn SceneApi,
    pub catalog: &'a SignatureCatalog,
    pub config: &'a Config,
    pub log: &'a ActivityLoggerHandle,
}

/// A fix beyond the file/node/job categories, e.g. rewriting localized
/// resource files. Registered per pass, cleared by `reset`.
pub type ExtraFix = Box<dyn Fn(&FixContext<'_>) -> Result<()> + Send>;

/// The five finding categories plus pass-scoped extra fixes.
#[derive(Default)]
pub struct Ledger {
    malicious_files: BTreeSet<PathBuf>,
    infected_files: BTreeSet<PathBuf>,
    infected_nodes: BTreeSet<String>,
    infected_script_jobs: BTreeSet<String>,
    infected_reference_files: BTreeSet<PathBuf>,
    extra_fixes: Vec<ExtraFix>,
}

impl Ledger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ──────────────────── population ────────────────────

    /// Wholly-malicious file or directory; remediation deletes it.
    pub fn add_malicious_file(&mut self, path: impl Into<PathBuf>) {
        self.malicious_files.insert(path.into());
    }

    /// Partly-legitimate file; remediation strips only the malicious part.
    pub fn add_infected_file(&mut self, path: impl Into<PathBuf>) {
        self.infected_files.insert(path.into());
    }

    /// Script node carrying payload text.
    pub fn add_infected_node(&mut self, node: impl Into<String>) {
        self.infected_nodes.insert(node.into());
    }

    /// Scheduled script-job descriptor of the form `"<id>: <event> -> <expr>"`.
    pub fn add_infected_script_job(&mut self, job: impl Into<String>) {
        self.infected_script_jobs.insert(job.into());
    }

    /// Externally referenced scene file that carries its own infection.
    pub fn add_infected_reference_file(&mut self, path: impl Into<PathBuf>) {
        self.infected_reference_files.insert(path.into());
    }

    /// Register an extra fix for this pass.
    pub fn add_extra_fix(&mut self, fix: ExtraFix) {
        self.extra_fixes.push(fix);
    }

    // ──────────────────── drain ────────────────────

    pub fn remove_malicious_file(&mut self, path: &Path) {
        self.malicious_files.remove(path);
    }

    pub fn remove_infected_file(&mut self, path: &Path) {
        self.infected_files.remove(path);
    }

    pub fn remove_infected_node(&mut self, node: &str) {
        self.infected_nodes.remove(node);
    }

    pub fn remove_infected_script_job(&mut self, job: &str) {
        self.infected_script_jobs.remove(job);
    }

    // ──────────────────── queries ────────────────────

    /// Malicious files still present on disk. Stale entries are dropped
    /// silently.
    #[must_use]
    pub fn malicious_files(&self) -> Vec<PathBuf> {
        self.malicious_files
            .iter()
            .filter(|p| p.exists())
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn infected_files(&self) -> Vec<PathBuf> {
        self.infected_files.iter().cloned().collect()
    }

    #[must_use]
    pub fn infected_nodes(&self) -> Vec<String> {
        self.infected_nodes.iter().cloned().collect()
    }

    #[must_use]
    pub fn infected_script_jobs(&self) -> Vec<String> {
        self.infected_script_jobs.iter().cloned().collect()
    }

    /// Infected reference files still present on disk.
    #[must_use]
    pub fn infected_reference_files(&self) -> Vec<PathBuf> {
        self.infected_reference_files
            .iter()
            .filter(|p| p.exists())
            .cloned()
            .collect()
    }

    /// Extra fixes registered for this pass.
    #[must_use]
    pub fn extra_fixes(&self) -> &[ExtraFix] {
        &self.extra_fixes
    }

    /// True iff any category is non-empty, recomputed on each query with
    /// stale filtering applied.
    #[must_use]
    pub fn have_issues(&self) -> bool {
        !self.malicious_files().is_empty()
            || !self.infected_files.is_empty()
            || !self.infected_nodes.is_empty()
            || !self.infected_script_jobs.is_empty()
            || !self.infected_reference_files().is_empty()
    }

    /// Emit all categories through the activity log.
    pub fn report(&self, log: &ActivityLoggerHandle) {
        let categories: [(&str, Vec<String>); 5] = [
            (
                "malicious_files",
                self.malicious_files()
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect(),
            ),
            (
                "infected_files",
                self.infected_files()
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect(),
            ),
            ("infected_nodes", self.infected_nodes()),
            ("infected_script_jobs", self.infected_script_jobs()),
            (
                "infected_reference_files",
                self.infected_reference_files()
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect(),
            ),
        ];
        for (category, items) in categories {
            log.send(ActivityEvent::Report {
                category: category.to_string(),
                count: items.len(),
                items: items.join(", "),
            });
        }
    }

    /// Per-category counts for the collection summary event.
    #[must_use]
    pub fn counts(&self) -> (usize, usize, usize, usize, usize) {
        (
            self.malicious_files.len(),
            self.infected_files.len(),
            self.infected_nodes.len(),
            self.infected_script_jobs.len(),
            self.infected_reference_files.len(),
        )
    }

    /// Clear every category and drop registered extra fixes. Called at the
    /// start of each pass.
    pub fn reset(&mut self) {
        self.malicious_files.clear();
        self.infected_files.clear();
        self.infected_nodes.clear();
        self.infected_script_jobs.clear();
        self.infected_reference_files.clear();
        self.extra_fixes.clear();
    }
}
