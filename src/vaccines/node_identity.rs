//! Nodes the strains create under well-known names.
//!
//! The 2024 loader splits its payload across a numbered `codeChunk<N>`
//! sequence with occasional gaps, so the probe tolerates a bounded run of
//! missing indices before concluding the sequence has ended.

use crate::core::errors::Result;
use crate::logger::activity::ActivityEvent;
use crate::vaccines::{Vaccine, VaccineContext};

/// Nodes flagged on exact name.
const EXACT_NAMES: [&str; 3] = ["uifiguration", "maya_secure_system_scriptNode", "codeExtractor"];

/// Nodes flagged when the name contains the marker.
const SUBSTRING_MARKERS: [&str; 1] = ["_gene"];

/// Consecutive missing `codeChunk` indices tolerated before giving up.
const CHUNK_GAP: u32 = 5;

/// Hard ceiling on probed chunk indices.
const CHUNK_LIMIT: u32 = 1000;

/// Detector for strain-created node names.
pub struct NodeIdentityVaccine;

impl NodeIdentityVaccine {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for NodeIdentityVaccine {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeIdentityVaccine {
    fn flag(&self, ctx: &mut VaccineContext<'_>, node: String) {
        ctx.log.send(ActivityEvent::IssueFound {
            family: self.family().to_string(),
            target: node.clone(),
        });
        ctx.ledger.add_infected_node(node);
    }
}

impl Vaccine for NodeIdentityVaccine {
    fn family(&self) -> &'static str {
        "node_identity"
    }

    fn collect(&self, ctx: &mut VaccineContext<'_>) -> Result<()> {
        for name in EXACT_NAMES {
            if ctx.scene.node_exists(name) {
                self.flag(ctx, name.to_string());
            }
        }

        for node in ctx.scene.script_nodes() {
            if SUBSTRING_MARKERS.iter().any(|m| node.contains(m)) {
                self.flag(ctx, node);
            }
        }

        let mut missing = 0u32;
        for index in 0..CHUNK_LIMIT {
            let name = format!("codeChunk{index}");
            if ctx.scene.node_exists(&name) {
                missing = 0;
                self.flag(ctx, name);
            } else {
                missing += 1;
                if missing >= CHUNK_GAP {
                    break;
                }
            }
        }

        Ok(())
    }
}
