//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use scene_sentinel::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{Result, SentinelError};

// Signatures
pub use crate::signature::catalog::{Signature, SignatureCatalog, SignatureScope};
pub use crate::signature::matcher::FileAction;

// Ledger
pub use crate::ledger::Ledger;

// Scene
pub use crate::scene::headless::{HeadlessScene, SceneDirs, SceneDoc, SceneNode, ScriptJob};
pub use crate::scene::{CallbackId, SceneApi, SceneCallback, SceneEvent};

// Engine
pub use crate::cleaner::Cleaner;
pub use crate::defender::{Defender, DefenderMode, PausedDefender};
pub use crate::scanner::{BatchScanner, ScanReport};
pub use crate::vaccines::{Vaccine, VaccineContext};

// Logging
pub use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle, spawn_logger};
pub use crate::logger::jsonl::JsonlConfig;
