#![forbid(unsafe_code)]

//! Scene Sentinel — malware detection and remediation for scene files of a
//! 3D authoring host.
//!
//! The engine is built from small pieces: a curated signature catalog, a
//! content matcher/sanitizer, categorized issue ledger, detector plugins
//! ("vaccines"), an ordered remediation pipeline, an event-driven session
//! defender, and a batch scanner that chases infections across reference
//! edges.
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use scene_sentinel::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use scene_sentinel::core::config::Config;
//! use scene_sentinel::signature::catalog::SignatureCatalog;
//! ```

pub mod prelude;

pub mod cleaner;
pub mod core;
pub mod defender;
pub mod ledger;
pub mod logger;
pub mod scanner;
pub mod scene;
pub mod signature;
pub mod vaccines;
