//! Core types: errors, configuration, shared filesystem utilities.

pub mod config;
pub mod errors;
pub mod paths;
