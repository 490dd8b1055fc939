//! Signature catalog and the content matcher/sanitizer built on it.

pub mod catalog;
pub mod matcher;
