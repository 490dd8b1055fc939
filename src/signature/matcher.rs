//! Content matching and sanitization against the signature catalog.
//!
//! Payloads are typically interpolated into otherwise-legitimate files, so
//! strip-not-delete is the default; a file is deleted only when nothing
//! legitimate remains after stripping.

use std::borrow::Cow;
use std::fs;
use std::path::Path;

use crate::core::errors::{Result, SentinelError};
use crate::core::paths::{atomic_write, safe_remove_file};
use crate::signature::catalog::{SignatureCatalog, SignatureScope};

/// What `sanitize_file` did to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    /// No signature matched; the file was left byte-identical.
    Clean,
    /// Matches were stripped and the file was atomically rewritten.
    Rewritten,
    /// The trimmed remainder fell below the empty threshold; the file was
    /// deleted outright.
    Deleted,
}

/// True iff any signature in `scope` matches anywhere in `content`.
#[must_use]
pub fn check_content(content: &str, catalog: &SignatureCatalog, scope: SignatureScope) -> bool {
    catalog.in_scope(scope).any(|sig| sig.matches(content))
}

/// Strip every match of every signature in `scope`, applied in catalog order.
#[must_use]
pub fn sanitize_content<'a>(
    content: &'a str,
    catalog: &SignatureCatalog,
    scope: SignatureScope,
) -> Cow<'a, str> {
    let mut out = Cow::Borrowed(content);
    for sig in catalog.in_scope(scope) {
        // Stripping can splice surrounding bytes into a fresh occurrence, so
        // re-apply each signature until it stops matching.
        loop {
            let stripped = match sig.strip(&out) {
                Cow::Borrowed(_) => break,
                Cow::Owned(stripped) => stripped,
            };
            out = Cow::Owned(stripped);
        }
    }
    out
}

/// Read `path` and report whether it carries any content-scope signature.
///
/// Undecodable (binary) content is treated as "no match". Unreadable input
/// surfaces as a detection failure.
pub fn check_file(path: &Path, catalog: &SignatureCatalog) -> Result<bool> {
    Ok(read_decodable(path)?
        .is_some_and(|content| check_content(&content, catalog, SignatureScope::Content)))
}

/// Sanitize the file at `path` in place.
///
/// If no signature matches, nothing is touched. If the trimmed sanitized
/// remainder is shorter than `empty_threshold` bytes, the file is deleted;
/// otherwise it is rewritten atomically (sibling temp file + rename), so a
/// crash never leaves a partially written file.
pub fn sanitize_file(
    path: &Path,
    catalog: &SignatureCatalog,
    empty_threshold: usize,
) -> Result<FileAction> {
    let Some(content) = read_decodable(path)? else {
        return Ok(FileAction::Clean);
    };
    if !check_content(&content, catalog, SignatureScope::Content) {
        return Ok(FileAction::Clean);
    }

    let sanitized = sanitize_content(&content, catalog, SignatureScope::Content);
    if sanitized.trim().len() < empty_threshold {
        safe_remove_file(path)?;
        return Ok(FileAction::Deleted);
    }
    atomic_write(path, sanitized.as_bytes())?;
    Ok(FileAction::Rewritten)
}

/// Would sanitizing `content` leave it effectively empty?
#[must_use]
pub fn strips_to_empty(content: &str, catalog: &SignatureCatalog, empty_threshold: usize) -> bool {
    sanitize_content(content, catalog, SignatureScope::Content)
        .trim()
        .len()
        < empty_threshold
}

fn read_decodable(path: &Path) -> Result<Option<String>> {
    let bytes = fs::read(path).map_err(|e| SentinelError::Detection {
        path: path.to_path_buf(),
        details: e.to_string(),
    })?;
    Ok(String::from_utf8(bytes).ok())
}
