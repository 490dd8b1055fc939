//! Signature catalog: versioned (family, pattern) pairs, read-only after
//! load.
//!
//! Catalog order is a contract — sanitization applies signatures in the
//! order they were registered. Literal signatures get a `memmem` fast path
//! for the common "does this content contain the marker at all" probe.

#![allow(missing_docs)]

use std::borrow::Cow;
use std::fmt;

use memchr::memmem;
use regex::Regex;

use crate::core::errors::{Result, SentinelError};

/// Where a signature applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScope {
    /// File and script-node content.
    Content,
    /// Scheduled script-job descriptors.
    Job,
}

/// One (family, pattern) pair. Immutable once built.
pub struct Signature {
    family: &'static str,
    raw: String,
    scope: SignatureScope,
    regex: Regex,
    literal: Option<memmem::Finder<'static>>,
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signature")
            .field("family", &self.family)
            .field("raw", &self.raw)
            .field("scope", &self.scope)
            .field("literal", &self.literal.is_some())
            .finish()
    }
}

impl Signature {
    /// Build from a regex pattern.
    pub fn pattern(family: &'static str, pattern: &str, scope: SignatureScope) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| SentinelError::SignatureCompile {
            family: family.to_string(),
            details: e.to_string(),
        })?;
        Ok(Self {
            family,
            raw: pattern.to_string(),
            scope,
            regex,
            literal: None,
        })
    }

    /// Build from a plain substring marker. The marker is escaped before
    /// compilation, so regex metacharacters in payload text match verbatim.
    pub fn literal(family: &'static str, marker: &str, scope: SignatureScope) -> Result<Self> {
        let regex =
            Regex::new(&regex::escape(marker)).map_err(|e| SentinelError::SignatureCompile {
                family: family.to_string(),
                details: e.to_string(),
            })?;
        Ok(Self {
            family,
            raw: marker.to_string(),
            scope,
            regex,
            literal: Some(memmem::Finder::new(marker.as_bytes()).into_owned()),
        })
    }

    #[must_use]
    pub fn family(&self) -> &'static str {
        self.family
    }

    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub const fn scope(&self) -> SignatureScope {
        self.scope
    }

    /// Substring search, not a full match.
    #[must_use]
    pub fn matches(&self, content: &str) -> bool {
        self.literal.as_ref().map_or_else(
            || self.regex.is_match(content),
            |finder| finder.find(content.as_bytes()).is_some(),
        )
    }

    /// Strip every occurrence from `content`.
    #[must_use]
    pub fn strip<'a>(&self, content: &'a str) -> Cow<'a, str> {
        self.regex.replace_all(content, "")
    }
}

/// Ordered, read-only signature catalog.
#[derive(Debug)]
pub struct SignatureCatalog {
    signatures: Vec<Signature>,
}

impl SignatureCatalog {
    /// The curated built-in catalog.
    pub fn builtin() -> Result<Self> {
        use SignatureScope::{Content, Job};
        let signatures = vec![
            // leukocyte / petri dish droppers
            Signature::literal("leukocyte", "import vaccine", Content)?,
            Signature::pattern("leukocyte", "cmds.evalDeferred.*leukocyte.+", Content)?,
            // interpolated exec stagers, seen from 2024-04 onward
            Signature::pattern("virus20240430", "python(.*);.+exec.+(pyCode).+;", Content)?,
            // "secure system" loader chain
            Signature::literal("maya_secure_system", "import maya_secure_system", Content)?,
            Signature::literal(
                "maya_secure_system",
                "maya_secure_system.MayaSecureSystem().startup()",
                Content,
            )?,
            Signature::literal("maya_secure_system", "Maya Secure System Stager", Content)?,
            // script-job descriptors
            Signature::pattern("leukocyte", "petri_dish_path.+cmds.internalVar.+", Job)?,
            Signature::literal("leukocyte", "leukocyte", Job)?,
            Signature::literal("zeijiankang", "userSetup", Job)?,
            Signature::literal("putiantongqi", "fuckVirus", Job)?,
            Signature::pattern("virus20240430", "python(.*);.+exec.+(pyCode).+;", Job)?,
        ];
        Ok(Self { signatures })
    }

    /// Build a catalog from explicit signatures, preserving order.
    #[must_use]
    pub fn from_signatures(signatures: Vec<Signature>) -> Self {
        Self { signatures }
    }

    /// Signatures restricted to a scope, in catalog order.
    pub fn in_scope(&self, scope: SignatureScope) -> impl Iterator<Item = &Signature> {
        self.signatures.iter().filter(move |s| s.scope() == scope)
    }

    /// All signatures in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &Signature> {
        self.signatures.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_compiles() {
        let catalog = SignatureCatalog::builtin().unwrap();
        assert!(!catalog.is_empty());
        assert!(catalog.in_scope(SignatureScope::Content).count() >= 6);
        assert!(catalog.in_scope(SignatureScope::Job).count() >= 5);
    }

    #[test]
    fn literal_signature_matches_metacharacters_verbatim() {
        let sig = Signature::literal(
            "maya_secure_system",
            "maya_secure_system.MayaSecureSystem().startup()",
            SignatureScope::Content,
        )
        .unwrap();
        assert!(sig.matches("x = 1\nmaya_secure_system.MayaSecureSystem().startup()\n"));
        // A regex reading of the marker would match this; the literal must not.
        assert!(!sig.matches("maya_secure_systemXMayaSecureSystem.startup"));
    }

    #[test]
    fn pattern_signature_is_substring_search() {
        let sig = Signature::pattern(
            "virus20240430",
            "python(.*);.+exec.+(pyCode).+;",
            SignatureScope::Content,
        )
        .unwrap();
        assert!(sig.matches(
            "prefix python(\"import base64\"); foo exec(pyCode) bar; suffix"
        ));
        assert!(!sig.matches("plain legitimate content"));
    }

    #[test]
    fn bad_pattern_reports_family() {
        let err = Signature::pattern("broken", "(unclosed", SignatureScope::Job).unwrap_err();
        assert_eq!(err.code(), "SSN-2002");
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn strip_removes_every_occurrence() {
        let sig = Signature::literal("leukocyte", "import vaccine", SignatureScope::Content)
            .unwrap();
        let out = sig.strip("import vaccine\nkeep\nimport vaccine\n");
        assert_eq!(out, "\nkeep\n\n");
    }
}
