//! Structural diffs between desired and observed resource state.
//!
//! A [`ResourceDiff`] is a mapping from field path to the before/after values
//! at that path. How the diff is computed belongs to the resource model that
//! owns desired/observed state; the gate only needs the diff to expose its
//! entries and to produce a deterministic digest.
//!
//! ## Digest
//!
//! The digest is SHA-256 over the canonical JSON of the sorted
//! `(path, before, after)` triples, rendered as `sha256:<hex>`. It is:
//!
//! - **Order-independent**: The same entries produce the same digest no
//!   matter the insertion order
//! - **Value-sensitive**: Changing any before or after value changes the
//!   digest
//!
//! The digest is not a wire compatibility surface; it is only compared
//! against digests this system previously stored.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::canonical::to_canonical_bytes;
use crate::error::Result;

/// The before/after values observed at a single field path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDelta {
    /// The desired value, if the field is present in desired state.
    pub before: Option<Value>,
    /// The observed value, if the field is present in observed state.
    pub after: Option<Value>,
}

/// A structural diff between desired and observed state.
///
/// Entries are keyed by field path and held in sorted order, so iteration
/// and digesting are deterministic regardless of how the diff was assembled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceDiff {
    entries: BTreeMap<String, FieldDelta>,
}

impl ResourceDiff {
    /// Creates an empty diff.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes a shallow diff between two flat field maps.
    ///
    /// Records an entry for every field whose value differs, including
    /// fields present on only one side. Intended for callers whose state is
    /// already flattened to field paths; deep diffing belongs to the
    /// resource model.
    #[must_use]
    pub fn between(desired: &BTreeMap<String, Value>, observed: &BTreeMap<String, Value>) -> Self {
        let mut diff = Self::new();
        for (path, before) in desired {
            let after = observed.get(path);
            if after != Some(before) {
                diff.record(path, Some(before.clone()), after.cloned());
            }
        }
        for (path, after) in observed {
            if !desired.contains_key(path) {
                diff.record(path, None, Some(after.clone()));
            }
        }
        diff
    }

    /// Records the before/after values at a field path.
    ///
    /// Recording the same path twice keeps the latest delta.
    pub fn record(&mut self, path: impl Into<String>, before: Option<Value>, after: Option<Value>) {
        self.entries.insert(path.into(), FieldDelta { before, after });
    }

    /// Returns true if the diff has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of differing field paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterates the entries in field-path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldDelta)> {
        self.entries.iter().map(|(path, delta)| (path.as_str(), delta))
    }

    /// Computes the deterministic digest of this diff.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the entries cannot be rendered as
    /// canonical JSON. Well-formed diffs (JSON values at string paths) always
    /// digest successfully.
    pub fn digest(&self) -> Result<DiffDigest> {
        // BTreeMap iteration order makes the preimage independent of how
        // entries were inserted.
        let preimage: Vec<DigestTriple<'_>> = self
            .entries
            .iter()
            .map(|(path, delta)| DigestTriple {
                path,
                before: delta.before.as_ref(),
                after: delta.after.as_ref(),
            })
            .collect();

        let bytes = to_canonical_bytes(&preimage)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(DiffDigest(format!("sha256:{}", hex::encode(hasher.finalize()))))
    }
}

/// One entry of the digest preimage.
///
/// Absent values are omitted entirely so that an absent side and an explicit
/// JSON null hash differently.
#[derive(Serialize)]
struct DigestTriple<'a> {
    path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    before: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    after: Option<&'a Value>,
}

/// The digest of a [`ResourceDiff`], rendered as `sha256:<hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiffDigest(String);

impl DiffDigest {
    /// Returns the digest as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DiffDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
