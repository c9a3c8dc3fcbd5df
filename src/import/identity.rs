//! Content-derived task identity.
//!
//! The identity of an imported row is a 128-bit digest of its canonical
//! serialization: normalized column names in sorted order, cell values
//! verbatim. Re-importing a byte-identical row always yields the same id;
//! changing any cell yields a new one. No counter or stored sequence is
//! involved, so import order never matters.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::record::RawRecord;

/// Number of digest bytes kept in an identity (128 bits).
pub const IDENTITY_BYTES: usize = 16;

/// What to do with byte-identical rows in one import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Identical rows collapse into a single task.
    #[default]
    Dedup,
    /// Every identical row becomes its own task. The n-th repeat is keyed
    /// by its content plus its ordinal among the repeats.
    StrictUnique,
}

/// Canonical serialization of a row: a JSON object with sorted,
/// normalized keys.
pub fn canonical_form(record: &RawRecord) -> String {
    // BTreeMap keeps keys sorted; serializing a map of strings to JSON
    // values cannot fail.
    serde_json::to_string(record.fields()).unwrap_or_default()
}

/// Derives the identity of a row.
///
/// # Examples
///
/// ```
/// use dockboard::import::{derive_identity, RawRecord};
/// use serde_json::json;
///
/// let a = RawRecord::from_iter([("DATE", json!("2025-01-10 08:00")), ("CLIENT", json!("Acme"))]);
/// let b = RawRecord::from_iter([("client", json!("Acme")), ("date", json!("2025-01-10 08:00"))]);
/// assert_eq!(derive_identity(&a), derive_identity(&b));
/// assert_eq!(derive_identity(&a).len(), 32);
/// ```
pub fn derive_identity(record: &RawRecord) -> String {
    digest_hex(canonical_form(record).as_bytes())
}

/// Derives the identity of the `occurrence`-th repeat of a row.
///
/// Occurrence `0` is the first appearance and matches
/// [`derive_identity`].
pub fn derive_identity_with_occurrence(record: &RawRecord, occurrence: usize) -> String {
    if occurrence == 0 {
        return derive_identity(record);
    }
    let mut canonical = canonical_form(record);
    canonical.push('#');
    canonical.push_str(&occurrence.to_string());
    digest_hex(canonical.as_bytes())
}

fn digest_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(&digest[..IDENTITY_BYTES])
}
