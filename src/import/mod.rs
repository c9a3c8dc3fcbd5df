//! Schedule import: row validation and identity derivation.
//!
//! [`import_rows`] validates every [`RawRecord`], tags the accepted ones
//! with their content-derived identity and applies the configured
//! [`DuplicatePolicy`]. Rejected rows are logged and dropped; they never
//! abort the import.

pub mod identity;
pub mod record;
pub mod source;

use std::collections::HashMap;

use chrono::FixedOffset;
use tracing::{debug, warn};

pub use identity::{
    canonical_form, derive_identity, derive_identity_with_occurrence, DuplicatePolicy,
};
pub use record::{validate, ImportedRecord, RawRecord};
pub use source::{JsonRowSource, RowSource, StaticRowSource};

use crate::error::RecordRejected;
use crate::types::task::{not_applicable, Task};

/// A row that produced no task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    /// 1-based position in the source.
    pub row: usize,
    /// Why it was rejected.
    pub reason: RecordRejected,
}

/// Result of importing one batch of rows.
#[derive(Debug, Clone, Default)]
pub struct ImportOutcome {
    /// One fresh task per distinct identity, in source order.
    pub tasks: Vec<Task>,
    /// Rows that failed validation.
    pub rejected: Vec<RejectedRow>,
    /// Rows collapsed into an earlier identical row.
    pub collapsed: usize,
}

/// Validates and identity-tags `rows`.
///
/// Each accepted row becomes a `Waiting`, unassigned [`Task`]. Under
/// [`DuplicatePolicy::Dedup`] byte-identical rows yield one task; under
/// [`DuplicatePolicy::StrictUnique`] each repeat gets its own identity.
///
/// # Examples
///
/// ```
/// use chrono::FixedOffset;
/// use dockboard::import::{import_rows, DuplicatePolicy, RawRecord};
/// use serde_json::json;
///
/// let row = RawRecord::from_iter([
///     ("DATE", json!("2025-01-10 08:00")),
///     ("CLIENT", json!("Acme")),
///     ("SERVICE", json!("Import")),
/// ]);
/// let tz = FixedOffset::west_opt(3 * 3600).unwrap();
///
/// let outcome = import_rows(&[row.clone(), row], tz, DuplicatePolicy::Dedup);
/// assert_eq!(outcome.tasks.len(), 1);
/// assert_eq!(outcome.collapsed, 1);
/// ```
pub fn import_rows(rows: &[RawRecord], tz: FixedOffset, policy: DuplicatePolicy) -> ImportOutcome {
    let mut outcome = ImportOutcome::default();
    let mut occurrences: HashMap<String, usize> = HashMap::new();

    for (index, raw) in rows.iter().enumerate() {
        let row = index + 1;

        let record = match validate(raw, tz) {
            Ok(record) => record,
            Err(reason) => {
                debug!(row, %reason, "schedule row rejected");
                outcome.rejected.push(RejectedRow { row, reason });
                continue;
            },
        };

        let base_id = derive_identity(raw);
        let seen = occurrences.entry(base_id.clone()).or_insert(0);
        let id = match (policy, *seen) {
            (_, 0) => base_id,
            (DuplicatePolicy::Dedup, _) => {
                *seen += 1;
                outcome.collapsed += 1;
                debug!(row, id = %base_id, "duplicate schedule row collapsed");
                continue;
            },
            (DuplicatePolicy::StrictUnique, n) => derive_identity_with_occurrence(raw, n),
        };
        *seen += 1;

        outcome.tasks.push(task_from_record(id, record));
    }

    if !outcome.rejected.is_empty() {
        warn!(
            rejected = outcome.rejected.len(),
            accepted = outcome.tasks.len(),
            "some schedule rows were skipped"
        );
    }

    outcome
}

/// Builds a fresh `Waiting` task from a validated record.
pub fn task_from_record(id: String, record: ImportedRecord) -> Task {
    let mut task = Task::new(
        id,
        record.scheduled_at,
        record.suggested_time,
        record.client,
        record.service_type.unwrap_or_else(not_applicable),
    );
    task.sub_type = record.regime.unwrap_or_else(not_applicable);
    task.is_palletized = record.is_palletized.unwrap_or(false);
    task.order_number = record.order_number;
    task
}
