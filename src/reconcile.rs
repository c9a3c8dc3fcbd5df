//! Merging freshly imported tasks with previously known task state.
//!
//! The schedule owns a task's source fields (client, times, types); the
//! operators own its lifecycle fields (status, assignment, timestamps).
//! [`reconcile`] refreshes the former from the import while keeping the
//! latter from history, and never drops a task history already knows.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::types::Task;

/// Every known task, one entry per identity.
pub type TaskUniverse = BTreeMap<String, Task>;

/// Result of a reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// Merged tasks keyed by identity.
    pub universe: TaskUniverse,
    /// Imported tasks that matched a known identity.
    pub refreshed: usize,
    /// Imported tasks seen for the first time.
    pub created: usize,
    /// Known tasks absent from this import, kept unchanged.
    pub retained: usize,
}

/// Merges `imported` tasks into `known` state.
///
/// - An imported task whose identity is known takes the imported source
///   fields and keeps the known status, assignment and timestamps.
/// - An imported task with an unknown identity enters as imported
///   (`Waiting`, unassigned, no timestamps).
/// - Known tasks missing from the import stay as they are.
///
/// If `imported` repeats an identity, the last occurrence wins.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use chrono::{TimeZone, Utc};
/// use dockboard::reconcile::reconcile;
/// use dockboard::{Task, TaskStatus};
///
/// let at = Utc.with_ymd_and_hms(2025, 1, 10, 11, 0, 0).unwrap();
/// let mut known = Task::new("id-1".into(), at, "08:00".into(), "Acme".into(), "Import".into());
/// known.status = TaskStatus::InProcess;
/// known.entered_at = Some(at);
///
/// let mut fresh = known.clone();
/// fresh.client = "Acme Logistics".into();
/// fresh.status = TaskStatus::Waiting;
/// fresh.entered_at = None;
///
/// let merged = reconcile(vec![fresh], &BTreeMap::from([(known.id.clone(), known)]));
/// let task = &merged.universe["id-1"];
/// assert_eq!(task.client, "Acme Logistics");
/// assert_eq!(task.status, TaskStatus::InProcess);
/// assert_eq!(task.entered_at, Some(at));
/// ```
pub fn reconcile(imported: Vec<Task>, known: &TaskUniverse) -> Reconciliation {
    let mut result = Reconciliation {
        universe: known.clone(),
        ..Reconciliation::default()
    };

    let mut touched = HashSet::new();
    for fresh in imported {
        let first_touch = touched.insert(fresh.id.clone());
        match known.get(&fresh.id) {
            Some(previous) => {
                let mut merged = previous.clone();
                merged.refresh_source_fields(&fresh);
                if first_touch {
                    result.refreshed += 1;
                }
                result.universe.insert(merged.id.clone(), merged);
            },
            None => {
                if first_touch {
                    result.created += 1;
                }
                result.universe.insert(fresh.id.clone(), fresh);
            },
        }
    }

    result.retained = known.keys().filter(|id| !touched.contains(*id)).count();

    debug!(
        refreshed = result.refreshed,
        created = result.created,
        retained = result.retained,
        total = result.universe.len(),
        "reconciled imported schedule with history"
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Assignment, TaskStatus};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn task(id: &str, client: &str) -> Task {
        Task::new(
            id.to_string(),
            Utc.with_ymd_and_hms(2025, 1, 10, 11, 0, 0).unwrap(),
            "08:00".to_string(),
            client.to_string(),
            "Import".to_string(),
        )
    }

    #[test]
    fn operator_fields_survive_reimport() {
        let mut known = task("a", "Acme");
        known.status = TaskStatus::Scheduled;
        known.assignment = Some(Assignment {
            dock_id: "dock-2".to_string(),
            time: "08:00".to_string(),
        });

        let mut fresh = task("a", "Acme Corp");
        fresh.service_type = "Export".to_string();
        fresh.sub_type = "Bonded".to_string();
        fresh.is_palletized = true;

        let merged = reconcile(vec![fresh], &TaskUniverse::from([("a".to_string(), known)]));
        let result = &merged.universe["a"];

        assert_eq!(result.client, "Acme Corp");
        assert_eq!(result.service_type, "Export");
        assert_eq!(result.sub_type, "Bonded");
        assert!(result.is_palletized);
        assert_eq!(result.status, TaskStatus::Scheduled);
        assert_eq!(result.assignment.as_ref().unwrap().dock_id, "dock-2");
        assert_eq!(merged.refreshed, 1);
        assert_eq!(merged.created, 0);
    }

    #[test]
    fn unknown_identities_enter_with_defaults() {
        let merged = reconcile(vec![task("new", "Beta")], &TaskUniverse::new());
        assert_eq!(merged.created, 1);
        assert_eq!(merged.universe["new"].status, TaskStatus::Waiting);
    }

    #[test]
    fn history_absent_from_import_is_retained() {
        let mut old = task("old", "Gamma");
        old.status = TaskStatus::Finished;
        let known = TaskUniverse::from([("old".to_string(), old.clone())]);

        let merged = reconcile(vec![task("new", "Beta")], &known);
        assert_eq!(merged.universe.len(), 2);
        assert_eq!(merged.universe["old"], old);
        assert_eq!(merged.retained, 1);
    }

    #[test]
    fn empty_import_keeps_everything() {
        let known = TaskUniverse::from([("a".to_string(), task("a", "Acme"))]);
        let merged = reconcile(Vec::new(), &known);
        assert_eq!(merged.universe, known);
    }
}
