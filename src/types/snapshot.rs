//! The board snapshot: the single unit of truth that is broadcast and
//! persisted.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::dock::{DockStatus, DockTopology};
use super::task::Task;

/// Complete board state at an instant: today's tasks plus the dock layout.
///
/// `version` is assigned by the [`BoardStore`](crate::board::BoardStore)
/// on every accepted replacement. Clients echo it back so the store can
/// detect stale submissions when configured to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSnapshot {
    /// Monotonic version, `0` for a snapshot the store has never accepted.
    #[serde(default)]
    pub version: u64,
    /// Today's tasks.
    pub tasks: Vec<Task>,
    /// Dock layout and occupancy.
    pub dock_topology: DockTopology,
}

/// A dock whose status disagrees with the tasks assigned to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyViolation {
    /// The inconsistent dock.
    pub dock_id: String,
    /// Status the dock reports.
    pub status: DockStatus,
    /// Unfinished tasks assigned to the dock.
    pub holders: Vec<String>,
}

impl fmt::Display for OccupancyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dock {} is {} but holds {} unfinished task(s)",
            self.dock_id,
            self.status,
            self.holders.len()
        )
    }
}

impl BoardSnapshot {
    /// Creates a snapshot at version `0`.
    pub fn new(tasks: Vec<Task>, dock_topology: DockTopology) -> Self {
        Self {
            version: 0,
            tasks,
            dock_topology,
        }
    }

    /// Looks up a task by id.
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Looks up a task by id, mutably.
    pub fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Checks the dock occupancy invariant: a dock is `occupied` iff exactly
    /// one unfinished task is assigned to it, `blocked` iff its manual block
    /// is active, and `free` otherwise.
    pub fn occupancy_violations(&self) -> Vec<OccupancyViolation> {
        self.dock_topology
            .docks()
            .filter_map(|dock| {
                let holders: Vec<String> = self
                    .tasks
                    .iter()
                    .filter(|t| t.occupied_dock() == Some(dock.id.as_str()))
                    .map(|t| t.id.clone())
                    .collect();

                let consistent = match dock.status {
                    DockStatus::Occupied => {
                        holders.len() == 1
                            && !dock.manual_block.active
                            && dock.current_task_id.as_deref() == Some(holders[0].as_str())
                    },
                    DockStatus::Blocked => dock.manual_block.active && holders.is_empty(),
                    DockStatus::Free => !dock.manual_block.active && holders.is_empty(),
                };

                (!consistent).then(|| OccupancyViolation {
                    dock_id: dock.id.clone(),
                    status: dock.status,
                    holders,
                })
            })
            .collect()
    }
}

impl Default for BoardSnapshot {
    fn default() -> Self {
        Self::new(Vec::new(), DockTopology::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::task::{Assignment, TaskStatus};
    use chrono::{TimeZone, Utc};

    fn assigned(id: &str, dock: &str, status: TaskStatus) -> Task {
        let mut task = Task::new(
            id.to_string(),
            Utc.with_ymd_and_hms(2025, 1, 10, 11, 0, 0).unwrap(),
            "08:00".to_string(),
            "Acme".to_string(),
            "Import".to_string(),
        );
        task.status = status;
        task.assignment = Some(Assignment {
            dock_id: dock.to_string(),
            time: "08:00".to_string(),
        });
        task
    }

    #[test]
    fn empty_board_is_consistent() {
        assert!(BoardSnapshot::default().occupancy_violations().is_empty());
    }

    #[test]
    fn free_dock_with_holder_is_reported() {
        let snapshot = BoardSnapshot::new(
            vec![assigned("a", "dock-1", TaskStatus::Scheduled)],
            DockTopology::default(),
        );
        let violations = snapshot.occupancy_violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].dock_id, "dock-1");
        assert_eq!(violations[0].holders, vec!["a".to_string()]);
    }

    #[test]
    fn camel_case_topology_field() {
        let json = serde_json::to_value(BoardSnapshot::default()).unwrap();
        assert!(json.get("dockTopology").is_some());
        assert_eq!(json["version"], 0);
    }
}
