//! Dock resources and the board topology that groups them.
//!
//! A [`DockTopology`] mirrors the physical layout: distribution centers
//! contain modules, modules contain docks. The layout is fixed at process
//! start; only a dock's `status`, `current_task_id` and `manual_block`
//! change afterwards.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::task::Task;

/// Occupancy status of a dock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DockStatus {
    /// Available for assignment or blocking.
    #[default]
    Free,
    /// Held by a scheduled or in-process task.
    Occupied,
    /// Taken out of service by an operator.
    Blocked,
}

impl fmt::Display for DockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Occupied => write!(f, "occupied"),
            Self::Blocked => write!(f, "blocked"),
        }
    }
}

/// Operator-applied block on a dock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ManualBlock {
    /// Whether the block is in force.
    pub active: bool,
    /// Why the dock was blocked; empty when inactive.
    pub reason: String,
}

/// A schedulable loading bay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dock {
    /// Stable identifier, e.g. `dock-1`.
    pub id: String,
    /// Display label, e.g. `Dock 01`.
    pub label: String,
    /// Current occupancy.
    #[serde(default)]
    pub status: DockStatus,
    /// Task holding the dock, if occupied.
    #[serde(default)]
    pub current_task_id: Option<String>,
    /// Operator block.
    #[serde(default)]
    pub manual_block: ManualBlock,
}

impl Dock {
    /// Creates a free dock.
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            status: DockStatus::Free,
            current_task_id: None,
            manual_block: ManualBlock::default(),
        }
    }

    /// Marks the dock as held by `task_id`.
    pub(crate) fn occupy(&mut self, task_id: &str) {
        self.status = DockStatus::Occupied;
        self.current_task_id = Some(task_id.to_string());
    }

    /// Returns the dock to `free`.
    pub(crate) fn release(&mut self) {
        self.status = DockStatus::Free;
        self.current_task_id = None;
    }
}

/// A group of docks inside a distribution center.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockModule {
    /// Module name, e.g. `Module 1`.
    pub name: String,
    /// Docks in display order.
    pub docks: Vec<Dock>,
}

/// A distribution center.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionCenter {
    /// Center name, e.g. `CD1`.
    pub name: String,
    /// Modules in display order.
    pub modules: Vec<DockModule>,
}

/// The full dock layout carried by every board snapshot.
///
/// # Examples
///
/// ```
/// use dockboard::DockTopology;
///
/// let topology = DockTopology::default();
/// assert_eq!(topology.docks().count(), 7);
/// assert!(topology.dock("dock-1").is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockTopology {
    /// Distribution centers in display order.
    pub centers: Vec<DistributionCenter>,
}

impl Default for DockTopology {
    fn default() -> Self {
        fn module(name: &str, numbers: &[u32]) -> DockModule {
            DockModule {
                name: name.to_string(),
                docks: numbers
                    .iter()
                    .map(|n| Dock::new(format!("dock-{n}"), format!("Dock {n:02}")))
                    .collect(),
            }
        }

        Self {
            centers: vec![
                DistributionCenter {
                    name: "CD1".to_string(),
                    modules: vec![module("Module 1", &[1, 2]), module("Module 2", &[3])],
                },
                DistributionCenter {
                    name: "CD2".to_string(),
                    modules: vec![module("Module 1", &[4, 5])],
                },
                DistributionCenter {
                    name: "CD3".to_string(),
                    modules: vec![module("Module 1", &[6]), module("Module 2", &[7])],
                },
            ],
        }
    }
}

impl DockTopology {
    /// Iterates every dock across centers and modules.
    pub fn docks(&self) -> impl Iterator<Item = &Dock> {
        self.centers
            .iter()
            .flat_map(|c| c.modules.iter())
            .flat_map(|m| m.docks.iter())
    }

    /// Iterates every dock mutably.
    pub fn docks_mut(&mut self) -> impl Iterator<Item = &mut Dock> {
        self.centers
            .iter_mut()
            .flat_map(|c| c.modules.iter_mut())
            .flat_map(|m| m.docks.iter_mut())
    }

    /// Looks up a dock by id.
    pub fn dock(&self, id: &str) -> Option<&Dock> {
        self.docks().find(|d| d.id == id)
    }

    /// Looks up a dock by id, mutably.
    pub fn dock_mut(&mut self, id: &str) -> Option<&mut Dock> {
        self.docks_mut().find(|d| d.id == id)
    }

    /// Returns the first dock id that appears more than once, if any.
    pub fn duplicate_dock_id(&self) -> Option<&str> {
        let mut seen = HashSet::new();
        self.docks()
            .map(|d| d.id.as_str())
            .find(|id| !seen.insert(*id))
    }

    /// Returns a copy of this layout with every dock reset to `free` and
    /// unblocked.
    pub fn pristine(&self) -> Self {
        let mut topology = self.clone();
        for dock in topology.docks_mut() {
            dock.release();
            dock.manual_block = ManualBlock::default();
        }
        topology
    }

    /// Recomputes occupancy from `tasks`: a dock holding an assigned,
    /// unfinished task becomes `occupied`, any other unblocked dock becomes
    /// `free`. Blocked docks stay blocked.
    pub fn sync_occupancy(&mut self, tasks: &[Task]) {
        for dock in self.docks_mut() {
            if dock.manual_block.active {
                dock.status = DockStatus::Blocked;
                dock.current_task_id = None;
                continue;
            }
            match tasks.iter().find(|t| t.occupied_dock() == Some(dock.id.as_str())) {
                Some(task) => dock.occupy(&task.id),
                None => dock.release(),
            }
        }
    }
}
