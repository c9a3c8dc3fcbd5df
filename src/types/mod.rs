//! Board wire types: tasks, docks and snapshots.

pub mod dock;
pub mod snapshot;
pub mod task;

pub use dock::{DistributionCenter, Dock, DockModule, DockStatus, DockTopology, ManualBlock};
pub use snapshot::{BoardSnapshot, OccupancyViolation};
pub use task::{Assignment, Task, TaskStatus};
