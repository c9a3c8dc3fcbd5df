//! Board orchestration.
//!
//! [`BoardService`] wires the pieces together: at startup it loads the
//! history, imports the schedule, reconciles the two and installs today's
//! tasks on the board. At runtime every accepted change runs the same
//! sequence under one async lock: replace the snapshot, persist the
//! touched tasks, then broadcast. Readers never wait on that lock.
//!
//! The board is pinned to the calendar date it was built for. Yesterday
//! and tomorrow are always read relative to that date, and
//! [`BoardService::roll_over`] moves the board forward once the clock
//! crosses midnight in the reference timezone.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use crate::board::{BoardCommand, BoardStore, ReplacePolicy};
use crate::broadcast::{BoardUpdate, ConnectionId, UpdateBroadcaster, DEFAULT_CAPACITY};
use crate::clock::{Clock, SystemClock};
use crate::config::{default_timezone, BoardConfig};
use crate::error::{ConfigError, Result};
use crate::import::{import_rows, DuplicatePolicy, JsonRowSource, RowSource, StaticRowSource};
use crate::partition::{local_date, partition_on};
use crate::reconcile::{reconcile, TaskUniverse};
use crate::report::{JsonReportWriter, MonthlyReport, ReportWriter};
use crate::store::{HistoryBackend, InMemoryBackend, JsonFileBackend, TaskHistory};
use crate::types::{BoardSnapshot, DockTopology, Task};

/// Counts from one schedule import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    /// Distinct tasks produced by the import.
    pub imported: usize,
    /// Rows that failed validation.
    pub rejected: usize,
    /// Rows collapsed into an identical earlier row.
    pub collapsed: usize,
    /// Imported tasks not seen before.
    pub created: usize,
    /// Imported tasks that matched known state.
    pub refreshed: usize,
    /// Known tasks absent from the import.
    pub retained: usize,
    /// Tasks on today's board after the import.
    pub today: usize,
    /// Board version after the import.
    pub version: u64,
}

/// Builder for [`BoardService`].
///
/// Every collaborator has a default so tests only set what they care
/// about: an empty in-memory schedule, an in-memory history, a JSON report
/// in the working directory and the system clock.
pub struct BoardServiceBuilder {
    tz: FixedOffset,
    duplicate_policy: DuplicatePolicy,
    replace_policy: ReplacePolicy,
    topology: DockTopology,
    broadcast_capacity: usize,
    source: Option<Box<dyn RowSource>>,
    history: Option<Box<dyn HistoryBackend>>,
    report_writer: Option<Box<dyn ReportWriter>>,
    clock: Arc<dyn Clock>,
}

impl Default for BoardServiceBuilder {
    fn default() -> Self {
        Self {
            tz: default_timezone(),
            duplicate_policy: DuplicatePolicy::default(),
            replace_policy: ReplacePolicy::default(),
            topology: DockTopology::default(),
            broadcast_capacity: DEFAULT_CAPACITY,
            source: None,
            history: None,
            report_writer: None,
            clock: Arc::new(SystemClock),
        }
    }
}

impl BoardServiceBuilder {
    /// Reference timezone for dates, slot times and reports.
    pub fn timezone(mut self, tz: FixedOffset) -> Self {
        self.tz = tz;
        self
    }

    /// Handling of byte-identical schedule rows.
    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Handling of stale whole-snapshot submissions.
    pub fn replace_policy(mut self, policy: ReplacePolicy) -> Self {
        self.replace_policy = policy;
        self
    }

    /// Dock layout.
    pub fn topology(mut self, topology: DockTopology) -> Self {
        self.topology = topology;
        self
    }

    /// Per-receiver broadcast buffer.
    pub fn broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity;
        self
    }

    /// Where schedule rows come from.
    pub fn row_source(mut self, source: impl RowSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Where task history is kept.
    pub fn history_backend(mut self, backend: impl HistoryBackend + 'static) -> Self {
        self.history = Some(Box::new(backend));
        self
    }

    /// Where monthly reports go.
    pub fn report_writer(mut self, writer: impl ReportWriter + 'static) -> Self {
        self.report_writer = Some(Box::new(writer));
        self
    }

    /// Source of "now".
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Loads history, imports the schedule and installs today's board.
    ///
    /// Neither a missing schedule nor an unreadable history is fatal: the
    /// board starts from whatever could be loaded.
    pub async fn initialize(self) -> BoardService {
        let source = self
            .source
            .unwrap_or_else(|| Box::new(StaticRowSource::default()));
        let backend = self
            .history
            .unwrap_or_else(|| Box::new(InMemoryBackend::new()));
        let report_writer = self
            .report_writer
            .unwrap_or_else(|| Box::new(JsonReportWriter::new("monthly_report.json")));

        let history = TaskHistory::load(backend).await;
        let known = history.tasks();

        let imported = match source.rows().await {
            Ok(rows) => {
                let outcome = import_rows(&rows, self.tz, self.duplicate_policy);
                info!(
                    source = %source.describe(),
                    rows = rows.len(),
                    tasks = outcome.tasks.len(),
                    rejected = outcome.rejected.len(),
                    "schedule imported"
                );
                outcome.tasks
            },
            Err(e) => {
                warn!(error = %e, "schedule import failed, continuing with history only");
                Vec::new()
            },
        };

        let merged = reconcile(imported, &known);
        let board_date = local_date(self.clock.now(), self.tz);
        let days = partition_on(merged.universe.values(), board_date, self.tz);

        let mut topology = self.topology.pristine();
        topology.sync_occupancy(&days.today);
        let snapshot = BoardSnapshot::new(days.today, topology);
        log_violations(&snapshot, "initial board");

        history.record(merged.universe.values());
        if history.holds_unread_history() {
            warn!("startup flush skipped, stored history is unreadable");
        } else if let Err(e) = history.flush().await {
            error!(error = %e, "failed to persist imported schedule");
        }

        let store = BoardStore::new(snapshot, self.replace_policy);
        info!(
            date = %board_date,
            tasks = store.get().tasks.len(),
            known = merged.universe.len(),
            "board initialized"
        );

        BoardService {
            tz: self.tz,
            duplicate_policy: self.duplicate_policy,
            source,
            history,
            report_writer,
            clock: self.clock,
            store,
            broadcaster: UpdateBroadcaster::new(self.broadcast_capacity),
            universe: RwLock::new(merged.universe),
            board_date: RwLock::new(board_date),
            writer: Mutex::new(()),
        }
    }
}

fn log_violations(snapshot: &BoardSnapshot, context: &str) {
    for violation in snapshot.occupancy_violations() {
        warn!(
            dock = %violation.dock_id,
            holders = ?violation.holders,
            "{context}: {violation}"
        );
    }
}

/// The running board: store, history, broadcaster and the rules that tie
/// them together.
pub struct BoardService {
    tz: FixedOffset,
    duplicate_policy: DuplicatePolicy,
    source: Box<dyn RowSource>,
    history: TaskHistory,
    report_writer: Box<dyn ReportWriter>,
    clock: Arc<dyn Clock>,
    store: BoardStore,
    broadcaster: UpdateBroadcaster,
    universe: RwLock<TaskUniverse>,
    board_date: RwLock<NaiveDate>,
    writer: Mutex<()>,
}

impl std::fmt::Debug for BoardService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardService")
            .field("tz", &self.tz)
            .field("source", &self.source.describe())
            .field("history", &self.history)
            .field("version", &self.store.version())
            .field("board_date", &self.board_date())
            .finish_non_exhaustive()
    }
}

impl BoardService {
    /// A builder with default collaborators.
    pub fn builder() -> BoardServiceBuilder {
        BoardServiceBuilder::default()
    }

    /// Builds and initializes a service from `config`: JSON schedule,
    /// JSON history file and JSON report writer at the configured paths.
    pub async fn from_config(config: &BoardConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let tz = config.timezone()?;

        Ok(Self::builder()
            .timezone(tz)
            .duplicate_policy(config.duplicate_policy)
            .replace_policy(config.replace_policy)
            .topology(config.topology.clone())
            .broadcast_capacity(config.broadcast_capacity)
            .row_source(JsonRowSource::new(&config.schedule_path))
            .history_backend(JsonFileBackend::new(&config.history_path))
            .report_writer(JsonReportWriter::new(&config.report_path))
            .initialize()
            .await)
    }

    /// The reference timezone.
    pub fn timezone(&self) -> FixedOffset {
        self.tz
    }

    /// The current instant according to the service clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// The current board.
    pub fn snapshot(&self) -> Arc<BoardSnapshot> {
        self.store.get()
    }

    /// Registers for accepted updates.
    pub fn subscribe(&self) -> broadcast::Receiver<BoardUpdate> {
        self.broadcaster.subscribe()
    }

    /// The calendar date the board holds as "today".
    pub fn board_date(&self) -> NaiveDate {
        *self.board_date.read()
    }

    /// Tasks scheduled for the day before the board date.
    pub fn yesterday(&self) -> Vec<Task> {
        let known = self.known_tasks();
        partition_on(known.values(), self.board_date(), self.tz).yesterday
    }

    /// Tasks scheduled for the day after the board date.
    pub fn tomorrow(&self) -> Vec<Task> {
        let known = self.known_tasks();
        partition_on(known.values(), self.board_date(), self.tz).tomorrow
    }

    /// Moves the board to the current calendar day once the clock has
    /// passed midnight in the reference timezone.
    ///
    /// Every known task is partitioned again around the new date. Operator
    /// state and manual dock blocks carry over, and the new board goes to
    /// every connection. Returns `None` when the board is already current.
    pub async fn roll_over(&self) -> Option<Arc<BoardSnapshot>> {
        if local_date(self.clock.now(), self.tz) == self.board_date() {
            return None;
        }
        let _writer = self.writer.lock().await;
        self.roll_over_locked().await
    }

    /// Every known task: history, then the reconciled universe, then the
    /// current board, later sources winning.
    pub fn known_tasks(&self) -> TaskUniverse {
        let mut known = self.history.tasks();
        known.extend(
            self.universe
                .read()
                .iter()
                .map(|(id, task)| (id.clone(), task.clone())),
        );
        for task in &self.store.get().tasks {
            known.insert(task.id.clone(), task.clone());
        }
        known
    }

    /// Replaces the board with a client-submitted snapshot, persists it and
    /// broadcasts it to every connection except `origin`.
    ///
    /// The submission is not validated against the state machine; dock
    /// occupancy inconsistencies are logged.
    ///
    /// # Errors
    ///
    /// [`BoardError::StaleSnapshot`](crate::BoardError::StaleSnapshot) under
    /// [`ReplacePolicy::RejectStale`](crate::board::ReplacePolicy::RejectStale).
    pub async fn submit(
        &self,
        origin: Option<ConnectionId>,
        snapshot: BoardSnapshot,
    ) -> Result<Arc<BoardSnapshot>> {
        let _writer = self.writer.lock().await;
        self.roll_over_locked().await;

        log_violations(&snapshot, "submitted snapshot");
        let accepted = self.store.replace(snapshot).inspect_err(|e| {
            warn!(origin = ?origin, error = %e, "snapshot submission refused");
        })?;

        self.absorb(&accepted.tasks);
        self.persist(&accepted.tasks).await;
        let receivers = self.broadcaster.publish(BoardUpdate {
            origin,
            snapshot: Arc::clone(&accepted),
        });

        info!(
            version = accepted.version,
            tasks = accepted.tasks.len(),
            receivers,
            "board snapshot accepted"
        );
        Ok(accepted)
    }

    /// Applies a single operator command to the current board.
    ///
    /// On success the new board is persisted and broadcast to every
    /// connection, including `origin`.
    ///
    /// # Errors
    ///
    /// [`BoardError::Transition`](crate::BoardError::Transition) when the
    /// command is illegal. Nothing is changed, persisted or broadcast in
    /// that case.
    pub async fn apply_command(
        &self,
        origin: Option<ConnectionId>,
        command: &BoardCommand,
    ) -> Result<Arc<BoardSnapshot>> {
        let _writer = self.writer.lock().await;
        self.roll_over_locked().await;

        let now = self.clock.now();
        let tz = self.tz;
        let (accepted, ()) = self
            .store
            .update(|board| command.apply(board, now, tz))
            .inspect_err(|e| {
                info!(
                    origin = ?origin,
                    command = command.name(),
                    kind = e.kind(),
                    reason = %e,
                    "command rejected"
                );
            })?;

        self.absorb(&accepted.tasks);
        self.persist(&accepted.tasks).await;
        let receivers = self.broadcaster.publish(BoardUpdate {
            origin: None,
            snapshot: Arc::clone(&accepted),
        });

        info!(
            version = accepted.version,
            command = command.name(),
            receivers,
            "command applied"
        );
        Ok(accepted)
    }

    /// Re-reads the schedule and merges it with everything already known.
    ///
    /// Operator edits on the current board survive; manual dock blocks
    /// stay in place. The board moves to the current day if the clock has
    /// passed midnight. The new board goes to every connection.
    ///
    /// # Errors
    ///
    /// [`BoardError::Import`](crate::BoardError::Import) if the schedule
    /// cannot be read. The board is left unchanged.
    pub async fn reimport(&self) -> Result<ImportSummary> {
        let _writer = self.writer.lock().await;

        let rows = self.source.rows().await.inspect_err(|e| {
            warn!(error = %e, "schedule re-import failed");
        })?;
        let outcome = import_rows(&rows, self.tz, self.duplicate_policy);
        let mut summary = ImportSummary {
            imported: outcome.tasks.len(),
            rejected: outcome.rejected.len(),
            collapsed: outcome.collapsed,
            ..ImportSummary::default()
        };

        let today = local_date(self.clock.now(), self.tz);
        self.rebuild(outcome.tasks, today, &mut summary).await;
        info!(?summary, "schedule re-imported");
        Ok(summary)
    }

    /// Builds the monthly report over every known task and writes it.
    pub fn generate_report(&self) -> Result<PathBuf> {
        let known = self.known_tasks();
        let report = MonthlyReport::build(known.values(), self.tz);
        debug!(sheets = report.sheets.len(), rows = report.row_count(), "report built");
        Ok(self.report_writer.write(&report)?)
    }

    /// Writes the final board to history. Call once before exiting.
    pub async fn shutdown(&self) -> Result<()> {
        let _writer = self.writer.lock().await;
        let board = self.store.get();
        self.history.record_and_flush(&board.tasks).await?;
        info!(version = board.version, "board flushed to history");
        Ok(())
    }

    async fn roll_over_locked(&self) -> Option<Arc<BoardSnapshot>> {
        let previous = self.board_date();
        let today = local_date(self.clock.now(), self.tz);
        if today == previous {
            return None;
        }

        let mut summary = ImportSummary::default();
        let installed = self.rebuild(Vec::new(), today, &mut summary).await;
        info!(
            from = %previous,
            to = %today,
            version = installed.version,
            tasks = installed.tasks.len(),
            "board rolled over to a new day"
        );
        Some(installed)
    }

    /// Merges `imported` into everything known, installs the board for
    /// `today`, persists and broadcasts it. Callers hold the writer lock.
    async fn rebuild(
        &self,
        imported: Vec<Task>,
        today: NaiveDate,
        summary: &mut ImportSummary,
    ) -> Arc<BoardSnapshot> {
        let current = self.store.get();
        let mut known = self.universe.read().clone();
        for task in &current.tasks {
            known.insert(task.id.clone(), task.clone());
        }

        let merged = reconcile(imported, &known);
        let days = partition_on(merged.universe.values(), today, self.tz);

        let mut topology = current.dock_topology.clone();
        topology.sync_occupancy(&days.today);
        let installed = self.store.install(BoardSnapshot::new(days.today, topology));
        log_violations(&installed, "rebuilt board");

        self.persist(merged.universe.values()).await;
        summary.created = merged.created;
        summary.refreshed = merged.refreshed;
        summary.retained = merged.retained;
        summary.today = installed.tasks.len();
        summary.version = installed.version;
        *self.universe.write() = merged.universe;
        *self.board_date.write() = today;

        self.broadcaster.publish(BoardUpdate {
            origin: None,
            snapshot: Arc::clone(&installed),
        });
        installed
    }

    fn absorb(&self, tasks: &[Task]) {
        let mut universe = self.universe.write();
        for task in tasks {
            universe.insert(task.id.clone(), task.clone());
        }
    }

    async fn persist<'a, I>(&self, tasks: I)
    where
        I: IntoIterator<Item = &'a Task>,
    {
        if let Err(e) = self.history.record_and_flush(tasks).await {
            error!(error = %e, "failed to persist board, in-memory state stays authoritative");
        }
    }
}
