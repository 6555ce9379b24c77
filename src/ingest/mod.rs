//! Incremental ingestion: parser batches in, a stable growing dataset out.
//!
//! [`Ingest`] owns everything tied to one file session: the schema, the pending buffer, the
//! visible dataset, the flush scheduler, progress counters and the selection. A new schema
//! resets all of it in one step, before any later batch is applied.

pub mod buffer;
pub mod progress;
pub mod row;
pub mod scheduler;

use crate::selection::{AxisColumn, Selection};
use buffer::{PendingBuffer, VisibleDataset};
use progress::Progress;
use row::{RawRow, Schema, TypedRow};
use scheduler::{FlushScheduler, SchedulerState, TickOutcome};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

pub use progress::percent_loaded;
pub use row::{coerce_field, Value};

/// Snapshot handed to the chart/selection layer and printed by headless mode.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadModel<'a> {
    pub headers: &'a [String],
    pub visible_rows: &'a [TypedRow],
    pub axis_column: &'a AxisColumn,
    pub series_columns: &'a [String],
    pub loaded_count: usize,
    pub total_count: u64,
    pub finished: bool,
}

#[derive(Debug)]
pub struct Ingest {
    schema: Arc<Schema>,
    pending: PendingBuffer,
    visible: VisibleDataset,
    scheduler: FlushScheduler,
    selection: Selection,
    total: u64,
    stream_ended: bool,
    finished: bool,
}

impl Default for Ingest {
    fn default() -> Self {
        Self::new(FlushScheduler::default())
    }
}

impl Ingest {
    pub fn new(scheduler: FlushScheduler) -> Self {
        Self {
            schema: Arc::new(Schema::default()),
            pending: PendingBuffer::new(),
            visible: VisibleDataset::default(),
            scheduler,
            selection: Selection::new(),
            total: 0,
            stream_ended: false,
            finished: false,
        }
    }

    pub fn with_cadence(flush_interval: Duration, chunk_size: usize) -> Self {
        Self::new(FlushScheduler::new(flush_interval, chunk_size))
    }

    /// Clear every piece of session state. The scheduler keeps its cadence.
    pub fn reset(&mut self) {
        self.schema = Arc::new(Schema::default());
        self.pending.clear();
        self.visible.clear();
        self.scheduler.reset();
        self.selection.reset();
        self.total = 0;
        self.stream_ended = false;
        self.finished = false;
    }

    /// A schema announcement starts a new session.
    pub fn on_schema(&mut self, headers: Vec<String>) {
        self.reset();
        self.schema = Arc::new(Schema::new(headers));
        debug!(columns = self.schema.len(), "schema announced");
    }

    /// Last write wins.
    pub fn on_total(&mut self, total: u64) {
        self.total = total;
        debug!(total, "total announced");
    }

    /// Type a batch against the current schema and queue it. Starts the scheduler if it is idle;
    /// returns whether this call started it.
    pub fn on_rows(&mut self, rows: Vec<RawRow>, now: Instant) -> bool {
        let schema = &self.schema;
        self.pending
            .extend(rows.iter().map(|raw| TypedRow::from_raw(raw, schema)));
        let started = self.scheduler.start(now);
        if started {
            debug!(pending = self.pending.len(), "flush scheduler started");
        }
        started
    }

    /// The parser has delivered everything it will deliver (successfully or not). If no tick
    /// sequence is running, one is started so completion is observed on a tick.
    pub fn on_stream_end(&mut self, now: Instant) -> bool {
        self.stream_ended = true;
        self.scheduler.start(now)
    }

    /// One flush step. Call when [`Ingest::is_tick_due`] says so (or directly in tests).
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        let outcome =
            self.scheduler
                .tick(&mut self.pending, &mut self.visible, self.stream_ended, now);
        match outcome {
            TickOutcome::Finished(_) => {
                if !self.finished {
                    self.finished = true;
                    debug!(loaded = self.visible.len(), "ingestion finished");
                }
            }
            TickOutcome::Paused => debug!("pending buffer empty, flush scheduler paused"),
            TickOutcome::Admitted(_) | TickOutcome::Inactive => {}
        }
        outcome
    }

    pub fn is_tick_due(&self, now: Instant) -> bool {
        self.scheduler.is_due(now)
    }

    pub fn next_tick_in(&self, now: Instant) -> Option<Duration> {
        self.scheduler.time_until_due(now)
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn headers(&self) -> &[String] {
        self.schema.headers()
    }

    pub fn visible_rows(&self) -> &[TypedRow] {
        self.visible.rows()
    }

    pub fn first_row(&self) -> Option<&TypedRow> {
        self.visible.rows().first()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn has_schema(&self) -> bool {
        !self.schema.is_empty()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn stream_ended(&self) -> bool {
        self.stream_ended
    }

    pub fn progress(&self) -> Progress {
        Progress {
            loaded: self.visible.len(),
            total: self.total,
            finished: self.finished,
        }
    }

    pub fn percent_loaded(&self) -> Option<f64> {
        self.progress().percent()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Set the axis. Unknown columns are rejected so the selection stays within the schema.
    pub fn set_axis_column(&mut self, axis: AxisColumn) -> bool {
        if let Some(name) = axis.column() {
            if !self.schema.contains(name) {
                return false;
            }
        }
        self.selection.set_axis(axis);
        true
    }

    /// Toggle a series column. Unknown columns are ignored and yield `None`; otherwise returns
    /// whether the column is now selected.
    pub fn toggle_series_column(&mut self, column: &str) -> Option<bool> {
        if !self.schema.contains(column) {
            return None;
        }
        Some(self.selection.toggle_series(column))
    }

    /// Series columns eligible right now (numeric-looking first row, excluding the axis).
    pub fn series_candidates(&self) -> Vec<String> {
        self.selection
            .series_candidates(&self.schema, self.first_row())
    }

    pub fn axis_candidates(&self) -> Vec<AxisColumn> {
        Selection::axis_candidates(&self.schema)
    }

    pub fn read_model(&self) -> ReadModel<'_> {
        let progress = self.progress();
        ReadModel {
            headers: self.schema.headers(),
            visible_rows: self.visible.rows(),
            axis_column: self.selection.axis(),
            series_columns: self.selection.series(),
            loaded_count: progress.loaded,
            total_count: progress.total,
            finished: progress.finished,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_rows(start: usize, n: usize) -> Vec<RawRow> {
        (start..start + n)
            .map(|i| vec![Some(i.to_string()), Some((i * 2).to_string())])
            .collect()
    }

    #[test]
    fn test_rows_before_schema_degrade_to_empty_rows() {
        let now = Instant::now();
        let mut ingest = Ingest::default();
        ingest.on_rows(raw_rows(0, 3), now);
        ingest.on_stream_end(now);
        assert!(matches!(ingest.tick(now), TickOutcome::Finished(3)));
        assert_eq!(ingest.visible_rows().len(), 3);
        assert!(ingest.visible_rows().iter().all(|r| r.is_empty()));
    }

    #[test]
    fn test_stream_end_while_idle_restarts_ticking() {
        let now = Instant::now();
        let mut ingest = Ingest::with_cadence(Duration::from_millis(250), 500);
        ingest.on_schema(vec!["a".into(), "b".into()]);
        ingest.on_rows(raw_rows(0, 10), now);
        assert_eq!(ingest.tick(now), TickOutcome::Admitted(10));
        assert_eq!(ingest.tick(now), TickOutcome::Paused);
        assert!(!ingest.is_finished());
        assert!(ingest.on_stream_end(now));
        assert!(ingest.next_tick_in(now).is_some());
        assert_eq!(ingest.tick(now), TickOutcome::Finished(0));
        assert!(ingest.is_finished());
    }

    #[test]
    fn test_selection_mutators_reject_unknown_columns() {
        let mut ingest = Ingest::default();
        ingest.on_schema(vec!["t".into(), "a".into()]);
        assert!(!ingest.set_axis_column(AxisColumn::Column("nope".into())));
        assert!(ingest.set_axis_column(AxisColumn::Column("t".into())));
        assert_eq!(ingest.toggle_series_column("nope"), None);
        assert_eq!(ingest.toggle_series_column("a"), Some(true));
        assert_eq!(ingest.toggle_series_column("a"), Some(false));
        assert!(ingest.set_axis_column(AxisColumn::Index));
    }

    #[test]
    fn test_read_model_serializes_camel_case() {
        let now = Instant::now();
        let mut ingest = Ingest::default();
        ingest.on_schema(vec!["a".into(), "b".into()]);
        ingest.on_total(1);
        ingest.on_rows(vec![vec![Some("1".into()), Some("".into())]], now);
        ingest.on_stream_end(now);
        ingest.tick(now);
        let json = serde_json::to_value(ingest.read_model()).unwrap();
        assert_eq!(json["headers"], serde_json::json!(["a", "b"]));
        assert_eq!(json["visibleRows"][0]["a"], serde_json::json!(1.0));
        assert_eq!(json["visibleRows"][0]["b"], serde_json::json!(""));
        assert_eq!(json["axisColumn"], serde_json::json!("idx"));
        assert_eq!(json["seriesColumns"], serde_json::json!([]));
        assert_eq!(json["loadedCount"], serde_json::json!(1));
        assert_eq!(json["totalCount"], serde_json::json!(1));
        assert_eq!(json["finished"], serde_json::json!(true));
    }
}
