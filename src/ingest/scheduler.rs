//! Flush scheduler: the timed drain from the pending buffer into the visible dataset.
//!
//! The scheduler never sleeps or spawns. It records when the next tick is due and the single
//! event loop calls [`FlushScheduler::tick`] once that deadline passes, so at most one tick
//! sequence exists per session by construction.

use super::buffer::{PendingBuffer, VisibleDataset};
use std::time::{Duration, Instant};

/// Default period between flush ticks
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(250);
/// Default maximum rows admitted per tick
pub const DEFAULT_CHUNK_SIZE: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    #[default]
    Idle,
    Draining,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No tick sequence is active; nothing was done.
    Inactive,
    /// Rows were admitted and another tick is scheduled.
    Admitted(usize),
    /// Buffer was empty while the parser is still running. Ticking stops until the next batch.
    Paused,
    /// The session is complete. Carries the rows admitted by this final tick.
    Finished(usize),
}

#[derive(Debug, Clone)]
pub struct FlushScheduler {
    state: SchedulerState,
    interval: Duration,
    chunk_size: usize,
    next_deadline: Option<Instant>,
}

impl Default for FlushScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_FLUSH_INTERVAL, DEFAULT_CHUNK_SIZE)
    }
}

impl FlushScheduler {
    pub fn new(interval: Duration, chunk_size: usize) -> Self {
        Self {
            state: SchedulerState::Idle,
            interval,
            chunk_size: chunk_size.max(1),
            next_deadline: None,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Begin a tick sequence. Returns false (and changes nothing) when one is already running
    /// or the session has finished.
    pub fn start(&mut self, now: Instant) -> bool {
        match self.state {
            SchedulerState::Idle => {
                self.state = SchedulerState::Draining;
                self.next_deadline = Some(now + self.interval);
                true
            }
            SchedulerState::Draining | SchedulerState::Finished => false,
        }
    }

    /// Run one flush step.
    ///
    /// `stream_ended` tells the scheduler the parser will deliver no more batches; only then can
    /// an empty buffer complete the session.
    pub fn tick(
        &mut self,
        pending: &mut PendingBuffer,
        visible: &mut VisibleDataset,
        stream_ended: bool,
        now: Instant,
    ) -> TickOutcome {
        if self.state != SchedulerState::Draining {
            return TickOutcome::Inactive;
        }

        if pending.is_empty() {
            self.next_deadline = None;
            if stream_ended {
                self.state = SchedulerState::Finished;
                return TickOutcome::Finished(0);
            }
            self.state = SchedulerState::Idle;
            return TickOutcome::Paused;
        }

        let chunk = pending.drain_chunk(self.chunk_size);
        let admitted = chunk.len();
        visible.append(chunk);

        if pending.is_empty() && stream_ended {
            self.state = SchedulerState::Finished;
            self.next_deadline = None;
            return TickOutcome::Finished(admitted);
        }

        self.next_deadline = Some(now + self.interval);
        TickOutcome::Admitted(admitted)
    }

    /// Back to `Idle` with no pending deadline. Used when a new session starts.
    pub fn reset(&mut self) {
        self.state = SchedulerState::Idle;
        self.next_deadline = None;
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_deadline
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.next_deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Time left until the next tick, zero when overdue, `None` when no tick is scheduled.
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.next_deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::row::{Schema, TypedRow};
    use std::sync::Arc;

    fn fill(pending: &mut PendingBuffer, n: usize) {
        let schema = Arc::new(Schema::new(vec!["n".into()]));
        pending.extend((0..n).map(|i| TypedRow::from_raw(&vec![Some(i.to_string())], &schema)));
    }

    #[test]
    fn test_start_is_not_reentrant() {
        let now = Instant::now();
        let mut scheduler = FlushScheduler::default();
        assert!(scheduler.start(now));
        assert!(!scheduler.start(now));
        assert!(!scheduler.start(now));
        assert_eq!(scheduler.state(), SchedulerState::Draining);
    }

    #[test]
    fn test_tick_drains_bounded_chunks() {
        let now = Instant::now();
        let mut scheduler = FlushScheduler::new(Duration::from_millis(250), 500);
        let mut pending = PendingBuffer::new();
        let mut visible = VisibleDataset::default();
        fill(&mut pending, 1200);
        scheduler.start(now);

        assert_eq!(
            scheduler.tick(&mut pending, &mut visible, false, now),
            TickOutcome::Admitted(500)
        );
        assert_eq!(
            scheduler.tick(&mut pending, &mut visible, false, now),
            TickOutcome::Admitted(500)
        );
        assert_eq!(
            scheduler.tick(&mut pending, &mut visible, false, now),
            TickOutcome::Admitted(200)
        );
        assert_eq!(visible.len(), 1200);
        assert_eq!(
            scheduler.tick(&mut pending, &mut visible, false, now),
            TickOutcome::Paused
        );
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.next_deadline(), None);
    }

    #[test]
    fn test_empty_tick_after_stream_end_finishes() {
        let now = Instant::now();
        let mut scheduler = FlushScheduler::default();
        let mut pending = PendingBuffer::new();
        let mut visible = VisibleDataset::default();
        scheduler.start(now);
        assert_eq!(
            scheduler.tick(&mut pending, &mut visible, true, now),
            TickOutcome::Finished(0)
        );
        assert_eq!(scheduler.state(), SchedulerState::Finished);
        assert!(!scheduler.start(now));
        assert_eq!(
            scheduler.tick(&mut pending, &mut visible, true, now),
            TickOutcome::Inactive
        );
    }

    #[test]
    fn test_last_chunk_after_stream_end_finishes_immediately() {
        let now = Instant::now();
        let mut scheduler = FlushScheduler::new(Duration::from_millis(250), 500);
        let mut pending = PendingBuffer::new();
        let mut visible = VisibleDataset::default();
        fill(&mut pending, 300);
        scheduler.start(now);
        assert_eq!(
            scheduler.tick(&mut pending, &mut visible, true, now),
            TickOutcome::Finished(300)
        );
    }

    #[test]
    fn test_deadline_tracking() {
        let now = Instant::now();
        let interval = Duration::from_millis(250);
        let mut scheduler = FlushScheduler::new(interval, 10);
        assert!(!scheduler.is_due(now));
        assert_eq!(scheduler.time_until_due(now), None);
        scheduler.start(now);
        assert!(!scheduler.is_due(now));
        assert!(scheduler.is_due(now + interval));
        assert_eq!(scheduler.time_until_due(now + interval * 2), Some(Duration::ZERO));
        scheduler.reset();
        assert_eq!(scheduler.next_deadline(), None);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[test]
    fn test_zero_chunk_size_is_clamped() {
        assert_eq!(FlushScheduler::new(DEFAULT_FLUSH_INTERVAL, 0).chunk_size(), 1);
    }
}
