//! Row batch channel between the parser thread and the event loop.
//!
//! Every file session gets a [`Subscription`] tagged with a fresh generation. The parser writes
//! through an [`EventSink`] bound to that subscription; envelopes from any other generation are
//! dropped before they reach [`Ingest`]. Closing the subscription (explicitly or on drop) makes
//! the sink refuse further events, which stops the parser thread.

use crate::ingest::row::RawRow;
use crate::ingest::Ingest;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Notification pushed by the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum ParserEvent {
    Schema(Vec<String>),
    Total(u64),
    Rows(Vec<RawRow>),
    /// All rows have been sent.
    Finished,
    /// Parsing stopped early; the message is user-facing.
    Failed(String),
}

impl ParserEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ParserEvent::Schema(_) => "schema",
            ParserEvent::Total(_) => "total",
            ParserEvent::Rows(_) => "rows",
            ParserEvent::Finished => "finished",
            ParserEvent::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub generation: u64,
    pub event: ParserEvent,
}

/// The receiving side of the channel is gone or the subscription was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("event subscription closed")]
pub struct Closed;

/// What happened when an envelope was dispatched.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Envelope belonged to another session (or this one is closed) and was ignored.
    Stale,
    /// Applied to the session state.
    Applied,
    /// Applied, and the flush scheduler was (re)started: a tick is now due later.
    TickScheduled,
    /// The parser reported a failure. Rows already received stay.
    Failed(String),
}

/// Handle for one session's subscription to parser events.
#[derive(Debug)]
pub struct Subscription {
    generation: u64,
    open: Arc<AtomicBool>,
}

impl Subscription {
    pub fn open(generation: u64) -> Self {
        debug!(generation, "subscription opened");
        Self {
            generation,
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Producer half for the parser thread. `T` is whatever the consumer's channel carries.
    pub fn sink<T>(&self, tx: Sender<T>) -> EventSink
    where
        T: From<Envelope> + Send + 'static,
    {
        EventSink {
            generation: self.generation,
            open: Arc::clone(&self.open),
            deliver: Box::new(move |envelope| tx.send(T::from(envelope)).is_ok()),
        }
    }

    /// Release the subscription. Idempotent.
    pub fn close(&mut self) {
        if self.open.swap(false, Ordering::AcqRel) {
            debug!(generation = self.generation, "subscription closed");
        }
    }

    /// True when the envelope belongs to this open session.
    pub fn accepts(&self, envelope: &Envelope) -> bool {
        self.is_open() && envelope.generation == self.generation
    }

    /// Validate an envelope and route it to the matching [`Ingest`] handler.
    pub fn dispatch(&self, envelope: Envelope, ingest: &mut Ingest, now: Instant) -> Dispatch {
        if !self.accepts(&envelope) {
            debug!(
                generation = envelope.generation,
                current = self.generation,
                kind = envelope.event.kind(),
                "dropping stale parser event"
            );
            return Dispatch::Stale;
        }
        match envelope.event {
            ParserEvent::Schema(headers) => {
                ingest.on_schema(headers);
                Dispatch::Applied
            }
            ParserEvent::Total(total) => {
                ingest.on_total(total);
                Dispatch::Applied
            }
            ParserEvent::Rows(rows) => {
                if ingest.on_rows(rows, now) {
                    Dispatch::TickScheduled
                } else {
                    Dispatch::Applied
                }
            }
            ParserEvent::Finished => {
                if ingest.on_stream_end(now) {
                    Dispatch::TickScheduled
                } else {
                    Dispatch::Applied
                }
            }
            ParserEvent::Failed(message) => {
                warn!(generation = self.generation, %message, "parser failed");
                ingest.on_stream_end(now);
                Dispatch::Failed(message)
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

/// Producer half of a subscription, owned by the parser thread.
pub struct EventSink {
    generation: u64,
    open: Arc<AtomicBool>,
    deliver: Box<dyn Fn(Envelope) -> bool + Send>,
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("generation", &self.generation)
            .field("open", &self.open.load(Ordering::Relaxed))
            .finish()
    }
}

impl EventSink {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Push an event. Fails once the subscription is closed or the receiver is gone.
    pub fn emit(&self, event: ParserEvent) -> Result<(), Closed> {
        if !self.open.load(Ordering::Acquire) {
            return Err(Closed);
        }
        let envelope = Envelope {
            generation: self.generation,
            event,
        };
        if (self.deliver)(envelope) {
            Ok(())
        } else {
            Err(Closed)
        }
    }
}
