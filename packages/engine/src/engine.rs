//! # Ingestion Engine
//!
//! One explicitly constructed object owning the shared document.
//!
//! ```text
//! bytes ─→ framing ─→ FormatDetector ─→ Update ─→ DocumentSchema::apply
//!                                                    (exclusive lock)
//! reader ─→ Engine::snapshot ─→ independent copy (lock held only to copy)
//! ```
//!
//! The engine is generic over the wire format ([`FormatDetector`]) and the
//! document it maintains ([`DocumentSchema`]), so every ingestion variant
//! shares the same locking, clock and error-absorbing packet boundary.

use crate::clock::{Clock, SystemClock, Timestamp};
use crate::error::IngestResult;
use crate::framing::{clean_packet_text, embedded_object, split_datagram};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A document kept in memory and mutated only through updates
pub trait DocumentSchema: Send + 'static {
    /// Canonical update produced by a detector
    type Update: fmt::Debug + Send;

    /// What an application changed, for logging and tests
    type Outcome: fmt::Debug;

    /// Independent copy handed to readers; `Display` gives a one-line summary
    type Snapshot: Clone + Send + Serialize + fmt::Display;

    /// Apply one update. Must leave the document consistent and never fail.
    fn apply(&mut self, update: Self::Update, now: Timestamp) -> Self::Outcome;

    /// Deep-copy the current state
    fn snapshot(&self, taken_at: Timestamp) -> Self::Snapshot;
}

/// Classifies packet text and normalizes it into an update
pub trait FormatDetector: Send + Sync + 'static {
    type Update;

    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// `Ok(None)` for text this detector does not recognize
    fn detect(&self, text: &str) -> IngestResult<Option<Self::Update>>;
}

/// What happened to one packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketDisposition {
    Applied,
    Unrecognized,
    Rejected,
}

/// Running packet counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub applied: u64,
    pub unrecognized: u64,
    pub rejected: u64,
}

#[derive(Debug, Default)]
struct Counters {
    applied: AtomicU64,
    unrecognized: AtomicU64,
    rejected: AtomicU64,
}

impl Counters {
    fn record(&self, disposition: PacketDisposition) {
        let counter = match disposition {
            PacketDisposition::Applied => &self.applied,
            PacketDisposition::Unrecognized => &self.unrecognized,
            PacketDisposition::Rejected => &self.rejected,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn load(&self) -> IngestStats {
        IngestStats {
            applied: self.applied.load(Ordering::Relaxed),
            unrecognized: self.unrecognized.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Shared ingestion engine; wrap in an `Arc` to hand it to listeners
pub struct Engine<S, D> {
    state: Mutex<S>,
    detector: D,
    clock: Arc<dyn Clock>,
    counters: Counters,
}

impl<S, D> Engine<S, D>
where
    S: DocumentSchema,
    D: FormatDetector<Update = S::Update>,
{
    pub fn new(schema: S, detector: D) -> Self {
        Self::with_clock(schema, detector, Arc::new(SystemClock))
    }

    pub fn with_clock(schema: S, detector: D, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(schema),
            detector,
            clock,
            counters: Counters::default(),
        }
    }

    // Poisoning is ignored so a panicked task cannot stop ingestion or reads.
    fn lock(&self) -> MutexGuard<'_, S> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn detector_name(&self) -> &'static str {
        self.detector.name()
    }

    /// Ingest one datagram. Never fails; bad packets are logged and dropped.
    pub fn apply_datagram(&self, bytes: &[u8]) {
        for packet in split_datagram(bytes) {
            self.apply_text(&packet);
        }
    }

    /// Ingest one newline-delimited line from a stream transport
    pub fn apply_line(&self, line: &str) -> PacketDisposition {
        self.apply_text(line)
    }

    /// Detect, normalize and apply one packet text
    pub fn apply_text(&self, text: &str) -> PacketDisposition {
        let text = clean_packet_text(text);
        let disposition = if text.is_empty() {
            PacketDisposition::Unrecognized
        } else {
            match self.detect(text) {
                Ok(Some(update)) => {
                    let outcome = self.apply(update);
                    tracing::debug!("[{}] applied: {:?}", self.detector.name(), outcome);
                    PacketDisposition::Applied
                }
                Ok(None) => {
                    tracing::debug!("[{}] unrecognized packet: {:?}", self.detector.name(), preview(text));
                    PacketDisposition::Unrecognized
                }
                Err(e) if e.is_parse_error() => {
                    tracing::warn!("[{}] dropped packet: {} ({:?})", self.detector.name(), e, preview(text));
                    PacketDisposition::Rejected
                }
                Err(e) => {
                    tracing::debug!("[{}] discarded packet: {} ({:?})", self.detector.name(), e, preview(text));
                    PacketDisposition::Rejected
                }
            }
        };

        self.counters.record(disposition);
        disposition
    }

    // Junk around a JSON object is cut off only when the whole line went
    // unrecognized; text formats may carry braces in their values.
    fn detect(&self, text: &str) -> IngestResult<Option<S::Update>> {
        match self.detector.detect(text)? {
            Some(update) => Ok(Some(update)),
            None => match embedded_object(text) {
                Some(object) => self.detector.detect(object),
                None => Ok(None),
            },
        }
    }

    /// Apply an already-normalized update under the write lock
    pub fn apply(&self, update: S::Update) -> S::Outcome {
        let now = self.clock.now();
        self.lock().apply(update, now)
    }

    /// Consistent copy of the document for readers
    pub fn snapshot(&self) -> S::Snapshot {
        let taken_at = self.clock.now();
        self.lock().snapshot(taken_at)
    }

    pub fn stats(&self) -> IngestStats {
        self.counters.load()
    }
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(100) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
