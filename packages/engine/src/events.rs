//! # Event Timeline
//!
//! Time-indexed event points, one JSON object per line:
//!
//! ```text
//! {"track": 1, "channel": 2, "ms": 1500.0, "val": 0.8}   append
//! {"track": 1, "chan": 2, "ms": 1500.0, "val": 0}        remove (track, channel, ms)
//! ```
//!
//! Objects without all four fields belong to other consumers and are
//! ignored.

use crate::clock::{Clock, Timestamp};
use crate::engine::{DocumentSchema, Engine, FormatDetector};
use crate::error::{IngestError, IngestResult};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// One event tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventPoint {
    pub track: i64,
    #[serde(alias = "chan")]
    pub channel: i64,
    pub ms: f64,
    pub val: f64,
}

impl EventPoint {
    pub fn row(&self) -> (i64, i64) {
        (self.track, self.channel)
    }

    /// Ticks point up for positive values, down otherwise
    pub fn is_positive(&self) -> bool {
        self.val > 0.0
    }

    fn same_slot(&self, other: &EventPoint) -> bool {
        self.track == other.track && self.channel == other.channel && self.ms == other.ms
    }
}

const REQUIRED: [&str; 3] = ["track", "ms", "val"];

#[derive(Debug, Default, Clone, Copy)]
pub struct EventDetector;

impl FormatDetector for EventDetector {
    type Update = EventPoint;

    fn name(&self) -> &'static str {
        "events"
    }

    fn detect(&self, text: &str) -> IngestResult<Option<EventPoint>> {
        let text = text.trim();
        if !text.starts_with('{') {
            return Ok(None);
        }

        let packet: Json = serde_json::from_str(text)?;
        let Some(object) = packet.as_object() else {
            return Ok(None);
        };

        let has_channel = object.contains_key("channel") || object.contains_key("chan");
        if !has_channel || !REQUIRED.iter().all(|key| object.contains_key(*key)) {
            return Ok(None);
        }

        serde_json::from_value(packet)
            .map(Some)
            .map_err(|e| IngestError::Schema(format!("event point: {}", e)))
    }
}

/// What one point did to the list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventOutcome {
    pub added: usize,
    pub removed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct EventStore {
    points: Vec<EventPoint>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(&self) -> &[EventPoint] {
        &self.points
    }
}

impl DocumentSchema for EventStore {
    type Update = EventPoint;
    type Outcome = EventOutcome;
    type Snapshot = EventSnapshot;

    fn apply(&mut self, point: EventPoint, _now: Timestamp) -> EventOutcome {
        if point.val == 0.0 {
            let before = self.points.len();
            self.points.retain(|p| !p.same_slot(&point));
            EventOutcome {
                added: 0,
                removed: before - self.points.len(),
            }
        } else {
            self.points.push(point);
            EventOutcome { added: 1, removed: 0 }
        }
    }

    fn snapshot(&self, taken_at: Timestamp) -> EventSnapshot {
        EventSnapshot {
            taken_at,
            points: self.points.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSnapshot {
    pub taken_at: Timestamp,
    pub points: Vec<EventPoint>,
}

impl EventSnapshot {
    pub fn layout(&self) -> Option<EventLayout> {
        EventLayout::compute(&self.points)
    }
}

impl fmt::Display for EventSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows: BTreeSet<(i64, i64)> = self.points.iter().map(EventPoint::row).collect();
        write!(f, "points={} rows={}", self.points.len(), rows.len())
    }
}

/// Rows and time domain for drawing the timeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventLayout {
    /// `(track, channel)` pairs, sorted
    pub rows: Vec<(i64, i64)>,
    pub min_ms: f64,
    pub max_ms: f64,
    /// Padded domain shown on the x axis
    pub display_min_ms: f64,
    pub display_max_ms: f64,
}

impl EventLayout {
    /// `None` when there is nothing to draw
    pub fn compute(points: &[EventPoint]) -> Option<Self> {
        let first = points.first()?;

        let rows: BTreeSet<(i64, i64)> = points.iter().map(EventPoint::row).collect();
        let (min_ms, max_ms) = points
            .iter()
            .fold((first.ms, first.ms), |(lo, hi), p| (lo.min(p.ms), hi.max(p.ms)));

        let mut span = max_ms - min_ms;
        if span <= 0.0 {
            span = 1000.0;
        }

        Some(Self {
            rows: rows.into_iter().collect(),
            min_ms,
            max_ms,
            display_min_ms: min_ms - span * 0.05,
            display_max_ms: max_ms + span * 0.05,
        })
    }

    pub fn row_index(&self, track: i64, channel: i64) -> Option<usize> {
        self.rows.binary_search(&(track, channel)).ok()
    }

    /// Horizontal position of `ms` in `[0, 1]` across the padded domain
    pub fn x_fraction(&self, ms: f64) -> f64 {
        (ms - self.display_min_ms) / (self.display_max_ms - self.display_min_ms)
    }
}

pub type EventEngine = Engine<EventStore, EventDetector>;

pub fn engine() -> EventEngine {
    Engine::new(EventStore::new(), EventDetector)
}

pub fn engine_with_clock(clock: Arc<dyn Clock>) -> EventEngine {
    Engine::with_clock(EventStore::new(), EventDetector, clock)
}
