//! # Derived Views
//!
//! Layout helpers computed from a snapshot for the renderer.
//!
//! Span groups are a min/max envelope per `(track, span value)`: cells in
//! columns 0 and 3 sharing a span value form one box over columns 0..=3,
//! whether or not columns 1 and 2 belong to it.

use crate::keys::{measure_key_for_column, TrackKey};
use crate::transcript::document::{CellEntry, Transcript, WorkingMemory};
use crate::value::Value;
use serde::Serialize;
use std::collections::BTreeMap;

/// Track → span text → columns, in column order
pub type SpanGroups = BTreeMap<TrackKey, BTreeMap<String, Vec<usize>>>;

/// Group the grid columns of every track by their `span` value
pub fn compute_span_groups(transcript: &Transcript, measure_length: f64, num_columns: usize) -> SpanGroups {
    let mut groups = SpanGroups::new();

    for (track, measures) in transcript {
        let track_groups = groups.entry(track.clone()).or_default();
        for column in 0..num_columns {
            let measure = measure_key_for_column(column, measure_length);
            if let Some(span) = measures.get(&measure).and_then(|cell| cell.get("span")) {
                track_groups.entry(span.to_string()).or_default().push(column);
            }
        }
    }

    groups
}

/// One bounding box to draw around a span group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpanEnvelope {
    pub track: TrackKey,
    pub span: String,
    pub first_column: usize,
    pub last_column: usize,
}

pub fn span_envelopes(groups: &SpanGroups) -> Vec<SpanEnvelope> {
    let mut envelopes = Vec::new();

    for (track, spans) in groups {
        for (span, columns) in spans {
            let (Some(first), Some(last)) = (columns.iter().min(), columns.iter().max()) else {
                continue;
            };
            envelopes.push(SpanEnvelope {
                track: track.clone(),
                span: span.clone(),
                first_column: *first,
                last_column: *last,
            });
        }
    }

    envelopes
}

/// Number of grid columns for a song: `ceil(song / measure)`, at least one
pub fn column_count(song_length: f64, measure_length: f64) -> usize {
    if measure_length.is_nan() || measure_length <= 0.0 {
        return 1;
    }
    let columns = (song_length / measure_length).ceil();
    if columns.is_finite() && columns >= 1.0 {
        columns as usize
    } else {
        1
    }
}

/// Rating as a number for display: first list element, numeric text parsed
pub fn display_rating(entry: &CellEntry) -> Option<f64> {
    let mut rating = entry.get("rating")?;
    if let Value::List(items) = rating {
        rating = items.first()?;
    }

    match rating {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Text(s) if s.contains('.') => s.parse::<f64>().ok(),
        Value::Text(s) => s.parse::<i64>().ok().map(|i| i as f64),
        Value::List(_) => None,
    }
}

/// Cell opacity for a rating, clamped to `[0, 1]`
pub fn rating_alpha(rating: f64) -> u8 {
    (rating.clamp(0.0, 1.0) * 255.0) as u8
}

/// Time range covered by the working-memory timeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimelineBounds {
    pub min: f64,
    pub max: f64,
}

impl TimelineBounds {
    /// Width of the range; a degenerate range counts as 1.0
    pub fn span(&self) -> f64 {
        if self.max > self.min {
            self.max - self.min
        } else {
            1.0
        }
    }

    /// Position of `ts` along the timeline, 0.0 at `min`
    pub fn fraction(&self, ts: f64) -> f64 {
        (ts - self.min) / self.span()
    }
}

pub fn timeline_bounds(working_memory: &WorkingMemory, current_offset: Option<f64>) -> Option<TimelineBounds> {
    let timestamps = working_memory
        .values()
        .flat_map(|series| series.values())
        .flatten()
        .copied()
        .chain(current_offset);

    timestamps.fold(None, |bounds, ts| {
        Some(match bounds {
            None => TimelineBounds { min: ts, max: ts },
            Some(b) => TimelineBounds {
                min: b.min.min(ts),
                max: b.max.max(ts),
            },
        })
    })
}
