//! Canonical updates produced by the transcript detector.

use crate::keys::{MeasureKey, TrackKey};
use crate::transcript::document::{CellEntry, WorkingMemory};
use crate::value::Value;

/// One normalized packet
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptUpdate {
    /// JSON packet: any combination of scalars, working memory and cell changes
    Structured(StructuredUpdate),

    /// `song_length <n>`
    SongLength(f64),

    /// `bar <n>`
    MeasureLength(f64),

    /// `nonexistent_recitation` marker: cross-out only
    CrossOut { track: TrackKey, measure: MeasureKey },

    /// `track :: measure :: field value`
    SetField {
        track: TrackKey,
        measure: MeasureKey,
        field: String,
        value: Value,
    },
}

/// Recognized parts of a JSON packet; `None` means "not supplied"
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuredUpdate {
    pub song_length: Option<f64>,
    pub measure_length: Option<f64>,
    pub working_memory: Option<WorkingMemory>,
    pub current_offset: Option<f64>,
    /// Track changes in packet order
    pub transcript: Vec<TrackChange>,
}

impl StructuredUpdate {
    pub fn is_empty(&self) -> bool {
        self.song_length.is_none()
            && self.measure_length.is_none()
            && self.working_memory.is_none()
            && self.current_offset.is_none()
            && self.transcript.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackChange {
    /// Track was `null`: drop it with all its flashes
    Delete(TrackKey),

    /// Per-cell changes, creating the track if needed
    Cells {
        track: TrackKey,
        cells: Vec<CellChange>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellChange {
    /// Cell was `null`
    Delete(MeasureKey),

    /// Full replacement of the cell. `null_fields` names incoming fields
    /// whose value was `null`: absent from `entry`, yet still touched.
    Replace {
        measure: MeasureKey,
        entry: CellEntry,
        null_fields: Vec<String>,
    },
}
