//! # Transcript Document
//!
//! The shared grid document and the merge semantics that apply updates to it.
//!
//! ## Merge Semantics
//!
//! - **Scalars** (`song_length`, `measure_length`, `current_offset`): last write wins.
//!   A non-positive measure length is coerced to `1.0`.
//! - **Working memory**: replaced wholesale, never merged.
//! - **Cells**: a JSON cell replaces the whole entry; a legacy `::` message
//!   sets a single field. Either way the flash rule sees the entry as it was
//!   before the update.
//! - **Deletes**: removing a cell or track removes its flash annotations in
//!   the same step.

use crate::clock::Timestamp;
use crate::engine::DocumentSchema;
use crate::keys::{MeasureKey, TrackKey};
use crate::transcript::flash::{self, FlashDecision, FlashStore, FlashTiming, FlashView};
use crate::transcript::update::{CellChange, StructuredUpdate, TrackChange, TranscriptUpdate};
use crate::value::Value;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Fields of one cell
pub type CellEntry = BTreeMap<String, Value>;

/// Track → measure → cell
pub type Transcript = BTreeMap<TrackKey, BTreeMap<MeasureKey, CellEntry>>;

/// Track id → series name (`absolutes`, `offsets`, `span`, ...) → timestamps
pub type WorkingMemory = BTreeMap<String, BTreeMap<String, Vec<f64>>>;

pub const DEFAULT_MEASURE_LENGTH: f64 = 1.0;

/// Document state shared between ingestion and readers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    song_length: f64,
    measure_length: f64,
    transcript: Transcript,
    working_memory: WorkingMemory,
    current_offset: f64,
}

/// Reader-side copy of the document
pub type DocumentView = Document;

impl Default for Document {
    fn default() -> Self {
        Self {
            song_length: 0.0,
            measure_length: DEFAULT_MEASURE_LENGTH,
            transcript: Transcript::new(),
            working_memory: WorkingMemory::new(),
            current_offset: 0.0,
        }
    }
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn song_length(&self) -> f64 {
        self.song_length
    }

    /// Always > 0
    pub fn measure_length(&self) -> f64 {
        self.measure_length
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn working_memory(&self) -> &WorkingMemory {
        &self.working_memory
    }

    pub fn current_offset(&self) -> f64 {
        self.current_offset
    }

    pub fn cell(&self, track: &str, measure: &str) -> Option<&CellEntry> {
        self.transcript.get(track)?.get(measure)
    }

    pub fn cell_count(&self) -> usize {
        self.transcript.values().map(BTreeMap::len).sum()
    }

    pub fn set_song_length(&mut self, value: f64) {
        self.song_length = if value.is_finite() && value > 0.0 { value } else { 0.0 };
    }

    pub fn set_measure_length(&mut self, value: f64) {
        self.measure_length = if value.is_finite() && value > 0.0 {
            value
        } else {
            DEFAULT_MEASURE_LENGTH
        };
    }

    pub fn set_current_offset(&mut self, value: f64) {
        self.current_offset = value;
    }

    pub fn replace_working_memory(&mut self, working_memory: WorkingMemory) {
        self.working_memory = working_memory;
    }
}

/// Summary of one application
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub scalars_set: usize,
    pub cells_written: usize,
    pub cells_deleted: usize,
    pub tracks_deleted: usize,
    pub flashes: usize,
    pub cross_outs: usize,
}

impl ApplyOutcome {
    fn record_flash(&mut self, decision: FlashDecision) {
        if decision.color.is_some() {
            self.flashes += 1;
        }
        if decision.cross_out {
            self.cross_outs += 1;
        }
    }
}

/// Document plus flash annotations; the unit guarded by the engine lock
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    document: Document,
    flashes: FlashStore,
    timing: FlashTiming,
}

impl DocumentStore {
    pub fn new(timing: FlashTiming) -> Self {
        Self {
            timing,
            ..Self::default()
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn flashes(&self) -> &FlashStore {
        &self.flashes
    }

    fn apply_structured(&mut self, update: StructuredUpdate, now: Timestamp, outcome: &mut ApplyOutcome) {
        if let Some(song_length) = update.song_length {
            self.document.set_song_length(song_length);
            outcome.scalars_set += 1;
        }
        if let Some(measure_length) = update.measure_length {
            self.document.set_measure_length(measure_length);
            outcome.scalars_set += 1;
        }
        if let Some(working_memory) = update.working_memory {
            self.document.replace_working_memory(working_memory);
            outcome.scalars_set += 1;
        }
        if let Some(current_offset) = update.current_offset {
            self.document.set_current_offset(current_offset);
            outcome.scalars_set += 1;
        }

        for change in update.transcript {
            match change {
                TrackChange::Delete(track) => {
                    if let Some(measures) = self.document.transcript.remove(&track) {
                        self.flashes.remove_track(&track, measures.keys());
                        outcome.tracks_deleted += 1;
                    }
                }
                TrackChange::Cells { track, cells } => {
                    self.document.transcript.entry(track.clone()).or_default();
                    for cell in cells {
                        self.apply_cell(&track, cell, now, outcome);
                    }
                }
            }
        }
    }

    fn apply_cell(&mut self, track: &str, change: CellChange, now: Timestamp, outcome: &mut ApplyOutcome) {
        let Some(measures) = self.document.transcript.get_mut(track) else {
            return;
        };

        match change {
            CellChange::Delete(measure) => {
                if measures.remove(&measure).is_some() {
                    self.flashes.remove_cell(track, &measure);
                    outcome.cells_deleted += 1;
                }
            }
            CellChange::Replace {
                measure,
                entry,
                null_fields,
            } => {
                let previous = measures.insert(measure.clone(), entry);
                let current = &measures[&measure];
                let touched = current
                    .iter()
                    .map(|(k, v)| (k.as_str(), Some(v)))
                    .chain(null_fields.iter().map(|k| (k.as_str(), None)));
                let decision = flash::decide(touched, current, previous.as_ref());
                self.flashes.trigger(track, &measure, decision, now, &self.timing);
                outcome.cells_written += 1;
                outcome.record_flash(decision);
            }
        }
    }

    fn apply_field(
        &mut self,
        track: String,
        measure: String,
        field: String,
        value: Value,
        now: Timestamp,
        outcome: &mut ApplyOutcome,
    ) {
        let measures = self.document.transcript.entry(track.clone()).or_default();
        let previous = measures.get(&measure).cloned();
        let cell = measures.entry(measure.clone()).or_default();
        cell.insert(field.clone(), value);

        let current = &*cell;
        let decision = flash::decide(
            std::iter::once((field.as_str(), current.get(&field))),
            current,
            previous.as_ref(),
        );
        self.flashes.trigger(&track, &measure, decision, now, &self.timing);
        outcome.cells_written += 1;
        outcome.record_flash(decision);
    }
}

impl DocumentSchema for DocumentStore {
    type Update = TranscriptUpdate;
    type Outcome = ApplyOutcome;
    type Snapshot = TranscriptSnapshot;

    fn apply(&mut self, update: TranscriptUpdate, now: Timestamp) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();

        match update {
            TranscriptUpdate::Structured(structured) => {
                self.apply_structured(structured, now, &mut outcome);
            }
            TranscriptUpdate::SongLength(value) => {
                self.document.set_song_length(value);
                outcome.scalars_set += 1;
            }
            TranscriptUpdate::MeasureLength(value) => {
                self.document.set_measure_length(value);
                outcome.scalars_set += 1;
            }
            TranscriptUpdate::CrossOut { track, measure } => {
                let decision = FlashDecision {
                    color: None,
                    cross_out: true,
                };
                self.flashes.trigger(&track, &measure, decision, now, &self.timing);
                outcome.record_flash(decision);
            }
            TranscriptUpdate::SetField {
                track,
                measure,
                field,
                value,
            } => {
                self.apply_field(track, measure, field, value, now, &mut outcome);
            }
        }

        outcome
    }

    fn snapshot(&self, taken_at: Timestamp) -> TranscriptSnapshot {
        TranscriptSnapshot {
            taken_at,
            document: self.document.clone(),
            flashes: self.flashes.clone(),
        }
    }
}

/// Consistent copy of document and flash state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptSnapshot {
    pub taken_at: Timestamp,
    pub document: DocumentView,
    pub flashes: FlashView,
}

impl TranscriptSnapshot {
    pub fn into_parts(self) -> (DocumentView, FlashView) {
        (self.document, self.flashes)
    }
}

impl fmt::Display for TranscriptSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let now = self.taken_at;
        let active = self
            .flashes
            .iter()
            .filter(|(_, a)| a.is_flashing(now) || a.is_crossed_out(now))
            .count();
        write!(
            f,
            "song_length={} measure_length={} tracks={} cells={} working_memory_tracks={} active_flashes={}",
            self.document.song_length(),
            self.document.measure_length(),
            self.document.transcript().len(),
            self.document.cell_count(),
            self.document.working_memory().len(),
            active
        )
    }
}
