//! JSON packet normalization.
//!
//! Recognized top-level keys are independent: a key with the wrong shape is
//! logged and skipped while the rest of the packet still applies.

use crate::error::{IngestError, IngestResult};
use crate::keys::canonical_key;
use crate::transcript::document::{CellEntry, WorkingMemory};
use crate::transcript::update::{CellChange, StructuredUpdate, TrackChange};
use crate::value::Value;
use serde_json::{Map, Value as Json};

/// Parse a packet that starts with `{` or `[`
pub fn parse(text: &str) -> IngestResult<StructuredUpdate> {
    let packet: Json = serde_json::from_str(text)?;
    let Json::Object(packet) = packet else {
        return Err(IngestError::Schema("JSON packet is not an object".to_string()));
    };

    let mut update = StructuredUpdate::default();

    if let Some(stats) = packet.get("stats").and_then(Json::as_object) {
        update.song_length = optional_number(stats, "song_length", "stats.song_length");
    }

    if let Some(bar) = packet.get("bar").and_then(Json::as_object) {
        update.measure_length = optional_number(bar, "measure_length", "bar.measure_length");
    }

    // `working_memory` wins over the `building` alias when both are present
    for key in ["building", "working_memory"] {
        if let Some(value) = packet.get(key) {
            match parse_working_memory(value) {
                Ok(wm) => update.working_memory = Some(wm),
                Err(e) => tracing::warn!("Skipping {}: {}", key, e),
            }
        }
    }

    update.current_offset = optional_number(&packet, "current_offset", "current_offset");

    if let Some(transcript) = packet.get("transcript") {
        match transcript.as_object() {
            Some(tracks) => update.transcript = parse_tracks(tracks),
            None => tracing::warn!("Skipping transcript: not an object"),
        }
    }

    Ok(update)
}

fn optional_number(object: &Map<String, Json>, key: &str, label: &str) -> Option<f64> {
    let value = object.get(key)?;
    match number(value) {
        Ok(n) => Some(n),
        Err(e) => {
            tracing::warn!("Skipping {}: {}", label, e);
            None
        }
    }
}

/// Numbers, or strings holding a number
fn number(value: &Json) -> IngestResult<f64> {
    match value {
        Json::Number(n) => n
            .as_f64()
            .ok_or_else(|| IngestError::InvalidNumber(n.to_string())),
        Json::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| IngestError::InvalidNumber(s.clone())),
        other => Err(IngestError::Schema(format!("expected a number, got {}", other))),
    }
}

fn parse_working_memory(value: &Json) -> IngestResult<WorkingMemory> {
    let tracks = value
        .as_object()
        .ok_or_else(|| IngestError::Schema("working memory is not an object".to_string()))?;

    let mut working_memory = WorkingMemory::new();
    for (track, series) in tracks {
        let Some(series) = series.as_object() else {
            tracing::warn!("Skipping working memory track {:?}: not an object", track);
            continue;
        };

        let entry = working_memory.entry(track.clone()).or_default();
        for (name, timestamps) in series {
            let Some(timestamps) = timestamps.as_array() else {
                tracing::warn!("Skipping working memory series {}.{}: not a list", track, name);
                continue;
            };
            entry.insert(
                name.clone(),
                timestamps.iter().filter_map(|ts| number(ts).ok()).collect(),
            );
        }
    }

    Ok(working_memory)
}

fn parse_tracks(tracks: &Map<String, Json>) -> Vec<TrackChange> {
    let mut changes = Vec::with_capacity(tracks.len());

    for (raw_track, measures) in tracks {
        let track = canonical_key(raw_track);
        match measures {
            Json::Null => changes.push(TrackChange::Delete(track)),
            Json::Object(measures) => changes.push(TrackChange::Cells {
                cells: parse_cells(&track, measures),
                track,
            }),
            other => tracing::warn!("Skipping track {:?}: expected object or null, got {}", raw_track, other),
        }
    }

    changes
}

fn parse_cells(track: &str, measures: &Map<String, Json>) -> Vec<CellChange> {
    let mut cells = Vec::with_capacity(measures.len());

    for (raw_measure, entry) in measures {
        let measure = canonical_key(raw_measure);
        match entry {
            Json::Null => cells.push(CellChange::Delete(measure)),
            Json::Object(fields) => cells.push(CellChange::Replace {
                measure,
                entry: cell_entry(fields),
                null_fields: fields
                    .iter()
                    .filter(|(_, value)| value.is_null())
                    .map(|(name, _)| name.clone())
                    .collect(),
            }),
            other => tracing::warn!(
                "Skipping cell {}/{:?}: expected object or null, got {}",
                track,
                raw_measure,
                other
            ),
        }
    }

    cells
}

fn cell_entry(fields: &Map<String, Json>) -> CellEntry {
    fields
        .iter()
        .filter_map(|(name, value)| Some((name.clone(), Value::from_json(value)?)))
        .collect()
}
