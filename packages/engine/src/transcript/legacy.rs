//! Legacy plain-text packet formats.
//!
//! ```text
//! song_length 12,500          scalar
//! bar 2.5                     scalar
//! 3 7 nonexistent_recitation  cross-out marker (first two integers)
//! Track 3 :: 120 :: rating 0.75
//! Track 3 :: 120 :: span :: 0, 125, 250
//! ```

use crate::error::{IngestError, IngestResult};
use crate::keys::canonical_int;
use crate::transcript::update::TranscriptUpdate;
use crate::value::Value;
use regex::Regex;
use std::sync::LazyLock;

const CROSS_OUT_MARKER: &str = "nonexistent_recitation";

static INTEGER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-?\d+").expect("valid integer regex"));

/// Try the legacy formats in order; `Ok(None)` if none matches
pub fn detect(text: &str) -> IngestResult<Option<TranscriptUpdate>> {
    if let Some(update) = scalar(text)? {
        return Ok(Some(update));
    }
    if text.contains(CROSS_OUT_MARKER) {
        return cross_out(text).map(Some);
    }
    if text.contains("::") {
        return hierarchical(text);
    }
    Ok(None)
}

/// `song_length <n>` / `bar <n>`
fn scalar(text: &str) -> IngestResult<Option<TranscriptUpdate>> {
    let text = text.trim_end().trim_end_matches(',').trim();
    let mut tokens = text.split_whitespace();

    let (Some(name), Some(raw)) = (tokens.next(), tokens.next()) else {
        return Ok(None);
    };
    if name != "song_length" && name != "bar" {
        return Ok(None);
    }

    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    let value = cleaned
        .parse::<f64>()
        .map_err(|_| IngestError::InvalidNumber(raw.to_string()))?;

    Ok(Some(if name == "song_length" {
        TranscriptUpdate::SongLength(value)
    } else {
        TranscriptUpdate::MeasureLength(value)
    }))
}

fn cross_out(text: &str) -> IngestResult<TranscriptUpdate> {
    let mut integers = INTEGER.find_iter(text).map(|m| m.as_str());

    let (Some(track), Some(measure)) = (integers.next(), integers.next()) else {
        return Err(IngestError::Schema(
            "cross-out marker without track and measure".to_string(),
        ));
    };

    Ok(TranscriptUpdate::CrossOut {
        track: int_key(track)?,
        measure: int_key(measure)?,
    })
}

/// `<... track> :: <measure ...> :: <field> [value] [:: value]`
fn hierarchical(text: &str) -> IngestResult<Option<TranscriptUpdate>> {
    let parts: Vec<&str> = text.split("::").collect();
    if parts.len() < 3 {
        return Ok(None);
    }

    let track = parts[0]
        .split_whitespace()
        .last()
        .ok_or_else(|| IngestError::InvalidKey(parts[0].to_string()))?;
    let measure = parts[1]
        .split_whitespace()
        .next()
        .ok_or_else(|| IngestError::InvalidKey(parts[1].to_string()))?;
    let track = int_key(track)?;
    let measure = int_key(measure)?;

    let field_part = parts[2].trim();
    let split_field = field_part
        .split_once(char::is_whitespace)
        .map(|(field, rest)| (field, rest.trim()));

    let (field, value_raw) = if parts.len() >= 4 {
        let trailing = parts[3..].join("::");
        let trailing = trailing.trim().to_string();
        match split_field {
            Some((field, rest)) if trailing.is_empty() => (field, Some(rest.to_string())),
            Some((field, _)) => (field, Some(trailing)),
            None => (field_part, Some(trailing)),
        }
    } else {
        match split_field {
            Some((field, rest)) => (field, Some(rest.to_string())),
            None => (field_part, None),
        }
    };

    if field.is_empty() {
        return Err(IngestError::Schema("hierarchical message without a field name".to_string()));
    }

    let value = match value_raw.as_deref() {
        None | Some("") => Value::Bool(true),
        Some(raw) => Value::parse_raw(raw),
    };

    Ok(Some(TranscriptUpdate::SetField {
        track,
        measure,
        field: field.to_string(),
        value,
    }))
}

fn int_key(token: &str) -> IngestResult<String> {
    canonical_int(token).ok_or_else(|| IngestError::InvalidKey(token.to_string()))
}
