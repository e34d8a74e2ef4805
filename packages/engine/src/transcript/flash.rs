//! # Flash Annotations
//!
//! Transient per-cell highlights: a colored flash and an independent
//! cross-out overlay. Entries are created on first trigger, updated in
//! place afterwards, and only removed when their cell or track is deleted
//! from the transcript. Expiry is never swept; readers compare `now`
//! against the `*_until` timestamps of a snapshot.

use crate::clock::Timestamp;
use crate::keys::cell_key;
use crate::transcript::document::CellEntry;
use crate::value::Value;
use chrono::Duration;
use serde::Serialize;
use std::collections::BTreeMap;

/// RGB color, serialized as `[r, g, b]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Offset set, or a span newly receiving its rating
pub const AMBER: Rgb = Rgb(255, 153, 26);

/// Rating changed on an already-rated cell
pub const BLUE: Rgb = Rgb(25, 51, 128);

/// How long highlights stay active after being triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashTiming {
    pub flash: Duration,
    pub cross_out: Duration,
}

impl FlashTiming {
    pub fn from_millis(flash_ms: i64, cross_out_ms: i64) -> Self {
        Self {
            flash: Duration::milliseconds(flash_ms),
            cross_out: Duration::milliseconds(cross_out_ms),
        }
    }
}

impl Default for FlashTiming {
    fn default() -> Self {
        Self::from_millis(500, 350)
    }
}

/// Highlight state of one cell
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlashAnnotation {
    pub flash_until: Option<Timestamp>,
    pub flash_color: Option<Rgb>,
    pub x_until: Option<Timestamp>,
}

impl FlashAnnotation {
    pub fn is_flashing(&self, now: Timestamp) -> bool {
        self.flash_until.is_some_and(|until| now < until)
    }

    pub fn is_crossed_out(&self, now: Timestamp) -> bool {
        self.x_until.is_some_and(|until| now < until)
    }

    /// Flash color, amber when none was recorded
    pub fn color(&self) -> Rgb {
        self.flash_color.unwrap_or(AMBER)
    }
}

/// What a cell update should light up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlashDecision {
    pub color: Option<Rgb>,
    pub cross_out: bool,
}

impl FlashDecision {
    pub fn is_none(&self) -> bool {
        self.color.is_none() && !self.cross_out
    }
}

/// Decide the highlight for a cell update.
///
/// `touched` are the incoming fields, `None` for a field sent as `null`.
/// `current` is the cell after the update and `previous` the cell as it
/// was before it. Presence of a key counts, not its value.
pub fn decide<'a>(
    touched: impl IntoIterator<Item = (&'a str, Option<&'a Value>)>,
    current: &CellEntry,
    previous: Option<&CellEntry>,
) -> FlashDecision {
    let mut offset = false;
    let mut rating = false;
    let mut span = current.contains_key("span");
    let mut cross_out = false;

    for (field, value) in touched {
        match field {
            "offset" => offset = true,
            "rating" => rating = true,
            "span" => span = true,
            "flashX" => cross_out |= value.is_some_and(Value::is_truthy),
            _ => {}
        }
    }

    let color = if offset {
        Some(AMBER)
    } else if rating {
        let previously_unrated = match previous {
            None => true,
            Some(prev) => prev.get("rating").map_or(true, Value::is_blank_rating),
        };
        if span && previously_unrated {
            Some(AMBER)
        } else {
            Some(BLUE)
        }
    } else {
        None
    };

    FlashDecision { color, cross_out }
}

/// All flash annotations, keyed by `"<track>_<measure>"`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FlashStore {
    cells: BTreeMap<String, FlashAnnotation>,
}

/// Reader-side copy of the flash store
pub type FlashView = FlashStore;

impl FlashStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&FlashAnnotation> {
        self.cells.get(key)
    }

    pub fn get_cell(&self, track: &str, measure: &str) -> Option<&FlashAnnotation> {
        self.cells.get(&cell_key(track, measure))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FlashAnnotation)> {
        self.cells.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_flashing(&self, track: &str, measure: &str, now: Timestamp) -> bool {
        self.get_cell(track, measure).is_some_and(|a| a.is_flashing(now))
    }

    pub fn is_crossed_out(&self, track: &str, measure: &str, now: Timestamp) -> bool {
        self.get_cell(track, measure).is_some_and(|a| a.is_crossed_out(now))
    }

    /// Apply a decision made by [`decide`]
    pub fn trigger(
        &mut self,
        track: &str,
        measure: &str,
        decision: FlashDecision,
        now: Timestamp,
        timing: &FlashTiming,
    ) {
        if decision.is_none() {
            return;
        }

        let annotation = self.cells.entry(cell_key(track, measure)).or_default();
        if let Some(color) = decision.color {
            annotation.flash_until = Some(now + timing.flash);
            annotation.flash_color = Some(color);
        }
        if decision.cross_out {
            annotation.x_until = Some(now + timing.cross_out);
        }
    }

    pub fn remove_cell(&mut self, track: &str, measure: &str) -> bool {
        self.cells.remove(&cell_key(track, measure)).is_some()
    }

    /// Remove the annotations of the given measures of a track
    pub fn remove_track<'a>(&mut self, track: &str, measures: impl IntoIterator<Item = &'a String>) -> usize {
        measures
            .into_iter()
            .filter(|measure| self.remove_cell(track, measure))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(fields: &[(&str, Value)]) -> CellEntry {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_offset_flashes_amber() {
        let current = entry(&[("offset", Value::Float(12.0)), ("rating", Value::Float(0.5))]);
        let decision = decide(current.iter().map(|(k, v)| (k.as_str(), Some(v))), &current, None);
        assert_eq!(decision.color, Some(AMBER));
        assert!(!decision.cross_out);
    }

    #[test]
    fn test_new_span_rating_flashes_amber() {
        let current = entry(&[
            ("span", Value::List(vec![Value::Int(0), Value::Int(1)])),
            ("rating", Value::Float(0.9)),
        ]);
        let decision = decide(current.iter().map(|(k, v)| (k.as_str(), Some(v))), &current, None);
        assert_eq!(decision.color, Some(AMBER));

        let previous = entry(&[("span", Value::Int(1)), ("rating", Value::List(vec![]))]);
        let decision = decide(current.iter().map(|(k, v)| (k.as_str(), Some(v))), &current, Some(&previous));
        assert_eq!(decision.color, Some(AMBER));
    }

    #[test]
    fn test_rerated_span_flashes_blue() {
        let previous = entry(&[("span", Value::Int(1)), ("rating", Value::Float(0.9))]);
        let current = entry(&[("span", Value::Int(1)), ("rating", Value::Float(0.4))]);
        let decision = decide(current.iter().map(|(k, v)| (k.as_str(), Some(v))), &current, Some(&previous));
        assert_eq!(decision.color, Some(BLUE));
    }

    #[test]
    fn test_rating_without_span_flashes_blue() {
        let current = entry(&[("rating", Value::Float(0.75))]);
        let decision = decide(current.iter().map(|(k, v)| (k.as_str(), Some(v))), &current, None);
        assert_eq!(decision.color, Some(BLUE));
    }

    #[test]
    fn test_flash_x_requires_truthy_value() {
        let current = entry(&[("flashX", Value::Bool(false))]);
        let decision = decide(current.iter().map(|(k, v)| (k.as_str(), Some(v))), &current, None);
        assert!(decision.is_none());

        let current = entry(&[("flashX", Value::Int(1)), ("rating", Value::Float(0.2))]);
        let decision = decide(current.iter().map(|(k, v)| (k.as_str(), Some(v))), &current, None);
        assert!(decision.cross_out);
        assert_eq!(decision.color, Some(BLUE));
    }

    #[test]
    fn test_null_fields_still_count_as_touched() {
        let current = CellEntry::new();
        let decision = decide([("rating", None)], &current, None);
        assert_eq!(decision.color, Some(BLUE));

        let decision = decide([("offset", None)], &current, None);
        assert_eq!(decision.color, Some(AMBER));

        let decision = decide([("span", None), ("rating", None)], &current, None);
        assert_eq!(decision.color, Some(AMBER));

        let decision = decide([("flashX", None)], &current, None);
        assert!(decision.is_none());
    }

    #[test]
    fn test_trigger_timers_are_independent() {
        let now = Utc::now();
        let timing = FlashTiming::default();
        let mut store = FlashStore::new();

        store.trigger(
            "1",
            "0",
            FlashDecision { color: None, cross_out: true },
            now,
            &timing,
        );
        let annotation = store.get("1_0").unwrap();
        assert_eq!(annotation.flash_until, None);
        assert_eq!(annotation.x_until, Some(now + Duration::milliseconds(350)));

        let later = now + Duration::milliseconds(400);
        assert!(!store.is_crossed_out("1", "0", later));

        store.trigger(
            "1",
            "0",
            FlashDecision { color: Some(BLUE), cross_out: false },
            later,
            &timing,
        );
        let annotation = store.get("1_0").unwrap();
        assert_eq!(annotation.color(), BLUE);
        assert!(annotation.is_flashing(later + Duration::milliseconds(499)));
        assert!(!annotation.is_flashing(later + Duration::milliseconds(500)));
        assert_eq!(annotation.x_until, Some(now + Duration::milliseconds(350)));
    }

    #[test]
    fn test_empty_decision_creates_nothing() {
        let mut store = FlashStore::new();
        store.trigger("1", "0", FlashDecision::default(), Utc::now(), &FlashTiming::default());
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_track_only_touches_listed_measures() {
        let now = Utc::now();
        let timing = FlashTiming::default();
        let mut store = FlashStore::new();
        let flash = FlashDecision { color: Some(AMBER), cross_out: false };
        store.trigger("1", "0", flash, now, &timing);
        store.trigger("1", "4", flash, now, &timing);
        store.trigger("11", "0", flash, now, &timing);

        let measures = vec!["0".to_string(), "4".to_string()];
        assert_eq!(store.remove_track("1", &measures), 2);
        assert_eq!(store.len(), 1);
        assert!(store.get("11_0").is_some());
    }
}
