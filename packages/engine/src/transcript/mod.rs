//! # Transcript Grid
//!
//! Track × measure grid of annotated cells with flash highlights.
//!
//! ```rust,ignore
//! use livegrid_engine::transcript;
//!
//! let engine = transcript::engine(Default::default());
//! engine.apply_datagram(b"Track 3 :: 120 :: rating 0.75");
//!
//! let snapshot = engine.snapshot();
//! let groups = transcript::compute_span_groups(
//!     snapshot.document.transcript(),
//!     snapshot.document.measure_length(),
//!     8,
//! );
//! ```

mod detector;
mod document;
mod flash;
mod legacy;
mod structured;
mod update;
mod views;

pub use detector::TranscriptDetector;
pub use document::{
    ApplyOutcome, CellEntry, Document, DocumentStore, DocumentView, Transcript, TranscriptSnapshot,
    WorkingMemory, DEFAULT_MEASURE_LENGTH,
};
pub use flash::{decide, FlashAnnotation, FlashDecision, FlashStore, FlashTiming, FlashView, Rgb, AMBER, BLUE};
pub use update::{CellChange, StructuredUpdate, TrackChange, TranscriptUpdate};
pub use views::{
    column_count, compute_span_groups, display_rating, rating_alpha, span_envelopes, timeline_bounds,
    SpanEnvelope, SpanGroups, TimelineBounds,
};

use crate::clock::Clock;
use crate::engine::Engine;
use std::sync::Arc;

pub type TranscriptEngine = Engine<DocumentStore, TranscriptDetector>;

/// Engine for the transcript grid on the wall clock
pub fn engine(timing: FlashTiming) -> TranscriptEngine {
    Engine::new(DocumentStore::new(timing), TranscriptDetector)
}

pub fn engine_with_clock(timing: FlashTiming, clock: Arc<dyn Clock>) -> TranscriptEngine {
    Engine::with_clock(DocumentStore::new(timing), TranscriptDetector, clock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, Timestamp};
    use crate::engine::PacketDisposition;
    use crate::value::Value;
    use chrono::{Duration, TimeZone, Utc};

    fn start() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn setup() -> (TranscriptEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start()));
        let engine = engine_with_clock(FlashTiming::default(), clock.clone());
        (engine, clock)
    }

    #[test]
    fn test_measure_length_coerced() {
        let (engine, _) = setup();
        engine.apply_text(r#"{"bar":{"measure_length": -5}}"#);
        assert_eq!(engine.snapshot().document.measure_length(), 1.0);

        engine.apply_text("bar 0");
        assert_eq!(engine.snapshot().document.measure_length(), 1.0);

        engine.apply_text("bar 2.5");
        assert_eq!(engine.snapshot().document.measure_length(), 2.5);
    }

    #[test]
    fn test_cell_delete_removes_flash() {
        let (engine, _) = setup();
        engine.apply_text(r#"{"transcript":{"2":{"4":{"offset":1.5}}}}"#);
        let snapshot = engine.snapshot();
        assert!(snapshot.document.cell("2", "4").is_some());
        assert!(snapshot.flashes.get("2_4").is_some());

        engine.apply_text(r#"{"transcript":{"2":{"4":null}}}"#);
        let snapshot = engine.snapshot();
        assert!(snapshot.document.cell("2", "4").is_none());
        assert!(snapshot.flashes.get("2_4").is_none());
        assert!(snapshot.document.transcript().contains_key("2"));
    }

    #[test]
    fn test_track_delete_removes_all_flashes() {
        let (engine, _) = setup();
        engine.apply_text(r#"{"transcript":{"1":{"0":{"rating":0.2},"4":{"offset":3}},"2":{"0":{"rating":1}}}}"#);
        assert_eq!(engine.snapshot().flashes.len(), 3);

        engine.apply_text(r#"{"transcript":{"01":null}}"#);
        let snapshot = engine.snapshot();
        assert!(!snapshot.document.transcript().contains_key("1"));
        assert_eq!(snapshot.flashes.len(), 1);
        assert!(snapshot.flashes.get("2_0").is_some());
    }

    #[test]
    fn test_hierarchical_rating_flashes_blue() {
        let (engine, _) = setup();
        engine.apply_text("Track 3 :: 120 :: rating 0.75");

        let snapshot = engine.snapshot();
        assert_eq!(
            snapshot.document.cell("3", "120").and_then(|c| c.get("rating")),
            Some(&Value::Float(0.75))
        );
        let flash = snapshot.flashes.get("3_120").unwrap();
        assert_eq!(flash.flash_color, Some(BLUE));
        assert_eq!(flash.flash_until, Some(start() + Duration::milliseconds(500)));
        assert_eq!(flash.x_until, None);
    }

    #[test]
    fn test_hierarchical_merges_fields() {
        let (engine, _) = setup();
        engine.apply_text("1 :: 0 :: span :: 0, 1");
        engine.apply_text("1 :: 00 :: rating 0.5");

        let snapshot = engine.snapshot();
        let cell = snapshot.document.cell("1", "0").unwrap();
        assert_eq!(cell.len(), 2);
        // span present and no earlier rating: a newly rated span
        assert_eq!(snapshot.flashes.get("1_0").unwrap().flash_color, Some(AMBER));
    }

    #[test]
    fn test_new_span_then_rerating() {
        let (engine, clock) = setup();
        engine.apply_text(r#"{"transcript":{"1":{"8":{"span":[0,1],"rating":0.9}}}}"#);
        assert_eq!(engine.snapshot().flashes.get("1_8").unwrap().flash_color, Some(AMBER));

        clock.advance(Duration::seconds(2));
        engine.apply_text(r#"{"transcript":{"1":{"8":{"span":[0,1],"rating":0.4}}}}"#);
        let snapshot = engine.snapshot();
        let flash = snapshot.flashes.get("1_8").unwrap();
        assert_eq!(flash.flash_color, Some(BLUE));
        assert!(snapshot.flashes.is_flashing("1", "8", snapshot.taken_at));
    }

    #[test]
    fn test_cell_replace_is_not_a_field_merge() {
        let (engine, _) = setup();
        engine.apply_text(r#"{"transcript":{"1":{"0":{"span":2,"rating":0.9,"extra":"x"}}}}"#);
        engine.apply_text(r#"{"transcript":{"1":{"0":{"rating":0.1}}}}"#);

        let snapshot = engine.snapshot();
        let cell = snapshot.document.cell("1", "0").unwrap();
        assert_eq!(cell.len(), 1);
        assert_eq!(cell.get("rating"), Some(&Value::Float(0.1)));
    }

    #[test]
    fn test_flash_x_and_color_expire_independently() {
        let (engine, clock) = setup();
        engine.apply_text(r#"{"transcript":{"2":{"6":{"rating":0.3,"flashX":true}}}}"#);

        clock.advance(Duration::milliseconds(400));
        let snapshot = engine.snapshot();
        assert!(snapshot.flashes.is_flashing("2", "6", snapshot.taken_at));
        assert!(!snapshot.flashes.is_crossed_out("2", "6", snapshot.taken_at));

        clock.advance(Duration::milliseconds(200));
        let snapshot = engine.snapshot();
        assert!(!snapshot.flashes.is_flashing("2", "6", snapshot.taken_at));
        // expired annotations stay until their cell is deleted
        assert!(snapshot.flashes.get("2_6").is_some());
    }

    #[test]
    fn test_cross_out_marker_sets_only_x() {
        let (engine, _) = setup();
        assert_eq!(
            engine.apply_text("track 4 measure 16 nonexistent_recitation"),
            PacketDisposition::Applied
        );

        let snapshot = engine.snapshot();
        let flash = snapshot.flashes.get("4_16").unwrap();
        assert_eq!(flash.flash_until, None);
        assert_eq!(flash.x_until, Some(start() + Duration::milliseconds(350)));
        assert!(snapshot.document.cell("4", "16").is_none());
    }

    #[test]
    fn test_braces_in_hierarchical_value_are_kept() {
        let (engine, _) = setup();
        engine.apply_datagram(b"Track 3 :: 120 :: note {draft}");

        let snapshot = engine.snapshot();
        assert_eq!(
            snapshot.document.cell("3", "120").and_then(|c| c.get("note")),
            Some(&Value::Text("{draft}".to_string()))
        );
        assert_eq!(engine.stats().applied, 1);
    }

    #[test]
    fn test_junk_around_json_is_cut_after_detection_misses() {
        let (engine, _) = setup();
        engine.apply_datagram(br#"xx {"bar":{"measure_length":3}} yy"#);
        assert_eq!(engine.snapshot().document.measure_length(), 3.0);
        assert_eq!(engine.stats().applied, 1);
    }

    #[test]
    fn test_null_fields_still_flash() {
        let (engine, _) = setup();
        engine.apply_text(r#"{"transcript":{"1":{"0":{"rating":null}}}}"#);
        engine.apply_text(r#"{"transcript":{"1":{"4":{"offset":null}}}}"#);

        let snapshot = engine.snapshot();
        assert!(snapshot.document.cell("1", "0").unwrap().is_empty());
        assert_eq!(snapshot.flashes.get("1_0").unwrap().flash_color, Some(BLUE));
        assert_eq!(snapshot.flashes.get("1_4").unwrap().flash_color, Some(AMBER));
    }

    #[test]
    fn test_song_length_legacy_scalar() {
        let (engine, _) = setup();
        engine.apply_text("song_length 12,500abc");
        assert_eq!(engine.snapshot().document.song_length(), 12500.0);
    }

    #[test]
    fn test_working_memory_replaced_wholesale() {
        let (engine, _) = setup();
        engine.apply_text(r#"{"working_memory":{"1-1000.0":{"offsets":[1000.0]},"2-1500.0":{"offsets":[1500.0]}}}"#);
        engine.apply_text(r#"{"building":{"3-10.0":{"absolutes":[11.0]}},"current_offset":10.0}"#);

        let snapshot = engine.snapshot();
        let wm = snapshot.document.working_memory();
        assert_eq!(wm.len(), 1);
        assert_eq!(wm["3-10.0"]["absolutes"], vec![11.0]);
        assert_eq!(snapshot.document.current_offset(), 10.0);
    }

    #[test]
    fn test_snapshot_is_independent_copy() {
        let (engine, _) = setup();
        engine.apply_text(r#"{"transcript":{"1":{"0":{"rating":0.5}}}}"#);
        let before = engine.snapshot();

        engine.apply_text(r#"{"transcript":{"1":null}}"#);
        assert!(before.document.cell("1", "0").is_some());
        assert!(engine.snapshot().document.cell("1", "0").is_none());
    }

    #[test]
    fn test_snapshot_summary() {
        let (engine, _) = setup();
        engine.apply_text(r#"{"stats":{"song_length":8},"transcript":{"1":{"0":{"rating":0.5}}}}"#);
        let summary = engine.snapshot().to_string();
        assert!(summary.contains("song_length=8"));
        assert!(summary.contains("cells=1"));
        assert!(summary.contains("active_flashes=1"));
    }
}
