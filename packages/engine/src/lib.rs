//! # Livegrid Engine
//!
//! Ingests loosely formatted status packets from a producer process and
//! keeps a consistent in-memory document that a renderer can snapshot.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ transport: UDP datagrams / TCP lines        │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ framing: split, clean, decode               │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ engine: FormatDetector → DocumentSchema     │
//! │  - one exclusive lock around apply          │
//! │  - flash timers stamped from the Clock      │
//! │  - bad packets logged and dropped           │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ snapshot: independent copy → derived views  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Two document schemas ship with the crate:
//!
//! - [`transcript`]: the track × measure grid with flash annotations
//! - [`events`]: a list of time-indexed event points
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use livegrid_engine::transcript::{self, FlashTiming};
//!
//! let engine = Arc::new(transcript::engine(FlashTiming::default()));
//!
//! // Listener side
//! engine.apply_datagram(br#"{"stats":{"song_length":16},"transcript":{"1":{"0":{"rating":0.5}}}}"#);
//!
//! // Renderer side
//! let snapshot = engine.snapshot();
//! let now = snapshot.taken_at;
//! assert!(snapshot.flashes.is_flashing("1", "0", now));
//! ```

mod clock;
mod engine;
mod error;
mod framing;
mod keys;
mod value;

pub mod events;
pub mod transcript;

pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use engine::{DocumentSchema, Engine, FormatDetector, IngestStats, PacketDisposition};
pub use error::{IngestError, IngestResult};
pub use framing::{clean_packet_text, decode, split_datagram, LineBuffer};
pub use keys::{canonical_int, canonical_key, cell_key, measure_key_for_column, MeasureKey, TrackKey};
pub use value::Value;
