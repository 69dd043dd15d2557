//! Sentence-by-sentence listening practice engine.
//!
//! Parses SRT transcripts into segments, keeps the current selection stable
//! across the starred filter, drives an external player segment by segment,
//! edits segment timing within clamped limits and renders a windowed
//! waveform envelope.

pub mod boundary;
pub mod config;
pub mod error;
pub mod navigation;
pub mod player;
pub mod session;
pub mod srt;
pub mod store;
pub mod waveform;

pub use config::PracticeConfig;
pub use error::{Error, Result};
pub use navigation::{Direction, Key, PlaybackState};
pub use player::Player;
pub use session::Session;
pub use srt::{Segment, SegmentId};
