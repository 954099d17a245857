//! Score collaborator interface
//!
//! The engine never lays out notation. It receives the rendered score as a
//! flat list of entries in score order, each with its beat position, and a
//! way to turn a beat position into a [`PositionMarker`] that the rendering
//! surface understands.

use serde::{Deserialize, Serialize};

use crate::types::{NoteheadId, PositionMarker};

/// Tempo assumed when an entry carries none (quarter = 120)
pub const DEFAULT_BPM: f64 = 120.0;

/// One voice entry of the rendered score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    /// Start position in beats from the beginning of the score
    pub beat: f64,
    /// Length in beats
    pub duration_beats: f64,
    /// Tempo in effect at this entry (beats per minute)
    #[serde(default = "default_bpm")]
    pub bpm: f64,
    /// 0-based measure index
    pub measure_index: usize,
    /// Printed measure number
    pub measure_number: u32,
    /// 0-based system (line) the measure is engraved on
    pub measure_line: usize,
    /// Noteheads belonging to this entry
    #[serde(default)]
    pub noteheads: Vec<NoteheadId>,
}

fn default_bpm() -> f64 {
    DEFAULT_BPM
}

impl ScoreEntry {
    /// End position in beats
    pub fn end_beat(&self) -> f64 {
        self.beat + self.duration_beats
    }
}

/// A rendered, addressable score
pub trait Score {
    /// Entries in score order
    fn entries(&self) -> &[ScoreEntry];

    /// Project a beat position to a marker usable for coordinate lookups
    fn project(&self, beat: f64) -> PositionMarker;
}
