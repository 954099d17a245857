//! Timeline index - the ordered, time-addressable pointer sequence
//!
//! Built once per score load by walking the score entries in order. Entries
//! sharing a beat start collapse into one [`Pointer`]; each pointer spans the
//! beats up to the next pointer, and its time range is derived from the tempo
//! in effect, fitted to the sync settings:
//!
//! ```text
//!  0       dead_time                                      dead_time + duration
//!  |···········|··········|··········|··········|··········|
//!  [ pointer 0            )[ ptr 1   )[ ptr 2   )[ ptr 3   )
//! ```
//!
//! The first pointer absorbs the dead time so the ranges are contiguous from 0.

use std::rc::Rc;

use crate::config::SyncSettings;
use crate::error::{SyncError, SyncResult};
use crate::score::{Score, ScoreEntry};
use crate::types::{NumberRange, PositionMarker};

/// Milliseconds per minute, for tempo conversions
const MS_PER_MINUTE: f64 = 60_000.0;

/// One addressable, time-ranged position of the score
#[derive(Debug, Clone, PartialEq)]
pub struct Pointer {
    /// Dense 0-based rank
    pub index: usize,
    /// Time span `[start, end)` in ms
    pub time_ms_range: NumberRange,
    /// Beat span `[start, end)`
    pub beat_range: NumberRange,
    /// Marker for coordinate lookups on the rendering surface
    pub marker: PositionMarker,
    /// Voice entries starting at this position
    pub entries: Vec<ScoreEntry>,
    pub measure_index: usize,
    pub measure_number: u32,
    /// System (line) this position is engraved on
    pub measure_line: usize,
    /// Tempo used for this position's duration
    pub bpm: f64,
}

/// Immutable sequence of pointers for one loaded score
#[derive(Debug, Clone, Default)]
pub struct TimelineIndex {
    pointers: Vec<Rc<Pointer>>,
    num_measures: usize,
}

/// Entries grouped by a shared beat start, before time assignment
struct PendingPointer {
    beat_start: f64,
    beat_end: f64,
    entries: Vec<ScoreEntry>,
}

impl TimelineIndex {
    /// Build the pointer sequence from a rendered score
    ///
    /// Fails with [`SyncError::InvalidScore`] when the entries cannot be
    /// ordered monotonically in beat space, and with
    /// [`SyncError::InvalidSyncSettings`] for unusable sync settings. A score
    /// without entries yields an empty index.
    pub fn build(score: &dyn Score, sync: &SyncSettings) -> SyncResult<Self> {
        sync.validate()?;

        let entries = score.entries();
        if entries.is_empty() {
            log::info!("TimelineIndex: score has no addressable entries");
            return Ok(Self::default());
        }

        let pending = group_entries(entries)?;

        // Raw durations from tempo, then scaled to the sync duration
        let raw_ms: Vec<f64> = pending
            .iter()
            .map(|p| (p.beat_end - p.beat_start) * MS_PER_MINUTE / p.entries[0].bpm)
            .collect();
        let raw_total: f64 = raw_ms.iter().sum();
        let scaled = |elapsed: f64| {
            if sync.duration_ms > 0.0 {
                elapsed * sync.duration_ms / raw_total
            } else {
                elapsed
            }
        };
        // The end bound is exact, never a rounded sum of scaled durations
        let end_ms = if sync.duration_ms > 0.0 {
            sync.dead_time_ms + sync.duration_ms
        } else {
            sync.dead_time_ms + raw_total
        };

        let mut starts = Vec::with_capacity(pending.len());
        let mut elapsed = 0.0;
        for raw in &raw_ms {
            starts.push(sync.dead_time_ms + scaled(elapsed));
            elapsed += raw;
        }

        let count = pending.len();
        let pointers: Vec<Rc<Pointer>> = pending
            .into_iter()
            .enumerate()
            .map(|(index, p)| {
                let start = if index == 0 { 0.0 } else { starts[index] };
                let end = if index + 1 < count { starts[index + 1] } else { end_ms };
                let first = &p.entries[0];
                Rc::new(Pointer {
                    index,
                    time_ms_range: NumberRange::new(start, end),
                    beat_range: NumberRange::new(p.beat_start, p.beat_end),
                    marker: score.project(p.beat_start),
                    measure_index: first.measure_index,
                    measure_number: first.measure_number,
                    measure_line: first.measure_line,
                    bpm: first.bpm,
                    entries: p.entries,
                })
            })
            .collect();

        let num_measures = entries
            .iter()
            .map(|e| e.measure_index + 1)
            .max()
            .unwrap_or(0);

        log::info!(
            "TimelineIndex: built {} pointers over {} measures, [0, {:.1}) ms",
            pointers.len(),
            num_measures,
            end_ms
        );

        Ok(Self {
            pointers,
            num_measures,
        })
    }

    pub fn len(&self) -> usize {
        self.pointers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pointers.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Rc<Pointer>> {
        self.pointers.get(index)
    }

    pub fn first(&self) -> Option<&Rc<Pointer>> {
        self.pointers.first()
    }

    pub fn last(&self) -> Option<&Rc<Pointer>> {
        self.pointers.last()
    }

    /// The pointer after `pointer`
    pub fn next(&self, pointer: &Pointer) -> Option<&Rc<Pointer>> {
        self.pointers.get(pointer.index + 1)
    }

    /// The pointer before `pointer`
    pub fn prev(&self, pointer: &Pointer) -> Option<&Rc<Pointer>> {
        pointer.index.checked_sub(1).and_then(|i| self.pointers.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<Pointer>> {
        self.pointers.iter()
    }

    /// Number of measures spanned by the score
    pub fn num_measures(&self) -> usize {
        self.num_measures
    }

    /// End of the playable range (ms), 0 when empty
    pub fn total_duration_ms(&self) -> f64 {
        self.last().map(|p| p.time_ms_range.end()).unwrap_or(0.0)
    }

    /// Binary search for the pointer containing `time_ms`
    pub fn search_time(&self, time_ms: f64) -> Option<&Rc<Pointer>> {
        let index = self
            .pointers
            .partition_point(|p| p.time_ms_range.start() <= time_ms)
            .checked_sub(1)?;
        self.pointers
            .get(index)
            .filter(|p| p.time_ms_range.contains(time_ms))
    }

    /// The pointer whose beat range contains `beat`
    pub fn pointer_at_beat(&self, beat: f64) -> Option<&Rc<Pointer>> {
        let index = self
            .pointers
            .partition_point(|p| p.beat_range.start() <= beat)
            .checked_sub(1)?;
        self.pointers.get(index).filter(|p| p.beat_range.contains(beat))
    }
}

/// Group entries by beat start, checking beat-space monotonicity
fn group_entries(entries: &[ScoreEntry]) -> SyncResult<Vec<PendingPointer>> {
    let mut pending: Vec<PendingPointer> = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        let invalid = |reason: String| SyncError::InvalidScore { index, reason };

        if !entry.beat.is_finite() || entry.beat < 0.0 {
            return Err(invalid(format!("beat {} is not a non-negative number", entry.beat)));
        }
        if !entry.duration_beats.is_finite() || entry.duration_beats < 0.0 {
            return Err(invalid(format!(
                "duration {} is not a non-negative number",
                entry.duration_beats
            )));
        }
        if !entry.bpm.is_finite() || entry.bpm <= 0.0 {
            return Err(invalid(format!("tempo {} is not a positive number", entry.bpm)));
        }

        match pending.last_mut() {
            Some(last) if entry.beat == last.beat_start => {
                last.beat_end = last.beat_end.max(entry.end_beat());
                last.entries.push(entry.clone());
            }
            Some(last) if entry.beat < last.beat_start => {
                return Err(invalid(format!(
                    "beat {} precedes the previous position at beat {}",
                    entry.beat, last.beat_start
                )));
            }
            _ => pending.push(PendingPointer {
                beat_start: entry.beat,
                beat_end: entry.end_beat(),
                entries: vec![entry.clone()],
            }),
        }
    }

    // Each position lasts until the next one starts
    for i in 1..pending.len() {
        let next_start = pending[i].beat_start;
        pending[i - 1].beat_end = next_start;
    }

    if let Some(last) = pending.last() {
        if last.beat_end <= last.beat_start {
            return Err(SyncError::InvalidScore {
                index: entries.len() - 1,
                reason: "final position has no duration".to_string(),
            });
        }
    }

    Ok(pending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::ScriptedScore;

    fn entry(beat: f64, duration_beats: f64, bpm: f64, measure_index: usize) -> ScoreEntry {
        ScoreEntry {
            beat,
            duration_beats,
            bpm,
            measure_index,
            measure_number: measure_index as u32 + 1,
            measure_line: 0,
            noteheads: Vec::new(),
        }
    }

    #[test]
    fn test_uniform_score_is_contiguous() {
        let score = ScriptedScore::uniform(4, 1.0, 60.0);
        let index = TimelineIndex::build(&score, &SyncSettings::new(0.0, 4000.0)).unwrap();

        assert_eq!(index.len(), 4);
        for (i, pointer) in index.iter().enumerate() {
            assert_eq!(pointer.index, i);
            assert_eq!(pointer.time_ms_range.start(), i as f64 * 1000.0);
            assert_eq!(pointer.time_ms_range.end(), (i + 1) as f64 * 1000.0);
        }
        assert_eq!(index.total_duration_ms(), 4000.0);
    }

    #[test]
    fn test_chord_entries_share_a_pointer() {
        let score = ScriptedScore::from_entries(vec![
            entry(0.0, 1.0, 120.0, 0),
            entry(0.0, 2.0, 120.0, 0),
            entry(1.0, 1.0, 120.0, 0),
        ]);
        let index = TimelineIndex::build(&score, &SyncSettings::default()).unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.get(0).unwrap().entries.len(), 2);
        // Held note does not stretch the position past the next one
        assert_eq!(index.get(0).unwrap().beat_range.end(), 1.0);
        // 120 bpm = 500ms per beat, derived from tempo when duration is 0
        assert_eq!(index.get(1).unwrap().time_ms_range.start(), 500.0);
        assert_eq!(index.total_duration_ms(), 1000.0);
    }

    #[test]
    fn test_tempo_changes_are_scaled_to_duration() {
        // Beat 0 at 60 bpm (1000ms raw), beat 1 at 120 bpm (500ms raw)
        let score = ScriptedScore::from_entries(vec![
            entry(0.0, 1.0, 60.0, 0),
            entry(1.0, 1.0, 120.0, 0),
        ]);
        let index = TimelineIndex::build(&score, &SyncSettings::new(0.0, 3000.0)).unwrap();

        assert_eq!(index.get(1).unwrap().time_ms_range.start(), 2000.0);
        assert_eq!(index.total_duration_ms(), 3000.0);
    }

    #[test]
    fn test_dead_time_is_absorbed_by_first_pointer() {
        let score = ScriptedScore::uniform(2, 1.0, 60.0);
        let index = TimelineIndex::build(&score, &SyncSettings::new(500.0, 2000.0)).unwrap();

        let first = index.first().unwrap();
        assert_eq!(first.time_ms_range.start(), 0.0);
        assert_eq!(first.time_ms_range.end(), 1500.0);
        assert_eq!(index.total_duration_ms(), 2500.0);
    }

    #[test]
    fn test_end_bound_is_exact_for_odd_tempos() {
        for bpm in [61.0, 133.0, 97.0, 143.7] {
            let score = ScriptedScore::uniform(3, 1.0, bpm);
            let index = TimelineIndex::build(&score, &SyncSettings::new(250.0, 1000.0)).unwrap();

            assert_eq!(index.total_duration_ms(), 1250.0, "at {} bpm", bpm);
            let just_below = f64::from_bits(1250.0_f64.to_bits() - 1);
            assert!(index.search_time(just_below).is_some(), "at {} bpm", bpm);
            assert!(index.search_time(1250.0).is_none(), "at {} bpm", bpm);
        }

        let single = ScriptedScore::uniform(1, 1.0, 61.0);
        let index = TimelineIndex::build(&single, &SyncSettings::new(0.0, 1000.0)).unwrap();
        assert_eq!(index.total_duration_ms(), 1000.0);
    }

    #[test]
    fn test_empty_score() {
        let score = ScriptedScore::from_entries(Vec::new());
        let index = TimelineIndex::build(&score, &SyncSettings::new(0.0, 4000.0)).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.total_duration_ms(), 0.0);
        assert!(index.search_time(0.0).is_none());
    }

    #[test]
    fn test_decreasing_beats_are_rejected() {
        let score = ScriptedScore::from_entries(vec![
            entry(0.0, 1.0, 120.0, 0),
            entry(2.0, 1.0, 120.0, 0),
            entry(1.0, 1.0, 120.0, 0),
        ]);
        let err = TimelineIndex::build(&score, &SyncSettings::default()).unwrap_err();
        assert!(matches!(err, SyncError::InvalidScore { index: 2, .. }));
    }

    #[test]
    fn test_invalid_entries_are_rejected() {
        let nan_beat = ScriptedScore::from_entries(vec![entry(f64::NAN, 1.0, 120.0, 0)]);
        assert!(TimelineIndex::build(&nan_beat, &SyncSettings::default()).is_err());

        let zero_tempo = ScriptedScore::from_entries(vec![entry(0.0, 1.0, 0.0, 0)]);
        assert!(TimelineIndex::build(&zero_tempo, &SyncSettings::default()).is_err());

        let no_length = ScriptedScore::from_entries(vec![entry(0.0, 0.0, 120.0, 0)]);
        let err = TimelineIndex::build(&no_length, &SyncSettings::default()).unwrap_err();
        assert!(matches!(err, SyncError::InvalidScore { index: 0, .. }));
    }

    #[test]
    fn test_invalid_sync_settings_are_rejected() {
        let score = ScriptedScore::uniform(2, 1.0, 60.0);
        let err = TimelineIndex::build(&score, &SyncSettings::new(-5.0, 0.0)).unwrap_err();
        assert!(matches!(err, SyncError::InvalidSyncSettings(_)));
    }

    #[test]
    fn test_adjacency_and_lookup() {
        let score = ScriptedScore::uniform(4, 1.0, 60.0);
        let index = TimelineIndex::build(&score, &SyncSettings::new(0.0, 4000.0)).unwrap();

        let second = index.get(1).unwrap();
        assert_eq!(index.prev(second).unwrap().index, 0);
        assert_eq!(index.next(second).unwrap().index, 2);
        assert!(index.prev(index.first().unwrap()).is_none());
        assert!(index.next(index.last().unwrap()).is_none());

        assert_eq!(index.search_time(2000.0).unwrap().index, 2);
        assert!(index.search_time(4000.0).is_none());
        assert_eq!(index.pointer_at_beat(3.5).unwrap().index, 3);
        assert_eq!(index.num_measures(), 1);
    }
}
