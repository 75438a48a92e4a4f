//! Intermediate score model between the SNG data and the GPIF document.
//!
//! Times are in seconds straight from the SNG beat grid; rhythmic durations
//! use the tick grid below once the rhythm detector has run.

use std::collections::BTreeMap;

/// Ticks of a whole note; everything else derives from it.
pub const TICKS_PER_WHOLE_NOTE: u32 = 192;
/// Ticks of a quarter note
pub const TICKS_PER_QUARTER: u32 = 48;

pub const DEFAULT_BPM: f32 = 120.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instrument {
    Guitar,
    Bass,
    Vocals,
}

/// Arrangement role, also the primary track sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TrackPath {
    Lead,
    Rhythm,
    Bass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slide {
    None,
    ToNext,
    UnpitchedUp,
    UnpitchedDown,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BendPoint {
    /// Offset in seconds from the note start
    pub offset: f32,
    /// Bend amount in semitones
    pub step: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub string: u8,
    pub fret: u8,
    pub sustain: f32,
    pub palm_muted: bool,
    pub muted: bool,
    pub hopo: bool,
    pub vibrato: bool,
    pub link_next: bool,
    pub accent: bool,
    pub harmonic: bool,
    pub pinch_harmonic: bool,
    pub tremolo: bool,
    pub tapped: bool,
    pub slapped: bool,
    pub popped: bool,
    /// Left-hand finger, -1 when not given
    pub left_fingering: i8,
    pub slide: Slide,
    /// Target fret of a pitched or unpitched slide
    pub slide_target: i8,
    pub bend_values: Vec<BendPoint>,
}

impl Default for Note {
    fn default() -> Self {
        Note {
            string: 0,
            fret: 0,
            sustain: 0.0,
            palm_muted: false,
            muted: false,
            hopo: false,
            vibrato: false,
            link_next: false,
            accent: false,
            harmonic: false,
            pinch_harmonic: false,
            tremolo: false,
            tapped: false,
            slapped: false,
            popped: false,
            left_fingering: -1,
            slide: Slide::None,
            slide_target: -1,
            bend_values: vec![],
        }
    }
}

/// One beat-aligned note group. Single notes are one-note chords.
#[derive(Debug, Clone, PartialEq)]
pub struct Chord {
    pub start: f32,
    pub end: f32,
    pub duration_ticks: u32,
    /// Chord template id, -1 when the group has none
    pub chord_id: i32,
    pub notes: BTreeMap<u8, Note>,
    pub brush: bool,
    pub slapped: bool,
    pub popped: bool,
    pub tremolo: bool,
    pub section: Option<String>,
}

impl Default for Chord {
    fn default() -> Self {
        Chord {
            start: 0.0,
            end: 0.0,
            duration_ticks: 0,
            chord_id: -1,
            notes: BTreeMap::new(),
            brush: false,
            slapped: false,
            popped: false,
            tremolo: false,
            section: None,
        }
    }
}

/// Chord shape carried over from the SNG templates, -1 for absent strings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChordTemplate {
    pub name: String,
    pub frets: [i32; 6],
    pub fingers: [i32; 6],
}

/// One measure. `beat_times` always starts at `start`, ends at `end` and is
/// strictly increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub start: f32,
    pub end: f32,
    pub beat_times: Vec<f32>,
    pub time_numerator: u32,
    pub time_denominator: u32,
    pub beats_per_minute: u32,
    pub chords: Vec<Chord>,
}

impl Bar {
    /// Rhythmic capacity of the bar on the tick grid.
    pub fn duration_ticks(&self) -> u32 {
        self.time_numerator * TICKS_PER_WHOLE_NOTE / self.time_denominator
    }

    /// Integrate the musical duration of `[start, start + duration)` against
    /// the beat grid, in quarter-note units scaled by the time signature.
    /// Multiply by [`TICKS_PER_QUARTER`] for ticks.
    pub fn duration_for(&self, start: f32, duration: f32) -> f32 {
        let end = start + duration;
        let beat_value = 4.0 / self.time_denominator as f32;
        let mut total = 0.0;
        for pair in self.beat_times.windows(2) {
            let (beat_start, beat_end) = (pair[0], pair[1]);
            if beat_end <= beat_start {
                continue;
            }
            let overlap = end.min(beat_end) - start.max(beat_start);
            if overlap > 0.0 {
                total += overlap / (beat_end - beat_start) * beat_value;
            }
        }
        total
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub name: String,
    pub instrument: Instrument,
    pub path: TrackPath,
    pub bonus: bool,
    pub num_strings: u8,
    pub tuning: [i32; 6],
    pub capo: u8,
    pub chord_templates: BTreeMap<i32, ChordTemplate>,
    pub bars: Vec<Bar>,
    pub average_bpm: f32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Score {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: i32,
    pub tracks: Vec<Track>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn four_four_bar() -> Bar {
        Bar {
            start: 0.0,
            end: 2.0,
            beat_times: vec![0.0, 0.5, 1.0, 1.5, 2.0],
            time_numerator: 4,
            time_denominator: 4,
            beats_per_minute: 120,
            chords: vec![],
        }
    }

    #[test]
    fn test_bar_duration_ticks() {
        assert_eq!(four_four_bar().duration_ticks(), 192);
        let three_eight = Bar {
            time_numerator: 3,
            time_denominator: 8,
            ..four_four_bar()
        };
        assert_eq!(three_eight.duration_ticks(), 72);
    }

    #[test]
    fn test_duration_for_full_bar() {
        let bar = four_four_bar();
        let quarters = bar.duration_for(0.0, 2.0);
        assert!((quarters - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_duration_for_partial_beats() {
        let bar = four_four_bar();
        // one and a half beats starting mid-beat
        let quarters = bar.duration_for(0.25, 0.75);
        assert!((quarters - 1.5).abs() < 1e-6);
        // spans beyond the bar end only count the overlap
        let quarters = bar.duration_for(1.5, 4.0);
        assert!((quarters - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_track_path_ordering() {
        assert!(TrackPath::Lead < TrackPath::Rhythm);
        assert!(TrackPath::Rhythm < TrackPath::Bass);
    }
}
