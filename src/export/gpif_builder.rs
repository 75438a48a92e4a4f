//! Builds the GPIF document from a score.
//!
//! The document is arena-style: parallel vectors of bars, voices, beats,
//! notes and rhythms, cross-referenced by integer ids only. Bars are laid
//! out track-major, so measure `m` of track `t` has bar id
//! `t * num_bars + m`; master bars rely on that layout.

use crate::error::ConvertError;
use crate::score::song::{Bar, Chord, Instrument, Note, Score, Slide, Track, TrackPath};

/// GPIF slide property flags
pub const SLIDE_FLAG_SHIFT: u32 = 1;
pub const SLIDE_FLAG_OUT_DOWN: u32 = 4;
pub const SLIDE_FLAG_OUT_UP: u32 = 8;

/// Standard tuning MIDI notes, low string first.
const GUITAR_MIDI: [i32; 6] = [40, 45, 50, 55, 59, 64];
const BASS_MIDI: [i32; 6] = [28, 33, 38, 43, 47, 52];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteValue {
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
    ThirtySecond,
    SixtyFourth,
}

impl NoteValue {
    pub fn name(self) -> &'static str {
        match self {
            NoteValue::Whole => "Whole",
            NoteValue::Half => "Half",
            NoteValue::Quarter => "Quarter",
            NoteValue::Eighth => "Eighth",
            NoteValue::Sixteenth => "16th",
            NoteValue::ThirtySecond => "32nd",
            NoteValue::SixtyFourth => "64th",
        }
    }
}

/// Map a tick count to a note value and dot count.
pub fn from_ticks(ticks: u32) -> (NoteValue, u8) {
    match ticks {
        t if t >= 192 => (NoteValue::Whole, 0),
        t if t >= 144 => (NoteValue::Half, 1),
        t if t >= 96 => (NoteValue::Half, 0),
        t if t >= 72 => (NoteValue::Quarter, 1),
        t if t >= 48 => (NoteValue::Quarter, 0),
        t if t >= 36 => (NoteValue::Eighth, 1),
        t if t >= 24 => (NoteValue::Eighth, 0),
        t if t >= 18 => (NoteValue::Sixteenth, 1),
        t if t >= 12 => (NoteValue::Sixteenth, 0),
        t if t >= 8 => (NoteValue::ThirtySecond, 0),
        _ => (NoteValue::SixtyFourth, 0),
    }
}

#[derive(Debug, Clone)]
pub struct GpifTrack {
    pub name: String,
    pub short_name: String,
    pub color: (u8, u8, u8),
    pub instrument_ref: &'static str,
    /// Tuning as MIDI notes, already ordered high string first
    pub tuning_midi: Vec<i32>,
    pub capo: u8,
}

#[derive(Debug, Clone)]
pub struct GpifMasterBar {
    pub numerator: u32,
    pub denominator: u32,
    pub bar_ids: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct GpifBar {
    pub voice_ids: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct GpifVoice {
    pub beat_ids: Vec<usize>,
}

/// A beat with no note ids is a rest.
#[derive(Debug, Clone)]
pub struct GpifBeat {
    pub rhythm_id: usize,
    pub note_ids: Vec<usize>,
    pub chord_id: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct GpifNote {
    pub string: u32,
    pub fret: u32,
    pub palm_muted: bool,
    pub muted: bool,
    pub harmonic: Option<&'static str>,
    pub slide_flags: Option<u32>,
    pub left_fingering: Option<u32>,
    pub accent: bool,
    pub hammer_on: bool,
    pub tapped: bool,
    pub vibrato: bool,
    /// (time, value) pairs, both already scaled by 100
    pub bend_points: Vec<(i32, i32)>,
}

#[derive(Debug, Clone)]
pub struct GpifRhythm {
    pub value: NoteValue,
    pub dots: u8,
}

#[derive(Debug, Clone, Default)]
pub struct GpifDocument {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub tempo: u32,
    pub tracks: Vec<GpifTrack>,
    pub master_bars: Vec<GpifMasterBar>,
    pub bars: Vec<GpifBar>,
    pub voices: Vec<GpifVoice>,
    pub beats: Vec<GpifBeat>,
    pub notes: Vec<GpifNote>,
    pub rhythms: Vec<GpifRhythm>,
}

impl Default for GpifRhythm {
    fn default() -> Self {
        GpifRhythm {
            value: NoteValue::Quarter,
            dots: 0,
        }
    }
}

impl GpifDocument {
    /// Check that every cross-reference points inside its target arena.
    pub fn validate(&self) -> Result<(), ConvertError> {
        let bad = |what: &str, id: usize| {
            ConvertError::ParsingError(format!("GPIF document references missing {what} {id}"))
        };
        for master_bar in &self.master_bars {
            for &id in &master_bar.bar_ids {
                if id >= self.bars.len() {
                    return Err(bad("bar", id));
                }
            }
        }
        for bar in &self.bars {
            for &id in &bar.voice_ids {
                if id >= self.voices.len() {
                    return Err(bad("voice", id));
                }
            }
        }
        for voice in &self.voices {
            for &id in &voice.beat_ids {
                if id >= self.beats.len() {
                    return Err(bad("beat", id));
                }
            }
        }
        for beat in &self.beats {
            if beat.rhythm_id >= self.rhythms.len() {
                return Err(bad("rhythm", beat.rhythm_id));
            }
            for &id in &beat.note_ids {
                if id >= self.notes.len() {
                    return Err(bad("note", id));
                }
            }
        }
        Ok(())
    }
}

/// Build the full arena document from a score.
pub fn build_document(score: &Score) -> GpifDocument {
    let mut doc = GpifDocument {
        title: score.title.clone(),
        artist: score.artist.clone(),
        album: score.album.clone(),
        tempo: score
            .tracks
            .first()
            .map_or(120, |t| t.average_bpm.round() as u32),
        ..Default::default()
    };

    for track in &score.tracks {
        doc.tracks.push(build_track_header(track));
        for bar in &track.bars {
            let voice_id = doc.voices.len();
            let beat_ids = build_bar_beats(&mut doc, track, bar);
            doc.voices.push(GpifVoice { beat_ids });
            doc.bars.push(GpifBar {
                voice_ids: vec![voice_id],
            });
        }
    }

    let num_bars = score.tracks.first().map_or(0, |t| t.bars.len());
    if let Some(first_track) = score.tracks.first() {
        for (measure, bar) in first_track.bars.iter().enumerate().take(num_bars) {
            doc.master_bars.push(GpifMasterBar {
                numerator: bar.time_numerator,
                denominator: bar.time_denominator,
                bar_ids: (0..score.tracks.len())
                    .map(|track_index| track_index * num_bars + measure)
                    .collect(),
            });
        }
    }
    doc
}

fn build_bar_beats(doc: &mut GpifDocument, track: &Track, bar: &Bar) -> Vec<usize> {
    let mut beat_ids = Vec::new();
    if bar.chords.is_empty() {
        // a single whole-bar rest
        let rhythm_id = push_rhythm(doc, bar.duration_ticks());
        beat_ids.push(push_beat(doc, rhythm_id, vec![], None));
        return beat_ids;
    }
    for chord in &bar.chords {
        let rhythm_id = push_rhythm(doc, chord.duration_ticks);
        let note_ids = chord
            .notes
            .values()
            .map(|note| {
                let gpif_note = build_note(track, note);
                doc.notes.push(gpif_note);
                doc.notes.len() - 1
            })
            .collect();
        let chord_ref = chord_template_ref(track, chord);
        beat_ids.push(push_beat(doc, rhythm_id, note_ids, chord_ref));
    }
    beat_ids
}

fn chord_template_ref(track: &Track, chord: &Chord) -> Option<i32> {
    (chord.chord_id >= 0 && track.chord_templates.contains_key(&chord.chord_id))
        .then_some(chord.chord_id)
}

fn push_rhythm(doc: &mut GpifDocument, ticks: u32) -> usize {
    let (value, dots) = from_ticks(ticks);
    doc.rhythms.push(GpifRhythm { value, dots });
    doc.rhythms.len() - 1
}

fn push_beat(
    doc: &mut GpifDocument,
    rhythm_id: usize,
    note_ids: Vec<usize>,
    chord_id: Option<i32>,
) -> usize {
    doc.beats.push(GpifBeat {
        rhythm_id,
        note_ids,
        chord_id,
    });
    doc.beats.len() - 1
}

fn build_track_header(track: &Track) -> GpifTrack {
    let base = match track.instrument {
        Instrument::Bass => &BASS_MIDI,
        _ => &GUITAR_MIDI,
    };
    let strings = usize::from(track.num_strings).min(6);
    // emitted high string first
    let tuning_midi = (0..strings)
        .rev()
        .map(|s| base[s] + track.tuning[s])
        .collect();
    let instrument_ref = match track.instrument {
        Instrument::Bass => match track.num_strings {
            s if s <= 4 => "e-bass4",
            5 => "e-bass5",
            _ => "e-bass6",
        },
        _ => "e-gtr6",
    };
    let color = match track.path {
        TrackPath::Lead => (255, 0, 0),
        TrackPath::Rhythm => (0, 160, 0),
        TrackPath::Bass => (0, 0, 255),
    };
    let short_name: String = track.name.chars().take(3).collect();
    GpifTrack {
        name: track.name.clone(),
        short_name,
        color,
        instrument_ref,
        tuning_midi,
        capo: track.capo,
    }
}

fn build_note(track: &Track, note: &Note) -> GpifNote {
    // GPIF strings are 1-based and count down from the highest pitch
    let string = u32::from(track.num_strings)
        .saturating_sub(u32::from(note.string))
        .max(1);
    let harmonic = if note.pinch_harmonic {
        Some("Pinch")
    } else if note.harmonic {
        Some("Natural")
    } else {
        None
    };
    let slide_flags = match note.slide {
        Slide::None => None,
        Slide::ToNext => Some(SLIDE_FLAG_SHIFT),
        Slide::UnpitchedUp => Some(SLIDE_FLAG_OUT_UP),
        Slide::UnpitchedDown => Some(SLIDE_FLAG_OUT_DOWN),
    };
    let bend_points = note
        .bend_values
        .iter()
        .map(|p| {
            (
                (p.offset * 100.0).round() as i32,
                (p.step * 100.0).round() as i32,
            )
        })
        .collect();
    GpifNote {
        string,
        fret: u32::from(note.fret),
        palm_muted: note.palm_muted,
        muted: note.muted,
        harmonic,
        slide_flags,
        left_fingering: (note.left_fingering >= 0).then_some(note.left_fingering as u32),
        accent: note.accent,
        hammer_on: note.hopo,
        tapped: note.tapped,
        vibrato: note.vibrato,
        bend_points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::song::{Bar, Chord, Note};
    use std::collections::BTreeMap;

    fn small_score(num_tracks: usize, num_bars: usize) -> Score {
        let mut score = Score {
            title: "T".to_string(),
            ..Default::default()
        };
        for t in 0..num_tracks {
            let mut bars = Vec::new();
            for b in 0..num_bars {
                let mut chords = Vec::new();
                if (t + b) % 2 == 0 {
                    let mut notes = BTreeMap::new();
                    notes.insert(
                        0u8,
                        Note {
                            fret: 3,
                            ..Default::default()
                        },
                    );
                    chords.push(Chord {
                        duration_ticks: 48,
                        notes,
                        ..Default::default()
                    });
                }
                bars.push(Bar {
                    start: b as f32,
                    end: (b + 1) as f32,
                    beat_times: vec![b as f32, (b + 1) as f32],
                    time_numerator: 4,
                    time_denominator: 4,
                    beats_per_minute: 120,
                    chords,
                });
            }
            score.tracks.push(crate::score::song::Track {
                name: format!("Track {t}"),
                instrument: crate::score::song::Instrument::Guitar,
                path: crate::score::song::TrackPath::Lead,
                bonus: false,
                num_strings: 6,
                tuning: [0; 6],
                capo: 0,
                chord_templates: BTreeMap::new(),
                bars,
                average_bpm: 120.0,
            });
        }
        score
    }

    #[test]
    fn test_from_ticks_thresholds() {
        assert_eq!(from_ticks(192), (NoteValue::Whole, 0));
        assert_eq!(from_ticks(150), (NoteValue::Half, 1));
        assert_eq!(from_ticks(96), (NoteValue::Half, 0));
        assert_eq!(from_ticks(72), (NoteValue::Quarter, 1));
        assert_eq!(from_ticks(48), (NoteValue::Quarter, 0));
        assert_eq!(from_ticks(36), (NoteValue::Eighth, 1));
        assert_eq!(from_ticks(24), (NoteValue::Eighth, 0));
        assert_eq!(from_ticks(18), (NoteValue::Sixteenth, 1));
        assert_eq!(from_ticks(12), (NoteValue::Sixteenth, 0));
        assert_eq!(from_ticks(8), (NoteValue::ThirtySecond, 0));
        assert_eq!(from_ticks(3), (NoteValue::SixtyFourth, 0));
    }

    #[test]
    fn test_master_bar_id_layout() {
        let doc = build_document(&small_score(2, 3));
        assert_eq!(doc.bars.len(), 6);
        assert_eq!(doc.master_bars.len(), 3);
        assert_eq!(doc.master_bars[0].bar_ids, vec![0, 3]);
        assert_eq!(doc.master_bars[2].bar_ids, vec![2, 5]);
        doc.validate().unwrap();
    }

    #[test]
    fn test_empty_bar_becomes_rest_beat() {
        let doc = build_document(&small_score(1, 2));
        // bar 1 of track 0 has no chords
        let rest_voice = &doc.voices[doc.bars[1].voice_ids[0]];
        assert_eq!(rest_voice.beat_ids.len(), 1);
        let beat = &doc.beats[rest_voice.beat_ids[0]];
        assert!(beat.note_ids.is_empty());
    }

    #[test]
    fn test_string_numbering_and_tuning_order() {
        let score = small_score(1, 1);
        let doc = build_document(&score);
        // internal string 0 is the lowest, GPIF string 6
        assert_eq!(doc.notes[0].string, 6);
        assert_eq!(doc.tracks[0].tuning_midi, vec![64, 59, 55, 50, 45, 40]);
    }

    #[test]
    fn test_validate_rejects_dangling_reference() {
        let mut doc = build_document(&small_score(1, 1));
        doc.beats[0].rhythm_id = 999;
        assert!(doc.validate().is_err());
    }
}
