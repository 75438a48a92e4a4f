//! Typed records for the Rocksmith 2014 SNG binary format.
//!
//! An SNG document is a fixed sequence of sections, each a 32-bit count
//! followed by that many records. Field layouts are little-endian and
//! fixed-width; strings are null-padded ASCII runs.

/// One event of the beat stream. A new measure starts wherever `measure`
/// is not -1; following events with -1 are further beats of that measure.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BeatEvent {
    pub time: f32,
    pub measure: i16,
    pub beat: i16,
    pub phrase_iteration: i32,
    pub mask: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Phrase {
    pub solo: u8,
    pub disparity: u8,
    pub ignore: u8,
    pub max_difficulty: i32,
    pub phrase_iteration_links: i32,
    pub name: String,
}

/// Chord shape shared by all uses of a chord id. Fret and finger bytes use
/// 0xFF for "string not part of the chord".
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChordTemplate {
    pub mask: u32,
    pub frets: [u8; 6],
    pub fingers: [u8; 6],
    pub notes: [i32; 6],
    pub name: String,
}

/// One point of a bend envelope.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BendValue {
    pub time: f32,
    pub step: f32,
}

/// Fixed 32-slot bend envelope for one string of a chord-note entry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BendTrack {
    pub points: Vec<BendValue>,
    pub used_count: i32,
}

/// Per-string articulation data attached to a chord via `chord_notes_id`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChordNotes {
    pub note_mask: [u32; 6],
    pub bends: Vec<BendTrack>,
    pub slide_to: [u8; 6],
    pub slide_unpitch_to: [u8; 6],
    pub vibrato: [i16; 6],
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Vocal {
    pub time: f32,
    pub note: i32,
    pub length: f32,
    pub lyric: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PhraseIteration {
    pub phrase_id: i32,
    pub start_time: f32,
    pub next_phrase_time: f32,
    pub difficulty: [i32; 3],
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NLinkedDifficulty {
    pub level_break: i32,
    pub phrases: Vec<i32>,
}

/// Timed name record, shared by the action and event sections.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimedEvent {
    pub time: f32,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ToneChange {
    pub time: f32,
    pub tone_id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DnaEvent {
    pub time: f32,
    pub dna_id: i32,
}

/// A labeled span of the song ("verse 1", "chorus", ...).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Section {
    pub name: String,
    pub number: i32,
    pub start_time: f32,
    pub end_time: f32,
    pub start_phrase_iteration: i32,
    pub end_phrase_iteration: i32,
}

/// Fret-hand anchor span within one difficulty level.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Anchor {
    pub start_time: f32,
    pub end_time: f32,
    pub fret: i8,
    pub width: i32,
    pub phrase_iteration: i32,
}

/// One note or chord event of a difficulty level.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NoteRecord {
    pub mask: u32,
    pub flags: u32,
    pub hash: u32,
    pub time: f32,
    pub string_index: i8,
    pub fret: i8,
    pub anchor_fret: i8,
    pub anchor_width: i8,
    pub chord_id: i32,
    pub chord_notes_id: i32,
    pub phrase_id: i32,
    pub phrase_iteration_id: i32,
    pub fingerprint_id: [i16; 2],
    pub next_iter_note: i16,
    pub prev_iter_note: i16,
    pub parent_prev_note: i16,
    pub slide_to: u8,
    pub slide_unpitch_to: u8,
    pub left_hand: u8,
    pub tap: u8,
    pub pick_direction: u8,
    pub slap: u8,
    pub pluck: u8,
    pub vibrato: i16,
    pub sustain: f32,
    pub max_bend: f32,
    pub bend_values: Vec<BendValue>,
}

/// One difficulty level of the arrangement, with its notes and phrase
/// statistics.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Arrangement {
    pub difficulty: i32,
    pub anchors: Vec<Anchor>,
    pub notes: Vec<NoteRecord>,
    pub average_notes_per_iteration: Vec<f32>,
    pub notes_in_iteration1: Vec<i32>,
    pub notes_in_iteration2: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Metadata {
    pub max_score: f64,
    pub max_notes_and_chords: f64,
    pub max_notes_and_chords_real: f64,
    pub points_per_note: f64,
    pub first_beat_length: f32,
    pub start_time: f32,
    pub capo_fret: u8,
    pub part: i16,
    pub song_length: f32,
    pub tuning: Vec<i16>,
    pub max_difficulty: i32,
}

/// Fully parsed SNG document in section order. Sections the converter never
/// reads by name (symbols, phrase extra info) are consumed positionally and
/// not materialized.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SngDocument {
    pub beats: Vec<BeatEvent>,
    pub phrases: Vec<Phrase>,
    pub chord_templates: Vec<ChordTemplate>,
    pub chord_notes: Vec<ChordNotes>,
    pub vocals: Vec<Vocal>,
    pub phrase_iterations: Vec<PhraseIteration>,
    pub linked_difficulties: Vec<NLinkedDifficulty>,
    pub actions: Vec<TimedEvent>,
    pub events: Vec<TimedEvent>,
    pub tones: Vec<ToneChange>,
    pub dnas: Vec<DnaEvent>,
    pub sections: Vec<Section>,
    pub arrangements: Vec<Arrangement>,
    pub metadata: Metadata,
}
