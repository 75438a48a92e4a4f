//! Builds the intermediate score from a parsed SNG document and its
//! manifest attributes.
//!
//! Bars come from the SNG beat stream, notes from the highest difficulty
//! level only. Raw chord durations are in ticks but still unquantized; the
//! rhythm detector runs afterwards.

use crate::error::ConvertError;
use crate::parser::manifest_parser::{Attributes2014, ARRANGEMENT_TYPE_BASS};
use crate::parser::sng_types::{
    Arrangement, BeatEvent, ChordNotes as SngChordNotes, NoteRecord, Section as SngSection,
    SngDocument,
};
use crate::score::song::{
    Bar, BendPoint, Chord, ChordTemplate, Instrument, Note, Slide, Track, TrackPath, DEFAULT_BPM,
    TICKS_PER_QUARTER,
};
use std::collections::BTreeMap;

// Note mask bits, single-note context unless noted otherwise.
const NOTE_MASK_CHORD: u32 = 0x0000_0002;
const NOTE_MASK_SLIDE: u32 = 0x0000_0004;
const NOTE_MASK_HARMONIC: u32 = 0x0000_0020;
const NOTE_MASK_PALM_MUTE: u32 = 0x0000_0040;
const NOTE_MASK_VIBRATO: u32 = 0x0000_0100;
const NOTE_MASK_HAMMER_ON: u32 = 0x0000_0200;
const NOTE_MASK_PULL_OFF: u32 = 0x0000_0400;
const NOTE_MASK_SLIDE_UNPITCHED: u32 = 0x0000_0800;
const NOTE_MASK_TREMOLO: u32 = 0x0000_2000;
const NOTE_MASK_ACCENT: u32 = 0x0000_4000;
const NOTE_MASK_LINK_NEXT: u32 = 0x0000_8000;
const NOTE_MASK_MUTE: u32 = 0x0002_0000;
// overloaded bit: pinch harmonic on single notes, pluck inside chord notes
const NOTE_MASK_PINCH_HARMONIC: u32 = 0x0004_0000;
const NOTE_MASK_SLAP: u32 = 0x0008_0000;
const NOTE_MASK_TAP: u32 = 0x0010_0000;

/// Sentinel for "fret/finger not set" in chord templates and technique bytes
const ABSENT: u8 = 0xFF;

/// A chord shorter than this is stretched to a hearable minimum.
const MIN_CHORD_DURATION: f32 = 0.01;

/// The overloaded 0x40000 bit reads differently depending on where the mask
/// came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MaskContext {
    SingleNote,
    ChordNote,
}

/// Arrangement-wide average tempo from the full beat stream.
pub fn average_bpm(beats: &[BeatEvent]) -> f32 {
    if beats.len() < 2 {
        return DEFAULT_BPM;
    }
    let span = beats[beats.len() - 1].time - beats[0].time;
    if span <= 0.0 {
        return DEFAULT_BPM;
    }
    60.0 * (beats.len() - 1) as f32 / span
}

/// Builds one score track from one arrangement's SNG document.
pub struct TrackBuilder<'a> {
    sng: &'a SngDocument,
    attrs: &'a Attributes2014,
}

impl<'a> TrackBuilder<'a> {
    pub const fn new(sng: &'a SngDocument, attrs: &'a Attributes2014) -> Self {
        Self { sng, attrs }
    }

    pub fn build(self) -> Result<Track, ConvertError> {
        let attrs = self.attrs;
        let metadata = &self.sng.metadata;

        let instrument = if attrs.arrangement_type == ARRANGEMENT_TYPE_BASS {
            Instrument::Bass
        } else {
            Instrument::Guitar
        };
        let path = match attrs.arrangement_type {
            0 => TrackPath::Lead,
            1 | 2 => TrackPath::Rhythm,
            3 => TrackPath::Bass,
            _ => TrackPath::Lead,
        };
        let num_strings = metadata.tuning.len().max(4).min(6) as u8;
        let mut tuning = [0i32; 6];
        for (slot, value) in tuning.iter_mut().zip(metadata.tuning.iter()) {
            *slot = i32::from(*value);
        }
        let capo = if metadata.capo_fret == ABSENT {
            0
        } else {
            metadata.capo_fret
        };

        let chord_templates = decode_chord_templates(self.sng);
        let bpm = average_bpm(&self.sng.beats);
        let mut bars = build_bars(self.sng, bpm);

        let level = self
            .sng
            .arrangements
            .iter()
            .max_by_key(|a| a.difficulty)
            .ok_or_else(|| {
                ConvertError::ParsingError("SNG has no difficulty levels".to_string())
            })?;
        log::debug!(
            "picked difficulty {} of {} levels ({} notes)",
            level.difficulty,
            self.sng.arrangements.len(),
            level.notes.len()
        );
        self.place_notes(&mut bars, level, &chord_templates);
        attach_sections(&mut bars, &self.sng.sections);

        Ok(Track {
            name: attrs.arrangement_name.clone(),
            instrument,
            path,
            bonus: attrs.is_bonus(),
            num_strings,
            tuning,
            capo,
            chord_templates,
            bars,
            average_bpm: bpm,
        })
    }

    /// Group the level's notes by start time and place each group as a
    /// chord into the bar that contains it. Groups outside every bar are
    /// dropped.
    fn place_notes(
        &self,
        bars: &mut [Bar],
        level: &Arrangement,
        templates: &BTreeMap<i32, ChordTemplate>,
    ) {
        let mut records: Vec<&NoteRecord> = level.notes.iter().collect();
        records.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(std::cmp::Ordering::Equal));

        let mut bar_index = 0usize;
        let mut group_start = 0usize;
        while group_start < records.len() {
            let time = records[group_start].time;
            let mut group_end = group_start + 1;
            while group_end < records.len() && records[group_end].time == time {
                group_end += 1;
            }
            let group = &records[group_start..group_end];
            group_start = group_end;

            while bar_index < bars.len() && time >= bars[bar_index].end {
                bar_index += 1;
            }
            let Some(bar) = bars.get(bar_index) else {
                log::debug!("dropping note group at {time}s past the last bar");
                continue;
            };
            if time < bar.start {
                log::debug!("dropping note group at {time}s before the first bar");
                continue;
            }

            let mut chord = self.build_chord(group, templates);
            let sustain = chord
                .notes
                .values()
                .map(|n| n.sustain)
                .fold(0.0f32, f32::max);
            chord.end = chord.start + sustain.max(MIN_CHORD_DURATION);
            chord.duration_ticks = (bar.duration_for(chord.start, chord.end - chord.start)
                * TICKS_PER_QUARTER as f32)
                .round() as u32;
            bars[bar_index].chords.push(chord);
        }
    }

    fn build_chord(&self, group: &[&NoteRecord], templates: &BTreeMap<i32, ChordTemplate>) -> Chord {
        let is_chord_group = group.len() >= 2
            || group.iter().any(|n| n.mask & NOTE_MASK_CHORD != 0)
            || group.iter().any(|n| n.chord_id != -1);
        let chord_record = group.iter().find(|n| n.chord_id >= 0);

        let mut chord = Chord {
            start: group[0].time,
            chord_id: chord_record.map_or(-1, |n| n.chord_id),
            ..Default::default()
        };

        let mut from_template = false;
        if is_chord_group {
            if let Some(record) = chord_record {
                if let Some(chord_notes) = usize::try_from(record.chord_notes_id)
                    .ok()
                    .and_then(|id| self.sng.chord_notes.get(id))
                {
                    let template = templates.get(&record.chord_id).cloned().unwrap_or(
                        ChordTemplate {
                            frets: [-1; 6],
                            fingers: [-1; 6],
                            ..Default::default()
                        },
                    );
                    for string in 0..6usize {
                        let mask = chord_notes.note_mask[string];
                        if template.frets[string] < 0 && mask == 0 {
                            continue;
                        }
                        let note =
                            decode_chord_note(string, mask, &template, chord_notes, record);
                        chord.notes.insert(note.string, note);
                    }
                    from_template = true;
                }
            }
        }
        if !from_template {
            for record in group {
                let note = decode_note(record);
                chord.notes.insert(note.string, note);
            }
        }

        // a single strummed chord record reads as a brush
        chord.brush = from_template && group.len() == 1 && chord.notes.len() >= 2;
        chord.slapped = chord.notes.values().any(|n| n.slapped);
        chord.popped = chord.notes.values().any(|n| n.popped);
        chord.tremolo = chord.notes.values().any(|n| n.tremolo);
        chord
    }
}

fn decode_chord_templates(sng: &SngDocument) -> BTreeMap<i32, ChordTemplate> {
    let mut templates = BTreeMap::new();
    for (id, raw) in sng.chord_templates.iter().enumerate() {
        let mut template = ChordTemplate {
            name: raw.name.clone(),
            ..Default::default()
        };
        for string in 0..6 {
            template.frets[string] = decode_template_byte(raw.frets[string]);
            template.fingers[string] = decode_template_byte(raw.fingers[string]);
        }
        templates.insert(id as i32, template);
    }
    templates
}

fn decode_template_byte(byte: u8) -> i32 {
    if byte == ABSENT {
        -1
    } else {
        i32::from(byte)
    }
}

/// Split the beat stream into bars at every event whose measure is set, and
/// guess each bar's time signature and tempo from its beat spacing.
fn build_bars(sng: &SngDocument, arrangement_bpm: f32) -> Vec<Bar> {
    let beats = &sng.beats;
    let starts: Vec<usize> = beats
        .iter()
        .enumerate()
        .filter(|(_, b)| b.measure != -1)
        .map(|(i, _)| i)
        .collect();

    let mut bars = Vec::with_capacity(starts.len());
    for (bar_number, &first) in starts.iter().enumerate() {
        let last = starts.get(bar_number + 1).copied().unwrap_or(beats.len());
        let start = beats[first].time;
        let end = if last < beats.len() {
            beats[last].time
        } else {
            sng.metadata.song_length.max(start)
        };
        let mut beat_times: Vec<f32> = beats[first..last].iter().map(|b| b.time).collect();
        beat_times.push(end);

        let numerator = (last - first).max(1) as u32;
        let delta = (end - start) / numerator as f32;
        let (denominator, bpm) = guess_time_signature(delta, arrangement_bpm);
        bars.push(Bar {
            start,
            end,
            beat_times,
            time_numerator: numerator,
            time_denominator: denominator,
            beats_per_minute: bpm,
            chords: vec![],
        });
    }
    bars
}

/// Decide between quarter- and eighth-note beats by which tempo reading
/// lands closer to the arrangement average.
fn guess_time_signature(beat_duration: f32, arrangement_bpm: f32) -> (u32, u32) {
    if beat_duration <= 0.0 {
        return (4, arrangement_bpm.round() as u32);
    }
    let as_quarters = 60.0 / beat_duration;
    let as_eighths = 30.0 / beat_duration;
    let denominator = if (arrangement_bpm - as_quarters).abs() < (arrangement_bpm - as_eighths).abs()
    {
        4
    } else {
        8
    };
    let bpm = ((4.0 / denominator as f32) * 60.0 / beat_duration).round() as u32;
    (denominator, bpm)
}

fn attach_sections(bars: &mut [Bar], sections: &[SngSection]) {
    for section in sections {
        'bars: for bar in bars.iter_mut() {
            for chord in bar.chords.iter_mut() {
                if chord.start >= section.start_time {
                    if chord.section.is_none() {
                        chord.section = Some(section.name.clone());
                    }
                    break 'bars;
                }
            }
        }
    }
}

fn technique_set(byte: u8) -> bool {
    byte != 0 && byte != ABSENT
}

fn apply_mask(note: &mut Note, mask: u32, context: MaskContext) {
    note.palm_muted = mask & NOTE_MASK_PALM_MUTE != 0;
    note.harmonic = mask & NOTE_MASK_HARMONIC != 0;
    note.vibrato = mask & NOTE_MASK_VIBRATO != 0;
    note.hopo = mask & (NOTE_MASK_HAMMER_ON | NOTE_MASK_PULL_OFF) != 0;
    note.tremolo = mask & NOTE_MASK_TREMOLO != 0;
    note.accent = mask & NOTE_MASK_ACCENT != 0;
    note.link_next = mask & NOTE_MASK_LINK_NEXT != 0;
    note.muted = mask & NOTE_MASK_MUTE != 0;
    note.slapped = mask & NOTE_MASK_SLAP != 0;
    note.tapped = mask & NOTE_MASK_TAP != 0;
    if context == MaskContext::SingleNote {
        note.pinch_harmonic = mask & NOTE_MASK_PINCH_HARMONIC != 0;
    }
}

/// Decode one standalone note record.
fn decode_note(record: &NoteRecord) -> Note {
    let mut note = Note {
        string: record.string_index.max(0) as u8,
        fret: record.fret.max(0) as u8,
        sustain: record.sustain.max(0.0),
        ..Default::default()
    };
    apply_mask(&mut note, record.mask, MaskContext::SingleNote);
    note.vibrato |= record.vibrato != 0;
    note.tapped |= technique_set(record.tap);
    note.slapped |= technique_set(record.slap);
    note.popped = technique_set(record.pluck);
    if technique_set(record.left_hand) {
        note.left_fingering = record.left_hand as i8;
    }
    decode_slide(
        &mut note,
        record.mask,
        record.slide_to,
        record.slide_unpitch_to,
    );
    note.bend_values = record
        .bend_values
        .iter()
        .filter(|p| p.time != 0.0)
        .map(|p| BendPoint {
            offset: (p.time - record.time).max(0.0),
            step: p.step,
        })
        .collect();
    note
}

/// Synthesize one string of a chord from its template and chord-note entry.
fn decode_chord_note(
    string: usize,
    mask: u32,
    template: &ChordTemplate,
    chord_notes: &SngChordNotes,
    record: &NoteRecord,
) -> Note {
    let fret = template.frets[string];
    let mut note = Note {
        string: string as u8,
        fret: fret.max(0) as u8,
        sustain: record.sustain.max(0.0),
        ..Default::default()
    };
    apply_mask(&mut note, mask, MaskContext::ChordNote);
    note.vibrato |= chord_notes.vibrato[string] != 0;
    let finger = template.fingers[string];
    if finger >= 0 {
        note.left_fingering = finger as i8;
    }
    decode_slide(
        &mut note,
        mask,
        chord_notes.slide_to[string],
        chord_notes.slide_unpitch_to[string],
    );
    if let Some(track) = chord_notes.bends.get(string) {
        note.bend_values = track
            .points
            .iter()
            .filter(|p| p.time != 0.0)
            .map(|p| BendPoint {
                offset: (p.time - record.time).max(0.0),
                step: p.step,
            })
            .collect();
    }
    note
}

fn decode_slide(note: &mut Note, mask: u32, slide_to: u8, slide_unpitch_to: u8) {
    if mask & NOTE_MASK_SLIDE != 0 && technique_set(slide_to) {
        note.slide = Slide::ToNext;
        note.slide_target = slide_to as i8;
    } else if mask & NOTE_MASK_SLIDE_UNPITCHED != 0 && technique_set(slide_unpitch_to) {
        note.slide = if slide_unpitch_to > note.fret {
            Slide::UnpitchedUp
        } else {
            Slide::UnpitchedDown
        };
        note.slide_target = slide_unpitch_to as i8;
    }
}
