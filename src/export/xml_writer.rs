//! Serializes a GPIF document to indented UTF-8 XML.

use crate::error::ConvertError;
use crate::export::gpif_builder::{GpifBeat, GpifDocument, GpifNote, GpifRhythm, GpifTrack};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

const GP_VERSION: &str = "6";

/// Validate all cross-references and serialize the document.
pub fn write_gpif(doc: &GpifDocument) -> Result<String, ConvertError> {
    doc.validate()?;
    let mut out = XmlOut::new();
    out.decl()?;
    out.start("GPIF")?;
    out.text_elem("GPVersion", GP_VERSION)?;
    write_score(&mut out, doc)?;
    write_master_track(&mut out, doc)?;
    write_tracks(&mut out, &doc.tracks)?;
    write_master_bars(&mut out, doc)?;
    write_bars(&mut out, doc)?;
    write_voices(&mut out, doc)?;
    write_beats(&mut out, &doc.beats)?;
    write_notes(&mut out, &doc.notes)?;
    write_rhythms(&mut out, &doc.rhythms)?;
    out.end("GPIF")?;
    out.finish()
}

fn write_score(out: &mut XmlOut, doc: &GpifDocument) -> Result<(), ConvertError> {
    out.start("Score")?;
    out.text_elem("Title", &doc.title)?;
    out.text_elem("Artist", &doc.artist)?;
    out.text_elem("Album", &doc.album)?;
    out.end("Score")
}

fn write_master_track(out: &mut XmlOut, doc: &GpifDocument) -> Result<(), ConvertError> {
    out.start("MasterTrack")?;
    let track_ids = join_ids(0..doc.tracks.len());
    out.text_elem("Tracks", &track_ids)?;
    out.start("Automations")?;
    out.start("Automation")?;
    out.text_elem("Type", "Tempo")?;
    out.text_elem("Linear", "false")?;
    out.text_elem("Bar", "0")?;
    out.text_elem("Position", "0")?;
    out.text_elem("Visible", "true")?;
    out.text_elem("Value", &format!("{} 2", doc.tempo))?;
    out.end("Automation")?;
    out.end("Automations")?;
    out.end("MasterTrack")
}

fn write_tracks(out: &mut XmlOut, tracks: &[GpifTrack]) -> Result<(), ConvertError> {
    out.start("Tracks")?;
    for (id, track) in tracks.iter().enumerate() {
        out.start_with("Track", &[("id", &id.to_string())])?;
        out.text_elem("Name", &track.name)?;
        out.text_elem("ShortName", &track.short_name)?;
        out.start("Color")?;
        out.text_elem("Red", &track.color.0.to_string())?;
        out.text_elem("Green", &track.color.1.to_string())?;
        out.text_elem("Blue", &track.color.2.to_string())?;
        out.end("Color")?;
        out.empty_with("InstrumentRef", &[("ref", track.instrument_ref)])?;
        let midi = track
            .tuning_midi
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        out.empty_with("Tuning", &[("midi", &midi)])?;
        out.text_elem("Capo", &track.capo.to_string())?;
        out.end("Track")?;
    }
    out.end("Tracks")
}

fn write_master_bars(out: &mut XmlOut, doc: &GpifDocument) -> Result<(), ConvertError> {
    out.start("MasterBars")?;
    for master_bar in &doc.master_bars {
        out.start("MasterBar")?;
        out.text_elem(
            "Time",
            &format!("{}/{}", master_bar.numerator, master_bar.denominator),
        )?;
        out.text_elem("Bars", &join_ids(master_bar.bar_ids.iter().copied()))?;
        out.end("MasterBar")?;
    }
    out.end("MasterBars")
}

fn write_bars(out: &mut XmlOut, doc: &GpifDocument) -> Result<(), ConvertError> {
    out.start("Bars")?;
    for (id, bar) in doc.bars.iter().enumerate() {
        out.start_with("Bar", &[("id", &id.to_string())])?;
        out.text_elem("Voices", &join_ids(bar.voice_ids.iter().copied()))?;
        out.end("Bar")?;
    }
    out.end("Bars")
}

fn write_voices(out: &mut XmlOut, doc: &GpifDocument) -> Result<(), ConvertError> {
    out.start("Voices")?;
    for (id, voice) in doc.voices.iter().enumerate() {
        out.start_with("Voice", &[("id", &id.to_string())])?;
        out.text_elem("Beats", &join_ids(voice.beat_ids.iter().copied()))?;
        out.end("Voice")?;
    }
    out.end("Voices")
}

fn write_beats(out: &mut XmlOut, beats: &[GpifBeat]) -> Result<(), ConvertError> {
    out.start("Beats")?;
    for (id, beat) in beats.iter().enumerate() {
        out.start_with("Beat", &[("id", &id.to_string())])?;
        out.text_elem("Rhythm", &beat.rhythm_id.to_string())?;
        if !beat.note_ids.is_empty() {
            out.text_elem("Notes", &join_ids(beat.note_ids.iter().copied()))?;
        }
        if let Some(chord_id) = beat.chord_id {
            out.text_elem("Chord", &chord_id.to_string())?;
        }
        out.end("Beat")?;
    }
    out.end("Beats")
}

fn write_notes(out: &mut XmlOut, notes: &[GpifNote]) -> Result<(), ConvertError> {
    out.start("Notes")?;
    for (id, note) in notes.iter().enumerate() {
        out.start_with("Note", &[("id", &id.to_string())])?;
        write_note_properties(out, note)?;
        if note.accent {
            out.empty("Accent")?;
        }
        if note.hammer_on {
            out.empty("HammerOn")?;
        }
        if note.tapped {
            out.empty("Tapping")?;
        }
        if note.vibrato {
            out.empty("Vibrato")?;
        }
        out.end("Note")?;
    }
    out.end("Notes")
}

fn write_note_properties(out: &mut XmlOut, note: &GpifNote) -> Result<(), ConvertError> {
    out.start("Properties")?;
    number_property(out, "String", note.string)?;
    number_property(out, "Fret", note.fret)?;
    if note.palm_muted {
        enable_property(out, "PalmMuted")?;
    }
    if note.muted {
        enable_property(out, "Muted")?;
    }
    if let Some(kind) = note.harmonic {
        out.start_with("Property", &[("name", "HarmonicType")])?;
        out.text_elem("HType", kind)?;
        out.end("Property")?;
    }
    if let Some(flags) = note.slide_flags {
        out.start_with("Property", &[("name", "Slide")])?;
        out.text_elem("Flags", &flags.to_string())?;
        out.end("Property")?;
    }
    if !note.bend_points.is_empty() {
        out.start_with("Property", &[("name", "Bend")])?;
        for (time, value) in &note.bend_points {
            out.empty_with(
                "Point",
                &[("time", &time.to_string()), ("value", &value.to_string())],
            )?;
        }
        out.end("Property")?;
    }
    if let Some(finger) = note.left_fingering {
        number_property(out, "LeftFingering", finger)?;
    }
    out.end("Properties")
}

fn number_property(out: &mut XmlOut, name: &str, value: u32) -> Result<(), ConvertError> {
    out.start_with("Property", &[("name", name)])?;
    out.text_elem("Number", &value.to_string())?;
    out.end("Property")
}

fn enable_property(out: &mut XmlOut, name: &str) -> Result<(), ConvertError> {
    out.start_with("Property", &[("name", name)])?;
    out.empty("Enable")?;
    out.end("Property")
}

fn write_rhythms(out: &mut XmlOut, rhythms: &[GpifRhythm]) -> Result<(), ConvertError> {
    out.start("Rhythms")?;
    for (id, rhythm) in rhythms.iter().enumerate() {
        out.start_with("Rhythm", &[("id", &id.to_string())])?;
        out.text_elem("NoteValue", rhythm.value.name())?;
        if rhythm.dots > 0 {
            out.text_elem("AugmentationDot", &rhythm.dots.to_string())?;
        }
        out.end("Rhythm")?;
    }
    out.end("Rhythms")
}

fn join_ids(ids: impl Iterator<Item = usize>) -> String {
    ids.map(|id| id.to_string()).collect::<Vec<_>>().join(" ")
}

/// Thin wrapper over the quick-xml writer with two-space indentation and
/// crate-local error mapping.
struct XmlOut {
    writer: Writer<Vec<u8>>,
}

impl XmlOut {
    fn new() -> Self {
        XmlOut {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn decl(&mut self) -> Result<(), ConvertError> {
        self.write(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
    }

    fn start(&mut self, name: &str) -> Result<(), ConvertError> {
        self.write(Event::Start(BytesStart::new(name)))
    }

    fn start_with(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), ConvertError> {
        let mut element = BytesStart::new(name);
        for &(key, value) in attrs {
            element.push_attribute((key, value));
        }
        self.write(Event::Start(element))
    }

    fn end(&mut self, name: &str) -> Result<(), ConvertError> {
        self.write(Event::End(BytesEnd::new(name)))
    }

    fn empty(&mut self, name: &str) -> Result<(), ConvertError> {
        self.write(Event::Empty(BytesStart::new(name)))
    }

    fn empty_with(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), ConvertError> {
        let mut element = BytesStart::new(name);
        for &(key, value) in attrs {
            element.push_attribute((key, value));
        }
        self.write(Event::Empty(element))
    }

    fn text_elem(&mut self, name: &str, text: &str) -> Result<(), ConvertError> {
        self.start(name)?;
        self.write(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    fn write(&mut self, event: Event) -> Result<(), ConvertError> {
        self.writer
            .write_event(event)
            .map_err(|e| ConvertError::ParsingError(format!("writing XML: {e}")))
    }

    fn finish(self) -> Result<String, ConvertError> {
        String::from_utf8(self.writer.into_inner())
            .map_err(|e| ConvertError::ParsingError(format!("XML is not UTF-8: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::gpif_builder::build_document;
    use crate::score::song::{Bar, Chord, Instrument, Note, Score, Track, TrackPath};
    use std::collections::BTreeMap;

    fn one_note_score() -> Score {
        let mut notes = BTreeMap::new();
        notes.insert(
            0u8,
            Note {
                fret: 3,
                hopo: true,
                ..Default::default()
            },
        );
        Score {
            title: "My <Song>".to_string(),
            artist: "Artist & Co".to_string(),
            album: "Album".to_string(),
            year: 2001,
            tracks: vec![Track {
                name: "Lead".to_string(),
                instrument: Instrument::Guitar,
                path: TrackPath::Lead,
                bonus: false,
                num_strings: 6,
                tuning: [0; 6],
                capo: 0,
                chord_templates: BTreeMap::new(),
                bars: vec![Bar {
                    start: 0.0,
                    end: 2.0,
                    beat_times: vec![0.0, 0.5, 1.0, 1.5, 2.0],
                    time_numerator: 4,
                    time_denominator: 4,
                    beats_per_minute: 120,
                    chords: vec![Chord {
                        duration_ticks: 96,
                        notes,
                        ..Default::default()
                    }],
                }],
                average_bpm: 120.0,
            }],
        }
    }

    #[test]
    fn test_xml_shape() {
        let doc = build_document(&one_note_score());
        let xml = write_gpif(&doc).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<GPIF>"));
        assert!(xml.contains("<Title>My &lt;Song&gt;</Title>"));
        assert!(xml.contains("<Artist>Artist &amp; Co</Artist>"));
        assert!(xml.contains("<Type>Tempo</Type>"));
        assert!(xml.contains("<Time>4/4</Time>"));
        assert!(xml.contains("<Track id=\"0\">"));
        assert!(xml.contains("<Tuning midi=\"64 59 55 50 45 40\"/>"));
        assert!(xml.contains("<Property name=\"String\">"));
        assert!(xml.contains("<HammerOn/>"));
        assert!(xml.contains("<NoteValue>Half</NoteValue>"));
        // indentation present
        assert!(xml.contains("\n  <Score>"));
    }

    #[test]
    fn test_rest_beat_has_no_notes_element() {
        let mut score = one_note_score();
        score.tracks[0].bars[0].chords.clear();
        let doc = build_document(&score);
        let xml = write_gpif(&doc).unwrap();
        let beats = &xml[xml.find("<Beats>").unwrap()..xml.find("</Beats>").unwrap()];
        assert!(!beats.contains("<Notes>"));
        assert!(xml.contains("<NoteValue>Whole</NoteValue>"));
    }

    #[test]
    fn test_invalid_document_is_rejected() {
        let mut doc = build_document(&one_note_score());
        doc.voices[0].beat_ids.push(42);
        assert!(write_gpif(&doc).is_err());
    }
}
