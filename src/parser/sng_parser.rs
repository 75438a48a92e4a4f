//! Rocksmith 2014 SNG reader: envelope decryption, zlib inflation and the
//! typed structural parse of the section stream.
//!
//! Sections appear in a fixed order, each a 32-bit count followed by that
//! many records. All integers are little-endian. The parse is strict about
//! section boundaries; a short read anywhere is fatal.

use crate::error::ConvertError;
use crate::parser::crypto::{counter_keystream_apply, SNG_MAC_KEY, SNG_PC_KEY};
use crate::parser::primitive_parser::parse_fixed_string;
use crate::parser::sng_types::{
    Anchor, Arrangement, BeatEvent, BendTrack, BendValue, ChordNotes, ChordTemplate, DnaEvent,
    Metadata, NLinkedDifficulty, NoteRecord, Phrase, PhraseIteration, Section, SngDocument,
    TimedEvent, ToneChange, Vocal,
};
use flate2::read::ZlibDecoder;
use nom::bytes::complete::take;
use nom::combinator::map;
use nom::multi::count;
use nom::number::complete::{le_f32, le_f64, le_i16, le_i32, le_i8, le_u32, le_u8};
use nom::{IResult, Parser};
use std::io::Read;

/// Platform whose key encrypted the SNG payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Pc,
    Mac,
}

const SNG_MAGIC_BYTE: u8 = 0x4A;
const SNG_HEADER_SIZE: usize = 24; // magic + platform flags + 16-byte IV
const ZLIB_MAGIC_BYTE: u8 = 0x78;

const SYMBOLS_HEADER_SIZE: usize = 32;
const SYMBOLS_TEXTURE_SIZE: usize = 144;
const SYMBOL_DEFINITION_SIZE: usize = 44;
const PHRASE_EXTRA_INFO_SIZE: usize = 16;
const ANCHOR_EXTENSION_SIZE: usize = 12;
const FINGERPRINT_SIZE: usize = 20;
const BEND_SLOTS_PER_STRING: usize = 32;

/// Decrypt and inflate an SNG asset, then parse its sections.
///
/// With `platform` unset the PC key is tried first and the Mac key is used
/// when the decrypted payload does not carry the zlib magic.
pub fn parse_sng(data: &[u8], platform: Option<Platform>) -> Result<SngDocument, ConvertError> {
    let envelope = decrypt_sng(data, platform)?;
    let plain = inflate_payload(&envelope)?;
    parse_sng_plain(&plain)
}

/// Strip and decrypt the SNG envelope, returning the compressed payload
/// (size pair + zlib stream). A buffer without the magic byte is returned
/// unchanged and treated as unencrypted.
pub fn decrypt_sng(data: &[u8], platform: Option<Platform>) -> Result<Vec<u8>, ConvertError> {
    if data.len() < SNG_HEADER_SIZE {
        return Err(ConvertError::UnexpectedEof(
            "reading SNG envelope".to_string(),
        ));
    }
    let magic = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    if magic & 0xFF != u32::from(SNG_MAGIC_BYTE) {
        log::debug!("no SNG magic, assuming unencrypted payload");
        return Ok(data.to_vec());
    }
    // platform flags at 4..8 are read and discarded
    let mut iv = [0u8; 16];
    iv.copy_from_slice(&data[8..SNG_HEADER_SIZE]);
    let payload = &data[SNG_HEADER_SIZE..];

    let decrypt = |key: &[u8; 32]| -> Vec<u8> {
        let mut buffer = payload.to_vec();
        counter_keystream_apply(key, &iv, &mut buffer);
        buffer
    };
    let decrypted = match platform {
        Some(Platform::Pc) => decrypt(&SNG_PC_KEY),
        Some(Platform::Mac) => decrypt(&SNG_MAC_KEY),
        None => {
            let attempt = decrypt(&SNG_PC_KEY);
            if attempt.get(8) == Some(&ZLIB_MAGIC_BYTE) {
                attempt
            } else {
                log::debug!("PC key did not produce a zlib stream, trying Mac key");
                decrypt(&SNG_MAC_KEY)
            }
        }
    };
    Ok(decrypted)
}

/// Inflate the decrypted payload: advisory uncompressed size, compressed
/// size, then the zlib stream itself.
fn inflate_payload(payload: &[u8]) -> Result<Vec<u8>, ConvertError> {
    if payload.len() < 8 {
        return Err(ConvertError::UnexpectedEof(
            "reading SNG size header".to_string(),
        ));
    }
    let uncompressed =
        u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;
    let compressed = u32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]) as usize;
    let stream = &payload[8..];
    let stream = &stream[..compressed.min(stream.len())];
    let mut decoder = ZlibDecoder::new(stream);
    let mut plain = Vec::with_capacity(uncompressed);
    decoder
        .read_to_end(&mut plain)
        .map_err(|e| ConvertError::ParsingError(format!("inflating SNG payload: {e}")))?;
    if plain.len() != uncompressed {
        log::warn!(
            "SNG advisory size {} does not match inflated size {}",
            uncompressed,
            plain.len()
        );
    }
    Ok(plain)
}

/// Parse an already-decrypted, already-inflated SNG section stream.
pub fn parse_sng_plain(data: &[u8]) -> Result<SngDocument, ConvertError> {
    match parse_document(data) {
        Ok((_rest, doc)) => Ok(doc),
        Err(nom::Err::Incomplete(_)) => Err(ConvertError::UnexpectedEof(
            "parsing SNG sections".to_string(),
        )),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => {
            if e.code == nom::error::ErrorKind::Eof {
                Err(ConvertError::UnexpectedEof(
                    "parsing SNG sections".to_string(),
                ))
            } else {
                Err(ConvertError::ParsingError(format!(
                    "SNG structure: {:?}",
                    e.code
                )))
            }
        }
    }
}

fn parse_document(i: &[u8]) -> IResult<&[u8], SngDocument> {
    let (i, beats) = parse_records(i, parse_beat, "beat")?;
    let (i, phrases) = parse_records(i, parse_phrase, "phrase")?;
    let (i, chord_templates) = parse_records(i, parse_chord_template, "chord template")?;
    let (i, chord_notes) = parse_records(i, parse_chord_notes, "chord notes")?;
    let (i, vocals) = parse_records(i, parse_vocal, "vocal")?;
    let (i, _) = parse_skip_records(i, SYMBOLS_HEADER_SIZE, "symbols header")?;
    let (i, _) = parse_skip_records(i, SYMBOLS_TEXTURE_SIZE, "symbols texture")?;
    let (i, _) = parse_skip_records(i, SYMBOL_DEFINITION_SIZE, "symbol definition")?;
    let (i, phrase_iterations) = parse_records(i, parse_phrase_iteration, "phrase iteration")?;
    let (i, _) = parse_skip_records(i, PHRASE_EXTRA_INFO_SIZE, "phrase extra info")?;
    let (i, linked_difficulties) =
        parse_records(i, parse_nlinked_difficulty, "linked difficulty")?;
    let (i, actions) = parse_records(i, parse_timed_event, "action")?;
    let (i, events) = parse_records(i, parse_timed_event, "event")?;
    let (i, tones) = parse_records(i, parse_tone, "tone")?;
    let (i, dnas) = parse_records(i, parse_dna, "dna")?;
    let (i, sections) = parse_records(i, parse_section, "section")?;
    let (i, arrangements) = parse_records(i, parse_arrangement, "arrangement")?;
    let (i, metadata) = parse_metadata(i)?;
    Ok((
        i,
        SngDocument {
            beats,
            phrases,
            chord_templates,
            chord_notes,
            vocals,
            phrase_iterations,
            linked_difficulties,
            actions,
            events,
            tones,
            dnas,
            sections,
            arrangements,
            metadata,
        },
    ))
}

/// Parse a count-prefixed run of fixed-layout records.
fn parse_records<'a, T>(
    i: &'a [u8],
    record: fn(&'a [u8]) -> IResult<&'a [u8], T>,
    what: &'static str,
) -> IResult<&'a [u8], Vec<T>> {
    let (i, n) = le_u32(i)?;
    log::debug!("parsing {n} {what} records");
    count(record, n as usize).parse(i)
}

/// Consume a count-prefixed section whose record bodies are not needed.
fn parse_skip_records<'a>(i: &'a [u8], record_size: usize, what: &'static str) -> IResult<&'a [u8], ()> {
    let (i, n) = le_u32(i)?;
    log::debug!("skipping {n} {what} records");
    let (i, _) = take((n as usize).saturating_mul(record_size))(i)?;
    Ok((i, ()))
}

fn parse_u8_array<const N: usize>(i: &[u8]) -> IResult<&[u8], [u8; N]> {
    map(take(N), |bytes: &[u8]| {
        let mut array = [0u8; N];
        array.copy_from_slice(bytes);
        array
    })
    .parse(i)
}

fn parse_i16_array<const N: usize>(i: &[u8]) -> IResult<&[u8], [i16; N]> {
    let mut array = [0i16; N];
    let mut rest = i;
    for slot in array.iter_mut() {
        let (next, value) = le_i16(rest)?;
        *slot = value;
        rest = next;
    }
    Ok((rest, array))
}

fn parse_i32_array<const N: usize>(i: &[u8]) -> IResult<&[u8], [i32; N]> {
    let mut array = [0i32; N];
    let mut rest = i;
    for slot in array.iter_mut() {
        let (next, value) = le_i32(rest)?;
        *slot = value;
        rest = next;
    }
    Ok((rest, array))
}

fn parse_u32_array<const N: usize>(i: &[u8]) -> IResult<&[u8], [u32; N]> {
    let mut array = [0u32; N];
    let mut rest = i;
    for slot in array.iter_mut() {
        let (next, value) = le_u32(rest)?;
        *slot = value;
        rest = next;
    }
    Ok((rest, array))
}

fn parse_beat(i: &[u8]) -> IResult<&[u8], BeatEvent> {
    map(
        (le_f32, le_i16, le_i16, le_i32, le_u32),
        |(time, measure, beat, phrase_iteration, mask)| BeatEvent {
            time,
            measure,
            beat,
            phrase_iteration,
            mask,
        },
    )
    .parse(i)
}

fn parse_phrase(i: &[u8]) -> IResult<&[u8], Phrase> {
    map(
        (
            le_u8,
            le_u8,
            le_u8,
            le_u8, // padding
            le_i32,
            le_i32,
            parse_fixed_string(32),
        ),
        |(solo, disparity, ignore, _padding, max_difficulty, phrase_iteration_links, name)| {
            Phrase {
                solo,
                disparity,
                ignore,
                max_difficulty,
                phrase_iteration_links,
                name,
            }
        },
    )
    .parse(i)
}

fn parse_chord_template(i: &[u8]) -> IResult<&[u8], ChordTemplate> {
    map(
        (
            le_u32,
            parse_u8_array::<6>,
            parse_u8_array::<6>,
            parse_i32_array::<6>,
            parse_fixed_string(32),
        ),
        |(mask, frets, fingers, notes, name)| ChordTemplate {
            mask,
            frets,
            fingers,
            notes,
            name,
        },
    )
    .parse(i)
}

fn parse_bend_value(i: &[u8]) -> IResult<&[u8], BendValue> {
    map(
        (le_f32, le_f32, le_i16, le_u8, le_u8),
        |(time, step, _unk3, _unk4, _unk5)| BendValue { time, step },
    )
    .parse(i)
}

fn parse_bend_track(i: &[u8]) -> IResult<&[u8], BendTrack> {
    let (i, points) = count(parse_bend_value, BEND_SLOTS_PER_STRING).parse(i)?;
    let (i, used_count) = le_i32(i)?;
    Ok((i, BendTrack { points, used_count }))
}

fn parse_chord_notes(i: &[u8]) -> IResult<&[u8], ChordNotes> {
    let (i, note_mask) = parse_u32_array::<6>(i)?;
    let (i, bends) = count(parse_bend_track, 6).parse(i)?;
    let (i, slide_to) = parse_u8_array::<6>(i)?;
    let (i, slide_unpitch_to) = parse_u8_array::<6>(i)?;
    let (i, vibrato) = parse_i16_array::<6>(i)?;
    Ok((
        i,
        ChordNotes {
            note_mask,
            bends,
            slide_to,
            slide_unpitch_to,
            vibrato,
        },
    ))
}

fn parse_vocal(i: &[u8]) -> IResult<&[u8], Vocal> {
    map(
        (le_f32, le_i32, le_f32, parse_fixed_string(48)),
        |(time, note, length, lyric)| Vocal {
            time,
            note,
            length,
            lyric,
        },
    )
    .parse(i)
}

fn parse_phrase_iteration(i: &[u8]) -> IResult<&[u8], PhraseIteration> {
    map(
        (le_i32, le_f32, le_f32, parse_i32_array::<3>),
        |(phrase_id, start_time, next_phrase_time, difficulty)| PhraseIteration {
            phrase_id,
            start_time,
            next_phrase_time,
            difficulty,
        },
    )
    .parse(i)
}

fn parse_nlinked_difficulty(i: &[u8]) -> IResult<&[u8], NLinkedDifficulty> {
    let (i, level_break) = le_i32(i)?;
    let (i, phrase_count) = le_u32(i)?;
    let (i, phrases) = count(le_i32, phrase_count as usize).parse(i)?;
    Ok((
        i,
        NLinkedDifficulty {
            level_break,
            phrases,
        },
    ))
}

fn parse_timed_event(i: &[u8]) -> IResult<&[u8], TimedEvent> {
    map((le_f32, parse_fixed_string(256)), |(time, name)| {
        TimedEvent { time, name }
    })
    .parse(i)
}

fn parse_tone(i: &[u8]) -> IResult<&[u8], ToneChange> {
    map((le_f32, le_i32), |(time, tone_id)| ToneChange {
        time,
        tone_id,
    })
    .parse(i)
}

fn parse_dna(i: &[u8]) -> IResult<&[u8], DnaEvent> {
    map((le_f32, le_i32), |(time, dna_id)| DnaEvent { time, dna_id }).parse(i)
}

fn parse_section(i: &[u8]) -> IResult<&[u8], Section> {
    let (i, name) = parse_fixed_string(32)(i)?;
    let (i, (number, start_time, end_time, start_phrase_iteration, end_phrase_iteration)) =
        (le_i32, le_f32, le_f32, le_i32, le_i32).parse(i)?;
    let (i, _string_mask) = take(36usize)(i)?;
    Ok((
        i,
        Section {
            name,
            number,
            start_time,
            end_time,
            start_phrase_iteration,
            end_phrase_iteration,
        },
    ))
}

fn parse_anchor(i: &[u8]) -> IResult<&[u8], Anchor> {
    let (i, (start_time, end_time, _first_note_time, _last_note_time)) =
        (le_f32, le_f32, le_f32, le_f32).parse(i)?;
    let (i, fret) = le_i8(i)?;
    let (i, _padding) = take(3usize)(i)?;
    let (i, (width, phrase_iteration)) = (le_i32, le_i32).parse(i)?;
    Ok((
        i,
        Anchor {
            start_time,
            end_time,
            fret,
            width,
            phrase_iteration,
        },
    ))
}

fn parse_note(i: &[u8]) -> IResult<&[u8], NoteRecord> {
    let (i, (mask, flags, hash, time)) = (le_u32, le_u32, le_u32, le_f32).parse(i)?;
    let (i, (string_index, fret, anchor_fret, anchor_width)) =
        (le_i8, le_i8, le_i8, le_i8).parse(i)?;
    let (i, (chord_id, chord_notes_id, phrase_id, phrase_iteration_id)) =
        (le_i32, le_i32, le_i32, le_i32).parse(i)?;
    let (i, fingerprint_id) = parse_i16_array::<2>(i)?;
    let (i, (next_iter_note, prev_iter_note, parent_prev_note)) =
        (le_i16, le_i16, le_i16).parse(i)?;
    let (i, (slide_to, slide_unpitch_to, left_hand, tap)) = (le_u8, le_u8, le_u8, le_u8).parse(i)?;
    let (i, (pick_direction, slap, pluck)) = (le_u8, le_u8, le_u8).parse(i)?;
    let (i, (vibrato, sustain, max_bend)) = (le_i16, le_f32, le_f32).parse(i)?;
    let (i, bend_count) = le_u32(i)?;
    let (i, bend_values) = count(parse_bend_value, bend_count as usize).parse(i)?;
    Ok((
        i,
        NoteRecord {
            mask,
            flags,
            hash,
            time,
            string_index,
            fret,
            anchor_fret,
            anchor_width,
            chord_id,
            chord_notes_id,
            phrase_id,
            phrase_iteration_id,
            fingerprint_id,
            next_iter_note,
            prev_iter_note,
            parent_prev_note,
            slide_to,
            slide_unpitch_to,
            left_hand,
            tap,
            pick_direction,
            slap,
            pluck,
            vibrato,
            sustain,
            max_bend,
            bend_values,
        },
    ))
}

/// One difficulty level: anchors, fingerprint spans, notes and phrase
/// statistics. Fingerprints and anchor extensions are consumed positionally.
fn parse_arrangement(i: &[u8]) -> IResult<&[u8], Arrangement> {
    let (i, difficulty) = le_i32(i)?;
    let (i, anchors) = parse_records(i, parse_anchor, "anchor")?;
    let (i, _) = parse_skip_records(i, ANCHOR_EXTENSION_SIZE, "anchor extension")?;
    let (i, _) = parse_skip_records(i, FINGERPRINT_SIZE, "fingerprint")?;
    let (i, _) = parse_skip_records(i, FINGERPRINT_SIZE, "arpeggio fingerprint")?;
    let (i, notes) = parse_records(i, parse_note, "note")?;
    let (i, average_notes_per_iteration) = parse_records(i, le_f32, "average note count")?;
    let (i, notes_in_iteration1) = parse_records(i, le_i32, "iteration note count")?;
    let (i, notes_in_iteration2) = parse_records(i, le_i32, "ignored-note count")?;
    Ok((
        i,
        Arrangement {
            difficulty,
            anchors,
            notes,
            average_notes_per_iteration,
            notes_in_iteration1,
            notes_in_iteration2,
        },
    ))
}

fn parse_metadata(i: &[u8]) -> IResult<&[u8], Metadata> {
    let (i, (max_score, max_notes_and_chords, max_notes_and_chords_real, points_per_note)) =
        (le_f64, le_f64, le_f64, le_f64).parse(i)?;
    let (i, (first_beat_length, start_time)) = (le_f32, le_f32).parse(i)?;
    let (i, capo_fret) = le_u8(i)?;
    let (i, _last_conversion_date) = take(32usize)(i)?;
    let (i, part) = le_i16(i)?;
    let (i, song_length) = le_f32(i)?;
    let (i, string_count) = le_u32(i)?;
    let (i, tuning) = count(le_i16, string_count as usize).parse(i)?;
    let (i, (_first_note_time, _first_note_time2)) = (le_f32, le_f32).parse(i)?;
    let (i, max_difficulty) = le_i32(i)?;
    Ok((
        i,
        Metadata {
            max_score,
            max_notes_and_chords,
            max_notes_and_chords_real,
            points_per_note,
            first_beat_length,
            start_time,
            capo_fret,
            part,
            song_length,
            tuning,
            max_difficulty,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn push_f32(out: &mut Vec<u8>, v: f32) {
        out.extend_from_slice(&v.to_le_bytes());
    }
    fn push_i32(out: &mut Vec<u8>, v: i32) {
        out.extend_from_slice(&v.to_le_bytes());
    }
    fn push_u32(out: &mut Vec<u8>, v: u32) {
        out.extend_from_slice(&v.to_le_bytes());
    }
    fn push_i16(out: &mut Vec<u8>, v: i16) {
        out.extend_from_slice(&v.to_le_bytes());
    }
    fn push_name(out: &mut Vec<u8>, name: &str, width: usize) {
        let mut field = vec![0u8; width];
        field[..name.len()].copy_from_slice(name.as_bytes());
        out.extend_from_slice(&field);
    }

    fn empty_section(out: &mut Vec<u8>) {
        push_u32(out, 0);
    }

    /// Serialize a minimal but complete section stream: one beat, one
    /// phrase, one single-note arrangement, metadata.
    fn minimal_sng_plain() -> Vec<u8> {
        let mut out = Vec::new();
        // beats
        push_u32(&mut out, 1);
        push_f32(&mut out, 10.0);
        push_i16(&mut out, 0); // measure
        push_i16(&mut out, 0); // beat
        push_i32(&mut out, 0); // phrase iteration
        push_u32(&mut out, 1); // mask
        // phrases
        push_u32(&mut out, 1);
        out.extend_from_slice(&[0, 0, 0, 0]); // solo, disparity, ignore, padding
        push_i32(&mut out, 0); // max difficulty
        push_i32(&mut out, 1); // iteration links
        push_name(&mut out, "intro", 32);
        // chords, chord notes, vocals
        empty_section(&mut out);
        empty_section(&mut out);
        empty_section(&mut out);
        // symbols header/texture/definition
        empty_section(&mut out);
        empty_section(&mut out);
        empty_section(&mut out);
        // phrase iterations, phrase extra info, linked difficulties
        empty_section(&mut out);
        empty_section(&mut out);
        empty_section(&mut out);
        // actions, events, tones, dnas, sections
        empty_section(&mut out);
        empty_section(&mut out);
        empty_section(&mut out);
        empty_section(&mut out);
        empty_section(&mut out);
        // arrangements
        push_u32(&mut out, 1);
        push_i32(&mut out, 0); // difficulty
        empty_section(&mut out); // anchors
        empty_section(&mut out); // anchor extensions
        empty_section(&mut out); // fingerprints
        empty_section(&mut out); // arpeggio fingerprints
        push_u32(&mut out, 1); // notes
        write_note(&mut out);
        empty_section(&mut out); // averages
        empty_section(&mut out); // iteration counts 1
        empty_section(&mut out); // iteration counts 2
        // metadata
        out.extend_from_slice(&0f64.to_le_bytes());
        out.extend_from_slice(&0f64.to_le_bytes());
        out.extend_from_slice(&0f64.to_le_bytes());
        out.extend_from_slice(&0f64.to_le_bytes());
        push_f32(&mut out, 0.5); // first beat length
        push_f32(&mut out, 10.0); // start time
        out.push(0xFF); // capo
        out.extend_from_slice(&[0u8; 32]); // conversion date
        push_i16(&mut out, 1); // part
        push_f32(&mut out, 120.0); // song length
        push_u32(&mut out, 6); // string count
        for _ in 0..6 {
            push_i16(&mut out, 0);
        }
        push_f32(&mut out, 10.0);
        push_f32(&mut out, 10.0);
        push_i32(&mut out, 0); // max difficulty
        out
    }

    fn write_note(out: &mut Vec<u8>) {
        push_u32(out, 0x0000_0200); // hammer-on
        push_u32(out, 0); // flags
        push_u32(out, 0xDEAD); // hash
        push_f32(out, 10.0); // time
        out.extend_from_slice(&[2, 5, 0, 4]); // string, fret, anchor fret, anchor width
        push_i32(out, -1); // chord id
        push_i32(out, -1); // chord notes id
        push_i32(out, 0); // phrase id
        push_i32(out, 0); // phrase iteration id
        push_i16(out, -1); // fingerprint 0
        push_i16(out, -1); // fingerprint 1
        push_i16(out, -1); // next
        push_i16(out, -1); // prev
        push_i16(out, -1); // parent
        out.extend_from_slice(&[0, 0, 0, 0]); // slide to, slide unpitch, left hand, tap
        out.extend_from_slice(&[0, 0, 0]); // pick direction, slap, pluck
        push_i16(out, 0); // vibrato
        push_f32(out, 1.5); // sustain
        push_f32(out, 0.0); // max bend
        push_u32(out, 1); // bend count
        push_f32(out, 10.25); // bend time
        push_f32(out, 1.0); // bend step
        push_i16(out, 0);
        out.push(0);
        out.push(0);
    }

    #[test]
    fn test_minimal_fixture_typed_tree() {
        let doc = parse_sng_plain(&minimal_sng_plain()).unwrap();
        assert_eq!(
            doc.beats,
            vec![BeatEvent {
                time: 10.0,
                measure: 0,
                beat: 0,
                phrase_iteration: 0,
                mask: 1,
            }]
        );
        assert_eq!(doc.phrases.len(), 1);
        assert_eq!(doc.phrases[0].name, "intro");
        assert!(doc.chord_templates.is_empty());
        assert!(doc.sections.is_empty());
        assert_eq!(doc.arrangements.len(), 1);
        let level = &doc.arrangements[0];
        assert_eq!(level.difficulty, 0);
        assert_eq!(level.notes.len(), 1);
        let note = &level.notes[0];
        assert_eq!(note.mask, 0x0000_0200);
        assert_eq!(note.string_index, 2);
        assert_eq!(note.fret, 5);
        assert_eq!(note.sustain, 1.5);
        assert_eq!(
            note.bend_values,
            vec![BendValue {
                time: 10.25,
                step: 1.0
            }]
        );
        assert_eq!(doc.metadata.capo_fret, 0xFF);
        assert_eq!(doc.metadata.song_length, 120.0);
        assert_eq!(doc.metadata.tuning, vec![0i16; 6]);
    }

    #[test]
    fn test_truncated_stream_is_fatal() {
        let plain = minimal_sng_plain();
        let truncated = &plain[..plain.len() - 8];
        match parse_sng_plain(truncated) {
            Err(ConvertError::UnexpectedEof(_)) => {}
            other => panic!("expected UnexpectedEof, got {other:?}"),
        }
    }

    /// Full envelope round trip through encryption, including platform
    /// auto-detection with the Mac key.
    #[test]
    fn test_encrypted_envelope_round_trip() {
        let plain = minimal_sng_plain();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(&plain).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut payload = Vec::new();
        push_u32(&mut payload, plain.len() as u32);
        push_u32(&mut payload, compressed.len() as u32);
        payload.extend_from_slice(&compressed);

        let iv = [0x11u8; 16];
        counter_keystream_apply(&SNG_MAC_KEY, &iv, &mut payload);

        let mut file = Vec::new();
        push_u32(&mut file, 0x0000_004A);
        push_u32(&mut file, 3); // platform flags, discarded
        file.extend_from_slice(&iv);
        file.extend_from_slice(&payload);

        let doc = parse_sng(&file, None).unwrap();
        assert_eq!(doc.arrangements[0].notes.len(), 1);
        assert_eq!(doc.metadata.song_length, 120.0);
    }
}
