//! End-to-end conversion pipeline: PSARC in, GPX out.
//!
//! The pipeline is a pure dataflow run sequentially per conversion. Fatal
//! problems abort with a [`ConvertError`]; per-arrangement problems become
//! [`Warning`]s and the pipeline carries on with the remaining tracks. The
//! output file is only written once the whole container image exists in
//! memory, so no partial file is ever left behind.

use crate::error::ConvertError;
use crate::export::{gpif_builder, gpx_writer, xml_writer};
use crate::parser::manifest_parser::{parse_manifest, Attributes2014};
use crate::parser::psarc_parser::{PsarcArchive, PsarcEntry};
use crate::parser::sng_parser::{parse_sng, Platform};
use crate::score::rhythm_detector;
use crate::score::score_builder::TrackBuilder;
use crate::score::song::Score;
use std::fs;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Non-fatal problems accumulated during a conversion.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Warning {
    #[error("invalid manifest entry {entry}: {reason}")]
    InvalidManifest { entry: String, reason: String },

    #[error("no SNG entry found for arrangement {arrangement}")]
    MissingSngAsset { arrangement: String },

    #[error("failed to decode arrangement {arrangement}: {reason}")]
    ArrangementDecode { arrangement: String, reason: String },
}

#[derive(Debug)]
pub struct ConversionResult {
    pub output_path: PathBuf,
    pub track_count: usize,
    pub warnings: Vec<Warning>,
}

/// Convert a `.psarc` archive into a `.gpx` file next to it (or at the
/// explicit output path).
pub fn convert(input: &Path, output: Option<&Path>) -> Result<ConversionResult, ConvertError> {
    convert_with_progress(input, output, None, &mut |_, _| {})
}

/// Full-control variant: explicit SNG platform and a progress callback
/// receiving `(percent, stage label)` at stage boundaries.
pub fn convert_with_progress(
    input: &Path,
    output: Option<&Path>,
    platform: Option<Platform>,
    progress: &mut dyn FnMut(u8, &str),
) -> Result<ConversionResult, ConvertError> {
    let file = File::open(input)?;
    let mut archive = PsarcArchive::open(BufReader::new(file))?;
    progress(10, "Reading PSARC");

    let entries: Vec<PsarcEntry> = archive.entries().to_vec();
    let mut warnings = Vec::new();

    let mut manifests: Vec<Attributes2014> = Vec::new();
    for entry in entries.iter().filter(|e| is_manifest_entry(e)) {
        let loaded = archive
            .read_entry(entry.id)
            .and_then(|data| parse_manifest(&data));
        match loaded {
            Ok(attrs) => manifests.extend(attrs),
            Err(e) => {
                log::warn!("skipping manifest {}: {e}", entry.name);
                warnings.push(Warning::InvalidManifest {
                    entry: entry.name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
    manifests.retain(|attrs| {
        let keep = !attrs.is_vocals() && !attrs.is_show_lights();
        if !keep {
            log::info!("skipping non-instrument arrangement {}", attrs.arrangement_name);
        }
        keep
    });
    if manifests.is_empty() {
        return Err(ConvertError::NoArrangements);
    }

    let first = &manifests[0];
    let mut score = Score {
        title: first.song_name.clone(),
        artist: first.artist_name.clone(),
        album: first.album_name.clone(),
        year: first.song_year,
        tracks: Vec::new(),
    };

    for attrs in &manifests {
        let Some(entry) = locate_sng_entry(&entries, attrs) else {
            log::warn!("no SNG asset for arrangement {}", attrs.arrangement_name);
            warnings.push(Warning::MissingSngAsset {
                arrangement: attrs.arrangement_name.clone(),
            });
            continue;
        };
        let built = archive
            .read_entry(entry.id)
            .and_then(|data| parse_sng(&data, platform))
            .and_then(|sng| TrackBuilder::new(&sng, attrs).build());
        match built {
            Ok(track) => {
                log::info!(
                    "built track {} with {} bars",
                    track.name,
                    track.bars.len()
                );
                score.tracks.push(track);
            }
            Err(e) => {
                log::warn!("skipping arrangement {}: {e}", attrs.arrangement_name);
                warnings.push(Warning::ArrangementDecode {
                    arrangement: attrs.arrangement_name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
    if score.tracks.is_empty() {
        return Err(ConvertError::NoArrangements);
    }
    score
        .tracks
        .sort_by(|a, b| (a.path, a.bonus, &a.name).cmp(&(b.path, b.bonus, &b.name)));

    progress(50, "Detecting rhythm");
    for track in &mut score.tracks {
        for bar in &mut track.bars {
            rhythm_detector::detect(bar);
        }
    }

    let document = gpif_builder::build_document(&score);
    let xml = xml_writer::write_gpif(&document)?;
    progress(80, "Exporting GPX");
    let image = gpx_writer::write_gpx(xml.as_bytes())?;

    let output_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.with_extension("gpx"));
    fs::write(&output_path, &image)?;
    progress(100, "Done");
    log::info!(
        "wrote {} track(s) to {}",
        score.tracks.len(),
        output_path.display()
    );

    Ok(ConversionResult {
        output_path,
        track_count: score.tracks.len(),
        warnings,
    })
}

fn is_manifest_entry(entry: &PsarcEntry) -> bool {
    let name = entry.normalized_name();
    name.contains("manifests/") && name.ends_with(".json")
}

/// Resolve the `.sng` entry an arrangement points at. The primary locator
/// is the song-asset URN; a blank one falls back to the song-XML URN with
/// its `.xml` suffix stripped.
fn locate_sng_entry<'a>(
    entries: &'a [PsarcEntry],
    attrs: &Attributes2014,
) -> Option<&'a PsarcEntry> {
    let base = sng_asset_base(attrs)?;
    let bare_suffix = format!("/{base}");
    let sng_suffix = format!("/{base}.sng");
    entries.iter().find(|entry| {
        let name = entry.normalized_name();
        name.ends_with(&sng_suffix) || name.ends_with(&bare_suffix)
    })
}

fn sng_asset_base(attrs: &Attributes2014) -> Option<String> {
    let base = if !attrs.song_asset.is_empty() {
        attrs.song_asset.rsplit(':').next().unwrap_or_default()
    } else if !attrs.song_xml.is_empty() {
        let tail = attrs.song_xml.rsplit(':').next().unwrap_or_default();
        tail.strip_suffix(".xml").unwrap_or(tail)
    } else {
        return None;
    };
    if base.is_empty() {
        None
    } else {
        Some(base.to_lowercase())
    }
}
