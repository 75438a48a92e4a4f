//! Rocksmith 2014 manifest parsing.
//!
//! Manifests are JSON sidecars of shape `{"Entries": {id: {key: attrs}}}`.
//! Every leaf object is flattened into an [`Attributes2014`] record; only
//! the fields the converter consumes are kept, everything else is ignored.

use crate::error::ConvertError;
use serde::Deserialize;

/// Arrangement type codes used by the manifests.
pub const ARRANGEMENT_TYPE_LEAD: i32 = 0;
pub const ARRANGEMENT_TYPE_RHYTHM: i32 = 1;
pub const ARRANGEMENT_TYPE_COMBO: i32 = 2;
pub const ARRANGEMENT_TYPE_BASS: i32 = 3;
pub const ARRANGEMENT_TYPE_VOCALS: i32 = 4;
pub const ARRANGEMENT_TYPE_SHOW_LIGHTS: i32 = 5;

/// Per-arrangement attributes extracted from a manifest entry. Missing
/// fields default to empty/zero.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Attributes2014 {
    #[serde(rename = "SongName")]
    pub song_name: String,
    #[serde(rename = "SongNameSort")]
    pub song_name_sort: String,
    #[serde(rename = "ArtistName")]
    pub artist_name: String,
    #[serde(rename = "ArtistNameSort")]
    pub artist_name_sort: String,
    #[serde(rename = "AlbumName")]
    pub album_name: String,
    #[serde(rename = "AlbumNameSort")]
    pub album_name_sort: String,
    #[serde(rename = "SongYear")]
    pub song_year: i32,
    #[serde(rename = "SongLength")]
    pub song_length: f32,
    #[serde(rename = "ArrangementName")]
    pub arrangement_name: String,
    #[serde(rename = "ArrangementType")]
    pub arrangement_type: i32,
    #[serde(rename = "ArrangementProperties")]
    pub arrangement_properties: ArrangementProperties,
    #[serde(rename = "Tuning")]
    pub tuning: Tuning,
    // manifests serialize the capo fret as a float
    #[serde(rename = "CapoFret")]
    pub capo_fret: f32,
    #[serde(rename = "PersistentID", alias = "PersistentId")]
    pub persistent_id: String,
    #[serde(rename = "SongAsset")]
    pub song_asset: String,
    #[serde(rename = "SongXml")]
    pub song_xml: String,
}

impl Attributes2014 {
    pub fn is_vocals(&self) -> bool {
        self.arrangement_type == ARRANGEMENT_TYPE_VOCALS
    }

    pub fn is_show_lights(&self) -> bool {
        self.arrangement_type == ARRANGEMENT_TYPE_SHOW_LIGHTS
    }

    pub fn is_bonus(&self) -> bool {
        self.arrangement_properties.bonus_arr != 0
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct ArrangementProperties {
    #[serde(rename = "bonusArr", alias = "BonusArr")]
    pub bonus_arr: i32,
    #[serde(rename = "represent", alias = "Represent")]
    pub represent: i32,
}

/// Six semitone offsets from standard tuning.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct Tuning {
    #[serde(rename = "string0", alias = "String0")]
    pub string0: i32,
    #[serde(rename = "string1", alias = "String1")]
    pub string1: i32,
    #[serde(rename = "string2", alias = "String2")]
    pub string2: i32,
    #[serde(rename = "string3", alias = "String3")]
    pub string3: i32,
    #[serde(rename = "string4", alias = "String4")]
    pub string4: i32,
    #[serde(rename = "string5", alias = "String5")]
    pub string5: i32,
}

impl Tuning {
    pub fn as_array(&self) -> [i32; 6] {
        [
            self.string0,
            self.string1,
            self.string2,
            self.string3,
            self.string4,
            self.string5,
        ]
    }
}

/// Flatten one manifest document into its attribute records, visiting every
/// leaf under `Entries`.
pub fn parse_manifest(data: &[u8]) -> Result<Vec<Attributes2014>, ConvertError> {
    let root: serde_json::Value = serde_json::from_slice(data)
        .map_err(|e| ConvertError::ParsingError(format!("manifest JSON: {e}")))?;
    let mut attributes = Vec::new();
    let Some(entries) = root.get("Entries").and_then(|v| v.as_object()) else {
        return Ok(attributes);
    };
    for (entry_id, inner) in entries {
        let Some(leaves) = inner.as_object() else {
            continue;
        };
        for (leaf_key, value) in leaves {
            if !value.is_object() {
                continue;
            }
            let attrs: Attributes2014 = serde_json::from_value(value.clone()).map_err(|e| {
                ConvertError::ParsingError(format!("manifest entry {entry_id}/{leaf_key}: {e}"))
            })?;
            log::debug!(
                "manifest entry {entry_id}: {} / {} (type {})",
                attrs.song_name,
                attrs.arrangement_name,
                attrs.arrangement_type
            );
            attributes.push(attrs);
        }
    }
    Ok(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_entries() {
        let doc = json!({
            "ModelName": "RSEnumerable_Song",
            "Entries": {
                "A1B2": {
                    "Attributes": {
                        "SongName": "Example Song",
                        "ArtistName": "Example Artist",
                        "AlbumName": "Example Album",
                        "SongYear": 1999,
                        "SongLength": 245.7,
                        "ArrangementName": "Lead",
                        "ArrangementType": 0,
                        "Tuning": {"string0": -2, "string1": 0, "string2": 0,
                                   "string3": 0, "string4": 0, "string5": 0},
                        "CapoFret": 2.0,
                        "SongAsset": "urn:application:musicgamesong:example_lead",
                        "Extra": {"ignored": true}
                    }
                }
            }
        });
        let attrs = parse_manifest(doc.to_string().as_bytes()).unwrap();
        assert_eq!(attrs.len(), 1);
        let a = &attrs[0];
        assert_eq!(a.song_name, "Example Song");
        assert_eq!(a.song_year, 1999);
        assert_eq!(a.arrangement_type, ARRANGEMENT_TYPE_LEAD);
        assert_eq!(a.tuning.as_array(), [-2, 0, 0, 0, 0, 0]);
        assert_eq!(a.capo_fret, 2.0);
        assert_eq!(a.song_asset, "urn:application:musicgamesong:example_lead");
        // missing fields defaulted
        assert_eq!(a.song_xml, "");
        assert!(!a.is_bonus());
    }

    #[test]
    fn test_missing_entries_key_yields_nothing() {
        let attrs = parse_manifest(b"{\"Other\": 1}").unwrap();
        assert!(attrs.is_empty());
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(parse_manifest(b"not json").is_err());
    }
}
