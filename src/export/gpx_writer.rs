//! Guitar Pro 6 container writer.
//!
//! A GPX file is a sequence of 4096-byte sectors: a `BCFS` header sector
//! holding the single file entry, a `BCFE` directory sector naming it, and
//! `imrf`-tagged data sectors carrying the zlib-compressed GPIF XML.

use crate::error::ConvertError;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;

pub const SECTOR_SIZE: usize = 0x1000;
const SECTOR_PAYLOAD: usize = SECTOR_SIZE - 4;

const FILE_SYSTEM_MAGIC: &[u8; 4] = b"BCFS";
const DIRECTORY_MAGIC: &[u8; 4] = b"BCFE";
const DATA_SECTOR_MAGIC: &[u8; 4] = b"imrf";
const CONTAINER_VERSION: u32 = 0x0000_0200;
const SCORE_FILE_NAME: &str = "score.gpif";
const FILE_NAME_FIELD: usize = 128;

/// Compress the XML and lay it out as a sectorized container image.
pub fn write_gpx(xml: &[u8]) -> Result<Vec<u8>, ConvertError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(xml)
        .and_then(|()| encoder.finish())
        .map_err(|e| ConvertError::IoError(format!("compressing GPIF XML: {e}")))
        .map(|compressed| layout_sectors(xml.len(), &compressed))
}

fn layout_sectors(uncompressed_len: usize, compressed: &[u8]) -> Vec<u8> {
    let data_sectors = compressed.len().div_ceil(SECTOR_PAYLOAD).max(1);
    let mut image = vec![0u8; (2 + data_sectors) * SECTOR_SIZE];

    // sector 0: file system header with the single file entry
    image[0..4].copy_from_slice(FILE_SYSTEM_MAGIC);
    image[4..8].copy_from_slice(&CONTAINER_VERSION.to_le_bytes());
    let entry = &mut image[8..24];
    entry[0..4].copy_from_slice(&((2 * SECTOR_SIZE) as u32).to_le_bytes());
    entry[4..8].copy_from_slice(&(uncompressed_len as u32).to_le_bytes());
    entry[8..12].copy_from_slice(&(compressed.len() as u32).to_le_bytes());
    entry[12..16].copy_from_slice(&0u32.to_le_bytes());

    // sector 1: directory with the null-padded file name and file index
    let directory = &mut image[SECTOR_SIZE..2 * SECTOR_SIZE];
    directory[0..4].copy_from_slice(DIRECTORY_MAGIC);
    let name = SCORE_FILE_NAME.as_bytes();
    directory[4..4 + name.len().min(FILE_NAME_FIELD - 1)]
        .copy_from_slice(&name[..name.len().min(FILE_NAME_FIELD - 1)]);
    let index_at = 4 + FILE_NAME_FIELD;
    directory[index_at..index_at + 4].copy_from_slice(&0u32.to_le_bytes());

    // sectors 2..: tagged data blocks
    for (sector, chunk) in compressed.chunks(SECTOR_PAYLOAD).enumerate() {
        let base = (2 + sector) * SECTOR_SIZE;
        image[base..base + 4].copy_from_slice(DATA_SECTOR_MAGIC);
        image[base + 4..base + 4 + chunk.len()].copy_from_slice(chunk);
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    fn sample_xml() -> Vec<u8> {
        let mut xml = b"<GPIF><Score><Title>T</Title></Score>".to_vec();
        // enough body to spill into several data sectors
        for i in 0..2000 {
            xml.extend_from_slice(format!("<Note id=\"{i}\"/>").as_bytes());
        }
        xml.extend_from_slice(b"</GPIF>");
        xml
    }

    fn extract_payload(image: &[u8]) -> Vec<u8> {
        let compressed_len =
            u32::from_le_bytes([image[16], image[17], image[18], image[19]]) as usize;
        let mut payload = Vec::new();
        for sector in image[2 * SECTOR_SIZE..].chunks(SECTOR_SIZE) {
            assert_eq!(&sector[0..4], DATA_SECTOR_MAGIC);
            payload.extend_from_slice(&sector[4..]);
        }
        payload.truncate(compressed_len);
        payload
    }

    #[test]
    fn test_image_is_sector_aligned() {
        let image = write_gpx(&sample_xml()).unwrap();
        assert_eq!(image.len() % SECTOR_SIZE, 0);
        assert!(image.len() >= 3 * SECTOR_SIZE);
    }

    #[test]
    fn test_sector_magics() {
        let image = write_gpx(&sample_xml()).unwrap();
        assert_eq!(&image[0..4], b"BCFS");
        assert_eq!(&image[0x1000..0x1004], b"BCFE");
        assert_eq!(&image[0x2000..0x2004], b"imrf");
    }

    #[test]
    fn test_header_entry_fields() {
        let xml = sample_xml();
        let image = write_gpx(&xml).unwrap();
        let data_offset = u32::from_le_bytes([image[8], image[9], image[10], image[11]]);
        assert_eq!(data_offset, 0x2000);
        let uncompressed = u32::from_le_bytes([image[12], image[13], image[14], image[15]]);
        assert_eq!(uncompressed as usize, xml.len());
        let flags = u32::from_le_bytes([image[20], image[21], image[22], image[23]]);
        assert_eq!(flags, 0);
        // directory names the score file at index 0
        let name_field = &image[0x1004..0x1004 + 10];
        assert_eq!(name_field, b"score.gpif");
    }

    #[test]
    fn test_payload_round_trip() {
        let xml = sample_xml();
        let image = write_gpx(&xml).unwrap();
        let payload = extract_payload(&image);
        let mut inflated = Vec::new();
        ZlibDecoder::new(payload.as_slice())
            .read_to_end(&mut inflated)
            .unwrap();
        assert_eq!(inflated, xml);
    }
}
