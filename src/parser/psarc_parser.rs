//! PSARC (PlayStation archive) reader.
//!
//! The archive holds a big-endian table of contents, optionally encrypted
//! with AES-256/CFB-8, followed by zlib-compressed data blocks. Entries are
//! decompressed lazily, one block run at a time, so opening an archive only
//! reads and decrypts the TOC.

use crate::error::ConvertError;
use crate::parser::crypto::{cfb8_decrypt, PSARC_TOC_KEY};
use crate::parser::primitive_parser::{
    parse_be_u16, parse_be_u24, parse_be_u32, parse_be_u40, parse_bytes, skip,
};
use flate2::read::ZlibDecoder;
use nom::{IResult, Parser};
use std::io::{Read, Seek, SeekFrom};

const PSARC_MAGIC: u32 = 0x5053_4152; // "PSAR"
const ZLIB_TAG: u32 = 0x7A6C_6962; // "zlib"
const HEADER_SIZE: usize = 32;
const TOC_ENTRY_READ_SIZE: usize = 30; // md5 + z_index + length + offset
const ENCRYPTION_TAG_ALLOWANCE: usize = 32;
const ARCHIVE_FLAG_ENCRYPTED_TOC: u32 = 0x04;
const ZLIB_MAGIC_BYTE: u8 = 0x78;

/// Fixed-size archive header, all fields big-endian.
#[derive(Debug, Clone, Copy)]
pub struct PsarcHeader {
    pub version: u32,
    pub compression: u32,
    pub toc_size: u32,
    pub toc_entry_size: u32,
    pub num_files: u32,
    pub block_size: u32,
    pub archive_flags: u32,
}

impl PsarcHeader {
    pub fn is_toc_encrypted(&self) -> bool {
        self.archive_flags & ARCHIVE_FLAG_ENCRYPTED_TOC != 0
    }
}

/// One archive entry from the table of contents.
///
/// `length` is the decompressed size; `z_index` points at the first of the
/// entry's blocks in the shared block-length table.
#[derive(Debug, Clone)]
pub struct PsarcEntry {
    pub id: usize,
    pub md5: [u8; 16],
    pub z_index: u32,
    pub length: u64,
    pub offset: u64,
    pub name: String,
}

impl PsarcEntry {
    /// Entry name lowercased with backslashes normalized to slashes, the
    /// form used for all name matching.
    pub fn normalized_name(&self) -> String {
        self.name.replace('\\', "/").to_lowercase()
    }
}

/// An opened archive. Holds the source reader for lazy entry decompression;
/// block reads go through `&mut self` since they move the file position.
#[derive(Debug)]
pub struct PsarcArchive<R> {
    reader: R,
    block_size: u32,
    z_lengths: Vec<u32>,
    entries: Vec<PsarcEntry>,
}

impl<R: Read + Seek> PsarcArchive<R> {
    /// Read and validate the header, decrypt and parse the TOC, and resolve
    /// entry names from the names blob (entry 0, which is then dropped).
    pub fn open(mut reader: R) -> Result<Self, ConvertError> {
        let mut header_bytes = [0u8; HEADER_SIZE];
        reader
            .read_exact(&mut header_bytes)
            .map_err(|_| ConvertError::UnexpectedEof("reading PSARC header".to_string()))?;
        let header = parse_header(&header_bytes)?;
        log::debug!(
            "PSARC v{:#x}: {} files, toc_size={}, block_size={}, flags={:#x}",
            header.version,
            header.num_files,
            header.toc_size,
            header.block_size,
            header.archive_flags
        );

        let toc_len = (header.toc_size as usize)
            .checked_sub(HEADER_SIZE)
            .ok_or_else(|| ConvertError::ParsingError("TOC size smaller than header".to_string()))?;
        let mut toc = vec![0u8; toc_len];
        reader
            .read_exact(&mut toc)
            .map_err(|_| ConvertError::UnexpectedEof("reading PSARC TOC".to_string()))?;
        if header.is_toc_encrypted() {
            log::debug!("decrypting TOC ({toc_len} bytes)");
            cfb8_decrypt(&PSARC_TOC_KEY, &[0u8; 16], &mut toc);
        }

        let (entries, z_lengths) = parse_toc(&toc, &header)?;
        let mut archive = Self {
            reader,
            block_size: header.block_size,
            z_lengths,
            entries,
        };
        archive.resolve_names()?;
        Ok(archive)
    }

    /// All named entries, in TOC order. The names blob is not included.
    pub fn entries(&self) -> &[PsarcEntry] {
        &self.entries
    }

    /// Decompress the full contents of the entry with the given id.
    pub fn read_entry(&mut self, entry_id: usize) -> Result<Vec<u8>, ConvertError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.id == entry_id)
            .ok_or_else(|| ConvertError::ParsingError(format!("no PSARC entry {entry_id}")))?;
        let (z_index, length, offset) = (entry.z_index, entry.length, entry.offset);
        self.read_blocks(z_index, length, offset)
    }

    /// Consume blocks starting at `z_index` until `length` bytes have been
    /// produced. A zero block-length means one full uncompressed block; a
    /// nonzero one is inflated only when it starts with the zlib magic,
    /// otherwise it was stored raw. An exhausted block table truncates the
    /// entry without error.
    fn read_blocks(&mut self, z_index: u32, length: u64, offset: u64) -> Result<Vec<u8>, ConvertError> {
        self.reader.seek(SeekFrom::Start(offset))?;
        let mut out: Vec<u8> = Vec::with_capacity(length as usize);
        let mut block = z_index as usize;
        while (out.len() as u64) < length {
            let Some(&z_len) = self.z_lengths.get(block) else {
                log::warn!(
                    "block table exhausted at {block}, entry truncated to {} of {length} bytes",
                    out.len()
                );
                break;
            };
            block += 1;
            if z_len == 0 {
                let want = (length - out.len() as u64).min(u64::from(self.block_size)) as usize;
                let start = out.len();
                out.resize(start + want, 0);
                self.reader
                    .read_exact(&mut out[start..])
                    .map_err(|_| ConvertError::UnexpectedEof("reading stored block".to_string()))?;
            } else {
                let mut raw = vec![0u8; z_len as usize];
                self.reader
                    .read_exact(&mut raw)
                    .map_err(|_| ConvertError::UnexpectedEof("reading compressed block".to_string()))?;
                if raw.first() == Some(&ZLIB_MAGIC_BYTE) {
                    let mut decoder = ZlibDecoder::new(raw.as_slice());
                    decoder.read_to_end(&mut out).map_err(|e| {
                        ConvertError::ParsingError(format!("inflating block {}: {e}", block - 1))
                    })?;
                } else {
                    // short block that did not compress, stored verbatim
                    out.extend_from_slice(&raw);
                }
            }
        }
        out.truncate(length as usize);
        Ok(out)
    }

    fn resolve_names(&mut self) -> Result<(), ConvertError> {
        if self.entries.is_empty() {
            return Ok(());
        }
        let listing = self.read_entry(0)?;
        let listing = String::from_utf8_lossy(&listing).into_owned();
        for (entry, name) in self.entries.iter_mut().skip(1).zip(listing.split('\n')) {
            entry.name = name.to_string();
        }
        self.entries.remove(0);
        Ok(())
    }
}

fn parse_header(bytes: &[u8]) -> Result<PsarcHeader, ConvertError> {
    let parsed: IResult<&[u8], _> = (
        parse_be_u32, // magic
        parse_be_u32, // version
        parse_be_u32, // compression
        parse_be_u32, // toc_size
        parse_be_u32, // toc_entry_size
        parse_be_u32, // num_files
        parse_be_u32, // block_size
        parse_be_u32, // archive_flags
    )
        .parse(bytes);
    let (_, (magic, version, compression, toc_size, toc_entry_size, num_files, block_size, archive_flags)) =
        parsed.map_err(|_| ConvertError::UnexpectedEof("parsing PSARC header".to_string()))?;
    if magic != PSARC_MAGIC {
        return Err(ConvertError::BadMagic(format!(
            "expected PSAR, got {magic:#010x}"
        )));
    }
    if compression != ZLIB_TAG {
        return Err(ConvertError::UnsupportedCompression(compression));
    }
    Ok(PsarcHeader {
        version,
        compression,
        toc_size,
        toc_entry_size,
        num_files,
        block_size,
        archive_flags,
    })
}

fn parse_toc(toc: &[u8], header: &PsarcHeader) -> Result<(Vec<PsarcEntry>, Vec<u32>), ConvertError> {
    let mut i = toc;
    let mut entries = Vec::with_capacity(header.num_files as usize);
    for id in 0..header.num_files as usize {
        let (rest, entry) = parse_toc_entry(i, id)
            .map_err(|_| ConvertError::UnexpectedEof(format!("parsing TOC entry {id}")))?;
        // consume padding up to the declared entry size
        let padding = (header.toc_entry_size as usize).saturating_sub(TOC_ENTRY_READ_SIZE);
        i = skip(rest, padding);
        entries.push(entry);
    }

    let z_lengths = parse_block_lengths(i, header)?;
    log::debug!(
        "TOC parsed: {} entries, {} block lengths",
        entries.len(),
        z_lengths.len()
    );
    Ok((entries, z_lengths))
}

fn parse_toc_entry(i: &[u8], id: usize) -> IResult<&[u8], PsarcEntry> {
    let (i, md5_bytes) = parse_bytes(16)(i)?;
    let (i, z_index) = parse_be_u32(i)?;
    let (i, length) = parse_be_u40(i)?;
    let (i, offset) = parse_be_u40(i)?;
    let mut md5 = [0u8; 16];
    md5.copy_from_slice(md5_bytes);
    Ok((
        i,
        PsarcEntry {
            id,
            md5,
            z_index,
            length,
            offset,
            name: String::new(),
        },
    ))
}

/// The block-length table uses the smallest integer width (2, 3 or 4 bytes)
/// able to represent the nominal block size. A trailing 32-byte allowance is
/// reserved when the TOC was encrypted.
fn parse_block_lengths(i: &[u8], header: &PsarcHeader) -> Result<Vec<u32>, ConvertError> {
    let width = block_length_width(header.block_size);
    let mut table = i;
    if header.is_toc_encrypted() {
        let keep = table.len().saturating_sub(ENCRYPTION_TAG_ALLOWANCE);
        table = &table[..keep];
    }
    let count = table.len() / width;
    let mut lengths = Vec::with_capacity(count);
    let mut rest = table;
    for _ in 0..count {
        let (next, value) = match width {
            2 => parse_be_u16(rest).map(|(n, v)| (n, u32::from(v))),
            3 => parse_be_u24(rest),
            _ => parse_be_u32(rest),
        }
        .map_err(|_| ConvertError::UnexpectedEof("parsing block-length table".to_string()))?;
        lengths.push(value);
        rest = next;
    }
    Ok(lengths)
}

fn block_length_width(block_size: u32) -> usize {
    for width in 2..=4usize {
        if 256u64.pow(width as u32) >= u64::from(block_size) {
            return width;
        }
    }
    4
}
