use std::io::{Cursor, Read, Write};

use crate::error::ZipError;

const LOCAL_FILE_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// One entry read from a ZIP local-file-header stream.
///
/// `contents` is `None` when the stream was truncated mid-payload — the
/// caller still gets `filename`/`uncompressed_size` recovered from the
/// header, it just can't get the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileEntry {
    pub filename: String,
    pub compression: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub contents: Option<Vec<u8>>,
}

impl LocalFileEntry {
    /// Reads the next entry from `reader`. Returns `Ok(None)` at a clean
    /// end of stream (no bytes left before the next signature).
    pub fn read_next<R: Read>(reader: &mut R) -> Result<Option<LocalFileEntry>, ZipError> {
        let signature = read_upto(reader, 4)?;
        if signature.is_empty() {
            return Ok(None);
        }
        if signature.len() != 4 || signature != LOCAL_FILE_SIGNATURE {
            return Err(ZipError::InvalidSignature);
        }

        let header = read_upto(reader, 26)?;
        if header.len() != 26 {
            return Err(ZipError::InvalidSignature);
        }
        let _version = u16::from_le_bytes([header[0], header[1]]);
        let _flags = u16::from_le_bytes([header[2], header[3]]);
        let compression = u16::from_le_bytes([header[4], header[5]]);
        let _datetime = u32::from_le_bytes([header[6], header[7], header[8], header[9]]);
        let crc32 = u32::from_le_bytes([header[10], header[11], header[12], header[13]]);
        let compressed_size = u32::from_le_bytes([header[14], header[15], header[16], header[17]]);
        let uncompressed_size =
            u32::from_le_bytes([header[18], header[19], header[20], header[21]]);
        let filename_length = u16::from_le_bytes([header[22], header[23]]) as usize;
        let extra_length = u16::from_le_bytes([header[24], header[25]]) as usize;

        let filename_bytes = read_upto(reader, filename_length)?;
        let filename = String::from_utf8_lossy(&filename_bytes).into_owned();
        let _extra = read_upto(reader, extra_length)?;

        let compressed = read_upto(reader, compressed_size as usize)?;
        let contents = if compressed.len() != compressed_size as usize {
            // Truncated stream: recover metadata, not content.
            None
        } else {
            let decompressed = decompress(compression, &compressed, uncompressed_size)?;
            if crc32fast::hash(&decompressed) != crc32 {
                return Err(ZipError::ChecksumMismatch);
            }
            Some(decompressed)
        };

        Ok(Some(LocalFileEntry {
            filename,
            compression,
            crc32,
            compressed_size,
            uncompressed_size,
            contents,
        }))
    }
}

/// Reads up to `n` bytes, returning fewer only at end of stream (never
/// erroring on a short read the way `read_exact` does) so truncation can
/// be detected rather than propagated as an I/O error.
fn read_upto<R: Read>(reader: &mut R, n: usize) -> Result<Vec<u8>, ZipError> {
    let mut buf = vec![0u8; n];
    let mut total = 0;
    while total < n {
        let read = reader.read(&mut buf[total..])?;
        if read == 0 {
            break;
        }
        total += read;
    }
    buf.truncate(total);
    Ok(buf)
}

fn decompress(method: u16, data: &[u8], uncompressed_size: u32) -> Result<Vec<u8>, ZipError> {
    match method {
        0 => Ok(data.to_vec()),
        8 => {
            let mut decoder = flate2::read::DeflateDecoder::new(data);
            let mut out = Vec::with_capacity(uncompressed_size as usize);
            decoder.read_to_end(&mut out)?;
            Ok(out)
        }
        12 => {
            let mut decoder = bzip2::read::BzDecoder::new(data);
            let mut out = Vec::with_capacity(uncompressed_size as usize);
            decoder.read_to_end(&mut out)?;
            Ok(out)
        }
        14 => lzma_decompress(data, uncompressed_size),
        other => Err(ZipError::UnsupportedCompression(other)),
    }
}

/// Method 14 (LZMA) entries carry a ZIP-specific properties prefix instead
/// of the classic `.lzma` file header: 2 bytes of general-purpose options,
/// 2 bytes of properties length, then the properties themselves (5 bytes:
/// 1 byte `lc`/`lp`/`pb`, 4 bytes little-endian dictionary size). The raw
/// LZMA payload that follows has no header of its own, so the classic
/// 13-byte header is reassembled here (props byte + dict size + the
/// uncompressed size ZIP already told us) before handing it to `lzma-rs`.
fn lzma_decompress(data: &[u8], uncompressed_size: u32) -> Result<Vec<u8>, ZipError> {
    if data.len() < 4 {
        return Err(ZipError::MalformedLzmaProperties);
    }
    let properties_length = u16::from_le_bytes([data[2], data[3]]) as usize;
    if data.len() < 4 + properties_length || properties_length != 5 {
        return Err(ZipError::MalformedLzmaProperties);
    }
    let properties = &data[4..4 + properties_length];
    let payload = &data[4 + properties_length..];

    let mut legacy_header = Vec::with_capacity(13 + payload.len());
    legacy_header.write_all(&properties[0..1]).ok();
    legacy_header.write_all(&properties[1..5]).ok();
    legacy_header.extend_from_slice(&(uncompressed_size as u64).to_le_bytes());
    legacy_header.extend_from_slice(payload);

    let mut output = Vec::new();
    lzma_rs::lzma_decompress(&mut Cursor::new(legacy_header), &mut output)
        .map_err(|e| ZipError::Decompress(e.to_string()))?;
    Ok(output)
}
