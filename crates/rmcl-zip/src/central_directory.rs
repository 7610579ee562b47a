const CENTRAL_DIRECTORY_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x01, 0x02];

/// One record from a ZIP central directory.
///
/// Parsed out of an arbitrary byte slice rather than a full archive — the
/// only caller (the tail-range type probe) hands this a ~100 KiB
/// range near the end of a remote blob, not a whole file, so parsing is
/// deliberately tolerant: a bad signature or a short remainder just ends
/// the scan rather than erroring. A misaligned tail range is the documented
/// "`(unknown, none)`" outcome, not a bug to propagate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryEntry {
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub compression: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub disk_number: u16,
    pub internal_attributes: u16,
    pub external_attributes: u32,
    pub header_offset: u32,
    pub filename: String,
}

/// Bytes consumed by the fixed portion of a central directory record,
/// signature included.
const FIXED_HEADER_LEN: usize = 46;

impl CentralDirectoryEntry {
    /// Attempts to parse one entry starting at `offset`. Returns the entry
    /// and the offset of the next record, or `None` if `offset` does not
    /// begin a valid record (bad signature, or too little data remains).
    pub fn read_at(data: &[u8], offset: usize) -> Option<(CentralDirectoryEntry, usize)> {
        if data.len() < offset + FIXED_HEADER_LEN {
            return None;
        }
        let header = &data[offset..offset + FIXED_HEADER_LEN];
        if header[0..4] != CENTRAL_DIRECTORY_SIGNATURE {
            return None;
        }

        let version_made_by = u16::from_le_bytes([header[4], header[5]]);
        let version_needed = u16::from_le_bytes([header[6], header[7]]);
        let flags = u16::from_le_bytes([header[8], header[9]]);
        let compression = u16::from_le_bytes([header[10], header[11]]);
        // header[12..16] is the MS-DOS datetime, unused by this probe.
        let crc32 = u32::from_le_bytes([header[16], header[17], header[18], header[19]]);
        let compressed_size = u32::from_le_bytes([header[20], header[21], header[22], header[23]]);
        let uncompressed_size =
            u32::from_le_bytes([header[24], header[25], header[26], header[27]]);
        let filename_length = u16::from_le_bytes([header[28], header[29]]) as usize;
        let extra_length = u16::from_le_bytes([header[30], header[31]]) as usize;
        let comment_length = u16::from_le_bytes([header[32], header[33]]) as usize;
        let disk_number = u16::from_le_bytes([header[34], header[35]]);
        let internal_attributes = u16::from_le_bytes([header[36], header[37]]);
        let external_attributes =
            u32::from_le_bytes([header[38], header[39], header[40], header[41]]);
        let header_offset = u32::from_le_bytes([header[42], header[43], header[44], header[45]]);

        let variable_len = filename_length + extra_length + comment_length;
        let variable_start = offset + FIXED_HEADER_LEN;
        if data.len() < variable_start + variable_len {
            return None;
        }
        let filename_bytes = &data[variable_start..variable_start + filename_length];
        let filename = String::from_utf8_lossy(filename_bytes).into_owned();

        let entry = CentralDirectoryEntry {
            version_made_by,
            version_needed,
            flags,
            compression,
            crc32,
            compressed_size,
            uncompressed_size,
            disk_number,
            internal_attributes,
            external_attributes,
            header_offset,
            filename,
        };
        Some((entry, variable_start + variable_len))
    }

    /// Scans every consecutive central directory record starting at
    /// `start`, stopping (without error) at the first position that does
    /// not parse as one.
    pub fn scan(data: &[u8], start: usize) -> Vec<CentralDirectoryEntry> {
        let mut entries = Vec::new();
        let mut pos = start;
        while let Some((entry, next)) = CentralDirectoryEntry::read_at(data, pos) {
            entries.push(entry);
            pos = next;
        }
        entries
    }
}
