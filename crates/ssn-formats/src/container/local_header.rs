//! Local file header in front of every payload

use binrw::{BinRead, BinWrite};

/// Signature of a local file header (`PK\x03\x04`)
pub const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4B50;

/// Fixed part of a local file header
pub const LOCAL_HEADER_LEN: usize = 30;

/// Fixed 30-byte local file header (little-endian)
///
/// Only the signature and the two trailing lengths are consulted when
/// reading; the directory record is authoritative for everything else.
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct LocalFileHeader {
    /// Header signature
    pub signature: u32,
    /// Version needed to extract
    pub version_needed: u16,
    /// General purpose flags
    pub flags: u16,
    /// Compression method
    pub compression: u16,
    /// MS-DOS time
    pub last_mod_time: u16,
    /// MS-DOS date
    pub last_mod_date: u16,
    /// CRC-32 of the content
    pub crc32: u32,
    /// Stored payload size
    pub compressed_size: u32,
    /// Size after decompression
    pub uncompressed_size: u32,
    /// Length of the file name
    pub file_name_length: u16,
    /// Length of the extra field block
    pub extra_field_length: u16,
}

impl LocalFileHeader {
    /// Bytes between the end of the fixed header and the payload
    pub fn variable_len(&self) -> u64 {
        u64::from(self.file_name_length) + u64::from(self.extra_field_length)
    }
}
