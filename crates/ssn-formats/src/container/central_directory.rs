//! Central directory file header

use crate::container::error::FormatError;
use binrw::io::Cursor;
use binrw::{BinRead, BinWrite};

/// Signature of a central directory record (`PK\x01\x02`)
pub const CENTRAL_DIR_SIGNATURE: u32 = 0x0201_4B50;

/// Fixed part of a central directory record
pub const CENTRAL_DIR_HEADER_LEN: usize = 46;

/// Flag bit marking an encrypted payload
pub const FLAG_ENCRYPTED: u16 = 0x0001;

/// The only compression method in use (raw deflate)
pub const COMPRESSION_DEFLATE: u16 = 8;

/// Fixed 46-byte central directory record (little-endian)
///
/// The variable-length name, extra and comment fields follow directly.
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct CentralDirectoryHeader {
    /// Record signature
    pub signature: u32,
    /// Version made by
    pub version_made_by: u16,
    /// Version needed to extract
    pub version_needed: u16,
    /// General purpose flags
    pub flags: u16,
    /// Compression method
    pub compression: u16,
    /// MS-DOS time of last modification
    pub last_mod_time: u16,
    /// MS-DOS date of last modification
    pub last_mod_date: u16,
    /// CRC-32 of the content
    pub crc32: u32,
    /// Stored payload size, including any encryption header
    pub compressed_size: u32,
    /// Size after decompression
    pub uncompressed_size: u32,
    /// Length of the file name
    pub file_name_length: u16,
    /// Length of the extra field block
    pub extra_field_length: u16,
    /// Length of the file comment
    pub comment_length: u16,
    /// Disk holding the local header
    pub disk_number_start: u16,
    /// Internal file attributes
    pub internal_attributes: u16,
    /// External file attributes
    pub external_attributes: u32,
    /// Offset of the local header relative to its disk
    pub local_header_offset: u32,
}

impl CentralDirectoryHeader {
    /// Read the fixed record at `offset` and check its signature
    pub fn read_at(data: &[u8], offset: usize) -> Result<Self, FormatError> {
        let out_of_bounds = FormatError::OutOfBounds {
            what: "central directory record",
            offset,
        };
        let bytes = data
            .get(offset..offset + CENTRAL_DIR_HEADER_LEN)
            .ok_or_else(|| out_of_bounds.clone())?;
        let header = Self::read(&mut Cursor::new(bytes)).map_err(|_| out_of_bounds)?;

        if header.signature != CENTRAL_DIR_SIGNATURE {
            return Err(FormatError::BadCentralDirSignature {
                offset,
                found: header.signature,
            });
        }
        Ok(header)
    }

    /// Whether the payload is encrypted
    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    /// Total record length including the variable-length fields
    pub fn record_len(&self) -> usize {
        CENTRAL_DIR_HEADER_LEN
            + usize::from(self.file_name_length)
            + usize::from(self.extra_field_length)
            + usize::from(self.comment_length)
    }
}
