//! End-of-central-directory record

use crate::container::central_directory::CENTRAL_DIR_HEADER_LEN;
use crate::container::error::FormatError;
use binrw::io::Cursor;
use binrw::{BinRead, BinWrite};

/// Signature of the end-of-central-directory record (`PK\x05\x06`)
pub const EOCD_SIGNATURE: u32 = 0x0605_4B50;

/// Size of the record without its trailing comment
pub const EOCD_LEN: usize = 22;

/// End-of-central-directory record (22 bytes, little-endian)
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct EndOfCentralDirectory {
    /// Record signature
    pub signature: u32,
    /// Number of this disk
    pub disk_number: u16,
    /// Disk on which the central directory starts
    pub central_dir_disk: u16,
    /// Entries in the central directory on this disk
    pub disk_entries: u16,
    /// Total number of entries in the central directory
    pub entry_count: u16,
    /// Size of the central directory in bytes
    pub central_dir_size: u32,
    /// Offset of the central directory relative to its disk
    pub central_dir_offset: u32,
    /// Length of the trailing comment
    pub comment_length: u16,
}

impl EndOfCentralDirectory {
    /// Record for a single-disk directory
    pub fn new(entry_count: u16, central_dir_size: u32, central_dir_offset: u32) -> Self {
        Self {
            signature: EOCD_SIGNATURE,
            disk_number: 0,
            central_dir_disk: 0,
            disk_entries: entry_count,
            entry_count,
            central_dir_size,
            central_dir_offset,
            comment_length: 0,
        }
    }

    /// Scan backwards from the last possible record position for the signature
    ///
    /// Returns the record offset together with the decoded record.
    pub fn locate(data: &[u8]) -> Result<(usize, Self), FormatError> {
        let last = data
            .len()
            .checked_sub(EOCD_LEN)
            .ok_or(FormatError::EocdNotFound)?;
        let signature = EOCD_SIGNATURE.to_le_bytes();

        let offset = (0..=last)
            .rev()
            .find(|&pos| data.get(pos..pos + 4) == Some(signature.as_slice()))
            .ok_or(FormatError::EocdNotFound)?;

        let record = Self::read(&mut Cursor::new(&data[offset..])).map_err(|_| {
            FormatError::OutOfBounds {
                what: "end of central directory",
                offset,
            }
        })?;
        Ok((offset, record))
    }

    /// Offset of the first central directory record
    ///
    /// The directory is assumed to end exactly where this record starts.
    pub fn central_dir_start(&self, eocd_offset: usize) -> Result<usize, FormatError> {
        let needed = u64::from(self.entry_count) * CENTRAL_DIR_HEADER_LEN as u64;
        if u64::from(self.central_dir_size) < needed {
            return Err(FormatError::TruncatedCentralDir {
                size: self.central_dir_size,
                entries: self.entry_count,
            });
        }

        eocd_offset
            .checked_sub(self.central_dir_size as usize)
            .ok_or(FormatError::NegativeCentralDirStart {
                eocd_offset,
                size: self.central_dir_size,
            })
    }
}
