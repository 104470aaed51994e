//! Parsed directory entries

use crate::container::error::FormatError;
use chrono::NaiveDate;
use ssn_crypto::CipherKeys;
use std::fmt;

/// How a patch entry transforms the installed file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DiffType {
    /// Payload is the complete new file
    NewFile = 0,
    /// File is removed; no payload
    Deleted = 1,
    /// Payload is a binary diff against the previous file
    Changed = 2,
    /// File is carried over as is; no payload
    Unchanged = 3,
}

impl TryFrom<u32> for DiffType {
    type Error = FormatError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::NewFile),
            1 => Ok(Self::Deleted),
            2 => Ok(Self::Changed),
            3 => Ok(Self::Unchanged),
            other => Err(FormatError::UnknownDiffType(other)),
        }
    }
}

impl fmt::Display for DiffType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NewFile => "new",
            Self::Changed => "changed",
            Self::Deleted => "deleted",
            Self::Unchanged => "unchanged",
        };
        f.write_str(name)
    }
}

/// MS-DOS date and time, decoded field by field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DosDateTime {
    /// Full year (1980-based on disk)
    pub year: u16,
    /// Month, 1-12 on well-formed input
    pub month: u8,
    /// Day of month
    pub day: u8,
    /// Hour
    pub hour: u8,
    /// Minute
    pub minute: u8,
    /// Second, always even
    pub second: u8,
}

impl DosDateTime {
    /// Decode from the raw date and time words
    pub fn from_dos(date: u16, time: u16) -> Self {
        Self {
            year: 1980 + (date >> 9),
            month: ((date >> 5) & 0x0F) as u8,
            day: (date & 0x1F) as u8,
            hour: (time >> 11) as u8,
            minute: ((time >> 5) & 0x3F) as u8,
            second: ((time & 0x1F) * 2) as u8,
        }
    }

    /// Encode back into `(date, time)` words
    pub fn to_dos(&self) -> (u16, u16) {
        let date = (self.year.saturating_sub(1980) << 9)
            | (u16::from(self.month) << 5)
            | u16::from(self.day);
        let time =
            (u16::from(self.hour) << 11) | (u16::from(self.minute) << 5) | u16::from(self.second / 2);
        (date, time)
    }

    /// Calendar value, `None` when the fields do not form a valid date
    pub fn to_naive(&self) -> Option<chrono::NaiveDateTime> {
        NaiveDate::from_ymd_opt(
            i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
        )?
        .and_hms_opt(
            u32::from(self.hour),
            u32::from(self.minute),
            u32::from(self.second),
        )
    }
}

/// One entry of the central directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path of the file relative to the installation root
    pub name: String,
    /// Size after decompression
    pub size: u32,
    /// Stored size, including the 12-byte header when encrypted
    pub compressed_size: u32,
    /// CRC-32 of the content
    pub crc: u32,
    /// General purpose flags
    pub flags: u16,
    /// Last modification time
    pub last_modified: DosDateTime,
    /// Disk holding the local header
    pub disk_number_start: u16,
    /// Offset of the local header, resolved to the buffer when embedded
    pub offset: u64,
    /// Payload lives in the parsed buffer rather than a disk file
    pub embedded: bool,
    /// Keys derived from the password field, present for encrypted entries
    pub encryption_keys: Option<CipherKeys>,
    /// Diff type, absent when the entry has no diff descriptor
    pub diff_type: Option<DiffType>,
    /// Length of the previous file (low 32 bits), only for changed entries
    pub diff_source_length: Option<u32>,
    /// Length of the produced file (low 32 bits), only for changed entries
    pub diff_dest_length: Option<u32>,
}

impl FileEntry {
    /// Whether the payload must be decrypted
    pub fn is_encrypted(&self) -> bool {
        self.encryption_keys.is_some()
    }

    /// Whether the payload bytes are inside the parsed buffer
    pub fn is_embedded(&self) -> bool {
        self.embedded
    }
}
