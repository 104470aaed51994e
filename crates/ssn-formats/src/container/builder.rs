//! Container builder
//!
//! Produces containers in the same layout the packaging pipeline emits:
//! local records first, then the central directory, then the
//! end-of-central-directory record. Payloads are raw-deflated and, when an
//! obfuscated password is attached, encrypted behind a 12-byte header.
//!
//! Two layouts are supported. [`ContainerBuilder::build`] keeps every
//! payload inside the returned buffer. [`ContainerBuilder::build_split`]
//! writes payloads into numbered disk images and returns a directory-only
//! buffer, like the `.z01`/`.zip` sets served by the CDN.

use crate::container::central_directory::{
    COMPRESSION_DEFLATE, CENTRAL_DIR_SIGNATURE, CentralDirectoryHeader, FLAG_ENCRYPTED,
};
use crate::container::entry::{DiffType, DosDateTime};
use crate::container::eocd::EndOfCentralDirectory;
use crate::container::error::{ContainerError, ContainerResult, FormatError};
use crate::container::extra_field::{DiffDescriptor, ExtraFields};
use crate::container::local_header::{LOCAL_HEADER_SIGNATURE, LocalFileHeader};
use binrw::BinWrite;
use binrw::io::Cursor;
use flate2::Compression;
use flate2::write::DeflateEncoder;
use ssn_crypto::{CipherKeys, ENCRYPTION_HEADER_LEN, LegacyCipher, decode_password};
use std::io::Write;

const VERSION: u16 = 20;

/// One entry to be written
#[derive(Debug, Clone)]
pub struct BuilderEntry {
    name: String,
    data: Vec<u8>,
    password: Option<Vec<u8>>,
    diff: Option<DiffDescriptor>,
    last_modified: DosDateTime,
    compression: u16,
}

impl BuilderEntry {
    /// Entry with plain content and no extra fields
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            password: None,
            diff: None,
            last_modified: DosDateTime::from_dos(0x4421, 0),
            compression: COMPRESSION_DEFLATE,
        }
    }

    /// Encrypt with keys derived from this obfuscated password
    #[must_use]
    pub fn with_password(mut self, raw: impl Into<Vec<u8>>) -> Self {
        self.password = Some(raw.into());
        self
    }

    /// Attach a diff descriptor
    #[must_use]
    pub fn with_diff(mut self, diff_type: DiffType, source_length: u64, dest_length: u64) -> Self {
        self.diff = Some(DiffDescriptor::new(diff_type as u32, source_length, dest_length));
        self
    }

    /// Attach a diff descriptor with an arbitrary raw type
    #[must_use]
    pub fn with_raw_diff(mut self, descriptor: DiffDescriptor) -> Self {
        self.diff = Some(descriptor);
        self
    }

    /// Set the modification time
    #[must_use]
    pub fn with_modified(mut self, modified: DosDateTime) -> Self {
        self.last_modified = modified;
        self
    }

    /// Override the compression method recorded in the headers
    ///
    /// The payload is still deflated; only the recorded method changes.
    #[must_use]
    pub fn with_compression_method(mut self, method: u16) -> Self {
        self.compression = method;
        self
    }

    fn flags(&self) -> u16 {
        if self.password.is_some() {
            FLAG_ENCRYPTED
        } else {
            0
        }
    }

    /// Deflated and optionally encrypted payload
    fn stored_payload(&self, crc: u32) -> ContainerResult<Vec<u8>> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&self.data)?;
        let compressed = encoder.finish()?;

        let Some(raw) = &self.password else {
            return Ok(compressed);
        };

        let keys = CipherKeys::derive(&decode_password(raw));
        let mut header = [0u8; ENCRYPTION_HEADER_LEN];
        header[ENCRYPTION_HEADER_LEN - 1] = (crc >> 24) as u8;

        let mut cipher = LegacyCipher::new(keys);
        let mut stored = cipher.encrypt(&header);
        stored.extend(cipher.encrypt(&compressed));
        Ok(stored)
    }
}

/// Stored entry awaiting its directory record
struct Written {
    entry: BuilderEntry,
    crc: u32,
    compressed_size: u32,
    disk: u16,
    offset: u32,
}

/// Container produced by [`ContainerBuilder::build_split`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitContainer {
    /// Disk images holding the local records, in disk order
    pub disks: Vec<Vec<u8>>,
    /// Central directory plus end record, with a zero directory offset
    pub directory: Vec<u8>,
}

/// Builder for patch containers
#[derive(Debug, Clone, Default)]
pub struct ContainerBuilder {
    entries: Vec<BuilderEntry>,
}

impl ContainerBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry
    pub fn add(&mut self, entry: BuilderEntry) -> &mut Self {
        self.entries.push(entry);
        self
    }

    /// Add a plain file with no extra fields
    pub fn add_file(&mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> &mut Self {
        self.add(BuilderEntry::new(name, data))
    }

    /// Number of entries added so far
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries were added
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build a self-contained container
    pub fn build(&self) -> ContainerResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut written = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let offset = to_u32(out.len())?;
            let record = write_local_record(entry, &mut out)?;
            written.push(Written {
                disk: 0,
                offset,
                ..record
            });
        }

        let directory_offset = to_u32(out.len())?;
        write_directory(&written, directory_offset, &mut out)?;
        Ok(out)
    }

    /// Build with payloads spread over disk images of at most `disk_size` bytes
    ///
    /// Local records may straddle disk boundaries.
    pub fn build_split(&self, disk_size: usize) -> ContainerResult<SplitContainer> {
        let disk_size = disk_size.max(1);
        let mut stream = Vec::new();
        let mut written = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let start = stream.len();
            let record = write_local_record(entry, &mut stream)?;
            written.push(Written {
                disk: u16::try_from(start / disk_size).map_err(|_| out_of_range("disk index"))?,
                offset: to_u32(start % disk_size)?,
                ..record
            });
        }

        let disks = stream.chunks(disk_size).map(<[u8]>::to_vec).collect();
        let mut directory = Vec::new();
        write_directory(&written, 0, &mut directory)?;
        Ok(SplitContainer { disks, directory })
    }
}

fn out_of_range(what: &'static str) -> ContainerError {
    FormatError::OutOfBounds { what, offset: 0 }.into()
}

fn to_u32(value: usize) -> ContainerResult<u32> {
    u32::try_from(value).map_err(|_| out_of_range("container offset"))
}

fn to_u16(value: usize, what: &'static str) -> ContainerResult<u16> {
    u16::try_from(value).map_err(|_| out_of_range(what))
}

/// Append the local header, name and payload of `entry`
fn write_local_record(entry: &BuilderEntry, out: &mut Vec<u8>) -> ContainerResult<Written> {
    let crc = crc32fast::hash(&entry.data);
    let payload = entry.stored_payload(crc)?;
    let (date, time) = entry.last_modified.to_dos();

    let header = LocalFileHeader {
        signature: LOCAL_HEADER_SIGNATURE,
        version_needed: VERSION,
        flags: entry.flags(),
        compression: entry.compression,
        last_mod_time: time,
        last_mod_date: date,
        crc32: crc,
        compressed_size: to_u32(payload.len())?,
        uncompressed_size: to_u32(entry.data.len())?,
        file_name_length: to_u16(entry.name.len(), "file name")?,
        extra_field_length: 0,
    };
    let mut encoded = Vec::new();
    header.write(&mut Cursor::new(&mut encoded))?;
    out.extend_from_slice(&encoded);
    out.extend_from_slice(entry.name.as_bytes());
    out.extend_from_slice(&payload);

    Ok(Written {
        entry: entry.clone(),
        crc,
        compressed_size: header.compressed_size,
        disk: 0,
        offset: 0,
    })
}

/// Append the central directory and end record
fn write_directory(
    written: &[Written],
    directory_offset: u32,
    out: &mut Vec<u8>,
) -> ContainerResult<()> {
    let start = out.len();
    for record in written {
        let entry = &record.entry;
        let extra = ExtraFields {
            password: entry.password.clone(),
            diff: entry.diff.clone(),
        }
        .to_bytes()?;
        let (date, time) = entry.last_modified.to_dos();

        let header = CentralDirectoryHeader {
            signature: CENTRAL_DIR_SIGNATURE,
            version_made_by: VERSION,
            version_needed: VERSION,
            flags: entry.flags(),
            compression: entry.compression,
            last_mod_time: time,
            last_mod_date: date,
            crc32: record.crc,
            compressed_size: record.compressed_size,
            uncompressed_size: to_u32(entry.data.len())?,
            file_name_length: to_u16(entry.name.len(), "file name")?,
            extra_field_length: to_u16(extra.len(), "extra field")?,
            comment_length: 0,
            disk_number_start: record.disk,
            internal_attributes: 0,
            external_attributes: 0,
            local_header_offset: record.offset,
        };
        let mut encoded = Vec::new();
        header.write(&mut Cursor::new(&mut encoded))?;
        out.extend_from_slice(&encoded);
        out.extend_from_slice(entry.name.as_bytes());
        out.extend_from_slice(&extra);
    }

    let size = to_u32(out.len() - start)?;
    let count = to_u16(written.len(), "entry count")?;
    let mut encoded = Vec::new();
    EndOfCentralDirectory::new(count, size, directory_offset).write(&mut Cursor::new(&mut encoded))?;
    out.extend_from_slice(&encoded);
    Ok(())
}
