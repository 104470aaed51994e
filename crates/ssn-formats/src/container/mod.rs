//! Patch container format
//!
//! Patches are shipped as ZIP-like containers. A `.solidpkg` carries its
//! single payload inside the same buffer; a patch hop splits its payloads
//! over numbered disk images (`.z01`, `.z02`, ...) and ships the central
//! directory in a final `.zip` file.
//!
//! # Format Structure
//!
//! ```text
//! Container:
//! ├── Local records (embedded containers only)
//! │   ├── Local file header (30 bytes, "PK\x03\x04")
//! │   ├── File name
//! │   └── Payload: [12-byte encryption header] + raw deflate stream
//! ├── Central directory (one record per entry)
//! │   ├── Fixed header (46 bytes, "PK\x01\x02")
//! │   ├── File name (UTF-8)
//! │   ├── Extra fields
//! │   │   ├── 0x8810: obfuscated password (at most 120 bytes)
//! │   │   └── 0x80AE: diff descriptor (type, source length, dest length)
//! │   └── Comment (skipped)
//! └── End of central directory (22 bytes, "PK\x05\x06")
//! ```
//!
//! A non-zero central directory offset in the end record means payloads are
//! embedded, and every local header offset is rebased onto the buffer. A
//! zero offset means payloads live in disk files and offsets are relative to
//! the entry's starting disk.
//!
//! # Usage
//!
//! ```
//! use ssn_formats::container::{Container, ContainerBuilder};
//!
//! let mut builder = ContainerBuilder::new();
//! builder.add_file("manifest.xml", b"<manifest/>".to_vec());
//! let data = builder.build()?;
//!
//! let container = Container::parse(&data)?;
//! let entry = container.find("manifest.xml").expect("entry present");
//! let content = Container::open_embedded(&data, entry)?.read_to_vec()?;
//! assert_eq!(content, b"<manifest/>");
//! # Ok::<(), ssn_formats::container::ContainerError>(())
//! ```

mod builder;
mod central_directory;
mod entry;
mod eocd;
mod error;
mod extra_field;
mod extract;
mod local_header;

pub use builder::{BuilderEntry, ContainerBuilder, SplitContainer};
pub use central_directory::{
    CENTRAL_DIR_HEADER_LEN, CENTRAL_DIR_SIGNATURE, COMPRESSION_DEFLATE, CentralDirectoryHeader,
    FLAG_ENCRYPTED,
};
pub use entry::{DiffType, DosDateTime, FileEntry};
pub use eocd::{EOCD_LEN, EOCD_SIGNATURE, EndOfCentralDirectory};
pub use error::{ContainerError, ContainerResult, FormatError};
pub use extra_field::{
    DIFF_DESCRIPTOR_LEN, DIFF_DESCRIPTOR_TAG, DiffDescriptor, ExtraFields, PASSWORD_TAG,
};
pub use extract::EntryReader;
pub use local_header::{LOCAL_HEADER_LEN, LOCAL_HEADER_SIGNATURE, LocalFileHeader};

use ssn_crypto::{CipherKeys, decode_password};
use std::io::Read;

/// Parsed central directory of a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    entries: Vec<FileEntry>,
}

impl Container {
    /// Parse the central directory of an in-memory container
    ///
    /// Entries are returned in directory order. Any structural problem
    /// fails the whole parse; no partial result is produced.
    pub fn parse(data: &[u8]) -> ContainerResult<Self> {
        let (eocd_offset, eocd) = EndOfCentralDirectory::locate(data)?;
        let directory_start = eocd.central_dir_start(eocd_offset)?;
        let embedded = eocd.central_dir_offset > 0;

        let mut entries = Vec::with_capacity(usize::from(eocd.entry_count));
        let mut pos = directory_start;
        for _ in 0..eocd.entry_count {
            let header = CentralDirectoryHeader::read_at(data, pos)?;

            let name_start = pos + CENTRAL_DIR_HEADER_LEN;
            let name_end = name_start + usize::from(header.file_name_length);
            let name_bytes = data
                .get(name_start..name_end)
                .ok_or(FormatError::OutOfBounds {
                    what: "file name",
                    offset: name_start,
                })?;
            let name = std::str::from_utf8(name_bytes)
                .map_err(|_| FormatError::InvalidFileName { offset: name_start })?
                .to_string();

            if header.compression != COMPRESSION_DEFLATE {
                return Err(ContainerError::UnsupportedCompression {
                    name,
                    method: header.compression,
                });
            }

            let extra_end = name_end + usize::from(header.extra_field_length);
            let extra = data
                .get(name_end..extra_end)
                .ok_or(FormatError::OutOfBounds {
                    what: "extra field block",
                    offset: name_end,
                })?;
            let fields = ExtraFields::parse(extra, name_end, &name)?;

            let encryption_keys = if header.is_encrypted() {
                let raw = fields
                    .password
                    .as_deref()
                    .ok_or_else(|| ContainerError::MissingPassword(name.clone()))?;
                Some(CipherKeys::derive(&decode_password(raw)))
            } else {
                None
            };

            let (diff_type, diff_source_length, diff_dest_length) = match fields.diff {
                Some(descriptor) => {
                    let diff_type = DiffType::try_from(descriptor.diff_type)?;
                    if diff_type == DiffType::Changed {
                        (
                            Some(diff_type),
                            Some(descriptor.source_length as u32),
                            Some(descriptor.dest_length as u32),
                        )
                    } else {
                        (Some(diff_type), None, None)
                    }
                }
                None => (None, None, None),
            };

            let relative = u64::from(header.local_header_offset);
            let offset = if embedded {
                (directory_start as u64 + relative)
                    .checked_sub(u64::from(eocd.central_dir_offset))
                    .ok_or_else(|| FormatError::NegativePayloadOffset { name: name.clone() })?
            } else {
                relative
            };

            entries.push(FileEntry {
                name,
                size: header.uncompressed_size,
                compressed_size: header.compressed_size,
                crc: header.crc32,
                flags: header.flags,
                last_modified: DosDateTime::from_dos(header.last_mod_date, header.last_mod_time),
                disk_number_start: header.disk_number_start,
                offset,
                embedded,
                encryption_keys,
                diff_type,
                diff_source_length,
                diff_dest_length,
            });

            pos += header.record_len();
        }

        Ok(Self { entries })
    }

    /// Entries in directory order
    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    /// Take ownership of the entries
    pub fn into_entries(self) -> Vec<FileEntry> {
        self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the directory is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry with the given name
    pub fn find(&self, name: &str) -> Option<&FileEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Open an entry whose payload lives in `data`
    pub fn open_embedded<'a>(
        data: &'a [u8],
        entry: &FileEntry,
    ) -> ContainerResult<EntryReader<&'a [u8]>> {
        if !entry.is_embedded() {
            return Err(ContainerError::NotEmbedded(entry.name.clone()));
        }
        let start = usize::try_from(entry.offset)
            .ok()
            .filter(|&start| start <= data.len())
            .ok_or(FormatError::OutOfBounds {
                what: "local file header",
                offset: entry.offset as usize,
            })?;
        EntryReader::new(entry, &data[start..])
    }

    /// Open an entry from a reader positioned at its local file header
    pub fn open<R: Read>(entry: &FileEntry, source: R) -> ContainerResult<EntryReader<R>> {
        EntryReader::new(entry, source)
    }
}

impl IntoIterator for Container {
    type Item = FileEntry;
    type IntoIter = std::vec::IntoIter<FileEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_container() {
        let data = ContainerBuilder::new().build().unwrap();
        assert_eq!(data.len(), EOCD_LEN);
        assert!(Container::parse(&data).unwrap().is_empty());
    }

    #[test]
    fn test_single_plain_entry() {
        let mut builder = ContainerBuilder::new();
        builder.add_file("manifest.xml", b"<manifest/>".to_vec());
        let data = builder.build().unwrap();

        let container = Container::parse(&data).unwrap();
        assert_eq!(container.len(), 1);
        let entry = &container.entries()[0];
        assert_eq!(entry.name, "manifest.xml");
        assert_eq!(entry.size, 11);
        assert!(!entry.is_encrypted());
        assert!(entry.is_embedded());
        assert_eq!(entry.offset, 0);
        assert_eq!(entry.diff_type, None);
        assert_eq!(entry.diff_source_length, None);
    }

    #[test]
    fn test_embedded_offsets_are_rebased() {
        let mut builder = ContainerBuilder::new();
        builder.add_file("a", b"first".to_vec());
        builder.add_file("b", b"second".to_vec());
        let built = builder.build().unwrap();

        // Prefix shifts everything; the directory offset in the end record
        // still counts from the original start.
        let mut data = vec![0u8; 100];
        data.extend_from_slice(&built);

        let container = Container::parse(&data).unwrap();
        for entry in container.entries() {
            let header = &data[entry.offset as usize..entry.offset as usize + 4];
            assert_eq!(header, &LOCAL_HEADER_SIGNATURE.to_le_bytes());
        }
        assert_eq!(container.entries()[0].offset, 100);
    }

    #[test]
    fn test_changed_entry_keeps_lengths() {
        let mut builder = ContainerBuilder::new();
        builder.add(BuilderEntry::new("changed.bin", vec![1, 2, 3]).with_diff(
            DiffType::Changed,
            1000,
            2000,
        ));
        builder.add(BuilderEntry::new("new.bin", vec![4]).with_diff(DiffType::NewFile, 7, 8));
        let data = builder.build().unwrap();

        let container = Container::parse(&data).unwrap();
        let changed = container.find("changed.bin").unwrap();
        assert_eq!(changed.diff_type, Some(DiffType::Changed));
        assert_eq!(changed.diff_source_length, Some(1000));
        assert_eq!(changed.diff_dest_length, Some(2000));

        let new = container.find("new.bin").unwrap();
        assert_eq!(new.diff_type, Some(DiffType::NewFile));
        assert_eq!(new.diff_source_length, None);
        assert_eq!(new.diff_dest_length, None);
    }

    #[test]
    fn test_unknown_diff_type() {
        let mut builder = ContainerBuilder::new();
        builder.add(BuilderEntry::new("x", vec![0]).with_raw_diff(DiffDescriptor::new(9, 0, 0)));
        let data = builder.build().unwrap();
        assert!(matches!(
            Container::parse(&data),
            Err(ContainerError::Format(FormatError::UnknownDiffType(9)))
        ));
    }

    #[test]
    fn test_stored_method_rejected() {
        let mut builder = ContainerBuilder::new();
        builder.add(BuilderEntry::new("stored.txt", b"abc".to_vec()).with_compression_method(0));
        let data = builder.build().unwrap();
        assert!(matches!(
            Container::parse(&data),
            Err(ContainerError::UnsupportedCompression { ref name, method: 0 }) if name == "stored.txt"
        ));
    }

    #[test]
    fn test_disk_entries_are_not_embedded() {
        let mut builder = ContainerBuilder::new();
        builder.add_file("a", b"aaaa".to_vec());
        let split = builder.build_split(1024).unwrap();

        let container = Container::parse(&split.directory).unwrap();
        let entry = &container.entries()[0];
        assert!(!entry.is_embedded());
        assert!(matches!(
            Container::open_embedded(&split.directory, entry),
            Err(ContainerError::NotEmbedded(_))
        ));
    }
}
