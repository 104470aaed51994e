//! Streaming extraction of a single entry
//!
//! The payload source is positioned at the entry's local file header. From
//! there the extractor skips the header, limits reading to the stored size,
//! decrypts when the entry carries keys, drops the 12-byte encryption header
//! and inflates the raw deflate stream. Nothing is buffered beyond what the
//! decoder needs.

use crate::container::entry::FileEntry;
use crate::container::error::{ContainerError, ContainerResult};
use crate::container::local_header::{LOCAL_HEADER_LEN, LOCAL_HEADER_SIGNATURE, LocalFileHeader};
use binrw::BinRead;
use binrw::io::Cursor;
use flate2::read::DeflateDecoder;
use ssn_crypto::{DecryptReader, ENCRYPTION_HEADER_LEN};
use std::io::{self, Read, Take, Write};

/// Stored payload, optionally behind the cipher
enum Payload<R> {
    Plain(Take<R>),
    Encrypted(DecryptReader<Take<R>>),
}

impl<R: Read> Read for Payload<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plain(inner) => inner.read(buf),
            Self::Encrypted(inner) => inner.read(buf),
        }
    }
}

/// Lazy reader over the decompressed content of one entry
///
/// Reading consumes the underlying source; an entry can be read once.
pub struct EntryReader<R> {
    name: String,
    decoder: DeflateDecoder<Payload<R>>,
}

impl<R: Read> EntryReader<R> {
    /// Open `entry` from a source positioned at its local file header
    pub fn new(entry: &FileEntry, mut source: R) -> ContainerResult<Self> {
        let mut raw = [0u8; LOCAL_HEADER_LEN];
        source.read_exact(&mut raw)?;
        let header = LocalFileHeader::read(&mut Cursor::new(&raw[..]))?;
        if header.signature != LOCAL_HEADER_SIGNATURE {
            return Err(ContainerError::BadLocalHeader {
                name: entry.name.clone(),
                found: header.signature,
            });
        }

        let skip = header.variable_len();
        let skipped = io::copy(&mut (&mut source).take(skip), &mut io::sink())?;
        if skipped != skip {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }

        let stored = source.take(u64::from(entry.compressed_size));
        let payload = match entry.encryption_keys {
            Some(keys) => {
                let mut reader = DecryptReader::new(stored, keys);
                let mut discard = [0u8; ENCRYPTION_HEADER_LEN];
                reader
                    .read_exact(&mut discard)
                    .map_err(|source| ContainerError::Decompression {
                        name: entry.name.clone(),
                        source,
                    })?;
                Payload::Encrypted(reader)
            }
            None => Payload::Plain(stored),
        };

        Ok(Self {
            name: entry.name.clone(),
            decoder: DeflateDecoder::new(payload),
        })
    }

    /// Name of the entry being read
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read the remaining content into memory
    pub fn read_to_vec(mut self) -> ContainerResult<Vec<u8>> {
        let mut out = Vec::new();
        self.decoder
            .read_to_end(&mut out)
            .map_err(|source| ContainerError::Decompression {
                name: self.name.clone(),
                source,
            })?;
        Ok(out)
    }

    /// Stream the remaining content into `writer`, returning the byte count
    pub fn copy_to<W: Write>(mut self, writer: &mut W) -> ContainerResult<u64> {
        let mut buffer = [0u8; 64 * 1024];
        let mut total = 0u64;
        loop {
            let n = self
                .decoder
                .read(&mut buffer)
                .map_err(|source| ContainerError::Decompression {
                    name: self.name.clone(),
                    source,
                })?;
            if n == 0 {
                break;
            }
            writer.write_all(&buffer[..n])?;
            total += n as u64;
        }
        Ok(total)
    }
}

impl<R: Read> Read for EntryReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.decoder.read(buf)
    }
}
