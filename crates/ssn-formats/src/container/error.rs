//! Container error types

use ssn_crypto::CryptoError;
use thiserror::Error;

/// Structural problems in the container layout
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FormatError {
    /// No end-of-central-directory signature anywhere in the buffer
    #[error("end of central directory signature not found")]
    EocdNotFound,

    /// Declared central directory cannot hold the declared entry count
    #[error("central directory too small: {size} bytes for {entries} entries")]
    TruncatedCentralDir {
        /// Declared central directory size
        size: u32,
        /// Declared entry count
        entries: u16,
    },

    /// Central directory would start before the beginning of the buffer
    #[error("central directory start is negative: eocd at {eocd_offset}, size {size}")]
    NegativeCentralDirStart {
        /// Offset of the end-of-central-directory record
        eocd_offset: usize,
        /// Declared central directory size
        size: u32,
    },

    /// A record inside the central directory has the wrong signature
    #[error("bad central directory signature at offset {offset}: 0x{found:08X}")]
    BadCentralDirSignature {
        /// Offset of the record
        offset: usize,
        /// Signature found instead
        found: u32,
    },

    /// A field reaches past the end of the buffer
    #[error("{what} at offset {offset} runs past the end of the container")]
    OutOfBounds {
        /// Which structure was being read
        what: &'static str,
        /// Offset the read started at
        offset: usize,
    },

    /// File name bytes are not UTF-8
    #[error("file name at offset {offset} is not valid UTF-8")]
    InvalidFileName {
        /// Offset of the name bytes
        offset: usize,
    },

    /// Diff descriptor carries a diff type outside 0..=3
    #[error("unknown diff type {0}")]
    UnknownDiffType(u32),

    /// Diff descriptor has an unexpected payload length
    #[error("diff descriptor has length {0}, expected 60")]
    BadDiffDescriptor(u16),

    /// Payload offset of an entry resolves before the start of the buffer
    #[error("payload offset of {name} resolves before the start of the container")]
    NegativePayloadOffset {
        /// Entry name
        name: String,
    },
}

/// Errors raised while parsing or extracting container entries
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Structural error in the directory layout
    #[error("invalid container format: {0}")]
    Format(#[from] FormatError),

    /// Entry uses a compression method other than deflate
    #[error("unsupported compression method {method} for {name}")]
    UnsupportedCompression {
        /// Entry name
        name: String,
        /// Compression method field
        method: u16,
    },

    /// Extra field tag other than password or diff descriptor
    #[error("unknown extra field 0x{tag:04X} in {name}")]
    UnknownExtraField {
        /// Entry name
        name: String,
        /// Tag found
        tag: u16,
    },

    /// Entry is flagged encrypted but carries no password field
    #[error("{0} is encrypted but has no password")]
    MissingPassword(String),

    /// Password field is longer than allowed
    #[error("password field of {name}: {source}")]
    PasswordTooLong {
        /// Entry name
        name: String,
        /// Underlying length check
        source: CryptoError,
    },

    /// Local file header does not carry the expected signature
    #[error("bad local file header for {name}: 0x{found:08X}")]
    BadLocalHeader {
        /// Entry name
        name: String,
        /// Signature found instead
        found: u32,
    },

    /// Inflate failed or the payload ended early
    #[error("failed to decompress {name}: {source}")]
    Decompression {
        /// Entry name
        name: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Entry payload lives in an external disk file
    #[error("{0} is stored in a disk file, not in the container buffer")]
    NotEmbedded(String),

    /// I/O error on the payload source
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary writing error from the builder
    #[error("binary encoding error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Result type for container operations
pub type ContainerResult<T> = Result<T, ContainerError>;
