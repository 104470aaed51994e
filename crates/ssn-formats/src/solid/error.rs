//! Solid package error types

use crate::container::ContainerError;
use thiserror::Error;

/// Errors raised while reading a `.solidpkg` or its metafile
#[derive(Debug, Error)]
pub enum SolidError {
    /// Malformed Bencode
    #[error("bencode error at offset {offset}: {reason}")]
    Bencode {
        /// Byte offset of the failure
        offset: usize,
        /// What was wrong
        reason: &'static str,
    },

    /// Metafile decoded but does not describe the expected patch
    #[error("invalid metafile: {0}")]
    Invalid(String),

    /// Package container does not hold exactly `metafile.solid`
    #[error("unexpected package contents: {0}")]
    UnexpectedContents(String),

    /// Container parsing or extraction failed
    #[error(transparent)]
    Container(#[from] ContainerError),
}

/// Result type for solid package operations
pub type SolidResult<T> = Result<T, SolidError>;
