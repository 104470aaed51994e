//! Patch manifest error types

use crate::container::ContainerError;
use thiserror::Error;

/// Errors raised while reading a `.patchmanifest` or its `manifest.xml`
#[derive(Debug, Error)]
pub enum ManifestError {
    /// `manifest.xml` is not well-formed XML
    #[error("malformed manifest XML: {0}")]
    Xml(String),

    /// XML is well-formed but a required value is missing or unreadable
    #[error("invalid manifest: {0}")]
    Invalid(String),

    /// Manifest container does not hold exactly `manifest.xml`
    #[error("unexpected manifest contents: {0}")]
    UnexpectedContents(String),

    /// Container parsing or extraction failed
    #[error(transparent)]
    Container(#[from] ContainerError),
}

/// Result type for patch manifest operations
pub type ManifestResult<T> = Result<T, ManifestError>;
