//! Error types for patch operations

use reqwest::StatusCode;
use ssn_formats::{ContainerError, ManifestError, SolidError};
use std::path::PathBuf;
use thiserror::Error;

/// One file that could not be installed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    /// Entry name inside the patch
    pub name: String,
    /// Action that failed
    pub action: crate::orchestrator::Action,
    /// Rendered cause
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("unknown product \"{0}\"")]
    UnknownProduct(String),

    #[error("release {value} out of range for {what}")]
    InvalidRelease { what: &'static str, value: i32 },

    #[error("invalid release range {from} -> {to}")]
    InvalidRange { from: i32, to: i32 },

    #[error("no known release path for {product} from {from} to {to}")]
    NoRoute {
        product: crate::product::Product,
        from: i32,
        to: i32,
    },

    #[error("a source directory is required when patching from release {0}")]
    MissingSourceDir(i32),

    #[error("patch validation failed: {0}")]
    Validation(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("HTTP status {status} for {url}")]
    HttpStatus { url: String, status: StatusCode },

    #[error("size mismatch for {url}: expected {expected} bytes, received {actual}")]
    SizeMismatch {
        url: String,
        expected: u64,
        actual: u64,
    },

    #[error("{url} is {size} bytes, larger than the in-memory limit of {limit}")]
    TooLarge { url: String, size: u64, limit: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error on {path}: {source}")]
    Path {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Solid(#[from] SolidError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("no disk file {disk} for entry \"{name}\"")]
    MissingDisk { name: String, disk: u16 },

    #[error("entry \"{0}\" needs a binary diff, which the inline installer cannot apply")]
    DiffUnsupported(String),

    #[error("installer {program} failed: {message}")]
    InstallerFailed { program: PathBuf, message: String },

    #[error("{} file(s) failed: {}", .0.len(), failed_names(.0))]
    FileFailures(Vec<FileFailure>),

    #[error("configuration error: {0}")]
    Config(String),
}

fn failed_names(failures: &[FileFailure]) -> String {
    failures
        .iter()
        .map(|f| f.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl PatchError {
    /// Attach a path to an I/O error
    pub(crate) fn at(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Path { path, source }
    }
}

pub type Result<T> = std::result::Result<T, PatchError>;
