//! File format parsers and builders for Solid State Networks patches
//!
//! This crate reads the file formats a patch client handles before any
//! file is installed:
//!
//! - **Container**: the ZIP-like container used for `.solidpkg`,
//!   `.patchmanifest` and the `.zip` directory of a patch hop, with its
//!   private password and diff-descriptor extra fields
//! - **Solid package**: the Bencode `metafile.solid` listing the disk images
//!   of a patch hop
//! - **Patch manifest**: the `manifest.xml` inside a product's
//!   `.patchmanifest`, naming the current release and every update path
//!
//! Entry payloads are decrypted with [`ssn_crypto`] and inflated lazily by
//! [`container::EntryReader`].
//!
//! # Design Principles
//!
//! - **Fail loudly**: any structure outside what the packaging pipeline emits
//!   is an error, never a guess
//! - **Symmetric Operations**: every parser has a builder, used for tests and
//!   tooling
//! - **No partial results**: a parse either yields every entry or an error

#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::doc_markdown)] // Product and file names don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::return_self_not_must_use)] // Builder patterns
#![warn(missing_docs)]

pub mod container;
pub mod manifest;
pub mod solid;

pub use container::{Container, ContainerError, DiffType, FileEntry};
pub use manifest::{ManifestError, ManifestRelease, PatchManifest};
pub use solid::{SolidError, SolidPackage};
