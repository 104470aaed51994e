//! Patch manifest (`.patchmanifest`) support
//!
//! Every product publishes a `.patchmanifest`: a container holding one
//! entry, `manifest.xml`, that names the release clients should be on and
//! lists every release with its SHA-1 and the update paths between them.
//!
//! Only the values a patch client needs are read. Elements the reader does
//! not know about are skipped rather than rejected.

mod document;
mod error;

pub use document::{MANIFEST_NAME, ManifestRelease, PatchManifest};
pub use error::{ManifestError, ManifestResult};
