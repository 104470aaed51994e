//! Solid package (`.solidpkg`) support
//!
//! Every patch hop is announced by a `.solidpkg`: a container holding one
//! Bencode metafile, `metafile.solid`, that lists the disk images and the
//! directory `.zip` making up the hop.

pub mod bencode;
mod error;
mod package;

pub use error::{SolidError, SolidResult};
pub use package::{
    METAFILE_NAME, PIECE_LENGTHS, SolidFile, SolidPackage, expected_file_names, hop_base_name,
};
