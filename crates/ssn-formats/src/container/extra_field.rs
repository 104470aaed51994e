//! Extra fields attached to central directory records
//!
//! Only two tags ever appear in these containers: the obfuscated password
//! (`0x8810`) and the diff descriptor (`0x80AE`). Any other tag is rejected.

use crate::container::error::{ContainerError, ContainerResult, FormatError};
use binrw::io::Cursor;
use binrw::{BinRead, BinWrite};
use ssn_crypto::password::check_password_len;

/// Tag of the obfuscated password field
pub const PASSWORD_TAG: u16 = 0x8810;

/// Tag of the diff descriptor field
pub const DIFF_DESCRIPTOR_TAG: u16 = 0x80AE;

/// Payload length of a diff descriptor
pub const DIFF_DESCRIPTOR_LEN: u16 = 60;

/// Diff descriptor payload (60 bytes, little-endian)
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct DiffDescriptor {
    /// Raw diff type, see [`DiffType`](crate::container::DiffType)
    pub diff_type: u32,
    /// Length of the file the diff applies to
    pub source_length: u64,
    /// Length of the file the diff produces
    pub dest_length: u64,
    /// Content hash of the source file, not used for installation
    pub source_hash: [u8; 20],
    /// Content hash of the produced file, not used for installation
    pub dest_hash: [u8; 20],
}

impl DiffDescriptor {
    /// Descriptor with zeroed hashes
    pub fn new(diff_type: u32, source_length: u64, dest_length: u64) -> Self {
        Self {
            diff_type,
            source_length,
            dest_length,
            source_hash: [0; 20],
            dest_hash: [0; 20],
        }
    }
}

/// Decoded extra field block of one record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraFields {
    /// Raw obfuscated password bytes
    pub password: Option<Vec<u8>>,
    /// Diff descriptor
    pub diff: Option<DiffDescriptor>,
}

impl ExtraFields {
    /// Walk the `(tag, length, payload)` triples of an extra block
    ///
    /// `base` is the offset of `block` inside the container and is used for
    /// error positions only. Fewer than four trailing bytes are ignored.
    pub fn parse(block: &[u8], base: usize, name: &str) -> ContainerResult<Self> {
        let mut fields = Self::default();
        let mut pos = 0;

        while pos + 4 <= block.len() {
            let tag = u16::from_le_bytes([block[pos], block[pos + 1]]);
            let len = u16::from_le_bytes([block[pos + 2], block[pos + 3]]);
            let start = pos + 4;
            let end = start + usize::from(len);
            let payload = block.get(start..end).ok_or(FormatError::OutOfBounds {
                what: "extra field",
                offset: base + pos,
            })?;

            match tag {
                PASSWORD_TAG => {
                    check_password_len(payload).map_err(|source| {
                        ContainerError::PasswordTooLong {
                            name: name.to_string(),
                            source,
                        }
                    })?;
                    fields.password = Some(payload.to_vec());
                }
                DIFF_DESCRIPTOR_TAG => {
                    if len != DIFF_DESCRIPTOR_LEN {
                        return Err(FormatError::BadDiffDescriptor(len).into());
                    }
                    let descriptor = DiffDescriptor::read(&mut Cursor::new(payload)).map_err(
                        |_| FormatError::OutOfBounds {
                            what: "diff descriptor",
                            offset: base + start,
                        },
                    )?;
                    fields.diff = Some(descriptor);
                }
                other => {
                    return Err(ContainerError::UnknownExtraField {
                        name: name.to_string(),
                        tag: other,
                    });
                }
            }
            pos = end;
        }

        Ok(fields)
    }

    /// Encode back into an extra block, password first
    pub fn to_bytes(&self) -> ContainerResult<Vec<u8>> {
        let mut out = Vec::new();
        if let Some(password) = &self.password {
            check_password_len(password).map_err(|source| ContainerError::PasswordTooLong {
                name: String::new(),
                source,
            })?;
            out.extend_from_slice(&PASSWORD_TAG.to_le_bytes());
            out.extend_from_slice(&(password.len() as u16).to_le_bytes());
            out.extend_from_slice(password);
        }
        if let Some(diff) = &self.diff {
            out.extend_from_slice(&DIFF_DESCRIPTOR_TAG.to_le_bytes());
            out.extend_from_slice(&DIFF_DESCRIPTOR_LEN.to_le_bytes());
            let mut payload = Vec::with_capacity(usize::from(DIFF_DESCRIPTOR_LEN));
            diff.write(&mut Cursor::new(&mut payload))?;
            out.extend_from_slice(&payload);
        }
        Ok(out)
    }
}
