//! Password de-obfuscation
//!
//! The password extra field (`0x8810`) does not hold the password itself.
//! Each byte is shifted by a position-dependent amount and folded back into
//! the printable ASCII range before it can be fed to the key schedule.

use crate::error::CryptoError;

/// Longest obfuscated password the packaging pipeline emits
pub const MAX_PASSWORD_LEN: usize = 120;

/// Reject passwords longer than [`MAX_PASSWORD_LEN`]
pub fn check_password_len(raw: &[u8]) -> Result<(), CryptoError> {
    if raw.len() > MAX_PASSWORD_LEN {
        return Err(CryptoError::PasswordTooLong {
            max: MAX_PASSWORD_LEN,
            actual: raw.len(),
        });
    }
    Ok(())
}

/// Transform a single obfuscated byte at position `index`
#[inline]
pub fn decode_password_byte(byte: u8, index: usize) -> u8 {
    // (1 << (i mod 32)) mod 256: zero once the bit leaves the low byte
    let shift = (1u32 << (index % 32)) as u8;
    let mut c = byte.wrapping_add(shift);

    if c > 0x7E {
        c = if c == 0xFF || c == 0x7F { 0x3F } else { c & 0x7F };
    }
    if c < 0x21 {
        c = (c | (1 << ((c % 3) + 5))).wrapping_add(1);
    }
    c
}

/// Turn the raw extra-field bytes into usable password bytes
///
/// Processing stops at the first zero byte; the returned password never
/// contains a zero byte.
///
/// # Examples
///
/// ```
/// use ssn_crypto::decode_password;
///
/// assert_eq!(decode_password(&[0x40, 0x40, 0x00, 0x40]), vec![0x41, 0x42]);
/// ```
pub fn decode_password(raw: &[u8]) -> Vec<u8> {
    raw.iter()
        .take_while(|&&b| b != 0)
        .enumerate()
        .map(|(i, &b)| decode_password_byte(b, i))
        .collect()
}
