//! Single-byte CRC-32 step used by the key schedule
//!
//! The cipher advances two of its three key words with one table-driven
//! CRC-32 round per byte. Only the raw step is needed, so the standard
//! reflected table (polynomial `0xEDB88320`) is built at compile time.

/// Reflected CRC-32 polynomial
pub const CRC32_POLYNOMIAL: u32 = 0xEDB8_8320;

/// Lookup table for [`crc32_step`]
pub static CRC32_TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 == 0 {
                c >> 1
            } else {
                CRC32_POLYNOMIAL ^ (c >> 1)
            };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

/// Advance a CRC-32 register by one byte
///
/// `table[(key ^ byte) & 0xFF] ^ (key >> 8)`
#[inline]
pub fn crc32_step(key: u32, byte: u8) -> u32 {
    CRC32_TABLE[((key ^ u32::from(byte)) & 0xFF) as usize] ^ (key >> 8)
}
