//! Three-word cipher key state

use crate::crc::crc32_step;
use crate::error::CryptoError;
use std::fmt;
use std::str::FromStr;

/// Initial key words before any password byte is folded in
pub const INITIAL_KEYS: [u32; 3] = [0x1234_5678, 0x2345_6789, 0x3456_7890];

/// Multiplier of the linear congruential step on `key1`
const KEY1_MULTIPLIER: u32 = 134_775_813;

/// Cipher key state (three 32-bit words)
///
/// The state is advanced once per processed byte. A value is `Copy` so that
/// a parsed entry can hand an independent copy to every stream that decrypts
/// it; the state itself is never shared between streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CipherKeys {
    /// CRC register fed with plaintext bytes
    pub key0: u32,
    /// Linear congruential register
    pub key1: u32,
    /// CRC register fed with the top byte of `key1`
    pub key2: u32,
}

impl Default for CipherKeys {
    fn default() -> Self {
        Self::from_words(INITIAL_KEYS)
    }
}

impl CipherKeys {
    /// Create from raw words
    pub const fn from_words([key0, key1, key2]: [u32; 3]) -> Self {
        Self { key0, key1, key2 }
    }

    /// Raw words
    pub const fn words(&self) -> [u32; 3] {
        [self.key0, self.key1, self.key2]
    }

    /// Derive the key state from de-obfuscated password bytes
    ///
    /// Derivation stops at the first zero byte.
    pub fn derive(password: &[u8]) -> Self {
        let mut keys = Self::default();
        for &byte in password.iter().take_while(|&&b| b != 0) {
            keys.update(byte);
        }
        keys
    }

    /// Advance the state with one plaintext byte
    #[inline]
    pub fn update(&mut self, byte: u8) {
        self.key0 = crc32_step(self.key0, byte);
        self.key1 = self
            .key1
            .wrapping_add(self.key0 & 0xFF)
            .wrapping_mul(KEY1_MULTIPLIER)
            .wrapping_add(1);
        self.key2 = crc32_step(self.key2, (self.key1 >> 24) as u8);
    }

    /// Keystream byte for the current state
    #[inline]
    pub fn stream_byte(&self) -> u8 {
        let temp = (self.key2 | 2) & 0xFFFF;
        ((temp * (temp ^ 1)) >> 8) as u8
    }
}

impl fmt::Display for CipherKeys {
    /// Comma-separated decimal words, as accepted by the installer helper
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.key0, self.key1, self.key2)
    }
}

impl FromStr for CipherKeys {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let words: Vec<u32> = s
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<u32>()
                    .map_err(|e| CryptoError::InvalidKeyFormat(format!("{part:?}: {e}")))
            })
            .collect::<Result<_, _>>()?;

        let words: [u32; 3] = words.try_into().map_err(|w: Vec<u32>| {
            CryptoError::InvalidKeyFormat(format!("expected 3 words, got {}", w.len()))
        })?;
        Ok(Self::from_words(words))
    }
}
