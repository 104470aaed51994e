//! Legacy cipher for Solid State Networks patch containers
//!
//! Patch containers produced by the SSN packaging pipeline obfuscate most of
//! their payloads with a rolling-key XOR stream cipher derived from the
//! traditional PKWARE scheme. The password is not stored verbatim: every
//! entry carries an obfuscated password in a private extra field which must
//! first be transformed into the real password bytes.
//!
//! # Components
//!
//! - **Password transform**: [`decode_password`] turns the raw extra-field
//!   bytes into usable password bytes
//! - **Key derivation**: [`CipherKeys::derive`] folds the password into the
//!   three-word key state
//! - **Stream cipher**: [`LegacyCipher`] decrypts (and, for tooling,
//!   encrypts) byte streams; [`DecryptReader`] wraps any [`std::io::Read`]
//!
//! # Examples
//!
//! ```
//! use ssn_crypto::{CipherKeys, LegacyCipher, decode_password};
//!
//! let password = decode_password(b"raw-extra-field");
//! let keys = CipherKeys::derive(&password);
//!
//! let mut data = b"hello".to_vec();
//! LegacyCipher::new(keys).encrypt_in_place(&mut data);
//! LegacyCipher::new(keys).decrypt_in_place(&mut data);
//! assert_eq!(data, b"hello");
//! ```

#![warn(missing_docs)]

pub mod crc;
pub mod error;
pub mod keys;
pub mod password;
pub mod stream;

pub use error::CryptoError;

// Re-export commonly used types
pub use keys::CipherKeys;
pub use password::{MAX_PASSWORD_LEN, decode_password};
pub use stream::{DecryptReader, ENCRYPTION_HEADER_LEN, LegacyCipher};
