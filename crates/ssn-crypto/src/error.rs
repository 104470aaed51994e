//! Error types for cryptographic operations

use thiserror::Error;

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// Obfuscated password exceeds the size the packaging pipeline emits
    #[error("Password is too long: {actual} bytes (at most {max} allowed)")]
    PasswordTooLong {
        /// Maximum allowed length in bytes
        max: usize,
        /// Actual length in bytes
        actual: usize,
    },

    /// Invalid textual key format
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),
}
