//! Define this crate error type.

use std::{array::TryFromSliceError, num::TryFromIntError};

use cosmian_crypto_core::CryptoCoreError;
use thiserror::Error;

/// Crate error type.
///
/// Each variant is one failure category. `AccessDenied` and
/// `CorruptCiphertext` never carry details: they must not reveal which
/// attribute or which decryption stage caused the failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid policy expression: {0}")]
    Parse(String),
    #[error("setup failed: {0}")]
    Setup(String),
    #[error("key generation failed: {0}")]
    KeyGeneration(String),
    #[error("encryption failed: {0}")]
    Encryption(String),
    #[error("access denied")]
    AccessDenied,
    #[error("corrupt ciphertext")]
    CorruptCiphertext,
    #[error("marshal error: {0}")]
    Marshal(String),
}

impl Error {
    /// Stable short label of the error category, suitable for logs.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Parse(_) => "parse",
            Self::Setup(_) => "setup",
            Self::KeyGeneration(_) => "key_generation",
            Self::Encryption(_) => "encryption",
            Self::AccessDenied => "access_denied",
            Self::CorruptCiphertext => "corrupt_ciphertext",
            Self::Marshal(_) => "marshal",
        }
    }
}

impl From<CryptoCoreError> for Error {
    fn from(e: CryptoCoreError) -> Self {
        Self::Marshal(e.to_string())
    }
}

impl From<TryFromIntError> for Error {
    fn from(e: TryFromIntError) -> Self {
        Self::Marshal(e.to_string())
    }
}

impl From<TryFromSliceError> for Error {
    fn from(e: TryFromSliceError) -> Self {
        Self::Marshal(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Marshal(e.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(e: std::str::Utf8Error) -> Self {
        Self::Marshal(format!("UTF8 error: {e}"))
    }
}
