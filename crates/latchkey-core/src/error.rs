//! Error types for vault operations

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while creating, opening, or saving a vault.
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("not a vault file (bad magic)")]
    Format,

    #[error("unsupported container version: {0}")]
    UnsupportedVersion(u8),

    #[error("unsupported key derivation algorithm id: {0}")]
    UnsupportedKdf(u8),

    /// Wrong master password and a tampered or corrupted file are
    /// deliberately indistinguishable so the error cannot serve as a
    /// password-guessing oracle.
    #[error("cannot decrypt vault: wrong password or corrupted file")]
    Authentication,

    #[error("vault file not found: {0}")]
    VaultNotFound(PathBuf),

    #[error("vault already exists: {0}")]
    VaultExists(PathBuf),

    #[error("vault is locked")]
    VaultLocked,

    #[error("entry not found: {0}")]
    EntryNotFound(String),

    #[error("key derivation error: {0}")]
    KeyDerivation(String),

    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors returned while generating a TOTP code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TotpError {
    #[error("OTP secret is not valid base32")]
    InvalidSecret,

    #[error("digits must be between 1 and 9")]
    UnsupportedDigits,

    #[error("time step must be greater than zero")]
    InvalidPeriod,
}

/// Reasons a license token fails verification.
///
/// These double as the user-visible `reason` strings of a
/// [`LicenseCheck`](crate::license::LicenseCheck).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LicenseError {
    #[error("not a V1 license token")]
    MalformedToken,

    #[error("signature verification failed")]
    SignatureInvalid,

    #[error("missing plan")]
    MissingPlan,

    #[error("license expired")]
    Expired,

    #[error("license bound to another device")]
    DeviceMismatch,
}

pub type VaultResult<T> = Result<T, VaultError>;
pub type TotpResult<T> = Result<T, TotpError>;
