//! Latchkey Core - encrypted single-file secrets vault
//!
//! This crate provides:
//! - An authenticated encrypted container format (AES-256-GCM over a
//!   PBKDF2-HMAC-SHA256 derived key) with crash-safe atomic saves
//! - The versioned entry/history data model and its mutation invariants
//! - A password security audit (weak, reused, stale detection)
//! - RFC 6238 time-based one-time codes
//! - Offline Ed25519-signed license token verification

pub mod audit;
pub mod config;
pub mod container;
pub mod crypto;
pub mod error;
pub mod generator;
pub mod license;
pub mod models;
pub mod session;
pub mod totp;

pub use audit::{AuditEngine, AuditPolicy, AuditReport, ReusedGroup};
pub use config::{load_config, save_config, VaultConfig};
pub use container::{create_vault, default_vault_path, load_vault, save_vault, vault_exists};
pub use crypto::DEFAULT_ITERATIONS;
pub use error::{LicenseError, TotpError, VaultError, VaultResult};
pub use generator::{generate, GeneratorOptions};
pub use license::{device_fingerprint, verify_license, LicenseCheck, LicensePayload};
pub use models::{Entry, EntryUpdate, PasswordHistory, VaultData};
pub use session::Session;
pub use totp::{totp, totp_now, seconds_remaining};
