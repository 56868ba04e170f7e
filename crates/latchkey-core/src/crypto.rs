//! Cryptographic primitives for the vault container
//!
//! - PBKDF2-HMAC-SHA256 for password-based key derivation
//! - AES-256-GCM for authenticated encryption
//! - Secure memory handling with zeroization

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::{VaultError, VaultResult};

/// Size of an AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce in bytes
pub const NONCE_SIZE: usize = 12;

/// Size of the PBKDF2 salt in bytes
pub const SALT_SIZE: usize = 16;

/// Default PBKDF2 iteration count for new vaults
pub const DEFAULT_ITERATIONS: u32 = 600_000;

/// A vault key derived from the master password.
///
/// Derived fresh for every save with a fresh salt, so a nonce can never
/// repeat under the same key. Zeroized on drop.
pub struct VaultKey {
    key: Secret<[u8; KEY_SIZE]>,
}

impl VaultKey {
    /// Derive a key from the master password using PBKDF2-HMAC-SHA256.
    ///
    /// `iterations` is the cost parameter stored in the container header so
    /// future loads re-derive with the exact value used at save time.
    pub fn derive(password: &[u8], salt: &[u8], iterations: u32) -> VaultResult<Self> {
        if iterations == 0 {
            return Err(VaultError::KeyDerivation(
                "iteration count must be non-zero".to_string(),
            ));
        }

        let mut key = [0u8; KEY_SIZE];
        pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut key);

        let secret = Secret::new(key);
        key.zeroize();

        Ok(Self { key: secret })
    }

    /// Encrypt data using AES-256-GCM under a freshly generated nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> VaultResult<(Vec<u8>, [u8; NONCE_SIZE])> {
        let cipher = Aes256Gcm::new_from_slice(self.key.expose_secret())
            .map_err(|e| VaultError::Encryption(e.to_string()))?;

        let nonce_bytes = generate_nonce();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| VaultError::Encryption(e.to_string()))?;

        Ok((ciphertext, nonce_bytes))
    }

    /// Decrypt data using AES-256-GCM.
    ///
    /// A tag mismatch collapses to [`VaultError::Authentication`] with no
    /// further detail.
    pub fn decrypt(&self, ciphertext: &[u8], nonce: &[u8; NONCE_SIZE]) -> VaultResult<Vec<u8>> {
        let cipher = Aes256Gcm::new_from_slice(self.key.expose_secret())
            .map_err(|e| VaultError::Encryption(e.to_string()))?;

        let nonce = Nonce::from_slice(nonce);

        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| VaultError::Authentication)
    }
}

/// Generate a cryptographically secure random salt.
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Generate a cryptographically secure random nonce.
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Securely clear a byte buffer.
pub fn secure_clear(data: &mut [u8]) {
    data.zeroize();
}

#[cfg(test)]
mod tests {
    use super::*;

    // Keep KDF-heavy tests cheap; the production default lives in the header.
    const TEST_ITERS: u32 = 1_000;

    #[test]
    fn key_derivation_is_deterministic() {
        let salt = generate_salt();

        let k1 = VaultKey::derive(b"test-password-123", &salt, TEST_ITERS).unwrap();
        let k2 = VaultKey::derive(b"test-password-123", &salt, TEST_ITERS).unwrap();

        assert_eq!(k1.key.expose_secret(), k2.key.expose_secret());
    }

    #[test]
    fn iteration_count_changes_key() {
        let salt = generate_salt();

        let k1 = VaultKey::derive(b"pw", &salt, TEST_ITERS).unwrap();
        let k2 = VaultKey::derive(b"pw", &salt, TEST_ITERS + 1).unwrap();

        assert_ne!(k1.key.expose_secret(), k2.key.expose_secret());
    }

    #[test]
    fn zero_iterations_rejected() {
        let salt = generate_salt();
        assert!(VaultKey::derive(b"pw", &salt, 0).is_err());
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let salt = generate_salt();
        let key = VaultKey::derive(b"test-password", &salt, TEST_ITERS).unwrap();

        let plaintext = b"Hello, secure world!";
        let (ciphertext, nonce) = key.encrypt(plaintext).unwrap();

        let decrypted = key.decrypt(&ciphertext, &nonce).unwrap();
        assert_eq!(plaintext.as_slice(), decrypted.as_slice());
    }

    #[test]
    fn wrong_password_fails_opaquely() {
        let salt = generate_salt();
        let k1 = VaultKey::derive(b"password1", &salt, TEST_ITERS).unwrap();
        let k2 = VaultKey::derive(b"password2", &salt, TEST_ITERS).unwrap();

        let (ciphertext, nonce) = k1.encrypt(b"secret data").unwrap();

        match k2.decrypt(&ciphertext, &nonce) {
            Err(VaultError::Authentication) => {}
            other => panic!("expected Authentication, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn tampered_ciphertext_fails_opaquely() {
        let salt = generate_salt();
        let key = VaultKey::derive(b"password", &salt, TEST_ITERS).unwrap();

        let (mut ciphertext, nonce) = key.encrypt(b"secret data").unwrap();
        ciphertext[0] ^= 0x01;

        assert!(matches!(
            key.decrypt(&ciphertext, &nonce),
            Err(VaultError::Authentication)
        ));
    }

    #[test]
    fn nonce_uniqueness() {
        assert_ne!(generate_nonce(), generate_nonce());
    }

    #[test]
    fn salt_uniqueness() {
        assert_ne!(generate_salt(), generate_salt());
    }
}
