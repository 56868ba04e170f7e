//! Encrypted container codec and crash-safe file storage
//!
//! Binary layout (multi-byte integers big-endian):
//!
//! ```text
//! v1: MAGIC "JVLT" | VERSION=1 | SALT_LEN u8 | SALT | NONCE_LEN u8 | NONCE | CIPHERTEXT+TAG
//! v2: MAGIC "JVLT" | VERSION=2 | KDF_ID u8 | ITERATIONS u32 | SALT_LEN u8 | SALT
//!     | NONCE_LEN u8 | NONCE | CIPHERTEXT+TAG
//! ```
//!
//! v1 files imply PBKDF2-HMAC-SHA256 at a fixed 600_000 iterations; v2
//! stores the KDF id and iteration count explicitly so the cost can change
//! without breaking old files. Saves always write v2. The plaintext is the
//! serialized [`VaultData`] JSON.
//!
//! Writes go to a temporary file in the same directory followed by an
//! atomic rename, so a crash mid-save leaves the previous vault intact.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::crypto::{generate_salt, secure_clear, VaultKey, NONCE_SIZE, SALT_SIZE};
use crate::error::{VaultError, VaultResult};
use crate::models::{now_millis, VaultData};

/// Container magic identifier
pub const MAGIC: &[u8; 4] = b"JVLT";

/// Historical format: fixed KDF parameters, no KDF header fields
pub const VERSION_1: u8 = 1;

/// Current format: explicit KDF id and iteration count in the header
pub const VERSION_2: u8 = 2;

/// KDF id for PBKDF2-HMAC-SHA256, the only algorithm defined so far
pub const KDF_PBKDF2_SHA256: u8 = 1;

/// Iteration count implied by version-1 containers
pub(crate) const V1_ITERATIONS: u32 = 600_000;

/// Default vault file name
const VAULT_FILE: &str = "vault.dat";

/// Default vault directory name
const VAULT_DIR: &str = ".latchkey";

/// Parsed container header, plus where the ciphertext begins.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ContainerHeader {
    pub version: u8,
    pub kdf_id: u8,
    pub iterations: u32,
    pub salt: Vec<u8>,
    pub nonce: [u8; NONCE_SIZE],
}

/// Default vault path: `~/.latchkey/vault.dat`.
pub fn default_vault_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(VAULT_DIR)
        .join(VAULT_FILE)
}

/// Create a new, empty vault file and return its decrypted model.
///
/// Refuses to overwrite an existing vault.
pub fn create_vault(
    path: &Path,
    name: &str,
    password: &[u8],
    iterations: u32,
) -> VaultResult<VaultData> {
    if path.exists() {
        return Err(VaultError::VaultExists(path.to_path_buf()));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut data = VaultData::new(name);
    save_vault(path, &mut data, password, iterations)?;
    Ok(data)
}

/// Serialize, encrypt, and atomically write the vault.
///
/// Generates a fresh salt and nonce, re-derives the key, and bumps
/// `vault_revision` / `last_modified` only once the file replace has
/// succeeded.
pub fn save_vault(
    path: &Path,
    data: &mut VaultData,
    password: &[u8],
    iterations: u32,
) -> VaultResult<()> {
    let mut snapshot = data.clone();
    snapshot.vault_revision += 1;
    snapshot.last_modified = now_millis();

    let mut plaintext = serde_json::to_vec(&snapshot)?;

    let salt = generate_salt();
    let key = VaultKey::derive(password, &salt, iterations)?;
    let result = key.encrypt(&plaintext);
    secure_clear(&mut plaintext);
    let (ciphertext, nonce) = result?;

    let mut blob = Vec::with_capacity(4 + 1 + 1 + 4 + 1 + salt.len() + 1 + nonce.len() + ciphertext.len());
    blob.extend_from_slice(MAGIC);
    blob.push(VERSION_2);
    blob.push(KDF_PBKDF2_SHA256);
    blob.extend_from_slice(&iterations.to_be_bytes());
    blob.push(salt.len() as u8);
    blob.extend_from_slice(&salt);
    blob.push(nonce.len() as u8);
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);

    write_atomic(path, &blob)?;

    debug!(
        path = %path.display(),
        revision = snapshot.vault_revision,
        bytes = blob.len(),
        "vault saved"
    );

    *data = snapshot;
    Ok(())
}

/// Read, decrypt, and parse a vault file.
///
/// Any failure past the header (tag mismatch, garbage plaintext) collapses
/// to [`VaultError::Authentication`]; the header itself yields the typed
/// format/version errors.
pub fn load_vault(path: &Path, password: &[u8]) -> VaultResult<VaultData> {
    if !path.exists() {
        return Err(VaultError::VaultNotFound(path.to_path_buf()));
    }

    let blob = fs::read(path)?;
    let (header, ciphertext) = parse_header(&blob)?;

    let key = VaultKey::derive(password, &header.salt, header.iterations)?;
    let mut plaintext = key.decrypt(ciphertext, &header.nonce)?;

    let parsed: Result<VaultData, _> = serde_json::from_slice(&plaintext);
    secure_clear(&mut plaintext);

    let data = parsed.map_err(|_| VaultError::Authentication)?;

    debug!(
        path = %path.display(),
        version = header.version,
        revision = data.vault_revision,
        entries = data.entries.len(),
        "vault loaded"
    );

    Ok(data)
}

/// Check whether a vault file exists at the given path.
pub fn vault_exists(path: &Path) -> bool {
    path.exists()
}

/// Split a container blob into its header and ciphertext region.
pub(crate) fn parse_header(blob: &[u8]) -> VaultResult<(ContainerHeader, &[u8])> {
    if blob.len() < 5 || &blob[0..4] != MAGIC {
        return Err(VaultError::Format);
    }

    let version = blob[4];
    let mut offset = 5;

    let (kdf_id, iterations) = match version {
        VERSION_1 => (KDF_PBKDF2_SHA256, V1_ITERATIONS),
        VERSION_2 => {
            if blob.len() < offset + 5 {
                return Err(VaultError::Format);
            }
            let kdf_id = blob[offset];
            if kdf_id != KDF_PBKDF2_SHA256 {
                return Err(VaultError::UnsupportedKdf(kdf_id));
            }
            let iterations = u32::from_be_bytes(
                blob[offset + 1..offset + 5]
                    .try_into()
                    .map_err(|_| VaultError::Format)?,
            );
            offset += 5;
            (kdf_id, iterations)
        }
        other => return Err(VaultError::UnsupportedVersion(other)),
    };

    let salt = read_length_prefixed(blob, &mut offset)?;
    let nonce_bytes = read_length_prefixed(blob, &mut offset)?;
    let nonce: [u8; NONCE_SIZE] = nonce_bytes
        .try_into()
        .map_err(|_| VaultError::Format)?;

    Ok((
        ContainerHeader {
            version,
            kdf_id,
            iterations,
            salt: salt.to_vec(),
            nonce,
        },
        &blob[offset..],
    ))
}

fn read_length_prefixed<'a>(blob: &'a [u8], offset: &mut usize) -> VaultResult<&'a [u8]> {
    let len = *blob.get(*offset).ok_or(VaultError::Format)? as usize;
    *offset += 1;
    let field = blob
        .get(*offset..*offset + len)
        .ok_or(VaultError::Format)?;
    *offset += len;
    Ok(field)
}

/// Write to a temp file in the target directory, fsync, then rename over
/// the destination so a crash never leaves a truncated vault. A failed
/// write removes the temp file.
fn write_atomic(path: &Path, bytes: &[u8]) -> VaultResult<()> {
    let tmp = path.with_extension("dat.tmp");
    let result = write_and_replace(&tmp, path, bytes);
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn write_and_replace(tmp: &Path, path: &Path, bytes: &[u8]) -> VaultResult<()> {
    {
        let mut file = fs::File::create(tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    // Owner-only permissions before the file becomes the vault
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(tmp, fs::Permissions::from_mode(0o600))?;
    }

    fs::rename(tmp, path)?;
    Ok(())
}
