//! Single active unlock session
//!
//! At most one decrypted vault/master-password pair lives in a session;
//! unlocking another vault means locking this one first. Locking (or
//! dropping the session) zeroizes the master password and discards the
//! decrypted model. All operations are synchronous; key derivation is
//! deliberately expensive, so latency-sensitive callers should run these
//! off their hot path.

use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::container::{create_vault, load_vault, save_vault};
use crate::crypto::DEFAULT_ITERATIONS;
use crate::error::{VaultError, VaultResult};
use crate::models::{Entry, EntryUpdate, VaultData};

/// An unlocked vault bound to its file path and master password.
pub struct Session {
    path: PathBuf,
    data: VaultData,
    master: SecretString,
    iterations: u32,
}

impl Session {
    /// Create a brand-new vault file and open a session on it.
    pub fn create(
        path: &Path,
        name: &str,
        master: SecretString,
        iterations: u32,
    ) -> VaultResult<Self> {
        let data = create_vault(path, name, master.expose_secret().as_bytes(), iterations)?;
        debug!(path = %path.display(), "session created");
        Ok(Self {
            path: path.to_path_buf(),
            data,
            master,
            iterations,
        })
    }

    /// Unlock an existing vault file.
    pub fn open(path: &Path, master: SecretString, iterations: u32) -> VaultResult<Self> {
        let data = load_vault(path, master.expose_secret().as_bytes())?;
        debug!(path = %path.display(), entries = data.entries.len(), "session opened");
        Ok(Self {
            path: path.to_path_buf(),
            data,
            master,
            iterations,
        })
    }

    /// Unlock with the default iteration count for subsequent saves.
    pub fn open_default(path: &Path, master: SecretString) -> VaultResult<Self> {
        Self::open(path, master, DEFAULT_ITERATIONS)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The decrypted model, for rendering, audit, and TOTP lookups.
    pub fn data(&self) -> &VaultData {
        &self.data
    }

    /// Add an entry; returns its id. Persist with [`Session::save`].
    pub fn add_entry(&mut self, entry: Entry) -> Uuid {
        self.data.add_entry(entry)
    }

    /// Apply an edit to an entry, maintaining history invariants.
    pub fn edit_entry(&mut self, id: Uuid, update: EntryUpdate) -> VaultResult<()> {
        let entry = self
            .data
            .find_mut(id)
            .ok_or_else(|| VaultError::EntryNotFound(id.to_string()))?;
        entry.apply(update);
        Ok(())
    }

    pub fn remove_entry(&mut self, id: Uuid) -> VaultResult<Entry> {
        self.data
            .remove_entry(id)
            .ok_or_else(|| VaultError::EntryNotFound(id.to_string()))
    }

    /// Re-encrypt the full vault snapshot and atomically replace the file.
    pub fn save(&mut self) -> VaultResult<()> {
        let master = Zeroizing::new(self.master.expose_secret().as_bytes().to_vec());
        save_vault(&self.path, &mut self.data, &master, self.iterations)
    }

    /// Save under a new master password; the session keeps using it
    /// afterwards. The old password bytes are dropped zeroized.
    pub fn change_master(&mut self, new_master: SecretString) -> VaultResult<()> {
        let bytes = Zeroizing::new(new_master.expose_secret().as_bytes().to_vec());
        save_vault(&self.path, &mut self.data, &bytes, self.iterations)?;
        self.master = new_master;
        debug!(path = %self.path.display(), "master password changed");
        Ok(())
    }

    /// Lock the session: zeroize the master password and discard the
    /// decrypted model. Consumes the session; unlocking requires a fresh
    /// password attempt.
    pub fn lock(self) {
        debug!(path = %self.path.display(), "session locked");
        // SecretString zeroizes on drop; VaultData plaintext is dropped
        // with the session.
    }
}
