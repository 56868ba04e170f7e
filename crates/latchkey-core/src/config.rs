//! Non-sensitive vault configuration, stored as plaintext TOML next to
//! the vault file.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::audit::AuditPolicy;
use crate::crypto::DEFAULT_ITERATIONS;
use crate::error::{VaultError, VaultResult};

/// Config file name, resolved in the vault file's directory
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// PBKDF2 iteration count for new saves
    pub iterations: u32,

    /// Days before an unchanged password counts as old in audits
    pub stale_days: i64,

    /// Minimum password length for the audit weakness rubric
    pub min_password_length: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            stale_days: 180,
            min_password_length: 8,
        }
    }
}

impl VaultConfig {
    pub fn audit_policy(&self) -> AuditPolicy {
        AuditPolicy {
            min_length: self.min_password_length,
            stale_days: self.stale_days,
        }
    }
}

/// Load the config next to the vault file; defaults when absent.
pub fn load_config(vault_path: &Path) -> VaultResult<VaultConfig> {
    let path = match vault_path.parent() {
        Some(dir) => dir.join(CONFIG_FILE),
        None => return Ok(VaultConfig::default()),
    };
    if !path.exists() {
        return Ok(VaultConfig::default());
    }

    let content = fs::read_to_string(&path)?;
    toml::from_str(&content).map_err(|e| VaultError::Config(e.to_string()))
}

/// Persist the config next to the vault file.
pub fn save_config(vault_path: &Path, config: &VaultConfig) -> VaultResult<()> {
    let dir = vault_path
        .parent()
        .ok_or_else(|| VaultError::Config("vault path has no parent directory".to_string()))?;
    fs::create_dir_all(dir)?;

    let content =
        toml::to_string_pretty(config).map_err(|e| VaultError::Config(e.to_string()))?;
    fs::write(dir.join(CONFIG_FILE), content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_when_absent() {
        let dir = TempDir::new().unwrap();
        let config = load_config(&dir.path().join("vault.dat")).unwrap();
        assert_eq!(config.iterations, DEFAULT_ITERATIONS);
        assert_eq!(config.stale_days, 180);
    }

    #[test]
    fn save_and_reload() {
        let dir = TempDir::new().unwrap();
        let vault_path = dir.path().join("vault.dat");

        let config = VaultConfig {
            iterations: 250_000,
            stale_days: 90,
            min_password_length: 12,
        };
        save_config(&vault_path, &config).unwrap();

        let loaded = load_config(&vault_path).unwrap();
        assert_eq!(loaded.iterations, 250_000);
        assert_eq!(loaded.stale_days, 90);
        assert_eq!(loaded.min_password_length, 12);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let vault_path = dir.path().join("vault.dat");
        fs::write(dir.path().join("config.toml"), "stale_days = 30\n").unwrap();

        let loaded = load_config(&vault_path).unwrap();
        assert_eq!(loaded.stale_days, 30);
        assert_eq!(loaded.iterations, DEFAULT_ITERATIONS);
    }

    #[test]
    fn invalid_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let vault_path = dir.path().join("vault.dat");
        fs::write(dir.path().join("config.toml"), "stale_days = \"soon\"\n").unwrap();

        assert!(matches!(
            load_config(&vault_path),
            Err(VaultError::Config(_))
        ));
    }
}
