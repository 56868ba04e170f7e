//! Password security audit: weak, reused, and stale passwords
//!
//! Operates on the decrypted in-memory model only; never touches the
//! vault file and never mutates it. A single run is a self-consistent
//! snapshot.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::models::VaultData;

/// Passwords nobody should be using. Deliberately small; the length and
/// character-class rules catch the long tail.
const COMMON_PASSWORDS: &[&str] = &[
    "123456", "12345678", "123456789", "1234567890", "password", "password1",
    "qwerty", "qwerty123", "abc123", "iloveyou", "admin", "welcome",
    "letmein", "monkey", "dragon", "111111", "000000", "hunter2",
];

/// Tunable audit thresholds. Defaults match the historical behavior:
/// 8-character minimum, 180-day staleness window.
#[derive(Debug, Clone)]
pub struct AuditPolicy {
    /// Passwords shorter than this are weak outright
    pub min_length: usize,
    /// Days since the last password change before an entry counts as old
    pub stale_days: i64,
}

impl Default for AuditPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            stale_days: 180,
        }
    }
}

/// Entries sharing one exact password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReusedGroup {
    /// Ids in vault order; always 2 or more
    pub entry_ids: Vec<Uuid>,
}

/// Snapshot result of one audit run. Id lists follow vault order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    pub weak: Vec<Uuid>,
    pub reused: Vec<ReusedGroup>,
    pub old: Vec<Uuid>,
}

impl AuditReport {
    pub fn is_weak(&self, id: Uuid) -> bool {
        self.weak.contains(&id)
    }

    pub fn is_old(&self, id: Uuid) -> bool {
        self.old.contains(&id)
    }

    /// The reused group containing this entry, if any. An entry belongs to
    /// at most one group.
    pub fn reused_group_of(&self, id: Uuid) -> Option<&ReusedGroup> {
        self.reused.iter().find(|g| g.entry_ids.contains(&id))
    }

    pub fn is_clean(&self) -> bool {
        self.weak.is_empty() && self.reused.is_empty() && self.old.is_empty()
    }
}

/// The audit engine. Stateless apart from its policy.
#[derive(Debug, Clone, Default)]
pub struct AuditEngine {
    policy: AuditPolicy,
}

impl AuditEngine {
    pub fn new(policy: AuditPolicy) -> Self {
        Self { policy }
    }

    /// Audit the vault as of `now`.
    pub fn run(&self, vault: &VaultData, now: DateTime<Utc>) -> AuditReport {
        let weak = vault
            .entries
            .iter()
            .filter(|e| self.is_weak_password(&e.password))
            .map(|e| e.id)
            .collect();

        let reused = self.collect_reused(vault);

        let stale_before = now - Duration::days(self.policy.stale_days);
        let old = vault
            .entries
            .iter()
            .filter(|e| e.password_changed_at() < stale_before)
            .map(|e| e.id)
            .collect();

        AuditReport { weak, reused, old }
    }

    /// Deterministic weakness rubric: minimum length, common-password
    /// list, all-digit strings, and character-class diversity.
    fn is_weak_password(&self, password: &str) -> bool {
        if password.len() < self.policy.min_length {
            return true;
        }
        if COMMON_PASSWORDS.contains(&password.to_lowercase().as_str()) {
            return true;
        }
        if password.chars().all(|c| c.is_ascii_digit()) {
            return true;
        }

        let classes = [
            password.chars().any(|c| c.is_ascii_lowercase()),
            password.chars().any(|c| c.is_ascii_uppercase()),
            password.chars().any(|c| c.is_ascii_digit()),
            password.chars().any(|c| !c.is_ascii_alphanumeric()),
        ]
        .iter()
        .filter(|&&present| present)
        .count();

        classes < 3 && password.len() < 12
    }

    /// Group entries by exact current-password equality, vault order,
    /// groups of 2 or more. Empty passwords mean "none set" and are not
    /// reuse.
    fn collect_reused(&self, vault: &VaultData) -> Vec<ReusedGroup> {
        let mut groups: Vec<(&str, Vec<Uuid>)> = Vec::new();

        for entry in &vault.entries {
            if entry.password.is_empty() {
                continue;
            }
            match groups.iter_mut().find(|(pw, _)| *pw == entry.password) {
                Some((_, ids)) => ids.push(entry.id),
                None => groups.push((&entry.password, vec![entry.id])),
            }
        }

        groups
            .into_iter()
            .filter(|(_, ids)| ids.len() >= 2)
            .map(|(_, entry_ids)| ReusedGroup { entry_ids })
            .collect()
    }
}
