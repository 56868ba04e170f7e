//! Data model for vault entries and their mutation invariants
//!
//! Pure data, no I/O. The serde representation (camelCase names,
//! epoch-millisecond timestamps) is the plaintext wrapped by the
//! encrypted container.

use chrono::serde::ts_milliseconds;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current time truncated to millisecond precision, the resolution the
/// wire format keeps. Keeps a decrypted vault bit-identical across a
/// save/load round trip.
pub(crate) fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// A superseded password value, kept when an edit replaces the current one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PasswordHistory {
    /// The prior password value
    pub password: String,

    /// The moment it was superseded
    #[serde(with = "ts_milliseconds")]
    pub changed_at: DateTime<Utc>,
}

/// A single credential entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Unique identifier, assigned once at creation and never reassigned
    pub id: Uuid,

    pub label: String,

    #[serde(default)]
    pub username: String,

    /// Site URL or email address, whichever the entry is for
    #[serde(default)]
    pub url: String,

    /// Current plaintext password; held in memory only while unlocked
    #[serde(default)]
    pub password: String,

    /// Base32 TOTP secret, if the account uses one-time codes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otp_secret: Option<String>,

    /// Case is preserved; membership checks are case-insensitive
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub notes: String,

    #[serde(default)]
    pub favorite: bool,

    #[serde(with = "ts_milliseconds")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "ts_milliseconds")]
    pub updated_at: DateTime<Utc>,

    /// Incremented each time the password changes to a new value
    #[serde(default)]
    pub pw_revision: u32,

    /// Superseded passwords, newest first
    #[serde(default)]
    pub history: Vec<PasswordHistory>,
}

/// Editable fields of an [`Entry`], applied as a whole by [`Entry::apply`].
#[derive(Debug, Clone, Default)]
pub struct EntryUpdate {
    pub label: Option<String>,
    pub username: Option<String>,
    pub url: Option<String>,
    pub password: Option<String>,
    pub otp_secret: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<String>,
    pub favorite: Option<bool>,
}

impl Entry {
    /// Create a new entry with a fresh id and zero password revisions.
    pub fn new(label: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            username: String::new(),
            url: String::new(),
            password: String::new(),
            otp_secret: None,
            tags: Vec::new(),
            notes: String::new(),
            favorite: false,
            created_at: now,
            updated_at: now,
            pw_revision: 0,
            history: Vec::new(),
        }
    }

    /// Apply an edit, maintaining the history invariants.
    ///
    /// When the edit changes the password to a new, different value the
    /// previous value is pushed to the front of `history` and
    /// `pw_revision` increments; an unchanged password adds nothing, and
    /// filling in the very first password is an assignment, not a
    /// rotation. `updated_at` never moves backwards.
    pub fn apply(&mut self, update: EntryUpdate) {
        let now = now_millis();

        if let Some(new_password) = update.password {
            if new_password != self.password {
                if self.password.is_empty() && self.pw_revision == 0 && self.history.is_empty() {
                    self.password = new_password;
                } else {
                    self.history.insert(
                        0,
                        PasswordHistory {
                            password: std::mem::replace(&mut self.password, new_password),
                            changed_at: now,
                        },
                    );
                    self.pw_revision += 1;
                }
            }
        }

        if let Some(label) = update.label {
            self.label = label;
        }
        if let Some(username) = update.username {
            self.username = username;
        }
        if let Some(url) = update.url {
            self.url = url;
        }
        if let Some(otp_secret) = update.otp_secret {
            self.otp_secret = otp_secret;
        }
        if let Some(tags) = update.tags {
            self.tags = tags;
        }
        if let Some(notes) = update.notes {
            self.notes = notes;
        }
        if let Some(favorite) = update.favorite {
            self.favorite = favorite;
        }

        self.updated_at = self.updated_at.max(now);
    }

    /// When the current password was last set: the newest history record's
    /// `changed_at`, or `created_at` if it has never changed.
    pub fn password_changed_at(&self) -> DateTime<Utc> {
        self.history
            .first()
            .map(|h| h.changed_at)
            .unwrap_or(self.created_at)
    }

    /// Case-insensitive tag membership.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Case-insensitive substring match over label, username, and URL.
    pub fn matches(&self, query: &str) -> bool {
        let q = query.to_lowercase();
        self.label.to_lowercase().contains(&q)
            || self.username.to_lowercase().contains(&q)
            || self.url.to_lowercase().contains(&q)
            || self.tags.iter().any(|t| t.to_lowercase().contains(&q))
    }
}

/// Decrypted vault contents (in-memory only, never persisted as plaintext).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VaultData {
    pub vault_name: String,

    /// Insertion order; views may re-sort without touching this
    #[serde(default)]
    pub entries: Vec<Entry>,

    #[serde(with = "ts_milliseconds")]
    pub last_modified: DateTime<Utc>,

    /// Incremented by exactly one on every successful save, never decremented
    #[serde(default)]
    pub vault_revision: u64,
}

impl VaultData {
    pub fn new(vault_name: impl Into<String>) -> Self {
        Self {
            vault_name: vault_name.into(),
            entries: Vec::new(),
            last_modified: now_millis(),
            vault_revision: 0,
        }
    }

    /// Append a new entry and return its id.
    pub fn add_entry(&mut self, entry: Entry) -> Uuid {
        let id = entry.id;
        self.entries.push(entry);
        id
    }

    pub fn find(&self, id: Uuid) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn find_mut(&mut self, id: Uuid) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }

    pub fn find_by_label(&self, label: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.label == label)
    }

    /// Remove an entry. The id is never reused: ids are random v4 UUIDs
    /// assigned at creation only.
    pub fn remove_entry(&mut self, id: Uuid) -> Option<Entry> {
        let idx = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(idx))
    }

    /// Entries matching a case-insensitive search query.
    pub fn search(&self, query: &str) -> Vec<&Entry> {
        self.entries.iter().filter(|e| e.matches(query)).collect()
    }

    /// Entries carrying a tag (case-insensitive).
    pub fn with_tag(&self, tag: &str) -> Vec<&Entry> {
        self.entries.iter().filter(|e| e.has_tag(tag)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update_password(pw: &str) -> EntryUpdate {
        EntryUpdate {
            password: Some(pw.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn first_password_is_an_assignment_not_a_rotation() {
        let mut e = Entry::new("example");
        e.apply(update_password("first"));
        assert_eq!(e.password, "first");
        assert_eq!(e.pw_revision, 0);
        assert!(e.history.is_empty());
    }

    #[test]
    fn password_change_pushes_history() {
        let mut e = Entry::new("example");
        e.apply(update_password("first"));
        e.apply(update_password("second"));
        assert_eq!(e.pw_revision, 1);
        assert_eq!(e.history.len(), 1);
        assert_eq!(e.history[0].password, "first");

        e.apply(update_password("third"));
        assert_eq!(e.pw_revision, 2);
        assert_eq!(e.history.len(), 2);
        // Newest first
        assert_eq!(e.history[0].password, "second");
        assert_eq!(e.history[1].password, "first");
        assert_eq!(e.password, "third");
    }

    #[test]
    fn unchanged_password_adds_no_history() {
        let mut e = Entry::new("example");
        e.apply(update_password("same"));
        e.apply(update_password("same"));
        assert_eq!(e.pw_revision, 0);
        assert!(e.history.is_empty());
    }

    #[test]
    fn clearing_then_setting_a_password_still_rotates() {
        let mut e = Entry::new("example");
        e.apply(update_password("first"));
        e.apply(update_password("second"));
        e.apply(update_password(""));
        e.apply(update_password("third"));
        assert_eq!(e.pw_revision, 3);
        assert_eq!(e.history[0].password, "");
        assert_eq!(e.history[1].password, "second");
    }

    #[test]
    fn edit_without_password_leaves_history_alone() {
        let mut e = Entry::new("example");
        e.apply(EntryUpdate {
            username: Some("alice".to_string()),
            ..Default::default()
        });
        assert_eq!(e.pw_revision, 0);
        assert!(e.history.is_empty());
        assert_eq!(e.username, "alice");
    }

    #[test]
    fn updated_at_never_moves_backwards() {
        let mut e = Entry::new("example");
        let before = e.updated_at;
        e.apply(EntryUpdate {
            notes: Some("note".to_string()),
            ..Default::default()
        });
        assert!(e.updated_at >= before);
    }

    #[test]
    fn password_changed_at_prefers_history() {
        let mut e = Entry::new("example");
        assert_eq!(e.password_changed_at(), e.created_at);

        e.apply(update_password("first"));
        assert_eq!(e.password_changed_at(), e.created_at);

        e.apply(update_password("second"));
        assert_eq!(e.password_changed_at(), e.history[0].changed_at);
    }

    #[test]
    fn entry_ids_are_unique() {
        let mut vault = VaultData::new("test");
        let a = vault.add_entry(Entry::new("a"));
        let b = vault.add_entry(Entry::new("b"));
        assert_ne!(a, b);

        vault.remove_entry(a);
        let c = vault.add_entry(Entry::new("c"));
        assert_ne!(a, c);
    }

    #[test]
    fn tag_membership_ignores_case() {
        let mut e = Entry::new("example");
        e.tags = vec!["Work".to_string()];
        assert!(e.has_tag("work"));
        assert!(e.has_tag("WORK"));
        assert!(!e.has_tag("personal"));
        // Case preserved
        assert_eq!(e.tags[0], "Work");
    }

    #[test]
    fn search_matches_label_and_username() {
        let mut vault = VaultData::new("test");
        let mut e = Entry::new("GitHub");
        e.username = "octo@example.com".to_string();
        vault.add_entry(e);
        vault.add_entry(Entry::new("Bank"));

        assert_eq!(vault.search("github").len(), 1);
        assert_eq!(vault.search("octo").len(), 1);
        assert_eq!(vault.search("missing").len(), 0);
    }

    #[test]
    fn serde_uses_camel_case_millis() {
        let vault = VaultData::new("MyVault");
        let json = serde_json::to_string(&vault).unwrap();
        assert!(json.contains("\"vaultName\":\"MyVault\""));
        assert!(json.contains("\"lastModified\":"));
        assert!(json.contains("\"vaultRevision\":0"));

        let back: VaultData = serde_json::from_str(&json).unwrap();
        assert_eq!(back.vault_name, "MyVault");
    }
}
