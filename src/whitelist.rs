//! File-backed whitelist of user, chat, and username identifiers.
//!
//! The backing file holds one lower-cased identifier per line and is created
//! empty if absent. Adding appends a single line; removing rewrites the whole
//! file from the in-memory set. All mutation serializes through one mutex so
//! the append and rewrite paths can never interleave.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WhitelistError {
    /// The entry is already present; reported to the sender, not logged as a
    /// failure.
    #[error("{0} is already whitelisted")]
    AlreadyWhitelisted(String),
    /// The entry is not present, so there is nothing to remove.
    #[error("{0} is not whitelisted")]
    NotWhitelisted(String),
    /// The entry is empty or spans multiple tokens; the line-oriented
    /// backing file can only represent single-word identifiers.
    #[error("whitelist entries must be a single word")]
    InvalidEntry,
    #[error("whitelist file error: {0}")]
    Io(String),
}

impl From<std::io::Error> for WhitelistError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Process-wide set of whitelisted identifiers, kept consistent with its
/// backing file on every successful mutation.
pub struct WhitelistStore {
    path: PathBuf,
    entries: Mutex<HashSet<String>>,
}

impl WhitelistStore {
    /// Open the store, creating the backing file if it does not exist and
    /// reconciling the in-memory set from its lines.
    ///
    /// # Errors
    ///
    /// Returns `WhitelistError::Io` if the file cannot be read or created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, WhitelistError> {
        let path = path.into();
        if !path.exists() {
            fs::write(&path, "")?;
        }
        let contents = fs::read_to_string(&path)?;
        let entries: HashSet<String> = contents
            .lines()
            .map(|line| line.trim().to_lowercase())
            .filter(|line| !line.is_empty())
            .collect();
        info!("Whitelist loaded: {} entries from {:?}", entries.len(), path);
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn normalize(entry: &str) -> String {
        entry.trim().to_lowercase()
    }

    /// Add an identifier. Appends one line to the backing file.
    ///
    /// # Errors
    ///
    /// `InvalidEntry` if the entry is empty or contains whitespace (it could
    /// not round-trip through the one-entry-per-line file), `AlreadyWhitelisted`
    /// if present (no write is performed), `Io` if the append fails (the
    /// in-memory set is left unchanged).
    pub fn whitelist(&self, entry: &str) -> Result<(), WhitelistError> {
        let normalized = Self::normalize(entry);
        if normalized.is_empty() || normalized.chars().any(char::is_whitespace) {
            return Err(WhitelistError::InvalidEntry);
        }
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.contains(&normalized) {
            return Err(WhitelistError::AlreadyWhitelisted(normalized));
        }
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        writeln!(file, "{normalized}")?;
        entries.insert(normalized);
        Ok(())
    }

    /// Remove an identifier. Rewrites the whole backing file from the set.
    ///
    /// # Errors
    ///
    /// `NotWhitelisted` if absent (no write is performed), `Io` if the
    /// rewrite fails.
    pub fn blacklist(&self, entry: &str) -> Result<(), WhitelistError> {
        let normalized = Self::normalize(entry);
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if !entries.remove(&normalized) {
            return Err(WhitelistError::NotWhitelisted(normalized));
        }
        let mut lines: Vec<&str> = entries.iter().map(String::as_str).collect();
        lines.sort_unstable();
        let mut body = lines.join("\n");
        if !body.is_empty() {
            body.push('\n');
        }
        fs::write(&self.path, body)?;
        Ok(())
    }

    /// Membership check after normalization.
    #[must_use]
    pub fn is_whitelisted(&self, entry: &str) -> bool {
        let normalized = Self::normalize(entry);
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.contains(&normalized)
    }

    /// Membership check for numeric user or chat ids.
    #[must_use]
    pub fn is_whitelisted_id(&self, id: i64) -> bool {
        self.is_whitelisted(&id.to_string())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, WhitelistStore) {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("whitelist.txt");
        let store = WhitelistStore::open(&path).expect("open store");
        (dir, store)
    }

    #[test]
    fn creates_missing_file_empty() {
        let (dir, store) = store();
        assert!(store.is_empty());
        assert!(dir.path().join("whitelist.txt").exists());
    }

    #[test]
    fn whitelist_is_case_insensitive() -> Result<(), WhitelistError> {
        let (_dir, store) = store();
        store.whitelist("Bob")?;
        assert!(store.is_whitelisted("bob"));
        assert!(store.is_whitelisted("BOB"));
        assert!(store.is_whitelisted("  bob  "));
        Ok(())
    }

    #[test]
    fn double_whitelist_reports_conflict_without_growth() -> Result<(), WhitelistError> {
        let (_dir, store) = store();
        store.whitelist("bob")?;
        let err = store.whitelist("BOB");
        assert_eq!(err, Err(WhitelistError::AlreadyWhitelisted("bob".into())));
        assert_eq!(store.len(), 1);
        Ok(())
    }

    #[test]
    fn blacklist_non_member_leaves_file_untouched() -> Result<(), WhitelistError> {
        let (dir, store) = store();
        store.whitelist("alice")?;
        let before = fs::read_to_string(dir.path().join("whitelist.txt"))
            .map_err(WhitelistError::from)?;

        let err = store.blacklist("bob");
        assert_eq!(err, Err(WhitelistError::NotWhitelisted("bob".into())));

        let after = fs::read_to_string(dir.path().join("whitelist.txt"))
            .map_err(WhitelistError::from)?;
        assert_eq!(before, after);
        Ok(())
    }

    #[test]
    fn mutations_survive_reopen() -> Result<(), WhitelistError> {
        let (dir, store) = store();
        store.whitelist("alice")?;
        store.whitelist("42")?;
        store.whitelist("bob")?;
        store.blacklist("alice")?;

        let reopened = WhitelistStore::open(dir.path().join("whitelist.txt"))?;
        assert_eq!(reopened.len(), 2);
        assert!(reopened.is_whitelisted("bob"));
        assert!(reopened.is_whitelisted_id(42));
        assert!(!reopened.is_whitelisted("alice"));
        Ok(())
    }

    #[test]
    fn multiline_entry_is_rejected_and_file_stays_consistent() -> Result<(), WhitelistError> {
        let (dir, store) = store();
        let err = store.whitelist("bob\nalice");
        assert_eq!(err, Err(WhitelistError::InvalidEntry));
        assert_eq!(store.whitelist("bob alice"), Err(WhitelistError::InvalidEntry));
        assert_eq!(store.whitelist("   "), Err(WhitelistError::InvalidEntry));
        assert!(store.is_empty());

        // The file never saw a write, so a reload agrees with memory.
        let reopened = WhitelistStore::open(dir.path().join("whitelist.txt"))?;
        assert!(reopened.is_empty());
        assert!(!reopened.is_whitelisted("bob"));
        Ok(())
    }

    #[test]
    fn numeric_ids_match_string_form() -> Result<(), WhitelistError> {
        let (_dir, store) = store();
        store.whitelist("12345")?;
        assert!(store.is_whitelisted_id(12345));
        assert!(!store.is_whitelisted_id(54321));
        Ok(())
    }
}
