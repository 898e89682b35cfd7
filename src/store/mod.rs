//! Durable per-user state storage.
//!
//! One JSON file per (user, record kind) under a root directory. The record
//! kinds are the closed set in [`records`]; the storage format is opaque to
//! everything above this module.

pub mod records;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{FeedmonError, Result};

pub use records::{
    AuthState, FeedHistory, MuteState, Subscription, SubscriptionList, UserRecord,
};

/// Keyed store of per-user records, one directory per user.
#[derive(Debug, Clone)]
pub struct UserStore {
    root: PathBuf,
}

impl UserStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn record_path(&self, user_id: i64, kind: &str) -> PathBuf {
        self.root.join(user_id.to_string()).join(format!("{kind}.json"))
    }

    /// Load a record for a user.
    ///
    /// A missing file is `None`. A file that no longer deserializes is also
    /// `None`, after a warning; callers then fall back to defaults instead
    /// of wedging the whole bot on one bad record.
    pub fn load<T: UserRecord>(&self, user_id: i64) -> Result<Option<T>> {
        let path = self.record_path(user_id, T::KIND);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(FeedmonError::Io(e)),
        };

        match serde_json::from_str(&content) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(
                    "discarding unreadable {} record for user {}: {}",
                    T::KIND,
                    user_id,
                    e
                );
                Ok(None)
            }
        }
    }

    /// Load a record for a user, or its default when absent.
    pub fn load_or_default<T: UserRecord>(&self, user_id: i64) -> Result<T> {
        Ok(self.load(user_id)?.unwrap_or_default())
    }

    /// Persist a record for a user.
    pub fn save<T: UserRecord>(&self, user_id: i64, record: &T) -> Result<()> {
        let path = self.record_path(user_id, T::KIND);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(record)?;
        fs::write(&path, json)?;
        Ok(())
    }

    /// Whether a record of this kind exists for the user.
    pub fn exists<T: UserRecord>(&self, user_id: i64) -> bool {
        self.record_path(user_id, T::KIND).is_file()
    }

    /// All user ids that have a record of this kind, in ascending order.
    pub fn users_with<T: UserRecord>(&self) -> Result<Vec<i64>> {
        let mut users = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let Some(user_id) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<i64>().ok())
            else {
                continue;
            };
            if self.exists::<T>(user_id) {
                users.push(user_id);
            }
        }
        users.sort_unstable();
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, UserStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = UserStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_load_missing_record() {
        let (_dir, store) = temp_store();
        assert!(store.load::<AuthState>(1).unwrap().is_none());
        assert!(!store.exists::<AuthState>(1));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let (_dir, store) = temp_store();

        let auth = AuthState {
            auth_valid: true,
            chat_id: 42,
        };
        store.save(1, &auth).unwrap();

        let loaded = store.load::<AuthState>(1).unwrap().unwrap();
        assert!(loaded.auth_valid);
        assert_eq!(loaded.chat_id, 42);
        assert!(store.exists::<AuthState>(1));
    }

    #[test]
    fn test_load_or_default() {
        let (_dir, store) = temp_store();

        let mute: MuteState = store.load_or_default(7).unwrap();
        assert!(!mute.muted);
        assert!(!mute.stopped);
    }

    #[test]
    fn test_kinds_are_independent() {
        let (_dir, store) = temp_store();

        store
            .save(
                1,
                &AuthState {
                    auth_valid: true,
                    chat_id: 1,
                },
            )
            .unwrap();

        assert!(store.exists::<AuthState>(1));
        assert!(!store.exists::<SubscriptionList>(1));
        assert!(store.load::<MuteState>(1).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_record_is_discarded() {
        let (dir, store) = temp_store();

        let path = dir.path().join("5").join("auth.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();

        assert!(store.load::<AuthState>(5).unwrap().is_none());
    }

    #[test]
    fn test_users_with_kind() {
        let (dir, store) = temp_store();

        let mut subs = SubscriptionList::default();
        subs.add(Subscription::new("https://a.example/feed", vec![]));

        store.save(3, &subs).unwrap();
        store.save(1, &subs).unwrap();
        store
            .save(
                2,
                &AuthState {
                    auth_valid: true,
                    chat_id: 2,
                },
            )
            .unwrap();

        // A stray non-numeric directory is ignored.
        fs::create_dir_all(dir.path().join("not-a-user")).unwrap();

        let users = store.users_with::<SubscriptionList>().unwrap();
        assert_eq!(users, vec![1, 3]);

        let users = store.users_with::<AuthState>().unwrap();
        assert_eq!(users, vec![2]);
    }
}
