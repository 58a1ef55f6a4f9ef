//! Durable mapping of queue item id to notification handle, plus the
//! credential slot, using redb.
//!
//! # Table design
//!
//! ```text
//! tracked_items : item_id (str) -> notification handle (str)
//! credential    : "refresh_token" -> opaque token (str)
//! ```
//!
//! Every mutation runs in its own write transaction and is committed before
//! the call returns, so an interrupted process never leaves a half-written
//! record behind.

use std::collections::BTreeSet;
use std::path::Path;

use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::Serialize;

use crate::channel::NotificationHandle;
use crate::error::{RelayError, Result};

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

const TRACKED: TableDefinition<&str, &str> = TableDefinition::new("tracked_items");
const CREDENTIAL: TableDefinition<&str, &str> = TableDefinition::new("credential");

const CREDENTIAL_KEY: &str = "refresh_token";

fn db_err(e: impl std::fmt::Display) -> RelayError {
    RelayError::Store(e.to_string())
}

// ---------------------------------------------------------------------------
// Store contract
// ---------------------------------------------------------------------------

/// A queue item that has been notified and not yet retracted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedItem {
    pub item_id: String,
    pub handle: NotificationHandle,
}

/// Persistent state owned by the reconciliation engine.
///
/// Every method is durable on success. Callers must check [`Store::exists`]
/// before [`Store::record`]; recording an id twice is a contract violation
/// reported as [`RelayError::DuplicateKey`].
pub trait Store {
    fn record(&mut self, item_id: &str, handle: &NotificationHandle) -> Result<()>;

    fn exists(&self, item_id: &str) -> Result<bool>;

    /// Fails with [`RelayError::NotFound`] when `item_id` is not tracked.
    fn handle_of(&self, item_id: &str) -> Result<NotificationHandle>;

    /// Idempotent: removing an untracked id succeeds.
    fn remove(&mut self, item_id: &str) -> Result<()>;

    fn all_tracked_ids(&self) -> Result<BTreeSet<String>>;

    /// Every tracked item, ordered by id.
    fn tracked(&self) -> Result<Vec<TrackedItem>>;

    fn get_credential(&self) -> Result<Option<String>>;

    /// Replaces whatever credential was stored before.
    fn set_credential(&mut self, token: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// RedbStore
// ---------------------------------------------------------------------------

pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open or create the database at `path`, creating both tables.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(db_err)?;
        // Ensure the tables exist before any reads
        let wt = db.begin_write().map_err(db_err)?;
        wt.open_table(TRACKED).map_err(db_err)?;
        wt.open_table(CREDENTIAL).map_err(db_err)?;
        wt.commit().map_err(db_err)?;
        Ok(Self { db })
    }

    /// Number of tracked items.
    pub fn len(&self) -> Result<u64> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(TRACKED).map_err(db_err)?;
        table.len().map_err(db_err)
    }
}

impl Store for RedbStore {
    fn record(&mut self, item_id: &str, handle: &NotificationHandle) -> Result<()> {
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut table = wt.open_table(TRACKED).map_err(db_err)?;
            if table.get(item_id).map_err(db_err)?.is_some() {
                return Err(RelayError::DuplicateKey(item_id.to_string()));
            }
            table.insert(item_id, handle.as_str()).map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(())
    }

    fn exists(&self, item_id: &str) -> Result<bool> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(TRACKED).map_err(db_err)?;
        Ok(table.get(item_id).map_err(db_err)?.is_some())
    }

    fn handle_of(&self, item_id: &str) -> Result<NotificationHandle> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(TRACKED).map_err(db_err)?;
        let value = table
            .get(item_id)
            .map_err(db_err)?
            .ok_or_else(|| RelayError::NotFound(item_id.to_string()))?;
        Ok(NotificationHandle::new(value.value()))
    }

    fn remove(&mut self, item_id: &str) -> Result<()> {
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut table = wt.open_table(TRACKED).map_err(db_err)?;
            table.remove(item_id).map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(())
    }

    fn all_tracked_ids(&self) -> Result<BTreeSet<String>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(TRACKED).map_err(db_err)?;

        let mut ids = BTreeSet::new();
        for entry in table.iter().map_err(db_err)? {
            let (k, _) = entry.map_err(db_err)?;
            ids.insert(k.value().to_string());
        }
        Ok(ids)
    }

    fn tracked(&self) -> Result<Vec<TrackedItem>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(TRACKED).map_err(db_err)?;

        let mut result = Vec::new();
        for entry in table.iter().map_err(db_err)? {
            let (k, v) = entry.map_err(db_err)?;
            result.push(TrackedItem {
                item_id: k.value().to_string(),
                handle: NotificationHandle::new(v.value()),
            });
        }
        Ok(result)
    }

    fn get_credential(&self) -> Result<Option<String>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(CREDENTIAL).map_err(db_err)?;
        let value = table.get(CREDENTIAL_KEY).map_err(db_err)?;
        Ok(value.map(|v| v.value().to_string()))
    }

    fn set_credential(&mut self, token: &str) -> Result<()> {
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut table = wt.open_table(CREDENTIAL).map_err(db_err)?;
            table.insert(CREDENTIAL_KEY, token).map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_tmp() -> (TempDir, RedbStore) {
        let dir = TempDir::new().unwrap();
        let store = RedbStore::open(&dir.path().join("test.redb")).unwrap();
        (dir, store)
    }

    fn h(id: &str) -> NotificationHandle {
        NotificationHandle::new(id)
    }

    #[test]
    fn record_then_lookup() {
        let (_dir, mut store) = open_tmp();
        store.record("t1_a", &h("100")).unwrap();

        assert!(store.exists("t1_a").unwrap());
        assert!(!store.exists("t1_b").unwrap());
        assert_eq!(store.handle_of("t1_a").unwrap(), h("100"));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn record_twice_is_duplicate_key_and_keeps_first_handle() {
        let (_dir, mut store) = open_tmp();
        store.record("t1_a", &h("100")).unwrap();

        let err = store.record("t1_a", &h("200")).unwrap_err();
        assert!(matches!(err, RelayError::DuplicateKey(ref id) if id == "t1_a"), "{err:?}");
        assert_eq!(store.handle_of("t1_a").unwrap(), h("100"));
    }

    #[test]
    fn handle_of_untracked_is_not_found() {
        let (_dir, store) = open_tmp();
        let err = store.handle_of("t3_missing").unwrap_err();
        assert!(matches!(err, RelayError::NotFound(_)), "{err:?}");
    }

    #[test]
    fn remove_is_idempotent() {
        let (_dir, mut store) = open_tmp();
        store.record("t1_a", &h("100")).unwrap();
        store.remove("t1_a").unwrap();
        store.remove("t1_a").unwrap();
        store.remove("never-tracked").unwrap();
        assert!(!store.exists("t1_a").unwrap());
        assert_eq!(store.len().unwrap(), 0);
    }

    #[test]
    fn all_tracked_ids_is_sorted() {
        let (_dir, mut store) = open_tmp();
        store.record("t3_z", &h("3")).unwrap();
        store.record("t1_a", &h("1")).unwrap();
        store.record("t1_m", &h("2")).unwrap();

        let ids: Vec<_> = store.all_tracked_ids().unwrap().into_iter().collect();
        assert_eq!(ids, vec!["t1_a", "t1_m", "t3_z"]);

        let tracked = store.tracked().unwrap();
        assert_eq!(tracked[0].item_id, "t1_a");
        assert_eq!(tracked[0].handle, h("1"));
    }

    #[test]
    fn credential_slot_starts_empty_and_overwrites() {
        let (_dir, mut store) = open_tmp();
        assert_eq!(store.get_credential().unwrap(), None);

        store.set_credential("first").unwrap();
        store.set_credential("second").unwrap();
        assert_eq!(store.get_credential().unwrap().as_deref(), Some("second"));
    }

    #[test]
    fn state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/state.redb");
        {
            let mut store = RedbStore::open(&path).unwrap();
            store.record("t1_a", &h("100")).unwrap();
            store.set_credential("token").unwrap();
        }
        let store = RedbStore::open(&path).unwrap();
        assert_eq!(store.handle_of("t1_a").unwrap(), h("100"));
        assert_eq!(store.get_credential().unwrap().as_deref(), Some("token"));
    }
}
