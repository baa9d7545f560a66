//! Single-file embedded storage engine.
//!
//! Wraps a [`redb::Database`] with the two logical buckets the daemon uses:
//! `secrets` (byte keys, lexicographically ordered, prefix-scannable) and
//! `clients` (name to registration timestamp). Writes are transactional;
//! reads run against a consistent snapshot. Multi-operation writes (the
//! revocation cascade, bulk import) run inside a single transaction through
//! [`StoreDb::with_write`] and commit all-or-nothing.
//!
//! The database file is created with mode `0600`. Opening waits up to a
//! fixed deadline for the file lock so a second daemon cannot attach to the
//! same file.

pub mod error;

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;
use std::time::Instant;

use redb::Database;
use redb::DatabaseError;
use redb::ReadOnlyTable;
use redb::ReadableTable;
use redb::Table;
use redb::TableDefinition;
use snafu::ResultExt;

pub use crate::error::StorageError;
use crate::error::*;

/// The `secrets` bucket: composite byte keys to base64 envelopes.
const SECRETS_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new(gaia_core::constants::SECRETS_BUCKET);

/// The `clients` bucket: client names to RFC-3339 registration timestamps.
const CLIENTS_TABLE: TableDefinition<&str, &str> = TableDefinition::new(gaia_core::constants::CLIENTS_BUCKET);

/// Interval between lock acquisition attempts while opening.
const OPEN_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Handle to the on-disk store.
pub struct StoreDb {
    db: Database,
    path: PathBuf,
}

impl StoreDb {
    /// Open (or create) the database, waiting up to `lock_timeout` for the
    /// file lock. Both buckets are created if absent and the file mode is
    /// set to `0600`.
    pub fn open(path: &Path, lock_timeout: Duration) -> Result<Self, StorageError> {
        let deadline = Instant::now() + lock_timeout;
        let db = loop {
            match Database::create(path) {
                Ok(db) => break db,
                Err(err) if is_lock_contention(&err) => {
                    if Instant::now() >= deadline {
                        return OpenTimeoutSnafu { path }.fail();
                    }
                    std::thread::sleep(OPEN_RETRY_INTERVAL);
                }
                Err(err) => return Err(err).context(OpenDatabaseSnafu { path }),
            }
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .context(SetPermissionsSnafu { path })?;
        }

        let store = Self {
            db,
            path: path.to_path_buf(),
        };
        // Materialize both buckets so read snapshots never observe a
        // missing table.
        store.with_write::<_, StorageError>(|_| Ok(()))?;
        Ok(store)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` against a consistent read snapshot of both buckets.
    pub fn with_read<T, E>(&self, f: impl FnOnce(&ReadAccess) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StorageError>,
    {
        let txn = self.db.begin_read().context(BeginReadSnafu).map_err(E::from)?;
        let secrets = txn.open_table(SECRETS_TABLE).context(OpenTableSnafu).map_err(E::from)?;
        let clients = txn.open_table(CLIENTS_TABLE).context(OpenTableSnafu).map_err(E::from)?;
        f(&ReadAccess { secrets, clients })
    }

    /// Run `f` inside a single write transaction. The transaction commits
    /// only when `f` returns `Ok`; any error aborts it with no partial
    /// state.
    pub fn with_write<T, E>(&self, f: impl FnOnce(&mut WriteAccess<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StorageError>,
    {
        let txn = self.db.begin_write().context(BeginWriteSnafu).map_err(E::from)?;
        let result = {
            let secrets = txn.open_table(SECRETS_TABLE).context(OpenTableSnafu).map_err(E::from)?;
            let clients = txn.open_table(CLIENTS_TABLE).context(OpenTableSnafu).map_err(E::from)?;
            let mut access = WriteAccess { secrets, clients };
            f(&mut access)?
        };
        txn.commit().context(CommitSnafu).map_err(E::from)?;
        Ok(result)
    }

    /// Read a single secret entry.
    pub fn get_secret(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        self.with_read(|r| r.get_secret(key))
    }

    /// Write a single secret entry.
    pub fn put_secret(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.with_write(|w| w.put_secret(key, value))
    }

    /// Remove a single secret entry. Absent keys are not an error.
    pub fn delete_secret(&self, key: &[u8]) -> Result<(), StorageError> {
        self.with_write(|w| {
            w.delete_secret(key)?;
            Ok(())
        })
    }

    /// All secret entries whose key starts with `prefix`, in key order.
    pub fn scan_secrets(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        self.with_read(|r| r.scan_secrets(prefix))
    }

    /// Read a client registration timestamp.
    pub fn get_client(&self, name: &str) -> Result<Option<String>, StorageError> {
        self.with_read(|r| r.get_client(name))
    }

    /// Register or refresh a client.
    pub fn put_client(&self, name: &str, created_at: &str) -> Result<(), StorageError> {
        self.with_write(|w| w.put_client(name, created_at))
    }

    /// All client registrations in name order.
    pub fn list_clients(&self) -> Result<Vec<(String, String)>, StorageError> {
        self.with_read(|r| r.list_clients())
    }
}

/// Read view over both buckets within one snapshot.
pub struct ReadAccess {
    secrets: ReadOnlyTable<&'static [u8], &'static [u8]>,
    clients: ReadOnlyTable<&'static str, &'static str>,
}

impl ReadAccess {
    /// Read a single secret entry.
    pub fn get_secret(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let value = self.secrets.get(key).context(GetSnafu)?;
        Ok(value.map(|guard| guard.value().to_vec()))
    }

    /// Seek to `prefix` and collect entries while the prefix holds.
    pub fn scan_secrets(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let mut results = Vec::new();
        for item in self.secrets.range::<&[u8]>(prefix..).context(RangeSnafu)? {
            let (key, value) = item.context(GetSnafu)?;
            if !key.value().starts_with(prefix) {
                break;
            }
            results.push((key.value().to_vec(), value.value().to_vec()));
        }
        Ok(results)
    }

    /// Read a client registration timestamp.
    pub fn get_client(&self, name: &str) -> Result<Option<String>, StorageError> {
        let value = self.clients.get(name).context(GetSnafu)?;
        Ok(value.map(|guard| guard.value().to_string()))
    }

    /// All client registrations in name order.
    pub fn list_clients(&self) -> Result<Vec<(String, String)>, StorageError> {
        let mut clients = Vec::new();
        for item in self.clients.iter().context(RangeSnafu)? {
            let (name, created_at) = item.context(GetSnafu)?;
            clients.push((name.value().to_string(), created_at.value().to_string()));
        }
        Ok(clients)
    }
}

/// Write view over both buckets within one transaction.
pub struct WriteAccess<'txn> {
    secrets: Table<'txn, &'static [u8], &'static [u8]>,
    clients: Table<'txn, &'static str, &'static str>,
}

impl WriteAccess<'_> {
    /// Read a secret entry through the uncommitted transaction.
    pub fn get_secret(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let value = self.secrets.get(key).context(GetSnafu)?;
        Ok(value.map(|guard| guard.value().to_vec()))
    }

    /// Write a secret entry.
    pub fn put_secret(&mut self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.secrets.insert(key, value).context(InsertSnafu)?;
        Ok(())
    }

    /// Remove a secret entry. Returns whether it existed.
    pub fn delete_secret(&mut self, key: &[u8]) -> Result<bool, StorageError> {
        let removed = self.secrets.remove(key).context(RemoveSnafu)?;
        Ok(removed.is_some())
    }

    /// Collect the keys under `prefix` through the uncommitted transaction.
    pub fn scan_secret_keys(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>, StorageError> {
        let mut keys = Vec::new();
        for item in self.secrets.range::<&[u8]>(prefix..).context(RangeSnafu)? {
            let (key, _value) = item.context(GetSnafu)?;
            if !key.value().starts_with(prefix) {
                break;
            }
            keys.push(key.value().to_vec());
        }
        Ok(keys)
    }

    /// Read a client registration through the uncommitted transaction.
    pub fn get_client(&self, name: &str) -> Result<Option<String>, StorageError> {
        let value = self.clients.get(name).context(GetSnafu)?;
        Ok(value.map(|guard| guard.value().to_string()))
    }

    /// Register or refresh a client.
    pub fn put_client(&mut self, name: &str, created_at: &str) -> Result<(), StorageError> {
        self.clients.insert(name, created_at).context(InsertSnafu)?;
        Ok(())
    }

    /// Remove a client registration. Returns whether it existed.
    pub fn delete_client(&mut self, name: &str) -> Result<bool, StorageError> {
        let removed = self.clients.remove(name).context(RemoveSnafu)?;
        Ok(removed.is_some())
    }
}

fn is_lock_contention(err: &DatabaseError) -> bool {
    match err {
        DatabaseError::DatabaseAlreadyOpen => true,
        DatabaseError::Storage(redb::StorageError::Io(io)) => io.kind() == std::io::ErrorKind::WouldBlock,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, StoreDb) {
        let dir = tempfile::tempdir().unwrap();
        let db = StoreDb::open(&dir.path().join("gaia.db"), Duration::from_secs(1)).unwrap();
        (dir, db)
    }

    #[test]
    fn put_get_delete_roundtrip() {
        let (_dir, db) = open_temp();
        db.put_secret(b"web-a\x00prod\x00db_url", b"envelope").unwrap();
        assert_eq!(db.get_secret(b"web-a\x00prod\x00db_url").unwrap(), Some(b"envelope".to_vec()));

        db.delete_secret(b"web-a\x00prod\x00db_url").unwrap();
        assert_eq!(db.get_secret(b"web-a\x00prod\x00db_url").unwrap(), None);
    }

    #[test]
    fn delete_of_absent_key_is_ok() {
        let (_dir, db) = open_temp();
        db.delete_secret(b"nope").unwrap();
    }

    #[test]
    fn prefix_scan_stops_at_prefix_boundary() {
        let (_dir, db) = open_temp();
        db.put_secret(b"web-a\x00prod\x00a", b"1").unwrap();
        db.put_secret(b"web-a\x00prod\x00b", b"2").unwrap();
        db.put_secret(b"web-b\x00prod\x00a", b"3").unwrap();

        let hits = db.scan_secrets(b"web-a\x00").unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|(k, _)| k.starts_with(b"web-a\x00")));
    }

    #[test]
    fn scan_of_empty_prefix_space_is_empty() {
        let (_dir, db) = open_temp();
        assert!(db.scan_secrets(b"missing\x00").unwrap().is_empty());
    }

    #[test]
    fn clients_bucket_roundtrip() {
        let (_dir, db) = open_temp();
        db.put_client("web-a", "2026-08-02T00:00:00Z").unwrap();
        assert_eq!(db.get_client("web-a").unwrap(), Some("2026-08-02T00:00:00Z".to_string()));
        assert_eq!(db.get_client("web-b").unwrap(), None);

        let all = db.list_clients().unwrap();
        assert_eq!(all, vec![("web-a".to_string(), "2026-08-02T00:00:00Z".to_string())]);
    }

    #[test]
    fn failed_write_transaction_rolls_back() {
        let (_dir, db) = open_temp();
        db.put_secret(b"keep", b"original").unwrap();

        let result: Result<(), StorageError> = db.with_write(|w| {
            w.put_secret(b"keep", b"clobbered")?;
            w.put_secret(b"new", b"value")?;
            Err(StorageError::OpenTimeout {
                path: PathBuf::from("synthetic"),
            })
        });
        assert!(result.is_err());

        assert_eq!(db.get_secret(b"keep").unwrap(), Some(b"original".to_vec()));
        assert_eq!(db.get_secret(b"new").unwrap(), None);
    }

    #[test]
    fn second_open_times_out_while_first_is_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gaia.db");
        let _held = StoreDb::open(&path, Duration::from_secs(1)).unwrap();

        let started = Instant::now();
        let second = StoreDb::open(&path, Duration::from_millis(200));
        assert!(matches!(second, Err(StorageError::OpenTimeout { .. })));
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[cfg(unix)]
    #[test]
    fn database_file_mode_is_0600() {
        use std::os::unix::fs::PermissionsExt;

        let (dir, _db) = open_temp();
        let mode = std::fs::metadata(dir.path().join("gaia.db")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
