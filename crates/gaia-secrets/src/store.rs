//! The typed secret store.
//!
//! Layers envelope encryption and the namespace authorization rule over the
//! storage engine. Every method validates identifiers before touching the
//! database; every value on disk is individually encrypted with a fresh
//! nonce under the caller-supplied master key.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::SecondsFormat;
use chrono::Utc;
use gaia_core::GaiaError;
use gaia_core::Result;
use gaia_core::constants::COMMON_CLIENT;
use gaia_core::constants::KEY_HASH_KEY;
use gaia_core::constants::MASTER_KEY_LEN;
use gaia_core::constants::SALT_KEY;
use gaia_core::validate_name;
use gaia_db::StoreDb;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::keys::client_prefix;
use crate::keys::compose_key;
use crate::keys::display_key;
use crate::keys::split_key;

/// A registered client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRecord {
    /// The client name, as bound to its certificate CN.
    pub name: String,
    /// RFC-3339 UTC registration timestamp.
    pub created_at: String,
}

/// One item of a bulk import.
#[derive(Debug, Clone)]
pub struct ImportItem {
    /// Owning client.
    pub client: String,
    /// Namespace under the client.
    pub namespace: String,
    /// Secret id.
    pub id: String,
    /// Plaintext value.
    pub value: String,
}

/// Typed API over the `secrets` and `clients` buckets.
pub struct SecretStore {
    db: Arc<StoreDb>,
}

impl SecretStore {
    /// Wrap an open database handle.
    pub fn new(db: Arc<StoreDb>) -> Self {
        Self { db }
    }

    // ========================================================================
    // Store metadata
    // ========================================================================

    /// Write the KDF salt and master-key hash. These are written exactly
    /// once, at init; a second call fails.
    pub fn init_metadata(&self, salt: &[u8], key_hash: &[u8]) -> Result<()> {
        self.db.with_write(|w| {
            if w.get_secret(SALT_KEY.as_bytes())?.is_some() {
                return Err(GaiaError::AlreadyInitialized {
                    path: self.db.path().display().to_string(),
                });
            }
            w.put_secret(SALT_KEY.as_bytes(), salt)?;
            w.put_secret(KEY_HASH_KEY.as_bytes(), key_hash)?;
            Ok(())
        })
    }

    /// Read back `(salt, key_hash)`. Fails with `NotInitialized` when the
    /// reserved keys are absent.
    pub fn read_metadata(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        self.db.with_read(|r| {
            let salt = r.get_secret(SALT_KEY.as_bytes())?.ok_or(GaiaError::NotInitialized)?;
            let key_hash = r.get_secret(KEY_HASH_KEY.as_bytes())?.ok_or(GaiaError::NotInitialized)?;
            Ok((salt, key_hash))
        })
    }

    // ========================================================================
    // Client registry
    // ========================================================================

    /// Register a client, or refresh its timestamp if already present.
    pub fn register_client(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        self.db.put_client(name, &now_rfc3339())?;
        info!(client_name = %name, "client registered");
        Ok(())
    }

    /// Whether a client is present in the registry.
    pub fn client_exists(&self, name: &str) -> Result<bool> {
        Ok(self.db.get_client(name)?.is_some())
    }

    /// All registered clients in name order.
    pub fn list_clients(&self) -> Result<Vec<ClientRecord>> {
        let clients = self.db.list_clients()?;
        Ok(clients
            .into_iter()
            .map(|(name, created_at)| ClientRecord { name, created_at })
            .collect())
    }

    /// Remove a client registration and every secret under its prefix, in
    /// one transaction.
    pub fn revoke_client(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let prefix = client_prefix(name);
        let removed = self.db.with_write(|w| {
            w.delete_client(name)?;
            let keys = w.scan_secret_keys(&prefix)?;
            for key in &keys {
                w.delete_secret(key)?;
            }
            Ok::<_, GaiaError>(keys.len())
        })?;
        info!(client_name = %name, secrets_removed = removed, "client revoked");
        Ok(())
    }

    // ========================================================================
    // Secrets
    // ========================================================================

    /// Encrypt and store a secret. Overwrite is unconditional.
    ///
    /// The owning client must already be registered, and the reserved
    /// `common` client only accepts the `common` namespace.
    pub fn put_secret(&self, key: &[u8; MASTER_KEY_LEN], client: &str, namespace: &str, id: &str, value: &str) -> Result<()> {
        validate_name(client)?;
        validate_name(namespace)?;
        validate_name(id)?;
        if client == COMMON_CLIENT && namespace != COMMON_CLIENT {
            return Err(GaiaError::IdentifierInvalid {
                name: namespace.to_string(),
                reason: format!("client '{COMMON_CLIENT}' only accepts the '{COMMON_CLIENT}' namespace"),
            });
        }
        if !self.client_exists(client)? {
            return Err(GaiaError::IdentifierInvalid {
                name: client.to_string(),
                reason: "client is not registered".to_string(),
            });
        }

        let envelope = gaia_crypto::encrypt(key, value.as_bytes())?;
        self.db.put_secret(&compose_key(client, namespace, id), envelope.as_bytes())?;

        info!(client_name = %client, namespace = %namespace, id = %id, "secret added");
        Ok(())
    }

    /// Fetch and decrypt a secret on behalf of `caller`.
    ///
    /// Authorization precedes lookup: the namespace must be `common` or the
    /// caller's own name. Secrets in the common namespace are stored under
    /// the literal `common` client component.
    pub fn get_secret(&self, key: &[u8; MASTER_KEY_LEN], caller: &str, namespace: &str, id: &str) -> Result<String> {
        if namespace != COMMON_CLIENT && namespace != caller {
            return Err(GaiaError::Unauthorized);
        }
        let lookup_client = if namespace == COMMON_CLIENT { COMMON_CLIENT } else { caller };

        let stored = self
            .db
            .get_secret(&compose_key(lookup_client, namespace, id))?
            .ok_or(GaiaError::NotFound)?;

        let envelope = String::from_utf8(stored).map_err(|_| GaiaError::Integrity {
            reason: "stored envelope is not valid UTF-8".to_string(),
        })?;
        let plaintext = gaia_crypto::decrypt(key, &envelope).inspect_err(|_| {
            error!(client_name = %caller, namespace = %namespace, id = %id, "secret failed to decrypt");
        })?;
        let value = String::from_utf8(plaintext).map_err(|_| GaiaError::Integrity {
            reason: "decrypted value is not valid UTF-8".to_string(),
        })?;

        info!(client_name = %caller, namespace = %namespace, id = %id, "secret accessed");
        Ok(value)
    }

    /// Remove a secret. Absence is not an error.
    pub fn delete_secret(&self, client: &str, namespace: &str, id: &str) -> Result<()> {
        validate_name(client)?;
        validate_name(namespace)?;
        validate_name(id)?;
        self.db.delete_secret(&compose_key(client, namespace, id))?;
        info!(client_name = %client, namespace = %namespace, id = %id, "secret deleted");
        Ok(())
    }

    /// Decrypt every secret under a client as `namespace -> id -> value`.
    ///
    /// Entries that fail to decrypt are logged and skipped so one corrupted
    /// record cannot deny the rest of the listing.
    pub fn list_secrets(
        &self,
        key: &[u8; MASTER_KEY_LEN],
        client: &str,
    ) -> Result<BTreeMap<String, BTreeMap<String, String>>> {
        validate_name(client)?;

        let mut all: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        for (stored_key, stored_value) in self.db.scan_secrets(&client_prefix(client))? {
            let Some((_, namespace, id)) = split_key(&stored_key) else {
                continue;
            };
            let Ok(envelope) = String::from_utf8(stored_value) else {
                warn!(namespace = %namespace, id = %id, "skipping entry with malformed envelope");
                continue;
            };
            match gaia_crypto::decrypt(key, &envelope) {
                Ok(plaintext) => {
                    let value = String::from_utf8_lossy(&plaintext).into_owned();
                    all.entry(namespace).or_default().insert(id, value);
                }
                Err(err) => {
                    warn!(namespace = %namespace, id = %id, error = %err, "failed to decrypt secret, skipping");
                }
            }
        }
        Ok(all)
    }

    /// The distinct namespaces observed under a client prefix, sorted.
    pub fn list_namespaces(&self, client: &str) -> Result<Vec<String>> {
        validate_name(client)?;

        let mut namespaces = BTreeSet::new();
        for (stored_key, _) in self.db.scan_secrets(&client_prefix(client))? {
            if let Some((_, namespace, _)) = split_key(&stored_key) {
                namespaces.insert(namespace);
            }
        }
        Ok(namespaces.into_iter().collect())
    }

    /// Bulk import in a single transaction.
    ///
    /// With `overwrite` off, the first collision fails the whole batch with
    /// `Conflict`; any validation, encryption, or storage error rolls every
    /// item back. Returns the number of secrets written.
    pub fn import_secrets(&self, key: &[u8; MASTER_KEY_LEN], items: &[ImportItem], overwrite: bool) -> Result<usize> {
        let imported = self.db.with_write(|w| {
            let mut count = 0usize;
            for item in items {
                validate_name(&item.client)?;
                validate_name(&item.namespace)?;
                validate_name(&item.id)?;
                if item.client == COMMON_CLIENT && item.namespace != COMMON_CLIENT {
                    return Err(GaiaError::IdentifierInvalid {
                        name: item.namespace.clone(),
                        reason: format!("client '{COMMON_CLIENT}' only accepts the '{COMMON_CLIENT}' namespace"),
                    });
                }
                if w.get_client(&item.client)?.is_none() {
                    return Err(GaiaError::IdentifierInvalid {
                        name: item.client.clone(),
                        reason: "client is not registered".to_string(),
                    });
                }

                let stored_key = compose_key(&item.client, &item.namespace, &item.id);
                if !overwrite && w.get_secret(&stored_key)?.is_some() {
                    return Err(GaiaError::Conflict {
                        key: display_key(&item.client, &item.namespace, &item.id),
                    });
                }

                let envelope = gaia_crypto::encrypt(key, item.value.as_bytes())?;
                w.put_secret(&stored_key, envelope.as_bytes())?;
                count += 1;
            }
            Ok(count)
        })?;

        info!(count = imported, "bulk secrets imported");
        Ok(imported)
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use gaia_core::constants::SALT_LEN;

    use super::*;

    fn open_store() -> (tempfile::TempDir, SecretStore) {
        let dir = tempfile::tempdir().unwrap();
        let db = StoreDb::open(&dir.path().join("gaia.db"), Duration::from_secs(1)).unwrap();
        let store = SecretStore::new(Arc::new(db));
        store.register_client(COMMON_CLIENT).unwrap();
        (dir, store)
    }

    fn master_key() -> [u8; MASTER_KEY_LEN] {
        [42u8; MASTER_KEY_LEN]
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    #[test]
    fn metadata_roundtrip() {
        let (_dir, store) = open_store();
        let salt = [1u8; SALT_LEN];
        let hash = [2u8; 32];
        store.init_metadata(&salt, &hash).unwrap();

        let (read_salt, read_hash) = store.read_metadata().unwrap();
        assert_eq!(read_salt, salt);
        assert_eq!(read_hash, hash);
    }

    #[test]
    fn metadata_is_written_exactly_once() {
        let (_dir, store) = open_store();
        store.init_metadata(&[1u8; SALT_LEN], &[2u8; 32]).unwrap();
        let err = store.init_metadata(&[3u8; SALT_LEN], &[4u8; 32]).unwrap_err();
        assert!(matches!(err, GaiaError::AlreadyInitialized { .. }));
    }

    #[test]
    fn missing_metadata_reads_as_not_initialized() {
        let (_dir, store) = open_store();
        assert!(matches!(store.read_metadata(), Err(GaiaError::NotInitialized)));
    }

    // ========================================================================
    // Write path and read path
    // ========================================================================

    #[test]
    fn get_after_add_returns_last_write() {
        let (_dir, store) = open_store();
        let key = master_key();
        store.register_client("web-a").unwrap();

        store.put_secret(&key, "web-a", "web-a", "db_url", "postgres://one").unwrap();
        store.put_secret(&key, "web-a", "web-a", "db_url", "postgres://two").unwrap();

        let value = store.get_secret(&key, "web-a", "web-a", "db_url").unwrap();
        assert_eq!(value, "postgres://two");
    }

    #[test]
    fn write_to_unregistered_client_is_rejected() {
        let (_dir, store) = open_store();
        let err = store.put_secret(&master_key(), "ghost", "ghost", "x", "v").unwrap_err();
        assert!(matches!(err, GaiaError::IdentifierInvalid { .. }));
    }

    #[test]
    fn common_client_only_accepts_common_namespace() {
        let (_dir, store) = open_store();
        let err = store.put_secret(&master_key(), "common", "prod", "x", "v").unwrap_err();
        assert!(matches!(err, GaiaError::IdentifierInvalid { .. }));

        store.put_secret(&master_key(), "common", "common", "shared", "x").unwrap();
    }

    #[test]
    fn invalid_identifiers_are_rejected_before_storage() {
        let (_dir, store) = open_store();
        let key = master_key();
        assert!(store.put_secret(&key, "Bad", "ns", "id", "v").is_err());
        assert!(store.put_secret(&key, "ok", "-ns", "id", "v").is_err());
        assert!(store.put_secret(&key, "ok", "ns", &"x".repeat(64), "v").is_err());
    }

    #[test]
    fn cross_namespace_read_is_unauthorized_even_when_secret_exists() {
        let (_dir, store) = open_store();
        let key = master_key();
        store.register_client("web-a").unwrap();
        store.register_client("web-b").unwrap();
        store.put_secret(&key, "web-b", "web-b", "token", "s3cret").unwrap();

        let err = store.get_secret(&key, "web-a", "web-b", "token").unwrap_err();
        assert!(matches!(err, GaiaError::Unauthorized));

        // And equally for a namespace that holds nothing.
        let err = store.get_secret(&key, "web-a", "nothing-here", "token").unwrap_err();
        assert!(matches!(err, GaiaError::Unauthorized));
    }

    #[test]
    fn common_namespace_is_readable_by_any_client() {
        let (_dir, store) = open_store();
        let key = master_key();
        store.put_secret(&key, "common", "common", "shared", "x").unwrap();

        assert_eq!(store.get_secret(&key, "web-a", "common", "shared").unwrap(), "x");
        assert_eq!(store.get_secret(&key, "web-b", "common", "shared").unwrap(), "x");
    }

    #[test]
    fn missing_secret_is_not_found() {
        let (_dir, store) = open_store();
        let err = store.get_secret(&master_key(), "web-a", "web-a", "missing").unwrap_err();
        assert!(matches!(err, GaiaError::NotFound));
    }

    #[test]
    fn wrong_key_surfaces_integrity_error() {
        let (_dir, store) = open_store();
        store.register_client("web-a").unwrap();
        store.put_secret(&master_key(), "web-a", "web-a", "db_url", "v").unwrap();

        let other_key = [7u8; MASTER_KEY_LEN];
        let err = store.get_secret(&other_key, "web-a", "web-a", "db_url").unwrap_err();
        assert!(matches!(err, GaiaError::Integrity { .. }));
    }

    #[test]
    fn delete_is_idempotent() {
        let (_dir, store) = open_store();
        let key = master_key();
        store.register_client("web-a").unwrap();
        store.put_secret(&key, "web-a", "web-a", "db_url", "v").unwrap();

        store.delete_secret("web-a", "web-a", "db_url").unwrap();
        store.delete_secret("web-a", "web-a", "db_url").unwrap();
        assert!(matches!(
            store.get_secret(&key, "web-a", "web-a", "db_url"),
            Err(GaiaError::NotFound)
        ));
    }

    // ========================================================================
    // Listing
    // ========================================================================

    #[test]
    fn list_secrets_groups_by_namespace() {
        let (_dir, store) = open_store();
        let key = master_key();
        store.register_client("web-a").unwrap();
        store.put_secret(&key, "web-a", "prod", "db_url", "p1").unwrap();
        store.put_secret(&key, "web-a", "prod", "api_key", "p2").unwrap();
        store.put_secret(&key, "web-a", "staging", "db_url", "s1").unwrap();

        let all = store.list_secrets(&key, "web-a").unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["prod"]["db_url"], "p1");
        assert_eq!(all["prod"]["api_key"], "p2");
        assert_eq!(all["staging"]["db_url"], "s1");
    }

    #[test]
    fn list_secrets_skips_undecryptable_entries() {
        let (_dir, store) = open_store();
        let key = master_key();
        store.register_client("web-a").unwrap();
        store.put_secret(&key, "web-a", "prod", "good", "readable").unwrap();
        // A second entry written under a different key cannot be decrypted.
        store.put_secret(&[9u8; MASTER_KEY_LEN], "web-a", "prod", "bad", "lost").unwrap();

        let all = store.list_secrets(&key, "web-a").unwrap();
        assert_eq!(all["prod"].len(), 1);
        assert_eq!(all["prod"]["good"], "readable");
    }

    #[test]
    fn list_namespaces_deduplicates() {
        let (_dir, store) = open_store();
        let key = master_key();
        store.register_client("web-a").unwrap();
        store.put_secret(&key, "web-a", "prod", "a", "1").unwrap();
        store.put_secret(&key, "web-a", "prod", "b", "2").unwrap();
        store.put_secret(&key, "web-a", "staging", "a", "3").unwrap();

        assert_eq!(store.list_namespaces("web-a").unwrap(), vec!["prod", "staging"]);
    }

    // ========================================================================
    // Revocation
    // ========================================================================

    #[test]
    fn revoke_removes_registration_and_all_secrets() {
        let (_dir, store) = open_store();
        let key = master_key();
        store.register_client("web-a").unwrap();
        store.register_client("web-b").unwrap();
        store.put_secret(&key, "web-a", "prod", "a", "1").unwrap();
        store.put_secret(&key, "web-a", "staging", "b", "2").unwrap();
        store.put_secret(&key, "web-b", "prod", "c", "3").unwrap();

        store.revoke_client("web-a").unwrap();

        assert!(!store.client_exists("web-a").unwrap());
        assert!(store.list_secrets(&key, "web-a").unwrap().is_empty());
        // Other clients are untouched.
        assert!(store.client_exists("web-b").unwrap());
        assert_eq!(store.list_secrets(&key, "web-b").unwrap()["prod"]["c"], "3");
    }

    // ========================================================================
    // Bulk import
    // ========================================================================

    fn import_item(client: &str, namespace: &str, id: &str, value: &str) -> ImportItem {
        ImportItem {
            client: client.to_string(),
            namespace: namespace.to_string(),
            id: id.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn import_writes_all_items() {
        let (_dir, store) = open_store();
        let key = master_key();
        store.register_client("web-a").unwrap();

        let items = vec![
            import_item("web-a", "prod", "a", "1"),
            import_item("web-a", "prod", "b", "2"),
            import_item("common", "common", "shared", "x"),
        ];
        assert_eq!(store.import_secrets(&key, &items, false).unwrap(), 3);
        let all = store.list_secrets(&key, "web-a").unwrap();
        assert_eq!(all["prod"]["a"], "1");
        assert_eq!(all["prod"]["b"], "2");
        assert_eq!(store.get_secret(&key, "web-a", "common", "shared").unwrap(), "x");
    }

    #[test]
    fn import_collision_rolls_back_whole_batch() {
        let (_dir, store) = open_store();
        let key = master_key();
        store.register_client("web-a").unwrap();
        store.put_secret(&key, "web-a", "prod", "existing", "before").unwrap();

        let items = vec![
            import_item("web-a", "prod", "fresh-1", "1"),
            import_item("web-a", "prod", "existing", "clobber"),
            import_item("web-a", "prod", "fresh-2", "2"),
        ];
        let err = store.import_secrets(&key, &items, false).unwrap_err();
        assert!(matches!(err, GaiaError::Conflict { .. }));

        // Post-state equals pre-state.
        let all = store.list_secrets(&key, "web-a").unwrap();
        assert_eq!(all["prod"].len(), 1);
        assert_eq!(all["prod"]["existing"], "before");
    }

    #[test]
    fn import_with_overwrite_replaces_existing() {
        let (_dir, store) = open_store();
        let key = master_key();
        store.register_client("web-a").unwrap();
        store.put_secret(&key, "web-a", "prod", "existing", "before").unwrap();

        let items = vec![import_item("web-a", "prod", "existing", "after")];
        assert_eq!(store.import_secrets(&key, &items, true).unwrap(), 1);
        assert_eq!(store.list_secrets(&key, "web-a").unwrap()["prod"]["existing"], "after");
    }

    #[test]
    fn import_to_unregistered_client_rolls_back() {
        let (_dir, store) = open_store();
        let key = master_key();
        store.register_client("web-a").unwrap();

        let items = vec![
            import_item("web-a", "prod", "a", "1"),
            import_item("ghost", "prod", "b", "2"),
        ];
        assert!(store.import_secrets(&key, &items, false).is_err());
        assert!(store.list_secrets(&key, "web-a").unwrap().is_empty());
    }
}
