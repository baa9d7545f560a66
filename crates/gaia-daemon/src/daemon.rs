//! The daemon lifecycle state machine.
//!
//! Four states: uninitialized, locked, unlocked, stopped. The master key
//! and the CA private key exist in process memory only while unlocked; both
//! are dropped (and the key zeroized) on lock, stop, and listener teardown.
//!
//! One `RwLock` guards the whole mutable state. Lifecycle transitions take
//! the write guard; operational reads take the read guard, so every request
//! observes a consistent `(status, key)` pair for its duration.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use gaia_core::DaemonStatus;
use gaia_core::GaiaError;
use gaia_core::Result;
use gaia_core::constants::COMMON_CLIENT;
use gaia_core::constants::DB_LOCK_TIMEOUT;
use gaia_core::constants::MASTER_KEY_LEN;
use gaia_core::constants::MAX_CONCURRENT_STREAMS;
use gaia_core::constants::MIN_CLIENT_KEEPALIVE_SECS;
use gaia_core::validate_name;
use gaia_crypto::MasterKey;
use gaia_db::StoreDb;
use gaia_pki::CertificateAuthority;
use gaia_proto::GaiaAdminServer;
use gaia_proto::GaiaClientServer;
use gaia_secrets::ClientRecord;
use gaia_secrets::ImportItem;
use gaia_secrets::SecretStore;
use tokio::sync::Notify;
use tokio::sync::RwLock;
use tonic::transport::Certificate;
use tonic::transport::Identity;
use tonic::transport::Server;
use tonic::transport::ServerTlsConfig;
use tracing::error;
use tracing::info;

use crate::config::DaemonConfig;
use crate::service::AdminService;
use crate::service::ClientService;
use crate::service::max_message_size;

struct DaemonState {
    status: DaemonStatus,
    master_key: Option<MasterKey>,
    ca: Option<CertificateAuthority>,
    db: Option<Arc<StoreDb>>,
}

impl DaemonState {
    /// The key and database handle, available only while unlocked.
    fn unlocked(&self) -> Result<(&[u8; MASTER_KEY_LEN], Arc<StoreDb>)> {
        if self.status != DaemonStatus::Unlocked {
            return Err(GaiaError::DaemonLocked);
        }
        let key = self.master_key.as_deref().ok_or(GaiaError::DaemonLocked)?;
        let db = self.db.clone().ok_or(GaiaError::DaemonLocked)?;
        Ok((key, db))
    }
}

/// The Gaia daemon.
pub struct Daemon {
    config: DaemonConfig,
    state: RwLock<DaemonState>,
    shutdown: Notify,
}

impl Daemon {
    /// Create a daemon over a configuration. The initial status reflects
    /// whether the database file exists.
    pub fn new(config: DaemonConfig) -> Arc<Self> {
        let status = if config.db_path().exists() {
            DaemonStatus::Stopped
        } else {
            DaemonStatus::Uninitialized
        };
        Arc::new(Self {
            config,
            state: RwLock::new(DaemonState {
                status,
                master_key: None,
                ca: None,
                db: None,
            }),
            shutdown: Notify::new(),
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    // ========================================================================
    // Lifecycle transitions
    // ========================================================================

    /// One-shot local bootstrap: create the database, derive the master key,
    /// store the salt and key hash, and register the `common` client.
    ///
    /// The key is derived only to compute its hash and is zeroized before
    /// returning; the daemon stays out of the unlocked state. The listener
    /// is not started.
    pub async fn initialize(&self, passphrase: &str) -> Result<()> {
        let db_path = self.config.db_path();
        if db_path.exists() {
            return Err(GaiaError::AlreadyInitialized {
                path: db_path.display().to_string(),
            });
        }
        gaia_crypto::check_strength(passphrase)?;

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let salt = gaia_crypto::generate_salt();
        let key = gaia_crypto::derive_key(passphrase.as_bytes(), &salt)?;
        let key_hash = gaia_crypto::key_hash(key.as_ref());

        {
            let db = StoreDb::open(&db_path, DB_LOCK_TIMEOUT)?;
            let store = SecretStore::new(Arc::new(db));
            store.init_metadata(&salt, &key_hash)?;
            store.register_client(COMMON_CLIENT)?;
        }
        // `key` is zeroized on drop here.

        let mut state = self.state.write().await;
        state.status = DaemonStatus::Stopped;
        info!(db = %db_path.display(), "gaia initialized");
        Ok(())
    }

    /// Generate and persist the PKI material if absent: the root CA pair,
    /// the server leaf, and the operator certificate.
    pub fn provision_pki(&self) -> Result<()> {
        let certs_dir = self.config.certs_dir();
        if gaia_pki::disk::ca_cert_path(&certs_dir).exists() {
            return Ok(());
        }

        let ca = CertificateAuthority::generate(&self.config.ca_common_name)?;
        gaia_pki::write_ca(&certs_dir, &ca)?;

        let server = ca.issue_server(&self.config.server_name)?;
        gaia_pki::write_server_pair(&certs_dir, &server)?;

        let operator = ca.issue_client(&self.config.operator_name)?;
        gaia_pki::write_client_pair(&certs_dir, &self.config.operator_name, &operator)?;

        info!(dir = %certs_dir.display(), "PKI provisioned");
        Ok(())
    }

    /// Open the database and enter the locked state without binding the
    /// listener. Fails with `NotInitialized` when the database is absent.
    pub async fn enter_locked(&self) -> Result<()> {
        let db_path = self.config.db_path();
        if !db_path.exists() {
            return Err(GaiaError::NotInitialized);
        }

        let db = StoreDb::open(&db_path, DB_LOCK_TIMEOUT)?;
        let mut state = self.state.write().await;
        state.db = Some(Arc::new(db));
        state.master_key = None;
        state.ca = None;
        state.status = DaemonStatus::Locked;
        info!("daemon entered locked state");
        Ok(())
    }

    /// Start the daemon: open the database, load the TLS material, bind the
    /// mTLS listener, and serve until [`Daemon::stop`] is called or the
    /// listener fails. Returns after the graceful shutdown completes.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let addr: std::net::SocketAddr = self.config.listen_addr.parse().map_err(|e| GaiaError::Config {
            reason: format!("invalid listen address '{}': {e}", self.config.listen_addr),
        })?;

        self.enter_locked().await?;

        let tls = match self.load_tls_config() {
            Ok(tls) => tls,
            Err(err) => {
                self.teardown().await;
                return Err(err);
            }
        };

        let admin = GaiaAdminServer::new(AdminService::new(self.clone()))
            .max_decoding_message_size(max_message_size())
            .max_encoding_message_size(max_message_size());
        let client = GaiaClientServer::new(ClientService::new(self.clone()))
            .max_decoding_message_size(max_message_size())
            .max_encoding_message_size(max_message_size());

        let router = match Server::builder()
            .tls_config(tls)
            .map_err(|e| GaiaError::Config {
                reason: format!("invalid TLS configuration: {e}"),
            }) {
            Ok(builder) => builder
                .max_concurrent_streams(MAX_CONCURRENT_STREAMS)
                .http2_keepalive_interval(Some(Duration::from_secs(MIN_CLIENT_KEEPALIVE_SECS)))
                .add_service(admin)
                .add_service(client),
            Err(err) => {
                self.teardown().await;
                return Err(err);
            }
        };

        // Bind separately from serving so a bind failure is a startup
        // error, not a fatal runtime error.
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(err) => {
                self.teardown().await;
                return Err(GaiaError::Config {
                    reason: format!("could not bind {addr}: {err}"),
                });
            }
        };
        let incoming = tokio_stream::wrappers::TcpListenerStream::new(listener);

        info!(addr = %addr, "gaia daemon listening");
        let serve_result = router.serve_with_incoming_shutdown(incoming, self.shutdown.notified()).await;

        self.teardown().await;
        match serve_result {
            Ok(()) => {
                info!("gaia daemon stopped");
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "listener failed");
                Err(GaiaError::Runtime {
                    reason: format!("listener failed: {err}"),
                })
            }
        }
    }

    /// Validate the passphrase against the stored key hash and move to the
    /// unlocked state. A mismatch changes nothing.
    pub async fn unlock(&self, passphrase: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if state.status == DaemonStatus::Unlocked {
            return Ok(());
        }
        if state.status != DaemonStatus::Locked {
            return Err(GaiaError::DaemonLocked);
        }
        let db = state.db.clone().ok_or(GaiaError::DaemonLocked)?;

        let store = SecretStore::new(db);
        let (salt, stored_hash) = store.read_metadata()?;

        let key = gaia_crypto::derive_key(passphrase.as_bytes(), &salt)?;
        if gaia_crypto::key_hash(key.as_ref())[..] != stored_hash[..] {
            info!("unlock rejected");
            return Err(GaiaError::InvalidPassphrase);
        }

        let ca = gaia_pki::load_ca(&self.config.certs_dir())?;
        state.master_key = Some(key);
        state.ca = Some(ca);
        state.status = DaemonStatus::Unlocked;
        info!("daemon unlocked");
        Ok(())
    }

    /// Zeroize and drop the master key and CA key, returning to the locked
    /// state. The listener keeps serving.
    pub async fn lock(&self) {
        let mut state = self.state.write().await;
        state.master_key = None;
        state.ca = None;
        if state.status == DaemonStatus::Unlocked {
            state.status = DaemonStatus::Locked;
        }
        info!("daemon locked");
    }

    /// Begin a graceful shutdown: in-flight RPCs finish, then the database
    /// closes and the key is wiped.
    pub fn stop(&self) {
        info!("stop requested");
        self.shutdown.notify_one();
    }

    /// Current lifecycle status.
    pub async fn status(&self) -> DaemonStatus {
        self.state.read().await.status
    }

    async fn teardown(&self) {
        let mut state = self.state.write().await;
        state.master_key = None;
        state.ca = None;
        state.db = None;
        state.status = DaemonStatus::Stopped;
    }

    fn load_tls_config(&self) -> Result<ServerTlsConfig> {
        let certs_dir = self.config.certs_dir();

        let ca_pem = std::fs::read(gaia_pki::disk::ca_cert_path(&certs_dir)).map_err(|e| GaiaError::Certificate {
            reason: format!("could not read CA certificate: {e}"),
        })?;

        // The server leaf can be minted on demand as long as the CA pair is
        // on disk.
        if !gaia_pki::server_pair_exists(&certs_dir) {
            let ca = gaia_pki::load_ca(&certs_dir)?;
            let pair = ca.issue_server(&self.config.server_name)?;
            gaia_pki::write_server_pair(&certs_dir, &pair)?;
        }

        let cert_pem =
            std::fs::read(certs_dir.join(gaia_pki::disk::SERVER_CERT_FILE)).map_err(|e| GaiaError::Certificate {
                reason: format!("could not read server certificate: {e}"),
            })?;
        let key_pem =
            std::fs::read(certs_dir.join(gaia_pki::disk::SERVER_KEY_FILE)).map_err(|e| GaiaError::Certificate {
                reason: format!("could not read server key: {e}"),
            })?;

        Ok(ServerTlsConfig::new()
            .identity(Identity::from_pem(cert_pem, key_pem))
            .client_ca_root(Certificate::from_pem(ca_pem))
            .client_auth_optional(false))
    }

    // ========================================================================
    // Operations delegated by the RPC services
    // ========================================================================

    /// Admin write: encrypt and store a secret for an explicit client.
    pub async fn add_secret(&self, client: &str, namespace: &str, id: &str, value: &str) -> Result<()> {
        let state = self.state.read().await;
        let (key, db) = state.unlocked()?;
        SecretStore::new(db).put_secret(key, client, namespace, id, value)
    }

    /// Client read: fetch a secret on behalf of the authenticated caller.
    pub async fn get_secret_for(&self, caller: &str, namespace: &str, id: &str) -> Result<String> {
        let state = self.state.read().await;
        let (key, db) = state.unlocked()?;
        SecretStore::new(db).get_secret(key, caller, namespace, id)
    }

    /// Admin delete. Absence is success.
    pub async fn delete_secret(&self, client: &str, namespace: &str, id: &str) -> Result<()> {
        let state = self.state.read().await;
        let (_, db) = state.unlocked()?;
        SecretStore::new(db).delete_secret(client, namespace, id)
    }

    /// Admin listing of every secret under a client.
    pub async fn list_secrets(&self, client: &str) -> Result<BTreeMap<String, BTreeMap<String, String>>> {
        let state = self.state.read().await;
        let (key, db) = state.unlocked()?;
        SecretStore::new(db).list_secrets(key, client)
    }

    /// Admin listing of the namespaces under a client.
    pub async fn list_namespaces(&self, client: &str) -> Result<Vec<String>> {
        let state = self.state.read().await;
        let (_, db) = state.unlocked()?;
        SecretStore::new(db).list_namespaces(client)
    }

    /// Register a client and mint its certificate. The PEM pair is returned
    /// to the caller and never persisted server-side.
    pub async fn register_client(&self, name: &str) -> Result<(String, String)> {
        validate_name(name)?;
        let state = self.state.read().await;
        let (_, db) = state.unlocked()?;
        let ca = state.ca.as_ref().ok_or(GaiaError::DaemonLocked)?;

        let pair = ca.issue_client(name)?;
        SecretStore::new(db).register_client(name)?;
        Ok((pair.cert_pem, pair.key_pem))
    }

    /// All registered clients.
    pub async fn list_clients(&self) -> Result<Vec<ClientRecord>> {
        let state = self.state.read().await;
        let (_, db) = state.unlocked()?;
        SecretStore::new(db).list_clients()
    }

    /// Remove a client and cascade-delete its secrets.
    pub async fn revoke_client(&self, name: &str) -> Result<()> {
        let state = self.state.read().await;
        let (_, db) = state.unlocked()?;
        SecretStore::new(db).revoke_client(name)
    }

    /// Transactional bulk import.
    pub async fn import_secrets(&self, items: &[ImportItem], overwrite: bool) -> Result<usize> {
        let state = self.state.read().await;
        let (key, db) = state.unlocked()?;
        SecretStore::new(db).import_secrets(key, items, overwrite)
    }

    /// The common area, optionally filtered to one namespace.
    pub async fn common_secrets(&self, namespace: Option<&str>) -> Result<BTreeMap<String, BTreeMap<String, String>>> {
        let state = self.state.read().await;
        let (key, db) = state.unlocked()?;
        let mut all = SecretStore::new(db).list_secrets(key, COMMON_CLIENT)?;
        if let Some(wanted) = namespace {
            all.retain(|name, _| name == wanted);
        }
        Ok(all)
    }

    /// Namespaces visible to a caller: its own plus the common ones.
    pub async fn namespaces_for(&self, caller: &str) -> Result<Vec<String>> {
        let state = self.state.read().await;
        let (_, db) = state.unlocked()?;
        let store = SecretStore::new(db);

        let mut namespaces = store.list_namespaces(caller)?;
        for namespace in store.list_namespaces(COMMON_CLIENT)? {
            if !namespaces.contains(&namespace) {
                namespaces.push(namespace);
            }
        }
        namespaces.sort();
        Ok(namespaces)
    }
}
