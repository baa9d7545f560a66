//! High-level client for applications that consume secrets from a Gaia
//! daemon.
//!
//! Connects over mutual TLS with the certificate pair the daemon operator
//! issued for this client. The daemon attributes every request to the
//! certificate's subject CN; there is nothing to configure beyond the
//! certificate itself.
//!
//! ```no_run
//! # async fn example() -> Result<(), gaia_client::ClientError> {
//! use gaia_client::Client;
//! use gaia_client::ClientConfig;
//!
//! let mut client = Client::connect(ClientConfig {
//!     address: "localhost:50051".to_string(),
//!     ca_cert: "/etc/gaia/certs/ca.crt".into(),
//!     client_cert: "/etc/gaia/certs/web-a.crt".into(),
//!     client_key: "/etc/gaia/certs/web-a.key".into(),
//!     ..ClientConfig::default()
//! })
//! .await?;
//!
//! let db_url = client.get_secret("prod", "db_url").await?;
//! # let _ = db_url;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use gaia_core::constants::ENV_VAR_PREFIX;
use gaia_proto::GaiaClientClient;
use gaia_proto::v1::GetCommonSecretsRequest;
use gaia_proto::v1::GetNamespacesRequest;
use gaia_proto::v1::GetSecretRequest;
use gaia_proto::v1::GetStatusRequest;
use thiserror::Error;
use tonic::transport::Certificate;
use tonic::transport::Channel;
use tonic::transport::ClientTlsConfig;
use tonic::transport::Identity;
use tracing::debug;

/// Errors from the client library.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A TLS material file could not be read.
    #[error("could not read credential file '{path}': {source}")]
    Credentials {
        /// The file that failed to load.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The channel could not be established.
    #[error("could not connect to gaia daemon: {0}")]
    Connect(#[from] tonic::transport::Error),

    /// The daemon rejected the request.
    #[error("rpc failed: {0}")]
    Rpc(#[from] tonic::Status),
}

/// Connection settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Daemon address as `host:port`.
    pub address: String,
    /// Path to the Gaia CA certificate.
    pub ca_cert: PathBuf,
    /// Path to this client's certificate.
    pub client_cert: PathBuf,
    /// Path to this client's private key.
    pub client_key: PathBuf,
    /// Server name expected on the daemon's certificate.
    pub domain_name: String,
    /// Connection timeout.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: "localhost:50051".to_string(),
            ca_cert: PathBuf::from("ca.crt"),
            client_cert: PathBuf::from("client.crt"),
            client_key: PathBuf::from("client.key"),
            domain_name: "localhost".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

/// A connected Gaia client.
pub struct Client {
    inner: GaiaClientClient<Channel>,
}

impl Client {
    /// Load the TLS material and establish the mTLS channel.
    pub async fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        let ca = read_credential(&config.ca_cert).await?;
        let cert = read_credential(&config.client_cert).await?;
        let key = read_credential(&config.client_key).await?;

        let tls = ClientTlsConfig::new()
            .ca_certificate(Certificate::from_pem(ca))
            .identity(Identity::from_pem(cert, key))
            .domain_name(config.domain_name.clone());

        let endpoint = Channel::from_shared(format!("https://{}", config.address))
            .map_err(|e| ClientError::Rpc(tonic::Status::invalid_argument(format!("invalid address: {e}"))))?
            .tls_config(tls)?
            .connect_timeout(config.timeout)
            .timeout(config.timeout);

        let channel = endpoint.connect().await?;
        debug!(address = %config.address, "connected to gaia daemon");

        Ok(Self {
            inner: GaiaClientClient::new(channel),
        })
    }

    /// Fetch one secret from a namespace this client is authorized for.
    pub async fn get_secret(&mut self, namespace: &str, id: &str) -> Result<String, ClientError> {
        let response = self
            .inner
            .get_secret(GetSecretRequest {
                namespace: namespace.to_string(),
                id: id.to_string(),
            })
            .await?;
        Ok(response.into_inner().value)
    }

    /// Fetch the shared common area as `namespace -> id -> value`,
    /// optionally restricted to one namespace.
    pub async fn get_common_secrets(
        &mut self,
        namespace: Option<&str>,
    ) -> Result<BTreeMap<String, BTreeMap<String, String>>, ClientError> {
        let response = self
            .inner
            .get_common_secrets(GetCommonSecretsRequest {
                namespace: namespace.map(str::to_string),
            })
            .await?;

        let mut secrets = BTreeMap::new();
        for namespace in response.into_inner().namespaces {
            let entries = namespace.secrets.into_iter().map(|s| (s.id, s.value)).collect();
            secrets.insert(namespace.name, entries);
        }
        Ok(secrets)
    }

    /// The namespaces this client can read: its own plus the common ones.
    pub async fn get_namespaces(&mut self) -> Result<Vec<String>, ClientError> {
        let response = self.inner.get_namespaces(GetNamespacesRequest {}).await?;
        Ok(response.into_inner().namespaces)
    }

    /// The daemon's lifecycle status string.
    pub async fn get_status(&mut self) -> Result<String, ClientError> {
        let response = self.inner.get_status(GetStatusRequest {}).await?;
        Ok(response.into_inner().status)
    }

    /// Fetch the common area and inject it into this process's
    /// environment as `GAIA_<NAMESPACE>_<KEY>` (uppercased, hyphens
    /// converted to underscores).
    pub async fn load_env(&mut self) -> Result<(), ClientError> {
        let secrets = self.get_common_secrets(None).await?;
        for (namespace, entries) in secrets {
            for (id, value) in entries {
                std::env::set_var(env_var_name(&namespace, &id), value);
            }
        }
        Ok(())
    }
}

async fn read_credential(path: &PathBuf) -> Result<Vec<u8>, ClientError> {
    tokio::fs::read(path).await.map_err(|source| ClientError::Credentials {
        path: path.clone(),
        source,
    })
}

/// Environment variable name for an injected secret.
fn env_var_name(namespace: &str, id: &str) -> String {
    format!("{ENV_VAR_PREFIX}_{namespace}_{id}").to_uppercase().replace('-', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_var_names_are_uppercased_with_underscores() {
        assert_eq!(env_var_name("common", "db_url"), "GAIA_COMMON_DB_URL");
        assert_eq!(env_var_name("web-tier", "api-key"), "GAIA_WEB_TIER_API_KEY");
    }

    #[test]
    fn default_config_targets_localhost() {
        let config = ClientConfig::default();
        assert_eq!(config.address, "localhost:50051");
        assert_eq!(config.domain_name, "localhost");
    }
}
