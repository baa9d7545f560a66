//! Admin RPC channel.
//!
//! Connects to the daemon over mTLS with the operator certificate minted at
//! init. All administration except `init` and `start` goes through here.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use gaia_daemon::DaemonConfig;
use gaia_proto::GaiaAdminClient;
use gaia_proto::v1::*;
use tonic::transport::Certificate;
use tonic::transport::Channel;
use tonic::transport::ClientTlsConfig;
use tonic::transport::Identity;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// An authenticated admin connection.
pub struct AdminChannel {
    client: GaiaAdminClient<Channel>,
}

impl AdminChannel {
    /// Connect with the operator certificate from the config's certs
    /// directory.
    pub async fn connect(config: &DaemonConfig) -> Result<Self> {
        let certs_dir = config.certs_dir();
        let ca = read_pem(&gaia_pki::disk::ca_cert_path(&certs_dir))?;
        let cert = read_pem(&config.admin_cert_path())?;
        let key = read_pem(&config.admin_key_path())?;

        let tls = ClientTlsConfig::new()
            .ca_certificate(Certificate::from_pem(ca))
            .identity(Identity::from_pem(cert, key))
            .domain_name(config.server_name.clone());

        let address = dial_address(&config.listen_addr);
        let channel = Channel::from_shared(format!("https://{address}"))
            .context("invalid daemon address")?
            .tls_config(tls)
            .context("invalid TLS configuration")?
            .connect_timeout(CONNECT_TIMEOUT)
            .connect()
            .await
            .context("could not connect to the daemon; is it running?")?;

        Ok(Self {
            client: GaiaAdminClient::new(channel),
        })
    }

    pub async fn status(&mut self) -> Result<String> {
        let response = self.client.get_status(GetStatusRequest {}).await?;
        Ok(response.into_inner().status)
    }

    pub async fn stop(&mut self) -> Result<()> {
        self.client.stop(StopRequest {}).await?;
        Ok(())
    }

    pub async fn unlock(&mut self, passphrase: &str) -> Result<()> {
        self.client
            .unlock(UnlockRequest {
                passphrase: passphrase.to_string(),
            })
            .await?;
        Ok(())
    }

    pub async fn lock(&mut self) -> Result<()> {
        self.client.lock(LockRequest {}).await?;
        Ok(())
    }

    pub async fn register_client(&mut self, name: &str) -> Result<(String, String)> {
        let response = self
            .client
            .register_client(RegisterClientRequest {
                client_name: name.to_string(),
            })
            .await?
            .into_inner();
        Ok((response.certificate, response.private_key))
    }

    pub async fn list_clients(&mut self) -> Result<Vec<(String, String)>> {
        let response = self.client.list_clients(ListClientsRequest {}).await?.into_inner();
        Ok(response.clients.into_iter().map(|c| (c.name, c.time_created)).collect())
    }

    pub async fn revoke_client(&mut self, name: &str) -> Result<()> {
        self.client
            .revoke_client(RevokeClientRequest {
                client_name: name.to_string(),
            })
            .await?;
        Ok(())
    }

    pub async fn add_secret(&mut self, client: &str, namespace: &str, id: &str, value: &str) -> Result<()> {
        self.client
            .add_secret(AddSecretRequest {
                client_name: client.to_string(),
                namespace: namespace.to_string(),
                id: id.to_string(),
                value: value.to_string(),
            })
            .await?;
        Ok(())
    }

    pub async fn delete_secret(&mut self, client: &str, namespace: &str, id: &str) -> Result<()> {
        self.client
            .delete_secret(DeleteSecretRequest {
                client_name: client.to_string(),
                namespace: namespace.to_string(),
                id: id.to_string(),
            })
            .await?;
        Ok(())
    }

    pub async fn list_secrets(&mut self, client: &str) -> Result<BTreeMap<String, BTreeMap<String, String>>> {
        let response = self
            .client
            .list_secrets(ListSecretsRequest {
                client_name: client.to_string(),
            })
            .await?
            .into_inner();

        let mut all = BTreeMap::new();
        for namespace in response.namespaces {
            let entries = namespace.secrets.into_iter().map(|s| (s.id, s.value)).collect();
            all.insert(namespace.name, entries);
        }
        Ok(all)
    }

    pub async fn list_namespaces(&mut self, client: &str) -> Result<Vec<String>> {
        let response = self
            .client
            .list_namespaces(ListNamespacesRequest {
                client_name: client.to_string(),
            })
            .await?
            .into_inner();
        Ok(response.namespaces)
    }

    /// Stream a bulk import: the config frame, then one frame per item.
    pub async fn import_secrets(&mut self, items: Vec<ImportSecretItem>, overwrite: bool) -> Result<u32> {
        let mut frames = Vec::with_capacity(items.len() + 1);
        frames.push(ImportSecretsRequest {
            payload: Some(import_secrets_request::Payload::Config(ImportConfig { overwrite })),
        });
        frames.extend(items.into_iter().map(|item| ImportSecretsRequest {
            payload: Some(import_secrets_request::Payload::Item(item)),
        }));

        let response = self.client.import_secrets(tokio_stream::iter(frames)).await?.into_inner();
        Ok(response.secrets_imported)
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("could not read '{}'", path.display()))
}

/// Where to dial for a given listen address: wildcard binds map to
/// localhost.
fn dial_address(listen_addr: &str) -> String {
    match listen_addr.rsplit_once(':') {
        Some((host, port)) if host == "0.0.0.0" || host == "[::]" || host.is_empty() => {
            format!("localhost:{port}")
        }
        _ => listen_addr.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_listen_addresses_dial_localhost() {
        assert_eq!(dial_address("0.0.0.0:50051"), "localhost:50051");
        assert_eq!(dial_address("[::]:50051"), "localhost:50051");
        assert_eq!(dial_address(":50051"), "localhost:50051");
    }

    #[test]
    fn explicit_listen_addresses_are_dialed_directly() {
        assert_eq!(dial_address("127.0.0.1:50051"), "127.0.0.1:50051");
        assert_eq!(dial_address("10.0.0.5:60051"), "10.0.0.5:60051");
    }
}
