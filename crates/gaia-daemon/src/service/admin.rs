//! The administrative service.
//!
//! Admins operate across clients, so requests carry explicit client names.
//! `GetStatus` and `Stop` are always available; `Unlock` applies only in
//! the locked state; everything else requires the unlocked state, enforced
//! by the daemon.

use std::sync::Arc;

use gaia_proto::v1::*;
use tonic::Request;
use tonic::Response;
use tonic::Status;
use tonic::Streaming;
use tracing::debug;

use crate::daemon::Daemon;
use crate::service::error_to_status;

/// `GaiaAdmin` implementation.
pub struct AdminService {
    daemon: Arc<Daemon>,
}

impl AdminService {
    /// Bind the service to its daemon.
    pub fn new(daemon: Arc<Daemon>) -> Self {
        Self { daemon }
    }
}

#[tonic::async_trait]
impl gaia_admin_server::GaiaAdmin for AdminService {
    async fn get_status(&self, _request: Request<GetStatusRequest>) -> Result<Response<GetStatusResponse>, Status> {
        let status = self.daemon.status().await;
        Ok(Response::new(GetStatusResponse {
            status: status.as_str().to_string(),
        }))
    }

    async fn stop(&self, _request: Request<StopRequest>) -> Result<Response<StopResponse>, Status> {
        debug!("stop requested over RPC");
        self.daemon.stop();
        Ok(Response::new(StopResponse { success: true }))
    }

    async fn unlock(&self, request: Request<UnlockRequest>) -> Result<Response<UnlockResponse>, Status> {
        let req = request.into_inner();
        self.daemon.unlock(&req.passphrase).await.map_err(error_to_status)?;
        Ok(Response::new(UnlockResponse { success: true }))
    }

    async fn lock(&self, _request: Request<LockRequest>) -> Result<Response<LockResponse>, Status> {
        self.daemon.lock().await;
        Ok(Response::new(LockResponse { success: true }))
    }

    async fn register_client(
        &self,
        request: Request<RegisterClientRequest>,
    ) -> Result<Response<RegisterClientResponse>, Status> {
        let req = request.into_inner();
        debug!(client_name = %req.client_name, "register client request");

        let (certificate, private_key) = self.daemon.register_client(&req.client_name).await.map_err(error_to_status)?;
        Ok(Response::new(RegisterClientResponse {
            certificate,
            private_key,
        }))
    }

    async fn list_clients(&self, _request: Request<ListClientsRequest>) -> Result<Response<ListClientsResponse>, Status> {
        let clients = self.daemon.list_clients().await.map_err(error_to_status)?;
        Ok(Response::new(ListClientsResponse {
            clients: clients
                .into_iter()
                .map(|c| ClientInfo {
                    name: c.name,
                    time_created: c.created_at,
                })
                .collect(),
        }))
    }

    async fn revoke_client(
        &self,
        request: Request<RevokeClientRequest>,
    ) -> Result<Response<RevokeClientResponse>, Status> {
        let req = request.into_inner();
        debug!(client_name = %req.client_name, "revoke client request");

        self.daemon.revoke_client(&req.client_name).await.map_err(error_to_status)?;
        Ok(Response::new(RevokeClientResponse { success: true }))
    }

    async fn add_secret(&self, request: Request<AddSecretRequest>) -> Result<Response<AddSecretResponse>, Status> {
        let req = request.into_inner();
        self.daemon
            .add_secret(&req.client_name, &req.namespace, &req.id, &req.value)
            .await
            .map_err(error_to_status)?;
        Ok(Response::new(AddSecretResponse {
            success: true,
            message: "secret added".to_string(),
        }))
    }

    async fn delete_secret(
        &self,
        request: Request<DeleteSecretRequest>,
    ) -> Result<Response<DeleteSecretResponse>, Status> {
        let req = request.into_inner();
        self.daemon
            .delete_secret(&req.client_name, &req.namespace, &req.id)
            .await
            .map_err(error_to_status)?;
        Ok(Response::new(DeleteSecretResponse { success: true }))
    }

    async fn list_secrets(&self, request: Request<ListSecretsRequest>) -> Result<Response<ListSecretsResponse>, Status> {
        let req = request.into_inner();
        let all = self.daemon.list_secrets(&req.client_name).await.map_err(error_to_status)?;
        Ok(Response::new(ListSecretsResponse {
            namespaces: to_namespace_secrets(all),
        }))
    }

    async fn list_namespaces(
        &self,
        request: Request<ListNamespacesRequest>,
    ) -> Result<Response<ListNamespacesResponse>, Status> {
        let req = request.into_inner();
        let namespaces = self.daemon.list_namespaces(&req.client_name).await.map_err(error_to_status)?;
        Ok(Response::new(ListNamespacesResponse { namespaces }))
    }

    async fn import_secrets(
        &self,
        request: Request<Streaming<ImportSecretsRequest>>,
    ) -> Result<Response<ImportSecretsResponse>, Status> {
        let mut stream = request.into_inner();

        let first = stream
            .message()
            .await?
            .ok_or_else(|| Status::invalid_argument("import stream closed before the configuration frame"))?;
        let overwrite = match first.payload {
            Some(import_secrets_request::Payload::Config(config)) => config.overwrite,
            _ => return Err(Status::invalid_argument("the first frame must be the import configuration")),
        };

        let mut items = Vec::new();
        while let Some(frame) = stream.message().await? {
            match frame.payload {
                Some(import_secrets_request::Payload::Item(item)) => {
                    items.push(gaia_secrets::ImportItem {
                        client: item.client_name,
                        namespace: item.namespace,
                        id: item.id,
                        value: item.value,
                    });
                }
                Some(import_secrets_request::Payload::Config(_)) => {
                    return Err(Status::invalid_argument("the configuration may only be the first frame"));
                }
                None => return Err(Status::invalid_argument("empty import frame")),
            }
        }

        let imported = self.daemon.import_secrets(&items, overwrite).await.map_err(error_to_status)?;
        Ok(Response::new(ImportSecretsResponse {
            secrets_imported: imported as u32,
            message: "secrets imported".to_string(),
        }))
    }
}

/// Flatten the nested map into the wire shape, preserving order.
pub(crate) fn to_namespace_secrets(
    all: std::collections::BTreeMap<String, std::collections::BTreeMap<String, String>>,
) -> Vec<NamespaceSecrets> {
    all.into_iter()
        .map(|(name, secrets)| NamespaceSecrets {
            name,
            secrets: secrets.into_iter().map(|(id, value)| Secret { id, value }).collect(),
        })
        .collect()
}
