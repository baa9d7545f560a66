//! The consumer-facing service.
//!
//! Every request is attributed to the subject CN of the verified peer
//! certificate. No request body carries a client name; a client cannot ask
//! for anything on another client's behalf.

use std::sync::Arc;

use gaia_proto::v1::*;
use tonic::Request;
use tonic::Response;
use tonic::Status;
use tracing::debug;

use crate::daemon::Daemon;
use crate::identity::peer_common_name;
use crate::service::admin::to_namespace_secrets;
use crate::service::error_to_status;

/// `GaiaClient` implementation.
pub struct ClientService {
    daemon: Arc<Daemon>,
}

impl ClientService {
    /// Bind the service to its daemon.
    pub fn new(daemon: Arc<Daemon>) -> Self {
        Self { daemon }
    }
}

#[tonic::async_trait]
impl gaia_client_server::GaiaClient for ClientService {
    async fn get_secret(&self, request: Request<GetSecretRequest>) -> Result<Response<Secret>, Status> {
        let caller = peer_common_name(&request)?;
        let req = request.into_inner();
        debug!(client_name = %caller, namespace = %req.namespace, id = %req.id, "get secret request");

        let value = self
            .daemon
            .get_secret_for(&caller, &req.namespace, &req.id)
            .await
            .map_err(error_to_status)?;
        Ok(Response::new(Secret { id: req.id, value }))
    }

    async fn get_common_secrets(
        &self,
        request: Request<GetCommonSecretsRequest>,
    ) -> Result<Response<GetCommonSecretsResponse>, Status> {
        let caller = peer_common_name(&request)?;
        let req = request.into_inner();
        debug!(client_name = %caller, namespace = ?req.namespace, "get common secrets request");

        let all = self
            .daemon
            .common_secrets(req.namespace.as_deref())
            .await
            .map_err(error_to_status)?;
        Ok(Response::new(GetCommonSecretsResponse {
            namespaces: to_namespace_secrets(all),
        }))
    }

    async fn get_namespaces(
        &self,
        request: Request<GetNamespacesRequest>,
    ) -> Result<Response<GetNamespacesResponse>, Status> {
        let caller = peer_common_name(&request)?;
        debug!(client_name = %caller, "get namespaces request");

        let namespaces = self.daemon.namespaces_for(&caller).await.map_err(error_to_status)?;
        Ok(Response::new(GetNamespacesResponse { namespaces }))
    }

    async fn get_status(&self, _request: Request<GetStatusRequest>) -> Result<Response<GetStatusResponse>, Status> {
        let status = self.daemon.status().await;
        Ok(Response::new(GetStatusResponse {
            status: status.as_str().to_string(),
        }))
    }
}
