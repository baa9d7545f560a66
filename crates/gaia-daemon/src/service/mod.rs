//! The two RPC services bound to the mTLS listener.
//!
//! Both are thin translation shims: validate input, delegate to the daemon,
//! map errors to gRPC status codes. They share the daemon collaborator but
//! no base trait — the admin service trusts the request body for client
//! names, the client service trusts only the peer certificate, and that
//! difference must stay visible in the types.

mod admin;
mod client;

pub use admin::AdminService;
pub use client::ClientService;
use gaia_core::GaiaError;
use gaia_core::constants::MAX_MESSAGE_SIZE;
use tonic::Status;

/// Per-service message size cap (both directions).
pub fn max_message_size() -> usize {
    MAX_MESSAGE_SIZE
}

/// Map an error kind to its gRPC status.
///
/// Authorization failures stay detail-free; cryptographic failures never
/// carry underlying detail across the wire.
pub fn error_to_status(err: GaiaError) -> Status {
    match err {
        GaiaError::NotInitialized | GaiaError::DaemonLocked => Status::failed_precondition(err.to_string()),
        GaiaError::AlreadyInitialized { .. } | GaiaError::Conflict { .. } => Status::already_exists(err.to_string()),
        GaiaError::InvalidPassphrase => Status::unauthenticated(err.to_string()),
        GaiaError::WeakPassphrase { .. } | GaiaError::IdentifierInvalid { .. } | GaiaError::Config { .. } => {
            Status::invalid_argument(err.to_string())
        }
        GaiaError::Unauthorized => Status::permission_denied(err.to_string()),
        GaiaError::NotFound => Status::not_found(err.to_string()),
        GaiaError::Integrity { .. } => Status::data_loss(err.to_string()),
        GaiaError::Storage { .. } => Status::internal(err.to_string()),
        GaiaError::Crypto { .. } => Status::internal("cryptographic failure"),
        GaiaError::Certificate { .. } | GaiaError::Runtime { .. } => Status::internal(err.to_string()),
        GaiaError::Io(_) => Status::internal("i/o failure"),
    }
}

#[cfg(test)]
mod tests {
    use tonic::Code;

    use super::*;

    #[test]
    fn locked_maps_to_failed_precondition() {
        assert_eq!(error_to_status(GaiaError::DaemonLocked).code(), Code::FailedPrecondition);
    }

    #[test]
    fn unauthorized_maps_to_permission_denied() {
        let status = error_to_status(GaiaError::Unauthorized);
        assert_eq!(status.code(), Code::PermissionDenied);
        assert_eq!(status.message(), "permission denied");
    }

    #[test]
    fn conflict_maps_to_already_exists() {
        let status = error_to_status(GaiaError::Conflict {
            key: "web-a/prod/x".to_string(),
        });
        assert_eq!(status.code(), Code::AlreadyExists);
    }

    #[test]
    fn crypto_failures_carry_no_detail() {
        let status = error_to_status(GaiaError::Crypto {
            reason: "sensitive detail".to_string(),
        });
        assert_eq!(status.code(), Code::Internal);
        assert_eq!(status.message(), "cryptographic failure");
    }

    #[test]
    fn integrity_maps_to_data_loss() {
        let status = error_to_status(GaiaError::Integrity {
            reason: "authentication tag mismatch".to_string(),
        });
        assert_eq!(status.code(), Code::DataLoss);
    }
}
