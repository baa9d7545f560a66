//! Generated protobuf/gRPC code for the Gaia admin and client services.
//!
//! The two services are deliberately independent types on one listener: the
//! admin service trusts the request body for client names, the client
//! service trusts only the peer certificate. They share message types but
//! no service trait.

/// Generated code from `proto/gaia.proto`.
pub mod v1 {
    tonic::include_proto!("gaia.v1");
}

pub use v1::gaia_admin_client::GaiaAdminClient;
pub use v1::gaia_admin_server::GaiaAdmin;
pub use v1::gaia_admin_server::GaiaAdminServer;
pub use v1::gaia_client_client::GaiaClientClient;
pub use v1::gaia_client_server::GaiaClient;
pub use v1::gaia_client_server::GaiaClientServer;
