//! The Gaia daemon: lifecycle state machine, mTLS listener, and the admin
//! and client RPC services.
//!
//! # Security model
//!
//! - The listener requires and verifies a client certificate chained to the
//!   Gaia root CA; a connection without one never reaches an RPC.
//! - The client service attributes every call to the subject CN of the
//!   peer certificate. The admin service accepts client names in request
//!   bodies, because operators act across clients; admin authority is the
//!   operator certificate's CN by convention.
//! - The master key and the CA private key live in memory only while the
//!   daemon is unlocked, and are zeroized on lock and teardown.
//!
//! # Modules
//!
//! - [`config`] — layered TOML/env configuration.
//! - [`daemon`] — the state machine and listener lifetime.
//! - [`identity`] — peer certificate CN extraction.
//! - [`service`] — the two tonic service implementations.
//! - [`logging`] — audit log subscriber setup.

pub mod config;
pub mod daemon;
pub mod identity;
pub mod logging;
pub mod service;

pub use config::DaemonConfig;
pub use daemon::Daemon;
