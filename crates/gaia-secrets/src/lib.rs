//! Typed secret store.
//!
//! Composes the crypto primitives and the storage engine into the
//! operations the RPC surface consumes: envelope-encrypted writes,
//! authorization-checked reads, the client registry with its revocation
//! cascade, and transactional bulk import.

pub mod keys;
pub mod store;

pub use keys::compose_key;
pub use keys::split_key;
pub use store::ClientRecord;
pub use store::ImportItem;
pub use store::SecretStore;
