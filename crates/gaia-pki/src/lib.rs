//! PKI engine: the self-signed Gaia root CA and the server/client leaf
//! certificates it signs.
//!
//! The CA is a 4096-bit RSA key with a self-signed certificate valid ten
//! times as long as its leaves. Server leaves carry `serverAuth` with
//! localhost SANs; client leaves carry `clientAuth` with the client's
//! registered name as the subject CN — that CN is the authorization
//! principal for the client service.
//!
//! The CA private key rests on disk as plain PEM with owner-only
//! permissions and is parsed into memory only while the daemon is unlocked.

pub mod disk;
pub mod generate;

pub use disk::load_ca;
pub use disk::server_pair_exists;
pub use disk::write_ca;
pub use disk::write_client_pair;
pub use disk::write_server_pair;
pub use generate::CertificateAuthority;
pub use generate::CertifiedKey;
