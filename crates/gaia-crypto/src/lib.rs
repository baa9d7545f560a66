//! Cryptographic primitives for the Gaia daemon.
//!
//! Three operations make up the surface:
//! - Memory-hard key derivation from the operator passphrase (scrypt)
//! - The authenticated at-rest envelope (AES-256-GCM, nonce inline, base64)
//! - Passphrase strength estimation applied at init
//!
//! Cost parameters and the envelope layout are fixed; they are part of the
//! database format.

pub mod envelope;
pub mod kdf;
pub mod passphrase;

pub use envelope::decrypt;
pub use envelope::encrypt;
pub use kdf::MasterKey;
pub use kdf::derive_key;
pub use kdf::generate_salt;
pub use kdf::key_hash;
pub use passphrase::check_strength;
