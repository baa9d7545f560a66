//! Fixed limits and reserved names.
//!
//! All limits are explicit and compile-time fixed. The key-derivation cost
//! parameters and the envelope layout are part of the on-disk format: they
//! cannot change without invalidating existing databases.

use std::time::Duration;

// ============================================================================
// Storage layout
// ============================================================================

/// Bucket holding encrypted secret values and the store metadata.
pub const SECRETS_BUCKET: &str = "secrets";

/// Bucket mapping client names to their registration timestamps.
pub const CLIENTS_BUCKET: &str = "clients";

/// Internal prefix for store metadata keys. The `:` separator is outside the
/// identifier alphabet, so user keys can never collide with this prefix.
pub const META_PREFIX: &str = "gaia:internal:cmfk1rbd000000m74bic9evy3";

/// Metadata key for the KDF salt, written exactly once at init.
pub const SALT_KEY: &str = "gaia:internal:cmfk1rbd000000m74bic9evy3__salt__";

/// Metadata key for the SHA-256 of the master key, written exactly once at init.
pub const KEY_HASH_KEY: &str = "gaia:internal:cmfk1rbd000000m74bic9evy3__key_hash__";

/// Delimiter joining the `client`, `namespace`, and `id` components of a
/// secret key. NUL cannot appear in valid identifiers, which keeps composite
/// keys unambiguous and prefix scans exact.
pub const KEY_DELIMITER: u8 = 0x00;

/// Reserved client name for the shared namespace, registered at init.
pub const COMMON_CLIENT: &str = "common";

/// Database file name under the data directory.
pub const DB_FILE_NAME: &str = "gaia.db";

/// Certificate directory name under the data directory.
pub const CERTS_DIR_NAME: &str = "certs";

/// Audit log file name under the data directory.
pub const AUDIT_LOG_FILE_NAME: &str = "gaia_audit.log";

/// How long to wait for the database file lock before giving up. Prevents a
/// second daemon from silently attaching to the same file.
pub const DB_LOCK_TIMEOUT: Duration = Duration::from_secs(1);

// ============================================================================
// Identifiers
// ============================================================================

/// Maximum length of a client, namespace, or key identifier.
pub const MAX_IDENTIFIER_LEN: usize = 63;

// ============================================================================
// Cryptography
// ============================================================================

/// Master key length in bytes (AES-256).
pub const MASTER_KEY_LEN: usize = 32;

/// KDF salt length in bytes.
pub const SALT_LEN: usize = 16;

/// AES-256-GCM nonce length in bytes. Stored inline at the front of every
/// envelope; widening it would break existing databases.
pub const AEAD_NONCE_LEN: usize = 12;

/// scrypt cost parameter, log2(N). N = 2^15.
pub const SCRYPT_LOG_N: u8 = 15;

/// scrypt block size parameter.
pub const SCRYPT_R: u32 = 8;

/// scrypt parallelism parameter.
pub const SCRYPT_P: u32 = 1;

/// Minimum passphrase length accepted at init.
pub const MIN_PASSPHRASE_LEN: usize = 8;

/// Minimum estimated passphrase entropy in bits accepted at init.
pub const MIN_PASSPHRASE_ENTROPY_BITS: f64 = 60.0;

// ============================================================================
// PKI
// ============================================================================

/// RSA modulus size for the root CA key.
pub const CA_RSA_BITS: usize = 4096;

/// RSA modulus size for server and client leaf keys.
pub const LEAF_RSA_BITS: usize = 2048;

/// Leaf certificate validity in days.
pub const LEAF_VALIDITY_DAYS: i64 = 365;

/// CA certificate validity in days (10x the leaf validity).
pub const CA_VALIDITY_DAYS: i64 = 3650;

/// Organization name stamped on the root CA certificate.
pub const CA_ORGANIZATION: &str = "Gaia Root CA";

// ============================================================================
// RPC listener
// ============================================================================

/// Maximum concurrent HTTP/2 streams per connection.
pub const MAX_CONCURRENT_STREAMS: u32 = 100;

/// Maximum inbound and outbound message size in bytes (10 MiB).
pub const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Minimum keepalive ping interval tolerated from clients, in seconds.
/// Pings are permitted without active streams.
pub const MIN_CLIENT_KEEPALIVE_SECS: u64 = 300;

// ============================================================================
// Consumer environment injection
// ============================================================================

/// Prefix for environment variables injected by the client library.
pub const ENV_VAR_PREFIX: &str = "GAIA";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_keys_extend_the_meta_prefix() {
        assert!(SALT_KEY.starts_with(META_PREFIX));
        assert!(KEY_HASH_KEY.starts_with(META_PREFIX));
        assert!(SALT_KEY.ends_with("__salt__"));
        assert!(KEY_HASH_KEY.ends_with("__key_hash__"));
    }

    #[test]
    fn meta_prefix_is_outside_identifier_alphabet() {
        assert!(META_PREFIX.contains(':'));
    }

    #[test]
    fn ca_validity_is_ten_times_leaf_validity() {
        assert_eq!(CA_VALIDITY_DAYS, LEAF_VALIDITY_DAYS * 10);
    }
}
