//! Error taxonomy for Gaia operations.
//!
//! Every expected failure is a distinct variant so callers can branch on the
//! kind and the transport can map each to a status code. Unlock mismatches
//! and missing secrets are expected outcomes, not panics.

use thiserror::Error;

/// Errors surfaced by Gaia operations.
#[derive(Debug, Error)]
pub enum GaiaError {
    /// The database file does not exist; `init` has not been run.
    #[error("gaia is not initialized; run 'gaia init' first")]
    NotInitialized,

    /// `init` was invoked but the database file already exists.
    #[error("gaia is already initialized; database found at {path}")]
    AlreadyInitialized {
        /// Path of the existing database file.
        path: String,
    },

    /// The operation requires the master key but the daemon is locked.
    #[error("daemon is locked")]
    DaemonLocked,

    /// Unlock passphrase did not match the stored key hash.
    #[error("invalid passphrase")]
    InvalidPassphrase,

    /// Init passphrase fell below the strength floors.
    #[error("passphrase too weak: {reason}")]
    WeakPassphrase {
        /// Which floor was violated.
        reason: String,
    },

    /// A client, namespace, or key identifier violates the grammar.
    #[error("identifier '{name}' is invalid: {reason}")]
    IdentifierInvalid {
        /// The offending identifier.
        name: String,
        /// Which rule was violated.
        reason: String,
    },

    /// The caller is not authorized for the requested namespace.
    #[error("permission denied")]
    Unauthorized,

    /// The requested secret does not exist.
    #[error("secret not found")]
    NotFound,

    /// An AEAD authentication tag failed to verify, or an envelope was
    /// malformed. The stored record cannot be trusted.
    #[error("integrity check failed: {reason}")]
    Integrity {
        /// What failed to verify.
        reason: String,
    },

    /// A non-overwriting bulk import collided with an existing secret.
    #[error("secret '{key}' already exists")]
    Conflict {
        /// Display form of the colliding key.
        key: String,
    },

    /// The storage engine failed; no partial state was committed.
    #[error("storage failure: {reason}")]
    Storage {
        /// The underlying storage error.
        reason: String,
    },

    /// A cryptographic primitive failed outside of tag verification.
    #[error("cryptographic failure: {reason}")]
    Crypto {
        /// The underlying failure.
        reason: String,
    },

    /// Certificate generation, parsing, or persistence failed.
    #[error("certificate failure: {reason}")]
    Certificate {
        /// The underlying failure.
        reason: String,
    },

    /// The configuration file or environment is invalid.
    #[error("configuration error: {reason}")]
    Config {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// The listener failed after a successful start.
    #[error("fatal runtime error: {reason}")]
    Runtime {
        /// The underlying failure.
        reason: String,
    },

    /// An I/O error outside the storage engine.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, GaiaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daemon_locked_display() {
        assert_eq!(GaiaError::DaemonLocked.to_string(), "daemon is locked");
    }

    #[test]
    fn weak_passphrase_carries_reason() {
        let err = GaiaError::WeakPassphrase {
            reason: "shorter than 8 characters".to_string(),
        };
        assert_eq!(err.to_string(), "passphrase too weak: shorter than 8 characters");
    }

    #[test]
    fn identifier_invalid_names_the_offender() {
        let err = GaiaError::IdentifierInvalid {
            name: "Bad_Name".to_string(),
            reason: "uppercase characters are not allowed".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("Bad_Name"));
        assert!(rendered.contains("uppercase"));
    }

    #[test]
    fn unauthorized_does_not_leak_detail() {
        assert_eq!(GaiaError::Unauthorized.to_string(), "permission denied");
    }

    #[test]
    fn conflict_names_the_key() {
        let err = GaiaError::Conflict {
            key: "web-a/prod/db_url".to_string(),
        };
        assert!(err.to_string().contains("web-a/prod/db_url"));
    }
}
