//! Master key derivation.
//!
//! scrypt with N = 2^15, r = 8, p = 1, producing a 32-byte AES-256 key. The
//! parameters cannot change without invalidating existing databases. The
//! derived key is wrapped in [`Zeroizing`] so it is wiped on drop.

use gaia_core::GaiaError;
use gaia_core::Result;
use gaia_core::constants::MASTER_KEY_LEN;
use gaia_core::constants::SALT_LEN;
use gaia_core::constants::SCRYPT_LOG_N;
use gaia_core::constants::SCRYPT_P;
use gaia_core::constants::SCRYPT_R;
use rand::RngCore;
use scrypt::Params;
use sha2::Digest;
use sha2::Sha256;
use zeroize::Zeroizing;

/// The in-memory master key. Zeroized on drop.
pub type MasterKey = Zeroizing<[u8; MASTER_KEY_LEN]>;

/// Derive the master key from a passphrase and salt. Deterministic.
pub fn derive_key(passphrase: &[u8], salt: &[u8]) -> Result<MasterKey> {
    let params = Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, MASTER_KEY_LEN).map_err(|e| GaiaError::Crypto {
        reason: format!("invalid scrypt parameters: {e}"),
    })?;

    let mut key = Zeroizing::new([0u8; MASTER_KEY_LEN]);
    scrypt::scrypt(passphrase, salt, &params, key.as_mut()).map_err(|e| GaiaError::Crypto {
        reason: format!("scrypt derivation failed: {e}"),
    })?;

    Ok(key)
}

/// Generate a random 16-byte KDF salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

/// SHA-256 of the derived key, stored at init and compared at unlock so the
/// passphrase can be validated without trial-decrypting data.
pub fn key_hash(key: &[u8]) -> [u8; 32] {
    Sha256::digest(key).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let salt = [7u8; SALT_LEN];
        let key1 = derive_key(b"correct horse battery staple", &salt).unwrap();
        let key2 = derive_key(b"correct horse battery staple", &salt).unwrap();
        assert_eq!(*key1, *key2);
    }

    #[test]
    fn different_passphrases_produce_different_keys() {
        let salt = [7u8; SALT_LEN];
        let key1 = derive_key(b"passphrase one", &salt).unwrap();
        let key2 = derive_key(b"passphrase two", &salt).unwrap();
        assert_ne!(*key1, *key2);
    }

    #[test]
    fn different_salts_produce_different_keys() {
        let key1 = derive_key(b"same passphrase", &[1u8; SALT_LEN]).unwrap();
        let key2 = derive_key(b"same passphrase", &[2u8; SALT_LEN]).unwrap();
        assert_ne!(*key1, *key2);
    }

    #[test]
    fn derived_key_is_32_bytes() {
        let key = derive_key(b"x", &[0u8; SALT_LEN]).unwrap();
        assert_eq!(key.len(), MASTER_KEY_LEN);
    }

    #[test]
    fn generated_salts_differ() {
        assert_ne!(generate_salt(), generate_salt());
    }

    #[test]
    fn key_hash_is_stable() {
        let key = [9u8; MASTER_KEY_LEN];
        assert_eq!(key_hash(&key), key_hash(&key));
        assert_ne!(key_hash(&key), key_hash(&[8u8; MASTER_KEY_LEN]));
    }
}
