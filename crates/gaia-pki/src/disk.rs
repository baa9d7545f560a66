//! Certificate persistence.
//!
//! PEM files live under `<data_dir>/certs/`. Private key files are written
//! with owner-only permissions; certificates are world-readable.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use gaia_core::GaiaError;
use gaia_core::Result;
use tracing::info;

use crate::generate::CertificateAuthority;
use crate::generate::CertifiedKey;

/// CA certificate file name.
pub const CA_CERT_FILE: &str = "ca.crt";
/// CA private key file name.
pub const CA_KEY_FILE: &str = "ca.key";
/// Server certificate file name.
pub const SERVER_CERT_FILE: &str = "server.crt";
/// Server private key file name.
pub const SERVER_KEY_FILE: &str = "server.key";

/// Path of the CA certificate under a certs directory.
pub fn ca_cert_path(certs_dir: &Path) -> PathBuf {
    certs_dir.join(CA_CERT_FILE)
}

/// Path of the CA private key under a certs directory.
pub fn ca_key_path(certs_dir: &Path) -> PathBuf {
    certs_dir.join(CA_KEY_FILE)
}

/// Write the CA certificate and private key.
pub fn write_ca(certs_dir: &Path, ca: &CertificateAuthority) -> Result<()> {
    fs::create_dir_all(certs_dir)?;
    fs::write(ca_cert_path(certs_dir), ca.cert_pem())?;
    write_private(&ca_key_path(certs_dir), ca.key_pem().as_bytes())?;
    info!(dir = %certs_dir.display(), "Wrote CA certificate and key");
    Ok(())
}

/// Write the server leaf pair.
pub fn write_server_pair(certs_dir: &Path, pair: &CertifiedKey) -> Result<()> {
    fs::create_dir_all(certs_dir)?;
    fs::write(certs_dir.join(SERVER_CERT_FILE), &pair.cert_pem)?;
    write_private(&certs_dir.join(SERVER_KEY_FILE), pair.key_pem.as_bytes())?;
    info!(dir = %certs_dir.display(), "Wrote server certificate and key");
    Ok(())
}

/// Write a client leaf pair as `<name>.crt` / `<name>.key`. Used for
/// locally minted operator certificates; client certificates issued over
/// RPC are never persisted server-side.
pub fn write_client_pair(certs_dir: &Path, name: &str, pair: &CertifiedKey) -> Result<()> {
    fs::create_dir_all(certs_dir)?;
    fs::write(certs_dir.join(format!("{name}.crt")), &pair.cert_pem)?;
    write_private(&certs_dir.join(format!("{name}.key")), pair.key_pem.as_bytes())?;
    info!(dir = %certs_dir.display(), name = %name, "Wrote client certificate and key");
    Ok(())
}

/// Whether both halves of the server leaf pair exist on disk.
pub fn server_pair_exists(certs_dir: &Path) -> bool {
    certs_dir.join(SERVER_CERT_FILE).exists() && certs_dir.join(SERVER_KEY_FILE).exists()
}

/// Parse the on-disk CA pair back into a signing-capable authority.
pub fn load_ca(certs_dir: &Path) -> Result<CertificateAuthority> {
    let cert_pem = fs::read_to_string(ca_cert_path(certs_dir)).map_err(|e| GaiaError::Certificate {
        reason: format!("could not read CA certificate: {e}"),
    })?;
    let key_pem = fs::read_to_string(ca_key_path(certs_dir)).map_err(|e| GaiaError::Certificate {
        reason: format!("could not read CA private key: {e}"),
    })?;
    CertificateAuthority::from_pem(&cert_pem, &key_pem)
}

/// Write a private key file with mode 0600.
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    fs::write(path, contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
