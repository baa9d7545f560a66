//! Daemon configuration.
//!
//! Layered: built-in defaults, then an optional TOML file, then environment
//! variables. CLI flags are applied on top by the binary.

use std::path::Path;
use std::path::PathBuf;

use gaia_core::GaiaError;
use gaia_core::Result;
use gaia_core::constants::AUDIT_LOG_FILE_NAME;
use gaia_core::constants::CERTS_DIR_NAME;
use gaia_core::constants::DB_FILE_NAME;
use serde::Deserialize;
use serde::Serialize;

/// Environment variable overriding the data directory.
pub const ENV_DATA_DIR: &str = "GAIA_DATA_DIR";
/// Environment variable overriding the listen address.
pub const ENV_LISTEN_ADDR: &str = "GAIA_LISTEN_ADDR";

/// Settings for the daemon and the admin tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Directory holding the database, certificates, and audit log.
    pub data_dir: PathBuf,
    /// TCP address the mTLS listener binds.
    pub listen_addr: String,
    /// DNS name stamped into the server certificate alongside `localhost`.
    pub server_name: String,
    /// Common name of the root CA generated at init.
    pub ca_common_name: String,
    /// Common name of the operator certificate. Admin authority is this CN
    /// by convention.
    pub operator_name: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            listen_addr: "127.0.0.1:50051".to_string(),
            server_name: "localhost".to_string(),
            ca_common_name: "gaia-root-ca".to_string(),
            operator_name: "gaia-admin".to_string(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration: defaults, then the TOML file if given, then
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| GaiaError::Config {
                    reason: format!("could not read config file '{}': {e}", path.display()),
                })?;
                toml::from_str(&raw).map_err(|e| GaiaError::Config {
                    reason: format!("could not parse config file '{}': {e}", path.display()),
                })?
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `GAIA_DATA_DIR` and `GAIA_LISTEN_ADDR` if set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            if !dir.is_empty() {
                self.data_dir = PathBuf::from(dir);
            }
        }
        if let Ok(addr) = std::env::var(ENV_LISTEN_ADDR) {
            if !addr.is_empty() {
                self.listen_addr = addr;
            }
        }
    }

    /// Path of the database file.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }

    /// Directory holding the PEM material.
    pub fn certs_dir(&self) -> PathBuf {
        self.data_dir.join(CERTS_DIR_NAME)
    }

    /// Path of the structured audit log.
    pub fn audit_log_path(&self) -> PathBuf {
        self.data_dir.join(AUDIT_LOG_FILE_NAME)
    }

    /// Path of the operator certificate minted at init.
    pub fn admin_cert_path(&self) -> PathBuf {
        self.certs_dir().join(format!("{}.crt", self.operator_name))
    }

    /// Path of the operator private key minted at init.
    pub fn admin_key_path(&self) -> PathBuf {
        self.certs_dir().join(format!("{}.key", self.operator_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = DaemonConfig::default();
        assert_eq!(config.listen_addr, "127.0.0.1:50051");
        assert_eq!(config.server_name, "localhost");
        assert!(config.db_path().ends_with("gaia.db"));
        assert!(config.certs_dir().ends_with("certs"));
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gaia.toml");
        std::fs::write(&path, "listen_addr = \"0.0.0.0:60051\"\ndata_dir = \"/var/lib/gaia\"\n").unwrap();

        let config = DaemonConfig::load(Some(&path)).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:60051");
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/gaia"));
        // Untouched fields keep their defaults.
        assert_eq!(config.server_name, "localhost");
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let err = DaemonConfig::load(Some(Path::new("/nonexistent/gaia.toml"))).unwrap_err();
        assert!(matches!(err, GaiaError::Config { .. }));
    }

    #[test]
    fn derived_paths_hang_off_data_dir() {
        let mut config = DaemonConfig::default();
        config.data_dir = PathBuf::from("/srv/gaia");
        assert_eq!(config.db_path(), PathBuf::from("/srv/gaia/gaia.db"));
        assert_eq!(config.audit_log_path(), PathBuf::from("/srv/gaia/gaia_audit.log"));
        assert_eq!(config.admin_cert_path(), PathBuf::from("/srv/gaia/certs/gaia-admin.crt"));
    }
}
