//! Certificate generation.
//!
//! RSA keys are generated with the `rsa` crate and imported into rcgen for
//! templating and signing, since rcgen does not generate RSA material
//! itself. Serial numbers follow the wire format of the store: `1` for the
//! CA, the current Unix timestamp for leaves.

use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use gaia_core::GaiaError;
use gaia_core::Result;
use gaia_core::constants::CA_ORGANIZATION;
use gaia_core::constants::CA_RSA_BITS;
use gaia_core::constants::CA_VALIDITY_DAYS;
use gaia_core::constants::LEAF_RSA_BITS;
use gaia_core::constants::LEAF_VALIDITY_DAYS;
use rcgen::BasicConstraints;
use rcgen::Certificate;
use rcgen::CertificateParams;
use rcgen::DnType;
use rcgen::ExtendedKeyUsagePurpose;
use rcgen::IsCa;
use rcgen::KeyPair;
use rcgen::KeyUsagePurpose;
use rcgen::PKCS_RSA_SHA256;
use rcgen::SanType;
use rcgen::SerialNumber;
use rsa::RsaPrivateKey;
use rsa::pkcs8::EncodePrivateKey;
use rsa::pkcs8::LineEnding;
use time::Duration;
use time::OffsetDateTime;
use tracing::debug;
use zeroize::Zeroizing;

/// A freshly minted certificate and its private key, PEM encoded.
#[derive(Debug, Clone)]
pub struct CertifiedKey {
    /// PEM-encoded X.509 certificate.
    pub cert_pem: String,
    /// PEM-encoded PKCS#8 private key.
    pub key_pem: String,
}

/// The Gaia root CA, held in memory only while the daemon is unlocked.
pub struct CertificateAuthority {
    cert: Certificate,
    key: KeyPair,
}

impl CertificateAuthority {
    /// Generate a new self-signed root CA with a 4096-bit RSA key.
    pub fn generate(common_name: &str) -> Result<Self> {
        Self::generate_with_key_bits(common_name, CA_RSA_BITS)
    }

    /// Generate a root CA with an explicit RSA modulus size. Production
    /// callers use [`CertificateAuthority::generate`]; smaller sizes keep
    /// test suites fast.
    pub fn generate_with_key_bits(common_name: &str, bits: usize) -> Result<Self> {
        let key_pem = rsa_key_pem(bits)?;
        let key = KeyPair::from_pem_and_sign_algo(&key_pem, &PKCS_RSA_SHA256).map_err(|e| GaiaError::Certificate {
            reason: format!("failed to load CA key pair: {e}"),
        })?;

        let mut params = CertificateParams::default();
        params.distinguished_name.push(DnType::CommonName, common_name);
        params.distinguished_name.push(DnType::OrganizationName, CA_ORGANIZATION);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::DigitalSignature, KeyUsagePurpose::KeyCertSign];
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth, ExtendedKeyUsagePurpose::ServerAuth];
        params.serial_number = Some(SerialNumber::from(vec![1u8]));

        let now = OffsetDateTime::now_utc();
        params.not_before = now;
        params.not_after = now + Duration::days(CA_VALIDITY_DAYS);

        let cert = params.self_signed(&key).map_err(|e| GaiaError::Certificate {
            reason: format!("failed to self-sign CA certificate: {e}"),
        })?;

        debug!(common_name = %common_name, bits = bits, "Generated root CA");

        Ok(Self { cert, key })
    }

    /// Reconstruct the CA from its PEM pair for signing. Used at unlock,
    /// when the daemon parses the on-disk CA material back into memory.
    pub fn from_pem(cert_pem: &str, key_pem: &str) -> Result<Self> {
        let key = KeyPair::from_pem_and_sign_algo(key_pem, &PKCS_RSA_SHA256).map_err(|e| GaiaError::Certificate {
            reason: format!("failed to parse CA private key: {e}"),
        })?;

        let params = CertificateParams::from_ca_cert_pem(cert_pem).map_err(|e| GaiaError::Certificate {
            reason: format!("failed to parse CA certificate: {e}"),
        })?;
        let cert = params.self_signed(&key).map_err(|e| GaiaError::Certificate {
            reason: format!("failed to rebuild CA certificate: {e}"),
        })?;

        Ok(Self { cert, key })
    }

    /// PEM form of the CA certificate.
    pub fn cert_pem(&self) -> String {
        self.cert.pem()
    }

    /// PEM form of the CA private key.
    pub fn key_pem(&self) -> String {
        self.key.serialize_pem()
    }

    /// Issue a server leaf: `serverAuth`, DNS SANs for `localhost` and the
    /// requested name, IP SAN `127.0.0.1`, one-year validity.
    pub fn issue_server(&self, server_name: &str) -> Result<CertifiedKey> {
        self.issue_server_with_key_bits(server_name, LEAF_RSA_BITS)
    }

    /// [`CertificateAuthority::issue_server`] with an explicit key size.
    pub fn issue_server_with_key_bits(&self, server_name: &str, bits: usize) -> Result<CertifiedKey> {
        let key_pem = rsa_key_pem(bits)?;
        let key = KeyPair::from_pem_and_sign_algo(&key_pem, &PKCS_RSA_SHA256).map_err(|e| GaiaError::Certificate {
            reason: format!("failed to load server key pair: {e}"),
        })?;

        let mut params =
            CertificateParams::new(vec!["localhost".to_string(), server_name.to_string()]).map_err(|e| {
                GaiaError::Certificate {
                    reason: format!("invalid server name: {e}"),
                }
            })?;
        params.subject_alt_names.push(SanType::IpAddress(IpAddr::V4(Ipv4Addr::LOCALHOST)));
        params.distinguished_name.push(DnType::CommonName, server_name);
        params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
        self.sign_leaf(params, &key)
    }

    /// Issue a client leaf: `clientAuth`, subject CN = the client's
    /// registered name, no SANs, one-year validity.
    ///
    /// The CN is the identity the daemon extracts from the peer certificate;
    /// re-issuing with a different CN is a new identity.
    pub fn issue_client(&self, client_name: &str) -> Result<CertifiedKey> {
        self.issue_client_with_key_bits(client_name, LEAF_RSA_BITS)
    }

    /// [`CertificateAuthority::issue_client`] with an explicit key size.
    pub fn issue_client_with_key_bits(&self, client_name: &str, bits: usize) -> Result<CertifiedKey> {
        let key_pem = rsa_key_pem(bits)?;
        let key = KeyPair::from_pem_and_sign_algo(&key_pem, &PKCS_RSA_SHA256).map_err(|e| GaiaError::Certificate {
            reason: format!("failed to load client key pair: {e}"),
        })?;

        let mut params = CertificateParams::default();
        params.distinguished_name.push(DnType::CommonName, client_name);
        params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];
        self.sign_leaf(params, &key)
    }

    fn sign_leaf(&self, mut params: CertificateParams, key: &KeyPair) -> Result<CertifiedKey> {
        params.serial_number = Some(timestamp_serial());

        let now = OffsetDateTime::now_utc();
        params.not_before = now;
        params.not_after = now + Duration::days(LEAF_VALIDITY_DAYS);

        let cert = params.signed_by(key, &self.cert, &self.key).map_err(|e| GaiaError::Certificate {
            reason: format!("failed to sign leaf certificate: {e}"),
        })?;

        Ok(CertifiedKey {
            cert_pem: cert.pem(),
            key_pem: key.serialize_pem(),
        })
    }
}

/// Generate an RSA private key and serialize it as PKCS#8 PEM.
fn rsa_key_pem(bits: usize) -> Result<Zeroizing<String>> {
    let mut rng = rand::rngs::OsRng;
    let key = RsaPrivateKey::new(&mut rng, bits).map_err(|e| GaiaError::Certificate {
        reason: format!("RSA key generation failed: {e}"),
    })?;
    key.to_pkcs8_pem(LineEnding::LF).map_err(|e| GaiaError::Certificate {
        reason: format!("failed to serialize RSA key: {e}"),
    })
}

/// Leaf serial: the current Unix timestamp in seconds.
fn timestamp_serial() -> SerialNumber {
    let secs = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    SerialNumber::from(secs.to_be_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use x509_cert::Certificate as X509Certificate;
    use x509_cert::der::DecodePem;

    use super::*;

    const TEST_BITS: usize = 2048;

    fn test_ca() -> CertificateAuthority {
        CertificateAuthority::generate_with_key_bits("gaia-test-ca", TEST_BITS).unwrap()
    }

    #[test]
    fn ca_certificate_has_expected_subject() {
        let ca = test_ca();
        let parsed = X509Certificate::from_pem(ca.cert_pem().as_bytes()).unwrap();
        let subject = parsed.tbs_certificate.subject.to_string();
        assert!(subject.contains("gaia-test-ca"));
        assert!(subject.contains(CA_ORGANIZATION));
    }

    #[test]
    fn ca_serial_is_one() {
        let ca = test_ca();
        let parsed = X509Certificate::from_pem(ca.cert_pem().as_bytes()).unwrap();
        assert_eq!(parsed.tbs_certificate.serial_number.as_bytes(), &[1u8]);
    }

    #[test]
    fn ca_roundtrips_through_pem() {
        let ca = test_ca();
        let rebuilt = CertificateAuthority::from_pem(&ca.cert_pem(), &ca.key_pem()).unwrap();
        // The rebuilt CA must still be able to sign leaves.
        let leaf = rebuilt.issue_client_with_key_bits("web-a", TEST_BITS).unwrap();
        assert!(leaf.cert_pem.contains("BEGIN CERTIFICATE"));
    }

    #[test]
    fn client_leaf_carries_client_name_as_cn() {
        let ca = test_ca();
        let leaf = ca.issue_client_with_key_bits("web-a", TEST_BITS).unwrap();
        let parsed = X509Certificate::from_pem(leaf.cert_pem.as_bytes()).unwrap();
        assert!(parsed.tbs_certificate.subject.to_string().contains("web-a"));
    }

    #[test]
    fn leaf_keys_are_pem_encoded() {
        let ca = test_ca();
        let leaf = ca.issue_server_with_key_bits("gaia-host", TEST_BITS).unwrap();
        assert!(leaf.cert_pem.starts_with("-----BEGIN CERTIFICATE-----"));
        assert!(leaf.key_pem.contains("PRIVATE KEY"));
    }
}
