//! Peer identity extraction.
//!
//! The authorization principal for the client service is the subject common
//! name of the first certificate in the verified peer chain. It is never
//! read from the request body.

use const_oid::db::rfc4519::CN;
use tonic::Request;
use tonic::Status;
use x509_cert::Certificate;
use x509_cert::der::Decode;
use x509_cert::der::asn1::PrintableStringRef;
use x509_cert::der::asn1::Utf8StringRef;

/// Extract the subject CN of the verified peer certificate.
pub fn peer_common_name<T>(request: &Request<T>) -> Result<String, Status> {
    let certs = request
        .peer_certs()
        .ok_or_else(|| Status::unauthenticated("no verified peer certificate"))?;
    let leaf = certs
        .first()
        .ok_or_else(|| Status::unauthenticated("empty peer certificate chain"))?;

    let cert = Certificate::from_der(leaf.as_ref())
        .map_err(|_| Status::unauthenticated("peer certificate could not be parsed"))?;

    for rdn in cert.tbs_certificate.subject.0.iter() {
        for attr in rdn.0.iter() {
            if attr.oid != CN {
                continue;
            }
            if let Ok(value) = attr.value.decode_as::<Utf8StringRef>() {
                return Ok(value.as_str().to_string());
            }
            if let Ok(value) = attr.value.decode_as::<PrintableStringRef>() {
                return Ok(value.as_str().to_string());
            }
        }
    }

    Err(Status::unauthenticated("peer certificate carries no common name"))
}
