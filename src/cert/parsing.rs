//! Internal X.509 parsing helpers.

use x509_parser::certificate::X509Certificate;
use x509_parser::error::X509Error;
use x509_parser::nom::Err;

/// Object identifier of the Ed25519 public key algorithm (RFC 8410).
pub(crate) const OID_ED25519: &str = "1.3.101.112";

/// Parses the given DER-encoded bytes as a single X.509 certificate.
///
/// Trailing bytes after the certificate are ignored.
pub(crate) fn parse_der_certificate(der_bytes: &[u8]) -> Result<X509Certificate<'_>, X509Error> {
    match x509_parser::parse_x509_certificate(der_bytes) {
        Ok((_, cert)) => Ok(cert),
        Err(Err::Incomplete(_)) => Err(X509Error::InvalidCertificate),
        Err(Err::Error(e) | Err::Failure(e)) => Err(e),
    }
}

/// Whether the certificate may be used for client authentication.
///
/// Requires a key usage extension with `digitalSignature` and an extended key
/// usage extension listing `clientAuth`. Missing or duplicated extensions fail
/// the check.
pub(crate) fn allows_client_auth(cert: &X509Certificate<'_>) -> bool {
    let digital_signature = match cert.key_usage() {
        Ok(Some(ku)) => ku.value.digital_signature(),
        _ => false,
    };
    let client_auth = match cert.extended_key_usage() {
        Ok(Some(eku)) => eku.value.client_auth,
        _ => false,
    };
    digital_signature && client_auth
}
