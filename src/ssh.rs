//! Derivation of SSH public keys from validated certificates.

use crate::cert::parsing::{parse_der_certificate, OID_ED25519};
use crate::cert::EncodedCertificate;
use crate::error::DeriveError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ssh_key::public::{EcdsaPublicKey, Ed25519PublicKey, KeyData, RsaPublicKey};
use ssh_key::Mpint;
use std::fmt;
use x509_parser::public_key::PublicKey as SpkiKey;
use x509_parser::x509::SubjectPublicKeyInfo;

/// An SSH public key in wire format (RFC 4253 section 6.6).
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct SshPublicKey(Vec<u8>);

impl SshPublicKey {
    /// Returns the wire-format key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Renders the key as an `authorized_keys` line without a comment,
    /// e.g. `ssh-ed25519 AAAAC3Nz...`.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a well-formed SSH public key.
    pub fn to_openssh(&self) -> Result<String, ssh_key::Error> {
        ssh_key::PublicKey::from_bytes(&self.0)?.to_openssh()
    }
}

impl AsRef<[u8]> for SshPublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for SshPublicKey {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for SshPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshPublicKey")
            .field("len", &self.0.len())
            .finish()
    }
}

/// Extracts an SSH public key from a certificate the helper has accepted.
///
/// A derivation failure is a soft, per-certificate outcome: the run logs it,
/// leaves the certificate's slot empty and continues.
pub trait KeyDeriver: Send + Sync + 'static {
    /// Derives the SSH public key of the encoded certificate.
    ///
    /// # Errors
    ///
    /// Returns a [`DeriveError`] if the certificate cannot be decoded or its
    /// key has no SSH representation.
    fn derive(&self, cert: &EncodedCertificate) -> Result<SshPublicKey, DeriveError>;
}

/// Derives SSH keys from base64 DER certificates.
///
/// Supported subject public keys: RSA, ECDSA on NIST P-256/P-384/P-521 and
/// Ed25519.
#[derive(Debug, Clone, Copy, Default)]
pub struct X509KeyDeriver;

impl KeyDeriver for X509KeyDeriver {
    fn derive(&self, cert: &EncodedCertificate) -> Result<SshPublicKey, DeriveError> {
        let der = STANDARD.decode(cert.as_str())?;
        let x509 = parse_der_certificate(&der)?;
        let key_data = key_data_from_spki(x509.public_key())?;
        let bytes = ssh_key::PublicKey::from(key_data).to_bytes()?;
        Ok(SshPublicKey(bytes))
    }
}

fn key_data_from_spki(spki: &SubjectPublicKeyInfo<'_>) -> Result<KeyData, DeriveError> {
    let algorithm = spki.algorithm.algorithm.to_id_string();

    // x509-parser leaves Ed25519 keys unparsed; the bit string is the raw key.
    if algorithm == OID_ED25519 {
        let raw: &[u8] = &spki.subject_public_key.data;
        return Ok(KeyData::Ed25519(Ed25519PublicKey::try_from(raw)?));
    }

    match spki.parsed()? {
        SpkiKey::RSA(rsa) => {
            let e = Mpint::from_positive_bytes(rsa.exponent)?;
            let n = Mpint::from_positive_bytes(rsa.modulus)?;
            Ok(KeyData::Rsa(RsaPublicKey { e, n }))
        }
        // The curve follows from the uncompressed point length.
        SpkiKey::EC(point) => Ok(KeyData::Ecdsa(EcdsaPublicKey::from_sec1_bytes(
            point.data(),
        )?)),
        _ => Err(DeriveError::UnsupportedAlgorithm(algorithm)),
    }
}
