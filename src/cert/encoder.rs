//! Conversion of DER certificates to the text form passed to the helper.

use crate::error::EncodeError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Converts raw certificate bytes to transport-safe text.
///
/// A failure here aborts the whole run with
/// [`CertKeyError::Encoding`](crate::CertKeyError::Encoding).
pub trait CertEncoder: Send + Sync + 'static {
    /// Encodes one DER certificate.
    ///
    /// # Errors
    ///
    /// Returns an [`EncodeError`] if the certificate cannot be represented.
    fn encode(&self, der: &[u8]) -> Result<String, EncodeError>;
}

/// Standard, padded base64. This is what the verification helper expects.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64Encoder;

impl CertEncoder for Base64Encoder {
    fn encode(&self, der: &[u8]) -> Result<String, EncodeError> {
        if der.is_empty() {
            return Err(EncodeError::Empty);
        }
        Ok(STANDARD.encode(der))
    }
}
