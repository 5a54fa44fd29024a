//! Certificate representations handled by a verification run.
//!
//! Raw certificates arrive as DER bytes. The ones that pass the configured
//! [`CertMatcher`](matcher::CertMatcher) are turned into an
//! [`EncodedCertificate`] by a [`CertEncoder`](encoder::CertEncoder), and that
//! text form is what travels to the verification helper and the key deriver.

pub mod encoder;
pub mod matcher;
pub(crate) mod parsing;

use std::fmt;

/// Transport-safe text form of a DER certificate (base64 by default).
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct EncodedCertificate(String);

impl EncodedCertificate {
    /// Wraps already encoded certificate text.
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Returns the encoded text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the wrapper, returning the encoded text.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for EncodedCertificate {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for EncodedCertificate {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl fmt::Debug for EncodedCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EncodedCertificate")
            .field(&format_args!("{}", crate::logging::Abbrev(&self.0)))
            .finish()
    }
}

/// A certificate that survived filtering, with its position in the caller's input.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct Candidate {
    pub(crate) input_index: usize,
    pub(crate) encoded: EncodedCertificate,
}
