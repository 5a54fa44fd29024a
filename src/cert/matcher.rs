//! Pre-filtering of certificates before verification.

use crate::cert::parsing::{allows_client_auth, parse_der_certificate};

/// Decides whether a raw certificate is a candidate for verification.
///
/// Matchers run synchronously while a run is being prepared and must not fail:
/// a certificate that cannot be judged simply does not match. Closures of type
/// `Fn(&[u8]) -> bool` are matchers.
///
/// # Example
///
/// ```
/// use ssh_cert_keys::cert::matcher::CertMatcher;
///
/// let non_empty = |der: &[u8]| !der.is_empty();
/// assert!(non_empty.matches(b"\x30\x03\x02\x01\x01"));
/// assert!(!non_empty.matches(b""));
/// ```
pub trait CertMatcher: Send + Sync + 'static {
    /// Returns `true` to keep the DER certificate as a candidate.
    fn matches(&self, der: &[u8]) -> bool;
}

impl<F> CertMatcher for F
where
    F: Fn(&[u8]) -> bool + Send + Sync + 'static,
{
    fn matches(&self, der: &[u8]) -> bool {
        self(der)
    }
}

/// The default certificate mapping rule for SSH logins.
///
/// A certificate matches when its key usage includes `digitalSignature` and
/// its extended key usage includes `clientAuth`. Certificates that fail to
/// parse never match.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientAuthMatcher;

impl CertMatcher for ClientAuthMatcher {
    fn matches(&self, der: &[u8]) -> bool {
        parse_der_certificate(der).is_ok_and(|cert| allows_client_auth(&cert))
    }
}
