//! Command line of the verification helper.
//!
//! Everything except the certificate is fixed for a run, so it is built once
//! into an [`ArgumentTemplate`]. Each step gets its own [`VerifierArgs`]:
//! a copy of the shared prefix with the current candidate appended.

use crate::cert::EncodedCertificate;
use crate::constants::{ARG_CA_DB, ARG_CERTIFICATE, ARG_TIMEOUT, ARG_VERIFICATION, ARG_VERIFY_OPTIONS};
use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::sync::Arc;

/// Immutable argument prefix shared by every helper invocation of a run.
#[derive(Debug, Clone)]
pub(crate) struct ArgumentTemplate {
    prefix: Arc<[OsString]>,
}

impl ArgumentTemplate {
    /// Builds the prefix `[--timeout <secs>] --verification [--verify <opts>] --ca_db <path> --certificate`.
    ///
    /// `timeout_secs == 0` omits the timeout flag.
    pub(crate) fn new(ca_db: &Path, verify_options: Option<&str>, timeout_secs: u64) -> Self {
        let mut prefix: Vec<OsString> = Vec::with_capacity(8);

        if timeout_secs > 0 {
            prefix.push(ARG_TIMEOUT.into());
            prefix.push(timeout_secs.to_string().into());
        }
        prefix.push(ARG_VERIFICATION.into());
        if let Some(opts) = verify_options {
            prefix.push(ARG_VERIFY_OPTIONS.into());
            prefix.push(opts.into());
        }
        prefix.push(ARG_CA_DB.into());
        prefix.push(ca_db.as_os_str().to_owned());
        prefix.push(ARG_CERTIFICATE.into());

        Self {
            prefix: prefix.into(),
        }
    }

    /// Returns the argument list for verifying `cert`.
    pub(crate) fn for_candidate(&self, cert: &EncodedCertificate) -> VerifierArgs {
        let mut args = Vec::with_capacity(self.prefix.len() + 1);
        args.extend(self.prefix.iter().cloned());
        args.push(OsString::from(cert.as_str()));
        VerifierArgs {
            args,
            certificate: cert.clone(),
        }
    }
}

/// Arguments for one helper invocation.
///
/// The certificate under verification is always the final argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierArgs {
    args: Vec<OsString>,
    certificate: EncodedCertificate,
}

impl VerifierArgs {
    /// Returns the arguments in command line order, excluding the program name.
    pub fn as_slice(&self) -> &[OsString] {
        &self.args
    }

    /// Iterates the arguments in command line order.
    pub fn iter(&self) -> impl Iterator<Item = &OsStr> {
        self.args.iter().map(OsString::as_os_str)
    }

    /// Returns the certificate this invocation verifies.
    pub fn certificate(&self) -> &EncodedCertificate {
        &self.certificate
    }
}
