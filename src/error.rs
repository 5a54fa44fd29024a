//! Error types for certificate verification runs and their collaborators.
//!
//! [`CertKeyError`] is what a run surfaces to its caller. Every variant aborts
//! the whole batch. Per-certificate outcomes (a rejected certificate, a key that
//! could not be derived) are not errors at this level: they show up as empty
//! slots in [`VerifiedKeys`](crate::VerifiedKeys).

use std::collections::TryReserveError;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Fatal errors of a verification run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CertKeyError {
    /// Required configuration is missing. Raised before any certificate is looked at.
    #[error("invalid verifier configuration: {0}")]
    Config(#[from] ConfigError),

    /// Internal buffers for the run could not be allocated.
    #[error("failed to allocate run buffers")]
    Allocation(#[from] TryReserveError),

    /// A candidate certificate could not be converted to its transport form.
    #[error("failed to encode certificate at input index {input_index}")]
    Encoding {
        /// Position of the certificate in the caller's input.
        input_index: usize,
        /// Underlying encoder failure.
        #[source]
        source: EncodeError,
    },

    /// The verification helper could not be started or waited on.
    #[error("failed to run verification helper: {0}")]
    Launch(#[from] LaunchError),

    /// The verification helper did not finish within the configured timeout.
    #[error("verification helper timed out after {}s on input index {input_index}", .timeout.as_secs())]
    VerifierTimeout {
        /// Position, in the caller's input, of the certificate being verified.
        input_index: usize,
        /// The timeout that expired.
        timeout: Duration,
    },
}

/// Errors related to verifier configuration.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum ConfigError {
    /// No CA database path was configured.
    #[error("missing CA database path")]
    MissingCaDb,
}

/// Errors produced by a [`CertEncoder`](crate::cert::encoder::CertEncoder).
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum EncodeError {
    /// The certificate buffer is empty.
    #[error("certificate buffer is empty")]
    Empty,

    /// Custom encoder failure.
    #[error("{0}")]
    Other(String),
}

/// Errors produced while starting or waiting on the verification helper.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LaunchError {
    /// The helper process could not be spawned (missing binary, permissions, ...).
    #[error("failed to spawn {}: {source}", .path.display())]
    Spawn {
        /// Helper that was being started.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The log destination for the helper could not be opened.
    #[error("failed to open helper log file {}: {source}", .path.display())]
    Logfile {
        /// Configured log destination.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Waiting for the helper to exit failed.
    #[error("failed waiting for verification helper: {0}")]
    Wait(#[source] io::Error),
}

/// Errors produced by a [`KeyDeriver`](crate::ssh::KeyDeriver).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeriveError {
    /// The encoded certificate is not valid base64.
    #[error("certificate is not valid base64")]
    Base64(#[from] base64::DecodeError),

    /// The decoded bytes are not a parseable X.509 certificate.
    #[error("failed parsing X.509 certificate")]
    ParseX509Certificate(#[from] x509_parser::error::X509Error),

    /// The certificate's public key algorithm has no SSH representation here.
    #[error("unsupported public key algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The public key could not be converted to SSH form.
    #[error("failed building SSH public key")]
    SshKey(#[from] ssh_key::Error),
}
