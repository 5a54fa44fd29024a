#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

//! This crate turns X.509 client certificates into SSH public keys, keeping
//! only the certificates an external validation helper accepts.
//!
//! Each certificate is checked by launching the helper (by default SSSD's
//! `p11_child`) with the certificate and the CA database on its command line.
//! Helpers run strictly one at a time, in input order. A zero exit status means
//! the certificate is trusted, and its subject public key is then converted to
//! the SSH wire format.
//!
//! The entry point is [`CertKeyVerifier`]:
//!
//! ```no_run
//! use ssh_cert_keys::cert::matcher::ClientAuthMatcher;
//! use ssh_cert_keys::{CertKeyError, CertKeyVerifier};
//! use std::time::Duration;
//!
//! # async fn example(certs: Vec<Vec<u8>>) -> Result<(), Box<dyn std::error::Error>> {
//! let verifier = CertKeyVerifier::builder()
//!     .ca_db("/etc/sssd/pki/sssd_auth_ca_db.pem")
//!     .verify_options("no_ocsp")
//!     .timeout(Duration::from_secs(10))
//!     .matcher(ClientAuthMatcher)
//!     .build();
//!
//! match verifier.start(&certs).await {
//!     Ok(keys) => {
//!         for slot in keys.slots() {
//!             match slot.key() {
//!                 Some(key) => println!("cert #{}: {}", slot.input_index(), key.to_openssh()?),
//!                 None => println!("cert #{}: rejected", slot.input_index()),
//!             }
//!         }
//!     }
//!     Err(CertKeyError::VerifierTimeout { input_index, .. }) => {
//!         eprintln!("helper timed out on cert #{input_index}");
//!     }
//!     Err(e) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **`logging`** (default): diagnostics through the `log` crate
//! - **`tracing`**: diagnostics through `tracing` instead; takes precedence
//!   over `logging` when both are enabled

pub mod args;
pub mod cert;
pub mod config;
pub mod constants;
pub mod error;
pub mod launcher;
pub mod ssh;
pub mod verifier;

mod logging;
mod prelude;

// -----------------------
// Re-exports
// -----------------------

pub use crate::{
    args::VerifierArgs,
    cert::encoder::{Base64Encoder, CertEncoder},
    cert::matcher::{CertMatcher, ClientAuthMatcher},
    cert::EncodedCertificate,
    config::{CertKeyVerifierBuilder, VerifierConfig},
    error::{CertKeyError, ConfigError, DeriveError, EncodeError, LaunchError},
    launcher::{ChildStatus, ExitFuture, ProcessLauncher, VerifierLauncher},
    ssh::{KeyDeriver, SshPublicKey, X509KeyDeriver},
    verifier::{CertKeyVerifier, KeySlot, RunHandle, VerifiedKeys},
};
