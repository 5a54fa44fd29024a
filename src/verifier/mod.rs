//! Sequential certificate verification.
//!
//! [`CertKeyVerifier::start`] prepares a batch synchronously: it checks the
//! configuration, filters the input through the configured matcher, encodes
//! every candidate and builds the helper's argument template. The returned
//! [`RunHandle`] then verifies the candidates strictly one after another:
//!
//! 1. launch the helper for the next candidate,
//! 2. wait for it to exit, racing the configured timeout,
//! 3. on a zero exit status derive the SSH key, otherwise record an empty slot,
//! 4. move on to the next candidate.
//!
//! Rejected certificates and failed key derivations only empty their own
//! slot. A timeout, or a helper that cannot be started, aborts the batch.

mod keys;
mod run;
mod state;

pub use keys::{KeySlot, VerifiedKeys};
pub use run::RunHandle;

use crate::args::ArgumentTemplate;
use crate::cert::encoder::CertEncoder;
use crate::cert::matcher::CertMatcher;
use crate::cert::{Candidate, EncodedCertificate};
use crate::config::{CertKeyVerifierBuilder, VerifierConfig};
use crate::error::{CertKeyError, ConfigError};
use crate::launcher::VerifierLauncher;
use crate::prelude::{debug, error};
use crate::ssh::KeyDeriver;
use run::Run;
use std::fmt::Debug;
use std::sync::Arc;

/// The pluggable parts of a verifier.
pub(crate) struct Collaborators {
    pub(crate) matcher: Option<Box<dyn CertMatcher>>,
    pub(crate) encoder: Box<dyn CertEncoder>,
    pub(crate) deriver: Arc<dyn KeyDeriver>,
    pub(crate) launcher: Arc<dyn VerifierLauncher>,
}

/// Validates certificates through the external helper and derives SSH keys
/// from the accepted ones.
///
/// Cloning is cheap; clones share configuration and collaborators. Runs started
/// from the same verifier are independent of each other.
#[derive(Clone)]
pub struct CertKeyVerifier {
    inner: Arc<Inner>,
}

struct Inner {
    config: VerifierConfig,
    collaborators: Collaborators,
}

impl Debug for CertKeyVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let collaborators = &self.inner.collaborators;
        f.debug_struct("CertKeyVerifier")
            .field("config", &self.inner.config)
            .field(
                "matcher",
                &collaborators.matcher.as_ref().map(|_| "<CertMatcher>"),
            )
            .field("encoder", &"<CertEncoder>")
            .field("deriver", &"<KeyDeriver>")
            .field("launcher", &"<VerifierLauncher>")
            .finish()
    }
}

impl CertKeyVerifier {
    /// Creates a builder for configuring a [`CertKeyVerifier`].
    pub fn builder() -> CertKeyVerifierBuilder {
        CertKeyVerifierBuilder::new()
    }

    pub(crate) fn from_parts(config: VerifierConfig, collaborators: Collaborators) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                collaborators,
            }),
        }
    }

    /// Returns the verifier's configuration.
    pub fn config(&self) -> &VerifierConfig {
        &self.inner.config
    }

    /// Starts verifying `certs` (DER encoded).
    ///
    /// Preparation happens before this returns. If it fails (missing CA
    /// database, an encoding failure, allocation failure) the handle resolves
    /// to that error without launching any helper. If no certificate passes the
    /// matcher, the handle resolves to an empty [`VerifiedKeys`].
    ///
    /// No helper is launched until the returned handle is awaited. Dropping it
    /// without awaiting runs nothing.
    pub fn start<C>(&self, certs: &[C]) -> RunHandle
    where
        C: AsRef<[u8]>,
    {
        match self.prepare(certs) {
            Ok(run) => RunHandle::ready(run),
            Err(e) => {
                error!("Failed to start certificate verification: error={}", e);
                RunHandle::failed(e)
            }
        }
    }

    /// Verifies `certs` and waits for the result.
    ///
    /// Shorthand for `self.start(certs).await_result().await`.
    ///
    /// # Errors
    ///
    /// See [`RunHandle::await_result`].
    pub async fn verify<C>(&self, certs: &[C]) -> Result<VerifiedKeys, CertKeyError>
    where
        C: AsRef<[u8]>,
    {
        self.start(certs).await_result().await
    }

    fn prepare<C>(&self, certs: &[C]) -> Result<Run, CertKeyError>
    where
        C: AsRef<[u8]>,
    {
        let config = &self.inner.config;
        let collaborators = &self.inner.collaborators;

        let ca_db = config
            .ca_db
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
            .ok_or(ConfigError::MissingCaDb)?;

        let template = ArgumentTemplate::new(
            ca_db,
            config.verify_options.as_deref(),
            config.timeout_secs,
        );

        let mut candidates = Vec::new();
        candidates.try_reserve_exact(certs.len())?;

        for (index, cert) in certs.iter().enumerate() {
            let der = cert.as_ref();

            if let Some(matcher) = &collaborators.matcher {
                if !matcher.matches(der) {
                    debug!(
                        "Certificate does not match the matching rules and is ignored: input_index={}",
                        index
                    );
                    continue;
                }
            }

            let encoded = collaborators
                .encoder
                .encode(der)
                .map_err(|source| CertKeyError::Encoding {
                    input_index: index,
                    source,
                })?;

            candidates.push(Candidate {
                input_index: index,
                encoded: EncodedCertificate::from(encoded),
            });
        }

        Run::new(
            template,
            candidates,
            config.timeout(),
            Arc::clone(&collaborators.deriver),
            Arc::clone(&collaborators.launcher),
        )
    }
}
