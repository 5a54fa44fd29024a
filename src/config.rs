//! Verifier configuration and builder.

use crate::cert::encoder::{Base64Encoder, CertEncoder};
use crate::cert::matcher::CertMatcher;
use crate::constants::DEFAULT_HELPER_PATH;
use crate::launcher::{ProcessLauncher, VerifierLauncher};
use crate::ssh::{KeyDeriver, X509KeyDeriver};
use crate::verifier::{CertKeyVerifier, Collaborators};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Plain settings of a [`CertKeyVerifier`].
///
/// Deserializable so the owning service can keep it in its own configuration
/// file. Missing fields take their defaults.
///
/// ```
/// use ssh_cert_keys::VerifierConfig;
///
/// let config: VerifierConfig = serde_json::from_str(
///     r#"{ "ca_db": "/etc/sssd/pki/sssd_auth_ca_db.pem", "timeout_secs": 10 }"#,
/// )?;
/// assert_eq!(config.timeout_secs, 10);
/// assert!(config.verify_options.is_none());
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// CA database the helper validates against. Required for a run to start.
    pub ca_db: Option<PathBuf>,
    /// Extra verification options forwarded verbatim to the helper.
    pub verify_options: Option<String>,
    /// Per-certificate timeout in seconds. `0` disables the timer.
    pub timeout_secs: u64,
    /// Destination for the helper's diagnostic output.
    pub logfile: Option<PathBuf>,
    /// Verification helper executable.
    pub helper_path: PathBuf,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            ca_db: None,
            verify_options: None,
            timeout_secs: 0,
            logfile: None,
            helper_path: PathBuf::from(DEFAULT_HELPER_PATH),
        }
    }
}

impl VerifierConfig {
    /// Returns the per-certificate timeout, or `None` if disabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// Builder for [`CertKeyVerifier`].
///
/// Without further configuration the verifier uses every input certificate
/// as a candidate, encodes with [`Base64Encoder`], derives keys with
/// [`X509KeyDeriver`] and runs the helper through a [`ProcessLauncher`].
///
/// # Example
///
/// ```no_run
/// use ssh_cert_keys::cert::matcher::ClientAuthMatcher;
/// use ssh_cert_keys::CertKeyVerifier;
/// use std::time::Duration;
///
/// # async fn example(certs: Vec<Vec<u8>>) -> Result<(), Box<dyn std::error::Error>> {
/// let verifier = CertKeyVerifier::builder()
///     .ca_db("/etc/sssd/pki/sssd_auth_ca_db.pem")
///     .timeout(Duration::from_secs(10))
///     .matcher(ClientAuthMatcher)
///     .build();
///
/// let keys = verifier.start(&certs).await_result().await?;
/// for key in keys.keys() {
///     println!("{}", key.to_openssh()?);
/// }
/// # Ok(())
/// # }
/// ```
pub struct CertKeyVerifierBuilder {
    config: VerifierConfig,
    matcher: Option<Box<dyn CertMatcher>>,
    encoder: Option<Box<dyn CertEncoder>>,
    deriver: Option<Arc<dyn KeyDeriver>>,
    launcher: Option<Arc<dyn VerifierLauncher>>,
}

impl Debug for CertKeyVerifierBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertKeyVerifierBuilder")
            .field("config", &self.config)
            .field("matcher", &self.matcher.as_ref().map(|_| "<CertMatcher>"))
            .field("encoder", &self.encoder.as_ref().map(|_| "<CertEncoder>"))
            .field("deriver", &self.deriver.as_ref().map(|_| "<KeyDeriver>"))
            .field(
                "launcher",
                &self.launcher.as_ref().map(|_| "<VerifierLauncher>"),
            )
            .finish()
    }
}

impl Default for CertKeyVerifierBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CertKeyVerifierBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self {
            config: VerifierConfig::default(),
            matcher: None,
            encoder: None,
            deriver: None,
            launcher: None,
        }
    }

    /// Replaces all plain settings at once.
    #[must_use]
    pub fn config(mut self, config: VerifierConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the CA database path.
    #[must_use]
    pub fn ca_db(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.ca_db = Some(path.into());
        self
    }

    /// Sets extra verification options for the helper.
    #[must_use]
    pub fn verify_options(mut self, options: impl Into<String>) -> Self {
        self.config.verify_options = Some(options.into());
        self
    }

    /// Sets the per-certificate timeout.
    ///
    /// Only whole seconds count: anything under one second disables the timer.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_secs = timeout.as_secs();
        self
    }

    /// Sets where the helper's diagnostic output goes.
    #[must_use]
    pub fn logfile(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.logfile = Some(path.into());
        self
    }

    /// Sets the helper executable used by the default launcher.
    #[must_use]
    pub fn helper_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.helper_path = path.into();
        self
    }

    /// Restricts candidates to certificates accepted by `matcher`.
    #[must_use]
    pub fn matcher<M>(mut self, matcher: M) -> Self
    where
        M: CertMatcher,
    {
        self.matcher = Some(Box::new(matcher));
        self
    }

    /// Replaces the certificate encoder.
    #[must_use]
    pub fn encoder<E>(mut self, encoder: E) -> Self
    where
        E: CertEncoder,
    {
        self.encoder = Some(Box::new(encoder));
        self
    }

    /// Replaces the SSH key deriver.
    #[must_use]
    pub fn key_deriver<D>(mut self, deriver: D) -> Self
    where
        D: KeyDeriver,
    {
        self.deriver = Some(Arc::new(deriver));
        self
    }

    /// Replaces the helper launcher. `helper_path` and `logfile` are then
    /// only meaningful to the extent the custom launcher uses them.
    #[must_use]
    pub fn launcher<L>(mut self, launcher: L) -> Self
    where
        L: VerifierLauncher,
    {
        self.launcher = Some(Arc::new(launcher));
        self
    }

    /// Builds the verifier.
    ///
    /// Building never fails; configuration problems are reported by each run
    /// (see [`CertKeyVerifier::start`]).
    pub fn build(self) -> CertKeyVerifier {
        let launcher = self.launcher.unwrap_or_else(|| {
            let mut launcher = ProcessLauncher::new(self.config.helper_path.clone());
            if let Some(logfile) = &self.config.logfile {
                launcher = launcher.logfile(logfile.clone());
            }
            Arc::new(launcher)
        });

        CertKeyVerifier::from_parts(
            self.config,
            Collaborators {
                matcher: self.matcher,
                encoder: self.encoder.unwrap_or_else(|| Box::new(Base64Encoder)),
                deriver: self.deriver.unwrap_or_else(|| Arc::new(X509KeyDeriver)),
                launcher,
            },
        )
    }
}
