//! Starting the external verification helper.
//!
//! The orchestrator only needs two things from a launcher: a synchronous
//! start that fails if the helper cannot run, and a future that resolves to
//! the helper's exit status. Dropping that future must stop the helper; this
//! is how a timed-out verification is cancelled.

use crate::args::VerifierArgs;
use crate::error::LaunchError;
use std::fs::OpenOptions;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;

/// Future resolving to the exit status of a launched helper.
pub type ExitFuture = Pin<Box<dyn Future<Output = io::Result<ChildStatus>> + Send + 'static>>;

/// How a helper process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildStatus {
    /// The process exited normally with the given code.
    Exited(i32),
    /// The process was terminated by the given signal.
    Signaled(i32),
}

impl ChildStatus {
    /// Whether the helper accepted the certificate (normal exit with status zero).
    pub fn is_success(self) -> bool {
        self == Self::Exited(0)
    }
}

impl From<ExitStatus> for ChildStatus {
    fn from(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::Exited(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt as _;
            if let Some(signal) = status.signal() {
                return Self::Signaled(signal);
            }
        }
        // Neither a code nor a signal: report as an abnormal termination.
        Self::Signaled(0)
    }
}

/// Starts verification helpers.
pub trait VerifierLauncher: Send + Sync + 'static {
    /// Starts one helper invocation with `args`.
    ///
    /// The returned future resolves once the helper has exited. Dropping it
    /// before completion must terminate the helper.
    ///
    /// # Errors
    ///
    /// Returns a [`LaunchError`] if the helper cannot be started.
    fn launch(&self, args: &VerifierArgs) -> Result<ExitFuture, LaunchError>;
}

/// Runs the helper as a child process on the tokio runtime.
///
/// Standard input and output are closed; the helper reports its verdict only
/// through its exit status. Standard error is appended to the configured log
/// file, if any.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    helper_path: PathBuf,
    logfile: Option<PathBuf>,
}

impl ProcessLauncher {
    /// Creates a launcher for the helper at `helper_path`.
    pub fn new(helper_path: impl Into<PathBuf>) -> Self {
        Self {
            helper_path: helper_path.into(),
            logfile: None,
        }
    }

    /// Sends the helper's standard error to `logfile` (opened in append mode).
    #[must_use]
    pub fn logfile(mut self, logfile: impl Into<PathBuf>) -> Self {
        self.logfile = Some(logfile.into());
        self
    }

    /// Returns the helper path.
    pub fn helper_path(&self) -> &Path {
        &self.helper_path
    }

    fn stderr(&self) -> Result<Stdio, LaunchError> {
        let Some(path) = &self.logfile else {
            return Ok(Stdio::null());
        };
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map(Stdio::from)
            .map_err(|source| LaunchError::Logfile {
                path: path.clone(),
                source,
            })
    }
}

impl VerifierLauncher for ProcessLauncher {
    fn launch(&self, args: &VerifierArgs) -> Result<ExitFuture, LaunchError> {
        let mut child = Command::new(&self.helper_path)
            .args(args.as_slice())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(self.stderr()?)
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                path: self.helper_path.clone(),
                source,
            })?;

        Ok(Box::pin(async move {
            let status = child.wait().await?;
            Ok(ChildStatus::from(status))
        }))
    }
}
