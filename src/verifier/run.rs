use crate::args::ArgumentTemplate;
use crate::cert::Candidate;
use crate::error::{CertKeyError, LaunchError};
use crate::launcher::{ChildStatus, VerifierLauncher};
use crate::logging::Abbrev;
use crate::prelude::{debug, error, info, warn};
use crate::ssh::KeyDeriver;
use crate::verifier::keys::{KeySlot, VerifiedKeys};
use crate::verifier::state::{Completion, RunState};
use std::fmt::Debug;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// A prepared batch: candidates, argument template and the collaborators the
/// asynchronous part needs.
pub(crate) struct Run {
    template: ArgumentTemplate,
    candidates: Vec<Candidate>,
    timeout: Option<Duration>,
    deriver: Arc<dyn KeyDeriver>,
    launcher: Arc<dyn VerifierLauncher>,

    // Written once per completed candidate, in order.
    slots: Vec<KeySlot>,
    valid: usize,
}

impl Debug for Run {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Run")
            .field("template", &self.template)
            .field("candidates", &self.candidates.len())
            .field("timeout", &self.timeout)
            .field("deriver", &"<KeyDeriver>")
            .field("launcher", &"<VerifierLauncher>")
            .field("slots", &self.slots.len())
            .field("valid", &self.valid)
            .finish()
    }
}

impl Run {
    pub(crate) fn new(
        template: ArgumentTemplate,
        candidates: Vec<Candidate>,
        timeout: Option<Duration>,
        deriver: Arc<dyn KeyDeriver>,
        launcher: Arc<dyn VerifierLauncher>,
    ) -> Result<Self, CertKeyError> {
        let mut slots = Vec::new();
        slots.try_reserve_exact(candidates.len())?;

        Ok(Self {
            template,
            candidates,
            timeout,
            deriver,
            launcher,
            slots,
            valid: 0,
        })
    }

    pub(crate) fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// Drives the run to a terminal state, one helper at a time.
    pub(crate) async fn drive(mut self) -> Result<VerifiedKeys, CertKeyError> {
        let mut state = RunState::Pending(0);
        loop {
            state = match state {
                RunState::Pending(index) => self.step(index).await,
                RunState::Done(keys) => return Ok(keys),
                RunState::Failed(err) => return Err(err),
            };
        }
    }

    async fn step(&mut self, index: usize) -> RunState {
        if index == self.candidates.len() {
            info!(
                "Certificate verification finished: candidates={}, valid_keys={}",
                self.candidates.len(),
                self.valid
            );
            let slots = std::mem::take(&mut self.slots);
            return RunState::Done(VerifiedKeys::new(slots, self.valid));
        }

        let completion = self.verify(index).await;
        self.complete(index, completion)
    }

    /// Launches the helper for candidate `index` and waits for its exit or the
    /// timeout, whichever comes first. The loser is dropped, which kills a
    /// helper that is still running.
    async fn verify(&self, index: usize) -> Completion {
        let args = self.template.for_candidate(&self.candidates[index].encoded);
        debug!(
            "Launching verification helper: input_index={}, certificate={}",
            self.candidates[index].input_index,
            Abbrev(args.certificate().as_str())
        );

        let exit = match self.launcher.launch(&args) {
            Ok(exit) => exit,
            Err(e) => return Completion::LaunchFailed(e),
        };

        let status = match self.timeout {
            None => exit.await,
            Some(timeout) => tokio::select! {
                biased;
                status = exit => status,
                () = tokio::time::sleep(timeout) => return Completion::TimedOut(timeout),
            },
        };

        match status {
            Ok(status) => Completion::Exited(status),
            Err(e) => Completion::LaunchFailed(LaunchError::Wait(e)),
        }
    }

    /// Applies the outcome of candidate `index`.
    fn complete(&mut self, index: usize, completion: Completion) -> RunState {
        let candidate = &self.candidates[index];
        let input_index = candidate.input_index;

        let status = match completion {
            Completion::Exited(status) => status,
            Completion::TimedOut(timeout) => {
                error!(
                    "Verification helper timed out: input_index={}, timeout_secs={}",
                    input_index,
                    timeout.as_secs()
                );
                return RunState::Failed(CertKeyError::VerifierTimeout {
                    input_index,
                    timeout,
                });
            }
            Completion::LaunchFailed(e) => {
                error!(
                    "Verification helper failed: input_index={}, error={}",
                    input_index, e
                );
                return RunState::Failed(e.into());
            }
        };

        let cert = Abbrev(candidate.encoded.as_str());

        let key = match status {
            ChildStatus::Exited(0) => {
                debug!(
                    "Certificate is valid: input_index={}, certificate={}",
                    input_index, cert
                );
                match self.deriver.derive(&candidate.encoded) {
                    Ok(key) => {
                        self.valid += 1;
                        Some(key)
                    }
                    Err(e) => {
                        warn!(
                            "Failed to derive SSH key, skipping certificate: input_index={}, certificate={}, error={}",
                            input_index, cert, e
                        );
                        None
                    }
                }
            }
            ChildStatus::Exited(code) => {
                warn!(
                    "Certificate is not valid: input_index={}, certificate={}, exit_status={}",
                    input_index, cert, code
                );
                None
            }
            ChildStatus::Signaled(signal) => {
                warn!(
                    "Verification helper was terminated by signal: input_index={}, certificate={}, signal={}",
                    input_index, cert, signal
                );
                None
            }
        };

        self.slots.push(KeySlot::new(input_index, key));
        RunState::Pending(index + 1)
    }
}

/// An in-flight verification run returned by
/// [`CertKeyVerifier::start`](crate::CertKeyVerifier::start).
///
/// The run advances while the handle is awaited, through
/// [`RunHandle::await_result`] or directly with `.await`. Dropping the handle
/// abandons the run and kills a helper that is still running.
#[derive(Debug)]
pub struct RunHandle {
    state: HandleState,
}

#[derive(Debug)]
enum HandleState {
    Failed(CertKeyError),
    Ready(Run),
}

impl RunHandle {
    pub(crate) fn ready(run: Run) -> Self {
        Self {
            state: HandleState::Ready(run),
        }
    }

    pub(crate) fn failed(error: CertKeyError) -> Self {
        Self {
            state: HandleState::Failed(error),
        }
    }

    /// Number of candidate certificates, or `None` if the run already failed
    /// while being prepared.
    pub fn candidate_count(&self) -> Option<usize> {
        match &self.state {
            HandleState::Ready(run) => Some(run.candidate_count()),
            HandleState::Failed(_) => None,
        }
    }

    /// Waits for the run to finish.
    ///
    /// # Errors
    ///
    /// Returns the [`CertKeyError`] that aborted the batch. A batch in which
    /// every certificate was rejected is not an error; it yields
    /// [`VerifiedKeys`] with a valid count of zero.
    pub async fn await_result(self) -> Result<VerifiedKeys, CertKeyError> {
        match self.state {
            HandleState::Failed(e) => Err(e),
            HandleState::Ready(run) => run.drive().await,
        }
    }
}

impl IntoFuture for RunHandle {
    type Output = Result<VerifiedKeys, CertKeyError>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + 'static>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.await_result())
    }
}
