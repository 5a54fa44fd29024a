use crate::error::{CertKeyError, LaunchError};
use crate::launcher::ChildStatus;
use crate::verifier::keys::VerifiedKeys;
use std::time::Duration;

/// Progress of a run.
///
/// `Pending(i)` means candidate `i` is next to be verified; it equals the
/// number of slots already written. `Pending(candidate_count)` is the last
/// non-terminal state and always moves to `Done`.
#[derive(Debug)]
pub(crate) enum RunState {
    Pending(usize),
    Done(VerifiedKeys),
    Failed(CertKeyError),
}

/// How the verification of one candidate ended.
///
/// Produced exactly once per launched helper: whichever of exit and timeout
/// happens first wins and the other is discarded.
#[derive(Debug)]
pub(crate) enum Completion {
    Exited(ChildStatus),
    TimedOut(Duration),
    LaunchFailed(LaunchError),
}
