//! Orchestration tests with scripted, in-process helpers.
//!
//! The tokio clock is paused so timeouts resolve instantly and deterministically.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ssh_cert_keys::{
    CertEncoder, CertKeyError, CertKeyVerifier, ChildStatus, ConfigError, DeriveError,
    EncodeError, EncodedCertificate, ExitFuture, KeyDeriver, LaunchError, SshPublicKey,
    VerifierArgs, VerifierLauncher,
};
use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a scripted helper does when launched.
#[derive(Debug, Clone, Copy)]
enum Helper {
    /// Exits with the given status after a short delay.
    Exit(i32),
    /// Exits with the given status after the given delay.
    Slow(Duration, i32),
    /// Is killed by the given signal.
    Signal(i32),
    /// Never exits.
    Hang,
    /// Cannot be started.
    SpawnFails,
    /// Starts, but waiting on it fails.
    WaitFails,
}

#[derive(Debug, Default)]
struct Counters {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    dropped_unfinished: AtomicUsize,
}

/// Tracks a running scripted helper. Dropping it before `finish` marks the
/// helper as killed.
struct InFlight {
    counters: Arc<Counters>,
    finished: bool,
}

impl InFlight {
    fn new(counters: Arc<Counters>) -> Self {
        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self {
            counters,
            finished: false,
        }
    }

    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        if !self.finished {
            self.counters
                .dropped_unfinished
                .fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[derive(Debug, Clone, Default)]
struct ScriptedLauncher {
    script: Arc<Mutex<VecDeque<Helper>>>,
    launched: Arc<Mutex<Vec<VerifierArgs>>>,
    counters: Arc<Counters>,
}

impl ScriptedLauncher {
    fn new(script: impl IntoIterator<Item = Helper>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            ..Self::default()
        }
    }

    fn launched(&self) -> Vec<VerifierArgs> {
        self.launched.lock().unwrap().clone()
    }

    fn launched_certs(&self) -> Vec<Vec<u8>> {
        self.launched()
            .iter()
            .map(|args| STANDARD.decode(args.certificate().as_str()).unwrap())
            .collect()
    }

    fn max_in_flight(&self) -> usize {
        self.counters.max_in_flight.load(Ordering::SeqCst)
    }

    fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::SeqCst)
    }

    fn killed(&self) -> usize {
        self.counters.dropped_unfinished.load(Ordering::SeqCst)
    }
}

impl VerifierLauncher for ScriptedLauncher {
    fn launch(&self, args: &VerifierArgs) -> Result<ExitFuture, LaunchError> {
        self.launched.lock().unwrap().push(args.clone());
        let helper = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .expect("launched more helpers than scripted");

        if let Helper::SpawnFails = helper {
            return Err(LaunchError::Spawn {
                path: PathBuf::from("/scripted/helper"),
                source: io::Error::new(io::ErrorKind::NotFound, "no such helper"),
            });
        }

        let in_flight = InFlight::new(Arc::clone(&self.counters));
        Ok(Box::pin(async move {
            let result = match helper {
                Helper::Exit(code) => {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok(ChildStatus::Exited(code))
                }
                Helper::Slow(delay, code) => {
                    tokio::time::sleep(delay).await;
                    Ok(ChildStatus::Exited(code))
                }
                Helper::Signal(signal) => Ok(ChildStatus::Signaled(signal)),
                Helper::Hang => std::future::pending().await,
                Helper::WaitFails => Err(io::Error::other("wait failed")),
                Helper::SpawnFails => unreachable!(),
            };
            in_flight.finish();
            result
        }))
    }
}

/// Returns the decoded certificate bytes as the "key", and fails for
/// certificates starting with `bad`.
#[derive(Debug, Default)]
struct EchoDeriver;

impl KeyDeriver for EchoDeriver {
    fn derive(&self, cert: &EncodedCertificate) -> Result<SshPublicKey, DeriveError> {
        let der = STANDARD.decode(cert.as_str())?;
        if der.starts_with(b"bad") {
            return Err(DeriveError::UnsupportedAlgorithm("1.2.3.4".to_owned()));
        }
        Ok(SshPublicKey::from(der))
    }
}

fn verifier(launcher: &ScriptedLauncher) -> CertKeyVerifier {
    CertKeyVerifier::builder()
        .ca_db("/etc/pki/ca.pem")
        .launcher(launcher.clone())
        .key_deriver(EchoDeriver)
        .build()
}

fn key_bytes(keys: &ssh_cert_keys::VerifiedKeys) -> Vec<Option<Vec<u8>>> {
    keys.slots()
        .iter()
        .map(|slot| slot.key().map(|key| key.as_bytes().to_vec()))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn all_valid_certificates_yield_keys_in_order() {
    let launcher = ScriptedLauncher::new([Helper::Exit(0), Helper::Exit(0), Helper::Exit(0)]);
    let certs = [b"cert-a".to_vec(), b"cert-b".to_vec(), b"cert-c".to_vec()];

    let keys = verifier(&launcher).start(&certs).await_result().await.unwrap();

    assert_eq!(keys.valid_count(), 3);
    assert_eq!(
        key_bytes(&keys),
        [
            Some(b"cert-a".to_vec()),
            Some(b"cert-b".to_vec()),
            Some(b"cert-c".to_vec())
        ]
    );
    assert_eq!(launcher.launched_certs(), certs);
}

#[tokio::test(start_paused = true)]
async fn helpers_never_overlap() {
    let launcher = ScriptedLauncher::new([
        Helper::Slow(Duration::from_secs(3), 0),
        Helper::Slow(Duration::from_secs(1), 1),
        Helper::Slow(Duration::from_secs(2), 0),
    ]);

    let keys = verifier(&launcher)
        .start(&["one", "two", "six"])
        .await
        .unwrap();

    assert_eq!(keys.len(), 3);
    assert_eq!(launcher.max_in_flight(), 1);
    assert_eq!(launcher.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn rejected_certificate_only_empties_its_slot() {
    let launcher = ScriptedLauncher::new([Helper::Exit(0), Helper::Exit(1), Helper::Exit(0)]);

    let keys = verifier(&launcher)
        .start(&["first", "second", "third"])
        .await
        .unwrap();

    assert_eq!(keys.valid_count(), 2);
    assert_eq!(
        key_bytes(&keys),
        [Some(b"first".to_vec()), None, Some(b"third".to_vec())]
    );
    assert_eq!(launcher.launched().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn helper_killed_by_signal_counts_as_rejection() {
    let launcher = ScriptedLauncher::new([Helper::Signal(9), Helper::Exit(0)]);

    let keys = verifier(&launcher)
        .start(&["first", "second"])
        .await
        .unwrap();

    assert_eq!(keys.valid_count(), 1);
    assert_eq!(key_bytes(&keys), [None, Some(b"second".to_vec())]);
}

#[tokio::test(start_paused = true)]
async fn all_rejected_is_success_with_zero_keys() {
    let launcher = ScriptedLauncher::new([Helper::Exit(1), Helper::Exit(2)]);

    let keys = verifier(&launcher)
        .start(&["first", "second"])
        .await
        .unwrap();

    assert_eq!(keys.valid_count(), 0);
    assert_eq!(keys.len(), 2);
    assert_eq!(keys.keys().count(), 0);
}

#[tokio::test(start_paused = true)]
async fn derivation_failure_empties_the_slot_and_continues() {
    let launcher = ScriptedLauncher::new([Helper::Exit(0), Helper::Exit(0)]);

    let keys = verifier(&launcher)
        .start(&["bad-key", "good-key"])
        .await
        .unwrap();

    assert_eq!(keys.valid_count(), 1);
    assert_eq!(key_bytes(&keys), [None, Some(b"good-key".to_vec())]);
}

#[tokio::test(start_paused = true)]
async fn timeout_aborts_the_batch_and_kills_the_helper() {
    let launcher = ScriptedLauncher::new([Helper::Exit(0), Helper::Hang, Helper::Exit(0)]);
    let verifier = CertKeyVerifier::builder()
        .ca_db("/etc/pki/ca.pem")
        .timeout(Duration::from_secs(1))
        .launcher(launcher.clone())
        .key_deriver(EchoDeriver)
        .build();

    let started = tokio::time::Instant::now();
    let result = verifier.start(&["first", "second", "third"]).await;

    match result {
        Err(CertKeyError::VerifierTimeout {
            input_index,
            timeout,
        }) => {
            assert_eq!(input_index, 1);
            assert_eq!(timeout, Duration::from_secs(1));
        }
        other => panic!("expected a timeout, got {other:?}"),
    }
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert_eq!(launcher.launched_certs(), [b"first".to_vec(), b"second".to_vec()]);
    assert_eq!(launcher.killed(), 1);
    assert_eq!(launcher.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn helper_finishing_within_timeout_is_not_aborted() {
    let launcher = ScriptedLauncher::new([Helper::Slow(Duration::from_millis(1500), 0)]);
    let verifier = CertKeyVerifier::builder()
        .ca_db("/etc/pki/ca.pem")
        .timeout(Duration::from_secs(2))
        .launcher(launcher.clone())
        .key_deriver(EchoDeriver)
        .build();

    let keys = verifier.start(&["slow"]).await.unwrap();

    assert_eq!(keys.valid_count(), 1);
    assert_eq!(launcher.killed(), 0);
}

#[tokio::test(start_paused = true)]
async fn timeout_is_passed_to_the_helper() {
    let launcher = ScriptedLauncher::new([Helper::Exit(0)]);
    let verifier = CertKeyVerifier::builder()
        .ca_db("/etc/pki/ca.pem")
        .verify_options("no_ocsp")
        .timeout(Duration::from_secs(7))
        .launcher(launcher.clone())
        .key_deriver(EchoDeriver)
        .build();

    verifier.start(&["cert"]).await.unwrap();

    let args: Vec<String> = launcher.launched()[0]
        .iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        args,
        [
            "--timeout",
            "7",
            "--verification",
            "--verify",
            "no_ocsp",
            "--ca_db",
            "/etc/pki/ca.pem",
            "--certificate",
            STANDARD.encode(b"cert").as_str(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn launch_failure_aborts_the_batch() {
    let launcher = ScriptedLauncher::new([Helper::Exit(0), Helper::SpawnFails]);

    let result = verifier(&launcher)
        .start(&["first", "second", "third"])
        .await;

    assert!(matches!(
        result,
        Err(CertKeyError::Launch(LaunchError::Spawn { .. }))
    ));
    assert_eq!(launcher.launched().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn wait_failure_aborts_the_batch() {
    let launcher = ScriptedLauncher::new([Helper::WaitFails]);

    let result = verifier(&launcher).start(&["first", "second"]).await;

    assert!(matches!(
        result,
        Err(CertKeyError::Launch(LaunchError::Wait(_)))
    ));
    assert_eq!(launcher.launched().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn missing_ca_db_fails_before_looking_at_certificates() {
    let matched = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&matched);
    let launcher = ScriptedLauncher::new([]);
    let verifier = CertKeyVerifier::builder()
        .matcher(move |_: &[u8]| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        })
        .launcher(launcher.clone())
        .build();

    let handle = verifier.start(&["first"]);
    assert_eq!(handle.candidate_count(), None);

    let result = handle.await;
    assert!(matches!(
        result,
        Err(CertKeyError::Config(ConfigError::MissingCaDb))
    ));
    assert_eq!(matched.load(Ordering::SeqCst), 0);
    assert!(launcher.launched().is_empty());
}

#[tokio::test(start_paused = true)]
async fn empty_ca_db_path_is_missing() {
    let launcher = ScriptedLauncher::new([]);
    let verifier = CertKeyVerifier::builder()
        .ca_db("")
        .launcher(launcher.clone())
        .build();

    let result = verifier.start(&["first"]).await;
    assert!(matches!(
        result,
        Err(CertKeyError::Config(ConfigError::MissingCaDb))
    ));
}

#[derive(Debug)]
struct PoisonEncoder {
    calls: Arc<AtomicUsize>,
}

impl CertEncoder for PoisonEncoder {
    fn encode(&self, der: &[u8]) -> Result<String, EncodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if der == b"poison" {
            return Err(EncodeError::Other("poisoned certificate".to_owned()));
        }
        Ok(STANDARD.encode(der))
    }
}

#[tokio::test(start_paused = true)]
async fn encoding_failure_aborts_before_any_launch() {
    let calls = Arc::new(AtomicUsize::new(0));
    let launcher = ScriptedLauncher::new([Helper::Exit(0), Helper::Exit(0), Helper::Exit(0)]);
    let verifier = CertKeyVerifier::builder()
        .ca_db("/etc/pki/ca.pem")
        .encoder(PoisonEncoder {
            calls: Arc::clone(&calls),
        })
        .launcher(launcher.clone())
        .key_deriver(EchoDeriver)
        .build();

    let result = verifier.start(&["first", "poison", "third"]).await;

    match result {
        Err(CertKeyError::Encoding {
            input_index,
            source,
        }) => {
            assert_eq!(input_index, 1);
            assert_eq!(source, EncodeError::Other("poisoned certificate".to_owned()));
        }
        other => panic!("expected an encoding error, got {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(launcher.launched().is_empty());
}

#[tokio::test(start_paused = true)]
async fn empty_certificate_fails_default_encoding() {
    let launcher = ScriptedLauncher::new([]);

    let result = verifier(&launcher).start(&[""]).await;

    assert!(matches!(
        result,
        Err(CertKeyError::Encoding {
            input_index: 0,
            source: EncodeError::Empty
        })
    ));
}

#[tokio::test(start_paused = true)]
async fn nothing_matching_yields_empty_result_without_launching() {
    let launcher = ScriptedLauncher::new([]);
    let verifier = CertKeyVerifier::builder()
        .ca_db("/etc/pki/ca.pem")
        .matcher(|_: &[u8]| false)
        .launcher(launcher.clone())
        .build();

    let handle = verifier.start(&["first", "second"]);
    assert_eq!(handle.candidate_count(), Some(0));

    let keys = handle.await.unwrap();
    assert!(keys.is_empty());
    assert_eq!(keys.valid_count(), 0);
    assert!(launcher.launched().is_empty());
}

#[tokio::test(start_paused = true)]
async fn empty_input_yields_empty_result() {
    let launcher = ScriptedLauncher::new([]);
    let certs: [&[u8]; 0] = [];

    let keys = verifier(&launcher).start(&certs).await.unwrap();

    assert!(keys.is_empty());
    assert!(launcher.launched().is_empty());
}

#[tokio::test(start_paused = true)]
async fn slots_record_input_positions_after_filtering() {
    let launcher = ScriptedLauncher::new([Helper::Exit(0), Helper::Exit(1)]);
    let verifier = CertKeyVerifier::builder()
        .ca_db("/etc/pki/ca.pem")
        .matcher(|der: &[u8]| der.starts_with(b"keep"))
        .launcher(launcher.clone())
        .key_deriver(EchoDeriver)
        .build();

    let handle = verifier.start(&["skip-0", "keep-1", "skip-2", "keep-3"]);
    assert_eq!(handle.candidate_count(), Some(2));

    let keys = handle.await.unwrap();
    let positions: Vec<usize> = keys.slots().iter().map(|slot| slot.input_index()).collect();
    assert_eq!(positions, [1, 3]);
    assert_eq!(key_bytes(&keys), [Some(b"keep-1".to_vec()), None]);
    assert_eq!(launcher.launched_certs(), [b"keep-1".to_vec(), b"keep-3".to_vec()]);

    let slots = keys.into_slots();
    assert_eq!(slots.len(), 2);
    assert_eq!(slots[1].input_index(), 3);
}

#[tokio::test(start_paused = true)]
async fn timeout_reports_the_input_position_of_the_hung_certificate() {
    let launcher = ScriptedLauncher::new([Helper::Hang]);
    let verifier = CertKeyVerifier::builder()
        .ca_db("/etc/pki/ca.pem")
        .timeout(Duration::from_secs(1))
        .matcher(|der: &[u8]| der != b"skip")
        .launcher(launcher.clone())
        .key_deriver(EchoDeriver)
        .build();

    let result = verifier.start(&["skip", "hangs"]).await;

    match result {
        Err(CertKeyError::VerifierTimeout { input_index, .. }) => assert_eq!(input_index, 1),
        other => panic!("expected a timeout, got {other:?}"),
    }
    assert_eq!(launcher.launched_certs(), [b"hangs".to_vec()]);
    assert_eq!(launcher.killed(), 1);
}

#[tokio::test(start_paused = true)]
async fn helper_exiting_as_the_timeout_expires_is_not_aborted() {
    let launcher = ScriptedLauncher::new([Helper::Slow(Duration::from_secs(1), 0)]);
    let verifier = CertKeyVerifier::builder()
        .ca_db("/etc/pki/ca.pem")
        .timeout(Duration::from_secs(1))
        .launcher(launcher.clone())
        .key_deriver(EchoDeriver)
        .build();

    let keys = verifier.start(&["on-time"]).await.unwrap();

    assert_eq!(keys.valid_count(), 1);
    assert_eq!(launcher.killed(), 0);
}

#[tokio::test(start_paused = true)]
async fn nothing_runs_until_the_handle_is_awaited() {
    let launcher = ScriptedLauncher::new([Helper::Exit(0)]);

    let handle = verifier(&launcher).start(&["first"]);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(launcher.launched().is_empty());

    drop(handle);
    assert!(launcher.launched().is_empty());
}

#[tokio::test(start_paused = true)]
async fn abandoning_a_run_kills_the_running_helper() {
    let launcher = ScriptedLauncher::new([Helper::Hang]);

    let handle = verifier(&launcher).start(&["first"]);
    let outcome = tokio::time::timeout(Duration::from_secs(30), handle.await_result()).await;

    assert!(outcome.is_err());
    assert_eq!(launcher.killed(), 1);
    assert_eq!(launcher.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn runs_from_one_verifier_are_independent() {
    let launcher = ScriptedLauncher::new([Helper::Exit(0), Helper::Exit(1)]);
    let verifier = verifier(&launcher);

    let first = verifier.start(&["first"]).await.unwrap();
    let second = verifier.clone().start(&["second"]).await.unwrap();

    assert_eq!(first.valid_count(), 1);
    assert_eq!(second.valid_count(), 0);
    assert_eq!(second.slots()[0].input_index(), 0);
}
