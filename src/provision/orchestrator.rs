//! Audio Routing Orchestrator: runs one provisioning attempt end to end.
//!
//! [`Provisioner`] owns the [`ProvisionPhase`] and everything an attempt
//! needs: the [`Shell`] (executor + sink), the executable lookup, the
//! detected package profile and the install-consent prompt.
//!
//! # Attempt flow
//!
//! ```text
//! provision() / start()
//!   └─ claim: Idle|Done|Failed → CheckingDependencies   (else AlreadyRunning)
//!        ├─ probe required executables
//!        │    └─ missing → [no family → MissingDependencies]
//!        │                 ask user  → [no → InstallDeclined]
//!        │                 install   → [fail → InstallFailed | ok → RestartRequired]
//!        ├─ load-module null-sink VirtualMic                    (strict)
//!        ├─ list short sources → "<VirtualMic>.monitor" field[1] (else MonitorNotFound)
//!        ├─ load-module null-sink VirtualMicLoopback            (strict)
//!        ├─ load-module loopback monitor → VirtualMicLoopback   (strict)
//!        ├─ pgrep -x app || spawn app
//!        ├─ ≤ N × list sink-inputs short, pause between polls   (soft miss)
//!        ├─ move-sink-input id VirtualMic                        (best-effort)
//!        └─ report instructions
//!   └─ release: phase = Done|Failed, controls re-enabled      (every path)
//! ```
//!
//! All of this blocks; [`Provisioner::start`] runs it on a dedicated
//! `vmic-provision` thread so the UI thread never waits on a process.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use thiserror::Error;

use super::state::ProvisionPhase;
use crate::command::{CommandError, CommandExecutor, RunMode, Shell};
use crate::config::AppConfig;
use crate::install::install_packages;
use crate::notify::{InstallConsent, NotificationSink};
use crate::pactl::{self, PRIMARY_SINK, SECONDARY_SINK};
use crate::probe::{probe, required_executables, ExecutableLookup, HostPackageProfile};

// ---------------------------------------------------------------------------
// ProvisionError
// ---------------------------------------------------------------------------

/// Why an attempt did not complete.
///
/// Every variant is terminal for the current attempt only; nothing already
/// created on the audio server is rolled back.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Another attempt is in flight.
    #[error("already going")]
    AlreadyRunning,

    /// Required programs are missing and no supported package manager exists.
    #[error("missing {} and no supported package manager to install them", .missing.join(", "))]
    MissingDependencies { missing: Vec<String> },

    /// The user declined installing the missing packages.
    #[error("install declined, aborted by user")]
    InstallDeclined,

    /// The package manager's install step failed.
    #[error("install failed, bailing")]
    InstallFailed,

    /// Packages were installed; a fresh attempt is needed to pick them up.
    #[error("installation complete, rerun to continue")]
    RestartRequired,

    /// A strict audio-server or launcher command failed.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The primary sink's monitor did not show up in the source list.
    #[error("no monitor source for {sink}")]
    MonitorNotFound { sink: String },

    /// The attempt panicked.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

// ---------------------------------------------------------------------------
// ProvisionReport
// ---------------------------------------------------------------------------

/// What happened to the TTS app's stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamBinding {
    /// The stream was moved onto the primary sink.
    Moved { stream_id: String },
    /// The stream was found but `move-sink-input` failed.
    MoveFailed { stream_id: String },
    /// No matching stream after `probes` polls; the user must route it by hand.
    NotFound { probes: u32 },
}

/// Result of a completed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    /// Monitor source of the primary sink, fed into the loopback.
    pub monitor_source: String,
    pub stream: StreamBinding,
}

impl ProvisionReport {
    /// The input device the user should select in their recording app.
    pub fn input_device(&self) -> String {
        format!("Monitor of {SECONDARY_SINK}")
    }
}

// ---------------------------------------------------------------------------
// Provisioner
// ---------------------------------------------------------------------------

struct Inner {
    phase: Mutex<ProvisionPhase>,
    shell: Shell,
    sink: Arc<dyn NotificationSink>,
    consent: Arc<dyn InstallConsent>,
    lookup: Arc<dyn ExecutableLookup>,
    profile: Option<HostPackageProfile>,
    config: AppConfig,
}

/// Drives provisioning attempts.  Cheap to clone; clones share one phase.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use vmic_provision::command::SystemExecutor;
/// use vmic_provision::config::AppConfig;
/// use vmic_provision::notify::ChannelSink;
/// use vmic_provision::probe::{HostPackageProfile, PathLookup};
/// use vmic_provision::provision::Provisioner;
///
/// let (sink, _events) = ChannelSink::channel();
/// let sink = Arc::new(sink);
/// let provisioner = Provisioner::new(
///     AppConfig::default(),
///     HostPackageProfile::detect(&PathLookup),
///     Arc::new(SystemExecutor),
///     Arc::new(PathLookup),
///     sink.clone(),
///     sink,
/// );
/// let handle = provisioner.start().expect("idle");
/// let _ = handle.join();
/// ```
#[derive(Clone)]
pub struct Provisioner {
    inner: Arc<Inner>,
}

impl Provisioner {
    /// Create a new provisioner.
    ///
    /// # Arguments
    ///
    /// * `config`: TTS app name, polling policy, elevation program.
    /// * `profile`: detected package family; `None` disables installation.
    /// * `executor`: runs `pactl`, `pgrep`, the package manager, the app.
    /// * `lookup`: answers "is this program on `$PATH`?".
    /// * `sink`: receives log lines and the controls signal.
    /// * `consent`: asked before installing anything.
    pub fn new(
        config: AppConfig,
        profile: Option<HostPackageProfile>,
        executor: Arc<dyn CommandExecutor>,
        lookup: Arc<dyn ExecutableLookup>,
        sink: Arc<dyn NotificationSink>,
        consent: Arc<dyn InstallConsent>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                phase: Mutex::new(ProvisionPhase::Idle),
                shell: Shell::new(executor, Arc::clone(&sink)),
                sink,
                consent,
                lookup,
                profile,
                config,
            }),
        }
    }

    /// Current phase of the running (or last) attempt.
    pub fn phase(&self) -> ProvisionPhase {
        *self.lock_phase()
    }

    /// `true` while an attempt is in flight.
    pub fn is_running(&self) -> bool {
        self.phase().is_busy()
    }

    /// The package profile detected at startup.
    pub fn profile(&self) -> Option<&HostPackageProfile> {
        self.inner.profile.as_ref()
    }

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    /// Run one attempt on the calling thread.
    ///
    /// Blocks until the attempt finishes.  On return, whatever the outcome,
    /// [`is_running`](Self::is_running) is `false` (unless another attempt
    /// was already running, in which case that one is untouched).
    pub fn provision(&self) -> Result<ProvisionReport, ProvisionError> {
        self.claim()?;
        self.run_claimed()
    }

    /// Run one attempt on a dedicated worker thread.
    ///
    /// The exclusivity check happens here, on the caller's thread, so a
    /// second `start` while the first is in flight is rejected immediately.
    pub fn start(&self) -> Result<JoinHandle<Result<ProvisionReport, ProvisionError>>, ProvisionError> {
        self.claim()?;

        let this = self.clone();
        std::thread::Builder::new()
            .name("vmic-provision".into())
            .spawn(move || this.run_claimed())
            .map_err(|e| {
                let err = ProvisionError::Unexpected(format!("cannot start worker thread: {e}"));
                self.release(Some(&err));
                err
            })
    }

    // -----------------------------------------------------------------------
    // Claim / release
    // -----------------------------------------------------------------------

    /// Move a resting phase to `CheckingDependencies` in one critical section.
    fn claim(&self) -> Result<(), ProvisionError> {
        {
            let mut phase = self.lock_phase();
            if phase.is_busy() {
                drop(phase);
                self.inner.sink.log("already going");
                return Err(ProvisionError::AlreadyRunning);
            }
            *phase = ProvisionPhase::CheckingDependencies;
        }
        self.inner.sink.set_controls_enabled(false);
        self.inner.sink.log("booting...");
        log::info!("provision: attempt started");
        Ok(())
    }

    /// Run the claimed attempt, catching panics, and always release.
    fn run_claimed(&self) -> Result<ProvisionReport, ProvisionError> {
        let result = match panic::catch_unwind(AssertUnwindSafe(|| self.run_steps())) {
            Ok(result) => result,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(ProvisionError::Unexpected(message))
            }
        };
        self.release(result.as_ref().err());
        result
    }

    /// End the attempt: `Done` without an error, `Failed` with one.
    fn release(&self, error: Option<&ProvisionError>) {
        let next = match error {
            None => ProvisionPhase::Done,
            Some(e) => {
                self.inner.sink.log(&e.to_string());
                log::warn!("provision: attempt failed in {}: {e}", self.phase());
                ProvisionPhase::Failed
            }
        };
        *self.lock_phase() = next;
        self.inner.sink.set_controls_enabled(true);
        log::info!("provision: attempt finished ({next})");
    }

    fn lock_phase(&self) -> MutexGuard<'_, ProvisionPhase> {
        self.inner
            .phase
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn enter(&self, phase: ProvisionPhase) {
        log::debug!("provision: → {phase}");
        *self.lock_phase() = phase;
    }

    // -----------------------------------------------------------------------
    // Steps
    // -----------------------------------------------------------------------

    fn run_steps(&self) -> Result<ProvisionReport, ProvisionError> {
        let shell = &self.inner.shell;
        let config = &self.inner.config;

        self.check_dependencies()?;

        self.enter(ProvisionPhase::CreatingPrimarySink);
        shell.run(&pactl::load_null_sink(PRIMARY_SINK), RunMode::Strict)?;

        self.enter(ProvisionPhase::DiscoveringMonitorSource);
        let sources = shell
            .run(&pactl::list_sources(), RunMode::Strict)?
            .unwrap_or_default();
        let monitor_source = pactl::parse_monitor_source(&sources, PRIMARY_SINK).ok_or_else(|| {
            ProvisionError::MonitorNotFound {
                sink: PRIMARY_SINK.to_string(),
            }
        })?;

        self.enter(ProvisionPhase::CreatingSecondarySinkAndLoopback);
        shell.run(&pactl::load_null_sink(SECONDARY_SINK), RunMode::Strict)?;
        shell.run(
            &pactl::load_loopback(
                &monitor_source,
                SECONDARY_SINK,
                config.audio.loopback_latency_msec,
            ),
            RunMode::Strict,
        )?;

        self.enter(ProvisionPhase::LaunchingOrConfirmingTtsApp);
        self.ensure_tts_running()?;

        self.enter(ProvisionPhase::DiscoveringTtsStream);
        let stream = match self.discover_stream() {
            Ok(stream_id) => {
                self.enter(ProvisionPhase::RebindingStream);
                self.rebind(stream_id)
            }
            Err(probes) => {
                self.inner.sink.log(&format!(
                    "can't find {} stream, route it with {}",
                    config.tts.app, config.audio.mixer_hint
                ));
                StreamBinding::NotFound { probes }
            }
        };

        let report = ProvisionReport {
            monitor_source,
            stream,
        };
        self.inner.sink.log("all set.");
        self.inner
            .sink
            .log(&format!("set input to: {}", report.input_device()));
        Ok(report)
    }

    /// Probe, and if needed offer installation.  `Ok` means nothing missing.
    fn check_dependencies(&self) -> Result<(), ProvisionError> {
        let inner = &self.inner;
        let required = required_executables(&inner.config.tts.app);
        let plan = probe(inner.lookup.as_ref(), inner.profile.as_ref(), &required);
        if plan.is_empty() {
            return Ok(());
        }

        inner
            .sink
            .log(&format!("missing cmds: {}", plan.missing.join(", ")));

        let Some(profile) = &inner.profile else {
            return Err(ProvisionError::MissingDependencies {
                missing: plan.missing,
            });
        };

        self.enter(ProvisionPhase::AwaitingInstallDecision);
        if !inner.consent.confirm_install(&plan.packages) {
            return Err(ProvisionError::InstallDeclined);
        }

        self.enter(ProvisionPhase::Installing);
        let installed = install_packages(
            &inner.shell,
            Some(profile.family()),
            &inner.config.install.elevate_with,
            &plan.packages,
        );
        if installed {
            Err(ProvisionError::RestartRequired)
        } else {
            Err(ProvisionError::InstallFailed)
        }
    }

    /// `pgrep -x app`, launching the app detached when it is not running.
    fn ensure_tts_running(&self) -> Result<(), ProvisionError> {
        let app = self.inner.config.tts.app.as_str();
        let found = self
            .inner
            .shell
            .run(&["pgrep", "-x", app], RunMode::BestEffort)?;

        if found.is_some() {
            self.inner.sink.log(&format!("{app} up"));
        } else {
            self.inner.shell.spawn_detached(&[app])?;
            self.inner.sink.log(&format!("started {app}"));
        }
        Ok(())
    }

    /// Poll the sink-input list for the TTS app.
    ///
    /// Returns the stream id, or the number of probes spent when the bound
    /// was exhausted.
    fn discover_stream(&self) -> Result<String, u32> {
        let discovery = &self.inner.config.discovery;
        let app = &self.inner.config.tts.app;

        for attempt in 1..=discovery.attempts {
            let listing = self
                .inner
                .shell
                .run(&pactl::list_sink_inputs(), RunMode::BestEffort)
                .ok()
                .flatten()
                .unwrap_or_default();

            if let Some(id) = pactl::parse_stream_id(&listing, app) {
                log::debug!("provision: {app} stream {id} found on probe {attempt}");
                return Ok(id);
            }
            if attempt < discovery.attempts {
                std::thread::sleep(discovery.interval());
            }
        }
        Err(discovery.attempts)
    }

    /// Move the stream onto the primary sink.  Failure is logged only.
    fn rebind(&self, stream_id: String) -> StreamBinding {
        self.inner.sink.log(&format!(
            "moving {} stream {stream_id} to {PRIMARY_SINK}",
            self.inner.config.tts.app
        ));
        match self.inner.shell.run(
            &pactl::move_sink_input(&stream_id, PRIMARY_SINK),
            RunMode::BestEffort,
        ) {
            Ok(Some(_)) => StreamBinding::Moved { stream_id },
            _ => StreamBinding::MoveFailed { stream_id },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandResult, MockExecutor, Reply};
    use crate::notify::{FixedConsent, RecordingSink};
    use crate::probe::{FakeLookup, PackageFamily, REQUIRED_EXECUTABLES};

    const SOURCES: &str = "\
0\talsa_output.pci-0000_00_1f.3.analog-stereo.monitor\tmodule-alsa-card.c\ts16le 2ch 44100Hz\tSUSPENDED
57\tVirtualMic.monitor\tmodule-null-sink.c\ts16le 2ch 44100Hz\tIDLE
";
    const SINK_INPUTS: &str = "42 gespeaker 1000 protocol-native.c s16le 1ch 22050Hz";

    struct Harness {
        provisioner: Provisioner,
        exec: Arc<MockExecutor>,
        sink: Arc<RecordingSink>,
        consent: Arc<FixedConsent>,
    }

    fn fast_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.discovery.interval_ms = 0;
        config
    }

    fn harness_with(
        exec: MockExecutor,
        present: &[&str],
        family: Option<PackageFamily>,
        answer: bool,
    ) -> Harness {
        let exec = Arc::new(exec);
        let sink = Arc::new(RecordingSink::default());
        let consent = Arc::new(FixedConsent::new(answer));
        let profile = family.map(|f| HostPackageProfile::for_family(f, &REQUIRED_EXECUTABLES));
        let provisioner = Provisioner::new(
            fast_config(),
            profile,
            exec.clone(),
            Arc::new(FakeLookup::with(present)),
            sink.clone(),
            consent.clone(),
        );
        Harness {
            provisioner,
            exec,
            sink,
            consent,
        }
    }

    /// Everything installed, apt host, server answers as expected.
    fn happy_executor() -> MockExecutor {
        MockExecutor::new()
            .on(&["pactl", "list", "short", "sources"], Reply::ok(SOURCES))
            .on(&["pactl", "list", "sink-inputs"], Reply::ok(SINK_INPUTS))
            .on(&["pactl", "load-module"], Reply::ok("536870913"))
            .on(&["pactl", "move-sink-input"], Reply::ok(""))
            .on(&["pgrep"], Reply::ok("4242"))
    }

    fn pactl_calls(exec: &MockExecutor) -> usize {
        exec.count("pactl")
    }

    fn assert_released(h: &Harness) {
        assert!(!h.provisioner.is_running());
        assert_eq!(h.sink.controls().last(), Some(&true));
    }

    // -----------------------------------------------------------------------
    // Success paths
    // -----------------------------------------------------------------------

    #[test]
    fn full_attempt_wires_devices_in_order() {
        let h = harness_with(
            happy_executor(),
            &REQUIRED_EXECUTABLES,
            Some(PackageFamily::Apt),
            true,
        );

        let report = h.provisioner.provision().unwrap();

        assert_eq!(report.monitor_source, "VirtualMic.monitor");
        assert_eq!(
            report.stream,
            StreamBinding::Moved {
                stream_id: "42".into()
            }
        );
        assert_eq!(
            h.exec.calls(),
            vec![
                "pactl load-module module-null-sink sink_name=VirtualMic sink_properties=device.description=VirtualMic",
                "pactl list short sources",
                "pactl load-module module-null-sink sink_name=VirtualMicLoopback sink_properties=device.description=VirtualMicLoopback",
                "pactl load-module module-loopback source=VirtualMic.monitor sink=VirtualMicLoopback latency_msec=1",
                "pgrep -x gespeaker",
                "pactl list sink-inputs short",
                "pactl move-sink-input 42 VirtualMic",
            ]
        );
        assert!(h.exec.spawned().is_empty());
        assert!(h.sink.saw("gespeaker up"));
        assert!(h.sink.saw("set input to: Monitor of VirtualMicLoopback"));
        assert_eq!(h.consent.times_asked(), 0);
        assert_eq!(h.provisioner.phase(), ProvisionPhase::Done);
        assert_eq!(h.sink.controls(), vec![false, true]);
    }

    #[test]
    fn tts_app_is_launched_when_not_running() {
        let exec = MockExecutor::new()
            .on(&["pgrep"], Reply::fail(1, ""))
            .on(&["pactl", "list", "short", "sources"], Reply::ok(SOURCES))
            .on(&["pactl", "list", "sink-inputs"], Reply::ok(SINK_INPUTS));
        let h = harness_with(exec, &REQUIRED_EXECUTABLES, Some(PackageFamily::Apt), true);

        h.provisioner.provision().unwrap();

        assert_eq!(h.exec.spawned(), vec!["gespeaker"]);
        assert!(h.sink.saw("started gespeaker"));
    }

    #[test]
    fn stream_found_after_a_few_polls() {
        let exec = MockExecutor::new()
            .on(&["pactl", "list", "short", "sources"], Reply::ok(SOURCES))
            .on_seq(
                &["pactl", "list", "sink-inputs"],
                vec![Reply::ok(""), Reply::fail(1, "Connection failure"), Reply::ok(SINK_INPUTS)],
            );
        let h = harness_with(exec, &REQUIRED_EXECUTABLES, Some(PackageFamily::Apt), true);

        let report = h.provisioner.provision().unwrap();

        assert_eq!(h.exec.count("pactl list sink-inputs"), 3);
        assert!(matches!(report.stream, StreamBinding::Moved { .. }));
    }

    #[test]
    fn stream_never_found_is_a_soft_miss_after_ten_probes() {
        let exec = MockExecutor::new()
            .on(&["pactl", "list", "short", "sources"], Reply::ok(SOURCES))
            .on(&["pactl", "list", "sink-inputs"], Reply::ok("88\t71\t87\tPipeWire\tfloat32le 2ch 48000Hz"));
        let h = harness_with(exec, &REQUIRED_EXECUTABLES, Some(PackageFamily::Apt), true);

        let report = h.provisioner.provision().unwrap();

        assert_eq!(report.stream, StreamBinding::NotFound { probes: 10 });
        assert_eq!(h.exec.count("pactl list sink-inputs"), 10);
        assert_eq!(h.exec.count("pactl move-sink-input"), 0);
        assert!(h.sink.saw("pavucontrol"));
        assert!(h.sink.saw("all set."));
        assert_eq!(h.provisioner.phase(), ProvisionPhase::Done);
        assert_released(&h);
    }

    #[test]
    fn failed_move_does_not_fail_the_attempt() {
        let exec = MockExecutor::new()
            .on(&["pactl", "list", "short", "sources"], Reply::ok(SOURCES))
            .on(&["pactl", "list", "sink-inputs"], Reply::ok(SINK_INPUTS))
            .on(&["pactl", "move-sink-input"], Reply::fail(1, "Failure: No such entity"));
        let h = harness_with(exec, &REQUIRED_EXECUTABLES, Some(PackageFamily::Apt), true);

        let report = h.provisioner.provision().unwrap();

        assert_eq!(
            report.stream,
            StreamBinding::MoveFailed {
                stream_id: "42".into()
            }
        );
        assert!(h.sink.saw("all set."));
    }

    #[test]
    fn no_package_manager_with_nothing_missing_still_provisions() {
        let h = harness_with(happy_executor(), &REQUIRED_EXECUTABLES, None, true);
        assert!(h.provisioner.provision().is_ok());
    }

    #[test]
    fn configured_tts_app_is_used_throughout() {
        let exec = MockExecutor::new()
            .on(&["pactl", "list", "short", "sources"], Reply::ok(SOURCES))
            .on(&["pactl", "list", "sink-inputs"], Reply::ok("9 0 3 protocol-native.c espeak-ng"));
        let exec = Arc::new(exec);
        let sink = Arc::new(RecordingSink::default());
        let mut config = fast_config();
        config.tts.app = "espeak-ng".into();
        let present = ["pactl", "grep", "awk", "espeak-ng", "pgrep", "sleep"];

        let provisioner = Provisioner::new(
            config,
            None,
            exec.clone(),
            Arc::new(FakeLookup::with(&present)),
            sink.clone(),
            Arc::new(FixedConsent::new(false)),
        );
        let report = provisioner.provision().unwrap();

        assert_eq!(exec.count("pgrep -x espeak-ng"), 1);
        assert_eq!(
            report.stream,
            StreamBinding::Moved {
                stream_id: "9".into()
            }
        );
    }

    // -----------------------------------------------------------------------
    // Dependency / install paths
    // -----------------------------------------------------------------------

    #[test]
    fn missing_without_package_manager_never_prompts() {
        let h = harness_with(happy_executor(), &["grep", "sleep"], None, true);

        let err = h.provisioner.provision().unwrap_err();

        assert!(matches!(
            err,
            ProvisionError::MissingDependencies { ref missing } if missing == &["pactl", "awk", "gespeaker", "pgrep"]
        ));
        assert_eq!(h.consent.times_asked(), 0);
        assert!(h.exec.calls().is_empty());
        assert_eq!(h.provisioner.phase(), ProvisionPhase::Failed);
        assert_released(&h);
    }

    #[test]
    fn declining_install_touches_nothing() {
        let h = harness_with(happy_executor(), &["grep"], Some(PackageFamily::Apt), false);

        let err = h.provisioner.provision().unwrap_err();

        assert!(matches!(err, ProvisionError::InstallDeclined));
        assert_eq!(h.consent.times_asked(), 1);
        assert!(h.exec.calls().is_empty());
        assert!(h.sink.saw("aborted by user"));
        assert_released(&h);
    }

    #[test]
    fn successful_install_asks_for_a_rerun_and_stops() {
        let h = harness_with(happy_executor(), &["grep", "awk", "sleep"], Some(PackageFamily::Apt), true);

        let err = h.provisioner.provision().unwrap_err();

        assert!(matches!(err, ProvisionError::RestartRequired));
        assert_eq!(
            h.exec.calls(),
            vec![
                "sudo apt update",
                "sudo apt install -y pulseaudio-utils gespeaker procps",
            ]
        );
        assert_eq!(pactl_calls(&h.exec), 0);
        assert!(h.sink.saw("rerun to continue"));
        assert_released(&h);
    }

    #[test]
    fn failed_install_fails_the_attempt() {
        let exec = happy_executor().on(&["sudo", "pacman", "-S"], Reply::fail(1, "error: target not found"));
        let h = harness_with(exec, &["pactl", "grep", "awk", "pgrep", "sleep"], Some(PackageFamily::Pacman), true);

        let err = h.provisioner.provision().unwrap_err();

        assert!(matches!(err, ProvisionError::InstallFailed));
        assert_eq!(pactl_calls(&h.exec), 0);
        assert_released(&h);
    }

    // -----------------------------------------------------------------------
    // Audio-server failures
    // -----------------------------------------------------------------------

    #[test]
    fn primary_sink_failure_aborts_immediately() {
        let exec = MockExecutor::new().on(
            &["pactl", "load-module"],
            Reply::fail(1, "Failure: Module initialization failed"),
        );
        let h = harness_with(exec, &REQUIRED_EXECUTABLES, Some(PackageFamily::Apt), true);

        let err = h.provisioner.provision().unwrap_err();

        assert!(matches!(err, ProvisionError::Command(CommandError::Failed { .. })));
        assert_eq!(h.exec.calls().len(), 1);
        assert!(h.sink.saw("Module initialization failed"));
        assert_eq!(h.provisioner.phase(), ProvisionPhase::Failed);
        assert_released(&h);
    }

    #[test]
    fn missing_monitor_is_fatal() {
        let exec = MockExecutor::new().on(
            &["pactl", "list", "short", "sources"],
            Reply::ok("0\talsa_input.analog\tmodule-alsa-card.c\ts16le 2ch 44100Hz\tSUSPENDED"),
        );
        let h = harness_with(exec, &REQUIRED_EXECUTABLES, Some(PackageFamily::Apt), true);

        let err = h.provisioner.provision().unwrap_err();

        assert!(matches!(err, ProvisionError::MonitorNotFound { ref sink } if sink == "VirtualMic"));
        assert_eq!(h.exec.count("pactl load-module module-loopback"), 0);
        assert!(h.sink.saw("no monitor source for VirtualMic"));
        assert_released(&h);
    }

    #[test]
    fn launch_failure_is_fatal() {
        struct NoSpawn(MockExecutor);
        impl CommandExecutor for NoSpawn {
            fn execute(&self, argv: &[String]) -> std::io::Result<CommandResult> {
                self.0.execute(argv)
            }
            fn spawn_detached(&self, _argv: &[String]) -> std::io::Result<()> {
                Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"))
            }
        }

        let exec = MockExecutor::new()
            .on(&["pgrep"], Reply::fail(1, ""))
            .on(&["pactl", "list", "short", "sources"], Reply::ok(SOURCES));
        let sink = Arc::new(RecordingSink::default());
        let provisioner = Provisioner::new(
            fast_config(),
            None,
            Arc::new(NoSpawn(exec)),
            Arc::new(FakeLookup::with(&REQUIRED_EXECUTABLES)),
            sink.clone(),
            Arc::new(FixedConsent::new(true)),
        );

        let err = provisioner.provision().unwrap_err();

        assert!(matches!(err, ProvisionError::Command(CommandError::Spawn { .. })));
        assert!(!provisioner.is_running());
    }

    // -----------------------------------------------------------------------
    // Exclusivity and panics
    // -----------------------------------------------------------------------

    #[test]
    fn second_request_while_running_is_rejected() {
        let h = harness_with(happy_executor(), &REQUIRED_EXECUTABLES, Some(PackageFamily::Apt), true);

        h.provisioner.claim().unwrap();
        assert!(h.provisioner.is_running());

        assert!(matches!(h.provisioner.provision(), Err(ProvisionError::AlreadyRunning)));
        assert!(matches!(h.provisioner.start(), Err(ProvisionError::AlreadyRunning)));
        assert!(h.exec.calls().is_empty());
        assert!(h.sink.saw("already going"));
        // The rejected requests leave the in-flight attempt alone.
        assert_eq!(h.provisioner.phase(), ProvisionPhase::CheckingDependencies);

        assert!(h.provisioner.run_claimed().is_ok());
        assert_released(&h);
    }

    #[test]
    fn panic_inside_attempt_is_reported_and_released() {
        struct Exploding;
        impl CommandExecutor for Exploding {
            fn execute(&self, _argv: &[String]) -> std::io::Result<CommandResult> {
                panic!("pactl went sideways");
            }
            fn spawn_detached(&self, _argv: &[String]) -> std::io::Result<()> {
                Ok(())
            }
        }

        let sink = Arc::new(RecordingSink::default());
        let provisioner = Provisioner::new(
            fast_config(),
            None,
            Arc::new(Exploding),
            Arc::new(FakeLookup::with(&REQUIRED_EXECUTABLES)),
            sink.clone(),
            Arc::new(FixedConsent::new(true)),
        );

        let err = provisioner.provision().unwrap_err();

        assert!(matches!(err, ProvisionError::Unexpected(ref m) if m == "pactl went sideways"));
        assert!(!provisioner.is_running());
        assert_eq!(provisioner.phase(), ProvisionPhase::Failed);
        assert_eq!(sink.controls(), vec![false, true]);
        assert!(sink.saw("unexpected error: pactl went sideways"));
    }

    #[test]
    fn attempt_can_be_retried_after_failure() {
        let exec = MockExecutor::new()
            .on_seq(
                &["pactl", "list", "short", "sources"],
                vec![Reply::ok(""), Reply::ok(SOURCES)],
            )
            .on(&["pactl", "list", "sink-inputs"], Reply::ok(SINK_INPUTS));
        let h = harness_with(exec, &REQUIRED_EXECUTABLES, Some(PackageFamily::Apt), true);

        assert!(h.provisioner.provision().is_err());
        assert!(h.provisioner.provision().is_ok());
        assert_eq!(h.sink.controls(), vec![false, true, false, true]);
    }

    #[test]
    fn start_runs_on_a_worker_thread() {
        let h = harness_with(happy_executor(), &REQUIRED_EXECUTABLES, Some(PackageFamily::Apt), true);

        let handle = h.provisioner.start().unwrap();
        let report = handle.join().unwrap().unwrap();

        assert_eq!(report.monitor_source, "VirtualMic.monitor");
        assert_released(&h);
    }

    #[test]
    fn report_names_the_input_device() {
        let report = ProvisionReport {
            monitor_source: "VirtualMic.monitor".into(),
            stream: StreamBinding::NotFound { probes: 10 },
        };
        assert_eq!(report.input_device(), "Monitor of VirtualMicLoopback");
    }
}
