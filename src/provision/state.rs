//! Provisioning state machine.
//!
//! [`ProvisionPhase`] is owned by the [`Provisioner`](super::Provisioner) and
//! only moved by an attempt's entry and exit points.  The UI never holds it;
//! it asks [`Provisioner::is_running`](super::Provisioner::is_running).

use std::fmt;

/// Phases of one provisioning attempt.
///
/// ```text
/// Idle ──start──▶ CheckingDependencies
///                   ├─ something missing ─▶ AwaitingInstallDecision ─▶ Installing ─▶ Failed
///                   └─ all present ───────▶ CreatingPrimarySink
///                                            ─▶ DiscoveringMonitorSource
///                                            ─▶ CreatingSecondarySinkAndLoopback
///                                            ─▶ LaunchingOrConfirmingTtsApp
///                                            ─▶ DiscoveringTtsStream (≤ N polls)
///                                            ─▶ RebindingStream (if found)
///                                            ─▶ Done
/// any phase ──error──▶ Failed
/// Done / Failed ──start──▶ CheckingDependencies
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProvisionPhase {
    /// No attempt has run yet.
    #[default]
    Idle,
    CheckingDependencies,
    /// Waiting for the user to accept or decline package installation.
    AwaitingInstallDecision,
    Installing,
    CreatingPrimarySink,
    DiscoveringMonitorSource,
    CreatingSecondarySinkAndLoopback,
    LaunchingOrConfirmingTtsApp,
    /// Bounded polling for the TTS app's sink-input.
    DiscoveringTtsStream,
    RebindingStream,
    /// The last attempt finished; the virtual devices are wired.
    Done,
    /// The last attempt stopped early.  A new attempt may be started.
    Failed,
}

impl ProvisionPhase {
    /// Returns `true` while an attempt is in flight.
    ///
    /// ```
    /// use vmic_provision::provision::ProvisionPhase;
    ///
    /// assert!(!ProvisionPhase::Idle.is_busy());
    /// assert!(ProvisionPhase::DiscoveringTtsStream.is_busy());
    /// assert!(!ProvisionPhase::Done.is_busy());
    /// assert!(!ProvisionPhase::Failed.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        !matches!(
            self,
            ProvisionPhase::Idle | ProvisionPhase::Done | ProvisionPhase::Failed
        )
    }

    /// A short human-readable label suitable for a status line.
    pub fn label(&self) -> &'static str {
        match self {
            ProvisionPhase::Idle => "idle",
            ProvisionPhase::CheckingDependencies => "checking dependencies",
            ProvisionPhase::AwaitingInstallDecision => "waiting for install decision",
            ProvisionPhase::Installing => "installing packages",
            ProvisionPhase::CreatingPrimarySink => "creating virtual sink",
            ProvisionPhase::DiscoveringMonitorSource => "finding monitor source",
            ProvisionPhase::CreatingSecondarySinkAndLoopback => "wiring loopback",
            ProvisionPhase::LaunchingOrConfirmingTtsApp => "starting TTS app",
            ProvisionPhase::DiscoveringTtsStream => "finding TTS stream",
            ProvisionPhase::RebindingStream => "moving TTS stream",
            ProvisionPhase::Done => "done",
            ProvisionPhase::Failed => "failed",
        }
    }
}

impl fmt::Display for ProvisionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
