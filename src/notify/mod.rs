//! Boundary between the provisioning worker and whatever presents progress.
//!
//! # Overview
//!
//! The worker never touches UI state.  It talks to two small traits:
//!
//! * [`NotificationSink`]: complete log lines and the "controls enabled"
//!   signal.
//! * [`InstallConsent`]: the accept/decline question asked before any
//!   package is installed.
//!
//! [`ChannelSink`] implements both by posting [`UiEvent`]s over a
//! `tokio::sync::mpsc` unbounded channel that the eframe shell drains every
//! frame.  The consent question carries a `oneshot` reply; the worker blocks
//! on it with `blocking_recv`, which is why the worker must run on a plain OS
//! thread and never inside the tokio runtime.
//!
//! ```text
//! worker thread                          UI thread
//! ─────────────                          ─────────
//! sink.log("$ pactl …")  ── UiEvent::Log ──▶  append line
//! consent.confirm_install ─ ConfirmInstall ─▶  modal window
//!        ◀──────────── oneshot<bool> ─────────  yes / no
//! sink.set_controls_enabled(true) ─────────▶  enable "set up"
//! ```

use tokio::sync::{mpsc, oneshot};

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Receives progress from the provisioning worker.
///
/// Implementations must be callable from the worker thread.
pub trait NotificationSink: Send + Sync {
    /// Append one complete line to the user-visible log.
    fn log(&self, line: &str);

    /// Enable or disable the controls that start a new attempt.
    fn set_controls_enabled(&self, enabled: bool);
}

/// Asks the user whether the listed packages may be installed.
pub trait InstallConsent: Send + Sync {
    /// Block until the user answers; `true` means "install".
    fn confirm_install(&self, packages: &[String]) -> bool;
}

// ---------------------------------------------------------------------------
// UiEvent
// ---------------------------------------------------------------------------

/// Messages marshalled from the worker thread to the UI thread.
#[derive(Debug)]
pub enum UiEvent {
    /// A complete log line.
    Log(String),
    /// Enable (`true`) or disable (`false`) the start control.
    ControlsEnabled(bool),
    /// Ask the user to approve installing `packages`.
    ConfirmInstall {
        packages: Vec<String>,
        reply: oneshot::Sender<bool>,
    },
}

// ---------------------------------------------------------------------------
// ChannelSink
// ---------------------------------------------------------------------------

/// [`NotificationSink`] + [`InstallConsent`] backed by an mpsc channel.
///
/// Cheap to clone.  Every line is also forwarded to the `log` facade so the
/// transcript ends up in the terminal when `RUST_LOG` allows it.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver the UI should poll.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn post(&self, event: UiEvent) {
        if self.tx.send(event).is_err() {
            log::debug!("notify: UI receiver dropped, event discarded");
        }
    }
}

impl NotificationSink for ChannelSink {
    fn log(&self, line: &str) {
        log::info!("{line}");
        self.post(UiEvent::Log(line.to_string()));
    }

    fn set_controls_enabled(&self, enabled: bool) {
        self.post(UiEvent::ControlsEnabled(enabled));
    }
}

impl InstallConsent for ChannelSink {
    /// Posts a [`UiEvent::ConfirmInstall`] and waits for the answer.
    ///
    /// A dropped reply (window closed, receiver gone) counts as a decline.
    fn confirm_install(&self, packages: &[String]) -> bool {
        let (reply, answer) = oneshot::channel();
        self.post(UiEvent::ConfirmInstall {
            packages: packages.to_vec(),
            reply,
        });
        answer.blocking_recv().unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

/// Sink that records everything it receives.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingSink {
    lines: std::sync::Mutex<Vec<String>>,
    controls: std::sync::Mutex<Vec<bool>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn controls(&self) -> Vec<bool> {
        self.controls.lock().unwrap().clone()
    }

    /// `true` if any recorded line contains `needle`.
    pub fn saw(&self, needle: &str) -> bool {
        self.lines.lock().unwrap().iter().any(|l| l.contains(needle))
    }
}

#[cfg(test)]
impl NotificationSink for RecordingSink {
    fn log(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }

    fn set_controls_enabled(&self, enabled: bool) {
        self.controls.lock().unwrap().push(enabled);
    }
}

/// Consent double with a fixed answer that counts how often it was asked.
#[cfg(test)]
#[derive(Debug)]
pub struct FixedConsent {
    answer: bool,
    asked: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl FixedConsent {
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            asked: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn times_asked(&self) -> usize {
        self.asked.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl InstallConsent for FixedConsent {
    fn confirm_install(&self, _packages: &[String]) -> bool {
        self.asked.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.answer
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
