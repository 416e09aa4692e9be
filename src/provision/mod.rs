//! Provisioning orchestrator for the virtual microphone.
//!
//! This module runs the whole attempt: dependency check, optional
//! installation, virtual device creation and TTS stream rebinding.  It also
//! owns the phase the UI consults to enable or disable its controls.
//!
//! # Architecture
//!
//! ```text
//! "set up" click (UI thread)
//!        │
//!        ▼
//! Provisioner::start()  ── claim phase ──▶ worker thread "vmic-provision"
//!        │                                    │
//!        │                                    ├─ probe / install   (probe, install)
//!        │                                    ├─ sinks + loopback  (pactl via Shell)
//!        │                                    └─ TTS stream rebind (pactl via Shell)
//!        │
//!        ▼
//! UiEvent (tokio mpsc) ◀── ChannelSink ◀── log lines, controls, install prompt
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vmic_provision::command::SystemExecutor;
//! use vmic_provision::config::AppConfig;
//! use vmic_provision::notify::{ChannelSink, UiEvent};
//! use vmic_provision::probe::{HostPackageProfile, PathLookup};
//! use vmic_provision::provision::Provisioner;
//!
//! let (sink, mut events) = ChannelSink::channel();
//! let sink = Arc::new(sink);
//! let provisioner = Provisioner::new(
//!     AppConfig::default(),
//!     HostPackageProfile::detect(&PathLookup),
//!     Arc::new(SystemExecutor),
//!     Arc::new(PathLookup),
//!     sink.clone(),
//!     sink,
//! );
//!
//! let worker = provisioner.start().unwrap();
//! while let Some(event) = events.blocking_recv() {
//!     match event {
//!         UiEvent::Log(line) => println!("{line}"),
//!         UiEvent::ConfirmInstall { reply, .. } => { let _ = reply.send(true); }
//!         UiEvent::ControlsEnabled(true) => break,
//!         UiEvent::ControlsEnabled(false) => {}
//!     }
//! }
//! let _ = worker.join();
//! ```

pub mod orchestrator;
pub mod state;

pub use orchestrator::{ProvisionError, ProvisionReport, Provisioner, StreamBinding};
pub use state::ProvisionPhase;
