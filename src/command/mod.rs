//! Command Runner: runs external programs and narrates them.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │ Shell                                         │
//! │  - logs "$ cmd" and the output to the sink    │
//! │  - Strict / BestEffort chosen per call        │
//! │        │                                      │
//! │        ▼                                      │
//! │  CommandExecutor (trait)                      │
//! │   ├─ SystemExecutor   std::process::Command   │
//! │   └─ MockExecutor     scripted, cfg(test)     │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! All calls block; callers run them on the provisioning worker thread,
//! never on the UI thread.

pub mod executor;
pub mod runner;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use executor::{CommandExecutor, CommandOutcome, CommandResult, SystemExecutor};
pub use runner::{CommandError, RunMode, Shell};

#[cfg(test)]
pub use executor::{MockExecutor, Reply};
