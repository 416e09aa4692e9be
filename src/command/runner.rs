//! Logged command execution with per-call failure policy.
//!
//! [`Shell`] wraps a [`CommandExecutor`] and a [`NotificationSink`].  Every
//! call writes `$ <command line>` to the sink before running and the captured
//! output afterwards, whatever the [`RunMode`].
//!
//! ```text
//! Shell::run(argv, Strict)
//!   ├─ exit 0      → Ok(Some(trimmed output))
//!   ├─ exit != 0   → Err(CommandError::Failed)
//!   └─ not started → Err(CommandError::Spawn)
//!
//! Shell::run(argv, BestEffort)
//!   ├─ exit 0      → Ok(Some(trimmed output))
//!   └─ otherwise   → Ok(None)          (failure still logged)
//! ```

use std::sync::Arc;

use thiserror::Error;

use super::executor::{CommandExecutor, CommandOutcome};
use crate::notify::NotificationSink;

// ---------------------------------------------------------------------------
// CommandError
// ---------------------------------------------------------------------------

/// Errors surfaced by a [`RunMode::Strict`] invocation.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The program could not be started (usually: not on `$PATH`).
    #[error("cannot run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran and exited unsuccessfully.
    #[error("`{command}` failed ({status}): {output}")]
    Failed {
        command: String,
        status: String,
        output: String,
    },
}

// ---------------------------------------------------------------------------
// RunMode
// ---------------------------------------------------------------------------

/// What a failing command means for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Failure aborts the current operation.
    #[default]
    Strict,
    /// Failure is logged and yields `Ok(None)`.
    BestEffort,
}

// ---------------------------------------------------------------------------
// Shell
// ---------------------------------------------------------------------------

/// Runs commands and narrates them to a [`NotificationSink`].
#[derive(Clone)]
pub struct Shell {
    executor: Arc<dyn CommandExecutor>,
    sink: Arc<dyn NotificationSink>,
}

impl Shell {
    pub fn new(executor: Arc<dyn CommandExecutor>, sink: Arc<dyn NotificationSink>) -> Self {
        Self { executor, sink }
    }

    /// The sink this shell logs to.
    pub fn sink(&self) -> &dyn NotificationSink {
        self.sink.as_ref()
    }

    /// Run `argv` to completion.
    ///
    /// Returns the trimmed combined output on a clean exit.  See the module
    /// docs for how `mode` shapes the failure path.
    pub fn run<S: AsRef<str>>(
        &self,
        argv: &[S],
        mode: RunMode,
    ) -> Result<Option<String>, CommandError> {
        let argv: Vec<String> = argv.iter().map(|s| s.as_ref().to_string()).collect();
        let command = argv.join(" ");
        self.sink.log(&format!("$ {command}"));

        let result = match self.executor.execute(&argv) {
            Ok(result) => result,
            Err(source) => {
                self.sink.log(&format!("error: cannot run `{command}`: {source}"));
                log::warn!("command: spawn failed for `{command}`: {source}");
                return match mode {
                    RunMode::Strict => Err(CommandError::Spawn { command, source }),
                    RunMode::BestEffort => Ok(None),
                };
            }
        };

        let text = result.text.trim().to_string();
        match result.outcome {
            CommandOutcome::Clean => {
                if !text.is_empty() {
                    self.sink.log(&text);
                }
                Ok(Some(text))
            }
            CommandOutcome::Failed { code } => {
                let status = match code {
                    Some(code) => format!("exit code {code}"),
                    None => "terminated by signal".to_string(),
                };
                self.sink.log(&format!("error ({status}):\n{text}"));
                log::warn!("command: `{command}` failed with {status}");
                match mode {
                    RunMode::Strict => Err(CommandError::Failed {
                        command,
                        status,
                        output: text,
                    }),
                    RunMode::BestEffort => Ok(None),
                }
            }
        }
    }

    /// Start `argv` without waiting for it; the launch is logged.
    pub fn spawn_detached<S: AsRef<str>>(&self, argv: &[S]) -> Result<(), CommandError> {
        let argv: Vec<String> = argv.iter().map(|s| s.as_ref().to_string()).collect();
        let command = argv.join(" ");
        self.sink.log(&format!("$ {command} &"));

        self.executor
            .spawn_detached(&argv)
            .map_err(|source| CommandError::Spawn { command, source })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
