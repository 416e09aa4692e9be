//! Process execution behind an object-safe trait.
//!
//! [`CommandExecutor`] is what the rest of the crate uses to touch the host.
//! [`SystemExecutor`] is the production implementation built on
//! `std::process::Command`.
//!
//! [`MockExecutor`] (available under `#[cfg(test)]`) replays scripted
//! responses keyed by argv prefix and records every call, so the
//! orchestrator can be tested without `pactl` or a package manager.

use std::process::{Command, Stdio};

// ---------------------------------------------------------------------------
// CommandResult
// ---------------------------------------------------------------------------

/// How a finished command exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Exit status zero.
    Clean,
    /// Non-zero exit status, or `None` when killed by a signal.
    Failed { code: Option<i32> },
}

/// Outcome of one external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// stdout followed by stderr, lossily decoded, untrimmed.
    pub text: String,
    pub outcome: CommandOutcome,
}

impl CommandResult {
    pub fn clean(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            outcome: CommandOutcome::Clean,
        }
    }

    pub fn failed(code: i32, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            outcome: CommandOutcome::Failed { code: Some(code) },
        }
    }

    pub fn is_clean(&self) -> bool {
        self.outcome == CommandOutcome::Clean
    }
}

// ---------------------------------------------------------------------------
// CommandExecutor trait
// ---------------------------------------------------------------------------

/// Runs external programs.
///
/// Implementations must be `Send + Sync` so they can be held behind an
/// `Arc<dyn CommandExecutor>` and moved onto the provisioning thread.
pub trait CommandExecutor: Send + Sync {
    /// Run `argv` to completion and capture its output.
    ///
    /// `argv[0]` is the program.  An `Err` means the process could not be
    /// started at all; a non-zero exit is reported through
    /// [`CommandOutcome::Failed`].
    fn execute(&self, argv: &[String]) -> std::io::Result<CommandResult>;

    /// Start `argv` and return immediately without waiting for it.
    fn spawn_detached(&self, argv: &[String]) -> std::io::Result<()>;
}

// ---------------------------------------------------------------------------
// SystemExecutor
// ---------------------------------------------------------------------------

/// [`CommandExecutor`] that runs real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl SystemExecutor {
    pub fn new() -> Self {
        Self
    }
}

fn split_argv(argv: &[String]) -> std::io::Result<(&String, &[String])> {
    argv.split_first().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command line")
    })
}

impl CommandExecutor for SystemExecutor {
    fn execute(&self, argv: &[String]) -> std::io::Result<CommandResult> {
        let (program, args) = split_argv(argv)?;

        // stdin stays attached so `sudo` can still ask for a password.
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::inherit())
            .output()?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        let outcome = if output.status.success() {
            CommandOutcome::Clean
        } else {
            CommandOutcome::Failed {
                code: output.status.code(),
            }
        };

        Ok(CommandResult { text, outcome })
    }

    fn spawn_detached(&self, argv: &[String]) -> std::io::Result<()> {
        let (program, args) = split_argv(argv)?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        // Reap the child whenever it exits so it never lingers as a zombie.
        let name = program.clone();
        std::thread::Builder::new()
            .name(format!("reap-{name}"))
            .spawn(move || match child.wait() {
                Ok(status) => log::debug!("command: detached `{name}` exited with {status}"),
                Err(e) => log::warn!("command: waiting on detached `{name}` failed: {e}"),
            })?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockExecutor  (test-only)
// ---------------------------------------------------------------------------

/// One scripted reply of [`MockExecutor`].
#[cfg(test)]
#[derive(Debug, Clone)]
pub enum Reply {
    /// Exit 0 with this output.
    Ok(String),
    /// Exit with `code` and this output.
    Fail(i32, String),
    /// The program cannot be started.
    NotFound,
}

#[cfg(test)]
impl Reply {
    pub fn ok(text: impl Into<String>) -> Self {
        Reply::Ok(text.into())
    }

    pub fn fail(code: i32, text: impl Into<String>) -> Self {
        Reply::Fail(code, text.into())
    }
}

#[cfg(test)]
#[derive(Debug)]
struct Rule {
    prefix: Vec<String>,
    replies: std::collections::VecDeque<Reply>,
}

/// Scripted [`CommandExecutor`] for tests.
///
/// Rules are matched by argv prefix, first match wins.  A rule with several
/// replies hands them out in order and keeps repeating the last one.
/// Unmatched commands succeed with empty output.
///
/// # Example
///
/// ```rust,ignore
/// let exec = MockExecutor::new()
///     .on(&["pactl", "list", "short", "sources"], Reply::ok("1\tVirtualMic.monitor\t…"))
///     .on(&["pgrep"], Reply::fail(1, ""));
/// ```
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockExecutor {
    rules: std::sync::Mutex<Vec<Rule>>,
    calls: std::sync::Mutex<Vec<Vec<String>>>,
    spawned: std::sync::Mutex<Vec<Vec<String>>>,
}

#[cfg(test)]
impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to commands starting with `prefix` with `reply`.
    pub fn on(self, prefix: &[&str], reply: Reply) -> Self {
        self.on_seq(prefix, vec![reply])
    }

    /// Reply to successive matching commands with `replies`, in order.
    pub fn on_seq(self, prefix: &[&str], replies: Vec<Reply>) -> Self {
        self.rules.lock().unwrap().push(Rule {
            prefix: prefix.iter().map(|s| s.to_string()).collect(),
            replies: replies.into(),
        });
        self
    }

    /// Every executed argv, joined with spaces, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|argv| argv.join(" "))
            .collect()
    }

    /// Number of executed commands starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    /// Every argv passed to `spawn_detached`, joined with spaces.
    pub fn spawned(&self) -> Vec<String> {
        self.spawned
            .lock()
            .unwrap()
            .iter()
            .map(|argv| argv.join(" "))
            .collect()
    }
}

#[cfg(test)]
impl CommandExecutor for MockExecutor {
    fn execute(&self, argv: &[String]) -> std::io::Result<CommandResult> {
        self.calls.lock().unwrap().push(argv.to_vec());

        let mut rules = self.rules.lock().unwrap();
        let reply = rules
            .iter_mut()
            .find(|r| argv.starts_with(&r.prefix))
            .and_then(|r| {
                if r.replies.len() > 1 {
                    r.replies.pop_front()
                } else {
                    r.replies.front().cloned()
                }
            })
            .unwrap_or_else(|| Reply::ok(""));

        match reply {
            Reply::Ok(text) => Ok(CommandResult::clean(text)),
            Reply::Fail(code, text) => Ok(CommandResult::failed(code, text)),
            Reply::NotFound => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "No such file or directory",
            )),
        }
    }

    fn spawn_detached(&self, argv: &[String]) -> std::io::Result<()> {
        self.spawned.lock().unwrap().push(argv.to_vec());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
