use serde::{Deserialize, Serialize};

/// Which external interpreter a command's text is submitted to.
///
/// A closed enumeration: new interpreter kinds are a compile-time change,
/// not a string-matching surface. Whether a kind is actually runnable on
/// this host is decided by the engine's interpreter table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterpreterKind {
    /// The platform command shell (`cmd /C` on Windows, `sh -c` elsewhere).
    Shell,
    /// The platform scripting host (`powershell -Command` / `pwsh -Command`).
    ScriptHost,
}

impl InterpreterKind {
    pub fn label(self) -> &'static str {
        match self {
            InterpreterKind::Shell => "shell",
            InterpreterKind::ScriptHost => "script-host",
        }
    }
}

/// One catalog entry: a named, described piece of text to be run by a
/// specific interpreter. Immutable once constructed; edits replace the
/// whole entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEntry {
    pub name: String,
    pub description: String,
    pub command_text: String,
    pub interpreter: InterpreterKind,
}

/// What the engine actually runs, snapshotted from a `CommandEntry` at
/// trigger time so later catalog edits cannot affect an in-flight run.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub command_text: String,
    pub interpreter: InterpreterKind,
}

impl From<&CommandEntry> for ExecutionRequest {
    fn from(entry: &CommandEntry) -> Self {
        Self {
            command_text: entry.command_text.clone(),
            interpreter: entry.interpreter,
        }
    }
}

/// Why an execution did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecFailure {
    /// The interpreter kind has no invocation mapped on this host.
    UnsupportedInterpreter,
    /// The interpreter process could not be started at all.
    ProcessLaunchFailed,
    /// The process ran and exited with a non-zero status.
    NonZeroExit,
    /// Reserved: no timeout is enforced, this variant is never produced.
    Timeout,
    /// Output capture or wait failed after a successful launch.
    Unexpected,
}

/// Structured outcome of running one command once.
///
/// `payload` is the presenter-facing text: stdout on success (with a canned
/// substitute when stdout is empty), stderr on non-zero exit, a launch
/// error description otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub succeeded: bool,
    pub stdout: String,
    pub stderr: String,
    pub failure: Option<ExecFailure>,
    pub payload: String,
    #[serde(default)]
    pub finished_at: String,
}

const EMPTY_STDOUT_FALLBACK: &str = "The command was executed successfully.";

impl ExecutionResult {
    fn stamp() -> String {
        time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "now".into())
    }

    pub fn success(stdout: String, stderr: String) -> Self {
        let payload = if stdout.trim().is_empty() {
            EMPTY_STDOUT_FALLBACK.to_string()
        } else {
            stdout.clone()
        };
        Self {
            succeeded: true,
            stdout,
            stderr,
            failure: None,
            payload,
            finished_at: Self::stamp(),
        }
    }

    pub fn non_zero_exit(code: Option<i32>, stdout: String, stderr: String) -> Self {
        let payload = if stderr.trim().is_empty() {
            match code {
                Some(c) => format!("Command exited with status {c}"),
                None => "Command terminated without an exit status".to_string(),
            }
        } else {
            stderr.clone()
        };
        Self {
            succeeded: false,
            stdout,
            stderr,
            failure: Some(ExecFailure::NonZeroExit),
            payload,
            finished_at: Self::stamp(),
        }
    }

    pub fn unsupported(kind: InterpreterKind) -> Self {
        Self {
            succeeded: false,
            stdout: String::new(),
            stderr: String::new(),
            failure: Some(ExecFailure::UnsupportedInterpreter),
            payload: format!("No {} interpreter is configured on this system", kind.label()),
            finished_at: Self::stamp(),
        }
    }

    pub fn launch_failed(program: &str, err: &std::io::Error) -> Self {
        // Permission problems get called out explicitly: the usual cause is
        // running unelevated, and the fix is different from a missing binary.
        let payload = match err.kind() {
            std::io::ErrorKind::PermissionDenied => {
                format!("Permission denied launching `{program}` (is the process elevated?): {err}")
            }
            _ => format!("Failed to launch `{program}`: {err}"),
        };
        Self {
            succeeded: false,
            stdout: String::new(),
            stderr: String::new(),
            failure: Some(ExecFailure::ProcessLaunchFailed),
            payload,
            finished_at: Self::stamp(),
        }
    }

    pub fn unexpected(detail: String) -> Self {
        Self {
            succeeded: false,
            stdout: String::new(),
            stderr: String::new(),
            failure: Some(ExecFailure::Unexpected),
            payload: detail,
            finished_at: Self::stamp(),
        }
    }
}

/// Metadata of one OS restore point, fetched fresh on every workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestorePointInfo {
    pub sequence_number: u32,
    pub description: String,
    pub creation_time: String,
}

/// Why a restore workflow run ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestoreFailure {
    NoRestorePointAvailable,
    QueryError { detail: String },
    RestoreError { detail: String },
}

impl RestoreFailure {
    /// Render a human-readable message for the presenter.
    pub fn to_message(&self) -> String {
        match self {
            RestoreFailure::NoRestorePointAvailable => {
                "No restore point found. Create a restore point before attempting to restore."
                    .to_string()
            }
            RestoreFailure::QueryError { detail } => {
                format!("Error querying restore points:\n{detail}")
            }
            RestoreFailure::RestoreError { detail } => {
                format!("Error restoring changes:\n{detail}")
            }
        }
    }
}

/// Restore workflow transitions, one event per state entered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RestoreEvent {
    Querying,
    AwaitingConfirmation { point: RestorePointInfo },
    Restoring { point: RestorePointInfo },
    RebootRequested,
    Done { point: RestorePointInfo },
    Cancelled,
    Failed { reason: RestoreFailure },
}

/// Events emitted by the engine and restore workflow, consumed by the
/// presenter loop. Safe to send from any task; the receiver marshals to
/// its own rendering context.
#[derive(Debug, Clone)]
pub enum AppEvent {
    ExecutionCompleted {
        // Box to keep AppEvent small; ExecutionResult carries full output.
        result: Box<ExecutionResult>,
    },
    Restore(RestoreEvent),
}
