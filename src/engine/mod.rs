//! Asynchronous command execution engine.
//!
//! Each trigger runs on its own spawned task and delivers exactly one
//! `AppEvent::ExecutionCompleted` over the event channel; the trigger call
//! never blocks. There is no queueing, no retry, no timeout and no
//! cancellation: one trigger, one attempt, one result.

use crate::model::{AppEvent, ExecutionRequest, ExecutionResult, InterpreterKind};
use std::process::Stdio;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// How to start one interpreter: the program plus the arguments that come
/// before the command text. The command text is always appended as the
/// final argument, so the interpreter itself does any further word
/// splitting or escaping.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Maps each `InterpreterKind` to its invocation on this host. A kind with
/// no mapping is reported as unsupported without spawning anything.
#[derive(Debug, Clone, Default)]
pub struct InterpreterTable {
    pub shell: Option<Invocation>,
    pub script_host: Option<Invocation>,
}

impl InterpreterTable {
    #[cfg(windows)]
    pub fn platform_default() -> Self {
        Self {
            shell: Some(Invocation::new("cmd", &["/C"])),
            script_host: Some(Invocation::new("powershell", &["-NoProfile", "-Command"])),
        }
    }

    #[cfg(not(windows))]
    pub fn platform_default() -> Self {
        Self {
            shell: Some(Invocation::new("sh", &["-c"])),
            script_host: Some(Invocation::new("pwsh", &["-NoProfile", "-Command"])),
        }
    }

    fn resolve(&self, kind: InterpreterKind) -> Option<&Invocation> {
        match kind {
            InterpreterKind::Shell => self.shell.as_ref(),
            InterpreterKind::ScriptHost => self.script_host.as_ref(),
        }
    }
}

pub struct ExecutionEngine {
    interpreters: Arc<InterpreterTable>,
}

impl ExecutionEngine {
    pub fn new(interpreters: InterpreterTable) -> Self {
        Self {
            interpreters: Arc::new(interpreters),
        }
    }

    /// Trigger one execution. Returns immediately; the result arrives as a
    /// single `AppEvent::ExecutionCompleted` on `event_tx`. Concurrent
    /// triggers run independently and complete in whatever order they
    /// finish.
    pub fn spawn(
        &self,
        request: ExecutionRequest,
        event_tx: UnboundedSender<AppEvent>,
    ) -> tokio::task::JoinHandle<()> {
        let interpreters = self.interpreters.clone();
        tokio::spawn(async move {
            let result = run_request(&interpreters, request).await;
            let _ = event_tx.send(AppEvent::ExecutionCompleted {
                result: Box::new(result),
            });
        })
    }
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new(InterpreterTable::platform_default())
    }
}

async fn run_request(table: &InterpreterTable, request: ExecutionRequest) -> ExecutionResult {
    let Some(invocation) = table.resolve(request.interpreter) else {
        tracing::warn!(kind = request.interpreter.label(), "unsupported interpreter kind");
        return ExecutionResult::unsupported(request.interpreter);
    };

    tracing::debug!(
        program = %invocation.program,
        kind = request.interpreter.label(),
        "launching interpreter"
    );

    let child = tokio::process::Command::new(&invocation.program)
        .args(&invocation.args)
        .arg(&request.command_text)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();

    let child = match child {
        Ok(c) => c,
        Err(e) => return ExecutionResult::launch_failed(&invocation.program, &e),
    };

    // stdout and stderr are captured separately and in full; a hung command
    // parks only this task.
    match child.wait_with_output().await {
        Ok(output) => {
            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            if output.status.success() {
                ExecutionResult::success(stdout, stderr)
            } else {
                ExecutionResult::non_zero_exit(output.status.code(), stdout, stderr)
            }
        }
        Err(e) => ExecutionResult::unexpected(format!("Failed to collect command output: {e}")),
    }
}
