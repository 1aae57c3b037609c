use crate::catalog::CommandCatalog;
use crate::engine::ExecutionEngine;
use crate::model::{AppEvent, CommandEntry, ExecutionRequest, InterpreterKind, RestoreEvent, RestorePointInfo};
use crate::restore::{powershell::PowerShellRestore, ConfirmRestore, RestoreWorkflow};
use crate::storage::JsonFileStore;
use anyhow::{bail, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Parser)]
#[command(
    name = "aurora-maint",
    version,
    about = "Curate and run OS maintenance commands, with restore-point rollback"
)]
pub struct Cli {
    /// Path to the catalog file (default: per-user data directory)
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum InterpreterArg {
    /// Platform command shell
    Shell,
    /// Platform scripting host (PowerShell)
    ScriptHost,
}

impl From<InterpreterArg> for InterpreterKind {
    fn from(arg: InterpreterArg) -> Self {
        match arg {
            InterpreterArg::Shell => InterpreterKind::Shell,
            InterpreterArg::ScriptHost => InterpreterKind::ScriptHost,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// List the catalog in execution order
    List,

    /// Append a command to the catalog
    Add {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        /// The literal text handed to the interpreter
        #[arg(long = "command")]
        command_text: String,
        #[arg(long, value_enum, default_value_t = InterpreterArg::Shell)]
        interpreter: InterpreterArg,
    },

    /// Edit the command at the given position (unspecified fields keep
    /// their current value; the entry is replaced wholesale)
    Edit {
        index: usize,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long = "command")]
        command_text: Option<String>,
        #[arg(long, value_enum)]
        interpreter: Option<InterpreterArg>,
    },

    /// Remove the command at the given position
    Remove { index: usize },

    /// Move a command to the top of the execution order
    MoveTop { index: usize },

    /// Move a command to the bottom of the execution order
    MoveBottom { index: usize },

    /// Sort the catalog alphabetically by name
    Sort,

    /// Execute the command at the given position
    Run { index: usize },

    /// Restore the system to the most recent restore point and reboot
    Restore {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Create a new system restore point
    Checkpoint { description: String },
}

pub async fn run(args: Cli) -> Result<()> {
    let path = args
        .catalog
        .clone()
        .unwrap_or_else(JsonFileStore::default_path);
    let mut catalog = CommandCatalog::load(Box::new(JsonFileStore::new(path)));

    match args.command {
        CliCommand::List => {
            if catalog.is_empty() {
                println!("The catalog is empty. Add a command with `aurora-maint add`.");
                return Ok(());
            }
            for (i, entry) in catalog.commands().iter().enumerate() {
                println!(
                    "{:>3}  {:<24} [{}]  {}",
                    i,
                    entry.name,
                    entry.interpreter.label(),
                    entry.description
                );
                println!("     $ {}", entry.command_text);
            }
            Ok(())
        }

        CliCommand::Add {
            name,
            description,
            command_text,
            interpreter,
        } => {
            if name.trim().is_empty() {
                bail!("command name must not be empty");
            }
            catalog.add(CommandEntry {
                name: name.clone(),
                description,
                command_text,
                interpreter: interpreter.into(),
            })?;
            println!("Added '{}' at position {}", name, catalog.len() - 1);
            Ok(())
        }

        CliCommand::Edit {
            index,
            name,
            description,
            command_text,
            interpreter,
        } => {
            let Some(current) = catalog.get(index) else {
                bail!("index {index} is out of range (catalog has {} commands)", catalog.len());
            };
            let replacement = CommandEntry {
                name: name.unwrap_or_else(|| current.name.clone()),
                description: description.unwrap_or_else(|| current.description.clone()),
                command_text: command_text.unwrap_or_else(|| current.command_text.clone()),
                interpreter: interpreter.map(Into::into).unwrap_or(current.interpreter),
            };
            if replacement.name.trim().is_empty() {
                bail!("command name must not be empty");
            }
            catalog.update(index, replacement)?;
            println!("Updated command {index}");
            Ok(())
        }

        CliCommand::Remove { index } => {
            catalog.remove(index)?;
            println!("Removed command {index}");
            Ok(())
        }

        CliCommand::MoveTop { index } => {
            catalog.move_to_top(index)?;
            Ok(())
        }

        CliCommand::MoveBottom { index } => {
            catalog.move_to_bottom(index)?;
            Ok(())
        }

        CliCommand::Sort => {
            catalog.sort_alphabetically()?;
            println!("Catalog sorted alphabetically");
            Ok(())
        }

        CliCommand::Run { index } => {
            let Some(entry) = catalog.get(index) else {
                bail!("index {index} is out of range (catalog has {} commands)", catalog.len());
            };
            run_command(entry).await
        }

        CliCommand::Restore { yes } => run_restore(yes).await,

        CliCommand::Checkpoint { description } => {
            let workflow = RestoreWorkflow::new(Arc::new(PowerShellRestore));
            workflow.create_restore_point(&description).await?;
            println!("Restore point created successfully");
            Ok(())
        }
    }
}

/// Trigger one execution and present its result. The trigger itself does
/// not block; we then wait on the completion channel for the one result.
async fn run_command(entry: &CommandEntry) -> Result<()> {
    eprintln!("Running '{}'…", entry.name);
    let engine = ExecutionEngine::default();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<AppEvent>();
    let _ = engine.spawn(ExecutionRequest::from(entry), event_tx);

    while let Some(ev) = event_rx.recv().await {
        if let AppEvent::ExecutionCompleted { result } = ev {
            if result.succeeded {
                println!("{}", result.payload.trim_end());
                return Ok(());
            }
            eprintln!("{}", result.payload.trim_end());
            bail!("'{}' failed ({:?})", entry.name, result.failure);
        }
    }
    bail!("execution engine stopped without delivering a result");
}

/// Reads the yes/no answer from stdin on a blocking task.
struct StdinConfirm;

#[async_trait]
impl ConfirmRestore for StdinConfirm {
    async fn confirm(&self, point: &RestorePointInfo) -> bool {
        let prompt = format!(
            "Restore the system to '{}' (created {}, sequence {})? [y/N] ",
            point.description, point.creation_time, point.sequence_number
        );
        tokio::task::spawn_blocking(move || {
            use std::io::{BufRead, Write};
            let mut stderr = std::io::stderr();
            let _ = write!(stderr, "{prompt}");
            let _ = stderr.flush();
            let mut line = String::new();
            if std::io::stdin().lock().read_line(&mut line).is_err() {
                return false;
            }
            matches!(line.trim(), "y" | "Y" | "yes" | "Yes")
        })
        .await
        .unwrap_or(false)
    }
}

/// Accepts without prompting (`--yes`).
struct AlwaysConfirm;

#[async_trait]
impl ConfirmRestore for AlwaysConfirm {
    async fn confirm(&self, _point: &RestorePointInfo) -> bool {
        true
    }
}

/// Drive one restore workflow run and render its events.
async fn run_restore(assume_yes: bool) -> Result<()> {
    let workflow = RestoreWorkflow::new(Arc::new(PowerShellRestore));
    let confirm: Arc<dyn ConfirmRestore> = if assume_yes {
        Arc::new(AlwaysConfirm)
    } else {
        Arc::new(StdinConfirm)
    };

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<AppEvent>();
    let _ = workflow.spawn(confirm, event_tx);

    while let Some(ev) = event_rx.recv().await {
        let AppEvent::Restore(ev) = ev else { continue };
        match ev {
            RestoreEvent::Querying => {
                eprintln!("Looking up the most recent restore point…");
            }
            RestoreEvent::AwaitingConfirmation { .. } => {
                // The confirmer renders its own prompt.
            }
            RestoreEvent::Restoring { point } => {
                eprintln!(
                    "Restoring to '{}' ({})… this can take a while.",
                    point.description, point.creation_time
                );
            }
            RestoreEvent::RebootRequested => {
                eprintln!("Requesting reboot…");
            }
            RestoreEvent::Done { point } => {
                println!(
                    "Changes successfully restored to '{}' ({}). The computer will restart.",
                    point.description, point.creation_time
                );
                return Ok(());
            }
            RestoreEvent::Cancelled => {
                eprintln!("Restore cancelled.");
                return Ok(());
            }
            RestoreEvent::Failed { reason } => {
                bail!(reason.to_message());
            }
        }
    }
    bail!("restore workflow stopped without a terminal event");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpreter_arg_maps_to_kind() {
        assert_eq!(
            InterpreterKind::from(InterpreterArg::Shell),
            InterpreterKind::Shell
        );
        assert_eq!(
            InterpreterKind::from(InterpreterArg::ScriptHost),
            InterpreterKind::ScriptHost
        );
    }

    #[test]
    fn cli_parses_add_with_defaults() {
        let cli = Cli::try_parse_from([
            "aurora-maint",
            "add",
            "--name",
            "flush dns",
            "--command",
            "ipconfig /flushdns",
        ])
        .unwrap();
        match cli.command {
            CliCommand::Add {
                name,
                description,
                interpreter,
                ..
            } => {
                assert_eq!(name, "flush dns");
                assert_eq!(description, "");
                assert!(matches!(interpreter, InterpreterArg::Shell));
            }
            other => panic!("unexpected subcommand: {other:?}"),
        }
    }

    #[test]
    fn cli_parses_restore_with_yes() {
        let cli = Cli::try_parse_from(["aurora-maint", "restore", "--yes"]).unwrap();
        assert!(matches!(cli.command, CliCommand::Restore { yes: true }));
    }
}
