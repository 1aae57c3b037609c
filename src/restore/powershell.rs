//! PowerShell-backed restore-point operations.
//!
//! Each operation is one PowerShell child process with captured output;
//! non-zero exits surface the raw stderr as the diagnostic. Runs that are
//! not elevated typically fail here with permission-flavored errors.

use crate::model::RestorePointInfo;
use crate::restore::RestoreBackend;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::process::Stdio;

const QUERY_LATEST: &str = "Get-ComputerRestorePoint | Sort-Object -Property CreationTime -Descending | Select-Object -First 1 | Format-List -Property CreationTime, Description, SequenceNumber";

#[cfg(windows)]
const POWERSHELL: &str = "powershell";
#[cfg(not(windows))]
const POWERSHELL: &str = "pwsh";

#[derive(Debug, Default)]
pub struct PowerShellRestore;

impl PowerShellRestore {
    /// Run one PowerShell statement and return its stdout, with stderr as
    /// the error diagnostic on non-zero exit.
    async fn run_statement(&self, statement: &str) -> Result<String> {
        tracing::debug!(statement, "running powershell statement");
        let output = tokio::process::Command::new(POWERSHELL)
            .arg("-NoProfile")
            .arg("-Command")
            .arg(statement)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("failed to launch {POWERSHELL}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "{POWERSHELL} exited with {}: {}",
                output.status,
                stderr.trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl RestoreBackend for PowerShellRestore {
    async fn latest_restore_point(&self) -> Result<Option<RestorePointInfo>> {
        let stdout = self.run_statement(QUERY_LATEST).await?;
        parse_restore_point(&stdout)
    }

    async fn restore_to(&self, sequence_number: u32) -> Result<()> {
        let statement = format!("Restore-Computer -RestorePoint {sequence_number} -Confirm:$false");
        self.run_statement(&statement).await?;
        Ok(())
    }

    async fn request_reboot(&self) -> Result<()> {
        self.run_statement("Restart-Computer").await?;
        Ok(())
    }

    async fn create_restore_point(&self, description: &str) -> Result<()> {
        let statement = format!(
            "Checkpoint-Computer -Description '{}'",
            quote_single(description)
        );
        self.run_statement(&statement).await?;
        Ok(())
    }
}

/// PowerShell single-quoted strings escape `'` by doubling it.
fn quote_single(s: &str) -> String {
    s.replace('\'', "''")
}

/// Parse `Format-List` output (`Key : Value` lines) into restore point
/// metadata. Empty output means the system has no restore points.
fn parse_restore_point(stdout: &str) -> Result<Option<RestorePointInfo>> {
    let mut creation_time = None;
    let mut description = None;
    let mut sequence_number = None;

    for line in stdout.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "CreationTime" => creation_time = Some(value.to_string()),
            "Description" => description = Some(value.to_string()),
            "SequenceNumber" => {
                let seq = value
                    .parse::<u32>()
                    .with_context(|| format!("unparseable SequenceNumber {value:?}"))?;
                sequence_number = Some(seq);
            }
            _ => {}
        }
    }

    match (sequence_number, description, creation_time) {
        (Some(sequence_number), description, creation_time) => Ok(Some(RestorePointInfo {
            sequence_number,
            description: description.unwrap_or_default(),
            creation_time: creation_time.unwrap_or_default(),
        })),
        (None, None, None) => Ok(None),
        _ => Err(anyhow!(
            "restore point listing is missing its SequenceNumber:\n{stdout}"
        )),
    }
}
