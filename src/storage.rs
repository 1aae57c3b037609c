//! Durable storage for the command catalog.
//!
//! A missing or corrupt store is never fatal: `load` degrades to an empty
//! catalog and logs what happened, so a damaged file cannot block startup.

use crate::model::CommandEntry;
use std::fs;
use std::io;
use std::path::PathBuf;

/// Persistence seam for the catalog. The catalog calls `save` after every
/// mutation; `load` is called once at startup.
pub trait CommandStore: Send {
    /// Read the persisted command list. Absence or corruption yields an
    /// empty list, never an error.
    fn load(&self) -> Vec<CommandEntry>;

    /// Write the full command list, replacing any previous contents.
    fn save(&self, commands: &[CommandEntry]) -> io::Result<()>;
}

/// JSON-file store: a pretty-printed array of entries at a fixed path.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location: `<data-local-dir>/aurora-maintenance/commands.json`,
    /// falling back to the current directory when no data dir exists.
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("aurora-maintenance")
            .join("commands.json")
    }
}

impl CommandStore for JsonFileStore {
    fn load(&self) -> Vec<CommandEntry> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to read command catalog, starting empty");
                return Vec::new();
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(commands) => commands,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "command catalog is corrupt, starting empty");
                Vec::new()
            }
        }
    }

    fn save(&self, commands: &[CommandEntry]) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_vec_pretty(commands)?;
        // Write-then-rename so a crash mid-write cannot leave a truncated
        // catalog behind.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
