//! Ordered command catalog with synchronous persistence.
//!
//! The catalog is owned by the CLI control flow and mutated only from
//! there (single-writer discipline); every mutation persists before it
//! returns, and a failed persist rolls the in-memory state back so memory
//! and disk never diverge.

use crate::errors::CatalogError;
use crate::model::CommandEntry;
use crate::storage::CommandStore;

pub struct CommandCatalog {
    commands: Vec<CommandEntry>,
    store: Box<dyn CommandStore>,
}

impl CommandCatalog {
    /// Load the catalog from its store. A missing or unreadable store
    /// yields an empty catalog; startup never fails here.
    pub fn load(store: Box<dyn CommandStore>) -> Self {
        let commands = store.load();
        tracing::debug!(count = commands.len(), "command catalog loaded");
        Self { commands, store }
    }

    pub fn commands(&self) -> &[CommandEntry] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CommandEntry> {
        self.commands.get(index)
    }

    /// Apply a mutation and persist it, restoring the previous sequence if
    /// the store write fails.
    fn mutate<F>(&mut self, f: F) -> Result<(), CatalogError>
    where
        F: FnOnce(&mut Vec<CommandEntry>),
    {
        let before = self.commands.clone();
        f(&mut self.commands);
        if let Err(e) = self.store.save(&self.commands) {
            self.commands = before;
            return Err(CatalogError::Persistence(e));
        }
        Ok(())
    }

    fn check_index(&self, index: usize) -> Result<(), CatalogError> {
        if index >= self.commands.len() {
            return Err(CatalogError::IndexOutOfRange {
                index,
                len: self.commands.len(),
            });
        }
        Ok(())
    }

    /// Append a command at the end of the order.
    pub fn add(&mut self, entry: CommandEntry) -> Result<(), CatalogError> {
        self.mutate(|c| c.push(entry))
    }

    /// Replace the command at `index` wholesale.
    pub fn update(&mut self, index: usize, entry: CommandEntry) -> Result<(), CatalogError> {
        self.check_index(index)?;
        self.mutate(|c| c[index] = entry)
    }

    pub fn remove(&mut self, index: usize) -> Result<(), CatalogError> {
        self.check_index(index)?;
        self.mutate(|c| {
            c.remove(index);
        })
    }

    /// Move the command at `index` to the front. Already at the front or
    /// out of range is a no-op, not an error.
    pub fn move_to_top(&mut self, index: usize) -> Result<(), CatalogError> {
        if index == 0 || index >= self.commands.len() {
            return Ok(());
        }
        self.mutate(|c| {
            let entry = c.remove(index);
            c.insert(0, entry);
        })
    }

    /// Move the command at `index` to the back. Already at the back or out
    /// of range is a no-op, not an error.
    pub fn move_to_bottom(&mut self, index: usize) -> Result<(), CatalogError> {
        if self.commands.len() <= 1 || index >= self.commands.len() - 1 {
            return Ok(());
        }
        self.mutate(|c| {
            let entry = c.remove(index);
            c.push(entry);
        })
    }

    /// Stable sort by name, case-sensitive ordinal order. Ties keep their
    /// original relative order.
    pub fn sort_alphabetically(&mut self) -> Result<(), CatalogError> {
        self.mutate(|c| c.sort_by(|a, b| a.name.cmp(&b.name)))
    }
}
