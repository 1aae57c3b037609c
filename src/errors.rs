use thiserror::Error;

/// Errors surfaced synchronously by catalog mutations.
///
/// Execution and restore failures are not errors in this sense: they are
/// delivered as normal events (`ExecFailure`, `RestoreFailure`) and never
/// abort the process.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The backing store could not be written. The in-memory catalog has
    /// been rolled back to its pre-mutation state.
    #[error("failed to persist command catalog: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("index {index} is out of range (catalog has {len} commands)")]
    IndexOutOfRange { index: usize, len: usize },
}
