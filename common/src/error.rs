//! Error types for the diagnostics path.

use thiserror::Error;

/// Failure of one diagnostics reporting cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReportError {
    /// The system has more tasks than the reporter's working buffers hold.
    #[error("task snapshot exceeds capacity (max: {max})")]
    TooManyTasks { max: usize },

    /// A task name does not fit the fixed-size name buffer.
    #[error("task name longer than {max} bytes")]
    TaskNameTooLong { max: usize },
}
