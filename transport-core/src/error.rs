//! Transport error types.
//!
//! All public operations return a `Result` rather than throwing; the worker
//! translates every I/O failure into one of these variants before handing it
//! to the controller or to the caller of `Start`/`SendData`/`Disconnect`.

use crate::endpoint::Endpoint;
use std::io;
use thiserror::Error;

/// Errors surfaced by `transport-core` operations.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Self-pipe creation failed (`pipe2`/`fcntl`).
    #[error("notifier pipe creation failed: {0}")]
    PipeCreationFailed(#[source] io::Error),

    /// Writing a wake-up byte to the notifier's write end failed.
    #[error("failed to notify worker thread")]
    NotifyFailed,

    /// The worker's OS thread could not be spawned.
    #[error("failed to start worker thread: {0}")]
    ThreadStartFailed(#[source] io::Error),

    /// All bounded connect attempts to `endpoint` were exhausted.
    #[error("failed to connect to {endpoint} after {attempts} attempt(s)")]
    ConnectError { endpoint: Endpoint, attempts: u32 },

    /// The remote endpoint could not be resolved from the device record.
    #[error("no endpoint available for application handle")]
    NoEndpoint,

    /// A non-transient error occurred while sending a specific message.
    #[error("send failed: {0}")]
    DataSendError(#[source] io::Error),

    /// The connection terminated abnormally (I/O error or peer close).
    #[error("communication error")]
    CommunicationError,
}

/// Result type alias for `transport-core` operations.
pub type Result<T> = std::result::Result<T, TransportError>;

impl TransportError {
    /// Whether the underlying I/O error is transient and should be retried
    /// rather than treated as connection-terminal.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::DataSendError(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                )
        )
    }
}
