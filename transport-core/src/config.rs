//! Worker configuration.
//!
//! spec.md hard-codes both the receive buffer size (4096 bytes, §4.3.5) and
//! the connect-retry policy (4 attempts / 2s, §4.3.2) directly into the
//! algorithm. This follows the teacher's `SocketOptions` builder idiom
//! (`options.rs`) to make both configurable without inventing a config-file
//! layer the spec never asked for.

use crate::connect_retry::ConnectRetryPolicy;

/// Default receive buffer size per spec.md §4.3.5.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

/// Per-worker tunables.
///
/// # Examples
///
/// ```
/// use transport_core::config::WorkerConfig;
/// use transport_core::connect_retry::ConnectRetryPolicy;
/// use std::time::Duration;
///
/// let config = WorkerConfig::default()
///     .with_read_buffer_size(8192)
///     .with_retry_policy(ConnectRetryPolicy::new(Duration::from_millis(50), 2));
/// assert_eq!(config.read_buffer_size(), 8192);
/// ```
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    read_buffer_size: usize,
    retry_policy: ConnectRetryPolicy,
}

impl WorkerConfig {
    #[must_use]
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, policy: ConnectRetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    #[must_use]
    pub const fn read_buffer_size(&self) -> usize {
        self.read_buffer_size
    }

    #[must_use]
    pub fn retry_policy(&self) -> ConnectRetryPolicy {
        self.retry_policy.clone()
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            retry_policy: ConnectRetryPolicy::default(),
        }
    }
}
