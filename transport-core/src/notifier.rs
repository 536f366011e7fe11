//! Self-pipe wake-up primitive.
//!
//! The standard mechanism for adding user-space events to a `poll`-based
//! loop without racing "queue became non-empty" against "worker entered
//! poll": a pipe whose read end is multiplexed into the worker's poll set,
//! and whose write end any producer thread can hit to force `poll` to
//! return. A condition variable cannot be multiplexed with a socket fd, so
//! it isn't an option here — the self-pipe is the minimal primitive that is.

#![allow(unsafe_code)]

use std::os::unix::io::RawFd;

use crate::error::{Result, TransportError};

/// Cross-thread wake-up channel backed by a self-pipe.
#[derive(Debug)]
pub struct Notifier {
    read_fd: RawFd,
    write_fd: RawFd,
}

impl Notifier {
    /// Create a fresh read/write fd pair. The read end is set non-blocking
    /// so `drain` can be called unconditionally without risking a block.
    pub fn create() -> Result<Self> {
        let mut fds = [0 as RawFd; 2];
        // SAFETY: `fds` is a valid pointer to two `RawFd` slots, as required
        // by `pipe2`.
        let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK) };
        if rc != 0 {
            return Err(TransportError::PipeCreationFailed(
                std::io::Error::last_os_error(),
            ));
        }
        Ok(Self {
            read_fd: fds[0],
            write_fd: fds[1],
        })
    }

    /// Wake the worker. Safe to call from any thread. Multiple concurrent
    /// notifications collapse into "at least one wake" — the pipe only
    /// needs to hold one unread byte for `poll` to report readability.
    pub fn notify(&self) -> Result<()> {
        let byte: u8 = 0;
        // SAFETY: `write_fd` is owned by this `Notifier` and `&byte` points
        // to one valid, readable byte.
        let rc = unsafe { libc::write(self.write_fd, std::ptr::addr_of!(byte).cast(), 1) };
        if rc != 1 {
            return Err(TransportError::NotifyFailed);
        }
        Ok(())
    }

    /// Drain every pending wake-up byte. Called once per poll wake before
    /// deciding what work to do, so a burst of `notify()` calls never
    /// leaves bytes behind to spuriously wake the next iteration.
    pub fn drain(&self) {
        let mut buffer = [0u8; 256];
        loop {
            // SAFETY: `buffer` is a valid, writable 256-byte buffer; `read_fd`
            // is owned by this `Notifier` and non-blocking.
            let rc = unsafe {
                libc::read(
                    self.read_fd,
                    buffer.as_mut_ptr().cast(),
                    buffer.len(),
                )
            };
            if rc > 0 {
                continue;
            }
            if rc < 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() != std::io::ErrorKind::WouldBlock {
                    tracing::error!(error = %err, "failed to drain notifier pipe");
                }
            }
            break;
        }
    }

    /// The pollable read descriptor. Never mutated externally; `poll`
    /// watches this alongside the socket fd.
    #[must_use]
    pub const fn read_fd(&self) -> RawFd {
        self.read_fd
    }

    /// Close both fds. Idempotent: a second call is a silent no-op because
    /// `Connection`/`Worker` only ever call this once from `Finalize`, but
    /// `close` itself tolerates being asked twice by tracking nothing extra
    /// — closing an already-closed fd returns `EBADF`, which is logged and
    /// swallowed rather than panicking.
    pub fn close(&self) {
        for fd in [self.read_fd, self.write_fd] {
            // SAFETY: `fd` was obtained from a successful `pipe2` call (or is
            // a stale already-closed descriptor, which `close` tolerates).
            let rc = unsafe { libc::close(fd) };
            if rc != 0 {
                let err = std::io::Error::last_os_error();
                if err.raw_os_error() != Some(libc::EBADF) {
                    tracing::debug!(fd, error = %err, "close on notifier fd");
                }
            }
        }
    }
}

// The self-pipe fds are plain integers; reading/writing them from multiple
// threads is exactly the intended usage (producers notify, worker drains).
unsafe impl Send for Notifier {}
unsafe impl Sync for Notifier {}

impl Drop for Notifier {
    /// Backstop for paths that never reach `Finalize` — e.g. `Connection`
    /// is dropped before `start()` is ever called, or thread spawn fails
    /// before the worker exists to close anything. `close` is idempotent,
    /// so this is a no-op on top of the worker's own explicit `close()`
    /// call in the common case.
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_then_drain_is_idempotent() {
        let n = Notifier::create().unwrap();
        n.notify().unwrap();
        n.notify().unwrap();
        n.notify().unwrap();
        n.drain();
        // A second drain with nothing pending must not block or error.
        n.drain();
    }

    #[test]
    fn read_fd_is_pollable() {
        let n = Notifier::create().unwrap();
        n.notify().unwrap();

        let mut pfd = libc::pollfd {
            fd: n.read_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let rc = unsafe { libc::poll(&mut pfd, 1, 1000) };
        assert_eq!(rc, 1);
        assert_ne!(pfd.revents & libc::POLLIN, 0);
        n.drain();
    }

    #[test]
    fn close_is_safe_to_call_once() {
        let n = Notifier::create().unwrap();
        n.close();
    }

    #[test]
    fn drop_closes_both_fds_without_an_explicit_close() {
        let n = Notifier::create().unwrap();
        let write_fd = n.write_fd;
        drop(n);

        let byte: u8 = 0;
        // SAFETY: `write_fd` is a plain fd number; `write` on an already-closed
        // fd is well-defined (returns -1/EBADF), never undefined behaviour.
        let rc = unsafe { libc::write(write_fd, std::ptr::addr_of!(byte).cast(), 1) };
        assert_eq!(rc, -1);
        assert_eq!(
            std::io::Error::last_os_error().raw_os_error(),
            Some(libc::EBADF)
        );
    }
}
