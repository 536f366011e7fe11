//! The worker thread: `Establish -> (poll/read/write/drain loop) -> Finalize`.
//!
//! This is the heart of the crate. Everything here runs on one dedicated
//! `std::thread` per connection; the socket and the local copy of the send
//! queue are single-reader/single-writer from this thread's perspective, so
//! no lock is taken on the hot path beyond the one queue swap per wake.

#![allow(unsafe_code)]

use std::collections::VecDeque;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::WorkerConfig;
use crate::controller::{AppHandle, Controller, DeviceUid};
use crate::error::TransportError;
use crate::notifier::Notifier;
use crate::raw_message::RawMessage;
use crate::send_queue::SendQueue;
use crate::socket::{self, ConnectedSocket};

/// Shared flags a `Connection` and its worker both read/write. Both are
/// monotone: once set, never cleared, and the happens-before edge that
/// makes that safe to read with `Relaxed` ordering is the notifier's
/// pipe write/read, not the atomics themselves — so every flag flip here
/// is immediately followed by a `notify()`.
#[derive(Default)]
pub struct WorkerFlags {
    pub terminate: AtomicBool,
    pub unexpected_disconnect: AtomicBool,
}

impl WorkerFlags {
    pub fn abort(&self) {
        self.unexpected_disconnect.store(true, Ordering::Release);
        self.terminate.store(true, Ordering::Release);
    }

    pub fn is_terminating(&self) -> bool {
        self.terminate.load(Ordering::Acquire)
    }

    pub fn is_unexpected(&self) -> bool {
        self.unexpected_disconnect.load(Ordering::Acquire)
    }
}

/// Everything the worker thread needs; owned by the `Connection` and
/// handed to the thread body by value (wrapped in `Arc`s it shares back).
pub struct WorkerContext {
    pub device_uid: DeviceUid,
    pub app_handle: AppHandle,
    pub controller: Arc<dyn Controller>,
    pub queue: Arc<SendQueue>,
    pub notifier: Arc<Notifier>,
    pub flags: Arc<WorkerFlags>,
    pub config: WorkerConfig,
}

/// Thread entry point: `threadMain` in the original source.
pub fn run(ctx: WorkerContext) {
    let WorkerContext {
        device_uid,
        app_handle,
        controller,
        queue,
        notifier,
        flags,
        config,
    } = ctx;

    controller.connection_created(&device_uid, app_handle);

    let socket = match establish(&device_uid, app_handle, controller.as_ref(), &config) {
        Ok(socket) => socket,
        Err(err) => {
            tracing::error!(device = %device_uid, app = app_handle, error = %err, "connection establish failed");
            // Never connected: no ConnectDone. A failed connect is not a
            // graceful shutdown, so it is reported the same way an
            // in-flight disconnect would be (see DESIGN.md).
            flags.abort();
            controller.connection_aborted(&device_uid, app_handle, TransportError::CommunicationError);
            queue.drain_failed(controller.as_ref(), &device_uid, app_handle);
            notifier.close();
            return;
        }
    };

    controller.connect_done(&device_uid, app_handle);

    main_loop(&socket, &queue, &notifier, &flags, controller.as_ref(), &device_uid, app_handle, &config);

    finalize(socket, &notifier, &queue, controller.as_ref(), &device_uid, app_handle, flags.is_unexpected());
}

fn establish(
    device_uid: &DeviceUid,
    app_handle: AppHandle,
    controller: &dyn Controller,
    config: &WorkerConfig,
) -> crate::error::Result<ConnectedSocket> {
    let device = controller
        .find_device(device_uid)
        .ok_or(TransportError::NoEndpoint)?;
    let endpoint = device
        .endpoint_for(app_handle)
        .ok_or(TransportError::NoEndpoint)?;

    tracing::debug!(device = %device_uid, app = app_handle, %endpoint, "connecting");
    socket::connect_with_retry(&endpoint, config.retry_policy(), std::thread::sleep)
}

const POLL_REVENTS_FATAL: libc::c_short = (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) as libc::c_short;
const POLL_REVENTS_READABLE: libc::c_short = (libc::POLLIN | libc::POLLPRI) as libc::c_short;

#[allow(clippy::too_many_arguments)]
fn main_loop(
    socket: &ConnectedSocket,
    queue: &SendQueue,
    notifier: &Notifier,
    flags: &WorkerFlags,
    controller: &dyn Controller,
    device_uid: &DeviceUid,
    app_handle: AppHandle,
    config: &WorkerConfig,
) {
    let socket_fd: RawFd = socket.raw_fd();
    let notifier_fd: RawFd = notifier.read_fd();

    // The head message of a send pass that hit `WouldBlock`/a partial write,
    // carried across wakes so the next pass resumes at the right offset
    // against the *original* message rather than a truncated stand-in.
    let mut in_flight: Option<(RawMessage, usize)> = None;

    while !flags.is_terminating() {
        let mut poll_fds = [
            libc::pollfd {
                fd: socket_fd,
                events: libc::POLLIN | libc::POLLPRI,
                revents: 0,
            },
            libc::pollfd {
                fd: notifier_fd,
                events: libc::POLLIN | libc::POLLPRI,
                revents: 0,
            },
        ];

        // SAFETY: `poll_fds` is a valid array of two initialized `pollfd`s.
        let rc = unsafe { libc::poll(poll_fds.as_mut_ptr(), poll_fds.len() as libc::nfds_t, -1) };
        if rc == -1 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            tracing::error!(device = %device_uid, app = app_handle, error = %err, "poll failed");
            flags.abort();
            break;
        }

        if poll_fds[1].revents & POLL_REVENTS_FATAL != 0 {
            tracing::error!(device = %device_uid, app = app_handle, "notifier pipe terminated");
            flags.abort();
            break;
        }
        if poll_fds[0].revents & POLL_REVENTS_FATAL != 0 {
            tracing::debug!(device = %device_uid, app = app_handle, "socket terminated");
            flags.abort();
            break;
        }

        notifier.drain();

        if poll_fds[1].revents & POLL_REVENTS_READABLE != 0 {
            send_pass(socket, queue, flags, controller, device_uid, app_handle, &mut in_flight);
        } else if poll_fds[0].revents & POLL_REVENTS_READABLE != 0 {
            receive_pass(socket, flags, controller, device_uid, app_handle, config);
        }
    }

    // The loop is exiting; any head message still in flight has to go back
    // onto the shared queue so `Finalize`'s `drain_failed` reports it rather
    // than silently dropping it.
    if let Some((msg, _offset)) = in_flight.take() {
        queue.requeue_front(VecDeque::from([msg]));
    }
}

/// §4.3.4: drain the queue, walk it in order tracking a per-message offset,
/// retry on `WouldBlock`, fail+abort on any other send error. `in_flight`
/// carries the head message and its byte offset across wakes — re-sliced
/// from the original `RawMessage`, never rebuilt — so a message that spans
/// multiple partial writes still reports `DataSendDone` with the same
/// length the producer enqueued.
#[allow(clippy::too_many_arguments)]
fn send_pass(
    socket: &ConnectedSocket,
    queue: &SendQueue,
    flags: &WorkerFlags,
    controller: &dyn Controller,
    device_uid: &DeviceUid,
    app_handle: AppHandle,
    in_flight: &mut Option<(RawMessage, usize)>,
) {
    let mut local: VecDeque<(RawMessage, usize)> = VecDeque::new();
    if let Some(pending) = in_flight.take() {
        local.push_back(pending);
    }
    local.extend(queue.swap_out().into_iter().map(|msg| (msg, 0)));

    while let Some((msg, offset)) = local.pop_front() {
        let buf = msg.data();
        match socket.send(&buf[offset..]) {
            Ok(sent) if offset + sent == buf.len() => {
                controller.data_send_done(device_uid, app_handle, msg);
            }
            Ok(0) => {
                // Would block: nothing progressed. Leave this message at
                // the head (same offset) and stop the pass; it's retried on
                // next wake.
                *in_flight = Some((msg, offset));
                requeue_remaining(queue, local);
                return;
            }
            Ok(sent) => {
                // Partial write: hold the same message at the new offset so
                // the next wake continues without duplicating bytes already
                // on the wire, and without losing the original length.
                *in_flight = Some((msg, offset + sent));
                requeue_remaining(queue, local);
                return;
            }
            Err(err) => {
                tracing::error!(device = %device_uid, app = app_handle, error = %err, "send failed");
                controller.data_send_failed(device_uid, app_handle, msg, TransportError::DataSendError(err));
                flags.abort();
                requeue_remaining(queue, local);
                return;
            }
        }
    }
}

/// Re-prepend whatever the pass didn't get to back onto the shared queue.
/// Every entry left in `local` at this point came straight from
/// `queue.swap_out()` (the head, if any, was already popped into
/// `in_flight` or consumed above), so each is still at offset 0.
fn requeue_remaining(queue: &SendQueue, local: VecDeque<(RawMessage, usize)>) {
    if local.is_empty() {
        return;
    }
    queue.requeue_front(local.into_iter().map(|(msg, _)| msg).collect());
}

/// §4.3.5: read until it would block or the peer closes.
fn receive_pass(
    socket: &ConnectedSocket,
    flags: &WorkerFlags,
    controller: &dyn Controller,
    device_uid: &DeviceUid,
    app_handle: AppHandle,
    config: &WorkerConfig,
) {
    let mut buf = vec![0u8; config.read_buffer_size()];
    loop {
        match socket.recv(&mut buf) {
            Ok(Some(0)) => {
                tracing::warn!(device = %device_uid, app = app_handle, "socket closed by remote peer");
                flags.abort();
                return;
            }
            Ok(Some(n)) => {
                controller.data_receive_done(
                    device_uid,
                    app_handle,
                    RawMessage::with_meta(buf[..n].to_vec(), 0, 0),
                );
            }
            Ok(None) => return,
            Err(err) => {
                tracing::error!(device = %device_uid, app = app_handle, error = %err, "recv failed");
                flags.abort();
                return;
            }
        }
    }
}

/// §4.3.6: report the terminal callback, close the socket, drain remaining
/// sends as failed, then close the notifier. `terminate_flag` is already
/// set by whichever path got us here, so no further `SendData` can make
/// progress past this point even if one races in concurrently.
fn finalize(
    socket: ConnectedSocket,
    notifier: &Notifier,
    queue: &SendQueue,
    controller: &dyn Controller,
    device_uid: &DeviceUid,
    app_handle: AppHandle,
    unexpected: bool,
) {
    if unexpected {
        controller.connection_aborted(device_uid, app_handle, TransportError::CommunicationError);
    } else {
        controller.connection_finished(device_uid, app_handle);
    }
    drop(socket);
    queue.drain_failed(controller, device_uid, app_handle);
    notifier.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::test_support::{RecordingController, TcpDevice};
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::Arc as StdArc;

    fn spawn_echo_server(listener: TcpListener) -> std::thread::JoinHandle<()> {
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 256];
                loop {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if stream.write_all(&buf[..n]).is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn establish_fails_with_no_device() {
        let controller = RecordingController::default();
        let device_uid = DeviceUid::from("dev-1");
        let config = WorkerConfig::default();
        let result = establish(&device_uid, 1, &controller, &config);
        assert!(matches!(result, Err(TransportError::NoEndpoint)));
    }

    #[test]
    fn establish_succeeds_against_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = spawn_echo_server(listener);

        let device = StdArc::new(TcpDevice { addr });
        let mut controller = RecordingController::default();
        controller.device = Some(device);
        let device_uid = DeviceUid::from("dev-1");
        let config = WorkerConfig::default()
            .with_retry_policy(crate::connect_retry::ConnectRetryPolicy::new(Duration::from_millis(1), 4));

        let socket = establish(&device_uid, 1, &controller, &config).unwrap();
        assert!(socket.raw_fd() >= 0);
    }
}
