//! Controller callback surface and the `Device` lookup it exposes.
//!
//! The core never owns or outlives its controller: the controller holds a
//! non-owning reference to every `Connection` it creates, and the
//! `Connection`/`Worker` hold a non-owning back-reference to the
//! controller, invoked synchronously from the worker thread. This mirrors
//! the "raw-pointer observer back-reference" pattern of the original
//! source, represented here as a plain object-safe trait rather than a raw
//! pointer.

use std::fmt;
use std::sync::Arc;

use crate::endpoint::{BdAddr, Endpoint};
use crate::error::TransportError;
use crate::raw_message::RawMessage;

/// Opaque device identifier, analogous to `DeviceUID` in the original
/// source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceUid(String);

impl From<&str> for DeviceUid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DeviceUid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for DeviceUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque application handle, analogous to `ApplicationHandle`.
pub type AppHandle = u32;

/// A paired remote device, consumed by the core only to resolve an
/// `Endpoint` to dial and (for Bluetooth) its address.
pub trait Device: Send + Sync {
    /// Resolve the endpoint to dial for `app_handle`, or `None` if the
    /// application is not known on this device.
    fn endpoint_for(&self, app_handle: AppHandle) -> Option<Endpoint>;

    /// The device's Bluetooth address, for RFCOMM endpoints.
    fn address(&self) -> BdAddr;
}

/// Callback surface the core invokes to report connection lifecycle and
/// data events. Implementations must not block — every method is called
/// synchronously from the worker thread and a slow handler stalls that
/// connection's I/O.
pub trait Controller: Send + Sync {
    /// Resolve a device record by UID, used during `Establish`.
    fn find_device(&self, device_uid: &DeviceUid) -> Option<Arc<dyn Device>>;

    fn connection_created(&self, device_uid: &DeviceUid, app_handle: AppHandle);
    fn connect_done(&self, device_uid: &DeviceUid, app_handle: AppHandle);
    fn data_receive_done(&self, device_uid: &DeviceUid, app_handle: AppHandle, msg: RawMessage);
    fn data_send_done(&self, device_uid: &DeviceUid, app_handle: AppHandle, msg: RawMessage);
    fn data_send_failed(
        &self,
        device_uid: &DeviceUid,
        app_handle: AppHandle,
        msg: RawMessage,
        error: TransportError,
    );
    fn connection_aborted(&self, device_uid: &DeviceUid, app_handle: AppHandle, error: TransportError);
    fn connection_finished(&self, device_uid: &DeviceUid, app_handle: AppHandle);
}

/// Domain events emitted by `ChannelController`, one per `Controller`
/// callback (excluding `find_device`, which has no channel-friendly
/// analogue since it needs a return value).
#[derive(Debug)]
pub enum ConnectionEvent {
    Created { device: DeviceUid, app: AppHandle },
    ConnectDone { device: DeviceUid, app: AppHandle },
    DataReceived { device: DeviceUid, app: AppHandle, msg: RawMessage },
    DataSent { device: DeviceUid, app: AppHandle, msg: RawMessage },
    DataSendFailed {
        device: DeviceUid,
        app: AppHandle,
        msg: RawMessage,
        error: TransportError,
    },
    Aborted { device: DeviceUid, app: AppHandle, error: TransportError },
    Finished { device: DeviceUid, app: AppHandle },
}

/// Handle for receiving connection lifecycle/data events.
pub type ConnectionMonitor = flume::Receiver<ConnectionEvent>;

/// `Controller` adapter that forwards every callback onto a `flume`
/// channel, for consumers who want to observe a connection from a
/// different thread instead of writing their own `Controller` impl. Device
/// lookup still needs a real table, since `find_device` returns a value
/// synchronously; `ChannelController` is built around one fixed device.
pub struct ChannelController {
    device: Arc<dyn Device>,
    sender: flume::Sender<ConnectionEvent>,
}

impl ChannelController {
    /// Create a controller bound to a single device, returning it paired
    /// with the receiver end of its event channel.
    #[must_use]
    pub fn new(device: Arc<dyn Device>) -> (Self, ConnectionMonitor) {
        let (sender, receiver) = flume::unbounded();
        (Self { device, sender }, receiver)
    }
}

impl Controller for ChannelController {
    fn find_device(&self, _device_uid: &DeviceUid) -> Option<Arc<dyn Device>> {
        Some(Arc::clone(&self.device))
    }

    fn connection_created(&self, device_uid: &DeviceUid, app_handle: AppHandle) {
        let _ = self.sender.send(ConnectionEvent::Created {
            device: device_uid.clone(),
            app: app_handle,
        });
    }

    fn connect_done(&self, device_uid: &DeviceUid, app_handle: AppHandle) {
        let _ = self.sender.send(ConnectionEvent::ConnectDone {
            device: device_uid.clone(),
            app: app_handle,
        });
    }

    fn data_receive_done(&self, device_uid: &DeviceUid, app_handle: AppHandle, msg: RawMessage) {
        let _ = self.sender.send(ConnectionEvent::DataReceived {
            device: device_uid.clone(),
            app: app_handle,
            msg,
        });
    }

    fn data_send_done(&self, device_uid: &DeviceUid, app_handle: AppHandle, msg: RawMessage) {
        let _ = self.sender.send(ConnectionEvent::DataSent {
            device: device_uid.clone(),
            app: app_handle,
            msg,
        });
    }

    fn data_send_failed(
        &self,
        device_uid: &DeviceUid,
        app_handle: AppHandle,
        msg: RawMessage,
        error: TransportError,
    ) {
        let _ = self.sender.send(ConnectionEvent::DataSendFailed {
            device: device_uid.clone(),
            app: app_handle,
            msg,
            error,
        });
    }

    fn connection_aborted(&self, device_uid: &DeviceUid, app_handle: AppHandle, error: TransportError) {
        let _ = self.sender.send(ConnectionEvent::Aborted {
            device: device_uid.clone(),
            app: app_handle,
            error,
        });
    }

    fn connection_finished(&self, device_uid: &DeviceUid, app_handle: AppHandle) {
        let _ = self.sender.send(ConnectionEvent::Finished {
            device: device_uid.clone(),
            app: app_handle,
        });
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use super::{AppHandle, Controller, Device, DeviceUid, RawMessage, TransportError};
    use crate::endpoint::{BdAddr, Endpoint};
    use parking_lot::Mutex;
    use std::net::SocketAddr;
    use std::sync::Arc;

    /// A `Device` that always resolves to the same TCP endpoint, for tests
    /// that drive a loopback listener instead of real Bluetooth hardware.
    pub struct TcpDevice {
        pub addr: SocketAddr,
    }

    impl Device for TcpDevice {
        fn endpoint_for(&self, _app_handle: AppHandle) -> Option<Endpoint> {
            Some(Endpoint::Tcp(self.addr))
        }

        fn address(&self) -> BdAddr {
            BdAddr([0; 6])
        }
    }

    /// A `Controller` that records every callback invocation for test
    /// assertions, mirroring the teacher's use of plain in-memory
    /// recorders in its own test suite.
    #[derive(Default)]
    pub struct RecordingController {
        pub device: Option<Arc<dyn Device>>,
        pub created: Mutex<Vec<(DeviceUid, AppHandle)>>,
        pub connect_done: Mutex<Vec<(DeviceUid, AppHandle)>>,
        pub received: Mutex<Vec<(DeviceUid, AppHandle, RawMessage)>>,
        pub sent: Mutex<Vec<(DeviceUid, AppHandle, RawMessage)>>,
        pub failed: Mutex<Vec<(RawMessage, TransportError)>>,
        pub aborted: Mutex<Vec<(DeviceUid, AppHandle, TransportError)>>,
        pub finished: Mutex<Vec<(DeviceUid, AppHandle)>>,
    }

    impl Controller for RecordingController {
        fn find_device(&self, _device_uid: &DeviceUid) -> Option<Arc<dyn Device>> {
            self.device.clone()
        }

        fn connection_created(&self, device_uid: &DeviceUid, app_handle: AppHandle) {
            self.created.lock().push((device_uid.clone(), app_handle));
        }

        fn connect_done(&self, device_uid: &DeviceUid, app_handle: AppHandle) {
            self.connect_done
                .lock()
                .push((device_uid.clone(), app_handle));
        }

        fn data_receive_done(&self, device_uid: &DeviceUid, app_handle: AppHandle, msg: RawMessage) {
            self.received
                .lock()
                .push((device_uid.clone(), app_handle, msg));
        }

        fn data_send_done(&self, device_uid: &DeviceUid, app_handle: AppHandle, msg: RawMessage) {
            self.sent.lock().push((device_uid.clone(), app_handle, msg));
        }

        fn data_send_failed(
            &self,
            _device_uid: &DeviceUid,
            _app_handle: AppHandle,
            msg: RawMessage,
            error: TransportError,
        ) {
            self.failed.lock().push((msg, error));
        }

        fn connection_aborted(
            &self,
            device_uid: &DeviceUid,
            app_handle: AppHandle,
            error: TransportError,
        ) {
            self.aborted
                .lock()
                .push((device_uid.clone(), app_handle, error));
        }

        fn connection_finished(&self, device_uid: &DeviceUid, app_handle: AppHandle) {
            self.finished
                .lock()
                .push((device_uid.clone(), app_handle));
        }
    }
}
