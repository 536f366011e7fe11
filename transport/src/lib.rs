//! # Transport
//!
//! A per-connection byte-stream transport worker for pairing a local
//! application with a remote device over Bluetooth RFCOMM or TCP.
//!
//! ## Architecture
//!
//! Transport is structured as a thin public surface over a dedicated core
//! crate:
//!
//! - **`transport-core`**: the worker thread, socket I/O, send queue,
//!   notifier, and controller callback surface
//! - **`transport`**: public API surface (this crate)
//!
//! Every `Connection` owns one OS thread, blocking in `poll(2)` over its
//! socket and a self-pipe wake-up channel. There is no shared runtime, no
//! async executor, and no protocol framing: the worker moves opaque byte
//! buffers and nothing more. Framing, handshakes, and protocol semantics
//! are the caller's concern, layered on top via the `Controller` callback
//! surface.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use transport::prelude::*;
//!
//! struct MyDevice { addr: std::net::SocketAddr }
//!
//! impl Device for MyDevice {
//!     fn endpoint_for(&self, _app_handle: AppHandle) -> Option<Endpoint> {
//!         Some(Endpoint::Tcp(self.addr))
//!     }
//!     fn address(&self) -> BdAddr { BdAddr([0; 6]) }
//! }
//!
//! # fn example() -> transport::Result<()> {
//! let device: Arc<dyn Device> = Arc::new(MyDevice { addr: "127.0.0.1:5555".parse().unwrap() });
//! let (controller, monitor) = ChannelController::new(device);
//!
//! let mut conn = Connection::new("device-1", 1)?;
//! conn.start(Arc::new(controller), WorkerConfig::default())?;
//! conn.send_data(RawMessage::new(b"hello".to_vec()))?;
//!
//! for event in monitor.iter() {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Safety
//!
//! `unsafe` code is isolated to `transport-core`'s `notifier`, `socket`, and
//! `worker` modules, each gated behind `#![allow(unsafe_code)]` against an
//! otherwise crate-wide `#![deny(unsafe_code)]`. This crate itself contains
//! no `unsafe` code.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]

// Re-export core types.
pub use bytes::Bytes;
pub use transport_core::config::WorkerConfig;
pub use transport_core::connect_retry::ConnectRetryPolicy;
pub use transport_core::connection::Connection;
pub use transport_core::controller::{
    AppHandle, ChannelController, ConnectionEvent, ConnectionMonitor, Controller, Device,
    DeviceUid,
};
pub use transport_core::endpoint::{BdAddr, Endpoint, EndpointError};
pub use transport_core::error::{Result, TransportError};
pub use transport_core::raw_message::RawMessage;

/// Development helpers (benches/tests).
pub mod dev_tracing;

/// Convenience re-export of every commonly used type.
pub mod prelude {
    pub use transport_core::prelude::*;
}
