//! Transport Core
//!
//! Per-connection byte-stream transport worker: one OS thread per
//! connection, blocking `poll(2)` over the socket and a self-pipe, a
//! mutex-protected FIFO send queue, and an observer/controller callback
//! surface for connection lifecycle and data events.
//!
//! - Remote addressing (`endpoint`)
//! - Opaque wire buffers (`raw_message`)
//! - Cross-thread wake-up (`notifier`)
//! - Producer-side FIFO (`send_queue`)
//! - Controller/device callback surface (`controller`)
//! - Bounded connect retry (`connect_retry`)
//! - Per-worker tunables (`config`)
//! - Raw socket connect/send/recv (`socket`)
//! - The worker thread itself (`worker`)
//! - The public connection handle (`connection`)
//! - Error types (`error`)

#![deny(unsafe_code)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::needless_pass_by_ref_mut)]
#![allow(clippy::match_same_arms)]

pub mod config;
pub mod connect_retry;
pub mod connection;
pub mod controller;
pub mod endpoint;
pub mod error;
pub mod notifier;
pub mod raw_message;
pub mod send_queue;
pub mod socket;
pub mod worker;

/// A small prelude to make downstream crates ergonomic. Kept minimal to
/// avoid API lock-in.
pub mod prelude {
    pub use crate::config::WorkerConfig;
    pub use crate::connect_retry::ConnectRetryPolicy;
    pub use crate::connection::Connection;
    pub use crate::controller::{
        AppHandle, ChannelController, ConnectionEvent, ConnectionMonitor, Controller, Device,
        DeviceUid,
    };
    pub use crate::endpoint::{BdAddr, Endpoint, EndpointError};
    pub use crate::error::{Result, TransportError};
    pub use crate::raw_message::RawMessage;
}
