//! `RawMessage`: an opaque owned byte buffer that crosses the worker boundary.
//!
//! The worker never inspects these bytes. Framing/reassembly is the caller's
//! concern; this layer only moves buffers between producers and the wire.

use bytes::Bytes;

/// An outbound or inbound opaque byte frame.
#[derive(Debug, Clone)]
pub struct RawMessage {
    bytes: Bytes,
    /// Routing key for the connection this message belongs to, if the
    /// caller tags one. Unused by the worker itself.
    pub connection_key: Option<u32>,
    /// Protocol version tag, opaque to the worker.
    pub version: u8,
}

impl RawMessage {
    /// Construct an outbound message from any owned byte source.
    #[must_use]
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            connection_key: None,
            version: 0,
        }
    }

    /// Construct a message with an explicit connection key and version, the
    /// shape the worker builds for every inbound delivery
    /// (`RawMessage(connection_key=0, version=0, bytes, len)` per spec).
    #[must_use]
    pub fn with_meta(bytes: impl Into<Bytes>, connection_key: u32, version: u8) -> Self {
        Self {
            bytes: bytes.into(),
            connection_key: Some(connection_key),
            version,
        }
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn data_size(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<Vec<u8>> for RawMessage {
    fn from(v: Vec<u8>) -> Self {
        Self::new(v)
    }
}

impl From<&'static [u8]> for RawMessage {
    fn from(v: &'static [u8]) -> Self {
        Self::new(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_owned_bytes() {
        let msg = RawMessage::new(vec![1, 2, 3]);
        assert_eq!(msg.data(), &[1, 2, 3]);
        assert_eq!(msg.data_size(), 3);
        assert!(msg.connection_key.is_none());
    }

    #[test]
    fn inbound_shape_carries_meta() {
        let msg = RawMessage::with_meta(vec![4, 5], 0, 0);
        assert_eq!(msg.connection_key, Some(0));
        assert_eq!(msg.version, 0);
    }

    #[test]
    fn empty_message() {
        let msg = RawMessage::new(Vec::new());
        assert!(msg.is_empty());
    }
}
