//! Transport adapter boundary
//!
//! The physical channel is abstracted behind `MidiTransport`: outbound sends
//! addressed to an opaque endpoint, inbound messages delivered through one
//! ordered flume channel. The midir-backed implementation lives in
//! `connection.rs`; tests use scripted in-memory transports.

use crate::types::{EndpointId, RawMessage};

/// Error type for transport operations
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(EndpointId),

    #[error("Send failed on {endpoint}: {reason}")]
    SendFailed { endpoint: EndpointId, reason: String },

    #[error("Transport closed")]
    Closed,
}

/// Abstraction over the physical MIDI channel
///
/// Implementations must deliver inbound messages for one endpoint in true
/// arrival order; the single flume consumer preserves that order downstream.
pub trait MidiTransport: Send {
    /// Endpoints currently reachable through this transport
    fn endpoints(&self) -> Vec<EndpointId>;

    /// Send raw bytes to one endpoint
    fn send(&self, endpoint: &EndpointId, bytes: &[u8]) -> Result<(), TransportError>;

    /// The ordered inbound message stream
    ///
    /// Cloning the receiver is cheap, but only a single consumer may drain
    /// it; competing consumers would interleave a device's stream.
    fn receiver(&self) -> flume::Receiver<RawMessage>;
}
