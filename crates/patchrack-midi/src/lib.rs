//! MIDI device support for the patchrack librarian
//!
//! This crate provides:
//! - MIDI port connection and sysex I/O via midir
//! - Synthesizer auto-detection over identity probes
//! - Per-model device descriptors (wire formats, name fields, banks)
//! - NRPN parameter assembly from CC half-messages
//! - Patch dump request/decode for library import
//!
//! # Architecture
//!
//! ```text
//! MIDI device → midir callback → flume channel → SynthManager.drain() → app
//! ```
//!
//! The midir callback is synchronous and per-port; every port feeds one
//! bounded flume channel, so a single consumer sees each device's messages
//! in true arrival order. `SynthManager` routes drained messages into the
//! per-device sessions created by detection.

pub mod assembler;
mod connection;
pub mod detection;
mod session;
pub mod synths;
pub mod sysex;
mod transport;
mod types;

pub use connection::{MidiOpenError, MidirTransport};
pub use detection::{
    detect_devices, detect_devices_with, CancelToken, DetectionReport, ProbeFailure,
    DEFAULT_DETECTION_WINDOW,
};
pub use session::{DeviceSession, SessionEvent};
pub use synths::{all_descriptors, descriptor_for, enabled_descriptors, DeviceDescriptor, PatchDump};
pub use transport::{MidiTransport, TransportError};
pub use types::{DeviceIdentity, EndpointId, ParameterEvent, RawMessage};

use std::time::Duration;

/// Error type for manager-level operations
#[derive(Debug, thiserror::Error)]
pub enum MidiError {
    #[error("MIDI connection error: {0}")]
    Open(#[from] MidiOpenError),

    #[error("MIDI transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("No detected device: {0}")]
    UnknownDevice(String),
}

/// Main synthesizer manager
///
/// Owns the transport, runs detection passes and routes inbound traffic
/// into per-device sessions. Designed for polling from an application
/// event loop via `try_recv`/`drain`.
pub struct SynthManager {
    transport: Box<dyn MidiTransport>,
    sessions: Vec<DeviceSession>,
    receiver: flume::Receiver<RawMessage>,
    /// Events produced but not yet handed out; one raw message can yield
    /// one event per session when devices share an endpoint and channel
    pending: std::collections::VecDeque<SessionEvent>,
}

impl SynthManager {
    /// Create a manager over an already opened transport
    pub fn new(transport: Box<dyn MidiTransport>) -> Self {
        let receiver = transport.receiver();
        Self {
            transport,
            sessions: Vec::new(),
            receiver,
            pending: std::collections::VecDeque::new(),
        }
    }

    /// Open the system MIDI ports and create a manager over them
    pub fn open() -> Result<Self, MidiError> {
        Ok(Self::new(Box::new(MidirTransport::open()?)))
    }

    /// Run one detection pass, replacing the active sessions
    ///
    /// Blocks for up to `window`. Devices that were connected before and
    /// still answer keep working; devices that no longer answer are
    /// dropped along with any half-assembled parameter state. A cancelled
    /// pass leaves the previous sessions untouched.
    pub fn detect(&mut self, window: Duration, cancel: &CancelToken) -> DetectionReport {
        let report = detect_devices(self.transport.as_ref(), window, cancel);
        self.install_sessions(&report);
        report
    }

    /// Detection pass driven by the librarian config: honors the
    /// configured window and the enabled-model restriction
    pub fn detect_with_config(
        &mut self,
        config: &patchrack_core::config::LibrarianConfig,
        cancel: &CancelToken,
    ) -> DetectionReport {
        let descriptors = enabled_descriptors(&config.enabled_models);
        let report = detect_devices_with(
            self.transport.as_ref(),
            &descriptors,
            config.detection_window(),
            cancel,
        );
        self.install_sessions(&report);
        report
    }

    fn install_sessions(&mut self, report: &DetectionReport) {
        // An aborted pass has only a partial device set; keep what we had
        if report.cancelled {
            return;
        }
        self.sessions = report
            .devices
            .iter()
            .cloned()
            .map(DeviceSession::new)
            .collect();
    }

    /// Identities of the currently connected devices
    pub fn devices(&self) -> Vec<DeviceIdentity> {
        self.sessions.iter().map(|s| s.identity().clone()).collect()
    }

    pub fn is_connected(&self) -> bool {
        !self.sessions.is_empty()
    }

    /// Try to receive the next session event (non-blocking)
    ///
    /// Every raw message is offered to every session, so devices sharing
    /// an endpoint and channel each see the complete stream. Messages that
    /// decode to nothing are consumed silently.
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            let msg = self.receiver.try_recv().ok()?;
            for session in &mut self.sessions {
                if let Some(event) = session.handle_message(&msg) {
                    self.pending.push_back(event);
                }
            }
        }
    }

    /// Drain all pending session events
    pub fn drain(&mut self) -> Vec<SessionEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Ask one device for its edit buffer
    pub fn request_edit_buffer(&self, device: &DeviceIdentity) -> Result<(), MidiError> {
        self.session_for(device)?
            .request_edit_buffer(self.transport.as_ref())
            .map_err(MidiError::from)
    }

    /// Ask one device for a stored program, counted linearly across banks
    pub fn request_patch(&self, device: &DeviceIdentity, program: u32) -> Result<(), MidiError> {
        self.session_for(device)?
            .request_patch(self.transport.as_ref(), program)
            .map_err(MidiError::from)
    }

    /// Push a patch into a device's edit buffer for auditioning
    pub fn send_to_edit_buffer(
        &self,
        device: &DeviceIdentity,
        dump: &PatchDump,
    ) -> Result<(), MidiError> {
        self.session_for(device)?
            .send_to_edit_buffer(self.transport.as_ref(), dump)
            .map_err(MidiError::from)
    }

    /// Write a patch into one of a device's stored program slots
    pub fn send_to_program(
        &self,
        device: &DeviceIdentity,
        dump: &PatchDump,
        program: u32,
    ) -> Result<(), MidiError> {
        self.session_for(device)?
            .send_to_program(self.transport.as_ref(), dump, program)
            .map_err(MidiError::from)
    }

    fn session_for(&self, device: &DeviceIdentity) -> Result<&DeviceSession, MidiError> {
        self.sessions
            .iter()
            .find(|s| s.identity() == device)
            .ok_or_else(|| MidiError::UnknownDevice(device.display_name.clone()))
    }
}
