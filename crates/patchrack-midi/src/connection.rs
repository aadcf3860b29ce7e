//! MIDI port discovery and connection
//!
//! Uses midir for cross-platform MIDI I/O (ALSA on Linux, CoreMIDI on
//! macOS, WinMM on Windows). All input ports feed one bounded flume
//! channel; outputs are held per endpoint and addressed by port name.

use std::collections::HashMap;
use std::sync::Mutex;

use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};

use crate::transport::{MidiTransport, TransportError};
use crate::types::{EndpointId, RawMessage};

/// Inbound queue depth; the midir callback drops messages beyond this
/// rather than block inside the driver thread
const INBOUND_QUEUE_CAPACITY: usize = 1024;

/// Error type for MIDI connection setup
#[derive(Debug, thiserror::Error)]
pub enum MidiOpenError {
    #[error("Failed to initialize MIDI input: {0}")]
    InputInit(String),

    #[error("Failed to initialize MIDI output: {0}")]
    OutputInit(String),

    #[error("Failed to connect to MIDI port {0}: {1}")]
    Connection(String, String),

    #[error("Failed to get port info: {0}")]
    PortInfo(String),
}

/// The hardware-backed transport
///
/// Opens every input port on the system and every output port. An endpoint
/// is an output port name; inbound messages carry the name of the input
/// port they arrived on. Matching DIN or USB interfaces expose the same
/// name on both sides, which is what ties a probe to its response.
pub struct MidirTransport {
    // Held so the callbacks stay alive
    _inputs: Vec<MidiInputConnection<()>>,
    outputs: Mutex<HashMap<EndpointId, MidiOutputConnection>>,
    endpoints: Vec<EndpointId>,
    rx: flume::Receiver<RawMessage>,
}

impl MidirTransport {
    /// Open all MIDI ports on the system
    pub fn open() -> Result<Self, MidiOpenError> {
        let (tx, rx) = flume::bounded(INBOUND_QUEUE_CAPACITY);

        let mut inputs = Vec::new();
        for name in Self::list_input_ports()? {
            let mut midi_in = MidiInput::new("patchrack-in")
                .map_err(|e| MidiOpenError::InputInit(e.to_string()))?;
            // Sysex filtering is on by default and would eat every dump
            midi_in.ignore(Ignore::None);

            let Some(port) = midi_in.ports().into_iter().find(|p| {
                midi_in
                    .port_name(p)
                    .map(|n| n == name)
                    .unwrap_or(false)
            }) else {
                // Port disappeared between enumeration and connect
                log::warn!("MIDI: input port vanished: {}", name);
                continue;
            };

            let endpoint = name.clone();
            let sender = tx.clone();
            let conn = midi_in
                .connect(
                    &port,
                    "patchrack-input",
                    move |timestamp, bytes, _| {
                        let msg = RawMessage::new(endpoint.clone(), bytes.to_vec(), timestamp);
                        if sender.try_send(msg).is_err() {
                            log::warn!("MIDI: inbound queue full, dropping message");
                        }
                    },
                    (),
                )
                .map_err(|e| MidiOpenError::Connection(name.clone(), e.to_string()))?;

            log::info!("MIDI: listening on input port: {}", name);
            inputs.push(conn);
        }

        let mut outputs = HashMap::new();
        for name in Self::list_output_ports()? {
            let midi_out = MidiOutput::new("patchrack-out")
                .map_err(|e| MidiOpenError::OutputInit(e.to_string()))?;

            let Some(port) = midi_out.ports().into_iter().find(|p| {
                midi_out
                    .port_name(p)
                    .map(|n| n == name)
                    .unwrap_or(false)
            }) else {
                log::warn!("MIDI: output port vanished: {}", name);
                continue;
            };

            match midi_out.connect(&port, "patchrack-output") {
                Ok(conn) => {
                    log::info!("MIDI: opened output port: {}", name);
                    outputs.insert(name, conn);
                }
                Err(e) => {
                    log::warn!("MIDI: failed to open output {}: {}", name, e);
                }
            }
        }

        let mut endpoints: Vec<EndpointId> = outputs.keys().cloned().collect();
        endpoints.sort();

        Ok(Self {
            _inputs: inputs,
            outputs: Mutex::new(outputs),
            endpoints,
            rx,
        })
    }

    /// List all available MIDI input port names
    pub fn list_input_ports() -> Result<Vec<String>, MidiOpenError> {
        let midi_in = MidiInput::new("patchrack-list")
            .map_err(|e| MidiOpenError::InputInit(e.to_string()))?;
        Ok(midi_in
            .ports()
            .iter()
            .filter_map(|port| midi_in.port_name(port).ok())
            .collect())
    }

    /// List all available MIDI output port names
    pub fn list_output_ports() -> Result<Vec<String>, MidiOpenError> {
        let midi_out = MidiOutput::new("patchrack-list")
            .map_err(|e| MidiOpenError::OutputInit(e.to_string()))?;
        Ok(midi_out
            .ports()
            .iter()
            .filter_map(|port| midi_out.port_name(port).ok())
            .collect())
    }
}

impl MidiTransport for MidirTransport {
    fn endpoints(&self) -> Vec<EndpointId> {
        self.endpoints.clone()
    }

    fn send(&self, endpoint: &EndpointId, bytes: &[u8]) -> Result<(), TransportError> {
        let mut outputs = self
            .outputs
            .lock()
            .map_err(|_| TransportError::Closed)?;
        let conn = outputs
            .get_mut(endpoint)
            .ok_or_else(|| TransportError::UnknownEndpoint(endpoint.clone()))?;
        conn.send(bytes).map_err(|e| TransportError::SendFailed {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        })
    }

    fn receiver(&self) -> flume::Receiver<RawMessage> {
        self.rx.clone()
    }
}
