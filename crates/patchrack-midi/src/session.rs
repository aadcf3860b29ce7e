//! Per-device message session
//!
//! Once detection has pinned a device to an endpoint and channel, a
//! `DeviceSession` owns all further traffic with it: routing inbound
//! messages into parameter events or decoded patch dumps, and issuing the
//! outbound dump requests. Each session carries its own assembly state, so
//! two devices interleaving on different channels never corrupt each other.

use std::mem;
use std::sync::Arc;

use crate::assembler::AssemblerState;
use crate::synths::{descriptor_for, DeviceDescriptor, PatchDump};
use crate::transport::{MidiTransport, TransportError};
use crate::types::{DeviceIdentity, ParameterEvent, RawMessage};

/// Something a device said that the librarian cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A fully assembled parameter change
    Parameter(ParameterEvent),
    /// A decoded edit buffer or program dump
    PatchDump(PatchDump),
}

/// Live conversation with one detected device
pub struct DeviceSession {
    identity: DeviceIdentity,
    descriptor: Arc<dyn DeviceDescriptor>,
    assembler: AssemblerState,
}

impl DeviceSession {
    pub fn new(identity: DeviceIdentity) -> Self {
        let descriptor = descriptor_for(identity.model);
        Self {
            identity,
            descriptor,
            assembler: AssemblerState::default(),
        }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn descriptor(&self) -> &Arc<dyn DeviceDescriptor> {
        &self.descriptor
    }

    /// Route one inbound message through this session
    ///
    /// Messages from other endpoints are ignored without touching any
    /// assembly in progress. Sysex goes to the dump decoder; everything
    /// else goes through the parameter assembler.
    pub fn handle_message(&mut self, msg: &RawMessage) -> Option<SessionEvent> {
        if msg.endpoint != self.identity.endpoint {
            return None;
        }
        if msg.is_sysex() {
            return self
                .descriptor
                .decode_patch_dump(msg)
                .map(SessionEvent::PatchDump);
        }
        let state = mem::take(&mut self.assembler);
        let (event, next) = self
            .descriptor
            .decode_parameter_message(&self.identity, msg, state);
        self.assembler = next;
        event.map(SessionEvent::Parameter)
    }

    /// Ask the device for its edit buffer
    pub fn request_edit_buffer(&self, transport: &dyn MidiTransport) -> Result<(), TransportError> {
        transport.send(&self.identity.endpoint, &self.descriptor.edit_buffer_request())
    }

    /// Ask the device for one stored program
    pub fn request_patch(
        &self,
        transport: &dyn MidiTransport,
        program: u32,
    ) -> Result<(), TransportError> {
        transport.send(
            &self.identity.endpoint,
            &self.descriptor.patch_dump_request(program),
        )
    }

    /// Push a patch into the device's edit buffer for auditioning
    pub fn send_to_edit_buffer(
        &self,
        transport: &dyn MidiTransport,
        dump: &PatchDump,
    ) -> Result<(), TransportError> {
        let Some(bytes) = self.descriptor.convert_to_edit_buffer(dump) else {
            return Err(TransportError::SendFailed {
                endpoint: self.identity.endpoint.clone(),
                reason: "dump cannot be converted to an edit buffer".into(),
            });
        };
        transport.send(&self.identity.endpoint, &bytes)
    }

    /// Write a patch into one of the device's stored program slots
    pub fn send_to_program(
        &self,
        transport: &dyn MidiTransport,
        dump: &PatchDump,
        program: u32,
    ) -> Result<(), TransportError> {
        let Some(bytes) = self.descriptor.convert_to_program_dump(dump, program) else {
            return Err(TransportError::SendFailed {
                endpoint: self.identity.endpoint.clone(),
                reason: "dump cannot be converted to a program dump".into(),
            });
        };
        transport.send(&self.identity.endpoint, &bytes)
    }
}
