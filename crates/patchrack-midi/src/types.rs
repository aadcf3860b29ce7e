//! Wire-level and identity types shared across the MIDI subsystems

use patchrack_core::SynthModel;

/// Opaque identifier of a logical transport endpoint (one MIDI port pair)
pub type EndpointId = String;

/// One inbound MIDI message, as delivered by the transport
///
/// Transient: consumed by the assembler or detection engine and discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Endpoint the message arrived on
    pub endpoint: EndpointId,
    /// Complete message bytes (status byte included; sysex runs F0..F7)
    pub bytes: Vec<u8>,
    /// Driver timestamp in microseconds, monotonic per endpoint
    pub timestamp: u64,
}

impl RawMessage {
    pub fn new(endpoint: impl Into<EndpointId>, bytes: Vec<u8>, timestamp: u64) -> Self {
        Self {
            endpoint: endpoint.into(),
            bytes,
            timestamp,
        }
    }

    /// True if this is a system exclusive message (complete framing)
    pub fn is_sysex(&self) -> bool {
        self.bytes.first() == Some(&0xF0) && self.bytes.last() == Some(&0xF7)
    }

    /// Control change decomposition: (channel, controller, value)
    pub fn as_control_change(&self) -> Option<(u8, u8, u8)> {
        match self.bytes.as_slice() {
            [status, cc, value] if status & 0xF0 == 0xB0 => {
                Some((status & 0x0F, *cc, *value))
            }
            _ => None,
        }
    }
}

/// Identity of one physically distinguishable device
///
/// Produced by auto-detection; never persisted. Two devices of the same
/// model on different channels (or endpoints) get distinct identities.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DeviceIdentity {
    pub model: SynthModel,
    /// MIDI channel the device answers on (0-15)
    pub channel: u8,
    /// Endpoint the identity response was observed on
    pub endpoint: EndpointId,
    /// Display name, e.g. "Sequential Prophet Rev2 (ch. 2)"
    pub display_name: String,
}

impl DeviceIdentity {
    pub fn new(model: SynthModel, channel: u8, endpoint: impl Into<EndpointId>) -> Self {
        Self {
            model,
            channel,
            endpoint: endpoint.into(),
            display_name: format!("{} (ch. {})", model.display_name(), channel + 1),
        }
    }
}

/// One fully assembled parameter change
///
/// Emitted by the message assembler only once every constituent half has
/// been observed; never emitted partially.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterEvent {
    /// Device the change originated from
    pub device: DeviceIdentity,
    /// Combined 14-bit controller number
    pub controller: u16,
    /// Combined value; signedness is device-defined, widened here
    pub value: i32,
    /// Timestamp of the message that completed the assembly
    pub timestamp: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_control_change() {
        let msg = RawMessage::new("ep", vec![0xB2, 0x63, 0x01], 0);
        assert_eq!(msg.as_control_change(), Some((2, 0x63, 0x01)));

        let note_on = RawMessage::new("ep", vec![0x90, 0x3C, 0x7F], 0);
        assert_eq!(note_on.as_control_change(), None);

        let short = RawMessage::new("ep", vec![0xB0], 0);
        assert_eq!(short.as_control_change(), None);
    }

    #[test]
    fn test_is_sysex() {
        assert!(RawMessage::new("ep", vec![0xF0, 0x01, 0xF7], 0).is_sysex());
        assert!(!RawMessage::new("ep", vec![0xB0, 0x63, 0x01], 0).is_sysex());
        assert!(!RawMessage::new("ep", vec![], 0).is_sysex());
    }

    #[test]
    fn test_identity_display_name() {
        let id = DeviceIdentity::new(SynthModel::Rev2, 1, "ep");
        assert_eq!(id.display_name, "Sequential Prophet Rev2 (ch. 2)");
    }
}
