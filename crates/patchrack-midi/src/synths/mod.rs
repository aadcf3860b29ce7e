//! Device descriptor registry
//!
//! One descriptor per supported synthesizer model. Each descriptor owns its
//! model's wire formats: identity probe and response signature, NRPN
//! semantics, and bulk patch dump encode/decode. The detection engine and
//! the assembler stay model-agnostic by only talking to this trait.

pub mod dsi;
pub mod rev2;
pub mod toraiz_as1;

use crate::assembler::{AssemblerState, NrpnRole};
use crate::types::{DeviceIdentity, ParameterEvent, RawMessage};
use patchrack_core::SynthModel;
use std::sync::Arc;

/// A decoded bulk patch dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchDump {
    pub model: SynthModel,
    /// Name read from the embedded name field, trimmed
    pub name: String,
    /// The sysex message as received, byte for byte (stored in the library)
    pub raw: Vec<u8>,
    /// The unpacked 8-bit data block
    pub data: Vec<u8>,
}

/// Capability interface implemented once per synthesizer model
///
/// All decode paths are total over arbitrary byte garbage: a non-matching
/// or malformed message is `None`, never a panic.
pub trait DeviceDescriptor: Send + Sync {
    fn model(&self) -> SynthModel;

    /// Outbound identity probe for this model
    fn identity_request(&self) -> Vec<u8>;

    /// Identity, if and only if the message matches this model's response
    /// signature on some channel
    fn match_identity_response(&self, msg: &RawMessage) -> Option<DeviceIdentity>;

    /// Advance the NRPN assembly machine by one raw message
    ///
    /// Messages on the wrong channel or outside the parameter-change
    /// protocol leave the state untouched.
    fn decode_parameter_message(
        &self,
        identity: &DeviceIdentity,
        msg: &RawMessage,
        state: AssemblerState,
    ) -> (Option<ParameterEvent>, AssemblerState);

    /// Request the edit buffer contents
    fn edit_buffer_request(&self) -> Vec<u8>;

    /// Request one stored program; `program` counts linearly across banks
    fn patch_dump_request(&self, program: u32) -> Vec<u8>;

    /// Decode a bulk dump message (edit buffer or program dump)
    fn decode_patch_dump(&self, msg: &RawMessage) -> Option<PatchDump>;

    /// Normalized bytes for fingerprinting: the data block with the
    /// embedded name field blanked, so renames don't change identity
    fn normalize_for_fingerprint(&self, dump: &PatchDump) -> Vec<u8>;

    /// Rebuild a dump message with a new embedded name
    fn rename_patch(&self, dump: &PatchDump, name: &str) -> Vec<u8>;

    /// Convert any dump form into an edit-buffer dump for auditioning
    fn convert_to_edit_buffer(&self, dump: &PatchDump) -> Option<Vec<u8>>;

    /// Convert any dump form into a program dump addressed to one stored
    /// slot, for writing a patch into device memory
    fn convert_to_program_dump(&self, dump: &PatchDump, program: u32) -> Option<Vec<u8>>;

    fn bank_size(&self) -> u32;

    fn number_of_banks(&self) -> u32;

    /// Program label as shown on the device front panel
    fn friendly_program_name(&self, program: u32) -> String;
}

/// All supported descriptors, in detection offer order
pub fn all_descriptors() -> Vec<Arc<dyn DeviceDescriptor>> {
    vec![
        Arc::new(rev2::Rev2::new()),
        Arc::new(rev2::Ob6::new()),
        Arc::new(toraiz_as1::ToraizAs1::new()),
    ]
}

/// Descriptors for the given model tags; an empty list means all
pub fn enabled_descriptors(tags: &[String]) -> Vec<Arc<dyn DeviceDescriptor>> {
    if tags.is_empty() {
        return all_descriptors();
    }
    all_descriptors()
        .into_iter()
        .filter(|d| tags.iter().any(|tag| tag == d.model().tag()))
        .collect()
}

/// Descriptor for one model
pub fn descriptor_for(model: SynthModel) -> Arc<dyn DeviceDescriptor> {
    match model {
        SynthModel::Rev2 => Arc::new(rev2::Rev2::new()),
        SynthModel::Ob6 => Arc::new(rev2::Ob6::new()),
        SynthModel::ToraizAs1 => Arc::new(toraiz_as1::ToraizAs1::new()),
    }
}

/// Shared NRPN decode used by every model that speaks standard NRPN
///
/// Filters on the device's channel, classifies the CC role and advances the
/// assembly state. Non-CC messages and foreign CCs pass through untouched.
pub(crate) fn decode_nrpn(
    identity: &DeviceIdentity,
    msg: &RawMessage,
    state: AssemblerState,
) -> (Option<ParameterEvent>, AssemblerState) {
    let Some((channel, cc, value)) = msg.as_control_change() else {
        return (None, state);
    };
    if channel != identity.channel {
        return (None, state);
    }
    let Some(role) = NrpnRole::from_cc(cc) else {
        return (None, state);
    };

    let (completed, next) = state.advance(role, value);
    let event = completed.map(|(controller, value)| ParameterEvent {
        device: identity.clone(),
        controller,
        value,
        timestamp: msg.timestamp,
    });
    (event, next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_covers_all_models() {
        let descriptors = all_descriptors();
        let mut models: Vec<SynthModel> = descriptors.iter().map(|d| d.model()).collect();
        models.sort();
        assert_eq!(models, SynthModel::all());
    }

    #[test]
    fn test_enabled_descriptors_filter() {
        assert_eq!(enabled_descriptors(&[]).len(), all_descriptors().len());

        let only_ob6 = enabled_descriptors(&["ob6".to_string()]);
        assert_eq!(only_ob6.len(), 1);
        assert_eq!(only_ob6[0].model(), SynthModel::Ob6);

        assert!(enabled_descriptors(&["dx7".to_string()]).is_empty());
    }

    #[test]
    fn test_identity_probes_are_well_formed_sysex() {
        for descriptor in all_descriptors() {
            let probe = descriptor.identity_request();
            assert_eq!(probe.first(), Some(&0xF0), "{}", descriptor.model());
            assert_eq!(probe.last(), Some(&0xF7), "{}", descriptor.model());
        }
    }

    #[test]
    fn test_no_descriptor_matches_garbage() {
        let garbage: &[&[u8]] = &[
            &[],
            &[0xF0],
            &[0xF0, 0xF7],
            &[0x00, 0x01, 0x02],
            &[0xF0, 0x7E, 0x00, 0x06, 0x02, 0xF7],
            &[0xFF; 64],
        ];
        for descriptor in all_descriptors() {
            for bytes in garbage {
                let msg = RawMessage::new("ep", bytes.to_vec(), 0);
                assert!(
                    descriptor.match_identity_response(&msg).is_none(),
                    "{} matched garbage {:02X?}",
                    descriptor.model(),
                    bytes
                );
                assert!(descriptor.decode_patch_dump(&msg).is_none());
            }
        }
    }
}
