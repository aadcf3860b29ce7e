//! Sequential Prophet Rev2 and OB-6 descriptors
//!
//! Both are DSI-family instruments; everything except family id, bank
//! layout and name field position is shared through `dsi::DsiFamily`.

use super::dsi::DsiFamily;
use super::{decode_nrpn, DeviceDescriptor, PatchDump};
use crate::assembler::AssemblerState;
use crate::sysex;
use crate::types::{DeviceIdentity, ParameterEvent, RawMessage};
use patchrack_core::SynthModel;

/// Sequential Prophet Rev2
pub struct Rev2 {
    family: DsiFamily,
}

impl Rev2 {
    pub fn new() -> Self {
        Self {
            family: DsiFamily {
                model: SynthModel::Rev2,
                family_id: 0x2F,
                name_offset: 235,
                name_len: 20,
                bank_size: 128,
                number_of_banks: 8,
            },
        }
    }
}

impl Default for Rev2 {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceDescriptor for Rev2 {
    fn model(&self) -> SynthModel {
        SynthModel::Rev2
    }

    fn identity_request(&self) -> Vec<u8> {
        self.family.identity_request()
    }

    fn match_identity_response(&self, msg: &RawMessage) -> Option<DeviceIdentity> {
        self.family.match_identity_response(msg)
    }

    fn decode_parameter_message(
        &self,
        identity: &DeviceIdentity,
        msg: &RawMessage,
        state: AssemblerState,
    ) -> (Option<ParameterEvent>, AssemblerState) {
        decode_nrpn(identity, msg, state)
    }

    fn edit_buffer_request(&self) -> Vec<u8> {
        self.family.edit_buffer_request()
    }

    fn patch_dump_request(&self, program: u32) -> Vec<u8> {
        self.family.program_dump_request(program)
    }

    fn decode_patch_dump(&self, msg: &RawMessage) -> Option<PatchDump> {
        decode_family_dump(&self.family, msg)
    }

    fn normalize_for_fingerprint(&self, dump: &PatchDump) -> Vec<u8> {
        blank_name(&self.family, dump)
    }

    fn rename_patch(&self, dump: &PatchDump, name: &str) -> Vec<u8> {
        rename_in_family(&self.family, dump, name)
    }

    fn convert_to_edit_buffer(&self, dump: &PatchDump) -> Option<Vec<u8>> {
        self.family.to_edit_buffer(&dump.raw)
    }

    fn convert_to_program_dump(&self, dump: &PatchDump, program: u32) -> Option<Vec<u8>> {
        self.family.to_program_dump(&dump.raw, program)
    }

    fn bank_size(&self) -> u32 {
        self.family.bank_size
    }

    fn number_of_banks(&self) -> u32 {
        self.family.number_of_banks
    }

    /// Banks show as U1-U4 (user) and F1-F4 (factory) on the panel
    fn friendly_program_name(&self, program: u32) -> String {
        let (bank, patch) = self.family.split_program(program);
        let label = if bank < 4 {
            format!("U{}", bank + 1)
        } else {
            format!("F{}", bank - 3)
        };
        format!("{} P{}", label, patch + 1)
    }
}

/// Sequential OB-6
pub struct Ob6 {
    family: DsiFamily,
}

impl Ob6 {
    pub fn new() -> Self {
        Self {
            family: DsiFamily {
                model: SynthModel::Ob6,
                family_id: 0x2E,
                name_offset: 107,
                name_len: 20,
                bank_size: 100,
                number_of_banks: 10,
            },
        }
    }
}

impl Default for Ob6 {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceDescriptor for Ob6 {
    fn model(&self) -> SynthModel {
        SynthModel::Ob6
    }

    fn identity_request(&self) -> Vec<u8> {
        self.family.identity_request()
    }

    fn match_identity_response(&self, msg: &RawMessage) -> Option<DeviceIdentity> {
        self.family.match_identity_response(msg)
    }

    fn decode_parameter_message(
        &self,
        identity: &DeviceIdentity,
        msg: &RawMessage,
        state: AssemblerState,
    ) -> (Option<ParameterEvent>, AssemblerState) {
        decode_nrpn(identity, msg, state)
    }

    fn edit_buffer_request(&self) -> Vec<u8> {
        self.family.edit_buffer_request()
    }

    fn patch_dump_request(&self, program: u32) -> Vec<u8> {
        self.family.program_dump_request(program)
    }

    fn decode_patch_dump(&self, msg: &RawMessage) -> Option<PatchDump> {
        decode_family_dump(&self.family, msg)
    }

    fn normalize_for_fingerprint(&self, dump: &PatchDump) -> Vec<u8> {
        blank_name(&self.family, dump)
    }

    fn rename_patch(&self, dump: &PatchDump, name: &str) -> Vec<u8> {
        rename_in_family(&self.family, dump, name)
    }

    fn convert_to_edit_buffer(&self, dump: &PatchDump) -> Option<Vec<u8>> {
        self.family.to_edit_buffer(&dump.raw)
    }

    fn convert_to_program_dump(&self, dump: &PatchDump, program: u32) -> Option<Vec<u8>> {
        self.family.to_program_dump(&dump.raw, program)
    }

    fn bank_size(&self) -> u32 {
        self.family.bank_size
    }

    fn number_of_banks(&self) -> u32 {
        self.family.number_of_banks
    }

    fn friendly_program_name(&self, program: u32) -> String {
        let (bank, patch) = self.family.split_program(program);
        format!("{}{:02}", bank, patch)
    }
}

fn decode_family_dump(family: &DsiFamily, msg: &RawMessage) -> Option<PatchDump> {
    if !msg.is_sysex() {
        return None;
    }
    let (_, data) = family.extract_data_block(&msg.bytes)?;
    let name = sysex::read_name_field(&data, family.name_offset, family.name_len);
    Some(PatchDump {
        model: family.model,
        name,
        raw: msg.bytes.clone(),
        data,
    })
}

fn blank_name(family: &DsiFamily, dump: &PatchDump) -> Vec<u8> {
    let mut data = dump.data.clone();
    sysex::write_name_field(&mut data, family.name_offset, family.name_len, "");
    data
}

fn rename_in_family(family: &DsiFamily, dump: &PatchDump, name: &str) -> Vec<u8> {
    let mut data = dump.data.clone();
    sysex::write_name_field(&mut data, family.name_offset, family.name_len, name);
    family.rebuild(&dump.raw, &data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inquiry_reply(family_id: u8, channel: u8) -> Vec<u8> {
        vec![
            0xF0, 0x7E, channel, 0x06, 0x02, 0x01, family_id, 0x01, 0x01, 0x02, 0x03, 0x04, 0xF7,
        ]
    }

    fn program_dump(family: &DsiFamily, data: &[u8]) -> Vec<u8> {
        let mut msg = vec![0xF0, 0x01, family.family_id, 0x02, 0x00, 0x05];
        msg.extend(sysex::pack_7bit(data));
        msg.push(0xF7);
        msg
    }

    fn rev2_data(name: &str) -> Vec<u8> {
        let mut data = vec![0u8; 1024];
        sysex::write_name_field(&mut data, 235, 20, name);
        data
    }

    #[test]
    fn test_identity_match_on_channel() {
        let rev2 = Rev2::new();
        let msg = RawMessage::new("ep", inquiry_reply(0x2F, 3), 0);
        let identity = rev2.match_identity_response(&msg).unwrap();
        assert_eq!(identity.model, SynthModel::Rev2);
        assert_eq!(identity.channel, 3);
        assert_eq!(identity.endpoint, "ep");
    }

    #[test]
    fn test_identity_rejects_other_family() {
        let rev2 = Rev2::new();
        let ob6_reply = RawMessage::new("ep", inquiry_reply(0x2E, 0), 0);
        assert!(rev2.match_identity_response(&ob6_reply).is_none());

        // But the OB-6 descriptor claims it
        let ob6 = Ob6::new();
        assert!(ob6.match_identity_response(&ob6_reply).is_some());
    }

    #[test]
    fn test_identity_broadcast_channel_maps_to_zero() {
        let rev2 = Rev2::new();
        let msg = RawMessage::new("ep", inquiry_reply(0x2F, 0x7F), 0);
        assert_eq!(rev2.match_identity_response(&msg).unwrap().channel, 0);
    }

    #[test]
    fn test_decode_program_dump_reads_name() {
        let rev2 = Rev2::new();
        let raw = program_dump(&rev2.family, &rev2_data("Warm Pad"));
        let msg = RawMessage::new("ep", raw, 0);

        let dump = rev2.decode_patch_dump(&msg).unwrap();
        assert_eq!(dump.name, "Warm Pad");
        assert_eq!(dump.data.len(), 1024);
    }

    #[test]
    fn test_normalize_is_name_independent() {
        let rev2 = Rev2::new();
        let a = rev2
            .decode_patch_dump(&RawMessage::new(
                "ep",
                program_dump(&rev2.family, &rev2_data("One")),
                0,
            ))
            .unwrap();
        let b = rev2
            .decode_patch_dump(&RawMessage::new(
                "ep",
                program_dump(&rev2.family, &rev2_data("Two")),
                0,
            ))
            .unwrap();
        assert_ne!(a.data, b.data);
        assert_eq!(
            rev2.normalize_for_fingerprint(&a),
            rev2.normalize_for_fingerprint(&b)
        );
    }

    #[test]
    fn test_rename_roundtrip() {
        let rev2 = Rev2::new();
        let dump = rev2
            .decode_patch_dump(&RawMessage::new(
                "ep",
                program_dump(&rev2.family, &rev2_data("Old Name")),
                0,
            ))
            .unwrap();

        let renamed = rev2.rename_patch(&dump, "New Name");
        let redecoded = rev2
            .decode_patch_dump(&RawMessage::new("ep", renamed, 0))
            .unwrap();
        assert_eq!(redecoded.name, "New Name");
        // Renaming must not change the fingerprint input
        assert_eq!(
            rev2.normalize_for_fingerprint(&dump),
            rev2.normalize_for_fingerprint(&redecoded)
        );
    }

    #[test]
    fn test_convert_program_dump_to_edit_buffer() {
        let rev2 = Rev2::new();
        let dump = rev2
            .decode_patch_dump(&RawMessage::new(
                "ep",
                program_dump(&rev2.family, &rev2_data("Warm Pad")),
                0,
            ))
            .unwrap();

        let edit = rev2.convert_to_edit_buffer(&dump).unwrap();
        assert_eq!(&edit[..4], &[0xF0, 0x01, 0x2F, 0x03]);
        // Payload carried over unchanged
        assert_eq!(&edit[4..], &dump.raw[6..]);
    }

    #[test]
    fn test_convert_to_program_dump_targets_slot() {
        let rev2 = Rev2::new();
        let dump = rev2
            .decode_patch_dump(&RawMessage::new(
                "ep",
                program_dump(&rev2.family, &rev2_data("Warm Pad")),
                0,
            ))
            .unwrap();

        // Program 300 is bank 2, patch 44 with 128-patch banks
        let retargeted = rev2.convert_to_program_dump(&dump, 300).unwrap();
        assert_eq!(&retargeted[..6], &[0xF0, 0x01, 0x2F, 0x02, 2, 44]);
        assert_eq!(&retargeted[6..], &dump.raw[6..]);

        // An edit buffer gains the program header and slot bytes
        let edit_raw = rev2.convert_to_edit_buffer(&dump).unwrap();
        let edit = rev2
            .decode_patch_dump(&RawMessage::new("ep", edit_raw.clone(), 0))
            .unwrap();
        let written = rev2.convert_to_program_dump(&edit, 300).unwrap();
        assert_eq!(&written[..6], &[0xF0, 0x01, 0x2F, 0x02, 2, 44]);
        assert_eq!(&written[6..], &edit_raw[4..]);
    }

    #[test]
    fn test_out_of_range_program_clamps_to_last_slot() {
        let rev2 = Rev2::new();
        // Capacity is 8 * 128; anything past it pins to bank 7, patch 127
        let request = rev2.patch_dump_request(100_000);
        assert_eq!(request[4], 7);
        assert_eq!(request[5], 127);

        let in_range = rev2.patch_dump_request(1023);
        assert_eq!(&request[..], &in_range[..]);
    }

    #[test]
    fn test_friendly_program_names() {
        let rev2 = Rev2::new();
        assert_eq!(rev2.friendly_program_name(0), "U1 P1");
        assert_eq!(rev2.friendly_program_name(129), "U2 P2");
        assert_eq!(rev2.friendly_program_name(4 * 128), "F1 P1");
    }

    #[test]
    fn test_nrpn_decode_filters_channel() {
        let rev2 = Rev2::new();
        let identity = DeviceIdentity::new(SynthModel::Rev2, 2, "ep");

        // Wrong channel leaves state untouched
        let wrong = RawMessage::new("ep", vec![0xB0, 99, 0x01], 0);
        let (event, state) =
            rev2.decode_parameter_message(&identity, &wrong, AssemblerState::default());
        assert!(event.is_none());
        assert!(state.is_idle());

        // Full sequence on the right channel emits one event
        let mut state = AssemblerState::default();
        let mut events = Vec::new();
        for (cc, value) in [(99u8, 0x01u8), (98, 0x23), (6, 0x00), (38, 0x42)] {
            let msg = RawMessage::new("ep", vec![0xB2, cc, value], 7);
            let (event, next) = rev2.decode_parameter_message(&identity, &msg, state);
            events.extend(event);
            state = next;
        }
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].controller, (0x01 << 7) | 0x23);
        assert_eq!(events[0].value, 0x42);
        assert_eq!(events[0].device, identity);
    }
}
