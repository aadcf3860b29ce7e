//! Pioneer Toraiz AS-1 descriptor
//!
//! The AS-1 does not answer the universal device inquiry; detection goes
//! through its global parameter request instead. Message layouts follow
//! pages 33-35 of the AS-1 manual.

use super::{decode_nrpn, DeviceDescriptor, PatchDump};
use crate::assembler::AssemblerState;
use crate::sysex;
use crate::types::{DeviceIdentity, ParameterEvent, RawMessage};
use patchrack_core::SynthModel;

/// Start byte, 3x Pioneer ID, 3x Toraiz ID, device ID (fixed in hardware)
const TORAIZ_HEADER: [u8; 9] = [0xF0, 0x00, 0x40, 0x05, 0x00, 0x00, 0x01, 0x08, 0x10];
const SYSEX_END: u8 = 0xF7;

const GLOBAL_PARAMETER_REQUEST: u8 = 0x0E;
const GLOBAL_PARAMETER_DUMP: u8 = 0x0F;
const EDIT_BUFFER_REQUEST: u8 = 0x06;
const EDIT_BUFFER_DUMP: u8 = 0x03;
const PROGRAM_DUMP_REQUEST: u8 = 0x05;
const PROGRAM_DUMP: u8 = 0x02;

const NAME_OFFSET: usize = 107;
const NAME_LEN: usize = 20;
const BANK_SIZE: u32 = 99;
const NUMBER_OF_BANKS: u32 = 10;

/// Pioneer Toraiz AS-1
pub struct ToraizAs1;

impl ToraizAs1 {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ToraizAs1 {
    fn default() -> Self {
        Self::new()
    }
}

fn is_message_type(bytes: &[u8], message_type: u8) -> bool {
    bytes.len() > TORAIZ_HEADER.len() + 2
        && bytes[..TORAIZ_HEADER.len()] == TORAIZ_HEADER
        && bytes[9] == message_type
        && bytes[bytes.len() - 1] == SYSEX_END
}

/// Unpack the data block of an edit buffer or program dump
///
/// Returns (data block start offset in the raw message, unpacked data).
fn extract_data_block(bytes: &[u8]) -> Option<(usize, Vec<u8>)> {
    let start = if is_message_type(bytes, PROGRAM_DUMP) {
        12
    } else if is_message_type(bytes, EDIT_BUFFER_DUMP) {
        10
    } else {
        return None;
    };
    let packed = bytes.get(start..bytes.len() - 1)?;
    if packed.is_empty() {
        return None;
    }
    let data = sysex::unpack_7bit(packed);
    if data.len() < NAME_OFFSET + NAME_LEN {
        return None;
    }
    Some((start, data))
}

fn split_program(program: u32) -> (u32, u32) {
    (program / BANK_SIZE, program % BANK_SIZE)
}

/// Pin a program number to the device's address space before the bank and
/// slot are cast down to single data bytes
fn clamp_program(program: u32) -> u32 {
    let capacity = BANK_SIZE * NUMBER_OF_BANKS;
    if program >= capacity {
        log::warn!(
            "Toraiz AS-1: program {} beyond capacity {}, using last slot",
            program,
            capacity
        );
        capacity - 1
    } else {
        program
    }
}

/// Bank names as shown on the AS-1 display, U.1-U.5 then F.1-F.5
fn friendly_bank_name(bank: u32) -> String {
    if bank < 5 {
        format!("U.{}", bank + 1)
    } else {
        format!("F.{}", bank - 4)
    }
}

impl DeviceDescriptor for ToraizAs1 {
    fn model(&self) -> SynthModel {
        SynthModel::ToraizAs1
    }

    fn identity_request(&self) -> Vec<u8> {
        let mut msg = TORAIZ_HEADER.to_vec();
        msg.push(GLOBAL_PARAMETER_REQUEST);
        msg.push(SYSEX_END);
        msg
    }

    fn match_identity_response(&self, msg: &RawMessage) -> Option<DeviceIdentity> {
        // The global parameter dump is 59 bytes long. The device's MIDI
        // channel shows up at byte 12, one-based, with 0 meaning OMNI.
        if msg.bytes.len() != 59 || !is_message_type(&msg.bytes, GLOBAL_PARAMETER_DUMP) {
            return None;
        }
        let channel = match msg.bytes[12] {
            0 => 0,
            ch if ch <= 16 => ch - 1,
            _ => return None,
        };
        Some(DeviceIdentity::new(
            SynthModel::ToraizAs1,
            channel,
            msg.endpoint.clone(),
        ))
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
        let mut msg = TORAIZ_HEADER.to_vec();
        msg.push(EDIT_BUFFER_REQUEST);
        msg.push(SYSEX_END);
        msg
    }

    fn patch_dump_request(&self, program: u32) -> Vec<u8> {
        let (bank, patch) = split_program(clamp_program(program));
        let mut msg = TORAIZ_HEADER.to_vec();
        msg.push(PROGRAM_DUMP_REQUEST);
        msg.push(bank as u8);
        msg.push(patch as u8);
        msg.push(SYSEX_END);
        msg
    }

    fn decode_patch_dump(&self, msg: &RawMessage) -> Option<PatchDump> {
        if !msg.is_sysex() {
            return None;
        }
        let (_, data) = extract_data_block(&msg.bytes)?;
        let name = sysex::read_name_field(&data, NAME_OFFSET, NAME_LEN);
        Some(PatchDump {
            model: SynthModel::ToraizAs1,
            name,
            raw: msg.bytes.clone(),
            data,
        })
    }

    fn normalize_for_fingerprint(&self, dump: &PatchDump) -> Vec<u8> {
        let mut data = dump.data.clone();
        sysex::write_name_field(&mut data, NAME_OFFSET, NAME_LEN, "");
        data
    }

    fn rename_patch(&self, dump: &PatchDump, name: &str) -> Vec<u8> {
        let start = if is_message_type(&dump.raw, PROGRAM_DUMP) {
            12
        } else {
            10
        };
        let mut data = dump.data.clone();
        sysex::write_name_field(&mut data, NAME_OFFSET, NAME_LEN, name);
        let mut rebuilt = dump.raw[..start].to_vec();
        rebuilt.extend(sysex::pack_7bit(&data));
        rebuilt.push(SYSEX_END);
        rebuilt
    }

    fn convert_to_edit_buffer(&self, dump: &PatchDump) -> Option<Vec<u8>> {
        if is_message_type(&dump.raw, EDIT_BUFFER_DUMP) {
            return Some(dump.raw.clone());
        }
        if is_message_type(&dump.raw, PROGRAM_DUMP) {
            // Drop the bank and program bytes and switch the command
            let mut converted = TORAIZ_HEADER.to_vec();
            converted.push(EDIT_BUFFER_DUMP);
            converted.extend_from_slice(&dump.raw[12..]);
            return Some(converted);
        }
        None
    }

    fn convert_to_program_dump(&self, dump: &PatchDump, program: u32) -> Option<Vec<u8>> {
        let (bank, patch) = split_program(clamp_program(program));
        if is_message_type(&dump.raw, PROGRAM_DUMP) && dump.raw.len() > 12 {
            let mut converted = dump.raw.clone();
            converted[10] = bank as u8;
            converted[11] = patch as u8;
            return Some(converted);
        }
        if is_message_type(&dump.raw, EDIT_BUFFER_DUMP) {
            let mut converted = TORAIZ_HEADER.to_vec();
            converted.push(PROGRAM_DUMP);
            converted.push(bank as u8);
            converted.push(patch as u8);
            converted.extend_from_slice(&dump.raw[10..]);
            return Some(converted);
        }
        None
    }

    fn bank_size(&self) -> u32 {
        BANK_SIZE
    }

    fn number_of_banks(&self) -> u32 {
        NUMBER_OF_BANKS
    }

    fn friendly_program_name(&self, program: u32) -> String {
        let (bank, patch) = split_program(program);
        format!("{} P.{:02}", friendly_bank_name(bank), patch + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global_parameter_dump(channel_byte: u8) -> Vec<u8> {
        let mut msg = TORAIZ_HEADER.to_vec();
        msg.push(GLOBAL_PARAMETER_DUMP);
        msg.extend(vec![0u8; 49]);
        msg[12] = channel_byte;
        let len = msg.len();
        msg[len - 1] = SYSEX_END;
        msg
    }

    fn patch_data(name: &str) -> Vec<u8> {
        let mut data = vec![0u8; 512];
        sysex::write_name_field(&mut data, NAME_OFFSET, NAME_LEN, name);
        data
    }

    fn program_dump(data: &[u8], bank: u8, patch: u8) -> Vec<u8> {
        let mut msg = TORAIZ_HEADER.to_vec();
        msg.push(PROGRAM_DUMP);
        msg.push(bank);
        msg.push(patch);
        msg.extend(sysex::pack_7bit(data));
        msg.push(SYSEX_END);
        msg
    }

    fn edit_buffer_dump(data: &[u8]) -> Vec<u8> {
        let mut msg = TORAIZ_HEADER.to_vec();
        msg.push(EDIT_BUFFER_DUMP);
        msg.extend(sysex::pack_7bit(data));
        msg.push(SYSEX_END);
        msg
    }

    #[test]
    fn test_detect_message_shape() {
        let as1 = ToraizAs1::new();
        assert_eq!(
            as1.identity_request(),
            vec![0xF0, 0x00, 0x40, 0x05, 0x00, 0x00, 0x01, 0x08, 0x10, 0x0E, 0xF7]
        );
    }

    #[test]
    fn test_identity_channel_is_one_based() {
        let as1 = ToraizAs1::new();
        let msg = RawMessage::new("ep", global_parameter_dump(3), 0);
        assert_eq!(as1.match_identity_response(&msg).unwrap().channel, 2);
    }

    #[test]
    fn test_identity_omni_maps_to_channel_zero() {
        let as1 = ToraizAs1::new();
        let msg = RawMessage::new("ep", global_parameter_dump(0), 0);
        assert_eq!(as1.match_identity_response(&msg).unwrap().channel, 0);
    }

    #[test]
    fn test_identity_rejects_wrong_length() {
        let as1 = ToraizAs1::new();
        let mut bytes = global_parameter_dump(1);
        bytes.insert(20, 0x00);
        let len = bytes.len();
        bytes[len - 1] = SYSEX_END;
        assert!(as1
            .match_identity_response(&RawMessage::new("ep", bytes, 0))
            .is_none());
    }

    #[test]
    fn test_program_dump_request_splits_banks() {
        let as1 = ToraizAs1::new();
        // Program 100 is bank 1, patch 1 with 99-patch banks
        let msg = as1.patch_dump_request(100);
        assert_eq!(msg[9], PROGRAM_DUMP_REQUEST);
        assert_eq!(msg[10], 1);
        assert_eq!(msg[11], 1);
    }

    #[test]
    fn test_decode_both_dump_forms() {
        let as1 = ToraizAs1::new();
        let data = patch_data("Basic Program");

        let prog = as1
            .decode_patch_dump(&RawMessage::new("ep", program_dump(&data, 0, 5), 0))
            .unwrap();
        assert_eq!(prog.name, "Basic Program");

        let edit = as1
            .decode_patch_dump(&RawMessage::new("ep", edit_buffer_dump(&data), 0))
            .unwrap();
        assert_eq!(edit.data, prog.data);
    }

    #[test]
    fn test_rename_preserves_fingerprint_input() {
        let as1 = ToraizAs1::new();
        let dump = as1
            .decode_patch_dump(&RawMessage::new(
                "ep",
                program_dump(&patch_data("Old"), 2, 10),
                0,
            ))
            .unwrap();

        let renamed = as1.rename_patch(&dump, "Plucky");
        let redecoded = as1
            .decode_patch_dump(&RawMessage::new("ep", renamed, 0))
            .unwrap();
        assert_eq!(redecoded.name, "Plucky");
        assert_eq!(
            as1.normalize_for_fingerprint(&dump),
            as1.normalize_for_fingerprint(&redecoded)
        );
    }

    #[test]
    fn test_convert_to_edit_buffer() {
        let as1 = ToraizAs1::new();
        let data = patch_data("Warm Keys");
        let dump = as1
            .decode_patch_dump(&RawMessage::new("ep", program_dump(&data, 1, 2), 0))
            .unwrap();

        let edit = as1.convert_to_edit_buffer(&dump).unwrap();
        assert_eq!(edit[9], EDIT_BUFFER_DUMP);
        assert_eq!(&edit[10..], &dump.raw[12..]);

        // Edit buffers pass through unchanged
        let edit_dump = as1
            .decode_patch_dump(&RawMessage::new("ep", edit.clone(), 0))
            .unwrap();
        assert_eq!(as1.convert_to_edit_buffer(&edit_dump).unwrap(), edit);
    }

    #[test]
    fn test_convert_to_program_dump_targets_slot() {
        let as1 = ToraizAs1::new();
        let data = patch_data("Warm Keys");
        let dump = as1
            .decode_patch_dump(&RawMessage::new("ep", program_dump(&data, 0, 0), 0))
            .unwrap();

        // Program 200 is bank 2, patch 2 with 99-patch banks
        let retargeted = as1.convert_to_program_dump(&dump, 200).unwrap();
        assert_eq!(retargeted[9], PROGRAM_DUMP);
        assert_eq!(retargeted[10], 2);
        assert_eq!(retargeted[11], 2);
        assert_eq!(&retargeted[12..], &dump.raw[12..]);

        // An edit buffer gains the program header and slot bytes
        let edit = as1
            .decode_patch_dump(&RawMessage::new("ep", edit_buffer_dump(&data), 0))
            .unwrap();
        let written = as1.convert_to_program_dump(&edit, 200).unwrap();
        assert_eq!(written[9], PROGRAM_DUMP);
        assert_eq!(written[10], 2);
        assert_eq!(written[11], 2);
        assert_eq!(&written[12..], &edit.raw[10..]);
    }

    #[test]
    fn test_out_of_range_program_clamps_to_last_slot() {
        let as1 = ToraizAs1::new();
        // Capacity is 10 * 99; anything past it pins to bank 9, patch 98
        let request = as1.patch_dump_request(5000);
        assert_eq!(request[10], 9);
        assert_eq!(request[11], 98);
    }

    #[test]
    fn test_friendly_program_names() {
        let as1 = ToraizAs1::new();
        assert_eq!(as1.friendly_program_name(0), "U.1 P.01");
        assert_eq!(as1.friendly_program_name(100), "U.2 P.02");
        assert_eq!(as1.friendly_program_name(5 * 99), "F.1 P.01");
    }
}
