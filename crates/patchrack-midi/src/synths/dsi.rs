//! Shared wire formats for DSI / Sequential instruments
//!
//! The Rev2 and OB-6 differ only in family id, data block size and name
//! field position; the framing is identical. Identity is established with
//! the universal device inquiry; bulk data travels 7-bit packed.

use crate::sysex;
use crate::types::{DeviceIdentity, RawMessage};
use patchrack_core::SynthModel;

/// Sequential / Dave Smith Instruments manufacturer id
pub const MANUFACTURER_ID: u8 = 0x01;

const SYSEX_START: u8 = 0xF0;
const SYSEX_END: u8 = 0xF7;
const UNIVERSAL_NON_REALTIME: u8 = 0x7E;
const INQUIRY: u8 = 0x06;
const INQUIRY_REQUEST: u8 = 0x01;
const INQUIRY_REPLY: u8 = 0x02;
const BROADCAST_CHANNEL: u8 = 0x7F;

/// Per-model command bytes (shared across the family)
pub const PROGRAM_DUMP: u8 = 0x02;
pub const EDIT_BUFFER_DUMP: u8 = 0x03;
pub const PROGRAM_DUMP_REQUEST: u8 = 0x05;
pub const EDIT_BUFFER_REQUEST: u8 = 0x06;

/// Static description of one DSI family member
pub struct DsiFamily {
    pub model: SynthModel,
    /// Family id carried in the inquiry reply and sysex header
    pub family_id: u8,
    /// Offset of the name field in the unpacked data block
    pub name_offset: usize,
    pub name_len: usize,
    pub bank_size: u32,
    pub number_of_banks: u32,
}

impl DsiFamily {
    /// Universal device inquiry, broadcast to all channels
    pub fn identity_request(&self) -> Vec<u8> {
        vec![
            SYSEX_START,
            UNIVERSAL_NON_REALTIME,
            BROADCAST_CHANNEL,
            INQUIRY,
            INQUIRY_REQUEST,
            SYSEX_END,
        ]
    }

    /// Match a universal inquiry reply carrying this family id
    ///
    /// Layout: F0 7E <ch> 06 02 01 <family> 01 <v1..v4> F7. A broadcast
    /// channel byte in the reply maps to channel 0.
    pub fn match_identity_response(&self, msg: &RawMessage) -> Option<DeviceIdentity> {
        let bytes = msg.bytes.as_slice();
        if bytes.len() != 13 {
            return None;
        }
        if bytes[0] != SYSEX_START
            || bytes[1] != UNIVERSAL_NON_REALTIME
            || bytes[3] != INQUIRY
            || bytes[4] != INQUIRY_REPLY
            || bytes[5] != MANUFACTURER_ID
            || bytes[6] != self.family_id
            || bytes[7] != 0x01
            || bytes[12] != SYSEX_END
        {
            return None;
        }
        let channel = if bytes[2] == BROADCAST_CHANNEL {
            0
        } else if bytes[2] < 16 {
            bytes[2]
        } else {
            return None;
        };
        Some(DeviceIdentity::new(self.model, channel, msg.endpoint.clone()))
    }

    pub fn edit_buffer_request(&self) -> Vec<u8> {
        vec![
            SYSEX_START,
            MANUFACTURER_ID,
            self.family_id,
            EDIT_BUFFER_REQUEST,
            SYSEX_END,
        ]
    }

    pub fn program_dump_request(&self, program: u32) -> Vec<u8> {
        let (bank, patch) = self.split_program(self.clamp_program(program));
        vec![
            SYSEX_START,
            MANUFACTURER_ID,
            self.family_id,
            PROGRAM_DUMP_REQUEST,
            bank as u8,
            patch as u8,
            SYSEX_END,
        ]
    }

    /// Pin a program number to the device's address space
    ///
    /// Bank and slot travel as single data bytes, so an out-of-range number
    /// must never reach the cast below.
    fn clamp_program(&self, program: u32) -> u32 {
        let capacity = self.bank_size * self.number_of_banks;
        if program >= capacity {
            log::warn!(
                "{}: program {} beyond capacity {}, using last slot",
                self.model,
                program,
                capacity
            );
            capacity - 1
        } else {
            program
        }
    }

    /// True if the message is a sysex from this family member with the
    /// given command byte
    fn is_command(&self, bytes: &[u8], command: u8) -> bool {
        bytes.len() > 4
            && bytes[0] == SYSEX_START
            && bytes[1] == MANUFACTURER_ID
            && bytes[2] == self.family_id
            && bytes[3] == command
            && bytes[bytes.len() - 1] == SYSEX_END
    }

    /// Unpack the data block of an edit buffer or program dump
    ///
    /// Returns (data block start offset in the raw message, unpacked data).
    pub fn extract_data_block(&self, bytes: &[u8]) -> Option<(usize, Vec<u8>)> {
        let start = if self.is_command(bytes, PROGRAM_DUMP) {
            6
        } else if self.is_command(bytes, EDIT_BUFFER_DUMP) {
            4
        } else {
            return None;
        };
        let packed = bytes.get(start..bytes.len() - 1)?;
        if packed.is_empty() {
            return None;
        }
        let data = sysex::unpack_7bit(packed);
        if data.len() < self.name_offset + self.name_len {
            return None;
        }
        Some((start, data))
    }

    /// Rebuild a dump message around a modified data block, preserving the
    /// original header form (program vs edit buffer)
    pub fn rebuild(&self, raw: &[u8], data: &[u8]) -> Vec<u8> {
        let start = if self.is_command(raw, PROGRAM_DUMP) { 6 } else { 4 };
        let mut rebuilt = raw[..start].to_vec();
        rebuilt.extend(sysex::pack_7bit(data));
        rebuilt.push(SYSEX_END);
        rebuilt
    }

    /// Convert a program dump into an edit-buffer dump; edit buffers pass
    /// through unchanged
    pub fn to_edit_buffer(&self, raw: &[u8]) -> Option<Vec<u8>> {
        if self.is_command(raw, EDIT_BUFFER_DUMP) {
            return Some(raw.to_vec());
        }
        if self.is_command(raw, PROGRAM_DUMP) {
            let mut converted = vec![
                SYSEX_START,
                MANUFACTURER_ID,
                self.family_id,
                EDIT_BUFFER_DUMP,
            ];
            converted.extend_from_slice(&raw[6..]);
            return Some(converted);
        }
        None
    }

    /// Convert a dump into a program dump addressed to one slot
    ///
    /// Program dumps are retargeted in place; edit buffers gain the program
    /// header and the bank/slot bytes.
    pub fn to_program_dump(&self, raw: &[u8], program: u32) -> Option<Vec<u8>> {
        let (bank, patch) = self.split_program(self.clamp_program(program));
        if self.is_command(raw, PROGRAM_DUMP) && raw.len() > 6 {
            let mut converted = raw.to_vec();
            converted[4] = bank as u8;
            converted[5] = patch as u8;
            return Some(converted);
        }
        if self.is_command(raw, EDIT_BUFFER_DUMP) {
            let mut converted = vec![
                SYSEX_START,
                MANUFACTURER_ID,
                self.family_id,
                PROGRAM_DUMP,
                bank as u8,
                patch as u8,
            ];
            converted.extend_from_slice(&raw[4..]);
            return Some(converted);
        }
        None
    }

    pub fn split_program(&self, program: u32) -> (u32, u32) {
        (program / self.bank_size, program % self.bank_size)
    }
}
