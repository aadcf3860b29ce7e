//! Sysex payload helpers
//!
//! DSI-family devices (and the Toraiz AS-1, which licenses the same engine)
//! transmit 8-bit patch data packed into 7-bit sysex bytes: each group of
//! seven data bytes is preceded by one byte carrying their stripped MSBs.

/// Decode a 7-bit packed sysex payload into 8-bit data
pub fn unpack_7bit(packed: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(packed.len());
    let mut index = 0;
    while index < packed.len() {
        let ms_bits = packed[index];
        index += 1;
        for bit in 0..7 {
            if index < packed.len() {
                result.push(packed[index] | ((ms_bits & (1 << bit)) << (7 - bit)));
            }
            index += 1;
        }
    }
    result
}

/// Encode 8-bit data into the 7-bit packed sysex form
pub fn pack_7bit(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len() + data.len() / 7 + 1);
    let mut ms_bits = 0u8;
    let mut chunk: Vec<u8> = Vec::with_capacity(7);

    for (index, &byte) in data.iter().enumerate() {
        let index_in_chunk = index % 7;
        if index_in_chunk == 0 {
            chunk.clear();
        }
        ms_bits |= (byte & 0x80) >> (7 - index_in_chunk);
        chunk.push(byte & 0x7F);
        if index_in_chunk == 6 || index == data.len() - 1 {
            result.push(ms_bits);
            result.extend_from_slice(&chunk);
            ms_bits = 0;
        }
    }
    result
}

/// Overwrite a fixed-width name field inside decoded patch data
///
/// The name is space-padded (or truncated) to `len` ASCII bytes. Used both
/// for renaming and for blanking the name before fingerprinting. A data
/// block shorter than the name region is left untouched.
pub fn write_name_field(data: &mut [u8], offset: usize, len: usize, name: &str) {
    if data.len() < offset + len {
        return;
    }
    let mut padded = name.as_bytes().to_vec();
    padded.resize(len, b' ');
    data[offset..offset + len].copy_from_slice(&padded[..len]);
}

/// Read a fixed-width name field from decoded patch data
pub fn read_name_field(data: &[u8], offset: usize, len: usize) -> String {
    data.get(offset..offset + len)
        .map(|field| {
            field
                .iter()
                .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { ' ' })
                .collect::<String>()
                .trim()
                .to_string()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_unpack_roundtrip() {
        let data: Vec<u8> = (0..=255u8).collect();
        let packed = pack_7bit(&data);
        // Packed form must stay within 7 bits
        assert!(packed.iter().all(|&b| b < 0x80));
        assert_eq!(unpack_7bit(&packed), data);
    }

    #[test]
    fn test_pack_partial_chunk() {
        // Lengths that don't divide by 7 exercise the tail path
        let data = vec![0x80, 0x01, 0xFF];
        assert_eq!(unpack_7bit(&pack_7bit(&data)), data);
    }

    #[test]
    fn test_name_field_roundtrip() {
        let mut data = vec![0u8; 32];
        write_name_field(&mut data, 8, 12, "Warm Pad");
        assert_eq!(read_name_field(&data, 8, 12), "Warm Pad");

        // Overlong names truncate
        write_name_field(&mut data, 8, 12, "A Very Long Patch Name");
        assert_eq!(read_name_field(&data, 8, 12), "A Very Long");
    }

    #[test]
    fn test_name_field_out_of_range_is_noop() {
        let mut data = vec![0u8; 4];
        write_name_field(&mut data, 8, 12, "X");
        assert_eq!(data, vec![0u8; 4]);
        assert_eq!(read_name_field(&data, 8, 12), "");
    }
}
