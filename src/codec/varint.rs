//! Minecraft-style VarInts: 7 bits per byte, least significant group first,
//! high bit set when another byte follows. Negative numbers always take the
//! full five bytes.

pub const MAX_VARINT_LEN: usize = 5;

const SEGMENT_BITS: u8 = 0b0111_1111;
const CONTINUE_BIT: u8 = 0b1000_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarIntError {
    /// The buffer ended before the last byte of the VarInt.
    Incomplete,
    /// More than five bytes had the continuation bit set.
    TooLong,
}

pub fn write_varint(writer: &mut Vec<u8>, value: i32) {
    // shift as unsigned so negative values terminate
    let mut value = value as u32;
    loop {
        let byte = (value & SEGMENT_BITS as u32) as u8;
        value >>= 7;
        if value == 0 {
            writer.push(byte);
            return;
        }
        writer.push(byte | CONTINUE_BIT);
    }
}

pub fn varint_len(value: i32) -> usize {
    let mut value = value as u32;
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Reads a VarInt from the start of `buf`, returning the value and the number
/// of bytes it occupied.
///
/// This walks the continuation bits itself so that a partially received
/// buffer is reported as [`VarIntError::Incomplete`] instead of being read
/// past its end.
pub fn read_varint(buf: &[u8]) -> Result<(i32, usize), VarIntError> {
    let mut ans: u32 = 0;
    for i in 0..MAX_VARINT_LEN {
        let Some(&byte) = buf.get(i) else {
            return Err(VarIntError::Incomplete);
        };
        ans |= ((byte & SEGMENT_BITS) as u32) << (7 * i);
        if byte & CONTINUE_BIT == 0 {
            return Ok((ans as i32, i + 1));
        }
    }
    Err(VarIntError::TooLong)
}
