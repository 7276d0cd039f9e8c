//! Protocol envelopes wrapped around field-encoded payloads.

use super::varint::{read_varint, varint_len, write_varint};
use crate::error::{Error, Result};

pub trait Packetizer: Send + Sync {
    /// Joins the encoded fields and adds the protocol's envelope.
    fn wrap(&self, parts: Vec<Vec<u8>>) -> Vec<u8>;
    /// Checks the envelope and returns the payload inside it.
    fn unwrap<'a>(&self, frame: &'a [u8]) -> Result<&'a [u8]>;
}

/// `VarInt(length) VarInt(packet id) payload`, as used by the Java protocol.
#[derive(Debug, Clone, Copy)]
pub struct JavaPacketizer {
    pub packet_id: i32,
}

impl JavaPacketizer {
    pub const fn new(packet_id: i32) -> Self {
        Self { packet_id }
    }
}

impl Packetizer for JavaPacketizer {
    fn wrap(&self, parts: Vec<Vec<u8>>) -> Vec<u8> {
        let payload_len: usize = parts.iter().map(Vec::len).sum();
        let body_len = payload_len + varint_len(self.packet_id);

        let mut frame = Vec::with_capacity(body_len + 5);
        write_varint(&mut frame, body_len as i32);
        write_varint(&mut frame, self.packet_id);
        for part in parts {
            frame.extend_from_slice(&part);
        }
        frame
    }

    fn unwrap<'a>(&self, frame: &'a [u8]) -> Result<&'a [u8]> {
        let (length, length_len) =
            read_varint(frame).map_err(|e| Error::malformed("length", format!("{e:?}")))?;
        let body = &frame[length_len..];
        if length < 0 || length as usize != body.len() {
            return Err(Error::malformed(
                "length",
                format!("frame says {length} bytes but has {}", body.len()),
            ));
        }
        let (packet_id, id_len) =
            read_varint(body).map_err(|e| Error::malformed("packet id", format!("{e:?}")))?;
        if packet_id != self.packet_id {
            return Err(Error::PacketIdMismatch {
                expected: self.packet_id,
                actual: packet_id,
            });
        }
        Ok(&body[id_len..])
    }
}

/// A single id byte in front of the payload, as used by RakNet offline
/// messages.
#[derive(Debug, Clone, Copy)]
pub struct BedrockPacketizer {
    pub packet_id: u8,
}

impl BedrockPacketizer {
    pub const fn new(packet_id: u8) -> Self {
        Self { packet_id }
    }
}

impl Packetizer for BedrockPacketizer {
    fn wrap(&self, parts: Vec<Vec<u8>>) -> Vec<u8> {
        let mut frame = vec![self.packet_id];
        for part in parts {
            frame.extend_from_slice(&part);
        }
        frame
    }

    fn unwrap<'a>(&self, frame: &'a [u8]) -> Result<&'a [u8]> {
        let Some((&packet_id, payload)) = frame.split_first() else {
            return Err(Error::malformed("packet id", "empty datagram"));
        };
        if packet_id != self.packet_id {
            return Err(Error::PacketIdMismatch {
                expected: self.packet_id as i32,
                actual: packet_id as i32,
            });
        }
        Ok(payload)
    }
}

/// `fe fd` magic, a type byte, then the payload. Servers answer with just the
/// type byte, so response definitions are built without the magic.
#[derive(Debug, Clone, Copy)]
pub struct QueryPacketizer {
    pub magic: Option<&'static [u8]>,
    pub packet_type: u8,
}

impl QueryPacketizer {
    pub const fn request(magic: &'static [u8], packet_type: u8) -> Self {
        Self {
            magic: Some(magic),
            packet_type,
        }
    }

    pub const fn response(packet_type: u8) -> Self {
        Self {
            magic: None,
            packet_type,
        }
    }
}

impl Packetizer for QueryPacketizer {
    fn wrap(&self, parts: Vec<Vec<u8>>) -> Vec<u8> {
        let mut frame = Vec::new();
        if let Some(magic) = self.magic {
            frame.extend_from_slice(magic);
        }
        frame.push(self.packet_type);
        for part in parts {
            frame.extend_from_slice(&part);
        }
        frame
    }

    fn unwrap<'a>(&self, frame: &'a [u8]) -> Result<&'a [u8]> {
        let mut rest = frame;
        if let Some(magic) = self.magic {
            if !rest.starts_with(magic) {
                return Err(Error::MagicMismatch("query magic"));
            }
            rest = &rest[magic.len()..];
        }
        let Some((&packet_type, payload)) = rest.split_first() else {
            return Err(Error::malformed("packet type", "datagram ended early"));
        };
        if packet_type != self.packet_type {
            return Err(Error::PacketIdMismatch {
                expected: self.packet_type as i32,
                actual: packet_type as i32,
            });
        }
        Ok(payload)
    }
}
