//! Schema-driven encoding and decoding shared by every protocol.

pub mod field;
pub mod packet;
pub mod packetizer;
pub mod varint;

pub use field::{DecodeOptions, FieldType, Value};
pub use packet::{PacketDefinition, PacketSchema, Values};
pub use packetizer::{BedrockPacketizer, JavaPacketizer, Packetizer, QueryPacketizer};
