//! Every packet the queriers send or expect, bound to its envelope.

pub mod java {
    use crate::codec::{FieldType, JavaPacketizer, PacketDefinition};

    /// Protocol number for 1.19.4. Most servers answer status requests for
    /// any protocol number.
    pub const DEFAULT_PROTOCOL_VERSION: i32 = 762;
    pub const DEFAULT_PORT: u16 = 25565;

    /// The `next state` handshake value that asks for a status response.
    pub const NEXT_STATE_STATUS: i32 = 0x01;

    pub const PING_PAYLOAD_LEN: usize = 8;

    pub static HANDSHAKE: PacketDefinition<JavaPacketizer> = PacketDefinition::new(
        &[
            ("protocol", FieldType::VarInt),
            ("serverAddress", FieldType::VarIntString),
            ("serverPort", FieldType::U16Be),
            ("nextState", FieldType::VarInt),
        ],
        JavaPacketizer::new(0x00),
    );

    pub static STATUS_REQUEST: PacketDefinition<JavaPacketizer> =
        PacketDefinition::new(&[], JavaPacketizer::new(0x00));

    pub static STATUS_RESPONSE: PacketDefinition<JavaPacketizer> = PacketDefinition::new(
        &[("jsonResponse", FieldType::VarIntString)],
        JavaPacketizer::new(0x00),
    );

    pub static PING_REQUEST: PacketDefinition<JavaPacketizer> = PacketDefinition::new(
        &[("payload", FieldType::Bytes)],
        JavaPacketizer::new(0x01),
    );

    pub static PING_RESPONSE: PacketDefinition<JavaPacketizer> = PacketDefinition::new(
        &[("payload", FieldType::Bytes)],
        JavaPacketizer::new(0x01),
    );
}

pub mod bedrock {
    use crate::codec::{BedrockPacketizer, FieldType, PacketDefinition};

    pub const DEFAULT_PORT: u16 = 19132;

    pub const RAKNET_MAGIC: &[u8] = &[
        0x00, 0xff, 0xff, 0x00, 0xfe, 0xfe, 0xfe, 0xfe, 0xfd, 0xfd, 0xfd, 0xfd, 0x12, 0x34, 0x56,
        0x78,
    ];

    pub const GUID_LEN: usize = 8;

    pub static UNCONNECTED_PING: PacketDefinition<BedrockPacketizer> = PacketDefinition::new(
        &[
            ("time", FieldType::U64Be),
            ("magic", FieldType::Magic(RAKNET_MAGIC)),
            ("clientGUID", FieldType::Bytes),
        ],
        BedrockPacketizer::new(0x01),
    );

    pub static UNCONNECTED_PONG: PacketDefinition<BedrockPacketizer> = PacketDefinition::new(
        &[
            ("time", FieldType::U64Be),
            ("serverGUID", FieldType::Bytes),
            ("magic", FieldType::Magic(RAKNET_MAGIC)),
            ("serverID", FieldType::ShortString),
        ],
        BedrockPacketizer::new(0x1c),
    );
}

pub mod query {
    use crate::codec::{FieldType, PacketDefinition, QueryPacketizer};

    pub const QUERY_MAGIC: &[u8] = &[0xfe, 0xfd];

    /// `splitnum\0\x80\0`, sent before the key/value section of a full stat.
    pub const SPLITNUM: &[u8] = &[
        0x73, 0x70, 0x6c, 0x69, 0x74, 0x6e, 0x75, 0x6d, 0x00, 0x80, 0x00,
    ];
    /// `\x01player_\0\0`, sent before the player list of a full stat.
    pub const PLAYERS_: &[u8] = &[0x01, 0x70, 0x6c, 0x61, 0x79, 0x65, 0x72, 0x5f, 0x00, 0x00];

    pub const HANDSHAKE_TYPE: u8 = 0x09;
    pub const STAT_TYPE: u8 = 0x00;

    /// Session ids must have the high bit of every byte cleared.
    pub const SESSION_ID_MASK: u32 = 0x0f0f0f0f;

    pub static HANDSHAKE_REQUEST: PacketDefinition<QueryPacketizer> = PacketDefinition::new(
        &[("sessionID", FieldType::I32Be)],
        QueryPacketizer::request(QUERY_MAGIC, HANDSHAKE_TYPE),
    );

    pub static HANDSHAKE_RESPONSE: PacketDefinition<QueryPacketizer> = PacketDefinition::new(
        &[
            ("sessionID", FieldType::I32Be),
            ("challenge", FieldType::NullString),
        ],
        QueryPacketizer::response(HANDSHAKE_TYPE),
    );

    pub static BASIC_STAT_REQUEST: PacketDefinition<QueryPacketizer> = PacketDefinition::new(
        &[
            ("sessionID", FieldType::I32Be),
            ("challenge", FieldType::I32Be),
        ],
        QueryPacketizer::request(QUERY_MAGIC, STAT_TYPE),
    );

    pub static BASIC_STAT_RESPONSE: PacketDefinition<QueryPacketizer> = PacketDefinition::new(
        &[
            ("sessionID", FieldType::I32Be),
            ("motd", FieldType::NullString),
            ("gametype", FieldType::NullString),
            ("map", FieldType::NullString),
            ("online", FieldType::NullString),
            ("max", FieldType::NullString),
            ("port", FieldType::U16Le),
            ("ip", FieldType::NullString),
        ],
        QueryPacketizer::response(STAT_TYPE),
    );

    pub static FULL_STAT_REQUEST: PacketDefinition<QueryPacketizer> = PacketDefinition::new(
        &[
            ("sessionID", FieldType::I32Be),
            ("challenge", FieldType::I32Be),
            ("padding", FieldType::I32Be),
        ],
        QueryPacketizer::request(QUERY_MAGIC, STAT_TYPE),
    );

    pub static FULL_STAT_RESPONSE: PacketDefinition<QueryPacketizer> = PacketDefinition::new(
        &[
            ("sessionID", FieldType::I32Be),
            ("padding1", FieldType::Magic(SPLITNUM)),
            ("info", FieldType::NullStringArray),
            ("padding2", FieldType::Magic(PLAYERS_)),
            ("players", FieldType::NullStringArray),
        ],
        QueryPacketizer::response(STAT_TYPE),
    );
}
