pub mod bedrock;
pub mod java;
pub mod packets;
pub mod query;

use std::{fmt, time::Duration};

use serde::{Serialize, Serializer};

/// The three ways a server can be asked about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Server list ping over TCP.
    Java,
    /// RakNet unconnected ping over UDP.
    Bedrock,
    /// GameSpy4-style stat query over UDP.
    Query,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Protocol::Java => "java",
            Protocol::Bedrock => "bedrock",
            Protocol::Query => "query",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ServerKind {
    Java,
    Bedrock,
    Unknown,
    Crossplay,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Players {
    pub online: Option<i64>,
    pub max: Option<i64>,
    pub list: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuerierDebug {
    pub protocol: Protocol,
    pub protocol_version: Option<i64>,
    pub protocol_name: Option<String>,
}

/// What a single querier found out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryResult {
    pub motd: Option<String>,
    pub version: Option<String>,
    pub players: Players,
    pub favicon: Option<String>,
    #[serde(serialize_with = "serialize_millis")]
    pub latency: Duration,
    pub kind: ServerKind,
    pub debug: QuerierDebug,
}

impl QueryResult {
    pub fn new(protocol: Protocol, kind: ServerKind) -> Self {
        Self {
            motd: None,
            version: None,
            players: Players::default(),
            favicon: None,
            latency: Duration::ZERO,
            kind,
            debug: QuerierDebug {
                protocol,
                protocol_version: None,
                protocol_name: None,
            },
        }
    }
}

pub(crate) fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Where a querier should send its requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
}

impl Target {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
