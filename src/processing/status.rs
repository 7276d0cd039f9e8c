//! The JSON document a Java server sends back for a status request.

use serde::Deserialize;

use crate::{
    error::Result,
    protocols::{Players, Protocol, QuerierDebug, QueryResult, ServerKind},
};

const FAVICON_PREFIX: &str = "data:image/png;base64,";

#[derive(Deserialize, Debug, Default)]
struct RawStatus {
    #[serde(default)]
    version: Option<RawVersion>,
    #[serde(default)]
    description: Option<Description>,
    #[serde(default)]
    players: Option<RawPlayers>,
    #[serde(default)]
    favicon: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawVersion {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    protocol: Option<i64>,
}

#[derive(Deserialize, Debug)]
struct RawPlayers {
    #[serde(default)]
    max: Option<i64>,
    #[serde(default)]
    online: Option<i64>,
    #[serde(default)]
    sample: Option<Vec<RawSamplePlayer>>,
}

#[derive(Deserialize, Debug)]
struct RawSamplePlayer {
    #[serde(default)]
    name: Option<String>,
}

/// A chat component. Either a bare string, a list of components, or an object
/// with `text` and nested `extra` components.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum Description {
    Text(String),
    List(Vec<Description>),
    Component(Component),
}

#[derive(Deserialize, Debug)]
pub struct Component {
    #[serde(default)]
    text: String,
    #[serde(default)]
    extra: Vec<Description>,
}

impl Description {
    /// Concatenates every `text` depth first.
    pub fn to_plaintext(&self) -> String {
        let mut out = String::new();
        self.write_plaintext(&mut out);
        out
    }

    fn write_plaintext(&self, out: &mut String) {
        match self {
            Description::Text(text) => out.push_str(text),
            Description::List(parts) => {
                for part in parts {
                    part.write_plaintext(out);
                }
            }
            Description::Component(component) => {
                out.push_str(&component.text);
                for part in &component.extra {
                    part.write_plaintext(out);
                }
            }
        }
    }
}

pub fn parse_status_json(json: &str) -> Result<QueryResult> {
    let status: RawStatus = serde_json::from_str(json)?;

    let (version, protocol_version) = match status.version {
        Some(v) => (v.name, v.protocol),
        None => (None, None),
    };

    let players = status
        .players
        .map(|p| Players {
            online: p.online,
            max: p.max,
            list: p.sample.map(|sample| {
                // entries without a name aren't useful
                sample.into_iter().filter_map(|s| s.name).collect()
            }),
        })
        .unwrap_or_default();

    // filter out bad favicons
    let favicon = status.favicon.filter(|f| f.starts_with(FAVICON_PREFIX));

    Ok(QueryResult {
        motd: status.description.map(|d| d.to_plaintext()),
        version,
        players,
        favicon,
        latency: Default::default(),
        kind: ServerKind::Java,
        debug: QuerierDebug {
            protocol: Protocol::Java,
            protocol_version,
            protocol_name: None,
        },
    })
}
