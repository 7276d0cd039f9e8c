use std::{path::PathBuf, time::Duration};

use serde::Deserialize;

use crate::{
    error::{Error, Result},
    protocols::packets::java::DEFAULT_PROTOCOL_VERSION,
};

/// What the binary reads from its TOML file.
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Write debug logs to a daily rolling file in this directory.
    #[serde(default)]
    pub logging_dir: Option<PathBuf>,

    #[serde(default)]
    pub query: QueryOptions,
}

/// Whether a protocol gets queried.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    No,
    /// Decide from the port, if there is one.
    #[default]
    Infer,
    Yes,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct QueryOptions {
    /// How long the whole query may take, shared by every querier.
    pub timeout_ms: u64,
    /// Overrides any port given in the host string.
    pub port: Option<u16>,

    pub query_query: QueryMode,
    pub query_bedrock: QueryMode,
    pub query_java: QueryMode,

    /// Resolve with the first successful querier instead of waiting for all
    /// of them.
    pub return_on_first: bool,
    /// Report servers that answered as both Java and Bedrock as crossplay.
    pub coalesce_crossplay: bool,
    /// Not implemented. Setting this fails the query.
    pub check_blocked: bool,
    pub use_srv: bool,
    pub clean_motd: bool,

    /// The protocol number sent in the Java handshake.
    pub protocol_version: i32,
    /// Ask Query servers for the full stat, which includes the player list.
    pub full_stat: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            port: None,
            query_query: QueryMode::Infer,
            query_bedrock: QueryMode::Infer,
            query_java: QueryMode::Infer,
            return_on_first: false,
            coalesce_crossplay: true,
            check_blocked: false,
            use_srv: true,
            clean_motd: true,
            protocol_version: DEFAULT_PROTOCOL_VERSION,
            full_stat: false,
        }
    }
}

impl QueryOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(Error::Configuration("timeout must be positive".into()));
        }
        if self.port == Some(0) {
            return Err(Error::Configuration("port must be in 1..=65535".into()));
        }
        Ok(())
    }
}

const MAX_HOSTNAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// Splits `name[:port]` and validates both halves.
pub fn parse_host(host: &str) -> Result<(String, Option<u16>)> {
    let (name, port) = match host.rsplit_once(':') {
        Some((name, port)) => (name, Some(parse_port(port)?)),
        None => (host, None),
    };
    validate_hostname(name)?;
    Ok((name.to_string(), port))
}

fn parse_port(port: &str) -> Result<u16> {
    match port.parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(Error::Configuration(format!(
            "invalid port {port:?}, must be in 1..=65535"
        ))),
    }
}

fn validate_hostname(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_HOSTNAME_LEN {
        return Err(Error::Configuration(format!(
            "hostname must be 1 to {MAX_HOSTNAME_LEN} characters"
        )));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(Error::Configuration(format!(
            "hostname {name:?} contains invalid character {c:?}"
        )));
    }
    // a trailing dot is the root label
    for label in name.strip_suffix('.').unwrap_or(name).split('.') {
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return Err(Error::Configuration(format!(
                "hostname {name:?} has a label that isn't 1 to {MAX_LABEL_LEN} characters"
            )));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(Error::Configuration(format!(
                "hostname label {label:?} can't start or end with a hyphen"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options: QueryOptions = toml::from_str("").unwrap();
        assert_eq!(options, QueryOptions::default());
        assert_eq!(options.timeout(), Duration::from_secs(10));
        assert_eq!(options.query_java, QueryMode::Infer);
        assert!(options.coalesce_crossplay);
        assert!(options.use_srv);
        assert!(options.clean_motd);
        assert_eq!(options.protocol_version, 762);
    }

    #[test]
    fn test_config_file() {
        let config: Config = toml::from_str(
            r#"
            logging_dir = "logs"

            [query]
            timeout_ms = 2500
            port = 19132
            query_java = "no"
            query_bedrock = "yes"
            return_on_first = true
            "#,
        )
        .unwrap();
        assert_eq!(config.logging_dir, Some(PathBuf::from("logs")));
        assert_eq!(config.query.timeout_ms, 2500);
        assert_eq!(config.query.port, Some(19132));
        assert_eq!(config.query.query_java, QueryMode::No);
        assert_eq!(config.query.query_bedrock, QueryMode::Yes);
        assert_eq!(config.query.query_query, QueryMode::Infer);
        assert!(config.query.return_on_first);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(toml::from_str::<Config>("mongodb_uri = \"x\"").is_err());
        assert!(toml::from_str::<QueryOptions>("timeout = 5").is_err());
        assert!(toml::from_str::<QueryOptions>("query_java = \"maybe\"").is_err());
    }

    #[test]
    fn test_validate() {
        assert!(QueryOptions::default().validate().is_ok());
        let options = QueryOptions {
            timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(options.validate(), Err(Error::Configuration(_))));
        let options = QueryOptions {
            port: Some(0),
            ..Default::default()
        };
        assert!(matches!(options.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_parse_host() {
        assert_eq!(
            parse_host("play.example.com").unwrap(),
            ("play.example.com".to_string(), None)
        );
        assert_eq!(
            parse_host("mc_1.example.com:25566").unwrap(),
            ("mc_1.example.com".to_string(), Some(25566))
        );
        assert_eq!(
            parse_host("127.0.0.1:19132").unwrap(),
            ("127.0.0.1".to_string(), Some(19132))
        );
        assert!(parse_host("example.com.").is_ok());
    }

    #[test]
    fn test_parse_host_rejects() {
        for bad in [
            "",
            "example.com:0",
            "example.com:65536",
            "example.com:",
            "exa mple.com",
            "-example.com",
            "example-.com",
            "example..com",
            "ünicode.com",
        ] {
            assert!(
                matches!(parse_host(bad), Err(Error::Configuration(_))),
                "{bad:?} should be rejected"
            );
        }
        let long_label = format!("{}.com", "a".repeat(64));
        assert!(parse_host(&long_label).is_err());
        let long_name = vec!["a"; 128].join(".");
        assert!(long_name.len() > 253);
        assert!(parse_host(&long_name).is_err());
    }
}
