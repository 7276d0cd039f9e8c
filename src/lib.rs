//! Ask a Minecraft server about itself over the Java status protocol, the
//! Bedrock unconnected ping, and the Query protocol.

pub mod codec;
pub mod config;
pub mod dns;
pub mod error;
pub mod net;
pub mod orchestrator;
pub mod processing;
pub mod protocols;
pub mod terminal_colors;
pub mod tracing;

pub use config::{QueryMode, QueryOptions};
pub use error::{AggregateError, Error, Result};
pub use orchestrator::{ServerStatus, query_server, query_server_with};
pub use protocols::{QueryResult, ServerKind};
