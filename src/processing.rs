//! Turning raw server responses into something readable.

pub mod motd;
pub mod status;

pub use motd::clean_motd;
pub use status::parse_status_json;
