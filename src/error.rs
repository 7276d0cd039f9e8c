use std::fmt;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    #[error("malformed field {field:?}: {reason}")]
    MalformedField { field: &'static str, reason: String },
    #[error("value for {0:?} is missing")]
    MissingField(&'static str),
    #[error("{0} bytes left over after decoding every field")]
    TrailingBytes(usize),
    /// A field decoded without consuming anything. This is a codec bug, not
    /// bad input.
    #[error("decoding {0:?} made no progress")]
    ZeroProgress(&'static str),

    #[error("expected packet id {expected:#04x}, got {actual:#04x}")]
    PacketIdMismatch { expected: i32, actual: i32 },
    #[error("magic bytes for {0:?} don't match")]
    MagicMismatch(&'static str),
    #[error("received more bytes than expected (expected {expected}, received {received})")]
    OverreadFrame { expected: usize, received: usize },
    #[error("pong payload doesn't match the ping payload")]
    PayloadEchoMismatch,

    #[error("connection timed out")]
    ConnectionTimeout,
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
    #[error("invalid status json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("dns lookup failed: {0}")]
    Dns(String),

    #[error(transparent)]
    AllQueriersFailed(#[from] AggregateError),
}

impl Error {
    pub(crate) fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        Error::MalformedField {
            field,
            reason: reason.into(),
        }
    }
}

/// Every selected querier failed. Keeps each individual error next to a label
/// naming the querier and the address it was pointed at.
#[derive(Debug)]
pub struct AggregateError {
    pub errors: Vec<(String, Error)>,
}

impl AggregateError {
    pub fn new(errors: Vec<(String, Error)>) -> Self {
        Self { errors }
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "all queriers failed")?;
        for (label, error) in &self.errors {
            write!(f, "\n    {label}:")?;
            // only the first two lines of each error, they can get long
            for line in error.to_string().lines().take(2) {
                write!(f, "\n        {line}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}
