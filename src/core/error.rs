use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed vocabulary expression.
    #[error("parse error at byte {position}: {message}")]
    Parse { position: usize, message: String },

    /// Operands of add/bind/dot disagree on dimension.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("unknown symbol `{0}`")]
    UnknownSymbol(String),

    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),

    #[error("unknown node `{0}`")]
    UnknownNode(String),

    #[error("node `{0}` already exists")]
    DuplicateNode(String),

    #[error("node `{node}` has no port `{port}`")]
    Port { node: String, port: String },

    #[error("dataflow graph contains a cycle")]
    Cycle,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn parse(position: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            position,
            message: message.into(),
        }
    }
}
