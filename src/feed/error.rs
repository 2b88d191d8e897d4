use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("record is not valid UTF-8: {0}")]
    InvalidUtf8(String),
    #[error("invalid record: {0}")]
    InvalidJson(String),
    #[error("record has no geometry")]
    MissingGeometry,
    #[error("spatial reference mismatch: expected wkid {expected}, found {found}")]
    SpatialReferenceMismatch { expected: u32, found: u32 },
}

/// A source line that could not be turned into an observation.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("line {line}: {error}")]
pub struct RecordError {
    pub line: usize,
    pub error: ParseError,
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed already connected")]
    AlreadyConnected,
    #[error("feed is closed, create a new feed to replay again")]
    Closed,
    #[error("cannot open {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },
    #[error("read error: {0}")]
    Read(#[from] std::io::Error),
    #[error("malformed record, {0}")]
    Malformed(RecordError),
    #[error("replay task failed: {0}")]
    Task(String),
}
