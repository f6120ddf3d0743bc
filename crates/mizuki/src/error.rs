use thiserror::Error;

#[derive(Error, Debug)]
pub enum MizukiError {
    /// A box declares a size its own header cannot satisfy. Parsing of the
    /// surrounding buffer cannot continue.
    #[error("Invalid ISOBMFF box size {size} for box {name:?}")]
    InvalidBoxSize { name: String, size: u64 },

    /// A sidx reference of type 1 points to another sidx. Hierarchical
    /// segment indexes are not implemented.
    #[error("Hierarchical sidx references are not supported")]
    HierarchicalSidx,

    /// A box was complete by its declared size but its payload ended before
    /// the fields the format mandates.
    #[error("Truncated {0} box payload")]
    TruncatedBox(&'static str),

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    #[error("Invalid media range: {0}")]
    InvalidMediaRange(String),
}

pub type MizukiResult<T> = Result<T, MizukiError>;
