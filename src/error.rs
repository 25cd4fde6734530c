use thiserror::Error;

/// type alias for all operations in this crate that could fail with an [`SkvError`]
pub type Result<T> = std::result::Result<T, SkvError>;

/// The error variants used throughout the codec, store and networking layers.
///
/// Absence of a key is never an error; it is modeled as `Option::None` at the
/// [`Store`](crate::Store) level and as a `NOT FOUND` reply on the wire.
#[derive(Error, Debug)]
pub enum SkvError {
    /// malformed or truncated wire bytes, an unknown frame tag, or an
    /// unrecognized message kind
    #[error("protocol error: {0}")]
    Protocol(String),

    /// a persistence read/write failed
    #[error("store io error: {0}")]
    StoreIo(#[from] std::io::Error),

    /// a value could not be (de)serialized to its on-disk JSON form
    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// a command line parameter failed validation
    #[error("{0}")]
    Parsing(String),

    /// the background accept loop terminated abnormally
    #[error("server error: {0}")]
    Server(String),
}
