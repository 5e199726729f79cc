use std::error::Error as StdError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub(crate) type AnyStdError = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Error, Debug)]
/// The Standard Error Type
pub enum MultipartError {
    /// Given if a boundary token is not valid according to RFC 2046
    #[error("Invalid Boundary: {0}")]
    InvalidBoundary(String),
    /// Given if the sources or the boundary are changed after the stream has started to be read
    #[error("Tried to modify a MultipartReader which is already being consumed")]
    AlreadyConsuming,
    /// Given if a file could not be opened for reading
    #[error("Could not open file {path:?}")]
    FileOpen {
        /// The path that was being opened
        path: PathBuf,
        /// The underlying io error
        #[source]
        source: io::Error,
    },
    /// Given if the metadata or position of a file could not be read
    #[error("Could not stat file {path:?}")]
    FileStat {
        /// The path of the file, `None` for files attached as an open handle
        path: Option<PathBuf>,
        /// The underlying io error
        #[source]
        source: io::Error,
    },
    /// Given if the content type can't be used as an http header value
    #[error("Invalid Header Value")]
    InvalidHeader,
    /// Given if there is an error in one of the underlying sources
    #[error(transparent)]
    SourceRead(#[from] AnyStdError),
}

impl MultipartError {
    /// Wrap the error of an external source
    ///
    /// Useful when driving a `MultipartReader` whose sources have their own error types
    pub fn source_read<E: Into<AnyStdError>>(err: E) -> Self {
        MultipartError::SourceRead(err.into())
    }
}

/// Result type used by the `MultipartReader`
pub type Result<T, E = MultipartError> = std::result::Result<T, E>;
