//! Error types for OxiFlate operations.
//!
//! Recoverable conditions (`BufError`, `NeedDict`) are not errors: they are
//! reported as [`Status`](crate::stream::Status) values inside `Ok`. Everything
//! in this module is fatal for the call that produced it.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for OxiFlate operations.
#[derive(Debug, Error)]
pub enum FlateError {
    /// I/O error from an underlying reader/writer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The compressed data is structurally invalid.
    #[error("Invalid compressed data at offset {offset}: {message}")]
    Data {
        /// Compressed-input offset where the problem was detected.
        offset: u64,
        /// Description of the problem.
        message: String,
    },

    /// Trailer checksum does not match the decoded data.
    #[error("Checksum mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        /// Checksum stored in the stream.
        expected: u32,
        /// Checksum computed over the decoded data.
        computed: u32,
    },

    /// An internal buffer could not be allocated.
    #[error("Out of memory: failed to reserve {requested} bytes")]
    Mem {
        /// Number of bytes requested.
        requested: usize,
    },

    /// The operation is not valid in the current stream state.
    #[error("Stream error: {message}")]
    Stream {
        /// Description of the misuse.
        message: String,
    },

    /// The configuration is not supported by this build.
    #[error("Unsupported configuration: {message}")]
    Version {
        /// Description of the unsupported parameter.
        message: String,
    },

    /// A file could not be found.
    #[error("File not found: {}", path.display())]
    NotFound {
        /// Path that was opened.
        path: PathBuf,
    },

    /// Access to a file was denied.
    #[error("Permission denied: {}", path.display())]
    Permission {
        /// Path that was opened.
        path: PathBuf,
    },
}

/// Coarse error classification, mirroring the zlib return-code families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Corrupt or inconsistent compressed data.
    DataError,
    /// Allocation failure.
    MemError,
    /// Caller misuse.
    StreamError,
    /// Unsupported configuration.
    VersionError,
    /// Underlying I/O failure.
    Io,
    /// File does not exist.
    NotFound,
    /// File access denied.
    Permission,
}

/// Result type alias for OxiFlate operations.
pub type Result<T> = std::result::Result<T, FlateError>;

impl FlateError {
    /// Create a data error.
    pub fn data(offset: u64, message: impl Into<String>) -> Self {
        Self::Data {
            offset,
            message: message.into(),
        }
    }

    /// Create a checksum mismatch error.
    pub fn checksum_mismatch(expected: u32, computed: u32) -> Self {
        Self::ChecksumMismatch { expected, computed }
    }

    /// Create a stream (misuse) error.
    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream {
            message: message.into(),
        }
    }

    /// Create a version (unsupported configuration) error.
    pub fn version(message: impl Into<String>) -> Self {
        Self::Version {
            message: message.into(),
        }
    }

    /// Create a memory error.
    pub fn mem(requested: usize) -> Self {
        Self::Mem { requested }
    }

    /// Map an I/O error raised while opening `path`.
    pub fn from_open(err: io::Error, path: impl Into<PathBuf>) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound { path: path.into() },
            io::ErrorKind::PermissionDenied => Self::Permission { path: path.into() },
            _ => Self::Io(err),
        }
    }

    /// Classify this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Io(_) => ErrorCode::Io,
            Self::Data { .. } | Self::ChecksumMismatch { .. } => ErrorCode::DataError,
            Self::Mem { .. } => ErrorCode::MemError,
            Self::Stream { .. } => ErrorCode::StreamError,
            Self::Version { .. } => ErrorCode::VersionError,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::Permission { .. } => ErrorCode::Permission,
        }
    }

    /// Whether this is a data error.
    pub fn is_data_error(&self) -> bool {
        self.code() == ErrorCode::DataError
    }

    /// Rebuild an equivalent error for replaying a sticky failure.
    ///
    /// `io::Error` is not `Clone`, so I/O errors keep only their kind and text.
    pub fn replay(&self) -> Self {
        match self {
            Self::Io(e) => Self::Io(io::Error::new(e.kind(), e.to_string())),
            Self::Data { offset, message } => Self::data(*offset, message.clone()),
            Self::ChecksumMismatch { expected, computed } => {
                Self::checksum_mismatch(*expected, *computed)
            }
            Self::Mem { requested } => Self::mem(*requested),
            Self::Stream { message } => Self::stream(message.clone()),
            Self::Version { message } => Self::version(message.clone()),
            Self::NotFound { path } => Self::NotFound { path: path.clone() },
            Self::Permission { path } => Self::Permission { path: path.clone() },
        }
    }
}

impl Clone for FlateError {
    fn clone(&self) -> Self {
        self.replay()
    }
}

impl From<FlateError> for io::Error {
    fn from(err: FlateError) -> Self {
        match err {
            FlateError::Io(e) => e,
            FlateError::NotFound { .. } => io::Error::new(io::ErrorKind::NotFound, err),
            FlateError::Permission { .. } => io::Error::new(io::ErrorKind::PermissionDenied, err),
            FlateError::Data { .. } | FlateError::ChecksumMismatch { .. } => {
                io::Error::new(io::ErrorKind::InvalidData, err)
            }
            FlateError::Stream { .. } | FlateError::Version { .. } => {
                io::Error::new(io::ErrorKind::InvalidInput, err)
            }
            FlateError::Mem { .. } => io::Error::new(io::ErrorKind::OutOfMemory, err),
        }
    }
}
