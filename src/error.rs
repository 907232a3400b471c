//! Error types for the PDF vault library

use std::io;
use std::path::PathBuf;
use thiserror::Error;
use crate::pdf::ObjectId;

/// Main error type for PDF operations
#[derive(Error, Debug)]
pub enum PDFError {
    /// Malformed PDF structure
    #[error("Malformed PDF structure: {0}")]
    MalformedPDF(String),

    /// Token that cannot start or continue an object
    #[error("Invalid token at offset {offset}: {message}")]
    InvalidToken {
        offset: usize,
        message: String,
    },

    /// Cross reference table error
    #[error("Cross reference table error: {0}")]
    XRefError(String),

    /// Input ended inside a construct
    #[error("Unexpected end of input while reading {0}")]
    UnexpectedEof(&'static str),

    /// Object not found
    #[error("Object not found: {0}")]
    ObjectNotFound(ObjectId),

    /// Unsupported encryption algorithm
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Key length does not match the algorithm
    #[error("Invalid key length: expected {expected} bytes, found {found}")]
    InvalidKeyLength {
        expected: usize,
        found: usize,
    },

    /// Invalid data length
    #[error("Invalid data length for {operation}: {length} bytes")]
    InvalidDataLength {
        operation: String,
        length: usize,
    },

    /// Unsupported encryption revision
    #[error("Unsupported revision: {0}")]
    UnsupportedRevision(u8),

    /// Unsupported security handler filter
    #[error("Unsupported encryption filter: {0}")]
    UnsupportedFilter(String),

    /// Cryptographic operation failed
    #[error("Cryptographic operation failed: {0}")]
    CryptoError(String),

    /// AES error
    #[error("AES error: {0}")]
    AesError(String),

    /// Authentication failed (wrong password)
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Operation called in the wrong document state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Native value has no PDF representation
    #[error("Cannot convert {from} to a PDF object: {reason}")]
    Conversion {
        from: &'static str,
        reason: String,
    },

    /// Invalid object type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        expected: &'static str,
        found: &'static str,
    },

    /// Missing required dictionary entry
    #[error("Missing required dictionary entry: {0}")]
    MissingDictionaryEntry(String),

    /// Invalid dictionary value
    #[error("Invalid dictionary value for key {key}: {message}")]
    InvalidDictionaryValue {
        key: String,
        message: String,
    },

    /// Compression error
    #[error("Compression error: {0}")]
    CompressionError(String),

    /// File IO error with the path involved
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

/// Result type for PDF operations
pub type PDFResult<T> = Result<T, PDFError>;

impl PDFError {
    /// Create a new malformed PDF error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedPDF(msg.into())
    }

    /// Create a new crypto error
    pub fn crypto(msg: impl Into<String>) -> Self {
        Self::CryptoError(msg.into())
    }

    /// Create a new invalid data length error
    pub fn invalid_length(operation: impl Into<String>, length: usize) -> Self {
        Self::InvalidDataLength {
            operation: operation.into(),
            length,
        }
    }

    /// Create a new invalid dictionary value error
    pub fn invalid_dict_value(key: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidDictionaryValue {
            key: key.into(),
            message: msg.into(),
        }
    }

    /// Attach a path to an IO error
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if error is authentication related
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::AuthenticationFailed)
    }

    /// Check if error is a crypto configuration error
    pub fn is_crypto_error(&self) -> bool {
        matches!(self,
            Self::UnsupportedAlgorithm(_) |
            Self::InvalidKeyLength { .. } |
            Self::InvalidDataLength { .. } |
            Self::UnsupportedRevision(_) |
            Self::UnsupportedFilter(_) |
            Self::CryptoError(_) |
            Self::AesError(_)
        )
    }

    /// Check if error is related to PDF structure
    pub fn is_structure_error(&self) -> bool {
        matches!(self,
            Self::MalformedPDF(_) |
            Self::InvalidToken { .. } |
            Self::XRefError(_) |
            Self::UnexpectedEof(_)
        )
    }

    /// Missing objects are the only errors callers may treat as `null`
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ObjectNotFound(_))
    }
}

impl From<aes::cipher::InvalidLength> for PDFError {
    fn from(err: aes::cipher::InvalidLength) -> Self {
        Self::AesError(err.to_string())
    }
}
