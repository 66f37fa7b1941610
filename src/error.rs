//! Error types and handling for payload pooling and dispatch

/// Result type alias for payload operations
pub type Result<T> = std::result::Result<T, PayloadError>;

/// Error kinds raised while pooling buffers and framing records
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// Truncated or malformed envelope or body
    #[error("Format error at offset {offset}: {message}")]
    Format { offset: usize, message: String },

    /// No factory registered for a type code
    #[error("Unknown payload type code {type_code}")]
    UnknownType { type_code: i32 },

    /// Acquire bound reached; the caller should back off or retry
    #[error("Pool denied {requested} bytes: {acquired_bytes} acquired, limit {limit}")]
    PoolDenied {
        requested: usize,
        acquired_bytes: usize,
        limit: usize,
    },

    /// The same buffer was released twice
    #[error("Duplicate release of buffer #{id} ({capacity} bytes)")]
    DuplicateRelease { id: u64, capacity: usize },

    /// A released buffer was never produced by a pool of this granularity
    #[error("Unmanaged buffer of {capacity} bytes (granularity {granularity})")]
    UnmanagedBuffer { capacity: usize, granularity: usize },

    /// Invalid parameters or configuration
    #[error("Invalid parameter: {parameter} - {message}")]
    InvalidParameter { parameter: String, message: String },

    /// Operation not provided by a factory
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// I/O related errors from record streams
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl PayloadError {
    /// Create an I/O error from a standard I/O error
    pub fn from_io(source: std::io::Error, context: &str) -> Self {
        Self::Io {
            message: format!("{}: {}", context, source),
            source: Some(source),
        }
    }

    /// Create a format error
    pub fn format(offset: usize, message: impl Into<String>) -> Self {
        Self::Format {
            offset,
            message: message.into(),
        }
    }

    /// Create a format error for a region that is too short
    pub fn truncated(offset: usize, needed: usize, available: usize) -> Self {
        Self::format(
            offset,
            format!("need {} bytes, only {} available", needed, available),
        )
    }

    /// Create an unknown type error
    pub fn unknown_type(type_code: i32) -> Self {
        Self::UnknownType { type_code }
    }

    /// Create a pool denial
    pub fn pool_denied(requested: usize, acquired_bytes: usize, limit: usize) -> Self {
        Self::PoolDenied {
            requested,
            acquired_bytes,
            limit,
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported operation error
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// True for errors local to a single decode call
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Self::Format { .. } | Self::UnknownType { .. })
    }
}

impl From<std::io::Error> for PayloadError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io(err, "I/O operation failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = PayloadError::truncated(4, 16, 10);
        assert!(matches!(err, PayloadError::Format { offset: 4, .. }));

        let err = PayloadError::unknown_type(77);
        assert!(matches!(err, PayloadError::UnknownType { type_code: 77 }));
        assert!(err.is_decode_error());

        let err = PayloadError::pool_denied(128, 1024, 1024);
        assert!(!err.is_decode_error());
    }

    #[test]
    fn test_error_display() {
        let err = PayloadError::truncated(0, 16, 3);
        let display = format!("{}", err);
        assert!(display.contains("Format error"));
        assert!(display.contains("need 16 bytes"));

        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short");
        let display = format!("{}", PayloadError::from(io));
        assert!(display.contains("I/O operation failed"));
    }
}
