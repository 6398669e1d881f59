use thiserror::Error;

/// diskimg error types
#[derive(Error, Debug)]
pub enum ImageError {
    /// Subprocess was killed for breaching its address-space or CPU-time ceiling
    #[error("Resource limit exceeded: {binary} {reason}")]
    ResourceLimitExceeded {
        binary: String,
        reason: String,
        output: String,
    },

    /// Subprocess exited non-zero (or died on a signal) for any other reason
    #[error("{binary} failed with {status}: {output}")]
    SubprocessFailed {
        binary: String,
        status: String,
        output: String,
    },

    /// Subprocess could not be started
    #[error("Failed to start {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// Structured tool output did not have the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Image failed a validation rule
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationFailure),

    /// Size string could not be parsed as a quantity
    #[error("Invalid quantity '{input}': {reason}")]
    InvalidQuantity { input: String, reason: String },

    /// Source URL could not be used for a streaming conversion
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A failed operation, wrapped with what was being attempted
    #[error("{context}: {source}")]
    Operation {
        context: String,
        #[source]
        source: Box<ImageError>,
    },
}

/// Business-rule violations reported by image validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    #[error("image format is {actual}, expected {expected}")]
    FormatMismatch { expected: String, actual: String },

    #[error("virtual image size {virtual_size} is larger than available size {available}")]
    SizeExceeded { virtual_size: i64, available: i64 },

    #[error("image has a backing file ({0}), backed images are not supported")]
    BackingFile(String),
}

/// Coarse classification of an [`ImageError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ResourceLimitExceeded,
    SubprocessFailed,
    ParseFailure,
    ValidationFailed,
    Io,
    InvalidInput,
}

impl ImageError {
    /// Wrap this error with a description of the operation that failed.
    pub fn context(self, context: impl Into<String>) -> Self {
        ImageError::Operation {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Classification of the root cause, looking through operation wrappers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ImageError::ResourceLimitExceeded { .. } => ErrorKind::ResourceLimitExceeded,
            ImageError::SubprocessFailed { .. } => ErrorKind::SubprocessFailed,
            ImageError::Spawn { .. } | ImageError::Io(_) => ErrorKind::Io,
            ImageError::Parse(_) => ErrorKind::ParseFailure,
            ImageError::Validation(_) => ErrorKind::ValidationFailed,
            ImageError::InvalidQuantity { .. }
            | ImageError::InvalidUrl(_)
            | ImageError::Config(_) => ErrorKind::InvalidInput,
            ImageError::Operation { source, .. } => source.kind(),
        }
    }

    /// The innermost error, looking through operation wrappers.
    pub fn root(&self) -> &ImageError {
        match self {
            ImageError::Operation { source, .. } => source.root(),
            other => other,
        }
    }

    /// Captured subprocess output attached to the root cause, if any.
    pub fn output(&self) -> Option<&str> {
        match self.root() {
            ImageError::ResourceLimitExceeded { output, .. }
            | ImageError::SubprocessFailed { output, .. } => Some(output),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ImageError {
    fn from(err: serde_json::Error) -> Self {
        ImageError::Parse(err.to_string())
    }
}

impl From<serde_yaml::Error> for ImageError {
    fn from(err: serde_yaml::Error) -> Self {
        ImageError::Config(err.to_string())
    }
}

/// Result type alias for diskimg operations
pub type Result<T> = std::result::Result<T, ImageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_limit_display() {
        let error = ImageError::ResourceLimitExceeded {
            binary: "qemu-img".to_string(),
            reason: "killed by signal 24 (CPU time limit)".to_string(),
            output: String::new(),
        };
        assert_eq!(
            error.to_string(),
            "Resource limit exceeded: qemu-img killed by signal 24 (CPU time limit)"
        );
    }

    #[test]
    fn test_subprocess_failed_display() {
        let error = ImageError::SubprocessFailed {
            binary: "qemu-img".to_string(),
            status: "exit status 1".to_string(),
            output: "Could not open 'x'".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "qemu-img failed with exit status 1: Could not open 'x'"
        );
    }

    #[test]
    fn test_operation_wraps_message() {
        let error = ImageError::Parse("missing field `format`".to_string())
            .context("could not inspect image /tmp/disk.img");
        assert_eq!(
            error.to_string(),
            "could not inspect image /tmp/disk.img: Parse error: missing field `format`"
        );
    }

    #[test]
    fn test_kind_sees_through_wrappers() {
        let error = ImageError::ResourceLimitExceeded {
            binary: "qemu-img".to_string(),
            reason: "killed".to_string(),
            output: "partial".to_string(),
        }
        .context("inner")
        .context("outer");
        assert_eq!(error.kind(), ErrorKind::ResourceLimitExceeded);
        assert_eq!(error.output(), Some("partial"));
    }

    #[test]
    fn test_validation_failure_display() {
        let error: ImageError = ValidationFailure::SizeExceeded {
            virtual_size: 20,
            available: 10,
        }
        .into();
        assert_eq!(error.kind(), ErrorKind::ValidationFailed);
        assert_eq!(
            error.to_string(),
            "Validation failed: virtual image size 20 is larger than available size 10"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: ImageError = io_error.into();
        assert!(matches!(error, ImageError::Io(_)));
        assert_eq!(error.kind(), ErrorKind::Io);
        assert!(error.output().is_none());
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let result: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ bad");
        let error: ImageError = result.unwrap_err().into();
        assert_eq!(error.kind(), ErrorKind::ParseFailure);
    }
}
