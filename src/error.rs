use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the sfdoc library.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// Missing or invalid configuration.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Detailed error message
        message: String,
    },

    /// IO error with context about the file path.
    #[error("IO error accessing '{path}': {message}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Invalid UTF-8 encountered in file.
    #[error("Invalid UTF-8 encoding in file '{path}'. File may be binary or use unsupported encoding.")]
    InvalidUtf8 {
        /// Path to file with encoding issues
        path: PathBuf,
    },

    /// No Salesforce source files found.
    #[error("No Salesforce source files found in '{path}'")]
    NoFiles {
        /// Directory that was scanned
        path: PathBuf,
    },

    /// Invalid glob pattern in the artifact table.
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The invalid pattern
        pattern: String,
        /// Reason why it's invalid
        reason: String,
    },

    /// Template registration or rendering error.
    #[error("Failed to render template '{template}': {message}")]
    Template {
        /// Template name
        template: String,
        /// Error message
        message: String,
    },

    /// The generation API answered with a non-success status.
    #[error("Generation API returned {status}: {body}")]
    Upstream {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// The generation call exceeded its wait budget.
    #[error("Generation API did not answer within {seconds}s")]
    Timeout {
        /// Configured budget in seconds
        seconds: u64,
    },

    /// Connection-level HTTP failure.
    #[error("HTTP transport error: {message}")]
    Transport {
        /// Error message
        message: String,
    },

    /// A wiki search, fetch, create or update call failed.
    #[error("Wiki {operation} failed with status {status}: {body}")]
    Publish {
        /// Operation that failed (search, fetch, create, update, space)
        operation: String,
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// A wiki call failed before a usable HTTP response was read.
    #[error("Wiki {operation} failed: {message}")]
    PublishTransport {
        /// Operation that failed (search, fetch, create, update, space)
        operation: String,
        /// Connection or decoding error message
        message: String,
    },

    /// The wiki rejected an update because the page moved past the version we read.
    #[error("Wiki rejected update of page {page_id} to version {attempted}: version conflict")]
    VersionConflict {
        /// Page identifier
        page_id: String,
        /// Version number that was sent
        attempted: u64,
    },

    /// JSON serialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message
        message: String,
    },
}

impl Error {
    /// Creates an IO error with path context.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a template error.
    #[must_use]
    pub fn template(template: impl Into<String>, source: tera::Error) -> Self {
        // Tera keeps the useful part of the message in the source chain.
        let mut message = source.to_string();
        let mut cause = std::error::Error::source(&source);
        while let Some(inner) = cause {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            cause = std::error::Error::source(inner);
        }

        Self::Template {
            template: template.into(),
            message,
        }
    }

    /// Creates a template validation error.
    #[must_use]
    pub fn template_validation(template: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Template {
            template: template.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid UTF-8 error.
    #[must_use]
    pub fn invalid_utf8(path: impl Into<PathBuf>) -> Self {
        Self::InvalidUtf8 { path: path.into() }
    }

    /// Creates a no files error.
    #[must_use]
    pub fn no_files(path: impl Into<PathBuf>) -> Self {
        Self::NoFiles { path: path.into() }
    }

    /// Creates an invalid pattern error.
    #[must_use]
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }

    /// Creates an upstream (generation API) error.
    #[must_use]
    pub fn upstream(status: u16, body: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            body: body.into(),
        }
    }

    /// Creates a wiki publishing error.
    #[must_use]
    pub fn publish(operation: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Publish {
            operation: operation.into(),
            status,
            body: body.into(),
        }
    }

    /// Creates a wiki error for a failure that carries no HTTP status.
    #[must_use]
    pub fn publish_transport(operation: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::PublishTransport {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    /// Creates a transport error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Returns true if this is an IO error.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::InvalidUtf8 { .. })
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Returns true if the generation API failed or timed out.
    #[must_use]
    pub const fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream { .. } | Self::Timeout { .. })
    }

    /// Returns true if publishing to the wiki failed.
    #[must_use]
    pub const fn is_publish(&self) -> bool {
        matches!(
            self,
            Self::Publish { .. } | Self::PublishTransport { .. } | Self::VersionConflict { .. }
        )
    }
}

impl From<tera::Error> for Error {
    fn from(e: tera::Error) -> Self {
        Self::template("unknown", e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::config("test message");
        assert!(err.is_config());
        assert!(err.to_string().contains("test message"));
    }

    #[test]
    fn test_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::io("/tmp/test.cls", io_err);
        assert!(err.is_io());
        assert!(err.to_string().contains("/tmp/test.cls"));
    }

    #[test]
    fn test_upstream_error_carries_status_and_body() {
        let err = Error::upstream(529, "{\"type\":\"overloaded_error\"}");
        assert!(err.is_upstream());
        assert!(err.to_string().contains("529"));
        assert!(err.to_string().contains("overloaded_error"));
    }

    #[test]
    fn test_timeout_is_upstream() {
        let err = Error::Timeout { seconds: 180 };
        assert!(err.is_upstream());
        assert!(err.to_string().contains("180s"));
    }

    #[test]
    fn test_version_conflict_is_publish() {
        let err = Error::VersionConflict {
            page_id: "42".to_string(),
            attempted: 4,
        };
        assert!(err.is_publish());
        assert!(err.to_string().contains("version 4"));
    }

    #[test]
    fn test_wiki_transport_failure_is_publish() {
        let err = Error::publish_transport("search", "connection refused");
        assert!(err.is_publish());
        assert!(!err.is_upstream());
        assert_eq!(err.to_string(), "Wiki search failed: connection refused");
    }

    #[test]
    fn test_serialization_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(err.to_string().contains("Serialization error"));
    }
}
