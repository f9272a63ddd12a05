//! Error types for Strata.

/// Errors that can occur while reconciling allocations with backend storage.
///
/// All error variants are marked with `#[non_exhaustive]` to allow
/// adding new error types without breaking changes.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Input failed validation (bad protocol name, non-absolute path,
    /// missing required field).
    #[error("Validation error: {message}")]
    Validation {
        /// Field or aspect that failed validation
        field: Option<String>,
        /// What went wrong
        message: String,
    },

    /// A group, path, or allocation lookup missed.
    #[error("{kind} not found: {name}")]
    NotFound {
        /// What kind of thing was looked up ("group", "path", "allocation", ...)
        kind: &'static str,
        /// The name or identifier that was looked up
        name: String,
    },

    /// Network or API failure talking to an external backend.
    ///
    /// Surfaced to the caller so the next scheduler tick can try again.
    #[error("Backend error: {message}")]
    TransientBackend {
        /// Human-readable error message
        message: String,
        /// Source error if available
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The backend object already exists (export, share, quota).
    #[error("Conflict: {message}")]
    Conflict {
        /// What already exists
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// What configuration is problematic
        message: String,
    },

    /// I/O error (config files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Convenience `Result` type alias for Strata operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns whether this error is retryable.
    ///
    /// Only transient backend failures and I/O errors are worth another
    /// attempt; everything else needs a human or a different input.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::TransientBackend { .. } => true,
            Error::Io(_) => true,
            Error::Validation { .. } => false,
            Error::NotFound { .. } => false,
            Error::Conflict { .. } => false,
            Error::Config { .. } => false,
            Error::Serialization(_) => false,
            Error::TomlParse(_) => false,
        }
    }

    /// Returns `true` for [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Returns `true` for [`Error::Conflict`].
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }

    /// Creates a new validation error.
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Error::Validation {
            field: None,
            message: message.into(),
        }
    }

    /// Creates a new validation error with a field name.
    pub fn validation_field<F, M>(field: F, message: M) -> Self
    where
        F: Into<String>,
        M: Into<String>,
    {
        Error::Validation {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// Creates a new not-found error.
    pub fn not_found<S: Into<String>>(kind: &'static str, name: S) -> Self {
        Error::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Creates a new transient backend error with a message.
    pub fn backend<S: Into<String>>(message: S) -> Self {
        Error::TransientBackend {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new transient backend error with a message and source error.
    pub fn backend_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::TransientBackend {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new conflict error.
    pub fn conflict<S: Into<String>>(message: S) -> Self {
        Error::Conflict {
            message: message.into(),
        }
    }

    /// Creates a new configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Config {
            message: message.into(),
        }
    }
}
