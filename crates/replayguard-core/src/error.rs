//! Error types for the replayguard verification engine.

/// Result type alias for replayguard operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error taxonomy for replayguard (see spec §7).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed session, malformed contract, bad flags, unsupported file extension.
    #[error("Input error: {message}")]
    Input {
        /// Human-readable description.
        message: String,
    },

    /// Template compilation or rendering failure for a single interaction.
    #[error("Render error: {message}")]
    Render {
        /// Human-readable description.
        message: String,
    },

    /// Unexpected differ failure. Recorded on the interaction, never aborts the session.
    #[error("Comparison error: {message}")]
    Comparison {
        /// Human-readable description.
        message: String,
    },

    /// Internal assertion failure. Always aborts.
    #[error("Invariant violation: {message}")]
    InvariantViolation {
        /// Human-readable description.
        message: String,
    },

    /// Cannot read/write files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON payload.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed YAML payload.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Could not reach the target service.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Malformed regex in a tolerance or filter pattern.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// Catch-all for errors that don't need their own variant.
    #[error("Generic error: {0}")]
    Generic(String),
}

impl From<String> for Error {
    fn from(message: String) -> Self {
        Self::Generic(message)
    }
}

impl Error {
    /// Build an [`Error::Input`].
    pub fn input<S: Into<String>>(message: S) -> Self {
        Self::Input {
            message: message.into(),
        }
    }

    /// Build an [`Error::Render`].
    pub fn render<S: Into<String>>(message: S) -> Self {
        Self::Render {
            message: message.into(),
        }
    }

    /// Build an [`Error::Comparison`].
    pub fn comparison<S: Into<String>>(message: S) -> Self {
        Self::Comparison {
            message: message.into(),
        }
    }

    /// Build an [`Error::InvariantViolation`].
    pub fn invariant<S: Into<String>>(message: S) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    /// Build an [`Error::Generic`].
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }
}
