use thiserror::Error;

/// Errors raised by the source store that holds the original images
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// Source file does not exist
    #[error("Source not found: {0}")]
    NotFound(String),

    /// Request path cannot be mapped onto the source store
    #[error("Invalid source path: {0}")]
    InvalidPath(String),

    /// Filesystem or storage error
    #[error("Source I/O error: {0}")]
    Io(String),
}

impl SourceError {
    /// Map a `std::io::Error` for the given path, keeping "not found" distinct.
    pub fn from_io(path: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            SourceError::NotFound(path.to_string())
        } else {
            SourceError::Io(format!("{}: {}", path, err))
        }
    }
}

/// Errors raised by the transformation engine
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Reading the source failed
    #[error("{0}")]
    Source(#[from] SourceError),

    /// Manipulation parameter has an unusable value
    #[error("Invalid value for parameter '{name}': {value}")]
    InvalidParam { name: String, value: String },

    /// Source bytes could not be decoded as an image
    #[error("Failed to decode image: {message}")]
    Decode { message: String },

    /// Derivative could not be encoded
    #[error("Failed to encode image: {message}")]
    Encode { message: String },

    /// Derivative cache could not be read or written
    #[error("Derivative cache error: {0}")]
    Cache(String),

    /// Engine could not be constructed
    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    /// Engine output metadata cannot be put on the wire
    #[error("Invalid response metadata: {0}")]
    InvalidMetadata(String),
}

/// Cause carried by a failure event.
#[derive(Debug, Clone, Error)]
pub enum FailureCause {
    /// Modified time lookup failed during the conditional cache check
    #[error("{0}")]
    SourceMetadata(SourceError),

    /// Pass-through or transformation failed
    #[error("{0}")]
    Engine(EngineError),
}

impl FailureCause {
    /// Whether the underlying failure is a missing source file.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            FailureCause::SourceMetadata(SourceError::NotFound(_))
                | FailureCause::Engine(EngineError::Source(SourceError::NotFound(_)))
        )
    }
}

impl From<SourceError> for FailureCause {
    fn from(err: SourceError) -> Self {
        FailureCause::SourceMetadata(err)
    }
}

impl From<EngineError> for FailureCause {
    fn from(err: EngineError) -> Self {
        FailureCause::Engine(err)
    }
}

/// Request signature errors. Always fatal to the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// No `s` query parameter
    #[error("Signature is missing.")]
    Missing,

    /// `s` does not match the expected signature
    #[error("Signature is not valid.")]
    Mismatch,
}

/// Errors propagated to the caller of the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Request failed signature validation
    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// A failure no observer handled; the cause is kept for logging only
    #[error("Unable to generate image response")]
    ResponseFailure(#[source] FailureCause),

    /// A failure no observer handled, re-raised as-is in debug mode
    #[error(transparent)]
    Failure(FailureCause),
}

/// Invalid pipeline configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Signed URLs enabled with neither a sign key nor an application secret
    #[error("Signed URLs are enabled but no sign key or application secret is configured")]
    MissingSignKey,

    /// Scope prefix given but empty
    #[error("Scope prefix must not be empty")]
    EmptyScopePrefix,

    /// Custom header name or value is not valid HTTP
    #[error("Invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    /// Cache TTL would put `Expires` past the last representable HTTP-date
    #[error("Cache TTL of {0}s expires after 9999-12-31")]
    CacheTtlTooLarge(u64),
}
