use thiserror::Error;

/// Result type alias using StorageError
pub type Result<T> = std::result::Result<T, StorageError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// This taxonomy provides a stable, structured classification of all errors
/// raised by the storage kernel. Each kind maps to a stable error code that
/// can be used for programmatic error handling, testing, and host-facing
/// error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Routing
    NotFound,

    // Validation
    MalformedAction,
    InvalidSnapshot,

    // Filter pipeline
    FilterNotRegistered,
    FilterFailed,

    // Integration
    Config,
    Io,
    Serialization,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::MalformedAction => "ERR_MALFORMED_ACTION",
            ExErrorKind::InvalidSnapshot => "ERR_INVALID_SNAPSHOT",
            ExErrorKind::FilterNotRegistered => "ERR_FILTER_NOT_REGISTERED",
            ExErrorKind::FilterFailed => "ERR_FILTER_FAILED",
            ExErrorKind::Config => "ERR_CONFIG",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// This error type provides a structured representation of errors with
/// classification fields for programmatic handling and rich context for debugging.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    grid_id: Option<String>,
    layer_id: Option<String>,
    object_id: Option<String>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            grid_id: None,
            layer_id: None,
            object_id: None,
            message: String::new(),
            source: None,
        }
    }

    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    pub fn with_grid_id(mut self, id: impl Into<String>) -> Self {
        self.grid_id = Some(id.into());
        self
    }

    pub fn with_layer_id(mut self, id: impl Into<String>) -> Self {
        self.layer_id = Some(id.into());
        self
    }

    pub fn with_object_id(mut self, id: impl Into<String>) -> Self {
        self.object_id = Some(id.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn grid_id(&self) -> Option<&str> {
        self.grid_id.as_deref()
    }

    pub fn layer_id(&self) -> Option<&str> {
        self.layer_id.as_deref()
    }

    pub fn object_id(&self) -> Option<&str> {
        self.object_id.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(grid_id) = &self.grid_id {
            write!(f, " (grid_id: {})", grid_id)?;
        }
        if let Some(layer_id) = &self.layer_id {
            write!(f, " (layer_id: {})", layer_id)?;
        }
        if let Some(object_id) = &self.object_id {
            write!(f, " (object_id: {})", object_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

// ========== End Error Facility ==========

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    // ===== Routing Errors =====
    #[error("No storage registered for grid {grid_id}, layer {layer_id}")]
    StorageNotFound { grid_id: String, layer_id: String },

    // ===== Validation Errors =====
    #[error("Malformed history action: {reason}")]
    MalformedAction { reason: String },

    #[error("Invalid snapshot for layer {layer_id}: {reason}")]
    InvalidSnapshot { layer_id: String, reason: String },

    // ===== Filter Errors =====
    #[error("Storage filter {filter_id} is not registered")]
    FilterNotRegistered { filter_id: u64 },

    #[error("Storage filter failed: {message}")]
    FilterFailed { message: String },

    // ===== Generic Errors =====
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("IO error: {message}")]
    Io { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl StorageError {
    /// Convenience constructor for filters that need to abort an edit
    pub fn filter(message: impl Into<String>) -> Self {
        StorageError::FilterFailed {
            message: message.into(),
        }
    }
}

impl From<StorageError> for ExError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::StorageNotFound { grid_id, layer_id } => {
                ExError::new(ExErrorKind::NotFound)
                    .with_grid_id(grid_id)
                    .with_layer_id(layer_id)
                    .with_message("Storage not registered")
            }

            StorageError::MalformedAction { reason } => ExError::new(ExErrorKind::MalformedAction)
                .with_message(format!("Malformed history action: {}", reason)),

            StorageError::InvalidSnapshot { layer_id, reason } => {
                ExError::new(ExErrorKind::InvalidSnapshot)
                    .with_layer_id(layer_id)
                    .with_message(reason)
            }

            StorageError::FilterNotRegistered { filter_id } => {
                ExError::new(ExErrorKind::FilterNotRegistered)
                    .with_op("remove_storage_filters")
                    .with_message(format!("Filter {} is not registered", filter_id))
            }

            StorageError::FilterFailed { message } => {
                ExError::new(ExErrorKind::FilterFailed).with_message(message)
            }

            StorageError::Config { message } => {
                ExError::new(ExErrorKind::Config).with_message(message)
            }

            StorageError::Io { message } => ExError::new(ExErrorKind::Io).with_message(message),

            StorageError::Serialization { message } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }

            StorageError::Internal { message } => {
                ExError::new(ExErrorKind::Internal).with_message(message)
            }
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for StorageError {
    fn from(err: toml::de::Error) -> Self {
        StorageError::Config {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io {
            message: err.to_string(),
        }
    }
}
