use thiserror::Error;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Every failure raised by the data-access layer is classified into one of
/// these kinds. Each kind maps to a stable code that callers can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExErrorKind {
    // Usage
    InvalidInput,
    NotFound,

    // Data access
    /// A statement failed at the SQL execution boundary
    DataAccess,
    /// A row could not be turned into an entity, or an entity into parameters
    Mapping,
    /// Rolling back a failed commit itself failed
    RollbackFailed,

    // Wiring
    /// An entity type was staged without a registered repository
    Configuration,

    // Pool
    PoolExhausted,
    PoolShutdown,
    Interrupted,

    // Ambient
    Io,
    Serialization,
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::DataAccess => "ERR_DATA_ACCESS",
            ExErrorKind::Mapping => "ERR_MAPPING",
            ExErrorKind::RollbackFailed => "ERR_ROLLBACK_FAILED",
            ExErrorKind::Configuration => "ERR_CONFIGURATION",
            ExErrorKind::PoolExhausted => "ERR_POOL_EXHAUSTED",
            ExErrorKind::PoolShutdown => "ERR_POOL_SHUTDOWN",
            ExErrorKind::Interrupted => "ERR_INTERRUPTED",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// Whether this kind originates at the SQL boundary
    pub fn is_data_access(&self) -> bool {
        matches!(self, ExErrorKind::DataAccess | ExErrorKind::RollbackFailed)
    }
}

/// Canonical structured error type
///
/// Carries a classification plus whatever context was known at the point of
/// failure: the operation, the table, the entity id and, for statement
/// failures, the SQL text.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    table: Option<String>,
    entity_id: Option<String>,
    sql: Option<String>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            table: None,
            entity_id: None,
            sql: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add table context
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Add entity ID context
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Attach the statement that failed
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
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

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    /// The SQL text that failed, when the error came from a statement
    pub fn sql(&self) -> Option<&str> {
        self.sql.as_deref()
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
        if let Some(table) = &self.table {
            write!(f, " (table: {})", table)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (entity_id: {})", entity_id)?;
        }
        if let Some(sql) = &self.sql {
            write!(f, " [sql: {}]", sql)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Validation failures raised by the domain models themselves
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// A stored enum name did not match any variant
    #[error("Unknown {type_name} variant: {value}")]
    UnknownVariant {
        type_name: &'static str,
        value: String,
    },

    /// A required text field was empty or whitespace-only
    #[error("Field {field} cannot be empty")]
    EmptyField { field: &'static str },

    /// Email address is not shaped like local@domain
    #[error("Invalid email address: {email}")]
    InvalidEmail { email: String },

    /// A numeric field was outside its allowed range
    #[error("Field {field} out of range: {value}")]
    OutOfRange { field: &'static str, value: i64 },
}

impl From<ModelError> for ExError {
    fn from(err: ModelError) -> Self {
        let message = err.to_string();
        match err {
            ModelError::UnknownVariant { .. } => ExError::new(ExErrorKind::Mapping)
                .with_op("parse_enum")
                .with_message(message),
            ModelError::EmptyField { .. }
            | ModelError::InvalidEmail { .. }
            | ModelError::OutOfRange { .. } => ExError::new(ExErrorKind::InvalidInput)
                .with_op("validate")
                .with_message(message),
        }
    }
}
