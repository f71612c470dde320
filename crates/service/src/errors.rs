use thiserror::Error;

/// Fixed message for identifiers that cannot be parsed as integers.
pub const TYPE_MISMATCH: &str = "Type mismatch.";

/// The closed set of failures every backend call and composite operation
/// is reduced to.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unavailable(String),
    /// `message` is either the backend's own envelope message or synthesized;
    /// the raw body never ends up here.
    #[error("unexpected backend error (HTTP {status}): {message}")]
    UnexpectedBackend { status: u16, message: String },
}

/// Label form of a `ServiceError`, used for metrics and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Unavailable,
    UnexpectedBackend,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::UnexpectedBackend => "unexpected_backend",
        }
    }
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::InvalidInput(_) => ErrorKind::InvalidInput,
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::Unavailable(_) => ErrorKind::Unavailable,
            ServiceError::UnexpectedBackend { .. } => ErrorKind::UnexpectedBackend,
        }
    }

    pub fn invalid_product_id(product_id: i32) -> Self {
        Self::InvalidInput(format!("Invalid productId: {product_id}"))
    }

    pub fn type_mismatch() -> Self {
        Self::InvalidInput(TYPE_MISMATCH.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound(_))
    }

    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, ServiceError::InvalidInput(m) if m == TYPE_MISMATCH)
    }
}

/// Reject non-positive ids before any network call is made.
pub fn ensure_valid_product_id(product_id: i32) -> Result<(), ServiceError> {
    if product_id < 1 {
        return Err(ServiceError::invalid_product_id(product_id));
    }
    Ok(())
}
