//! Unified error types for the pipeline.
//!
//! Error codes:
//! - VALID_001-002: Payload errors
//! - TENANT_001-002: Tenant resolution errors
//! - QUEUE_001: Durable queue errors
//! - STORE_001-002: Storage errors

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Validation error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorCode {
    /// VALID_001: Body is not JSON or not a supported payload shape
    InvalidFormat,
    /// VALID_002: Body exceeds the payload size limit
    PayloadTooLarge,
}

impl ValidationErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidFormat => "VALID_001",
            Self::PayloadTooLarge => "VALID_002",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidFormat => 400,
            Self::PayloadTooLarge => 413,
        }
    }
}

/// Tenant resolution error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantErrorCode {
    /// TENANT_001: Tracking id is required
    MissingId,
    /// TENANT_002: Tenant is unknown or inactive
    NotFound,
}

impl TenantErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingId => "TENANT_001",
            Self::NotFound => "TENANT_002",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::MissingId => 400,
            Self::NotFound => 404,
        }
    }
}

/// Storage error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorCode {
    /// STORE_001: Raw event write failed
    EventWrite,
    /// STORE_002: Session upsert failed
    SessionWrite,
}

impl StoreErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EventWrite => "STORE_001",
            Self::SessionWrite => "STORE_002",
        }
    }
}

/// Unified error type for the pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Validation error with code.
    #[error("[{code}] {message}")]
    ValidationWithCode {
        code: &'static str,
        message: String,
        http_status: u16,
    },

    /// Tenant error with code.
    #[error("[{code}] {message}")]
    Tenant {
        code: &'static str,
        message: String,
        http_status: u16,
    },

    /// Durable queue unavailable or rejected the job.
    #[error("[QUEUE_001] {0}")]
    Queue(String),

    /// Storage error with code.
    #[error("[{code}] {message}")]
    Storage { code: &'static str, message: String },

    /// External lookup failed (directory, geolocation).
    #[error("lookup failed: {0}")]
    Lookup(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a validation error with a specific code.
    pub fn validation_code(code: ValidationErrorCode, msg: impl Into<String>) -> Self {
        Self::ValidationWithCode {
            code: code.code(),
            message: msg.into(),
            http_status: code.http_status(),
        }
    }

    /// Create a tenant error with a specific code.
    pub fn tenant(code: TenantErrorCode, msg: impl Into<String>) -> Self {
        Self::Tenant {
            code: code.code(),
            message: msg.into(),
            http_status: code.http_status(),
        }
    }

    /// Create a storage error with a specific code.
    pub fn storage(code: StoreErrorCode, msg: impl Into<String>) -> Self {
        Self::Storage {
            code: code.code(),
            message: msg.into(),
        }
    }

    pub fn queue(msg: impl Into<String>) -> Self {
        Self::Queue(msg.into())
    }

    pub fn lookup(msg: impl Into<String>) -> Self {
        Self::Lookup(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ValidationWithCode { http_status, .. } => *http_status,
            Self::Tenant { http_status, .. } => *http_status,
            Self::Queue(_) => 503,
            Self::Storage { .. } => 500,
            Self::Lookup(_) => 502,
            Self::Validation(_) => 400,
            Self::Serialization(_) => 400,
            Self::Internal(_) => 500,
        }
    }

    /// Get the error code if this is a coded error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::ValidationWithCode { code, .. } => Some(code),
            Self::Tenant { code, .. } => Some(code),
            Self::Storage { code, .. } => Some(code),
            Self::Queue(_) => Some("QUEUE_001"),
            _ => None,
        }
    }

    /// Whether retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Queue(_) | Self::Storage { .. } | Self::Lookup(_))
    }
}
