//! Error types for dotload operations
//!
//! This module provides the error taxonomy for resolution and loading:
//! - Structured error types with descriptive messages
//! - Stable error codes for programmatic handling
//! - Error categories for grouping and filtering
//! - JSON serialization for reporting
//!
//! `NotMine` is deliberately absent: a resolver declining a name is not a
//! failure, it is [`Resolution::NotMine`](crate::resolver::Resolution::NotMine)
//! and the chain simply moves on.
//!
//! # Example
//!
//! ```rust
//! use dotload_core::error::{DotloadError, ErrorCategory};
//!
//! fn report(err: &DotloadError) {
//!     match err.category() {
//!         ErrorCategory::Authorization => println!("policy denied: {}", err),
//!         ErrorCategory::NotFound => println!("missing: {}", err),
//!         _ => println!("load failed: {}", err),
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for dotload operations
pub type Result<T> = std::result::Result<T, DotloadError>;

/// Error category for grouping related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Unit or resource not found
    NotFound,
    /// Input validation failed (names, manifests)
    Validation,
    /// Restriction policy denied the load
    Authorization,
    /// Registration conflict
    Conflict,
    /// Unit content could not be compiled or executed
    Content,
    /// Resolution graph integrity (cycles)
    Integrity,
    /// Internal error
    Internal,
    /// I/O or serialization failure
    External,
}

/// Errors that can occur while resolving and loading code units
#[derive(Error, Debug)]
pub enum DotloadError {
    // ═══════════════════════════════════════════════════════════════════════
    // Resolution errors
    // ═══════════════════════════════════════════════════════════════════════

    /// No resolver in the chain claimed the name
    #[error("No resolver handles '{name}'. Register a resolver that knows this unit.")]
    Unresolved { name: String },

    /// A dotted prefix of the requested name is a leaf, which cannot hold units
    #[error("Cannot resolve '{name}': '{parent}' is a leaf unit, not a container.")]
    NotAContainer { name: String, parent: String },

    /// The unit is already being loaded further up the same resolution chain
    #[error("Cyclic resolution of '{name}': the unit is still being initialized.")]
    CyclicResolution { name: String },

    // ═══════════════════════════════════════════════════════════════════════
    // Loading errors
    // ═══════════════════════════════════════════════════════════════════════

    /// The name is known but its backing resource is absent
    #[error("Resource for '{name}' not found at '{path}'.")]
    ResourceNotFound { name: String, path: String },

    /// The resource exists but could not be read
    #[error("Failed to read resource for '{name}' at '{path}': {reason}")]
    ResourceUnreadable {
        name: String,
        path: String,
        reason: String,
    },

    /// The restriction policy denied the load
    #[error("Access denied to '{name}' (requested by {}; restricted by rule '{rule}').", originator_label(.originator))]
    AccessDenied {
        name: String,
        originator: Option<String>,
        rule: String,
    },

    /// The fetched content could not be turned into an executable body
    #[error("Failed to compile '{name}' at line {line}: {detail}")]
    CompileFailure {
        name: String,
        line: usize,
        detail: String,
    },

    /// The unit's top-level code failed while executing
    #[error("Execution of '{name}' failed: {detail}")]
    ExecutionFailure { name: String, detail: String },

    /// A loaded unit does not expose the requested attribute
    #[error("Unit '{unit}' has no attribute '{attribute}'.")]
    AttributeNotFound { unit: String, attribute: String },

    // ═══════════════════════════════════════════════════════════════════════
    // Validation errors
    // ═══════════════════════════════════════════════════════════════════════

    /// The string is not a valid dotted unit name
    #[error("Invalid unit name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Registry declarations are inconsistent
    #[error("Invalid registry: {reason}")]
    InvalidRegistry { reason: String },

    /// Failed to read or parse a configuration file
    #[error("Failed to load configuration from '{path}': {reason}")]
    ConfigLoadError { path: String, reason: String },

    // ═══════════════════════════════════════════════════════════════════════
    // Chain management errors
    // ═══════════════════════════════════════════════════════════════════════

    /// A resolver with this id is already part of the chain
    #[error("Resolver already registered: '{resolver_id}'. Unregister it first.")]
    ResolverAlreadyRegistered { resolver_id: String },

    /// No resolver with this id is part of the chain
    #[error("Resolver not found: '{resolver_id}'.")]
    ResolverNotFound { resolver_id: String },

    /// A unit's resolution override outlived the import system that created it
    #[error("The import system backing this unit has been dropped.")]
    SystemUnavailable,

    // ═══════════════════════════════════════════════════════════════════════
    // Infrastructure errors (serialization, I/O)
    // ═══════════════════════════════════════════════════════════════════════

    /// JSON serialization or deserialization failed
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// I/O operation failed
    #[error("IO error: {message}")]
    IoError { message: String },

    /// Internal error that shouldn't happen
    #[error("Internal error: {reason}. This is a bug; please report it.")]
    InternalError { reason: String },
}

fn originator_label(originator: &Option<String>) -> String {
    match originator {
        Some(name) => format!("'{}'", name),
        None => "top level".to_string(),
    }
}

impl DotloadError {
    /// Returns true if this error might succeed on retry
    ///
    /// Load failures are never transient: a missing resource, a policy
    /// denial or bad content stay that way until configuration changes.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DotloadError::IoError { .. } | DotloadError::ResourceUnreadable { .. }
        )
    }

    /// Returns true if the restriction policy denied the load
    pub fn is_policy_denial(&self) -> bool {
        matches!(self, DotloadError::AccessDenied { .. })
    }

    /// The dotted name the failure is about, when there is one
    pub fn unit_name(&self) -> Option<&str> {
        match self {
            DotloadError::Unresolved { name }
            | DotloadError::NotAContainer { name, .. }
            | DotloadError::CyclicResolution { name }
            | DotloadError::ResourceNotFound { name, .. }
            | DotloadError::ResourceUnreadable { name, .. }
            | DotloadError::AccessDenied { name, .. }
            | DotloadError::CompileFailure { name, .. }
            | DotloadError::ExecutionFailure { name, .. }
            | DotloadError::InvalidName { name, .. } => Some(name),
            DotloadError::AttributeNotFound { unit, .. } => Some(unit),
            _ => None,
        }
    }

    /// Returns the error category for grouping
    pub fn category(&self) -> ErrorCategory {
        match self {
            // Not found
            DotloadError::Unresolved { .. }
            | DotloadError::ResourceNotFound { .. }
            | DotloadError::AttributeNotFound { .. }
            | DotloadError::ResolverNotFound { .. } => ErrorCategory::NotFound,

            // Validation
            DotloadError::InvalidName { .. }
            | DotloadError::InvalidRegistry { .. }
            | DotloadError::NotAContainer { .. } => ErrorCategory::Validation,

            // Authorization
            DotloadError::AccessDenied { .. } => ErrorCategory::Authorization,

            // Conflict
            DotloadError::ResolverAlreadyRegistered { .. } => ErrorCategory::Conflict,

            // Content
            DotloadError::CompileFailure { .. }
            | DotloadError::ExecutionFailure { .. } => ErrorCategory::Content,

            // Integrity
            DotloadError::CyclicResolution { .. } => ErrorCategory::Integrity,

            // Internal
            DotloadError::SystemUnavailable
            | DotloadError::InternalError { .. } => ErrorCategory::Internal,

            // External
            DotloadError::ConfigLoadError { .. }
            | DotloadError::ResourceUnreadable { .. }
            | DotloadError::JsonError(_)
            | DotloadError::IoError { .. } => ErrorCategory::External,
        }
    }

    /// Returns the stable error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            DotloadError::Unresolved { .. } => "UNRESOLVED",
            DotloadError::NotAContainer { .. } => "NOT_A_CONTAINER",
            DotloadError::CyclicResolution { .. } => "CYCLIC_RESOLUTION",
            DotloadError::ResourceNotFound { .. } => "RESOURCE_NOT_FOUND",
            DotloadError::ResourceUnreadable { .. } => "RESOURCE_UNREADABLE",
            DotloadError::AccessDenied { .. } => "ACCESS_DENIED",
            DotloadError::CompileFailure { .. } => "COMPILE_FAILURE",
            DotloadError::ExecutionFailure { .. } => "EXECUTION_FAILURE",
            DotloadError::AttributeNotFound { .. } => "ATTRIBUTE_NOT_FOUND",
            DotloadError::InvalidName { .. } => "INVALID_NAME",
            DotloadError::InvalidRegistry { .. } => "INVALID_REGISTRY",
            DotloadError::ConfigLoadError { .. } => "CONFIG_LOAD_ERROR",
            DotloadError::ResolverAlreadyRegistered { .. } => "RESOLVER_ALREADY_REGISTERED",
            DotloadError::ResolverNotFound { .. } => "RESOLVER_NOT_FOUND",
            DotloadError::SystemUnavailable => "SYSTEM_UNAVAILABLE",
            DotloadError::JsonError(_) => "JSON_ERROR",
            DotloadError::IoError { .. } => "IO_ERROR",
            DotloadError::InternalError { .. } => "INTERNAL_ERROR",
        }
    }

    /// Converts this error to a JSON-serializable response object
    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
                category: self.category(),
                recoverable: self.is_recoverable(),
            },
        }
    }
}

/// JSON-serializable error report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorDetail,
}

/// Error detail for JSON reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Stable error code (e.g., "ACCESS_DENIED")
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Error category
    pub category: ErrorCategory,
    /// Whether retry might succeed
    pub recoverable: bool,
}
