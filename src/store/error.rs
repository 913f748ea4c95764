//! Error types for collection store operations.
//!
//! Every error carries an [`ErrorContext`] describing the operation,
//! collection and record involved.

use std::fmt;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Structured context for store errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// The operation being performed (e.g. "update", "list").
    pub operation: Option<String>,
    /// The collection involved (e.g. "lessons").
    pub collection: Option<String>,
    /// The record id if applicable.
    pub record_id: Option<String>,
    /// Additional details.
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new context with an operation name.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: Some(operation.into()),
            ..Default::default()
        }
    }

    /// Set the collection.
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Set the record id.
    pub fn with_record_id(mut self, id: impl ToString) -> Self {
        self.record_id = Some(id.to_string());
        self
    }

    /// Set additional details.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref op) = self.operation {
            parts.push(format!("operation={}", op));
        }
        if let Some(ref collection) = self.collection {
            parts.push(format!("collection={}", collection));
        }
        if let Some(ref id) = self.record_id {
            parts.push(format!("id={}", id));
        }
        if let Some(ref details) = self.details {
            parts.push(format!("details={}", details));
        }
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Error type for store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Requested record does not exist.
    #[error("Not found: {message} {context}")]
    NotFound {
        message: String,
        context: ErrorContext,
    },

    /// The request was aborted, typically superseded by a newer request
    /// for the same record.
    #[error("Cancelled: {message} {context}")]
    Cancelled {
        message: String,
        context: ErrorContext,
    },

    /// The filter expression references unknown fields or is malformed.
    #[error("Invalid filter: {message} {context}")]
    InvalidFilter {
        message: String,
        context: ErrorContext,
    },

    /// Network or transport failure talking to the store.
    #[error("Transport error: {message} {context}")]
    Transport {
        message: String,
        context: ErrorContext,
    },

    /// The store rejected the write (e.g. duplicate id).
    #[error("Conflict: {message} {context}")]
    Conflict {
        message: String,
        context: ErrorContext,
    },

    /// Internal/unexpected errors.
    #[error("Internal error: {message} {context}")]
    Internal {
        message: String,
        context: ErrorContext,
    },
}

impl StoreError {
    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::NotFound {
            message: message.into(),
            context,
        }
    }

    /// Create a cancellation error.
    pub fn cancelled(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Cancelled {
            message: message.into(),
            context,
        }
    }

    /// Create an invalid-filter error.
    pub fn invalid_filter(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::InvalidFilter {
            message: message.into(),
            context,
        }
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Transport {
            message: message.into(),
            context,
        }
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Conflict {
            message: message.into(),
            context,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Whether this is the distinguished "operation was cancelled" outcome.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Whether re-issuing the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Cancelled { .. } | Self::Transport { .. })
    }

    /// Get the error context.
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::NotFound { context, .. }
            | Self::Cancelled { context, .. }
            | Self::InvalidFilter { context, .. }
            | Self::Transport { context, .. }
            | Self::Conflict { context, .. }
            | Self::Internal { context, .. } => context,
        }
    }
}
