//! Unified error handling system
//!
//! Provides structured error types with context, recovery suggestions, and a coarse
//! [`ErrorKind`] classification for presentation layers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, warn};

pub type CodedocResult<T> = Result<T, CodedocError>;

/// Error context providing additional information for debugging and recovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where error originated
    pub component: String,
    /// Operation being performed when error occurred
    pub operation: Option<String>,
    /// Additional metadata
    pub metadata: std::collections::HashMap<String, String>,
    /// Recovery suggestions
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            metadata: std::collections::HashMap::new(),
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// Coarse failure classification consumed by the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad identifier, missing local path, unknown revision, invalid config
    Input,
    /// Remote unreachable, authentication failure, transfer aborted
    Network,
    /// A cache entry was found corrupted
    CorruptionRecovered,
    /// Anything else
    Unknown,
}

/// Main error type for the CodeDoc system
#[derive(Error, Debug)]
pub enum CodedocError {
    #[error("Invalid input: {message}")]
    Input {
        message: String,
        field: Option<String>,
        context: ErrorContext,
    },

    #[error("Resource not found: {resource}")]
    NotFound {
        resource: String,
        context: ErrorContext,
    },

    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Git error: {message}")]
    Git {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Corrupted working copy at {}: {reason}", path.display())]
    Corrupted {
        path: PathBuf,
        reason: String,
        context: ErrorContext,
    },

    #[error("Lock error: {message}")]
    Lock {
        message: String,
        waited_ms: u64,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },
}

impl CodedocError {
    /// Get the error context
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            CodedocError::Input { context, .. } => Some(context),
            CodedocError::NotFound { context, .. } => Some(context),
            CodedocError::Network { context, .. } => Some(context),
            CodedocError::Git { context, .. } => Some(context),
            CodedocError::Corrupted { context, .. } => Some(context),
            CodedocError::Lock { context, .. } => Some(context),
            CodedocError::Config { context, .. } => Some(context),
            CodedocError::Internal { context, .. } => Some(context),
            CodedocError::Io(_) => None,
        }
    }

    /// Classify the error for callers that only need to pick a message
    pub fn kind(&self) -> ErrorKind {
        match self {
            CodedocError::Input { .. }
            | CodedocError::NotFound { .. }
            | CodedocError::Config { .. } => ErrorKind::Input,
            CodedocError::Network { .. } => ErrorKind::Network,
            CodedocError::Corrupted { .. } => ErrorKind::CorruptionRecovered,
            _ => ErrorKind::Unknown,
        }
    }

    /// Check if retrying the same call may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            CodedocError::Network { .. } => true,
            CodedocError::Lock { .. } => true,
            CodedocError::Corrupted { .. } => true,
            CodedocError::Input { .. } => false,
            CodedocError::Config { .. } => false,
            CodedocError::NotFound { .. } => false,
            _ => false,
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            CodedocError::Internal { .. } => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Internal error occurred"
                );
            }
            CodedocError::Config { .. } | CodedocError::Input { .. } => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Configuration or input error"
                );
            }
            CodedocError::Network { .. } | CodedocError::Lock { .. } => {
                warn!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Network or lock error (may be recoverable)"
                );
            }
            _ => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Error occurred"
                );
            }
        }
    }
}

/// Convenience macros for creating errors with context
#[macro_export]
macro_rules! input_error {
    ($msg:expr, $component:expr) => {
        $crate::CodedocError::Input {
            message: $msg.to_string(),
            field: None,
            context: $crate::ErrorContext::new($component),
        }
    };
    ($msg:expr, $field:expr, $component:expr) => {
        $crate::CodedocError::Input {
            message: $msg.to_string(),
            field: Some($field.to_string()),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check the value and format"),
        }
    };
}

#[macro_export]
macro_rules! git_error {
    ($msg:expr, $component:expr) => {
        $crate::CodedocError::Git {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component),
        }
    };
    ($msg:expr, $component:expr, $source:expr) => {
        $crate::CodedocError::Git {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new($component),
        }
    };
    ($msg:expr, $component:expr, $operation:expr, $source:expr) => {
        $crate::CodedocError::Git {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new($component).with_operation($operation),
        }
    };
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr, $component:expr) => {
        $crate::CodedocError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check your configuration file")
                .with_suggestion("Run 'codedoc config --init' to create default config"),
        }
    };
    ($msg:expr, $component:expr, $operation:expr, $suggestion:expr) => {
        $crate::CodedocError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_operation($operation)
                .with_suggestion($suggestion),
        }
    };
    ($msg:expr, $component:expr, $operation:expr, $suggestion:expr, $source:expr) => {
        $crate::CodedocError::Config {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new($component)
                .with_operation($operation)
                .with_suggestion($suggestion),
        }
    };
}

#[macro_export]
macro_rules! not_found_error {
    ($resource:expr, $component:expr) => {
        $crate::CodedocError::NotFound {
            resource: $resource.to_string(),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Verify the path or URL")
                .with_suggestion("Check if the resource exists and is accessible"),
        }
    };
}
