//! Error handling for diplomacy-rs
//!
//! Graph construction and resolution report [`GraphError`]; `freeze` reports
//! [`ValidationErrors`]. This module wraps both, plus configuration and I/O
//! failures, in a single [`DiplomacyError`] for callers that want one type.

use crate::graph::{GraphError, ValidationErrors};
use thiserror::Error;

/// Main error type for diplomacy-rs operations
#[derive(Error, Debug)]
pub enum DiplomacyError {
    /// Bind-time or resolve-time graph errors
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Every violation found while freezing a graph
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<DiplomacyError>,
    },
}

impl DiplomacyError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        DiplomacyError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with every layer of context removed.
    pub fn root(&self) -> &DiplomacyError {
        match self {
            DiplomacyError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type alias for diplomacy-rs operations
pub type Result<T> = std::result::Result<T, DiplomacyError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<DiplomacyError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }
}
