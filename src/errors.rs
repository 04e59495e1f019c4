//! Error handling for the JIT crash categorizer.
//!
//! Only failures to load the inputs are errors here. Anything the analysis
//! itself can conclude, including "nothing looks wrong", is a category and is
//! reported through [`crate::models::Categorization`] instead.

use thiserror::Error;
use std::fmt;

/// Main error type for the categorizer.
#[derive(Error, Debug)]
pub enum CategorizerError {
    /// The snapshot is truncated or structurally invalid.
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// A stream the analysis cannot do without is absent from the snapshot.
    #[error("Snapshot has no {0} stream")]
    MissingStream(&'static str),

    /// The exception thread context could not be interpreted.
    #[error("Unsupported thread context: {0}")]
    UnsupportedContext(String),

    /// The tuning profile could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to file I/O, such as file not found or permission denied.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the categorizer.
pub type CategorizerResult<T> = Result<T, CategorizerError>;

/// Where an error happened.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// File being processed, if applicable.
    pub path: Option<String>,

    /// Component where the error occurred (e.g., "snapshot").
    pub component: String,

    /// Operation being performed when the error occurred (e.g., "read_directory").
    pub operation: String,
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "In {} while {}", self.component, self.operation)?;
        if let Some(path) = &self.path {
            write!(f, " for {}", path)?;
        }
        Ok(())
    }
}

/// Extension trait for attaching an [`ErrorContext`] to fallible results.
pub trait ErrorExt<T> {
    /// Add context to an error, keeping categorizer errors as they are and
    /// mapping foreign errors into the variant named by `component`.
    fn with_context(self, context: ErrorContext) -> CategorizerResult<T>;

    /// Add component/operation context without a path.
    fn with_simple_context(self, component: &str, operation: &str) -> CategorizerResult<T>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ErrorExt<T> for Result<T, E> {
    fn with_context(self, context: ErrorContext) -> CategorizerResult<T> {
        self.map_err(|e| {
            let error_msg = format!("{}: {}", context, e);
            let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(e);
            match boxed.downcast::<std::io::Error>() {
                Ok(io) => CategorizerError::Io(std::io::Error::new(io.kind(), error_msg)),
                Err(_) => match context.component.as_str() {
                    "config" => CategorizerError::Config(error_msg),
                    _ => CategorizerError::Snapshot(error_msg),
                },
            }
        })
    }

    fn with_simple_context(self, component: &str, operation: &str) -> CategorizerResult<T> {
        self.with_context(ErrorContext {
            path: None,
            component: component.to_string(),
            operation: operation.to_string(),
        })
    }
}
