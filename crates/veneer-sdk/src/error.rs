//! Error types for intercepted calls

/// Result of invoking a method on a proxy, a handler, or an original body
pub type InvokeResult = Result<crate::Value, InvokeError>;

/// Dispatch-time failures
///
/// Handlers signal failure by returning one of these; the dispatcher passes
/// handler errors back to the caller unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvokeError {
    /// Method invoked in delegating state with no handler and no fallback
    #[error("No binding configured for {type_name}::{method}")]
    NoBindingConfigured {
        /// Target type name
        type_name: String,
        /// Method signature
        method: String,
    },

    /// No method with this name exists on the proxy's type
    #[error("Method '{method}' not found on {type_name}")]
    MethodNotFound {
        /// Target type name
        type_name: String,
        /// Requested method name
        method: String,
    },

    /// Method exists but not with this many arguments
    #[error("Method '{method}' expects {expected} argument(s), got {got}")]
    ArityMismatch {
        /// Method name
        method: String,
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        got: usize,
    },

    /// Method name is overloaded and the call does not say which overload
    #[error("Method '{method}' has {overloads} overloads; select one by arity")]
    AmbiguousMethod {
        /// Method name
        method: String,
        /// Number of overloads
        overloads: usize,
    },

    /// Method exists but is final, static or private and cannot be rebound
    #[error("Method {method} cannot be intercepted")]
    NotInterceptable {
        /// Method signature
        method: String,
    },

    /// Pass-through requested but there is no original implementation
    #[error("No original implementation for {method}")]
    NoOriginal {
        /// Method signature
        method: String,
    },

    /// A method selection token was used after a newer selection on the same proxy
    #[error("Stale method selection for {method}: another selection was made on this proxy")]
    StaleSelection {
        /// Selected method signature
        method: String,
    },

    /// A void-only behaviour was bound to a method that returns a value
    #[error("Only void methods can do nothing, {method} returns {returns}")]
    NotVoid {
        /// Method signature
        method: String,
        /// Declared return category
        returns: String,
    },

    /// Normal construction of an instance failed
    #[error("Construction error: {0}")]
    Construction(String),

    /// Error raised by user code (handler or method body)
    #[error("{0}")]
    Raised(String),
}

impl InvokeError {
    /// Raise a user error
    pub fn raised(message: impl Into<String>) -> Self {
        InvokeError::Raised(message.into())
    }
}

impl From<String> for InvokeError {
    fn from(s: String) -> Self {
        InvokeError::Raised(s)
    }
}

impl From<&str> for InvokeError {
    fn from(s: &str) -> Self {
        InvokeError::Raised(s.to_string())
    }
}
