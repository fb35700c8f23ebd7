//! Construction- and configuration-time errors

use thiserror::Error;

/// Errors raised while building types, registering pointcuts or creating proxies.
///
/// Dispatch-time failures are [`veneer_sdk::InvokeError`]s instead.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Type cannot be intercepted (sealed concrete type with no structural form)
    #[error("Unsupported proxy target {type_name}: {reason}")]
    UnsupportedTarget {
        /// Target type name
        type_name: String,
        /// Why the target was rejected
        reason: String,
    },

    /// Raw allocation of a proxy instance failed
    #[error("Proxy construction failed for {type_name}: {reason}")]
    ConstructionFailed {
        /// Generated type name
        type_name: String,
        /// Allocator message
        reason: String,
    },

    /// Predicate combined with marker/return filters on one pointcut
    #[error("Ambiguous filter spec for pointcut '{pointcut}': a predicate cannot be combined with marker or return-type filters")]
    AmbiguousFilterSpec {
        /// Pointcut name
        pointcut: String,
    },

    /// Pointcut name already registered
    #[error("Pointcut '{0}' already exists")]
    DuplicatePointcut(String),

    /// Existing instance passed to a request is not an instance of the target type
    #[error("{instance_type} is not an instance of {target}")]
    InstanceMismatch {
        /// Proxy target type name
        target: String,
        /// Actual type of the instance
        instance_type: String,
    },

    /// Type definition rejected by the builder
    #[error("Invalid type {type_name}: {reason}")]
    InvalidType {
        /// Type being built
        type_name: String,
        /// Validation message
        reason: String,
    },

    /// Failed to read a configuration file
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration parsed but holds an invalid value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ProxyError {
    pub(crate) fn invalid_type(type_name: &str, reason: impl Into<String>) -> Self {
        ProxyError::InvalidType {
            type_name: type_name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result alias for engine operations
pub type ProxyResult<T> = Result<T, ProxyError>;
