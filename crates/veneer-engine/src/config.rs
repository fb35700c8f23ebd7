//! Factory configuration (veneer.toml)
//!
//! ```toml
//! namespace = "plugins"
//! fallback = "zero-value"
//! record_invocations = false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cache::Namespace;
use crate::error::{ProxyError, ProxyResult};
use crate::factory::ProxyOptions;

/// What a delegating proxy does with a call nothing is bound to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Fallback {
    /// Forward to the original implementation when there is one
    #[default]
    Original,
    /// Return the zero value of the method's return category
    ZeroValue,
    /// Fail with `NoBindingConfigured`
    Reject,
}

/// Default proxy settings for a factory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Namespace generated types are cached in
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Delegating-state fallback
    #[serde(default)]
    pub fallback: Fallback,

    /// Record calls made in delegating mode for later inspection
    #[serde(default = "default_true")]
    pub record_invocations: bool,

    /// Allow pass-through to original implementations
    #[serde(default = "default_true")]
    pub forward_to_original: bool,
}

fn default_namespace() -> String {
    Namespace::DEFAULT_NAME.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            fallback: Fallback::default(),
            record_invocations: true,
            forward_to_original: true,
        }
    }
}

impl ProxyConfig {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> ProxyResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> ProxyResult<Self> {
        let config: ProxyConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ProxyResult<()> {
        if self.namespace.trim().is_empty() {
            return Err(ProxyError::InvalidConfig("namespace cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Namespace handle for the configured name
    pub fn namespace_handle(&self) -> Namespace {
        Namespace::named(&self.namespace)
    }

    /// Proxy options carried by this configuration
    pub fn options(&self) -> ProxyOptions {
        ProxyOptions {
            fallback: self.fallback,
            forward_to_original: self.forward_to_original,
            record_invocations: self.record_invocations,
        }
    }
}
