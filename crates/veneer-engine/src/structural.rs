//! Structural proxies
//!
//! Structural targets only declare method signatures, so there is nothing to
//! extend and nothing to fall back to: the proxy's method table routes every
//! method to the dispatcher. No type is synthesized and nothing is cached.

use std::fmt;
use std::sync::Arc;

use crate::error::{ProxyError, ProxyResult};
use crate::model::ClassDescriptor;
use crate::synth::{check_extras, MethodTable};

/// Method layout of a structural proxy
pub struct StructuralType {
    target: Arc<ClassDescriptor>,
    extras: Vec<Arc<ClassDescriptor>>,
    table: MethodTable,
}

impl StructuralType {
    /// Implemented structural type
    pub fn target(&self) -> &Arc<ClassDescriptor> {
        &self.target
    }

    /// Extra structural types
    pub fn extras(&self) -> &[Arc<ClassDescriptor>] {
        &self.extras
    }

    /// Method table (every entry intercepted)
    pub fn table(&self) -> &MethodTable {
        &self.table
    }

    /// Whether instances are usable as `class`
    pub fn is_subtype_of(&self, class: &ClassDescriptor) -> bool {
        self.target.is_subtype_of(class) || self.extras.iter().any(|e| e.is_subtype_of(class))
    }
}

impl fmt::Debug for StructuralType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructuralType")
            .field("target", &self.target.name())
            .field("methods", &self.table.len())
            .finish()
    }
}

/// Builds [`StructuralType`]s
pub struct StructuralProxyBuilder;

impl StructuralProxyBuilder {
    /// Lay out a proxy for structural `target` plus `extras`
    pub fn build(target: &Arc<ClassDescriptor>, extras: &[Arc<ClassDescriptor>]) -> ProxyResult<StructuralType> {
        if !target.is_structural() {
            return Err(ProxyError::UnsupportedTarget {
                type_name: target.name().to_string(),
                reason: "not a structural type".to_string(),
            });
        }
        check_extras(extras)?;

        let mut methods = target.hierarchy_methods();
        for extra in extras {
            methods.extend(extra.hierarchy_methods());
        }

        Ok(StructuralType {
            target: target.clone(),
            extras: extras.to_vec(),
            table: MethodTable::from_methods(methods, true),
        })
    }
}
