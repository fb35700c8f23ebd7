//! Pointcut registry
//!
//! A pointcut is a named (target type, filter, handler) binding. Pointcuts are
//! registered up front through [`PointcutRegistry::bind`] and are immutable
//! afterwards; the factory shares the finished registry with every proxy it
//! creates. When several pointcuts select the same method, the one registered
//! last wins.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashSet;
use veneer_sdk::{HandlerRef, Marker, MethodDescriptor, ValueCategory};

use crate::error::{ProxyError, ProxyResult};
use crate::filter::{self, FilterSpec};
use crate::model::ClassDescriptor;

/// A registered pointcut
#[derive(Clone)]
pub struct Pointcut {
    name: Arc<str>,
    target: Option<Arc<ClassDescriptor>>,
    filter: FilterSpec,
    handler: HandlerRef,
}

impl Pointcut {
    /// Unique pointcut name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target type restriction, if any
    pub fn target(&self) -> Option<&Arc<ClassDescriptor>> {
        self.target.as_ref()
    }

    /// Method filter
    pub fn filter(&self) -> &FilterSpec {
        &self.filter
    }

    /// Handler run for selected methods
    pub fn handler(&self) -> &HandlerRef {
        &self.handler
    }

    /// Whether this pointcut selects `method` on a proxy of `class`
    pub fn applies_to(&self, class: &ClassDescriptor, method: &MethodDescriptor) -> bool {
        let type_ok = self
            .target
            .as_ref()
            .map_or(true, |target| class.is_subtype_of(target));
        type_ok && filter::matches(method, &self.filter)
    }
}

impl fmt::Debug for Pointcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pointcut")
            .field("name", &self.name)
            .field("target", &self.target.as_ref().map(|t| t.name()))
            .field("filter", &self.filter)
            .finish()
    }
}

/// Ordered set of pointcuts
#[derive(Debug, Default)]
pub struct PointcutRegistry {
    /// Pointcuts in registration order
    pointcuts: Vec<Pointcut>,
    names: FxHashSet<Arc<str>>,
}

impl PointcutRegistry {
    /// Create new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Start binding a new pointcut
    pub fn bind(&mut self, name: &str) -> FilterBuilder<'_> {
        FilterBuilder {
            registry: self,
            name: name.to_string(),
            target: None,
            spec: FilterSpec::any(),
        }
    }

    /// Get a pointcut by name
    pub fn get(&self, name: &str) -> Option<&Pointcut> {
        self.pointcuts.iter().find(|p| p.name() == name)
    }

    /// Last-registered pointcut selecting `method` on a proxy of `class`
    pub fn resolve(&self, class: &ClassDescriptor, method: &MethodDescriptor) -> Option<&Pointcut> {
        self.pointcuts
            .iter()
            .rev()
            .find(|p| p.applies_to(class, method))
    }

    /// Whether any pointcut selects `method` on a proxy of `class`
    pub fn selects(&self, class: &ClassDescriptor, method: &MethodDescriptor) -> bool {
        self.resolve(class, method).is_some()
    }

    /// Iterate pointcuts in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Pointcut> {
        self.pointcuts.iter()
    }

    /// Get number of pointcuts
    pub fn len(&self) -> usize {
        self.pointcuts.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.pointcuts.is_empty()
    }

    fn register(&mut self, pointcut: Pointcut) -> ProxyResult<()> {
        if !self.names.insert(pointcut.name.clone()) {
            return Err(ProxyError::DuplicatePointcut(pointcut.name.to_string()));
        }
        tracing::debug!(pointcut = %pointcut.name, filter = ?pointcut.filter, "pointcut registered");
        self.pointcuts.push(pointcut);
        Ok(())
    }
}

/// Builder returned by [`PointcutRegistry::bind`].
///
/// Marker and return-category filters may be combined; a predicate may not be
/// combined with either, and trying to do so fails immediately with
/// [`ProxyError::AmbiguousFilterSpec`].
pub struct FilterBuilder<'a> {
    registry: &'a mut PointcutRegistry,
    name: String,
    target: Option<Arc<ClassDescriptor>>,
    spec: FilterSpec,
}

impl<'a> FilterBuilder<'a> {
    /// Restrict to proxies of `class` (or its subtypes)
    pub fn on_type(mut self, class: &Arc<ClassDescriptor>) -> Self {
        self.target = Some(class.clone());
        self
    }

    /// Select methods carrying at least one of `markers`
    pub fn with_markers<I, M>(mut self, markers: I) -> ProxyResult<Self>
    where
        I: IntoIterator<Item = M>,
        M: Into<Marker>,
    {
        if self.spec.has_predicate() {
            return Err(self.ambiguous());
        }
        self.spec = self.spec.with_markers(markers);
        Ok(self)
    }

    /// Select methods whose return category is one of `categories`
    pub fn returning(mut self, categories: impl IntoIterator<Item = ValueCategory>) -> ProxyResult<Self> {
        if self.spec.has_predicate() {
            return Err(self.ambiguous());
        }
        self.spec = self.spec.with_returns(categories);
        Ok(self)
    }

    /// Select methods by a custom predicate
    pub fn where_method(
        mut self,
        predicate: impl Fn(&MethodDescriptor) -> bool + Send + Sync + 'static,
    ) -> ProxyResult<Self> {
        if self.spec.markers().is_some() || self.spec.returns().is_some() {
            return Err(self.ambiguous());
        }
        self.spec = self.spec.with_predicate(predicate);
        Ok(self)
    }

    /// Finish the pointcut, routing selected methods to `handler`
    pub fn around(self, handler: HandlerRef) -> ProxyResult<()> {
        let pointcut = Pointcut {
            name: Arc::from(self.name.as_str()),
            target: self.target,
            filter: self.spec,
            handler,
        };
        self.registry.register(pointcut)
    }

    fn ambiguous(&self) -> ProxyError {
        ProxyError::AmbiguousFilterSpec {
            pointcut: self.name.clone(),
        }
    }
}
