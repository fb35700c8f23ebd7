//! Method filters
//!
//! A [`FilterSpec`] selects methods by marker presence, by return category or
//! by a custom predicate. Marker and return filters compose by logical AND;
//! a predicate stands alone (pointcut binding rejects mixing the two).
//!
//! Independently of any filter, methods in the excluded category (final,
//! static, private) are never eligible for interception.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashSet;
use veneer_sdk::{Marker, MethodDescriptor, ValueCategory};

/// Custom method predicate
pub type MethodPredicate = Arc<dyn Fn(&MethodDescriptor) -> bool + Send + Sync>;

/// Compiled match function over method descriptors
pub type MethodFilter = Arc<dyn Fn(&MethodDescriptor) -> bool + Send + Sync>;

/// Declarative method selection
#[derive(Clone, Default)]
pub struct FilterSpec {
    markers: Option<FxHashSet<Marker>>,
    returns: Option<FxHashSet<ValueCategory>>,
    predicate: Option<MethodPredicate>,
}

impl FilterSpec {
    /// Spec matching every method
    pub fn any() -> Self {
        Self::default()
    }

    /// Require at least one of `markers`. An empty set leaves the filter unset.
    pub fn with_markers<I, M>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<Marker>,
    {
        let set: FxHashSet<Marker> = markers.into_iter().map(Into::into).collect();
        self.markers = if set.is_empty() { None } else { Some(set) };
        self
    }

    /// Require the return category to be one of `categories`. An empty set leaves the filter unset.
    pub fn with_returns(mut self, categories: impl IntoIterator<Item = ValueCategory>) -> Self {
        let set: FxHashSet<ValueCategory> = categories.into_iter().collect();
        self.returns = if set.is_empty() { None } else { Some(set) };
        self
    }

    /// Require a custom predicate
    pub fn with_predicate(
        mut self,
        predicate: impl Fn(&MethodDescriptor) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Required markers, if any
    pub fn markers(&self) -> Option<&FxHashSet<Marker>> {
        self.markers.as_ref()
    }

    /// Accepted return categories, if any
    pub fn returns(&self) -> Option<&FxHashSet<ValueCategory>> {
        self.returns.as_ref()
    }

    /// Whether a predicate is set
    pub fn has_predicate(&self) -> bool {
        self.predicate.is_some()
    }

    /// Whether no sub-filter is set
    pub fn is_empty(&self) -> bool {
        self.markers.is_none() && self.returns.is_none() && self.predicate.is_none()
    }

    /// Whether a predicate is combined with marker or return filters
    pub fn is_ambiguous(&self) -> bool {
        self.predicate.is_some() && (self.markers.is_some() || self.returns.is_some())
    }

    /// Whether every present sub-filter accepts `method`.
    ///
    /// This does not check eligibility; see [`matches`].
    pub fn accepts(&self, method: &MethodDescriptor) -> bool {
        if let Some(markers) = &self.markers {
            if !markers.iter().any(|m| method.has_marker(m)) {
                return false;
            }
        }
        if let Some(returns) = &self.returns {
            if !returns.contains(&method.returns) {
                return false;
            }
        }
        if let Some(predicate) = &self.predicate {
            if !predicate(method) {
                return false;
            }
        }
        true
    }

    /// Compile into a single match function (eligibility included)
    pub fn compile(&self) -> MethodFilter {
        let spec = self.clone();
        Arc::new(move |method: &MethodDescriptor| matches(method, &spec))
    }
}

impl fmt::Debug for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterSpec")
            .field("markers", &self.markers)
            .field("returns", &self.returns)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

/// Whether a method can ever be intercepted
pub fn is_eligible(method: &MethodDescriptor) -> bool {
    method.modifiers.is_overridable()
}

/// Whether `method` is eligible and accepted by `spec`
pub fn matches(method: &MethodDescriptor, spec: &FilterSpec) -> bool {
    is_eligible(method) && spec.accepts(method)
}
