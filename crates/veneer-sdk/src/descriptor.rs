//! Method descriptors
//!
//! A [`MethodDescriptor`] is the canonical, immutable description of one method
//! of a target type: who declares it, its signature, its return category, its
//! modifiers and the markers attached to it. Descriptors are created once when
//! a type is built and shared as `Arc<MethodDescriptor>` from then on; the
//! dispatcher hands the same `Arc` to every handler invocation.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::value::ValueCategory;

/// Global counter for type identities
static NEXT_TYPE_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of a runtime type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u64);

impl TypeId {
    /// Allocate a fresh, process-unique type identity
    pub fn next() -> Self {
        TypeId(NEXT_TYPE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Placeholder identity used before a method is attached to its owner
    pub const UNOWNED: TypeId = TypeId(0);

    /// Raw numeric identity
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Declarative tag attached to a method, matched by marker filters
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Marker(Arc<str>);

impl Marker {
    /// Create a marker
    pub fn new(name: impl AsRef<str>) -> Self {
        Marker(Arc::from(name.as_ref()))
    }

    /// Marker name
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Marker {
    fn from(name: &str) -> Self {
        Marker::new(name)
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Modifier flags for methods
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Cannot be overridden
    pub is_final: bool,
    /// Statically dispatched (no receiver)
    pub is_static: bool,
    /// Private to the declaring type
    pub is_private: bool,
    /// Declared without a body
    pub is_abstract: bool,
}

impl Modifiers {
    /// Whether a subclass may replace this method.
    ///
    /// Final, static and private methods are never overridable and therefore
    /// can never be intercepted, whatever filters say.
    pub fn is_overridable(&self) -> bool {
        !(self.is_final || self.is_static || self.is_private)
    }
}

/// Method identity used for deduplication: name plus ordered parameter categories
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    /// Method name
    pub name: Arc<str>,
    /// Parameter categories in order
    pub params: Vec<ValueCategory>,
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", p)?;
        }
        f.write_str(")")
    }
}

/// Canonical description of a method of a target type
#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    /// Declaring type
    pub owner: TypeId,
    /// Declaring type name
    pub owner_name: Arc<str>,
    /// Method name
    pub name: Arc<str>,
    /// Parameter categories in order
    pub params: Vec<ValueCategory>,
    /// Return category
    pub returns: ValueCategory,
    /// Modifier flags
    pub modifiers: Modifiers,
    /// Attached markers
    pub markers: FxHashSet<Marker>,
}

impl MethodDescriptor {
    /// Create a descriptor for a method returning void with no parameters.
    ///
    /// The owner is left unset; type builders stamp it with [`with_owner`](Self::with_owner).
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            owner: TypeId::UNOWNED,
            owner_name: Arc::from(""),
            name: Arc::from(name.as_ref()),
            params: Vec::new(),
            returns: ValueCategory::Void,
            modifiers: Modifiers::default(),
            markers: FxHashSet::default(),
        }
    }

    /// Set the declaring type
    pub fn with_owner(mut self, owner: TypeId, owner_name: Arc<str>) -> Self {
        self.owner = owner;
        self.owner_name = owner_name;
        self
    }

    /// Add a parameter
    pub fn with_param(mut self, category: ValueCategory) -> Self {
        self.params.push(category);
        self
    }

    /// Set return category
    pub fn returns(mut self, category: ValueCategory) -> Self {
        self.returns = category;
        self
    }

    /// Attach a marker
    pub fn with_marker(mut self, marker: impl Into<Marker>) -> Self {
        self.markers.insert(marker.into());
        self
    }

    /// Mark as final
    pub fn as_final(mut self) -> Self {
        self.modifiers.is_final = true;
        self
    }

    /// Mark as static
    pub fn as_static(mut self) -> Self {
        self.modifiers.is_static = true;
        self
    }

    /// Mark as private
    pub fn as_private(mut self) -> Self {
        self.modifiers.is_private = true;
        self
    }

    /// Mark as abstract
    pub fn as_abstract(mut self) -> Self {
        self.modifiers.is_abstract = true;
        self
    }

    /// Signature used for identity across a type hierarchy
    pub fn signature(&self) -> MethodSignature {
        MethodSignature {
            name: self.name.clone(),
            params: self.params.clone(),
        }
    }

    /// Number of parameters
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Whether the method carries a marker
    pub fn has_marker(&self, marker: &Marker) -> bool {
        self.markers.contains(marker)
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{} -> {}", self.owner_name, self.signature(), self.returns)
    }
}
