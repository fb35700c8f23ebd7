//! Runtime type descriptors
//!
//! A [`ClassDescriptor`] is what gets proxied: the runtime description of a
//! type with its identity, shape, inheritance, field layout and methods. Method
//! implementations are stored as closures over an [`Instance`] receiver, the way
//! a VM class keeps function references in its vtable.

use std::fmt;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use veneer_sdk::{InvokeError, InvokeResult, MethodDescriptor, MethodSignature, TypeId, Value, ValueCategory};

use super::instance::Instance;
use crate::error::{ProxyError, ProxyResult};

/// Implementation of a method (or constructor) over a receiver
pub type MethodBody = Arc<dyn Fn(&Instance, &[Value]) -> InvokeResult + Send + Sync>;

/// Shape of a type, which decides how it can be proxied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeShape {
    /// Only method signatures, no state and no bodies
    Structural,
    /// Concrete and extensible
    Open,
    /// Concrete and final; cannot be extended
    Sealed,
}

/// A declared field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Field name
    pub name: Arc<str>,
    /// Field category (decides its zero value)
    pub category: ValueCategory,
}

/// A declared method: its descriptor plus the implementation, if any
#[derive(Clone)]
pub struct MethodDef {
    /// Canonical descriptor
    pub descriptor: Arc<MethodDescriptor>,
    /// Implementation (None for abstract and structural methods)
    pub body: Option<MethodBody>,
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("descriptor", &self.descriptor)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// Normal construction protocol of a type
#[derive(Clone)]
pub struct Constructor {
    /// Parameter categories
    pub params: Vec<ValueCategory>,
    /// Initializer run against a zeroed instance
    pub body: MethodBody,
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor").field("params", &self.params).finish()
    }
}

/// Runtime type descriptor
#[derive(Debug)]
pub struct ClassDescriptor {
    id: TypeId,
    name: Arc<str>,
    shape: TypeShape,
    parent: Option<Arc<ClassDescriptor>>,
    interfaces: Vec<Arc<ClassDescriptor>>,
    /// Full field layout (inherited first, then declared)
    layout: Vec<FieldDef>,
    field_indices: FxHashMap<Arc<str>, usize>,
    methods: Vec<MethodDef>,
    constructor: Option<Constructor>,
}

impl ClassDescriptor {
    /// Type identity
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared type name
    pub fn name_arc(&self) -> Arc<str> {
        self.name.clone()
    }

    /// Type shape
    pub fn shape(&self) -> TypeShape {
        self.shape
    }

    /// Whether this type is purely structural
    pub fn is_structural(&self) -> bool {
        self.shape == TypeShape::Structural
    }

    /// Whether this type can be extended (structural types are implemented, not extended)
    pub fn is_extensible(&self) -> bool {
        self.shape != TypeShape::Sealed
    }

    /// Parent type
    pub fn parent(&self) -> Option<&Arc<ClassDescriptor>> {
        self.parent.as_ref()
    }

    /// Structural types implemented directly by this type
    pub fn interfaces(&self) -> &[Arc<ClassDescriptor>] {
        &self.interfaces
    }

    /// Methods declared on this type (not inherited)
    pub fn declared_methods(&self) -> &[MethodDef] {
        &self.methods
    }

    /// Normal constructor, if the type declares one
    pub fn constructor(&self) -> Option<&Constructor> {
        self.constructor.as_ref()
    }

    /// Field layout including inherited fields
    pub fn field_layout(&self) -> &[FieldDef] {
        &self.layout
    }

    /// Index of a field in the layout
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.field_indices.get(name).copied()
    }

    /// All methods visible on this type, most-derived declarations first.
    ///
    /// The list may contain several entries with the same signature (an
    /// override and the method it overrides); callers that need a method set
    /// deduplicate by signature keeping the first occurrence.
    pub fn hierarchy_methods(&self) -> Vec<MethodDef> {
        let mut out = self.methods.clone();
        if let Some(parent) = &self.parent {
            out.extend(parent.hierarchy_methods());
        }
        for iface in &self.interfaces {
            out.extend(iface.hierarchy_methods());
        }
        out
    }

    /// Find the most-derived implementation of a signature
    pub fn find_body(&self, signature: &MethodSignature) -> Option<MethodBody> {
        if let Some(def) = self.methods.iter().find(|m| &m.descriptor.signature() == signature) {
            if let Some(body) = &def.body {
                return Some(body.clone());
            }
        }
        self.parent.as_ref().and_then(|p| p.find_body(signature))
    }

    /// Whether this type is `other` or extends/implements it
    pub fn is_subtype_of(&self, other: &ClassDescriptor) -> bool {
        if self.id == other.id {
            return true;
        }
        if let Some(parent) = &self.parent {
            if parent.is_subtype_of(other) {
                return true;
            }
        }
        self.interfaces.iter().any(|i| i.is_subtype_of(other))
    }

    /// Construct an instance through the normal construction protocol
    pub fn instantiate(self: &Arc<Self>, args: &[Value]) -> Result<Arc<Instance>, InvokeError> {
        if self.is_structural() {
            return Err(InvokeError::Construction(format!(
                "cannot instantiate structural type {}",
                self.name
            )));
        }
        let instance = Instance::zeroed(self.clone());
        match &self.constructor {
            Some(ctor) => {
                if ctor.params.len() != args.len() {
                    return Err(InvokeError::ArityMismatch {
                        method: format!("{}::new", self.name),
                        expected: ctor.params.len(),
                        got: args.len(),
                    });
                }
                (ctor.body)(&instance, args)?;
            }
            None if !args.is_empty() => {
                return Err(InvokeError::ArityMismatch {
                    method: format!("{}::new", self.name),
                    expected: 0,
                    got: args.len(),
                });
            }
            None => {}
        }
        Ok(Arc::new(instance))
    }
}

/// Builder for runtime types
pub struct ClassBuilder {
    name: String,
    shape: TypeShape,
    parent: Option<Arc<ClassDescriptor>>,
    interfaces: Vec<Arc<ClassDescriptor>>,
    fields: Vec<FieldDef>,
    methods: Vec<(MethodDescriptor, Option<MethodBody>)>,
    constructor: Option<Constructor>,
}

impl ClassBuilder {
    /// Start an extensible concrete type
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shape: TypeShape::Open,
            parent: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            constructor: None,
        }
    }

    /// Start a structural type
    pub fn structural(name: impl Into<String>) -> Self {
        let mut builder = Self::new(name);
        builder.shape = TypeShape::Structural;
        builder
    }

    /// Mark the type as sealed
    pub fn sealed(mut self) -> Self {
        self.shape = TypeShape::Sealed;
        self
    }

    /// Set the parent type
    pub fn extends(mut self, parent: &Arc<ClassDescriptor>) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// Implement a structural type
    pub fn implements(mut self, iface: &Arc<ClassDescriptor>) -> Self {
        self.interfaces.push(iface.clone());
        self
    }

    /// Declare a field
    pub fn field(mut self, name: &str, category: ValueCategory) -> Self {
        self.fields.push(FieldDef {
            name: Arc::from(name),
            category,
        });
        self
    }

    /// Declare a method with an implementation
    pub fn method(
        mut self,
        descriptor: MethodDescriptor,
        body: impl Fn(&Instance, &[Value]) -> InvokeResult + Send + Sync + 'static,
    ) -> Self {
        self.methods.push((descriptor, Some(Arc::new(body))));
        self
    }

    /// Declare a method without implementation
    pub fn abstract_method(mut self, descriptor: MethodDescriptor) -> Self {
        self.methods.push((descriptor.as_abstract(), None));
        self
    }

    /// Declare the normal constructor
    pub fn constructor(
        mut self,
        params: Vec<ValueCategory>,
        body: impl Fn(&Instance, &[Value]) -> InvokeResult + Send + Sync + 'static,
    ) -> Self {
        self.constructor = Some(Constructor {
            params,
            body: Arc::new(body),
        });
        self
    }

    /// Validate and finish the type
    pub fn build(self) -> ProxyResult<Arc<ClassDescriptor>> {
        let name = self.name.as_str();
        self.validate_supertypes()?;

        if self.shape == TypeShape::Structural {
            if !self.fields.is_empty() {
                return Err(ProxyError::invalid_type(name, "structural types cannot declare fields"));
            }
            if self.constructor.is_some() {
                return Err(ProxyError::invalid_type(name, "structural types cannot declare a constructor"));
            }
            if self.methods.iter().any(|(_, body)| body.is_some()) {
                return Err(ProxyError::invalid_type(name, "structural methods cannot have bodies"));
            }
        }

        let id = TypeId::next();
        let type_name: Arc<str> = Arc::from(name);

        let mut layout = self
            .parent
            .as_ref()
            .map(|p| p.layout.clone())
            .unwrap_or_default();
        for field in &self.fields {
            if layout.iter().any(|f| f.name == field.name) {
                return Err(ProxyError::invalid_type(
                    name,
                    format!("duplicate field '{}'", field.name),
                ));
            }
            layout.push(field.clone());
        }
        let field_indices = layout
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();

        let mut seen = FxHashSet::default();
        let mut methods = Vec::with_capacity(self.methods.len());
        for (descriptor, body) in self.methods {
            let mut descriptor = descriptor.with_owner(id, type_name.clone());
            if self.shape == TypeShape::Structural {
                descriptor = descriptor.as_abstract();
            }
            let signature = descriptor.signature();
            if body.is_none() && !descriptor.modifiers.is_overridable() {
                return Err(ProxyError::invalid_type(
                    name,
                    format!("abstract method {} cannot be final, static or private", signature),
                ));
            }
            if !seen.insert(signature.clone()) {
                return Err(ProxyError::invalid_type(
                    name,
                    format!("duplicate method {}", signature),
                ));
            }
            if let Some(parent) = &self.parent {
                let overrides_final = parent
                    .hierarchy_methods()
                    .iter()
                    .any(|m| m.descriptor.signature() == signature && m.descriptor.modifiers.is_final);
                if overrides_final {
                    return Err(ProxyError::invalid_type(
                        name,
                        format!("cannot override final method {}", signature),
                    ));
                }
            }
            methods.push(MethodDef {
                descriptor: Arc::new(descriptor),
                body,
            });
        }

        Ok(Arc::new(ClassDescriptor {
            id,
            name: type_name,
            shape: self.shape,
            parent: self.parent,
            interfaces: self.interfaces,
            layout,
            field_indices,
            methods,
            constructor: self.constructor,
        }))
    }

    fn validate_supertypes(&self) -> ProxyResult<()> {
        let name = self.name.as_str();
        if let Some(parent) = &self.parent {
            if self.shape == TypeShape::Structural {
                return Err(ProxyError::invalid_type(name, "structural types cannot extend a class"));
            }
            match parent.shape() {
                TypeShape::Sealed => {
                    return Err(ProxyError::invalid_type(
                        name,
                        format!("cannot extend sealed type {}", parent.name()),
                    ))
                }
                TypeShape::Structural => {
                    return Err(ProxyError::invalid_type(
                        name,
                        format!("{} is structural; implement it instead", parent.name()),
                    ))
                }
                TypeShape::Open => {}
            }
        }
        if let Some(iface) = self.interfaces.iter().find(|i| !i.is_structural()) {
            return Err(ProxyError::invalid_type(
                name,
                format!("{} is not structural and cannot be implemented", iface.name()),
            ));
        }
        Ok(())
    }
}
