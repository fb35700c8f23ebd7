//! Proxy objects
//!
//! A [`ProxyObject`] is the callable result of [`crate::ProxyFactory::create`]:
//! a proxy type (generated or structural), the proxy's own field state, an
//! optional retained instance for pass-through, its handler slot and its
//! per-method bindings. Every call goes through [`ProxyObject::invoke`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use veneer_sdk::{
    nothing, passthrough, raising, returning, HandlerRef, InvokeError, InvokeResult, MethodDescriptor,
    MethodSignature, TypeId, Value,
};

use crate::construct::OriginalInvoker;
use crate::dispatch::{self, DispatchMode};
use crate::factory::ProxyOptions;
use crate::model::{ClassDescriptor, Instance};
use crate::pointcut::PointcutRegistry;
use crate::structural::StructuralType;
use crate::synth::{EntryStrategy, GeneratedType, MethodTable, VTableEntry};

/// Type behind a proxy
#[derive(Debug, Clone)]
pub enum ProxyKind {
    /// Synthesized subtype of a concrete target
    Generated(Arc<GeneratedType>),
    /// Handler-backed implementation of a structural target
    Structural(Arc<StructuralType>),
}

impl ProxyKind {
    /// Method table
    pub fn table(&self) -> &MethodTable {
        match self {
            ProxyKind::Generated(ty) => ty.table(),
            ProxyKind::Structural(ty) => ty.table(),
        }
    }

    /// Proxied target type
    pub fn target(&self) -> &Arc<ClassDescriptor> {
        match self {
            ProxyKind::Generated(ty) => ty.target(),
            ProxyKind::Structural(ty) => ty.target(),
        }
    }

    /// Whether this is a structural proxy
    pub fn is_structural(&self) -> bool {
        matches!(self, ProxyKind::Structural(_))
    }
}

/// A call observed by a proxy while no handler was installed
#[derive(Debug, Clone)]
pub struct InvocationRecord {
    /// Invoked method
    pub method: Arc<MethodDescriptor>,
    /// Arguments, in order
    pub args: Vec<Value>,
}

/// A proxy instance
pub struct ProxyObject {
    pub(crate) kind: ProxyKind,
    /// Proxy's own state, zero-initialized by the raw constructor
    pub(crate) state: Arc<Instance>,
    /// Retained instance pass-through runs against, if any
    pub(crate) wrapped: Option<Arc<Instance>>,
    pub(crate) slot: RwLock<Option<HandlerRef>>,
    pub(crate) bindings: DashMap<MethodSignature, HandlerRef>,
    pub(crate) invocations: Mutex<Vec<InvocationRecord>>,
    selection_epoch: AtomicU64,
    pub(crate) options: ProxyOptions,
    pub(crate) pointcuts: Option<Arc<PointcutRegistry>>,
    pub(crate) invoker: Arc<dyn OriginalInvoker>,
}

impl ProxyObject {
    pub(crate) fn new(
        kind: ProxyKind,
        state: Arc<Instance>,
        wrapped: Option<Arc<Instance>>,
        handler: Option<HandlerRef>,
        options: ProxyOptions,
        pointcuts: Option<Arc<PointcutRegistry>>,
        invoker: Arc<dyn OriginalInvoker>,
    ) -> Self {
        Self {
            kind,
            state,
            wrapped,
            slot: RwLock::new(handler),
            bindings: DashMap::new(),
            invocations: Mutex::new(Vec::new()),
            selection_epoch: AtomicU64::new(0),
            options,
            pointcuts,
            invoker,
        }
    }

    /// Invoke a method by name
    pub fn invoke(&self, method: &str, args: &[Value]) -> InvokeResult {
        dispatch::dispatch(self, method, args)
    }

    /// Unique proxy id
    pub fn id(&self) -> u64 {
        self.state.object_id()
    }

    /// Type behind this proxy
    pub fn kind(&self) -> &ProxyKind {
        &self.kind
    }

    /// Id of the proxy's type (the generated type, or the structural target)
    pub fn type_id(&self) -> TypeId {
        match &self.kind {
            ProxyKind::Generated(ty) => ty.id(),
            ProxyKind::Structural(ty) => ty.target().id(),
        }
    }

    /// Name of the proxy's type
    pub fn type_name(&self) -> &str {
        match &self.kind {
            ProxyKind::Generated(ty) => ty.name(),
            ProxyKind::Structural(ty) => ty.target().name(),
        }
    }

    /// Proxied target type
    pub fn target_type(&self) -> &Arc<ClassDescriptor> {
        self.kind.target()
    }

    /// Whether this proxy is usable as `class`
    pub fn is_instance_of(&self, class: &ClassDescriptor) -> bool {
        match &self.kind {
            ProxyKind::Generated(ty) => ty.is_subtype_of(class),
            ProxyKind::Structural(ty) => ty.is_subtype_of(class),
        }
    }

    /// Proxy's own field state
    pub fn state(&self) -> &Arc<Instance> {
        &self.state
    }

    /// Retained instance, for proxies created over an existing object
    pub fn wrapped(&self) -> Option<&Arc<Instance>> {
        self.wrapped.as_ref()
    }

    /// Receiver original bodies run against
    pub(crate) fn receiver(&self) -> &Instance {
        match &self.wrapped {
            Some(wrapped) => wrapped,
            None => &self.state,
        }
    }

    /// Options this proxy was created with
    pub fn options(&self) -> &ProxyOptions {
        &self.options
    }

    /// Descriptors of every intercepted method
    pub fn intercepted_methods(&self) -> Vec<Arc<MethodDescriptor>> {
        self.kind.table().intercepted().cloned().collect()
    }

    // ===== Handler slot =====

    /// Current handler
    pub fn handler(&self) -> Option<HandlerRef> {
        self.slot.read().clone()
    }

    /// Install a handler, returning the previous one
    pub fn set_handler(&self, handler: HandlerRef) -> Option<HandlerRef> {
        self.slot.write().replace(handler)
    }

    /// Remove the handler, returning to delegating mode
    pub fn clear_handler(&self) -> Option<HandlerRef> {
        self.slot.write().take()
    }

    /// Dispatch mode implied by the handler slot
    pub fn mode(&self) -> DispatchMode {
        if self.slot.read().is_some() {
            DispatchMode::Intercepted
        } else {
            DispatchMode::Delegating
        }
    }

    // ===== Per-method bindings =====

    /// Select a method for rebinding.
    ///
    /// Making a selection invalidates every older selection on this proxy.
    /// An overloaded name fails with [`InvokeError::AmbiguousMethod`]; use
    /// [`select_overload`](Self::select_overload) for those.
    pub fn select(&self, method: &str) -> Result<MethodSelection<'_>, InvokeError> {
        let mut overloads = self.kind.table().overloads(method);
        let first = overloads.next();
        let rest = overloads.count();
        if rest > 0 {
            return Err(InvokeError::AmbiguousMethod {
                method: method.to_string(),
                overloads: rest + 1,
            });
        }
        let entry = self.selectable(first, method)?;
        Ok(self.new_selection(entry))
    }

    /// Select one overload of a method for rebinding
    pub fn select_overload(&self, method: &str, arity: usize) -> Result<MethodSelection<'_>, InvokeError> {
        let entry = self.selectable(dispatch::resolve(self, method, arity)?.into(), method)?;
        Ok(self.new_selection(entry))
    }

    /// Bind `handler` to `method`, replacing any earlier binding.
    ///
    /// Fails on overloaded names like [`select`](Self::select).
    pub fn bind(&self, method: &str, handler: HandlerRef) -> Result<(), InvokeError> {
        self.select(method)?.then(handler)
    }

    /// Remove the binding of `method`
    pub fn unbind(&self, method: &str) -> Option<HandlerRef> {
        let signatures: Vec<MethodSignature> = self
            .kind
            .table()
            .overloads(method)
            .map(|e| e.signature.clone())
            .collect();
        signatures
            .iter()
            .filter_map(|s| self.bindings.remove(s).map(|(_, h)| h))
            .last()
    }

    /// Remove every per-method binding
    pub fn clear_bindings(&self) {
        self.bindings.clear();
    }

    fn selectable<'a>(&self, entry: Option<&'a VTableEntry>, method: &str) -> Result<&'a VTableEntry, InvokeError> {
        let entry = entry.ok_or_else(|| InvokeError::MethodNotFound {
            type_name: self.kind.target().name().to_string(),
            method: method.to_string(),
        })?;
        match entry.strategy {
            EntryStrategy::Intercept { .. } => Ok(entry),
            EntryStrategy::Inherited(_) => Err(InvokeError::NotInterceptable {
                method: entry.signature.to_string(),
            }),
        }
    }

    fn new_selection(&self, entry: &VTableEntry) -> MethodSelection<'_> {
        let epoch = self.selection_epoch.fetch_add(1, Ordering::AcqRel) + 1;
        MethodSelection {
            proxy: self,
            descriptor: entry.descriptor.clone(),
            signature: entry.signature.clone(),
            epoch,
        }
    }

    // ===== Recorded invocations =====

    /// Recorded calls, oldest first
    pub fn invocations(&self) -> Vec<InvocationRecord> {
        self.invocations.lock().clone()
    }

    /// Number of recorded calls to methods named `method`
    pub fn invocation_count(&self, method: &str) -> usize {
        self.invocations
            .lock()
            .iter()
            .filter(|r| &*r.method.name == method)
            .count()
    }

    /// Forget recorded calls
    pub fn clear_invocations(&self) {
        self.invocations.lock().clear();
    }
}

impl fmt::Debug for ProxyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyObject")
            .field("id", &self.id())
            .field("type", &self.type_name())
            .field("mode", &self.mode())
            .field("bindings", &self.bindings.len())
            .finish()
    }
}

/// One-shot method selection returned by [`ProxyObject::select`].
///
/// Consuming it binds a handler to the selected method. A selection made later
/// on the same proxy invalidates this one, and binding through an invalidated
/// selection fails with [`InvokeError::StaleSelection`].
#[must_use = "a selection does nothing until bound"]
pub struct MethodSelection<'a> {
    proxy: &'a ProxyObject,
    descriptor: Arc<MethodDescriptor>,
    signature: MethodSignature,
    epoch: u64,
}

impl<'a> MethodSelection<'a> {
    /// Selected method
    pub fn method(&self) -> &Arc<MethodDescriptor> {
        &self.descriptor
    }

    /// Bind a handler to the selected method
    pub fn then(self, handler: HandlerRef) -> Result<(), InvokeError> {
        // Consuming bumps the epoch, so the token cannot race a newer selection
        let consumed = self.proxy.selection_epoch.compare_exchange(
            self.epoch,
            self.epoch + 1,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if consumed.is_err() {
            return Err(InvokeError::StaleSelection {
                method: self.signature.to_string(),
            });
        }
        tracing::trace!(proxy = self.proxy.id(), method = %self.signature, "method rebound");
        self.proxy.bindings.insert(self.signature, handler);
        Ok(())
    }

    /// Make the selected method return `value`
    pub fn then_return(self, value: impl Into<Value>) -> Result<(), InvokeError> {
        self.then(returning(value))
    }

    /// Make the selected method fail with a user error
    pub fn then_raise(self, message: impl Into<String>) -> Result<(), InvokeError> {
        self.then(raising(message))
    }

    /// Make the selected void method do nothing
    pub fn then_nothing(self) -> Result<(), InvokeError> {
        if self.descriptor.returns != veneer_sdk::ValueCategory::Void {
            return Err(InvokeError::NotVoid {
                method: self.signature.to_string(),
                returns: self.descriptor.returns.to_string(),
            });
        }
        self.then(nothing())
    }

    /// Make the selected method call through to the original
    pub fn then_call_original(self) -> Result<(), InvokeError> {
        self.then(passthrough())
    }
}

impl fmt::Debug for MethodSelection<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodSelection")
            .field("method", &self.signature)
            .field("epoch", &self.epoch)
            .finish()
    }
}
