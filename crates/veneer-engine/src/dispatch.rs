//! Invocation dispatcher
//!
//! Runtime entry point for every call on a proxy. Resolution order:
//!
//! 1. Method table lookup by name and arity
//! 2. `Inherited` entries run their original body
//! 3. Per-method binding on the proxy
//! 4. Last-registered matching pointcut
//! 5. Handler slot (intercepted mode)
//! 6. Configured [`Fallback`]
//!
//! Calls reaching step 3 are recorded while the handler slot is empty
//! (delegating mode) and recording is enabled. A proxy with a handler
//! installed keeps no call log.

use std::sync::Arc;

use veneer_sdk::{InvocationContext, InvokeError, InvokeResult, MethodDescriptor, Value};

use crate::config::Fallback;
use crate::proxy::{InvocationRecord, ProxyObject};
use crate::synth::{EntryStrategy, VTableEntry};

/// Per-proxy dispatch state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// No handler installed; calls are recorded and fall back per options
    Delegating,
    /// Handler installed; calls are forwarded to it
    Intercepted,
}

/// Context handed to handlers for one call
struct Invocation<'a> {
    proxy: &'a ProxyObject,
    entry: &'a VTableEntry,
    args: &'a [Value],
}

impl InvocationContext for Invocation<'_> {
    fn proxy_id(&self) -> u64 {
        self.proxy.id()
    }

    fn type_name(&self) -> &str {
        self.proxy.target_type().name()
    }

    fn method(&self) -> &Arc<MethodDescriptor> {
        &self.entry.descriptor
    }

    fn args(&self) -> &[Value] {
        self.args
    }

    fn proceed(&self, args: &[Value]) -> InvokeResult {
        let expected = self.entry.descriptor.arity();
        if args.len() != expected {
            return Err(InvokeError::ArityMismatch {
                method: self.entry.descriptor.name.to_string(),
                expected,
                got: args.len(),
            });
        }
        call_original(self.proxy, self.entry, args)
    }
}

/// Look up the method table entry for a call
pub(crate) fn resolve<'a>(proxy: &'a ProxyObject, method: &str, arity: usize) -> Result<&'a VTableEntry, InvokeError> {
    let table = proxy.kind.table();
    if let Some(entry) = table.find(method, arity) {
        return Ok(entry);
    }
    match table.overloads(method).next() {
        Some(other) => Err(InvokeError::ArityMismatch {
            method: method.to_string(),
            expected: other.descriptor.arity(),
            got: arity,
        }),
        None => Err(InvokeError::MethodNotFound {
            type_name: proxy.target_type().name().to_string(),
            method: method.to_string(),
        }),
    }
}

pub(crate) fn dispatch(proxy: &ProxyObject, method: &str, args: &[Value]) -> InvokeResult {
    let entry = resolve(proxy, method, args.len())?;

    if let EntryStrategy::Inherited(body) = &entry.strategy {
        return body(proxy.receiver(), args);
    }

    // Clone out of the slot so the handler may rebind it
    let slot = proxy.slot.read().clone();

    // Only delegating proxies keep a call log
    if slot.is_none() && proxy.options.record_invocations {
        proxy.invocations.lock().push(InvocationRecord {
            method: entry.descriptor.clone(),
            args: args.to_vec(),
        });
    }

    let ctx = Invocation { proxy, entry, args };

    let bound = proxy.bindings.get(&entry.signature).map(|h| h.value().clone());
    if let Some(handler) = bound {
        tracing::trace!(proxy = proxy.id(), method = %entry.signature, "dispatch to method binding");
        return handler.invoke(&ctx);
    }

    if let Some(registry) = &proxy.pointcuts {
        if let Some(pointcut) = registry.resolve(proxy.target_type(), &entry.descriptor) {
            tracing::trace!(
                proxy = proxy.id(),
                method = %entry.signature,
                pointcut = pointcut.name(),
                "dispatch to pointcut"
            );
            return pointcut.handler().invoke(&ctx);
        }
    }

    if let Some(handler) = slot {
        tracing::trace!(proxy = proxy.id(), method = %entry.signature, "dispatch to handler slot");
        return handler.invoke(&ctx);
    }

    fallback(proxy, entry, args)
}

fn fallback(proxy: &ProxyObject, entry: &VTableEntry, args: &[Value]) -> InvokeResult {
    match proxy.options.fallback {
        Fallback::Original if can_forward(proxy, entry) => {
            tracing::trace!(proxy = proxy.id(), method = %entry.signature, "delegating to original");
            call_original(proxy, entry, args)
        }
        Fallback::ZeroValue => Ok(Value::zero(entry.descriptor.returns)),
        Fallback::Original | Fallback::Reject => {
            tracing::warn!(
                proxy = proxy.id(),
                type_name = proxy.target_type().name(),
                method = %entry.signature,
                "no binding configured"
            );
            Err(InvokeError::NoBindingConfigured {
                type_name: proxy.target_type().name().to_string(),
                method: entry.signature.to_string(),
            })
        }
    }
}

/// Whether pass-through has something to run
fn can_forward(proxy: &ProxyObject, entry: &VTableEntry) -> bool {
    if !proxy.options.forward_to_original || proxy.kind.is_structural() {
        return false;
    }
    match &proxy.wrapped {
        // Extra structural methods and abstract ones have no body on the wrapped type
        Some(wrapped) => wrapped.class().find_body(&entry.signature).is_some(),
        None => entry.strategy.has_original(),
    }
}

fn call_original(proxy: &ProxyObject, entry: &VTableEntry, args: &[Value]) -> InvokeResult {
    if !can_forward(proxy, entry) {
        return Err(InvokeError::NoOriginal {
            method: entry.signature.to_string(),
        });
    }
    proxy.invoker.invoke_original(proxy.receiver(), &entry.descriptor, args)
}
