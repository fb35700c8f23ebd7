//! Construction and pass-through collaborators
//!
//! [`RawConstructor`] allocates a proxy's backing state without running any
//! constructor of the target type, which is how a generated type gets a
//! no-argument construction path even when its target has none.
//! [`OriginalInvoker`] runs the original implementation of a method against a
//! receiver; the dispatcher uses it for every pass-through call.

use veneer_sdk::{InvokeError, InvokeResult, MethodDescriptor, Value};

use crate::model::Instance;
use crate::synth::GeneratedType;

/// Allocates instances of generated types without running a constructor
pub trait RawConstructor: Send + Sync {
    /// Lay out an instance of `ty`'s target with every field zeroed.
    ///
    /// An `Err` carries the allocator's message and surfaces as
    /// [`crate::ProxyError::ConstructionFailed`].
    fn allocate_without_constructor(&self, ty: &GeneratedType) -> Result<Instance, String>;
}

/// Default allocator: zero-initialized fields from the target's layout
#[derive(Debug, Default, Clone, Copy)]
pub struct ZeroedConstructor;

impl RawConstructor for ZeroedConstructor {
    fn allocate_without_constructor(&self, ty: &GeneratedType) -> Result<Instance, String> {
        Ok(Instance::zeroed(ty.target().clone()))
    }
}

/// Runs original method implementations
pub trait OriginalInvoker: Send + Sync {
    /// Invoke the implementation of `method` that `receiver` would run without a proxy
    fn invoke_original(&self, receiver: &Instance, method: &MethodDescriptor, args: &[Value]) -> InvokeResult;
}

/// Default invoker: looks the body up on the receiver's own type hierarchy
#[derive(Debug, Default, Clone, Copy)]
pub struct VTableInvoker;

impl OriginalInvoker for VTableInvoker {
    fn invoke_original(&self, receiver: &Instance, method: &MethodDescriptor, args: &[Value]) -> InvokeResult {
        let signature = method.signature();
        let body = receiver
            .class()
            .find_body(&signature)
            .ok_or_else(|| InvokeError::NoOriginal {
                method: signature.to_string(),
            })?;
        body(receiver, args)
    }
}
