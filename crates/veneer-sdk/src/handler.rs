//! InvocationHandler trait: the interception interface
//!
//! A handler receives every call routed to it through a `&dyn InvocationContext`
//! that exposes the proxy identity, the method descriptor, the arguments and a
//! way to call through to the original implementation. Handler authors only
//! need this crate; the engine provides the context.

use std::sync::Arc;

use crate::descriptor::MethodDescriptor;
use crate::error::{InvokeError, InvokeResult};
use crate::value::{Value, ValueCategory};

/// Call-time view of an intercepted invocation
pub trait InvocationContext {
    /// Unique id of the proxy instance receiving the call
    fn proxy_id(&self) -> u64;

    /// Name of the proxied target type
    fn type_name(&self) -> &str;

    /// Descriptor of the invoked method (stable across calls)
    fn method(&self) -> &Arc<MethodDescriptor>;

    /// Call arguments, in order
    fn args(&self) -> &[Value];

    /// Invoke the original implementation with the given arguments.
    ///
    /// Fails with [`InvokeError::NoOriginal`] when the proxy has nothing to
    /// fall through to (structural proxies, forwarding disabled, abstract methods).
    fn proceed(&self, args: &[Value]) -> InvokeResult;

    /// Invoke the original implementation with the call's own arguments
    fn proceed_unchanged(&self) -> InvokeResult {
        self.proceed(self.args())
    }
}

/// Handler for intercepted method calls
///
/// Implementors are shared between threads: a handler installed on one thread
/// may be invoked from any other.
pub trait InvocationHandler: Send + Sync {
    /// Handle an invocation. An `Err` fails the intercepted call with that error.
    fn invoke(&self, ctx: &dyn InvocationContext) -> InvokeResult;
}

impl<F> InvocationHandler for F
where
    F: Fn(&dyn InvocationContext) -> InvokeResult + Send + Sync,
{
    fn invoke(&self, ctx: &dyn InvocationContext) -> InvokeResult {
        self(ctx)
    }
}

/// Shared handler reference, as stored in handler slots and bindings
pub type HandlerRef = Arc<dyn InvocationHandler>;

/// Wrap a handler into a shared reference
pub fn handler(h: impl InvocationHandler + 'static) -> HandlerRef {
    Arc::new(h)
}

/// Handler that always returns `value`
pub fn returning(value: impl Into<Value>) -> HandlerRef {
    let value = value.into();
    Arc::new(move |_: &dyn InvocationContext| -> InvokeResult { Ok(value.clone()) })
}

/// Handler that always fails with a user error
pub fn raising(message: impl Into<String>) -> HandlerRef {
    let message = message.into();
    Arc::new(move |_: &dyn InvocationContext| -> InvokeResult {
        Err(InvokeError::Raised(message.clone()))
    })
}

/// Handler that calls through to the original implementation
pub fn passthrough() -> HandlerRef {
    Arc::new(|ctx: &dyn InvocationContext| ctx.proceed_unchanged())
}

/// Handler that does nothing; only valid for void methods
pub fn nothing() -> HandlerRef {
    Arc::new(|ctx: &dyn InvocationContext| {
        let method = ctx.method();
        if method.returns != ValueCategory::Void {
            return Err(InvokeError::NotVoid {
                method: method.signature().to_string(),
                returns: method.returns.to_string(),
            });
        }
        Ok(Value::Null)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeContext {
        method: Arc<MethodDescriptor>,
        args: Vec<Value>,
    }

    impl InvocationContext for FakeContext {
        fn proxy_id(&self) -> u64 {
            7
        }

        fn type_name(&self) -> &str {
            "Fake"
        }

        fn method(&self) -> &Arc<MethodDescriptor> {
            &self.method
        }

        fn args(&self) -> &[Value] {
            &self.args
        }

        fn proceed(&self, args: &[Value]) -> InvokeResult {
            Ok(args.first().cloned().unwrap_or_default())
        }
    }

    fn ctx(returns: ValueCategory) -> FakeContext {
        FakeContext {
            method: Arc::new(MethodDescriptor::new("m").returns(returns)),
            args: vec![Value::Int(5)],
        }
    }

    #[test]
    fn test_returning() {
        let h = returning(42);
        assert_eq!(h.invoke(&ctx(ValueCategory::Int)), Ok(Value::Int(42)));
    }

    #[test]
    fn test_raising() {
        let h = raising("boom");
        assert_eq!(
            h.invoke(&ctx(ValueCategory::Int)),
            Err(InvokeError::Raised("boom".to_string()))
        );
    }

    #[test]
    fn test_passthrough() {
        let h = passthrough();
        assert_eq!(h.invoke(&ctx(ValueCategory::Int)), Ok(Value::Int(5)));
    }

    #[test]
    fn test_nothing_only_for_void() {
        let h = nothing();
        assert_eq!(h.invoke(&ctx(ValueCategory::Void)), Ok(Value::Null));
        assert!(matches!(
            h.invoke(&ctx(ValueCategory::Int)),
            Err(InvokeError::NotVoid { .. })
        ));
    }

    #[test]
    fn test_closure_handler() {
        let h = handler(|ctx: &dyn InvocationContext| -> InvokeResult {
            Ok(Value::Int(ctx.args().len() as i64))
        });
        assert_eq!(h.invoke(&ctx(ValueCategory::Int)), Ok(Value::Int(1)));
    }
}
