//! Integration tests for proxy creation and dispatch
//!
//! Covers structural and generated proxies end to end: handler routing,
//! delegating fallbacks, spies over existing instances and extra types.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use veneer_engine::{
    ClassBuilder, ClassDescriptor, DispatchMode, Fallback, ProxyClassCache, ProxyError, ProxyFactory,
    ProxyRequest,
};
use veneer_sdk::{
    handler, returning, InvocationContext, InvokeError, InvokeResult, MethodDescriptor, Value, ValueCategory,
};

fn isolated_factory() -> ProxyFactory {
    ProxyFactory::new().with_cache(Arc::new(ProxyClassCache::new()))
}

fn pair_type() -> Arc<ClassDescriptor> {
    ClassBuilder::structural("Pair")
        .abstract_method(MethodDescriptor::new("a").returns(ValueCategory::Int))
        .abstract_method(MethodDescriptor::new("b").returns(ValueCategory::Int))
        .build()
        .unwrap()
}

fn calculator() -> Arc<ClassDescriptor> {
    ClassBuilder::new("Calculator")
        .field("offset", ValueCategory::Int)
        .method(
            MethodDescriptor::new("add")
                .with_param(ValueCategory::Int)
                .with_param(ValueCategory::Int)
                .returns(ValueCategory::Int),
            |this, args| {
                let offset = this.get_field("offset").and_then(|v| v.as_int()).unwrap_or(0);
                let a = args[0].as_int().unwrap_or(0);
                let b = args[1].as_int().unwrap_or(0);
                Ok(Value::Int(a + b + offset))
            },
        )
        .method(MethodDescriptor::new("name").returns(ValueCategory::Str).as_final(), |_, _| {
            Ok(Value::str("calc"))
        })
        .method(MethodDescriptor::new("secret").returns(ValueCategory::Int).as_private(), |_, _| {
            Ok(Value::Int(7))
        })
        .constructor(vec![ValueCategory::Int], |this, args| {
            this.set_field("offset", args[0].clone())?;
            Ok(Value::Null)
        })
        .build()
        .unwrap()
}

// ============================================================================
// Structural proxies
// ============================================================================

mod structural {
    use super::*;

    #[test]
    fn test_bound_method_and_unbound_method() {
        let proxy = isolated_factory()
            .create(ProxyRequest::builder(&pair_type()).fallback(Fallback::Reject).build().unwrap())
            .unwrap();
        proxy.bind("a", returning(42)).unwrap();

        assert_eq!(proxy.invoke("a", &[]), Ok(Value::Int(42)));
        assert!(matches!(
            proxy.invoke("b", &[]),
            Err(InvokeError::NoBindingConfigured { ref method, .. }) if method == "b()"
        ));
    }

    #[test]
    fn test_original_fallback_degrades_to_no_binding() {
        let proxy = isolated_factory().create(ProxyRequest::new(&pair_type())).unwrap();
        assert_eq!(proxy.options().fallback, Fallback::Original);
        assert!(matches!(
            proxy.invoke("a", &[]),
            Err(InvokeError::NoBindingConfigured { .. })
        ));
    }

    #[test]
    fn test_each_call_reaches_handler_once_with_args_in_order() {
        let repo = ClassBuilder::structural("Repository")
            .abstract_method(
                MethodDescriptor::new("put")
                    .with_param(ValueCategory::Str)
                    .with_param(ValueCategory::Int)
                    .with_param(ValueCategory::Bool),
            )
            .build()
            .unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let h = {
            let calls = calls.clone();
            let seen = seen.clone();
            handler(move |ctx: &dyn InvocationContext| -> InvokeResult {
                calls.fetch_add(1, Ordering::SeqCst);
                seen.lock().push(ctx.args().to_vec());
                Ok(Value::Null)
            })
        };

        let proxy = isolated_factory().proxy(&repo, h).unwrap();
        let args = [Value::str("k"), Value::Int(9), Value::Bool(true)];
        proxy.invoke("put", &args).unwrap();
        proxy.invoke("put", &args).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(seen.lock()[0], args.to_vec());
    }

    #[test]
    fn test_structural_never_unsupported() {
        let empty = ClassBuilder::structural("Empty").build().unwrap();
        let proxy = isolated_factory().create(ProxyRequest::new(&empty)).unwrap();
        assert!(proxy.kind().is_structural());
        assert_eq!(proxy.type_name(), "Empty");
    }

    #[test]
    fn test_proceed_has_no_original() {
        let proxy = isolated_factory()
            .proxy(
                &pair_type(),
                handler(|ctx: &dyn InvocationContext| -> InvokeResult { ctx.proceed_unchanged() }),
            )
            .unwrap();
        assert!(matches!(proxy.invoke("a", &[]), Err(InvokeError::NoOriginal { .. })));
    }
}

// ============================================================================
// Generated proxies
// ============================================================================

mod generated {
    use super::*;

    #[test]
    fn test_handler_wraps_original() {
        let proxy = isolated_factory()
            .proxy(
                &calculator(),
                handler(|ctx: &dyn InvocationContext| -> InvokeResult {
                    let sum = ctx.proceed_unchanged()?;
                    Ok(Value::Int(sum.as_int().unwrap_or(0) * 10))
                }),
            )
            .unwrap();

        assert_eq!(proxy.mode(), DispatchMode::Intercepted);
        assert_eq!(proxy.invoke("add", &[Value::Int(1), Value::Int(2)]), Ok(Value::Int(30)));
    }

    #[test]
    fn test_excluded_methods_keep_original_behaviour() {
        let proxy = isolated_factory().proxy(&calculator(), returning(-1)).unwrap();

        assert_eq!(proxy.invoke("add", &[Value::Int(1), Value::Int(2)]), Ok(Value::Int(-1)));
        assert_eq!(proxy.invoke("name", &[]), Ok(Value::str("calc")));
        assert_eq!(proxy.invoke("secret", &[]), Ok(Value::Int(7)));

        let intercepted: Vec<_> = proxy
            .intercepted_methods()
            .iter()
            .map(|m| m.name.to_string())
            .collect();
        assert_eq!(intercepted, vec!["add".to_string()]);
    }

    #[test]
    fn test_bind_rejects_excluded_method() {
        let proxy = isolated_factory().create(ProxyRequest::new(&calculator())).unwrap();
        assert!(matches!(
            proxy.bind("name", returning("x")),
            Err(InvokeError::NotInterceptable { .. })
        ));
    }

    #[test]
    fn test_handler_slot_lifecycle() {
        let proxy = isolated_factory().create(ProxyRequest::new(&calculator())).unwrap();
        assert!(proxy.handler().is_none());

        assert!(proxy.set_handler(returning(1)).is_none());
        assert_eq!(proxy.invoke("add", &[Value::Int(0), Value::Int(0)]), Ok(Value::Int(1)));

        assert!(proxy.set_handler(returning(2)).is_some());
        assert_eq!(proxy.invoke("add", &[Value::Int(0), Value::Int(0)]), Ok(Value::Int(2)));

        assert!(proxy.clear_handler().is_some());
        assert_eq!(proxy.mode(), DispatchMode::Delegating);
        assert_eq!(proxy.invoke("add", &[Value::Int(2), Value::Int(3)]), Ok(Value::Int(5)));
    }

    #[test]
    fn test_spy_over_existing_instance() {
        let target = calculator();
        let real = target.instantiate(&[Value::Int(100)]).unwrap();
        let spy = isolated_factory().proxy_instance(&real).unwrap();

        assert_eq!(spy.invoke("add", &[Value::Int(1), Value::Int(2)]), Ok(Value::Int(103)));
        spy.bind("add", returning(0)).unwrap();
        assert_eq!(spy.invoke("add", &[Value::Int(1), Value::Int(2)]), Ok(Value::Int(0)));

        let calls = spy.invocations();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].args, vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn test_spy_of_subclass_runs_most_derived_body() {
        let base = calculator();
        let doubled = ClassBuilder::new("DoublingCalculator")
            .extends(&base)
            .method(
                MethodDescriptor::new("add")
                    .with_param(ValueCategory::Int)
                    .with_param(ValueCategory::Int)
                    .returns(ValueCategory::Int),
                |_, args| Ok(Value::Int(2 * (args[0].as_int().unwrap_or(0) + args[1].as_int().unwrap_or(0)))),
            )
            .build()
            .unwrap();
        let real = doubled.instantiate(&[]).unwrap();

        let request = ProxyRequest::builder(&base).instance(&real).build().unwrap();
        let spy = isolated_factory().create(request).unwrap();
        assert_eq!(spy.invoke("add", &[Value::Int(1), Value::Int(2)]), Ok(Value::Int(6)));
    }

    #[test]
    fn test_extra_structural_type() {
        let closeable = ClassBuilder::structural("Closeable")
            .abstract_method(MethodDescriptor::new("close"))
            .build()
            .unwrap();
        let request = ProxyRequest::builder(&calculator())
            .implements(&closeable)
            .fallback(Fallback::ZeroValue)
            .build()
            .unwrap();
        let proxy = isolated_factory().create(request).unwrap();

        assert!(proxy.is_instance_of(&closeable));
        assert_eq!(proxy.invoke("close", &[]), Ok(Value::Null));
        assert_eq!(proxy.invoke("add", &[Value::Int(1), Value::Int(1)]), Ok(Value::Int(0)));
    }

    #[test]
    fn test_spy_with_extra_type_rejects_unbound_extra_method() {
        let closeable = ClassBuilder::structural("Closeable")
            .abstract_method(MethodDescriptor::new("close"))
            .build()
            .unwrap();
        let target = calculator();
        let real = target.instantiate(&[Value::Int(1)]).unwrap();
        let request = ProxyRequest::builder(&target)
            .instance(&real)
            .implements(&closeable)
            .build()
            .unwrap();
        let spy = isolated_factory().create(request).unwrap();

        assert_eq!(spy.invoke("add", &[Value::Int(1), Value::Int(1)]), Ok(Value::Int(3)));
        assert!(matches!(
            spy.invoke("close", &[]),
            Err(InvokeError::NoBindingConfigured { ref method, .. }) if method == "close()"
        ));
    }

    #[test]
    fn test_handler_proxy_keeps_no_call_log() {
        let proxy = isolated_factory().proxy(&calculator(), returning(2)).unwrap();
        for _ in 0..10_000 {
            proxy.invoke("add", &[Value::Int(1), Value::Int(1)]).unwrap();
        }
        assert!(proxy.invocations().is_empty());
    }

    #[test]
    fn test_sealed_target_unsupported() {
        let sealed = ClassBuilder::new("Money")
            .method(MethodDescriptor::new("amount").returns(ValueCategory::Int), |_, _| Ok(Value::Int(1)))
            .sealed()
            .build()
            .unwrap();
        let err = isolated_factory().proxy(&sealed, returning(0)).unwrap_err();
        assert!(matches!(err, ProxyError::UnsupportedTarget { .. }));
    }

    #[test]
    fn test_recording_can_be_disabled() {
        let request = ProxyRequest::builder(&calculator())
            .record_invocations(false)
            .build()
            .unwrap();
        let proxy = isolated_factory().create(request).unwrap();
        proxy.invoke("add", &[Value::Int(1), Value::Int(1)]).unwrap();
        assert!(proxy.invocations().is_empty());
    }

    #[test]
    fn test_handler_sees_stable_descriptor() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let h = {
            let seen = seen.clone();
            handler(move |ctx: &dyn InvocationContext| -> InvokeResult {
                seen.lock().push(ctx.method().clone());
                Ok(Value::Int(0))
            })
        };
        let proxy = isolated_factory().proxy(&calculator(), h).unwrap();
        proxy.invoke("add", &[Value::Int(1), Value::Int(1)]).unwrap();
        proxy.invoke("add", &[Value::Int(2), Value::Int(2)]).unwrap();

        let seen = seen.lock();
        assert!(Arc::ptr_eq(&seen[0], &seen[1]));
        assert_eq!(&*seen[0].owner_name, "Calculator");
    }
}
