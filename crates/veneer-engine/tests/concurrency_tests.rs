//! Concurrent proxy creation and dispatch tests
//!
//! Validates that the class cache generates each proxy type exactly once under
//! concurrent demand, and that handler slots and bindings can be updated while
//! other threads dispatch.
//!
//! # Running Tests
//! ```bash
//! cargo test --test concurrency_tests
//! ```

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

use veneer_engine::{
    ClassBuilder, ClassDescriptor, Namespace, ProxyClassCache, ProxyFactory, ProxyRequest,
};
use veneer_sdk::{returning, InvokeError, MethodDescriptor, Value, ValueCategory};

const THREADS: usize = 16;

fn worker() -> Arc<ClassDescriptor> {
    ClassBuilder::new("Worker")
        .method(MethodDescriptor::new("work").returns(ValueCategory::Int), |_, _| {
            Ok(Value::Int(1))
        })
        .build()
        .unwrap()
}

// ===== Cache generation =====

#[test]
fn test_concurrent_create_generates_once() {
    let cache = Arc::new(ProxyClassCache::new());
    let factory = Arc::new(ProxyFactory::new().with_cache(cache.clone()));
    let target = worker();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let factory = factory.clone();
            let target = target.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                let proxy = factory.create(ProxyRequest::new(&target)).unwrap();
                (proxy.id(), proxy.type_id())
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let ids: HashSet<_> = results.iter().map(|(id, _)| *id).collect();
    let types: HashSet<_> = results.iter().map(|(_, ty)| *ty).collect();
    assert_eq!(ids.len(), THREADS, "every create returns a fresh instance");
    assert_eq!(types.len(), 1, "all proxies share one generated type");
    assert_eq!(cache.generated_count(), 1);
}

#[test]
fn test_two_threads_get_or_create_same_arc() {
    let cache = Arc::new(ProxyClassCache::new());
    let namespace = Namespace::new("race");
    let target = worker();
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let cache = cache.clone();
            let namespace = namespace.clone();
            let target = target.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                cache.get_or_create(&namespace, &target, &[]).unwrap()
            })
        })
        .collect();

    let types: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(Arc::ptr_eq(&types[0], &types[1]));
    assert_eq!(cache.generated_count(), 1);
}

#[test]
fn test_concurrent_namespaces_each_generate_once() {
    let cache = Arc::new(ProxyClassCache::new());
    let namespaces: Vec<_> = (0..4).map(|i| Namespace::new(&format!("ns-{}", i))).collect();
    let target = worker();

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let cache = cache.clone();
            let namespace = namespaces[i % namespaces.len()].clone();
            let target = target.clone();
            thread::spawn(move || cache.get_or_create(&namespace, &target, &[]).unwrap().id())
        })
        .collect();

    let ids: HashSet<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(ids.len(), 4);
    assert_eq!(cache.generated_count(), 4);
    assert_eq!(cache.namespace_count(), 4);
}

// ===== Dispatch under contention =====

#[test]
fn test_handler_swap_while_dispatching() {
    let factory = ProxyFactory::new().with_cache(Arc::new(ProxyClassCache::new()));
    let proxy = Arc::new(factory.create(ProxyRequest::new(&worker())).unwrap());

    let callers: Vec<_> = (0..4)
        .map(|_| {
            let proxy = proxy.clone();
            thread::spawn(move || {
                for _ in 0..1000 {
                    let value = proxy.invoke("work", &[]).unwrap().as_int().unwrap();
                    assert!(value == 1 || value == 2, "unexpected value {}", value);
                }
            })
        })
        .collect();

    let swapper = {
        let proxy = proxy.clone();
        thread::spawn(move || {
            for i in 0..1000 {
                if i % 2 == 0 {
                    proxy.set_handler(returning(2));
                } else {
                    proxy.clear_handler();
                }
            }
        })
    };

    for h in callers {
        h.join().unwrap();
    }
    swapper.join().unwrap();

    // Only calls that found the slot empty were logged; the swapper ends on clear
    let logged = proxy.invocation_count("work");
    assert!(logged <= 4000);
    assert!(proxy.handler().is_none());
    assert_eq!(proxy.invoke("work", &[]), Ok(Value::Int(1)));
    assert_eq!(proxy.invocation_count("work"), logged + 1);
}

#[test]
fn test_concurrent_selections_leave_one_winner() {
    let factory = ProxyFactory::new().with_cache(Arc::new(ProxyClassCache::new()));
    let proxy = factory.create(ProxyRequest::new(&worker())).unwrap();

    // Two selections interleaved on one proxy: only the newest may bind
    let first = proxy.select("work").unwrap();
    let second = proxy.select("work").unwrap();
    assert!(matches!(
        first.then_return(10),
        Err(InvokeError::StaleSelection { .. })
    ));
    second.then_return(20).unwrap();
    assert_eq!(proxy.invoke("work", &[]), Ok(Value::Int(20)));

    let proxy = Arc::new(proxy);
    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let proxy = proxy.clone();
            thread::spawn(move || {
                proxy
                    .select("work")
                    .and_then(|s| s.then_return(i as i64))
                    .is_ok()
            })
        })
        .collect();
    let bound = handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();
    assert!(bound >= 1);
    assert!(proxy.invoke("work", &[]).unwrap().as_int().unwrap() < THREADS as i64);
}
