//! Proxy factory
//!
//! [`ProxyFactory::create`] is the top-level entry point. Structural targets
//! get a [`StructuralProxyBuilder`] layout; extensible concrete targets get a
//! generated type from the [`ProxyClassCache`] and an instance from the
//! [`RawConstructor`]. Type generation is idempotent; every call returns a
//! fresh proxy instance.

use std::fmt;
use std::sync::Arc;

use veneer_sdk::HandlerRef;

use crate::cache::{Namespace, ProxyClassCache};
use crate::config::{Fallback, ProxyConfig};
use crate::construct::{OriginalInvoker, RawConstructor, VTableInvoker, ZeroedConstructor};
use crate::error::{ProxyError, ProxyResult};
use crate::model::{ClassDescriptor, Instance};
use crate::pointcut::PointcutRegistry;
use crate::proxy::{ProxyKind, ProxyObject};
use crate::structural::StructuralProxyBuilder;
use crate::synth::check_extras;

/// Per-proxy dispatch options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyOptions {
    /// Delegating-state fallback
    pub fallback: Fallback,
    /// Allow pass-through to the original implementation
    pub forward_to_original: bool,
    /// Record calls made while no handler is installed
    pub record_invocations: bool,
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self {
            fallback: Fallback::Original,
            forward_to_original: true,
            record_invocations: true,
        }
    }
}

/// A request for one proxy
#[derive(Clone)]
pub struct ProxyRequest {
    target: Arc<ClassDescriptor>,
    instance: Option<Arc<Instance>>,
    extras: Vec<Arc<ClassDescriptor>>,
    handler: Option<HandlerRef>,
    namespace: Option<Namespace>,
    fallback: Option<Fallback>,
    forward_to_original: Option<bool>,
    record_invocations: Option<bool>,
}

impl ProxyRequest {
    /// Request a proxy of `target` with factory defaults
    pub fn new(target: &Arc<ClassDescriptor>) -> Self {
        Self {
            target: target.clone(),
            instance: None,
            extras: Vec::new(),
            handler: None,
            namespace: None,
            fallback: None,
            forward_to_original: None,
            record_invocations: None,
        }
    }

    /// Start building a request
    pub fn builder(target: &Arc<ClassDescriptor>) -> ProxyRequestBuilder {
        ProxyRequestBuilder {
            request: Self::new(target),
        }
    }

    /// Target type
    pub fn target(&self) -> &Arc<ClassDescriptor> {
        &self.target
    }

    /// Retained instance, if any
    pub fn instance(&self) -> Option<&Arc<Instance>> {
        self.instance.as_ref()
    }

    /// Extra structural types
    pub fn extras(&self) -> &[Arc<ClassDescriptor>] {
        &self.extras
    }

    fn options(&self, defaults: ProxyOptions) -> ProxyOptions {
        ProxyOptions {
            fallback: self.fallback.unwrap_or(defaults.fallback),
            forward_to_original: self.forward_to_original.unwrap_or(defaults.forward_to_original),
            record_invocations: self.record_invocations.unwrap_or(defaults.record_invocations),
        }
    }
}

impl fmt::Debug for ProxyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyRequest")
            .field("target", &self.target.name())
            .field("has_instance", &self.instance.is_some())
            .field("extras", &self.extras.iter().map(|e| e.name()).collect::<Vec<_>>())
            .field("has_handler", &self.handler.is_some())
            .field("namespace", &self.namespace)
            .finish()
    }
}

/// Builder for [`ProxyRequest`]
pub struct ProxyRequestBuilder {
    request: ProxyRequest,
}

impl ProxyRequestBuilder {
    /// Wrap an existing instance of the target; pass-through runs against it.
    ///
    /// Only generated proxies can wrap an instance: a structural target with an
    /// instance is rejected by [`ProxyFactory::create`]. To intercept a live
    /// object through one of its structural types, proxy its concrete class
    /// with [`ProxyFactory::proxy_instance`] instead.
    pub fn instance(mut self, instance: &Arc<Instance>) -> Self {
        self.request.instance = Some(instance.clone());
        self
    }

    /// Also implement a structural type
    pub fn implements(mut self, extra: &Arc<ClassDescriptor>) -> Self {
        self.request.extras.push(extra.clone());
        self
    }

    /// Initial handler
    pub fn handler(mut self, handler: HandlerRef) -> Self {
        self.request.handler = Some(handler);
        self
    }

    /// Namespace to cache the generated type in
    pub fn namespace(mut self, namespace: &Namespace) -> Self {
        self.request.namespace = Some(namespace.clone());
        self
    }

    /// Delegating-state fallback
    pub fn fallback(mut self, fallback: Fallback) -> Self {
        self.request.fallback = Some(fallback);
        self
    }

    /// Enable or disable pass-through to the original implementation
    pub fn forward_to_original(mut self, forward: bool) -> Self {
        self.request.forward_to_original = Some(forward);
        self
    }

    /// Enable or disable call recording
    pub fn record_invocations(mut self, record: bool) -> Self {
        self.request.record_invocations = Some(record);
        self
    }

    /// Validate and finish the request
    pub fn build(self) -> ProxyResult<ProxyRequest> {
        let request = self.request;
        if let Some(instance) = &request.instance {
            if !instance.is_instance_of(&request.target) {
                return Err(ProxyError::InstanceMismatch {
                    target: request.target.name().to_string(),
                    instance_type: instance.class().name().to_string(),
                });
            }
        }
        check_extras(&request.extras)?;
        Ok(request)
    }
}

/// Creates proxies
pub struct ProxyFactory {
    cache: Arc<ProxyClassCache>,
    namespace: Namespace,
    pointcuts: Option<Arc<PointcutRegistry>>,
    constructor: Arc<dyn RawConstructor>,
    invoker: Arc<dyn OriginalInvoker>,
    defaults: ProxyOptions,
}

impl ProxyFactory {
    /// Factory over the global cache and the default namespace
    pub fn new() -> Self {
        Self {
            cache: ProxyClassCache::global(),
            namespace: Namespace::default_namespace(),
            pointcuts: None,
            constructor: Arc::new(ZeroedConstructor),
            invoker: Arc::new(VTableInvoker),
            defaults: ProxyOptions::default(),
        }
    }

    /// Factory whose defaults come from `config`
    pub fn from_config(config: &ProxyConfig) -> ProxyResult<Self> {
        config.validate()?;
        Ok(Self::new()
            .with_namespace(&config.namespace_handle())
            .with_options(config.options()))
    }

    /// Use a specific class cache
    pub fn with_cache(mut self, cache: Arc<ProxyClassCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Default namespace for requests that name none
    pub fn with_namespace(mut self, namespace: &Namespace) -> Self {
        self.namespace = namespace.clone();
        self
    }

    /// Route calls through registered pointcuts
    pub fn with_pointcuts(mut self, pointcuts: PointcutRegistry) -> Self {
        self.pointcuts = Some(Arc::new(pointcuts));
        self
    }

    /// Use a custom raw constructor
    pub fn with_constructor(mut self, constructor: impl RawConstructor + 'static) -> Self {
        self.constructor = Arc::new(constructor);
        self
    }

    /// Use a custom original invoker
    pub fn with_invoker(mut self, invoker: impl OriginalInvoker + 'static) -> Self {
        self.invoker = Arc::new(invoker);
        self
    }

    /// Default options for requests that don't override them
    pub fn with_options(mut self, options: ProxyOptions) -> Self {
        self.defaults = options;
        self
    }

    /// Class cache
    pub fn cache(&self) -> &Arc<ProxyClassCache> {
        &self.cache
    }

    /// Default namespace
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Pointcut registry, if any
    pub fn pointcuts(&self) -> Option<&Arc<PointcutRegistry>> {
        self.pointcuts.as_ref()
    }

    /// Default options
    pub fn options(&self) -> ProxyOptions {
        self.defaults
    }

    /// Create a proxy
    pub fn create(&self, request: ProxyRequest) -> ProxyResult<ProxyObject> {
        let options = request.options(self.defaults);
        let target = &request.target;

        let (kind, state) = if target.is_structural() {
            if request.instance.is_some() {
                return Err(ProxyError::UnsupportedTarget {
                    type_name: target.name().to_string(),
                    reason: "structural proxies cannot wrap an existing instance".to_string(),
                });
            }
            let layout = StructuralProxyBuilder::build(target, &request.extras)?;
            let state = Arc::new(Instance::zeroed(target.clone()));
            (ProxyKind::Structural(Arc::new(layout)), state)
        } else {
            if !target.is_extensible() {
                return Err(ProxyError::UnsupportedTarget {
                    type_name: target.name().to_string(),
                    reason: "sealed type has no structural form and cannot be extended".to_string(),
                });
            }
            let namespace = request.namespace.as_ref().unwrap_or(&self.namespace);
            let ty = self.cache.get_or_create(namespace, target, &request.extras)?;
            let state = self.allocate(&ty)?;
            (ProxyKind::Generated(ty), Arc::new(state))
        };

        let proxy = ProxyObject::new(
            kind,
            state,
            request.instance,
            request.handler,
            options,
            self.pointcuts.clone(),
            self.invoker.clone(),
        );
        tracing::debug!(
            proxy = proxy.id(),
            proxy_type = proxy.type_name(),
            structural = proxy.kind().is_structural(),
            wraps_instance = proxy.wrapped().is_some(),
            "proxy created"
        );
        Ok(proxy)
    }

    /// Proxy `target` with `handler` installed
    pub fn proxy(&self, target: &Arc<ClassDescriptor>, handler: HandlerRef) -> ProxyResult<ProxyObject> {
        self.create(ProxyRequest::builder(target).handler(handler).build()?)
    }

    /// Proxy an existing instance; unbound calls reach the instance
    pub fn proxy_instance(&self, instance: &Arc<Instance>) -> ProxyResult<ProxyObject> {
        let request = ProxyRequest::builder(instance.class()).instance(instance).build()?;
        self.create(request)
    }

    fn allocate(&self, ty: &crate::synth::GeneratedType) -> ProxyResult<Instance> {
        let failed = |reason: String| {
            tracing::warn!(proxy_type = ty.name(), %reason, "raw construction failed");
            ProxyError::ConstructionFailed {
                type_name: ty.name().to_string(),
                reason,
            }
        };
        let instance = self.constructor.allocate_without_constructor(ty).map_err(failed)?;
        if !instance.is_instance_of(ty.target()) {
            return Err(failed(format!(
                "allocated {} is not an instance of {}",
                instance.class().name(),
                ty.target().name()
            )));
        }
        Ok(instance)
    }
}

impl Default for ProxyFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProxyFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyFactory")
            .field("namespace", &self.namespace)
            .field("pointcuts", &self.pointcuts.as_ref().map(|p| p.len()))
            .field("defaults", &self.defaults)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ClassBuilder;
    use crate::synth::{is_proxy_type, GeneratedType};
    use veneer_sdk::{returning, MethodDescriptor, Value, ValueCategory};

    fn isolated() -> ProxyFactory {
        ProxyFactory::new().with_cache(Arc::new(ProxyClassCache::new()))
    }

    fn account() -> Arc<ClassDescriptor> {
        ClassBuilder::new("Account")
            .field("balance", ValueCategory::Int)
            .method(MethodDescriptor::new("balance").returns(ValueCategory::Int), |this, _| {
                Ok(this.get_field("balance").unwrap_or_default())
            })
            .constructor(vec![ValueCategory::Int], |this, args| {
                this.set_field("balance", args[0].clone())?;
                Ok(Value::Null)
            })
            .build()
            .unwrap()
    }

    #[test]
    fn test_generated_proxy_skips_constructor() {
        let factory = isolated();
        let proxy = factory.create(ProxyRequest::new(&account())).unwrap();

        assert!(is_proxy_type(proxy.type_id()));
        assert_eq!(proxy.type_name(), "Account$$Proxy");
        assert_eq!(proxy.invoke("balance", &[]), Ok(Value::Int(0)));
    }

    #[test]
    fn test_each_create_is_fresh_instance() {
        let factory = isolated();
        let target = account();
        let a = factory.create(ProxyRequest::new(&target)).unwrap();
        let b = factory.create(ProxyRequest::new(&target)).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.type_id(), b.type_id());
        assert_eq!(factory.cache().generated_count(), 1);
    }

    #[test]
    fn test_spy_forwards_to_instance() {
        let factory = isolated();
        let target = account();
        let real = target.instantiate(&[Value::Int(250)]).unwrap();

        let spy = factory.proxy_instance(&real).unwrap();
        assert_eq!(spy.invoke("balance", &[]), Ok(Value::Int(250)));
        assert_eq!(spy.invocation_count("balance"), 1);
    }

    #[test]
    fn test_instance_mismatch() {
        let other = ClassBuilder::new("Other").build().unwrap();
        let instance = other.instantiate(&[]).unwrap();
        let err = ProxyRequest::builder(&account())
            .instance(&instance)
            .build()
            .unwrap_err();
        assert!(matches!(err, ProxyError::InstanceMismatch { .. }));
    }

    #[test]
    fn test_sealed_unsupported() {
        let sealed = ClassBuilder::new("Token").sealed().build().unwrap();
        let err = isolated().create(ProxyRequest::new(&sealed)).unwrap_err();
        assert!(matches!(err, ProxyError::UnsupportedTarget { .. }));
    }

    #[test]
    fn test_structural_cannot_wrap_instance() {
        let iface = ClassBuilder::structural("Readable")
            .abstract_method(MethodDescriptor::new("read"))
            .build()
            .unwrap();
        let impl_ty = ClassBuilder::new("File")
            .implements(&iface)
            .method(MethodDescriptor::new("read"), |_, _| Ok(Value::Null))
            .build()
            .unwrap();
        let file = impl_ty.instantiate(&[]).unwrap();

        let request = ProxyRequest::builder(&iface).instance(&file).build().unwrap();
        let factory = isolated();
        let err = factory.create(request).unwrap_err();
        assert!(matches!(err, ProxyError::UnsupportedTarget { .. }));

        // Proxying the concrete class keeps the structural type and the live object
        let spy = factory.proxy_instance(&file).unwrap();
        assert!(spy.is_instance_of(&iface));
        assert_eq!(spy.invoke("read", &[]), Ok(Value::Null));
        assert_eq!(spy.invocation_count("read"), 1);
    }

    #[test]
    fn test_extra_must_be_structural() {
        let err = ProxyRequest::builder(&account())
            .implements(&account())
            .build()
            .unwrap_err();
        assert!(matches!(err, ProxyError::UnsupportedTarget { .. }));
    }

    struct FailingConstructor;

    impl RawConstructor for FailingConstructor {
        fn allocate_without_constructor(&self, _ty: &GeneratedType) -> Result<Instance, String> {
            Err("out of memory".to_string())
        }
    }

    #[test]
    fn test_construction_failed_surfaces() {
        let factory = isolated().with_constructor(FailingConstructor);
        let err = factory.create(ProxyRequest::new(&account())).unwrap_err();
        match err {
            ProxyError::ConstructionFailed { type_name, reason } => {
                assert_eq!(type_name, "Account$$Proxy");
                assert_eq!(reason, "out of memory");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_request_overrides_defaults() {
        let factory = isolated().with_options(ProxyOptions {
            fallback: Fallback::Reject,
            ..ProxyOptions::default()
        });
        let target = account();

        let strict = factory.create(ProxyRequest::new(&target)).unwrap();
        assert_eq!(strict.options().fallback, Fallback::Reject);

        let lenient = factory
            .create(ProxyRequest::builder(&target).fallback(Fallback::ZeroValue).build().unwrap())
            .unwrap();
        assert_eq!(lenient.options().fallback, Fallback::ZeroValue);
    }

    #[test]
    fn test_from_config() {
        let config = ProxyConfig::from_toml_str(
            r#"
namespace = "factory-tests"
fallback = "reject"
"#,
        )
        .unwrap();
        let factory = ProxyFactory::from_config(&config)
            .unwrap()
            .with_cache(Arc::new(ProxyClassCache::new()));
        assert_eq!(factory.namespace().name(), "factory-tests");

        let proxy = factory.proxy(&account(), returning(5)).unwrap();
        assert_eq!(proxy.invoke("balance", &[]), Ok(Value::Int(5)));
        assert_eq!(proxy.options().fallback, Fallback::Reject);
    }
}
