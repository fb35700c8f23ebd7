//! Proxy class cache
//!
//! Generated types are memoized per (namespace, target, extra types). The
//! cache is two-level: a namespace map whose first-time bucket creation is
//! guarded by a coarse lock, and per-namespace buckets whose first-time
//! synthesis is guarded by a bucket-scoped lock. Both levels are
//! double-checked, so once a key is populated lookups only take read locks.
//! Entries are never evicted.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use veneer_sdk::TypeId;

use crate::error::{ProxyError, ProxyResult};
use crate::model::ClassDescriptor;
use crate::synth::{GeneratedType, SubclassSynthesizer};

static NEXT_NAMESPACE_ID: AtomicU64 = AtomicU64::new(1);

static DEFAULT_NAMESPACE: Lazy<Namespace> = Lazy::new(|| Namespace {
    id: 0,
    name: Arc::from(Namespace::DEFAULT_NAME),
});

/// Namespaces handed out by [`Namespace::named`]
static NAMED_NAMESPACES: Lazy<DashMap<Arc<str>, Namespace>> = Lazy::new(DashMap::new);

static GLOBAL_CACHE: Lazy<Arc<ProxyClassCache>> = Lazy::new(|| Arc::new(ProxyClassCache::new()));

/// Isolation boundary for generated types.
///
/// Two namespaces never share a generated type, even for the same target.
/// Identity is the handle's id, not its name.
#[derive(Clone)]
pub struct Namespace {
    id: u64,
    name: Arc<str>,
}

impl Namespace {
    /// Name of the default namespace
    pub const DEFAULT_NAME: &'static str = "default";

    /// Create a fresh namespace, distinct from every other
    pub fn new(name: &str) -> Self {
        Self {
            id: NEXT_NAMESPACE_ID.fetch_add(1, Ordering::Relaxed),
            name: Arc::from(name),
        }
    }

    /// The process-wide default namespace
    pub fn default_namespace() -> Self {
        DEFAULT_NAMESPACE.clone()
    }

    /// Interned namespace for `name`; the same name always yields the same handle
    pub fn named(name: &str) -> Self {
        if name == Self::DEFAULT_NAME {
            return Self::default_namespace();
        }
        NAMED_NAMESPACES
            .entry(Arc::from(name))
            .or_insert_with(|| Namespace::new(name))
            .clone()
    }

    /// Namespace id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Namespace name
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::default_namespace()
    }
}

impl PartialEq for Namespace {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Namespace {}

impl Hash for Namespace {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Namespace({}#{})", self.name, self.id)
    }
}

/// Cache key within a namespace bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    target: TypeId,
    /// Sorted and deduplicated
    extras: Vec<TypeId>,
}

impl CacheKey {
    fn new(target: &ClassDescriptor, extras: &[Arc<ClassDescriptor>]) -> Self {
        let mut ids: Vec<TypeId> = extras.iter().map(|e| e.id()).collect();
        ids.sort_unstable();
        ids.dedup();
        Self { target: target.id(), extras: ids }
    }
}

/// Generated types of one namespace
struct Bucket {
    namespace: Namespace,
    types: RwLock<FxHashMap<CacheKey, Arc<GeneratedType>>>,
    /// Serializes first-time synthesis within the bucket
    synth_lock: Mutex<()>,
}

impl Bucket {
    fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            types: RwLock::new(FxHashMap::default()),
            synth_lock: Mutex::new(()),
        }
    }
}

/// Memoized generated proxy types
pub struct ProxyClassCache {
    buckets: RwLock<FxHashMap<u64, Arc<Bucket>>>,
    /// Serializes first-time bucket creation
    bucket_lock: Mutex<()>,
    /// Number of synthesized types
    generated: AtomicUsize,
}

impl ProxyClassCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self {
            buckets: RwLock::new(FxHashMap::default()),
            bucket_lock: Mutex::new(()),
            generated: AtomicUsize::new(0),
        }
    }

    /// Process-wide cache used by [`crate::ProxyFactory::new`]
    pub fn global() -> Arc<ProxyClassCache> {
        GLOBAL_CACHE.clone()
    }

    /// Get the generated type for (namespace, target, extras), synthesizing it on first use.
    ///
    /// Every caller asking for the same key observes the same `Arc`.
    pub fn get_or_create(
        &self,
        namespace: &Namespace,
        target: &Arc<ClassDescriptor>,
        extras: &[Arc<ClassDescriptor>],
    ) -> ProxyResult<Arc<GeneratedType>> {
        if !target.is_extensible() {
            return Err(ProxyError::UnsupportedTarget {
                type_name: target.name().to_string(),
                reason: "sealed type has no structural form and cannot be extended".to_string(),
            });
        }

        let key = CacheKey::new(target, extras);
        let bucket = self.bucket(namespace);

        if let Some(ty) = bucket.types.read().get(&key) {
            tracing::trace!(target_type = target.name(), namespace = namespace.name(), "proxy type cache hit");
            return Ok(ty.clone());
        }

        let _guard = bucket.synth_lock.lock();
        if let Some(ty) = bucket.types.read().get(&key) {
            return Ok(ty.clone());
        }

        let ty = Arc::new(SubclassSynthesizer::synthesize(&bucket.namespace, target, extras)?);
        bucket.types.write().insert(key, ty.clone());
        self.generated.fetch_add(1, Ordering::Relaxed);
        Ok(ty)
    }

    /// Get a cached generated type without synthesizing
    pub fn get(
        &self,
        namespace: &Namespace,
        target: &ClassDescriptor,
        extras: &[Arc<ClassDescriptor>],
    ) -> Option<Arc<GeneratedType>> {
        let bucket = self.buckets.read().get(&namespace.id()).cloned()?;
        let key = CacheKey::new(target, extras);
        let ty = bucket.types.read().get(&key).cloned();
        ty
    }

    /// Number of types synthesized by this cache
    pub fn generated_count(&self) -> usize {
        self.generated.load(Ordering::Relaxed)
    }

    /// Number of namespaces with a bucket
    pub fn namespace_count(&self) -> usize {
        self.buckets.read().len()
    }

    /// Number of cached types across all namespaces
    pub fn len(&self) -> usize {
        self.buckets.read().values().map(|b| b.types.read().len()).sum()
    }

    /// Whether no type has been cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn bucket(&self, namespace: &Namespace) -> Arc<Bucket> {
        if let Some(bucket) = self.buckets.read().get(&namespace.id()) {
            return bucket.clone();
        }

        let _guard = self.bucket_lock.lock();
        if let Some(bucket) = self.buckets.read().get(&namespace.id()) {
            return bucket.clone();
        }

        let bucket = Arc::new(Bucket::new(namespace.clone()));
        self.buckets.write().insert(namespace.id(), bucket.clone());
        tracing::debug!(namespace = namespace.name(), id = namespace.id(), "created namespace bucket");
        bucket
    }
}

impl Default for ProxyClassCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProxyClassCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyClassCache")
            .field("namespaces", &self.namespace_count())
            .field("generated", &self.generated_count())
            .finish()
    }
}
