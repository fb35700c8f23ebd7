//! Subclass synthesis
//!
//! A generated proxy type is an explicit method table over its target: every
//! method visible on the target (and on any extra structural types) gets one
//! [`VTableEntry`], either [`EntryStrategy::Intercept`] (routed to the
//! dispatcher) or [`EntryStrategy::Inherited`] (the original body, for methods
//! that can never be intercepted).
//!
//! The method set is deduplicated by signature before eligibility is decided;
//! the most-derived declaration of a signature wins.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use rustc_hash::{FxHashMap, FxHashSet};
use veneer_sdk::{MethodDescriptor, MethodSignature, TypeId};

use crate::cache::Namespace;
use crate::error::{ProxyError, ProxyResult};
use crate::filter;
use crate::model::{ClassDescriptor, MethodBody, MethodDef};

/// Ids of every generated type, with their names
static GENERATED_TYPES: Lazy<DashMap<TypeId, Arc<str>>> = Lazy::new(DashMap::new);

/// Whether `id` names a type produced by [`SubclassSynthesizer`]
pub fn is_proxy_type(id: TypeId) -> bool {
    GENERATED_TYPES.contains_key(&id)
}

/// How a method table entry is executed
#[derive(Clone)]
pub enum EntryStrategy {
    /// Routed to the dispatcher; `original` is the body pass-through runs, if any
    Intercept {
        /// Original implementation (None for abstract and structural methods)
        original: Option<MethodBody>,
    },
    /// Never intercepted; runs the original body directly
    Inherited(MethodBody),
}

impl EntryStrategy {
    /// Whether calls are routed to the dispatcher
    pub fn is_intercepted(&self) -> bool {
        matches!(self, EntryStrategy::Intercept { .. })
    }

    /// Whether an original implementation exists
    pub fn has_original(&self) -> bool {
        match self {
            EntryStrategy::Intercept { original } => original.is_some(),
            EntryStrategy::Inherited(_) => true,
        }
    }
}

impl fmt::Debug for EntryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryStrategy::Intercept { original } => f
                .debug_struct("Intercept")
                .field("has_original", &original.is_some())
                .finish(),
            EntryStrategy::Inherited(_) => f.write_str("Inherited"),
        }
    }
}

/// One method of a proxy type
#[derive(Debug, Clone)]
pub struct VTableEntry {
    /// Stable descriptor handed to handlers
    pub descriptor: Arc<MethodDescriptor>,
    /// Cached signature of `descriptor`
    pub signature: MethodSignature,
    /// Execution strategy
    pub strategy: EntryStrategy,
}

/// Method table of a proxy type, indexed by name
#[derive(Debug, Default)]
pub struct MethodTable {
    entries: Vec<VTableEntry>,
    by_name: FxHashMap<Arc<str>, Vec<usize>>,
}

impl MethodTable {
    /// Build a table from a hierarchy method list (most-derived first).
    ///
    /// When `structural` is set every entry is intercepted and carries no
    /// original, regardless of the method definitions.
    pub(crate) fn from_methods(methods: impl IntoIterator<Item = MethodDef>, structural: bool) -> Self {
        let mut table = MethodTable::default();
        let mut seen = FxHashSet::default();

        for def in methods {
            let signature = def.descriptor.signature();
            if !seen.insert(signature.clone()) {
                continue;
            }
            let strategy = if structural {
                EntryStrategy::Intercept { original: None }
            } else if filter::is_eligible(&def.descriptor) {
                EntryStrategy::Intercept { original: def.body }
            } else {
                match def.body {
                    Some(body) => EntryStrategy::Inherited(body),
                    // Rejected by the class builder; nothing callable to install
                    None => continue,
                }
            };
            table.push(VTableEntry {
                descriptor: def.descriptor,
                signature,
                strategy,
            });
        }
        table
    }

    fn push(&mut self, entry: VTableEntry) {
        let index = self.entries.len();
        self.by_name
            .entry(entry.descriptor.name.clone())
            .or_default()
            .push(index);
        self.entries.push(entry);
    }

    /// All entries
    pub fn entries(&self) -> &[VTableEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries with the given name (overloads)
    pub fn overloads(&self, name: &str) -> impl Iterator<Item = &VTableEntry> {
        self.by_name
            .get(name)
            .into_iter()
            .flatten()
            .map(move |&i| &self.entries[i])
    }

    /// Entry with the given name and parameter count
    pub fn find(&self, name: &str, arity: usize) -> Option<&VTableEntry> {
        self.overloads(name).find(|e| e.descriptor.arity() == arity)
    }

    /// Entry with the given signature
    pub fn find_signature(&self, signature: &MethodSignature) -> Option<&VTableEntry> {
        self.overloads(&signature.name).find(|e| &e.signature == signature)
    }

    /// Descriptors of all intercepted methods
    pub fn intercepted(&self) -> impl Iterator<Item = &Arc<MethodDescriptor>> {
        self.entries
            .iter()
            .filter(|e| e.strategy.is_intercepted())
            .map(|e| &e.descriptor)
    }
}

/// A synthesized proxy type
pub struct GeneratedType {
    id: TypeId,
    name: Arc<str>,
    namespace: Namespace,
    target: Arc<ClassDescriptor>,
    extras: Vec<Arc<ClassDescriptor>>,
    table: MethodTable,
}

impl GeneratedType {
    /// Type identity
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Generated name, `<Target>$$Proxy`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace this type was generated in
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Extended target type
    pub fn target(&self) -> &Arc<ClassDescriptor> {
        &self.target
    }

    /// Extra structural types implemented by this type
    pub fn extras(&self) -> &[Arc<ClassDescriptor>] {
        &self.extras
    }

    /// Method table
    pub fn table(&self) -> &MethodTable {
        &self.table
    }

    /// Whether instances of this type are usable as `class`
    pub fn is_subtype_of(&self, class: &ClassDescriptor) -> bool {
        self.target.is_subtype_of(class) || self.extras.iter().any(|e| e.is_subtype_of(class))
    }
}

impl fmt::Debug for GeneratedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedType")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("namespace", &self.namespace.name())
            .field("methods", &self.table.len())
            .finish()
    }
}

/// Builds generated types; only ever called by [`crate::ProxyClassCache`]
pub(crate) struct SubclassSynthesizer;

impl SubclassSynthesizer {
    pub(crate) fn synthesize(
        namespace: &Namespace,
        target: &Arc<ClassDescriptor>,
        extras: &[Arc<ClassDescriptor>],
    ) -> ProxyResult<GeneratedType> {
        if target.is_structural() {
            return Err(ProxyError::UnsupportedTarget {
                type_name: target.name().to_string(),
                reason: "structural types are proxied without synthesis".to_string(),
            });
        }
        if !target.is_extensible() {
            return Err(ProxyError::UnsupportedTarget {
                type_name: target.name().to_string(),
                reason: "sealed type cannot be extended".to_string(),
            });
        }
        check_extras(extras)?;

        let mut methods = target.hierarchy_methods();
        for extra in extras {
            methods.extend(extra.hierarchy_methods());
        }
        let table = MethodTable::from_methods(methods, false);

        let id = TypeId::next();
        let name: Arc<str> = Arc::from(format!("{}$$Proxy", target.name()));
        GENERATED_TYPES.insert(id, name.clone());

        tracing::debug!(
            target_type = target.name(),
            generated = %name,
            namespace = namespace.name(),
            methods = table.len(),
            intercepted = table.intercepted().count(),
            "synthesized proxy type"
        );

        Ok(GeneratedType {
            id,
            name,
            namespace: namespace.clone(),
            target: target.clone(),
            extras: extras.to_vec(),
            table,
        })
    }
}

/// Reject extra types that are not structural
pub(crate) fn check_extras(extras: &[Arc<ClassDescriptor>]) -> ProxyResult<()> {
    match extras.iter().find(|e| !e.is_structural()) {
        Some(extra) => Err(ProxyError::UnsupportedTarget {
            type_name: extra.name().to_string(),
            reason: "only structural types can be added to a proxy".to_string(),
        }),
        None => Ok(()),
    }
}
