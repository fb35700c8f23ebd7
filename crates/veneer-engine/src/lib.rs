//! Veneer Engine
//!
//! Dynamic object interception over a runtime object model. Given a runtime
//! type (or an existing instance of one), the engine produces a proxy of a
//! compatible type whose method calls are routed through handlers, with
//! declarative filters selecting which methods are intercepted.
//!
//! # Components
//!
//! - [`model`]: runtime type descriptors and instances
//! - [`filter`]: marker, return-category and predicate method filters
//! - [`pointcut`]: named (type, filter, handler) bindings
//! - [`cache`]: per-namespace memoized generated types
//! - [`synth`]: method tables for generated subtypes
//! - [`structural`]: handler-backed proxies for structural types
//! - [`dispatch`]: call-time handler resolution and fallback
//! - [`factory`]: the `create` entry point
//!
//! # Example
//!
//! ```ignore
//! use veneer_engine::{ClassBuilder, ProxyFactory};
//! use veneer_sdk::{returning, MethodDescriptor, ValueCategory};
//!
//! let clock = ClassBuilder::structural("Clock")
//!     .abstract_method(MethodDescriptor::new("now").returns(ValueCategory::Int))
//!     .build()?;
//! let proxy = ProxyFactory::new().proxy(&clock, returning(1_700_000_000))?;
//! assert_eq!(proxy.invoke("now", &[])?.as_int(), Some(1_700_000_000));
//! ```

#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod construct;
pub mod dispatch;
pub mod error;
pub mod factory;
pub mod filter;
pub mod model;
pub mod pointcut;
pub mod proxy;
pub mod structural;
pub mod synth;

pub use cache::{Namespace, ProxyClassCache};
pub use config::{Fallback, ProxyConfig};
pub use construct::{OriginalInvoker, RawConstructor, VTableInvoker, ZeroedConstructor};
pub use dispatch::DispatchMode;
pub use error::{ProxyError, ProxyResult};
pub use factory::{ProxyFactory, ProxyOptions, ProxyRequest, ProxyRequestBuilder};
pub use filter::{is_eligible, matches, FilterSpec, MethodFilter, MethodPredicate};
pub use model::{ClassBuilder, ClassDescriptor, Constructor, FieldDef, Instance, MethodBody, MethodDef, TypeShape};
pub use pointcut::{FilterBuilder, Pointcut, PointcutRegistry};
pub use proxy::{InvocationRecord, MethodSelection, ProxyKind, ProxyObject};
pub use structural::{StructuralProxyBuilder, StructuralType};
pub use synth::{is_proxy_type, EntryStrategy, GeneratedType, MethodTable, VTableEntry};
